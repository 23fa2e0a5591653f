//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, such as starting the
//! dashboard server with its admin configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DATA_DIR, ARG_PORT, admin};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let data_dir = matches
        .get_one::<PathBuf>(ARG_DATA_DIR)
        .cloned()
        .context("missing required argument: --data-dir")?;

    // An empty password is the same as no password: nothing can log in.
    let admin_password = matches
        .get_one::<String>(admin::ARG_ADMIN_PASSWORD)
        .filter(|value| !value.is_empty())
        .map(|value| SecretString::from(value.clone()));

    Ok(Action::Server(Args {
        port,
        data_dir,
        admin_password,
        secure_cookies: matches.get_flag(admin::ARG_SECURE_COOKIES),
        strict_origin: matches.get_flag(admin::ARG_STRICT_ORIGIN),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn server_args(args: Vec<&str>) -> Option<Args> {
        let matches = crate::cli::commands::new().get_matches_from(args);
        match handler(&matches) {
            Ok(Action::Server(args)) => Some(args),
            Err(_) => None,
        }
    }

    #[test]
    fn empty_admin_password_is_treated_as_unset() {
        temp_env::with_vars([("ADMIN_PASSWORD", Some(""))], || {
            let args = server_args(vec!["opsdash"]);
            assert!(args.is_some_and(|args| args.admin_password.is_none()));
        });
    }

    #[test]
    fn admin_password_from_env() {
        temp_env::with_vars(
            [
                ("ADMIN_PASSWORD", Some("s3cret")),
                ("OPSDASH_SECURE_COOKIES", None),
                ("OPSDASH_STRICT_ORIGIN", None),
            ],
            || {
                let args = server_args(vec!["opsdash", "--port", "3000"]);
                assert!(args.is_some());
                if let Some(args) = args {
                    assert_eq!(args.port, 3000);
                    assert_eq!(
                        args.admin_password
                            .as_ref()
                            .map(|secret| secret.expose_secret().to_string()),
                        Some("s3cret".to_string())
                    );
                    assert!(!args.secure_cookies);
                    assert!(!args.strict_origin);
                }
            },
        );
    }
}
