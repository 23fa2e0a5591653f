use crate::{api, api::handlers::admin::AdminConfig, cli::telemetry};
use anyhow::Result;
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub data_dir: PathBuf,
    pub admin_password: Option<SecretString>,
    pub secure_cookies: bool,
    pub strict_origin: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    if args.admin_password.is_none() {
        warn!("ADMIN_PASSWORD is not set; every admin route will redirect to the login page");
    }

    let admin_config = AdminConfig::new(args.admin_password)
        .with_secure_cookies(args.secure_cookies)
        .with_strict_origin(args.strict_origin);

    debug!("Admin config: {:?}", admin_config);

    let result = api::new(args.port, args.data_dir, admin_config).await;

    telemetry::shutdown_tracer();

    result
}
