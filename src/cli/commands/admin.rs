use clap::{Arg, ArgAction, Command, builder::BoolishValueParser};

pub const ARG_ADMIN_PASSWORD: &str = "admin-password";
pub const ARG_SECURE_COOKIES: &str = "secure-cookies";
pub const ARG_STRICT_ORIGIN: &str = "strict-origin";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Shared admin password; admin access is disabled when unset")
                .env("ADMIN_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SECURE_COOKIES)
                .long(ARG_SECURE_COOKIES)
                .help("Mark admin cookies Secure (serve over HTTPS)")
                .env("OPSDASH_SECURE_COOKIES")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_STRICT_ORIGIN)
                .long(ARG_STRICT_ORIGIN)
                .help("Reject logins that carry neither Origin nor Referer")
                .env("OPSDASH_STRICT_ORIGIN")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}
