use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};
use std::path::PathBuf;

/// Upper bound for periodic timers (one year).
pub const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("sparring")
        .about("Authentication core: rotating signed credentials and request throttling")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("SPARRING_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("jwt-active-secret")
                .long("jwt-active-secret")
                .help("Secret used to sign new tokens")
                .env("SPARRING_JWT_ACTIVE_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("jwt-legacy-secret")
                .long("jwt-legacy-secret")
                .help("Previous signing secret still accepted for verification, oldest first")
                .env("SPARRING_JWT_LEGACY_SECRETS")
                .hide_env_values(true)
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("secret-history")
                .long("secret-history")
                .help("Number of retired secrets kept after rotation")
                .default_value("3")
                .env("SPARRING_SECRET_HISTORY")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("access-ttl")
                .long("access-ttl")
                .help("Access token lifetime in seconds")
                .default_value("3600")
                .env("SPARRING_ACCESS_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("refresh-ttl")
                .long("refresh-ttl")
                .help("Refresh token lifetime in seconds")
                .default_value("604800")
                .env("SPARRING_REFRESH_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("rotation-interval")
                .long("rotation-interval")
                .help("Seconds between signing secret rotations")
                .default_value("2592000")
                .env("SPARRING_ROTATION_INTERVAL")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_PERIOD_SECS)),
        )
        .arg(
            Arg::new("rate-limit")
                .long("rate-limit")
                .help("Requests allowed per client within the rate window")
                .default_value("5")
                .env("SPARRING_RATE_LIMIT")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("rate-window")
                .long("rate-window")
                .help("Rate limit window in seconds")
                .default_value("60")
                .env("SPARRING_RATE_WINDOW")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_PERIOD_SECS)),
        )
        .arg(
            Arg::new("principals")
                .long("principals")
                .help("JSON file listing the principals allowed to log in")
                .env("SPARRING_PRINCIPALS")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("SPARRING_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_VARS: [&str; 11] = [
        "SPARRING_PORT",
        "SPARRING_JWT_ACTIVE_SECRET",
        "SPARRING_JWT_LEGACY_SECRETS",
        "SPARRING_SECRET_HISTORY",
        "SPARRING_ACCESS_TTL",
        "SPARRING_REFRESH_TTL",
        "SPARRING_ROTATION_INTERVAL",
        "SPARRING_RATE_LIMIT",
        "SPARRING_RATE_WINDOW",
        "SPARRING_PRINCIPALS",
        "SPARRING_LOG_LEVEL",
    ];

    fn clean_env<F: FnOnce()>(f: F) {
        temp_env::with_vars_unset(ENV_VARS, f);
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "sparring");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "Authentication core: rotating signed credentials and request throttling"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_defaults() {
        clean_env(|| {
            let matches = new().get_matches_from(vec![
                "sparring",
                "--jwt-active-secret",
                "active",
            ]);

            assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
            assert_eq!(matches.get_one::<usize>("secret-history").copied(), Some(3));
            assert_eq!(matches.get_one::<u64>("access-ttl").copied(), Some(3600));
            assert_eq!(matches.get_one::<u64>("refresh-ttl").copied(), Some(604_800));
            assert_eq!(
                matches.get_one::<u64>("rotation-interval").copied(),
                Some(2_592_000)
            );
            assert_eq!(matches.get_one::<usize>("rate-limit").copied(), Some(5));
            assert_eq!(matches.get_one::<u64>("rate-window").copied(), Some(60));
            assert!(matches.get_many::<String>("jwt-legacy-secret").is_none());
            assert!(matches.get_one::<PathBuf>("principals").is_none());
        });
    }

    #[test]
    fn test_active_secret_required() {
        clean_env(|| {
            let result = new().try_get_matches_from(vec!["sparring"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_zero_ttl_rejected() {
        clean_env(|| {
            let result = new().try_get_matches_from(vec![
                "sparring",
                "--jwt-active-secret",
                "active",
                "--access-ttl",
                "0",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_periods_are_bounded() {
        clean_env(|| {
            for flag in ["--rotation-interval", "--rate-window"] {
                let too_long = (MAX_PERIOD_SECS + 1).to_string();
                for value in ["0", too_long.as_str(), "18446744073709551615"] {
                    let result = new().try_get_matches_from(vec![
                        "sparring",
                        "--jwt-active-secret",
                        "active",
                        flag,
                        value,
                    ]);
                    assert!(result.is_err(), "{flag} {value}");
                }

                let matches = new().get_matches_from(vec![
                    "sparring",
                    "--jwt-active-secret",
                    "active",
                    flag,
                    "31536000",
                ]);
                let id = flag.trim_start_matches("--");
                assert_eq!(matches.get_one::<u64>(id).copied(), Some(MAX_PERIOD_SECS));
            }
        });
    }

    #[test]
    fn test_legacy_secrets_flag() {
        clean_env(|| {
            let matches = new().get_matches_from(vec![
                "sparring",
                "--jwt-active-secret",
                "active",
                "--jwt-legacy-secret",
                "old-1",
                "--jwt-legacy-secret",
                "old-2",
            ]);
            let legacy: Vec<&String> = matches
                .get_many::<String>("jwt-legacy-secret")
                .unwrap()
                .collect();
            assert_eq!(legacy, vec!["old-1", "old-2"]);
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("SPARRING_JWT_ACTIVE_SECRET", Some("active")),
                ("SPARRING_JWT_LEGACY_SECRETS", Some("old-1,old-2")),
                ("SPARRING_PORT", Some("443")),
                ("SPARRING_RATE_LIMIT", Some("10")),
                ("SPARRING_RATE_WINDOW", Some("30")),
                ("SPARRING_PRINCIPALS", Some("/etc/sparring/principals.json")),
                ("SPARRING_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["sparring"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>("jwt-active-secret").map(String::as_str),
                    Some("active")
                );
                let legacy: Vec<&String> = matches
                    .get_many::<String>("jwt-legacy-secret")
                    .unwrap()
                    .collect();
                assert_eq!(legacy, vec!["old-1", "old-2"]);
                assert_eq!(matches.get_one::<usize>("rate-limit").copied(), Some(10));
                assert_eq!(matches.get_one::<u64>("rate-window").copied(), Some(30));
                assert_eq!(
                    matches.get_one::<PathBuf>("principals"),
                    Some(&PathBuf::from("/etc/sparring/principals.json"))
                );
                assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("SPARRING_LOG_LEVEL", Some(level)),
                    ("SPARRING_JWT_ACTIVE_SECRET", Some("active")),
                ],
                || {
                    let matches = new().get_matches_from(vec!["sparring"]);
                    assert_eq!(
                        matches.get_one::<u8>("verbosity").copied(),
                        Some(index as u8)
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("SPARRING_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "sparring".to_string(),
                    "--jwt-active-secret".to_string(),
                    "active".to_string(),
                ];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    Some(index as u8)
                );
            });
        }
    }
}
