use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::{anyhow, Result};
use secrecy::SecretString;
use std::path::PathBuf;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let active = matches
        .get_one::<String>("jwt-active-secret")
        .filter(|secret| !secret.is_empty())
        .ok_or_else(|| anyhow!("missing required argument: --jwt-active-secret"))?;

    let mut globals = GlobalArgs::new(SecretString::from(active.clone()));

    globals.set_legacy_secrets(
        matches
            .get_many::<String>("jwt-legacy-secret")
            .map(|values| {
                values
                    .filter(|secret| !secret.is_empty())
                    .map(|secret| SecretString::from(secret.clone()))
                    .collect()
            })
            .unwrap_or_default(),
    );

    if let Some(history) = matches.get_one::<usize>("secret-history") {
        globals.secret_history = *history;
    }
    if let Some(ttl) = matches.get_one::<u64>("access-ttl") {
        globals.access_ttl = *ttl;
    }
    if let Some(ttl) = matches.get_one::<u64>("refresh-ttl") {
        globals.refresh_ttl = *ttl;
    }
    if let Some(interval) = matches.get_one::<u64>("rotation-interval") {
        globals.rotation_interval = *interval;
    }
    if let Some(limit) = matches.get_one::<usize>("rate-limit") {
        globals.rate_limit = *limit;
    }
    if let Some(window) = matches.get_one::<u64>("rate-window") {
        globals.rate_window = *window;
    }
    globals.principals = matches.get_one::<PathBuf>("principals").cloned();

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        globals,
    })
}
