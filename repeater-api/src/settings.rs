use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;

/// Runtime settings, read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: String,
    pub listen: SocketAddr,
    pub svxlink_conf: PathBuf,
    pub pool_size: u32,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database =
            lookup("REPEATER_API_DATABASE").unwrap_or_else(|| "mmdvmdb.sqlite".to_owned());

        let listen = lookup("REPEATER_API_LISTEN")
            .as_deref()
            .unwrap_or("[::]:8008")
            .parse::<SocketAddr>()
            .context("REPEATER_API_LISTEN is not a socket address")?;

        let svxlink_conf = lookup("REPEATER_API_SVXLINK_CONF")
            .unwrap_or_else(|| "/etc/svxlink/svxlink.conf".to_owned())
            .into();

        let pool_size = match lookup("REPEATER_API_POOL_SIZE") {
            Some(s) => s
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| {
                    format!("REPEATER_API_POOL_SIZE must be a positive integer, got {:?}", s)
                })?,
            None => 4,
        };

        Ok(Self {
            database,
            listen,
            svxlink_conf,
            pool_size,
        })
    }
}
