use anyhow::{Context, Result};
use std::{env, net::SocketAddr, path::PathBuf};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_LOG_FILE: &str = "logfile.log";

/// Runtime settings, read from the environment at startup.
///
/// - `LISTEN_ADDR`: socket to bind, default `0.0.0.0:8080`.
/// - `LISTING_ROOT`: directory all listings are resolved against, default
///   the working directory at startup.
/// - `LOG_FILE`: append-only log file, default `logfile.log`.
/// - `NODEBUG=true`: keep debug lines out of stdout (the log file still gets them).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub root: PathBuf,
    pub log_file: PathBuf,
    pub quiet_debug: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid LISTEN_ADDR {:?}", listen_addr))?;

        let root = match lookup("LISTING_ROOT") {
            Some(p) => PathBuf::from(p),
            None => env::current_dir().context("cannot determine working directory")?,
        };

        let log_file = lookup("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        let quiet_debug = lookup("NODEBUG").as_deref() == Some("true");

        Ok(Self {
            listen_addr,
            root,
            log_file,
            quiet_debug,
        })
    }
}
