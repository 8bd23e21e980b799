use std::time::Duration;

use anyhow::{Context, Result};

use crate::delivery::DeliveryConfig;

/// Server configuration, collected from the environment once at startup and
/// passed into constructors. No process-wide mutable state.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// etcd v3 JSON gateway root. Unset means the in-memory dev store.
    pub store_url: Option<String>,
    pub store_timeout: Duration,
    pub poll_interval: Duration,
    pub send_delay: Duration,
    /// Opt-in to the fail-fast policy: a store failure during a request
    /// exits the process instead of returning a 500.
    pub fail_fast: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = env_or("PARLEY_HOST", "0.0.0.0");
        let port = env_or("PARLEY_PORT", "4050")
            .parse()
            .context("PARLEY_PORT must be a port number")?;
        let store_url = std::env::var("PARLEY_STORE_URL").ok().filter(|s| !s.is_empty());
        let store_timeout = env_ms("PARLEY_STORE_TIMEOUT_MS", 5_000)?;
        let poll_interval = env_ms("PARLEY_POLL_INTERVAL_MS", 2_000)?;
        let send_delay = env_ms("PARLEY_SEND_DELAY_MS", 200)?;
        let fail_fast = matches!(
            std::env::var("PARLEY_FAIL_FAST").as_deref(),
            Ok("1") | Ok("true")
        );

        Ok(Self {
            host,
            port,
            store_url,
            store_timeout,
            poll_interval,
            send_delay,
            fail_fast,
        })
    }

    pub fn delivery(&self) -> DeliveryConfig {
        DeliveryConfig {
            poll_interval: self.poll_interval,
            send_delay: self.send_delay,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn env_ms(name: &str, default_ms: u64) -> Result<Duration> {
    let ms = match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} must be milliseconds"))?,
        Err(_) => default_ms,
    };
    Ok(Duration::from_millis(ms))
}
