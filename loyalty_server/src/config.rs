use std::{env, time::Duration};

use log::*;
use loyalty_common::{helpers::env_or_default, Secret};
use loyalty_engine::{
    accrual::{RetryPolicy, WorkerConfig},
    db_url,
};
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::{cli::Arguments, errors::ServerError};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URI: &str = "sqlite://data/loyalty.db";
const DEFAULT_ACCRUAL_SYSTEM_ADDRESS: &str = "http://localhost:8081";
const DEFAULT_QUEUE_CAPACITY: usize = 100;
const DEFAULT_MAX_ATTEMPTS: usize = 20;
const DEFAULT_RETRY_MIN_DELAY_MS: u64 = 500;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 60_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Base URL of the accrual service, e.g. `http://localhost:8081`.
    pub accrual_url: String,
    pub oracle_timeout: Duration,
    /// Key used to sign session cookies. If it is not configured, a random key is generated, and sessions do not
    /// survive a restart.
    pub cookie_secret: Secret<String>,
    pub worker: WorkerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URI.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            accrual_url: DEFAULT_ACCRUAL_SYSTEM_ADDRESS.to_string(),
            oracle_timeout: Duration::from_millis(DEFAULT_ORACLE_TIMEOUT_MS),
            cookie_secret: random_secret(),
            worker: WorkerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let (host, port) = match env::var("RUN_ADDRESS") {
            Ok(s) => parse_run_address(&s).unwrap_or_else(|e| {
                error!("🪛️ {e} Using the default, {DEFAULT_HOST}:{DEFAULT_PORT}, instead.");
                (DEFAULT_HOST.to_string(), DEFAULT_PORT)
            }),
            Err(_) => {
                info!("🪛️ RUN_ADDRESS is not set. Using the default value of {DEFAULT_HOST}:{DEFAULT_PORT}.");
                (DEFAULT_HOST.to_string(), DEFAULT_PORT)
            },
        };
        let database_url = db_url();
        let accrual_url = env_or_default("ACCRUAL_SYSTEM_ADDRESS", DEFAULT_ACCRUAL_SYSTEM_ADDRESS.to_string());
        let cookie_secret = match env::var("LOYALTY_COOKIE_SECRET") {
            Ok(s) if !s.is_empty() => Secret::new(s),
            _ => {
                warn!(
                    "🪛️ LOYALTY_COOKIE_SECRET is not set. A random key will be used, and sessions will not survive a \
                     server restart."
                );
                random_secret()
            },
        };
        let db_max_connections = env_or_default("LOYALTY_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);
        let oracle_timeout =
            Duration::from_millis(env_or_default("LOYALTY_ORACLE_TIMEOUT_MS", DEFAULT_ORACLE_TIMEOUT_MS));
        let worker = configure_worker();
        Self { host, port, database_url, db_max_connections, accrual_url, oracle_timeout, cookie_secret, worker }
    }

    /// Command-line flags take precedence over the environment.
    pub fn with_overrides(mut self, overrides: Arguments) -> Result<Self, ServerError> {
        if let Some(address) = overrides.run_address {
            let (host, port) = parse_run_address(&address)?;
            self.host = host;
            self.port = port;
        }
        if let Some(url) = overrides.database_uri {
            self.database_url = url;
        }
        if let Some(url) = overrides.accrual_address {
            self.accrual_url = url;
        }
        Ok(self)
    }
}

fn configure_worker() -> WorkerConfig {
    let queue_capacity = env_or_default("LOYALTY_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY);
    let queue_capacity = if queue_capacity == 0 {
        warn!("🪛️ LOYALTY_QUEUE_CAPACITY must be at least 1. Using the default, {DEFAULT_QUEUE_CAPACITY}, instead.");
        DEFAULT_QUEUE_CAPACITY
    } else {
        queue_capacity
    };
    let max_attempts = env_or_default("LOYALTY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS).max(1);
    let min_delay = Duration::from_millis(env_or_default("LOYALTY_RETRY_MIN_DELAY_MS", DEFAULT_RETRY_MIN_DELAY_MS));
    let max_delay = Duration::from_millis(env_or_default("LOYALTY_RETRY_MAX_DELAY_MS", DEFAULT_RETRY_MAX_DELAY_MS));
    let max_delay = if max_delay < min_delay {
        warn!(
            "🪛️ LOYALTY_RETRY_MAX_DELAY_MS ({}ms) is shorter than LOYALTY_RETRY_MIN_DELAY_MS ({}ms). Using the minimum \
             delay for both.",
            max_delay.as_millis(),
            min_delay.as_millis()
        );
        min_delay
    } else {
        max_delay
    };
    let poll_interval = Duration::from_millis(env_or_default("LOYALTY_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS));
    WorkerConfig { queue_capacity, retry: RetryPolicy { min_delay, max_delay, max_attempts, poll_interval } }
}

/// Splits `host:port`. A leading `http://` is tolerated.
pub fn parse_run_address(address: &str) -> Result<(String, u16), ServerError> {
    let address = address.trim().trim_start_matches("http://").trim_end_matches('/');
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| ServerError::ConfigurationError(format!("{address} is not a valid host:port address.")))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| ServerError::ConfigurationError(format!("{port} is not a valid port in {address}. {e}")))?;
    let host = if host.is_empty() { "0.0.0.0" } else { host };
    Ok((host.to_string(), port))
}

fn random_secret() -> Secret<String> {
    let key = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
    Secret::new(key)
}
