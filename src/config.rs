//! Runtime configuration for the matching core and its ambient stack.
//!
//! Loaded from environment variables (prefix `RINGMATCH_`) with documented
//! defaults for every field; invalid combinations are rejected at startup
//! rather than discovered mid-run.

use std::env;

use crate::errors::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategyKind {
    Busy,
    Yielding,
    Parking,
}

impl WaitStrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WaitStrategyKind::Busy => "busy",
            WaitStrategyKind::Yielding => "yielding",
            WaitStrategyKind::Parking => "parking",
        }
    }

    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "busy" => Ok(Self::Busy),
            "yielding" => Ok(Self::Yielding),
            "parking" => Ok(Self::Parking),
            other => Err(ConfigError::UnknownWaitStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Ring-buffer transport (§4.1, §6)
    pub input_ring_size: u64,
    pub output_ring_size: u64,
    pub wait_strategy: WaitStrategyKind,

    // Batched persistence consumer (§4.5)
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
    pub queue_capacity: usize,
    pub shutdown_timeout_ms: u64,

    // Durable storage
    pub db_url: String,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout_ms: u64,

    // Logging
    pub log_dir: String,
    pub log_file: String,
    pub log_rotation: LogRotation,
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// defaults fixed by §6, then validate it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            input_ring_size: env_u64("RINGMATCH_INPUT_RING_SIZE", 1 << 20),
            output_ring_size: env_u64("RINGMATCH_OUTPUT_RING_SIZE", 1 << 20),
            wait_strategy: WaitStrategyKind::parse(
                &env::var("RINGMATCH_WAIT_STRATEGY").unwrap_or_else(|_| "yielding".to_string()),
            )?,
            batch_size: env_usize("RINGMATCH_BATCH_SIZE", 1000),
            batch_timeout_ms: env_u64("RINGMATCH_BATCH_TIMEOUT_MS", 100),
            queue_capacity: env_usize("RINGMATCH_QUEUE_CAPACITY", 100_000),
            shutdown_timeout_ms: env_u64("RINGMATCH_SHUTDOWN_TIMEOUT_MS", 5_000),
            db_url: env::var("RINGMATCH_DB_URL")
                .unwrap_or_else(|_| "postgres://localhost/ringmatch".to_string()),
            db_username: env::var("RINGMATCH_DB_USERNAME").ok(),
            db_password: env::var("RINGMATCH_DB_PASSWORD").ok(),
            db_max_connections: env_u64("RINGMATCH_DB_MAX_CONNECTIONS", 4) as u32,
            db_acquire_timeout_ms: env_u64("RINGMATCH_DB_ACQUIRE_TIMEOUT_MS", 5_000),
            log_dir: env::var("RINGMATCH_LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_file: env::var("RINGMATCH_LOG_FILE").unwrap_or_else(|_| "ringmatch.log".to_string()),
            log_rotation: match env::var("RINGMATCH_LOG_ROTATION").as_deref() {
                Ok("hourly") => LogRotation::Hourly,
                Ok("daily") => LogRotation::Daily,
                _ => LogRotation::Never,
            },
            log_level: env::var("RINGMATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("RINGMATCH_LOG_JSON").map(|v| v == "1" || v == "true").unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("input_ring_size", self.input_ring_size),
            ("output_ring_size", self.output_ring_size),
        ] {
            if !value.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo { field, value });
            }
        }
        if self.batch_size == 0 {
            return Err(ConfigError::MustBePositive { field: "batch_size" });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::MustBePositive { field: "queue_capacity" });
        }
        if self.db_max_connections == 0 {
            return Err(ConfigError::MustBePositive { field: "db_max_connections" });
        }
        Ok(())
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
