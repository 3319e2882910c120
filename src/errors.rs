//! Error taxonomy.
//!
//! Domain rejections (§7) are a closed, `thiserror`-derived enum returned
//! synchronously to the caller; they are cheap to construct and never box
//! a trait object on the hot path. Infrastructure failures (config, DB
//! connect/pool) are surfaced as `anyhow::Error` at the process-assembly
//! boundary, since those call sites want causal chains in logs, not a
//! closed match.

use thiserror::Error;

/// Exhaustive reject reasons the business-logic processor can return from
/// its synchronous validation step (§4.4 steps 1-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("unknown market")]
    UnknownMarket,
    #[error("market is not open for trading")]
    MarketClosed,
    #[error("invalid price")]
    InvalidPrice,
    #[error("invalid quantity")]
    InvalidQuantity,
}

/// Errors surfaced by the ring-buffer transport to a caller that cannot
/// block (a pre-check before submission, per §4.1's failure semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("ring buffer is full")]
    RingFull,
}

/// Errors logged (never surfaced to the processor) by the batched
/// persistence consumer.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("commit failed for a batch of {batch_size} events: {source}")]
    CommitFailed {
        batch_size: usize,
        #[source]
        source: sqlx::Error,
    },
    #[error("persistence queue is full, event dropped")]
    QueueFull,
    #[error("failed to connect to durable storage: {0}")]
    ConnectFailed(#[source] sqlx::Error),
}

/// Startup configuration errors — fatal, caught before any thread starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be a power of two, got {value}")]
    NotPowerOfTwo { field: &'static str, value: u64 },
    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },
    #[error("unrecognized wait_strategy {0:?}, expected busy, yielding, or parking")]
    UnknownWaitStrategy(String),
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),
}
