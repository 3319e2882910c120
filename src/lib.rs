//! ringmatch — a disruptor-pattern limit order matching exchange.
//!
//! A lock-free single-producer ring buffer feeds a single-threaded
//! business-logic processor that maintains per-symbol order books,
//! generates trades via price-time priority, journals every state-changing
//! event, and forwards events through a second ring buffer to a set of
//! parallel output consumers (market data, audit, notification, durable
//! persistence).
//!
//! # Modules
//!
//! - [`ring_buffer`] — lock-free SPSC/SPMC sequence-coordinated transport
//! - [`models`] — markets, orders, trades, the event journal payload
//! - [`orderbook`] — per-symbol price-time-priority book
//! - [`matching`] — market/limit matching policies, trade construction
//! - [`processor`] — the single-threaded business-logic orchestrator
//! - [`persistence`] — batched, transactional durable-storage consumer
//! - [`pipeline`] — wires the above into one runnable process
//! - [`config`] — typed, environment-driven configuration
//! - [`errors`] — the domain error taxonomy plus infrastructure errors
//! - [`logging`] — `tracing` subscriber setup

pub mod config;
pub mod core_types;
pub mod errors;
pub mod logging;
pub mod matching;
pub mod models;
pub mod orderbook;
pub mod persistence;
pub mod pipeline;
pub mod processor;
pub mod ring_buffer;

pub use config::Config;
pub use core_types::{OrderId, SeqNum, Symbol, TradeId, UserId};
pub use errors::{ConfigError, PersistenceError, RejectReason, RingError};
pub use models::{Event, EventPayload, Market, MarketStatus, Order, OrderStatus, OrderType, Side, TimeInForce, Trade};
pub use pipeline::{Pipeline, PipelineProcessor, Query};
pub use processor::{OrderSubmission, Processor};
