//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// User identifier, as supplied by the ingress collaborator.
///
/// Kept as an opaque string rather than an interned integer: this core has
/// no account/auth subsystem to assign and cache numeric user IDs, and the
/// external order submission contract carries `user_id` as a string.
pub type UserId = String;

/// Market/trading-pair identifier, e.g. "BTC-USDT".
pub type Symbol = String;

/// Order ID - assigned by the business-logic processor, monotonically,
/// only after an order passes validation.
pub type OrderId = u64;

/// Trade ID - assigned by the business-logic processor, monotonically.
pub type TradeId = u64;

/// Sequence number for the event journal. Strictly increasing and contiguous.
pub type SeqNum = u64;
