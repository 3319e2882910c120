//! Domain data model: markets, orders, trades and the event journal payload.
//!
//! Every amount that can affect conservation is a [`Decimal`] — never
//! `f64` — so no trade, tick check, or turnover accumulation can silently
//! lose precision.

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{OrderId, SeqNum, Symbol, TradeId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    /// Reserved; not realized by the matching engine.
    Stop,
    /// Reserved; not realized by the matching engine.
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-till-cancelled: unfilled residual rests in the book.
    Gtc,
    /// Immediate-or-cancel: unfilled residual is discarded, never rests.
    Ioc,
    /// Fill-or-kill: in this implementation treated identically to `Ioc`.
    /// A true pre-scan all-or-nothing abort is not implemented.
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Closed,
    Open,
    Suspended,
    PreOpen,
    PostClose,
}

/// Immutable order record. Every mutation (a fill) produces a new value;
/// nothing holds a `&mut Order` across a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub order_type: OrderType,
    pub side: Side,
    /// Absent for `Market` orders.
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub status: OrderStatus,
    pub time_in_force: TimeInForce,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn is_filled(&self) -> bool {
        self.remaining_quantity.is_zero()
    }

    pub fn filled_quantity(&self) -> Decimal {
        self.quantity - self.remaining_quantity
    }

    /// Whether this order is still eligible to rest in the book: LIMIT,
    /// residual remaining, and not an IOC/FOK that must discard its residual.
    pub fn can_rest(&self) -> bool {
        matches!(self.order_type, OrderType::Limit)
            && !self.remaining_quantity.is_zero()
            && matches!(self.time_in_force, TimeInForce::Gtc)
    }
}

/// Immutable trade record produced by a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buy_user_id: UserId,
    pub sell_user_id: UserId,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Immutable per-symbol market snapshot. A new value is produced on every
/// state transition; `last_update_time` is monotone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub symbol: Symbol,
    pub name: String,
    pub status: MarketStatus,
    pub last_price: Option<Decimal>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub bid_qty: Decimal,
    pub ask_qty: Decimal,
    pub daily_high: Option<Decimal>,
    pub daily_low: Option<Decimal>,
    pub daily_volume: Decimal,
    pub daily_turnover: Decimal,
    pub last_update_time: DateTime<Utc>,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub tick_size: Decimal,
    pub min_order_size: Decimal,
}

impl Market {
    pub fn new_seed(
        symbol: impl Into<String>,
        name: impl Into<String>,
        tick_size: Decimal,
        min_order_size: Decimal,
        open_time: NaiveTime,
        close_time: NaiveTime,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            status: MarketStatus::Open,
            last_price: None,
            best_bid: None,
            best_ask: None,
            bid_qty: Decimal::ZERO,
            ask_qty: Decimal::ZERO,
            daily_high: None,
            daily_low: None,
            daily_volume: Decimal::ZERO,
            daily_turnover: Decimal::ZERO,
            last_update_time: now,
            open_time,
            close_time,
            tick_size,
            min_order_size,
        }
    }

    /// A market only accepts orders while `status == Open` *and* the
    /// current time-of-day falls within `[open_time, close_time]`.
    /// `Suspended` overrides the clock unconditionally, checked fresh on
    /// every order rather than cached at the last status transition.
    pub fn is_accepting_orders(&self, now: DateTime<Utc>) -> bool {
        if self.status != MarketStatus::Open {
            return false;
        }
        let tod = now.time();
        if self.open_time <= self.close_time {
            tod >= self.open_time && tod <= self.close_time
        } else {
            // Window wraps past midnight.
            tod >= self.open_time || tod <= self.close_time
        }
    }

    /// Fold one trade's effect into the market snapshot, producing the next
    /// immutable value. Called by the processor after a match.
    pub fn apply_trade(
        &self,
        trade: &Trade,
        best_bid: Option<Decimal>,
        best_ask: Option<Decimal>,
        bid_qty: Decimal,
        ask_qty: Decimal,
        now: DateTime<Utc>,
    ) -> Market {
        let daily_high = Some(self.daily_high.map_or(trade.price, |h| h.max(trade.price)));
        let daily_low = Some(self.daily_low.map_or(trade.price, |l| l.min(trade.price)));
        Market {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            status: self.status,
            last_price: Some(trade.price),
            best_bid,
            best_ask,
            bid_qty,
            ask_qty,
            daily_high,
            daily_low,
            daily_volume: self.daily_volume + trade.quantity,
            daily_turnover: self.daily_turnover + trade.price * trade.quantity,
            last_update_time: now,
            open_time: self.open_time,
            close_time: self.close_time,
            tick_size: self.tick_size,
            min_order_size: self.min_order_size,
        }
    }
}

/// A journal entry. Carries a contiguous, strictly increasing `sequence_id`
/// assigned by the business-logic processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub sequence_id: SeqNum,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "ORDER_PLACED")]
    OrderPlaced(Order),
    #[serde(rename = "TRADE_EXECUTED")]
    TradeExecuted(Trade),
    #[serde(rename = "MARKET_DATA_UPDATED")]
    MarketDataUpdated(Market),
}
