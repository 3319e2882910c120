//! Matching engine: market/limit matching policies and trade construction.
//!
//! Walks the opposite side of the book from best price outward, generating
//! trades at the *resting* order's price, until the incoming order is
//! exhausted, the book side empties, or (for limit orders) the crossing
//! condition no longer holds.

use chrono::{DateTime, Utc};

use crate::core_types::TradeId;
use crate::models::{Order, OrderStatus, OrderType, Side, TimeInForce, Trade};
use crate::orderbook::OrderBook;

/// Result of matching one incoming order against a book.
pub struct MatchResult {
    /// The incoming order, updated with its final `remaining_quantity` and
    /// `status` after matching (not yet rested — the caller does that).
    pub order: Order,
    /// Trades generated, in match order.
    pub trades: Vec<Trade>,
}

/// Match `order` against `book`, allocating trade IDs from `next_trade_id`.
/// Does not rest the order's residual; the caller (the business-logic
/// processor) decides whether to rest based on `order.time_in_force`.
pub fn match_order(
    mut order: Order,
    book: &mut OrderBook,
    mut next_trade_id: impl FnMut() -> TradeId,
    now: DateTime<Utc>,
) -> MatchResult {
    let mut trades = Vec::new();

    match order.order_type {
        OrderType::Market => match_market(&mut order, book, &mut next_trade_id, now, &mut trades),
        OrderType::Limit => match_limit(&mut order, book, &mut next_trade_id, now, &mut trades),
        OrderType::Stop | OrderType::StopLimit => {
            // Reserved; never constructed by the processor (validation rejects first).
        }
    }

    order.status = if order.remaining_quantity.is_zero() {
        OrderStatus::Filled
    } else if order.filled_quantity().is_zero() {
        OrderStatus::Pending
    } else {
        OrderStatus::PartiallyFilled
    };

    MatchResult { order, trades }
}

fn match_market(
    order: &mut Order,
    book: &mut OrderBook,
    next_trade_id: &mut impl FnMut() -> TradeId,
    now: DateTime<Utc>,
    trades: &mut Vec<Trade>,
) {
    while !order.remaining_quantity.is_zero() {
        let Some(resting_price) = opposite_best(order.side, book) else {
            break;
        };
        consume_at_price(order, book, resting_price, next_trade_id, now, trades);
    }
}

fn match_limit(
    order: &mut Order,
    book: &mut OrderBook,
    next_trade_id: &mut impl FnMut() -> TradeId,
    now: DateTime<Utc>,
    trades: &mut Vec<Trade>,
) {
    let limit_price = order.price.expect("limit order carries a price");

    while !order.remaining_quantity.is_zero() {
        let Some(resting_price) = opposite_best(order.side, book) else {
            break;
        };
        let crosses = match order.side {
            Side::Buy => resting_price <= limit_price,
            Side::Sell => resting_price >= limit_price,
        };
        if !crosses {
            break;
        }
        consume_at_price(order, book, resting_price, next_trade_id, now, trades);
    }

    if order.remaining_quantity.is_zero() {
        return;
    }
    if matches!(order.time_in_force, TimeInForce::Ioc | TimeInForce::Fok) {
        // Residual is discarded by the caller (never rested). FOK is treated
        // identically to IOC in this implementation.
    }
}

fn opposite_best(side: Side, book: &OrderBook) -> Option<rust_decimal::Decimal> {
    match side {
        Side::Buy => book.best_ask(),
        Side::Sell => book.best_bid(),
    }
}

/// Consume resting liquidity at `resting_price` against `order`, generating
/// trades for as much of the head-of-queue FIFO as the incoming order needs.
fn consume_at_price(
    order: &mut Order,
    book: &mut OrderBook,
    resting_price: rust_decimal::Decimal,
    next_trade_id: &mut impl FnMut() -> TradeId,
    now: DateTime<Utc>,
    trades: &mut Vec<Trade>,
) {
    let opposite_side = order.side.opposite();
    let level = match opposite_side {
        Side::Buy => book.bids_mut().get_mut(&std::cmp::Reverse(resting_price)),
        Side::Sell => book.asks_mut().get_mut(&resting_price),
    };
    let Some(level) = level else { return };

    while !order.remaining_quantity.is_zero() {
        let Some(resting) = level.front_mut() else { break };
        let fill_qty = order.remaining_quantity.min(resting.remaining_quantity);

        resting.remaining_quantity -= fill_qty;
        order.remaining_quantity -= fill_qty;

        let (buy_order, sell_order) = match order.side {
            Side::Buy => (&*order, &*resting),
            Side::Sell => (&*resting, &*order),
        };
        trades.push(Trade {
            trade_id: next_trade_id(),
            symbol: order.symbol.clone(),
            buy_order_id: buy_order.order_id,
            sell_order_id: sell_order.order_id,
            buy_user_id: buy_order.user_id.clone(),
            sell_user_id: sell_order.user_id.clone(),
            price: resting_price,
            quantity: fill_qty,
            timestamp: now,
        });

        if resting.remaining_quantity.is_zero() {
            resting.status = OrderStatus::Filled;
            let filled_id = resting.order_id;
            level.pop_front();
            book.forget(filled_id);
        } else {
            resting.status = OrderStatus::PartiallyFilled;
            break;
        }
    }

    if level.is_empty() {
        match opposite_side {
            Side::Buy => {
                book.bids_mut().remove(&std::cmp::Reverse(resting_price));
            }
            Side::Sell => {
                book.asks_mut().remove(&resting_price);
            }
        }
    }
}
