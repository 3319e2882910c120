//! OrderBook - BTreeMap-based price-time priority order book
//!
//! This module contains only the OrderBook data structure. The matching
//! policy lives in [`crate::matching`].

use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use crate::core_types::OrderId;
use crate::models::{Order, Side};

/// The OrderBook using BTreeMap for O(log P) operations over P distinct
/// price levels.
///
/// # Key design
/// - Asks are stored under their price directly (ascending, lowest = best).
/// - Bids are stored under `Reverse(price)` so the map's natural ascending
///   iteration visits the highest price first.
#[derive(Debug, Default)]
pub struct OrderBook {
    asks: BTreeMap<Decimal, VecDeque<Order>>,
    bids: BTreeMap<Reverse<Decimal>, VecDeque<Order>>,
    /// order_id -> (price, side), for O(1) cancel/removal lookup.
    order_index: FxHashMap<OrderId, (Decimal, Side)>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first_key_value().map(|(Reverse(p), _)| *p)
    }

    #[inline]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first_key_value().map(|(p, _)| *p)
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    /// Quantity resting at the best bid / best ask (zero when the side is
    /// empty).
    pub fn bid_qty(&self) -> Decimal {
        self.bids
            .first_key_value()
            .map(|(_, level)| level.iter().map(|o| o.remaining_quantity).sum())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn ask_qty(&self) -> Decimal {
        self.asks
            .first_key_value()
            .map(|(_, level)| level.iter().map(|o| o.remaining_quantity).sum())
            .unwrap_or(Decimal::ZERO)
    }

    /// Number of distinct price levels on each side: (bid_depth, ask_depth).
    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    #[inline]
    pub fn bids_mut(&mut self) -> &mut BTreeMap<Reverse<Decimal>, VecDeque<Order>> {
        &mut self.bids
    }

    #[inline]
    pub fn asks_mut(&mut self) -> &mut BTreeMap<Decimal, VecDeque<Order>> {
        &mut self.asks
    }

    /// Rest an order that survived matching with residual quantity. The
    /// caller is responsible for the order's `status` already being correct;
    /// this only places it in the book and updates the cancel index.
    pub fn rest_order(&mut self, order: Order) {
        self.order_index
            .insert(order.order_id, (order.price.expect("limit order has price"), order.side));

        match order.side {
            Side::Buy => {
                self.bids
                    .entry(Reverse(order.price.unwrap()))
                    .or_default()
                    .push_back(order);
            }
            Side::Sell => {
                self.asks
                    .entry(order.price.unwrap())
                    .or_default()
                    .push_back(order);
            }
        }
    }

    /// Remove an order from the index without touching the book itself.
    /// Used by the matching engine once a resting order is fully consumed
    /// and popped off its deque directly.
    pub fn forget(&mut self, order_id: OrderId) {
        self.order_index.remove(&order_id);
    }

    pub fn qty_at_price(&self, price: Decimal, side: Side) -> Decimal {
        match side {
            Side::Buy => self
                .bids
                .get(&Reverse(price))
                .map(|level| level.iter().map(|o| o.remaining_quantity).sum())
                .unwrap_or(Decimal::ZERO),
            Side::Sell => self
                .asks
                .get(&price)
                .map(|level| level.iter().map(|o| o.remaining_quantity).sum())
                .unwrap_or(Decimal::ZERO),
        }
    }

    /// Remove a resting order by ID, wherever it sits. O(1) index lookup +
    /// O(log P) tree access + O(k) scan of the price level.
    pub fn remove_order_by_id(&mut self, order_id: OrderId) -> Option<Order> {
        let (price, side) = self.order_index.remove(&order_id)?;

        match side {
            Side::Buy => {
                let key = Reverse(price);
                let level = self.bids.get_mut(&key)?;
                let pos = level.iter().position(|o| o.order_id == order_id)?;
                let order = level.remove(pos)?;
                if level.is_empty() {
                    self.bids.remove(&key);
                }
                Some(order)
            }
            Side::Sell => {
                let level = self.asks.get_mut(&price)?;
                let pos = level.iter().position(|o| o.order_id == order_id)?;
                let order = level.remove(pos)?;
                if level.is_empty() {
                    self.asks.remove(&price);
                }
                Some(order)
            }
        }
    }

    /// Every order currently resting on the bid side, in priority order,
    /// price level by price level.
    pub fn bid_orders(&self) -> impl Iterator<Item = &Order> {
        self.bids.values().flat_map(|level| level.iter())
    }

    /// Every order currently resting on the ask side, in priority order.
    pub fn ask_orders(&self) -> impl Iterator<Item = &Order> {
        self.asks.values().flat_map(|level| level.iter())
    }

    /// Market depth snapshot: top `limit` price levels per side with
    /// aggregate resting quantity.
    pub fn depth_snapshot(&self, limit: usize) -> DepthSnapshot {
        let bids = self
            .bids
            .iter()
            .take(limit)
            .map(|(Reverse(price), level)| (*price, level.iter().map(|o| o.remaining_quantity).sum()))
            .collect();

        let asks = self
            .asks
            .iter()
            .take(limit)
            .map(|(price, level)| (*price, level.iter().map(|o| o.remaining_quantity).sum()))
            .collect();

        DepthSnapshot { bids, asks }
    }
}

#[derive(Debug, Clone)]
pub struct DepthSnapshot {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}
