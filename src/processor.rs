//! Business-logic processor: the single-threaded owner of every market,
//! order book, active order, trade, and the event journal.
//!
//! Mirrors the teacher's single-threaded-core pattern (one thread, no
//! locks, `FxHashMap` state) but generalized from balance bookkeeping to
//! order matching. The processor is generic over its event listener so the
//! hot path dispatches statically rather than through a trait object —
//! in production there is exactly one listener, the output-ring publish.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

use crate::core_types::{OrderId, SeqNum, Symbol, TradeId};
use crate::errors::RejectReason;
use crate::matching::match_order;
use crate::models::{Event, EventPayload, Market, Order, OrderStatus, OrderType, Trade};
use crate::orderbook::OrderBook;

/// Fields carried by an inbound order submission, before an `order_id` or
/// `timestamp` has been assigned.
#[derive(Debug, Clone)]
pub struct OrderSubmission {
    pub user_id: crate::core_types::UserId,
    pub symbol: Symbol,
    pub order_type: OrderType,
    pub side: crate::models::Side,
    pub price: Option<rust_decimal::Decimal>,
    pub quantity: rust_decimal::Decimal,
    pub time_in_force: crate::models::TimeInForce,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessorStats {
    pub orders_processed: u64,
    pub orders_accepted: u64,
    pub orders_rejected: u64,
    pub trades_executed: u64,
}

pub struct Processor<L> {
    markets: FxHashMap<Symbol, Market>,
    books: FxHashMap<Symbol, OrderBook>,
    trades: Vec<Trade>,
    journal: Vec<Event>,
    order_counter: OrderId,
    trade_counter: TradeId,
    seq_counter: SeqNum,
    stats: ProcessorStats,
    listener: L,
}

impl<L> Processor<L>
where
    L: FnMut(&Event),
{
    pub fn new(markets: impl IntoIterator<Item = Market>, listener: L) -> Self {
        let mut books = FxHashMap::default();
        let mut markets_map = FxHashMap::default();
        for market in markets {
            books.insert(market.symbol.clone(), OrderBook::new());
            markets_map.insert(market.symbol.clone(), market);
        }
        Self {
            markets: markets_map,
            books,
            trades: Vec::new(),
            journal: Vec::new(),
            order_counter: 0,
            trade_counter: 0,
            seq_counter: 0,
            stats: ProcessorStats::default(),
            listener,
        }
    }

    /// Run the six-step transaction (§4.4) for one inbound order.
    ///
    /// On success, the order has been matched, the book and market updated,
    /// and every produced event journaled and handed to the listener, in
    /// the order `OrderPlaced`, `TradeExecuted*`, `MarketDataUpdated?`.
    /// On rejection, nothing is journaled and the order counter does not
    /// advance.
    pub fn process_order(&mut self, submission: OrderSubmission, now: DateTime<Utc>) -> Result<OrderId, RejectReason> {
        self.stats.orders_processed += 1;

        // Step 1: market lookup.
        let market = self
            .markets
            .get(&submission.symbol)
            .ok_or(RejectReason::UnknownMarket)?;
        if !market.is_accepting_orders(now) {
            self.stats.orders_rejected += 1;
            return Err(RejectReason::MarketClosed);
        }

        // Step 2: validation.
        if submission.quantity < market.min_order_size {
            self.stats.orders_rejected += 1;
            return Err(RejectReason::InvalidQuantity);
        }
        match submission.order_type {
            OrderType::Limit => {
                let price = submission.price.ok_or(RejectReason::InvalidPrice)?;
                let tick = market.tick_size;
                if price <= rust_decimal::Decimal::ZERO || !(price % tick).is_zero() {
                    self.stats.orders_rejected += 1;
                    return Err(RejectReason::InvalidPrice);
                }
            }
            OrderType::Market => {
                if submission.price.is_some_and(|p| !p.is_zero()) {
                    self.stats.orders_rejected += 1;
                    return Err(RejectReason::InvalidPrice);
                }
            }
            OrderType::Stop | OrderType::StopLimit => {
                // Reserved order types are never realized by this core.
                self.stats.orders_rejected += 1;
                return Err(RejectReason::InvalidPrice);
            }
        }

        // Step 3: assign IDs.
        self.order_counter += 1;
        let order_id = self.order_counter;
        let order = Order {
            order_id,
            user_id: submission.user_id,
            symbol: submission.symbol.clone(),
            order_type: submission.order_type,
            side: submission.side,
            price: submission.price,
            quantity: submission.quantity,
            remaining_quantity: submission.quantity,
            status: OrderStatus::Pending,
            time_in_force: submission.time_in_force,
            timestamp: now,
        };

        // Step 4: match.
        let book = self
            .books
            .get_mut(&submission.symbol)
            .expect("book exists for every seeded market");
        let next_trade_id = {
            let counter = &mut self.trade_counter;
            move || {
                *counter += 1;
                *counter
            }
        };
        let result = match_order(order, book, next_trade_id, now);
        let mut final_order = result.order;
        let trades = result.trades;

        if final_order.can_rest() {
            book.rest_order(final_order.clone());
        }

        // Step 5: state update.
        let market_updated = self.apply_trades_to_market(&submission.symbol, &trades, now);

        // Step 6: journal and publish, in the mandated order.
        self.journal_event(EventPayload::OrderPlaced(final_order.clone()), now);
        for trade in &trades {
            self.trades.push(trade.clone());
            self.journal_event(EventPayload::TradeExecuted(trade.clone()), now);
        }
        if let Some(market) = market_updated {
            self.journal_event(EventPayload::MarketDataUpdated(market), now);
        }

        self.stats.orders_accepted += 1;
        self.stats.trades_executed += trades.len() as u64;
        Ok(order_id)
    }

    fn apply_trades_to_market(&mut self, symbol: &str, trades: &[Trade], now: DateTime<Utc>) -> Option<Market> {
        let last_trade = trades.last()?;
        let book = self.books.get(symbol).expect("book exists");
        let (best_bid, best_ask, bid_qty, ask_qty) = (book.best_bid(), book.best_ask(), book.bid_qty(), book.ask_qty());
        let market = self.markets.get(symbol).expect("market exists");
        let updated = market.apply_trade(last_trade, best_bid, best_ask, bid_qty, ask_qty, now);
        // Fold every trade's high/low/volume/turnover, not just the last.
        let mut updated = updated;
        for trade in &trades[..trades.len() - 1] {
            updated.daily_high = Some(updated.daily_high.map_or(trade.price, |h| h.max(trade.price)));
            updated.daily_low = Some(updated.daily_low.map_or(trade.price, |l| l.min(trade.price)));
            updated.daily_volume += trade.quantity;
            updated.daily_turnover += trade.price * trade.quantity;
        }
        self.markets.insert(symbol.to_string(), updated.clone());
        Some(updated)
    }

    fn journal_event(&mut self, payload: EventPayload, now: DateTime<Utc>) {
        self.seq_counter += 1;
        let event = Event {
            sequence_id: self.seq_counter,
            timestamp: now,
            payload,
        };
        (self.listener)(&event);
        self.journal.push(event);
    }

    // ---- read-only accessors ----

    pub fn market(&self, symbol: &str) -> Option<&Market> {
        self.markets.get(symbol)
    }

    pub fn order_book(&self, symbol: &str) -> Option<&OrderBook> {
        self.books.get(symbol)
    }

    /// Every order currently resting in any book (PENDING or
    /// PARTIALLY_FILLED, eligible to rest).
    pub fn active_orders(&self) -> Vec<&Order> {
        self.books
            .values()
            .flat_map(|book| book.bid_orders().chain(book.ask_orders()))
            .collect()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn event_journal(&self) -> &[Event] {
        &self.journal
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    pub fn order_counter(&self) -> OrderId {
        self.order_counter
    }

    pub fn trade_counter(&self) -> TradeId {
        self.trade_counter
    }

    pub fn sequence_counter(&self) -> SeqNum {
        self.seq_counter
    }
}
