//! Durable storage row shapes (§6) and the `PersistenceStore` backends that
//! commit them.
//!
//! Two backends exist: [`PgStore`], a bounded `sqlx::PgPool` issuing the two
//! multi-row statements required by §4.5, and [`InMemoryStore`], a mock sink
//! used by integration tests so the pipeline can be exercised end to end
//! without a live database (per SPEC_FULL's test-tooling section).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::QueryBuilder;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::core_types::{OrderId, TradeId, UserId};
use crate::errors::PersistenceError;
use crate::models::{Order, OrderStatus, OrderType, Side, Trade};

/// One row of the `orders` table (§6), upserted keyed by `order_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: String,
    pub order_type: &'static str,
    pub side: &'static str,
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub remaining_qty: Decimal,
    pub status: &'static str,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id,
            user_id: order.user_id.clone(),
            symbol: order.symbol.clone(),
            order_type: order_type_str(order.order_type),
            side: side_str(order.side),
            price: order.price,
            quantity: order.quantity,
            remaining_qty: order.remaining_quantity,
            status: status_str(order.status),
            created_at: order.timestamp,
            updated_at: order.timestamp,
        }
    }
}

/// One row of the `trades` table (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub trade_id: TradeId,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub executed_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Trade> for TradeRow {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.trade_id,
            symbol: trade.symbol.clone(),
            price: trade.price,
            quantity: trade.quantity,
            buyer_id: trade.buy_user_id.clone(),
            seller_id: trade.sell_user_id.clone(),
            executed_at: trade.timestamp,
        }
    }
}

fn order_type_str(t: OrderType) -> &'static str {
    match t {
        OrderType::Market => "MARKET",
        OrderType::Limit => "LIMIT",
        OrderType::Stop => "STOP",
        OrderType::StopLimit => "STOP_LIMIT",
    }
}

fn side_str(s: Side) -> &'static str {
    match s {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

fn status_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::Pending => "PENDING",
        OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
        OrderStatus::Filled => "FILLED",
        OrderStatus::Cancelled => "CANCELLED",
        OrderStatus::Rejected => "REJECTED",
    }
}

/// A durable sink for the batched persistence consumer. Implementations
/// commit both row sets in a single transaction — §4.5 requires the pair
/// to land atomically, never orders without their trades or vice versa.
pub trait PersistenceStore: Send + Sync + 'static {
    fn commit_batch(
        &self,
        orders: &[OrderRow],
        trades: &[TradeRow],
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;
}

/// Bounded Postgres-backed store. `max_connections` default 4 suffices for
/// a single batcher (§4.5).
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(PersistenceError::ConnectFailed)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl PersistenceStore for PgStore {
    async fn commit_batch(&self, orders: &[OrderRow], trades: &[TradeRow]) -> Result<(), PersistenceError> {
        let batch_size = orders.len() + trades.len();
        let mut tx = self.pool.begin().await.map_err(|source| PersistenceError::CommitFailed { batch_size, source })?;

        if !orders.is_empty() {
            let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
                "INSERT INTO orders (order_id, user_id, symbol, order_type, side, price, quantity, remaining_qty, status, created_at, updated_at) ",
            );
            qb.push_values(orders, |mut b, row| {
                b.push_bind(row.order_id as i64)
                    .push_bind(&row.user_id)
                    .push_bind(&row.symbol)
                    .push_bind(row.order_type)
                    .push_bind(row.side)
                    .push_bind(row.price)
                    .push_bind(row.quantity)
                    .push_bind(row.remaining_qty)
                    .push_bind(row.status)
                    .push_bind(row.created_at)
                    .push_bind(row.updated_at);
            });
            qb.push(
                " ON CONFLICT (order_id) DO UPDATE SET remaining_qty = EXCLUDED.remaining_qty, \
                  status = EXCLUDED.status, updated_at = EXCLUDED.updated_at",
            );
            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(|source| PersistenceError::CommitFailed { batch_size, source })?;
        }

        if !trades.is_empty() {
            let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
                "INSERT INTO trades (trade_id, symbol, price, quantity, buyer_id, seller_id, executed_at) ",
            );
            qb.push_values(trades, |mut b, row| {
                b.push_bind(row.trade_id as i64)
                    .push_bind(&row.symbol)
                    .push_bind(row.price)
                    .push_bind(row.quantity)
                    .push_bind(&row.buyer_id)
                    .push_bind(&row.seller_id)
                    .push_bind(row.executed_at);
            });
            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(|source| PersistenceError::CommitFailed { batch_size, source })?;
        }

        tx.commit().await.map_err(|source| PersistenceError::CommitFailed { batch_size, source })?;
        Ok(())
    }
}

/// In-memory stand-in for a live database, used by integration tests (S6)
/// and anywhere CI runs without Postgres. Never fails a commit.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<InMemoryTables>>,
}

#[derive(Debug, Default)]
struct InMemoryTables {
    orders: Vec<OrderRow>,
    trades: Vec<TradeRow>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct `order_id`s committed so far (post-upsert).
    pub fn order_count(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }

    pub fn trade_count(&self) -> usize {
        self.inner.lock().unwrap().trades.len()
    }

    pub fn orders(&self) -> Vec<OrderRow> {
        self.inner.lock().unwrap().orders.clone()
    }

    pub fn trades(&self) -> Vec<TradeRow> {
        self.inner.lock().unwrap().trades.clone()
    }
}

impl PersistenceStore for InMemoryStore {
    async fn commit_batch(&self, orders: &[OrderRow], trades: &[TradeRow]) -> Result<(), PersistenceError> {
        let mut tables = self.inner.lock().unwrap();
        for row in orders {
            if let Some(existing) = tables.orders.iter_mut().find(|o| o.order_id == row.order_id) {
                *existing = row.clone();
            } else {
                tables.orders.push(row.clone());
            }
        }
        tables.trades.extend_from_slice(trades);
        Ok(())
    }
}
