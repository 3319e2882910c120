//! Batched persistence consumer (§4.5): drains the output ring into two
//! logical batches and commits them transactionally when either bound is
//! hit. Runs on its own OS thread with a dedicated single-threaded Tokio
//! runtime, so the synchronous ring-buffer consume loop can drive an async
//! `sqlx` commit without pulling the business-logic processor into async
//! machinery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::models::{Event, EventPayload};
use crate::ring_buffer::{RingBuffer, WaitStrategy};

use super::store::{OrderRow, PersistenceStore, TradeRow};

pub struct BatchParams {
    pub batch_size: usize,
    pub batch_timeout: Duration,
}

impl BatchParams {
    pub fn new(batch_size: usize, batch_timeout_ms: u64) -> Self {
        Self {
            batch_size,
            batch_timeout: Duration::from_millis(batch_timeout_ms),
        }
    }
}

/// Accumulates events into order/trade batches and flushes them, ignoring
/// `MarketDataUpdated` per §4.5.
struct PendingBatch {
    orders: Vec<OrderRow>,
    trades: Vec<TradeRow>,
    opened_at: Option<Instant>,
}

impl PendingBatch {
    fn new() -> Self {
        Self {
            orders: Vec::new(),
            trades: Vec::new(),
            opened_at: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.trades.is_empty()
    }

    fn len(&self) -> usize {
        self.orders.len() + self.trades.len()
    }

    fn absorb(&mut self, event: &Event) {
        if self.opened_at.is_none() {
            self.opened_at = Some(Instant::now());
        }
        match &event.payload {
            EventPayload::OrderPlaced(order) => self.orders.push(OrderRow::from(order)),
            EventPayload::TradeExecuted(trade) => self.trades.push(TradeRow::from(trade)),
            EventPayload::MarketDataUpdated(_) => {}
        }
    }

    fn take(&mut self) -> (Vec<OrderRow>, Vec<TradeRow>) {
        self.opened_at = None;
        (std::mem::take(&mut self.orders), std::mem::take(&mut self.trades))
    }
}

/// Runs the batching loop against `ring` on `consumer_id` until cooperative
/// shutdown, then drains and commits whatever remains (§4.5 "on shutdown").
///
/// Blocking: this function does not return until `running` is false and the
/// final partial batch has been committed (or abandoned after a logged
/// failure). Intended to be the body of a dedicated consumer thread.
pub fn run<S: PersistenceStore>(
    ring: Arc<RingBuffer<Event>>,
    consumer_id: usize,
    wait: Arc<dyn WaitStrategy>,
    running: Arc<AtomicBool>,
    store: S,
    params: BatchParams,
) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build persistence consumer runtime");

    rt.block_on(async move {
        let mut batch = PendingBatch::new();
        let mut attempt = 0u64;

        loop {
            match ring.try_consume(consumer_id) {
                Some((seq, event)) => {
                    attempt = 0;
                    batch.absorb(&event);
                    if batch.len() >= params.batch_size {
                        flush(&store, &mut batch, seq).await;
                    }
                }
                None => {
                    let timed_out = batch
                        .opened_at
                        .is_some_and(|opened| opened.elapsed() >= params.batch_timeout);
                    if timed_out {
                        flush(&store, &mut batch, ring.consumer_sequence(consumer_id)).await;
                    }
                    if !running.load(Ordering::Acquire) {
                        // Drain whatever arrived between the flag flip and now.
                        while let Some((seq, event)) = ring.try_consume(consumer_id) {
                            batch.absorb(&event);
                            if batch.len() >= params.batch_size {
                                flush(&store, &mut batch, seq).await;
                            }
                        }
                        if !batch.is_empty() {
                            flush(&store, &mut batch, ring.consumer_sequence(consumer_id)).await;
                        }
                        return;
                    }
                    wait.wait(attempt);
                    attempt += 1;
                }
            }
        }
    });
}

async fn flush<S: PersistenceStore>(store: &S, batch: &mut PendingBatch, up_to_seq: u64) {
    if batch.is_empty() {
        return;
    }
    let (orders, trades) = batch.take();
    let batch_size = orders.len() + trades.len();
    match store.commit_batch(&orders, &trades).await {
        Ok(()) => {
            info!(orders = orders.len(), trades = trades.len(), up_to_seq, "persistence batch committed");
        }
        Err(err) => {
            // Events in a failed batch are lost for this run; the in-memory
            // journal remains authoritative (§4.5 failure semantics).
            warn!(batch_size, error = %err, "persistence batch commit failed, events dropped for this run");
        }
    }
}
