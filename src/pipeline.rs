//! Wires the ring-buffer transport, the business-logic processor and the
//! parallel output consumers into a single runnable pipeline (§2 data flow:
//! producer → input ring → processor → listener → output ring → {market
//! data, audit, notification, persistence}).

use std::sync::mpsc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core_types::SeqNum;
use crate::errors::RingError;
use crate::models::{Event, EventPayload, Market};
use crate::persistence::{self, BatchParams, PersistenceStore};
use crate::processor::{OrderSubmission, Processor};
use crate::ring_buffer::{RingBuffer, WaitStrategy, build_wait_strategy};

/// Event listener bound into the processor spawned by [`Pipeline::start`]:
/// publishes each journaled event onto the output ring. Boxed so the
/// concrete `Processor` type running inside the pipeline is nameable (see
/// [`PipelineProcessor`]) — `Box<dyn FnMut>` itself implements `FnMut`, so
/// this costs one virtual call per event, not one per accessor.
pub type EventListener = Box<dyn FnMut(&Event) + Send>;

/// The concrete `Processor` instantiation that runs inside the pipeline's
/// processor thread. Named so [`Pipeline::query`] can hand a query closure
/// a reference to it.
pub type PipelineProcessor = Processor<EventListener>;

/// A read-only query submitted to the processor thread (§4.4 accessors,
/// §9 "Global state"). Queries are queued on a dedicated channel and run
/// between order submissions on the same single thread that owns all
/// processor state, so a query never races a mutation and never needs its
/// own synchronization beyond the channel handoff.
pub type Query = Box<dyn FnOnce(&PipelineProcessor) + Send>;

/// Index of each sibling output consumer on the shared output ring. All
/// four share the processor's publish cursor as their upstream barrier
/// (§4.1 dependency topology).
const CONSUMER_MARKET_DATA: usize = 0;
const CONSUMER_AUDIT: usize = 1;
const CONSUMER_NOTIFICATION: usize = 2;
const CONSUMER_PERSISTENCE: usize = 3;
const OUTPUT_CONSUMER_COUNT: usize = 4;

/// A running pipeline: input ring, processor thread, output ring and its
/// four parallel consumer threads. Dropping or calling [`Pipeline::shutdown`]
/// drives cooperative shutdown per §5.
pub struct Pipeline {
    input_ring: Arc<RingBuffer<OrderSubmission>>,
    input_wait: Arc<dyn WaitStrategy>,
    running: Arc<AtomicBool>,
    query_tx: mpsc::Sender<Query>,
    processor_thread: Option<JoinHandle<()>>,
    consumer_threads: Vec<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl Pipeline {
    /// Build and start the pipeline: seeds `markets`, spawns the processor
    /// thread and the four output-consumer threads, all sharing `running`.
    pub fn start<S: PersistenceStore>(config: &Config, markets: Vec<Market>, persistence_store: S) -> Self {
        let input_ring = Arc::new(RingBuffer::<OrderSubmission>::new(config.input_ring_size as usize, 1));
        let output_ring = Arc::new(RingBuffer::<Event>::new(config.output_ring_size as usize, OUTPUT_CONSUMER_COUNT));
        let input_wait = build_wait_strategy(config.wait_strategy.as_str());
        let output_wait = build_wait_strategy(config.wait_strategy.as_str());
        let running = Arc::new(AtomicBool::new(true));
        let (query_tx, query_rx) = mpsc::channel::<Query>();

        let processor_thread = {
            let input_ring = input_ring.clone();
            let output_ring = output_ring.clone();
            let input_wait = input_wait.clone();
            let output_wait = output_wait.clone();
            let running = running.clone();
            std::thread::Builder::new()
                .name("processor".into())
                .spawn(move || run_processor(input_ring, output_ring, input_wait, output_wait, running, markets, query_rx))
                .expect("failed to spawn processor thread")
        };

        let mut consumer_threads = Vec::with_capacity(OUTPUT_CONSUMER_COUNT);
        consumer_threads.push(spawn_logging_consumer(
            "market-data",
            output_ring.clone(),
            CONSUMER_MARKET_DATA,
            output_wait.clone(),
            running.clone(),
            on_market_data_event,
        ));
        consumer_threads.push(spawn_logging_consumer(
            "audit",
            output_ring.clone(),
            CONSUMER_AUDIT,
            output_wait.clone(),
            running.clone(),
            on_audit_event,
        ));
        consumer_threads.push(spawn_logging_consumer(
            "notification",
            output_ring.clone(),
            CONSUMER_NOTIFICATION,
            output_wait.clone(),
            running.clone(),
            on_notification_event,
        ));
        consumer_threads.push({
            let output_ring = output_ring.clone();
            let output_wait = output_wait.clone();
            let running = running.clone();
            let params = BatchParams::new(config.batch_size, config.batch_timeout_ms);
            std::thread::Builder::new()
                .name("persistence".into())
                .spawn(move || persistence::run(output_ring, CONSUMER_PERSISTENCE, output_wait, running, persistence_store, params))
                .expect("failed to spawn persistence consumer thread")
        });

        Self {
            input_ring,
            input_wait,
            running,
            query_tx,
            processor_thread: Some(processor_thread),
            consumer_threads,
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        }
    }

    /// Submit an order, blocking via the wait strategy if the input ring is
    /// momentarily full. Returns `None` only if shutdown begins while the
    /// call is waiting for room.
    pub fn submit_blocking(&self, submission: OrderSubmission) -> Option<SeqNum> {
        self.input_ring.publish_item(submission, &*self.input_wait, &*self.running)
    }

    /// Non-blocking submission for callers that cannot wait: pre-checks
    /// free capacity per §4.1's failure semantics and returns `RingFull`
    /// instead of blocking. Safe only when the caller is the sole producer
    /// lane (§4.1 mandates single-producer input rings).
    pub fn try_submit(&self, submission: OrderSubmission) -> Result<SeqNum, RingError> {
        if self.input_ring.remaining_capacity() == 0 {
            return Err(RingError::RingFull);
        }
        self.submit_blocking(submission).ok_or(RingError::RingFull)
    }

    pub fn utilization(&self) -> (f64, f64) {
        (self.input_ring.utilization(), 0.0)
    }

    /// Read-only external access to processor state (§4.4 accessors, §9
    /// "Global state"): `f` runs on the processor thread itself, queued
    /// behind any order submissions already ahead of it, so it observes a
    /// consistent snapshot without the processor ever handing out a
    /// reference across threads. Returns `None` if the processor thread has
    /// already exited (e.g. mid-shutdown).
    pub fn query<R: Send + 'static>(&self, f: impl FnOnce(&PipelineProcessor) -> R + Send + 'static) -> Option<R> {
        let (tx, rx) = mpsc::channel();
        let boxed: Query = Box::new(move |processor: &PipelineProcessor| {
            let _ = tx.send(f(processor));
        });
        self.query_tx.send(boxed).ok()?;
        rx.recv().ok()
    }

    /// Cooperative shutdown (§5): flip `running`, then join every thread
    /// with a bounded timeout. Exceeding the timeout is logged; remaining
    /// in-flight events for that consumer are dropped.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.processor_thread.take() {
            join_with_timeout("processor", handle, self.shutdown_timeout);
        }
        for (idx, handle) in self.consumer_threads.drain(..).enumerate() {
            join_with_timeout(&format!("output-consumer-{idx}"), handle, self.shutdown_timeout);
        }
    }
}

fn join_with_timeout(name: &str, handle: JoinHandle<()>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(thread = name, "shutdown join timed out; abandoning thread, remaining events dropped");
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    if let Err(err) = handle.join() {
        error!(thread = name, ?err, "consumer thread panicked");
    }
}

/// The processor thread body: single-consumer loop over the input ring,
/// running the six-step transaction (§4.4) for every order, publishing
/// every journaled event to the output ring via the single synchronous
/// listener. Also drains `query_rx` between orders so external read-only
/// queries (`Pipeline::query`) run on this same thread, never touching
/// processor state from anywhere else (§9 "Global state").
fn run_processor(
    input_ring: Arc<RingBuffer<OrderSubmission>>,
    output_ring: Arc<RingBuffer<Event>>,
    input_wait: Arc<dyn WaitStrategy>,
    output_wait: Arc<dyn WaitStrategy>,
    running: Arc<AtomicBool>,
    markets: Vec<Market>,
    query_rx: mpsc::Receiver<Query>,
) {
    let listener_ring = output_ring.clone();
    let listener_wait = output_wait.clone();
    let listener_running = running.clone();
    let listener: EventListener = Box::new(move |event: &Event| {
        // The output ring is the sole listener in production (§9). This
        // publish can block under backpressure just like any producer;
        // cooperative shutdown still drains what's already claimed.
        listener_ring.publish_item(event.clone(), &*listener_wait, &*listener_running);
    });
    let mut processor: PipelineProcessor = Processor::new(markets, listener);

    let mut attempt = 0u64;
    loop {
        while let Ok(query) = query_rx.try_recv() {
            query(&processor);
        }

        match input_ring.try_consume(0) {
            Some((_, submission)) => {
                attempt = 0;
                let now = Utc::now();
                match processor.process_order(submission, now) {
                    Ok(order_id) => debug!(order_id, "order processed"),
                    Err(reason) => debug!(%reason, "order rejected"),
                }
            }
            None => {
                if !running.load(Ordering::Acquire) {
                    // Drain whatever arrived between the flag flip and now
                    // before exiting, same as the ring's own shutdown drain.
                    while let Ok(query) = query_rx.try_recv() {
                        query(&processor);
                    }
                    if let Some((_, submission)) = input_ring.try_consume(0) {
                        let now = Utc::now();
                        match processor.process_order(submission, now) {
                            Ok(order_id) => debug!(order_id, "order processed"),
                            Err(reason) => debug!(%reason, "order rejected"),
                        }
                    }
                    return;
                }
                input_wait.wait(attempt);
                attempt += 1;
            }
        }
    }
}

fn spawn_logging_consumer(
    name: &'static str,
    ring: Arc<RingBuffer<Event>>,
    consumer_id: usize,
    wait: Arc<dyn WaitStrategy>,
    running: Arc<AtomicBool>,
    on_event: fn(&Event),
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            loop {
                match ring.consume_next(consumer_id, &*wait, &*running) {
                    Some((_, event)) => on_event(&event),
                    None => {
                        if !running.load(Ordering::Acquire) {
                            return;
                        }
                    }
                }
            }
        })
        .expect("failed to spawn output consumer thread")
}

/// Market-data consumer: reacts only to quote/trade-driving updates. A real
/// deployment would fan this out to a quote feed; here it logs.
fn on_market_data_event(event: &Event) {
    if let EventPayload::MarketDataUpdated(market) = &event.payload {
        info!(
            symbol = %market.symbol,
            last_price = ?market.last_price,
            best_bid = ?market.best_bid,
            best_ask = ?market.best_ask,
            "market data updated"
        );
    }
}

/// Audit consumer: every event, verbatim, in sequence order.
fn on_audit_event(event: &Event) {
    debug!(seq = event.sequence_id, payload = ?event.payload, "audit");
}

/// Notification consumer: reacts to events a client would want pushed to
/// them (placement acks and fills).
fn on_notification_event(event: &Event) {
    match &event.payload {
        EventPayload::OrderPlaced(order) => {
            debug!(order_id = order.order_id, user_id = %order.user_id, "notify: order placed");
        }
        EventPayload::TradeExecuted(trade) => {
            debug!(trade_id = trade.trade_id, buyer = %trade.buy_user_id, seller = %trade.sell_user_id, "notify: trade executed");
        }
        EventPayload::MarketDataUpdated(_) => {}
    }
}
