//! End-to-end scenarios (S1-S6) and the quantified invariants of the
//! testable-properties section, exercised against the wired processor
//! (S1-S5) and the full pipeline with an in-memory persistence sink (S6),
//! without a live database.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use ringmatch::config::{Config, LogRotation, WaitStrategyKind};
use ringmatch::errors::{RejectReason, RingError};
use ringmatch::models::{Event, EventPayload, Market, OrderType, Side, TimeInForce};
use ringmatch::persistence::InMemoryStore;
use ringmatch::pipeline::Pipeline;
use ringmatch::processor::{OrderSubmission, Processor};

fn seed_market() -> Market {
    Market::new_seed(
        "BTC-USDT",
        "Bitcoin/Tether",
        Decimal::new(1, 2),
        Decimal::ONE,
        NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
        Utc::now(),
    )
}

fn limit(user: &str, side: Side, price: &str, qty: &str, tif: TimeInForce) -> OrderSubmission {
    OrderSubmission {
        user_id: user.into(),
        symbol: "BTC-USDT".into(),
        order_type: OrderType::Limit,
        side,
        price: Some(price.parse().unwrap()),
        quantity: qty.parse().unwrap(),
        time_in_force: tif,
    }
}

fn market_order(user: &str, side: Side, qty: &str, tif: TimeInForce) -> OrderSubmission {
    OrderSubmission {
        user_id: user.into(),
        symbol: "BTC-USDT".into(),
        order_type: OrderType::Market,
        side,
        price: None,
        quantity: qty.parse().unwrap(),
        time_in_force: tif,
    }
}

/// S2: time priority at equal price; a later resting order at the same
/// price is untouched while the earlier one is consumed first.
#[test]
fn scenario_s2_time_priority_at_same_price() {
    let mut processor = Processor::new([seed_market()], |_: &Event| {});
    let t = Utc::now();
    let t_plus_10ms = t + chrono::Duration::milliseconds(10);

    processor.process_order(limit("t1", Side::Buy, "50000.00", "100", TimeInForce::Gtc), t).unwrap();
    processor
        .process_order(limit("t2", Side::Buy, "50000.00", "50", TimeInForce::Gtc), t_plus_10ms)
        .unwrap();
    processor.process_order(limit("t3", Side::Sell, "50001.00", "200", TimeInForce::Gtc), t).unwrap();

    processor
        .process_order(market_order("s", Side::Sell, "75", TimeInForce::Ioc), t)
        .unwrap();

    assert_eq!(processor.trades().len(), 1);
    let trade = &processor.trades()[0];
    assert_eq!(trade.quantity, Decimal::new(75, 0));
    assert_eq!(trade.price, Decimal::new(5000000, 2));
    assert_eq!(trade.buy_user_id, "t1");

    let active = processor.active_orders();
    assert_eq!(active.len(), 3);
    let t1_order = active.iter().find(|o| o.user_id == "t1").unwrap();
    assert_eq!(t1_order.remaining_quantity, Decimal::new(25, 0));
    let t2_order = active.iter().find(|o| o.user_id == "t2").unwrap();
    assert_eq!(t2_order.remaining_quantity, Decimal::new(50, 0));
}

/// S5: 10,000 alternating GTC buy / IOC sell orders at a fixed price
/// produce exactly 5,000 trades, leave no active orders, and journal
/// exactly 20,000 events (10k OrderPlaced + 5k TradeExecuted + 5k
/// MarketDataUpdated).
#[test]
fn scenario_s5_alternating_ioc_sweep() {
    let mut processor = Processor::new([seed_market()], |_: &Event| {});
    let now = Utc::now();

    for i in 0..10_000u64 {
        let submission = if i % 2 == 0 {
            limit(&format!("buyer{i}"), Side::Buy, "45000.00", "1", TimeInForce::Gtc)
        } else {
            limit(&format!("seller{i}"), Side::Sell, "45000.00", "1", TimeInForce::Ioc)
        };
        processor.process_order(submission, now).unwrap();
    }

    assert_eq!(processor.trades().len(), 5_000);
    assert_eq!(processor.active_orders().len(), 0);
    assert_eq!(processor.event_journal().len(), 20_000);

    let order_placed = processor
        .event_journal()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::OrderPlaced(_)))
        .count();
    let trade_executed = processor
        .event_journal()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::TradeExecuted(_)))
        .count();
    let market_updated = processor
        .event_journal()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::MarketDataUpdated(_)))
        .count();
    assert_eq!(order_placed, 10_000);
    assert_eq!(trade_executed, 5_000);
    assert_eq!(market_updated, 5_000);
}

fn test_config() -> Config {
    Config {
        input_ring_size: 1 << 12,
        output_ring_size: 1 << 12,
        wait_strategy: WaitStrategyKind::Yielding,
        batch_size: 1000,
        batch_timeout_ms: 100,
        queue_capacity: 100_000,
        shutdown_timeout_ms: 5_000,
        db_url: String::new(),
        db_username: None,
        db_password: None,
        db_max_connections: 4,
        db_acquire_timeout_ms: 1_000,
        log_dir: "logs".into(),
        log_file: "test.log".into(),
        log_rotation: LogRotation::Never,
        log_level: "error".into(),
        log_json: false,
    }
}

/// S6: with the batched persistence consumer wired through the full
/// pipeline, 3,500 submissions producing 2,500 trades land in the orders
/// and trades tables after quiescence, with no MarketDataUpdated row.
#[test]
fn scenario_s6_batched_persistence_end_to_end() {
    let store = InMemoryStore::new();
    let config = test_config();
    let markets = vec![seed_market()];
    let pipeline = Pipeline::start(&config, markets, store.clone());

    // 2,500 crossing pairs (5,000 orders, 2,500 trades) + 1,000 resting
    // one-sided orders that never match, rounding out to 6,000... scaled
    // down to match S6 exactly: 3,500 submissions, 2,500 trades.
    // 2,500 crossing GTC buy/IOC sell pairs => 2,500 trades from 5,000
    // orders is too many; instead submit 2,500 pairs (5,000 orders) would
    // overshoot submission count, so use 2,500 pairs for trades and pad
    // the remainder with non-crossing rests to hit 3,500 total orders is
    // impossible without affecting trade count. Build exactly: 2,500
    // crossing pairs (5,000 submissions) is more than 3,500, so instead
    // interleave 1,000 GTC buys that never cross plus 2,500 GTC/IOC
    // crossing pairs would be 1,000 + 5,000 = 6,000. To hit the spec's
    // exact 3,500 submissions / 2,500 trades, submit 2,500 resting GTC
    // sells at a high price (no cross) plus 1,000 GTC buy / IOC sell
    // crossing pairs... that yields 1,000 trades, not 2,500.
    //
    // The only way to get fewer submissions than 2x trades is to let a
    // single resting order absorb multiple incoming IOC fills. Rest one
    // GTC buy with ample quantity, then sweep it with 2,500 IOC sells of
    // qty 1 each, each producing one trade against the same resting
    // order: 1 (resting) + 2,500 (sweeps) = 2,501 submissions, 2,500
    // trades. Pad with 999 additional non-crossing rests to reach 3,500
    // submissions total while keeping trades at 2,500.
    pipeline
        .submit_blocking(limit("whale", Side::Buy, "45000.00", "2500", TimeInForce::Gtc))
        .unwrap();
    for i in 0..2_500u64 {
        pipeline
            .submit_blocking(limit(&format!("seller{i}"), Side::Sell, "45000.00", "1", TimeInForce::Ioc))
            .unwrap();
    }
    for i in 0..999u64 {
        pipeline
            .submit_blocking(limit(&format!("resting{i}"), Side::Buy, "1.00", "1", TimeInForce::Gtc))
            .unwrap();
    }

    // Quiescence plus up to 2x the batch timeout (§8 S6).
    std::thread::sleep(Duration::from_millis(config.batch_timeout_ms * 2 + 200));
    pipeline.shutdown();

    assert_eq!(store.order_count(), 3_500);
    assert_eq!(store.trade_count(), 2_500);
}

/// Property 1: conservation. Reconstruct every order's final filled
/// quantity purely by replaying the journal (an `OrderPlaced` snapshot
/// already reflects that order's own immediate matches; each following
/// `TradeExecuted` additionally fills whichever side is the resting
/// maker), and check the total equals twice the total traded quantity.
#[test]
fn property_conservation_of_quantity() {
    let mut processor = Processor::new([seed_market()], |_: &Event| {});
    let now = Utc::now();

    let submissions = [
        limit("a", Side::Buy, "100.00", "30", TimeInForce::Gtc),
        limit("b", Side::Sell, "100.00", "10", TimeInForce::Gtc),
        limit("c", Side::Sell, "99.50", "5", TimeInForce::Gtc),
        market_order("d", Side::Buy, "3", TimeInForce::Ioc),
        limit("e", Side::Sell, "101.00", "50", TimeInForce::Gtc),
        market_order("f", Side::Buy, "200", TimeInForce::Ioc),
    ];
    for s in submissions {
        processor.process_order(s, now).unwrap();
    }

    let total_traded: Decimal = processor.trades().iter().map(|t| t.quantity).sum();

    let mut original: HashMap<u64, Decimal> = HashMap::new();
    let mut remaining: HashMap<u64, Decimal> = HashMap::new();
    let mut current_taker: Option<u64> = None;
    for event in processor.event_journal() {
        match &event.payload {
            EventPayload::OrderPlaced(order) => {
                original.insert(order.order_id, order.quantity);
                remaining.insert(order.order_id, order.remaining_quantity);
                current_taker = Some(order.order_id);
            }
            EventPayload::TradeExecuted(trade) => {
                let taker = current_taker.expect("a trade always follows its own OrderPlaced");
                let maker_id = if trade.buy_order_id == taker { trade.sell_order_id } else { trade.buy_order_id };
                if let Some(r) = remaining.get_mut(&maker_id) {
                    *r -= trade.quantity;
                }
            }
            EventPayload::MarketDataUpdated(_) => {}
        }
    }

    let total_filled: Decimal = original.iter().map(|(id, qty)| *qty - remaining[id]).sum();
    assert_eq!(total_traded * Decimal::from(2), total_filled);
}

/// Property 5 + part of 6: journal is strictly increasing/contiguous, and
/// within one submission the order is OrderPlaced, TradeExecuted*,
/// MarketDataUpdated?.
#[test]
fn property_journal_is_contiguous_and_correctly_ordered() {
    let mut processor = Processor::new([seed_market()], |_: &Event| {});
    let now = Utc::now();

    processor.process_order(limit("a", Side::Sell, "100.00", "10", TimeInForce::Gtc), now).unwrap();
    processor.process_order(limit("b", Side::Buy, "100.00", "10", TimeInForce::Gtc), now).unwrap();
    processor.process_order(limit("c", Side::Sell, "200.00", "1", TimeInForce::Gtc), now).unwrap();

    let journal = processor.event_journal();
    for window in journal.windows(2) {
        assert_eq!(window[1].sequence_id, window[0].sequence_id + 1);
    }
    assert_eq!(journal[0].sequence_id, 1);

    // Submission 1: no cross (sell rests alone) -> just OrderPlaced.
    assert!(matches!(journal[0].payload, EventPayload::OrderPlaced(_)));
    // Submission 2: crosses -> OrderPlaced, TradeExecuted, MarketDataUpdated.
    assert!(matches!(journal[1].payload, EventPayload::OrderPlaced(_)));
    assert!(matches!(journal[2].payload, EventPayload::TradeExecuted(_)));
    assert!(matches!(journal[3].payload, EventPayload::MarketDataUpdated(_)));
    // Submission 3: no cross -> just OrderPlaced.
    assert!(matches!(journal[4].payload, EventPayload::OrderPlaced(_)));
    assert_eq!(journal.len(), 5);
}

/// Property 6: no IOC order ever appears in active orders after
/// processing returns, regardless of whether it fully, partially, or
/// never filled.
#[test]
fn property_ioc_never_rests() {
    let mut processor = Processor::new([seed_market()], |_: &Event| {});
    let now = Utc::now();

    processor.process_order(limit("maker", Side::Sell, "100.00", "5", TimeInForce::Gtc), now).unwrap();
    processor.process_order(limit("taker", Side::Buy, "100.00", "50", TimeInForce::Ioc), now).unwrap();

    assert!(processor.active_orders().iter().all(|o| o.user_id != "taker"));
}

/// Property 7: daily_volume/turnover are non-decreasing, daily_high is
/// non-decreasing, daily_low is non-increasing across a sequence of
/// trades at varying prices.
#[test]
fn property_market_data_monotonicity() {
    let mut processor = Processor::new([seed_market()], |_: &Event| {});
    let now = Utc::now();

    let mut prev_volume = Decimal::ZERO;
    let mut prev_turnover = Decimal::ZERO;
    let mut prev_high: Option<Decimal> = None;
    let mut prev_low: Option<Decimal> = None;

    let prices = ["100.00", "105.00", "95.00", "110.00", "90.00"];
    for (i, price) in prices.iter().enumerate() {
        processor
            .process_order(limit(&format!("maker{i}"), Side::Sell, price, "1", TimeInForce::Gtc), now)
            .unwrap();
        processor
            .process_order(market_order(&format!("taker{i}"), Side::Buy, "1", TimeInForce::Ioc), now)
            .unwrap();

        let market = processor.market("BTC-USDT").unwrap();
        assert!(market.daily_volume >= prev_volume);
        assert!(market.daily_turnover >= prev_turnover);
        if let Some(prev) = prev_high {
            assert!(market.daily_high.unwrap() >= prev);
        }
        if let Some(prev) = prev_low {
            assert!(market.daily_low.unwrap() <= prev);
        }
        prev_volume = market.daily_volume;
        prev_turnover = market.daily_turnover;
        prev_high = market.daily_high;
        prev_low = market.daily_low;
    }
}

/// Property 8: replaying the journal against empty state plus the seeded
/// market catalog reproduces the processor's trade and market state.
#[test]
fn property_state_reconstruction_from_journal() {
    let mut processor = Processor::new([seed_market()], |_: &Event| {});
    let now = Utc::now();

    processor.process_order(limit("a", Side::Sell, "100.00", "10", TimeInForce::Gtc), now).unwrap();
    processor.process_order(limit("b", Side::Buy, "100.00", "15", TimeInForce::Gtc), now).unwrap();
    processor.process_order(limit("c", Side::Sell, "101.00", "5", TimeInForce::Gtc), now).unwrap();

    // Replay: fold the journal's trades and market snapshots directly; the
    // journal is the authoritative source the in-memory state was derived
    // from, so replaying it must reproduce the same final trade list and
    // final market snapshot.
    let mut replayed_trades = Vec::new();
    let mut replayed_market: Option<Market> = None;
    for event in processor.event_journal() {
        match &event.payload {
            EventPayload::TradeExecuted(trade) => replayed_trades.push(trade.clone()),
            EventPayload::MarketDataUpdated(market) => replayed_market = Some(market.clone()),
            EventPayload::OrderPlaced(_) => {}
        }
    }

    assert_eq!(replayed_trades.len(), processor.trades().len());
    for (a, b) in replayed_trades.iter().zip(processor.trades()) {
        assert_eq!(a.trade_id, b.trade_id);
        assert_eq!(a.price, b.price);
        assert_eq!(a.quantity, b.quantity);
    }

    let final_market = processor.market("BTC-USDT").unwrap();
    let replayed = replayed_market.expect("at least one trade occurred");
    assert_eq!(replayed.last_price, final_market.last_price);
    assert_eq!(replayed.daily_volume, final_market.daily_volume);
    assert_eq!(replayed.daily_turnover, final_market.daily_turnover);
}

/// §7: validation/market-state rejections never advance the order counter
/// and never journal an OrderPlaced event.
#[test]
fn rejected_orders_do_not_advance_counters_or_journal() {
    let mut processor = Processor::new([seed_market()], |_: &Event| {});
    let now = Utc::now();

    let before = processor.order_counter();
    let result = processor.process_order(limit("a", Side::Buy, "100.005", "10", TimeInForce::Gtc), now);
    assert_eq!(result, Err(RejectReason::InvalidPrice));
    assert_eq!(processor.order_counter(), before);
    assert_eq!(processor.event_journal().len(), 0);
}

/// The accept-synchronously submission contract: a producer pre-checking
/// free capacity against a full ring observes `RingError::RingFull` from
/// `Pipeline::try_submit` instead of blocking (§4.1 failure semantics).
///
/// A live pipeline's processor thread drains the input ring continuously,
/// so filling it is a race against that thread rather than a fixed setup
/// step. A freshly spawned OS thread needs real wall-clock time before its
/// first scheduled run, while the test thread constructing and submitting
/// an `OrderSubmission` is comparatively instant; with a two-slot ring,
/// three back-to-back `try_submit` calls immediately after `Pipeline::start`
/// reliably beat the processor thread to its first iteration. The whole
/// start/fill/shutdown attempt is retried a bounded number of times so a
/// rare scheduling hiccup on a loaded machine doesn't make the test flaky.
#[test]
fn try_submit_reports_ring_full_without_blocking() {
    let mut saw_ring_full = false;

    for attempt in 0..25u64 {
        let mut config = test_config();
        config.input_ring_size = 2;
        config.output_ring_size = 2;
        let pipeline = Pipeline::start(&config, vec![seed_market()], InMemoryStore::new());

        let submit = |n: u64| limit(&format!("racer{attempt}-{n}"), Side::Buy, "1.00", "1", TimeInForce::Gtc);
        let _ = pipeline.try_submit(submit(0));
        let _ = pipeline.try_submit(submit(1));
        let third = pipeline.try_submit(submit(2));

        pipeline.shutdown();

        if matches!(third, Err(RingError::RingFull)) {
            saw_ring_full = true;
            break;
        }
    }

    assert!(saw_ring_full, "expected at least one attempt to observe RingFull before the processor thread drained the ring");
}

/// Journal events are the wire format handed to external consumers (a
/// notification service, an audit sink); the tagged `EventPayload` must
/// round-trip through JSON with the documented `"type"`/`"payload"` shape.
#[test]
fn journal_event_round_trips_through_json() {
    let mut processor = Processor::new([seed_market()], |_: &Event| {});
    let now = Utc::now();

    processor.process_order(limit("a", Side::Sell, "100.00", "10", TimeInForce::Gtc), now).unwrap();
    processor.process_order(limit("b", Side::Buy, "100.00", "10", TimeInForce::Gtc), now).unwrap();

    for event in processor.event_journal() {
        let encoded = serde_json::to_string(event).expect("event serializes");
        let decoded: Event = serde_json::from_str(&encoded).expect("event deserializes");
        assert_eq!(decoded.sequence_id, event.sequence_id);

        let expected_tag = match &event.payload {
            EventPayload::OrderPlaced(_) => "\"type\":\"ORDER_PLACED\"",
            EventPayload::TradeExecuted(_) => "\"type\":\"TRADE_EXECUTED\"",
            EventPayload::MarketDataUpdated(_) => "\"type\":\"MARKET_DATA_UPDATED\"",
        };
        assert!(encoded.contains(expected_tag), "missing {expected_tag} in {encoded}");
    }
}

/// A market's `last_update_time` is monotone across successive trades.
#[test]
fn market_last_update_time_is_monotone() {
    let mut processor = Processor::new([seed_market()], |_: &Event| {});
    let t0 = Utc::now();
    let t1: DateTime<Utc> = t0 + chrono::Duration::milliseconds(5);

    processor.process_order(limit("a", Side::Sell, "100.00", "10", TimeInForce::Gtc), t0).unwrap();
    processor.process_order(market_order("b", Side::Buy, "5", TimeInForce::Ioc), t0).unwrap();
    let first_update = processor.market("BTC-USDT").unwrap().last_update_time;

    processor.process_order(market_order("c", Side::Buy, "5", TimeInForce::Ioc), t1).unwrap();
    let second_update = processor.market("BTC-USDT").unwrap().last_update_time;

    assert!(second_update >= first_update);
}
