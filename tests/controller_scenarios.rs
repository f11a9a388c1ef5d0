//! Controller scenario tests
//! Drive full sessions through the public API with a scripted gateway and a
//! simulated clock; no real time passes.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;

use splitbot::api::{ApiError, BrokerGateway, OrderAck, OrderState, PositionSnapshot};
use splitbot::utils::Clock;
use splitbot::{
    BotError, ControllerSettings, MarketClock, OrderKind, RunOutcome, Session, TradingController,
};

/// Simulated clock: `sleep` advances `now` instantly.
#[derive(Clone)]
struct SimClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl SimClock {
    fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }
}

#[async_trait]
impl Clock for SimClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: std::time::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }
}

#[derive(Debug, Clone)]
struct SubmittedOrder {
    order_id: String,
    side: &'static str,
    limit_price: Option<f64>,
    quantity: f64,
    submitted_at: DateTime<Utc>,
}

#[derive(Default)]
struct GatewayState {
    prices: BTreeMap<DateTime<Utc>, f64>,
    quantity: f64,
    average_cost: f64,
    next_order_id: u32,
    submitted: Vec<SubmittedOrder>,
    cancel_attempts: Vec<String>,
    failing_cancels: HashSet<String>,
    buy_fill_delay: Option<chrono::Duration>,
}

/// Scripted gateway: fixed position, a step schedule of prices, optional
/// buy-fill delay, optional cancel rejections.
#[derive(Clone)]
struct FakeGateway {
    clock: SimClock,
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    fn new(clock: SimClock, initial_price: f64) -> Self {
        let mut state = GatewayState::default();
        state.prices.insert(DateTime::<Utc>::MIN_UTC, initial_price);
        Self {
            clock,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn set_price_at(&self, at: DateTime<Utc>, price: f64) {
        self.state.lock().unwrap().prices.insert(at, price);
    }

    fn set_position(&self, quantity: f64, average_cost: f64) {
        let mut state = self.state.lock().unwrap();
        state.quantity = quantity;
        state.average_cost = average_cost;
    }

    fn fill_buys_after(&self, delay: chrono::Duration) {
        self.state.lock().unwrap().buy_fill_delay = Some(delay);
    }

    fn fail_cancel(&self, order_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_cancels
            .insert(order_id.to_string());
    }

    fn submitted(&self) -> Vec<SubmittedOrder> {
        self.state.lock().unwrap().submitted.clone()
    }

    fn limit_buys(&self) -> Vec<SubmittedOrder> {
        self.submitted()
            .into_iter()
            .filter(|o| o.side == "buy")
            .collect()
    }

    fn market_sells(&self) -> Vec<SubmittedOrder> {
        self.submitted()
            .into_iter()
            .filter(|o| o.side == "sell")
            .collect()
    }

    fn cancel_attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().cancel_attempts.clone()
    }

    fn record_order(
        &self,
        side: &'static str,
        limit_price: Option<f64>,
        quantity: f64,
    ) -> OrderAck {
        let mut state = self.state.lock().unwrap();
        state.next_order_id += 1;
        let order_id = format!("ord-{}", state.next_order_id);
        let submitted_at = self.clock.now();
        state.submitted.push(SubmittedOrder {
            order_id: order_id.clone(),
            side,
            limit_price,
            quantity,
            submitted_at,
        });
        OrderAck { order_id }
    }
}

#[async_trait]
impl BrokerGateway for FakeGateway {
    async fn fetch_price(&self, _symbol: &str) -> Result<f64, ApiError> {
        let now = self.clock.now();
        let state = self.state.lock().unwrap();
        Ok(*state
            .prices
            .range(..=now)
            .next_back()
            .map(|(_, price)| price)
            .expect("price schedule has an initial entry"))
    }

    async fn fetch_position(&self, symbol: &str) -> Result<PositionSnapshot, ApiError> {
        let state = self.state.lock().unwrap();
        Ok(PositionSnapshot {
            symbol: symbol.to_string(),
            quantity: state.quantity,
            average_cost: state.average_cost,
        })
    }

    async fn submit_market_sell(&self, _symbol: &str, quantity: f64) -> Result<OrderAck, ApiError> {
        Ok(self.record_order("sell", None, quantity))
    }

    async fn submit_limit_buy(
        &self,
        _symbol: &str,
        price: f64,
        quantity: f64,
    ) -> Result<OrderAck, ApiError> {
        Ok(self.record_order("buy", Some(price), quantity))
    }

    async fn fetch_order_status(&self, order_id: &str) -> Result<OrderState, ApiError> {
        let now = self.clock.now();
        let state = self.state.lock().unwrap();
        let order = state.submitted.iter().find(|o| o.order_id == order_id);
        match (order, state.buy_fill_delay) {
            (Some(order), Some(delay)) if order.side == "buy" => {
                if now >= order.submitted_at + delay {
                    Ok(OrderState::Filled)
                } else {
                    Ok(OrderState::Pending)
                }
            }
            _ => Ok(OrderState::Pending),
        }
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.cancel_attempts.push(order_id.to_string());
        if state.failing_cancels.contains(order_id) {
            return Err(ApiError::OrderRejected {
                reason: "order already filled".to_string(),
            });
        }
        Ok(())
    }
}

fn session(date: NaiveDate, open: DateTime<Utc>, minutes: i64) -> Session {
    Session {
        date,
        open,
        close: open + chrono::Duration::minutes(minutes),
    }
}

fn day(y: i32, m: u32, d: u32, h: u32, min: u32) -> (NaiveDate, DateTime<Utc>) {
    (
        NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap(),
    )
}

struct Harness {
    clock: SimClock,
    gateway: FakeGateway,
    controller: TradingController<FakeGateway, SimClock>,
}

/// Controller over the given sessions, with the clock starting 10 seconds
/// before the first open.
fn harness(sessions: Vec<Session>, initial_price: f64, split_count: u32) -> Harness {
    let start = sessions[0].open - chrono::Duration::seconds(10);
    let clock = SimClock::starting_at(start);
    let gateway = FakeGateway::new(clock.clone(), initial_price);
    let market = MarketClock::new(sessions).unwrap();
    let controller = TradingController::new(
        gateway.clone(),
        clock.clone(),
        market,
        ControllerSettings::new("SOXL", split_count),
    );
    Harness {
        clock,
        gateway,
        controller,
    }
}

fn assert_horizon_exhausted(err: BotError) {
    assert!(
        matches!(err, BotError::Calendar(_)),
        "expected calendar horizon error, got: {err}"
    );
}

#[tokio::test]
async fn test_profit_target_boundary_triggers_single_full_sell() {
    let (date, open) = day(2025, 3, 3, 14, 0);
    let avg = 25.0;
    // Exactly at the +10% boundary; the trigger is inclusive.
    let price = avg * 1.10;

    let mut h = harness(vec![session(date, open, 20)], price, 40);
    h.gateway.set_position(5.0, avg);

    let err = h.controller.run().await.unwrap_err();
    assert_horizon_exhausted(err);

    let sells = h.gateway.market_sells();
    assert_eq!(sells.len(), 1, "full sell must be created exactly once");
    assert_eq!(sells[0].quantity, 5.0);
    // First tick of the session, despite the condition holding on every tick.
    assert_eq!(sells[0].submitted_at, open + chrono::Duration::seconds(3));
}

#[tokio::test]
async fn test_below_profit_target_no_sell() {
    let (date, open) = day(2025, 3, 3, 14, 0);
    let avg = 25.0;
    let price = avg * 1.10 - 0.01;

    let mut h = harness(vec![session(date, open, 20)], price, 40);
    h.gateway.set_position(5.0, avg);

    let err = h.controller.run().await.unwrap_err();
    assert_horizon_exhausted(err);
    assert!(h.gateway.market_sells().is_empty());
}

#[tokio::test]
async fn test_close_out_created_at_exactly_ten_minutes_remaining() {
    let (date, open) = day(2025, 3, 3, 14, 0);
    let close = open + chrono::Duration::minutes(20);

    let mut h = harness(vec![session(date, open, 20)], 32.0, 40);
    h.gateway.set_position(2.0, 30.0);

    let err = h.controller.run().await.unwrap_err();
    assert_horizon_exhausted(err);

    let buys = h.gateway.limit_buys();
    assert_eq!(buys.len(), 2, "one half-tranche and one close-out");
    // Half-tranche goes out on the first tick at the average cost.
    assert_eq!(buys[0].submitted_at, open + chrono::Duration::seconds(3));
    assert_eq!(buys[0].limit_price, Some(30.0));
    // Close-out goes out on the tick where remaining hits exactly 10 minutes.
    assert_eq!(buys[1].submitted_at, close - chrono::Duration::minutes(10));
    // Price is below the x1.15 cap, so the order is priced at market.
    assert_eq!(buys[1].limit_price, Some(32.0));
}

#[tokio::test]
async fn test_close_out_limit_capped_at_average_cost_ratio() {
    let (date, open) = day(2025, 3, 3, 14, 0);
    let avg = 30.0;
    // Far above the cap; also above the profit target, so a full sell fires
    // first, but entries keep flowing per the rule order.
    let price = 40.0;

    let mut h = harness(vec![session(date, open, 20)], price, 40);
    h.gateway.set_position(2.0, avg);

    let err = h.controller.run().await.unwrap_err();
    assert_horizon_exhausted(err);

    let buys = h.gateway.limit_buys();
    assert_eq!(buys.len(), 2);
    assert_eq!(buys[1].limit_price, Some(avg * 1.15));
}

#[tokio::test]
async fn test_pending_half_tranche_cancelled_once_close_out_pending() {
    let (date, open) = day(2025, 3, 3, 14, 0);
    let close = open + chrono::Duration::minutes(20);

    let mut h = harness(vec![session(date, open, 20)], 29.0, 40);
    h.gateway.set_position(2.0, 30.0);
    // No fills: both entry orders stay pending.

    let err = h.controller.run().await.unwrap_err();
    assert_horizon_exhausted(err);

    let buys = h.gateway.limit_buys();
    assert_eq!(buys.len(), 2);
    let half_id = buys[0].order_id.clone();
    let close_out_id = buys[1].order_id.clone();

    let cancels = h.gateway.cancel_attempts();
    // The stale half-tranche is cancelled on the evaluation after the
    // close-out went pending; the close-out itself at reconcile.
    assert_eq!(cancels, vec![half_id, close_out_id]);

    // The cancelled half order was superseded, never re-created.
    let half_cancel_at = close - chrono::Duration::minutes(10) + chrono::Duration::seconds(3);
    assert!(h.clock.now() > half_cancel_at);

    // With nothing pending the budget identity collapses to reservoir
    // minus position value.
    let ledger = h.controller.ledger();
    let expected = ledger.reservoir() - 2.0 * 30.0;
    assert!((ledger.remaining_budget() - expected).abs() < 1e-9);
}

#[tokio::test]
async fn test_capital_gate_defensive_liquidation_near_break_even() {
    let (date, open) = day(2025, 3, 3, 14, 0);
    // split_count 1 makes the reservoir tiny: 2 x 95 = 190, while the held
    // position is worth 300. Budget is negative, price above the 0.90 floor.
    let mut h = harness(vec![session(date, open, 20)], 95.0, 1);
    h.gateway.set_position(3.0, 100.0);

    let result = h.controller.run().await;

    let sells = h.gateway.market_sells();
    assert_eq!(sells.len(), 1, "defensive liquidation fires once");
    assert_eq!(sells[0].quantity, 3.0);
    assert!(!h.controller.ledger().out_of_amount());
    assert_horizon_exhausted(result.unwrap_err());
}

#[tokio::test]
async fn test_capital_gate_below_floor_halts_without_submitting() {
    let (date, open) = day(2025, 3, 3, 14, 0);
    // Reservoir 2 x 80 = 160 against a 300-value position, and the price is
    // below the 0.90 defensive floor: no exit possible, the bot must stop.
    let mut h = harness(vec![session(date, open, 20)], 80.0, 1);
    h.gateway.set_position(3.0, 100.0);

    let outcome = h.controller.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::CapitalExhausted);

    assert!(h.controller.ledger().out_of_amount());
    // The tick loop exits before any entry is placed.
    assert!(h.gateway.submitted().is_empty());
    // The break happens on the first tick.
    assert_eq!(h.clock.now(), open + chrono::Duration::seconds(3));
}

#[tokio::test]
async fn test_full_sell_slot_shared_between_rules_and_cancel_attempted_at_reconcile() {
    let (date, open) = day(2025, 3, 3, 14, 0);
    // Profit target and capital gate both hold on every tick; the shared
    // slot must still produce a single sell order.
    let mut h = harness(vec![session(date, open, 20)], 120.0, 1);
    h.gateway.set_position(10.0, 100.0);
    h.gateway.fail_cancel("ord-1");

    let err = h.controller.run().await.unwrap_err();
    // The rejected full-sell cancel is a no-op, not a transient failure.
    assert_horizon_exhausted(err);

    let sells = h.gateway.market_sells();
    assert_eq!(sells.len(), 1);
    assert_eq!(sells[0].order_id, "ord-1");

    // Reconcile cancelled the pending close-out and still attempted the
    // full-sell handle even though the broker rejected it.
    let cancels = h.gateway.cancel_attempts();
    assert!(cancels.contains(&"ord-1".to_string()));
}

#[tokio::test]
async fn test_fills_consume_one_tranche_each() {
    let (date, open) = day(2025, 3, 3, 14, 0);

    let mut h = harness(vec![session(date, open, 20)], 100.0, 40);
    h.gateway.set_position(2.0, 100.0);
    h.gateway.fill_buys_after(chrono::Duration::zero());

    let err = h.controller.run().await.unwrap_err();
    assert_horizon_exhausted(err);

    // Half-tranche and close-out both filled: two tranches consumed.
    let ledger = h.controller.ledger();
    assert_eq!(ledger.used_split_count(), 2);
    assert!(ledger.used_split_count() <= ledger.max_splits());
    assert!(!ledger.slot(OrderKind::HalfTranche).is_absent());
    assert!(!ledger.slot(OrderKind::CloseOut).is_absent());
    // Nothing was left to cancel at reconcile.
    assert!(h.gateway.cancel_attempts().is_empty());
}

#[tokio::test]
async fn test_two_sessions_reset_state_and_recompute_reservoir() {
    let (date1, open1) = day(2025, 3, 3, 14, 0);
    // A weekend-style gap: the next session is two days later.
    let (date2, open2) = day(2025, 3, 5, 14, 0);

    let mut h = harness(
        vec![session(date1, open1, 15), session(date2, open2, 15)],
        100.0,
        40,
    );
    h.gateway.fill_buys_after(chrono::Duration::zero());
    // Overnight the price halves; day two's reservoir must follow it.
    h.gateway
        .set_price_at(Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap(), 50.0);

    let err = h.controller.run().await.unwrap_err();
    assert_horizon_exhausted(err);

    // Each session placed a fresh half-tranche and close-out: the slots were
    // Absent again after the reset.
    let buys = h.gateway.limit_buys();
    assert_eq!(buys.len(), 4);
    assert_eq!(buys[2].submitted_at, open2 + chrono::Duration::seconds(3));

    // Day two's state, not an accumulation of both days.
    let ledger = h.controller.ledger();
    assert_eq!(ledger.used_split_count(), 2);
    assert_eq!(ledger.reservoir(), 40.0 * 2.0 * 50.0);
}

#[tokio::test]
async fn test_first_entry_bootstraps_from_market_price() {
    let (date, open) = day(2025, 3, 3, 14, 0);

    // No position at all: average cost is zero, the first tranche is priced
    // at the market instead of a zero limit.
    let mut h = harness(vec![session(date, open, 20)], 42.0, 40);

    let err = h.controller.run().await.unwrap_err();
    assert_horizon_exhausted(err);

    let buys = h.gateway.limit_buys();
    assert_eq!(buys[0].limit_price, Some(42.0));
    assert!(h.gateway.market_sells().is_empty());
}
