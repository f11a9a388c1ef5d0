//! Trading controller state machine
//! WaitingForOpen -> ActiveSession -> SessionReconcile, looping day after
//! day until capital exhaustion halts the process

use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::api::broker::{BrokerGateway, OrderState};
use crate::market::MarketClock;
use crate::trading::ledger::{OrderKind, OrderSlot, PositionLedger};
use crate::trading::stats::SessionStats;
use crate::utils::clock::{to_std_duration, Clock};
use crate::BotError;

/// Full exit at +10% over average cost.
const PROFIT_TARGET_RATIO: f64 = 1.10;
/// Defensive liquidation floor when the reservoir cannot fund another entry.
const DEFENSIVE_FLOOR_RATIO: f64 = 0.90;
/// Cap on the close-out limit price relative to average cost.
const CLOSE_OUT_CAP_RATIO: f64 = 1.15;
/// Close-out orders are only placed in the final minutes of the session.
const CLOSE_OUT_WINDOW_MINUTES: i64 = 10;

/// Controller timing and sizing parameters.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub symbol: String,
    pub split_count: u32,
    /// Decision cadence while the session is open
    pub tick_interval: Duration,
    /// Pause after a transient gateway error before resuming
    pub error_pause: Duration,
    /// How long before the next open the controller wakes to reset
    pub preopen_lead: Duration,
    /// Shares per tranche order
    pub tranche_quantity: f64,
}

impl ControllerSettings {
    pub fn new(symbol: impl Into<String>, split_count: u32) -> Self {
        Self {
            symbol: symbol.into(),
            split_count,
            tick_interval: Duration::from_secs(3),
            error_pause: Duration::from_secs(5),
            preopen_lead: Duration::from_secs(600),
            tranche_quantity: 1.0,
        }
    }
}

/// Why the active session stopped ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The session reached its scheduled close
    Closed,
    /// The reservoir cannot fund another entry and the defensive exit was
    /// unavailable
    CapitalExhausted,
}

/// Why the whole controller loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    CapitalExhausted,
}

enum TickFlow {
    Continue,
    OutOfAmount,
}

/// The orchestrating state machine. Generic over the gateway and the clock
/// so scenario tests drive it with a scripted broker and simulated time.
pub struct TradingController<G, C> {
    gateway: G,
    clock: C,
    market: MarketClock,
    settings: ControllerSettings,
    ledger: PositionLedger,
    stats: SessionStats,
    session_date: Option<NaiveDate>,
}

impl<G: BrokerGateway, C: Clock> TradingController<G, C> {
    pub fn new(gateway: G, clock: C, market: MarketClock, settings: ControllerSettings) -> Self {
        let ledger = PositionLedger::new(settings.split_count);
        Self {
            gateway,
            clock,
            market,
            settings,
            ledger,
            stats: SessionStats::new(),
            session_date: None,
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Run until capital exhaustion or a fatal configuration error.
    /// Transient gateway failures pause briefly and resume from the
    /// waiting-for-open check; state mutated before the failure stands.
    pub async fn run(&mut self) -> Result<RunOutcome, BotError> {
        loop {
            match self.run_day().await {
                Ok(Some(outcome)) => return Ok(outcome),
                Ok(None) => {}
                Err(err) if err.is_transient() => {
                    self.stats.record_error();
                    warn!(
                        "⚠️ Gateway error, pausing {}s before resuming: {}",
                        self.settings.error_pause.as_secs(),
                        err
                    );
                    self.clock.sleep(self.settings.error_pause).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn run_day(&mut self) -> Result<Option<RunOutcome>, BotError> {
        self.wait_for_open().await?;
        self.begin_session_if_new().await?;
        let outcome = self.run_session().await?;
        self.reconcile(outcome).await
    }

    /// WaitingForOpen: short poll; while closed, sleep out the whole gap to
    /// the next open before re-checking.
    async fn wait_for_open(&mut self) -> Result<(), BotError> {
        loop {
            self.clock.sleep(self.settings.tick_interval).await;
            let now = self.clock.now();
            if self.market.is_open(now) {
                return Ok(());
            }
            let until_open = self.market.time_until_next_open(now)?;
            info!(
                "💤 Market closed, next open in {}m",
                until_open.num_minutes()
            );
            self.clock.sleep(to_std_duration(until_open)).await;
        }
    }

    /// Initialize the daily state from the first observed price, once per
    /// session date. Re-entry after a transient error keeps the running
    /// day's state untouched.
    async fn begin_session_if_new(&mut self) -> Result<(), BotError> {
        let today = self.clock.now().date_naive();
        if self.session_date == Some(today) {
            return Ok(());
        }
        let price = self.gateway.fetch_price(&self.settings.symbol).await?;
        self.ledger.reset_for_new_session(price);
        self.stats.reset();
        self.session_date = Some(today);
        Ok(())
    }

    /// ActiveSession: tick at fixed cadence until the session closes or the
    /// capital gate trips.
    pub async fn run_session(&mut self) -> Result<SessionOutcome, BotError> {
        info!("📈 Session open for {}", self.settings.symbol);
        loop {
            if self.ledger.out_of_amount() {
                return Ok(SessionOutcome::CapitalExhausted);
            }
            let now = self.clock.now();
            let Some(remaining) = self.market.remaining_until_close(now) else {
                info!("🔔 Session over");
                return Ok(SessionOutcome::Closed);
            };
            match self.tick(remaining).await? {
                TickFlow::OutOfAmount => return Ok(SessionOutcome::CapitalExhausted),
                TickFlow::Continue => {}
            }
            self.clock.sleep(self.settings.tick_interval).await;
        }
    }

    /// One decision tick. Rule order is significant: the exit checks (R1,
    /// R2) run before any new entry so a just-detected exit is never
    /// overridden by a buy in the same tick.
    async fn tick(&mut self, remaining: chrono::Duration) -> Result<TickFlow, BotError> {
        let symbol = self.settings.symbol.clone();

        let price = self.gateway.fetch_price(&symbol).await?;
        let position = self.gateway.fetch_position(&symbol).await?;
        self.ledger
            .update_position(position.quantity, position.average_cost);

        let budget = self.ledger.remaining_budget();
        let average_cost = self.ledger.average_cost();
        debug!(
            "tick: price {:.2}, avg {:.2}, budget {:.2}, remaining {}s",
            price,
            average_cost,
            budget,
            remaining.num_seconds()
        );

        // R1: profit target, full exit
        if average_cost > 0.0
            && price >= average_cost * PROFIT_TARGET_RATIO
            && self.ledger.slot(OrderKind::FullSell).is_absent()
        {
            info!(
                "🎯 Profit target reached ({:.2} >= {:.2}), selling everything",
                price,
                average_cost * PROFIT_TARGET_RATIO
            );
            self.submit_full_sell().await?;
        }

        // R2: capital gate, evaluated only while tranches remain
        if self.ledger.used_split_count() < self.ledger.max_splits() && budget < price {
            if price >= average_cost * DEFENSIVE_FLOOR_RATIO {
                if self.ledger.slot(OrderKind::FullSell).is_absent() {
                    info!("🛡️ Reservoir exhausted near break-even, selling everything");
                    self.submit_full_sell().await?;
                }
            } else {
                warn!("🛑 Reservoir exhausted below the defensive floor, halting entries");
                self.ledger.set_out_of_amount();
                return Ok(TickFlow::OutOfAmount);
            }
        }

        // R3: entry tranche at the average cost
        let half = self.ledger.slot(OrderKind::HalfTranche).clone();
        if half.is_absent() {
            let limit = if average_cost > 0.0 { average_cost } else { price };
            let ack = self
                .gateway
                .submit_limit_buy(&symbol, limit, self.settings.tranche_quantity)
                .await?;
            info!("📥 Half-tranche limit buy at {:.2}: {}", limit, ack.order_id);
            let reserved = limit * self.settings.tranche_quantity;
            self.ledger
                .mark_pending(OrderKind::HalfTranche, ack.order_id, Some(reserved));
            self.stats.record_order_placed();
        } else if let OrderSlot::Pending { order_id, .. } = half {
            match self.gateway.fetch_order_status(&order_id).await? {
                OrderState::Filled => {
                    self.ledger.record_fill(OrderKind::HalfTranche);
                    self.stats.record_order_filled();
                }
                OrderState::Pending => {
                    // A pending close-out supersedes the stale entry order.
                    if self.ledger.slot(OrderKind::CloseOut).is_pending() {
                        self.gateway.cancel_order(&order_id).await?;
                        self.ledger.mark_cancelled(OrderKind::HalfTranche);
                        self.stats.record_order_cancelled();
                        info!("🗑️ Cancelled stale half-tranche order {}", order_id);
                    }
                }
            }
        }

        // R4: closing tranche in the final window
        if remaining <= chrono::Duration::minutes(CLOSE_OUT_WINDOW_MINUTES) {
            let close_out = self.ledger.slot(OrderKind::CloseOut).clone();
            if close_out.is_absent() {
                let limit = if average_cost > 0.0 {
                    price.min(average_cost * CLOSE_OUT_CAP_RATIO)
                } else {
                    price
                };
                let ack = self
                    .gateway
                    .submit_limit_buy(&symbol, limit, self.settings.tranche_quantity)
                    .await?;
                info!("🌙 Close-out limit buy at {:.2}: {}", limit, ack.order_id);
                let reserved = limit * self.settings.tranche_quantity;
                self.ledger
                    .mark_pending(OrderKind::CloseOut, ack.order_id, Some(reserved));
                self.stats.record_order_placed();
            } else if let OrderSlot::Pending { order_id, .. } = close_out {
                if self.gateway.fetch_order_status(&order_id).await? == OrderState::Filled {
                    self.ledger.record_fill(OrderKind::CloseOut);
                    self.stats.record_order_filled();
                }
            }
        }

        Ok(TickFlow::Continue)
    }

    async fn submit_full_sell(&mut self) -> Result<(), BotError> {
        let quantity = self.ledger.quantity();
        let ack = self
            .gateway
            .submit_market_sell(&self.settings.symbol, quantity)
            .await?;
        info!("📤 Full-position market sell x{}: {}", quantity, ack.order_id);
        self.ledger
            .mark_pending(OrderKind::FullSell, ack.order_id, None);
        self.stats.record_order_placed();
        Ok(())
    }

    /// SessionReconcile: clean up outstanding orders, then either halt on
    /// capital exhaustion or sleep until shortly before the next open and
    /// reset for a fresh day.
    pub async fn reconcile(
        &mut self,
        outcome: SessionOutcome,
    ) -> Result<Option<RunOutcome>, BotError> {
        // Unfilled close-out orders do not survive the session.
        if let OrderSlot::Pending { order_id, .. } = self.ledger.slot(OrderKind::CloseOut).clone() {
            self.gateway.cancel_order(&order_id).await?;
            self.ledger.mark_cancelled(OrderKind::CloseOut);
            self.stats.record_order_cancelled();
        }

        // The full-sell handle is cancel-attempted regardless of state; a
        // rejection here usually means the order already filled, which the
        // broker reports as an error and we treat as a no-op.
        if let Some(order_id) = self
            .ledger
            .slot(OrderKind::FullSell)
            .order_id()
            .map(String::from)
        {
            match self.gateway.cancel_order(&order_id).await {
                Ok(()) => self.stats.record_order_cancelled(),
                Err(err) => warn!(
                    "Cancel of full-sell {} rejected (likely filled): {}",
                    order_id, err
                ),
            }
        }

        info!("{}", self.stats.summary());

        match outcome {
            SessionOutcome::CapitalExhausted => {
                error!(
                    "🚨 ALERT: reservoir exhausted for {}; trading halted, manual intervention required",
                    self.settings.symbol
                );
                Ok(Some(RunOutcome::CapitalExhausted))
            }
            SessionOutcome::Closed => {
                let now = self.clock.now();
                let until_open = self.market.time_until_next_open(now)?;
                let wake_in = to_std_duration(until_open).saturating_sub(self.settings.preopen_lead);
                info!(
                    "💤 Next open in {}m, waking {}m early to reset",
                    until_open.num_minutes(),
                    self.settings.preopen_lead.as_secs() / 60
                );
                self.clock.sleep(wake_in).await;

                let price = self.gateway.fetch_price(&self.settings.symbol).await?;
                self.ledger.reset_for_new_session(price);
                self.stats.reset();
                self.session_date = None;
                Ok(None)
            }
        }
    }
}
