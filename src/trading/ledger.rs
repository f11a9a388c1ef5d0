//! Daily position and order-slot ledger
//! Budget accounting for one trading session

use tracing::{debug, info, warn};

/// The three order roles a session can hold, one live handle each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderKind {
    /// Full-position market sell (profit target or defensive liquidation)
    FullSell,
    /// Primary entry limit order at the average cost
    HalfTranche,
    /// Closing limit order placed in the final minutes of the session
    CloseOut,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullSell => write!(f, "full-sell"),
            Self::HalfTranche => write!(f, "half-tranche"),
            Self::CloseOut => write!(f, "close-out"),
        }
    }
}

/// Lifecycle of one order slot. `Absent` means no handle has been created
/// this session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OrderSlot {
    #[default]
    Absent,
    Pending {
        order_id: String,
        reserved_cost: Option<f64>,
    },
    Filled {
        order_id: String,
    },
    Cancelled {
        order_id: String,
    },
}

impl OrderSlot {
    pub fn is_absent(&self) -> bool {
        matches!(self, OrderSlot::Absent)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, OrderSlot::Pending { .. })
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            OrderSlot::Absent => None,
            OrderSlot::Pending { order_id, .. }
            | OrderSlot::Filled { order_id }
            | OrderSlot::Cancelled { order_id } => Some(order_id),
        }
    }

    /// Budget reserved by this slot while the order is pending, zero
    /// otherwise.
    fn pending_cost(&self) -> f64 {
        match self {
            OrderSlot::Pending {
                reserved_cost: Some(cost),
                ..
            } => *cost,
            _ => 0.0,
        }
    }
}

/// Per-session state: the capital reservoir, tranche counters, the
/// read-through position and the three order slots. Reset in place at each
/// session boundary so the same controller runs another day.
#[derive(Debug)]
pub struct PositionLedger {
    split_count: u32,
    reservoir: f64,
    used_split_count: u32,
    quantity: f64,
    average_cost: f64,
    full_sell: OrderSlot,
    half_tranche: OrderSlot,
    close_out: OrderSlot,
    out_of_amount: bool,
}

impl PositionLedger {
    pub fn new(split_count: u32) -> Self {
        Self {
            split_count,
            reservoir: 0.0,
            used_split_count: 0,
            quantity: 0.0,
            average_cost: 0.0,
            full_sell: OrderSlot::Absent,
            half_tranche: OrderSlot::Absent,
            close_out: OrderSlot::Absent,
            out_of_amount: false,
        }
    }

    /// Fix the reservoir for a new session and clear all per-day state.
    /// The reservoir is never recomputed intraday.
    pub fn reset_for_new_session(&mut self, opening_price: f64) {
        self.reservoir = f64::from(self.split_count) * 2.0 * opening_price;
        self.used_split_count = 0;
        self.full_sell = OrderSlot::Absent;
        self.half_tranche = OrderSlot::Absent;
        self.close_out = OrderSlot::Absent;
        self.out_of_amount = false;
        info!(
            "🔄 New session: reservoir {:.2} ({} splits at {:.2})",
            self.reservoir, self.split_count, opening_price
        );
    }

    /// Overwrite quantity and average cost with the gateway's numbers.
    /// The ledger never derives them itself.
    pub fn update_position(&mut self, quantity: f64, average_cost: f64) {
        self.quantity = quantity;
        self.average_cost = average_cost;
    }

    /// Reservoir minus position value minus the cost reserved by pending
    /// entry orders (their limit price times quantity).
    pub fn remaining_budget(&self) -> f64 {
        self.reservoir
            - self.quantity * self.average_cost
            - self.half_tranche.pending_cost()
            - self.close_out.pending_cost()
    }

    pub fn slot(&self, kind: OrderKind) -> &OrderSlot {
        match kind {
            OrderKind::FullSell => &self.full_sell,
            OrderKind::HalfTranche => &self.half_tranche,
            OrderKind::CloseOut => &self.close_out,
        }
    }

    fn slot_mut(&mut self, kind: OrderKind) -> &mut OrderSlot {
        match kind {
            OrderKind::FullSell => &mut self.full_sell,
            OrderKind::HalfTranche => &mut self.half_tranche,
            OrderKind::CloseOut => &mut self.close_out,
        }
    }

    /// Track a freshly submitted order in its slot.
    pub fn mark_pending(&mut self, kind: OrderKind, order_id: String, reserved_cost: Option<f64>) {
        debug!("📋 Tracking {} order: {}", kind, order_id);
        *self.slot_mut(kind) = OrderSlot::Pending {
            order_id,
            reserved_cost,
        };
    }

    /// Mark the slot filled and consume one tranche, regardless of kind.
    pub fn record_fill(&mut self, kind: OrderKind) {
        let slot = self.slot_mut(kind);
        match std::mem::take(slot) {
            OrderSlot::Pending { order_id, .. } => {
                *slot = OrderSlot::Filled { order_id };
                self.used_split_count += 1;
                info!(
                    "✅ {} order filled ({}/{} splits used)",
                    kind,
                    self.used_split_count,
                    self.max_splits()
                );
            }
            other => {
                warn!("record_fill on {} slot in state {:?}", kind, other);
                *slot = other;
            }
        }
    }

    pub fn mark_cancelled(&mut self, kind: OrderKind) {
        let slot = self.slot_mut(kind);
        match std::mem::take(slot) {
            OrderSlot::Pending { order_id, .. } => {
                *slot = OrderSlot::Cancelled { order_id };
            }
            other => *slot = other,
        }
    }

    pub fn set_out_of_amount(&mut self) {
        self.out_of_amount = true;
    }

    pub fn out_of_amount(&self) -> bool {
        self.out_of_amount
    }

    pub fn reservoir(&self) -> f64 {
        self.reservoir
    }

    pub fn used_split_count(&self) -> u32 {
        self.used_split_count
    }

    /// Total tranche allowance: two kinds of entry per split.
    pub fn max_splits(&self) -> u32 {
        self.split_count * 2
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn average_cost(&self) -> f64 {
        self.average_cost
    }
}
