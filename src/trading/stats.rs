//! Per-session trading statistics

/// Counters for one trading session. Reset with the rest of the daily
/// state; nothing is persisted across runs.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub orders_placed: u64,
    pub orders_filled: u64,
    pub orders_cancelled: u64,
    pub errors: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_order_placed(&mut self) {
        self.orders_placed += 1;
    }

    pub fn record_order_filled(&mut self) {
        self.orders_filled += 1;
    }

    pub fn record_order_cancelled(&mut self) {
        self.orders_cancelled += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// One-line summary for the end-of-session log.
    pub fn summary(&self) -> String {
        format!(
            "session stats: {} placed, {} filled, {} cancelled, {} errors",
            self.orders_placed, self.orders_filled, self.orders_cancelled, self.errors
        )
    }
}
