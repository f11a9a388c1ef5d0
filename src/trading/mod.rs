//! Trading module
//! Position ledger, session statistics and the controller state machine

pub mod controller;
pub mod ledger;
pub mod stats;

pub use controller::{ControllerSettings, RunOutcome, SessionOutcome, TradingController};
pub use ledger::{OrderKind, OrderSlot, PositionLedger};
pub use stats::SessionStats;
