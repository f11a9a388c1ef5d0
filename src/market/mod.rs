//! Market session clock
//! Exchange calendar generation and session time queries

pub mod clock;
pub mod nyse;

pub use clock::{CalendarError, MarketClock, Session};
