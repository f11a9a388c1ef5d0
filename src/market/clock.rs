//! Session time queries
//! Pure functions of a timestamp against an ordered session list

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;

use super::nyse;

/// One trading day's regular session, resolved to UTC instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub date: NaiveDate,
    pub open: DateTime<Utc>,
    pub close: DateTime<Utc>,
}

/// An unresolvable calendar state is a configuration error, not a retryable
/// condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("calendar contains no sessions")]
    Empty,
    #[error("no session after {after}; extend the calendar horizon")]
    HorizonExhausted { after: NaiveDate },
}

/// Answers whether the market is open, how much session time remains, and
/// how long until the next open. Holds no mutable state.
#[derive(Debug, Clone)]
pub struct MarketClock {
    sessions: Vec<Session>,
}

impl MarketClock {
    /// Build a clock from an ordered session list.
    pub fn new(sessions: Vec<Session>) -> Result<Self, CalendarError> {
        if sessions.is_empty() {
            return Err(CalendarError::Empty);
        }
        debug_assert!(sessions.windows(2).all(|w| w[0].date < w[1].date));
        Ok(Self { sessions })
    }

    /// Clock over the NYSE calendar for `first_year..=last_year`.
    pub fn nyse(first_year: i32, last_year: i32) -> Result<Self, CalendarError> {
        Self::new(nyse::sessions_for_years(first_year, last_year))
    }

    fn session_on(&self, date: NaiveDate) -> Option<&Session> {
        self.sessions
            .binary_search_by(|s| s.date.cmp(&date))
            .ok()
            .map(|idx| &self.sessions[idx])
    }

    /// True iff the calendar date of `ts` is a trading session and `ts` lies
    /// within `[open, close]`, inclusive of both boundaries.
    pub fn is_open(&self, ts: DateTime<Utc>) -> bool {
        match self.session_on(ts.date_naive()) {
            Some(session) => session.open <= ts && ts <= session.close,
            None => false,
        }
    }

    /// Time left until today's close, or None once the session has ended
    /// (or today is not a session at all).
    pub fn remaining_until_close(&self, ts: DateTime<Utc>) -> Option<Duration> {
        let session = self.session_on(ts.date_naive())?;
        if ts <= session.close {
            Some(session.close - ts)
        } else {
            None
        }
    }

    /// Time until the next session open: today's open if `ts` precedes it,
    /// otherwise the earliest session strictly after today, skipping
    /// weekends and holiday gaps.
    pub fn time_until_next_open(&self, ts: DateTime<Utc>) -> Result<Duration, CalendarError> {
        let date = ts.date_naive();

        if let Some(session) = self.session_on(date) {
            if ts < session.open {
                return Ok(session.open - ts);
            }
        }

        let idx = self.sessions.partition_point(|s| s.date <= date);
        match self.sessions.get(idx) {
            Some(next) => Ok(next.open - ts),
            None => Err(CalendarError::HorizonExhausted {
                after: self.sessions.last().expect("non-empty calendar").date,
            }),
        }
    }
}
