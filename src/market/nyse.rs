//! NYSE trading calendar
//! Generates the regular-session list (09:30-16:00 Eastern) with full-day
//! holidays and 13:00 early closes, as UTC instants.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};

use super::clock::Session;

/// Build the ordered session list covering `first_year..=last_year`.
pub fn sessions_for_years(first_year: i32, last_year: i32) -> Vec<Session> {
    let mut sessions = Vec::new();

    for year in first_year..=last_year {
        let holidays = holidays(year);
        let early = early_closes(year, &holidays);

        let mut date = NaiveDate::from_ymd_opt(year, 1, 1).expect("valid date");
        let last = NaiveDate::from_ymd_opt(year, 12, 31).expect("valid date");

        while date <= last {
            if is_weekday(date) && !holidays.contains(&date) {
                let (close_hour, close_min) = if early.contains(&date) {
                    (13, 0)
                } else {
                    (16, 0)
                };
                sessions.push(Session {
                    date,
                    open: eastern_to_utc(date, 9, 30),
                    close: eastern_to_utc(date, close_hour, close_min),
                });
            }
            date = date.succ_opt().expect("valid date");
        }
    }

    sessions
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Convert an Eastern wall-clock time to UTC.
///
/// US/Eastern is UTC-4 during daylight saving (second Sunday of March to
/// first Sunday of November) and UTC-5 otherwise. The transitions happen at
/// 02:00 local, hours before any session time, so a per-date offset is exact
/// for session instants.
fn eastern_to_utc(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let offset_hours = if in_dst(date) { 4 } else { 5 };
    let naive = date.and_hms_opt(hour, minute, 0).expect("valid time");
    Utc.from_utc_datetime(&naive) + Duration::hours(offset_hours)
}

fn in_dst(date: NaiveDate) -> bool {
    let dst_start = nth_weekday_of_month(date.year(), 3, Weekday::Sun, 2);
    let dst_end = nth_weekday_of_month(date.year(), 11, Weekday::Sun, 1);
    date >= dst_start && date < dst_end
}

/// Full-day market holidays for a year.
fn holidays(year: i32) -> BTreeSet<NaiveDate> {
    let mut days = BTreeSet::new();

    // New Year's Day: a Saturday Jan 1 is not observed, a Sunday Jan 1 moves
    // to Monday.
    let new_year = NaiveDate::from_ymd_opt(year, 1, 1).expect("valid date");
    match new_year.weekday() {
        Weekday::Sat => {}
        Weekday::Sun => {
            days.insert(new_year + Duration::days(1));
        }
        _ => {
            days.insert(new_year);
        }
    }

    // Martin Luther King Jr. Day: third Monday of January
    days.insert(nth_weekday_of_month(year, 1, Weekday::Mon, 3));
    // Washington's Birthday: third Monday of February
    days.insert(nth_weekday_of_month(year, 2, Weekday::Mon, 3));
    // Good Friday: two days before Easter Sunday
    days.insert(easter_sunday(year) - Duration::days(2));
    // Memorial Day: last Monday of May
    days.insert(last_weekday_of_month(year, 5, Weekday::Mon));
    // Juneteenth, observed by the exchange since 2022
    if year >= 2022 {
        days.insert(observed(NaiveDate::from_ymd_opt(year, 6, 19).expect("valid date")));
    }
    // Independence Day
    days.insert(observed(NaiveDate::from_ymd_opt(year, 7, 4).expect("valid date")));
    // Labor Day: first Monday of September
    days.insert(nth_weekday_of_month(year, 9, Weekday::Mon, 1));
    // Thanksgiving: fourth Thursday of November
    days.insert(nth_weekday_of_month(year, 11, Weekday::Thu, 4));
    // Christmas
    days.insert(observed(NaiveDate::from_ymd_opt(year, 12, 25).expect("valid date")));

    days
}

/// 13:00 Eastern early-close days: July 3, the day after Thanksgiving and
/// Christmas Eve, whenever they land on a trading day.
fn early_closes(year: i32, holidays: &BTreeSet<NaiveDate>) -> BTreeSet<NaiveDate> {
    let thanksgiving = nth_weekday_of_month(year, 11, Weekday::Thu, 4);
    let candidates = [
        NaiveDate::from_ymd_opt(year, 7, 3).expect("valid date"),
        thanksgiving + Duration::days(1),
        NaiveDate::from_ymd_opt(year, 12, 24).expect("valid date"),
    ];

    candidates
        .into_iter()
        .filter(|d| is_weekday(*d) && !holidays.contains(d))
        .collect()
}

/// Weekend holidays are observed on the nearest weekday: Saturday moves to
/// Friday, Sunday moves to Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid date");
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    first + Duration::days(i64::from(offset + (n - 1) * 7))
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let last = if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31).expect("valid date")
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).expect("valid date") - Duration::days(1)
    };
    let offset = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    last - Duration::days(i64::from(offset))
}

/// Anonymous Gregorian computus.
fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).expect("valid easter date")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_easter_sunday() {
        assert_eq!(easter_sunday(2025), date(2025, 4, 20));
        assert_eq!(easter_sunday(2026), date(2026, 4, 5));
    }

    #[test]
    fn test_holidays_2025() {
        let days = holidays(2025);
        assert!(days.contains(&date(2025, 1, 1))); // New Year's Day
        assert!(days.contains(&date(2025, 1, 20))); // MLK Day
        assert!(days.contains(&date(2025, 2, 17))); // Washington's Birthday
        assert!(days.contains(&date(2025, 4, 18))); // Good Friday
        assert!(days.contains(&date(2025, 5, 26))); // Memorial Day
        assert!(days.contains(&date(2025, 6, 19))); // Juneteenth
        assert!(days.contains(&date(2025, 7, 4))); // Independence Day
        assert!(days.contains(&date(2025, 9, 1))); // Labor Day
        assert!(days.contains(&date(2025, 11, 27))); // Thanksgiving
        assert!(days.contains(&date(2025, 12, 25))); // Christmas
        assert_eq!(days.len(), 10);
    }

    #[test]
    fn test_saturday_holiday_observed_friday() {
        // July 4, 2026 falls on a Saturday; observed Friday July 3.
        let days = holidays(2026);
        assert!(days.contains(&date(2026, 7, 3)));
        assert!(!days.contains(&date(2026, 7, 4)));
    }

    #[test]
    fn test_saturday_new_year_not_observed() {
        // Jan 1, 2028 is a Saturday; the exchange does not observe it.
        let days = holidays(2028);
        assert!(!days.contains(&date(2027, 12, 31)));
        assert!(!days.contains(&date(2028, 1, 1)));
    }

    #[test]
    fn test_early_closes_2025() {
        let hols = holidays(2025);
        let early = early_closes(2025, &hols);
        assert!(early.contains(&date(2025, 7, 3)));
        assert!(early.contains(&date(2025, 11, 28))); // day after Thanksgiving
        assert!(early.contains(&date(2025, 12, 24)));
    }

    #[test]
    fn test_observed_holiday_is_not_early_close() {
        // July 3, 2026 is the observed Independence Day, not a short session.
        let hols = holidays(2026);
        let early = early_closes(2026, &hols);
        assert!(!early.contains(&date(2026, 7, 3)));
    }

    #[test]
    fn test_session_times_follow_dst() {
        let sessions = sessions_for_years(2025, 2025);

        // Mid-summer: Eastern is UTC-4, open 13:30Z close 20:00Z.
        let july = sessions.iter().find(|s| s.date == date(2025, 7, 14)).unwrap();
        assert_eq!(july.open, Utc.with_ymd_and_hms(2025, 7, 14, 13, 30, 0).unwrap());
        assert_eq!(july.close, Utc.with_ymd_and_hms(2025, 7, 14, 20, 0, 0).unwrap());

        // Mid-winter: Eastern is UTC-5, open 14:30Z close 21:00Z.
        let jan = sessions.iter().find(|s| s.date == date(2025, 1, 15)).unwrap();
        assert_eq!(jan.open, Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap());
        assert_eq!(jan.close, Utc.with_ymd_and_hms(2025, 1, 15, 21, 0, 0).unwrap());
    }

    #[test]
    fn test_early_close_session_ends_at_1300_eastern() {
        let sessions = sessions_for_years(2025, 2025);
        let half_day = sessions.iter().find(|s| s.date == date(2025, 11, 28)).unwrap();
        // Late November is standard time: 13:00 Eastern = 18:00Z.
        assert_eq!(half_day.close, Utc.with_ymd_and_hms(2025, 11, 28, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_weekends_and_holidays_have_no_session() {
        let sessions = sessions_for_years(2025, 2025);
        assert!(!sessions.iter().any(|s| s.date == date(2025, 8, 9))); // Saturday
        assert!(!sessions.iter().any(|s| s.date == date(2025, 8, 10))); // Sunday
        assert!(!sessions.iter().any(|s| s.date == date(2025, 11, 27))); // Thanksgiving
    }

    #[test]
    fn test_sessions_are_ordered() {
        let sessions = sessions_for_years(2024, 2026);
        assert!(sessions.windows(2).all(|w| w[0].date < w[1].date));
        assert!(sessions.windows(2).all(|w| w[0].close < w[1].open));
    }
}
