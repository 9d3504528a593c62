//! Decimal-year conversions.
//!
//! Epochs are carried as decimal years (`2011.1897`), the convention of GNSS
//! time series products. Calendar conversions use the actual length of the
//! year in question, while relaxation time constants use a fixed
//! `DAYS_PER_YEAR` so that `Δt` in days is a simple scale of `Δt` in years.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Days per year used to convert epoch differences into days.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Convert a calendar timestamp into a decimal year.
pub fn decimal_year(dt: NaiveDateTime) -> f64 {
    let year = dt.year();
    let start = year_start(year);
    let end = year_start(year + 1);
    match (start, end) {
        (Some(start), Some(end)) => {
            let length = (end - start).num_milliseconds() as f64;
            let elapsed = (dt - start).num_milliseconds() as f64;
            year as f64 + elapsed / length
        }
        _ => year as f64,
    }
}

/// Decimal year at midnight of `date`.
pub fn decimal_year_from_date(date: NaiveDate) -> f64 {
    decimal_year(date.and_time(NaiveTime::MIN))
}

/// Decimal year of a Unix timestamp in milliseconds (UTC).
pub fn decimal_year_from_millis(millis: i64) -> Option<f64> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| decimal_year(dt.naive_utc()))
}

/// Calendar date containing the given decimal-year epoch.
pub fn date_from_decimal_year(epoch: f64) -> Option<NaiveDate> {
    if !epoch.is_finite() {
        return None;
    }
    let year = epoch.floor() as i32;
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
    let days = (end - start).num_days() as f64;
    // Nudge up so that epochs produced from midnight round-trip to the same day.
    let offset = ((epoch - year as f64) * days + 1e-6).floor() as i64;
    start.checked_add_signed(Duration::days(offset))
}

fn year_start(year: i32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, 1, 1).map(|d| d.and_time(NaiveTime::MIN))
}
