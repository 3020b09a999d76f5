//! Expiry dates and strike ladders for planning contract-level downloads.
//!
//! NSE stock and index options expire on Thursdays: weekly series on every
//! Thursday, monthly series on the last Thursday of the month.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Last Thursday of the month.
pub fn monthly_expiry(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let mut day = first_of_next.pred_opt()?;
    while day.weekday() != Weekday::Thu {
        day = day.pred_opt()?;
    }
    Some(day)
}

pub fn monthly_expiries(year: i32) -> Vec<NaiveDate> {
    (1..=12).filter_map(|m| monthly_expiry(year, m)).collect()
}

/// Every weekly and monthly expiry in the year, ascending and unique.
pub fn expiries_for_year(year: i32) -> Vec<NaiveDate> {
    let Some(mut day) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return Vec::new();
    };
    while day.weekday() != Weekday::Thu {
        day += Duration::days(1);
    }

    let mut expiries = Vec::with_capacity(53);
    while day.year() == year {
        expiries.push(day);
        day += Duration::days(7);
    }
    expiries.extend(monthly_expiries(year));
    expiries.sort_unstable();
    expiries.dedup();
    expiries
}

/// Nearest multiple of `step` to the spot price. `None` unless `step` is positive.
pub fn atm_strike(spot: f64, step: f64) -> Option<f64> {
    (step > 0.0 && spot.is_finite()).then(|| (spot / step).round() * step)
}

/// Multiples of `step` strictly within `band` of the spot price, ascending.
pub fn strike_ladder(spot: f64, step: f64, band: f64) -> Vec<f64> {
    if step <= 0.0 || band <= 0.0 {
        return Vec::new();
    }
    let lo = ((spot - band) / step).floor() as i64;
    let hi = ((spot + band) / step).ceil() as i64;
    (lo..=hi)
        .map(|k| k as f64 * step)
        .filter(|strike| *strike > 0.0 && (strike - spot).abs() < band)
        .collect()
}
