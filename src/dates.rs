//! Best-effort date normalization for ingested records.
//!
//! Never fails: anything that does not fully match a known pattern becomes
//! the current time.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Tried in order after spaces and hyphens have been removed.
const FORMATS: &[&str] = &["%Y%m%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日", "%m/%d/%y"];

/// Parse `raw` into a UTC midnight timestamp, or return "now".
pub fn parse_date(raw: &str) -> DateTime<Utc> {
    parse_date_or(raw, Utc::now())
}

/// Same as [`parse_date`] with an explicit fallback.
pub fn parse_date_or(raw: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    match try_parse_date(raw) {
        Some(d) => d.and_time(NaiveTime::MIN).and_utc(),
        None => {
            if !raw.trim().is_empty() {
                tracing::debug!(target: "ingest", raw, "unparsable date, using fallback");
            }
            fallback
        }
    }
}

/// The calendar date when one of the patterns matches the whole input.
pub fn try_parse_date(raw: &str) -> Option<NaiveDate> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    FORMATS.iter().find_map(|fmt| {
        // %Y must see exactly four digits; chrono alone would take "01/05/24" as year 1
        if fmt.starts_with("%Y") && !has_four_digit_year(&cleaned) {
            return None;
        }
        NaiveDate::parse_from_str(&cleaned, fmt).ok()
    })
}

fn has_four_digit_year(s: &str) -> bool {
    s.chars().take(4).filter(|c| c.is_ascii_digit()).count() == 4
}
