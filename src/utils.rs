use crate::error::{CollectionError, Result};
use chrono::{Local, NaiveDate, NaiveTime, TimeZone};

/// `%keyword%` with LIKE wildcards escaped by `\`, so the match is a plain
/// substring test.
pub fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Parses a review-range bound. Review ids are epoch milliseconds, so either
/// a raw id or a local `YYYY-MM-DD` date is accepted; dates cover the whole
/// day on both ends.
pub fn parse_review_bound(s: &str, bound: Bound) -> Result<i64> {
    if let Ok(id) = s.parse::<i64>() {
        return Ok(id);
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        CollectionError::InvalidArgument(format!(
            "{:?} is neither a review id nor a YYYY-MM-DD date",
            s
        ))
    })?;
    let start = local_millis(date)?;
    match bound {
        Bound::Start => Ok(start),
        Bound::End => {
            let next = date.succ_opt().ok_or_else(|| {
                CollectionError::InvalidArgument(format!("date {} out of range", date))
            })?;
            Ok(local_millis(next)? - 1)
        }
    }
}

fn local_millis(date: NaiveDate) -> Result<i64> {
    Local
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| CollectionError::InvalidArgument(format!("no local midnight on {}", date)))
}

#[test]
fn test_like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("abc"), "%abc%");
    assert_eq!(like_pattern("50%_a\\b"), "%50\\%\\_a\\\\b%");
}

#[test]
fn test_parse_review_bound_accepts_ids() {
    assert_eq!(parse_review_bound("1700000000000", Bound::Start).unwrap(), 1_700_000_000_000);
    assert_eq!(parse_review_bound("42", Bound::End).unwrap(), 42);
}

#[test]
fn test_parse_review_bound_dates_cover_whole_day() {
    let start = parse_review_bound("2025-05-10", Bound::Start).unwrap();
    let end = parse_review_bound("2025-05-10", Bound::End).unwrap();
    let next = parse_review_bound("2025-05-11", Bound::Start).unwrap();
    assert!(start < end);
    assert_eq!(end + 1, next);
}

#[test]
fn test_parse_review_bound_rejects_garbage() {
    let err = parse_review_bound("last week", Bound::Start).unwrap_err();
    assert!(matches!(err, CollectionError::InvalidArgument(_)));
}
