// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input validation for wire-format strings.
//!
//! Formats are exact: `YYYY-MM-DD` dates, `HH:MM` times, `HH:MM-HH:MM`
//! labels. Anything looser is rejected here rather than deeper in the stack.

use chrono::{NaiveDate, NaiveTime};

use crate::error::GearbookError;

/// Normalize a phone number to digits with an optional leading `+`.
///
/// Spaces, tabs, dashes, and parentheses are stripped. After normalization
/// the number must be 10 to 15 decimal digits. A missing `+` is retained as
/// local format rather than rejected.
pub fn normalize_phone(raw: &str) -> Result<String, GearbookError> {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            ' ' | '\t' | '-' | '(' | ')' => {}
            other => cleaned.push(other),
        }
    }

    let (prefix, digits) = match cleaned.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", cleaned.as_str()),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(GearbookError::InvalidArgument(format!(
            "phone number contains non-digit characters: {raw:?}"
        )));
    }
    let len = digits.chars().count();
    if !(10..=15).contains(&len) {
        return Err(GearbookError::InvalidArgument(format!(
            "phone number must have 10-15 digits, got {len}"
        )));
    }

    Ok(format!("{prefix}{digits}"))
}

/// Parse an exact `YYYY-MM-DD` date string.
pub fn parse_date(s: &str) -> Result<NaiveDate, GearbookError> {
    if s.len() != 10 {
        return Err(GearbookError::InvalidArgument(format!(
            "date must be YYYY-MM-DD, got {s:?}"
        )));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        GearbookError::InvalidArgument(format!("date must be YYYY-MM-DD, got {s:?}"))
    })
}

/// Parse an exact `HH:MM` time-of-day string.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, GearbookError> {
    if s.len() != 5 {
        return Err(GearbookError::InvalidArgument(format!(
            "time must be HH:MM, got {s:?}"
        )));
    }
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| GearbookError::InvalidArgument(format!("time must be HH:MM, got {s:?}")))
}

/// Parse an exact `HH:MM-HH:MM` interval label into (start, end).
pub fn parse_time_label(s: &str) -> Result<(NaiveTime, NaiveTime), GearbookError> {
    if s.len() != 11 {
        return Err(GearbookError::InvalidArgument(format!(
            "time label must be HH:MM-HH:MM, got {s:?}"
        )));
    }
    // HH:MM contains no '-', so the separator position is unambiguous.
    let (start_raw, end_raw) = s.split_at(5);
    let end_raw = end_raw.strip_prefix('-').ok_or_else(|| {
        GearbookError::InvalidArgument(format!("time label must be HH:MM-HH:MM, got {s:?}"))
    })?;
    let start = parse_hhmm(start_raw)?;
    let end = parse_hhmm(end_raw)?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn phone_strips_separators() {
        assert_eq!(
            normalize_phone("+7 (912) 345-67-89").unwrap(),
            "+79123456789"
        );
        assert_eq!(normalize_phone("8912\t345 6789").unwrap(), "89123456789");
    }

    #[test]
    fn phone_retains_local_format_without_plus() {
        assert_eq!(normalize_phone("9123456789").unwrap(), "9123456789");
    }

    #[test]
    fn phone_rejects_letters_and_bad_lengths() {
        assert!(normalize_phone("call-me-maybe").is_err());
        assert!(normalize_phone("+7912abc6789").is_err());
        assert!(normalize_phone("123456789").is_err()); // 9 digits
        assert!(normalize_phone("1234567890123456").is_err()); // 16 digits
        assert!(normalize_phone("").is_err());
        assert!(normalize_phone("+").is_err());
    }

    #[test]
    fn date_requires_exact_format() {
        assert_eq!(
            parse_date("2025-12-01").unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()
        );
        assert!(parse_date("2025-1-5").is_err());
        assert!(parse_date("2025/12/01").is_err());
        assert!(parse_date("2025-13-01").is_err());
        assert!(parse_date("01-12-2025").is_err());
        assert!(parse_date("oops").is_err());
    }

    #[test]
    fn hhmm_requires_exact_format() {
        assert_eq!(
            parse_hhmm("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert!(parse_hhmm("9:30").is_err());
        assert!(parse_hhmm("24:00").is_err());
        assert!(parse_hhmm("09:60").is_err());
        assert!(parse_hhmm("09-30").is_err());
    }

    #[test]
    fn time_label_splits_on_middle_dash() {
        let (start, end) = parse_time_label("09:00-10:00").unwrap();
        assert_eq!(start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(end, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert!(parse_time_label("09:00 - 10:00").is_err());
        assert!(parse_time_label("09:00-").is_err());
        assert!(parse_time_label("09:00").is_err());
    }

    proptest! {
        #[test]
        fn phone_normalization_is_idempotent(
            plus in proptest::bool::ANY,
            digits in proptest::collection::vec(0u8..10, 10..=15),
        ) {
            let body: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
            let raw = if plus { format!("+{body}") } else { body };
            let once = normalize_phone(&raw).unwrap();
            let twice = normalize_phone(&once).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn phone_accepts_any_separator_arrangement(
            digits in proptest::collection::vec(0u8..10, 10..=15),
            seps in proptest::collection::vec(0usize..4, 0..6),
        ) {
            let mut raw: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
            for (i, sep) in seps.iter().enumerate() {
                let ch = [' ', '-', '(', ')'][*sep];
                let pos = (i * 3) % raw.len();
                raw.insert(pos, ch);
            }
            let normalized = normalize_phone(&raw).unwrap();
            prop_assert_eq!(normalized.len(), digits.len());
        }
    }
}
