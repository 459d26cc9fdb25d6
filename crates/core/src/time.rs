// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Timestamp formatting and recovery-target parsing.

use chrono::{DateTime, Duration, Utc};

use crate::error::EngineError;

/// Render a timestamp the way it is persisted: ISO-8601 UTC.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// A point in time a PITR recovery should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryTarget(pub DateTime<Utc>);

/// Parse a recovery target: either ISO-8601, or a relative expression
/// `<integer> <unit> [ago]` (units: minutes, hours, days; a leading `-`
/// is equivalent to `ago`).
pub fn parse_recovery_target(input: &str, now: DateTime<Utc>) -> Result<RecoveryTarget, EngineError> {
    let trimmed = input.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(RecoveryTarget(ts.with_timezone(&Utc)));
    }

    parse_relative(trimmed, now)
        .ok_or_else(|| {
            EngineError::user_with_hint(
                format!("could not parse recovery target '{input}'"),
                "use ISO-8601 (2026-07-01T00:00:00Z) or a relative expression (\"10 minutes ago\", \"-2 hours\")",
            )
        })
}

fn parse_relative(input: &str, now: DateTime<Utc>) -> Option<RecoveryTarget> {
    let (negated, rest) = match input.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, input),
    };

    let rest = rest.strip_suffix("ago").map(str::trim).unwrap_or(rest);
    let mut parts = rest.split_whitespace();
    let count: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let duration = match unit.trim_end_matches('s') {
        "minute" | "min" => Duration::minutes(count),
        "hour" => Duration::hours(count),
        "day" => Duration::days(count),
        _ => return None,
    };

    let is_ago = negated || input.trim_end().ends_with("ago");
    let target = if is_ago { now - duration } else { now + duration };
    Some(RecoveryTarget(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso8601() {
        let now = Utc::now();
        let target = parse_recovery_target("2026-01-01T00:00:00Z", now).unwrap();
        assert_eq!(target.0.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn parses_relative_ago() {
        let now = Utc::now();
        let target = parse_recovery_target("10 minutes ago", now).unwrap();
        assert_eq!(target.0, now - Duration::minutes(10));
    }

    #[test]
    fn parses_relative_minus_prefix() {
        let now = Utc::now();
        let target = parse_recovery_target("-2 hours", now).unwrap();
        assert_eq!(target.0, now - Duration::hours(2));
    }

    #[test]
    fn parses_days_unit() {
        let now = Utc::now();
        let target = parse_recovery_target("1 day ago", now).unwrap();
        assert_eq!(target.0, now - Duration::days(1));
    }

    #[test]
    fn rejects_garbage() {
        let now = Utc::now();
        assert!(parse_recovery_target("not a time", now).is_err());
    }
}
