use chrono::{DateTime, SubsecRound, Utc};

/// Render a UTC timestamp as RFC 3339 with nanosecond precision.
///
/// Fractional seconds carry up to nine digits with trailing zeros trimmed and
/// are omitted when zero, e.g. `2024-03-01T12:00:00.5Z`.
pub fn rfc3339_nanos(ts: &DateTime<Utc>) -> String {
    let base = ts.format("%Y-%m-%dT%H:%M:%S");
    let nanos = ts.timestamp_subsec_nanos();
    if nanos == 0 {
        return format!("{base}Z");
    }
    let fraction = format!("{nanos:09}");
    format!("{base}.{}Z", fraction.trim_end_matches('0'))
}

/// Drop sub-microsecond precision.
///
/// The relational store keeps microseconds; truncating before anything is
/// signed or hashed keeps the values identical after a round-trip.
pub fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Current wall-clock time at storage precision.
pub fn now_micros() -> DateTime<Utc> {
    truncate_to_micros(Utc::now())
}
