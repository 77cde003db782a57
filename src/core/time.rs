use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// Whole seconds from `start` to `end`, clamped at zero when the interval is
/// negative (clock skew between two wall-clock reads).
pub fn seconds_between(start: OffsetDateTime, end: OffsetDateTime) -> u64 {
    (end - start).whole_seconds().max(0) as u64
}
