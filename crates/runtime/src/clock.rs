use time::OffsetDateTime;

/// Wall-clock time as epoch milliseconds.
pub fn unix_now_ms() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or(0)
}
