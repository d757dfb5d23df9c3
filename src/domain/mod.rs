use time::OffsetDateTime;

pub mod auth;
pub mod message;
pub mod room;

/// Current wall-clock time as unix epoch milliseconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_unix_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
