//! Human-readable duration rendering and millisecond serde helpers.

use std::time::Duration;

use chrono::TimeDelta;

/// Render a duration largest-unit-first among hours, minutes, seconds.
///
/// Zero units are omitted; milliseconds appear only when the whole value is
/// sub-second. Examples: 0 -> "0ms", 1001ms -> "1s", 61000ms -> "1m1s",
/// 3661000ms -> "1h1m1s", 60000ms -> "1m".
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}s"));
    }
    if out.is_empty() {
        out = format!("{}ms", duration.as_millis());
    }
    out
}

/// Render a signed duration delta: "+"/"-" prefix, then the absolute value
/// through the same unit-peeling as [`format_duration`].
pub fn format_delta(delta: TimeDelta) -> String {
    let sign = if delta < TimeDelta::zero() { '-' } else { '+' };
    let abs_ms = delta.num_milliseconds().unsigned_abs();
    format!("{sign}{}", format_duration(Duration::from_millis(abs_ms)))
}

/// Serde adapter: `Option<Duration>` as integer milliseconds.
///
/// Persisted run state stores durations as plain numbers so the files stay
/// greppable and other tooling can consume them.
pub(crate) mod opt_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms: Option<u64> = Option::deserialize(deserializer)?;
        Ok(ms.map(Duration::from_millis))
    }
}
