//! Millisecond timestamps and identifier allocation.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Hands out strictly increasing millisecond timestamps.
///
/// Notes, attachments and categories use their creation timestamp as primary
/// key. Two entities created within the same millisecond would otherwise share
/// a key and the second insert-or-replace would silently overwrite the first.
#[derive(Debug, Default)]
pub struct IdClock {
    last: AtomicI64,
}

impl IdClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current time in millis, bumped past the last value handed out.
    pub fn next(&self) -> i64 {
        let now = now_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = if now > last { now } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

/// True if `timestamp` (epoch millis) lies after `now`.
pub fn is_future(timestamp: Option<i64>, now: i64) -> bool {
    matches!(timestamp, Some(ts) if ts > now)
}
