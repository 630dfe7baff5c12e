//! Wall-clock source for audit stamps.

use std::sync::Mutex;

use chrono::{DateTime, Duration, DurationRound, Utc};

/// Supplies the timestamps written into lifecycle headers.
///
/// Implementations must return values truncated to microseconds; that is the
/// precision the stores persist.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { truncate_micros(Utc::now()) }
}

/// A manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
  pub fn new(at: DateTime<Utc>) -> Self { Self(Mutex::new(truncate_micros(at))) }

  pub fn set(&self, at: DateTime<Utc>) {
    *self.0.lock().unwrap_or_else(|p| p.into_inner()) = truncate_micros(at);
  }

  pub fn advance(&self, by: Duration) {
    let mut guard = self.0.lock().unwrap_or_else(|p| p.into_inner());
    *guard += by;
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> { *self.0.lock().unwrap_or_else(|p| p.into_inner()) }
}

pub fn truncate_micros(at: DateTime<Utc>) -> DateTime<Utc> {
  at.duration_trunc(Duration::microseconds(1)).unwrap_or(at)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn fixed_clock_truncates_and_advances() {
    let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
    let clock = FixedClock::new(at);
    assert_eq!(clock.now().timestamp_subsec_nanos(), 123_456_000);

    clock.advance(Duration::seconds(5));
    assert_eq!(clock.now().timestamp(), 1_700_000_005);
  }
}
