//! Schedules: daily time-of-day windows that taps are classified against.
//!
//! A schedule is never "switched on"; whether it is active is computed from
//! the wall clock:
//!
//! ```text
//!   start_presence      start_time                 finish_time
//!        |── present ──────|── late ──────────────────────|
//!   ^ too early (inclusive)
//! ```

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, presence::PresenceStatus};

/// A persisted schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
  pub schedule_id:    Uuid,
  pub name:           String,
  pub start_presence: NaiveTime,
  pub start_time:     NaiveTime,
  pub finish_time:    NaiveTime,
  pub created_at:     DateTime<Utc>,
}

impl Schedule {
  /// Whether `t` falls inside `[start_presence, finish_time]`.
  pub fn contains(&self, t: NaiveTime) -> bool {
    self.start_presence <= t && t <= self.finish_time
  }

  /// Decide the status of a tap at time-of-day `t`.
  ///
  /// Taps at or before `start_presence` are rejected with
  /// [`Error::TooEarly`] rather than given a default status.
  pub fn classify(&self, t: NaiveTime) -> Result<PresenceStatus> {
    if t <= self.start_presence {
      Err(Error::TooEarly { opens_after: self.start_presence })
    } else if t < self.start_time {
      Ok(PresenceStatus::Present)
    } else {
      Ok(PresenceStatus::Late)
    }
  }

  /// Whether the window has closed for the day at time-of-day `t`.
  pub fn has_finished(&self, t: NaiveTime) -> bool { t > self.finish_time }
}

/// Input for creating a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSchedule {
  pub name:           String,
  pub start_presence: NaiveTime,
  pub start_time:     NaiveTime,
  pub finish_time:    NaiveTime,
}

impl NewSchedule {
  /// Check `start_presence < start_time < finish_time` and a non-blank name.
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::Validation("schedule name must not be empty".into()));
    }
    if !(self.start_presence < self.start_time
      && self.start_time < self.finish_time)
    {
      return Err(Error::InvalidWindow {
        start_presence: self.start_presence,
        start_time:     self.start_time,
        finish_time:    self.finish_time,
      });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn t(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap()
  }

  fn morning() -> Schedule {
    Schedule {
      schedule_id:    Uuid::new_v4(),
      name:           "Morning".into(),
      start_presence: t(7, 0, 0),
      start_time:     t(7, 30, 0),
      finish_time:    t(15, 0, 0),
      created_at:     Utc::now(),
    }
  }

  #[test]
  fn one_second_before_start_is_present() {
    assert_eq!(morning().classify(t(7, 29, 59)).unwrap(), PresenceStatus::Present);
  }

  #[test]
  fn exactly_start_time_is_late() {
    assert_eq!(morning().classify(t(7, 30, 0)).unwrap(), PresenceStatus::Late);
    assert_eq!(morning().classify(t(14, 59, 0)).unwrap(), PresenceStatus::Late);
  }

  #[test]
  fn at_or_before_start_presence_is_too_early() {
    let s = morning();
    assert!(matches!(s.classify(t(7, 0, 0)), Err(Error::TooEarly { .. })));
    assert!(matches!(s.classify(t(6, 0, 0)), Err(Error::TooEarly { .. })));
    assert_eq!(s.classify(t(7, 0, 1)).unwrap(), PresenceStatus::Present);
  }

  #[test]
  fn window_bounds_are_inclusive() {
    let s = morning();
    assert!(s.contains(t(7, 0, 0)));
    assert!(s.contains(t(15, 0, 0)));
    assert!(!s.contains(t(15, 0, 1)));
    assert!(!s.has_finished(t(15, 0, 0)));
    assert!(s.has_finished(t(15, 0, 1)));
  }

  #[test]
  fn validate_rejects_out_of_order_window() {
    let bad = NewSchedule {
      name:           "Broken".into(),
      start_presence: t(7, 30, 0),
      start_time:     t(7, 30, 0),
      finish_time:    t(15, 0, 0),
    };
    assert!(matches!(bad.validate(), Err(Error::InvalidWindow { .. })));

    let ok = NewSchedule { start_presence: t(7, 0, 0), ..bad };
    assert!(ok.validate().is_ok());
  }
}
