//! Wall-clock source. Schedules are local times of day, so the gateway works
//! in naive local date-times throughout.

use std::sync::{Mutex, PoisonError};

use chrono::{Local, NaiveDateTime, TimeDelta};

pub trait Clock: Send + Sync {
  fn now(&self) -> NaiveDateTime;
}

/// The host's local time.
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> NaiveDateTime { Local::now().naive_local() }
}

/// A clock that only moves when told to.
pub struct FixedClock(Mutex<NaiveDateTime>);

impl FixedClock {
  pub fn new(at: NaiveDateTime) -> Self { Self(Mutex::new(at)) }

  pub fn set(&self, at: NaiveDateTime) {
    *self.0.lock().unwrap_or_else(PoisonError::into_inner) = at;
  }

  pub fn advance(&self, by: TimeDelta) {
    let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
    *now += by;
  }
}

impl Clock for FixedClock {
  fn now(&self) -> NaiveDateTime {
    *self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
