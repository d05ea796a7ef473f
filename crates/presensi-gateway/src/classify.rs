//! Presence Classification Engine.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDateTime;
use presensi_core::{
  Error, Result,
  presence::{CreatorKind, NewPresence, Presence},
  store::{AttendanceStore, Unique},
};
use uuid::Uuid;

use crate::{cache::ActiveScheduleCache, deadline::store_call};

/// Turns a tap by a known subject into a persisted presence row against the
/// cached active schedule.
pub struct ClassificationEngine<S> {
  store:         Arc<S>,
  cache:         Arc<ActiveScheduleCache>,
  store_timeout: Duration,
}

impl<S: AttendanceStore> ClassificationEngine<S> {
  pub fn new(store: Arc<S>, cache: Arc<ActiveScheduleCache>, store_timeout: Duration) -> Self {
    Self { store, cache, store_timeout }
  }

  /// Record a tap at `now` for `subject_id`.
  ///
  /// A cached schedule whose window does not contain `now` counts as no
  /// active schedule.
  ///
  /// A second tap for the same schedule and day fails with
  /// [`Error::AlreadyRecorded`] and leaves the first row untouched.
  pub async fn classify(&self, subject_id: Uuid, now: NaiveDateTime) -> Result<Presence> {
    let schedule = self
      .cache
      .get()
      .await
      .filter(|s| s.contains(now.time()))
      .ok_or(Error::NoActiveSchedule)?;
    let status = schedule.classify(now.time())?;

    store_call(self.store_timeout, "subject lookup", self.store.get_subject(subject_id))
      .await?
      .ok_or(Error::SubjectNotFound(subject_id))?;

    let input = NewPresence {
      subject_id,
      schedule_id: schedule.schedule_id,
      schedule_name: schedule.name.clone(),
      status,
      note: None,
      created_by: CreatorKind::Tap,
      presence_date: now.date(),
    };
    match store_call(self.store_timeout, "presence insert", self.store.create_presence(input))
      .await?
    {
      Unique::Stored(presence) => {
        tracing::info!(
          subject_id = %subject_id,
          schedule_id = %presence.schedule_id,
          status = %presence.status,
          "presence recorded"
        );
        Ok(presence)
      }
      Unique::Duplicate => Err(Error::AlreadyRecorded {
        subject_id,
        schedule_id: schedule.schedule_id,
        date: now.date(),
      }),
    }
  }
}
