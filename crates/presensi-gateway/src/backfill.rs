//! Absence Backfill Worker.
//!
//! After a schedule's window closes, every subject without a presence row for
//! that schedule and day gets an `alpha` row written by the system.

use std::{
  collections::{BTreeSet, HashMap},
  sync::Arc,
  time::Duration,
};

use chrono::{Days, NaiveDate, NaiveDateTime};
use presensi_core::{
  Error, Result,
  presence::{CreatorKind, NewPresence, PresenceStatus},
  store::AttendanceStore,
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{clock::Clock, deadline::store_call, task::TaskHandle};

pub const DEFAULT_ABSENCE_NOTE: &str = "auto-generated: no tap recorded";

/// Windows that closed while the gateway was running but were missed by
/// ticks are caught up for at most this many days.
const MAX_CATCH_UP_DAYS: u64 = 7;

/// Scheduler state carried between [`BackfillWorker::run_due`] calls.
#[derive(Debug, Default)]
pub struct BackfillProgress {
  last_tick: Option<NaiveDateTime>,
  /// Closed windows still waiting for a successful run.
  pending:   BTreeSet<(NaiveDate, Uuid)>,
}

impl BackfillProgress {
  pub fn pending(&self) -> usize { self.pending.len() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
  pub schedule_id: Uuid,
  pub date:        NaiveDate,
  /// Subjects found without a row when the run started.
  pub missing:     usize,
  /// Rows actually written; lower than `missing` if a tap raced the run.
  pub inserted:    u64,
}

pub struct BackfillWorker<S> {
  store:         Arc<S>,
  note:          String,
  store_timeout: Duration,
  locks:         Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl<S: AttendanceStore> BackfillWorker<S> {
  pub fn new(store: Arc<S>, note: impl Into<String>, store_timeout: Duration) -> Self {
    Self {
      store,
      note: note.into(),
      store_timeout,
      locks: Mutex::new(HashMap::new()),
    }
  }

  async fn lock_for(&self, schedule_id: Uuid) -> Arc<Mutex<()>> {
    self.locks.lock().await.entry(schedule_id).or_default().clone()
  }

  /// Write `alpha` rows for subjects with no presence for `schedule_id` on
  /// `as_of`. Safe to re-run; a second run finds nobody missing.
  pub async fn backfill_absences(
    &self,
    schedule_id: Uuid,
    as_of: NaiveDate,
  ) -> Result<BackfillReport> {
    let lock = self.lock_for(schedule_id).await;
    let _guard = lock.lock().await;

    let schedule =
      store_call(self.store_timeout, "schedule lookup", self.store.get_schedule(schedule_id))
        .await?
        .ok_or(Error::ScheduleNotFound(schedule_id))?;

    let missing = store_call(
      self.store_timeout,
      "missing presence query",
      self.store.list_subjects_missing_presence(schedule_id, as_of),
    )
    .await?;

    let mut report =
      BackfillReport { schedule_id, date: as_of, missing: missing.len(), inserted: 0 };
    if missing.is_empty() {
      tracing::debug!(schedule_id = %schedule_id, date = %as_of, "backfill: nobody missing");
      return Ok(report);
    }

    let rows = missing
      .into_iter()
      .map(|subject| NewPresence {
        subject_id:    subject.subject_id,
        schedule_id,
        schedule_name: schedule.name.clone(),
        status:        PresenceStatus::Alpha,
        note:          Some(self.note.clone()),
        created_by:    CreatorKind::System,
        presence_date: as_of,
      })
      .collect();

    report.inserted = store_call(
      self.store_timeout,
      "absence bulk insert",
      self.store.bulk_create_presences(rows),
    )
    .await?;

    tracing::info!(
      schedule_id = %schedule_id,
      date = %as_of,
      missing = report.missing,
      inserted = report.inserted,
      "absences backfilled"
    );
    Ok(report)
  }

  /// Backfill every schedule window that closed since the previous tick.
  ///
  /// The first tick only considers windows that closed earlier today. A
  /// window closing between two ticks is queued even when the ticks straddle
  /// midnight, and a failed run stays queued for the next tick.
  pub async fn run_due(
    &self,
    now: NaiveDateTime,
    progress: &mut BackfillProgress,
  ) -> Vec<BackfillReport> {
    let schedules =
      match store_call(self.store_timeout, "schedule list", self.store.list_schedules()).await {
        Ok(s) => s,
        Err(e) => {
          tracing::error!(error = %e, "backfill: could not list schedules; retrying next tick");
          return Vec::new();
        }
      };

    let first_day = match progress.last_tick {
      Some(last) => last.date().max(now.date() - Days::new(MAX_CATCH_UP_DAYS)),
      None => now.date(),
    };
    for schedule in &schedules {
      let mut date = first_day;
      while date <= now.date() {
        let closed_at = date.and_time(schedule.finish_time);
        let after_last = progress.last_tick.is_none_or(|last| closed_at >= last);
        if after_last && closed_at < now {
          progress.pending.insert((date, schedule.schedule_id));
        }
        let Some(next) = date.succ_opt() else { break };
        date = next;
      }
    }
    progress.last_tick = Some(now);

    let mut reports = Vec::new();
    let due: Vec<(NaiveDate, Uuid)> = progress.pending.iter().copied().collect();
    for (date, schedule_id) in due {
      match self.backfill_absences(schedule_id, date).await {
        Ok(report) => {
          progress.pending.remove(&(date, schedule_id));
          reports.push(report);
        }
        Err(Error::ScheduleNotFound(_)) => {
          progress.pending.remove(&(date, schedule_id));
        }
        Err(e) => tracing::error!(
          schedule_id = %schedule_id,
          date = %date,
          error = %e,
          "backfill failed; retrying next tick"
        ),
      }
    }
    reports
  }

  /// Check for due schedules every `every` until stopped.
  pub fn spawn_scheduler(self: Arc<Self>, clock: Arc<dyn Clock>, every: Duration) -> TaskHandle
  where
    S: 'static,
  {
    TaskHandle::spawn("absence backfill scheduler", move |mut stop| async move {
      let mut progress = BackfillProgress::default();
      let mut ticker = tokio::time::interval(every);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        tokio::select! {
          _ = &mut stop => break,
          _ = ticker.tick() => {}
        }
        self.run_due(clock.now(), &mut progress).await;
      }
    })
  }
}
