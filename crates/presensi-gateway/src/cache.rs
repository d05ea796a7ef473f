//! Active Schedule Cache.
//!
//! Holds the schedule whose window contains "now", swapped wholesale by a
//! background refresher so taps never hit the store to find it.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDateTime;
use presensi_core::{Result, schedule::Schedule, store::AttendanceStore};
use tokio::sync::RwLock;

use crate::{clock::Clock, deadline::store_call, task::TaskHandle};

#[derive(Default)]
pub struct ActiveScheduleCache {
  current: RwLock<Option<Arc<Schedule>>>,
}

impl ActiveScheduleCache {
  pub fn new() -> Self { Self::default() }

  pub async fn get(&self) -> Option<Arc<Schedule>> { self.current.read().await.clone() }

  pub async fn set(&self, schedule: Option<Schedule>) {
    *self.current.write().await = schedule.map(Arc::new);
  }

  /// Look up the active schedule for `now` and swap it in. On error the
  /// previous value is kept.
  pub async fn refresh<S: AttendanceStore>(
    &self,
    store: &S,
    now: NaiveDateTime,
    timeout: Duration,
  ) -> Result<Option<Arc<Schedule>>> {
    let found = store_call(timeout, "active schedule lookup", store.get_active_schedule(now))
      .await?
      .map(Arc::new);

    let mut current = self.current.write().await;
    let changed = current.as_ref().map(|s| s.schedule_id) != found.as_ref().map(|s| s.schedule_id);
    if changed {
      match &found {
        Some(s) => tracing::info!(schedule_id = %s.schedule_id, name = %s.name, "active schedule changed"),
        None => tracing::info!("no active schedule"),
      }
    }
    *current = found.clone();
    Ok(found)
  }

  /// Refresh every `every`, starting immediately, until stopped.
  pub fn spawn_refresher<S>(
    self: Arc<Self>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    every: Duration,
    timeout: Duration,
  ) -> TaskHandle
  where
    S: AttendanceStore + 'static,
  {
    TaskHandle::spawn("schedule cache refresher", move |mut stop| async move {
      let mut ticker = tokio::time::interval(every);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        tokio::select! {
          _ = &mut stop => break,
          _ = ticker.tick() => {}
        }
        if let Err(e) = self.refresh(store.as_ref(), clock.now(), timeout).await {
          tracing::error!(error = %e, "active schedule refresh failed; keeping previous value");
        }
      }
    })
  }
}
