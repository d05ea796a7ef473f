//! The Presensi gateway: MQTT tap handling plus the admin HTTP surface.
//!
//! [`Gateway`] wires the long-lived components together: the topic
//! subscription manager, the message dispatcher, the classification engine,
//! the active schedule cache and the absence backfill worker. The binary in
//! `main.rs` adds the MQTT connection and the HTTP listener around it.

pub mod auth;
pub mod backfill;
pub mod broker;
pub mod cache;
pub mod classify;
pub mod clock;
pub mod deadline;
pub mod dispatch;
pub mod error;
pub mod subscriptions;
pub mod task;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, middleware};
use presensi_core::store::AttendanceStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_auth};
use backfill::{BackfillWorker, DEFAULT_ABSENCE_NOTE};
use broker::{Broker, mqtt::MqttConfig};
use cache::ActiveScheduleCache;
use classify::ClassificationEngine;
use clock::Clock;
use deadline::Timeouts;
use dispatch::Dispatcher;
use subscriptions::TopicSubscriptionManager;
use task::TaskHandle;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime gateway configuration, deserialised from `config.toml` and
/// `PRESENSI_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct GatewayConfig {
  #[serde(default = "default_host")]
  pub host:                  String,
  #[serde(default = "default_port")]
  pub port:                  u16,
  #[serde(default = "default_store_path")]
  pub store_path:            PathBuf,
  pub auth_username:         String,
  pub auth_password_hash:    String,
  #[serde(default)]
  pub mqtt:                  MqttConfig,
  #[serde(default = "default_schedule_refresh_secs")]
  pub schedule_refresh_secs: u64,
  #[serde(default = "default_backfill_check_secs")]
  pub backfill_check_secs:   u64,
  #[serde(default = "default_store_timeout_ms")]
  pub store_timeout_ms:      u64,
  #[serde(default = "default_publish_timeout_ms")]
  pub publish_timeout_ms:    u64,
  #[serde(default = "default_absence_note")]
  pub absence_note:          String,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/presensi/presensi.db") }
fn default_schedule_refresh_secs() -> u64 { 15 }
fn default_backfill_check_secs() -> u64 { 60 }
fn default_store_timeout_ms() -> u64 { 5_000 }
fn default_publish_timeout_ms() -> u64 { 3_000 }
fn default_absence_note() -> String { DEFAULT_ABSENCE_NOTE.to_owned() }

impl GatewayConfig {
  pub fn timeouts(&self) -> Timeouts {
    Timeouts {
      store:   Duration::from_millis(self.store_timeout_ms),
      publish: Duration::from_millis(self.publish_timeout_ms),
    }
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.auth_username.clone(),
      password_hash: self.auth_password_hash.clone(),
    }
  }
}

// ─── Gateway ──────────────────────────────────────────────────────────────────

/// The assembled gateway components, sharing one store and one broker.
pub struct Gateway<S, B> {
  pub store:         Arc<S>,
  pub cache:         Arc<ActiveScheduleCache>,
  pub subscriptions: Arc<TopicSubscriptionManager<S, B>>,
  pub dispatcher:    Arc<Dispatcher<S, B>>,
  pub backfill:      Arc<BackfillWorker<S>>,
  pub clock:         Arc<dyn Clock>,
  timeouts:          Timeouts,
}

impl<S, B> Gateway<S, B>
where
  S: AttendanceStore + 'static,
  B: Broker,
{
  pub fn new(
    store: Arc<S>,
    broker: Arc<B>,
    clock: Arc<dyn Clock>,
    timeouts: Timeouts,
    absence_note: impl Into<String>,
  ) -> Self {
    let cache = Arc::new(ActiveScheduleCache::new());
    let subscriptions = Arc::new(TopicSubscriptionManager::new(
      store.clone(),
      broker.clone(),
      timeouts.store,
    ));
    let engine =
      Arc::new(ClassificationEngine::new(store.clone(), cache.clone(), timeouts.store));
    let dispatcher = Arc::new(Dispatcher::new(
      store.clone(),
      broker,
      subscriptions.clone(),
      engine,
      clock.clone(),
      timeouts,
    ));
    let backfill =
      Arc::new(BackfillWorker::new(store.clone(), absence_note, timeouts.store));

    Self { store, cache, subscriptions, dispatcher, backfill, clock, timeouts }
  }

  /// Load the active schedule and subscribe to every registered topic.
  pub async fn start(&self) -> Result<(), Error> {
    self
      .cache
      .refresh(self.store.as_ref(), self.clock.now(), self.timeouts.store)
      .await?;
    let report = self.subscriptions.refresh().await?;
    tracing::info!(topics = report.subscribed.len(), "gateway started");
    Ok(())
  }

  /// Start the schedule cache refresher and the backfill scheduler.
  pub fn spawn_background(
    &self,
    schedule_refresh: Duration,
    backfill_check: Duration,
  ) -> Vec<TaskHandle> {
    vec![
      self.cache.clone().spawn_refresher(
        self.store.clone(),
        self.clock.clone(),
        schedule_refresh,
        self.timeouts.store,
      ),
      self.backfill.clone().spawn_scheduler(self.clock.clone(), backfill_check),
    ]
  }

  /// The admin API under `/api`, behind Basic auth.
  pub fn router(&self, auth: Arc<AuthConfig>) -> Router {
    router(self.store.clone(), self.subscriptions.clone(), auth)
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the HTTP [`Router`]: `presensi_api` nested under `/api`, every
/// request authenticated and traced.
pub fn router<S, W>(store: Arc<S>, watcher: Arc<W>, auth: Arc<AuthConfig>) -> Router
where
  S: AttendanceStore + 'static,
  W: presensi_api::DeviceWatcher,
{
  let api = presensi_api::api_router(store, watcher)
    .layer(middleware::from_fn_with_state(auth, require_auth));
  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}
