//! JSON admin API for Presensi.
//!
//! Exposes an axum [`Router`] backed by any
//! [`presensi_core::store::AttendanceStore`]. This is the device registry's
//! mutation surface: every successful device create, update or delete
//! notifies the [`DeviceWatcher`] before the response is sent, so the gateway
//! can resynchronise its broker subscriptions within the request.
//!
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", presensi_api::api_router(store.clone(), subscriptions.clone()))
//! ```

pub mod cards;
pub mod devices;
pub mod error;
pub mod presences;
pub mod schedules;
pub mod subjects;

use std::{future::Future, sync::Arc};

use axum::{
  Router,
  routing::{get, patch},
};
use presensi_core::store::AttendanceStore;

pub use error::ApiError;

/// Notified after the device registry changes.
pub trait DeviceWatcher: Send + Sync + 'static {
  fn devices_changed(&self) -> impl Future<Output = ()> + Send + '_;
}

/// Shared state for all handlers.
pub struct ApiState<S, W> {
  pub store:   Arc<S>,
  pub watcher: Arc<W>,
}

impl<S, W> Clone for ApiState<S, W> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), watcher: self.watcher.clone() }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, W>(store: Arc<S>, watcher: Arc<W>) -> Router<()>
where
  S: AttendanceStore + 'static,
  W: DeviceWatcher,
{
  Router::new()
    // Subjects
    .route("/subjects", get(subjects::list::<S, W>).post(subjects::create::<S, W>))
    // Devices
    .route("/devices", get(devices::list::<S, W>).post(devices::create::<S, W>))
    .route(
      "/devices/{id}",
      get(devices::get_one::<S, W>)
        .put(devices::update::<S, W>)
        .delete(devices::remove::<S, W>),
    )
    // Schedules
    .route("/schedules", get(schedules::list::<S, W>).post(schedules::create::<S, W>))
    .route("/schedules/{id}", get(schedules::get_one::<S, W>))
    // Cards
    .route("/cards", get(cards::list::<S, W>))
    .route("/cards/{uid}", patch(cards::update::<S, W>))
    // Presences
    .route("/presences", get(presences::list::<S, W>))
    .with_state(ApiState { store, watcher })
}

#[cfg(test)]
mod tests;
