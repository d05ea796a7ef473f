//! Handlers for `/devices` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/devices` | All devices with their modes |
//! | `POST`   | `/devices` | Body: `{"name":"D1","modes":["presence"]}`; 409 on a taken name |
//! | `GET`    | `/devices/:id` | 404 if not found |
//! | `PUT`    | `/devices/:id` | Replaces name and modes |
//! | `DELETE` | `/devices/:id` | 204 on success |
//!
//! Every successful mutation awaits [`DeviceWatcher::devices_changed`] before
//! responding.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use presensi_core::{
  Error,
  device::{Device, NewDevice},
  store::{AttendanceStore, Unique},
};
use uuid::Uuid;

use crate::{ApiState, DeviceWatcher, error::ApiError};

/// `GET /devices`
pub async fn list<S, W>(
  State(state): State<ApiState<S, W>>,
) -> Result<Json<Vec<Device>>, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let devices = state
    .store
    .list_devices_with_modes()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(devices))
}

/// `GET /devices/:id`
pub async fn get_one<S, W>(
  State(state): State<ApiState<S, W>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Device>, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let device = state
    .store
    .get_device(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(Error::DeviceNotFound(id))?;
  Ok(Json(device))
}

/// `POST /devices`
pub async fn create<S, W>(
  State(state): State<ApiState<S, W>>,
  Json(body): Json<NewDevice>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let input = body.normalized()?;
  let name = input.name.clone();
  let device = match state.store.create_device(input).await.map_err(ApiError::store)? {
    Unique::Stored(d) => d,
    Unique::Duplicate => return Err(Error::DeviceConflict(name).into()),
  };

  tracing::info!(device = %device.name, modes = ?device.modes, "device created");
  state.watcher.devices_changed().await;
  Ok((StatusCode::CREATED, Json(device)))
}

/// `PUT /devices/:id`
pub async fn update<S, W>(
  State(state): State<ApiState<S, W>>,
  Path(id): Path<Uuid>,
  Json(body): Json<NewDevice>,
) -> Result<Json<Device>, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let input = body.normalized()?;
  let name = input.name.clone();
  let device = match state
    .store
    .update_device(id, input)
    .await
    .map_err(ApiError::store)?
  {
    None => return Err(Error::DeviceNotFound(id).into()),
    Some(Unique::Duplicate) => return Err(Error::DeviceConflict(name).into()),
    Some(Unique::Stored(d)) => d,
  };

  tracing::info!(device = %device.name, modes = ?device.modes, "device updated");
  state.watcher.devices_changed().await;
  Ok(Json(device))
}

/// `DELETE /devices/:id`
pub async fn remove<S, W>(
  State(state): State<ApiState<S, W>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let removed = state.store.delete_device(id).await.map_err(ApiError::store)?;
  if !removed {
    return Err(Error::DeviceNotFound(id).into());
  }

  tracing::info!(device_id = %id, "device deleted");
  state.watcher.devices_changed().await;
  Ok(StatusCode::NO_CONTENT)
}
