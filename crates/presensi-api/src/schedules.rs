//! Handlers for `/schedules` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/schedules` | Ordered by `start_presence` |
//! | `POST` | `/schedules` | 400 unless `start_presence < start_time < finish_time` |
//! | `GET`  | `/schedules/:id` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use presensi_core::{
  Error,
  schedule::{NewSchedule, Schedule},
  store::AttendanceStore,
};
use uuid::Uuid;

use crate::{ApiState, DeviceWatcher, error::ApiError};

/// `GET /schedules`
pub async fn list<S, W>(
  State(state): State<ApiState<S, W>>,
) -> Result<Json<Vec<Schedule>>, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let schedules = state.store.list_schedules().await.map_err(ApiError::store)?;
  Ok(Json(schedules))
}

/// `POST /schedules`
pub async fn create<S, W>(
  State(state): State<ApiState<S, W>>,
  Json(body): Json<NewSchedule>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  body.validate()?;
  let schedule = state
    .store
    .create_schedule(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(schedule)))
}

/// `GET /schedules/:id`
pub async fn get_one<S, W>(
  State(state): State<ApiState<S, W>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Schedule>, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let schedule = state
    .store
    .get_schedule(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(Error::ScheduleNotFound(id))?;
  Ok(Json(schedule))
}
