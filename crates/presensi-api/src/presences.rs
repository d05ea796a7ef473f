//! Handler for `GET /presences?date=YYYY-MM-DD[&schedule_id=…]`.

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::NaiveDate;
use presensi_core::{presence::Presence, store::AttendanceStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, DeviceWatcher, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub date:        NaiveDate,
  pub schedule_id: Option<Uuid>,
}

/// `GET /presences`
pub async fn list<S, W>(
  State(state): State<ApiState<S, W>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Presence>>, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let presences = state
    .store
    .list_presences(params.date, params.schedule_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(presences))
}
