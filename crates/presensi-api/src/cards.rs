//! Handlers for `/cards` endpoints.
//!
//! Cards are enrolled from devices (`record` mode); administrators only assign
//! and (de)activate them here.

use axum::{
  Json,
  extract::{Path, State},
};
use presensi_core::{
  Error,
  card::{Card, CardUpdate},
  store::AttendanceStore,
};

use crate::{ApiState, DeviceWatcher, error::ApiError};

/// `GET /cards`
pub async fn list<S, W>(
  State(state): State<ApiState<S, W>>,
) -> Result<Json<Vec<Card>>, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let cards = state.store.list_cards().await.map_err(ApiError::store)?;
  Ok(Json(cards))
}

/// `PATCH /cards/:uid`, body: `{"subject_id":"…","is_active":true}`
pub async fn update<S, W>(
  State(state): State<ApiState<S, W>>,
  Path(uid): Path<String>,
  Json(body): Json<CardUpdate>,
) -> Result<Json<Card>, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  if let Some(subject_id) = body.subject_id {
    state
      .store
      .get_subject(subject_id)
      .await
      .map_err(ApiError::store)?
      .ok_or(Error::SubjectNotFound(subject_id))?;
  }

  let card = state
    .store
    .update_card(uid.clone(), body)
    .await
    .map_err(ApiError::store)?
    .ok_or(Error::CardNotFound(uid))?;
  Ok(Json(card))
}
