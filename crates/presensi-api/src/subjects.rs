//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | Ordered by name |
//! | `POST` | `/subjects` | Body: `{"name":"Siti"}` |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use presensi_core::{store::AttendanceStore, subject::Subject};
use serde::Deserialize;

use crate::{ApiState, DeviceWatcher, error::ApiError};

/// `GET /subjects`
pub async fn list<S, W>(
  State(state): State<ApiState<S, W>>,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let subjects = state.store.list_subjects().await.map_err(ApiError::store)?;
  Ok(Json(subjects))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /subjects`, body: `{"name":"Siti"}`
pub async fn create<S, W>(
  State(state): State<ApiState<S, W>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
  W: DeviceWatcher,
{
  let name = body.name.trim();
  if name.is_empty() {
    return Err(ApiError::BadRequest("subject name must not be empty".into()));
  }
  let subject = state
    .store
    .add_subject(name.to_owned())
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(subject)))
}
