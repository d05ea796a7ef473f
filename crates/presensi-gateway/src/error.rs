//! Error types and axum `IntoResponse` implementation.

use axum::{
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error(transparent)]
  Core(#[from] presensi_core::Error),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"presensi\""),
        );
        res
      }
      Error::Core(e) => {
        tracing::error!(error = %e, "gateway error");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
          .into_response()
      }
    }
  }
}
