//! Error type for `presensi-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] presensi_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("row {0} missing immediately after insert")]
  RowVanished(uuid::Uuid),

  #[error("unknown {column} value: {value:?}")]
  UnknownVariant { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
