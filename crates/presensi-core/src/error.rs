//! Error types for `presensi-core`.
//!
//! Every failure the gateway can acknowledge to a device is one of these
//! variants. [`Error::kind`] folds them into the coarse [`ErrorKind`] that
//! decides the acknowledgment code.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no active schedule")]
  NoActiveSchedule,

  #[error("card not found: {0}")]
  CardNotFound(String),

  #[error("card {0} is not assigned to a subject")]
  CardUnassigned(String),

  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("schedule not found: {0}")]
  ScheduleNotFound(Uuid),

  #[error("device not found: {0}")]
  DeviceNotFound(Uuid),

  #[error("presence already recorded on {date} for subject {subject_id}")]
  AlreadyRecorded {
    subject_id:  Uuid,
    schedule_id: Uuid,
    date:        NaiveDate,
  },

  #[error("card already registered: {0}")]
  CardConflict(String),

  #[error("device name already taken: {0}")]
  DeviceConflict(String),

  #[error("card {0} is inactive")]
  CardInactive(String),

  #[error("too early: presence opens after {opens_after}")]
  TooEarly { opens_after: NaiveTime },

  #[error(
    "invalid schedule window: start_presence {start_presence} < start_time \
     {start_time} < finish_time {finish_time} does not hold"
  )]
  InvalidWindow {
    start_presence: NaiveTime,
    start_time:     NaiveTime,
    finish_time:    NaiveTime,
  },

  #[error("invalid device name: {0:?}")]
  InvalidDeviceName(String),

  #[error("unknown mode: {0:?}")]
  UnknownMode(String),

  #[error("invalid request: {0}")]
  Validation(String),

  #[error("{0} is not implemented")]
  NotImplemented(&'static str),

  #[error("transport error: {0}")]
  Transport(String),

  #[error("{0} timed out")]
  Timeout(&'static str),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification of an [`Error`], one per acknowledgment code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Conflict,
  Validation,
  Forbidden,
  TooEarly,
  NotImplemented,
  Transport,
  Store,
}

impl ErrorKind {
  /// HTTP-style status code carried in acknowledgment envelopes.
  pub fn code(self) -> u16 {
    match self {
      Self::NotFound => 404,
      Self::Conflict => 409,
      Self::Validation => 400,
      Self::Forbidden => 403,
      Self::TooEarly => 425,
      Self::NotImplemented => 501,
      Self::Transport => 502,
      Self::Store => 500,
    }
  }
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NoActiveSchedule
      | Self::CardNotFound(_)
      | Self::CardUnassigned(_)
      | Self::SubjectNotFound(_)
      | Self::ScheduleNotFound(_)
      | Self::DeviceNotFound(_) => ErrorKind::NotFound,
      Self::AlreadyRecorded { .. }
      | Self::CardConflict(_)
      | Self::DeviceConflict(_) => ErrorKind::Conflict,
      Self::CardInactive(_) => ErrorKind::Forbidden,
      Self::TooEarly { .. } => ErrorKind::TooEarly,
      Self::InvalidWindow { .. }
      | Self::InvalidDeviceName(_)
      | Self::UnknownMode(_)
      | Self::Validation(_) => ErrorKind::Validation,
      Self::NotImplemented(_) => ErrorKind::NotImplemented,
      Self::Transport(_) => ErrorKind::Transport,
      Self::Timeout(_) | Self::Store(_) => ErrorKind::Store,
    }
  }

  pub fn code(&self) -> u16 { self.kind().code() }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn inactive_card_is_forbidden_not_missing() {
    let inactive = Error::CardInactive("ABC123".into());
    let missing  = Error::CardNotFound("ABC123".into());
    assert_eq!(inactive.code(), 403);
    assert_eq!(missing.code(), 404);
  }

  #[test]
  fn duplicate_presence_is_conflict() {
    let e = Error::AlreadyRecorded {
      subject_id:  Uuid::new_v4(),
      schedule_id: Uuid::new_v4(),
      date:        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
    };
    assert_eq!(e.kind(), ErrorKind::Conflict);
    assert_eq!(e.code(), 409);
  }

  #[test]
  fn timeouts_count_as_store_failures() {
    assert_eq!(Error::Timeout("store call").kind(), ErrorKind::Store);
  }
}
