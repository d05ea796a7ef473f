//! The acknowledgment envelope published back to devices.
//!
//! ```json
//! {"code":200,"status":"success","message":"presence recorded","data":{..}}
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
  Success,
  Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
  pub code:    u16,
  pub status:  AckStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data:    Option<serde_json::Value>,
}

impl Ack {
  pub fn success(code: u16, message: impl Into<String>) -> Self {
    Self {
      code,
      status: AckStatus::Success,
      message: Some(message.into()),
      data: None,
    }
  }

  /// Attach a serialisable payload. Serialisation of domain types cannot fail
  /// in practice; if it does the envelope is sent without data.
  pub fn with_data<T: Serialize>(mut self, data: &T) -> Self {
    self.data = serde_json::to_value(data).ok();
    self
  }

  pub fn error(code: u16, message: impl Into<String>) -> Self {
    Self {
      code,
      status: AckStatus::Error,
      message: Some(message.into()),
      data: None,
    }
  }

  pub fn is_success(&self) -> bool { self.status == AckStatus::Success }

  pub fn to_bytes(&self) -> Vec<u8> {
    // A struct of plain fields and a `Value` always serialises.
    serde_json::to_vec(self).unwrap_or_default()
  }
}

/// Message sent in place of the error text for store and transport failures.
pub const INTERNAL_ERROR: &str = "internal error";

impl From<&Error> for Ack {
  fn from(e: &Error) -> Self {
    match e.kind() {
      ErrorKind::Store | ErrorKind::Transport => Self::error(e.code(), INTERNAL_ERROR),
      _ => Self::error(e.code(), e.to_string()),
    }
  }
}
