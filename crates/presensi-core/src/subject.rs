//! Subjects: the people attendance is recorded for.
//!
//! Subjects are owned by the surrounding user administration; the gateway only
//! needs an identity and a display name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id: Uuid,
  pub name:       String,
  pub created_at: DateTime<Utc>,
}

/// The slim projection returned by "who has not tapped" queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
  pub subject_id: Uuid,
  pub name:       String,
}
