//! Presence records, one per subject, schedule and calendar day.
//!
//! Rows are written only by the tap path (classification) and the absence
//! backfill. They are never deleted by the gateway.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Attendance outcome.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PresenceStatus {
  Present,
  Late,
  /// Absent without notice; created by the backfill.
  Alpha,
  Sick,
  Permitted,
}

/// Who created a presence row.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CreatorKind {
  Tap,
  Admin,
  System,
}

/// A persisted presence row with display names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
  pub presence_id:   Uuid,
  pub subject_id:    Uuid,
  pub subject_name:  String,
  pub schedule_id:   Uuid,
  /// Denormalised at write time so history survives schedule renames.
  pub schedule_name: String,
  pub status:        PresenceStatus,
  pub note:          Option<String>,
  pub created_by:    CreatorKind,
  pub presence_date: NaiveDate,
  pub created_at:    DateTime<Utc>,
}

/// Input for a presence insert. The store assigns the id and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPresence {
  pub subject_id:    Uuid,
  pub schedule_id:   Uuid,
  pub schedule_name: String,
  pub status:        PresenceStatus,
  pub note:          Option<String>,
  pub created_by:    CreatorKind,
  pub presence_date: NaiveDate,
}
