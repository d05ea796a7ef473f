//! Cards: physical tokens mapped to a subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered card. Cards enrolled from a device start unassigned and
/// inactive until an administrator maps them to a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
  pub uid:        String,
  pub subject_id: Option<Uuid>,
  pub is_active:  bool,
  pub created_at: DateTime<Utc>,
}

/// Partial update applied by administrators. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardUpdate {
  pub subject_id: Option<Uuid>,
  pub is_active:  Option<bool>,
}
