//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, times of day as `HH:MM:SS`,
//! calendar days as `YYYY-MM-DD`. UUIDs are stored as hyphenated lowercase
//! strings. Enums use their lowercase serde names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike as _, Utc};
use presensi_core::{
  card::Card,
  device::Mode,
  presence::{CreatorKind, Presence, PresenceStatus},
  schedule::Schedule,
  subject::{Subject, SubjectRef},
};
use uuid::Uuid;

use crate::{Error, Result};

const TIME_FORMAT: &str = "%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveTime / NaiveDate ───────────────────────────────────────────────────

/// Second precision; sub-second parts are dropped so comparisons in SQL stay
/// lexicographic.
pub fn encode_time(t: NaiveTime) -> String {
  t.with_nanosecond(0).unwrap_or(t).format(TIME_FORMAT).to_string()
}

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, TIME_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

fn decode_variant<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::UnknownVariant { column, value: s.to_owned() })
}

pub fn decode_mode(s: &str) -> Result<Mode> { decode_variant("mode", s) }

pub fn decode_status(s: &str) -> Result<PresenceStatus> {
  decode_variant("status", s)
}

pub fn decode_creator(s: &str) -> Result<CreatorKind> {
  decode_variant("created_by", s)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id: String,
  pub name:       String,
  pub created_at: String,
}

impl RawSubject {
  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id: decode_uuid(&self.subject_id)?,
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
    })
  }

  pub fn into_ref(self) -> Result<SubjectRef> {
    Ok(SubjectRef { subject_id: decode_uuid(&self.subject_id)?, name: self.name })
  }
}

/// A `devices` row joined with one of its `device_modes` rows (if any).
pub struct RawDeviceMode {
  pub device_id:  String,
  pub name:       String,
  pub created_at: String,
  pub mode:       Option<String>,
}

pub struct RawSchedule {
  pub schedule_id:    String,
  pub name:           String,
  pub start_presence: String,
  pub start_time:     String,
  pub finish_time:    String,
  pub created_at:     String,
}

impl RawSchedule {
  pub const COLUMNS: &'static str =
    "schedule_id, name, start_presence, start_time, finish_time, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      schedule_id:    row.get(0)?,
      name:           row.get(1)?,
      start_presence: row.get(2)?,
      start_time:     row.get(3)?,
      finish_time:    row.get(4)?,
      created_at:     row.get(5)?,
    })
  }

  pub fn into_schedule(self) -> Result<Schedule> {
    Ok(Schedule {
      schedule_id:    decode_uuid(&self.schedule_id)?,
      name:           self.name,
      start_presence: decode_time(&self.start_presence)?,
      start_time:     decode_time(&self.start_time)?,
      finish_time:    decode_time(&self.finish_time)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawCard {
  pub uid:        String,
  pub subject_id: Option<String>,
  pub is_active:  bool,
  pub created_at: String,
}

impl RawCard {
  pub const COLUMNS: &'static str = "uid, subject_id, is_active, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      uid:        row.get(0)?,
      subject_id: row.get(1)?,
      is_active:  row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_card(self) -> Result<Card> {
    Ok(Card {
      uid:        self.uid,
      subject_id: self.subject_id.as_deref().map(decode_uuid).transpose()?,
      is_active:  self.is_active,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `presences` row joined with `subjects`.
pub struct RawPresence {
  pub presence_id:   String,
  pub subject_id:    String,
  pub subject_name:  String,
  pub schedule_id:   String,
  pub schedule_name: String,
  pub status:        String,
  pub note:          Option<String>,
  pub created_by:    String,
  pub presence_date: String,
  pub created_at:    String,
}

impl RawPresence {
  /// Select list for `presences p JOIN subjects s`.
  pub const COLUMNS: &'static str = "p.presence_id, p.subject_id, s.name, \
     p.schedule_id, p.schedule_name, p.status, p.note, p.created_by, \
     p.presence_date, p.created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      presence_id:   row.get(0)?,
      subject_id:    row.get(1)?,
      subject_name:  row.get(2)?,
      schedule_id:   row.get(3)?,
      schedule_name: row.get(4)?,
      status:        row.get(5)?,
      note:          row.get(6)?,
      created_by:    row.get(7)?,
      presence_date: row.get(8)?,
      created_at:    row.get(9)?,
    })
  }

  pub fn into_presence(self) -> Result<Presence> {
    Ok(Presence {
      presence_id:   decode_uuid(&self.presence_id)?,
      subject_id:    decode_uuid(&self.subject_id)?,
      subject_name:  self.subject_name,
      schedule_id:   decode_uuid(&self.schedule_id)?,
      schedule_name: self.schedule_name,
      status:        decode_status(&self.status)?,
      note:          self.note,
      created_by:    decode_creator(&self.created_by)?,
      presence_date: decode_date(&self.presence_date)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn time_encoding_sorts_lexicographically() {
    let early = encode_time(NaiveTime::from_hms_opt(7, 5, 0).unwrap());
    let late = encode_time(NaiveTime::from_hms_milli_opt(15, 0, 0, 999).unwrap());
    assert_eq!(early, "07:05:00");
    assert_eq!(late, "15:00:00");
    assert!(early < late);
  }

  #[test]
  fn unknown_status_is_an_error() {
    assert!(matches!(
      decode_status("teleported"),
      Err(Error::UnknownVariant { column: "status", .. })
    ));
    assert_eq!(decode_status("alpha").unwrap(), PresenceStatus::Alpha);
  }
}
