//! Devices, modes and the topic names derived from them.
//!
//! A device reports taps on one input topic per mode and reads responses from
//! the matching acknowledgment topic:
//!
//! | Direction | Topic |
//! |-----------|-------|
//! | inbound   | `{device}/input/{mode}` |
//! | outbound  | `{device}/acknowledgment/{mode}` |

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

const INPUT_SEGMENT: &str = "input";
const ACK_SEGMENT: &str = "acknowledgment";

// ─── Mode ────────────────────────────────────────────────────────────────────

/// The category of a tap and of the topic it arrives on.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
  /// Register a new card.
  Record,
  /// Attendance tap.
  Presence,
  /// Leave/permission request; reserved.
  Permission,
  /// Liveness probe.
  Ping,
}

impl Mode {
  /// Parse a mode segment, mapping failures to a domain error.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownMode(s.to_owned()))
  }

  /// Whether taps in this mode must carry a card uid.
  pub fn requires_uid(self) -> bool { !matches!(self, Self::Ping) }
}

// ─── Topics ──────────────────────────────────────────────────────────────────

pub fn input_topic(device: &str, mode: Mode) -> String {
  format!("{device}/{INPUT_SEGMENT}/{mode}")
}

pub fn ack_topic(device: &str, mode: Mode) -> String {
  format!("{device}/{ACK_SEGMENT}/{mode}")
}

/// A decoded `{device}/input/{mode}` topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTopic {
  pub device: String,
  pub mode:   Mode,
}

impl InputTopic {
  /// Decode an inbound topic. Returns `None` for anything that is not exactly
  /// three segments with `input` in the middle and a known mode at the end.
  pub fn parse(topic: &str) -> Option<Self> {
    let mut parts = topic.split('/');
    let device = parts.next()?;
    let middle = parts.next()?;
    let mode = parts.next()?;
    if parts.next().is_some() || middle != INPUT_SEGMENT {
      return None;
    }
    if validate_device_name(device).is_err() {
      return None;
    }
    Some(Self { device: device.to_owned(), mode: Mode::parse(mode).ok()? })
  }

  pub fn ack_topic(&self) -> String { ack_topic(&self.device, self.mode) }
}

// ─── Device ──────────────────────────────────────────────────────────────────

/// A registered card reader and the modes it reports on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
  pub device_id:  Uuid,
  pub name:       String,
  /// Ordered, duplicate-free.
  pub modes:      Vec<Mode>,
  pub created_at: DateTime<Utc>,
}

impl Device {
  /// Every inbound topic this device publishes taps on.
  pub fn input_topics(&self) -> impl Iterator<Item = String> + '_ {
    self.modes.iter().map(|m| input_topic(&self.name, *m))
  }
}

/// Input for creating or replacing a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDevice {
  pub name:  String,
  pub modes: Vec<Mode>,
}

impl NewDevice {
  /// Validate the name and drop repeated modes, keeping first occurrences.
  pub fn normalized(mut self) -> Result<Self> {
    self.name = self.name.trim().to_owned();
    validate_device_name(&self.name)?;
    let mut seen = Vec::with_capacity(self.modes.len());
    for mode in self.modes {
      if !seen.contains(&mode) {
        seen.push(mode);
      }
    }
    self.modes = seen;
    Ok(self)
  }
}

/// A device name becomes a topic segment, so it may not contain separators,
/// wildcards or whitespace.
pub fn validate_device_name(name: &str) -> Result<()> {
  let bad = name.is_empty()
    || name
      .chars()
      .any(|c| matches!(c, '/' | '+' | '#') || c.is_whitespace() || c.is_control());
  if bad {
    return Err(Error::InvalidDeviceName(name.to_owned()));
  }
  Ok(())
}
