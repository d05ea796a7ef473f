//! Message Dispatcher.
//!
//! Every inbound publish goes through [`Dispatcher::handle`]: topic check,
//! payload decode, one branch per [`Mode`], and exactly one acknowledgment on
//! `{device}/acknowledgment/{mode}`. No error escapes; failures become error
//! acknowledgments or log lines.

use std::sync::Arc;

use presensi_core::{
  Error, ErrorKind, Result,
  ack::Ack,
  device::{InputTopic, Mode},
  store::{AttendanceStore, Unique},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
  broker::Broker,
  classify::ClassificationEngine,
  clock::Clock,
  deadline::{Timeouts, store_call},
  subscriptions::TopicSubscriptionManager,
};

const MAX_UID_LEN: usize = 64;

/// Body of an inbound tap.
#[derive(Debug, Deserialize)]
pub struct TapRequest {
  #[serde(default)]
  pub uid: Option<String>,
}

/// Trim and check a card uid: 1 to 64 ASCII alphanumerics, `-` or `:`.
pub fn validate_uid(raw: &str) -> Result<String> {
  let uid = raw.trim();
  if uid.is_empty() {
    return Err(Error::Validation("uid must not be empty".into()));
  }
  if uid.len() > MAX_UID_LEN {
    return Err(Error::Validation(format!("uid longer than {MAX_UID_LEN} characters")));
  }
  if !uid.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':') {
    return Err(Error::Validation(format!("uid {uid:?} contains invalid characters")));
  }
  Ok(uid.to_owned())
}

/// Decode a payload into a validated uid. `None` only for modes that do not
/// need one.
fn decode_tap(mode: Mode, payload: &[u8]) -> Result<Option<String>> {
  if !mode.requires_uid() {
    return Ok(None);
  }
  let request: TapRequest = serde_json::from_slice(payload)
    .map_err(|e| Error::Validation(format!("malformed payload: {e}")))?;
  let raw = request.uid.ok_or_else(|| Error::Validation("missing uid".into()))?;
  validate_uid(&raw).map(Some)
}

pub struct Dispatcher<S, B> {
  store:         Arc<S>,
  broker:        Arc<B>,
  subscriptions: Arc<TopicSubscriptionManager<S, B>>,
  engine:        Arc<ClassificationEngine<S>>,
  clock:         Arc<dyn Clock>,
  timeouts:      Timeouts,
}

impl<S, B> Dispatcher<S, B>
where
  S: AttendanceStore + 'static,
  B: Broker,
{
  pub fn new(
    store: Arc<S>,
    broker: Arc<B>,
    subscriptions: Arc<TopicSubscriptionManager<S, B>>,
    engine: Arc<ClassificationEngine<S>>,
    clock: Arc<dyn Clock>,
    timeouts: Timeouts,
  ) -> Self {
    Self { store, broker, subscriptions, engine, clock, timeouts }
  }

  pub fn subscriptions(&self) -> &Arc<TopicSubscriptionManager<S, B>> { &self.subscriptions }

  /// Handle one inbound message and publish its acknowledgment.
  ///
  /// Returns the acknowledgment that was attempted, or `None` if the message
  /// was dropped because its topic is malformed or not live.
  pub async fn handle(&self, topic: &str, payload: &[u8]) -> Option<Ack> {
    let Some(input) = InputTopic::parse(topic) else {
      tracing::warn!(topic = %topic, "dropping message on malformed topic");
      return None;
    };
    if !self.subscriptions.is_live(topic).await {
      tracing::warn!(topic = %topic, "dropping message on topic that is not subscribed");
      return None;
    }

    let (uid, outcome) = match decode_tap(input.mode, payload) {
      Ok(uid) => {
        let outcome = self.route(&input, uid.as_deref()).await;
        (uid, outcome)
      }
      Err(e) => (None, Err((e, None))),
    };
    let ack = outcome.unwrap_or_else(|(e, subject_id)| {
      if matches!(e.kind(), ErrorKind::Store | ErrorKind::Transport) {
        tracing::error!(
          topic = %topic,
          uid = ?uid,
          subject_id = ?subject_id,
          error = %e,
          "tap handling failed"
        );
      } else {
        tracing::debug!(topic = %topic, uid = ?uid, code = e.code(), error = %e, "tap rejected");
      }
      Ack::from(&e)
    });

    self.publish(&input, &ack).await;
    Some(ack)
  }

  /// Branch by mode. Errors carry the subject id when one was resolved.
  async fn route(
    &self,
    input: &InputTopic,
    uid: Option<&str>,
  ) -> Result<Ack, (Error, Option<Uuid>)> {
    match (input.mode, uid) {
      (Mode::Record, Some(uid)) => self.record(uid).await.map_err(|e| (e, None)),
      (Mode::Presence, Some(uid)) => self.presence(uid).await,
      (Mode::Permission, _) => Err((Error::NotImplemented("permission mode"), None)),
      (Mode::Ping, _) => Ok(
        Ack::success(200, "pong")
          .with_data(&json!({ "device": input.device, "time": self.clock.now() })),
      ),
      (_, None) => Err((Error::Validation("missing uid".into()), None)),
    }
  }

  async fn record(&self, uid: &str) -> Result<Ack> {
    let created =
      store_call(self.timeouts.store, "card insert", self.store.create_card(uid.to_owned()))
        .await?;
    match created {
      Unique::Stored(card) => {
        tracing::info!(uid = %uid, "card registered");
        Ok(Ack::success(201, "card registered").with_data(&card))
      }
      Unique::Duplicate => Err(Error::CardConflict(uid.to_owned())),
    }
  }

  async fn presence(&self, uid: &str) -> Result<Ack, (Error, Option<Uuid>)> {
    let card = store_call(self.timeouts.store, "card lookup", self.store.get_card_by_uid(uid))
      .await
      .map_err(|e| (e, None))?
      .ok_or_else(|| (Error::CardNotFound(uid.to_owned()), None))?;
    if !card.is_active {
      return Err((Error::CardInactive(uid.to_owned()), None));
    }
    let subject_id = card
      .subject_id
      .ok_or_else(|| (Error::CardUnassigned(uid.to_owned()), None))?;

    let presence = self
      .engine
      .classify(subject_id, self.clock.now())
      .await
      .map_err(|e| (e, Some(subject_id)))?;
    Ok(Ack::success(200, "presence recorded").with_data(&presence))
  }

  async fn publish(&self, input: &InputTopic, ack: &Ack) {
    let topic = input.ack_topic();
    let sent =
      tokio::time::timeout(self.timeouts.publish, self.broker.publish(&topic, ack.to_bytes()))
        .await;
    let failure = match sent {
      Ok(Ok(())) => return,
      Ok(Err(e)) => Error::Transport(e.to_string()),
      Err(_) => Error::Timeout("acknowledgment publish"),
    };
    tracing::error!(topic = %topic, code = ack.code, error = %failure, "acknowledgment not delivered");
  }
}
