//! An in-process [`Broker`] that records every call.

use std::{
  collections::{BTreeSet, HashSet},
  sync::{Mutex, MutexGuard, PoisonError},
};

use presensi_core::ack::Ack;

use super::{Broker, BrokerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCall {
  Subscribe(String),
  Unsubscribe(String),
}

#[derive(Default)]
struct State {
  subscribed:      BTreeSet<String>,
  calls:           Vec<BrokerCall>,
  published:       Vec<(String, Vec<u8>)>,
  failing_topics:  HashSet<String>,
  failing_publish: bool,
}

#[derive(Default)]
pub struct MemoryBroker {
  state: Mutex<State>,
}

impl MemoryBroker {
  pub fn new() -> Self { Self::default() }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Make subscribe calls for `topic` fail until [`heal`](Self::heal).
  pub fn fail_subscriptions_to(&self, topic: &str) {
    self.state().failing_topics.insert(topic.to_owned());
  }

  pub fn heal(&self, topic: &str) { self.state().failing_topics.remove(topic); }

  pub fn fail_publishes(&self, fail: bool) { self.state().failing_publish = fail; }

  /// Topics currently subscribed at the "broker".
  pub fn subscribed(&self) -> BTreeSet<String> { self.state().subscribed.clone() }

  pub fn calls(&self) -> Vec<BrokerCall> { self.state().calls.clone() }

  pub fn clear_calls(&self) { self.state().calls.clear(); }

  pub fn published(&self) -> Vec<(String, Vec<u8>)> { self.state().published.clone() }

  /// Decoded acknowledgments published on `topic`, oldest first.
  pub fn acks_on(&self, topic: &str) -> Vec<Ack> {
    self
      .state()
      .published
      .iter()
      .filter(|(t, _)| t == topic)
      .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
      .collect()
  }
}

impl Broker for MemoryBroker {
  async fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
    let mut state = self.state();
    state.calls.push(BrokerCall::Subscribe(topic.to_owned()));
    if state.failing_topics.contains(topic) {
      return Err(BrokerError::Rejected(topic.to_owned()));
    }
    state.subscribed.insert(topic.to_owned());
    Ok(())
  }

  async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError> {
    let mut state = self.state();
    state.calls.push(BrokerCall::Unsubscribe(topic.to_owned()));
    state.subscribed.remove(topic);
    Ok(())
  }

  async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
    let mut state = self.state();
    if state.failing_publish {
      return Err(BrokerError::Rejected(topic.to_owned()));
    }
    state.published.push((topic.to_owned(), payload));
    Ok(())
  }
}
