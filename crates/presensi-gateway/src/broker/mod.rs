//! The publish/subscribe transport seen by the gateway.
//!
//! The [`Broker`] trait is the only surface the subscription manager and the
//! dispatcher use. Connection lifecycle (connect, event loop, disconnect)
//! belongs to the concrete implementation, so tests can swap in
//! [`memory::MemoryBroker`].

pub mod memory;
pub mod mqtt;

use std::future::Future;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
  #[error("mqtt client error: {0}")]
  Client(#[from] rumqttc::ClientError),

  #[error("broker rejected {0:?}")]
  Rejected(String),
}

/// Outbound operations on a connected broker.
pub trait Broker: Send + Sync + 'static {
  fn subscribe<'a>(
    &'a self,
    topic: &'a str,
  ) -> impl Future<Output = Result<(), BrokerError>> + Send + 'a;

  fn unsubscribe<'a>(
    &'a self,
    topic: &'a str,
  ) -> impl Future<Output = Result<(), BrokerError>> + Send + 'a;

  fn publish<'a>(
    &'a self,
    topic: &'a str,
    payload: Vec<u8>,
  ) -> impl Future<Output = Result<(), BrokerError>> + Send + 'a;
}
