//! Bounded waits on store and broker calls.

use std::{future::Future, time::Duration};

use presensi_core::Error;

/// Per-call limits applied on the message path.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
  pub store:   Duration,
  pub publish: Duration,
}

impl Default for Timeouts {
  fn default() -> Self {
    Self {
      store:   Duration::from_millis(5_000),
      publish: Duration::from_millis(3_000),
    }
  }
}

/// Await a store call for at most `limit`. Backend errors become
/// [`Error::Store`]; an elapsed deadline becomes [`Error::Timeout`].
pub async fn store_call<T, E, F>(limit: Duration, what: &'static str, fut: F) -> Result<T, Error>
where
  F: Future<Output = Result<T, E>>,
  E: std::error::Error + Send + Sync + 'static,
{
  match tokio::time::timeout(limit, fut).await {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(e)) => Err(Error::store(e)),
    Err(_) => Err(Error::Timeout(what)),
  }
}
