//! Core types and trait definitions for the Presensi attendance gateway.
//!
//! This crate is deliberately free of HTTP, MQTT and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod ack;
pub mod card;
pub mod device;
pub mod error;
pub mod presence;
pub mod schedule;
pub mod store;
pub mod subject;

pub use error::{Error, ErrorKind, Result};
