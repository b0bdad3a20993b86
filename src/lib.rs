//! icinga2rt - Icinga2 notifications to Request Tracker tickets
//!
//! Consumes the Icinga2 event stream and keeps one RT ticket per failing
//! host or service: a ticket is opened when a problem starts, commented when
//! the state changes and deleted (or left to its owner) when the problem
//! recovers. The host/service to ticket association is kept in a SQLite
//! cache so it survives restarts.
//!
//! # Architecture
//!
//! - **event**: Notification model (states, keys, ticket ids)
//! - **stream**: Reconnecting event stream consumer with backoff
//! - **cache**: SQLite event cache
//! - **permit**: Filter deciding which states may touch tickets
//! - **sync**: Ticket state machine and daemon loop
//! - **integrations**: Icinga2 client, RT adapter, in-memory ticket system
//! - **config**: YAML configuration and validation

pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod integrations;
pub mod logging;
pub mod permit;
pub mod stream;
pub mod sync;

// Re-exports
pub use error::{Icinga2RtError, Result};
