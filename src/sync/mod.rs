//! Ticket synchronization
//!
//! # Architecture
//!
//! ```text
//! Icinga2 ──> StreamConsumer ──> Daemon ──> TicketSynchronizer ──> TicketSystem
//!                                                  │
//!                                             EventCache
//! ```
//!
//! The [`Daemon`] owns the loop: it reads one notification, hands it to the
//! [`TicketSynchronizer`] and waits for the result before reading the next.
//! The synchronizer consults the [`crate::permit::PermitFilter`] and the
//! [`crate::cache::EventCache`], acts on the ticket system and reports each
//! decision to a [`SyncObserver`].

mod daemon;
pub mod metrics;
mod observer;
mod synchronizer;

pub use daemon::{Daemon, DaemonStats};
pub use observer::{SyncEvent, SyncObserver, TracingObserver};
pub use synchronizer::{
    format_comment, format_subject, format_text, SyncOutcome, TicketSettings, TicketSynchronizer,
};
