//! Reporting of synchronizer decisions
//!
//! The synchronizer never logs directly. Everything it decides goes through a
//! [`SyncObserver`], so the daemon can log with tracing while tests record
//! the same events.

use super::SyncOutcome;
use crate::event::{EventKey, Notification, State, TicketId};

/// Something the synchronizer wants reported
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A notification arrived
    Received(Notification),

    /// The cached ticket could not be used and will be replaced or dropped
    TicketGone {
        key: EventKey,
        ticket: TicketId,
        reason: String,
    },

    /// Processing of a notification finished
    Processed {
        key: EventKey,
        state: State,
        outcome: SyncOutcome,
    },
}

/// Receives [`SyncEvent`]s
pub trait SyncObserver: Send + Sync {
    fn observe(&self, event: &SyncEvent);
}

/// Writes sync events as tracing events
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    debug_events: bool,
}

impl TracingObserver {
    /// `debug_events` dumps every received notification at info level
    pub fn new(debug_events: bool) -> Self {
        Self { debug_events }
    }
}

impl SyncObserver for TracingObserver {
    fn observe(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Received(notification) => {
                if self.debug_events {
                    tracing::info!(
                        key = %notification.key(),
                        state = %notification.state(),
                        event = ?notification,
                        "Received event"
                    );
                }
            }
            SyncEvent::TicketGone {
                key,
                ticket,
                reason,
            } => {
                tracing::warn!(key = %key, ticket = %ticket, reason = %reason, "Cached ticket is gone");
            }
            SyncEvent::Processed {
                key,
                state,
                outcome,
            } => match outcome {
                SyncOutcome::Ignored => {
                    tracing::debug!(key = %key, state = %state, "State not permitted, ignoring")
                }
                SyncOutcome::NoOp | SyncOutcome::Unchanged(_) => {
                    tracing::debug!(key = %key, state = %state, outcome = %outcome, "Nothing to do")
                }
                _ => tracing::info!(key = %key, state = %state, outcome = %outcome, "Ticket synchronized"),
            },
        }
    }
}
