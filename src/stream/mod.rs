//! Event stream consumption
//!
//! Opens the monitoring event stream, retrying with exponential backoff, and
//! hands out notifications one at a time.
//!
//! A reader is not resumable: when it fails (malformed record, dropped
//! connection) the caller discards it and calls [`StreamConsumer::connect`]
//! again. Events in flight at that moment may be lost or seen twice,
//! depending on the source.

mod backoff;
mod decoder;

pub use backoff::{with_backoff, BackoffConfig};
pub use decoder::LineDecoder;

use crate::event::Notification;
use crate::Result;
use async_trait::async_trait;

/// Default Icinga2 event queue name
pub const DEFAULT_QUEUE: &str = "icinga2rt";

/// Event type the daemon subscribes to
pub const NOTIFICATION_EVENT_TYPE: &str = "Notification";

/// What to subscribe to on the event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Queue name; the server keeps one cursor per queue
    pub queue: String,

    /// Filter expression, empty for none
    pub filter: String,

    /// Event types, e.g. `Notification`
    pub types: Vec<String>,
}

impl Subscription {
    /// Subscribe to notifications on `queue`
    pub fn notifications(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            filter: String::new(),
            types: vec![NOTIFICATION_EVENT_TYPE.to_string()],
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// An open stream of notifications
#[async_trait]
pub trait NotificationReader: Send {
    /// Wait for the next notification
    ///
    /// Errors for which [`crate::Icinga2RtError::is_stream_recoverable`] holds
    /// mean the reader is finished and a new connection is needed.
    async fn next_notification(&mut self) -> Result<Notification>;
}

/// Something that can open notification streams
#[async_trait]
pub trait EventSource: Send + Sync {
    type Reader: NotificationReader;

    async fn open(&self, subscription: &Subscription) -> Result<Self::Reader>;
}

/// Connects to an [`EventSource`] with backoff
pub struct StreamConsumer<S> {
    source: S,
    subscription: Subscription,
    backoff: BackoffConfig,
}

impl<S: EventSource> StreamConsumer<S> {
    pub fn new(source: S, subscription: Subscription, backoff: BackoffConfig) -> Self {
        Self {
            source,
            subscription,
            backoff,
        }
    }

    /// Open a reader, retrying up to the configured number of attempts
    ///
    /// # Errors
    /// [`crate::Icinga2RtError::Connection`] once every attempt failed
    pub async fn connect(&self) -> Result<S::Reader> {
        let source = &self.source;
        let subscription = &self.subscription;

        with_backoff(&self.backoff, "event_stream", move || {
            source.open(subscription)
        })
        .await
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}
