//! External Integrations
//!
//! Adapters for the two systems the daemon talks to.
//!
//! # Ticket systems
//!
//! - **Request Tracker**: REST 1.0 adapter over the `rt` crate
//! - **In-memory**: used when no RT endpoint is configured, and by tests
//!
//! # Monitoring
//!
//! - **Icinga2**: event stream client (`/v1/events`)

pub mod icinga;
pub mod memory;
pub mod request_tracker;

use crate::event::TicketId;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use icinga::{IcingaClient, IcingaEventReader};
pub use memory::{InMemoryTicketSystem, TicketCall};
pub use request_tracker::RequestTracker;

/// Ticket as seen through a [`TicketSystem`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub id: TicketId,
    pub status: String,
    pub owner: String,
    pub queue: String,
    pub subject: String,
    #[serde(default)]
    pub text: String,
}

impl TicketRecord {
    pub fn is_deleted(&self) -> bool {
        self.status.eq_ignore_ascii_case(rt::STATUS_DELETED)
    }
}

impl From<rt::Ticket> for TicketRecord {
    fn from(ticket: rt::Ticket) -> Self {
        Self {
            id: TicketId::new(ticket.id),
            status: ticket.status,
            owner: ticket.owner,
            queue: ticket.queue,
            subject: ticket.subject,
            text: ticket.text,
        }
    }
}

/// Operations the synchronizer needs from a ticketing system
#[async_trait]
pub trait TicketSystem: Send + Sync {
    /// Fetch a ticket; a missing ticket is [`crate::Icinga2RtError::TicketNotFound`]
    async fn get_ticket(&self, id: TicketId) -> Result<TicketRecord>;

    async fn create_ticket(&self, queue: &str, subject: &str, text: &str) -> Result<TicketRecord>;

    async fn comment_ticket(&self, id: TicketId, text: &str) -> Result<()>;

    async fn update_ticket_status(&self, id: TicketId, status: &str) -> Result<TicketRecord>;
}

#[async_trait]
impl<T: TicketSystem + ?Sized> TicketSystem for Box<T> {
    async fn get_ticket(&self, id: TicketId) -> Result<TicketRecord> {
        (**self).get_ticket(id).await
    }

    async fn create_ticket(&self, queue: &str, subject: &str, text: &str) -> Result<TicketRecord> {
        (**self).create_ticket(queue, subject, text).await
    }

    async fn comment_ticket(&self, id: TicketId, text: &str) -> Result<()> {
        (**self).comment_ticket(id, text).await
    }

    async fn update_ticket_status(&self, id: TicketId, status: &str) -> Result<TicketRecord> {
        (**self).update_ticket_status(id, status).await
    }
}
