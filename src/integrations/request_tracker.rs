//! Request Tracker adapter
//!
//! Exposes the `rt` REST 1.0 client as a [`TicketSystem`].

use super::{TicketRecord, TicketSystem};
use crate::config::RtConfig;
use crate::event::TicketId;
use crate::{Icinga2RtError, Result};
use async_trait::async_trait;
use tracing::debug;

/// [`TicketSystem`] backed by a Request Tracker instance
pub struct RequestTracker {
    client: rt::Client,
}

impl RequestTracker {
    /// Create the adapter from configuration
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &RtConfig) -> Result<Self> {
        let client = rt::Client::new(&config.url, &config.user, &config.password, config.insecure)?;
        debug!(url = %client.base_url(), "Created RT client");
        Ok(Self { client })
    }
}

#[async_trait]
impl TicketSystem for RequestTracker {
    async fn get_ticket(&self, id: TicketId) -> Result<TicketRecord> {
        match self.client.ticket(id.as_u64()).await {
            Ok(ticket) => Ok(ticket.into()),
            Err(rt::Error::NotFound(n)) => Err(Icinga2RtError::TicketNotFound(n)),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_ticket(&self, queue: &str, subject: &str, text: &str) -> Result<TicketRecord> {
        let ticket = self.client.create_ticket(queue, subject, text).await?;
        Ok(ticket.into())
    }

    async fn comment_ticket(&self, id: TicketId, text: &str) -> Result<()> {
        self.client.comment_ticket(id.as_u64(), text).await?;
        Ok(())
    }

    async fn update_ticket_status(&self, id: TicketId, status: &str) -> Result<TicketRecord> {
        let ticket = self.client.update_ticket_status(id.as_u64(), status).await?;
        Ok(ticket.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_creation() {
        let config = RtConfig {
            url: "https://support.example.com".to_string(),
            user: "apiuser".to_string(),
            password: "secret".to_string(),
            insecure: false,
        };

        let adapter = RequestTracker::new(&config).expect("Failed to create adapter");
        assert_eq!(
            adapter.client.base_url(),
            "https://support.example.com/REST/1.0"
        );
    }
}
