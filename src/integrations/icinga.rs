//! Icinga2 API client
//!
//! Opens event streams via `POST /v1/events`. The server keeps the HTTP
//! response open and writes one JSON object per line for every matching
//! event.

use crate::config::IcingaConfig;
use crate::event::Notification;
use crate::stream::{EventSource, LineDecoder, NotificationReader, Subscription};
use crate::{Icinga2RtError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Timeout for establishing the TCP/TLS connection. The stream itself has
/// no overall timeout since it stays open indefinitely.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct EventStreamRequest<'a> {
    queue: &'a str,
    types: &'a [String],
    #[serde(skip_serializing_if = "str::is_empty")]
    filter: &'a str,
}

/// Icinga2 API client
pub struct IcingaClient {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl IcingaClient {
    /// Create a new client
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &IcingaConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/v1", config.url.trim_end_matches('/')),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open an event stream for a subscription
    pub async fn event_stream(&self, subscription: &Subscription) -> Result<IcingaEventReader> {
        let url = format!("{}/events", self.base_url);
        let body = EventStreamRequest {
            queue: &subscription.queue,
            types: &subscription.types,
            filter: &subscription.filter,
        };

        debug!(url = %url, queue = %subscription.queue, types = ?subscription.types, "Opening Icinga2 event stream");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                info!(queue = %subscription.queue, "Connected to Icinga2 event stream");
                Ok(IcingaEventReader {
                    response,
                    decoder: LineDecoder::new(),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Icinga2RtError::Other(format!(
                "Icinga2 rejected credentials for user '{}'",
                self.user
            ))),
            status => {
                let error_body = response.text().await.unwrap_or_default();
                Err(Icinga2RtError::Other(format!(
                    "Icinga2 API error: HTTP {}: {}",
                    status, error_body
                )))
            }
        }
    }
}

#[async_trait]
impl EventSource for IcingaClient {
    type Reader = IcingaEventReader;

    async fn open(&self, subscription: &Subscription) -> Result<IcingaEventReader> {
        self.event_stream(subscription).await
    }
}

/// Reads notifications from an open event stream response
pub struct IcingaEventReader {
    response: reqwest::Response,
    decoder: LineDecoder,
}

#[async_trait]
impl NotificationReader for IcingaEventReader {
    async fn next_notification(&mut self) -> Result<Notification> {
        loop {
            if let Some(decoded) = self.decoder.decode_next() {
                return decoded;
            }

            match self.response.chunk().await? {
                Some(chunk) => self.decoder.push(&chunk)?,
                None => return Err(Icinga2RtError::StreamClosed),
            }
        }
    }
}
