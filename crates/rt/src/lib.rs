//! Request Tracker (RT) REST 1.0 client for Rust
//!
//! A small, typed interface to the handful of RT endpoints needed to open,
//! comment and close tickets.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> rt::Result<()> {
//! let client = rt::Client::new("https://rt.example.com", "apiuser", "secret", false)?;
//!
//! let ticket = client.create_ticket("general", "Host: web1 is Critical", "Output: timeout").await?;
//! client.comment_ticket(ticket.id, "New status: OK").await?;
//! client.update_ticket_status(ticket.id, rt::STATUS_DELETED).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Wire format
//!
//! Every REST 1.0 response starts with a status line such as
//! `RT/4.4.3 200 Ok`, followed by a blank line and either `Key: value`
//! fields or `# message` lines. Multi-line values are continued with leading
//! whitespace. Note that RT answers most application-level failures
//! (missing tickets, rejected edits) with HTTP 200 and a `#` message.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Status RT uses for tickets removed from all queues
pub const STATUS_DELETED: &str = "deleted";

/// Owner RT assigns to tickets nobody has taken
pub const DEFAULT_NOBODY: &str = "Nobody";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when talking to RT
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RT returned {code} {reason}")]
    Status { code: u16, reason: String },

    #[error("Ticket not found: {0}")]
    NotFound(u64),

    #[error("RT rejected the request: {0}")]
    Rejected(String),

    #[error("Failed to parse RT response: {0}")]
    Parse(String),
}

/// Result type for RT operations
pub type Result<T> = std::result::Result<T, Error>;

/// A ticket as reported by `ticket/<id>/show`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub queue: String,
    pub owner: String,
    pub subject: String,
    pub status: String,
    #[serde(default)]
    pub text: String,
}

impl Ticket {
    /// Build a ticket from parsed `Key: value` fields
    pub fn from_fields(fields: &[(String, String)]) -> Result<Self> {
        let mut ticket = Ticket::default();
        let mut seen_id = false;

        for (key, value) in fields {
            match key.to_ascii_lowercase().as_str() {
                "id" => {
                    ticket.id = parse_ticket_id(value)?;
                    seen_id = true;
                }
                "queue" => ticket.queue = value.clone(),
                "owner" => ticket.owner = value.clone(),
                "subject" => ticket.subject = value.clone(),
                "status" => ticket.status = value.clone(),
                "text" => ticket.text = value.clone(),
                _ => {}
            }
        }

        if !seen_id {
            return Err(Error::Parse("ticket without id field".to_string()));
        }

        Ok(ticket)
    }

    /// Whether RT considers this ticket deleted
    pub fn is_deleted(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_DELETED)
    }
}

/// A decoded REST 1.0 response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: String,
    pub code: u16,
    pub reason: String,
    pub body: String,
}

impl Response {
    /// Parse the raw response text
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim_start();
        let (status_line, body) = match text.split_once('\n') {
            Some((line, rest)) => (line.trim_end(), rest),
            None => (text.trim_end(), ""),
        };

        let mut parts = status_line.splitn(3, ' ');
        let version = parts
            .next()
            .filter(|v| v.starts_with("RT/"))
            .ok_or_else(|| Error::Parse(format!("unexpected status line: {}", status_line)))?;
        let code = parts
            .next()
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| Error::Parse(format!("missing status code: {}", status_line)))?;
        let reason = parts.next().unwrap_or_default();

        Ok(Self {
            version: version.to_string(),
            code,
            reason: reason.to_string(),
            body: body.trim().to_string(),
        })
    }

    /// Fail unless RT reported 200
    pub fn ensure_ok(self) -> Result<Self> {
        if self.code == 200 {
            Ok(self)
        } else {
            Err(Error::Status {
                code: self.code,
                reason: self.reason,
            })
        }
    }

    /// Lines starting with `#`, without the marker
    pub fn messages(&self) -> Vec<&str> {
        self.body
            .lines()
            .filter_map(|l| l.strip_prefix('#'))
            .map(str::trim)
            .collect()
    }

    /// `Key: value` fields with continuation lines folded in
    pub fn fields(&self) -> Vec<(String, String)> {
        parse_fields(&self.body)
    }
}

/// Parse `Key: value` lines; lines starting with whitespace continue the previous value
pub fn parse_fields(body: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in body.lines() {
        if line.starts_with('#') || line.trim().is_empty() && !line.starts_with(' ') {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = fields.last_mut() {
                value.push('\n');
                value.push_str(line.trim());
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            fields.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    fields
}

/// Encode a field for a `content` form value, indenting continuation lines
pub fn encode_field(key: &str, value: &str) -> String {
    let mut lines = value.lines();
    let mut out = format!("{}: {}", key, lines.next().unwrap_or_default());
    for line in lines {
        out.push_str("\n ");
        out.push_str(line);
    }
    out
}

/// Accepts both `123` and `ticket/123`
fn parse_ticket_id(value: &str) -> Result<u64> {
    value
        .trim()
        .trim_start_matches("ticket/")
        .parse()
        .map_err(|_| Error::Parse(format!("invalid ticket id: {}", value)))
}

/// Extract the id from a `# Ticket 123 created.` message
fn created_ticket_id(response: &Response) -> Result<u64> {
    for message in response.messages() {
        let mut words = message.split_whitespace();
        if let (Some("Ticket"), Some(id), Some(verb)) = (words.next(), words.next(), words.next()) {
            if verb.starts_with("created") {
                return parse_ticket_id(id);
            }
        }
    }

    Err(Error::Rejected(response.body.clone()))
}

/// RT REST 1.0 client
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
}

impl Client {
    /// Create a client for an RT instance, e.g. `https://rt.example.com`
    pub fn new(
        url: &str,
        user: impl Into<String>,
        password: impl Into<String>,
        insecure: bool,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(insecure)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/REST/1.0", url.trim_end_matches('/')),
            user: user.into(),
            password: password.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "RT GET");

        let text = self
            .http
            .get(&url)
            .query(&[("user", &self.user), ("pass", &self.password)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Response::parse(&text)?.ensure_ok()
    }

    async fn post(&self, path: &str, content: &str) -> Result<Response> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "RT POST");

        let form = [
            ("user", self.user.as_str()),
            ("pass", self.password.as_str()),
            ("content", content),
        ];

        let text = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Response::parse(&text)?.ensure_ok()
    }

    /// Fetch a ticket
    pub async fn ticket(&self, id: u64) -> Result<Ticket> {
        let response = self.get(&format!("ticket/{}/show", id)).await?;

        if response
            .messages()
            .iter()
            .any(|m| m.contains("does not exist"))
        {
            return Err(Error::NotFound(id));
        }

        Ticket::from_fields(&response.fields())
    }

    /// Create a ticket and return it as RT reports it afterwards
    pub async fn create_ticket(&self, queue: &str, subject: &str, text: &str) -> Result<Ticket> {
        let content = [
            encode_field("id", "ticket/new"),
            encode_field("Queue", queue),
            encode_field("Subject", subject),
            encode_field("Text", text),
        ]
        .join("\n");

        let response = self.post("ticket/new", &content).await?;
        let id = created_ticket_id(&response)?;

        self.ticket(id).await
    }

    /// Add a comment to a ticket
    pub async fn comment_ticket(&self, id: u64, text: &str) -> Result<()> {
        let content = [
            encode_field("id", &id.to_string()),
            encode_field("Action", "comment"),
            encode_field("Text", text),
        ]
        .join("\n");

        let response = self.post(&format!("ticket/{}/comment", id), &content).await?;

        let accepted = response
            .messages()
            .iter()
            .any(|m| m.starts_with("Comments added") || m.starts_with("Message recorded"));
        if accepted {
            Ok(())
        } else {
            Err(Error::Rejected(response.body))
        }
    }

    /// Set the status of a ticket and return the updated ticket
    pub async fn update_ticket_status(&self, id: u64, status: &str) -> Result<Ticket> {
        let content = encode_field("Status", status);
        let response = self.post(&format!("ticket/{}/edit", id), &content).await?;

        let updated = response
            .messages()
            .iter()
            .any(|m| m.ends_with("updated.") || m.contains("changed from"));
        if !updated {
            return Err(Error::Rejected(response.body));
        }

        self.ticket(id).await
    }
}
