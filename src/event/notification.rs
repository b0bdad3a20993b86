//! Icinga2 notification events

use super::{EventKey, State, TicketId};
use serde::{Deserialize, Serialize};

/// Check result attached to a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub state: State,

    #[serde(default)]
    pub output: String,

    /// Unix timestamps (seconds, fractional) of the check execution
    #[serde(default)]
    pub execution_start: f64,
    #[serde(default)]
    pub execution_end: f64,
}

impl CheckResult {
    pub fn new(state: State, output: impl Into<String>) -> Self {
        Self {
            state,
            output: output.into(),
            execution_start: 0.0,
            execution_end: 0.0,
        }
    }
}

/// A `Notification` event from the Icinga2 event stream
///
/// Only host, service and check result drive ticket decisions; the rest of
/// the envelope is kept so cache dumps show what was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub host: String,

    #[serde(default)]
    pub service: String,

    pub check_result: CheckResult,

    #[serde(rename = "type", default)]
    pub event_type: String,

    #[serde(default)]
    pub notification_type: String,

    #[serde(default)]
    pub users: Vec<String>,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub timestamp: f64,
}

impl Notification {
    /// Create a notification with just the fields ticket decisions use
    pub fn new(
        host: impl Into<String>,
        service: impl Into<String>,
        state: State,
        output: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            check_result: CheckResult::new(state, output),
            event_type: "Notification".to_string(),
            notification_type: String::new(),
            users: Vec::new(),
            author: String::new(),
            text: String::new(),
            timestamp: 0.0,
        }
    }

    pub fn key(&self) -> EventKey {
        EventKey::new(&self.host, &self.service)
    }

    pub fn state(&self) -> State {
        self.check_result.state
    }

    pub fn output(&self) -> &str {
        &self.check_result.output
    }
}

/// Last notification seen for a key and the ticket tracking it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTicket {
    pub event: Notification,
    pub ticket_id: TicketId,
}

impl EventTicket {
    pub fn new(event: Notification, ticket_id: TicketId) -> Self {
        Self { event, ticket_id }
    }

    /// State recorded with the last notification
    pub fn state(&self) -> State {
        self.event.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ICINGA_EVENT: &str = r#"{
        "author": "",
        "check_result": {
            "active": true,
            "execution_end": 1712345678.12,
            "execution_start": 1712345677.9,
            "exit_status": 2.0,
            "output": "CRITICAL - Socket timeout after 10 seconds",
            "state": 2.0,
            "type": "CheckResult"
        },
        "host": "web1",
        "notification_type": "PROBLEM",
        "service": "http",
        "text": "",
        "timestamp": 1712345678.2,
        "type": "Notification",
        "users": ["icingaadmin"]
    }"#;

    #[test]
    fn test_decode_icinga_event() {
        let n: Notification = serde_json::from_str(ICINGA_EVENT).unwrap();
        assert_eq!(n.key(), EventKey::new("web1", "http"));
        assert_eq!(n.state(), State::Critical);
        assert_eq!(n.output(), "CRITICAL - Socket timeout after 10 seconds");
        assert_eq!(n.notification_type, "PROBLEM");
        assert_eq!(n.users, vec!["icingaadmin".to_string()]);
    }

    #[test]
    fn test_decode_host_event_without_service() {
        let n: Notification =
            serde_json::from_str(r#"{"host":"db1","check_result":{"state":1}}"#).unwrap();
        assert!(n.key().is_host_check());
        assert_eq!(n.output(), "");
    }

    #[test]
    fn test_decode_integer_state() {
        let n: Notification =
            serde_json::from_str(r#"{"host":"web1","service":"http","check_result":{"state":1}}"#)
                .unwrap();
        assert_eq!(n.state(), State::Warning);
    }

    #[test]
    fn test_decode_rejects_unknown_state() {
        let result = serde_json::from_str::<Notification>(
            r#"{"host":"web1","check_result":{"state":4.0}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_requires_host() {
        assert!(serde_json::from_str::<Notification>(r#"{"check_result":{"state":1}}"#).is_err());
    }

    #[test]
    fn test_event_ticket_state() {
        let et = EventTicket::new(
            Notification::new("web1", "", State::Warning, "load 5"),
            TicketId::new(9),
        );
        assert_eq!(et.state(), State::Warning);
    }
}
