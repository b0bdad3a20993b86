//! In-memory ticket system
//!
//! Stands in for Request Tracker when no RT endpoint is configured, so the
//! daemon can be run against a live Icinga2 stream without touching real
//! tickets. That instance keeps only open tickets: deleted ones are dropped
//! and nothing else is remembered.
//!
//! [`InMemoryTicketSystem::recording`] additionally keeps every call, every
//! comment and deleted tickets, which makes it the test double for the
//! synchronizer.

use super::{TicketRecord, TicketSystem};
use crate::event::TicketId;
use crate::{Icinga2RtError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// A call made against the in-memory ticket system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketCall {
    Get(TicketId),
    Create {
        queue: String,
        subject: String,
        text: String,
    },
    Comment {
        id: TicketId,
        text: String,
    },
    UpdateStatus {
        id: TicketId,
        status: String,
    },
}

impl TicketCall {
    /// Whether the call changes ticket state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, TicketCall::Get(_))
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    tickets: BTreeMap<TicketId, TicketRecord>,
    comments: BTreeMap<TicketId, Vec<String>>,
    calls: Vec<TicketCall>,
    fail_mutations: bool,
}

/// Ticket system that keeps tickets in a map
#[derive(Debug)]
pub struct InMemoryTicketSystem {
    nobody: String,
    recording: bool,
    inner: Mutex<Inner>,
}

impl InMemoryTicketSystem {
    /// New tickets are owned by `nobody`; calls are not recorded
    pub fn new(nobody: impl Into<String>) -> Self {
        Self::build(nobody.into(), false)
    }

    /// Like [`InMemoryTicketSystem::new`], but keeps calls, comments and
    /// deleted tickets for inspection
    pub fn recording(nobody: impl Into<String>) -> Self {
        Self::build(nobody.into(), true)
    }

    fn build(nobody: String, recording: bool) -> Self {
        Self {
            nobody,
            recording,
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Number of tickets held
    pub fn len(&self) -> usize {
        self.inner().tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        // A panicking test must not hide the recorded calls from the others
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an existing ticket, e.g. one referenced by a warm cache
    pub fn insert(&self, record: TicketRecord) {
        let mut inner = self.inner();
        inner.next_id = inner.next_id.max(record.id.as_u64() + 1);
        inner.tickets.insert(record.id, record);
    }

    /// Drop a ticket as if an operator had wiped it
    pub fn remove(&self, id: TicketId) -> Option<TicketRecord> {
        self.inner().tickets.remove(&id)
    }

    pub fn set_owner(&self, id: TicketId, owner: &str) {
        if let Some(ticket) = self.inner().tickets.get_mut(&id) {
            ticket.owner = owner.to_string();
        }
    }

    pub fn set_status(&self, id: TicketId, status: &str) {
        if let Some(ticket) = self.inner().tickets.get_mut(&id) {
            ticket.status = status.to_string();
        }
    }

    /// Make create/comment/update calls fail until switched off again
    pub fn fail_mutations(&self, fail: bool) {
        self.inner().fail_mutations = fail;
    }

    pub fn ticket(&self, id: TicketId) -> Option<TicketRecord> {
        self.inner().tickets.get(&id).cloned()
    }

    pub fn comments(&self, id: TicketId) -> Vec<String> {
        self.inner().comments.get(&id).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<TicketCall> {
        self.inner().calls.clone()
    }

    /// Calls that changed ticket state
    pub fn mutations(&self) -> Vec<TicketCall> {
        self.inner()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inner().calls.clear();
    }

    fn record(&self, inner: &mut Inner, call: TicketCall) {
        if self.recording {
            inner.calls.push(call);
        }
    }

    fn record_mutation(&self, inner: &mut Inner, call: TicketCall) -> Result<()> {
        self.record(inner, call);
        if inner.fail_mutations {
            return Err(Icinga2RtError::TicketSystem(
                "in-memory ticket system rejects mutations".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketSystem for InMemoryTicketSystem {
    async fn get_ticket(&self, id: TicketId) -> Result<TicketRecord> {
        let mut inner = self.inner();
        self.record(&mut inner, TicketCall::Get(id));
        inner
            .tickets
            .get(&id)
            .cloned()
            .ok_or(Icinga2RtError::TicketNotFound(id.as_u64()))
    }

    async fn create_ticket(&self, queue: &str, subject: &str, text: &str) -> Result<TicketRecord> {
        let mut inner = self.inner();
        self.record_mutation(
            &mut inner,
            TicketCall::Create {
                queue: queue.to_string(),
                subject: subject.to_string(),
                text: text.to_string(),
            },
        )?;

        let id = TicketId::new(inner.next_id);
        inner.next_id += 1;

        let record = TicketRecord {
            id,
            status: "new".to_string(),
            owner: self.nobody.clone(),
            queue: queue.to_string(),
            subject: subject.to_string(),
            text: text.to_string(),
        };
        inner.tickets.insert(id, record.clone());

        info!(ticket = %id, queue = %queue, subject = %subject, "in-memory: created ticket");
        Ok(record)
    }

    async fn comment_ticket(&self, id: TicketId, text: &str) -> Result<()> {
        let mut inner = self.inner();
        self.record_mutation(
            &mut inner,
            TicketCall::Comment {
                id,
                text: text.to_string(),
            },
        )?;

        if !inner.tickets.contains_key(&id) {
            return Err(Icinga2RtError::TicketNotFound(id.as_u64()));
        }
        if self.recording {
            inner.comments.entry(id).or_default().push(text.to_string());
        }

        info!(ticket = %id, "in-memory: commented ticket");
        Ok(())
    }

    async fn update_ticket_status(&self, id: TicketId, status: &str) -> Result<TicketRecord> {
        let mut inner = self.inner();
        self.record_mutation(
            &mut inner,
            TicketCall::UpdateStatus {
                id,
                status: status.to_string(),
            },
        )?;

        let ticket = inner
            .tickets
            .get_mut(&id)
            .ok_or(Icinga2RtError::TicketNotFound(id.as_u64()))?;
        ticket.status = status.to_string();
        let updated = ticket.clone();

        if updated.is_deleted() && !self.recording {
            inner.tickets.remove(&id);
        }

        info!(ticket = %id, status = %status, "in-memory: updated ticket status");
        Ok(updated)
    }
}
