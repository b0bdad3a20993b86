//! Ticket lifecycle state machine
//!
//! For every notification the synchronizer looks up the cached ticket, checks
//! the permit filter and then opens, comments, deletes or detaches tickets.
//!
//! | cached entry          | new state       | action                               |
//! |-----------------------|-----------------|--------------------------------------|
//! | none                  | OK              | nothing                              |
//! | none                  | problem         | create ticket, cache it              |
//! | ticket gone/deleted   | OK              | drop the cache entry                 |
//! | ticket gone/deleted   | problem         | create ticket, replace cache entry   |
//! | ticket unowned        | OK              | set status `deleted`, drop entry     |
//! | ticket owned          | OK              | comment, drop entry (ticket stays)   |
//! | ticket alive          | same problem    | nothing                              |
//! | ticket alive          | other problem   | comment, update entry                |
//!
//! A recovery never opens a ticket: if the tracked ticket vanished before
//! the OK notification arrived, the entry is dropped and RT is left alone.

use super::metrics;
use super::observer::{SyncEvent, SyncObserver, TracingObserver};
use crate::cache::EventCache;
use crate::config::TicketConfig;
use crate::event::{EventTicket, Notification, State, TicketId};
use crate::integrations::{TicketRecord, TicketSystem};
use crate::permit::PermitFilter;
use crate::Result;
use std::fmt;
use std::sync::Arc;

/// What processing a notification did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// State not permitted
    Ignored,
    /// OK without a tracked ticket
    NoOp,
    /// Same problem state as cached
    Unchanged(TicketId),
    /// New ticket for an untracked problem
    Created(TicketId),
    /// The cached ticket was gone and a new one was opened
    Recreated { previous: TicketId, ticket: TicketId },
    /// Problem state changed
    Commented(TicketId),
    /// Recovered, unowned ticket deleted
    Deleted(TicketId),
    /// Recovered, owned ticket commented and no longer tracked
    Detached(TicketId),
    /// Recovered, cached ticket was already gone
    Forgotten(TicketId),
}

impl SyncOutcome {
    /// Short label, used for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Ignored => "ignored",
            SyncOutcome::NoOp => "noop",
            SyncOutcome::Unchanged(_) => "unchanged",
            SyncOutcome::Created(_) => "created",
            SyncOutcome::Recreated { .. } => "recreated",
            SyncOutcome::Commented(_) => "commented",
            SyncOutcome::Deleted(_) => "deleted",
            SyncOutcome::Detached(_) => "detached",
            SyncOutcome::Forgotten(_) => "forgotten",
        }
    }

    /// Ticket the outcome refers to, if any
    pub fn ticket(&self) -> Option<TicketId> {
        match *self {
            SyncOutcome::Ignored | SyncOutcome::NoOp => None,
            SyncOutcome::Recreated { ticket, .. } => Some(ticket),
            SyncOutcome::Unchanged(id)
            | SyncOutcome::Created(id)
            | SyncOutcome::Commented(id)
            | SyncOutcome::Deleted(id)
            | SyncOutcome::Detached(id)
            | SyncOutcome::Forgotten(id) => Some(id),
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Recreated { previous, ticket } => {
                write!(f, "recreated {} (was {})", ticket, previous)
            }
            other => match other.ticket() {
                Some(id) => write!(f, "{} {}", other.as_str(), id),
                None => f.write_str(other.as_str()),
            },
        }
    }
}

/// Where tickets go and who "nobody" is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketSettings {
    /// Owner value of unassigned tickets
    pub nobody: String,
    /// Queue for new tickets
    pub queue: String,
}

impl From<&TicketConfig> for TicketSettings {
    fn from(config: &TicketConfig) -> Self {
        Self {
            nobody: config.nobody.clone(),
            queue: config.queue.clone(),
        }
    }
}

/// Subject of a new ticket
pub fn format_subject(notification: &Notification) -> String {
    if notification.service.is_empty() {
        format!("Host: {} is {}", notification.host, notification.state())
    } else {
        format!(
            "Host: {} Service: {} is {}",
            notification.host,
            notification.service,
            notification.state()
        )
    }
}

/// Comment added on a state change
pub fn format_comment(notification: &Notification) -> String {
    if notification.output().is_empty() {
        notification.state().to_string()
    } else {
        format!(
            "New status: {} Output: {}",
            notification.state(),
            notification.output()
        )
    }
}

/// Body of a new ticket
pub fn format_text(notification: &Notification) -> String {
    format!("Output: {}", notification.output())
}

/// Keeps tickets in line with notifications
pub struct TicketSynchronizer<T> {
    cache: EventCache,
    tickets: T,
    permit: PermitFilter,
    settings: TicketSettings,
    observer: Arc<dyn SyncObserver>,
}

impl<T: TicketSystem> TicketSynchronizer<T> {
    pub fn new(
        cache: EventCache,
        tickets: T,
        permit: PermitFilter,
        settings: TicketSettings,
    ) -> Self {
        Self {
            cache,
            tickets,
            permit,
            settings,
            observer: Arc::new(TracingObserver::default()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Drive one notification through the state machine
    ///
    /// # Errors
    /// Cache failures and failed ticket mutations. A failed ticket lookup is
    /// not an error: the ticket counts as gone.
    pub async fn process(&mut self, notification: &Notification) -> Result<SyncOutcome> {
        self.observer
            .observe(&SyncEvent::Received(notification.clone()));

        let key = notification.key();
        let cached = self.cache.lookup(&key)?;

        let outcome = if !self.permit.permitted(notification) {
            SyncOutcome::Ignored
        } else {
            match cached {
                None if notification.state().is_ok() => SyncOutcome::NoOp,
                None => SyncOutcome::Created(self.open_ticket(notification).await?),
                Some(entry) => self.follow_up(notification, entry).await?,
            }
        };

        self.observer.observe(&SyncEvent::Processed {
            key,
            state: notification.state(),
            outcome,
        });

        Ok(outcome)
    }

    async fn follow_up(
        &mut self,
        notification: &Notification,
        entry: EventTicket,
    ) -> Result<SyncOutcome> {
        let reason = match self.tickets.get_ticket(entry.ticket_id).await {
            Ok(ticket) if !ticket.is_deleted() => {
                return self.update_ticket(notification, &entry, &ticket).await;
            }
            Ok(ticket) => format!("status is {}", ticket.status),
            Err(e) => e.to_string(),
        };

        self.observer.observe(&SyncEvent::TicketGone {
            key: notification.key(),
            ticket: entry.ticket_id,
            reason,
        });

        if notification.state().is_ok() {
            self.cache.delete(&notification.key())?;
            return Ok(SyncOutcome::Forgotten(entry.ticket_id));
        }

        let ticket = self.open_ticket(notification).await?;
        Ok(SyncOutcome::Recreated {
            previous: entry.ticket_id,
            ticket,
        })
    }

    async fn update_ticket(
        &mut self,
        notification: &Notification,
        entry: &EventTicket,
        ticket: &TicketRecord,
    ) -> Result<SyncOutcome> {
        let id = entry.ticket_id;
        let state = notification.state();

        if state == State::Ok {
            if ticket.owner == self.settings.nobody {
                let result = self
                    .tickets
                    .update_ticket_status(id, rt::STATUS_DELETED)
                    .await;
                metrics::record_ticket_operation("update_status", result.is_ok());
                result?;
                self.cache.delete(&notification.key())?;
                return Ok(SyncOutcome::Deleted(id));
            }

            self.comment(id, notification).await?;
            self.cache.delete(&notification.key())?;
            return Ok(SyncOutcome::Detached(id));
        }

        if state == entry.state() {
            return Ok(SyncOutcome::Unchanged(id));
        }

        self.comment(id, notification).await?;
        self.cache.upsert(notification, id)?;
        Ok(SyncOutcome::Commented(id))
    }

    async fn open_ticket(&mut self, notification: &Notification) -> Result<TicketId> {
        let result = self
            .tickets
            .create_ticket(
                &self.settings.queue,
                &format_subject(notification),
                &format_text(notification),
            )
            .await;
        metrics::record_ticket_operation("create", result.is_ok());
        let ticket = result?;

        self.cache.upsert(notification, ticket.id)?;
        Ok(ticket.id)
    }

    async fn comment(&mut self, id: TicketId, notification: &Notification) -> Result<()> {
        let result = self
            .tickets
            .comment_ticket(id, &format_comment(notification))
            .await;
        metrics::record_ticket_operation("comment", result.is_ok());
        result
    }

    pub fn cache(&self) -> &EventCache {
        &self.cache
    }

    pub fn tickets(&self) -> &T {
        &self.tickets
    }

    pub fn permit(&self) -> &PermitFilter {
        &self.permit
    }
}

#[cfg(test)]
mod tests {
    use super::super::observer::testing::RecordingObserver;
    use super::*;
    use crate::event::EventKey;
    use crate::integrations::{InMemoryTicketSystem, TicketCall};
    use crate::Icinga2RtError;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        sync: TicketSynchronizer<InMemoryTicketSystem>,
        observer: Arc<RecordingObserver>,
    }

    fn harness(permit: PermitFilter) -> Harness {
        let dir = TempDir::new().unwrap();
        let cache = EventCache::open_path(dir.path().join("cache.db"), true).unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let sync = TicketSynchronizer::new(
            cache,
            InMemoryTicketSystem::recording("Nobody"),
            permit,
            TicketSettings {
                nobody: "Nobody".to_string(),
                queue: "general".to_string(),
            },
        )
        .with_observer(observer.clone());

        Harness {
            _dir: dir,
            sync,
            observer,
        }
    }

    fn web(state: State, output: &str) -> Notification {
        Notification::new("web1", "http", state, output)
    }

    fn key() -> EventKey {
        EventKey::new("web1", "http")
    }

    #[test]
    fn test_format_subject() {
        assert_eq!(
            format_subject(&web(State::Critical, "")),
            "Host: web1 Service: http is Critical"
        );
        assert_eq!(
            format_subject(&Notification::new("db1", "", State::Warning, "")),
            "Host: db1 is Warning"
        );
    }

    #[test]
    fn test_format_comment() {
        assert_eq!(
            format_comment(&web(State::Warning, "slow")),
            "New status: Warning Output: slow"
        );
        assert_eq!(format_comment(&web(State::Ok, "")), "OK");
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(SyncOutcome::Created(TicketId::new(4)).to_string(), "created #4");
        assert_eq!(SyncOutcome::Ignored.to_string(), "ignored");
        assert_eq!(
            SyncOutcome::Recreated {
                previous: TicketId::new(1),
                ticket: TicketId::new(2)
            }
            .to_string(),
            "recreated #2 (was #1)"
        );
    }

    #[tokio::test]
    async fn test_fresh_problem_opens_ticket() {
        let mut h = harness(PermitFilter::allow_all());

        let outcome = h.sync.process(&web(State::Critical, "timeout")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Created(TicketId::new(1)));

        assert_eq!(
            h.sync.tickets().mutations(),
            vec![TicketCall::Create {
                queue: "general".to_string(),
                subject: "Host: web1 Service: http is Critical".to_string(),
                text: "Output: timeout".to_string(),
            }]
        );
        let entry = h.sync.cache().lookup(&key()).unwrap().unwrap();
        assert_eq!(entry.ticket_id, TicketId::new(1));
        assert_eq!(entry.state(), State::Critical);
    }

    #[tokio::test]
    async fn test_ok_without_ticket_is_noop() {
        let mut h = harness(PermitFilter::allow_all());

        let outcome = h.sync.process(&web(State::Ok, "fine")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::NoOp);
        assert!(h.sync.tickets().calls().is_empty());
        assert!(h.sync.cache().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_state_change_comments() {
        let mut h = harness(PermitFilter::allow_all());
        h.sync.process(&web(State::Warning, "slow")).await.unwrap();

        let outcome = h.sync.process(&web(State::Critical, "down")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Commented(TicketId::new(1)));
        assert_eq!(
            h.sync.tickets().comments(TicketId::new(1)),
            vec!["New status: Critical Output: down".to_string()]
        );

        let entry = h.sync.cache().lookup(&key()).unwrap().unwrap();
        assert_eq!(entry.ticket_id, TicketId::new(1));
        assert_eq!(entry.state(), State::Critical);
    }

    #[tokio::test]
    async fn test_same_state_is_unchanged() {
        let mut h = harness(PermitFilter::allow_all());
        h.sync.process(&web(State::Critical, "down")).await.unwrap();
        h.sync.tickets().clear_calls();

        let outcome = h.sync.process(&web(State::Critical, "still down")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Unchanged(TicketId::new(1)));
        assert!(h.sync.tickets().mutations().is_empty());

        let entry = h.sync.cache().lookup(&key()).unwrap().unwrap();
        assert_eq!(entry.event.output(), "down");
    }

    #[tokio::test]
    async fn test_recovery_deletes_unowned_ticket() {
        let mut h = harness(PermitFilter::allow_all());
        h.sync.process(&web(State::Critical, "down")).await.unwrap();

        let outcome = h.sync.process(&web(State::Ok, "up")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Deleted(TicketId::new(1)));

        let ticket = h.sync.tickets().ticket(TicketId::new(1)).unwrap();
        assert!(ticket.is_deleted());
        assert!(h.sync.tickets().comments(TicketId::new(1)).is_empty());
        assert!(h.sync.cache().lookup(&key()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recovery_detaches_owned_ticket() {
        let mut h = harness(PermitFilter::allow_all());
        h.sync.process(&web(State::Critical, "down")).await.unwrap();
        h.sync.tickets().set_owner(TicketId::new(1), "alice");

        let outcome = h.sync.process(&web(State::Ok, "up")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Detached(TicketId::new(1)));

        let ticket = h.sync.tickets().ticket(TicketId::new(1)).unwrap();
        assert_eq!(ticket.status, "new");
        assert_eq!(
            h.sync.tickets().comments(TicketId::new(1)),
            vec!["New status: OK Output: up".to_string()]
        );
        assert!(h.sync.cache().lookup(&key()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleted_ticket_is_replaced() {
        let mut h = harness(PermitFilter::allow_all());
        h.sync.process(&web(State::Warning, "slow")).await.unwrap();
        h.sync.tickets().set_status(TicketId::new(1), "deleted");

        let outcome = h.sync.process(&web(State::Critical, "down")).await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Recreated {
                previous: TicketId::new(1),
                ticket: TicketId::new(2)
            }
        );
        assert!(h.sync.tickets().comments(TicketId::new(1)).is_empty());
        let entry = h.sync.cache().lookup(&key()).unwrap().unwrap();
        assert_eq!(entry.ticket_id, TicketId::new(2));
    }

    #[tokio::test]
    async fn test_missing_ticket_is_replaced_and_reported() {
        let mut h = harness(PermitFilter::allow_all());
        h.sync.process(&web(State::Critical, "down")).await.unwrap();
        h.sync.tickets().remove(TicketId::new(1));

        let outcome = h.sync.process(&web(State::Critical, "down")).await.unwrap();
        assert_eq!(outcome.ticket(), Some(TicketId::new(2)));

        let gone = h
            .observer
            .events()
            .into_iter()
            .any(|e| matches!(e, SyncEvent::TicketGone { ticket, .. } if ticket == TicketId::new(1)));
        assert!(gone);
    }

    #[tokio::test]
    async fn test_recovery_with_missing_ticket_forgets_entry() {
        let mut h = harness(PermitFilter::allow_all());
        h.sync.process(&web(State::Critical, "down")).await.unwrap();
        h.sync.tickets().remove(TicketId::new(1));
        h.sync.tickets().clear_calls();

        let outcome = h.sync.process(&web(State::Ok, "up")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Forgotten(TicketId::new(1)));
        assert!(h.sync.tickets().mutations().is_empty());
        assert!(h.sync.cache().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_unpermitted_state_is_ignored() {
        let mut h = harness(PermitFilter::new([State::Critical, State::Ok]));

        let outcome = h.sync.process(&web(State::Warning, "slow")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Ignored);
        assert!(h.sync.tickets().calls().is_empty());
        assert!(h.sync.cache().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_unpermitted_state_leaves_tracked_ticket_alone() {
        let mut h = harness(PermitFilter::new([State::Critical]));
        h.sync.process(&web(State::Critical, "down")).await.unwrap();
        h.sync.tickets().clear_calls();

        let outcome = h.sync.process(&web(State::Ok, "up")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Ignored);
        assert!(h.sync.tickets().calls().is_empty());
        assert!(h.sync.cache().lookup(&key()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_create_leaves_cache_untouched() {
        let mut h = harness(PermitFilter::allow_all());
        h.sync.tickets().fail_mutations(true);

        let result = h.sync.process(&web(State::Critical, "down")).await;
        assert!(matches!(result, Err(Icinga2RtError::TicketSystem(_))));
        assert!(h.sync.cache().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_observer_sees_every_notification() {
        let mut h = harness(PermitFilter::allow_all());
        h.sync.process(&web(State::Critical, "down")).await.unwrap();
        h.sync.process(&web(State::Ok, "up")).await.unwrap();

        assert_eq!(
            h.observer.outcomes(),
            vec![
                SyncOutcome::Created(TicketId::new(1)),
                SyncOutcome::Deleted(TicketId::new(1))
            ]
        );
        let received = h
            .observer
            .events()
            .iter()
            .filter(|e| matches!(e, SyncEvent::Received(_)))
            .count();
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn test_ticket_operations_are_counted() {
        let created = || {
            metrics::TICKET_OPERATIONS
                .with_label_values(&["create", "success"])
                .get()
        };
        let commented = || {
            metrics::TICKET_OPERATIONS
                .with_label_values(&["comment", "success"])
                .get()
        };
        let (created_before, commented_before) = (created(), commented());

        let mut h = harness(PermitFilter::allow_all());
        h.sync.process(&web(State::Warning, "slow")).await.unwrap();
        h.sync.process(&web(State::Critical, "down")).await.unwrap();

        // Counters are process-wide and other tests run concurrently
        assert!(created() >= created_before + 1.0);
        assert!(commented() >= commented_before + 1.0);
    }
}
