//! SQLite event cache implementation

use crate::config::CacheSettings;
use crate::event::{EventKey, EventTicket, Notification, TicketId};
use crate::integrations::TicketSystem;
use crate::{Icinga2RtError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One cache row as shown by `dump-cache`
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub host: String,
    pub service: String,
    pub ticket_id: TicketId,
    pub updated_at: DateTime<Utc>,
    pub event: Notification,
}

/// SQLite store of [`EventTicket`]s keyed by host and service
pub struct EventCache {
    conn: Connection,
    path: PathBuf,
}

impl EventCache {
    /// Open or create the cache database described by `settings`
    pub fn open(settings: &CacheSettings) -> Result<Self> {
        Self::open_path(&settings.path, settings.wal_mode)
    }

    /// Open or create a cache database at `path`
    pub fn open_path(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Opening event cache");

        let conn = Connection::open(&path)?;

        if wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        // Every write must be on disk before the call returns
        conn.pragma_update(None, "synchronous", "FULL")?;

        let cache = Self { conn, path };
        cache.init_schema()?;

        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                host TEXT NOT NULL,
                service TEXT NOT NULL,
                event TEXT NOT NULL,
                ticket_id INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (host, service)
            );
            "#,
        )?;

        Ok(())
    }

    /// Entry for `key`, if one is tracked
    pub fn lookup(&self, key: &EventKey) -> Result<Option<EventTicket>> {
        let row = self
            .conn
            .query_row(
                "SELECT event, ticket_id FROM events WHERE host = ? AND service = ?",
                params![key.host, key.service],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        row.map(|(event, ticket_id)| decode_entry(key, &event, ticket_id))
            .transpose()
    }

    /// Record `notification` as the latest event for its key, tracked by `ticket_id`
    pub fn upsert(&self, notification: &Notification, ticket_id: TicketId) -> Result<()> {
        let key = notification.key();
        let event = serde_json::to_string(notification)?;

        tracing::debug!(key = %key, ticket = %ticket_id, "Storing cache entry");

        self.conn.execute(
            r#"
            INSERT INTO events (host, service, event, ticket_id, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (host, service) DO UPDATE SET
                event = excluded.event,
                ticket_id = excluded.ticket_id,
                updated_at = excluded.updated_at
            "#,
            params![
                key.host,
                key.service,
                event,
                ticket_to_sql(ticket_id)?,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(())
    }

    /// Remove the entry for `key`; absent keys are ignored
    pub fn delete(&self, key: &EventKey) -> Result<()> {
        let removed = self.conn.execute(
            "DELETE FROM events WHERE host = ? AND service = ?",
            params![key.host, key.service],
        )?;

        tracing::debug!(key = %key, removed, "Deleted cache entry");
        Ok(())
    }

    /// All entries, ordered by host then service
    pub fn enumerate(&self) -> Result<Vec<(EventKey, EventTicket)>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|entry| {
                let key = EventKey::new(entry.host, entry.service);
                (key, EventTicket::new(entry.event, entry.ticket_id))
            })
            .collect())
    }

    /// All rows including their update time
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT host, service, event, ticket_id, updated_at FROM events ORDER BY host, service",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(host, service, event, ticket_id, updated_at)| {
                let key = EventKey::new(&host, &service);
                let ticket = decode_entry(&key, &event, ticket_id)?;
                let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                    .map_err(|e| {
                        Icinga2RtError::Storage(format!("bad timestamp for {}: {}", key, e))
                    })?
                    .with_timezone(&Utc);

                Ok(CacheEntry {
                    host,
                    service,
                    ticket_id: ticket.ticket_id,
                    updated_at,
                    event: ticket.event,
                })
            })
            .collect()
    }

    /// Keys whose ticket is missing or deleted in `tickets`
    ///
    /// Does not modify the cache.
    pub async fn find_stale<T: TicketSystem + ?Sized>(&self, tickets: &T) -> Result<Vec<EventKey>> {
        let entries = self.enumerate()?;
        let mut stale = Vec::new();

        for (key, entry) in entries {
            match tickets.get_ticket(entry.ticket_id).await {
                Ok(ticket) if !ticket.is_deleted() => {}
                Ok(_) => {
                    tracing::debug!(key = %key, ticket = %entry.ticket_id, "Ticket deleted");
                    stale.push(key);
                }
                Err(e) => {
                    tracing::debug!(key = %key, ticket = %entry.ticket_id, error = %e, "Ticket unavailable");
                    stale.push(key);
                }
            }
        }

        Ok(stale)
    }

    /// Remove `keys` in a single transaction, returning how many rows went away
    pub fn clean(&self, keys: &[EventKey]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut removed = 0;

        {
            let mut stmt = tx.prepare("DELETE FROM events WHERE host = ? AND service = ?")?;
            for key in keys {
                removed += stmt.execute(params![key.host, key.service])?;
            }
        }

        tx.commit()?;

        tracing::info!(removed, "Cleaned cache entries");
        Ok(removed)
    }

    /// Pretty JSON listing of every entry
    pub fn dump(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries()?)?)
    }

    /// Number of tracked entries
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn decode_entry(key: &EventKey, event: &str, ticket_id: i64) -> Result<EventTicket> {
    let event: Notification = serde_json::from_str(event)
        .map_err(|e| Icinga2RtError::Storage(format!("corrupt entry for {}: {}", key, e)))?;
    let ticket_id = u64::try_from(ticket_id).map_err(|_| {
        Icinga2RtError::Storage(format!("negative ticket id {} for {}", ticket_id, key))
    })?;

    Ok(EventTicket::new(event, TicketId::new(ticket_id)))
}

fn ticket_to_sql(id: TicketId) -> Result<i64> {
    i64::try_from(id.as_u64())
        .map_err(|_| Icinga2RtError::Storage(format!("ticket id {} out of range", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::State;
    use crate::integrations::{InMemoryTicketSystem, TicketRecord};
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> EventCache {
        EventCache::open_path(dir.path().join("cache.db"), true).unwrap()
    }

    fn ticket(id: u64, status: &str) -> TicketRecord {
        TicketRecord {
            id: TicketId::new(id),
            status: status.to_string(),
            owner: "Nobody".to_string(),
            queue: "general".to_string(),
            subject: String::new(),
            text: String::new(),
        }
    }

    #[test]
    fn test_cache_creation() {
        let dir = TempDir::new().unwrap();
        let cache = EventCache::open_path(dir.path().join("nested").join("cache.db"), false).unwrap();

        assert!(cache.path().exists());
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_upsert_and_lookup() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);
        let n = Notification::new("web1", "http", State::Critical, "timeout");

        cache.upsert(&n, TicketId::new(7)).unwrap();

        let entry = cache.lookup(&n.key()).unwrap().unwrap();
        assert_eq!(entry.ticket_id, TicketId::new(7));
        assert_eq!(entry.event, n);
        assert!(cache.lookup(&EventKey::host("web1")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_overwrites_single_entry() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache
            .upsert(&Notification::new("web1", "http", State::Warning, "slow"), TicketId::new(1))
            .unwrap();
        cache
            .upsert(&Notification::new("web1", "http", State::Critical, "down"), TicketId::new(2))
            .unwrap();

        assert_eq!(cache.len().unwrap(), 1);
        let entry = cache.lookup(&EventKey::new("web1", "http")).unwrap().unwrap();
        assert_eq!(entry.ticket_id, TicketId::new(2));
        assert_eq!(entry.state(), State::Critical);
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);
        let n = Notification::new("db1", "", State::Critical, "");

        cache.upsert(&n, TicketId::new(3)).unwrap();
        cache.delete(&n.key()).unwrap();
        cache.delete(&n.key()).unwrap();

        assert!(cache.lookup(&n.key()).unwrap().is_none());
    }

    #[test]
    fn test_enumerate_order() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        for (host, service, id) in [("web2", "", 3), ("web1", "ssh", 2), ("web1", "http", 1)] {
            cache
                .upsert(&Notification::new(host, service, State::Critical, ""), TicketId::new(id))
                .unwrap();
        }

        let keys: Vec<String> = cache
            .enumerate()
            .unwrap()
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(keys, vec!["web1/http", "web1/ssh", "web2/"]);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let n = Notification::new("web1", "http", State::Unknown, "no data");

        {
            let cache = open(&dir);
            cache.upsert(&n, TicketId::new(11)).unwrap();
        }

        let cache = open(&dir);
        let entry = cache.lookup(&n.key()).unwrap().unwrap();
        assert_eq!(entry.ticket_id, TicketId::new(11));
        assert_eq!(entry.event.output(), "no data");
    }

    #[tokio::test]
    async fn test_find_stale_and_clean() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);
        let tickets = InMemoryTicketSystem::recording("Nobody");
        tickets.insert(ticket(1, "open"));
        tickets.insert(ticket(2, "deleted"));

        cache
            .upsert(&Notification::new("a", "", State::Critical, ""), TicketId::new(1))
            .unwrap();
        cache
            .upsert(&Notification::new("b", "", State::Critical, ""), TicketId::new(2))
            .unwrap();
        cache
            .upsert(&Notification::new("c", "", State::Critical, ""), TicketId::new(3))
            .unwrap();

        let stale = cache.find_stale(&tickets).await.unwrap();
        assert_eq!(stale, vec![EventKey::host("b"), EventKey::host("c")]);
        assert_eq!(cache.len().unwrap(), 3);
        assert!(tickets.mutations().is_empty());

        assert_eq!(cache.clean(&stale).unwrap(), 2);
        assert_eq!(cache.len().unwrap(), 1);
        assert!(cache.lookup(&EventKey::host("a")).unwrap().is_some());
    }

    #[test]
    fn test_clean_ignores_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        assert_eq!(cache.clean(&[EventKey::host("ghost")]).unwrap(), 0);
    }

    #[test]
    fn test_dump() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);
        cache
            .upsert(&Notification::new("web1", "http", State::Critical, "down"), TicketId::new(5))
            .unwrap();

        let dump = cache.dump().unwrap();
        let json: serde_json::Value = serde_json::from_str(&dump).unwrap();
        assert_eq!(json[0]["host"], "web1");
        assert_eq!(json[0]["ticket_id"], 5);
        assert_eq!(json[0]["event"]["check_result"]["state"], 2);
    }
}
