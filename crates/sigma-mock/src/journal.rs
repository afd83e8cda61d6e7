//! Request journal.
//!
//! Every request handled by the simulated backend is recorded under the
//! correlation identifier it was served with, so a test can look up exactly
//! what happened to one request while other traffic runs concurrently. The
//! journal is owned by a single task; writers and readers talk to it over a
//! channel.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

/// One handled request and its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    /// Correlation identifier.
    pub id: String,
    /// Handler that served the request, e.g. `servers.start`.
    pub section: String,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Query parameters in request order.
    pub query: Vec<(String, String)>,
    /// Request body as text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    /// Response status code.
    pub status: u16,
    /// Response body as text.
    pub response_body: String,
    /// Time the response was produced.
    pub recorded_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Value of the query parameter `key`.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

enum Command {
    Record(Box<JournalEntry>),
    Get {
        id: String,
        reply: oneshot::Sender<Vec<JournalEntry>>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
    Clear,
}

/// Handle to the journal task.
#[derive(Clone)]
pub struct Journal {
    tx: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Journal {
    /// Spawn the journal task on the current tokio runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Fresh correlation identifier for a request that arrived without one.
    #[must_use]
    pub fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Append an entry.
    pub fn record(&self, entry: JournalEntry) {
        if self.tx.send(Command::Record(Box::new(entry))).is_err() {
            warn!("journal task is gone, entry dropped");
        }
    }

    /// All entries recorded under `id`, oldest first.
    pub async fn get(&self, id: &str) -> Vec<JournalEntry> {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Get {
                id: id.to_string(),
                reply,
            })
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Total number of recorded entries.
    pub async fn len(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Len { reply }).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// True when nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Forget every entry.
    pub fn clear(&self) {
        if self.tx.send(Command::Clear).is_err() {
            warn!("journal task is gone, clear ignored");
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut entries: HashMap<String, Vec<JournalEntry>> = HashMap::new();
    let mut total = 0_usize;

    while let Some(command) = rx.recv().await {
        match command {
            Command::Record(entry) => {
                trace!(id = %entry.id, section = %entry.section, status = entry.status, "journal entry");
                total += 1;
                entries.entry(entry.id.clone()).or_default().push(*entry);
            }
            Command::Get { id, reply } => {
                let _ = reply.send(entries.get(&id).cloned().unwrap_or_default());
            }
            Command::Len { reply } => {
                let _ = reply.send(total);
            }
            Command::Clear => {
                entries.clear();
                total = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, section: &str, status: u16) -> JournalEntry {
        JournalEntry {
            id: id.to_string(),
            section: section.to_string(),
            method: "POST".to_string(),
            path: "servers/u1/action/".to_string(),
            query: vec![("do".to_string(), "start".to_string())],
            request_body: None,
            status,
            response_body: String::new(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn entries_are_grouped_by_id_in_order() {
        let journal = Journal::spawn();
        journal.record(entry("7", "servers.start", 202));
        journal.record(entry("8", "servers.get", 200));
        journal.record(entry("7", "servers.stop", 403));

        let seven = journal.get("7").await;
        assert_eq!(seven.len(), 2);
        assert_eq!(seven[0].section, "servers.start");
        assert_eq!(seven[1].status, 403);
        assert_eq!(seven[0].query_value("do"), Some("start"));
        assert_eq!(journal.len().await, 3);
    }

    #[tokio::test]
    async fn unknown_id_is_empty() {
        let journal = Journal::spawn();
        assert!(journal.get("nope").await.is_empty());
        assert!(journal.is_empty().await);
    }

    #[tokio::test]
    async fn clear_forgets_everything() {
        let journal = Journal::spawn();
        journal.record(entry("1", "drives.list", 200));
        journal.clear();
        assert!(journal.get("1").await.is_empty());
        assert_eq!(journal.len().await, 0);
    }

    #[test]
    fn stopped_journal_degrades_to_empty() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let journal = runtime.block_on(async { Journal::spawn() });
        drop(runtime);

        journal.record(entry("1", "servers.get", 200));
        journal.clear();
        assert!(tokio_test::block_on(journal.get("1")).is_empty());
        assert!(tokio_test::block_on(journal.is_empty()));
    }

    #[tokio::test]
    async fn generated_ids_are_unique() {
        let journal = Journal::spawn();
        let a = journal.next_id();
        let b = journal.next_id();
        assert_ne!(a, b);
    }
}
