//! Concurrency-safe map of live download sessions.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use super::{DownloadSession, DownloadStatus};

/// Mutations of one session are serialized by its entry mutex; operations
/// on distinct ids never block each other. Absence of an id is a normal
/// outcome, not a fault.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Mutex<DownloadSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its id. Fails if the id already maps to a
    /// live session, so one id never points at two engine handles.
    pub fn insert_new(&self, session: DownloadSession) -> Result<(), DownloadSession> {
        match self.sessions.entry(session.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(session),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(session)));
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mutex<DownloadSession>>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Mutex<DownloadSession>>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids whose cached status matches `status`. Sessions locked by an
    /// in-flight poll are skipped; they are live, not stale.
    pub fn ids_with_status(&self, status: DownloadStatus) -> Vec<String> {
        self.sessions
            .iter()
            .filter_map(|entry| {
                let session = entry.value().try_lock().ok()?;
                (session.status == status).then(|| entry.key().clone())
            })
            .collect()
    }

    /// Ids of sessions in a finished state (completed, error, cancelled).
    pub fn terminal_ids(&self) -> Vec<String> {
        self.sessions
            .iter()
            .filter_map(|entry| {
                let session = entry.value().try_lock().ok()?;
                let done = session.status.is_terminal()
                    || session.status == DownloadStatus::Completed;
                done.then(|| entry.key().clone())
            })
            .collect()
    }
}
