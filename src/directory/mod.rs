//! Read-only view of the agent registry
//!
//! The registry itself lives outside this crate. Resolution works against a
//! [`DirectorySnapshot`] taken once per call, so a registry refresh in the
//! middle of a resolution cannot change its outcome.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::protocol::{agent::AgentDirectoryEntry, error::A2AResult};

/// Immutable set of directory entries, in registry order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectorySnapshot {
    entries: Vec<AgentDirectoryEntry>,
}

impl DirectorySnapshot {
    /// Build a snapshot; later entries replace earlier ones with the same id
    pub fn new(entries: impl IntoIterator<Item = AgentDirectoryEntry>) -> Self {
        let mut ordered: Vec<AgentDirectoryEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for entry in entries {
            match index.get(&entry.agent_id) {
                Some(&slot) => ordered[slot] = entry,
                None => {
                    index.insert(entry.agent_id.clone(), ordered.len());
                    ordered.push(entry);
                }
            }
        }
        Self { entries: ordered }
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentDirectoryEntry> {
        self.entries.iter().find(|entry| entry.agent_id == agent_id)
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.get(agent_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentDirectoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<AgentDirectoryEntry> for DirectorySnapshot {
    fn from_iter<I: IntoIterator<Item = AgentDirectoryEntry>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Source of directory snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Current view of the registry
    async fn snapshot(&self) -> A2AResult<DirectorySnapshot>;
}

/// Directory held in memory, refreshed by whoever owns the registry feed
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    entries: Arc<RwLock<DirectorySnapshot>>,
}

impl InMemoryDirectory {
    pub fn new(entries: impl IntoIterator<Item = AgentDirectoryEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(DirectorySnapshot::new(entries))),
        }
    }

    /// Replace the whole view
    pub async fn replace(&self, entries: impl IntoIterator<Item = AgentDirectoryEntry>) {
        *self.entries.write().await = DirectorySnapshot::new(entries);
    }

    /// Insert or update one entry
    pub async fn upsert(&self, entry: AgentDirectoryEntry) {
        let mut snapshot = self.entries.write().await;
        let entries = snapshot.entries.iter().cloned().chain(std::iter::once(entry));
        *snapshot = DirectorySnapshot::new(entries.collect::<Vec<_>>());
    }

    /// Drop an entry, returning whether it was present
    pub async fn remove(&self, agent_id: &str) -> bool {
        let mut snapshot = self.entries.write().await;
        let before = snapshot.entries.len();
        snapshot.entries.retain(|entry| entry.agent_id != agent_id);
        snapshot.entries.len() != before
    }
}

#[async_trait]
impl AgentDirectory for InMemoryDirectory {
    async fn snapshot(&self) -> A2AResult<DirectorySnapshot> {
        Ok(self.entries.read().await.clone())
    }
}
