//! State stores.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use herbie_protocols::{Command, ExecutionStore, Keyword, KeywordStore, StoreError};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::state::{KeywordTables, PersistedState};

/// In-memory state store for testing and embedding.
#[derive(Default)]
pub struct MemoryStateStore {
    state: RwLock<PersistedState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keywords(keywords: KeywordTables) -> Self {
        Self {
            state: RwLock::new(PersistedState {
                keywords,
                ..PersistedState::default()
            }),
        }
    }

    pub async fn snapshot(&self) -> PersistedState {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl KeywordStore for MemoryStateStore {
    async fn global_keywords(&self) -> Result<Vec<Keyword>, StoreError> {
        Ok(self.state.read().await.keywords.global.clone())
    }

    async fn local_keywords(&self, domain: &str) -> Result<Vec<Keyword>, StoreError> {
        let state = self.state.read().await;
        Ok(state.keywords.local.get(domain).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ExecutionStore for MemoryStateStore {
    async fn cursor(&self) -> Result<Option<usize>, StoreError> {
        Ok(self.state.read().await.cursor)
    }

    async fn set_cursor(&self, line: usize) -> Result<(), StoreError> {
        self.state.write().await.cursor = Some(line);
        Ok(())
    }

    async fn clear_cursor(&self) -> Result<(), StoreError> {
        self.state.write().await.cursor = None;
        Ok(())
    }

    async fn stop_flag(&self) -> Result<bool, StoreError> {
        Ok(self.state.read().await.stop)
    }

    async fn set_stop_flag(&self, stop: bool) -> Result<(), StoreError> {
        self.state.write().await.stop = stop;
        Ok(())
    }

    async fn command_tree(&self) -> Result<Vec<Command>, StoreError> {
        Ok(self.state.read().await.cmdtree.clone())
    }

    async fn set_command_tree(&self, tree: &[Command]) -> Result<(), StoreError> {
        self.state.write().await.cmdtree = tree.to_vec();
        Ok(())
    }
}

/// File system based state store.
///
/// All state lives in a single JSON document so that another process (for
/// example `herbie stop`) can flip the stop flag of a running script:
/// ```text
/// {state_path}            e.g. ~/.herbie/state.json
/// {state_path}.tmp        written first, then renamed over the document
/// ```
pub struct FileStateStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStateStore {
    /// Create a store backed by `path`, creating its parent directory.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        debug!("FileStateStore initialized at {:?}", path);

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. Missing or unreadable documents yield the default state.
    pub async fn load(&self) -> Result<PersistedState, StoreError> {
        if !self.path.exists() {
            return Ok(PersistedState::default());
        }

        let content = fs::read_to_string(&self.path).await?;
        match serde_json::from_str::<PersistedState>(&content) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!("Failed to deserialize state from {:?}: {}", self.path, e);
                Ok(PersistedState::default())
            }
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut PersistedState) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        f(&mut state);
        self.save(&state).await
    }

    pub async fn keyword_tables(&self) -> Result<KeywordTables, StoreError> {
        Ok(self.load().await?.keywords)
    }

    /// Merge keyword tables into the stored ones.
    pub async fn import_keywords(&self, tables: KeywordTables) -> Result<(), StoreError> {
        let global = tables.global.len();
        let domains = tables.local.len();
        self.update(|state| state.keywords.merge(tables)).await?;
        debug!(global, domains, "Imported keywords");
        Ok(())
    }
}

#[async_trait]
impl KeywordStore for FileStateStore {
    async fn global_keywords(&self) -> Result<Vec<Keyword>, StoreError> {
        Ok(self.load().await?.keywords.global)
    }

    async fn local_keywords(&self, domain: &str) -> Result<Vec<Keyword>, StoreError> {
        let mut state = self.load().await?;
        Ok(state.keywords.local.remove(domain).unwrap_or_default())
    }
}

#[async_trait]
impl ExecutionStore for FileStateStore {
    async fn cursor(&self) -> Result<Option<usize>, StoreError> {
        Ok(self.load().await?.cursor)
    }

    async fn set_cursor(&self, line: usize) -> Result<(), StoreError> {
        self.update(|state| state.cursor = Some(line)).await
    }

    async fn clear_cursor(&self) -> Result<(), StoreError> {
        self.update(|state| state.cursor = None).await
    }

    async fn stop_flag(&self) -> Result<bool, StoreError> {
        Ok(self.load().await?.stop)
    }

    async fn set_stop_flag(&self, stop: bool) -> Result<(), StoreError> {
        self.update(|state| state.stop = stop).await?;
        debug!(stop, "Stop flag updated");
        Ok(())
    }

    async fn command_tree(&self) -> Result<Vec<Command>, StoreError> {
        Ok(self.load().await?.cmdtree)
    }

    async fn set_command_tree(&self, tree: &[Command]) -> Result<(), StoreError> {
        let tree = tree.to_vec();
        self.update(|state| state.cmdtree = tree).await
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
