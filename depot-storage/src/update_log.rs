//! Append-only update log document.
//!
//! The log is one private text object, `{components_dir}/update.log`. Each
//! append reads the whole document and writes it back with the new line.
//! There is no compare-and-swap: two concurrent appends can read the same
//! content, and the later write drops the earlier line.

use std::sync::Arc;

use depot_core::{update_log_path, DepotResult};

use crate::adapter::StorageAdapter;

#[derive(Debug, Clone)]
pub struct UpdateLog {
    storage: Arc<StorageAdapter>,
    path: String,
}

impl UpdateLog {
    pub fn new(storage: Arc<StorageAdapter>, components_dir: &str) -> Self {
        Self {
            storage,
            path: update_log_path(components_dir),
        }
    }

    /// Log under the adapter's configured components directory.
    pub fn for_adapter(storage: Arc<StorageAdapter>) -> Self {
        let components_dir = storage.components_dir().to_string();
        Self::new(storage, &components_dir)
    }

    /// Object key of the log document.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current content of the log, always read from the store.
    pub async fn read(&self) -> DepotResult<String> {
        self.storage.get_file(&self.path, true).await
    }

    /// Append `message` as a new line.
    pub async fn log(&self, message: &str) -> DepotResult<()> {
        let current = self.read().await?;
        let content = format!("{}\n{}", current, message);
        self.storage
            .put_file_content(content, &self.path, true)
            .await?;
        tracing::debug!(path = %self.path, "Appended to update log");
        Ok(())
    }
}
