//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::binder::{PathScope, PathVariable};
use crate::errors::{Result, ZvmError};
use crate::transport::{ProgressCallback, ProgressEvent, Transport};

/// Serves a fixed index and fixed artifact bodies.
#[derive(Default)]
pub struct MockTransport {
    index: Option<String>,
    files: HashMap<String, Vec<u8>>,
    pub index_fetches: AtomicUsize,
    pub downloads: AtomicUsize,
}

impl MockTransport {
    /// A transport whose index fetch fails like an offline network.
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn with_index(index: impl Into<String>) -> Self {
        Self {
            index: Some(index.into()),
            ..Self::default()
        }
    }

    pub fn serve(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.files.insert(url.into(), body);
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.index_fetches.fetch_add(1, Ordering::SeqCst);
        self.index
            .clone()
            .ok_or_else(|| ZvmError::network(format!("connection refused: {url}")))
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let body = self
            .files
            .get(url)
            .ok_or_else(|| ZvmError::network(format!("HTTP error 404 Not Found: {url}")))?;
        if let Some(callback) = &progress {
            callback(ProgressEvent::Started {
                url: url.to_string(),
                total: None,
            });
        }
        std::fs::write(dest, body).map_err(|e| ZvmError::io("mock write failed", e))?;
        if let Some(callback) = &progress {
            callback(ProgressEvent::Completed);
        }
        Ok(body.len() as u64)
    }
}

/// Persisted search-path values held in memory, one per scope.
#[derive(Default)]
pub struct MemoryPathVariable {
    values: Mutex<HashMap<PathScope, String>>,
    deny_writes: bool,
}

impl MemoryPathVariable {
    pub fn with_value(scope: PathScope, value: &str) -> Self {
        let var = Self::default();
        var.values
            .lock()
            .unwrap()
            .insert(scope, value.to_string());
        var
    }

    /// A variable whose writes fail as if the process lacked privileges.
    pub fn read_only(scope: PathScope, value: &str) -> Self {
        let mut var = Self::with_value(scope, value);
        var.deny_writes = true;
        var
    }

    pub fn get(&self, scope: PathScope) -> Option<String> {
        self.values.lock().unwrap().get(&scope).cloned()
    }
}

impl PathVariable for MemoryPathVariable {
    fn read(&self, scope: PathScope) -> Result<String> {
        Ok(self.get(scope).unwrap_or_default())
    }

    fn write(&self, scope: PathScope, value: &str) -> Result<()> {
        if self.deny_writes {
            return Err(ZvmError::Privilege {
                scope,
                message: "access denied".to_string(),
            });
        }
        self.values
            .lock()
            .unwrap()
            .insert(scope, value.to_string());
        Ok(())
    }

    fn location(&self, scope: PathScope) -> String {
        format!("memory:{scope}")
    }
}
