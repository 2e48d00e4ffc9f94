//! In-process session cache keyed by `(absolute_path, content_hash)` (§6).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::AnalysisResult;

type Key = (String, String);

/// Write-mostly map from `(path, content_hash)` to the last analysis run
/// for that exact file content. Never mutates a stored `AnalysisResult`
/// once inserted — only ever replaced wholesale.
#[derive(Default)]
pub struct SessionCache {
    entries: RwLock<HashMap<Key, Arc<AnalysisResult>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &str, content_hash: &str) -> Option<Arc<AnalysisResult>> {
        let key = (path.to_string(), content_hash.to_string());
        self.entries.read().await.get(&key).cloned()
    }

    pub async fn insert(&self, path: String, content_hash: String, result: Arc<AnalysisResult>) {
        self.entries.write().await.insert((path, content_hash), result);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
