use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::StateError;

/// A flat JSON object on disk mapping keys to last-seen ids.
///
/// Every save rereads the file and rewrites it whole. The mutex keeps
/// concurrent feeds from losing each other's updates inside one process.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value stored under `key`. Missing or unreadable files read as empty.
    pub async fn load(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().await;
        match self.read_map().await.remove(key)? {
            Value::String(value) => Some(value),
            Value::Number(value) => Some(value.to_string()),
            other => {
                tracing::warn!(key, value = %other, "ignoring non-scalar state value");
                None
            }
        }
    }

    pub async fn save(&self, key: &str, value: &str) -> Result<(), StateError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await;
        map.insert(key.to_string(), Value::String(value.to_string()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&Value::Object(map))?;
        tokio::fs::write(&self.path, json).await?;
        tracing::debug!(path = %self.path.display(), key, value, "state saved");
        Ok(())
    }

    async fn read_map(&self) -> Map<String, Value> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read state file");
                return Map::new();
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::warn!(path = %self.path.display(), "state file is not a JSON object, starting empty");
                Map::new()
            }
        }
    }
}
