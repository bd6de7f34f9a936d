use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::SessionError;

/// Key-value persistence the session store writes through. The real
/// backend lives outside the crate (extension storage, a file, a
/// database); the in-memory implementation backs tests and defaults.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    async fn save(&self, key: &str, value: Value) -> Result<(), SessionError>;

    async fn load(&self, key: &str) -> Result<Option<Value>, SessionError>;

    async fn remove(&self, key: &str) -> Result<(), SessionError>;
}

impl<B> From<B> for Box<dyn SnapshotBackend>
where
    B: SnapshotBackend + 'static,
{
    fn from(backend: B) -> Self {
        Box::new(backend)
    }
}

#[derive(Default)]
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotBackend for InMemoryBackend {
    async fn save(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>, SessionError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
