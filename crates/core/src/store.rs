use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::errors::ApplicationError;
use crate::prompts::DialogState;

/// Persists dialog state between turns. The store only ever sees the serialized form.
#[async_trait]
pub trait DialogStore: Send + Sync {
    async fn load_raw(&self, key: &str) -> Result<Option<String>, ApplicationError>;
    async fn save_raw(&self, key: &str, payload: String) -> Result<(), ApplicationError>;
    async fn remove(&self, key: &str) -> Result<(), ApplicationError>;

    async fn load(&self, key: &str) -> Result<Option<DialogState>, ApplicationError> {
        let Some(payload) = self.load_raw(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&payload).map(Some).map_err(|error| {
            ApplicationError::Persistence(format!("dialog state `{key}` is unreadable: {error}"))
        })
    }

    async fn save(&self, key: &str, state: &DialogState) -> Result<(), ApplicationError> {
        let payload = serde_json::to_string(state).map_err(|error| {
            ApplicationError::Persistence(format!("dialog state `{key}` is unwritable: {error}"))
        })?;
        self.save_raw(key, payload).await
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDialogStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryDialogStore {
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DialogStore for InMemoryDialogStore {
    async fn load_raw(&self, key: &str) -> Result<Option<String>, ApplicationError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ApplicationError::Persistence("dialog store lock is poisoned".to_owned()))?;
        Ok(entries.get(key).cloned())
    }

    async fn save_raw(&self, key: &str, payload: String) -> Result<(), ApplicationError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ApplicationError::Persistence("dialog store lock is poisoned".to_owned()))?;
        entries.insert(key.to_owned(), payload);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ApplicationError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ApplicationError::Persistence("dialog store lock is poisoned".to_owned()))?;
        entries.remove(key);
        Ok(())
    }
}
