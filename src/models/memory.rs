use std::sync::Arc;

use parking_lot::RwLock;

use super::{ModelPair, ModelStore, ModelStoreError};

/// Process-local model store, used by tests and the in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    pair: RwLock<Option<Arc<ModelPair>>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryModelStore {
    fn load(&self) -> Result<Arc<ModelPair>, ModelStoreError> {
        self.pair
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| ModelStoreError::Absent {
                location: "memory".to_string(),
            })
    }

    fn save(&self, pair: ModelPair) -> Result<Arc<ModelPair>, ModelStoreError> {
        pair.validate()?;
        let pair = Arc::new(pair);
        *self.pair.write() = Some(Arc::clone(&pair));
        Ok(pair)
    }

    fn exists(&self) -> bool {
        self.pair.read().is_some()
    }
}
