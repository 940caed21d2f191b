//! In-process object store
//!
//! Keeps objects in a shared map. Clones share state, so a test can hold a
//! handle to the same store a storage client writes to. Supports failure
//! injection and can emulate backends without conditional writes or
//! prefix filtering.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::failure::{FailureConfig, FailureInjector, StoreOp};
use super::{ObjectInfo, ObjectStore, ObjectStoreConnector, ObjectStoreError, PutMode};
use crate::config::{StorageConfig, StorageType, BUCKET_KEY, CONTAINER_KEY};

#[derive(Debug)]
struct MemoryState {
    objects: BTreeMap<String, Vec<u8>>,
    failures: FailureInjector,
    conditional_put: bool,
    prefix_listing: bool,
    puts: u64,
    gets: u64,
    list_prefixes: Vec<Option<String>>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            failures: FailureInjector::new(),
            conditional_put: true,
            prefix_listing: true,
            puts: 0,
            gets: 0,
            list_prefixes: Vec::new(),
        }
    }
}

/// Object store backed by a shared in-memory map
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryObjectStore {
    /// Create an empty store with conditional puts and prefix listing
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable native no-clobber writes
    pub fn with_conditional_put(self, enabled: bool) -> Self {
        self.lock().conditional_put = enabled;
        self
    }

    /// Enable or disable server-side prefix filtering in `list`
    pub fn with_prefix_listing(self, enabled: bool) -> Self {
        self.lock().prefix_listing = enabled;
        self
    }

    /// Make `op` fail according to `config`
    pub fn inject_failure(&self, op: StoreOp, config: FailureConfig) {
        self.lock().failures.inject(op, config);
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Store an object directly, bypassing failure injection
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.lock().objects.insert(key.into(), data.into());
    }

    /// Raw contents of `key`, bypassing failure injection
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Number of successful puts so far
    pub fn put_count(&self) -> u64 {
        self.lock().puts
    }

    /// Number of successful gets so far
    pub fn get_count(&self) -> u64 {
        self.lock().gets
    }

    /// Prefix passed to each successful `list` call, in call order
    pub fn list_prefixes(&self) -> Vec<Option<String>> {
        self.lock().list_prefixes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, data: &[u8], mode: PutMode) -> Result<(), ObjectStoreError> {
        let mut state = self.lock();
        if let Some(err) = state.failures.check(StoreOp::Put) {
            return Err(err);
        }
        if mode == PutMode::Create && state.conditional_put && state.objects.contains_key(key) {
            return Err(ObjectStoreError::AlreadyExists(key.to_string()));
        }
        state.objects.insert(key.to_string(), data.to_vec());
        state.puts += 1;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let mut state = self.lock();
        if let Some(err) = state.failures.check(StoreOp::Get) {
            return Err(err);
        }
        let data = state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))?;
        state.gets += 1;
        Ok(data)
    }

    fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>, ObjectStoreError> {
        let mut state = self.lock();
        if let Some(err) = state.failures.check(StoreOp::List) {
            return Err(err);
        }
        state.list_prefixes.push(prefix.map(str::to_string));
        let filter = if state.prefix_listing { prefix } else { None };
        Ok(state
            .objects
            .iter()
            .filter(|(key, _)| filter.map_or(true, |p| key.starts_with(p)))
            .map(|(key, data)| ObjectInfo {
                key: key.clone(),
                size: data.len() as u64,
            })
            .collect())
    }

    fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let mut state = self.lock();
        if let Some(err) = state.failures.check(StoreOp::Exists) {
            return Err(err);
        }
        Ok(state.objects.contains_key(key))
    }

    fn supports_conditional_put(&self) -> bool {
        self.lock().conditional_put
    }
}

/// Connector handing out one shared [`MemoryObjectStore`] per container or
/// bucket name
#[derive(Debug, Default)]
pub struct MemoryConnector {
    stores: Mutex<HashMap<String, MemoryObjectStore>>,
}

impl MemoryConnector {
    /// Create a connector with no stores
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under `name`, replacing any existing one
    pub fn with_store(self, name: impl Into<String>, store: MemoryObjectStore) -> Self {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), store);
        self
    }

    /// Handle to the store called `name`, creating it if needed
    pub fn store(&self, name: &str) -> MemoryObjectStore {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

impl ObjectStoreConnector for MemoryConnector {
    fn connect(
        &self,
        storage_type: StorageType,
        config: &StorageConfig,
    ) -> Result<Box<dyn ObjectStore>, ObjectStoreError> {
        let key = match storage_type {
            StorageType::Azure => CONTAINER_KEY,
            StorageType::Aws => BUCKET_KEY,
            StorageType::Local => {
                return Err(ObjectStoreError::Backend(
                    "local storage does not use an object store".to_string(),
                ))
            }
        };
        let name = config
            .get(key)
            .ok_or_else(|| ObjectStoreError::Backend(format!("profile has no '{}'", key)))?;
        Ok(Box::new(self.store(name)))
    }
}
