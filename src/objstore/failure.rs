//! Failure injection for the in-memory object store
//!
//! Lets tests make individual store operations fail, either always or for
//! the first N calls.

use std::collections::HashMap;

use super::ObjectStoreError;

/// Object-store operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Put,
    Get,
    List,
    Exists,
}

/// How an injected failure behaves
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Error to return
    pub error: ObjectStoreError,
    /// Calls that fail before the operation recovers; `None` fails forever
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that returns a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self {
            error: ObjectStoreError::Backend(message.into()),
            fail_count: None,
        }
    }

    /// Create a config that returns `error`
    pub fn error(error: ObjectStoreError) -> Self {
        Self {
            error,
            fail_count: None,
        }
    }

    /// Fail only the first `count` calls
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Tracks injected failures and how often each operation was called
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<StoreOp, FailureConfig>,
    call_counts: HashMap<StoreOp, u32>,
}

impl FailureInjector {
    /// An injector with nothing armed
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `op` with `config`, resetting its call count
    pub fn inject(&mut self, op: StoreOp, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    /// Disarm every operation
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Record a call to `op` and return the error it should fail with, if any
    pub fn check(&mut self, op: StoreOp) -> Option<ObjectStoreError> {
        let config = self.configs.get(&op)?;
        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;

        match config.fail_count {
            Some(limit) if *count > limit => None,
            _ => Some(config.error.clone()),
        }
    }
}
