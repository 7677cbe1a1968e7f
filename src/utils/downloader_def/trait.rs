use std::path::Path;

use crate::utils::{cancel::CancelFlag, errors::StorageResult};

/// One entry of a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    /// Zero-byte "folder" placeholder, never materialized.
    pub is_dir: bool,
}

impl RemoteObject {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let is_dir = key.ends_with('/');
        Self { key, is_dir }
    }
}

/// A bucket/container scoped remote store.
pub trait ObjectProvider {
    /// Backend name used in logs and errors.
    fn name(&self) -> &'static str;
    /// Full recursive listing of every object under `prefix`.
    fn list_objects(&self, prefix: &str) -> StorageResult<Vec<RemoteObject>>;
    /// Writes the object's bytes to `dest`; parent directories already exist.
    /// A raised `cancel` stops the copy and leaves no file behind.
    fn fetch_object(&self, key: &str, dest: &Path, cancel: &CancelFlag) -> StorageResult<()>;
}
