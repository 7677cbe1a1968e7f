use std::{cell::OnceCell, path::Path, sync::Arc};

use object_store::gcp::GoogleCloudStorageBuilder;
use tokio::runtime::Runtime;
use tracing::warn;

use crate::utils::{
    cancel::CancelFlag,
    downloader_def::{
        providers::cloud::CloudStore,
        r#trait::{ObjectProvider, RemoteObject},
    },
    errors::{ResultTrait, StorageError, StorageResult},
};

const BACKEND: &str = "GCS";

/// Google Cloud Storage buckets. Credentials come from the usual
/// `GOOGLE_*` variables; public buckets fall back to unsigned requests.
pub struct GcsSourceProvider {
    rt: Runtime,
    bucket: String,
    store: CloudStore,
    anonymous: OnceCell<CloudStore>,
}

impl GcsSourceProvider {
    pub fn new(bucket: impl Into<String>) -> StorageResult<Self> {
        let bucket = bucket.into();
        let store = Self::build_store(&bucket, false).or_else(|err| {
            warn!("No usable GCS credentials ({}), using anonymous access", err);
            Self::build_store(&bucket, true)
        })?;
        Ok(Self {
            rt: Runtime::new()?,
            bucket,
            store,
            anonymous: OnceCell::new(),
        })
    }

    fn build_store(bucket: &str, anonymous: bool) -> StorageResult<CloudStore> {
        let builder = if anonymous {
            GoogleCloudStorageBuilder::new().with_skip_signature(true)
        } else {
            GoogleCloudStorageBuilder::from_env()
        };
        let store = builder
            .with_bucket_name(bucket)
            .build()
            .backend_err(BACKEND, &format!("connect to bucket {bucket}"))?;
        Ok(CloudStore::new(BACKEND, Arc::new(store)))
    }

    fn active_store(&self) -> &CloudStore {
        self.anonymous.get().unwrap_or(&self.store)
    }
}

impl ObjectProvider for GcsSourceProvider {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn list_objects(&self, prefix: &str) -> StorageResult<Vec<RemoteObject>> {
        match self.store.list(&self.rt, prefix) {
            Ok(objects) => Ok(objects),
            Err(err @ StorageError::Backend { .. }) => {
                warn!(
                    "GCS listing of gs://{}/{} failed ({}), retrying anonymous access",
                    self.bucket, prefix, err
                );
                let anonymous = Self::build_store(&self.bucket, true)?;
                let objects = anonymous.list(&self.rt, prefix)?;
                let _ = self.anonymous.set(anonymous);
                Ok(objects)
            }
            Err(err) => Err(err),
        }
    }

    fn fetch_object(&self, key: &str, dest: &Path, cancel: &CancelFlag) -> StorageResult<()> {
        self.active_store().fetch(&self.rt, key, dest, cancel)
    }
}
