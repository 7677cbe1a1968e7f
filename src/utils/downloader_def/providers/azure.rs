use std::{cell::OnceCell, path::Path, sync::Arc};

use object_store::azure::MicrosoftAzureBuilder;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::{
    models::config::AzureConfig,
    storage::credentials::{self, BearerToken},
    utils::{
        cancel::CancelFlag,
        downloader_def::{
            providers::cloud::CloudStore,
            r#trait::{ObjectProvider, RemoteObject},
        },
        errors::{ResultTrait, StorageError, StorageResult},
    },
};

const BACKEND: &str = "Azure Blob";

/// How the blob client authenticates.
#[derive(Debug)]
enum BlobAuth {
    /// Whatever the `AZURE_*` variables provide.
    Ambient,
    Token(BearerToken),
    Anonymous,
}

/// One container of an Azure storage account.
pub struct AzureBlobSourceProvider {
    rt: Runtime,
    config: AzureConfig,
    account: String,
    container: String,
    /// Store that answered the listing; fetches reuse it.
    active: OnceCell<CloudStore>,
}

impl AzureBlobSourceProvider {
    pub fn new(
        config: &AzureConfig,
        account: impl Into<String>,
        container: impl Into<String>,
    ) -> StorageResult<Self> {
        let account = account.into();
        let container = container.into();
        info!(
            "Connecting to BLOB account: [{}], container: [{}]",
            account, container
        );
        Ok(Self {
            rt: Runtime::new()?,
            config: config.clone(),
            account,
            container,
            active: OnceCell::new(),
        })
    }

    fn build_store(&self, auth: BlobAuth) -> StorageResult<CloudStore> {
        let mut builder = match auth {
            BlobAuth::Ambient => MicrosoftAzureBuilder::from_env(),
            BlobAuth::Token(token) => {
                MicrosoftAzureBuilder::new().with_bearer_token_authorization(token.secret())
            }
            BlobAuth::Anonymous => MicrosoftAzureBuilder::new().with_skip_signature(true),
        };
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(self.config.allow_http());
        }
        let store = builder
            .with_account(&self.account)
            .with_container_name(&self.container)
            .build()
            .backend_err(
                BACKEND,
                &format!("connect to {}/{}", self.account, self.container),
            )?;
        Ok(CloudStore::new(BACKEND, Arc::new(store)))
    }

    fn list_with(&self, auth: BlobAuth, prefix: &str) -> StorageResult<Vec<RemoteObject>> {
        let store = self.build_store(auth)?;
        let objects = store.list_by_key_prefix(&self.rt, prefix)?;
        let _ = self.active.set(store);
        Ok(objects)
    }

    /// Service principal token when one is configured, anonymous access
    /// otherwise.
    fn fallback_auth(&self) -> StorageResult<BlobAuth> {
        let token = credentials::get_azure_storage_token(
            self.config.service_principal.as_ref(),
            &self.config.authority_host,
        )?;
        Ok(match token {
            Some(token) => BlobAuth::Token(token),
            None => {
                warn!("Azure credentials not found, retrying anonymous access");
                BlobAuth::Anonymous
            }
        })
    }
}

impl ObjectProvider for AzureBlobSourceProvider {
    fn name(&self) -> &'static str {
        BACKEND
    }

    /// Ambient credentials first (when the environment names any), then the
    /// service principal token, then anonymous access. Only the last
    /// attempt's failure is returned.
    fn list_objects(&self, prefix: &str) -> StorageResult<Vec<RemoteObject>> {
        if self.config.ambient_credentials {
            match self.list_with(BlobAuth::Ambient, prefix) {
                Ok(objects) => return Ok(objects),
                Err(err) => debug!("Ambient Azure credentials failed: {}", err),
            }
        } else {
            debug!("No ambient Azure credentials configured");
        }
        let auth = self.fallback_auth()?;
        self.list_with(auth, prefix)
    }

    fn fetch_object(&self, key: &str, dest: &Path, cancel: &CancelFlag) -> StorageResult<()> {
        let store = self.active.get().ok_or_else(|| StorageError::Backend {
            backend: BACKEND,
            message: format!("{key} fetched before the container was listed"),
        })?;
        store.fetch(&self.rt, key, dest, cancel)
    }
}
