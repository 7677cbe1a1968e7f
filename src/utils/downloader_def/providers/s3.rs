use std::{
    cell::OnceCell,
    fs::{self, File},
    io::{BufWriter, Write as _},
    path::Path,
};

use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    error::DisplayErrorContext,
};
use scopeguard::ScopeGuard;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::{
    models::config::ObjectStoreConfig,
    utils::{
        cancel::CancelFlag,
        downloader_def::r#trait::{ObjectProvider, RemoteObject},
        errors::{ResultTrait, StorageError, StorageResult},
    },
};

const BACKEND: &str = "S3";
const DEFAULT_REGION: &str = "us-east-1";

/// S3 and S3-compatible buckets through the AWS SDK.
pub struct S3SourceProvider {
    rt: Runtime,
    config: ObjectStoreConfig,
    bucket: String,
    client: Client,
    /// Set once the default credential chain was refused.
    anonymous: OnceCell<Client>,
}

impl S3SourceProvider {
    pub fn new(config: &ObjectStoreConfig, bucket: impl Into<String>) -> StorageResult<Self> {
        let rt = Runtime::new()?;
        let client = rt.block_on(Self::build_client(config, false));
        Ok(Self {
            rt,
            config: config.clone(),
            bucket: bucket.into(),
            client,
            anonymous: OnceCell::new(),
        })
    }

    async fn build_client(config: &ObjectStoreConfig, anonymous: bool) -> Client {
        let region = RegionProviderChain::first_try(config.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::new(DEFAULT_REGION));
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        if anonymous {
            loader = loader.no_credentials();
        } else if let (Some(access_key), Some(secret_key)) =
            (config.access_key.as_ref(), config.secret_key.as_ref())
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "storage-initializer",
            ));
        }
        if let Some(endpoint) = config.endpoint_url() {
            debug!("Using S3 endpoint {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if config.endpoint.is_some() {
            // MinIO and most S3-compatible stores do not route virtual hosts.
            builder = builder.force_path_style(true);
        }
        Client::from_conf(builder.build())
    }

    fn active_client(&self) -> &Client {
        self.anonymous.get().unwrap_or(&self.client)
    }

    fn list_with(&self, client: &Client, prefix: &str) -> StorageResult<Vec<RemoteObject>> {
        self.rt.block_on(async {
            let mut objects = Vec::new();
            let mut continuation = None;
            loop {
                let res = client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(prefix)
                    .set_continuation_token(continuation.take())
                    .send()
                    .await
                    .map_err(|e| StorageError::Backend {
                        backend: BACKEND,
                        message: format!(
                            "list s3://{}/{}: {}",
                            self.bucket,
                            prefix,
                            DisplayErrorContext(&e)
                        ),
                    })?;

                objects.extend(
                    res.contents()
                        .iter()
                        .filter_map(|o| o.key())
                        .map(RemoteObject::new),
                );

                match res.next_continuation_token() {
                    Some(token) if res.is_truncated().unwrap_or(false) => {
                        continuation = Some(token.to_owned());
                    }
                    _ => break,
                }
            }
            Ok::<_, StorageError>(objects)
        })
    }
}

impl ObjectProvider for S3SourceProvider {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn list_objects(&self, prefix: &str) -> StorageResult<Vec<RemoteObject>> {
        match self.list_with(&self.client, prefix) {
            Ok(objects) => Ok(objects),
            Err(err) if !self.config.has_credentials() => {
                warn!("S3 listing failed ({}), retrying anonymous access", err);
                let anonymous = self.rt.block_on(Self::build_client(&self.config, true));
                let objects = self.list_with(&anonymous, prefix)?;
                let _ = self.anonymous.set(anonymous);
                Ok(objects)
            }
            Err(err) => Err(err),
        }
    }

    fn fetch_object(&self, key: &str, dest: &Path, cancel: &CancelFlag) -> StorageResult<()> {
        self.rt.block_on(async {
            let res = self
                .active_client()
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| StorageError::Backend {
                    backend: BACKEND,
                    message: format!("get s3://{}/{}: {}", self.bucket, key, DisplayErrorContext(&e)),
                })?;

            let mut body = res.body;
            let file = File::create(dest)?;
            let cleanup = scopeguard::guard(dest.to_path_buf(), |partial| {
                let _ = fs::remove_file(partial);
            });
            let mut writer = BufWriter::new(file);
            while let Some(chunk) = body
                .try_next()
                .await
                .backend_err(BACKEND, &format!("read s3://{}/{}", self.bucket, key))?
            {
                cancel.check(key)?;
                writer.write_all(&chunk)?;
            }
            writer.flush()?;
            ScopeGuard::into_inner(cleanup);
            Ok::<_, StorageError>(())
        })
    }
}
