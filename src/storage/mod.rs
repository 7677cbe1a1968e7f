pub mod archive;
pub mod credentials;
pub mod http;
pub mod local;
pub mod media;
pub mod scheme;

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    models::config::StorageConfig,
    storage::{
        http::HttpUtils,
        local::LocalUtils,
        scheme::{GCS_PREFIX, S3_PREFIX, SchemeKind},
    },
    utils::{
        cancel::CancelFlag,
        downloader_def::{
            downloader::{Downloader, KeyLayout},
            providers::{
                azure::AzureBlobSourceProvider, gcs::GcsSourceProvider, s3::S3SourceProvider,
            },
        },
        errors::{StorageError, StorageResult},
    },
};

/// Entry point that resolves a model URI into a local directory.
pub struct Storage {
    config: StorageConfig,
    cancel: CancelFlag,
}

impl Storage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Downloads `uri` into `out_dir` (a fresh temporary directory when
    /// `None`) and returns the directory holding the artifact.
    ///
    /// A local source without `out_dir` is returned in place, nothing is
    /// copied.
    pub fn download(&self, uri: &str, out_dir: Option<&Path>) -> StorageResult<PathBuf> {
        info!("Copying contents of {} to local", uri);

        let is_local = scheme::is_local(uri);
        let kind = scheme::classify(uri, is_local, &self.config.model_mount_dir);
        // Rejected before a temporary directory gets created.
        if kind == SchemeKind::Unknown {
            return Err(unrecognized(uri));
        }

        let out_dir = match out_dir {
            None if is_local => return LocalUtils::download_local(uri, None),
            None => tempfile::Builder::new()
                .prefix("storage-initializer-")
                .tempdir()?
                .keep(),
            Some(dir) => {
                if !dir.exists() {
                    fs::create_dir_all(dir)?;
                }
                dir.to_path_buf()
            }
        };

        match kind {
            SchemeKind::S3 => self.download_s3(uri, &out_dir)?,
            SchemeKind::Gcs => self.download_gcs(uri, &out_dir)?,
            SchemeKind::AzureBlob => self.download_blob(uri, &out_dir)?,
            SchemeKind::LocalFile => return LocalUtils::download_local(uri, Some(&out_dir)),
            SchemeKind::GenericHttp => {
                return HttpUtils::download_from_uri(
                    uri,
                    &out_dir,
                    &self.config.http,
                    &self.cancel,
                );
            }
            // The model agent populates the mount, nothing to fetch here.
            SchemeKind::ManagedMount => return Ok(out_dir),
            SchemeKind::Unknown => return Err(unrecognized(uri)),
        }

        info!("Successfully copied {} to {}", uri, out_dir.display());
        Ok(out_dir)
    }

    fn download_s3(&self, uri: &str, out_dir: &Path) -> StorageResult<()> {
        let (bucket, prefix) = scheme::split_bucket(uri, S3_PREFIX);
        let provider = S3SourceProvider::new(&self.config.s3, bucket)?;
        Downloader::new(provider, KeyLayout::StripPrefix).download(
            uri,
            prefix,
            out_dir,
            &self.cancel,
        )?;
        Ok(())
    }

    fn download_gcs(&self, uri: &str, out_dir: &Path) -> StorageResult<()> {
        let (bucket, prefix) = scheme::split_bucket(uri, GCS_PREFIX);
        let provider = GcsSourceProvider::new(bucket)?;
        Downloader::new(provider, KeyLayout::StripPrefix).download(
            uri,
            prefix,
            out_dir,
            &self.cancel,
        )?;
        Ok(())
    }

    fn download_blob(&self, uri: &str, out_dir: &Path) -> StorageResult<()> {
        let (account, container, prefix) =
            scheme::split_blob_url(uri).ok_or_else(|| StorageError::InvalidUri {
                uri: uri.to_owned(),
                reason: "expected https://<account>.blob.core.windows.net/<container>/<prefix>"
                    .to_owned(),
            })?;
        let provider = AzureBlobSourceProvider::new(&self.config.azure, account, container)?;
        Downloader::new(provider, KeyLayout::SplitHead).download(
            uri,
            prefix,
            out_dir,
            &self.cancel,
        )?;
        Ok(())
    }
}

fn unrecognized(uri: &str) -> StorageError {
    StorageError::UnrecognizedScheme {
        uri: uri.to_owned(),
    }
}
