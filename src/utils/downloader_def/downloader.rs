use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::utils::{
    cancel::CancelFlag,
    downloader_def::r#trait::ObjectProvider,
    errors::{StorageError, StorageResult},
};

/// How an object key maps onto a path under the destination directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLayout {
    /// Strip the requested prefix and surrounding separators; an empty
    /// remainder falls back to the full key without its leading separators.
    /// Used for S3 and GCS.
    StripPrefix,
    /// Split the key into directory and file name and cut the prefix length
    /// off the directory part only. Used for Azure blobs.
    SplitHead,
}

impl KeyLayout {
    pub fn local_path(&self, key: &str, prefix: &str) -> PathBuf {
        match self {
            KeyLayout::StripPrefix => {
                let relative = key.strip_prefix(prefix).unwrap_or(key).trim_matches('/');
                if relative.is_empty() {
                    PathBuf::from(key.trim_start_matches('/'))
                } else {
                    PathBuf::from(relative)
                }
            }
            KeyLayout::SplitHead => match key.rsplit_once('/') {
                Some((head, tail)) => {
                    let head = head.get(prefix.len()..).unwrap_or("");
                    let head = head.strip_prefix('/').unwrap_or(head);
                    Path::new(head).join(tail)
                }
                None => PathBuf::from(key),
            },
        }
    }
}

pub struct Downloader<P: ObjectProvider> {
    provider: P,
    layout: KeyLayout,
}

impl<P: ObjectProvider> Downloader<P> {
    pub fn new(provider: P, layout: KeyLayout) -> Self {
        Self { provider, layout }
    }

    /// Materializes every non-marker object under `prefix` into `out_dir` and
    /// returns how many were written. An empty result is an error.
    pub fn download(
        &self,
        uri: &str,
        prefix: &str,
        out_dir: &Path,
        cancel: &CancelFlag,
    ) -> StorageResult<usize> {
        let objects = self.provider.list_objects(prefix)?;
        debug!(
            "{} listed {} objects under '{}'",
            self.provider.name(),
            objects.len(),
            prefix
        );

        let mut count = 0;
        for object in objects.iter().filter(|o| !o.is_dir) {
            cancel.check(uri)?;

            let dest = out_dir.join(self.layout.local_path(&object.key, prefix));
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            info!("Downloading: {} to {}", object.key, dest.display());
            self.provider.fetch_object(&object.key, &dest, cancel)?;
            count += 1;
        }

        if count == 0 {
            return Err(StorageError::ArtifactNotFound {
                uri: uri.to_owned(),
            });
        }
        Ok(count)
    }
}
