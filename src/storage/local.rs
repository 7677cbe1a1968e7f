use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    storage::scheme::LOCAL_PREFIX,
    utils::errors::{StorageError, StorageResult},
};

pub struct LocalUtils;

impl LocalUtils {
    /// Resolves a local source. Without `out_dir` the resolved path is returned
    /// as is; with one, every entry is symlinked into it.
    pub fn download_local(uri: &str, out_dir: Option<&Path>) -> StorageResult<PathBuf> {
        let local_path = Path::new(uri.strip_prefix(LOCAL_PREFIX).unwrap_or(uri));
        if !local_path.exists() {
            return Err(StorageError::LocalPathNotFound {
                uri: uri.to_owned(),
            });
        }

        let Some(out_dir) = out_dir else {
            return Ok(local_path.to_path_buf());
        };
        if !out_dir.is_dir() {
            fs::create_dir_all(out_dir)?;
        }

        for src in Self::matched_entries(local_path)? {
            let Some(name) = src.file_name() else {
                continue;
            };
            let dest = out_dir.join(name);
            // Link targets must not depend on the caller's working directory.
            let target = fs::canonicalize(&src)?;
            info!("Linking: {} to {}", target.display(), dest.display());
            symlink(&target, &dest)?;
        }
        Ok(out_dir.to_path_buf())
    }

    /// A directory expands to its immediate, non-hidden entries (`dir/*`); a
    /// file matches only itself.
    fn matched_entries(local_path: &Path) -> io::Result<Vec<PathBuf>> {
        if !local_path.is_dir() {
            return Ok(vec![local_path.to_path_buf()]);
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(local_path)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }
}

#[cfg(unix)]
fn symlink(src: &Path, dest: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dest)
}

#[cfg(windows)]
fn symlink(src: &Path, dest: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dest)
    } else {
        std::os::windows::fs::symlink_file(src, dest)
    }
}
