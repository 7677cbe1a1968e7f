use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, Read},
    path::Path,
};

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use tar::Archive;
use tracing::{info, warn};
use zip::read::ZipArchive;

use crate::{
    storage::media::MediaType,
    utils::errors::{StorageError, StorageResult},
};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const BZIP2_MAGIC: &[u8] = b"BZh";

pub struct ArchiveUtils;

impl ArchiveUtils {
    /// Extracts `archive_path` into `out_dir` and removes the archive afterwards.
    pub fn extract_and_remove(
        archive_path: &Path,
        out_dir: &Path,
        media_type: MediaType,
    ) -> StorageResult<()> {
        info!(
            "Extracting {} into {}",
            archive_path.display(),
            out_dir.display()
        );
        match media_type {
            MediaType::Tar => Self::extract_tar(archive_path, out_dir)?,
            MediaType::Zip => Self::extract_zip(archive_path, out_dir)?,
        }
        fs::remove_file(archive_path)?;
        Ok(())
    }

    fn extract_tar(archive_path: &Path, out_dir: &Path) -> StorageResult<()> {
        let mut reader = BufReader::new(File::open(archive_path)?);
        let (is_gzip, is_bzip2) = {
            let magic = reader.fill_buf()?;
            (magic.starts_with(GZIP_MAGIC), magic.starts_with(BZIP2_MAGIC))
        };

        // Compression is sniffed, the file name may say plain .tar.
        let decoder: Box<dyn Read> = if is_gzip {
            Box::new(MultiGzDecoder::new(reader))
        } else if is_bzip2 {
            Box::new(BzDecoder::new(reader))
        } else {
            Box::new(reader)
        };

        Archive::new(decoder)
            .unpack(out_dir)
            .map_err(|e| archive_error(archive_path, e))
    }

    fn extract_zip(archive_path: &Path, out_dir: &Path) -> StorageResult<()> {
        let file = File::open(archive_path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| archive_error(archive_path, e))?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| archive_error(archive_path, e))?;
            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                warn!("Skipping zip entry with unsafe path: {}", entry.name());
                continue;
            };
            let dest = out_dir.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&dest)?;
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&dest)?;
            io::copy(&mut entry, &mut outfile)?;
        }
        Ok(())
    }
}

fn archive_error(path: &Path, err: impl std::fmt::Display) -> StorageError {
    StorageError::Archive {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
