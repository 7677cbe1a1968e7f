use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufWriter, ErrorKind, Read, Write as _},
    path::{Path, PathBuf},
};

use flate2::read::MultiGzDecoder;
use reqwest::{
    StatusCode, Url,
    blocking::Client,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use scopeguard::ScopeGuard;
use tracing::{debug, info};

use crate::{
    models::config::HttpConfig,
    storage::{
        archive::ArchiveUtils,
        media::{ContentEncoding, MediaGuess},
    },
    utils::{
        cancel::CancelFlag,
        errors::{StorageError, StorageResult},
    },
};

const CHUNK_SIZE: usize = 64 * 1024;

pub struct HttpUtils;

impl HttpUtils {
    /// Fetches a single file over HTTP(S) into `out_dir`, unpacking tar and zip
    /// payloads in place.
    pub fn download_from_uri(
        uri: &str,
        out_dir: &Path,
        config: &HttpConfig,
        cancel: &CancelFlag,
    ) -> StorageResult<PathBuf> {
        let url = Url::parse(uri).map_err(|e| StorageError::InvalidUri {
            uri: uri.to_owned(),
            reason: e.to_string(),
        })?;
        let filename = url.path().rsplit('/').next().unwrap_or_default();
        if filename.is_empty() {
            return Err(StorageError::MissingFilename {
                uri: uri.to_owned(),
            });
        }
        let guess = MediaGuess::from_path(url.path());
        debug!("Guessed {:?} for {}", guess, filename);

        let headers = match url.host_str() {
            Some(host) => Self::host_headers(config, host)?,
            None => HeaderMap::new(),
        };

        let response = Client::new().get(url.as_str()).headers(headers).send()?;
        if response.status() != StatusCode::OK {
            return Err(StorageError::FetchFailed {
                uri: uri.to_owned(),
                status: response.status().as_u16(),
            });
        }

        let expected = guess.expected_content_type();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with(expected) {
            return Err(StorageError::ContentTypeMismatch {
                uri: uri.to_owned(),
                expected,
                actual: content_type.to_owned(),
            });
        }

        // gzip payloads are stored decompressed and treated as tar.
        let (local_path, stream): (PathBuf, Box<dyn Read>) =
            if guess.encoding == Some(ContentEncoding::Gzip) {
                (
                    out_dir.join(format!("{filename}.tar")),
                    Box::new(MultiGzDecoder::new(response)),
                )
            } else {
                (out_dir.join(filename), Box::new(response))
            };

        let written = Self::write_stream(stream, &local_path, uri, cancel)?;
        info!("Downloaded {} bytes to {}", written, local_path.display());

        if let Some(media_type) = guess.media_type {
            ArchiveUtils::extract_and_remove(&local_path, out_dir, media_type)?;
        }
        Ok(out_dir.to_path_buf())
    }

    /// Headers configured for `host` through `<host>-headers`.
    fn host_headers(config: &HttpConfig, host: &str) -> StorageResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let Some(raw) = config.host_headers.get(host) else {
            return Ok(headers);
        };

        let invalid = |reason: String| StorageError::InvalidHeaders {
            host: host.to_owned(),
            reason,
        };
        let parsed: HashMap<String, String> =
            serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
        for (name, value) in parsed {
            let name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let value = HeaderValue::from_str(&value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(name, value);
        }
        debug!("Attaching {} configured headers for {}", headers.len(), host);
        Ok(headers)
    }

    /// Copies `reader` into `path`. The file is removed again unless the copy
    /// runs to completion.
    fn write_stream(
        mut reader: impl Read,
        path: &Path,
        uri: &str,
        cancel: &CancelFlag,
    ) -> StorageResult<u64> {
        let file = File::create(path)?;
        let cleanup = scopeguard::guard(path.to_path_buf(), |partial| {
            let _ = fs::remove_file(partial);
        });

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            cancel.check(uri)?;
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            writer.write_all(&buffer[..read])?;
            written += read as u64;
        }
        writer.flush()?;

        ScopeGuard::into_inner(cleanup);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_configured_headers() {
        let config = HttpConfig::default()
            .with_host_headers("foo.bar", r#"{"Authorization": "Bearer abc", "X-Team": "ml"}"#);

        let headers = HttpUtils::host_headers(&config, "foo.bar").unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["authorization"], "Bearer abc");
        assert!(
            HttpUtils::host_headers(&config, "other.host")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        let config = HttpConfig::default().with_host_headers("foo.bar", "not json");
        let err = HttpUtils::host_headers(&config, "foo.bar").unwrap_err();
        assert!(matches!(err, StorageError::InvalidHeaders { .. }));
    }

    #[test]
    fn missing_filename_fails_before_any_request() {
        let out = tempfile::tempdir().unwrap();
        let err = HttpUtils::download_from_uri(
            "https://foo.bar/test/",
            out.path(),
            &HttpConfig::default(),
            &CancelFlag::new(),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::MissingFilename { .. }));
    }

    #[test]
    fn cancelled_copy_removes_partial_file() {
        let out = tempfile::tempdir().unwrap();
        let path = out.path().join("model.bin");
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err =
            HttpUtils::write_stream(&b"weights"[..], &path, "http://foo.bar/model.bin", &cancel)
                .unwrap_err();

        assert!(matches!(err, StorageError::Cancelled { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn completed_copy_keeps_file() {
        let out = tempfile::tempdir().unwrap();
        let path = out.path().join("model.bin");

        let written = HttpUtils::write_stream(
            &b"weights"[..],
            &path,
            "http://foo.bar/model.bin",
            &CancelFlag::new(),
        )
        .unwrap();

        assert_eq!(written, 7);
        assert_eq!(fs::read(&path).unwrap(), b"weights");
    }
}
