use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

pub const GCS_PREFIX: &str = "gs://";
pub const S3_PREFIX: &str = "s3://";
pub const LOCAL_PREFIX: &str = "file://";
pub const HTTP_PREFIX: &str = "http(s)://";

pub const SUPPORTED_PREFIXES: [&str; 4] = [GCS_PREFIX, S3_PREFIX, LOCAL_PREFIX, HTTP_PREFIX];

lazy_static! {
    /// Captures (account, container + prefix).
    pub static ref BLOB_RE: Regex =
        Regex::new(r"^https://(.+?)\.blob\.core\.windows\.net/(.+)$").unwrap();
    static ref URI_RE: Regex = Regex::new(r"^https?://(.+)/(.+)$").unwrap();
}

/// Backend that handles a source URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeKind {
    LocalFile,
    S3,
    Gcs,
    AzureBlob,
    GenericHttp,
    ManagedMount,
    Unknown,
}

/// True for `file://` URIs and for raw paths that exist on disk.
pub fn is_local(uri: &str) -> bool {
    uri.starts_with(LOCAL_PREFIX) || Path::new(uri).exists()
}

/// Picks the backend for `uri`. Precedence is fixed: S3, GCS, Azure blob,
/// local, generic HTTP, then the managed mount.
pub fn classify(uri: &str, is_local: bool, model_mount_dir: &str) -> SchemeKind {
    if uri.starts_with(S3_PREFIX) {
        SchemeKind::S3
    } else if uri.starts_with(GCS_PREFIX) {
        SchemeKind::Gcs
    } else if BLOB_RE.is_match(uri) {
        SchemeKind::AzureBlob
    } else if is_local {
        SchemeKind::LocalFile
    } else if URI_RE.is_match(uri) {
        SchemeKind::GenericHttp
    } else if !model_mount_dir.is_empty() && uri.starts_with(model_mount_dir) {
        SchemeKind::ManagedMount
    } else {
        SchemeKind::Unknown
    }
}

/// Splits `<scheme>bucket/key/prefix` into `(bucket, key_prefix)`.
pub fn split_bucket<'a>(uri: &'a str, scheme_prefix: &str) -> (&'a str, &'a str) {
    let rest = uri.strip_prefix(scheme_prefix).unwrap_or(uri);
    rest.split_once('/').unwrap_or((rest, ""))
}

/// Splits an Azure blob URL into `(account, container, prefix)`.
pub fn split_blob_url(uri: &str) -> Option<(&str, &str, &str)> {
    let caps = BLOB_RE.captures(uri)?;
    let account = caps.get(1)?.as_str();
    let storage_url = caps.get(2)?.as_str();
    let (container, prefix) = storage_url.split_once('/').unwrap_or((storage_url, ""));
    Some((account, container, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNT: &str = "/mnt/models";

    fn kind(uri: &str) -> SchemeKind {
        classify(uri, is_local(uri), MOUNT)
    }

    #[test]
    fn classifies_remote_schemes() {
        assert_eq!(kind("s3://bucket/model"), SchemeKind::S3);
        assert_eq!(kind("gs://bucket/model"), SchemeKind::Gcs);
        assert_eq!(
            kind("https://acct.blob.core.windows.net/container/model"),
            SchemeKind::AzureBlob
        );
        assert_eq!(kind("https://foo.bar/model.joblib"), SchemeKind::GenericHttp);
        assert_eq!(kind("http://foo.bar/a/b/model.tar.gz"), SchemeKind::GenericHttp);
    }

    #[test]
    fn classifies_local_paths() {
        assert_eq!(kind("file:///some/where"), SchemeKind::LocalFile);
        assert_eq!(kind("/"), SchemeKind::LocalFile);
        assert_eq!(kind("."), SchemeKind::LocalFile);
    }

    #[test]
    fn existing_path_beats_mount_prefix() {
        assert_eq!(
            classify("/mnt/models/sklearn", false, MOUNT),
            SchemeKind::ManagedMount
        );
        assert_eq!(
            classify("/mnt/models/sklearn", true, MOUNT),
            SchemeKind::LocalFile
        );
    }

    #[test]
    fn rejects_unknown_schemes() {
        assert_eq!(kind("ftp://foo.bar/model"), SchemeKind::Unknown);
        assert_eq!(kind("https://hostonly"), SchemeKind::Unknown);
        assert_eq!(kind("no/such/relative/path"), SchemeKind::Unknown);
    }

    #[test]
    fn splits_bucket_and_prefix() {
        assert_eq!(split_bucket("s3://bucket/a/b", S3_PREFIX), ("bucket", "a/b"));
        assert_eq!(split_bucket("s3://bucket", S3_PREFIX), ("bucket", ""));
        assert_eq!(split_bucket("gs://bucket/", GCS_PREFIX), ("bucket", ""));
    }

    #[test]
    fn splits_blob_url() {
        assert_eq!(
            split_blob_url("https://acct.blob.core.windows.net/container/some/blob/"),
            Some(("acct", "container", "some/blob/"))
        );
        assert_eq!(
            split_blob_url("https://acct.blob.core.windows.net/container"),
            Some(("acct", "container", ""))
        );
        assert_eq!(split_blob_url("https://foo.bar/model"), None);
    }
}
