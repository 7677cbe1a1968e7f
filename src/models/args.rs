use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "storage-initializer",
    version,
    about = "Downloads a model artifact from its storage URI into a local directory.",
    long_about = r#"
Resolves a model artifact URI into a local directory so a serving runtime can
load it from disk.

Supported sources:
  • s3://bucket/prefix             (AWS S3 and S3-compatible stores)
  • gs://bucket/prefix             (Google Cloud Storage)
  • https://<account>.blob.core.windows.net/<container>/<prefix>
  • http(s)://host/path/file       (tar, tar.gz and zip are extracted)
  • file://path or a local path    (linked into the destination)

Credentials and endpoints are read from the environment (AWS_*, AZ_*,
GOOGLE_APPLICATION_CREDENTIALS, <hostname>-headers).
"#
)]
pub struct AppArgs {
    /// Source URI of the model artifact
    pub src_uri: String,

    /// Destination directory
    ///
    /// When omitted a fresh temporary directory is used for remote sources, and
    /// local sources are returned in place without copying.
    pub dest_dir: Option<PathBuf>,
}
