pub mod cancel;
pub mod downloader_def;
pub mod errors;
pub mod logger;
