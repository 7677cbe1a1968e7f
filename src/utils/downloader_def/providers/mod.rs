pub mod azure;
pub mod cloud;
pub mod gcs;
pub mod s3;
