pub mod models;
pub mod storage;
pub mod utils;

pub use models::config::StorageConfig;
pub use storage::Storage;
pub use utils::errors::{StorageError, StorageResult};
