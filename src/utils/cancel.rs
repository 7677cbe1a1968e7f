use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::debug;

use crate::utils::errors::{StorageError, StorageResult};

const SHUTDOWN_EXIT_CODE: i32 = 1;

/// Shared flag that aborts an in-flight download once raised.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The first SIGINT/SIGTERM raises the flag so partially written files
    /// get cleaned up. A second one, e.g. while blocked on a request,
    /// terminates the process.
    pub fn register_signals(&self) -> std::io::Result<()> {
        for signal in [SIGINT, SIGTERM] {
            // Checked before the flag is raised, so only a repeat signal exits.
            signal_hook::flag::register_conditional_shutdown(
                signal,
                SHUTDOWN_EXIT_CODE,
                Arc::clone(&self.0),
            )?;
            signal_hook::flag::register(signal, Arc::clone(&self.0))?;
            debug!("Registered cancellation for signal {}", signal);
        }
        Ok(())
    }

    pub fn check(&self, uri: &str) -> StorageResult<()> {
        if self.is_cancelled() {
            return Err(StorageError::Cancelled {
                uri: uri.to_owned(),
            });
        }
        Ok(())
    }
}
