use std::sync::Arc;

use tracing::info;

use crate::cancel::{CancellationToken, ProcessRegistry};

/// Shared state of one build, passed by reference through every stage.
///
/// Clones share the same token and registry, so a clone handed to another
/// thread can cancel the build that owns the original.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    token: CancellationToken,
    processes: Arc<ProcessRegistry>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    /// Raises the cancellation flag and terminates every live toolchain
    /// process tree.
    pub fn cancel(&self) -> usize {
        self.token.cancel();
        let signalled = self.processes.terminate_all();
        info!("build cancelled, {} processes signalled", signalled);
        signalled
    }
}
