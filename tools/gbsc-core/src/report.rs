use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::error::{CompileError, Result};

/// Progress and warnings channel shared by every compile stage.
///
/// Messages go to `tracing`; warnings are also kept so callers can inspect
/// them after the fact.
#[derive(Clone, Default)]
pub struct Reporter {
    inner: Arc<ReporterInner>,
}

#[derive(Default)]
struct ReporterInner {
    warnings: Mutex<Vec<String>>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reporter whose checkpoints fail once `flag` is raised.
    pub fn with_interrupt(flag: Arc<AtomicBool>) -> Self {
        Reporter {
            inner: Arc::new(ReporterInner {
                warnings: Mutex::new(Vec::new()),
                interrupt: Some(flag),
            }),
        }
    }

    pub fn progress(&self, message: impl AsRef<str>) {
        info!("{}", message.as_ref());
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.inner
            .warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
    }

    pub fn warnings(&self) -> Vec<String> {
        self.inner
            .warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner
            .interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Suspension point before blocking work: yields so pending progress can
    /// flush, then fails if the run has been interrupted.
    pub fn checkpoint(&self) -> Result<()> {
        std::thread::yield_now();
        if self.is_interrupted() {
            return Err(CompileError::Interrupted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_recorded_across_clones() {
        let reporter = Reporter::new();
        let clone = reporter.clone();
        clone.warn("too many actors");
        assert_eq!(reporter.warnings(), vec!["too many actors".to_string()]);
    }

    #[test]
    fn checkpoint_fails_after_interrupt() {
        let flag = Arc::new(AtomicBool::new(false));
        let reporter = Reporter::with_interrupt(flag.clone());
        assert!(reporter.checkpoint().is_ok());
        flag.store(true, Ordering::SeqCst);
        assert!(matches!(reporter.checkpoint(), Err(CompileError::Interrupted)));
    }
}
