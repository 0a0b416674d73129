//! Cancellation flag and the registry of live toolchain processes.
//!
//! Toolchain drivers fork their own sub-tools (`lcc` runs `sdcc`, `gcc` runs
//! `cc1` and `as`), so terminating a build signals the whole descendant tree
//! of every registered process, deepest first.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{BuildError, Result};

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fails with [`BuildError::Cancelled`] once the token is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        Ok(())
    }

    /// The raw flag, shared with the compiler's reporter.
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }
}

/// Process ids of toolchain processes that are currently running.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    live: Mutex<BTreeSet<u32>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<u32>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, pid: u32) {
        self.lock().insert(pid);
    }

    pub fn unregister(&self, pid: u32) {
        self.lock().remove(&pid);
    }

    pub fn live(&self) -> Vec<u32> {
        self.lock().iter().copied().collect()
    }

    /// Signals every registered process and all of its descendants.
    /// Returns the number of processes signalled.
    pub fn terminate_all(&self) -> usize {
        let roots = self.live();
        if roots.is_empty() {
            return 0;
        }
        let parents = tree::parent_map();
        roots.into_iter().map(|root| tree::terminate_tree(root, &parents)).sum()
    }

    /// Signals `root` and all of its descendants, deepest first.
    pub fn terminate_tree(&self, root: u32) -> usize {
        tree::terminate_tree(root, &tree::parent_map())
    }
}

mod tree {
    use std::collections::VecDeque;

    use tracing::debug;

    pub(super) fn terminate_tree(root: u32, parents: &[(u32, u32)]) -> usize {
        let mut victims = descendants(root, parents);
        victims.reverse();
        victims.push(root);
        let mut signalled = 0;
        for pid in victims {
            if terminate(pid) {
                debug!("sent termination signal to process {}", pid);
                signalled += 1;
            }
        }
        signalled
    }

    /// Every descendant of `root` in breadth-first order.
    pub(super) fn descendants(root: u32, parents: &[(u32, u32)]) -> Vec<u32> {
        let mut found = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(parent) = queue.pop_front() {
            for &(pid, ppid) in parents {
                if ppid == parent && pid != root && !found.contains(&pid) {
                    found.push(pid);
                    queue.push_back(pid);
                }
            }
        }
        found
    }

    /// `(pid, parent pid)` for every process on the system.
    #[cfg(target_os = "linux")]
    pub(super) fn parent_map() -> Vec<(u32, u32)> {
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .filter_map(|pid| {
                let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
                // The command name may itself contain spaces and parentheses.
                let rest = &stat[stat.rfind(')')? + 1..];
                let ppid = rest.split_whitespace().nth(1)?.parse().ok()?;
                Some((pid, ppid))
            })
            .collect()
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    pub(super) fn parent_map() -> Vec<(u32, u32)> {
        let Ok(output) = std::process::Command::new("ps")
            .args(["-A", "-o", "pid=", "-o", "ppid="])
            .output()
        else {
            return Vec::new();
        };
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                Some((fields.next()?.parse().ok()?, fields.next()?.parse().ok()?))
            })
            .collect()
    }

    // taskkill walks the tree itself.
    #[cfg(windows)]
    pub(super) fn parent_map() -> Vec<(u32, u32)> {
        Vec::new()
    }

    #[cfg(unix)]
    pub(super) fn terminate(pid: u32) -> bool {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // SAFETY: kill(2) takes plain integers and has no memory preconditions.
        unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
    }

    #[cfg(windows)]
    pub(super) fn terminate(pid: u32) -> bool {
        std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_check_fails_after_cancel() {
        let token = CancellationToken::new();
        let shared = token.clone();
        assert!(token.check().is_ok());
        shared.cancel();
        assert!(matches!(token.check(), Err(BuildError::Cancelled)));
        assert!(token.flag().load(Ordering::SeqCst));
    }

    #[test]
    fn registry_tracks_live_processes() {
        let registry = ProcessRegistry::new();
        registry.register(40);
        registry.register(12);
        registry.unregister(40);
        assert_eq!(registry.live(), vec![12]);
    }

    #[test]
    fn descendants_cover_the_whole_tree() {
        let parents = [(2, 1), (3, 2), (4, 2), (5, 3), (9, 8)];
        assert_eq!(tree::descendants(1, &parents), vec![2, 3, 4, 5]);
        assert!(tree::descendants(5, &parents).is_empty());
    }

    #[test]
    fn empty_registry_signals_nothing() {
        assert_eq!(ProcessRegistry::new().terminate_all(), 0);
    }
}
