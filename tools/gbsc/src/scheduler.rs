use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::unbounded;
use tracing::info;

use crate::context::BuildContext;
use crate::error::{BuildError, Result};

/// Number of workers used when none is configured.
pub fn default_jobs() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

/// Runs `run` for every job on a pool of `jobs` workers.
///
/// Jobs are independent and run in no particular order. Each worker checks
/// the build's cancellation token before taking its next job; the first
/// failing job stops every worker from taking new ones. Cancellation wins
/// over any other error.
pub fn run_parallel<T, F>(ctx: &BuildContext, jobs: usize, items: Vec<T>, run: F) -> Result<usize>
where
    T: Send,
    F: Fn(&T) -> Result<()> + Sync,
{
    if items.is_empty() {
        return Ok(0);
    }
    let workers = jobs.clamp(1, items.len());
    let (job_tx, job_rx) = unbounded();
    for item in items {
        // The receiver is alive until the end of this function.
        let _ = job_tx.send(item);
    }
    drop(job_tx);

    let (result_tx, result_rx) = unbounded();
    let failed = AtomicBool::new(false);
    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let (run, failed) = (&run, &failed);
            scope.spawn(move || {
                for item in job_rx.iter() {
                    if ctx.token().is_cancelled() {
                        let _ = result_tx.send(Err(BuildError::Cancelled));
                        break;
                    }
                    if failed.load(Ordering::SeqCst) {
                        break;
                    }
                    let result = run(&item);
                    if result.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    let _ = result_tx.send(result);
                }
            });
        }
    });
    drop(result_tx);

    let mut completed = 0;
    let mut first_error = None;
    for result in result_rx.iter() {
        match result {
            Ok(()) => completed += 1,
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    ctx.token().check()?;
    if let Some(error) = first_error {
        return Err(error);
    }
    info!("ran {} jobs on {} workers", completed, workers);
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn every_job_runs_once() {
        let seen = Mutex::new(Vec::new());
        let done = run_parallel(&BuildContext::new(), 4, (0..50).collect(), |n: &i32| {
            seen.lock().unwrap().push(*n);
            Ok(())
        })
        .unwrap();
        assert_eq!(done, 50);
        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn cancellation_stops_new_jobs() {
        let ctx = BuildContext::new();
        let ran = AtomicUsize::new(0);
        let err = run_parallel(&ctx, 1, (0..10).collect(), |n: &i32| {
            ran.fetch_add(1, Ordering::SeqCst);
            if *n == 2 {
                ctx.token().cancel();
            }
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, BuildError::Cancelled));
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn first_failure_is_reported() {
        let ran = AtomicUsize::new(0);
        let err = run_parallel(&BuildContext::new(), 1, vec!["a", "bad", "c"], |job: &&str| {
            ran.fetch_add(1, Ordering::SeqCst);
            if *job == "bad" {
                return Err(BuildError::Cache("bad job".into()));
            }
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, BuildError::Cache(msg) if msg == "bad job"));
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn no_jobs_is_a_no_op() {
        let done = run_parallel(&BuildContext::new(), 8, Vec::<u8>::new(), |_| Ok(())).unwrap();
        assert_eq!(done, 0);
    }
}
