//! Where per-file ingestion work actually runs: inline on the calling thread,
//! spread across a `rayon` pool, or (eventually) dispatched to other machines.

use crate::error::{Error, Result};

/// Executes a batch of independent units of work, one per raw file.
pub trait Executor: Send + Sync {
    /// Runs every job, collecting results in the same order the jobs were given.
    /// A job's own error is returned in its slot; `run` itself only fails for
    /// executor-level problems (e.g. an unsupported backend).
    fn run(&self, jobs: Vec<Box<dyn FnOnce() -> Result<usize> + Send>>) -> Result<Vec<Result<usize>>>;
}

/// Runs every job inline, in order, on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct Synchronous;

impl Executor for Synchronous {
    fn run(&self, jobs: Vec<Box<dyn FnOnce() -> Result<usize> + Send>>) -> Result<Vec<Result<usize>>> {
        Ok(jobs.into_iter().map(|job| job()).collect())
    }
}

/// Runs jobs across a `rayon` thread pool sized to the number of logical CPUs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPool;

impl Executor for ThreadPool {
    fn run(&self, jobs: Vec<Box<dyn FnOnce() -> Result<usize> + Send>>) -> Result<Vec<Result<usize>>> {
        use std::sync::Mutex;

        let slots: Mutex<Vec<Option<Result<usize>>>> = Mutex::new((0..jobs.len()).map(|_| None).collect());
        rayon::scope(|scope| {
            for (index, job) in jobs.into_iter().enumerate() {
                let slots = &slots;
                scope.spawn(move |_| {
                    let result = job();
                    slots.lock().unwrap()[index] = Some(result);
                });
            }
        });
        Ok(slots.into_inner().unwrap().into_iter().map(|slot| slot.unwrap()).collect())
    }
}

/// A placeholder for dispatching ingestion jobs to other machines. Always
/// returns [`Error::NotSupported`]; no distributed runtime is implemented.
#[derive(Debug, Default, Clone, Copy)]
pub struct Distributed;

impl Executor for Distributed {
    fn run(&self, _jobs: Vec<Box<dyn FnOnce() -> Result<usize> + Send>>) -> Result<Vec<Result<usize>>> {
        Err(Error::NotSupported("Distributed"))
    }
}
