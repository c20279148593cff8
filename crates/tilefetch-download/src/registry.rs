//! Process-wide map of active jobs to their cancellation signal and kill
//! handle.
//!
//! One mutex guards one map. The lock is never held across an await, and
//! killing a process only flips its [`KillSwitch`], so `signal` never
//! blocks on the child.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tilefetch_core::{JobId, TransferError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::process::KillSwitch;

struct Entry {
    generation: u64,
    signal: CancellationToken,
    process: Option<KillSwitch>,
}

#[derive(Default)]
struct Inner {
    next_generation: u64,
    jobs: HashMap<JobId, Entry>,
}

/// Registry of active jobs.
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for CancellationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationRegistry")
            .field("active", &self.active_jobs())
            .finish()
    }
}

impl CancellationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a job. Fails if the id is already active.
    pub fn register(&self, id: JobId) -> Result<Registration, TransferError> {
        let mut inner = self.lock();
        if inner.jobs.contains_key(&id) {
            return Err(TransferError::DuplicateJob { id });
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;
        let signal = CancellationToken::new();
        inner.jobs.insert(
            id.clone(),
            Entry {
                generation,
                signal: signal.clone(),
                process: None,
            },
        );
        drop(inner);

        debug!(job_id = %id, "Registered job");
        Ok(Registration {
            registry: self.clone(),
            id,
            generation,
            signal,
            released: false,
        })
    }

    /// Fire the job's signal and kill its process, if one is attached.
    pub fn signal(&self, id: &JobId) -> Result<(), TransferError> {
        let inner = self.lock();
        let entry = inner
            .jobs
            .get(id)
            .ok_or_else(|| TransferError::NotFound { id: id.clone() })?;

        entry.signal.cancel();
        if let Some(process) = &entry.process {
            process.kill();
        }
        drop(inner);

        debug!(job_id = %id, "Cancellation signaled");
        Ok(())
    }

    /// Remove a job. Unknown ids are ignored.
    pub fn deregister(&self, id: &JobId) {
        if self.lock().jobs.remove(id).is_some() {
            debug!(job_id = %id, "Deregistered job");
        }
    }

    /// Whether a job with this id is active.
    #[must_use]
    pub fn is_active(&self, id: &JobId) -> bool {
        self.lock().jobs.contains_key(id)
    }

    /// Ids of all active jobs, sorted.
    #[must_use]
    pub fn active_jobs(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.lock().jobs.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn attach(&self, id: &JobId, generation: u64, process: KillSwitch) -> Result<(), TransferError> {
        let mut inner = self.lock();
        let entry = inner
            .jobs
            .get_mut(id)
            .filter(|entry| entry.generation == generation)
            .ok_or_else(|| TransferError::NotFound { id: id.clone() })?;

        if entry.signal.is_cancelled() {
            debug!(job_id = %id, "Signal already fired, killing new process");
            process.kill();
        }
        entry.process = Some(process);
        Ok(())
    }

    fn release(&self, id: &JobId, generation: u64) {
        let mut inner = self.lock();
        let owned = inner
            .jobs
            .get(id)
            .is_some_and(|entry| entry.generation == generation);
        if owned {
            inner.jobs.remove(id);
            drop(inner);
            debug!(job_id = %id, "Deregistered job");
        }
    }
}

/// A job's slot in the registry.
///
/// Dropping the registration deregisters the job, so an early return or
/// a panic in the owning session cannot leave a stale entry. Only the
/// entry created by this registration is removed.
#[derive(Debug)]
pub struct Registration {
    registry: CancellationRegistry,
    id: JobId,
    generation: u64,
    signal: CancellationToken,
    released: bool,
}

impl Registration {
    /// The registered job id.
    #[must_use]
    pub const fn id(&self) -> &JobId {
        &self.id
    }

    /// The job's cancellation signal. Fires once; late listeners still see
    /// it.
    #[must_use]
    pub fn signal(&self) -> CancellationToken {
        self.signal.clone()
    }

    /// Attach the process kill handle. If cancellation was already
    /// signaled the process is killed immediately.
    pub fn attach_process(&self, process: KillSwitch) -> Result<(), TransferError> {
        self.registry.attach(&self.id, self.generation, process)
    }

    /// Deregister now.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(&self.id, self.generation);
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release_once();
    }
}
