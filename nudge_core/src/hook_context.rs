//! Process-wide state shared by the executor and the finding sink.
//!
//! Hooks may fire on any thread the harness spawns, so the in-harness mark and
//! the last-finding slot are global. Executions are serialised through
//! [`lock_execution`]: only the holder of the [`ExecutionLock`] may mark the
//! process as running a harness, and the sink only escalates while that mark
//! is set. Every finding the sink escalates is recorded so the executor can
//! report it even if the harness swallowed the escalation.

use nudge_api::Finding;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A rendered finding: its message followed by the messages of its causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingReport {
    pub message: String,
    pub causes: Vec<String>,
}

impl FindingReport {
    /// Renders `finding` and its `source()` chain.
    pub fn from_finding(finding: &Finding) -> Self {
        let mut chain = finding.chain().map(|err| err.to_string());
        let message = chain.next().unwrap_or_default();
        Self {
            message,
            causes: chain.collect(),
        }
    }
}

impl fmt::Display for FindingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for cause in &self.causes {
            write!(f, "\nCaused by: {cause}")?;
        }
        Ok(())
    }
}

static EXECUTION: Mutex<()> = Mutex::new(());
static IN_HARNESS: AtomicBool = AtomicBool::new(false);
static LAST_FINDING: Mutex<Option<FindingReport>> = Mutex::new(None);

/// Exclusive right to run one execution: observers, harness and evaluation.
///
/// Held by the executor from `pre_exec` until `post_exec` has run, so the
/// per-execution trace data and the last-finding slot belong to a single
/// execution at a time.
#[must_use = "the execution ends when the lock is dropped"]
pub struct ExecutionLock {
    _guard: MutexGuard<'static, ()>,
}

/// Waits until no other execution runs in this process.
///
/// Not reentrant: calling this while the current thread holds the lock deadlocks.
pub fn lock_execution() -> ExecutionLock {
    ExecutionLock {
        _guard: EXECUTION.lock().unwrap_or_else(PoisonError::into_inner),
    }
}

impl ExecutionLock {
    /// Marks the process as executing a harness and clears any stale finding.
    pub fn enter_harness(&self) -> HarnessGuard<'_> {
        finding_slot().take();
        IN_HARNESS.store(true, Ordering::SeqCst);
        HarnessGuard {
            _execution: PhantomData,
        }
    }
}

/// Keeps the in-harness mark set until dropped.
#[must_use = "the harness context ends when the guard is dropped"]
pub struct HarnessGuard<'a> {
    _execution: PhantomData<&'a ExecutionLock>,
}

impl Drop for HarnessGuard<'_> {
    fn drop(&mut self) {
        IN_HARNESS.store(false, Ordering::SeqCst);
    }
}

/// Whether a harness is running, on any thread.
pub fn in_harness() -> bool {
    IN_HARNESS.load(Ordering::SeqCst)
}

fn finding_slot() -> MutexGuard<'static, Option<FindingReport>> {
    LAST_FINDING.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records `report` as the finding of the current execution, replacing an earlier one.
pub fn record_finding(report: FindingReport) {
    *finding_slot() = Some(report);
}

/// Takes the finding recorded during the current execution, if any.
pub fn take_finding() -> Option<FindingReport> {
    finding_slot().take()
}
