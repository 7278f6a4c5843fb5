use crate::hook_context::{self, ExecutionLock, FindingReport};
use crate::input::Input;
use crate::observer::Observer;
use nudge_api::{Escalation, describe_payload};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Outcome of running the harness on one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The harness returned normally and no hook reported anything.
    Ok,
    /// The harness panicked on its own.
    Crash(String),
    /// A hook reported a finding while the harness ran.
    Finding(FindingReport),
    /// An observer failed; the execution tells nothing about the input.
    ObserverError(String),
}

impl ExecutionStatus {
    /// Whether the status is a crash or a hook finding.
    pub fn is_bug(&self) -> bool {
        matches!(self, ExecutionStatus::Crash(_) | ExecutionStatus::Finding(_))
    }
}

/// Runs the target on one input at a time.
pub trait Executor<I: Input> {
    /// Executes the target with `input`, surrounded by the observers' hooks.
    ///
    /// # Arguments
    /// * `input`: The input to run.
    /// * `observers`: Observers whose `pre_exec` runs before the target and
    ///   whose `post_exec` runs after it, in order.
    ///
    /// # Returns
    /// The classified outcome. Observer failures are reported as
    /// [`ExecutionStatus::ObserverError`] unless the target crashed or a
    /// finding was reported.
    fn execute_sync(&mut self, input: &I, observers: &mut [&mut dyn Observer]) -> ExecutionStatus;
}

/// Runs a harness function in the current process.
///
/// Each execution holds the process-wide [`ExecutionLock`] from the
/// observers' `pre_exec` to their `post_exec`, so executors on different
/// threads take turns. The harness runs inside a harness context so hook
/// findings escalate from any thread it uses, and inside `catch_unwind` so
/// panics become [`ExecutionStatus::Crash`].
pub struct InProcessExecutor<F>
where
    F: Fn(&[u8]),
{
    harness_fn: F,
}

impl<F> InProcessExecutor<F>
where
    F: Fn(&[u8]),
{
    pub fn new(harness_fn: F) -> Self {
        Self { harness_fn }
    }

    fn run_harness(&self, execution: &ExecutionLock, data: &[u8]) -> ExecutionStatus {
        let guard = execution.enter_harness();
        let result = catch_unwind(AssertUnwindSafe(|| {
            (self.harness_fn)(data);
        }));
        drop(guard);
        classify(result, hook_context::take_finding())
    }
}

/// Decides the outcome of one execution.
///
/// A finding recorded by the sink wins over whatever the harness did with
/// the escalation afterwards, so a harness that swallowed or leaked the
/// payload is still reported. Escalation payloads are always defused here.
fn classify(
    result: Result<(), Box<dyn Any + Send>>,
    recorded: Option<FindingReport>,
) -> ExecutionStatus {
    let unwound = match result {
        Ok(()) => None,
        Err(payload) => Some(match Escalation::defuse_payload(payload) {
            Ok(finding) => ExecutionStatus::Finding(FindingReport::from_finding(&finding)),
            Err(payload) => ExecutionStatus::Crash(describe_payload(payload)),
        }),
    };
    match (recorded, unwound) {
        (Some(report), _) => ExecutionStatus::Finding(report),
        (None, Some(status)) => status,
        (None, None) => ExecutionStatus::Ok,
    }
}

impl<I: Input, F> Executor<I> for InProcessExecutor<F>
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn execute_sync(&mut self, input: &I, observers: &mut [&mut dyn Observer]) -> ExecutionStatus {
        let execution = hook_context::lock_execution();
        for obs in observers.iter_mut() {
            if let Err(e) = obs.pre_exec() {
                let error_msg = format!("Observer '{}' pre_exec failed: {}", obs.name(), e);
                log::error!("{error_msg}");
                return ExecutionStatus::ObserverError(error_msg);
            }
        }

        let mut execution_status = self.run_harness(&execution, input.as_bytes());

        let mut post_exec_error: Option<String> = None;
        for obs in observers.iter_mut() {
            if let Err(e) = obs.post_exec(&execution_status, Some(input.as_bytes())) {
                let error_msg = format!("Observer '{}' post_exec failed: {}", obs.name(), e);
                log::error!("{error_msg}");
                post_exec_error.get_or_insert(error_msg);
            }
        }

        if execution_status == ExecutionStatus::Ok {
            if let Some(error_msg) = post_exec_error {
                execution_status = ExecutionStatus::ObserverError(error_msg);
            }
        }
        execution_status
    }
}
