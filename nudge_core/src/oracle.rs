use crate::executor::ExecutionStatus;
use crate::input::Input;
use std::fmt;

/// What kind of failure a [`BugReport`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BugKind {
    /// The harness panicked on its own.
    Crash,
    /// A hook reported a finding.
    HookFinding,
}

impl fmt::Display for BugKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BugKind::Crash => write!(f, "crash"),
            BugKind::HookFinding => write!(f, "hook finding"),
        }
    }
}

/// A bug identified by an `Oracle`.
#[derive(Debug)]
pub struct BugReport<I: Input> {
    /// The input that triggered the bug.
    pub input: I,
    /// Human-readable description: the panic message or the rendered finding.
    pub description: String,
    /// MD5 of the input, used to name the crash artifact.
    pub input_hash: String,
    /// Identifies findings with the same description across runs.
    pub dedup_token: u64,
    /// Whether the harness crashed or a hook reported the failure.
    pub kind: BugKind,
}

/// An `Oracle` examines the outcome of an execution to decide whether a bug
/// occurred.
pub trait Oracle<I: Input>: Send + Sync {
    /// Examines the outcome of running `input`.
    ///
    /// # Arguments
    /// * `input`: The input that was executed.
    /// * `status`: The `ExecutionStatus` the executor returned for it.
    ///
    /// # Returns
    /// `Some(BugReport)` if the execution revealed a bug, otherwise `None`.
    fn examine(&self, input: &I, status: &ExecutionStatus) -> Option<BugReport<I>>;
}

/// Reports crashes and hook findings.
#[derive(Debug, Default)]
pub struct CrashOracle;

impl CrashOracle {
    pub fn new() -> Self {
        CrashOracle
    }
}

impl<I: Input> Oracle<I> for CrashOracle {
    fn examine(&self, input: &I, status: &ExecutionStatus) -> Option<BugReport<I>> {
        let (kind, description) = match status {
            ExecutionStatus::Crash(description) => (BugKind::Crash, description.clone()),
            ExecutionStatus::Finding(report) => (BugKind::HookFinding, report.to_string()),
            ExecutionStatus::Ok | ExecutionStatus::ObserverError(_) => return None,
        };
        Some(BugReport {
            input: input.clone(),
            dedup_token: dedup_token(&description),
            input_hash: format!("{:x}", md5::compute(input.as_bytes())),
            description,
            kind,
        })
    }
}

/// 64-bit token identifying a finding by its description.
///
/// Taken from the first eight bytes of the description's MD5 digest, so the
/// same finding yields the same token in every run.
pub fn dedup_token(description: &str) -> u64 {
    let digest = md5::compute(description.as_bytes());
    let mut token = [0u8; 8];
    token.copy_from_slice(&digest.0[..8]);
    u64::from_be_bytes(token)
}
