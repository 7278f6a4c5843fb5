use crate::binding::{Binding, binding};
use crate::escalation::{Escalation, describe_payload};
use crate::finding::Finding;
use std::panic::{self, AssertUnwindSafe};
use std::process;

/// Makes the fuzzer report `finding` as a crash.
///
/// **Only call this from a method hook.** In a fuzz target, simply panic to
/// trigger a finding.
///
/// The call does not return normally while the engine is dispatching a hook:
/// it unwinds with an [`Escalation`] that survives `catch_unwind` blocks in
/// the code between the hook and the engine. Called without an engine, it
/// prints an error and exits the process.
pub fn report_finding_from_hook(finding: Finding) {
    binding().report_finding_from_hook(finding);
}

impl Binding {
    pub fn report_finding_from_hook(&self, finding: Finding) {
        let Binding::Present(entry_points) = self else {
            // The engine must be linked for hooks to run at all.
            outside_hook_context();
        };
        let sink = &entry_points.findings;

        match panic::catch_unwind(AssertUnwindSafe(|| sink.report_finding_from_hook(finding))) {
            Ok(()) => {
                eprintln!(
                    "ERROR: report_finding_from_hook must be called from a method hook, the finding was not reported"
                );
            }
            Err(payload) if Escalation::recognize(payload.as_ref()).is_some() => {
                panic::resume_unwind(payload)
            }
            Err(payload) => {
                eprintln!(
                    "ERROR: unexpected failure while reporting a finding from a hook: {}",
                    describe_payload(payload)
                );
            }
        }
    }
}

fn outside_hook_context() -> ! {
    eprintln!("ERROR: report_finding_from_hook must be called from a method hook");
    process::exit(1);
}
