//! Publishes this engine's entry points to the nudge facade.

use crate::hook_context::{self, FindingReport};
use crate::trace;
use nudge_api::exports::{self, PublishError};
use nudge_api::{
    EngineExports, Escalation, Export, Finding, FindingSink, REPORT_FINDING_FROM_HOOK,
    TRACE_STRCMP, TRACE_STRSTR,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Failed to install engine runtime: {0}")]
    Publish(#[from] PublishError),
}

/// Receives findings reported from hooks.
///
/// While a harness runs, on whichever thread the hook fires, the finding is
/// recorded for the executor and then escalated. Outside of an execution
/// there is no dispatcher to escalate to, so the sink returns and the facade
/// reports the misuse.
#[derive(Debug, Default)]
pub struct HookFindingSink;

impl FindingSink for HookFindingSink {
    fn report_finding_from_hook(&self, finding: Finding) {
        if !hook_context::in_harness() {
            log::error!("Finding reported outside of a harness execution: {finding}");
            return;
        }
        hook_context::record_finding(FindingReport::from_finding(&finding));
        Escalation::raise(finding);
    }
}

/// The export table describing this engine.
pub fn engine_exports() -> EngineExports {
    EngineExports::new()
        .export(
            REPORT_FINDING_FROM_HOOK,
            Export::FindingSink(Arc::new(HookFindingSink)),
        )
        .export(TRACE_STRCMP, Export::TraceStrcmp(trace::trace_strcmp))
        .export(TRACE_STRSTR, Export::TraceStrstr(trace::trace_strstr))
}

/// Makes the engine visible to the facade. Call once, before running any target.
pub fn install() -> Result<(), RuntimeError> {
    exports::publish(engine_exports())?;
    log::debug!("Engine runtime installed");
    Ok(())
}
