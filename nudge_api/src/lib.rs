//! Mutation guidance and finding escalation for fuzz targets and hooks.
//!
//! Targets call [`guide_towards_equality`] and [`guide_towards_containment`] to
//! tell the engine which string comparisons they would like the fuzzer to
//! satisfy, and hooks call [`report_finding_from_hook`] to turn a problem they
//! detected into a finding.
//!
//! The crate does not depend on any engine. An engine makes itself available
//! by publishing an [`EngineExports`] table with [`exports::publish`] before
//! the target runs; the first facade call resolves that table into a
//! process-wide [`Binding`]. Without a published table every hint is a no-op,
//! so targets can link this crate unconditionally.

pub mod binding;
pub mod escalation;
pub mod exports;
pub mod finding;
pub mod guide;
pub mod report;

pub use binding::{Binding, BindingError, EntryPoints, binding};
pub use escalation::{Escalation, FINDING_CATEGORY, describe_payload};
pub use exports::{
    ABI_VERSION, EngineExports, Export, FindingSink, PublishError, REPORT_FINDING_FROM_HOOK,
    TRACE_STRCMP, TRACE_STRSTR, TraceStrcmpFn, TraceStrstrFn,
};
pub use finding::Finding;
pub use guide::{CompareMode, guide_towards_containment, guide_towards_equality};
pub use report::report_finding_from_hook;
