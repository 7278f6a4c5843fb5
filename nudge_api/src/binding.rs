use crate::exports::{
    self, ABI_VERSION, EngineExports, Export, FindingSink, REPORT_FINDING_FROM_HOOK, TRACE_STRCMP,
    TRACE_STRSTR, TraceStrcmpFn, TraceStrstrFn,
};
use std::fmt;
use std::process;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Reasons a published export table cannot be bound.
///
/// All of them mean the engine and this facade were built from different
/// versions; none of them is recoverable.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BindingError {
    #[error("engine ABI version {found} does not match facade ABI version {expected}")]
    AbiMismatch { expected: u32, found: u32 },
    #[error("engine does not export `{name}`")]
    MissingEntryPoint { name: &'static str },
    #[error("engine exports `{name}` as {found}, expected {expected}")]
    SignatureMismatch {
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// The engine entry points the facade forwards to.
#[derive(Clone)]
pub struct EntryPoints {
    pub(crate) trace_strcmp: TraceStrcmpFn,
    pub(crate) trace_strstr: TraceStrstrFn,
    pub(crate) findings: Arc<dyn FindingSink>,
}

impl fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoints")
            .field("trace_strcmp", &self.trace_strcmp)
            .field("trace_strstr", &self.trace_strstr)
            .finish_non_exhaustive()
    }
}

/// Whether an engine is available, and if so, how to reach it.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Not running under an engine. Hints are no-ops.
    Absent,
    Present(EntryPoints),
}

impl Binding {
    /// Resolves the entry points in `exports`.
    ///
    /// `None` means no engine published anything and yields [`Binding::Absent`].
    /// A table that is present but incomplete is an error, never `Absent`.
    pub fn resolve(exports: Option<&EngineExports>) -> Result<Self, BindingError> {
        let Some(exports) = exports else {
            return Ok(Binding::Absent);
        };
        if exports.abi_version() != ABI_VERSION {
            return Err(BindingError::AbiMismatch {
                expected: ABI_VERSION,
                found: exports.abi_version(),
            });
        }

        let findings = match lookup(exports, REPORT_FINDING_FROM_HOOK)? {
            Export::FindingSink(sink) => Arc::clone(sink),
            other => return Err(mismatch(REPORT_FINDING_FROM_HOOK, "dyn FindingSink", other)),
        };
        let trace_strcmp = match lookup(exports, TRACE_STRCMP)? {
            Export::TraceStrcmp(f) => *f,
            other => return Err(mismatch(TRACE_STRCMP, "fn(&str, &str, i32, i32)", other)),
        };
        let trace_strstr = match lookup(exports, TRACE_STRSTR)? {
            Export::TraceStrstr(f) => *f,
            other => return Err(mismatch(TRACE_STRSTR, "fn(&str, &str, i32)", other)),
        };

        Ok(Binding::Present(EntryPoints {
            trace_strcmp,
            trace_strstr,
            findings,
        }))
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Binding::Present(_))
    }

    pub fn entry_points(&self) -> Option<&EntryPoints> {
        match self {
            Binding::Present(entry_points) => Some(entry_points),
            Binding::Absent => None,
        }
    }
}

fn lookup<'a>(exports: &'a EngineExports, name: &'static str) -> Result<&'a Export, BindingError> {
    exports
        .lookup(name)
        .ok_or(BindingError::MissingEntryPoint { name })
}

fn mismatch(name: &'static str, expected: &'static str, found: &Export) -> BindingError {
    BindingError::SignatureMismatch {
        name,
        expected,
        found: found.signature(),
    }
}

static BINDING: OnceLock<Binding> = OnceLock::new();

/// The process-wide binding, resolved on first use.
///
/// Terminates the process if the published exports do not match this facade.
pub fn binding() -> &'static Binding {
    BINDING.get_or_init(|| match Binding::resolve(exports::freeze()) {
        Ok(binding) => {
            if binding.is_present() {
                log::debug!("nudge facade bound to engine runtime");
            }
            binding
        }
        Err(e) => incompatible_version(&e),
    })
}

fn incompatible_version(err: &BindingError) -> ! {
    eprintln!("ERROR: Incompatible version of the nudge API detected, please update.");
    eprintln!("ERROR: {err}");
    process::exit(1);
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    #[test]
    fn resolve_without_exports_is_absent() {
        let binding = Binding::resolve(None).expect("absence is not an error");
        assert!(!binding.is_present());
        assert!(binding.entry_points().is_none());
    }

    #[test]
    fn resolve_complete_exports_is_present() {
        let exports = recording_exports(Arc::new(IdleSink));
        let binding = Binding::resolve(Some(&exports)).expect("complete table binds");
        assert!(binding.is_present());
        assert!(binding.entry_points().is_some());
    }

    #[test]
    fn resolve_rejects_missing_entry_point() {
        let exports = EngineExports::new()
            .export(REPORT_FINDING_FROM_HOOK, Export::FindingSink(Arc::new(IdleSink)))
            .export(TRACE_STRCMP, Export::TraceStrcmp(recording_strcmp));

        let err = Binding::resolve(Some(&exports)).unwrap_err();
        assert_eq!(err, BindingError::MissingEntryPoint { name: TRACE_STRSTR });
    }

    #[test]
    fn resolve_rejects_missing_finding_sink() {
        let exports = EngineExports::new()
            .export(TRACE_STRCMP, Export::TraceStrcmp(recording_strcmp))
            .export(TRACE_STRSTR, Export::TraceStrstr(recording_strstr));

        let err = Binding::resolve(Some(&exports)).unwrap_err();
        assert_eq!(
            err,
            BindingError::MissingEntryPoint {
                name: REPORT_FINDING_FROM_HOOK
            }
        );
    }

    #[test]
    fn resolve_rejects_wrong_signature() {
        let exports = recording_exports(Arc::new(IdleSink))
            .export(TRACE_STRCMP, Export::TraceStrstr(recording_strstr));

        let err = Binding::resolve(Some(&exports)).unwrap_err();
        assert_eq!(
            err,
            BindingError::SignatureMismatch {
                name: TRACE_STRCMP,
                expected: "fn(&str, &str, i32, i32)",
                found: "fn(&str, &str, i32)",
            }
        );
        assert!(err.to_string().contains("trace_strcmp"));
    }

    #[test]
    fn resolve_rejects_other_abi_version() {
        let exports = EngineExports::with_abi_version(ABI_VERSION + 1)
            .export(REPORT_FINDING_FROM_HOOK, Export::FindingSink(Arc::new(IdleSink)))
            .export(TRACE_STRCMP, Export::TraceStrcmp(recording_strcmp))
            .export(TRACE_STRSTR, Export::TraceStrstr(recording_strstr));

        let err = Binding::resolve(Some(&exports)).unwrap_err();
        assert_eq!(
            err,
            BindingError::AbiMismatch {
                expected: ABI_VERSION,
                found: ABI_VERSION + 1
            }
        );
    }
}
