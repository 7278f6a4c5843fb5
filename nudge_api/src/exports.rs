//! The table an engine publishes so the facade can bind to it.

use crate::finding::Finding;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use thiserror::Error;

/// Version of the entry-point contract below. An engine publishing a
/// different version is rejected at binding time.
pub const ABI_VERSION: u32 = 1;

pub const TRACE_STRCMP: &str = "trace_strcmp";
pub const TRACE_STRSTR: &str = "trace_strstr";
pub const REPORT_FINDING_FROM_HOOK: &str = "report_finding_from_hook";

/// `(current, target, mode, id)`
pub type TraceStrcmpFn = fn(&str, &str, i32, i32);
/// `(haystack, needle, id)`
pub type TraceStrstrFn = fn(&str, &str, i32);

/// Engine side of [`report_finding_from_hook`](crate::report_finding_from_hook).
///
/// While hook dispatch is on the stack, implementations are expected to
/// unwind with an [`Escalation`](crate::Escalation) instead of returning.
pub trait FindingSink: Send + Sync {
    /// Hands `finding` to the engine.
    ///
    /// # Arguments
    /// * `finding`: What the hook detected, with its cause chain.
    ///
    /// Returning normally tells the facade that no hook dispatch was active.
    fn report_finding_from_hook(&self, finding: Finding);
}

/// A single named entry point in an [`EngineExports`] table.
#[derive(Clone)]
pub enum Export {
    TraceStrcmp(TraceStrcmpFn),
    TraceStrstr(TraceStrstrFn),
    FindingSink(Arc<dyn FindingSink>),
}

impl Export {
    /// Human-readable signature, used in version-skew diagnostics.
    pub fn signature(&self) -> &'static str {
        match self {
            Export::TraceStrcmp(_) => "fn(&str, &str, i32, i32)",
            Export::TraceStrstr(_) => "fn(&str, &str, i32)",
            Export::FindingSink(_) => "dyn FindingSink",
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Export({})", self.signature())
    }
}

/// Named entry points an engine makes available to the facade.
#[derive(Debug, Clone)]
pub struct EngineExports {
    abi_version: u32,
    entries: Vec<(&'static str, Export)>,
}

impl EngineExports {
    /// An empty table for the current [`ABI_VERSION`].
    pub fn new() -> Self {
        Self::with_abi_version(ABI_VERSION)
    }

    /// An empty table claiming `abi_version`.
    ///
    /// Only useful to exercise version skew; engines call [`EngineExports::new`].
    pub fn with_abi_version(abi_version: u32) -> Self {
        Self {
            abi_version,
            entries: Vec::new(),
        }
    }

    /// Adds `export` under `name`, replacing an earlier export of the same name.
    pub fn export(mut self, name: &'static str, export: Export) -> Self {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = export,
            None => self.entries.push((name, export)),
        }
        self
    }

    pub fn abi_version(&self) -> u32 {
        self.abi_version
    }

    /// The export registered under `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<&Export> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, export)| export)
    }

    /// Export names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }
}

impl Default for EngineExports {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PublishError {
    #[error("engine exports were already published")]
    AlreadyPublished,
    #[error("the nudge binding was resolved before the engine published its exports")]
    BindingAlreadyResolved,
}

static PUBLISHED: OnceLock<EngineExports> = OnceLock::new();
/// Set once the binding has taken its snapshot of [`PUBLISHED`]. Publishing
/// and freezing hold this lock, so a table is either seen by the binding or
/// rejected.
static FROZEN: Mutex<bool> = Mutex::new(false);

/// Makes `exports` visible to the facade for the rest of the process.
///
/// Must happen before the first facade call: the binding is resolved once and
/// a table published afterwards would never be seen.
///
/// # Errors
///
/// [`PublishError::AlreadyPublished`] if a table was published before, and
/// [`PublishError::BindingAlreadyResolved`] if the facade already resolved
/// its binding without one.
pub fn publish(exports: EngineExports) -> Result<(), PublishError> {
    let frozen = FROZEN.lock().unwrap_or_else(PoisonError::into_inner);
    if PUBLISHED.get().is_some() {
        return Err(PublishError::AlreadyPublished);
    }
    if *frozen {
        return Err(PublishError::BindingAlreadyResolved);
    }
    let names: Vec<&'static str> = exports.names().collect();
    PUBLISHED
        .set(exports)
        .map_err(|_| PublishError::AlreadyPublished)?;
    drop(frozen);
    log::debug!("engine published exports: {}", names.join(", "));
    Ok(())
}

/// The table published by the engine, if any.
pub fn published() -> Option<&'static EngineExports> {
    PUBLISHED.get()
}

/// Closes publication and returns the table the binding resolves against.
pub(crate) fn freeze() -> Option<&'static EngineExports> {
    let mut frozen = FROZEN.lock().unwrap_or_else(PoisonError::into_inner);
    *frozen = true;
    PUBLISHED.get()
}
