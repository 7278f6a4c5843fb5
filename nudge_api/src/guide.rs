use crate::binding::{Binding, binding};
use crate::escalation::describe_payload;
use crate::exports::{TRACE_STRCMP, TRACE_STRSTR};
use std::panic::{self, AssertUnwindSafe};

/// Kind of comparison a hint asks the engine to satisfy.
///
/// Passed to the engine as a raw `i32` so a single trace mechanism can serve
/// every hint kind.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareMode {
    Equality = 1,
    Containment = 2,
}

impl CompareMode {
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(CompareMode::Equality),
            2 => Some(CompareMode::Containment),
            _ => None,
        }
    }
}

/// Asks the fuzzer to mutate its input so that `current` becomes `target`.
///
/// `current` should be a value derived from the fuzzer input that is not yet
/// equal to `target`. `id` identifies the call site and should be the same
/// on every execution; a random constant is a good choice.
///
/// Without an engine this does nothing.
pub fn guide_towards_equality(current: &str, target: &str, id: i32) {
    binding().guide_towards_equality(current, target, id);
}

/// Asks the fuzzer to mutate its input so that `haystack` contains `needle`.
///
/// See [`guide_towards_equality`] for the meaning of `id`.
pub fn guide_towards_containment(haystack: &str, needle: &str, id: i32) {
    binding().guide_towards_containment(haystack, needle, id);
}

impl Binding {
    #[inline]
    pub fn guide_towards_equality(&self, current: &str, target: &str, id: i32) {
        if let Binding::Present(entry_points) = self {
            let trace_strcmp = entry_points.trace_strcmp;
            forward(TRACE_STRCMP, || {
                trace_strcmp(current, target, CompareMode::Equality.as_raw(), id)
            });
        }
    }

    #[inline]
    pub fn guide_towards_containment(&self, haystack: &str, needle: &str, id: i32) {
        if let Binding::Present(entry_points) = self {
            let trace_strstr = entry_points.trace_strstr;
            forward(TRACE_STRSTR, || trace_strstr(haystack, needle, id));
        }
    }
}

/// Hints are an optimisation: a failing entry point is logged, never propagated.
fn forward(entry_point: &str, call: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(call)) {
        log::warn!(
            "hint forwarding through `{entry_point}` failed: {}",
            describe_payload(payload)
        );
    }
}
