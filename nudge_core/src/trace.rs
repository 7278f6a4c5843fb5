//! Trace tables fed by the hint entry points.
//!
//! The facade hands hints to [`trace_strcmp`] and [`trace_strstr`] through
//! plain function pointers, so the table they write to is process-wide.

use nudge_api::CompareMode;
use rand_core::RngCore;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

/// Number of slots in the table of recent comparisons.
pub const TABLE_SIZE: usize = 64;

/// Upper bound on hints remembered for a single execution.
const MAX_EXECUTION_HINTS: usize = 1024;

/// A comparison the target would like to satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComparisonHint {
    pub current: String,
    pub target: String,
    pub mode: CompareMode,
    pub id: i32,
}

impl ComparisonHint {
    pub fn new(current: &str, target: &str, mode: CompareMode, id: i32) -> Self {
        Self {
            current: current.to_string(),
            target: target.to_string(),
            mode,
            id,
        }
    }

    /// Whether `current` already meets `target` under `mode`.
    pub fn is_satisfied(&self) -> bool {
        match self.mode {
            CompareMode::Equality => self.current == self.target,
            CompareMode::Containment => self.current.contains(self.target.as_str()),
        }
    }

    /// How close `current` is to satisfying the comparison, in bytes.
    ///
    /// Equality counts the common prefix of `current` and `target`; containment
    /// counts the longest prefix of the needle found anywhere in the haystack.
    pub fn progress(&self) -> usize {
        let current = self.current.as_bytes();
        let target = self.target.as_bytes();
        match self.mode {
            CompareMode::Equality => current
                .iter()
                .zip(target)
                .take_while(|(a, b)| a == b)
                .count(),
            CompareMode::Containment => (1..=target.len())
                .rev()
                .find(|&len| find_bytes(current, &target[..len]).is_some())
                .unwrap_or(0),
        }
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[derive(Debug)]
struct TableState {
    slots: Vec<Option<ComparisonHint>>,
    execution: Vec<ComparisonHint>,
}

/// Recent comparisons, indexed by call-site id, plus the hints of the current execution.
///
/// The per-execution list belongs to whichever execution holds the
/// [`ExecutionLock`](crate::hook_context::ExecutionLock); hints recorded from
/// threads the harness spawns count towards that execution.
#[derive(Debug)]
pub struct TraceTable {
    state: Mutex<TableState>,
}

impl TraceTable {
    /// An empty table with [`TABLE_SIZE`] slots.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                slots: vec![None; TABLE_SIZE],
                execution: Vec::new(),
            }),
        }
    }

    // A harness panicking mid-execution must not disable guidance.
    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `hint` unless it is already satisfied. Returns whether it was kept.
    pub fn record(&self, hint: ComparisonHint) -> bool {
        if hint.is_satisfied() {
            return false;
        }
        let slot = hint.id.rem_euclid(TABLE_SIZE as i32) as usize;
        let mut state = self.lock();
        if state.execution.len() < MAX_EXECUTION_HINTS {
            state.execution.push(hint.clone());
        }
        state.slots[slot] = Some(hint);
        true
    }

    /// Forgets the hints of the previous execution. Recent comparisons stay.
    pub fn begin_execution(&self) {
        self.lock().execution.clear();
    }

    /// Hints recorded since the last [`TraceTable::begin_execution`], in
    /// recording order and capped at 1024 entries.
    pub fn execution_hints(&self) -> Vec<ComparisonHint> {
        self.lock().execution.clone()
    }

    /// Snapshot of the occupied slots, ordered by slot index.
    pub fn recorded(&self) -> Vec<ComparisonHint> {
        self.lock().slots.iter().flatten().cloned().collect()
    }

    /// Picks one of the recent comparisons at random.
    pub fn sample<R: RngCore + ?Sized>(&self, rng: &mut R) -> Option<ComparisonHint> {
        let state = self.lock();
        let occupied: Vec<&ComparisonHint> = state.slots.iter().flatten().collect();
        if occupied.is_empty() {
            return None;
        }
        let index = (rng.next_u64() % occupied.len() as u64) as usize;
        Some(occupied[index].clone())
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.lock().slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties every slot and the hints of the current execution.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.slots.iter_mut().for_each(|slot| *slot = None);
        state.execution.clear();
    }
}

impl Default for TraceTable {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: LazyLock<TraceTable> = LazyLock::new(TraceTable::new);

/// The table the exported entry points write to.
pub fn global() -> &'static TraceTable {
    &GLOBAL
}

/// Entry point bound to `guide_towards_equality`.
pub fn trace_strcmp(current: &str, target: &str, mode: i32, id: i32) {
    let mode = CompareMode::from_raw(mode).unwrap_or(CompareMode::Equality);
    global().record(ComparisonHint::new(current, target, mode, id));
}

/// Entry point bound to `guide_towards_containment`.
pub fn trace_strstr(haystack: &str, needle: &str, id: i32) {
    global().record(ComparisonHint::new(
        haystack,
        needle,
        CompareMode::Containment,
        id,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    #[test]
    fn satisfied_hints_are_dropped() {
        let table = TraceTable::new();
        assert!(!table.record(ComparisonHint::new("abc", "abc", CompareMode::Equality, 1)));
        assert!(!table.record(ComparisonHint::new(
            "xxabcxx",
            "abc",
            CompareMode::Containment,
            2
        )));
        assert!(table.is_empty());
        assert!(table.execution_hints().is_empty());
    }

    #[test]
    fn hints_share_slot_by_id() {
        let table = TraceTable::new();
        assert!(table.record(ComparisonHint::new("a", "b", CompareMode::Equality, 3)));
        assert!(table.record(ComparisonHint::new(
            "c",
            "d",
            CompareMode::Equality,
            3 + TABLE_SIZE as i32
        )));
        assert!(table.record(ComparisonHint::new("e", "f", CompareMode::Equality, -1)));

        let recorded = table.recorded();
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().any(|hint| hint.current == "c"));
        assert!(recorded.iter().any(|hint| hint.id == -1));
        assert_eq!(table.execution_hints().len(), 3);
    }

    #[test]
    fn begin_execution_keeps_recent_comparisons() {
        let table = TraceTable::new();
        table.record(ComparisonHint::new("a", "b", CompareMode::Equality, 9));
        table.begin_execution();
        assert!(table.execution_hints().is_empty());
        assert_eq!(table.len(), 1);

        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn sample_returns_recorded_hint() {
        let table = TraceTable::new();
        let mut rng = ChaCha8Rng::from_seed([3; 32]);
        assert!(table.sample(&mut rng).is_none());

        let hint = ComparisonHint::new("GET", "PUT", CompareMode::Equality, 11);
        table.record(hint.clone());
        assert_eq!(table.sample(&mut rng), Some(hint));
    }

    #[test]
    fn progress_measures_closeness() {
        assert_eq!(
            ComparisonHint::new("FUxx", "FUZZ", CompareMode::Equality, 0).progress(),
            2
        );
        assert_eq!(
            ComparisonHint::new("", "FUZZ", CompareMode::Equality, 0).progress(),
            0
        );
        assert_eq!(
            ComparisonHint::new("path=/adm", "/admin", CompareMode::Containment, 0).progress(),
            4
        );
        assert_eq!(
            ComparisonHint::new("nothing", "/admin", CompareMode::Containment, 0).progress(),
            0
        );
    }

    #[test]
    fn find_bytes_locates_first_occurrence() {
        assert_eq!(find_bytes(b"abcabc", b"ca"), Some(2));
        assert_eq!(find_bytes(b"abc", b""), Some(0));
        assert_eq!(find_bytes(b"ab", b"abc"), None);
    }

    #[test]
    fn exported_entry_points_write_to_global_table() {
        trace_strcmp("ab", "abc", CompareMode::Equality.as_raw(), 424_242);
        trace_strstr("haystack", "needle", 424_243);
        trace_strcmp("same", "same", 99, 424_244);

        let recorded = global().recorded();
        assert!(recorded.iter().any(|hint| hint.id == 424_242
            && hint.mode == CompareMode::Equality
            && hint.target == "abc"));
        assert!(recorded
            .iter()
            .any(|hint| hint.id == 424_243 && hint.mode == CompareMode::Containment));
        assert!(!recorded.iter().any(|hint| hint.id == 424_244));
    }
}
