use crate::executor::ExecutionStatus;
use crate::trace::TraceTable;
use std::collections::BTreeMap;

/// Name under which [`HintObserver`] publishes its data.
pub const HINT_OBSERVER_NAME: &str = "HintObserver";

/// An `Observer` monitors a single execution of the harness and collects data
/// about it.
///
/// Observers are invoked by an `Executor` before (`pre_exec`) and after
/// (`post_exec`) the harness runs. The data they collect (`serialize_data`) is
/// consumed by `Feedback` components, which look it up by [`Observer::name`].
pub trait Observer: Send + Sync {
    /// Static name identifying the observer's data.
    fn name(&self) -> &'static str;

    /// Called immediately before the harness runs. Typically resets state.
    ///
    /// # Returns
    /// `Ok(())` on success. An error discards the execution before the harness
    /// is invoked.
    fn pre_exec(&mut self) -> Result<(), anyhow::Error>;

    /// Called after the harness has finished.
    ///
    /// # Arguments
    /// * `status`: The outcome the executor classified for this run.
    /// * `input_opt`: The bytes the harness was given, when the executor has them.
    ///
    /// # Returns
    /// `Ok(())` on success, or an error if collecting the data failed.
    fn post_exec(
        &mut self,
        status: &ExecutionStatus,
        input_opt: Option<&[u8]>,
    ) -> Result<(), anyhow::Error>;

    /// Forgets everything collected so far so one execution cannot leak into
    /// the next.
    fn reset(&mut self) -> Result<(), anyhow::Error>;

    /// Data collected during the last execution, in an observer-specific format.
    fn serialize_data(&self) -> Option<Vec<u8>>;
}

/// An observer that collects nothing.
#[derive(Default, Debug, Clone, Copy)]
pub struct NoOpObserver;

impl Observer for NoOpObserver {
    fn name(&self) -> &'static str {
        "NoOpObserver"
    }

    fn pre_exec(&mut self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    fn post_exec(
        &mut self,
        _status: &ExecutionStatus,
        _input_opt: Option<&[u8]>,
    ) -> Result<(), anyhow::Error> {
        Ok(())
    }

    fn reset(&mut self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    fn serialize_data(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Measures how close an execution came to satisfying each hinted comparison.
///
/// After every execution the observer keeps, per call-site id, the best
/// [`progress`](crate::trace::ComparisonHint::progress) among the hints the
/// execution produced. `serialize_data` encodes them as little-endian
/// `(id: i32, progress: u32)` pairs, sorted by id.
#[derive(Debug)]
pub struct HintObserver {
    table: &'static TraceTable,
    progress: BTreeMap<i32, u32>,
}

impl HintObserver {
    /// Creates an observer reading the hints recorded in `table`.
    pub fn new(table: &'static TraceTable) -> Self {
        Self {
            table,
            progress: BTreeMap::new(),
        }
    }

    /// Best progress per id observed during the last execution.
    pub fn progress(&self) -> &BTreeMap<i32, u32> {
        &self.progress
    }

    /// Inverse of the encoding used by `serialize_data`. Trailing partial
    /// entries are ignored.
    pub fn decode(data: &[u8]) -> Vec<(i32, u32)> {
        data.chunks_exact(8)
            .map(|entry| {
                let mut id = [0u8; 4];
                let mut progress = [0u8; 4];
                id.copy_from_slice(&entry[..4]);
                progress.copy_from_slice(&entry[4..]);
                (i32::from_le_bytes(id), u32::from_le_bytes(progress))
            })
            .collect()
    }
}

impl Observer for HintObserver {
    fn name(&self) -> &'static str {
        HINT_OBSERVER_NAME
    }

    fn pre_exec(&mut self) -> Result<(), anyhow::Error> {
        self.table.begin_execution();
        self.reset()
    }

    fn post_exec(
        &mut self,
        _status: &ExecutionStatus,
        _input_opt: Option<&[u8]>,
    ) -> Result<(), anyhow::Error> {
        for hint in self.table.execution_hints() {
            let progress = u32::try_from(hint.progress()).unwrap_or(u32::MAX);
            let best = self.progress.entry(hint.id).or_insert(0);
            *best = (*best).max(progress);
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), anyhow::Error> {
        self.progress.clear();
        Ok(())
    }

    fn serialize_data(&self) -> Option<Vec<u8>> {
        if self.progress.is_empty() {
            return None;
        }
        let mut data = Vec::with_capacity(self.progress.len() * 8);
        for (id, progress) in &self.progress {
            data.extend_from_slice(&id.to_le_bytes());
            data.extend_from_slice(&progress.to_le_bytes());
        }
        Some(data)
    }
}
