use crate::corpus::Corpus;
use crate::input::Input;
use rand_core::RngCore;
use thiserror::Error;

/// Errors that can occur while scheduling.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The corpus holds no entry to schedule.
    #[error("Corpus is empty, cannot schedule next input")]
    CorpusEmpty,
}

/// Chooses which corpus entry the fuzzer mutates next.
///
/// Schedulers may weigh entries by the feedback their mutants earned; the
/// fuzzer reports it through [`Scheduler::report_feedback`] after every
/// execution.
pub trait Scheduler<I: Input>: Send + Sync {
    /// Selects the ID of the next corpus entry to mutate.
    ///
    /// # Arguments
    /// * `corpus`: The corpus to select from.
    /// * `rng`: Source of randomness for schedulers that need it.
    ///
    /// # Returns
    /// The ID of the selected entry, or [`SchedulerError::CorpusEmpty`] when
    /// there is nothing to select.
    fn next(
        &mut self,
        corpus: &dyn Corpus<I>,
        rng: &mut dyn RngCore,
    ) -> Result<usize, SchedulerError>;

    /// Tells the scheduler how the mutant of entry `input_id` fared.
    ///
    /// `is_interesting` is set when the mutant was added to the corpus and
    /// `is_solution` when it produced a finding.
    fn report_feedback(&mut self, input_id: usize, is_interesting: bool, is_solution: bool);
}

/// Picks entries uniformly at random and ignores feedback.
#[derive(Default, Debug)]
pub struct RandomScheduler;

impl RandomScheduler {
    /// Creates a new `RandomScheduler`.
    pub fn new() -> Self {
        RandomScheduler
    }
}

impl<I: Input> Scheduler<I> for RandomScheduler {
    fn next(
        &mut self,
        corpus: &dyn Corpus<I>,
        rng: &mut dyn RngCore,
    ) -> Result<usize, SchedulerError> {
        corpus
            .random_select(rng)
            .map(|(id, _, _)| id)
            .ok_or(SchedulerError::CorpusEmpty)
    }

    fn report_feedback(&mut self, _input_id: usize, _is_interesting: bool, _is_solution: bool) {}
}
