use crate::corpus::Corpus;
use crate::input::Input;
use crate::observer::{HINT_OBSERVER_NAME, HintObserver};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("Corpus operation failed within feedback: {0}")]
    CorpusInteractionError(#[from] crate::corpus::CorpusError),
}

/// Observer data of one execution, keyed by observer name.
pub type ObserversData = HashMap<&'static str, Option<Vec<u8>>>;

pub trait Feedback<I: Input, C: Corpus<I>>: Send + Sync {
    fn name(&self) -> &'static str;
    fn init(&mut self, corpus: &C) -> Result<(), FeedbackError>;
    fn is_interesting(
        &mut self,
        input: &I,
        observers_data: &ObserversData,
        corpus: &C,
    ) -> Result<bool, FeedbackError>;
    fn report_interesting(
        &mut self,
        input: I,
        observers_data: &ObserversData,
        corpus: &mut C,
    ) -> Result<(), FeedbackError>;
}

/// Keeps inputs that got closer to satisfying a hinted comparison.
///
/// An input is interesting when, for some call-site id, the progress reported
/// by the [`HintObserver`] beats the best progress seen so far, including
/// when the id has never been seen before.
#[derive(Debug, Default)]
pub struct NewHintFeedback {
    best: HashMap<i32, u32>,
}

impl NewHintFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best_progress(&self, id: i32) -> Option<u32> {
        self.best.get(&id).copied()
    }

    fn improvements(&self, observers_data: &ObserversData) -> Vec<(i32, u32)> {
        let Some(Some(data)) = observers_data.get(HINT_OBSERVER_NAME) else {
            return Vec::new();
        };
        HintObserver::decode(data)
            .into_iter()
            .filter(|(id, progress)| self.best.get(id).is_none_or(|best| progress > best))
            .collect()
    }
}

impl<I: Input, C: Corpus<I>> Feedback<I, C> for NewHintFeedback {
    fn name(&self) -> &'static str {
        "NewHintFeedback"
    }

    fn init(&mut self, _corpus: &C) -> Result<(), FeedbackError> {
        Ok(())
    }

    fn is_interesting(
        &mut self,
        _input: &I,
        observers_data: &ObserversData,
        _corpus: &C,
    ) -> Result<bool, FeedbackError> {
        Ok(!self.improvements(observers_data).is_empty())
    }

    fn report_interesting(
        &mut self,
        input: I,
        observers_data: &ObserversData,
        corpus: &mut C,
    ) -> Result<(), FeedbackError> {
        let improvements = self.improvements(observers_data);
        if improvements.is_empty() {
            return Ok(());
        }
        for (id, progress) in &improvements {
            self.best.insert(*id, *progress);
        }
        log::debug!(
            "Input of {} bytes improved {} hint(s)",
            input.len(),
            improvements.len()
        );
        corpus.add(input, Box::new(improvements))?;
        Ok(())
    }
}
