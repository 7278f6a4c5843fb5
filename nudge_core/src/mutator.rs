use crate::corpus::Corpus;
use crate::input::Input;
use crate::trace::{ComparisonHint, TraceTable, find_bytes};
use nudge_api::CompareMode;
use rand::Rng;

/// Default chance that [`HintGuidedMutator`] applies a hint instead of its fallback.
pub const DEFAULT_HINT_PROBABILITY: f64 = 0.5;

/// Transforms an input into a new, potentially modified input.
///
/// # Type Parameters
/// * `I`: The type of `Input` this mutator operates on.
/// * `R`: The random number generator used for mutation decisions.
pub trait Mutator<I: Input, R: Rng + ?Sized> {
    /// Produces a new input from `input_opt`, or from scratch when it is `None`.
    ///
    /// # Arguments
    /// * `input_opt`: The base input. The mutator never modifies it in place.
    /// * `rng`: Random number generator driving every mutation decision.
    /// * `corpus_opt`: The current corpus, for mutators that splice or draw from it.
    ///
    /// # Returns
    /// The mutated input, or an error if no mutant could be produced.
    fn mutate(
        &mut self,
        input_opt: Option<&I>,
        rng: &mut R,
        corpus_opt: Option<&dyn Corpus<I>>,
    ) -> Result<I, anyhow::Error>;
}

/// Adds a small random value to one randomly chosen byte.
///
/// Empty or missing inputs start out as a single zero byte.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlipSingleByteMutator;

impl<I, R> Mutator<I, R> for FlipSingleByteMutator
where
    I: Input + From<Vec<u8>>,
    R: Rng + ?Sized,
{
    fn mutate(
        &mut self,
        input_opt: Option<&I>,
        rng: &mut R,
        _corpus_opt: Option<&dyn Corpus<I>>,
    ) -> Result<I, anyhow::Error> {
        let mut bytes = input_opt
            .map(|input| input.as_bytes().to_vec())
            .unwrap_or_default();
        if bytes.is_empty() {
            bytes.push(0);
        }

        let delta = rng.random_range(1u8..=15u8);
        let index = rng.random_range(0..bytes.len());
        bytes[index] = bytes[index].wrapping_add(delta);

        Ok(I::from(bytes))
    }
}

/// Steers inputs towards the comparisons recorded in a [`TraceTable`].
///
/// With probability `hint_probability`, and only when the table holds a
/// hint, the mutator rewrites the input so that a recorded comparison is
/// more likely to hold on the next execution. Otherwise it defers to
/// `fallback`.
pub struct HintGuidedMutator<M> {
    table: &'static TraceTable,
    fallback: M,
    hint_probability: f64,
}

impl<M> HintGuidedMutator<M> {
    /// Creates a mutator sampling hints from `table`.
    ///
    /// `hint_probability` is clamped to `[0.0, 1.0]`; a non-finite value falls
    /// back to [`DEFAULT_HINT_PROBABILITY`].
    pub fn new(table: &'static TraceTable, fallback: M, hint_probability: f64) -> Self {
        Self {
            table,
            fallback,
            hint_probability: if hint_probability.is_finite() {
                hint_probability.clamp(0.0, 1.0)
            } else {
                DEFAULT_HINT_PROBABILITY
            },
        }
    }

    pub fn hint_probability(&self) -> f64 {
        self.hint_probability
    }
}

impl<I, R, M> Mutator<I, R> for HintGuidedMutator<M>
where
    I: Input + From<Vec<u8>>,
    R: Rng + ?Sized,
    M: Mutator<I, R>,
{
    fn mutate(
        &mut self,
        input_opt: Option<&I>,
        rng: &mut R,
        corpus_opt: Option<&dyn Corpus<I>>,
    ) -> Result<I, anyhow::Error> {
        if let Some(input) = input_opt {
            if rng.random_bool(self.hint_probability) {
                if let Some(hint) = self.table.sample(rng) {
                    return Ok(I::from(apply_hint(input.as_bytes(), &hint, rng)));
                }
            }
        }
        self.fallback.mutate(input_opt, rng, corpus_opt)
    }
}

/// Rewrites `data` towards satisfying `hint`.
///
/// For equality, the first occurrence of the observed value is replaced by the
/// target; if the observed value does not appear verbatim, the target is
/// inserted at a random offset. For containment, the needle is inserted at a
/// random offset.
pub fn apply_hint<R: Rng + ?Sized>(data: &[u8], hint: &ComparisonHint, rng: &mut R) -> Vec<u8> {
    let target = hint.target.as_bytes();
    let current = hint.current.as_bytes();

    if hint.mode == CompareMode::Equality && !current.is_empty() {
        if let Some(start) = find_bytes(data, current) {
            let mut out = Vec::with_capacity(data.len() - current.len() + target.len());
            out.extend_from_slice(&data[..start]);
            out.extend_from_slice(target);
            out.extend_from_slice(&data[start + current.len()..]);
            return out;
        }
    }

    let offset = rng.random_range(0..=data.len());
    let mut out = Vec::with_capacity(data.len() + target.len());
    out.extend_from_slice(&data[..offset]);
    out.extend_from_slice(target);
    out.extend_from_slice(&data[offset..]);
    out
}
