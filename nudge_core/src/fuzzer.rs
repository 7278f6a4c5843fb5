//! The fuzz loop: schedule, mutate, execute, evaluate.

use crate::config::NudgeConfig;
use crate::corpus::{Corpus, CorpusError, InMemoryCorpus};
use crate::executor::{ExecutionStatus, Executor, InProcessExecutor};
use crate::feedback::{Feedback, NewHintFeedback, ObserversData};
use crate::input::Input;
use crate::mutator::{FlipSingleByteMutator, HintGuidedMutator, Mutator};
use crate::observer::{HintObserver, Observer};
use crate::oracle::{BugReport, CrashOracle, Oracle};
use crate::scheduler::{RandomScheduler, Scheduler};
use crate::trace;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

/// Seed used when no seed paths are configured or none could be loaded.
pub const DEFAULT_SEED_INPUT: &[u8] = b"INIT";

/// Summary of a finished fuzzing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuzzStats {
    pub executions: u64,
    pub corpus_len: usize,
    /// Distinct findings reported during the run.
    pub findings: u32,
    /// Findings skipped because their dedup token was ignored or already reported.
    pub skipped_findings: u32,
    /// Set when the run stopped because enough distinct findings were reported.
    pub stopped_early: bool,
}

enum Flow {
    Continue,
    Stop,
}

/// Fuzzes an in-process harness, steering mutations with the hints the
/// harness reports through the nudge facade.
pub struct Fuzzer<F>
where
    F: Fn(&[u8]) + Send + Sync,
{
    max_iterations: u64,
    keep_going: u32,
    dedup: bool,
    artifact_dir: Option<PathBuf>,
    known_tokens: HashSet<u64>,
    rng: ChaCha8Rng,
    corpus: InMemoryCorpus<Vec<u8>>,
    scheduler: Box<dyn Scheduler<Vec<u8>>>,
    mutator: HintGuidedMutator<FlipSingleByteMutator>,
    executor: InProcessExecutor<F>,
    observer: HintObserver,
    feedback: NewHintFeedback,
    oracle: CrashOracle,
    stats: FuzzStats,
}

impl<F> Fuzzer<F>
where
    F: Fn(&[u8]) + Send + Sync,
{
    /// Builds a fuzzer for `harness` from a validated view of `config`.
    ///
    /// # Arguments
    /// * `config`: Settings and seed paths. They are validated here.
    /// * `harness`: The target, called once per execution with the input bytes.
    ///
    /// # Returns
    /// The fuzzer with its corpus loaded, falling back to [`DEFAULT_SEED_INPUT`]
    /// when no seed could be loaded. Fails on invalid settings or unreadable
    /// seed paths.
    pub fn new(config: &NudgeConfig, harness: F) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let settings = &config.fuzzer;
        let table = trace::global();

        let mut corpus: InMemoryCorpus<Vec<u8>> = InMemoryCorpus::new();
        if let Some(seed_paths) = &config.corpus.initial_seed_paths {
            let loaded = corpus.load_initial_seeds(seed_paths)?;
            log::info!("Loaded {loaded} seed(s) from {} path(s)", seed_paths.len());
        }
        if corpus.is_empty() {
            corpus.add(
                DEFAULT_SEED_INPUT.to_vec(),
                Box::new("Default Initial Seed".to_string()),
            )?;
        }

        let mut feedback = NewHintFeedback::new();
        Feedback::<Vec<u8>, _>::init(&mut feedback, &corpus)?;

        Ok(Self {
            max_iterations: settings.max_iterations,
            keep_going: settings.keep_going,
            dedup: settings.dedup,
            artifact_dir: settings.artifact_dir.clone(),
            known_tokens: config.ignore_tokens()?.into_iter().collect(),
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            corpus,
            scheduler: Box::new(RandomScheduler::new()),
            mutator: HintGuidedMutator::new(
                table,
                FlipSingleByteMutator,
                settings.hint_probability,
            ),
            executor: InProcessExecutor::new(harness),
            observer: HintObserver::new(table),
            feedback,
            oracle: CrashOracle::new(),
            stats: FuzzStats::default(),
        })
    }

    /// The inputs kept so far, seeds first.
    pub fn corpus(&self) -> &InMemoryCorpus<Vec<u8>> {
        &self.corpus
    }

    /// Runs the initial corpus once, then fuzzes until `max-iterations` mutants
    /// were executed or `keep-going` distinct findings were reported.
    pub fn run(&mut self) -> Result<FuzzStats, anyhow::Error> {
        log::info!(
            "Starting fuzz loop for {} iterations with {} initial corpus items",
            self.max_iterations,
            self.corpus.len()
        );
        let start_time = Instant::now();

        if let Flow::Stop = self.run_seeds()? {
            return Ok(self.finish(start_time));
        }

        let report_every = (self.max_iterations / 100).max(1);
        for iteration in 0..self.max_iterations {
            let base_input_id = self.scheduler.next(&self.corpus, &mut self.rng)?;
            let mutant = {
                let (base_input, _) = self
                    .corpus
                    .get(base_input_id)
                    .ok_or(CorpusError::InputNotFound(base_input_id))?;
                let corpus: &dyn Corpus<Vec<u8>> = &self.corpus;
                self.mutator
                    .mutate(Some(base_input), &mut self.rng, Some(corpus))?
            };

            let (flow, is_interesting, is_solution) = self.evaluate(mutant)?;
            self.scheduler
                .report_feedback(base_input_id, is_interesting, is_solution);
            if let Flow::Stop = flow {
                break;
            }

            if iteration > 0 && iteration % report_every == 0 {
                let elapsed = start_time.elapsed().as_secs_f32();
                let exec_per_sec = if elapsed > 0.0 {
                    self.stats.executions as f32 / elapsed
                } else {
                    0.0
                };
                log::info!(
                    "Iter: {}/{}, Corpus: {}, Findings: {}, Execs/sec: {:.2}",
                    iteration,
                    self.max_iterations,
                    self.corpus.len(),
                    self.stats.findings,
                    exec_per_sec
                );
            }
        }

        Ok(self.finish(start_time))
    }

    fn run_seeds(&mut self) -> Result<Flow, anyhow::Error> {
        let seeds: Vec<Vec<u8>> = (0..self.corpus.len())
            .filter_map(|id| self.corpus.get(id).map(|(input, _)| input.clone()))
            .collect();
        for seed in seeds {
            if let (Flow::Stop, _, _) = self.evaluate(seed)? {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    /// Executes `input` and feeds the outcome to feedback and the oracle.
    ///
    /// Returns whether to keep fuzzing, whether the input was added to the
    /// corpus and whether it produced a finding.
    fn evaluate(&mut self, input: Vec<u8>) -> Result<(Flow, bool, bool), anyhow::Error> {
        let status = {
            let mut observers: [&mut dyn Observer; 1] = [&mut self.observer];
            self.executor.execute_sync(&input, &mut observers)
        };
        self.stats.executions += 1;

        if let ExecutionStatus::ObserverError(msg) = &status {
            log::warn!("Observer failed, discarding execution: {msg}");
            return Ok((Flow::Continue, false, false));
        }

        let mut observers_data: ObserversData = HashMap::new();
        observers_data.insert(self.observer.name(), self.observer.serialize_data());

        let is_interesting = !status.is_bug()
            && self
                .feedback
                .is_interesting(&input, &observers_data, &self.corpus)?;
        if is_interesting {
            self.feedback
                .report_interesting(input.clone(), &observers_data, &mut self.corpus)?;
        }

        match self.oracle.examine(&input, &status) {
            Some(report) => Ok((self.handle_bug(report)?, is_interesting, true)),
            None => Ok((Flow::Continue, is_interesting, false)),
        }
    }

    fn handle_bug(&mut self, report: BugReport<Vec<u8>>) -> Result<Flow, anyhow::Error> {
        if self.dedup && !self.known_tokens.insert(report.dedup_token) {
            self.stats.skipped_findings += 1;
            log::debug!(
                "Skipping known finding {:016x}: {}",
                report.dedup_token,
                report.description
            );
            return Ok(Flow::Continue);
        }
        self.stats.findings += 1;

        log::error!(
            "{} found after {} executions: {}",
            report.kind,
            self.stats.executions,
            report.description
        );
        log::info!("Input: {:?}", report.input.as_text());
        if self.dedup {
            println!("DEDUP_TOKEN: {:016x}", report.dedup_token);
        }
        if let Some(dir) = &self.artifact_dir {
            fs::create_dir_all(dir)?;
            let path = dir.join(format!("crash-{}", report.input_hash));
            fs::write(&path, &report.input)?;
            log::info!("Crashing input written to {path:?}");
        }

        if self.stats.findings >= self.keep_going {
            self.stats.stopped_early = true;
            return Ok(Flow::Stop);
        }
        Ok(Flow::Continue)
    }

    fn finish(&mut self, start_time: Instant) -> FuzzStats {
        self.stats.corpus_len = self.corpus.len();
        log::info!(
            "Fuzz loop finished in {:.2?}. Executions: {}, Corpus Size: {}, Findings: {}, Skipped: {}",
            start_time.elapsed(),
            self.stats.executions,
            self.stats.corpus_len,
            self.stats.findings,
            self.stats.skipped_findings
        );
        self.stats.clone()
    }
}
