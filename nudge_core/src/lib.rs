//! In-process fuzzing engine behind the nudge facade.
//!
//! [`runtime::install`] publishes the engine's entry points so that
//! `nudge_api` hints land in the [`trace`] table and hook findings escalate to
//! the [`executor`]. [`Fuzzer`] ties the pieces into a fuzz loop.

pub mod config;
pub mod corpus;
pub mod executor;
pub mod feedback;
pub mod fuzzer;
pub mod hook_context;
pub mod input;
pub mod mutator;
pub mod observer;
pub mod oracle;
pub mod runtime;
pub mod scheduler;
pub mod trace;

pub use config::{ConfigError, NudgeConfig};
pub use corpus::{Corpus, CorpusError, InMemoryCorpus};
pub use executor::{ExecutionStatus, Executor, InProcessExecutor};
pub use feedback::{Feedback, FeedbackError, NewHintFeedback};
pub use fuzzer::{FuzzStats, Fuzzer};
pub use hook_context::FindingReport;
pub use input::Input;
pub use mutator::{FlipSingleByteMutator, HintGuidedMutator, Mutator};
pub use observer::{HintObserver, NoOpObserver, Observer};
pub use oracle::{BugKind, BugReport, CrashOracle, Oracle};
pub use runtime::{RuntimeError, install};
pub use scheduler::{RandomScheduler, Scheduler, SchedulerError};
pub use trace::{ComparisonHint, TraceTable};
