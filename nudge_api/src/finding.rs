use std::error::Error;
use thiserror::Error;

/// A problem a hook discovered and wants the fuzzer to report.
///
/// A finding carries a message and an optional cause chain, which the engine
/// renders when it reports the crash.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Finding {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl Finding {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a finding caused by `source`.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Iterates over this finding followed by every error in its cause chain.
    pub fn chain(&self) -> impl Iterator<Item = &(dyn Error + 'static)> {
        std::iter::successors(Some(self as &(dyn Error + 'static)), |&err| err.source())
    }
}
