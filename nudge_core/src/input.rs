use std::borrow::Cow;

/// A fuzz input as seen by the engine.
///
/// Hints are expressed in strings, so inputs also expose a lossy UTF-8 view
/// that hint-guided mutation matches against.
pub trait Input: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// The raw bytes handed to the harness.
    fn as_bytes(&self) -> &[u8];

    fn len(&self) -> usize {
        self.as_bytes().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

impl Input for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }
}
