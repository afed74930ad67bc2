use std::fmt;

use rustc_hash::FxHashSet;

/// Insertion-ordered set of error messages collected over one describe batch.
///
/// Display follows the Kubernetes aggregate convention: a single message prints
/// as-is, several print as `[a, b]`.
#[derive(Debug, Clone, Default)]
pub struct AggregatedError {
    messages: Vec<String>,
    seen: FxHashSet<String>,
}

impl AggregatedError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message`; returns false when the same text was already recorded.
    pub fn insert(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.seen.contains(&message) {
            return false;
        }
        self.seen.insert(message.clone());
        self.messages.push(message);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), AggregatedError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl PartialEq for AggregatedError {
    fn eq(&self, other: &Self) -> bool {
        self.messages == other.messages
    }
}

impl Eq for AggregatedError {}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.messages.as_slice() {
            [] => Ok(()),
            [one] => f.write_str(one),
            many => write!(f, "[{}]", many.join(", ")),
        }
    }
}

impl std::error::Error for AggregatedError {}
