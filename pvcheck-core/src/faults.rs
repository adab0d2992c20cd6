//! Per-pass fault accumulator.
//!
//! Extraction performs many independent field reads. Each failed read is
//! pushed here instead of aborting, and the poll loop drains the set once per
//! pass. The first fault recorded is the representative one; every fault
//! stays available through [`FaultSet::iter`].

use tracing::debug;

use crate::error::ExtractError;

/// Faults collected during a single extraction pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FaultSet {
    faults: Vec<ExtractError>,
}

impl FaultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fault: ExtractError) {
        debug!(fault = %fault, "extraction fault");
        self.faults.push(fault);
    }

    pub fn len(&self) -> usize {
        self.faults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractError> {
        self.faults.iter()
    }

    /// Drain the set, returning the oldest fault as the pass's error.
    ///
    /// Faults after the first are only logged at debug level.
    pub fn drain(&mut self) -> Option<ExtractError> {
        let mut faults = std::mem::take(&mut self.faults).into_iter();
        let first = faults.next()?;
        for (n, rest) in faults.enumerate() {
            debug!(index = n + 1, fault = %rest, "discarding additional fault");
        }
        Some(first)
    }

    pub fn into_vec(self) -> Vec<ExtractError> {
        self.faults
    }
}

impl Extend<ExtractError> for FaultSet {
    fn extend<T: IntoIterator<Item = ExtractError>>(&mut self, iter: T) {
        for fault in iter {
            self.push(fault);
        }
    }
}
