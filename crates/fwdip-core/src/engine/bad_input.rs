//! Sticky set of known-bad hardware addresses
//!
//! Used only to report each unparseable or unmatched hardware address once
//! per process lifetime. It never influences what gets reconciled: a bad
//! interface is skipped every cycle whether or not it is in the set.

use std::collections::HashSet;

/// Hardware address strings already reported as bad
#[derive(Debug, Clone, Default)]
pub struct BadInputSet {
    seen: HashSet<String>,
}

impl BadInputSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `raw`; returns true only the first time it is seen
    pub fn first_report(&mut self, raw: &str) -> bool {
        if self.seen.contains(raw) {
            return false;
        }
        self.seen.insert(raw.to_string())
    }

    /// Whether `raw` has been reported
    pub fn contains(&self, raw: &str) -> bool {
        self.seen.contains(raw)
    }

    /// Number of distinct bad values seen
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been reported
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
