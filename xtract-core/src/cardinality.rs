//! Cardinality resolution: reconciling a relation template's declared
//! `Cardinality` against the actual number of values a reference produced.
//!
//! See SPEC_FULL.md §4.5 and the §9 design note on the three-state running
//! count. The first reference seen for a `Many` slot fixes the "anchor"
//! length for the rest of that relation; anything that disagrees afterwards
//! is flagged per-value rather than discarding the whole relation.

/// Tracks the expected result-list length across a relation's references as
/// each one is resolved, without assuming the first-seen length is correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningCount {
    /// No `Many`-cardinality reference has been seen yet.
    Unset,
    /// A `Many` reference fixed the expected length at `usize`.
    Set(usize),
    /// A later `Many` reference disagreed with the anchor length; the
    /// anchor itself (first field) is retained so alignment can continue,
    /// while `usize` (second field) is the length that was rejected.
    Mismatched(usize, usize),
}

impl RunningCount {
    pub fn new() -> Self {
        RunningCount::Unset
    }

    fn anchor(&self) -> Option<usize> {
        match self {
            RunningCount::Unset => None,
            RunningCount::Set(n) => Some(*n),
            RunningCount::Mismatched(anchor, _) => Some(*anchor),
        }
    }

    /// Folds in the length of a `Many`-cardinality reference's result list.
    /// Returns `true` if `len` agrees with the running anchor (or becomes
    /// the anchor); `false` if it disagrees, in which case the anchor is
    /// left unchanged so the caller can keep aligning the other references.
    pub fn observe(&mut self, len: usize) -> bool {
        match self.anchor() {
            None => {
                *self = RunningCount::Set(len);
                true
            }
            Some(anchor) if anchor == len => true,
            Some(anchor) => {
                *self = RunningCount::Mismatched(anchor, len);
                false
            }
        }
    }

    /// The length to use when materializing relations: the anchor if any
    /// `Many` reference was seen, else 1 (an all-`One` relation template
    /// always produces exactly one relation).
    pub fn resolved_len(&self) -> usize {
        self.anchor().unwrap_or(1)
    }
}

impl Default for RunningCount {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_resolves_to_one() {
        assert_eq!(RunningCount::new().resolved_len(), 1);
    }

    #[test]
    fn first_observation_becomes_the_anchor() {
        let mut rc = RunningCount::new();
        assert!(rc.observe(3));
        assert_eq!(rc.resolved_len(), 3);
    }

    #[test]
    fn agreeing_observation_stays_set() {
        let mut rc = RunningCount::new();
        rc.observe(3);
        assert!(rc.observe(3));
        assert_eq!(rc, RunningCount::Set(3));
    }

    #[test]
    fn disagreeing_observation_retains_anchor_but_flags_mismatch() {
        let mut rc = RunningCount::new();
        rc.observe(3);
        assert!(!rc.observe(5));
        assert_eq!(rc, RunningCount::Mismatched(3, 5));
        assert_eq!(rc.resolved_len(), 3);
    }
}
