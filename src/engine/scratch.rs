//! Per-invocation matching bookkeeping.

use crate::types::Schedule;

/// Round-scratch state owned by one scheduler and reset by its `run`.
///
/// `input_matched[i]` is the output paired with input `i` so far in this
/// slot, `output_matched[k]` the input paired with output `k`, and `check[k]`
/// the candidate input an output granted (or buffered) in the current round.
#[derive(Debug, Clone)]
pub struct MatchScratch {
    pub input_matched: Vec<Option<usize>>,
    pub output_matched: Vec<Option<usize>>,
    pub check: Vec<Option<usize>>,
}

impl MatchScratch {
    pub fn new(ports: usize) -> Self {
        Self {
            input_matched: vec![None; ports],
            output_matched: vec![None; ports],
            check: vec![None; ports],
        }
    }

    /// Mark every port unmatched.
    pub fn reset(&mut self) {
        self.input_matched.fill(None);
        self.output_matched.fill(None);
        self.check.fill(None);
    }

    #[inline]
    pub fn input_free(&self, i: usize) -> bool {
        self.input_matched[i].is_none()
    }

    #[inline]
    pub fn output_free(&self, k: usize) -> bool {
        self.output_matched[k].is_none()
    }

    /// Record the pair `(i, k)` in both the scratch and the schedule.
    #[inline]
    pub fn pair(&mut self, schedule: &mut Schedule, i: usize, k: usize) {
        self.input_matched[i] = Some(k);
        self.output_matched[k] = Some(i);
        schedule.assign(i, k);
    }

    /// Drop whatever input currently holds output `k`.
    ///
    /// # Returns
    ///
    /// The evicted input, if `k` was matched.
    pub fn evict_output(&mut self, schedule: &mut Schedule, k: usize) -> Option<usize> {
        let previous = self.output_matched[k].take()?;
        debug_assert_eq!(schedule.get(previous), Some(k));
        self.input_matched[previous] = None;
        schedule.unassign(previous);
        Some(previous)
    }

    /// Rebuild the scratch from an existing schedule.
    pub fn load(&mut self, schedule: &Schedule) {
        self.reset();
        for (i, k) in schedule.pairs() {
            self.input_matched[i] = Some(k);
            self.output_matched[k] = Some(i);
        }
    }
}
