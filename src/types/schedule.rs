//! Input-to-output assignments produced once per slot.
//!
//! A [`Schedule`] maps each input port to at most one output port. The one
//! invariant every scheduler must uphold on return is that no output appears
//! twice (a *partial matching*). Schedulers built on the cycle-merge
//! combinator additionally return a *full matching*: every input matched and
//! every output used exactly once.

use sha2::{Digest, Sha256};

use crate::types::VoqMatrix;

/// Encoding of an unmatched input when hashing a schedule
const UNMATCHED_TAG: u64 = u64::MAX;

/// Assignment of inputs to outputs for one time slot.
///
/// ## Example
///
/// ```
/// use voq_sched::types::Schedule;
///
/// let mut s = Schedule::new(3);
/// s.assign(0, 2);
/// s.assign(2, 0);
///
/// assert!(s.is_partial_matching());
/// assert!(!s.is_full_matching());
///
/// s.fill_unmatched();
/// assert_eq!(s.as_slice(), &[Some(2), Some(1), Some(0)]);
/// assert!(s.is_full_matching());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schedule {
    /// `targets[i]` is the output assigned to input `i`
    targets: Vec<Option<usize>>,
}

impl Schedule {
    /// Create a schedule with every input unmatched
    pub fn new(ports: usize) -> Self {
        Self {
            targets: vec![None; ports],
        }
    }

    /// Create the identity matching `i -> i`
    pub fn identity(ports: usize) -> Self {
        Self {
            targets: (0..ports).map(Some).collect(),
        }
    }

    /// Create a schedule from explicit targets
    pub fn from_slice(targets: &[Option<usize>]) -> Self {
        Self {
            targets: targets.to_vec(),
        }
    }

    /// Create a full matching from a permutation
    pub fn from_permutation(perm: &[usize]) -> Self {
        Self {
            targets: perm.iter().copied().map(Some).collect(),
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Number of ports covered by this schedule
    #[inline]
    pub fn port_count(&self) -> usize {
        self.targets.len()
    }

    /// Output assigned to input `i`
    #[inline]
    pub fn get(&self, i: usize) -> Option<usize> {
        self.targets[i]
    }

    /// Match input `i` to output `k`
    #[inline]
    pub fn assign(&mut self, i: usize, k: usize) {
        self.targets[i] = Some(k);
    }

    /// Mark input `i` unmatched
    #[inline]
    pub fn unassign(&mut self, i: usize) {
        self.targets[i] = None;
    }

    /// Mark every input unmatched
    pub fn clear(&mut self) {
        self.targets.fill(None);
    }

    /// Overwrite this schedule with `other` without reallocating
    pub fn copy_from(&mut self, other: &Schedule) {
        self.targets.copy_from_slice(&other.targets);
    }

    /// Raw targets, indexed by input
    #[inline]
    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.targets
    }

    /// Iterate over matched `(input, output)` pairs
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.targets
            .iter()
            .enumerate()
            .filter_map(|(i, target)| target.map(|k| (i, k)))
    }

    /// Number of matched inputs
    pub fn matched_count(&self) -> usize {
        self.targets.iter().filter(|t| t.is_some()).count()
    }

    /// Sum of queue lengths over matched pairs
    pub fn weight(&self, voqs: &VoqMatrix) -> u64 {
        self.pairs().map(|(i, k)| voqs.get(i, k)).sum()
    }

    // ========================================================================
    // Matching checks
    // ========================================================================

    /// Check that no output is used twice and every target is in range.
    pub fn is_partial_matching(&self) -> bool {
        let n = self.targets.len();
        let mut used = vec![false; n];
        for &k in self.targets.iter().flatten() {
            if k >= n || used[k] {
                return false;
            }
            used[k] = true;
        }
        true
    }

    /// Check that the schedule is a permutation of the outputs.
    pub fn is_full_matching(&self) -> bool {
        self.targets.iter().all(Option::is_some) && self.is_partial_matching()
    }

    /// Write the inverse permutation into `inverse` (`inverse[k]` is the
    /// input matched to output `k`).
    ///
    /// # Panics
    ///
    /// If the schedule is not a full matching or the lengths differ.
    pub fn write_inverse(&self, inverse: &mut [usize]) {
        assert!(
            self.is_full_matching() && inverse.len() == self.targets.len(),
            "inverse needs a full matching of matching size: {:?}",
            self.targets
        );
        for (i, k) in self.pairs() {
            inverse[k] = i;
        }
    }

    /// Complete a partial matching into a full one.
    ///
    /// Unmatched inputs, in index order, are paired with unmatched outputs,
    /// in index order.
    ///
    /// # Panics
    ///
    /// If the schedule is not a partial matching.
    pub fn fill_unmatched(&mut self) {
        assert!(
            self.is_partial_matching(),
            "cannot complete an invalid matching: {:?}",
            self.targets
        );

        let n = self.targets.len();
        let mut used = vec![false; n];
        for &k in self.targets.iter().flatten() {
            used[k] = true;
        }

        let mut free_outputs = (0..n).filter(|&k| !used[k]);
        for target in self.targets.iter_mut().filter(|t| t.is_none()) {
            *target = free_outputs.next();
        }
    }

    /// SHA-256 over the targets, unmatched inputs encoded as `u64::MAX`.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for target in &self.targets {
            let word = target.map_or(UNMATCHED_TAG, |k| k as u64);
            hasher.update(word.to_le_bytes());
        }
        let result = hasher.finalize();

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
