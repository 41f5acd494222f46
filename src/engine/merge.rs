//! Cycle-merge: combine two full matchings cycle by cycle.
//!
//! The union of two permutations `S1` and `S2` decomposes into disjoint
//! alternating cycles `i -> S1[i] -> S2⁻¹(S1[i]) -> ...`. Each cycle can take
//! either matching's edges independently of the others, and the result is
//! still a full matching. [`CycleMerge`] walks every cycle once, so a merge
//! is O(N) with no graph construction.
//!
//! The per-cycle decision is a [`CycleRule`]:
//!
//! - [`HeavierCycle`] keeps `S1` unless `S2`'s edges on the cycle are
//!   strictly heavier.
//! - [`Ouroboros`] overrides that sign rule for selected cycle lengths with
//!   an injected decision function.

use tracing::trace;

use crate::types::{Schedule, VoqMatrix};

/// Which matching a cycle takes its edges from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleChoice {
    /// The fresh candidate (`S1`)
    First,
    /// The previous schedule (`S2`)
    Second,
}

/// One cycle of the `S1 ∪ S2` decomposition, as seen by a [`CycleRule`].
#[derive(Debug, Clone, Copy)]
pub struct CycleView<'a> {
    /// Smallest input on the cycle; the walk starts here
    pub leader: usize,

    /// Number of inputs on the cycle
    pub len: usize,

    /// `Σ Q(S1 edges) − Σ Q(S2 edges)` over the cycle, widened so that
    /// `u64` queue lengths cannot wrap
    pub delta: i128,

    first: &'a [usize],
    second_inverse: &'a [usize],
    voqs: &'a VoqMatrix,
}

impl<'a> CycleView<'a> {
    /// Decision of the plain weight-sign rule.
    #[inline]
    pub fn sign_choice(&self) -> CycleChoice {
        if self.delta < 0 {
            CycleChoice::Second
        } else {
            CycleChoice::First
        }
    }

    /// Walk `steps` alternating steps from the leader.
    ///
    /// Every step adds the `S1` edge leaving the current input to the first
    /// sum and the `S2` edge entering the same output to the second, then
    /// moves to that `S2` input. Steps beyond the cycle length wrap around.
    ///
    /// # Returns
    ///
    /// `(first_weight, second_weight)`
    pub fn walk_weights(&self, steps: usize) -> (i128, i128) {
        let mut first_weight = 0i128;
        let mut second_weight = 0i128;
        let mut cur = self.leader;
        for _ in 0..steps {
            let k = self.first[cur];
            let prev = self.second_inverse[k];
            first_weight += i128::from(self.voqs.get(cur, k));
            second_weight += i128::from(self.voqs.get(prev, k));
            cur = prev;
        }
        (first_weight, second_weight)
    }

    /// Number of ports in the merged matchings
    #[inline]
    pub fn port_count(&self) -> usize {
        self.first.len()
    }
}

/// Per-cycle decision strategy passed to [`CycleMerge::merge_with`].
pub trait CycleRule {
    fn choose(&mut self, view: &CycleView<'_>) -> CycleChoice;

    /// Whether cycles of this length bypass the weight-sign rule.
    fn overrides(&self, _len: usize) -> bool {
        false
    }
}

/// Keep the heavier side of every cycle, ties to the fresh candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeavierCycle;

impl CycleRule for HeavierCycle {
    #[inline]
    fn choose(&mut self, view: &CycleView<'_>) -> CycleChoice {
        view.sign_choice()
    }
}

/// Per-cycle-length override table.
///
/// `table[len - 1]` marks the cycle lengths whose decision is taken away from
/// the sign rule. For those cycles the rule walks `N` steps from the leader
/// (see [`CycleView::walk_weights`]) and keeps `S1` iff
/// `decide(first_weight, second_weight) > 0`. Unmarked lengths, and lengths
/// past the end of the table, use the sign rule.
#[derive(Debug, Clone)]
pub struct Ouroboros<F> {
    table: Vec<bool>,
    decide: F,
}

impl<F> Ouroboros<F>
where
    F: FnMut(i128, i128) -> i128,
{
    pub fn new(table: Vec<bool>, decide: F) -> Self {
        Self { table, decide }
    }
}

impl<F> CycleRule for Ouroboros<F>
where
    F: FnMut(i128, i128) -> i128,
{
    fn choose(&mut self, view: &CycleView<'_>) -> CycleChoice {
        if !self.overrides(view.len) {
            return view.sign_choice();
        }
        let (first_weight, second_weight) = view.walk_weights(view.port_count());
        if (self.decide)(first_weight, second_weight) > 0 {
            CycleChoice::First
        } else {
            CycleChoice::Second
        }
    }

    fn overrides(&self, len: usize) -> bool {
        len > 0 && self.table.get(len - 1).copied().unwrap_or(false)
    }
}

/// Telemetry of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Cycles in the decomposition
    pub cycles: usize,

    /// Cycles decided by an override instead of the sign rule
    pub overridden: usize,

    /// Cycles whose chosen side differs from the sign rule
    pub disagreements: usize,
}

/// Reusable cycle-merge buffers for one port count.
///
/// ## Example
///
/// ```
/// use voq_sched::engine::CycleMerge;
/// use voq_sched::types::{Schedule, VoqMatrix};
///
/// let voqs = VoqMatrix::from_rows(&[vec![5, 0], vec![0, 3]]).unwrap();
/// let fresh = Schedule::from_permutation(&[0, 1]);
/// let previous = Schedule::from_permutation(&[1, 0]);
/// let mut out = Schedule::new(2);
///
/// let stats = CycleMerge::new(2).merge(&fresh, &previous, &voqs, &mut out);
///
/// assert_eq!(out.as_slice(), &[Some(0), Some(1)]);
/// assert_eq!(stats.cycles, 1);
/// ```
#[derive(Debug, Clone)]
pub struct CycleMerge {
    first: Vec<usize>,
    second: Vec<usize>,
    second_inverse: Vec<usize>,
    visited: Vec<bool>,
    members: Vec<usize>,
    cycle_lengths: Vec<usize>,
}

impl CycleMerge {
    pub fn new(ports: usize) -> Self {
        Self {
            first: vec![0; ports],
            second: vec![0; ports],
            second_inverse: vec![0; ports],
            visited: vec![false; ports],
            members: Vec::with_capacity(ports),
            cycle_lengths: Vec::with_capacity(ports),
        }
    }

    /// Cycle lengths of the last merge, in discovery order
    pub fn last_cycle_lengths(&self) -> &[usize] {
        &self.cycle_lengths
    }

    /// Merge with the weight-sign rule.
    pub fn merge(
        &mut self,
        first: &Schedule,
        second: &Schedule,
        voqs: &VoqMatrix,
        out: &mut Schedule,
    ) -> MergeStats {
        self.merge_with(first, second, voqs, out, &mut HeavierCycle)
    }

    /// Merge `first` (fresh) and `second` (previous) into `out`.
    ///
    /// Unvisited inputs are taken as cycle starts in index order, so every
    /// cycle starts at its smallest input.
    ///
    /// # Panics
    ///
    /// If either input is not a full matching or any port count differs.
    pub fn merge_with<R: CycleRule + ?Sized>(
        &mut self,
        first: &Schedule,
        second: &Schedule,
        voqs: &VoqMatrix,
        out: &mut Schedule,
        rule: &mut R,
    ) -> MergeStats {
        let n = self.first.len();
        assert!(
            first.port_count() == n
                && second.port_count() == n
                && out.port_count() == n
                && voqs.port_count() == n,
            "cycle-merge: port count mismatch"
        );
        assert!(
            first.is_full_matching(),
            "cycle-merge: first schedule is not a full matching: {:?}",
            first.as_slice()
        );
        assert!(
            second.is_full_matching(),
            "cycle-merge: second schedule is not a full matching: {:?}",
            second.as_slice()
        );

        for (i, k) in first.pairs() {
            self.first[i] = k;
        }
        for (i, k) in second.pairs() {
            self.second[i] = k;
        }
        second.write_inverse(&mut self.second_inverse);
        self.visited.fill(false);
        self.cycle_lengths.clear();

        let mut stats = MergeStats::default();
        for start in 0..n {
            if self.visited[start] {
                continue;
            }

            self.members.clear();
            let mut delta = 0i128;
            let mut cur = start;
            loop {
                self.visited[cur] = true;
                self.members.push(cur);
                let k = self.first[cur];
                let prev = self.second_inverse[k];
                delta += i128::from(voqs.get(cur, k)) - i128::from(voqs.get(prev, k));
                cur = prev;
                if cur == start {
                    break;
                }
            }

            let view = CycleView {
                leader: start,
                len: self.members.len(),
                delta,
                first: &self.first,
                second_inverse: &self.second_inverse,
                voqs,
            };
            let choice = rule.choose(&view);

            stats.cycles += 1;
            if rule.overrides(view.len) {
                stats.overridden += 1;
            }
            if choice != view.sign_choice() {
                stats.disagreements += 1;
            }
            self.cycle_lengths.push(view.len);

            let source = match choice {
                CycleChoice::First => &self.first,
                CycleChoice::Second => &self.second,
            };
            for &i in &self.members {
                out.assign(i, source[i]);
            }
        }

        trace!(
            cycles = stats.cycles,
            overridden = stats.overridden,
            disagreements = stats.disagreements,
            "cycle-merge"
        );
        stats
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn voqs_2x2() -> VoqMatrix {
        VoqMatrix::from_rows(&[vec![5, 0], vec![0, 3]]).unwrap()
    }

    #[test]
    fn test_merge_keeps_heavier_first() {
        let mut merge = CycleMerge::new(2);
        let mut out = Schedule::new(2);

        let stats = merge.merge(
            &Schedule::from_permutation(&[0, 1]),
            &Schedule::from_permutation(&[1, 0]),
            &voqs_2x2(),
            &mut out,
        );

        assert_eq!(out.as_slice(), &[Some(0), Some(1)]);
        assert_eq!(merge.last_cycle_lengths(), &[2]);
        assert_eq!(
            stats,
            MergeStats {
                cycles: 1,
                overridden: 0,
                disagreements: 0
            }
        );
    }

    #[test]
    fn test_merge_switches_to_heavier_second() {
        let mut merge = CycleMerge::new(2);
        let mut out = Schedule::new(2);

        merge.merge(
            &Schedule::from_permutation(&[1, 0]),
            &Schedule::from_permutation(&[0, 1]),
            &voqs_2x2(),
            &mut out,
        );
        assert_eq!(out.as_slice(), &[Some(0), Some(1)]);
    }

    #[test]
    fn test_merge_tie_keeps_first() {
        let voqs = VoqMatrix::from_rows(&[vec![2, 2], vec![2, 2]]).unwrap();
        let mut out = Schedule::new(2);

        CycleMerge::new(2).merge(
            &Schedule::from_permutation(&[1, 0]),
            &Schedule::from_permutation(&[0, 1]),
            &voqs,
            &mut out,
        );
        assert_eq!(out.as_slice(), &[Some(1), Some(0)]);
    }

    #[test]
    fn test_merge_handles_queue_lengths_past_i64() {
        // Q[0][1] + Q[1][0] overflows i64; the previous schedule is far heavier.
        let voqs = VoqMatrix::from_rows(&[vec![1, u64::MAX], vec![u64::MAX, 1]]).unwrap();
        let mut out = Schedule::new(2);

        let stats = CycleMerge::new(2).merge(
            &Schedule::identity(2),
            &Schedule::from_permutation(&[1, 0]),
            &voqs,
            &mut out,
        );
        assert_eq!(out.as_slice(), &[Some(1), Some(0)]);
        assert_eq!(stats.disagreements, 0);

        let mut rule = Ouroboros::new(vec![false, true], |first: i128, second: i128| first - second);
        CycleMerge::new(2).merge_with(
            &Schedule::identity(2),
            &Schedule::from_permutation(&[1, 0]),
            &voqs,
            &mut out,
            &mut rule,
        );
        assert_eq!(out.as_slice(), &[Some(1), Some(0)]);
    }

    #[test]
    fn test_merge_decides_cycles_independently() {
        // Cycles {0, 1} and {2, 3}: S1 is heavier on the first, S2 on the second.
        let voqs = VoqMatrix::from_rows(&[
            vec![9, 0, 0, 0],
            vec![0, 9, 0, 0],
            vec![0, 0, 0, 4],
            vec![0, 0, 4, 0],
        ])
        .unwrap();
        let first = Schedule::from_permutation(&[0, 1, 2, 3]);
        let second = Schedule::from_permutation(&[1, 0, 3, 2]);
        let mut out = Schedule::new(4);

        let stats = CycleMerge::new(4).merge(&first, &second, &voqs, &mut out);

        assert_eq!(out.as_slice(), &[Some(0), Some(1), Some(3), Some(2)]);
        assert_eq!(stats.cycles, 2);
        assert!(out.weight(&voqs) >= first.weight(&voqs));
        assert!(out.weight(&voqs) >= second.weight(&voqs));
    }

    #[test]
    fn test_merge_identical_inputs_give_fixed_points() {
        let s = Schedule::from_permutation(&[2, 0, 1]);
        let voqs = VoqMatrix::new(3);
        let mut merge = CycleMerge::new(3);
        let mut out = Schedule::new(3);

        let stats = merge.merge(&s, &s, &voqs, &mut out);
        assert_eq!(out, s);
        assert_eq!(stats.cycles, 3);
        assert_eq!(merge.last_cycle_lengths(), &[1, 1, 1]);
    }

    #[test]
    fn test_ouroboros_overrides_marked_length() {
        // Length-2 cycles are overridden with decide = second - first, which
        // flips the sign rule's choice.
        let mut rule = Ouroboros::new(vec![false, true], |first: i128, second: i128| second - first);
        let mut out = Schedule::new(2);

        let stats = CycleMerge::new(2).merge_with(
            &Schedule::from_permutation(&[0, 1]),
            &Schedule::from_permutation(&[1, 0]),
            &voqs_2x2(),
            &mut out,
            &mut rule,
        );

        assert_eq!(out.as_slice(), &[Some(1), Some(0)]);
        assert_eq!(
            stats,
            MergeStats {
                cycles: 1,
                overridden: 1,
                disagreements: 1
            }
        );
    }

    #[test]
    fn test_ouroboros_unmarked_lengths_use_sign_rule() {
        let mut rule = Ouroboros::new(vec![true], |_: i128, _: i128| 0i128);
        assert!(rule.overrides(1));
        assert!(!rule.overrides(2));
        assert!(!rule.overrides(5));

        let mut out = Schedule::new(2);
        let stats = CycleMerge::new(2).merge_with(
            &Schedule::from_permutation(&[0, 1]),
            &Schedule::from_permutation(&[1, 0]),
            &voqs_2x2(),
            &mut out,
            &mut rule,
        );
        assert_eq!(out.as_slice(), &[Some(0), Some(1)]);
        assert_eq!(stats.overridden, 0);
    }

    #[test]
    fn test_walk_weights_wraps_around_cycle() {
        let voqs = voqs_2x2();
        let first = [0, 1];
        let second_inverse = [1, 0];
        let view = CycleView {
            leader: 0,
            len: 2,
            delta: 8,
            first: &first,
            second_inverse: &second_inverse,
            voqs: &voqs,
        };
        assert_eq!(view.walk_weights(2), (8, 0));
        assert_eq!(view.walk_weights(4), (16, 0));
    }

    #[test]
    #[should_panic(expected = "not a full matching")]
    fn test_merge_rejects_partial_input() {
        let mut out = Schedule::new(2);
        CycleMerge::new(2).merge(
            &Schedule::from_slice(&[Some(0), None]),
            &Schedule::identity(2),
            &voqs_2x2(),
            &mut out,
        );
    }
}
