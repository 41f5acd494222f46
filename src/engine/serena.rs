//! Serena-style schedulers: a cheap candidate merged with the last schedule.
//!
//! Every slot:
//!
//! 1. A proposal policy builds a partial candidate matching.
//! 2. Leftover inputs and outputs are paired in index order
//!    ([`Schedule::fill_unmatched`]) so the candidate is full.
//! 3. [`CycleMerge`] combines the candidate with the previous slot's
//!    schedule, cycle by cycle.
//!
//! The result is always a full matching. [`Serena`] seeds the candidate from
//! this slot's arrivals; [`QpsSerena`] seeds it with one QPS pass.

use tracing::{debug, trace};

use crate::engine::merge::{CycleMerge, CycleRule, HeavierCycle, MergeStats};
use crate::engine::qps::QpsProposer;
use crate::engine::{assert_full_matching, check_ports, MatchScratch, ProposalPolicy, Scheduler};
use crate::error::ConfigError;
use crate::sampling::WeightPolicy;
use crate::types::{Schedule, VoqMatrix};

/// Arrival-driven candidate
pub type Serena = ProposalMerge<ArrivalGreedy>;

/// QPS-driven candidate
pub type QpsSerena = ProposalMerge<QpsProposer>;

/// Match each output to an input that had a packet arrive for it this slot.
///
/// When several inputs had arrivals for the same output, the one with the
/// longest VOQ toward it wins; equal lengths keep the lowest input.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrivalGreedy;

impl ProposalPolicy for ArrivalGreedy {
    fn propose(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule, scratch: &mut MatchScratch) {
        let n = voqs.port_count();
        scratch.check.fill(None);

        for i in 0..n {
            let Some(k) = voqs.arrival(i) else {
                continue;
            };
            if !scratch.input_free(i) || !scratch.output_free(k) {
                continue;
            }
            match scratch.check[k] {
                Some(best) if voqs.get(i, k) <= voqs.get(best, k) => {}
                _ => scratch.check[k] = Some(i),
            }
        }

        for k in 0..n {
            if let Some(i) = scratch.check[k] {
                scratch.pair(schedule, i, k);
            }
        }
    }
}

/// Composite of a proposal policy and the cycle-merge combinator.
#[derive(Debug, Clone)]
pub struct ProposalMerge<P, R = HeavierCycle> {
    name: &'static str,
    ports: usize,
    proposal: P,
    rule: R,
    merge: CycleMerge,
    scratch: MatchScratch,

    /// Fresh candidate, completed to a full matching
    candidate: Schedule,

    /// Schedule returned in the previous slot
    previous: Schedule,

    /// False until the first slot after construction or reset
    initialized: bool,

    last_stats: MergeStats,
}

impl<P, R> ProposalMerge<P, R>
where
    P: ProposalPolicy,
    R: CycleRule + Send,
{
    pub fn compose(
        name: &'static str,
        ports: usize,
        proposal: P,
        rule: R,
    ) -> Result<Self, ConfigError> {
        if ports == 0 {
            return Err(ConfigError::ZeroPorts);
        }
        debug!(name, ports, "built proposal-merge scheduler");
        Ok(Self {
            name,
            ports,
            proposal,
            rule,
            merge: CycleMerge::new(ports),
            scratch: MatchScratch::new(ports),
            candidate: Schedule::new(ports),
            previous: Schedule::identity(ports),
            initialized: false,
            last_stats: MergeStats::default(),
        })
    }

    /// Telemetry of the most recent merge
    pub fn last_stats(&self) -> MergeStats {
        self.last_stats
    }

    /// Cycle lengths of the most recent merge
    pub fn last_cycle_lengths(&self) -> &[usize] {
        self.merge.last_cycle_lengths()
    }

    /// Schedule that the next slot will be merged against
    pub fn previous(&self) -> &Schedule {
        &self.previous
    }
}

impl ProposalMerge<ArrivalGreedy> {
    pub fn new(ports: usize) -> Result<Self, ConfigError> {
        Self::compose("serena", ports, ArrivalGreedy, HeavierCycle)
    }
}

impl ProposalMerge<QpsProposer> {
    pub fn new(
        ports: usize,
        seed: u64,
        buffer_size: usize,
        policy: WeightPolicy,
    ) -> Result<Self, ConfigError> {
        let proposal = QpsProposer::new(ports, seed, buffer_size, policy)?;
        Self::compose("qps-serena", ports, proposal, HeavierCycle)
    }
}

impl<P, R> Scheduler for ProposalMerge<P, R>
where
    P: ProposalPolicy,
    R: CycleRule + Send,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn port_count(&self) -> usize {
        self.ports
    }

    /// On the first slot the caller's `schedule` becomes the previous
    /// schedule if it is a full matching; otherwise the identity is used.
    fn run(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        check_ports(self.name, self.ports, voqs, schedule);
        if !self.initialized {
            if schedule.is_full_matching() {
                self.previous.copy_from(schedule);
            } else {
                for i in 0..self.ports {
                    self.previous.assign(i, i);
                }
            }
            self.initialized = true;
        }

        self.scratch.reset();
        self.candidate.clear();
        self.proposal
            .propose(voqs, &mut self.candidate, &mut self.scratch);
        let proposed = self.candidate.matched_count();
        self.candidate.fill_unmatched();

        self.last_stats = self.merge.merge_with(
            &self.candidate,
            &self.previous,
            voqs,
            schedule,
            &mut self.rule,
        );
        self.previous.copy_from(schedule);

        assert_full_matching(self.name, schedule);
        trace!(
            name = self.name,
            proposed,
            cycles = self.last_stats.cycles,
            weight = schedule.weight(voqs),
            "merge slot"
        );
    }

    fn reset(&mut self) {
        self.initialized = false;
        self.proposal.reset();
        debug!(name = self.name, "merge history cleared");
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::merge::Ouroboros;

    #[test]
    fn test_arrival_greedy_longest_arrival_wins() {
        let mut voqs = VoqMatrix::from_rows(&[vec![1, 0, 0], vec![4, 0, 0], vec![0, 0, 2]]).unwrap();
        voqs.enqueue(0, 0);
        voqs.enqueue(1, 0);
        voqs.enqueue(2, 2);

        let mut scratch = MatchScratch::new(3);
        let mut s = Schedule::new(3);
        ArrivalGreedy.propose(&voqs, &mut s, &mut scratch);

        assert_eq!(s.as_slice(), &[None, Some(0), Some(2)]);
    }

    #[test]
    fn test_arrival_greedy_ties_keep_lowest_input() {
        let mut voqs = VoqMatrix::new(2);
        voqs.enqueue(0, 1);
        voqs.enqueue(1, 1);

        let mut scratch = MatchScratch::new(2);
        let mut s = Schedule::new(2);
        ArrivalGreedy.propose(&voqs, &mut s, &mut scratch);

        assert_eq!(s.as_slice(), &[Some(1), None]);
    }

    #[test]
    fn test_serena_is_always_full() {
        let mut voqs = VoqMatrix::new(4);
        let mut serena = Serena::new(4).unwrap();
        let mut s = Schedule::new(4);

        for slot in 0..20 {
            voqs.begin_slot();
            voqs.enqueue(slot % 4, (slot * 3) % 4);
            serena.run(&voqs, &mut s);
            assert!(s.is_full_matching());
            voqs.depart(&s);
        }
    }

    #[test]
    fn test_serena_never_loses_weight_against_previous() {
        let mut voqs = VoqMatrix::from_rows(&[vec![0, 9, 0], vec![0, 0, 9], vec![9, 0, 0]]).unwrap();
        let mut serena = Serena::new(3).unwrap();
        let mut s = Schedule::from_permutation(&[1, 2, 0]);

        // No arrivals: the candidate is the identity, which is lighter on
        // every cycle, so the caller's heavy schedule survives.
        voqs.begin_slot();
        serena.run(&voqs, &mut s);
        assert_eq!(s.as_slice(), &[Some(1), Some(2), Some(0)]);
        assert_eq!(serena.last_stats().cycles, 1);
        assert_eq!(serena.last_cycle_lengths(), &[3]);
    }

    #[test]
    fn test_serena_ignores_partial_initial_schedule() {
        let voqs = VoqMatrix::new(3);
        let mut serena = Serena::new(3).unwrap();
        let mut s = Schedule::from_slice(&[Some(2), None, None]);

        serena.run(&voqs, &mut s);
        assert_eq!(s, Schedule::identity(3));
    }

    #[test]
    fn test_serena_reset_adopts_new_initial_schedule() {
        let voqs = VoqMatrix::new(2);
        let mut serena = Serena::new(2).unwrap();
        let mut s = Schedule::identity(2);
        serena.run(&voqs, &mut s);

        serena.reset();
        let mut s = Schedule::from_permutation(&[1, 0]);
        serena.run(&voqs, &mut s);
        // Tie on the only cycle keeps the fresh candidate (identity).
        assert_eq!(s, Schedule::identity(2));
        assert_eq!(serena.previous(), &Schedule::identity(2));
    }

    #[test]
    fn test_qps_serena_full_and_dominates_previous() {
        let voqs = VoqMatrix::from_rows(&[
            vec![3, 0, 0, 8],
            vec![0, 6, 1, 0],
            vec![2, 0, 5, 0],
            vec![0, 4, 0, 1],
        ])
        .unwrap();
        let mut sched = QpsSerena::new(4, 21, 5, WeightPolicy::Linear).unwrap();
        let mut s = Schedule::new(4);

        for _ in 0..100 {
            let before = sched.previous().weight(&voqs);
            sched.run(&voqs, &mut s);
            assert!(s.is_full_matching());
            assert!(s.weight(&voqs) >= before);
        }
    }

    #[test]
    fn test_qps_serena_with_ouroboros_rule() {
        let voqs = VoqMatrix::from_rows(&[vec![5, 0], vec![0, 3]]).unwrap();
        let proposal = QpsProposer::new(2, 3, 5, WeightPolicy::Linear).unwrap();
        let rule = Ouroboros::new(vec![false, true], |first: i128, second: i128| second - first);
        let mut sched = ProposalMerge::compose("qps-serena-ouroboros", 2, proposal, rule).unwrap();
        let mut s = Schedule::from_permutation(&[1, 0]);

        sched.run(&voqs, &mut s);
        assert!(s.is_full_matching());
        assert_eq!(sched.name(), "qps-serena-ouroboros");
    }
}
