//! QPS: queue-proportional sampling.
//!
//! ## Pass structure
//!
//! 1. **Propose**: free inputs, visited in a uniformly random order, each
//!    sample one output with probability proportional to `f(Q[i][k])`.
//! 2. **Accept**: each free output keeps, among the first `B` proposals it
//!    receives, the one with the longest VOQ, and accepts it.
//!
//! With [`WeightPolicy::Linear`] this is plain QPS; any other policy gives
//! FQPS. The running best-of-buffer keeps the accept step O(1) per proposal.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::engine::{
    assert_matching, check_ports, default_rounds, MatchScratch, ProposalPolicy, Scheduler,
};
use crate::error::ConfigError;
use crate::sampling::{random_permutation, WeightPolicy, WeightedSampler};
use crate::types::{Schedule, VoqMatrix};

/// Proposals each output considers per pass unless configured otherwise
pub const DEFAULT_BUFFER_SIZE: usize = 5;

/// Shared constructor checks for the proposal family.
pub(crate) fn validate_proposal(
    ports: usize,
    buffer_size: usize,
    policy: &WeightPolicy,
) -> Result<(), ConfigError> {
    if ports == 0 {
        return Err(ConfigError::ZeroPorts);
    }
    if buffer_size == 0 {
        return Err(ConfigError::ZeroBufferSize);
    }
    policy.validate()
}

/// One QPS proposal/accept pass.
#[derive(Debug, Clone)]
pub struct QpsProposer {
    buffer_size: usize,
    sampler: WeightedSampler,
    rng: ChaCha8Rng,
    order: Vec<usize>,

    /// Proposals received by each output in the current pass
    requests: Vec<usize>,
}

impl QpsProposer {
    pub fn new(
        ports: usize,
        seed: u64,
        buffer_size: usize,
        policy: WeightPolicy,
    ) -> Result<Self, ConfigError> {
        validate_proposal(ports, buffer_size, &policy)?;
        Ok(Self {
            buffer_size,
            sampler: WeightedSampler::new(policy),
            rng: ChaCha8Rng::seed_from_u64(seed),
            order: vec![0; ports],
            requests: vec![0; ports],
        })
    }

    pub fn policy(&self) -> WeightPolicy {
        self.sampler.policy()
    }
}

impl ProposalPolicy for QpsProposer {
    fn propose(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule, scratch: &mut MatchScratch) {
        self.requests.fill(0);
        scratch.check.fill(None);

        // Propose
        random_permutation(&mut self.order, &mut self.rng);
        for idx in 0..self.order.len() {
            let i = self.order[idx];
            if !scratch.input_free(i) {
                continue;
            }
            let Some(k) = self.sampler.sample(voqs.row(i), &mut self.rng) else {
                continue;
            };

            self.requests[k] += 1;
            if !scratch.output_free(k) {
                continue;
            }
            match scratch.check[k] {
                None => scratch.check[k] = Some(i),
                Some(prev) if self.requests[k] <= self.buffer_size => {
                    if voqs.get(i, k) > voqs.get(prev, k) {
                        scratch.check[k] = Some(i);
                    }
                }
                Some(_) => {}
            }
        }

        // Accept
        for k in 0..self.order.len() {
            if let Some(i) = scratch.check[k] {
                if scratch.input_free(i) {
                    scratch.pair(schedule, i, k);
                }
            }
        }
    }
}

/// Multi-pass QPS / FQPS scheduler.
///
/// ## Example
///
/// ```
/// use voq_sched::engine::{Qps, Scheduler};
/// use voq_sched::sampling::WeightPolicy;
/// use voq_sched::types::{Schedule, VoqMatrix};
///
/// let voqs = VoqMatrix::from_rows(&[vec![0, 4], vec![2, 0]]).unwrap();
/// let mut qps = Qps::new(2, 42, 5, WeightPolicy::Linear).unwrap();
/// let mut schedule = Schedule::new(2);
///
/// qps.run(&voqs, &mut schedule);
/// assert_eq!(schedule.as_slice(), &[Some(1), Some(0)]);
/// ```
#[derive(Debug, Clone)]
pub struct Qps {
    ports: usize,
    rounds: usize,
    proposer: QpsProposer,
    scratch: MatchScratch,
}

impl Qps {
    pub fn new(
        ports: usize,
        seed: u64,
        buffer_size: usize,
        policy: WeightPolicy,
    ) -> Result<Self, ConfigError> {
        Self::with_rounds(ports, seed, buffer_size, policy, default_rounds(ports))
    }

    pub fn with_rounds(
        ports: usize,
        seed: u64,
        buffer_size: usize,
        policy: WeightPolicy,
        rounds: usize,
    ) -> Result<Self, ConfigError> {
        if rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        let proposer = QpsProposer::new(ports, seed, buffer_size, policy)?;
        debug!(ports, rounds, buffer_size, %policy, "built QPS scheduler");
        Ok(Self {
            ports,
            rounds,
            proposer,
            scratch: MatchScratch::new(ports),
        })
    }
}

impl Scheduler for Qps {
    fn name(&self) -> &'static str {
        "qps"
    }

    fn port_count(&self) -> usize {
        self.ports
    }

    fn run(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        check_ports(self.name(), self.ports, voqs, schedule);
        self.scratch.reset();
        schedule.clear();

        for _ in 0..self.rounds {
            self.proposer.propose(voqs, schedule, &mut self.scratch);
        }

        assert_matching(self.name(), schedule);
        trace!(matched = schedule.matched_count(), "QPS slot");
    }

    // Stateless across slots
    fn reset(&mut self) {}
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qps_only_matches_nonempty_voqs() {
        let q = VoqMatrix::from_rows(&[
            vec![0, 3, 0, 0],
            vec![1, 0, 0, 0],
            vec![0, 0, 0, 0],
            vec![0, 2, 0, 5],
        ])
        .unwrap();
        let mut qps = Qps::new(4, 11, DEFAULT_BUFFER_SIZE, WeightPolicy::Linear).unwrap();
        let mut s = Schedule::new(4);

        for _ in 0..200 {
            qps.run(&q, &mut s);
            assert!(s.is_partial_matching());
            assert_eq!(s.get(2), None);
            for (i, k) in s.pairs() {
                assert!(q.get(i, k) > 0);
            }
        }
    }

    #[test]
    fn test_qps_longest_proposal_wins_output() {
        // Every input can only propose to output 0; input 2 has the longest VOQ
        // and, with a buffer covering all proposals, always wins.
        let q = VoqMatrix::from_rows(&[vec![1, 0, 0], vec![2, 0, 0], vec![8, 0, 0]]).unwrap();
        let mut qps = Qps::new(3, 5, 3, WeightPolicy::Linear).unwrap();
        let mut s = Schedule::new(3);

        for _ in 0..50 {
            qps.run(&q, &mut s);
            assert_eq!(s.as_slice(), &[None, None, Some(0)]);
        }
    }

    #[test]
    fn test_qps_buffer_of_one_keeps_first_proposal() {
        // With B = 1 the first proposer in the random order wins regardless of length.
        let q = VoqMatrix::from_rows(&[vec![1, 0], vec![50, 0]]).unwrap();
        let mut qps = Qps::new(2, 23, 1, WeightPolicy::Linear).unwrap();
        let mut s = Schedule::new(2);
        let mut wins = [0usize; 2];

        for _ in 0..400 {
            qps.run(&q, &mut s);
            let (i, _) = s.pairs().next().unwrap();
            wins[i] += 1;
        }
        assert!(wins[0] > 120 && wins[1] > 120, "{:?}", wins);
    }

    #[test]
    fn test_qps_rejects_bad_config() {
        assert_eq!(
            Qps::new(0, 1, 5, WeightPolicy::Linear).unwrap_err(),
            ConfigError::ZeroPorts
        );
        assert_eq!(
            Qps::new(4, 1, 0, WeightPolicy::Linear).unwrap_err(),
            ConfigError::ZeroBufferSize
        );
        assert_eq!(
            Qps::new(4, 1, 5, WeightPolicy::Power(0)).unwrap_err(),
            ConfigError::UnsupportedExponent(0)
        );
    }

    #[test]
    fn test_fqps_infinite_policy_picks_longest_row_entry() {
        // Under the infinite policy each input proposes to its longest VOQ.
        let q = VoqMatrix::from_rows(&[vec![1, 9], vec![7, 2]]).unwrap();
        let mut qps = Qps::new(2, 3, 5, WeightPolicy::Infinite).unwrap();
        let mut s = Schedule::new(2);

        qps.run(&q, &mut s);
        assert_eq!(s.as_slice(), &[Some(1), Some(0)]);
    }
}
