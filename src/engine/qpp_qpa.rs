//! QPP-QPA: queue-proportional proposing, queue-proportional accepting.
//!
//! Proposals are made exactly as in QPS. Instead of keeping a running
//! longest candidate, every free output buffers up to `B` proposals together
//! with their VOQ lengths and then samples one of them through the same
//! weight policy. This costs O(B) per output but removes the bias QPS has
//! toward long queues when several inputs propose to the same output.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::engine::qps::validate_proposal;
use crate::engine::{
    assert_matching, check_ports, default_rounds, MatchScratch, ProposalPolicy, Scheduler,
};
use crate::error::ConfigError;
use crate::sampling::{random_permutation, WeightPolicy, WeightedSampler};
use crate::types::{Schedule, VoqMatrix};

/// One QPP-QPA proposal/accept pass.
#[derive(Debug, Clone)]
pub struct QppQpaProposer {
    buffer_size: usize,
    sampler: WeightedSampler,
    rng: ChaCha8Rng,
    order: Vec<usize>,

    /// Buffered proposing inputs per output
    candidates: Vec<Vec<usize>>,

    /// VOQ length behind each buffered proposal
    candidate_lens: Vec<Vec<u64>>,
}

impl QppQpaProposer {
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
            candidates: vec![Vec::with_capacity(buffer_size); ports],
            candidate_lens: vec![Vec::with_capacity(buffer_size); ports],
        })
    }
}

impl ProposalPolicy for QppQpaProposer {
    fn propose(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule, scratch: &mut MatchScratch) {
        for (inputs, lens) in self.candidates.iter_mut().zip(self.candidate_lens.iter_mut()) {
            inputs.clear();
            lens.clear();
        }

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
            if scratch.output_free(k) && self.candidates[k].len() < self.buffer_size {
                self.candidates[k].push(i);
                self.candidate_lens[k].push(voqs.get(i, k));
            }
        }

        // Accept
        for k in 0..self.candidates.len() {
            if self.candidates[k].is_empty() {
                continue;
            }
            let picked = self.sampler.sample_from(
                &self.candidates[k],
                &self.candidate_lens[k],
                &mut self.rng,
            );
            if let Some(i) = picked {
                if scratch.input_free(i) {
                    scratch.pair(schedule, i, k);
                }
            }
        }
    }
}

/// Multi-pass QPP-QPA (or FQPP-QPA) scheduler.
#[derive(Debug, Clone)]
pub struct QppQpa {
    ports: usize,
    rounds: usize,
    proposer: QppQpaProposer,
    scratch: MatchScratch,
}

impl QppQpa {
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
        let proposer = QppQpaProposer::new(ports, seed, buffer_size, policy)?;
        debug!(ports, rounds, buffer_size, %policy, "built QPP-QPA scheduler");
        Ok(Self {
            ports,
            rounds,
            proposer,
            scratch: MatchScratch::new(ports),
        })
    }
}

impl Scheduler for QppQpa {
    fn name(&self) -> &'static str {
        "qpp-qpa"
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
        trace!(matched = schedule.matched_count(), "QPP-QPA slot");
    }

    fn reset(&mut self) {}
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qpa_accepts_proportionally() {
        // Both inputs can only propose to output 0. The buffer holds both, and
        // output 0 accepts input 1 with probability 3/4.
        let q = VoqMatrix::from_rows(&[vec![1, 0], vec![3, 0]]).unwrap();
        let mut sched = QppQpa::with_rounds(2, 31, 5, WeightPolicy::Linear, 1).unwrap();
        let mut s = Schedule::new(2);
        let mut wins = [0usize; 2];

        for _ in 0..4_000 {
            sched.run(&q, &mut s);
            let (i, _) = s.pairs().next().unwrap();
            wins[i] += 1;
        }
        let share = wins[1] as f64 / 4_000.0;
        assert!((share - 0.75).abs() < 0.03, "share {}", share);
    }

    #[test]
    fn test_qpa_matched_output_ignores_late_proposals() {
        // Output 0 is taken in pass 1; inputs that propose to it afterwards
        // must not steal it, whatever stale candidates exist.
        let q = VoqMatrix::from_rows(&[vec![2, 0, 0], vec![4, 0, 0], vec![6, 0, 0]]).unwrap();
        let mut sched = QppQpa::new(3, 8, 2, WeightPolicy::Linear).unwrap();
        let mut s = Schedule::new(3);

        for _ in 0..200 {
            sched.run(&q, &mut s);
            assert!(s.is_partial_matching());
            assert_eq!(s.matched_count(), 1);
        }
    }

    #[test]
    fn test_fqpp_qpa_log_policy_valid() {
        let q = VoqMatrix::from_rows(&[
            vec![0, 3, 9, 1],
            vec![4, 0, 0, 2],
            vec![1, 1, 1, 1],
            vec![0, 0, 8, 0],
        ])
        .unwrap();
        let mut sched = QppQpa::new(4, 2, 2, WeightPolicy::Log).unwrap();
        let mut s = Schedule::new(4);

        for _ in 0..200 {
            sched.run(&q, &mut s);
            assert!(s.is_partial_matching());
            for (i, k) in s.pairs() {
                assert!(q.get(i, k) > 0);
            }
        }
    }
}
