//! iLQF: iterative longest-queue-first matching.
//!
//! Same request/grant/accept skeleton as iSLIP, but with no pointers. Each
//! free output grants the free input with the longest VOQ toward it, and
//! each free input accepts the granting output with the longest VOQ. Ties go
//! to whichever candidate comes first in a freshly shuffled scan order, so no
//! port index is favored.
//!
//! [`IlqfShakeUp`] follows the iLQF rounds with a weighted input-side
//! shake-up: leftover inputs sample an output queue-proportionally and may
//! displace the current holder with probability `q / (q + q_prev)`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::engine::{
    assert_matching, check_ports, default_rounds, ArbitrationPolicy, MatchScratch, Scheduler,
};
use crate::error::ConfigError;
use crate::sampling::{random_permutation, WeightPolicy, WeightedSampler};
use crate::types::{Schedule, VoqMatrix};

/// Longest-queue-first arbitration round with random tie-breaking.
#[derive(Debug, Clone)]
pub struct LqfArbiter {
    rng: ChaCha8Rng,
    order: Vec<usize>,
}

impl LqfArbiter {
    pub fn new(ports: usize, seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            order: vec![0; ports],
        }
    }
}

impl ArbitrationPolicy for LqfArbiter {
    fn arbitrate(
        &mut self,
        voqs: &VoqMatrix,
        schedule: &mut Schedule,
        scratch: &mut MatchScratch,
        _first_round: bool,
    ) {
        let n = self.order.len();

        // Request & grant: longest free VOQ toward k
        for k in 0..n {
            scratch.check[k] = None;
            if !scratch.output_free(k) {
                continue;
            }
            random_permutation(&mut self.order, &mut self.rng);
            let mut best: Option<usize> = None;
            for &c in &self.order {
                if !scratch.input_free(c) || voqs.get(c, k) == 0 {
                    continue;
                }
                match best {
                    Some(i) if voqs.get(c, k) <= voqs.get(i, k) => {}
                    _ => best = Some(c),
                }
            }
            scratch.check[k] = best;
        }

        // Accept: longest VOQ among the granting outputs
        for i in 0..n {
            if !scratch.input_free(i) {
                continue;
            }
            random_permutation(&mut self.order, &mut self.rng);
            let mut best: Option<usize> = None;
            for &c in &self.order {
                if scratch.check[c] != Some(i) {
                    continue;
                }
                match best {
                    Some(k) if voqs.get(i, c) <= voqs.get(i, k) => {}
                    _ => best = Some(c),
                }
            }
            if let Some(k) = best {
                scratch.pair(schedule, i, k);
            }
        }
    }
}

/// Multi-round iLQF scheduler.
#[derive(Debug, Clone)]
pub struct Ilqf {
    ports: usize,
    rounds: usize,
    arbiter: LqfArbiter,
    scratch: MatchScratch,
}

impl Ilqf {
    pub fn new(ports: usize, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rounds(ports, seed, default_rounds(ports))
    }

    pub fn with_rounds(ports: usize, seed: u64, rounds: usize) -> Result<Self, ConfigError> {
        if ports == 0 {
            return Err(ConfigError::ZeroPorts);
        }
        if rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        debug!(ports, rounds, seed, "built iLQF scheduler");
        Ok(Self {
            ports,
            rounds,
            arbiter: LqfArbiter::new(ports, seed),
            scratch: MatchScratch::new(ports),
        })
    }

    fn run_rounds(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        self.scratch.reset();
        schedule.clear();
        for t in 0..self.rounds {
            self.arbiter.arbitrate(voqs, schedule, &mut self.scratch, t == 0);
        }
    }
}

impl Scheduler for Ilqf {
    fn name(&self) -> &'static str {
        "ilqf"
    }

    fn port_count(&self) -> usize {
        self.ports
    }

    fn run(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        check_ports(self.name(), self.ports, voqs, schedule);
        self.run_rounds(voqs, schedule);
        assert_matching(self.name(), schedule);
        trace!(matched = schedule.matched_count(), "iLQF slot");
    }

    // No pointer state
    fn reset(&mut self) {}
}

/// iLQF followed by one weighted shake-up pass.
#[derive(Debug, Clone)]
pub struct IlqfShakeUp {
    inner: Ilqf,
    sampler: WeightedSampler,
}

impl IlqfShakeUp {
    pub fn new(ports: usize, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rounds(ports, seed, default_rounds(ports))
    }

    pub fn with_rounds(ports: usize, seed: u64, rounds: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: Ilqf::with_rounds(ports, seed, rounds)?,
            sampler: WeightedSampler::new(WeightPolicy::Linear),
        })
    }

    fn weighted_shake_up(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        let Ilqf { arbiter, scratch, .. } = &mut self.inner;
        random_permutation(&mut arbiter.order, &mut arbiter.rng);

        for idx in 0..arbiter.order.len() {
            let i = arbiter.order[idx];
            if !scratch.input_free(i) {
                continue;
            }
            let Some(k) = self.sampler.sample(voqs.row(i), &mut arbiter.rng) else {
                continue;
            };

            match scratch.output_matched[k] {
                None => scratch.pair(schedule, i, k),
                Some(holder) => {
                    let mine = voqs.get(i, k) as f64;
                    let theirs = voqs.get(holder, k) as f64;
                    if arbiter.rng.gen::<f64>() < mine / (mine + theirs) {
                        scratch.evict_output(schedule, k);
                        scratch.pair(schedule, i, k);
                    }
                }
            }
        }
    }
}

impl Scheduler for IlqfShakeUp {
    fn name(&self) -> &'static str {
        "ilqf-shakeup"
    }

    fn port_count(&self) -> usize {
        self.inner.ports
    }

    fn run(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        check_ports(self.name(), self.inner.ports, voqs, schedule);
        self.inner.run_rounds(voqs, schedule);
        self.weighted_shake_up(voqs, schedule);
        assert_matching(self.name(), schedule);
        trace!(matched = schedule.matched_count(), "iLQF+ShakeUp slot");
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
