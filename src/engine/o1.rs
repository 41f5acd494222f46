//! O(1) randomized scheduler.
//!
//! Keeps one persistent matching and updates a single edge per slot, in the
//! manner of a Glauber dynamics chain over matchings:
//!
//! 1. Sample an edge `(i, j)` uniformly.
//! 2. If the edge is in the matching, or both `i` and `j` are free, set it
//!    with probability `p = ln q / (ln q + 1)` (`q = Q[i][j]`, `p = 0` when
//!    the queue is empty) and clear it otherwise.
//! 3. Any other edge conflicts with the matching and is left alone.
//!
//! The chain drifts toward matchings whose edges carry long queues without
//! ever scanning the matrix.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::engine::{assert_matching, check_ports, Scheduler};
use crate::error::ConfigError;
use crate::types::{Schedule, VoqMatrix};

/// Probability of keeping edge `(i, j)` given its queue length
#[inline]
pub fn activation_probability(queue_length: u64) -> f64 {
    if queue_length == 0 {
        return 0.0;
    }
    let log_q = (queue_length as f64).ln();
    log_q / (log_q + 1.0)
}

/// Single-edge Markov chain scheduler.
#[derive(Debug, Clone)]
pub struct O1Scheduler {
    ports: usize,
    rng: ChaCha8Rng,

    /// Matching carried across slots
    current: Schedule,

    /// `reverse[j]` is the input holding output `j`
    reverse: Vec<Option<usize>>,

    /// Slots since construction or the last reset
    slots: u64,
}

impl O1Scheduler {
    pub fn new(ports: usize, seed: u64) -> Result<Self, ConfigError> {
        if ports == 0 {
            return Err(ConfigError::ZeroPorts);
        }
        debug!(ports, seed, "built O(1) scheduler");
        Ok(Self {
            ports,
            rng: ChaCha8Rng::seed_from_u64(seed),
            current: Schedule::new(ports),
            reverse: vec![None; ports],
            slots: 0,
        })
    }

    /// Slots run since construction or the last reset
    pub fn slots(&self) -> u64 {
        self.slots
    }
}

impl Scheduler for O1Scheduler {
    fn name(&self) -> &'static str {
        "o1"
    }

    fn port_count(&self) -> usize {
        self.ports
    }

    fn run(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        check_ports(self.name(), self.ports, voqs, schedule);
        if self.slots == 0 {
            self.current.clear();
            self.reverse.fill(None);
        }

        let i = self.rng.gen_range(0..self.ports);
        let j = self.rng.gen_range(0..self.ports);
        let p = activation_probability(voqs.get(i, j));

        let held = self.current.get(i) == Some(j);
        let both_free = self.current.get(i).is_none() && self.reverse[j].is_none();
        if held || both_free {
            if self.rng.gen::<f64>() < p {
                self.current.assign(i, j);
                self.reverse[j] = Some(i);
            } else {
                self.current.unassign(i);
                self.reverse[j] = None;
            }
        }
        self.slots += 1;

        schedule.copy_from(&self.current);
        assert_matching(self.name(), schedule);
        trace!(i, j, p, matched = schedule.matched_count(), "O(1) slot");
    }

    fn reset(&mut self) {
        self.slots = 0;
        debug!(ports = self.ports, "O(1) matching will restart empty");
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_probability() {
        assert_eq!(activation_probability(0), 0.0);
        assert_eq!(activation_probability(1), 0.0);
        let p = activation_probability(100);
        assert!(p > 0.8 && p < 1.0);
        assert!(activation_probability(1_000) > p);
    }

    #[test]
    fn test_o1_empty_matrix_never_matches() {
        let mut sched = O1Scheduler::new(4, 1).unwrap();
        let mut s = Schedule::new(4);
        for _ in 0..500 {
            sched.run(&VoqMatrix::new(4), &mut s);
            assert_eq!(s.matched_count(), 0);
        }
    }

    #[test]
    fn test_o1_converges_on_heavy_diagonal() {
        let n = 3;
        let mut q = VoqMatrix::new(n);
        for i in 0..n {
            q.set(i, i, 10_000);
        }
        let mut sched = O1Scheduler::new(n, 13).unwrap();
        let mut s = Schedule::new(n);

        for _ in 0..2_000 {
            sched.run(&q, &mut s);
            assert!(s.is_partial_matching());
        }
        // Off-diagonal edges have q = 0 and are never set.
        for (i, k) in s.pairs() {
            assert_eq!(i, k);
        }
        assert!(s.matched_count() >= 2, "only {} matched", s.matched_count());
    }

    #[test]
    fn test_o1_reset_clears_matching_on_next_run() {
        let q = VoqMatrix::from_rows(&[vec![1_000_000]]).unwrap();
        let mut sched = O1Scheduler::new(1, 2).unwrap();
        let mut s = Schedule::new(1);

        for _ in 0..50 {
            sched.run(&q, &mut s);
        }
        assert_eq!(sched.slots(), 50);

        sched.reset();
        assert_eq!(sched.slots(), 0);
        sched.run(&VoqMatrix::new(1), &mut s);
        assert_eq!(s.matched_count(), 0);
    }
}
