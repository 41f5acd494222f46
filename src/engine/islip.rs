//! iSLIP: iterative round-robin matching with rotating pointers.
//!
//! ## Round structure
//!
//! 1. **Grant**: every unmatched output `k` scans inputs starting at
//!    `grant[k]` and grants the first unmatched input with a non-empty VOQ.
//! 2. **Accept**: every unmatched input `i` scans outputs starting at
//!    `accept[i]` and accepts the first output that granted it.
//!
//! Pointers move only on first-round acceptances (`grant[k] = i + 1`,
//! `accept[i] = k + 1`, both mod N). An input that keeps winning an output
//! therefore drops to lowest priority there, which is what makes iSLIP
//! starvation-free.
//!
//! ## ShakeUp
//!
//! [`IslipShakeUp`] interleaves iSLIP rounds with a random output-side
//! shake-up: each still-unmatched input picks a uniformly random output among
//! its non-empty VOQs, and each output picks one of its shake-up requesters
//! uniformly and evicts whoever it was matched to.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::engine::{
    assert_matching, check_ports, default_rounds, ArbitrationPolicy, MatchScratch, Scheduler,
};
use crate::error::ConfigError;
use crate::types::{Schedule, VoqMatrix};

/// Initial value of every grant and accept pointer
const DEFAULT_POINTER: usize = 0;

// ============================================================================
// Round-robin arbiter
// ============================================================================

/// Grant/accept pointers plus the single-round iSLIP protocol.
///
/// This is the arbitration half that composite schedulers reuse.
#[derive(Debug, Clone)]
pub struct RoundRobinArbiter {
    grant: Vec<usize>,
    accept: Vec<usize>,
}

impl RoundRobinArbiter {
    pub fn new(ports: usize) -> Self {
        Self {
            grant: vec![DEFAULT_POINTER; ports],
            accept: vec![DEFAULT_POINTER; ports],
        }
    }

    /// Grant pointers, indexed by output
    pub fn grant_pointers(&self) -> &[usize] {
        &self.grant
    }

    /// Accept pointers, indexed by input
    pub fn accept_pointers(&self) -> &[usize] {
        &self.accept
    }
}

impl ArbitrationPolicy for RoundRobinArbiter {
    fn arbitrate(
        &mut self,
        voqs: &VoqMatrix,
        schedule: &mut Schedule,
        scratch: &mut MatchScratch,
        first_round: bool,
    ) {
        let n = self.grant.len();

        // Request & grant
        for k in 0..n {
            scratch.check[k] = None;
            if !scratch.output_free(k) {
                continue;
            }
            let granted = (0..n)
                .map(|c| (c + self.grant[k]) % n)
                .find(|&i| scratch.input_free(i) && voqs.get(i, k) > 0);
            scratch.check[k] = granted;
        }

        // Accept
        for i in 0..n {
            if !scratch.input_free(i) {
                continue;
            }
            let accepted = (0..n)
                .map(|c| (c + self.accept[i]) % n)
                .find(|&k| scratch.check[k] == Some(i));

            if let Some(k) = accepted {
                scratch.pair(schedule, i, k);
                if first_round {
                    self.grant[k] = (i + 1) % n;
                    self.accept[i] = (k + 1) % n;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.grant.fill(DEFAULT_POINTER);
        self.accept.fill(DEFAULT_POINTER);
    }
}

// ============================================================================
// iSLIP
// ============================================================================

/// Multi-round iSLIP scheduler.
///
/// ## Example
///
/// ```
/// use voq_sched::engine::{Islip, Scheduler};
/// use voq_sched::types::{Schedule, VoqMatrix};
///
/// let voqs = VoqMatrix::from_rows(&[vec![5, 0], vec![0, 3]]).unwrap();
/// let mut islip = Islip::new(2).unwrap();
/// let mut schedule = Schedule::new(2);
///
/// islip.run(&voqs, &mut schedule);
///
/// assert_eq!(schedule.as_slice(), &[Some(0), Some(1)]);
/// assert_eq!(islip.arbiter().grant_pointers(), &[1, 0]);
/// assert_eq!(islip.arbiter().accept_pointers(), &[1, 0]);
/// ```
#[derive(Debug, Clone)]
pub struct Islip {
    ports: usize,
    rounds: usize,
    arbiter: RoundRobinArbiter,
    scratch: MatchScratch,
}

impl Islip {
    /// Create an iSLIP scheduler running `ceil(log2 N) + 1` rounds
    pub fn new(ports: usize) -> Result<Self, ConfigError> {
        Self::with_rounds(ports, default_rounds(ports))
    }

    /// Create an iSLIP scheduler with an explicit round count
    pub fn with_rounds(ports: usize, rounds: usize) -> Result<Self, ConfigError> {
        if ports == 0 {
            return Err(ConfigError::ZeroPorts);
        }
        if rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        debug!(ports, rounds, "built iSLIP scheduler");
        Ok(Self {
            ports,
            rounds,
            arbiter: RoundRobinArbiter::new(ports),
            scratch: MatchScratch::new(ports),
        })
    }

    /// Rounds run per slot
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// The pointer state
    pub fn arbiter(&self) -> &RoundRobinArbiter {
        &self.arbiter
    }
}

impl Scheduler for Islip {
    fn name(&self) -> &'static str {
        "islip"
    }

    fn port_count(&self) -> usize {
        self.ports
    }

    fn run(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        check_ports(self.name(), self.ports, voqs, schedule);
        self.scratch.reset();
        schedule.clear();

        for t in 0..self.rounds {
            self.arbiter.arbitrate(voqs, schedule, &mut self.scratch, t == 0);
        }

        assert_matching(self.name(), schedule);
        trace!(matched = schedule.matched_count(), "iSLIP slot");
    }

    fn reset(&mut self) {
        self.arbiter.reset();
        debug!(ports = self.ports, "iSLIP pointers reset");
    }
}

// ============================================================================
// iSLIP + ShakeUp
// ============================================================================

/// iSLIP interleaved with random output-side shake-ups.
///
/// Runs `ceil(rounds / 2)` iterations of one iSLIP round followed by one
/// shake-up pass.
#[derive(Debug, Clone)]
pub struct IslipShakeUp {
    ports: usize,
    rounds: usize,
    arbiter: RoundRobinArbiter,
    scratch: MatchScratch,
    rng: ChaCha8Rng,

    /// Candidate buffer (outputs for the request phase, inputs for the grant phase)
    candidates: Vec<usize>,

    /// Output each input asked for during the current shake-up
    requests: Vec<Option<usize>>,
}

impl IslipShakeUp {
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
        debug!(ports, rounds, seed, "built iSLIP+ShakeUp scheduler");
        Ok(Self {
            ports,
            rounds,
            arbiter: RoundRobinArbiter::new(ports),
            scratch: MatchScratch::new(ports),
            rng: ChaCha8Rng::seed_from_u64(seed),
            candidates: Vec::with_capacity(ports),
            requests: vec![None; ports],
        })
    }

    pub fn arbiter(&self) -> &RoundRobinArbiter {
        &self.arbiter
    }

    fn shake_up(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        let n = self.ports;

        // Request: each unmatched input picks one non-empty VOQ uniformly
        for i in 0..n {
            self.requests[i] = None;
            if !self.scratch.input_free(i) {
                continue;
            }
            self.candidates.clear();
            self.candidates.extend((0..n).filter(|&k| voqs.get(i, k) > 0));
            if !self.candidates.is_empty() {
                let x = self.rng.gen_range(0..self.candidates.len());
                self.requests[i] = Some(self.candidates[x]);
            }
        }

        // Grant: each requested output picks one requester and evicts its match
        for k in 0..n {
            self.candidates.clear();
            self.candidates.extend((0..n).filter(|&i| self.requests[i] == Some(k)));
            if self.candidates.is_empty() {
                continue;
            }
            let i = self.candidates[self.rng.gen_range(0..self.candidates.len())];
            self.scratch.evict_output(schedule, k);
            debug_assert!(self.scratch.input_free(i));
            self.scratch.pair(schedule, i, k);
        }

        assert_matching(self.name(), schedule);
    }
}

impl Scheduler for IslipShakeUp {
    fn name(&self) -> &'static str {
        "islip-shakeup"
    }

    fn port_count(&self) -> usize {
        self.ports
    }

    fn run(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        check_ports(self.name(), self.ports, voqs, schedule);
        self.scratch.reset();
        schedule.clear();

        let iterations = (self.rounds + 1) / 2;
        for t in 0..iterations {
            self.arbiter.arbitrate(voqs, schedule, &mut self.scratch, t == 0);
            self.shake_up(voqs, schedule);
        }

        trace!(matched = schedule.matched_count(), iterations, "iSLIP+ShakeUp slot");
    }

    fn reset(&mut self) {
        self.arbiter.reset();
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn voqs(rows: &[Vec<u64>]) -> VoqMatrix {
        VoqMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_islip_two_port_scenario() {
        let q = voqs(&[vec![5, 0], vec![0, 3]]);
        let mut islip = Islip::new(2).unwrap();
        let mut s = Schedule::new(2);

        islip.run(&q, &mut s);

        assert_eq!(s.as_slice(), &[Some(0), Some(1)]);
        // Output 1 granted input 1 and wrapped: (1 + 1) % 2 == 0.
        assert_eq!(islip.arbiter().grant_pointers(), &[1, 0]);
        assert_eq!(islip.arbiter().accept_pointers(), &[1, 0]);
    }

    #[test]
    fn test_islip_empty_matrix_matches_nothing() {
        let mut islip = Islip::new(4).unwrap();
        let mut s = Schedule::identity(4);
        islip.run(&VoqMatrix::new(4), &mut s);
        assert_eq!(s.matched_count(), 0);
        assert_eq!(islip.arbiter().grant_pointers(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_islip_contention_rotates_grant() {
        // Both inputs want output 0 only
        let q = voqs(&[vec![1, 0], vec![1, 0]]);
        let mut islip = Islip::new(2).unwrap();
        let mut s = Schedule::new(2);

        islip.run(&q, &mut s);
        assert_eq!(s.as_slice(), &[Some(0), None]);
        assert_eq!(islip.arbiter().grant_pointers()[0], 1);

        islip.run(&q, &mut s);
        assert_eq!(s.as_slice(), &[None, Some(0)]);
        assert_eq!(islip.arbiter().grant_pointers()[0], 0);
    }

    #[test]
    fn test_islip_later_rounds_do_not_move_pointers() {
        // Round 1: out 0 and out 1 both grant input 0; input 0 accepts out 0.
        // Round 2: out 1 grants input 1.
        let q = voqs(&[vec![1, 1], vec![0, 1]]);
        let mut islip = Islip::new(2).unwrap();
        let mut s = Schedule::new(2);

        islip.run(&q, &mut s);

        assert_eq!(s.as_slice(), &[Some(0), Some(1)]);
        assert_eq!(islip.arbiter().grant_pointers(), &[1, 0]);
        assert_eq!(islip.arbiter().accept_pointers(), &[1, 0]);
    }

    #[test]
    fn test_islip_reset_restores_pointers() {
        let q = voqs(&[vec![5, 0], vec![0, 3]]);
        let mut islip = Islip::new(2).unwrap();
        let mut s = Schedule::new(2);
        islip.run(&q, &mut s);

        islip.reset();
        assert_eq!(islip.arbiter().grant_pointers(), &[0, 0]);
        assert_eq!(islip.arbiter().accept_pointers(), &[0, 0]);
    }

    #[test]
    fn test_islip_starvation_free() {
        // Input 2 always requests output 0; inputs 0 and 1 compete for it too.
        let n = 4;
        let mut q = VoqMatrix::new(n);
        for i in 0..3 {
            q.set(i, 0, 10);
        }
        let mut islip = Islip::new(n).unwrap();
        let mut s = Schedule::new(n);

        let served = (0..n).any(|_| {
            islip.run(&q, &mut s);
            s.get(2) == Some(0)
        });
        assert!(served, "input 2 starved for {} slots", n);
    }

    #[test]
    fn test_islip_rejects_bad_config() {
        assert_eq!(Islip::new(0).unwrap_err(), ConfigError::ZeroPorts);
        assert_eq!(Islip::with_rounds(4, 0).unwrap_err(), ConfigError::ZeroRounds);
    }

    #[test]
    #[should_panic(expected = "port count mismatch")]
    fn test_islip_port_mismatch_panics() {
        let mut islip = Islip::new(3).unwrap();
        let mut s = Schedule::new(3);
        islip.run(&VoqMatrix::new(2), &mut s);
    }

    #[test]
    fn test_shakeup_fills_free_outputs() {
        // iSLIP alone leaves input 1 unmatched: both want output 0.
        // Shake-up lets input 1 grab output 0 or leaves the first match.
        let q = voqs(&[vec![3, 0, 0], vec![2, 0, 0], vec![0, 0, 4]]);
        let mut sched = IslipShakeUp::new(3, 42).unwrap();
        let mut s = Schedule::new(3);

        for _ in 0..20 {
            sched.run(&q, &mut s);
            assert!(s.is_partial_matching());
            assert_eq!(s.get(2), Some(2));
            assert_eq!(s.matched_count(), 2);
        }
    }

    #[test]
    fn test_shakeup_deterministic() {
        let q = voqs(&[vec![3, 1, 0], vec![2, 0, 5], vec![1, 1, 4]]);
        let mut a = IslipShakeUp::new(3, 9).unwrap();
        let mut b = IslipShakeUp::new(3, 9).unwrap();
        let mut sa = Schedule::new(3);
        let mut sb = Schedule::new(3);

        for _ in 0..50 {
            a.run(&q, &mut sa);
            b.run(&q, &mut sb);
            assert_eq!(sa, sb);
        }
    }
}
