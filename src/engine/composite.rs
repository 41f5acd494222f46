//! Proposal pass followed by arbitration rounds.
//!
//! A [`ProposalArbitration`] holds one [`ProposalPolicy`] and one
//! [`ArbitrationPolicy`] over a shared [`MatchScratch`]. Each slot runs one
//! proposal pass to seed the matching, then `R - 1` arbitration rounds that
//! only fill ports the proposal left free. The first arbitration round is the
//! one allowed to move round-robin pointers.

use tracing::{debug, trace};

use crate::engine::islip::RoundRobinArbiter;
use crate::engine::qpp_qpa::QppQpaProposer;
use crate::engine::qps::QpsProposer;
use crate::engine::{
    assert_matching, check_ports, default_rounds, ArbitrationPolicy, MatchScratch, ProposalPolicy,
    Scheduler,
};
use crate::error::ConfigError;
use crate::sampling::WeightPolicy;
use crate::types::{Schedule, VoqMatrix};

/// QPS proposal, then iSLIP rounds
pub type QpsIslip = ProposalArbitration<QpsProposer, RoundRobinArbiter>;

/// QPP-QPA proposal, then iSLIP rounds
pub type QppQpaIslip = ProposalArbitration<QppQpaProposer, RoundRobinArbiter>;

/// Composite of a proposal policy and an arbitration policy.
#[derive(Debug, Clone)]
pub struct ProposalArbitration<P, A> {
    name: &'static str,
    ports: usize,
    rounds: usize,
    proposal: P,
    arbitration: A,
    scratch: MatchScratch,
}

impl<P, A> ProposalArbitration<P, A>
where
    P: ProposalPolicy,
    A: ArbitrationPolicy,
{
    /// Compose two policies. `rounds` counts the proposal pass.
    pub fn compose(
        name: &'static str,
        ports: usize,
        rounds: usize,
        proposal: P,
        arbitration: A,
    ) -> Result<Self, ConfigError> {
        if ports == 0 {
            return Err(ConfigError::ZeroPorts);
        }
        if rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        debug!(name, ports, rounds, "built composite scheduler");
        Ok(Self {
            name,
            ports,
            rounds,
            proposal,
            arbitration,
            scratch: MatchScratch::new(ports),
        })
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn proposal(&self) -> &P {
        &self.proposal
    }

    pub fn arbitration(&self) -> &A {
        &self.arbitration
    }
}

impl ProposalArbitration<QpsProposer, RoundRobinArbiter> {
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
        let proposal = QpsProposer::new(ports, seed, buffer_size, policy)?;
        Self::compose("qps-islip", ports, rounds, proposal, RoundRobinArbiter::new(ports))
    }
}

impl ProposalArbitration<QppQpaProposer, RoundRobinArbiter> {
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
        let proposal = QppQpaProposer::new(ports, seed, buffer_size, policy)?;
        Self::compose("qpp-qpa-islip", ports, rounds, proposal, RoundRobinArbiter::new(ports))
    }
}

impl<P, A> Scheduler for ProposalArbitration<P, A>
where
    P: ProposalPolicy,
    A: ArbitrationPolicy,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn port_count(&self) -> usize {
        self.ports
    }

    fn run(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule) {
        check_ports(self.name, self.ports, voqs, schedule);
        self.scratch.reset();
        schedule.clear();

        self.proposal.propose(voqs, schedule, &mut self.scratch);
        let proposed = schedule.matched_count();

        for t in 1..self.rounds {
            self.arbitration
                .arbitrate(voqs, schedule, &mut self.scratch, t == 1);
        }

        assert_matching(self.name, schedule);
        trace!(
            name = self.name,
            proposed,
            matched = schedule.matched_count(),
            "composite slot"
        );
    }

    fn reset(&mut self) {
        self.proposal.reset();
        self.arbitration.reset();
        debug!(name = self.name, "composite policies reset");
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
