//! Scheduling engine: every matching heuristic behind one contract.
//!
//! ## Design Principles
//!
//! 1. **Determinism**: each scheduler owns one seeded ChaCha8 stream, so the
//!    same seed and the same VOQ snapshots give the same schedules
//! 2. **Bounded work**: fixed round counts, every loop bounded by N
//! 3. **Composition**: composite schedulers hold named policy instances and
//!    sequence them over one shared [`MatchScratch`]
//! 4. **Fail loudly**: a returned schedule that is not a matching is a bug and
//!    panics
//!
//! ## Families
//!
//! | Scheduler | Kind | Output |
//! |-----------|------|--------|
//! | [`Islip`], [`IslipShakeUp`] | round-robin pointers | partial |
//! | [`Ilqf`], [`IlqfShakeUp`] | longest queue first | partial |
//! | [`Qps`], [`QppQpa`] | queue-proportional proposals | partial |
//! | [`O1Scheduler`] | edge-level Markov chain | partial |
//! | [`QpsIslip`], [`QppQpaIslip`] | proposal, then iSLIP rounds | partial |
//! | [`Serena`], [`QpsSerena`] | proposal, then cycle-merge | full |
//!
//! ## Example
//!
//! ```
//! use voq_sched::engine::{Islip, Scheduler};
//! use voq_sched::types::{Schedule, VoqMatrix};
//!
//! let voqs = VoqMatrix::from_rows(&[vec![5, 0], vec![0, 3]]).unwrap();
//! let mut islip = Islip::new(2).unwrap();
//! let mut schedule = Schedule::new(2);
//!
//! islip.run(&voqs, &mut schedule);
//! assert_eq!(schedule.as_slice(), &[Some(0), Some(1)]);
//! ```

mod scratch;
pub mod islip;
pub mod ilqf;
pub mod qps;
pub mod qpp_qpa;
pub mod o1;
pub mod merge;
pub mod composite;
pub mod serena;

pub use scratch::MatchScratch;
pub use islip::{Islip, IslipShakeUp};
pub use ilqf::{Ilqf, IlqfShakeUp};
pub use qps::Qps;
pub use qpp_qpa::QppQpa;
pub use o1::O1Scheduler;
pub use merge::{CycleChoice, CycleMerge, CycleRule, CycleView, HeavierCycle, MergeStats, Ouroboros};
pub use composite::{ProposalArbitration, QpsIslip, QppQpaIslip};
pub use serena::{ArrivalGreedy, ProposalMerge, QpsSerena, Serena};

use crate::types::{Schedule, VoqMatrix};

/// Common contract of every scheduler.
///
/// `run` is called exactly once per time slot with the live VOQ snapshot and
/// overwrites `schedule`. Instances are independent and `Send`; each one must
/// be driven by at most one thread at a time.
pub trait Scheduler: Send {
    /// Short stable name, used in logs and receipts
    fn name(&self) -> &'static str;

    /// Port count fixed at construction
    fn port_count(&self) -> usize;

    /// Compute this slot's schedule.
    ///
    /// # Panics
    ///
    /// If `voqs` or `schedule` does not have `port_count()` ports, or if the
    /// computed schedule is not a valid matching.
    fn run(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule);

    /// Clear fairness pointers and history without reallocating.
    fn reset(&mut self);
}

/// One pass of a proposal-style policy writing into a shared scratch.
///
/// Proposals only add pairs between ports that are unmatched in `scratch`.
pub trait ProposalPolicy: Send {
    fn propose(&mut self, voqs: &VoqMatrix, schedule: &mut Schedule, scratch: &mut MatchScratch);

    fn reset(&mut self) {}
}

/// One request/grant/accept round of an arbitration policy.
///
/// Pointer-based policies only move their pointers when `first_round` is set.
pub trait ArbitrationPolicy: Send {
    fn arbitrate(
        &mut self,
        voqs: &VoqMatrix,
        schedule: &mut Schedule,
        scratch: &mut MatchScratch,
        first_round: bool,
    );

    fn reset(&mut self) {}
}

/// Default iteration count: `ceil(log2 N) + 1`.
///
/// ```
/// use voq_sched::engine::default_rounds;
///
/// assert_eq!(default_rounds(1), 1);
/// assert_eq!(default_rounds(2), 2);
/// assert_eq!(default_rounds(5), 4);
/// assert_eq!(default_rounds(64), 7);
/// ```
pub fn default_rounds(ports: usize) -> usize {
    let ceil_log2 = if ports <= 1 {
        0
    } else {
        (usize::BITS - (ports - 1).leading_zeros()) as usize
    };
    ceil_log2 + 1
}

/// Panic unless both the matrix and the schedule have `ports` ports.
pub(crate) fn check_ports(name: &str, ports: usize, voqs: &VoqMatrix, schedule: &Schedule) {
    assert_eq!(voqs.port_count(), ports, "{}: VOQ matrix port count mismatch", name);
    assert_eq!(schedule.port_count(), ports, "{}: schedule port count mismatch", name);
}

/// Panic unless `schedule` is a partial matching.
pub(crate) fn assert_matching(name: &str, schedule: &Schedule) {
    assert!(
        schedule.is_partial_matching(),
        "{} produced an invalid matching: {:?}",
        name,
        schedule.as_slice()
    );
}

/// Panic unless `schedule` is a full matching.
pub(crate) fn assert_full_matching(name: &str, schedule: &Schedule) {
    assert!(
        schedule.is_full_matching(),
        "{} produced a non-full matching: {:?}",
        name,
        schedule.as_slice()
    );
}
