//! Scheduler selection and construction parameters.
//!
//! [`SchedulerConfig`] collects everything a scheduler needs at construction
//! time and [`SchedulerKind`] names which one to build. Together they give
//! drivers a single entry point:
//!
//! ```
//! use voq_sched::config::{SchedulerConfig, SchedulerKind};
//! use voq_sched::types::{Schedule, VoqMatrix};
//!
//! let mut scheduler = SchedulerConfig::new(4)
//!     .with_seed(7)
//!     .build("qps-serena".parse::<SchedulerKind>().unwrap())
//!     .unwrap();
//!
//! let mut schedule = Schedule::new(4);
//! scheduler.run(&VoqMatrix::new(4), &mut schedule);
//! assert!(schedule.is_full_matching());
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::engine::qps::DEFAULT_BUFFER_SIZE;
use crate::engine::{
    default_rounds, Ilqf, IlqfShakeUp, Islip, IslipShakeUp, O1Scheduler, QppQpa, QppQpaIslip, Qps,
    QpsIslip, QpsSerena, Scheduler, Serena,
};
use crate::error::ConfigError;
use crate::sampling::WeightPolicy;

/// Every scheduler the engine can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerKind {
    Islip,
    IslipShakeUp,
    Ilqf,
    IlqfShakeUp,
    Qps,
    QppQpa,
    O1,
    QpsIslip,
    QppQpaIslip,
    Serena,
    QpsSerena,
}

impl SchedulerKind {
    pub const ALL: [SchedulerKind; 11] = [
        SchedulerKind::Islip,
        SchedulerKind::IslipShakeUp,
        SchedulerKind::Ilqf,
        SchedulerKind::IlqfShakeUp,
        SchedulerKind::Qps,
        SchedulerKind::QppQpa,
        SchedulerKind::O1,
        SchedulerKind::QpsIslip,
        SchedulerKind::QppQpaIslip,
        SchedulerKind::Serena,
        SchedulerKind::QpsSerena,
    ];

    /// Stable name, identical to `Scheduler::name` of the built instance
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerKind::Islip => "islip",
            SchedulerKind::IslipShakeUp => "islip-shakeup",
            SchedulerKind::Ilqf => "ilqf",
            SchedulerKind::IlqfShakeUp => "ilqf-shakeup",
            SchedulerKind::Qps => "qps",
            SchedulerKind::QppQpa => "qpp-qpa",
            SchedulerKind::O1 => "o1",
            SchedulerKind::QpsIslip => "qps-islip",
            SchedulerKind::QppQpaIslip => "qpp-qpa-islip",
            SchedulerKind::Serena => "serena",
            SchedulerKind::QpsSerena => "qps-serena",
        }
    }

    /// Whether every schedule this kind returns is a full matching
    pub fn is_full(&self) -> bool {
        matches!(self, SchedulerKind::Serena | SchedulerKind::QpsSerena)
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchedulerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SchedulerKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownScheduler(s.to_string()))
    }
}

/// Construction parameters shared by every scheduler kind.
///
/// Kinds ignore the fields they have no use for: `seed` only matters to
/// randomized schedulers, `buffer_size` and `weight_policy` only to the
/// proposal family.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub port_count: usize,
    pub seed: u64,
    pub buffer_size: usize,
    pub weight_policy: WeightPolicy,

    /// Iteration count; `None` means `ceil(log2 N) + 1`
    pub rounds: Option<usize>,
}

impl SchedulerConfig {
    pub fn new(port_count: usize) -> Self {
        Self {
            port_count,
            seed: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            weight_policy: WeightPolicy::Linear,
            rounds: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_weight_policy(mut self, policy: WeightPolicy) -> Self {
        self.weight_policy = policy;
        self
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = Some(rounds);
        self
    }

    /// Effective iteration count
    pub fn rounds(&self) -> usize {
        self.rounds.unwrap_or_else(|| default_rounds(self.port_count))
    }

    /// Check every field, regardless of which kind will be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port_count == 0 {
            return Err(ConfigError::ZeroPorts);
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        if self.rounds == Some(0) {
            return Err(ConfigError::ZeroRounds);
        }
        self.weight_policy.validate()
    }

    /// Build a scheduler of the given kind.
    pub fn build(&self, kind: SchedulerKind) -> Result<Box<dyn Scheduler>, ConfigError> {
        self.validate()?;

        let n = self.port_count;
        let r = self.rounds();
        let (seed, b, f) = (self.seed, self.buffer_size, self.weight_policy);

        let scheduler: Box<dyn Scheduler> = match kind {
            SchedulerKind::Islip => Box::new(Islip::with_rounds(n, r)?),
            SchedulerKind::IslipShakeUp => Box::new(IslipShakeUp::with_rounds(n, seed, r)?),
            SchedulerKind::Ilqf => Box::new(Ilqf::with_rounds(n, seed, r)?),
            SchedulerKind::IlqfShakeUp => Box::new(IlqfShakeUp::with_rounds(n, seed, r)?),
            SchedulerKind::Qps => Box::new(Qps::with_rounds(n, seed, b, f, r)?),
            SchedulerKind::QppQpa => Box::new(QppQpa::with_rounds(n, seed, b, f, r)?),
            SchedulerKind::O1 => Box::new(O1Scheduler::new(n, seed)?),
            SchedulerKind::QpsIslip => Box::new(QpsIslip::with_rounds(n, seed, b, f, r)?),
            SchedulerKind::QppQpaIslip => Box::new(QppQpaIslip::with_rounds(n, seed, b, f, r)?),
            SchedulerKind::Serena => Box::new(Serena::new(n)?),
            SchedulerKind::QpsSerena => Box::new(QpsSerena::new(n, seed, b, f)?),
        };

        info!(
            kind = %kind,
            ports = n,
            rounds = r,
            seed,
            buffer_size = b,
            policy = %f,
            "scheduler ready"
        );
        Ok(scheduler)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Schedule, VoqMatrix};

    #[test]
    fn test_kind_names_round_trip() {
        for kind in SchedulerKind::ALL {
            assert_eq!(kind.to_string().parse::<SchedulerKind>().unwrap(), kind);
        }
        assert_eq!(" QPS-iSLIP ".parse::<SchedulerKind>().unwrap(), SchedulerKind::QpsIslip);
    }

    #[test]
    fn test_unknown_kind() {
        assert_eq!(
            "mwm".parse::<SchedulerKind>().unwrap_err(),
            ConfigError::UnknownScheduler("mwm".to_string())
        );
    }

    #[test]
    fn test_built_scheduler_names_match_kind() {
        let config = SchedulerConfig::new(4).with_seed(3);
        for kind in SchedulerKind::ALL {
            let scheduler = config.build(kind).unwrap();
            assert_eq!(scheduler.name(), kind.name());
            assert_eq!(scheduler.port_count(), 4);
        }
    }

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::new(16);
        assert_eq!(config.buffer_size, 5);
        assert_eq!(config.rounds(), 5);
        assert!(matches!(config.weight_policy, WeightPolicy::Linear));
        assert_eq!(config.with_rounds(2).rounds(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        assert_eq!(
            SchedulerConfig::new(0).validate().unwrap_err(),
            ConfigError::ZeroPorts
        );
        assert_eq!(
            SchedulerConfig::new(2).with_buffer_size(0).validate().unwrap_err(),
            ConfigError::ZeroBufferSize
        );
        assert_eq!(
            SchedulerConfig::new(2).with_rounds(0).validate().unwrap_err(),
            ConfigError::ZeroRounds
        );
        assert_eq!(
            SchedulerConfig::new(2)
                .with_weight_policy(WeightPolicy::Power(0))
                .build(SchedulerKind::Qps)
                .err(),
            Some(ConfigError::UnsupportedExponent(0))
        );
    }

    #[test]
    fn test_full_kinds_return_full_matchings() {
        let voqs = VoqMatrix::from_rows(&[vec![0, 2, 0], vec![1, 0, 0], vec![0, 0, 0]]).unwrap();
        for kind in SchedulerKind::ALL.into_iter().filter(SchedulerKind::is_full) {
            let mut scheduler = SchedulerConfig::new(3).build(kind).unwrap();
            let mut s = Schedule::new(3);
            scheduler.run(&voqs, &mut s);
            assert!(s.is_full_matching(), "{} returned {:?}", kind, s.as_slice());
        }
    }
}
