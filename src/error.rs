//! Construction-time errors.
//!
//! Only configuration problems are reported as values. A schedule that is not
//! a valid matching can only come from a bug in a scheduler, so that case is a
//! panic inside `run`, never an `Err`. An empty sampling row is a normal
//! outcome and is represented as `None` by the sampler.

use thiserror::Error;

/// Errors raised while building a scheduler or its weight policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A switch needs at least one port.
    #[error("port count must be at least 1")]
    ZeroPorts,

    /// Proposal schedulers need room for at least one request per output.
    #[error("acceptance buffer size must be at least 1")]
    ZeroBufferSize,

    /// Iterative schedulers need at least one round.
    #[error("round count must be at least 1")]
    ZeroRounds,

    /// The power catalogue only covers exponents -1 (infinite), 0 (log) and 1..=6
    #[error("weight exponent {0} is not supported (expected -1 through 6)")]
    UnsupportedExponent(i32),

    /// A weight function produced a value outside its contract.
    #[error("weight function returned {weight} for queue length {queue_length}")]
    MalformedWeight { queue_length: u64, weight: f64 },

    /// A VOQ matrix or schedule does not match the configured port count.
    #[error("expected {expected} ports, found {found}")]
    PortMismatch { expected: usize, found: usize },

    /// `SchedulerKind` parsing failed.
    #[error("unknown scheduler '{0}'")]
    UnknownScheduler(String),
}
