//! Queue-length weight policies.
//!
//! A weight policy maps a queue length to a sampling weight. The catalogue
//! covers the power family used by FQPS (`n^p`), `log2(n + 1)`, and the
//! reserved *infinite* policy, which ignores magnitude and turns sampling
//! into "pick the longest queue, ties broken uniformly at random".
//!
//! | Exponent | Policy | f(n) |
//! |----------|--------|------|
//! | -1 | [`WeightPolicy::Infinite`] | +inf |
//! | 0 | [`WeightPolicy::Log`] | log2(n + 1) |
//! | 1..=6 | [`WeightPolicy::Power`] | n^p |
//!
//! [`WeightPolicy::Linear`] is plain queue-proportional sampling (QPS) and is
//! the default. Every policy satisfies `f(0) ∈ {0, +inf}`.

use std::fmt;

use crate::error::ConfigError;

/// Highest exponent in the power catalogue
pub const MAX_EXPONENT: u32 = 6;

/// Largest queue length checked when validating a custom weight function
const VALIDATION_LIMIT: u64 = 1024;

/// A user-supplied weight function
pub type WeightFn = fn(u64) -> f64;

/// How raw queue lengths are turned into sampling weights.
#[derive(Debug, Clone, Copy, Default)]
pub enum WeightPolicy {
    /// Weight equals the queue length
    #[default]
    Linear,
    /// Weight is `n^p`
    Power(u32),
    /// Weight is `log2(n + 1)`
    Log,
    /// Max-selection with uniform tie-breaking
    Infinite,
    /// Any pure function honoring `f(0) ∈ {0, +inf}`, non-negative and
    /// non-decreasing
    Custom(WeightFn),
}

impl WeightPolicy {
    /// Resolve an exponent from the power catalogue.
    ///
    /// # Errors
    ///
    /// `UnsupportedExponent` for anything below -1 or above [`MAX_EXPONENT`].
    ///
    /// # Example
    ///
    /// ```
    /// use voq_sched::sampling::WeightPolicy;
    ///
    /// assert!(WeightPolicy::from_exponent(-1).unwrap().is_infinite());
    /// assert_eq!(WeightPolicy::from_exponent(0).unwrap().weight(3), 2.0);
    /// assert_eq!(WeightPolicy::from_exponent(2).unwrap().weight(3), 9.0);
    /// assert!(WeightPolicy::from_exponent(-2).is_err());
    /// assert!(WeightPolicy::from_exponent(7).is_err());
    /// ```
    pub fn from_exponent(p: i32) -> Result<Self, ConfigError> {
        match p {
            -1 => Ok(WeightPolicy::Infinite),
            0 => Ok(WeightPolicy::Log),
            p @ 1..=6 => Ok(WeightPolicy::Power(p as u32)),
            p => Err(ConfigError::UnsupportedExponent(p)),
        }
    }

    /// Every entry of the catalogue, exponents -1 through `max_exponent`
    pub fn catalogue(max_exponent: u32) -> Vec<Self> {
        let mut policies = vec![WeightPolicy::Infinite, WeightPolicy::Log];
        policies.extend((1..=max_exponent).map(WeightPolicy::Power));
        policies
    }

    /// Evaluate the policy for one queue length.
    #[inline]
    pub fn weight(&self, queue_length: u64) -> f64 {
        match *self {
            WeightPolicy::Linear => queue_length as f64,
            WeightPolicy::Power(p) => (queue_length as f64).powi(p as i32),
            WeightPolicy::Log => ((queue_length + 1) as f64).log2(),
            WeightPolicy::Infinite => f64::INFINITY,
            WeightPolicy::Custom(f) => f(queue_length),
        }
    }

    /// Whether sampling should degrade to max-selection.
    pub fn is_infinite(&self) -> bool {
        self.weight(0) == f64::INFINITY
    }

    /// Check the weight-function contract.
    ///
    /// Built-in policies hold by construction, except `Power(0)` (whose
    /// `f(0) = 1`) and exponents past [`MAX_EXPONENT`], where `n^p` leaves
    /// the finite range of `f64`. Custom functions are checked on `0..=1024`.
    ///
    /// # Errors
    ///
    /// `UnsupportedExponent` for `Power(0)` and `Power(p > 6)`.
    /// `MalformedWeight` for a custom function that is negative, NaN,
    /// decreasing, infinite past zero, or has `f(0)` other than 0 or +inf.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            WeightPolicy::Power(p) if p == 0 || p > MAX_EXPONENT => {
                Err(ConfigError::UnsupportedExponent(i32::try_from(p).unwrap_or(i32::MAX)))
            }
            WeightPolicy::Custom(f) => validate_custom(f),
            _ => Ok(()),
        }
    }
}

fn validate_custom(f: WeightFn) -> Result<(), ConfigError> {
    let at_zero = f(0);
    if at_zero == f64::INFINITY {
        return Ok(());
    }
    if at_zero != 0.0 {
        return Err(ConfigError::MalformedWeight { queue_length: 0, weight: at_zero });
    }

    let mut previous = at_zero;
    for queue_length in 1..=VALIDATION_LIMIT {
        let weight = f(queue_length);
        if !weight.is_finite() || weight < previous {
            return Err(ConfigError::MalformedWeight { queue_length, weight });
        }
        previous = weight;
    }
    Ok(())
}

impl fmt::Display for WeightPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightPolicy::Linear => write!(f, "n"),
            WeightPolicy::Power(p) => write!(f, "n^{}", p),
            WeightPolicy::Log => write!(f, "log(n+1)"),
            WeightPolicy::Infinite => write!(f, "n^{{inf}}"),
            WeightPolicy::Custom(_) => write!(f, "custom"),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
