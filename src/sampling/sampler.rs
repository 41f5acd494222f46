//! Cumulative-distribution sampling over queue lengths.
//!
//! ## Algorithm
//!
//! 1. Transform every queue length through the weight policy and build the
//!    running sum `cumsum[i] = f(w[0]) + ... + f(w[i])`.
//! 2. If the total is zero, there is nothing to pick: return `None`.
//! 3. Draw `u` uniformly in `[0, 1)` and return the first `i` with
//!    `u * total < cumsum[i]`.
//!
//! Under the infinite policy the transform is skipped: the candidates are
//! scanned in a uniformly random order and the first strict maximum of the
//! raw queue lengths wins, which breaks ties uniformly without sorting.
//! The same max-selection is used when the transformed total overflows to
//! +inf, since proportional sampling is meaningless there.
//!
//! The cumulative-sum and permutation buffers are owned by the sampler and
//! reused across calls.

use rand::Rng;

use crate::sampling::{random_permutation, WeightPolicy};

/// Weighted index sampler bound to one weight policy.
///
/// ## Example
///
/// ```
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use voq_sched::sampling::{WeightPolicy, WeightedSampler};
///
/// let mut rng = ChaCha8Rng::seed_from_u64(7);
/// let mut sampler = WeightedSampler::new(WeightPolicy::Linear);
///
/// assert_eq!(sampler.sample(&[0, 0, 4], &mut rng), Some(2));
/// assert_eq!(sampler.sample(&[0, 0, 0], &mut rng), None);
/// ```
#[derive(Debug, Clone)]
pub struct WeightedSampler {
    policy: WeightPolicy,

    /// Resolved once: max-selection instead of proportional sampling
    infinite: bool,

    cumsum: Vec<f64>,
    order: Vec<usize>,
}

impl WeightedSampler {
    /// Create a sampler for `policy`
    pub fn new(policy: WeightPolicy) -> Self {
        Self {
            policy,
            infinite: policy.is_infinite(),
            cumsum: Vec::new(),
            order: Vec::new(),
        }
    }

    /// The policy this sampler applies
    pub fn policy(&self) -> WeightPolicy {
        self.policy
    }

    /// Draw an index with probability proportional to `f(weights[i])`.
    ///
    /// # Returns
    ///
    /// `None` when every weight is zero (or `weights` is empty).
    pub fn sample<R: Rng + ?Sized>(&mut self, weights: &[u64], rng: &mut R) -> Option<usize> {
        if weights.is_empty() {
            return None;
        }
        if self.infinite {
            return self.sample_max(weights, rng);
        }

        self.cumsum.clear();
        let mut total = 0.0;
        let mut last_positive = None;
        for (i, &w) in weights.iter().enumerate() {
            let f = self.policy.weight(w);
            if f > 0.0 {
                last_positive = Some(i);
            }
            total += f;
            self.cumsum.push(total);
        }
        if total <= 0.0 {
            return None;
        }
        if !total.is_finite() {
            return self.sample_max(weights, rng);
        }

        // `u * total` can round up to `total`; fall back to the last index
        // that carries weight.
        let target = rng.gen::<f64>() * total;
        self.cumsum
            .iter()
            .position(|&c| target < c)
            .or(last_positive)
    }

    /// Draw one of `items`, where `weights[j]` is the queue length behind
    /// `items[j]`.
    pub fn sample_from<R: Rng + ?Sized>(
        &mut self,
        items: &[usize],
        weights: &[u64],
        rng: &mut R,
    ) -> Option<usize> {
        debug_assert_eq!(items.len(), weights.len());
        self.sample(weights, rng).map(|j| items[j])
    }

    fn sample_max<R: Rng + ?Sized>(&mut self, weights: &[u64], rng: &mut R) -> Option<usize> {
        self.order.resize(weights.len(), 0);
        random_permutation(&mut self.order, rng);

        let mut best = None;
        let mut best_weight = 0;
        for &i in &self.order {
            if weights[i] > best_weight {
                best = Some(i);
                best_weight = weights[i];
            }
        }
        best
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
