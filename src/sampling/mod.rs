//! Randomized helpers shared by every randomized scheduler.
//!
//! - [`WeightPolicy`]: queue length → sampling weight
//! - [`WeightedSampler`]: cumulative-distribution sampler with the infinite
//!   (max-selection) special case
//! - [`random_permutation`]: uniform visiting order for ports

mod weight;
mod sampler;

pub use weight::{WeightFn, WeightPolicy};
pub use sampler::WeightedSampler;

use rand::seq::SliceRandom;
use rand::Rng;

/// Fill `perm` with a uniformly random permutation of `0..perm.len()`.
///
/// # Example
///
/// ```
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use voq_sched::sampling::random_permutation;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(1);
/// let mut perm = vec![0; 5];
/// random_permutation(&mut perm, &mut rng);
///
/// let mut sorted = perm.clone();
/// sorted.sort();
/// assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
/// ```
pub fn random_permutation<R: Rng + ?Sized>(perm: &mut [usize], rng: &mut R) {
    for (i, slot) in perm.iter_mut().enumerate() {
        *slot = i;
    }
    perm.shuffle(rng);
}
