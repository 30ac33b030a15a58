//! Weighted random load balancer over a filtered instance list.

use rand::Rng;

use crate::error::{ClientError, Result};
use crate::model::Instance;

/// Source of uniform randomness the balancer draws from. Implemented for
/// any `rand::Rng`; tests supply a seeded `StdRng` to assert exact
/// selection sequences while production uses `rand::rng()`.
pub trait RandomSource {
    /// Uniform draw in `[0, upper)`.
    fn next_in_range(&mut self, upper: f64) -> f64;
}

impl<T: Rng + ?Sized> RandomSource for T {
    fn next_in_range(&mut self, upper: f64) -> f64 {
        self.random_range(0.0..upper)
    }
}

/// Pick one instance by weight from `instances`, which must already be
/// filtered to the candidates eligible for selection (`enabled && healthy`).
///
/// total = Σweight; draw r uniform in [0, total); walk the list subtracting
/// each weight from r, returning the first instance at which r goes
/// negative. Fails if the list is empty or every weight is zero.
pub fn choose<R: RandomSource>(instances: &[Instance], rng: &mut R) -> Result<Instance> {
    if instances.is_empty() {
        return Err(ClientError::InvalidArgument(
            "no instances available for selection".to_string(),
        ));
    }

    let total: f64 = instances.iter().map(|i| i.weight.max(0.0)).sum();
    if total <= 0.0 {
        return Err(ClientError::InvalidArgument(
            "all candidate instances have zero weight".to_string(),
        ));
    }

    let mut r = rng.next_in_range(total);
    for instance in instances {
        r -= instance.weight.max(0.0);
        if r < 0.0 {
            return Ok(instance.clone());
        }
    }

    // Floating point rounding can leave r non-negative after the walk;
    // the last instance is the correct fallback.
    Ok(instances.last().unwrap().clone())
}
