//! C2: the supply kernel — how much an accepted candidate suppresses demand
//! in its surroundings.

/// A supply kernel must be monotone non-increasing in distance, approach 1
/// far from the candidate, and never exceed 1 near it (so it can only
/// reduce demand, never amplify it).
pub trait SupplyKernel {
    fn reduce(&self, candidate: [f64; 3], voxel: [f64; 3]) -> f64;
}

/// Smooth Gaussian falloff: `K(cand, voxel) = 1 - exp(-d^2 / (2 * sigma^2))`.
///
/// `sigma` controls how far suppression reaches; see
/// [`GaussianKernel::from_min_distance`] for the default calibration used by
/// [`crate::grow`].
pub struct GaussianKernel {
    pub sigma: f64,
}

impl GaussianKernel {
    /// Choose `sigma` so that a voxel exactly `min_distance` away from an
    /// accepted candidate has its demand roughly halved.
    pub fn from_min_distance(min_distance: f64) -> Self {
        let sigma = if min_distance > 0.0 {
            min_distance / (2.0 * std::f64::consts::LN_2).sqrt()
        } else {
            1.0
        };
        Self { sigma }
    }
}

impl SupplyKernel for GaussianKernel {
    fn reduce(&self, candidate: [f64; 3], voxel: [f64; 3]) -> f64 {
        let d = crate::linalg::distance(&candidate, &voxel);
        1.0 - (-(d * d) / (2.0 * self.sigma * self.sigma)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_is_monotone_in_distance() {
        let kernel = GaussianKernel { sigma: 4.0 };
        let cand = [0.0, 0.0, 0.0];
        let near = kernel.reduce(cand, [1.0, 0.0, 0.0]);
        let far = kernel.reduce(cand, [10.0, 0.0, 0.0]);
        assert!(near < far);
        assert!(far <= 1.0);
    }

    #[test]
    fn at_candidate_reduction_is_zero() {
        let kernel = GaussianKernel { sigma: 4.0 };
        let cand = [1.0, 2.0, 3.0];
        assert_eq!(kernel.reduce(cand, cand), 0.0);
    }

    #[test]
    fn from_min_distance_halves_demand_at_that_distance() {
        let kernel = GaussianKernel::from_min_distance(5.0);
        let reduction = kernel.reduce([0.0, 0.0, 0.0], [5.0, 0.0, 0.0]);
        assert!((reduction - 0.5).abs() < 1e-9);
    }
}
