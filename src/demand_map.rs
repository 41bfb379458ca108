//! C1: the demand map — the voxel grid a tree is grown to perfuse.
//!
//! `M0` is the fixed "is this voxel inside the myocardium" mask built once at
//! construction time; `M` is the mutable effective demand that shrinks every
//! time a candidate is accepted and its surrounding region is partially
//! suppressed by the supply kernel.

use crate::config::MapGeometry;
use crate::error::GrowthError;
use crate::supply_kernel::SupplyKernel;
use rand::Rng;

pub struct DemandMap {
    dims: [usize; 3],
    original: Vec<f64>,
    effective: Vec<f64>,
}

impl DemandMap {
    fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.dims[1] + j) * self.dims[2] + k
    }

    /// Build the ellipsoidal-shell demand map used by the reference tool:
    /// a voxel is active iff it falls within the myocardium wall, an
    /// ellipsoidal shell of the given fractional thickness centered on
    /// `geom.centroid` and sized by `geom.bounding_box`.
    ///
    /// The `k -> Dz - k` reflection mirrors the reference implementation,
    /// which builds the ellipsoid from the far face of the grid inward.
    pub fn ellipsoidal_shell(geom: &MapGeometry, wall_thickness: f64) -> Result<Self, GrowthError> {
        let dims = geom.bounding_box;
        let mut original = vec![0.0; dims[0] * dims[1] * dims[2]];
        let outer = 1.0;
        let inner = (1.0 - wall_thickness).powi(2);

        for i in 0..dims[0] {
            for j in 0..dims[1] {
                for k in 0..dims[2] {
                    let kk = dims[2] - k;
                    let fi = (i as f64 - geom.centroid[0]) / (dims[0] as f64 - geom.centroid[0]);
                    let fj = (j as f64 - geom.centroid[1]) / (dims[1] as f64 - geom.centroid[1]);
                    let fk = (kk as f64 - geom.centroid[2]) / (dims[2] as f64 - geom.centroid[2]);
                    let val = fi * fi + fj * fj + fk * fk;
                    if val < outer && val > inner {
                        let index = (i * dims[1] + j) * dims[2] + k;
                        original[index] = 1.0;
                    }
                }
            }
        }

        let map = Self {
            dims,
            effective: original.clone(),
            original,
        };

        let pp = geom.perfusion_point;
        if pp[0] < 0.0 || pp[1] < 0.0 || pp[2] < 0.0 {
            return Err(GrowthError::PerfusionOutsideVolume);
        }
        // The perfusion point sits on the myocardium's outer surface, so a
        // coordinate exactly at the grid edge is clamped into the last
        // voxel rather than rejected as one-past-the-end.
        let pi = (pp[0] as usize).min(dims[0] - 1);
        let pj = (pp[1] as usize).min(dims[1] - 1);
        let pk = (pp[2] as usize).min(dims[2] - 1);
        if map.original[map.idx(pi, pj, pk)] <= 0.0 {
            return Err(GrowthError::PerfusionOutsideVolume);
        }

        Ok(map)
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Total remaining demand across every active voxel.
    pub fn sum(&self) -> f64 {
        self.effective.iter().sum()
    }

    /// Draw a weighted candidate voxel. Scans in lexicographic (i, j, k)
    /// order: the scan order is part of the reproducibility contract given
    /// a fixed seed, not an implementation detail.
    pub fn candidate<R: Rng + ?Sized>(&self, total: f64, rng: &mut R) -> [f64; 3] {
        let u: f64 = rng.gen_range(0.0..total);
        let mut acc = 0.0;
        for i in 0..self.dims[0] {
            for j in 0..self.dims[1] {
                for k in 0..self.dims[2] {
                    acc += self.effective[self.idx(i, j, k)];
                    if acc >= u {
                        return [i as f64, j as f64, k as f64];
                    }
                }
            }
        }
        [
            (self.dims[0] - 1) as f64,
            (self.dims[1] - 1) as f64,
            (self.dims[2] - 1) as f64,
        ]
    }

    /// Multiply every active voxel's remaining demand by the kernel's
    /// reduction factor for the just-accepted candidate `v`.
    pub fn apply_candidate(&mut self, v: [f64; 3], kernel: &dyn SupplyKernel) {
        for i in 0..self.dims[0] {
            for j in 0..self.dims[1] {
                for k in 0..self.dims[2] {
                    let index = self.idx(i, j, k);
                    if self.original[index] > 0.0 {
                        let voxel = [i as f64, j as f64, k as f64];
                        self.effective[index] *= kernel.reduce(v, voxel);
                    }
                }
            }
        }
    }

    /// 3D DDA visibility test: can `a` see `b` without the line of sight
    /// crossing an inactive (opaque) voxel?
    ///
    /// Steps voxel-boundary to voxel-boundary: at each iteration, for every
    /// axis `i` it computes the fraction of `vect = b - a` needed to reach
    /// the next half-voxel boundary ahead, advances by the smallest such
    /// fraction across all three axes, and re-rounds to the voxel that
    /// lands in. A degenerate (zero) fraction is perturbed by a factor of
    /// `1 + 1e-9` until it clears zero, same as the reference implementation.
    pub fn visible(&self, a: [f64; 3], b: [f64; 3]) -> bool {
        let vect = crate::linalg::sub(&a, &b);
        let mut pos = a;
        let round_voxel = |p: [f64; 3]| {
            [p[0].round(), p[1].round(), p[2].round()]
        };
        let mut voxel = round_voxel(pos);
        let target_voxel = round_voxel(b);

        while voxel != target_voxel
            && !(0..3).all(|axis| (pos[axis] - b[axis]).abs() < 1e-10)
        {
            let mut mult = f64::MAX;
            for axis in 0..3 {
                let mut half_step = if vect[axis] < 0.0 { -0.5 } else { 0.5 };
                let mut single = ((voxel[axis] - pos[axis] + half_step) / vect[axis]).abs();
                while single == 0.0 {
                    half_step *= 1.000_000_001;
                    single = ((voxel[axis] - pos[axis] + half_step) / vect[axis]).abs();
                }
                if single < mult {
                    mult = single;
                }
            }

            for axis in 0..3 {
                pos[axis] += mult * vect[axis];
            }
            voxel = round_voxel(pos);

            let vx = voxel[0].clamp(0.0, (self.dims[0] - 1) as f64) as usize;
            let vy = voxel[1].clamp(0.0, (self.dims[1] - 1) as f64) as usize;
            let vz = voxel[2].clamp(0.0, (self.dims[2] - 1) as f64) as usize;
            if self.original[self.idx(vx, vy, vz)] <= 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supply_kernel::GaussianKernel;

    fn small_geom() -> MapGeometry {
        MapGeometry {
            bounding_box: [16, 16, 16],
            perfusion_point: [8.0, 8.0, 13.0],
            centroid: [0.0, 8.0, 0.0],
        }
    }

    #[test]
    fn ellipsoidal_shell_rejects_perfusion_point_outside_volume() {
        let mut geom = small_geom();
        geom.perfusion_point = [0.0, 0.0, 0.0];
        let result = DemandMap::ellipsoidal_shell(&geom, 0.25);
        assert!(matches!(result, Err(GrowthError::PerfusionOutsideVolume)));
    }

    #[test]
    fn ellipsoidal_shell_accepts_valid_geometry() {
        let geom = small_geom();
        let map = DemandMap::ellipsoidal_shell(&geom, 0.25).unwrap();
        assert!(map.sum() > 0.0);
    }

    #[test]
    fn apply_candidate_never_increases_demand() {
        let geom = small_geom();
        let mut map = DemandMap::ellipsoidal_shell(&geom, 0.25).unwrap();
        let before = map.sum();
        let kernel = GaussianKernel { sigma: 2.0 };
        map.apply_candidate(geom.perfusion_point, &kernel);
        assert!(map.sum() <= before);
    }

    #[test]
    fn visibility_is_symmetric_for_a_clear_line() {
        let geom = small_geom();
        let map = DemandMap::ellipsoidal_shell(&geom, 0.25).unwrap();
        let a = [8.0, 8.0, 13.0];
        let b = [8.0, 8.0, 10.0];
        assert_eq!(map.visible(a, b), map.visible(b, a));
    }
}
