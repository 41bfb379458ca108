//! Engine configuration.
//!
//! Everything the growth engine needs to run lives in [`Config`], constructed
//! once (by the CLI, or by an embedding application) and threaded through the
//! rest of the crate. Nothing here is a `static`/process-global: the internal
//! map geometry that the original tool hardcoded as file-scope constants is a
//! field of [`MapGeometry`] instead, so multiple configurations can coexist
//! in the same process.

use serde::{Deserialize, Serialize};

/// The internal voxel grid geometry used to build the demand map.
///
/// These three values were hardcoded constants in the reference
/// implementation (`GRID_SIZE`, the perfusion voxel, and the myocardium
/// centroid). They are kept as plain data here instead, per this crate's
/// rule against process-global state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapGeometry {
    /// Dimensions of the internal voxel grid, `(Dx, Dy, Dz)`.
    pub bounding_box: [usize; 3],
    /// Voxel coordinates of the perfusion point (the tree's single inlet).
    pub perfusion_point: [f64; 3],
    /// Voxel coordinates of the myocardium's ellipsoid centroid.
    pub centroid: [f64; 3],
}

impl Default for MapGeometry {
    fn default() -> Self {
        Self {
            bounding_box: [256, 512, 512],
            perfusion_point: [238.0, 256.0, 512.0],
            centroid: [0.0, 256.0, 0.0],
        }
    }
}

/// How an angle-valued CLI flag is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngleUnit {
    Degree,
    Radian,
}

/// Fully parsed, validated engine configuration.
///
/// Field names loosely follow the CLI flag they come from (see
/// `main.rs`'s `--rr`, `--am`, etc.) but all angle-valued fields here are
/// already converted to radians regardless of the unit the user typed them
/// in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root vessel radius, in the output's physical units.
    pub root_radius: f64,
    /// Output bounding box, in the output's physical units.
    pub output_bounding_box: [f64; 3],
    /// Euler rotation (x, y, z), in radians.
    pub rotation: [f64; 3],
    /// Myocardium wall thickness, as a fraction of the ellipsoid radius.
    pub myocardium_thickness: f64,
    /// Perfusion (root) pressure.
    pub perfusion_pressure: f64,
    /// Terminal pressure at each leaf.
    pub terminal_pressure: f64,
    /// Total flow delivered at the root.
    pub perfusion_flow: f64,
    /// Blood viscosity coefficient used by Poiseuille resistance.
    pub rho: f64,
    /// Murray's law bifurcation exponent.
    pub gamma: f64,
    /// Fitness functional length exponent.
    pub lambda: f64,
    /// Fitness functional radius exponent.
    pub mu: f64,
    /// Minimum allowed distance between any two segments.
    pub min_distance: f64,
    /// Number of terminal nodes to grow.
    pub target_nodes: u32,
    /// Number of nearest segments considered per candidate.
    pub closest_neighbours: u32,
    /// Seed for the deterministic PRNG; non-positive means "pick one".
    pub random_seed: i64,
    /// Number of samples per spline sub-segment.
    pub axial_refinement: u32,
    /// Internal voxel grid geometry.
    pub map: MapGeometry,
}

impl MapGeometry {
    /// Load a geometry override from a JSON file, in the same spirit as the
    /// reference tool's project save files. Absent this flag, callers get
    /// [`MapGeometry::default`].
    pub fn load(path: &str) -> Result<Self, crate::error::GrowthError> {
        let text = std::fs::read_to_string(path).map_err(|e| crate::error::GrowthError::ParseFailure {
            flag: "--map".to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| crate::error::GrowthError::ParseFailure {
            flag: "--map".to_string(),
            reason: e.to_string(),
        })
    }
}

impl Config {
    /// Sanity-check the ranges that would otherwise make growth undefined.
    /// This is a boundary check on user-supplied input, not a defensive
    /// measure against internal misuse.
    pub fn validate(&self) -> Result<(), crate::error::GrowthError> {
        let mut missing = Vec::new();
        if self.target_nodes == 0 {
            missing.push("nn (target node count must be >= 1)".to_string());
        }
        if self.closest_neighbours == 0 {
            missing.push("cn (closest-neighbour count must be >= 1)".to_string());
        }
        if self.rho <= 0.0 {
            missing.push("r (blood viscosity must be > 0)".to_string());
        }
        if self.perfusion_pressure <= self.terminal_pressure {
            missing.push("pp/tp (perfusion pressure must exceed terminal pressure)".to_string());
        }
        if !missing.is_empty() {
            return Err(crate::error::GrowthError::ConfigurationIncomplete { missing });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_geometry_matches_reference_tool() {
        let geom = MapGeometry::default();
        assert_eq!(geom.bounding_box, [256, 512, 512]);
        assert_eq!(geom.perfusion_point, [238.0, 256.0, 512.0]);
        assert_eq!(geom.centroid, [0.0, 256.0, 0.0]);
    }

    #[test]
    fn map_geometry_round_trips_through_json() {
        let geom = MapGeometry { bounding_box: [10, 20, 30], perfusion_point: [1.0, 2.0, 3.0], centroid: [0.0, 10.0, 0.0] };
        let json = serde_json::to_string(&geom).unwrap();
        let path = std::env::temp_dir().join("vastree_test_map_geometry.json");
        std::fs::write(&path, &json).unwrap();
        let loaded = MapGeometry::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, geom);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn map_geometry_load_reports_parse_failure_for_malformed_json() {
        let path = std::env::temp_dir().join("vastree_test_map_geometry_bad.json");
        std::fs::write(&path, "not json").unwrap();
        let result = MapGeometry::load(path.to_str().unwrap());
        assert!(matches!(result, Err(crate::error::GrowthError::ParseFailure { .. })));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn map_geometry_load_reports_parse_failure_not_emission_failure_for_missing_file() {
        let result = MapGeometry::load("/nonexistent/vastree_test_map_geometry_missing.json");
        assert!(matches!(result, Err(crate::error::GrowthError::ParseFailure { ref flag, .. }) if flag == "--map"));
    }
}
