//! C4: the growth engine — turns a stream of demand-map candidates into a
//! connected, hydraulically consistent vascular tree.

use crate::config::Config;
use crate::demand_map::DemandMap;
use crate::error::GrowthError;
use crate::hydraulics;
use crate::linalg;
use crate::node_table::{NodeKind, NodeTable};
use crate::supply_kernel::SupplyKernel;
use rand::Rng;

/// Consecutive candidate rejections tolerated before giving up, as long as
/// the tree still has fewer than three nodes; past that point the tree is
/// considered established and rejections are just normal backpressure from
/// a shrinking demand map.
const STARVATION_LIMIT: u32 = 50;

pub struct GrowthEngine<'a, K: SupplyKernel, R: Rng> {
    nodes: NodeTable,
    map: DemandMap,
    kernel: &'a K,
    config: &'a Config,
    rng: R,
    qterm: f64,
}

impl<'a, K: SupplyKernel, R: Rng> GrowthEngine<'a, K, R> {
    pub fn new(config: &'a Config, map: DemandMap, kernel: &'a K, rng: R) -> Self {
        let qterm = config.perfusion_flow / config.target_nodes as f64;
        let nodes = NodeTable::new(config.map.perfusion_point, config.perfusion_flow);
        Self {
            nodes,
            map,
            kernel,
            config,
            rng,
            qterm,
        }
    }

    pub fn into_nodes(self) -> NodeTable {
        self.nodes
    }

    /// Grow the tree until `target_nodes` terminals are placed.
    pub fn build_tree(&mut self) -> Result<(), GrowthError> {
        let mut accepted: u32 = 0;
        let mut failures: u32 = 0;
        while accepted < self.config.target_nodes {
            let total = self.map.sum();
            if total <= 0.0 {
                return Err(GrowthError::GrowthStarved);
            }
            let candidate = self.map.candidate(total, &mut self.rng);
            if self.connect_candidate(candidate, 20) {
                self.map.apply_candidate(candidate, self.kernel);
                accepted += 1;
                failures = 0;
                tracing::info!(accepted, target = self.config.target_nodes, "accepted candidate");
            } else {
                failures += 1;
                if failures >= STARVATION_LIMIT && accepted < 3 {
                    tracing::warn!(failures, "growth starved before reaching a stable tree");
                    return Err(GrowthError::GrowthStarved);
                }
            }
        }
        Ok(())
    }

    fn in_volume(&self, p: [f64; 3]) -> bool {
        let dims = self.map.dims();
        (0..3).all(|axis| p[axis] >= 0.0 && p[axis] < dims[axis] as f64)
    }

    /// Is `p` at least `min_distance` from every existing segment except
    /// (optionally) the one being displaced by a trial move?
    fn validate_candidate(&self, p: [f64; 3], ignore: Option<usize>) -> bool {
        for seg in 1..self.nodes.len() {
            if Some(seg) == ignore {
                continue;
            }
            if self.point_segment_distance(p, seg) < self.config.min_distance {
                return false;
            }
        }
        true
    }

    /// Shortest distance from `p` to the segment connecting node `seg` to
    /// its parent.
    fn point_segment_distance(&self, p: [f64; 3], seg: usize) -> f64 {
        let b = self.nodes.get(seg).position;
        let a = self.nodes.get(self.nodes.get(seg).parent as usize).position;
        let ab = linalg::sub(&a, &b);
        let ap = linalg::sub(&a, &p);
        let len_sq = linalg::mag(&ab).powi(2);
        if len_sq == 0.0 {
            return linalg::distance(&p, &a);
        }
        let t = (ap[0] * ab[0] + ap[1] * ab[1] + ap[2] * ab[2]) / len_sq;
        let t = t.clamp(0.0, 1.0);
        let closest = [a[0] + t * ab[0], a[1] + t * ab[1], a[2] + t * ab[2]];
        linalg::distance(&p, &closest)
    }

    /// Sum over every non-root node of `L^mu * r^lambda`; the functional
    /// the local optimizer minimizes.
    fn fitness(&self) -> f64 {
        let mut total = 0.0;
        for i in 1..self.nodes.len() {
            let node = self.nodes.get(i);
            let length = linalg::distance(&node.position, &self.nodes.get(node.parent as usize).position);
            total += length.powf(self.config.mu) * node.radius.max(1e-12).powf(self.config.lambda);
        }
        total
    }

    /// Attempt to connect `p` to the tree. Returns whether a connection was
    /// made.
    fn connect_candidate(&mut self, p: [f64; 3], steps: u32) -> bool {
        if !self.validate_candidate(p, None) {
            return false;
        }
        if self.nodes.len() == 1 {
            if !self.map.visible(self.nodes.get(0).position, p) {
                return false;
            }
            self.connect_point(p, 0, None);
            return true;
        }

        let mut distances: Vec<(usize, f64)> = (1..self.nodes.len())
            .map(|seg| (seg, self.point_segment_distance(p, seg)))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));
        let take = (self.config.closest_neighbours as usize).min(distances.len());

        let mut best: Option<(usize, [f64; 3], f64)> = None;
        for &(seg, _) in distances.iter().take(take) {
            if let Some((bif, fit)) = self.local_optimization(p, seg, steps) {
                if best.map_or(true, |(_, _, best_fit)| fit < best_fit) {
                    best = Some((seg, bif, fit));
                }
            }
        }

        match best {
            Some((seg, bif, _)) => {
                self.connect_point(p, seg, Some(bif));
                true
            }
            None => false,
        }
    }

    /// Splice a new terminal at `p` into the tree, either as the very first
    /// vessel off the root (`seg == 0`) or via a fresh bifurcation inserted
    /// along `seg`'s incoming edge at `bif`.
    fn connect_point(&mut self, p: [f64; 3], seg: usize, bif: Option<[f64; 3]>) {
        if seg == 0 {
            let term = self.nodes.append(p, NodeKind::Term, 0, self.qterm);
            self.nodes.set_left(0, term as i64);
            self.nodes.set_right(0, term as i64);
            hydraulics::calculate_reduced_resistance(&mut self.nodes, term, self.config.rho);
            return;
        }

        let bif_pos = bif.expect("bifurcation point required for a non-root connection");
        let bif_id = self.nodes.len();
        let new_id = bif_id + 1;
        let old_parent = self.nodes.get(seg).parent;

        self.nodes.set_parent(seg, bif_id as i64);
        if self.nodes.get(old_parent as usize).left == seg as i64 {
            self.nodes.set_left(old_parent as usize, bif_id as i64);
        }
        if self.nodes.get(old_parent as usize).right == seg as i64 {
            self.nodes.set_right(old_parent as usize, bif_id as i64);
        }
        if old_parent > 0 {
            self.increment_flow(old_parent as usize, self.qterm);
        }

        let seg_flow = self.nodes.get(seg).flow;
        let bif_id_check = self
            .nodes
            .append(bif_pos, NodeKind::Bif, old_parent, seg_flow + self.qterm);
        debug_assert_eq!(bif_id_check, bif_id);
        self.nodes.set_left(bif_id, seg as i64);
        self.nodes.set_right(bif_id, new_id as i64);

        let new_id_check = self.nodes.append(p, NodeKind::Term, bif_id as i64, self.qterm);
        debug_assert_eq!(new_id_check, new_id);

        hydraulics::calculate_reduced_resistance(&mut self.nodes, seg, self.config.rho);
        self.update_at_bifurcation(bif_id, new_id);
    }

    fn increment_flow(&mut self, id: usize, delta: f64) {
        let new_flow = self.nodes.get(id).flow + delta;
        self.nodes.set_flow(id, new_flow);
        let parent = self.nodes.get(id).parent;
        if parent > 0 {
            self.increment_flow(parent as usize, delta);
        }
    }

    fn update_at_bifurcation(&mut self, bif_id: usize, new_child: usize) {
        hydraulics::calculate_reduced_resistance(&mut self.nodes, new_child, self.config.rho);
        if self.nodes.get(bif_id).kind == NodeKind::Root {
            return;
        }
        hydraulics::calculate_ratios(&mut self.nodes, bif_id, self.config.gamma);
        hydraulics::calculate_reduced_resistance(&mut self.nodes, bif_id, self.config.rho);
        let parent = self.nodes.get(bif_id).parent;
        if parent > 0 {
            self.update_at_bifurcation(parent as usize, bif_id);
        }
    }

    /// Coordinate-descent search for the best bifurcation point along
    /// `seg`'s incoming edge for a candidate terminal at `p`.
    ///
    /// Returns `None` only when the initial midpoint guess is not visible
    /// from `p` or falls outside the volume; otherwise always returns a
    /// result, even if no neighbor ever improved on the starting guess (in
    /// which case the fitness is left at its sentinel maximum, matching the
    /// reference implementation).
    fn local_optimization(&mut self, p: [f64; 3], seg: usize, steps: u32) -> Option<([f64; 3], f64)> {
        let parent_pos = self.nodes.get(self.nodes.get(seg).parent as usize).position;
        let seg_pos = self.nodes.get(seg).position;
        let mut bif = linalg::midpoint(&parent_pos, &seg_pos);

        if !self.map.visible(bif, p) || !self.in_volume(bif) {
            return None;
        }

        let step = ((parent_pos[0] + seg_pos[0] + p[0]) / 3.0 - bif[0]
            + (parent_pos[1] + seg_pos[1] + p[1]) / 3.0 - bif[1]
            + (parent_pos[2] + seg_pos[2] + p[2]) / 3.0 - bif[2])
            * 2.0
            / steps as f64;

        let mut best_fitness = f64::MAX;

        for _ in 0..steps {
            let mut local_best = bif;
            let mut local_best_fitness = best_fitness;
            for axis in 0..3 {
                for &sign in &[1.0, -1.0] {
                    let mut test = bif;
                    test[axis] += sign * step;
                    if !self.in_volume(test) {
                        continue;
                    }
                    if !self.map.visible(parent_pos, test)
                        || !self.map.visible(seg_pos, test)
                        || !self.map.visible(p, test)
                    {
                        continue;
                    }
                    if !self.validate_candidate(test, Some(seg)) {
                        continue;
                    }

                    self.nodes.start_undo();
                    self.connect_point(p, seg, Some(test));
                    hydraulics::calculate_radius(&mut self.nodes, self.config.perfusion_pressure, self.config.terminal_pressure);
                    let fit = self.fitness();
                    self.nodes.apply_undo();
                    self.nodes.stop_undo();

                    if fit < local_best_fitness {
                        local_best_fitness = fit;
                        local_best = test;
                    }
                }
            }
            if local_best == bif {
                break;
            }
            bif = local_best;
            best_fitness = local_best_fitness;
        }

        Some((bif, best_fitness))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapGeometry;
    use crate::supply_kernel::GaussianKernel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tiny_config() -> Config {
        Config {
            root_radius: 1.0,
            output_bounding_box: [1.0, 1.0, 1.0],
            rotation: [0.0, 0.0, 0.0],
            myocardium_thickness: 0.25,
            perfusion_pressure: 100.0,
            terminal_pressure: 10.0,
            perfusion_flow: 8.0,
            rho: 1.0,
            gamma: 3.0,
            lambda: 1.0,
            mu: 1.0,
            min_distance: 1.0,
            target_nodes: 4,
            closest_neighbours: 3,
            random_seed: 7,
            axial_refinement: 5,
            map: MapGeometry {
                bounding_box: [24, 24, 24],
                perfusion_point: [12.0, 12.0, 20.0],
                centroid: [0.0, 12.0, 0.0],
            },
        }
    }

    #[test]
    fn build_tree_reaches_the_target_node_count() {
        let config = tiny_config();
        let map = DemandMap::ellipsoidal_shell(&config.map, config.myocardium_thickness).unwrap();
        let kernel = GaussianKernel::from_min_distance(config.min_distance);
        let rng = StdRng::seed_from_u64(config.random_seed as u64);
        let mut engine = GrowthEngine::new(&config, map, &kernel, rng);
        engine.build_tree().unwrap();
        let nodes = engine.into_nodes();
        let terminals = (1..nodes.len())
            .filter(|&i| nodes.get(i).kind == NodeKind::Term)
            .count();
        assert_eq!(terminals, config.target_nodes as usize);
    }

    #[test]
    fn same_seed_produces_the_same_tree() {
        let config = tiny_config();
        let run = || {
            let map = DemandMap::ellipsoidal_shell(&config.map, config.myocardium_thickness).unwrap();
            let kernel = GaussianKernel::from_min_distance(config.min_distance);
            let rng = StdRng::seed_from_u64(config.random_seed as u64);
            let mut engine = GrowthEngine::new(&config, map, &kernel, rng);
            engine.build_tree().unwrap();
            let nodes = engine.into_nodes();
            (1..nodes.len()).map(|i| nodes.get(i).position).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
