//! C6: the spline refiner — decomposes the node table into longest-branch-
//! first paths and refines each with a Catmull-Rom spline, then applies the
//! tree-level translate/scale/rotate post-transforms.

use crate::linalg;
use crate::node_table::{NodeKind, NodeTable};
use std::collections::HashMap;

/// SWC record type codes, per the format this crate emits (C7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwcKind {
    Root,
    Bifurcation,
    Terminal,
    Interior,
}

impl SwcKind {
    pub fn code(self) -> i32 {
        match self {
            SwcKind::Root => 7,
            SwcKind::Bifurcation => 5,
            SwcKind::Terminal => 6,
            SwcKind::Interior => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SplineNode {
    pub index: u32,
    pub kind: SwcKind,
    pub position: [f64; 3],
    pub radius: f64,
    /// 1-based index of the parent sample, or -1 for the very first sample.
    pub parent: i64,
}

#[derive(Debug, Clone)]
pub struct SplineTree {
    pub nodes: Vec<SplineNode>,
}

impl SplineTree {
    pub fn translate_to_origin(&mut self, origin: [f64; 3]) {
        for n in &mut self.nodes {
            n.position = linalg::sub(&origin, &n.position);
        }
    }

    pub fn scale(&mut self, volume_scale: [f64; 3], root_radius_scale: f64) {
        for n in &mut self.nodes {
            for axis in 0..3 {
                n.position[axis] *= volume_scale[axis];
            }
            n.radius *= root_radius_scale;
        }
    }

    /// Euler XYZ rotation, matching the reference implementation's matrix
    /// convention.
    pub fn rotate(&mut self, x: f64, y: f64, z: f64) {
        let rot = [
            [
                y.cos() * z.cos(),
                -x.cos() * z.sin() + x.sin() * y.sin() * z.cos(),
                x.sin() * z.sin() + x.cos() * y.sin() * z.cos(),
            ],
            [
                y.cos() * z.sin(),
                x.cos() * z.cos() + x.sin() * y.sin() * z.sin(),
                -x.sin() * z.cos() + x.cos() * y.sin() * z.sin(),
            ],
            [-y.sin(), x.sin() * y.cos(), x.cos() * y.cos()],
        ];
        for n in &mut self.nodes {
            let p = n.position;
            for r in 0..3 {
                n.position[r] = rot[r][0] * p[0] + rot[r][1] * p[1] + rot[r][2] * p[2];
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusRule {
    Linear,
    Exponential,
}

type Coeffs = ([f64; 3], [f64; 3], [f64; 3], [f64; 3]);

fn catmull_rom_coeffs(p0: [f64; 3], p1: [f64; 3], p2: [f64; 3], p3: [f64; 3]) -> Coeffs {
    let mut a = [0.0; 3];
    let mut b = [0.0; 3];
    let mut c = [0.0; 3];
    for i in 0..3 {
        a[i] = -0.5 * p0[i] + 1.5 * p1[i] - 1.5 * p2[i] + 0.5 * p3[i];
        b[i] = p0[i] - 2.5 * p1[i] + 2.0 * p2[i] - 0.5 * p3[i];
        c[i] = -0.5 * p0[i] + 0.5 * p2[i];
    }
    (a, b, c, p1)
}

fn eval_catmull_rom(coeffs: &Coeffs, t: f64) -> [f64; 3] {
    let (a, b, c, d) = coeffs;
    let mut out = [0.0; 3];
    for i in 0..3 {
        out[i] = t.powi(3) * a[i] + t.powi(2) * b[i] + t * c[i] + d[i];
    }
    out
}

/// Longest-branch-first path decomposition, mirroring
/// `findAllBranchesFromNode` in the reference implementation: within each
/// call, find every root-to-terminal path starting at `from`, keep the
/// longest (breaking ties by the final segment's physical length), and
/// recurse into the unexplored sibling of every *interior* node on the
/// chosen path — skipping the path's own first element, since that glue
/// node's other child was already dispatched by whichever call recursed
/// into `from`. Skipping it is what keeps every non-root node covered
/// exactly once.
pub fn find_all_branches(nodes: &NodeTable, from: usize, out: &mut Vec<Vec<usize>>) {
    let seed = vec![nodes.get(from).parent as usize];
    let mut candidates = Vec::new();
    collect_paths(nodes, from, seed, &mut candidates);

    let mut longest: Vec<usize> = Vec::new();
    for path in &candidates {
        if path.len() > longest.len() {
            longest = path.clone();
        } else if path.len() == longest.len() && !longest.is_empty() {
            let len_path = final_segment_length(nodes, path);
            let len_longest = final_segment_length(nodes, &longest);
            if len_path > len_longest {
                longest = path.clone();
            }
        }
    }
    out.push(longest.clone());

    for l in 1..longest.len().saturating_sub(1) {
        let node_idx = longest[l];
        if nodes.get(node_idx).kind == NodeKind::Root {
            continue;
        }
        let chosen = longest[l + 1];
        let left = nodes.get(node_idx).left as usize;
        let right = nodes.get(node_idx).right as usize;
        if chosen == left {
            find_all_branches(nodes, right, out);
        } else if chosen == right {
            find_all_branches(nodes, left, out);
        }
    }
}

fn final_segment_length(nodes: &NodeTable, path: &[usize]) -> f64 {
    let last = *path.last().unwrap();
    let parent = nodes.get(last).parent;
    if parent < 0 {
        return 0.0;
    }
    linalg::distance(&nodes.get(last).position, &nodes.get(parent as usize).position)
}

fn collect_paths(nodes: &NodeTable, node: usize, mut branch: Vec<usize>, out: &mut Vec<Vec<usize>>) {
    branch.push(node);
    if nodes.get(node).kind == NodeKind::Term {
        out.push(branch);
        return;
    }
    let left = nodes.get(node).left as usize;
    collect_paths(nodes, left, branch.clone(), out);
    if nodes.get(node).kind != NodeKind::Root {
        let right = nodes.get(node).right as usize;
        collect_paths(nodes, right, branch, out);
    }
}

/// Refine the full node table into a flat, 1-indexed sample list ready for
/// SWC emission.
pub fn splinify(nodes: &NodeTable, axial_refinement: u32, radius_rule: RadiusRule) -> SplineTree {
    let root_vessel = nodes.get(0).left as usize;
    let mut paths = Vec::new();
    find_all_branches(nodes, root_vessel, &mut paths);

    let mut next_index: u32 = 1;
    let mut branch_point_index: HashMap<usize, i64> = HashMap::new();
    let mut out = Vec::new();

    for path in &paths {
        let mut prev_index: i64 = *branch_point_index.get(&path[0]).unwrap_or(&-1);

        for j in 0..path.len() - 1 {
            let cur = path[j];
            let nxt = path[j + 1];
            let is_root_sub = nodes.get(cur).kind == NodeKind::Root;
            let is_term_end = nodes.get(nxt).kind == NodeKind::Term;

            let p1 = nodes.get(cur).position;
            let p2 = nodes.get(nxt).position;
            let direction = linalg::unit(linalg::sub(&p1, &p2));

            let p0 = if is_root_sub {
                [p1[0] - 0.1 * direction[0], p1[1] - 0.1 * direction[1], p1[2] - 0.1 * direction[2]]
            } else {
                nodes.get(nodes.get(cur).parent as usize).position
            };
            let p3 = if is_term_end {
                [p2[0] + direction[0], p2[1] + direction[1], p2[2] + direction[2]]
            } else {
                nodes.get(path[j + 2]).position
            };

            let coeffs = catmull_rom_coeffs(p0, p1, p2, p3);
            let r1 = nodes.get(cur).radius;
            let r2 = nodes.get(nxt).radius;

            let refinement = axial_refinement.max(1);
            let t_vals: Vec<f64> = if refinement == 1 {
                vec![1.0]
            } else {
                let delta = 1.0 / (refinement as f64 - 1.0);
                let start = if is_root_sub { 0 } else { 1 };
                (start..refinement).map(|i| i as f64 * delta).collect()
            };

            let mut seg_prev = prev_index;
            let last_i = t_vals.len() - 1;
            for (i, &t) in t_vals.iter().enumerate() {
                let position = eval_catmull_rom(&coeffs, t);
                let radius = if i == last_i {
                    r2
                } else if is_root_sub {
                    r2
                } else {
                    match radius_rule {
                        RadiusRule::Linear => (1.0 - t) * r1 + t * r2,
                        RadiusRule::Exponential => r1 * (r2 / r1).powf(t),
                    }
                };
                let kind = if i == last_i {
                    if is_term_end {
                        SwcKind::Terminal
                    } else {
                        SwcKind::Bifurcation
                    }
                } else if is_root_sub && i == 0 {
                    SwcKind::Root
                } else {
                    SwcKind::Interior
                };

                out.push(SplineNode {
                    index: next_index,
                    kind,
                    position,
                    radius,
                    parent: seg_prev,
                });
                seg_prev = next_index as i64;
                next_index += 1;
            }
            prev_index = seg_prev;
            branch_point_index.insert(nxt, prev_index);
        }
    }

    SplineTree { nodes: out }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catmull_rom_passes_through_its_control_points() {
        let p0 = [0.0, 0.0, 0.0];
        let p1 = [1.0, 0.0, 0.0];
        let p2 = [2.0, 1.0, 0.0];
        let p3 = [3.0, 1.0, 0.0];
        let coeffs = catmull_rom_coeffs(p0, p1, p2, p3);
        assert_eq!(eval_catmull_rom(&coeffs, 0.0), p1);
        assert_eq!(eval_catmull_rom(&coeffs, 1.0), p2);
    }

    #[test]
    fn swc_type_codes_match_the_format() {
        assert_eq!(SwcKind::Root.code(), 7);
        assert_eq!(SwcKind::Bifurcation.code(), 5);
        assert_eq!(SwcKind::Terminal.code(), 6);
        assert_eq!(SwcKind::Interior.code(), 0);
    }

    #[test]
    fn single_vessel_splinifies_into_one_path() {
        let mut nodes = NodeTable::new([0.0, 0.0, 0.0], 1.0);
        let term = nodes.append([0.0, 0.0, 10.0], NodeKind::Term, 0, 1.0);
        nodes.set_left(0, term as i64);
        nodes.set_right(0, term as i64);
        nodes.set_radius(term, 0.5);

        let tree = splinify(&nodes, 4, RadiusRule::Linear);
        assert!(!tree.nodes.is_empty());
        assert_eq!(tree.nodes.first().unwrap().parent, -1);
        assert_eq!(tree.nodes.last().unwrap().kind, SwcKind::Terminal);
    }

    #[test]
    fn single_sample_per_segment_uses_the_endpoint() {
        let mut nodes = NodeTable::new([0.0, 0.0, 0.0], 1.0);
        let term = nodes.append([0.0, 0.0, 10.0], NodeKind::Term, 0, 1.0);
        nodes.set_left(0, term as i64);
        nodes.set_right(0, term as i64);
        nodes.set_radius(term, 0.5);

        let tree = splinify(&nodes, 1, RadiusRule::Linear);
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].kind, SwcKind::Terminal);
    }
}
