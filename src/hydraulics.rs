//! C5: the hydraulic solver — reduced resistances, Murray-law bifurcation
//! ratios, and the radius propagation pass.

use crate::node_table::{NodeKind, NodeTable};
use std::f64::consts::PI;

/// Recompute the reduced resistance of `id` from its children (already
/// known) and its own segment length, per the Poiseuille/reduced-resistance
/// recursion.
pub fn calculate_reduced_resistance(nodes: &mut NodeTable, id: usize, rho: f64) {
    let node = *nodes.get(id);
    let length = crate::linalg::distance(&node.position, &nodes.get(node.parent as usize).position);
    let resistance = match node.kind {
        NodeKind::Term => 8.0 * rho * length / PI,
        _ => {
            let left = *nodes.get(node.left as usize);
            let right = *nodes.get(node.right as usize);
            let branch_term = node.left_ratio.powi(4) / left.reduced_resistance
                + node.right_ratio.powi(4) / right.reduced_resistance;
            1.0 / branch_term + 8.0 * rho * length / PI
        }
    };
    nodes.set_reduced_resistance(id, resistance);
}

/// Recompute the Murray-law flow-split ratios at bifurcation `id` from its
/// two children's flow and reduced resistance.
pub fn calculate_ratios(nodes: &mut NodeTable, id: usize, gamma: f64) {
    let node = *nodes.get(id);
    let left = *nodes.get(node.left as usize);
    let right = *nodes.get(node.right as usize);
    let lr = (left.flow * left.reduced_resistance) / (right.flow * right.reduced_resistance);
    let x = lr.powf(0.25);
    nodes.set_left_ratio(id, (1.0 + x.powf(-gamma)).powf(-1.0 / gamma));
    nodes.set_right_ratio(id, (1.0 + x.powf(gamma)).powf(-1.0 / gamma));
}

/// Recompute the root radius from the pressure drop law and propagate it
/// down through every ratio in the tree. Returns the root radius.
pub fn calculate_radius(nodes: &mut NodeTable, perfusion_pressure: f64, terminal_pressure: f64) -> f64 {
    let root_child = nodes.get(0).left as usize;
    let child = *nodes.get(root_child);
    let root_radius = (child.flow * child.reduced_resistance / (perfusion_pressure - terminal_pressure)).powf(0.25);
    nodes.set_radius(root_child, root_radius);
    propagate_radius(nodes, root_child);
    root_radius
}

fn propagate_radius(nodes: &mut NodeTable, id: usize) {
    let node = *nodes.get(id);
    if node.kind == NodeKind::Term {
        return;
    }
    let left = node.left as usize;
    let right = node.right as usize;
    nodes.set_radius(left, node.radius * node.left_ratio);
    nodes.set_radius(right, node.radius * node.right_ratio);
    propagate_radius(nodes, left);
    propagate_radius(nodes, right);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_table::NodeKind;

    #[test]
    fn terminal_reduced_resistance_matches_poiseuille_law() {
        let mut nodes = NodeTable::new([0.0, 0.0, 0.0], 1.0);
        let term = nodes.append([0.0, 0.0, 10.0], NodeKind::Term, 0, 1.0);
        calculate_reduced_resistance(&mut nodes, term, 1.0);
        let expected = 8.0 * 10.0 / PI;
        assert!((nodes.get(term).reduced_resistance - expected).abs() < 1e-9);
    }

    #[test]
    fn murray_ratios_favor_the_higher_flow_resistance_branch() {
        let mut nodes = NodeTable::new([0.0, 0.0, 0.0], 3.0);
        let a = nodes.append([1.0, 0.0, 0.0], NodeKind::Term, 0, 1.0);
        let b = nodes.append([0.0, 1.0, 0.0], NodeKind::Term, 0, 2.0);
        nodes.set_reduced_resistance(a, 4.0);
        nodes.set_reduced_resistance(b, 1.0);
        nodes.set_left(0, a as i64);
        nodes.set_right(0, b as i64);
        calculate_ratios(&mut nodes, 0, 3.0);
        let left_ratio = nodes.get(0).left_ratio;
        let right_ratio = nodes.get(0).right_ratio;
        assert!(left_ratio > 0.0 && left_ratio < 1.0);
        assert!(right_ratio > 0.0 && right_ratio < 1.0);
    }
}
