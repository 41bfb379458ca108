//! C7: the record emitter — formats a refined [`crate::spline::SplineTree`]
//! as an SWC morphology file.
//!
//! Writing the result to a path is the caller's job (the CLI, or an
//! embedding application); this module only produces the in-memory text.

use crate::spline::SplineTree;
use std::fmt::Write as _;

/// Render every sample as one `<index> <type> <x> <y> <z> <radius> <parent>`
/// line, in emission order.
pub fn export_swc(tree: &SplineTree) -> String {
    let mut out = String::new();
    for n in &tree.nodes {
        let _ = writeln!(
            out,
            "{} {} {:.6} {:.6} {:.6} {:.6} {}",
            n.index,
            n.kind.code(),
            n.position[0],
            n.position[1],
            n.position[2],
            n.radius,
            n.parent,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spline::{SplineNode, SwcKind};

    #[test]
    fn root_sample_has_no_parent() {
        let tree = SplineTree {
            nodes: vec![SplineNode {
                index: 1,
                kind: SwcKind::Terminal,
                position: [1.0, 2.0, 3.0],
                radius: 0.5,
                parent: -1,
            }],
        };
        let text = export_swc(&tree);
        let line = text.lines().next().unwrap();
        assert!(line.starts_with("1 6 "));
        assert!(line.ends_with(" -1"));
    }

    #[test]
    fn one_line_per_sample() {
        let tree = SplineTree {
            nodes: vec![
                SplineNode { index: 1, kind: SwcKind::Root, position: [0.0, 0.0, 0.0], radius: 1.0, parent: -1 },
                SplineNode { index: 2, kind: SwcKind::Terminal, position: [1.0, 0.0, 0.0], radius: 0.5, parent: 1 },
            ],
        };
        assert_eq!(export_swc(&tree).lines().count(), 2);
    }
}
