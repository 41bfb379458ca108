//! C3: the node table — append-only storage for every vessel node, with a
//! transactional undo log used by the growth engine's local optimization to
//! cheaply try and roll back candidate bifurcation placements.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The virtual perfusion source. Always node index 0.
    Root,
    Bif,
    Term,
}

#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub position: [f64; 3],
    pub kind: NodeKind,
    pub parent: i64,
    pub left: i64,
    pub right: i64,
    pub flow: f64,
    pub reduced_resistance: f64,
    pub left_ratio: f64,
    pub right_ratio: f64,
    pub radius: f64,
}

impl Node {
    fn zeroed(position: [f64; 3], kind: NodeKind, parent: i64, flow: f64) -> Self {
        Self {
            position,
            kind,
            parent,
            left: -1,
            right: -1,
            flow,
            reduced_resistance: 0.0,
            left_ratio: 0.0,
            right_ratio: 0.0,
            radius: 0.0,
        }
    }
}

enum UndoOp {
    /// The last node was freshly appended; pop it to undo.
    Append,
    /// The node at this index was overwritten; this is its prior value.
    Overwrite(usize, Node),
}

/// Append-only node storage plus an opt-in undo log.
///
/// Every mutating setter records the node's prior value to the log whenever
/// recording is active. [`NodeTable::apply_undo`] replays the log in LIFO
/// order, which restores the table to exactly the state it had when
/// [`NodeTable::start_undo`] was called.
pub struct NodeTable {
    nodes: Vec<Node>,
    undo_log: Vec<UndoOp>,
    recording: bool,
}

impl NodeTable {
    /// Construct a table with only the virtual root (index 0) present.
    pub fn new(perfusion_point: [f64; 3], perfusion_flow: f64) -> Self {
        Self {
            nodes: vec![Node::zeroed(perfusion_point, NodeKind::Root, -1, perfusion_flow)],
            undo_log: Vec::new(),
            recording: false,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        false // the virtual root always exists
    }

    pub fn get(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    fn record(&mut self, index: usize) {
        if self.recording {
            self.undo_log.push(UndoOp::Overwrite(index, self.nodes[index]));
        }
    }

    /// Append a new node, returning its index.
    pub fn append(
        &mut self,
        position: [f64; 3],
        kind: NodeKind,
        parent: i64,
        flow: f64,
    ) -> usize {
        self.nodes.push(Node::zeroed(position, kind, parent, flow));
        if self.recording {
            self.undo_log.push(UndoOp::Append);
        }
        self.nodes.len() - 1
    }

    pub fn set_position(&mut self, i: usize, v: [f64; 3]) {
        self.record(i);
        self.nodes[i].position = v;
    }
    pub fn set_kind(&mut self, i: usize, v: NodeKind) {
        self.record(i);
        self.nodes[i].kind = v;
    }
    pub fn set_parent(&mut self, i: usize, v: i64) {
        self.record(i);
        self.nodes[i].parent = v;
    }
    pub fn set_left(&mut self, i: usize, v: i64) {
        self.record(i);
        self.nodes[i].left = v;
    }
    pub fn set_right(&mut self, i: usize, v: i64) {
        self.record(i);
        self.nodes[i].right = v;
    }
    pub fn set_flow(&mut self, i: usize, v: f64) {
        self.record(i);
        self.nodes[i].flow = v;
    }
    pub fn set_reduced_resistance(&mut self, i: usize, v: f64) {
        self.record(i);
        self.nodes[i].reduced_resistance = v;
    }
    pub fn set_left_ratio(&mut self, i: usize, v: f64) {
        self.record(i);
        self.nodes[i].left_ratio = v;
    }
    pub fn set_right_ratio(&mut self, i: usize, v: f64) {
        self.record(i);
        self.nodes[i].right_ratio = v;
    }
    pub fn set_radius(&mut self, i: usize, v: f64) {
        self.record(i);
        self.nodes[i].radius = v;
    }

    pub fn start_undo(&mut self) {
        self.recording = true;
    }

    /// Replay the undo log in LIFO order, restoring every recorded node
    /// to its value at the matching `start_undo` call, and removing every
    /// node appended since. Leaves recording on; call `stop_undo` or
    /// `start_undo` again for the next transaction.
    pub fn apply_undo(&mut self) {
        while let Some(op) = self.undo_log.pop() {
            match op {
                UndoOp::Append => {
                    self.nodes.pop();
                }
                UndoOp::Overwrite(index, node) => {
                    self.nodes[index] = node;
                }
            }
        }
    }

    pub fn clear_undo(&mut self) {
        self.undo_log.clear();
    }

    pub fn stop_undo(&mut self) {
        self.recording = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_restores_overwritten_fields() {
        let mut table = NodeTable::new([0.0, 0.0, 0.0], 1.0);
        table.start_undo();
        table.set_flow(0, 99.0);
        assert_eq!(table.get(0).flow, 99.0);
        table.apply_undo();
        assert_eq!(table.get(0).flow, 1.0);
    }

    #[test]
    fn undo_removes_appended_nodes() {
        let mut table = NodeTable::new([0.0, 0.0, 0.0], 1.0);
        table.start_undo();
        table.append([1.0, 1.0, 1.0], NodeKind::Term, 0, 1.0);
        table.append([2.0, 2.0, 2.0], NodeKind::Term, 0, 1.0);
        assert_eq!(table.len(), 3);
        table.apply_undo();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn clear_undo_makes_changes_permanent() {
        let mut table = NodeTable::new([0.0, 0.0, 0.0], 1.0);
        table.start_undo();
        table.set_flow(0, 42.0);
        table.clear_undo();
        table.stop_undo();
        assert_eq!(table.get(0).flow, 42.0);
    }

    #[test]
    fn repeated_writes_to_the_same_node_unwind_in_order() {
        let mut table = NodeTable::new([0.0, 0.0, 0.0], 1.0);
        table.start_undo();
        table.set_flow(0, 2.0);
        table.set_flow(0, 3.0);
        table.apply_undo();
        assert_eq!(table.get(0).flow, 1.0);
    }
}
