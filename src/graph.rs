use glam::DVec3;
use slotmap::{SecondaryMap, SlotMap};
use tracing::error;

slotmap::new_key_type! {
    /// Id of a node in a [`Skeleton`]
    pub struct NodeId;
}

/// A node of a skeletal graph.
#[derive(Debug, Default, Clone)]
pub struct SkeletonNode {
    /// Connected nodes, in the order the connections were made.
    pub neighbours: Vec<NodeId>,
}

/// An abstract 3D skeletal graph: nodes with positions plus undirected edges.
///
/// A node with more than two neighbours is called a *junction*, a node with at
/// most two a *chain node* and a node with at most one a *leaf*.
///
/// Neighbour lists keep insertion order and node iteration follows slot
/// order, so a conversion run is reproducible for identical input.
#[derive(Debug, Default, Clone)]
pub struct Skeleton {
    /// Maps node IDs to their corresponding node
    pub nodes: SlotMap<NodeId, SkeletonNode>,
    /// Maps node IDs to their corresponding positions
    pub positions: SecondaryMap<NodeId, DVec3>,
}

impl Skeleton {
    /// Create a new empty skeleton
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unconnected node at the given position.
    pub fn add_node(&mut self, position: DVec3) -> NodeId {
        let node_id = self.nodes.insert(SkeletonNode::default());
        self.positions.insert(node_id, position);
        node_id
    }

    /// Connects two nodes with an undirected edge. Connecting the same pair
    /// twice or a node with itself does nothing.
    pub fn connect(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            error!("Cannot connect a node with itself");
            return;
        }
        if !self.nodes.contains_key(a) || !self.nodes.contains_key(b) {
            error!("Node not found");
            return;
        }

        if !self.nodes[a].neighbours.contains(&b) {
            self.nodes[a].neighbours.push(b);
            self.nodes[b].neighbours.push(a);
        }
    }

    /// Iterate over all node ids in slot order.
    #[inline]
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        self.nodes.keys()
    }

    /// The neighbours of a node in connection order.
    #[inline]
    pub fn neighbours(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes
            .get(node_id)
            .map(|node| node.neighbours.as_slice())
            .unwrap_or(&[])
    }

    /// Number of edges incident to the node.
    #[inline]
    pub fn valence(&self, node_id: NodeId) -> usize {
        self.neighbours(node_id).len()
    }

    /// Mean length of all edges. Zero for a graph without edges.
    pub fn average_edge_length(&self) -> f64 {
        let mut total = 0.0;
        let mut count = 0;

        for node_id in self.node_ids() {
            for neighbour_id in self.neighbours(node_id) {
                total += self.positions[node_id].distance(self.positions[*neighbour_id]);
                count += 1;
            }
        }

        if count == 0 {
            0.0
        } else {
            // every edge is visited from both ends, which cancels out
            total / count as f64
        }
    }

    /// The neighbours of `curr` except `prev`: the ways to continue a walk
    /// that arrived at `curr` coming from `prev`.
    pub fn next_neighbours(&self, prev: NodeId, curr: NodeId) -> Vec<NodeId> {
        self.neighbours(curr)
            .iter()
            .copied()
            .filter(|next| *next != prev)
            .collect()
    }

    /// Follows the chain starting with the arc `n`→`nn` until it hits a node
    /// that is not a plain chain continuation (a junction or a leaf) and
    /// returns that node.
    pub fn next_junction(&self, n: NodeId, nn: NodeId) -> NodeId {
        let mut prev_node = n;
        let mut curr_node = nn;

        loop {
            let nbs = self.next_neighbours(prev_node, curr_node);
            if nbs.len() != 1 {
                return curr_node;
            }
            prev_node = curr_node;
            curr_node = nbs[0];
        }
    }

    /// Centroid of all node positions.
    pub fn centroid(&self) -> DVec3 {
        let mut center = DVec3::ZERO;
        for node_id in self.node_ids() {
            center += self.positions[node_id];
        }
        center / self.nodes.len().max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec3;

    use super::Skeleton;

    #[test]
    fn test_average_edge_length() {
        let mut skeleton = Skeleton::new();

        let a = skeleton.add_node(dvec3(0.0, 0.0, 0.0));
        let b = skeleton.add_node(dvec3(2.0, 0.0, 0.0));
        let c = skeleton.add_node(dvec3(2.0, 1.0, 0.0));

        skeleton.connect(a, b);
        skeleton.connect(b, c);
        skeleton.connect(b, c);

        assert_eq!(skeleton.valence(b), 2);
        assert_eq!(skeleton.average_edge_length(), 1.5);
    }

    #[test]
    fn test_next_junction() {
        let mut skeleton = Skeleton::new();

        let junction = skeleton.add_node(dvec3(0.0, 0.0, 0.0));
        let chain1 = skeleton.add_node(dvec3(1.0, 0.0, 0.0));
        let chain2 = skeleton.add_node(dvec3(2.0, 0.0, 0.0));
        let leaf = skeleton.add_node(dvec3(3.0, 0.0, 0.0));
        let up = skeleton.add_node(dvec3(0.0, 1.0, 0.0));
        let down = skeleton.add_node(dvec3(0.0, -1.0, 0.0));

        skeleton.connect(junction, chain1);
        skeleton.connect(chain1, chain2);
        skeleton.connect(chain2, leaf);
        skeleton.connect(junction, up);
        skeleton.connect(junction, down);

        assert_eq!(skeleton.next_junction(junction, chain1), leaf);
        assert_eq!(skeleton.next_junction(chain2, leaf), leaf);
        assert_eq!(skeleton.next_junction(chain1, junction), junction);
    }
}
