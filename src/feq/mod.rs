//! The skeleton-to-surface conversion pipeline.
//!
//! The stages run in dependency order: branch node polyhedra are built and
//! subdivided first, then per-arc cross-section degrees are reconciled, chain
//! nodes get coaxial face pairs, the pieces are bridged arc by arc and leaf
//! faces are quadified last.

mod bnp;
mod boxes;
mod branch;
mod bridge;
mod leaves;
mod retopo;

use glam::DVec3;
use hashbrown::{HashMap, HashSet};
use slotmap::SecondaryMap;

use crate::{FaceId, NodeId, PolyMesh, Skeleton, VertexId};

/// How a 3-arc junction gets auxiliary direction points before the spherical
/// triangulation. Three directions alone would hull into a single degenerate
/// triangle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum GhostPolicy {
    /// One extra direction: the midpoint of the two closest arc endpoints.
    /// Used by [`skeleton_to_feq`].
    #[default]
    Single,
    /// All three pairwise arc midpoints, giving a six-point triangulation
    /// input. Used by [`skeleton_to_feq_radius`].
    Triple,
}

/// All conversion-scoped state, keyed by arcs `(node, neighbour)`, by chain
/// nodes and by mesh faces.
///
/// One context drives exactly one conversion; parallel conversions use
/// independent contexts. A missing map entry stands for "invalid"/unset.
#[derive(Default)]
struct FeqContext {
    /// Cross-section polygon size at chain and leaf nodes
    chain_degree: HashMap<NodeId, usize>,
    /// Number of polyhedron faces the arc's cross-section face absorbs
    branch_degree: HashMap<(NodeId, NodeId), usize>,
    /// The merged cross-section face used for bridging
    branch_face: HashMap<(NodeId, NodeId), FaceId>,
    /// The polyhedron face whose plane best faces the arc
    branch_best_face: HashMap<(NodeId, NodeId), FaceId>,
    /// The polyhedron corner vertex corresponding to the arc direction
    branch_best_vertex: HashMap<(NodeId, NodeId), VertexId>,
    /// When a whole one-ring was merged: the surviving neighbour vertex
    one_ring_vertex: HashMap<(NodeId, NodeId), VertexId>,
    /// Position of the polyhedron corner, used to recover it after merges
    branch_vertex_pos: HashMap<(NodeId, NodeId), DVec3>,
    /// Pole vertex anchoring rotational alignment of a face
    face_vertex: SecondaryMap<FaceId, VertexId>,
    /// Anchor vertex carried through one-ring-merged and bridged faces
    one_ring_face_vertex: SecondaryMap<FaceId, VertexId>,
    /// Faces that came from a chain-node face pair
    chain_faces: HashSet<FaceId>,
    /// Per node: the faces still available for bridging
    node_faces: SecondaryMap<NodeId, Vec<FaceId>>,
    /// Chain segments that already carry a bridge, in both directions
    bridged_arcs: HashSet<(NodeId, NodeId)>,
    /// Faces consumed by bridging
    touched_faces: HashSet<FaceId>,
}

/// Converts a skeletal graph into a closed, quad-dominant surface mesh
/// enveloping the skeleton.
///
/// Tube cross-sections sit at half the mean edge length of the graph. A graph
/// without edges yields an empty mesh; degenerate junctions are skipped,
/// leaving their arcs open, so the call never fails outright.
pub fn skeleton_to_feq(skeleton: &Skeleton) -> PolyMesh {
    convert(skeleton, None)
}

/// Like [`skeleton_to_feq`] but with a per-node radius.
///
/// A junction polyhedron uses the larger of its node radius and half the mean
/// edge length; chain-node cross-sections are scaled by their node radius
/// directly.
pub fn skeleton_to_feq_radius(
    skeleton: &Skeleton,
    radii: &SecondaryMap<NodeId, f64>,
) -> PolyMesh {
    convert(skeleton, Some(radii))
}

fn convert(skeleton: &Skeleton, radii: Option<&SecondaryMap<NodeId, f64>>) -> PolyMesh {
    let radius = 0.5 * skeleton.average_edge_length();

    let mut mesh = PolyMesh::new();
    let mut ctx = FeqContext::default();

    let ghost_policy = if radii.is_some() {
        GhostPolicy::Triple
    } else {
        GhostPolicy::Single
    };

    bnp::construct_branch_polyhedra(&mut mesh, skeleton, &mut ctx, radius, radii, ghost_policy);

    branch::init_branch_degrees(&mesh, skeleton, &mut ctx);
    branch::init_branch_face_pairs(&mesh, skeleton, &mut ctx);
    branch::merge_branch_faces(&mut mesh, skeleton, &mut ctx);

    boxes::chain_nodes_to_boxes(&mut mesh, skeleton, &mut ctx, radius, radii);

    bridge_all_arcs(&mut mesh, skeleton, &mut ctx);

    leaves::quad_mesh_leaves(&mut mesh, &mut ctx);

    mesh
}

/// Walks every arc and bridges matching cross-section faces along it.
fn bridge_all_arcs(mesh: &mut PolyMesh, skeleton: &Skeleton, ctx: &mut FeqContext) {
    let has_junction = skeleton.node_ids().any(|n| skeleton.valence(n) > 2);

    for n in skeleton.node_ids().collect::<Vec<_>>() {
        let neighbours = skeleton.neighbours(n).to_vec();

        if neighbours.len() <= 2 && has_junction {
            continue;
        }

        for nn in neighbours {
            if has_junction {
                let Some(&degree) = ctx.branch_degree.get(&(n, nn)) else {
                    continue;
                };
                if degree < 1 {
                    continue;
                }
            }

            let mut start = n;
            let mut next = nn;

            loop {
                let forward = skeleton.next_neighbours(start, next);

                if !ctx.bridged_arcs.contains(&(start, next)) {
                    bridge_segment(mesh, skeleton, ctx, start, next);
                }

                start = next;
                if forward.len() == 1 {
                    next = forward[0];
                } else {
                    break;
                }
            }
        }
    }
}

fn bridge_segment(
    mesh: &mut PolyMesh,
    skeleton: &Skeleton,
    ctx: &mut FeqContext,
    start: NodeId,
    next: NodeId,
) {
    let f0 = bridge::find_bridge_face(mesh, skeleton, ctx, start, next);
    let f1 = bridge::find_bridge_face(mesh, skeleton, ctx, next, start);

    let (Some(mut f0), Some(mut f1)) = (f0, f1) else {
        return;
    };

    // bridge from the higher-valence side so its face gets rotated into place
    if skeleton.valence(next) > skeleton.valence(start) {
        std::mem::swap(&mut f0, &mut f1);
    }

    let connections = bridge::find_bridge_connections(mesh, ctx, &mut f0, &mut f1);
    if connections.is_empty() {
        return;
    }

    let quads = mesh.bridge_faces(f0, f1, &connections);
    if quads.is_empty() {
        return;
    }

    ctx.touched_faces.insert(f0);
    ctx.touched_faces.insert(f1);
    ctx.bridged_arcs.insert((start, next));
    ctx.bridged_arcs.insert((next, start));
}
