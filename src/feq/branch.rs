//! Per-arc bookkeeping at junctions: cross-section degrees, best-facing
//! polyhedron faces and the one-ring merges that produce the bridgeable
//! cross-section faces.

use tracing::{instrument, warn};

use crate::{FaceId, NodeId, PolyMesh, Skeleton, VertexId};

use super::FeqContext;

/// Finds the mesh vertex sitting exactly at the recorded polyhedron corner of
/// an arc. The corner position is stable across the subdivision pass, so an
/// exact comparison is intended here.
pub(super) fn branch_vertex(
    mesh: &PolyMesh,
    ctx: &FeqContext,
    n: NodeId,
    nn: NodeId,
) -> Option<VertexId> {
    let target = *ctx.branch_vertex_pos.get(&(n, nn))?;

    mesh.positions
        .iter()
        .find(|(_, pos)| (**pos - target).length_squared() == 0.0)
        .map(|(vertex_id, _)| vertex_id)
}

/// Squared distance from the face center to the point where the arc line
/// pierces the face plane. Smaller means the face is a better lid for the arc.
pub(super) fn arc_face_distance(
    mesh: &PolyMesh,
    skeleton: &Skeleton,
    n: NodeId,
    nn: NodeId,
    face_id: FaceId,
) -> f64 {
    if !mesh.in_use_face(face_id) {
        return 1.0;
    }

    let pn = skeleton.positions[n];
    let arc = skeleton.positions[nn] - pn;

    let Some(normal) = mesh.faces[face_id].normal(mesh) else {
        return 1.0;
    };
    let center = mesh.faces[face_id].center(mesh);

    let plane_d = normal.dot(center);
    let denominator = normal.dot(arc);

    let t = if denominator != 0.0 {
        (plane_d - normal.dot(pn)) / denominator
    } else {
        0.0
    };

    center.distance_squared(pn + t * arc)
}

/// Picks the face around the arc's polyhedron corner that best lids the arc
/// and removes it from the junction's available face set.
fn select_branch_face(
    mesh: &PolyMesh,
    skeleton: &Skeleton,
    ctx: &mut FeqContext,
    n: NodeId,
    nn: NodeId,
) -> Option<FaceId> {
    let corner = branch_vertex(mesh, ctx, n, nn)?;

    let face_ids: Vec<_> = mesh.vertices[corner].faces(mesh).collect();

    let mut best = None;
    let mut best_dist = f64::MAX;

    for face_id in face_ids {
        let dist = arc_face_distance(mesh, skeleton, n, nn, face_id);
        if dist < best_dist {
            best = Some(face_id);
            best_dist = dist;
        }
    }

    let best = best?;

    if skeleton.valence(n) > 2
        && let Some(faces) = ctx.node_faces.get_mut(n)
    {
        faces.retain(|face_id| *face_id != best);
    }

    Some(best)
}

/// Computes, per junction arc, how many polyhedron faces the arc's
/// cross-section absorbs and what polygon size the chain nodes along the arc
/// get.
///
/// The smaller of the two corner valencies along the arc wins; for a chain
/// ending in a leaf the source corner valency is used for both ends.
#[instrument(skip_all)]
pub(super) fn init_branch_degrees(mesh: &PolyMesh, skeleton: &Skeleton, ctx: &mut FeqContext) {
    for n in skeleton.node_ids() {
        let neighbours = skeleton.neighbours(n);
        if neighbours.len() <= 2 {
            continue;
        }

        for &nn in neighbours {
            let Some(src_corner) = branch_vertex(mesh, ctx, n, nn) else {
                warn!("Arc without a polyhedron corner, skipping its degree");
                continue;
            };
            let src_degree = mesh.valency(src_corner);

            // walk the chain until the next junction or a leaf
            let mut chain_path = vec![];
            let mut prev = n;
            let mut curr = nn;
            let mut reached_leaf = false;

            loop {
                let nbs = skeleton.next_neighbours(prev, curr);
                match nbs.len() {
                    0 => {
                        chain_path.push(curr);
                        reached_leaf = true;
                        break;
                    }
                    1 => {
                        chain_path.push(curr);
                        prev = curr;
                        curr = nbs[0];
                    }
                    _ => break,
                }
            }

            let dest_degree = if reached_leaf {
                src_degree
            } else {
                let Some(dest_corner) = branch_vertex(mesh, ctx, curr, prev) else {
                    warn!("Opposite junction without a polyhedron corner");
                    continue;
                };
                mesh.valency(dest_corner)
            };

            let (path_degree, junction_degree) = if dest_degree < src_degree {
                (dest_degree * 2, dest_degree.saturating_sub(1))
            } else if dest_degree == src_degree {
                (dest_degree * 2, dest_degree)
            } else {
                (src_degree * 2, src_degree.saturating_sub(1))
            };

            ctx.branch_degree.insert((n, nn), junction_degree);

            for chain_node in chain_path {
                ctx.chain_degree.entry(chain_node).or_insert(path_degree);
            }
        }
    }

    // graphs without any junction fall back to square cross-sections
    let has_junction = skeleton.node_ids().any(|n| skeleton.valence(n) > 2);
    if !has_junction {
        for n in skeleton.node_ids() {
            if skeleton.valence(n) <= 2 {
                ctx.chain_degree.entry(n).or_insert(4);
            }
        }
    }
}

/// Records, per junction arc, the best lid face and the polyhedron corner the
/// bridging will anchor its rotation on.
#[instrument(skip_all)]
pub(super) fn init_branch_face_pairs(mesh: &PolyMesh, skeleton: &Skeleton, ctx: &mut FeqContext) {
    for n in skeleton.node_ids().collect::<Vec<_>>() {
        let neighbours = skeleton.neighbours(n);
        if neighbours.len() <= 2 {
            continue;
        }

        for &nn in neighbours {
            let Some(face_id) = select_branch_face(mesh, skeleton, ctx, n, nn) else {
                continue;
            };
            ctx.branch_best_face.insert((n, nn), face_id);

            if let Some(corner) = branch_vertex(mesh, ctx, n, nn) {
                ctx.branch_best_vertex.insert((n, nn), corner);
            }
        }
    }
}

/// Grows every arc's best face to its target cross-section size by absorbing
/// neighbouring faces around the polyhedron corner, or collapses the whole
/// one-ring when the corner valency already matches.
#[instrument(skip_all)]
pub(super) fn merge_branch_faces(mesh: &mut PolyMesh, skeleton: &Skeleton, ctx: &mut FeqContext) {
    for n in skeleton.node_ids().collect::<Vec<_>>() {
        let neighbours = skeleton.neighbours(n).to_vec();
        if neighbours.len() <= 2 {
            continue;
        }

        for nn in neighbours {
            let key = (n, nn);

            let Some(&branch_degree) = ctx.branch_degree.get(&key) else {
                continue;
            };
            let Some(&face_id) = ctx.branch_best_face.get(&key) else {
                continue;
            };
            let Some(&corner) = ctx.branch_best_vertex.get(&key) else {
                continue;
            };

            if mesh.valency(corner) == branch_degree {
                // the last neighbour in circulation order anchors alignment
                let anchor = mesh.vertices[corner]
                    .outgoing_halfedges(mesh)
                    .last()
                    .map(|he_id| mesh.halfedges[he_id].end_vertex);

                let Some(merged) = mesh.merge_one_ring(corner) else {
                    warn!("One-ring merge failed, leaving the arc open");
                    continue;
                };

                match anchor.filter(|anchor| mesh.in_use_vertex(*anchor)) {
                    Some(anchor) => {
                        ctx.one_ring_vertex.insert(key, anchor);
                        ctx.one_ring_face_vertex.insert(merged, anchor);
                    }
                    None => {
                        ctx.one_ring_vertex.remove(&key);
                        ctx.one_ring_face_vertex.remove(merged);
                    }
                }

                ctx.branch_face.insert(key, merged);
                ctx.branch_best_vertex.remove(&key);
                continue;
            }

            ctx.branch_face.insert(key, face_id);

            for _ in 1..branch_degree {
                let Some(face) = mesh.faces.get(face_id).copied() else {
                    break;
                };

                // the two edges of the growing face that touch the corner
                let Some(edge_in) = face.halfedge_ending_at(corner, mesh) else {
                    break;
                };
                let Some(edge_out) = mesh.halfedges[edge_in].next else {
                    break;
                };

                let across_in = mesh.face_across(edge_in);
                let across_out = mesh.face_across(edge_out);

                let Some(across_in) = across_in else {
                    mesh.merge_faces(face_id, edge_out);
                    continue;
                };
                let Some(across_out) = across_out else {
                    mesh.merge_faces(face_id, edge_in);
                    continue;
                };

                let dist_in = arc_face_distance(mesh, skeleton, n, nn, across_in);
                let dist_out = arc_face_distance(mesh, skeleton, n, nn, across_out);

                if dist_in < dist_out {
                    mesh.merge_faces(face_id, edge_in);
                } else {
                    mesh.merge_faces(face_id, edge_out);
                }
            }
        }
    }
}
