//! Face-loop matching and bridging along arcs.
//!
//! Two matchers exist: the one-ring matcher pairs loops purely by squared
//! distance and propagates anchor vertices along the tube, while the careful
//! matcher first rotates the cross-section face around its pole vertex until
//! the bridge edges are as parallel as possible and then aligns pole to pole.

use glam::DVec3;
use tracing::{instrument, warn};

use crate::{FaceId, NodeId, PolyMesh, Skeleton, VertexId};

use super::FeqContext;

/// The face to bridge from at `start` towards `next`: the prepared
/// cross-section face for a junction, otherwise the best-facing face from the
/// node's face set (which it is removed from).
pub(super) fn find_bridge_face(
    mesh: &PolyMesh,
    skeleton: &Skeleton,
    ctx: &mut FeqContext,
    start: NodeId,
    next: NodeId,
) -> Option<FaceId> {
    if skeleton.valence(start) > 2 {
        let face_id = *ctx.branch_face.get(&(start, next))?;

        if let Some(&pole) = ctx.branch_best_vertex.get(&(start, next)) {
            ctx.face_vertex.insert(face_id, pole);
        }

        Some(face_id)
    } else {
        best_node_face(mesh, skeleton, ctx, start, next)
    }
}

fn best_node_face(
    mesh: &PolyMesh,
    skeleton: &Skeleton,
    ctx: &mut FeqContext,
    n: NodeId,
    nn: NodeId,
) -> Option<FaceId> {
    let direction = (skeleton.positions[nn] - skeleton.positions[n]).normalize();

    let faces = ctx.node_faces.get(n)?;

    let mut best = None;
    let mut best_dot = -1000.0;

    for &face_id in faces {
        if !mesh.in_use_face(face_id) {
            continue;
        }
        let Some(normal) = mesh.faces[face_id].normal(mesh) else {
            continue;
        };

        let dot = direction.dot(normal);
        if dot > best_dot {
            best = Some(face_id);
            best_dot = dot;
        }
    }

    let best = best?;
    ctx.node_faces
        .get_mut(n)?
        .retain(|face_id| *face_id != best);

    Some(best)
}

/// Computes the vertex pairing for bridging `f0` to `f1`. The careful matcher
/// may replace `f0` by a rotated face.
pub(super) fn find_bridge_connections(
    mesh: &mut PolyMesh,
    ctx: &mut FeqContext,
    f0: &mut FaceId,
    f1: &mut FaceId,
) -> Vec<(VertexId, VertexId)> {
    if !mesh.in_use_face(*f0) || !mesh.in_use_face(*f1) {
        return vec![];
    }

    if ctx.face_vertex.get(*f0).is_none() && ctx.face_vertex.get(*f1).is_none() {
        face_match_one_ring(mesh, ctx, *f0, *f1)
    } else {
        face_match_careful(mesh, ctx, f0, *f1)
    }
}

fn face_loop(mesh: &PolyMesh, face_id: FaceId) -> Vec<VertexId> {
    mesh.faces[face_id].vertices(mesh).collect()
}

/// The offset minimising the summed squared distance between paired corners.
fn min_length_offset(mesh: &PolyMesh, loop0: &[VertexId], loop1: &[VertexId]) -> usize {
    let len = loop0.len();

    let mut best_offset = len - 1;
    let mut min_total = f64::MAX;

    for offset in 0..len {
        let total: f64 = (0..len)
            .map(|i| {
                let p0 = mesh.positions[loop0[i]];
                let p1 = mesh.positions[loop1[(len + offset - i) % len]];
                p0.distance_squared(p1)
            })
            .sum();

        if total < min_total {
            best_offset = offset;
            min_total = total;
        }
    }

    best_offset
}

fn pair_loops(
    loop0: &[VertexId],
    loop1: &[VertexId],
    offset: usize,
) -> Vec<(VertexId, VertexId)> {
    let len = loop0.len();
    (0..len)
        .map(|i| (loop0[i], loop1[(len + offset - i) % len]))
        .collect()
}

/// Distance-based matching with anchor propagation.
///
/// When exactly one side carries a one-ring anchor vertex, the matched
/// partner is propagated to the other side (and to the face behind it, which
/// for a chain-node face pair is the opposite cap). A propagation that finds
/// no matching pair while an anchor exists means the loops disagree about
/// their anchors and the bridge is abandoned.
#[instrument(skip(mesh, ctx))]
fn face_match_one_ring(
    mesh: &PolyMesh,
    ctx: &mut FeqContext,
    f0: FaceId,
    f1: FaceId,
) -> Vec<(VertexId, VertexId)> {
    let anchor0 = ctx.one_ring_face_vertex.get(f0).copied();
    let anchor1 = ctx.one_ring_face_vertex.get(f1).copied();

    let loop0 = face_loop(mesh, f0);
    let loop1 = face_loop(mesh, f1);

    if loop0.len() != loop1.len() {
        warn!("Face loops of unequal size, leaving the bridge open");
        return vec![];
    }

    let len = loop0.len();
    let offset = min_length_offset(mesh, &loop0, &loop1);
    let connections = pair_loops(&loop0, &loop1, offset);

    if anchor0.is_some() && anchor1.is_some() {
        return connections;
    }

    let mut found = false;

    for i in 0..len {
        let v0 = loop0[i];
        let v1 = loop1[(len + offset - i) % len];

        if anchor1 == Some(v1) {
            ctx.one_ring_face_vertex.insert(f0, v0);
            if let Some(behind) = mesh.face_across(mesh.faces[f0].halfedge) {
                ctx.one_ring_face_vertex.insert(behind, v0);
            }
            found = true;
        } else if anchor0 == Some(v0) {
            ctx.one_ring_face_vertex.insert(f1, v1);
            if let Some(behind) = mesh.face_across(mesh.faces[f1].halfedge) {
                ctx.one_ring_face_vertex.insert(behind, v1);
            }
            found = true;
        }
    }

    if !found
        && (ctx.one_ring_face_vertex.contains_key(f0) || ctx.one_ring_face_vertex.contains_key(f1))
    {
        warn!("Anchor vertex conflict, leaving the bridge open");
        return vec![];
    }

    connections
}

/// Pole-anchored matching. With both pole vertices known, the cross-section
/// face is rotated around its pole for best bridge-edge alignment and the
/// offset is chosen so the two poles end up paired.
#[instrument(skip(mesh, ctx))]
fn face_match_careful(
    mesh: &mut PolyMesh,
    ctx: &mut FeqContext,
    f0: &mut FaceId,
    f1: FaceId,
) -> Vec<(VertexId, VertexId)> {
    if !mesh.in_use_face(*f0) || !mesh.in_use_face(f1) {
        return vec![];
    }

    let pole0 = ctx.face_vertex.get(*f0).copied();
    let pole1 = ctx.face_vertex.get(f1).copied();

    let loop0 = face_loop(mesh, *f0);
    let loop1 = face_loop(mesh, f1);

    if loop0.len() != loop1.len() {
        warn!("Face loops of unequal size, leaving the bridge open");
        return vec![];
    }
    let len = loop0.len();

    let (Some(pole0), Some(pole1)) = (pole0, pole1) else {
        // only one pole known: match by distance and propagate the pole
        let offset = min_length_offset(mesh, &loop0, &loop1);

        for i in 0..len {
            let v0 = loop0[i];
            let v1 = loop1[(len + offset - i) % len];

            if ctx.face_vertex.get(f1).copied() == Some(v1) {
                ctx.face_vertex.insert(*f0, v0);
                if let Some(behind) = mesh.face_across(mesh.faces[*f0].halfedge) {
                    ctx.face_vertex.insert(behind, v0);
                }
            } else if ctx.face_vertex.get(*f0).copied() == Some(v0) {
                ctx.face_vertex.insert(f1, v1);
                if let Some(behind) = mesh.face_across(mesh.faces[f1].halfedge) {
                    ctx.face_vertex.insert(behind, v1);
                }
            }
        }

        return pair_loops(&loop0, &loop1, offset);
    };

    *f0 = rotate_bridge_face(mesh, ctx, *f0, f1);

    let loop0 = face_loop(mesh, *f0);
    let loop1 = face_loop(mesh, f1);

    if loop0.len() != loop1.len() {
        warn!("Rotated face changed size, leaving the bridge open");
        return vec![];
    }
    let len = loop0.len();

    let mut pole_offset = len - 1;
    for offset in 0..len {
        let aligned = (0..len)
            .any(|i| loop0[i] == pole0 && loop1[(len + offset - i) % len] == pole1);
        if aligned {
            pole_offset = offset;
        }
    }

    pair_loops(&loop0, &loop1, pole_offset)
}

/// Rotates the cross-section face `f0` around its pole vertex, one slot at a
/// time, and keeps the configuration whose most-antiparallel pair of bridge
/// edges is best aligned.
///
/// The first full cycle around the pole scores every configuration; the
/// second cycle stops at the first configuration matching the best score.
fn rotate_bridge_face(
    mesh: &mut PolyMesh,
    ctx: &mut FeqContext,
    mut f0: FaceId,
    f1: FaceId,
) -> FaceId {
    let Some(&pole0) = ctx.face_vertex.get(f0) else {
        return f0;
    };
    let Some(&pole1) = ctx.face_vertex.get(f1) else {
        return f0;
    };

    let pole_valency = mesh.valency(pole0);
    let mut best_score = -10000.0_f64;

    for iter in 0..=(2 * pole_valency) {
        let loop0 = face_loop(mesh, f0);
        let loop1 = face_loop(mesh, f1);
        let len = loop0.len();

        let Some(pole_edge) = mesh.faces[f0].halfedge_ending_at(pole0, mesh) else {
            return f0;
        };
        let Some(pole_index) = loop0.iter().position(|v| *v == pole0) else {
            return f0;
        };
        let split_vertex = loop0[(pole_index + 3) % len];

        let mut score = 0.0;

        if loop1.len() == len {
            for offset in 0..len {
                let aligned = (0..len)
                    .any(|i| loop0[i] == pole0 && loop1[(len + offset - i) % len] == pole1);
                if !aligned {
                    continue;
                }

                let edges: Vec<DVec3> = (0..len)
                    .map(|i| {
                        let p0 = mesh.positions[loop0[i]];
                        let p1 = mesh.positions[loop1[(len + offset - i) % len]];
                        (p0 - p1).normalize()
                    })
                    .collect();

                let mut min_pair_dot = 10000.0;
                for edge_i in &edges {
                    for edge_j in &edges {
                        let dot = edge_i.dot(*edge_j);
                        if dot < min_pair_dot {
                            min_pair_dot = dot;
                        }
                    }
                }
                score = min_pair_dot;
            }
        }

        if iter < pole_valency {
            if score > best_score {
                best_score = score;
            }
        } else if score == best_score {
            return f0;
        }

        // step: quads just move to the neighbour across the pole edge, larger
        // faces shed a quad on one side of the pole and absorb the neighbour
        // on the other
        if len == 4 {
            let across = if mesh.halfedges[pole_edge].face == Some(f0) {
                mesh.face_across(pole_edge)
            } else {
                mesh.halfedges[pole_edge].face
            };
            let Some(across) = across else {
                return f0;
            };
            f0 = across;
        } else {
            let Some(new_face) = mesh.split_face_by_edge(f0, pole0, split_vertex) else {
                return f0;
            };

            if mesh.in_use_halfedge(pole_edge)
                && let Some(pole_face) = mesh.halfedges[pole_edge].face
            {
                mesh.merge_faces(pole_face, pole_edge);
            }

            f0 = new_face;
        }
    }

    f0
}
