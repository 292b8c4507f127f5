//! Retopology of planar regions on a branch node polyhedron.
//!
//! Coplanar fans of triangles would tube badly, so maximal planar components
//! get stellated: planar interior edges are split through an auxiliary vertex
//! and surrounding planar edges are flipped towards it, turning the fan into
//! quads after the later subdivision pass.

use std::collections::VecDeque;

use hashbrown::HashSet;
use tracing::instrument;

use crate::{FaceId, HalfedgeId, PolyMesh, VertexId};

/// Whether the two faces of this halfedge are considered part of one planar
/// region: either the pair bulges outwards on both sides, or the face normals
/// agree to within a cosine of 0.75.
pub(super) fn check_planar(mesh: &PolyMesh, halfedge_id: HalfedgeId) -> bool {
    let Some(he) = mesh.halfedges.get(halfedge_id) else {
        return false;
    };
    let Some(face_1) = he.face else {
        return false;
    };
    let Some(face_2) = mesh.face_across(halfedge_id) else {
        return false;
    };

    let Some(normal_1) = mesh.faces[face_1].normal(mesh) else {
        return false;
    };
    let Some(normal_2) = mesh.faces[face_2].normal(mesh) else {
        return false;
    };

    let center_1 = mesh.faces[face_1].center(mesh);
    let center_2 = mesh.faces[face_2].center(mesh);

    if normal_1.dot(center_2 - center_1) > 0.0 && normal_2.dot(center_1 - center_2) > 0.0 {
        return true;
    }

    let dot = normal_1.dot(normal_2);
    if dot < 0.0 {
        return false;
    }

    dot.abs() >= 0.75
}

/// Splits an interior edge of a triangle pair through a new vertex: the edge
/// is split at its midpoint and both adjacent triangles are split from the
/// midpoint to their opposite corner.
pub(super) fn split_interior_edge(
    mesh: &mut PolyMesh,
    halfedge_id: HalfedgeId,
) -> Option<VertexId> {
    let he = *mesh.halfedges.get(halfedge_id)?;
    let twin_id = he.twin?;

    let opposite = mesh.halfedges.get(he.next?)?.end_vertex;
    let twin_opposite = mesh
        .halfedges
        .get(mesh.halfedges.get(twin_id)?.next?)?
        .end_vertex;

    if opposite == twin_opposite {
        return None;
    }

    let face = he.face?;
    let twin_face = mesh.halfedges[twin_id].face?;

    let mid_v = mesh.split_edge(halfedge_id)?;

    mesh.split_face_by_edge(face, mid_v, opposite);
    mesh.split_face_by_edge(twin_face, mid_v, twin_opposite);

    Some(mid_v)
}

/// The vertex across the face from this halfedge (the corner its face loop
/// reaches next).
fn opposite_vertex(mesh: &PolyMesh, halfedge_id: HalfedgeId) -> Option<VertexId> {
    Some(
        mesh.halfedges
            .get(mesh.halfedges.get(halfedge_id)?.next?)?
            .end_vertex,
    )
}

/// Finds maximal components of faces joined by planar halfedges and stellates
/// every component of at least three faces.
#[instrument(skip(mesh))]
pub(super) fn retopologize_planar_regions(mesh: &mut PolyMesh) {
    let mut global_visited: HashSet<FaceId> = HashSet::new();
    let mut regions = vec![];

    let face_ids: Vec<_> = mesh.faces.keys().collect();

    for face_id in face_ids {
        if global_visited.contains(&face_id) {
            continue;
        }

        let mut region_faces = vec![];
        let mut region_face_set = HashSet::new();
        let mut region_edges = vec![];
        let mut region_edge_set = HashSet::new();

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(face_id);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }

            let edge_set: Vec<_> = mesh.faces[current].halfedges(mesh).collect();

            for he_id in edge_set {
                if !check_planar(mesh, he_id) {
                    continue;
                }

                let twin_id = mesh.halfedges[he_id].twin();

                if region_edge_set.insert(he_id) {
                    region_edges.push(he_id);
                }
                if region_edge_set.insert(twin_id) {
                    region_edges.push(twin_id);
                }

                let face_1 = mesh.halfedges[he_id].face;
                let face_2 = mesh.halfedges[twin_id].face;

                for face in [face_1, face_2].into_iter().flatten() {
                    if region_face_set.insert(face) {
                        region_faces.push(face);
                    }
                    global_visited.insert(face);

                    if !visited.contains(&face) {
                        queue.push_back(face);
                    }
                }
            }
        }

        regions.push((region_faces, region_edges));
    }

    for (faces, edges) in regions {
        if faces.len() > 2 {
            stellate_region(mesh, &edges);
        }
    }
}

/// Stellates one planar component: every planar interior edge is either
/// flipped (when the diagonal would connect two auxiliary vertices) or split
/// through a new auxiliary vertex, after which planar edges opposite the new
/// vertex are flipped towards it.
fn stellate_region(mesh: &mut PolyMesh, planar_edges: &[HalfedgeId]) {
    let mut visited: HashSet<HalfedgeId> = HashSet::new();
    let mut aux_vertices: HashSet<VertexId> = HashSet::new();

    for &he_id in planar_edges {
        if visited.contains(&he_id) {
            continue;
        }
        let Some(he) = mesh.halfedges.get(he_id) else {
            continue;
        };
        let twin_id = he.twin();
        if visited.contains(&twin_id) {
            continue;
        }

        let Some(diagonal_1) = opposite_vertex(mesh, he_id) else {
            continue;
        };
        let Some(diagonal_2) = opposite_vertex(mesh, twin_id) else {
            continue;
        };

        if aux_vertices.contains(&diagonal_1) && aux_vertices.contains(&diagonal_2) {
            mesh.flip_edge(he_id);
            visited.insert(he_id);
            visited.insert(twin_id);
            continue;
        }

        visited.insert(he_id);
        visited.insert(twin_id);

        let Some(aux_v) = split_interior_edge(mesh, he_id) else {
            continue;
        };
        aux_vertices.insert(aux_v);

        for &flip_id in planar_edges {
            if visited.contains(&flip_id) || !mesh.in_use_halfedge(flip_id) {
                continue;
            }

            if opposite_vertex(mesh, flip_id) == Some(aux_v) && check_planar(mesh, flip_id) {
                mesh.flip_edge(flip_id);
                visited.insert(flip_id);
                if let Some(flip_twin) = mesh.halfedges[flip_id].twin {
                    visited.insert(flip_twin);
                }
            }
        }
    }

    // sweep up: unvisited planar edges opposite an auxiliary vertex
    let all_he_ids: Vec<_> = mesh.halfedges.keys().collect();
    for he_id in all_he_ids {
        if visited.contains(&he_id) {
            continue;
        }
        let Some(opposite) = opposite_vertex(mesh, he_id) else {
            continue;
        };

        if aux_vertices.contains(&opposite) && check_planar(mesh, he_id) {
            mesh.flip_edge(he_id);
            visited.insert(he_id);
            if let Some(twin_id) = mesh.halfedges[he_id].twin {
                visited.insert(twin_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec3;

    use crate::PolyMesh;

    use super::check_planar;

    #[test]
    fn test_check_planar() {
        let mut mesh = PolyMesh::new();

        // two coplanar triangles sharing an edge
        let f1 = mesh
            .add_face(&[
                dvec3(0.0, 0.0, 0.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(0.5, 1.0, 0.0),
            ])
            .unwrap();
        mesh.add_face(&[
            dvec3(1.0, 0.0, 0.0),
            dvec3(0.0, 0.0, 0.0),
            dvec3(0.5, -1.0, 0.0),
        ])
        .unwrap();
        mesh.stitch_mesh(1e-10);

        let shared = mesh.faces[f1]
            .halfedges(&mesh)
            .find(|he_id| mesh.face_across(*he_id).is_some())
            .unwrap();

        assert!(check_planar(&mesh, shared));
    }

    #[test]
    fn test_check_planar_right_angle() {
        let mut mesh = PolyMesh::new();

        // two triangles folded away from each other at a right angle
        let f1 = mesh
            .add_face(&[
                dvec3(0.0, 0.0, 0.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(0.5, 1.0, 0.0),
            ])
            .unwrap();
        mesh.add_face(&[
            dvec3(1.0, 0.0, 0.0),
            dvec3(0.0, 0.0, 0.0),
            dvec3(0.5, -1.0, -1.0),
        ])
        .unwrap();
        mesh.stitch_mesh(1e-10);

        let shared = mesh.faces[f1]
            .halfedges(&mesh)
            .find(|he_id| mesh.face_across(*he_id).is_some())
            .unwrap();

        assert!(!check_planar(&mesh, shared));
    }
}
