//! Final quadification of the remaining n-gon faces around leaves.

use tracing::instrument;

use crate::PolyMesh;

use super::FeqContext;

/// Splits every non-quad face (and every chain-node face that carries an
/// anchor vertex) into a fan around its center and dissolves every other fan
/// edge, starting with the parity opposite the anchor's spoke. An n-gon comes
/// out as n/2 quads with the anchor on a quad corner.
#[instrument(skip_all)]
pub(super) fn quad_mesh_leaves(mesh: &mut PolyMesh, ctx: &mut FeqContext) {
    let base_faces: Vec<_> = mesh.faces.keys().collect();
    let mut fan_edges = vec![];

    for face_id in base_faces {
        if !mesh.in_use_face(face_id) {
            continue;
        }

        let needs_split = mesh.faces[face_id].size(mesh) != 4
            || (ctx.chain_faces.contains(&face_id)
                && ctx.one_ring_face_vertex.contains_key(face_id));
        if !needs_split {
            continue;
        }

        let Some(&anchor) = ctx.one_ring_face_vertex.get(face_id) else {
            continue;
        };

        let Some(center_v) = mesh.split_face_by_vertex(face_id) else {
            continue;
        };

        let spokes: Vec<_> = mesh.vertices[center_v].outgoing_halfedges(mesh).collect();

        let mut keep_parity = 0;
        for (counter, spoke) in spokes.iter().enumerate() {
            if mesh.halfedges[*spoke].end_vertex == anchor {
                keep_parity = counter % 2;
            }
        }

        for (counter, spoke) in spokes.iter().enumerate() {
            if counter % 2 != keep_parity {
                fan_edges.push(*spoke);
            }
        }
    }

    for he_id in fan_edges {
        if !mesh.in_use_halfedge(he_id) {
            continue;
        }

        if let Some(face_id) = mesh.halfedges[he_id].face {
            mesh.merge_faces(face_id, he_id);
        }
    }
}
