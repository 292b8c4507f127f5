use tracing::{error, instrument};

use crate::{FaceId, HalfedgeId, PolyMesh, VertexId, utils::unwrap_or_return};

impl PolyMesh {
    /// Dissolves the given halfedge (and its twin), merging the two adjacent
    /// faces into `face_id`, which must be one of them. The other face id is
    /// invalidated.
    #[instrument(skip(self))]
    pub fn merge_faces(&mut self, face_id: FaceId, halfedge_id: HalfedgeId) {
        let he = *unwrap_or_return!(self.halfedges.get(halfedge_id), "Halfedge not found");
        let twin_id = unwrap_or_return!(he.twin, "Twin not found");
        let twin = *unwrap_or_return!(self.halfedges.get(twin_id), "Twin not found");

        let f1 = unwrap_or_return!(he.face, "Cannot dissolve a boundary halfedge");
        let f2 = unwrap_or_return!(twin.face, "Cannot dissolve a boundary halfedge");

        if f1 == f2 {
            error!("Halfedge has the same face on both sides");
            return;
        }
        if face_id != f1 && face_id != f2 {
            error!("Surviving face is not adjacent to the dissolved halfedge");
            return;
        }

        let absorbed_id = if face_id == f1 { f2 } else { f1 };

        let absorbed_hes: Vec<_> = self.faces[absorbed_id]
            .halfedges(self)
            .filter(|he_id| *he_id != halfedge_id && *he_id != twin_id)
            .collect();

        let prev_he = unwrap_or_return!(self.prev_halfedge(halfedge_id), "Prev not found");
        let prev_twin = unwrap_or_return!(self.prev_halfedge(twin_id), "Twin prev not found");

        self.halfedges[prev_he].next = twin.next;
        self.halfedges[prev_twin].next = he.next;

        for he_id in absorbed_hes {
            self.halfedges[he_id].face = Some(face_id);
        }

        self.faces[face_id].halfedge = if face_id == f1 { prev_he } else { prev_twin };
        self.faces.remove(absorbed_id);

        let start_v = twin.end_vertex;
        let end_v = he.end_vertex;

        self.detach_halfedge(halfedge_id, start_v);
        self.detach_halfedge(twin_id, end_v);

        self.remove_isolated_vertex(start_v);
        self.remove_isolated_vertex(end_v);
    }

    /// Merges the whole star of faces around a vertex into a single face and
    /// removes the vertex.
    ///
    /// The face of the vertex's reference outgoing halfedge survives as the
    /// merged face and is returned. Fails on boundary vertices.
    #[instrument(skip(self))]
    pub fn merge_one_ring(&mut self, vertex_id: VertexId) -> Option<FaceId> {
        let vertex = *self.vertices.get(vertex_id)?;
        let valency = self.valency(vertex_id);

        let start_outgoing = vertex.outgoing_halfedge?;

        let mut outgoing = Vec::with_capacity(valency);
        let mut incoming = Vec::with_capacity(valency);
        let mut ring_faces = Vec::with_capacity(valency);
        let mut segments: Vec<Vec<HalfedgeId>> = Vec::with_capacity(valency);

        // walk the star face by face: the twin of a face's incoming halfedge
        // is the outgoing halfedge of the neighbouring face
        let mut out_id = start_outgoing;
        loop {
            let out_he = *self.halfedges.get(out_id)?;
            let face_id = out_he.face?;

            if ring_faces.contains(&face_id) {
                error!("Degenerate one-ring visits a face twice");
                return None;
            }

            let in_id = self.prev_halfedge(out_id)?;

            let mut segment = vec![];
            let mut current = out_he.next?;
            while current != in_id {
                segment.push(current);
                current = self.halfedges.get(current)?.next?;

                if segment.len() > self.halfedges.len() {
                    error!("Face loop is not closed");
                    return None;
                }
            }

            if segment.is_empty() {
                error!("Degenerate face in one-ring");
                return None;
            }

            outgoing.push(out_id);
            incoming.push(in_id);
            ring_faces.push(face_id);
            segments.push(segment);

            out_id = self.halfedges.get(in_id)?.twin?;
            if out_id == start_outgoing {
                break;
            }

            if outgoing.len() > valency {
                error!("One-ring walk does not close");
                return None;
            }
        }

        let survivor_id = ring_faces[0];

        for (k, segment) in segments.iter().enumerate() {
            for he_id in segment {
                self.halfedges[*he_id].face = Some(survivor_id);
            }

            let next_segment_start = segments[(k + 1) % segments.len()][0];
            let last = *segment.last()?;
            self.halfedges[last].next = Some(next_segment_start);
        }

        self.faces[survivor_id].halfedge = segments[0][0];

        for face_id in ring_faces.iter().skip(1) {
            self.faces.remove(*face_id);
        }

        let ring_vertices: Vec<_> = incoming
            .iter()
            .map(|in_id| self.halfedges[*in_id].start_vertex(self))
            .collect();

        for out_id in outgoing {
            self.detach_halfedge(out_id, vertex_id);
        }
        for (in_id, ring_v) in incoming.iter().zip(&ring_vertices) {
            self.detach_halfedge(*in_id, *ring_v);
        }

        self.positions.remove(vertex_id);
        self.outgoing_halfedges.remove(vertex_id);
        self.vertices.remove(vertex_id);

        Some(survivor_id)
    }

    /// Removes vertices that are not connected to any edge anymore.
    pub fn cleanup(&mut self) {
        let isolated: Vec<_> = self
            .vertices
            .keys()
            .filter(|vertex_id| self.valency(*vertex_id) == 0)
            .collect();

        for vertex_id in isolated {
            self.remove_isolated_vertex(vertex_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec3;
    use itertools::Itertools;

    use crate::{PolyMesh, utils::get_tracing_subscriber};

    #[test]
    fn test_merge_faces() {
        get_tracing_subscriber();

        let mut mesh = PolyMesh::new();

        let f1 = mesh
            .add_face(&[
                dvec3(0.0, 0.0, 0.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(1.0, 1.0, 0.0),
                dvec3(0.0, 1.0, 0.0),
            ])
            .unwrap();
        mesh.add_face(&[
            dvec3(1.0, 0.0, 0.0),
            dvec3(2.0, 0.0, 0.0),
            dvec3(2.0, 1.0, 0.0),
            dvec3(1.0, 1.0, 0.0),
        ])
        .unwrap();

        mesh.stitch_mesh(1e-10);

        let shared_he = mesh.faces[f1]
            .halfedges(&mesh)
            .find(|he_id| mesh.face_across(*he_id).is_some())
            .unwrap();

        mesh.merge_faces(f1, shared_he);

        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.faces[f1].size(&mesh), 6);
    }

    #[test]
    fn test_merge_one_ring() {
        let mut mesh = PolyMesh::new();

        // square pyramid: 4 triangles around the apex plus a quad base
        let apex = dvec3(0.5, 0.5, 1.0);
        let base = [
            dvec3(0.0, 0.0, 0.0),
            dvec3(1.0, 0.0, 0.0),
            dvec3(1.0, 1.0, 0.0),
            dvec3(0.0, 1.0, 0.0),
        ];

        for i in 0..4 {
            mesh.add_face(&[base[i], base[(i + 1) % 4], apex]).unwrap();
        }
        mesh.add_face(&[base[3], base[2], base[1], base[0]]).unwrap();

        mesh.stitch_mesh(1e-10);
        assert_eq!(mesh.vertices.len(), 5);

        let apex_v = mesh
            .positions
            .iter()
            .find(|(_, pos)| **pos == apex)
            .map(|(v, _)| v)
            .unwrap();
        assert_eq!(mesh.valency(apex_v), 4);

        let merged = mesh.merge_one_ring(apex_v).unwrap();

        assert_eq!(mesh.faces.len(), 2);
        assert_eq!(mesh.faces[merged].size(&mesh), 4);
        assert!(!mesh.in_use_vertex(apex_v));

        let corners = mesh.faces[merged].vertices(&mesh).collect_vec();
        assert_eq!(corners.len(), 4);
    }
}
