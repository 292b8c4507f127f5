use tracing::{error, instrument};

use crate::{Face, FaceId, HalfedgeId, PolyMesh, VertexId, utils::unwrap_or_return};

impl PolyMesh {
    /// Splits an edge at its midpoint.
    ///
    /// The two adjacent faces each gain one edge; no face is split. Returns
    /// the new midpoint vertex.
    #[instrument(skip(self))]
    pub fn split_edge(&mut self, halfedge_id: HalfedgeId) -> Option<VertexId> {
        let he = *self.halfedges.get(halfedge_id)?;
        let twin_id = he.twin?;
        let twin = *self.halfedges.get(twin_id)?;

        let start_v = twin.end_vertex;
        let end_v = he.end_vertex;

        let mid_pos = (self.positions[start_v] + self.positions[end_v]) * 0.5;
        let mid_v = self.insert_vertex(mid_pos);

        // halfedge side: u→v becomes u→m, m→v
        let new_he = self.insert_halfedge(mid_v, end_v);
        self.halfedges[new_he].face = he.face;
        self.halfedges[new_he].next = he.next;
        self.halfedges[halfedge_id].end_vertex = mid_v;
        self.halfedges[halfedge_id].next = he.face.is_some().then_some(new_he);

        // twin side: v→u becomes v→m, m→u
        let new_twin = self.insert_halfedge(mid_v, start_v);
        self.halfedges[new_twin].face = twin.face;
        self.halfedges[new_twin].next = twin.next;
        self.halfedges[twin_id].end_vertex = mid_v;
        self.halfedges[twin_id].next = twin.face.is_some().then_some(new_twin);

        self.make_twins(halfedge_id, new_twin);
        self.make_twins(new_he, twin_id);

        let preferred = self.preferred_outgoing(mid_v);
        self.vertices[mid_v].outgoing_halfedge = preferred;

        Some(mid_v)
    }

    /// Replaces a face by a fan of triangles around a new vertex at the face
    /// center. Returns the center vertex.
    ///
    /// The id of the split face survives on one of the fan sectors (the one at
    /// the face's reference halfedge), so attributes keyed by face id keep
    /// pointing into the fan.
    #[instrument(skip(self))]
    pub fn split_face_by_vertex(&mut self, face_id: FaceId) -> Option<VertexId> {
        let face = *self.faces.get(face_id)?;

        let loop_hes: Vec<_> = face.halfedges(self).collect();
        if loop_hes.len() < 3 {
            error!("Cannot split a degenerate face");
            return None;
        }

        let corners: Vec<_> = loop_hes
            .iter()
            .map(|he_id| self.halfedges[*he_id].start_vertex(self))
            .collect();

        let center_v = self.insert_vertex(face.center(self));

        let mut spokes = Vec::with_capacity(corners.len());
        let mut spokes_back = Vec::with_capacity(corners.len());

        for corner in &corners {
            let spoke = self.insert_halfedge(*corner, center_v);
            let spoke_back = self.insert_halfedge(center_v, *corner);
            self.make_twins(spoke, spoke_back);
            spokes.push(spoke);
            spokes_back.push(spoke_back);
        }

        let n = loop_hes.len();
        for i in 0..n {
            let sector_id = if i == 0 {
                self.faces[face_id].halfedge = loop_hes[0];
                face_id
            } else {
                self.faces.insert_with_key(|id| Face {
                    halfedge: loop_hes[i],
                    id,
                })
            };

            let spoke_in = spokes[(i + 1) % n];
            let spoke_out = spokes_back[i];

            self.halfedges[loop_hes[i]].face = Some(sector_id);
            self.halfedges[loop_hes[i]].next = Some(spoke_in);
            self.halfedges[spoke_in].face = Some(sector_id);
            self.halfedges[spoke_in].next = Some(spoke_out);
            self.halfedges[spoke_out].face = Some(sector_id);
            self.halfedges[spoke_out].next = Some(loop_hes[i]);
        }

        self.vertices[center_v].outgoing_halfedge = Some(spokes_back[0]);

        Some(center_v)
    }

    /// Splits a face in two by inserting an edge between two of its corners.
    ///
    /// The original face id keeps the side that runs from `v0` to `v1`; the
    /// returned new face is the side running from `v1` back to `v0`.
    #[instrument(skip(self))]
    pub fn split_face_by_edge(
        &mut self,
        face_id: FaceId,
        v0: VertexId,
        v1: VertexId,
    ) -> Option<FaceId> {
        if v0 == v1 {
            error!("Cannot split a face between a vertex and itself");
            return None;
        }

        let face = *self.faces.get(face_id)?;

        let h_a = face.halfedge_ending_at(v0, self)?;
        let h_b = face.halfedge_ending_at(v1, self)?;

        let first = self.halfedges[h_a].next?;
        let second = self.halfedges[h_b].next?;

        let h_new = self.insert_halfedge(v0, v1);
        let h_new_twin = self.insert_halfedge(v1, v0);
        self.make_twins(h_new, h_new_twin);

        // old face keeps v0→…→v1 plus the closing edge v1→v0
        self.halfedges[h_b].next = Some(h_new_twin);
        self.halfedges[h_new_twin].next = Some(first);
        self.halfedges[h_new_twin].face = Some(face_id);
        self.faces[face_id].halfedge = h_new_twin;

        let new_face_id = self.faces.insert_with_key(|id| Face { halfedge: h_new, id });
        self.halfedges[h_new].face = Some(new_face_id);
        self.halfedges[h_new].next = Some(second);
        self.halfedges[h_a].next = Some(h_new);

        let mut current = second;
        loop {
            self.halfedges[current].face = Some(new_face_id);
            if current == h_a {
                break;
            }
            current = unwrap_or_return!(
                self.halfedges[current].next,
                "Face loop is not closed",
                Some(new_face_id)
            );
        }

        Some(new_face_id)
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec3;
    use itertools::Itertools;

    use crate::PolyMesh;

    fn quad() -> (PolyMesh, crate::FaceId) {
        let mut mesh = PolyMesh::new();
        let face_id = mesh
            .add_face(&[
                dvec3(0.0, 0.0, 0.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(1.0, 1.0, 0.0),
                dvec3(0.0, 1.0, 0.0),
            ])
            .unwrap();
        (mesh, face_id)
    }

    #[test]
    fn test_split_edge() {
        let (mut mesh, face_id) = quad();

        let he_id = mesh.faces[face_id].halfedge;
        let mid_v = mesh.split_edge(he_id).unwrap();

        assert_eq!(mesh.faces[face_id].size(&mesh), 5);
        assert_eq!(mesh.positions[mid_v], dvec3(0.5, 0.0, 0.0));
        assert_eq!(mesh.valency(mid_v), 2);
    }

    #[test]
    fn test_split_face_by_vertex() {
        let (mut mesh, face_id) = quad();

        let center_v = mesh.split_face_by_vertex(face_id).unwrap();

        assert_eq!(mesh.faces.len(), 4);
        assert_eq!(mesh.valency(center_v), 4);
        assert_eq!(mesh.positions[center_v], dvec3(0.5, 0.5, 0.0));

        // the original id is one of the fan sectors
        assert!(mesh.in_use_face(face_id));
        assert_eq!(mesh.faces[face_id].size(&mesh), 3);
    }

    #[test]
    fn test_split_face_by_edge() {
        let (mut mesh, face_id) = quad();

        let corners = mesh.faces[face_id].vertices(&mesh).collect_vec();
        let v0 = corners[0];
        let v1 = corners[2];

        let new_face_id = mesh.split_face_by_edge(face_id, v0, v1).unwrap();

        assert_eq!(mesh.faces.len(), 2);
        assert_eq!(mesh.faces[face_id].size(&mesh), 3);
        assert_eq!(mesh.faces[new_face_id].size(&mesh), 3);

        // the old id keeps the v0→v1 side, the new one the way back
        let old_corners = mesh.faces[face_id].vertices(&mesh).collect_vec();
        assert!(old_corners.contains(&corners[1]));
        let new_corners = mesh.faces[new_face_id].vertices(&mesh).collect_vec();
        assert!(new_corners.contains(&corners[3]));
    }
}
