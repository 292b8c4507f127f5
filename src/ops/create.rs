use glam::DVec3;
use hashbrown::HashMap;
use slotmap::SecondaryMap;
use tracing::{error, instrument};

use crate::{FaceId, PolyMesh};

impl PolyMesh {
    /// Adds an isolated polygonal face to the mesh.
    ///
    /// One fresh vertex is created per point, the interior halfedges are wired
    /// into a loop in the given winding and every interior halfedge gets a
    /// boundary twin. Coincident rims of separately added faces are joined
    /// later with [`stitch_mesh`](Self::stitch_mesh).
    #[instrument(skip(self, points))]
    pub fn add_face(&mut self, points: &[DVec3]) -> Option<FaceId> {
        if points.len() < 3 {
            error!("A face needs at least 3 points");
            return None;
        }

        let vertex_ids: Vec<_> = points.iter().map(|p| self.insert_vertex(*p)).collect();

        let mut inner_he_ids = Vec::with_capacity(points.len());
        let mut boundary_he_ids = Vec::with_capacity(points.len());

        for (i, vertex_id) in vertex_ids.iter().enumerate() {
            let next_vertex_id = vertex_ids[(i + 1) % vertex_ids.len()];

            inner_he_ids.push(self.insert_halfedge(*vertex_id, next_vertex_id));
            boundary_he_ids.push(self.insert_halfedge(next_vertex_id, *vertex_id));
        }

        for (inner_he_id, boundary_he_id) in inner_he_ids.iter().zip(&boundary_he_ids) {
            self.make_twins(*inner_he_id, *boundary_he_id);
        }

        let face_id = self.insert_face(&inner_he_ids);

        // boundary halfedges are the preferred reference of their start vertex
        for (i, boundary_he_id) in boundary_he_ids.iter().enumerate() {
            let start_vertex_id = vertex_ids[(i + 1) % vertex_ids.len()];
            self.vertices[start_vertex_id].outgoing_halfedge = Some(*boundary_he_id);
        }

        Some(face_id)
    }

    /// Copies every element of `other` into this mesh, remapping all ids.
    ///
    /// Returns the ids of the copied faces in the iteration order of `other`.
    /// Nothing is stitched; the copied component keeps its own connectivity.
    #[instrument(skip(self, other))]
    pub fn merge_mesh(&mut self, other: &PolyMesh) -> Vec<FaceId> {
        let mut vertex_map = SecondaryMap::new();
        let mut he_map = HashMap::new();

        for (vertex_id, _) in &other.vertices {
            let position = other.positions[vertex_id];
            vertex_map.insert(vertex_id, self.insert_vertex(position));
        }

        for (he_id, he) in &other.halfedges {
            let new_he_id = self.halfedges.insert(crate::Halfedge {
                end_vertex: vertex_map[he.end_vertex],
                face: None,
                twin: None,
                next: None,
            });
            he_map.insert(he_id, new_he_id);
        }

        let mut face_ids = Vec::with_capacity(other.faces.len());

        for (_, face) in &other.faces {
            let face_id = self.faces.insert_with_key(|id| crate::Face {
                halfedge: he_map[&face.halfedge],
                id,
            });
            face_ids.push(face_id);
        }

        let face_map: HashMap<_, _> = other.faces.keys().zip(face_ids.iter().copied()).collect();

        for (he_id, he) in &other.halfedges {
            let new_he_id = he_map[&he_id];
            let new_he = &mut self.halfedges[new_he_id];

            new_he.twin = he.twin.map(|twin_id| he_map[&twin_id]);
            new_he.next = he.next.map(|next_id| he_map[&next_id]);
            new_he.face = he.face.map(|face_id| face_map[&face_id]);
        }

        for (vertex_id, vertex) in &other.vertices {
            let new_vertex_id = vertex_map[vertex_id];

            self.vertices[new_vertex_id].outgoing_halfedge =
                vertex.outgoing_halfedge.map(|he_id| he_map[&he_id]);

            self.outgoing_halfedges[new_vertex_id] = other.outgoing_halfedges[vertex_id]
                .iter()
                .map(|he_id| he_map[he_id])
                .collect();
        }

        face_ids
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec3;

    use crate::PolyMesh;

    #[test]
    fn test_add_face() {
        let mut mesh = PolyMesh::new();

        let face_id = mesh
            .add_face(&[
                dvec3(0.0, 0.0, 0.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(1.0, 1.0, 0.0),
                dvec3(0.0, 1.0, 0.0),
            ])
            .unwrap();

        let face = mesh.faces[face_id];

        assert_eq!(face.size(&mesh), 4);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.halfedges.len(), 8);

        let normal = face.normal(&mesh).unwrap();
        assert!((normal - dvec3(0.0, 0.0, 1.0)).length() < 1e-12);

        for (_, he) in &mesh.halfedges {
            let twin = mesh.halfedges[he.twin()];
            assert!(he.face.is_some() != twin.face.is_some());
        }
    }

    #[test]
    fn test_merge_mesh() {
        let mut mesh = PolyMesh::new();
        mesh.add_face(&[
            dvec3(0.0, 0.0, 0.0),
            dvec3(1.0, 0.0, 0.0),
            dvec3(0.0, 1.0, 0.0),
        ])
        .unwrap();

        let mut other = PolyMesh::new();
        other
            .add_face(&[
                dvec3(0.0, 0.0, 1.0),
                dvec3(1.0, 0.0, 1.0),
                dvec3(0.0, 1.0, 1.0),
            ])
            .unwrap();

        let new_faces = mesh.merge_mesh(&other);

        assert_eq!(new_faces.len(), 1);
        assert_eq!(mesh.faces.len(), 2);
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.faces[new_faces[0]].size(&mesh), 3);
    }
}
