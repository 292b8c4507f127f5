use hashbrown::HashSet;
use slotmap::SecondaryMap;
use tracing::{instrument, warn};

use crate::PolyMesh;

impl PolyMesh {
    /// One face-split subdivision pass that turns every n-gon into n quads
    /// while keeping the original face ids alive.
    ///
    /// Each face is first fanned around a center vertex, then every original
    /// edge is split at its midpoint and connected to the centers of the two
    /// adjacent fans. Finally all fan edges are dissolved again, leaving one
    /// quad per original corner. Because the fan sector at a face's reference
    /// halfedge inherits the face id and survives the dissolving, attributes
    /// keyed by original face ids keep pointing at one of the result quads.
    #[instrument(skip(self))]
    pub fn subdivide_preserving_ids(&mut self) {
        let base_faces: Vec<_> = self.faces.keys().collect();
        let base_edges: Vec<_> = self.halfedges.keys().collect();

        let mut face_to_center = SecondaryMap::new();
        let mut fan_edges = vec![];

        for face_id in base_faces {
            if !self.in_use_face(face_id) {
                continue;
            }

            let Some(center_v) = self.split_face_by_vertex(face_id) else {
                continue;
            };

            let spokes: Vec<_> = self.vertices[center_v].outgoing_halfedges(self).collect();
            for spoke_id in spokes {
                fan_edges.push(spoke_id);
                if let Some(sector_id) = self.halfedges[spoke_id].face {
                    face_to_center.insert(sector_id, center_v);
                }
            }
        }

        let mut touched = HashSet::new();

        for he_id in base_edges {
            if !self.in_use_halfedge(he_id) {
                continue;
            }

            let Some(f1) = self.halfedges[he_id].face else {
                continue;
            };
            let Some(f2) = self.face_across(he_id) else {
                continue;
            };

            if touched.contains(&f1) || touched.contains(&f2) {
                continue;
            }

            let (Some(&center1), Some(&center2)) =
                (face_to_center.get(f1), face_to_center.get(f2))
            else {
                warn!("Fan sector without a recorded center vertex");
                continue;
            };

            let Some(mid_v) = self.split_edge(he_id) else {
                continue;
            };

            touched.insert(f1);
            touched.insert(f2);

            self.split_face_by_edge(f1, center1, mid_v);
            self.split_face_by_edge(f2, center2, mid_v);
        }

        for he_id in fan_edges {
            if !self.in_use_halfedge(he_id) {
                continue;
            }

            if let Some(face_id) = self.halfedges[he_id].face {
                self.merge_faces(face_id, he_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec3;

    use crate::{PolyMesh, utils::get_tracing_subscriber};

    #[test]
    fn test_subdivide_tetrahedron() {
        get_tracing_subscriber();

        let mut mesh = PolyMesh::new();

        let p = [
            dvec3(1.0, 1.0, 1.0),
            dvec3(1.0, -1.0, -1.0),
            dvec3(-1.0, 1.0, -1.0),
            dvec3(-1.0, -1.0, 1.0),
        ];

        // outward-wound tetrahedron
        mesh.add_face(&[p[0], p[1], p[2]]).unwrap();
        mesh.add_face(&[p[0], p[2], p[3]]).unwrap();
        mesh.add_face(&[p[0], p[3], p[1]]).unwrap();
        mesh.add_face(&[p[1], p[3], p[2]]).unwrap();
        mesh.stitch_mesh(1e-10);

        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.halfedges.len(), 12);

        let original_faces: Vec<_> = mesh.faces.keys().collect();

        mesh.subdivide_preserving_ids();

        // every triangle becomes three quads
        assert_eq!(mesh.faces.len(), 12);
        assert_eq!(mesh.vertices.len(), 14);
        assert_eq!(mesh.halfedges.len(), 48);

        for (_, face) in &mesh.faces {
            assert_eq!(face.size(&mesh), 4);
        }

        // ids survive the pass
        for face_id in original_faces {
            assert!(mesh.in_use_face(face_id));
            assert_eq!(mesh.faces[face_id].size(&mesh), 4);
        }

        // still a closed manifold
        for (he_id, he) in &mesh.halfedges {
            assert!(he.face.is_some());
            assert_eq!(mesh.halfedges[he.twin()].twin, Some(he_id));
        }
    }
}
