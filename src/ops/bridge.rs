use hashbrown::HashMap;
use tracing::{error, instrument};

use crate::{Face, FaceId, PolyMesh, VertexId, utils::unwrap_or_return};

impl PolyMesh {
    /// Welds two face loops of equal size into a tube of quads.
    ///
    /// `connections` pairs each corner of `face_id0` with a corner of
    /// `face_id1`. Both faces are consumed; for the ring of quads to be
    /// manifold the two loops have to run in opposite directions along the
    /// pairing, which is checked before any surgery happens.
    ///
    /// Returns the new quads, or an empty list if the connection set doesn't
    /// describe a valid tube.
    #[instrument(skip(self, connections))]
    pub fn bridge_faces(
        &mut self,
        face_id0: FaceId,
        face_id1: FaceId,
        connections: &[(VertexId, VertexId)],
    ) -> Vec<FaceId> {
        let face0 = *unwrap_or_return!(self.faces.get(face_id0), "Face 0 not found", vec![]);
        let face1 = *unwrap_or_return!(self.faces.get(face_id1), "Face 1 not found", vec![]);

        let loop0: Vec<_> = face0.halfedges(self).collect();
        let loop1: Vec<_> = face1.halfedges(self).collect();

        let len = loop0.len();

        if loop1.len() != len || connections.len() != len {
            error!("Bridged face loops must have equal size");
            return vec![];
        }

        let partner: HashMap<VertexId, VertexId> = connections.iter().copied().collect();
        if partner.len() != len {
            error!("Bridge connections are not a bijection");
            return vec![];
        }

        let starts0: Vec<_> = loop0
            .iter()
            .map(|he_id| self.halfedges[*he_id].start_vertex(self))
            .collect();

        let mut partners0 = Vec::with_capacity(len);
        for start_v in &starts0 {
            partners0.push(*unwrap_or_return!(
                partner.get(start_v),
                "Connection missing for a loop vertex",
                vec![]
            ));
        }

        let mut loop1_from_to = HashMap::new();
        for he_id in &loop1 {
            let he = self.halfedges[*he_id];
            loop1_from_to.insert((he.start_vertex(self), he.end_vertex), *he_id);
        }

        // the edge of face 1 that closes quad i runs against face 1's loop
        let mut closing = Vec::with_capacity(len);
        for i in 0..len {
            let key = (partners0[(i + 1) % len], partners0[i]);
            closing.push(*unwrap_or_return!(
                loop1_from_to.get(&key),
                "Bridge connections do not reverse orientation",
                vec![]
            ));
        }

        let mut rungs = Vec::with_capacity(len);
        let mut rungs_back = Vec::with_capacity(len);

        for i in 0..len {
            let rung = self.insert_halfedge(starts0[i], partners0[i]);
            let rung_back = self.insert_halfedge(partners0[i], starts0[i]);
            self.make_twins(rung, rung_back);
            rungs.push(rung);
            rungs_back.push(rung_back);
        }

        let mut new_faces = Vec::with_capacity(len);

        for i in 0..len {
            let quad_id = self.faces.insert_with_key(|id| Face {
                halfedge: loop0[i],
                id,
            });

            let along0 = loop0[i];
            let down = rungs[(i + 1) % len];
            let along1 = closing[i];
            let up = rungs_back[i];

            for (he_id, next_id) in [
                (along0, down),
                (down, along1),
                (along1, up),
                (up, along0),
            ] {
                self.halfedges[he_id].face = Some(quad_id);
                self.halfedges[he_id].next = Some(next_id);
            }

            new_faces.push(quad_id);
        }

        self.faces.remove(face_id0);
        self.faces.remove(face_id1);

        new_faces
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec3;
    use itertools::Itertools;

    use crate::PolyMesh;

    #[test]
    fn test_bridge_two_pillows_into_a_box() {
        let mut mesh = PolyMesh::new();

        // two coaxial square pillows facing each other along x
        let ring = |x: f64| {
            [
                dvec3(x, 0.0, 0.0),
                dvec3(x, 1.0, 0.0),
                dvec3(x, 1.0, 1.0),
                dvec3(x, 0.0, 1.0),
            ]
        };

        let a = ring(0.0);
        let b = ring(1.0);

        // pillow at x=0: front face looks towards +x
        let front_a = mesh.add_face(&a).unwrap();
        mesh.add_face(&[a[0], a[3], a[2], a[1]]).unwrap();
        mesh.stitch_mesh(1e-10);

        // pillow at x=1: front face looks towards -x
        let front_b = mesh.add_face(&[b[0], b[3], b[2], b[1]]).unwrap();
        mesh.add_face(&b).unwrap();
        mesh.stitch_mesh(1e-10);

        assert!(
            (mesh.faces[front_a].normal(&mesh).unwrap() - dvec3(1.0, 0.0, 0.0)).length() < 1e-12
        );
        assert!(
            (mesh.faces[front_b].normal(&mesh).unwrap() - dvec3(-1.0, 0.0, 0.0)).length() < 1e-12
        );

        // pair up corners that only differ in x
        let loop0 = mesh.faces[front_a].vertices(&mesh).collect_vec();
        let connections = loop0
            .iter()
            .map(|v0| {
                let p0 = mesh.positions[*v0];
                let v1 = mesh.faces[front_b]
                    .vertices(&mesh)
                    .find(|v1| {
                        let p1 = mesh.positions[*v1];
                        p1.y == p0.y && p1.z == p0.z
                    })
                    .unwrap();
                (*v0, v1)
            })
            .collect_vec();

        let quads = mesh.bridge_faces(front_a, front_b, &connections);

        assert_eq!(quads.len(), 4);
        assert!(!mesh.in_use_face(front_a));
        assert!(!mesh.in_use_face(front_b));

        // closed box: 6 quads, 8 vertices, Euler characteristic 2
        assert_eq!(mesh.faces.len(), 6);
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.halfedges.len(), 24);

        for (he_id, he) in &mesh.halfedges {
            assert!(he.face.is_some());
            assert_eq!(mesh.halfedges[he.twin()].twin, Some(he_id));
        }

        for (_, face) in &mesh.faces {
            assert_eq!(face.size(&mesh), 4);
        }
    }
}
