use glam::DVec3;
use tracing::{error, instrument};

use crate::{Face, FaceId, Halfedge, HalfedgeId, PolyMesh, Vertex, VertexId};

impl PolyMesh {
    /// Inserts a vertex and it's position into the mesh.
    /// It doesn't do any connections.
    pub fn insert_vertex(&mut self, position: DVec3) -> VertexId {
        let vertex = Vertex::default();
        let vertex_id = self.vertices.insert(vertex);
        self.positions.insert(vertex_id, position);

        self.outgoing_halfedges.insert(vertex_id, vec![]);

        vertex_id
    }

    /// Inserts a halfedge into the mesh. It only connects the halfedge to the given end vertex but not the reverse.
    /// It also doesn't do any other connections.
    /// It inserts into `self.outgoing_halfedges`.
    pub fn insert_halfedge(&mut self, start_vertex: VertexId, end_vertex: VertexId) -> HalfedgeId {
        let halfedge = Halfedge {
            end_vertex,
            next: None,
            twin: None,
            face: None,
        };
        let he_id = self.halfedges.insert(halfedge);

        self.add_outgoing(start_vertex, he_id);

        he_id
    }

    /// Inserts a face bounded by the given halfedges. The halfedges are wired
    /// into a `next` loop in the given order and all get the new face assigned.
    #[instrument(skip(self))]
    pub fn insert_face(&mut self, loop_he_ids: &[HalfedgeId]) -> FaceId {
        let face_id = self.faces.insert_with_key(|id| Face {
            halfedge: loop_he_ids[0],
            id,
        });

        for (i, he_id) in loop_he_ids.iter().enumerate() {
            let next_he_id = loop_he_ids[(i + 1) % loop_he_ids.len()];

            if let Some(halfedge) = self.halfedges.get_mut(*he_id) {
                halfedge.face = Some(face_id);
                halfedge.next = Some(next_he_id);
            } else {
                error!("Halfedge not found");
            }
        }

        face_id
    }
}
