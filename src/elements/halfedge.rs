use crate::PolyMesh;

use super::{FaceId, HalfedgeId, VertexId};

/// A directional edge that points from one vertex to another and is (optionally) part of a face.
/// If it's not part of a face, it's called a boundary halfedge.
#[derive(Debug, Clone, Copy)]
pub struct Halfedge {
    /// The vertex that this halfedge points to.
    pub end_vertex: VertexId,

    /// The face associated to this halfedge. `None` if this is a boundary halfedge.
    pub face: Option<FaceId>,

    /// The halfedge opposite to this one.
    /// It points backwards compared to this halfedge (from end_vertex to start_vertex).
    /// After the mesh is constructed, this field is always `Some(...)`, meaning
    /// that every halfedge has a twin.
    pub twin: Option<HalfedgeId>,

    /// The next halfedge in the face loop. `None` if this is a boundary halfedge.
    pub next: Option<HalfedgeId>,
}

impl Halfedge {
    /// Start vertex from which this halfedge points away
    pub fn start_vertex(&self, mesh: &PolyMesh) -> VertexId {
        mesh.halfedges[self.twin()].end_vertex
    }

    /// Same as the field `twin` but expects there to be a `Some` which is the case if
    /// the mesh is constructed correctly.
    #[inline]
    pub fn twin(&self) -> HalfedgeId {
        self.twin.expect("Twin should be connected by now")
    }

    /// In clockwise order next halfedge that has the same start vertex.
    ///
    /// Only meaningful at vertices whose star is fully closed (no boundary halfedges).
    pub fn cw_rotated_neighbour(&self, mesh: &PolyMesh) -> Option<HalfedgeId> {
        mesh.halfedges[self.twin()].next
    }

    /// Length of the halfedge squared.
    pub fn length_squared(&self, mesh: &PolyMesh) -> f64 {
        let start = mesh.positions[self.start_vertex(mesh)];
        let end = mesh.positions[self.end_vertex];

        start.distance_squared(end)
    }

    /// Returns `true` if there is no face adjacent to this halfedge.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.face.is_none()
    }
}
