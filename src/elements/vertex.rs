use tracing::instrument;

use crate::{CircularHalfedgesIterator, PolyMesh, error_none};

use super::{FaceId, HalfedgeId, VertexId};

/// A vertex is a corner point of one or more faces.
#[derive(Debug, Default, Clone, Copy)]
pub struct Vertex {
    /// One of the halfedges with this vertex as start point.
    /// If possible this is a boundary halfedge, i.e. it has no associated face.
    ///
    /// After the mesh is constructed correctly, this is always `Some`.
    pub outgoing_halfedge: Option<HalfedgeId>,
}

impl Vertex {
    /// Returns all halfedges that point away from this vertex in cyclic order.
    ///
    /// The circulation walks twin-next around the vertex, so it requires the
    /// star of the vertex to be closed. Use
    /// [`PolyMesh::valency`](crate::PolyMesh::valency) when only the edge count
    /// is needed; that works on boundary vertices too.
    #[instrument(skip(mesh))]
    pub fn outgoing_halfedges<'a>(&self, mesh: &'a PolyMesh) -> CircularHalfedgesIterator<'a> {
        CircularHalfedgesIterator::new(self.outgoing_halfedge, mesh, |he, mesh| {
            mesh.halfedges
                .get(he)
                .or_else(error_none!("Halfedge is None"))?
                .cw_rotated_neighbour(mesh)
        })
    }

    /// Returns all faces incident to this vertex in cyclic order.
    #[instrument(skip(mesh))]
    pub fn faces(&self, mesh: &PolyMesh) -> impl Iterator<Item = FaceId> {
        self.outgoing_halfedges(mesh).filter_map(|he| {
            mesh.halfedges
                .get(he)
                .or_else(error_none!("Halfedge is None"))?
                .face
        })
    }

    /// Returns all neighbouring (connected through an edge) vertices of this vertex.
    #[instrument(skip(mesh))]
    pub fn neighbours(&self, mesh: &PolyMesh) -> impl Iterator<Item = VertexId> {
        self.outgoing_halfedges(mesh).filter_map(|he| {
            mesh.halfedges
                .get(he)
                .or_else(error_none!("Halfedge is None"))
                .map(|he| he.end_vertex)
        })
    }
}
