use glam::DVec3;
use itertools::Itertools;
use tracing::{error, instrument};

use crate::{CircularHalfedgesIterator, PolyMesh, error_none};

use super::{FaceId, HalfedgeId, VertexId};

/// A polygonal face bounded by a cyclic loop of halfedges.
#[derive(Default, Debug, Clone, Copy)]
pub struct Face {
    /// One of the halfedges of the face.
    /// Serves as a starting point for traversing the face's edges and vertices
    pub halfedge: HalfedgeId,

    /// The associated face id
    pub id: FaceId,
}

impl Face {
    /// Returns the halfedges that form this face, in loop order.
    #[instrument(skip(mesh))]
    pub fn halfedges<'a>(&self, mesh: &'a PolyMesh) -> CircularHalfedgesIterator<'a> {
        CircularHalfedgesIterator::new(Some(self.halfedge), mesh, |he, mesh| {
            mesh.halfedges
                .get(he)
                .or_else(error_none!("Halfedge not found"))?
                .next
        })
    }

    /// Returns the corner vertices of this face in loop order.
    #[instrument(skip(mesh))]
    pub fn vertices(&self, mesh: &PolyMesh) -> impl Iterator<Item = VertexId> {
        self.halfedges(mesh).filter_map(|he| {
            mesh.halfedges
                .get(he)
                .or_else(error_none!("Halfedge not found"))
                .map(|he| he.end_vertex)
        })
    }

    /// Number of edges (= number of corners) of this face.
    #[instrument(skip(mesh))]
    pub fn size(&self, mesh: &PolyMesh) -> usize {
        self.halfedges(mesh).count()
    }

    /// Center position of this face.
    #[instrument(skip(mesh))]
    pub fn center(&self, mesh: &PolyMesh) -> DVec3 {
        let positions = self.vertex_positions(mesh).collect_vec();
        positions.iter().sum::<DVec3>() / positions.len().max(1) as f64
    }

    /// Returns an iterator over the vertex positions of this face.
    #[instrument(skip(mesh))]
    pub fn vertex_positions(&self, mesh: &PolyMesh) -> impl Iterator<Item = DVec3> {
        self.vertices(mesh).filter_map(|v| {
            mesh.positions
                .get(v)
                .or_else(error_none!("Position not found"))
                .copied()
        })
    }

    /// Compute the normal of this face using Newell's method so that non-planar
    /// polygons get a sensible average normal.
    #[instrument(skip(mesh))]
    pub fn normal(&self, mesh: &PolyMesh) -> Option<DVec3> {
        let positions = self.vertex_positions(mesh).collect_vec();

        if positions.len() < 3 {
            error!("Face has less than 3 vertex positions");
            return None;
        }

        let mut normal = DVec3::ZERO;
        for (i, p) in positions.iter().enumerate() {
            let q = positions[(i + 1) % positions.len()];
            normal += DVec3::new(
                (p.y - q.y) * (p.z + q.z),
                (p.z - q.z) * (p.x + q.x),
                (p.x - q.x) * (p.y + q.y),
            );
        }

        Some(normal.normalize())
    }

    /// Finds the halfedge of this face that ends at the given vertex.
    #[instrument(skip(mesh))]
    pub fn halfedge_ending_at(&self, vertex_id: VertexId, mesh: &PolyMesh) -> Option<HalfedgeId> {
        self.halfedges(mesh).find(|he_id| {
            mesh.halfedges
                .get(*he_id)
                .is_some_and(|he| he.end_vertex == vertex_id)
        })
    }

    /// Finds the halfedge of this face that goes from `start` to `end`.
    #[instrument(skip(mesh))]
    pub fn halfedge_from_to(
        &self,
        start: VertexId,
        end: VertexId,
        mesh: &PolyMesh,
    ) -> Option<HalfedgeId> {
        self.halfedges(mesh).find(|he_id| {
            mesh.halfedges.get(*he_id).is_some_and(|he| {
                he.end_vertex == end && he.start_vertex(mesh) == start
            })
        })
    }
}
