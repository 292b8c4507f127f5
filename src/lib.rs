//! skeleton-mesh converts abstract 3D skeletal graphs (nodes with positions
//! plus undirected edges) into watertight, quad-dominant polygonal surface
//! meshes that envelop the skeleton.
//!
//! Every branch node of the skeleton is wrapped in a small polyhedron with one
//! face per outgoing arc, chains of low-valence nodes become tubes of matching
//! cross-section, and the pieces are welded together by bridging face loops.
//!
//! ## Usage
//!
//! ```
//! use glam::DVec3;
//! use skeleton_mesh::{Skeleton, skeleton_to_feq};
//!
//! let mut skeleton = Skeleton::new();
//! let a = skeleton.add_node(DVec3::ZERO);
//! let b = skeleton.add_node(DVec3::X);
//! skeleton.connect(a, b);
//!
//! let mesh = skeleton_to_feq(&skeleton);
//!
//! for (_face_id, face) in &mesh.faces {
//!     let _normal = face.normal(&mesh);
//! }
//! ```
//!
//! The mesh type itself is a general polygonal halfedge structure with the
//! surgery operations the conversion needs: face splits, face merges, edge
//! flips, one-ring collapses, loop bridging and boundary stitching.

pub mod delaunay;
mod elements;
mod feq;
mod graph;
mod iter;
mod ops;
mod utils;

pub use elements::*;
pub use feq::*;
pub use graph::*;
pub use iter::*;

use glam::DVec3;
use slotmap::{SecondaryMap, SlotMap};

/// Halfedge data structure for representing polygonal meshes.
///
/// Unlike a pure triangle mesh structure, faces may have any number of edges;
/// all traversal walks the `next` loop instead of assuming three corners.
#[derive(Clone, Default)]
pub struct PolyMesh {
    /// Maps vertex IDs to their corresponding graph node
    pub vertices: SlotMap<VertexId, Vertex>,
    /// Maps halfedge IDs to their corresponding graph node
    pub halfedges: SlotMap<HalfedgeId, Halfedge>,
    /// Maps face IDs to their corresponding graph node
    pub faces: SlotMap<FaceId, Face>,

    /// Maps vertex IDs to their corresponding positions
    pub positions: SecondaryMap<VertexId, DVec3>,

    /// Maps vertex IDs to their corresponding outgoing halfedges (not in any particular order)
    pub outgoing_halfedges: SecondaryMap<VertexId, Vec<HalfedgeId>>,
}

impl PolyMesh {
    /// Create a new empty mesh
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edges incident to the vertex.
    ///
    /// Works on boundary vertices as well because it is backed by the
    /// outgoing halfedge lists rather than a twin-next circulation.
    #[inline]
    pub fn valency(&self, vertex_id: VertexId) -> usize {
        self.outgoing_halfedges
            .get(vertex_id)
            .map(|hes| hes.len())
            .unwrap_or(0)
    }

    /// Returns `true` while the face id refers to a live face.
    #[inline]
    pub fn in_use_face(&self, face_id: FaceId) -> bool {
        self.faces.contains_key(face_id)
    }

    /// Returns `true` while the vertex id refers to a live vertex.
    #[inline]
    pub fn in_use_vertex(&self, vertex_id: VertexId) -> bool {
        self.vertices.contains_key(vertex_id)
    }

    /// Returns `true` while the halfedge id refers to a live halfedge.
    #[inline]
    pub fn in_use_halfedge(&self, halfedge_id: HalfedgeId) -> bool {
        self.halfedges.contains_key(halfedge_id)
    }

    /// Normal of a vertex, computed as the normalized sum of the incident face
    /// normals.
    pub fn vertex_normal(&self, vertex_id: VertexId) -> Option<DVec3> {
        let vertex = self.vertices.get(vertex_id)?;

        let mut normal = DVec3::ZERO;

        for face_id in vertex.faces(self) {
            normal += self.faces.get(face_id)?.normal(self)?;
        }

        (normal.length_squared() > 0.0).then(|| normal.normalize())
    }
}
