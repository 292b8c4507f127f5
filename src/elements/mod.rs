mod face;
mod halfedge;
mod vertex;

pub use face::*;
pub use halfedge::*;
pub use vertex::*;

slotmap::new_key_type! {
    /// Id of a [`Vertex`] in a [`PolyMesh`](crate::PolyMesh)
    pub struct VertexId;

    /// Id of a [`Halfedge`] in a [`PolyMesh`](crate::PolyMesh)
    pub struct HalfedgeId;

    /// Id of a [`Face`] in a [`PolyMesh`](crate::PolyMesh)
    pub struct FaceId;
}
