use tracing::{error, instrument};

use crate::{FaceId, HalfedgeId, PolyMesh, VertexId, utils::unwrap_or_return};

mod bridge;
mod create;
mod insert;
mod merge;
mod split;
mod stitch;
mod subdivide;

impl PolyMesh {
    /// Previous halfedge in the face loop, found by walking `next` all the way
    /// around the polygon.
    pub fn prev_halfedge(&self, halfedge_id: HalfedgeId) -> Option<HalfedgeId> {
        let mut current = halfedge_id;

        for _ in 0..self.halfedges.len() {
            let next = self.halfedges.get(current)?.next?;
            if next == halfedge_id {
                return Some(current);
            }
            current = next;
        }

        error!("Face loop is not closed");
        None
    }

    /// Flips this edge so that it represents the other diagonal described by the quad formed by the two incident triangles.
    ///
    /// ```text
    ///      .                    .
    ///     ( )                  ( )
    ///     ╱'╲                  ╱'╲
    ///    ╱   ╲                ╱ ║ ╲
    ///  .╱     ╲.            .╱  ║  ╲.
    /// ( )═════( )    =>    ( )  ║  ( )
    ///  '╲     ╱'            '╲  ║  ╱'
    ///    ╲   ╱                ╲ ║ ╱
    ///     ╲.╱                  ╲.╱
    ///     ( )                  ( )
    ///      '                    '
    /// ```
    #[instrument(skip(self))]
    pub fn flip_edge(&mut self, halfedge_id: HalfedgeId) {
        let he = *unwrap_or_return!(self.halfedges.get(halfedge_id), "Halfedge not found");
        let twin_id = unwrap_or_return!(he.twin, "Twin not found");
        let twin = *unwrap_or_return!(self.halfedges.get(twin_id), "Twin not found");

        let f1 = unwrap_or_return!(he.face, "Cannot flip a boundary halfedge");
        let f2 = unwrap_or_return!(twin.face, "Cannot flip a boundary halfedge");

        let n1 = unwrap_or_return!(he.next, "Next not found");
        let p1 = unwrap_or_return!(
            self.halfedges.get(n1).and_then(|he| he.next),
            "Prev not found"
        );
        let n2 = unwrap_or_return!(twin.next, "Twin next not found");
        let p2 = unwrap_or_return!(
            self.halfedges.get(n2).and_then(|he| he.next),
            "Twin prev not found"
        );

        // only a pair of triangles describes a quad with a flippable diagonal
        if self.halfedges.get(p1).and_then(|he| he.next) != Some(halfedge_id)
            || self.halfedges.get(p2).and_then(|he| he.next) != Some(twin_id)
        {
            error!("Flip is only defined between two triangles");
            return;
        }

        let a = twin.end_vertex;
        let b = he.end_vertex;
        let c = self.halfedges[n1].end_vertex;
        let d = self.halfedges[n2].end_vertex;

        // new loops: f1 = (a→d, d→c, c→a), f2 = (b→c, c→d, d→b)
        self.halfedges[halfedge_id].end_vertex = c;
        self.halfedges[halfedge_id].next = Some(p1);
        self.halfedges[n2].face = Some(f1);
        self.halfedges[n2].next = Some(halfedge_id);
        self.halfedges[p1].next = Some(n2);

        self.halfedges[twin_id].end_vertex = d;
        self.halfedges[twin_id].next = Some(p2);
        self.halfedges[n1].face = Some(f2);
        self.halfedges[n1].next = Some(twin_id);
        self.halfedges[p2].next = Some(n1);

        self.faces[f1].halfedge = halfedge_id;
        self.faces[f2].halfedge = twin_id;

        self.move_outgoing(halfedge_id, a, d);
        self.move_outgoing(twin_id, b, c);
    }

    /// Makes two halfedges twins of each other. Doesn't change anything else
    pub fn make_twins(&mut self, he_id1: HalfedgeId, he_id2: HalfedgeId) {
        let he1 = unwrap_or_return!(self.halfedges.get_mut(he_id1), "Halfedge not found");
        he1.twin = Some(he_id2);

        let he2 = unwrap_or_return!(self.halfedges.get_mut(he_id2), "Halfedge not found");
        he2.twin = Some(he_id1);
    }

    /// Registers a halfedge as outgoing from a vertex.
    pub(crate) fn add_outgoing(&mut self, vertex_id: VertexId, halfedge_id: HalfedgeId) {
        let hes = unwrap_or_return!(
            self.outgoing_halfedges.get_mut(vertex_id),
            "Vertex has no outgoing list"
        );
        hes.push(halfedge_id);

        let vertex = unwrap_or_return!(self.vertices.get_mut(vertex_id), "Vertex not found");
        if vertex.outgoing_halfedge.is_none() {
            vertex.outgoing_halfedge = Some(halfedge_id);
        }
    }

    /// Unregisters a halfedge from a vertex and repairs the vertex's reference
    /// halfedge if it pointed at the removed one.
    pub(crate) fn remove_outgoing(&mut self, vertex_id: VertexId, halfedge_id: HalfedgeId) {
        if let Some(hes) = self.outgoing_halfedges.get_mut(vertex_id) {
            hes.retain(|he_id| *he_id != halfedge_id);
        }

        let Some(vertex) = self.vertices.get(vertex_id) else {
            return;
        };

        if vertex.outgoing_halfedge == Some(halfedge_id) {
            let replacement = self.preferred_outgoing(vertex_id);
            self.vertices[vertex_id].outgoing_halfedge = replacement;
        }
    }

    fn move_outgoing(&mut self, halfedge_id: HalfedgeId, from: VertexId, to: VertexId) {
        self.remove_outgoing(from, halfedge_id);
        self.add_outgoing(to, halfedge_id);
    }

    /// Picks a reference outgoing halfedge for a vertex, preferring a boundary one.
    pub(crate) fn preferred_outgoing(&self, vertex_id: VertexId) -> Option<HalfedgeId> {
        let hes = self.outgoing_halfedges.get(vertex_id)?;

        hes.iter()
            .copied()
            .find(|he_id| {
                self.halfedges
                    .get(*he_id)
                    .is_some_and(|he| he.is_boundary())
            })
            .or_else(|| hes.first().copied())
    }

    /// Removes a halfedge from the mesh and from the outgoing list of its
    /// start vertex. Doesn't touch the twin.
    pub(crate) fn detach_halfedge(&mut self, halfedge_id: HalfedgeId, start_vertex: VertexId) {
        self.remove_outgoing(start_vertex, halfedge_id);
        self.halfedges.remove(halfedge_id);
    }

    /// Removes a vertex that has no edges left.
    pub(crate) fn remove_isolated_vertex(&mut self, vertex_id: VertexId) {
        if self.valency(vertex_id) == 0 {
            self.positions.remove(vertex_id);
            self.outgoing_halfedges.remove(vertex_id);
            self.vertices.remove(vertex_id);
        }
    }

    /// The face on the other side of the halfedge.
    pub fn face_across(&self, halfedge_id: HalfedgeId) -> Option<FaceId> {
        self.halfedges
            .get(self.halfedges.get(halfedge_id)?.twin?)?
            .face
    }
}
