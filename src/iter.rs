use tracing::error;

use crate::{HalfedgeId, PolyMesh};

/// Cursor over a cyclic halfedge sequence: a face loop or the star of a
/// vertex, depending on the advance function.
///
/// Faces here can be arbitrary n-gons, so a walk chases `next`/`twin`
/// pointers an unknown number of steps. The cursor budgets the walk by the
/// total halfedge count of the mesh: a loop that fails to close (a corrupted
/// mesh mid-surgery) terminates with an error instead of cycling forever.
pub struct CircularHalfedgesIterator<'a> {
    mesh: &'a PolyMesh,
    start: Option<HalfedgeId>,
    current: Option<HalfedgeId>,
    advance: fn(HalfedgeId, &'a PolyMesh) -> Option<HalfedgeId>,
    /// Steps left before the walk is declared a runaway.
    budget: usize,
}

impl<'a> CircularHalfedgesIterator<'a> {
    pub fn new(
        start: Option<HalfedgeId>,
        mesh: &'a PolyMesh,
        advance: fn(HalfedgeId, &'a PolyMesh) -> Option<HalfedgeId>,
    ) -> Self {
        Self {
            mesh,
            start,
            current: None,
            advance,
            // no uncorrupted cycle is longer than the whole mesh
            budget: mesh.halfedges.len(),
        }
    }
}

impl<'a> Iterator for CircularHalfedgesIterator<'a> {
    type Item = HalfedgeId;

    fn next(&mut self) -> Option<HalfedgeId> {
        let next = match self.current {
            None => self.start?,
            Some(current) => {
                let next = (self.advance)(current, self.mesh)?;
                if Some(next) == self.start {
                    return None;
                }
                next
            }
        };

        if self.budget == 0 {
            error!("Halfedge cycle does not close");
            return None;
        }
        self.budget -= 1;

        self.current = Some(next);
        Some(next)
    }
}
