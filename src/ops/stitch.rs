use glam::DVec3;
use hashbrown::{HashMap, HashSet};
use tracing::instrument;

use crate::{HalfedgeId, PolyMesh, VertexId};

impl PolyMesh {
    /// Welds boundary vertices that are within `tolerance` of each other and
    /// glues matching opposite boundary halfedges together.
    ///
    /// This is how separately added faces and merged components are joined
    /// into one connected surface. Stitching is idempotent: a second call with
    /// the same tolerance finds nothing left to weld.
    #[instrument(skip(self))]
    pub fn stitch_mesh(&mut self, tolerance: f64) {
        self.weld_boundary_vertices(tolerance);
        self.glue_boundary_halfedges();
    }

    fn weld_boundary_vertices(&mut self, tolerance: f64) {
        let cell = tolerance.max(1e-12);
        let tolerance_sqr = tolerance * tolerance;

        let mut grid: HashMap<[i64; 3], Vec<VertexId>> = HashMap::new();

        let vertex_ids: Vec<_> = self.vertices.keys().collect();

        for vertex_id in vertex_ids {
            if !self.is_boundary_vertex(vertex_id) {
                continue;
            }

            let pos = self.positions[vertex_id];
            let key = quantize(pos, cell);

            let mut representative = None;

            'search: for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let neighbour_key = [key[0] + dx, key[1] + dy, key[2] + dz];

                        let Some(candidates) = grid.get(&neighbour_key) else {
                            continue;
                        };

                        for candidate in candidates {
                            if self.positions[*candidate].distance_squared(pos) <= tolerance_sqr {
                                representative = Some(*candidate);
                                break 'search;
                            }
                        }
                    }
                }
            }

            match representative {
                Some(representative) => self.replace_vertex(vertex_id, representative),
                None => grid.entry(key).or_default().push(vertex_id),
            }
        }
    }

    /// Redirects all connectivity of `vertex_id` to `replacement` and removes
    /// the vertex.
    fn replace_vertex(&mut self, vertex_id: VertexId, replacement: VertexId) {
        let outgoing = self.outgoing_halfedges[vertex_id].clone();

        for he_id in outgoing {
            if let Some(twin_id) = self.halfedges[he_id].twin {
                self.halfedges[twin_id].end_vertex = replacement;
            }

            self.outgoing_halfedges[replacement].push(he_id);
        }

        self.positions.remove(vertex_id);
        self.outgoing_halfedges.remove(vertex_id);
        self.vertices.remove(vertex_id);

        let preferred = self.preferred_outgoing(replacement);
        self.vertices[replacement].outgoing_halfedge = preferred;
    }

    fn glue_boundary_halfedges(&mut self) {
        let boundary: Vec<_> = self
            .halfedges
            .iter()
            .filter(|(_, he)| he.is_boundary())
            .map(|(he_id, _)| he_id)
            .collect();

        let mut by_ends: HashMap<(VertexId, VertexId), Vec<HalfedgeId>> = HashMap::new();

        for he_id in &boundary {
            let he = self.halfedges[*he_id];
            by_ends
                .entry((he.start_vertex(self), he.end_vertex))
                .or_default()
                .push(*he_id);
        }

        let mut consumed = HashSet::new();

        for he_id in boundary {
            if consumed.contains(&he_id) {
                continue;
            }

            let he = self.halfedges[he_id];
            let start_v = he.start_vertex(self);
            let end_v = he.end_vertex;

            // anything but a clean one-to-one match is left open
            if by_ends[&(start_v, end_v)].len() != 1 {
                continue;
            }
            let Some(opposites) = by_ends.get(&(end_v, start_v)) else {
                continue;
            };
            if opposites.len() != 1 {
                continue;
            }

            let opposite_id = opposites[0];
            if consumed.contains(&opposite_id) {
                continue;
            }

            let Some(inner1) = self.halfedges[he_id].twin else {
                continue;
            };
            let Some(inner2) = self.halfedges[opposite_id].twin else {
                continue;
            };
            if self.halfedges[inner1].is_boundary() || self.halfedges[inner2].is_boundary() {
                continue;
            }

            self.make_twins(inner1, inner2);

            consumed.insert(he_id);
            consumed.insert(opposite_id);

            self.detach_halfedge(he_id, start_v);
            self.detach_halfedge(opposite_id, end_v);
        }
    }

    /// Whether the vertex touches at least one boundary edge.
    pub fn is_boundary_vertex(&self, vertex_id: VertexId) -> bool {
        self.outgoing_halfedges
            .get(vertex_id)
            .is_some_and(|he_ids| {
                he_ids.iter().any(|he_id| {
                    self.halfedges.get(*he_id).is_some_and(|he| {
                        he.is_boundary()
                            || he
                                .twin
                                .and_then(|twin_id| self.halfedges.get(twin_id))
                                .is_some_and(|twin| twin.is_boundary())
                    })
                })
            })
    }
}

fn quantize(pos: DVec3, cell: f64) -> [i64; 3] {
    [
        (pos.x / cell).floor() as i64,
        (pos.y / cell).floor() as i64,
        (pos.z / cell).floor() as i64,
    ]
}
