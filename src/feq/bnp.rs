//! Branch node polyhedra: one small convex mesh per junction, with one face
//! per outgoing arc.

use glam::DVec3;
use hashbrown::HashMap;
use slotmap::SecondaryMap;
use tracing::{instrument, warn};

use crate::{NodeId, PolyMesh, Skeleton, delaunay::sphere_delaunay};

use super::{FeqContext, GhostPolicy, retopo};

/// Builds a polyhedron around every junction and merges them into the output
/// mesh.
///
/// The arc directions of a junction are triangulated on the unit sphere,
/// planar triangle fans are retopologized into quads, the little mesh is
/// relaxed onto a sphere of the junction radius and its per-arc corner
/// positions are recorded for later lookups. A final id-preserving
/// subdivision pass turns everything into quads.
#[instrument(skip_all)]
pub(super) fn construct_branch_polyhedra(
    mesh: &mut PolyMesh,
    skeleton: &Skeleton,
    ctx: &mut FeqContext,
    base_radius: f64,
    radii: Option<&SecondaryMap<NodeId, f64>>,
    ghost_policy: GhostPolicy,
) {
    for n in skeleton.node_ids() {
        let neighbours = skeleton.neighbours(n);
        if neighbours.len() <= 2 {
            continue;
        }

        let pn = skeleton.positions[n];

        let mut radius = base_radius;
        if let Some(radii) = radii
            && let Some(&r) = radii.get(n)
            && r > base_radius
        {
            radius = r;
        }

        let mut directions: Vec<DVec3> = neighbours
            .iter()
            .map(|nn| (skeleton.positions[*nn] - pn).normalize())
            .collect();
        let arc_count = directions.len();

        if arc_count == 3 {
            add_ghost_points(&mut directions, skeleton, n, ghost_policy);
        }

        let triangles = sphere_delaunay(&directions);
        if triangles.is_empty() {
            warn!("Junction with a degenerate direction set, leaving its arcs open");
            continue;
        }

        let mut local = PolyMesh::new();
        for tri in &triangles {
            local.add_face(&[
                directions[tri[0]],
                directions[tri[1]],
                directions[tri[2]],
            ]);
        }
        local.stitch_mesh(1e-10);
        local.cleanup();

        // recover which local vertex belongs to which arc direction
        let mut direction_vertex = HashMap::new();
        for (vertex_id, pos) in &local.positions {
            for (i, direction) in directions.iter().enumerate() {
                if pos.distance_squared(*direction) < 1e-4 {
                    direction_vertex.entry(i).or_insert(vertex_id);
                }
            }
        }

        let ghost_added = directions.len() > arc_count;
        if arc_count > 3 && !ghost_added {
            retopo::retopologize_planar_regions(&mut local);
        }

        project_to_sphere(&mut local, radius, pn);

        for (i, nn) in neighbours.iter().enumerate() {
            let Some(vertex_id) = direction_vertex.get(&i) else {
                warn!("No polyhedron corner found for an arc direction");
                continue;
            };
            ctx.branch_vertex_pos
                .insert((n, *nn), local.positions[*vertex_id]);
        }

        local.cleanup();

        let new_faces = mesh.merge_mesh(&local);
        ctx.node_faces
            .entry(n)
            .unwrap()
            .or_default()
            .extend(new_faces);
    }

    mesh.subdivide_preserving_ids();
    mesh.cleanup();
    mesh.stitch_mesh(1e-10);
}

fn add_ghost_points(
    directions: &mut Vec<DVec3>,
    skeleton: &Skeleton,
    n: NodeId,
    ghost_policy: GhostPolicy,
) {
    let pn = skeleton.positions[n];
    let neighbours = skeleton.neighbours(n);

    match ghost_policy {
        GhostPolicy::Single => {
            // unit-offset endpoints of the three arcs
            let nb: Vec<DVec3> = directions.iter().map(|d| pn + *d).collect();

            let d12 = nb[0].distance_squared(nb[1]);
            let d23 = nb[1].distance_squared(nb[2]);
            let d13 = nb[0].distance_squared(nb[2]);

            let ghost = if d12 < d23 {
                if d12 < d13 {
                    0.5 * (nb[0] + nb[1]) - pn
                } else {
                    0.5 * (nb[0] + nb[2]) - pn
                }
            } else if d23 < d13 {
                0.5 * (nb[1] + nb[2]) - pn
            } else {
                0.5 * (nb[0] + nb[2]) - pn
            };

            directions.push(ghost.normalize());
        }
        GhostPolicy::Triple => {
            let p0 = skeleton.positions[neighbours[0]];
            let p1 = skeleton.positions[neighbours[1]];
            let p2 = skeleton.positions[neighbours[2]];

            directions.push((0.5 * (p0 + p1) - pn).normalize());
            directions.push((0.5 * (p1 + p2) - pn).normalize());
            directions.push((0.5 * (p0 + p2) - pn).normalize());
        }
    }
}

/// Three relaxation passes pulling every vertex along its normal, then a hard
/// projection onto the sphere of the given radius around the junction.
fn project_to_sphere(mesh: &mut PolyMesh, radius: f64, center: DVec3) {
    for _ in 0..3 {
        let mut new_positions = SecondaryMap::new();

        for (vertex_id, pos) in &mesh.positions {
            let Some(normal) = mesh.vertex_normal(vertex_id) else {
                continue;
            };
            new_positions.insert(vertex_id, (0.5 * normal + *pos).normalize());
        }

        for (vertex_id, pos) in new_positions {
            mesh.positions.insert(vertex_id, pos);
        }
    }

    for (_, pos) in mesh.positions.iter_mut() {
        *pos = pos.normalize() * radius + center;
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec3;

    use crate::Skeleton;

    use super::*;

    #[test]
    fn test_single_junction_polyhedron() {
        let mut skeleton = Skeleton::new();

        let center = skeleton.add_node(dvec3(0.0, 0.0, 0.0));
        for dir in [
            dvec3(1.0, 1.0, 1.0),
            dvec3(1.0, -1.0, -1.0),
            dvec3(-1.0, 1.0, -1.0),
            dvec3(-1.0, -1.0, 1.0),
        ] {
            let leaf = skeleton.add_node(dir);
            skeleton.connect(center, leaf);
        }

        let mut mesh = PolyMesh::new();
        let mut ctx = FeqContext::default();

        construct_branch_polyhedra(
            &mut mesh,
            &skeleton,
            &mut ctx,
            0.5,
            None,
            GhostPolicy::Single,
        );

        // every arc has a recorded corner at radius 0.5 around the junction
        assert_eq!(ctx.branch_vertex_pos.len(), 4);
        for pos in ctx.branch_vertex_pos.values() {
            assert!((pos.length() - 0.5).abs() < 1e-9);
        }

        // the polyhedron is closed and all-quad after the subdivision pass
        assert!(!mesh.faces.is_empty());
        for (_, face) in &mesh.faces {
            assert_eq!(face.size(&mesh), 4);
        }
        for (he_id, he) in &mesh.halfedges {
            assert!(he.face.is_some());
            assert_eq!(mesh.halfedges[he.twin()].twin, Some(he_id));
        }
    }
}
