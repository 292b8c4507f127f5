//! Coaxial cross-section face pairs at chain and leaf nodes.
//!
//! An orthonormal frame is propagated over the graph by breadth-first search;
//! at every chain node the frame axis closest to the incoming edge direction
//! is rotated exactly onto it, and a pair of oppositely wound polygon faces
//! is emitted in the plane orthogonal to that axis.

use std::collections::VecDeque;

use glam::{DMat3, DQuat, DVec3};
use hashbrown::HashSet;
use slotmap::SecondaryMap;
use tracing::{instrument, warn};

use crate::{FaceId, NodeId, PolyMesh, Skeleton};

use super::FeqContext;

/// Corner template of a regular n-gon cross-section with radius 0.5 in the
/// yz-plane. The angle step is 2·22/(7n): 22/7 stands in for pi here, kept
/// literal because all cross sections share the same template and only have
/// to agree with each other.
pub(super) fn face_ring_points(n: usize) -> Vec<DVec3> {
    let h = 0.5;
    let mut angle = 0.0_f64;
    let mut points = Vec::with_capacity(n);

    for _ in 0..n {
        points.push(DVec3::new(0.0, h * angle.cos(), h * angle.sin()));
        angle += 2.0 * 22.0 / (7.0 * n as f64);
    }

    points
}

/// Adds two coincident, oppositely wound polygon faces at `pos`, lying in the
/// plane orthogonal to the given axis of the (scaled) frame.
pub(super) fn create_face_pair(
    mesh: &mut PolyMesh,
    pos: DVec3,
    frame: DMat3,
    axis: usize,
    num_sides: usize,
) -> Vec<FaceId> {
    if num_sides == 0 {
        return vec![];
    }

    let ring = face_ring_points(num_sides);

    let mut frame = frame;
    let det = frame.determinant();
    if det != 0.0 && det < 0.0 {
        frame *= DMat3::from_diagonal(DVec3::new(1.0, 1.0, -1.0));
    }

    let place = |template: DVec3| {
        let mut p = DVec3::ZERO;
        p[axis % 3] += template.x;
        p[(1 + axis) % 3] += template.y;
        p[(2 + axis) % 3] += template.z;
        frame * p + pos
    };

    let mut face_ids = vec![];

    let front: Vec<DVec3> = (0..num_sides).map(|i| place(ring[i])).collect();
    if let Some(face_id) = mesh.add_face(&front) {
        face_ids.push(face_id);
    }

    let back: Vec<DVec3> = (0..num_sides)
        .map(|i| {
            let index = (1 - i as isize).rem_euclid(num_sides as isize) as usize;
            place(ring[index])
        })
        .collect();
    if let Some(face_id) = mesh.add_face(&back) {
        face_ids.push(face_id);
    }

    face_ids
}

/// Emits the cross-section face pairs for all chain nodes, propagating the
/// warp frame outward from a seed node near the graph centroid.
#[instrument(skip_all)]
pub(super) fn chain_nodes_to_boxes(
    mesh: &mut PolyMesh,
    skeleton: &Skeleton,
    ctx: &mut FeqContext,
    radius: f64,
    radii: Option<&SecondaryMap<NodeId, f64>>,
) {
    let Some(first_node) = skeleton.node_ids().next() else {
        return;
    };

    let centroid = skeleton.centroid();
    let has_junction = skeleton.node_ids().any(|n| skeleton.valence(n) > 2);

    // seed: the junction closest to the centroid
    let mut seed = first_node;
    let mut min_dist = f64::MAX;
    for n in skeleton.node_ids() {
        if skeleton.valence(n) > 2 {
            let dist = skeleton.positions[n].distance_squared(centroid);
            if dist < min_dist {
                min_dist = dist;
                seed = n;
            }
        }
    }

    // without a junction, fall back to the connected node closest to the centroid
    let fall_back = if radii.is_some() {
        skeleton.valence(seed) == 0
    } else {
        !has_junction && skeleton.valence(seed) == 0
    };

    if fall_back {
        for n in skeleton.node_ids() {
            if skeleton.valence(n) > 0 {
                let dist = skeleton.positions[n].distance_squared(centroid);
                if dist < min_dist {
                    min_dist = dist;
                    seed = n;
                }
            }
        }
    }

    let mut touched = HashSet::new();
    let mut warp_frame: SecondaryMap<NodeId, DMat3> = SecondaryMap::new();

    let mut queue = VecDeque::new();
    queue.push_back(seed);

    // a pre-touched seed emits no face pair itself
    let pre_touch = if radii.is_some() {
        skeleton.valence(seed) > 2
    } else {
        has_junction
    };
    if pre_touch {
        touched.insert(seed);
    }

    while let Some(n) = queue.pop_front() {
        for &m in skeleton.neighbours(n) {
            if touched.contains(&m) {
                continue;
            }
            queue.push_back(m);
            touched.insert(m);

            let edge = skeleton.positions[m] - skeleton.positions[n];
            let frame = warp_frame.get(n).copied().unwrap_or(DMat3::IDENTITY);
            let warped = frame * edge;

            let mut max_sign = if warped.x < 0.0 { -1.0 } else { 1.0 };
            let mut max_value = warped.x.abs();
            let mut axis = 0;
            for i in 1..3 {
                if warped[i].abs() > max_value {
                    max_sign = if warped[i] < 0.0 { -1.0 } else { 1.0 };
                    max_value = warped[i].abs();
                    axis = i;
                }
            }

            // rotate the dominant frame axis exactly onto the edge direction
            let target = max_sign * edge.normalize();
            let rotation = DQuat::from_rotation_arc(frame.row(axis), target);
            let new_frame = (DMat3::from_quat(rotation) * frame.transpose()).transpose();
            warp_frame.insert(m, new_frame);

            if skeleton.valence(m) <= 2 {
                let Some(&degree) = ctx.chain_degree.get(&m) else {
                    warn!("Chain node without a recorded cross-section size");
                    continue;
                };

                let scale = radii
                    .and_then(|radii| radii.get(m).copied())
                    .unwrap_or(radius);
                let scaling = DMat3::from_diagonal(DVec3::splat(scale));

                let face_ids = create_face_pair(
                    mesh,
                    skeleton.positions[m],
                    new_frame.transpose() * scaling,
                    axis,
                    degree,
                );
                mesh.stitch_mesh(1e-10);

                for face_id in face_ids {
                    ctx.node_faces.entry(m).unwrap().or_default().push(face_id);
                    ctx.chain_faces.insert(face_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{DMat3, DVec3, dvec3};

    use crate::PolyMesh;

    use super::{create_face_pair, face_ring_points};

    #[test]
    fn test_face_ring_points() {
        let points = face_ring_points(4);

        assert_eq!(points.len(), 4);
        assert_eq!(points[0], dvec3(0.0, 0.5, 0.0));

        for p in &points {
            assert_eq!(p.x, 0.0);
            assert!((p.length() - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_create_face_pair() {
        let mut mesh = PolyMesh::new();

        let face_ids = create_face_pair(
            &mut mesh,
            dvec3(1.0, 2.0, 3.0),
            DMat3::IDENTITY,
            0,
            4,
        );

        assert_eq!(face_ids.len(), 2);

        mesh.stitch_mesh(1e-10);

        // a closed pillow of two coincident quads
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces.len(), 2);
        for (_, he) in &mesh.halfedges {
            assert!(he.face.is_some());
        }

        // wound oppositely around the x axis
        let n0 = mesh.faces[face_ids[0]].normal(&mesh).unwrap();
        let n1 = mesh.faces[face_ids[1]].normal(&mesh).unwrap();
        assert!((n0 + n1).length() < 1e-9);
        assert!(n0.cross(DVec3::X).length() < 1e-9);
    }
}
