//! Triangulation of unit direction vectors on the sphere.
//!
//! For points on a sphere the Delaunay triangulation coincides with the
//! convex hull, so this thin adapter delegates to parry's hull routine and
//! maps the result back onto the input indices. Direction sets that lie in a
//! single plane have no volume-spanning hull; those fall back to a
//! double-sided sheet triangulation, which later relaxation passes inflate
//! into a proper polyhedron.

use glam::DVec3;
use parry3d_f64::transformation;
use tracing::{debug, instrument};

/// Triangulates a set of unit vectors on the sphere.
///
/// Returns index triples into `directions`, wound so that every triangle
/// normal points away from the sphere center. Degenerate inputs (fewer than
/// three directions, or all directions on one line) produce an empty list.
#[instrument(skip(directions))]
pub fn sphere_delaunay(directions: &[DVec3]) -> Vec<[usize; 3]> {
    if directions.len() < 3 {
        return vec![];
    }

    let points: Vec<_> = directions
        .iter()
        .map(|d| DVec3::new(d.x, d.y, d.z))
        .collect();

    let (hull_points, hull_indices) = match transformation::try_convex_hull(&points) {
        Ok(hull) => hull,
        Err(err) => {
            debug!("Convex hull of direction set failed ({err:?}), trying flat fallback");
            return flat_triangulation(directions);
        }
    };

    // hull vertices are copies of input points; recover the input indices
    let hull_to_input: Vec<usize> = hull_points
        .iter()
        .map(|hp| {
            let hp = DVec3::new(hp.x, hp.y, hp.z);

            let mut best = 0;
            let mut best_dist = f64::MAX;
            for (i, d) in directions.iter().enumerate() {
                let dist = hp.distance_squared(*d);
                if dist < best_dist {
                    best = i;
                    best_dist = dist;
                }
            }
            best
        })
        .collect();

    let triangles: Vec<[usize; 3]> = hull_indices
        .iter()
        .filter_map(|tri| {
            let [a, b, c] = [
                hull_to_input[tri[0] as usize],
                hull_to_input[tri[1] as usize],
                hull_to_input[tri[2] as usize],
            ];

            if a == b || b == c || c == a {
                return None;
            }

            let (da, db, dc) = (directions[a], directions[b], directions[c]);
            let outward = (db - da).cross(dc - da).dot(da + db + dc) >= 0.0;

            Some(if outward { [a, b, c] } else { [a, c, b] })
        })
        .collect();

    if triangles.len() < 2 {
        return flat_triangulation(directions);
    }

    triangles
}

/// Triangulates a coplanar direction set as a two-sided sheet.
///
/// Directions in a common plane sit on a circle of the unit sphere and are
/// therefore in convex position: sorting them by angle around the plane
/// normal gives the hull polygon, which is fanned once per side.
fn flat_triangulation(directions: &[DVec3]) -> Vec<[usize; 3]> {
    let base = directions[0];

    // span the plane with the most independent pair of difference vectors
    let u = directions
        .iter()
        .map(|d| *d - base)
        .max_by(|a, b| a.length_squared().total_cmp(&b.length_squared()))
        .unwrap_or(DVec3::ZERO);

    let normal = directions
        .iter()
        .map(|d| u.cross(*d - base))
        .max_by(|a, b| a.length_squared().total_cmp(&b.length_squared()))
        .unwrap_or(DVec3::ZERO);

    if normal.length_squared() < 1e-16 {
        debug!("Direction set is collinear, no triangulation");
        return vec![];
    }

    let normal = normal.normalize();
    let u = u.normalize();
    let v = normal.cross(u);

    let centroid = directions.iter().sum::<DVec3>() / directions.len() as f64;

    let mut order: Vec<usize> = (0..directions.len()).collect();
    order.sort_by(|a, b| {
        let pa = directions[*a] - centroid;
        let pb = directions[*b] - centroid;
        let angle_a = pa.dot(v).atan2(pa.dot(u));
        let angle_b = pb.dot(v).atan2(pb.dot(u));
        angle_a.total_cmp(&angle_b)
    });

    let n = order.len();
    let mut triangles = Vec::with_capacity(2 * (n - 2));

    // front: fan from the first polygon corner
    for i in 1..n - 1 {
        triangles.push([order[0], order[i], order[i + 1]]);
    }

    // back: reversed fan from the second corner, so the two sides use
    // different diagonals and every undirected edge gets exactly two sides
    for k in 2..n {
        triangles.push([order[1], order[(k + 1) % n], order[k]]);
    }

    triangles
}

#[cfg(test)]
mod tests {
    use glam::{DVec3, dvec3};

    use super::sphere_delaunay;

    #[test]
    fn test_tetrahedral_directions() {
        let directions = [
            dvec3(1.0, 1.0, 1.0).normalize(),
            dvec3(1.0, -1.0, -1.0).normalize(),
            dvec3(-1.0, 1.0, -1.0).normalize(),
            dvec3(-1.0, -1.0, 1.0).normalize(),
        ];

        let triangles = sphere_delaunay(&directions);

        assert_eq!(triangles.len(), 4);

        for tri in &triangles {
            assert!(tri.iter().all(|i| *i < 4));

            let (a, b, c) = (directions[tri[0]], directions[tri[1]], directions[tri[2]]);
            assert!((b - a).cross(c - a).dot(a + b + c) > 0.0);
        }
    }

    #[test]
    fn test_coplanar_directions() {
        let directions = [
            dvec3(1.0, 0.0, 0.0),
            dvec3(-0.5, 0.75_f64.sqrt(), 0.0),
            dvec3(-0.5, -(0.75_f64.sqrt()), 0.0),
            dvec3(0.0, 1.0, 0.0),
        ];

        let triangles = sphere_delaunay(&directions);

        // a two-sided sheet: each side triangulates the 4-gon into 2 triangles
        assert_eq!(triangles.len(), 4);

        // in a closed sheet every directed edge is used exactly once
        let mut edges = hashbrown::HashMap::<(usize, usize), usize>::new();
        for tri in &triangles {
            for k in 0..3 {
                *edges.entry((tri[k], tri[(k + 1) % 3])).or_default() += 1;
            }
        }
        for count in edges.values() {
            assert_eq!(*count, 1);
        }
    }

    #[test]
    fn test_degenerate_input() {
        assert!(sphere_delaunay(&[DVec3::X, DVec3::Y]).is_empty());
        assert!(sphere_delaunay(&[DVec3::X, DVec3::NEG_X, DVec3::X]).is_empty());
    }
}
