use glam::dvec3;
use slotmap::SecondaryMap;

use skeleton_mesh::{PolyMesh, Skeleton, skeleton_to_feq, skeleton_to_feq_radius};

/// Asserts that the mesh is a closed 2-manifold: twins are an involution,
/// every halfedge sits in a face loop and every vertex link is a single
/// cycle. Returns the Euler characteristic.
fn assert_closed_manifold(mesh: &PolyMesh) -> i64 {
    assert!(!mesh.faces.is_empty(), "mesh is empty");

    for (he_id, he) in &mesh.halfedges {
        assert!(he.face.is_some(), "boundary halfedge in a closed mesh");

        let twin_id = he.twin.expect("halfedge without twin");
        assert_eq!(
            mesh.halfedges[twin_id].twin,
            Some(he_id),
            "twins are not an involution"
        );

        assert!(he.next.is_some(), "interior halfedge without next");
    }

    // face loops close and cover every halfedge exactly once
    let mut seen = hashbrown::HashSet::new();
    for (face_id, face) in &mesh.faces {
        let size = face.size(mesh);
        assert!(size >= 3, "degenerate face");

        for he_id in face.halfedges(mesh) {
            assert_eq!(mesh.halfedges[he_id].face, Some(face_id));
            assert!(seen.insert(he_id), "halfedge in two face loops");
        }
    }
    assert_eq!(seen.len(), mesh.halfedges.len(), "halfedge not in any face");

    // vertex links are single cycles
    for (vertex_id, vertex) in &mesh.vertices {
        let cycle = vertex.outgoing_halfedges(mesh).count();
        assert_eq!(
            cycle,
            mesh.valency(vertex_id),
            "vertex link is not a single cycle"
        );
    }

    let vertices = mesh.vertices.len() as i64;
    let edges = (mesh.halfedges.len() / 2) as i64;
    let faces = mesh.faces.len() as i64;

    vertices - edges + faces
}

fn assert_all_quads(mesh: &PolyMesh) {
    for (_, face) in &mesh.faces {
        assert_eq!(face.size(mesh), 4, "non-quad face");
    }
}

#[test]
fn single_edge_becomes_a_box() {
    let mut skeleton = Skeleton::new();
    let a = skeleton.add_node(dvec3(0.0, 0.0, 0.0));
    let b = skeleton.add_node(dvec3(1.0, 0.0, 0.0));
    skeleton.connect(a, b);

    let mesh = skeleton_to_feq(&skeleton);

    assert_eq!(assert_closed_manifold(&mesh), 2);
    assert_all_quads(&mesh);
    assert_eq!(mesh.faces.len(), 6);
    assert_eq!(mesh.vertices.len(), 8);
    assert_eq!(mesh.halfedges.len(), 24);
}

#[test]
fn chain_without_junctions_becomes_a_tube() {
    let mut skeleton = Skeleton::new();

    let nodes: Vec<_> = (0..5)
        .map(|i| skeleton.add_node(dvec3(i as f64, 0.0, 0.0)))
        .collect();
    for pair in nodes.windows(2) {
        skeleton.connect(pair[0], pair[1]);
    }

    let mesh = skeleton_to_feq(&skeleton);

    assert_eq!(assert_closed_manifold(&mesh), 2);
    assert_all_quads(&mesh);

    // 4 bridged segments of 4 side quads each, plus the two end caps
    assert_eq!(mesh.faces.len(), 18);
    assert_eq!(mesh.vertices.len(), 20);
}

#[test]
fn bent_chain_stays_closed() {
    let mut skeleton = Skeleton::new();

    let positions = [
        dvec3(0.0, 0.0, 0.0),
        dvec3(1.0, 0.0, 0.0),
        dvec3(1.8, 0.6, 0.0),
        dvec3(2.2, 1.4, 0.5),
        dvec3(2.2, 2.4, 1.0),
    ];
    let nodes: Vec<_> = positions.iter().map(|p| skeleton.add_node(*p)).collect();
    for pair in nodes.windows(2) {
        skeleton.connect(pair[0], pair[1]);
    }

    let mesh = skeleton_to_feq(&skeleton);

    assert_eq!(assert_closed_manifold(&mesh), 2);
    assert_all_quads(&mesh);
    assert_eq!(mesh.faces.len(), 18);
}

#[test]
fn tetrahedral_junction() {
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

    let mesh = skeleton_to_feq(&skeleton);

    assert_eq!(assert_closed_manifold(&mesh), 2);
    assert_all_quads(&mesh);

    // four tubes of six quads and four leaf caps of three quads;
    // the polyhedron itself is fully absorbed into the tubes
    assert_eq!(mesh.faces.len(), 36);
    assert_eq!(mesh.vertices.len(), 38);
}

#[test]
fn bent_y_junction() {
    let mut skeleton = Skeleton::new();

    let junction = skeleton.add_node(dvec3(0.0, 0.0, 0.0));
    for dir in [
        dvec3(1.0, 0.0, 0.2),
        dvec3(-0.5, 0.75_f64.sqrt(), -0.1),
        dvec3(-0.5, -(0.75_f64.sqrt()), 0.4),
    ] {
        let leaf = skeleton.add_node(dir);
        skeleton.connect(junction, leaf);
    }

    let mesh = skeleton_to_feq(&skeleton);

    assert_eq!(assert_closed_manifold(&mesh), 2);
}

#[test]
fn flat_y_junction_does_not_panic() {
    let mut skeleton = Skeleton::new();

    let junction = skeleton.add_node(dvec3(0.0, 0.0, 0.0));
    for dir in [
        dvec3(1.0, 0.0, 0.0),
        dvec3(-0.5, 0.75_f64.sqrt(), 0.0),
        dvec3(-0.5, -(0.75_f64.sqrt()), 0.0),
    ] {
        let leaf = skeleton.add_node(dir);
        skeleton.connect(junction, leaf);
    }

    let mesh = skeleton_to_feq(&skeleton);

    // a fully planar junction is numerically degenerate; the conversion is
    // best-effort but must keep the mesh structurally sound
    assert!(!mesh.faces.is_empty());
    for (he_id, he) in &mesh.halfedges {
        let twin_id = he.twin.expect("halfedge without twin");
        assert_eq!(mesh.halfedges[twin_id].twin, Some(he_id));
    }
}

#[test]
fn junction_chain_junction_with_degree_mismatch() {
    let mut skeleton = Skeleton::new();

    // a 3-junction connected through a chain to a 6-junction
    let y = skeleton.add_node(dvec3(0.0, 0.0, 0.0));
    for dir in [dvec3(-1.0, 1.0, 0.3), dvec3(-1.0, -1.0, -0.3)] {
        let leaf = skeleton.add_node(dir);
        skeleton.connect(y, leaf);
    }

    let chain: Vec<_> = (1..=3)
        .map(|i| skeleton.add_node(dvec3(i as f64, 0.0, 0.0)))
        .collect();
    skeleton.connect(y, chain[0]);
    skeleton.connect(chain[0], chain[1]);
    skeleton.connect(chain[1], chain[2]);

    let hub = skeleton.add_node(dvec3(4.0, 0.0, 0.0));
    skeleton.connect(chain[2], hub);
    for dir in [
        dvec3(5.0, 0.0, 0.0),
        dvec3(4.0, 1.0, 0.0),
        dvec3(4.0, -1.0, 0.0),
        dvec3(4.0, 0.0, 1.0),
        dvec3(4.0, 0.0, -1.0),
    ] {
        let leaf = skeleton.add_node(dir);
        skeleton.connect(hub, leaf);
    }

    let mesh = skeleton_to_feq(&skeleton);

    // structural soundness; the exact face count depends on both hulls
    assert!(mesh.faces.len() > 20);
    for (he_id, he) in &mesh.halfedges {
        let twin_id = he.twin.expect("halfedge without twin");
        assert_eq!(mesh.halfedges[twin_id].twin, Some(he_id));
        assert!(he.face.is_some() || mesh.halfedges[twin_id].face.is_some());
    }
}

#[test]
fn radius_variant_scales_cross_sections() {
    let mut skeleton = Skeleton::new();
    let a = skeleton.add_node(dvec3(0.0, 0.0, 0.0));
    let b = skeleton.add_node(dvec3(1.0, 0.0, 0.0));
    skeleton.connect(a, b);

    let mut radii = SecondaryMap::new();
    radii.insert(a, 0.8);
    radii.insert(b, 0.8);

    let mesh = skeleton_to_feq_radius(&skeleton, &radii);

    assert_eq!(assert_closed_manifold(&mesh), 2);
    assert_all_quads(&mesh);
    assert_eq!(mesh.faces.len(), 6);

    // the ring template has radius 0.5, scaled by the node radius
    let max_offset = mesh
        .positions
        .values()
        .map(|p| p.y.abs().max(p.z.abs()))
        .fold(0.0_f64, f64::max);
    assert!((max_offset - 0.4).abs() < 1e-9);
}

#[test]
fn graph_without_edges_yields_empty_mesh() {
    let skeleton = Skeleton::new();
    assert!(skeleton_to_feq(&skeleton).faces.is_empty());

    let mut isolated = Skeleton::new();
    isolated.add_node(dvec3(0.0, 0.0, 0.0));
    isolated.add_node(dvec3(1.0, 0.0, 0.0));
    assert!(skeleton_to_feq(&isolated).faces.is_empty());
}
