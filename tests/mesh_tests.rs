//! Compartment voxelization tests.
//!
//! The voxel chain must cover the cylinder exactly: volumes add up to the
//! analytic frustum volume, junction areas match the radius profile, and
//! neighbours form a simple path.

use std::f64::consts::PI;

use glam::DVec3;
use ksolve_x::{geometry::CylMesh, GeometryParameters, KsolveError};

// ============================================================================
// Voxel Layout
// ============================================================================

#[test]
fn test_neighbour_graph_is_simple_path() {
    for (length, diff_length) in [(1.0, 1.0), (10.0, 1.0), (1e-5, 3e-7), (2.5, 0.7)] {
        let mesh = CylMesh::new(&GeometryParameters::cylinder(length, 1e-3, diff_length)).unwrap();
        let n = mesh.num_voxels();
        assert!(n >= 1, "mesh must have at least one voxel");

        for voxel in mesh.voxels() {
            assert!(voxel.volume_m3 > 0.0, "voxel {} has non-positive volume", voxel.index);
            let mut neighbours: Vec<usize> = voxel.junctions.iter().map(|j| j.neighbor).collect();
            neighbours.sort_unstable();

            let mut expected = Vec::new();
            if voxel.index > 0 {
                expected.push(voxel.index - 1);
            }
            if voxel.index + 1 < n {
                expected.push(voxel.index + 1);
            }
            assert_eq!(
                neighbours, expected,
                "voxel {} of {} has wrong neighbours",
                voxel.index, n
            );
        }
    }
}

#[test]
fn test_voxel_count_rounds_up() {
    let exact = CylMesh::new(&GeometryParameters::cylinder(1.0, 1e-3, 1e-3)).unwrap();
    assert_eq!(exact.num_voxels(), 1000, "exact division must not add a sliver voxel");

    let over = CylMesh::new(&GeometryParameters::cylinder(1.000_000_000_1, 1e-3, 1.0)).unwrap();
    assert_eq!(over.num_voxels(), 2, "a length just past one voxel needs two");

    let partial = CylMesh::new(&GeometryParameters::cylinder(1.0, 1e-3, 0.3)).unwrap();
    assert_eq!(partial.num_voxels(), 4);
    assert!((partial.voxel_length() - 0.25).abs() < 1e-15);

    let short = CylMesh::new(&GeometryParameters::cylinder(1e-6, 1e-6, 1e-3)).unwrap();
    assert_eq!(short.num_voxels(), 1, "a cylinder shorter than one voxel is one voxel");
    assert!(short.voxels()[0].junctions.is_empty());
}

// ============================================================================
// Volumes and Areas
// ============================================================================

#[test]
fn test_tapered_volume_matches_frustum() {
    let params = GeometryParameters {
        x0: DVec3::new(1.0, 2.0, 3.0),
        x1: DVec3::new(1.0, 5.0, 7.0), // length 5
        r0_m: 1.0,
        r1_m: 2.0,
        diff_length_m: 0.5,
    };
    let mesh = CylMesh::new(&params).unwrap();
    assert_eq!(mesh.num_voxels(), 10);

    let analytic = PI * 5.0 / 3.0 * (1.0 + 2.0 + 4.0);
    let total: f64 = mesh.volumes().iter().sum();
    assert!(
        (total - analytic).abs() / analytic < 1e-12,
        "voxel volumes sum to {}, frustum volume is {}",
        total,
        analytic
    );
    assert!((mesh.total_volume() - total).abs() < 1e-12);

    // Volumes grow along the taper
    let volumes = mesh.volumes();
    assert!(volumes.windows(2).all(|w| w[1] > w[0]));

    // Centres lie on the axis
    let first = &mesh.voxels()[0];
    let expected_center = DVec3::new(1.0, 2.0, 3.0) + DVec3::new(0.0, 3.0, 4.0) * 0.05;
    assert!((first.center - expected_center).length() < 1e-12);
}

#[test]
fn test_junction_area_and_distance() {
    let params = GeometryParameters {
        x0: DVec3::ZERO,
        x1: DVec3::new(4.0, 0.0, 0.0),
        r0_m: 1.0,
        r1_m: 3.0,
        diff_length_m: 1.0,
    };
    let mesh = CylMesh::new(&params).unwrap();

    // Face between voxels 1 and 2 sits at x = 2, radius 2
    let junction = mesh.voxels()[1]
        .junctions
        .iter()
        .find(|j| j.neighbor == 2)
        .copied()
        .unwrap();
    assert!((junction.area_m2 - PI * 4.0).abs() < 1e-12);
    assert!((junction.distance_m - 1.0).abs() < 1e-12);

    let back = mesh.voxels()[2]
        .junctions
        .iter()
        .find(|j| j.neighbor == 1)
        .copied()
        .unwrap();
    assert_eq!(junction.area_m2, back.area_m2, "junctions must be symmetric");
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_invalid_geometry_rejected() {
    let cases = [
        GeometryParameters::cylinder(0.0, 1.0, 1.0),
        GeometryParameters::cylinder(1.0, 0.0, 1.0),
        GeometryParameters::cylinder(1.0, -1.0, 1.0),
        GeometryParameters::cylinder(1.0, 1.0, 0.0),
        GeometryParameters::cylinder(f64::NAN, 1.0, 1.0),
        GeometryParameters::cylinder(1.0, 1.0, f64::INFINITY),
        GeometryParameters::cylinder(1.0, 1.0, 1e-300),
    ];
    for params in &cases {
        assert!(
            matches!(CylMesh::new(params), Err(KsolveError::InvalidGeometry(_))),
            "expected InvalidGeometry for {:?}",
            params
        );
    }
}
