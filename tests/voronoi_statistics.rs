//! Integration tests for the per-site Voronoi statistics: concrete cell
//! geometry of the cube-plus-center configuration, histogram bookkeeping,
//! and threshold truncation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use voronoi::{Builder, Point3, SiteKey};

fn seeded(seed: u64) -> Builder {
    let mut builder = Builder::with_rng(StdRng::seed_from_u64(seed));
    builder.no_warning(true);
    builder
}

/// Inserts the eight corners of the unit cube and then its center; returns
/// the center's key.
fn cube_with_center(builder: &mut Builder) -> SiteKey {
    for x in [0.0, 1.0] {
        for y in [0.0, 1.0] {
            for z in [0.0, 1.0] {
                builder.insert(x, y, z).expect("insertion succeeds");
            }
        }
    }
    builder.insert(0.5, 0.5, 0.5).expect("insertion succeeds")
}

#[test]
fn center_of_the_cube_has_an_octahedral_cell() {
    let mut builder = seeded(21);
    let center = cube_with_center(&mut builder);
    builder.validate().expect("valid mesh");

    // The cell of the center is the octahedron bounded by the bisector
    // planes to the eight corners: all eight are Voronoi neighbors.
    assert_eq!(builder.neighbor_sites(center).len(), 8);
    assert_eq!(builder.coordination(center), 8);

    // Octahedron {|x| + |y| + |z| <= 3/4}: volume (4/3)·(3/4)³ = 27/48.
    let volume = builder.atomic_volume(center);
    assert!(
        (volume - 0.5625).abs() < 1e-9,
        "expected the octahedron volume, got {volume}"
    );

    // The farthest Voronoi vertices of the cell are the octahedron tips at
    // distance 3/4.
    let radius = builder.cavity_radius(center);
    assert!(
        (radius - 0.75).abs() < 1e-9,
        "expected the octahedron tip distance, got {radius}"
    );

    // Surface area of the octahedron: 8 equilateral triangles of side
    // (3/4)·sqrt(2), total 4·sqrt(3)·(3/4)².
    let surface = builder.surface_area(center);
    let expected = 4.0 * 3.0_f64.sqrt() * 0.5625;
    assert!(
        (surface - expected).abs() < 1e-9,
        "expected {expected}, got {surface}"
    );
}

#[test]
fn histogram_sums_match_coordination() {
    let mut builder = seeded(22);
    let mut rng = StdRng::seed_from_u64(23);
    let mut keys = Vec::new();
    for _ in 0..40 {
        let p = Point3::new(
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
        );
        keys.push(builder.insert_point(p).expect("insertion succeeds"));
    }
    for &k in &keys {
        let histogram = builder.voronoi_index(k);
        assert_eq!(histogram.len(), 9, "default histogram length");
        assert_eq!(histogram.iter().sum::<usize>(), builder.coordination(k));
    }
}

#[test]
fn histogram_length_is_configurable_and_clamps() {
    let mut builder = seeded(24);
    let center = cube_with_center(&mut builder);

    builder.index_length(4);
    let histogram = builder.voronoi_index(center);
    assert_eq!(histogram.len(), 4);
    assert_eq!(histogram.iter().sum::<usize>(), builder.coordination(center));

    // With a single bucket every face lands in it.
    builder.index_length(1);
    let histogram = builder.voronoi_index(center);
    assert_eq!(histogram, vec![builder.coordination(center)]);
}

#[test]
fn area_threshold_truncates_coordination() {
    let mut builder = seeded(25);
    let center = cube_with_center(&mut builder);
    assert_eq!(builder.coordination(center), 8);

    // Every octahedron face carries exactly 1/8 of the surface, so a
    // relative threshold above that drops all of them.
    builder.area_threshold(0.2);
    assert_eq!(builder.coordination(center), 0);
    builder.area_threshold(0.0);
    assert_eq!(builder.coordination(center), 8);

    // An absolute threshold beyond the face area does the same.
    builder.area_threshold_abs(1.0);
    assert_eq!(builder.coordination(center), 0);
}

#[test]
fn length_threshold_collapses_polygon_sides() {
    let mut builder = seeded(26);
    let center = cube_with_center(&mut builder);

    // Untruncated faces have at least three sides each.
    let histogram = builder.voronoi_index(center);
    assert_eq!(histogram[0], 0);
    assert_eq!(histogram[1], 0);

    // A length threshold beyond every Voronoi edge collapses each ring to
    // its starting vertex.
    builder.length_threshold(10.0);
    let histogram = builder.voronoi_index(center);
    assert_eq!(histogram[0], 8);
    assert_eq!(histogram.iter().sum::<usize>(), 8);

    // The absolute variant behaves the same.
    builder.length_threshold_abs(100.0);
    let histogram = builder.voronoi_index(center);
    assert_eq!(histogram[0], 8);
}

#[test]
fn bare_cube_corners_are_boundary_sites() {
    // The eight unit-cube corners with no interior site: every cell is
    // unbounded by the universe. The corners are cospherical, so which
    // diagonals the triangulation uses (and with them the exact neighbor
    // counts) is degenerate; each corner still sees its three edge
    // neighbors at least and all seven other corners at most.
    let mut builder = seeded(31);
    let mut corners = Vec::new();
    for x in [0.0, 1.0] {
        for y in [0.0, 1.0] {
            for z in [0.0, 1.0] {
                corners.push(builder.insert(x, y, z).expect("insertion succeeds"));
            }
        }
    }
    builder.validate().expect("valid mesh");
    assert_eq!(builder.num_sites(), 8);

    for &k in &corners {
        let neighbors = builder.neighbor_sites(k);
        assert!(
            (3..=7).contains(&neighbors.len()),
            "corner sees {} neighbors",
            neighbors.len()
        );
        assert!(!neighbors.contains(&k));
        // Faces reaching the universe are skipped, so only interior
        // (diagonal) faces can contribute to the coordination count.
        assert!(builder.coordination(k) <= neighbors.len());
        assert!(builder.atomic_volume(k) >= 0.0);
    }
}

#[test]
fn boundary_cells_report_partial_statistics() {
    let mut builder = seeded(27);
    let corners = [
        (1.0, 1.0, 1.0),
        (1.0, -1.0, -1.0),
        (-1.0, 1.0, -1.0),
        (-1.0, -1.0, 1.0),
    ];
    let keys: Vec<_> = corners
        .iter()
        .map(|&(x, y, z)| builder.insert(x, y, z).expect("insertion succeeds"))
        .collect();

    // Every corner cell touches the universe: its faces cannot be traced,
    // so coordination and volume degrade to zero while the neighbor list
    // stays complete and the query does not fail.
    for &k in &keys {
        assert_eq!(builder.neighbor_sites(k).len(), 3);
        assert_eq!(builder.coordination(k), 0);
        assert_eq!(builder.atomic_volume(k), 0.0);
    }
}

#[test]
fn interior_sites_have_positive_volume() {
    let mut builder = seeded(28);
    let mut rng = StdRng::seed_from_u64(29);
    // A shell of outer points guarantees the inner ones are interior.
    for _ in 0..60 {
        let p = Point3::new(
            rng.random_range(-10.0..10.0),
            rng.random_range(-10.0..10.0),
            rng.random_range(-10.0..10.0),
        );
        builder.insert_point(p).expect("insertion succeeds");
    }
    let inner = builder.insert(0.1, -0.2, 0.3).expect("insertion succeeds");
    assert!(builder.atomic_volume(inner) > 0.0);
    assert!(builder.cavity_radius(inner) > 0.0);
    assert!(builder.coordination(inner) >= 4);
}

#[test]
fn universe_tetrahedra_have_no_circumcenter() {
    let mut builder = seeded(30);
    builder.insert(0.0, 0.0, 0.0).expect("insertion succeeds");
    let (mut universe, mut interior) = (0_usize, 0_usize);
    let tets: Vec<_> = builder.tetrahedra().collect();
    for t in tets {
        match builder.circumcenter(t) {
            None => universe += 1,
            Some(c) => {
                assert!(c.is_finite());
                interior += 1;
            }
        }
    }
    // One site splits the universe tetrahedron into four, all touching it.
    assert_eq!(universe, 4);
    assert_eq!(interior, 0);
}
