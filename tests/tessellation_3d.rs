//! End-to-end scenarios for the 3D tessellator and its Voronoi dual.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use voronoi_tessellation::prelude::*;

// =============================================================================
// HELPERS
// =============================================================================

/// Interleave the top 21 bits of each axis into a Morton key; sorting by it
/// gives the space-filling-curve insertion order that keeps the
/// point-location walk short.
fn morton_key(p: [f64; 3], anchor: [f64; 3], side: f64) -> u64 {
    let spread = |value: f64| -> u64 {
        let cell = (((value / side) * 2_097_152.0) as u64).min((1 << 21) - 1);
        let mut x = cell;
        x = (x | (x << 32)) & 0x001f_0000_0000_ffff;
        x = (x | (x << 16)) & 0x001f_0000_ff00_00ff;
        x = (x | (x << 8)) & 0x100f_00f0_0f00_f00f;
        x = (x | (x << 4)) & 0x10c3_0c30_c30c_30c3;
        x = (x | (x << 2)) & 0x1249_2492_4924_9249;
        x
    };
    spread(p[0] - anchor[0]) | (spread(p[1] - anchor[1]) << 1) | (spread(p[2] - anchor[2]) << 2)
}

// =============================================================================
// UNIT CUBE (eight corner generators)
// =============================================================================

/// The eight corners of the unit cube, embedded in the half-spacing lattice
/// whose remaining points are imported as ghosts: each corner cell is the
/// 0.5-cube centred on its generator, and the cell volumes tile the local
/// region exactly.
#[test]
fn unit_cube_corners_have_octant_cells() {
    let bounds = BoundingBox::cube([0.0, 0.0, 0.0], 1.0);
    let mut delaunay = Delaunay3d::new(&bounds, 8, 2048, 17);

    let corners = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [0.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
    ];
    for (index, corner) in corners.into_iter().enumerate() {
        delaunay.add_local_vertex(index, corner).unwrap();
    }
    delaunay.consolidate().unwrap();

    // Every half-integer lattice point in [-0.5, 1.5] that is not a corner.
    for i in 0..5 {
        for j in 0..5 {
            for k in 0..5 {
                let p = [
                    -0.5 + 0.5 * f64::from(i),
                    -0.5 + 0.5 * f64::from(j),
                    -0.5 + 0.5 * f64::from(k),
                ];
                if corners.contains(&p) {
                    continue;
                }
                delaunay.add_ghost_vertex(p).unwrap();
            }
        }
    }
    delaunay.verify().unwrap();

    let voronoi = delaunay.build_voronoi().unwrap();
    assert_eq!(voronoi.cells().len(), 8);
    for cell in voronoi.cells() {
        assert!((cell.volume - 0.125).abs() < 1e-10);
        for axis in 0..3 {
            assert!((cell.centroid[axis] - cell.generator[axis]).abs() < 1e-10);
        }
    }
    // Volume conservation: the cells tile the unit box.
    assert!((voronoi.total_volume() - 1.0).abs() < 1e-10);
}

// =============================================================================
// POINT ON FACE (2-to-6 split)
// =============================================================================

/// Two tetrahedra forming a bipyramid over a z = 0.5 triangle; inserting a
/// vertex exactly on the shared face splits them 2-to-6, and the cascade
/// leaves a valid Delaunay mesh.
#[test]
fn point_on_shared_face_splits_bipyramid() {
    let bounds = BoundingBox::cube([0.0, 0.0, 0.0], 1.0);
    let mut delaunay = Delaunay3d::new(&bounds, 6, 256, 17);
    delaunay.add_local_vertex(0, [0.1, 0.1, 0.5]).unwrap();
    delaunay.add_local_vertex(1, [0.9, 0.1, 0.5]).unwrap();
    delaunay.add_local_vertex(2, [0.5, 0.9, 0.5]).unwrap();
    delaunay.add_local_vertex(3, [0.5, 0.4, 0.9]).unwrap();
    delaunay.add_local_vertex(4, [0.5, 0.4, 0.1]).unwrap();
    delaunay.verify().unwrap();

    let active_count = |d: &Delaunay3d| {
        (DUMMY_TETRAHEDRA..d.number_of_tetrahedra())
            .filter(|&t| d.tetrahedron(t).is_active())
            .count()
    };
    let active_before = active_count(&delaunay);

    // Equal z coordinates make the on-face orientation test exactly zero:
    // the vertex lies inside the triangle (0, 1, 2) and on its plane.
    delaunay.add_local_vertex(5, [0.5, 0.3, 0.5]).unwrap();
    delaunay.verify().unwrap();
    assert!(active_count(&delaunay) > active_before);

    // The new vertex is linked into an active tetrahedron that contains it.
    let (t, slot) = delaunay.vertices().link(5);
    assert!(delaunay.tetrahedron(t).is_active());
    assert_eq!(delaunay.tetrahedron(t).vertex(usize::from(slot)), 5);
}

// =============================================================================
// RANDOM POINTS IN SPACE-FILLING-CURVE ORDER (amortised walk length)
// =============================================================================

#[test]
fn sorted_random_insertion_keeps_walks_short() {
    let bounds = BoundingBox::cube([0.0, 0.0, 0.0], 1.0);
    let mut rng = StdRng::seed_from_u64(2024);
    let mut points: Vec<[f64; 3]> = (0..1000)
        .map(|_| {
            [
                rng.random_range(0.0..1.0),
                rng.random_range(0.0..1.0),
                rng.random_range(0.0..1.0),
            ]
        })
        .collect();
    points.sort_by_key(|&p| morton_key(p, [0.0, 0.0, 0.0], 1.0));

    let mut delaunay = Delaunay3d::new(&bounds, points.len(), 16 * points.len(), 99);
    for (index, p) in points.iter().enumerate() {
        delaunay.add_local_vertex(index, *p).unwrap();
    }
    delaunay.verify().unwrap();

    let stats = delaunay.locate_statistics();
    assert_eq!(stats.insertions, 1000);
    // Amortised locality: well below the log2(N) ~ 10 bound for sorted
    // input.
    assert!(
        stats.average_walk_length() < 10.0,
        "average walk length {} too long",
        stats.average_walk_length()
    );
}

// =============================================================================
// GHOST-RADIUS CONVERGENCE AND VOLUME CONSERVATION
// =============================================================================

#[test]
fn ghost_import_loop_converges_and_conserves_volume() {
    let side = 4.0;
    let bounds = BoundingBox::cube([0.0, 0.0, 0.0], side);
    let n = 4;
    let mut delaunay = Delaunay3d::new(&bounds, n * n * n, 8192, 31);

    // A jittered grid of local generators (deterministic jitter keeps the
    // test reproducible and avoids lattice degeneracies).
    let mut rng = StdRng::seed_from_u64(5150);
    let mut locals: Vec<[f64; 3]> = Vec::new();
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                locals.push([
                    0.5 + i as f64 + rng.random_range(-0.2..0.2),
                    0.5 + j as f64 + rng.random_range(-0.2..0.2),
                    0.5 + k as f64 + rng.random_range(-0.2..0.2),
                ]);
            }
        }
    }
    for (index, p) in locals.iter().enumerate() {
        delaunay.add_local_vertex(index, *p).unwrap();
    }
    delaunay.consolidate().unwrap();

    // Candidate ghosts: mirror images of the local generators across every
    // wall, edge and corner of the box. Reflections put the wall planes
    // exactly halfway between each generator and its image, so the cells
    // clip to the box and the volumes tile it.
    let reflect = |value: f64, flag: i32| match flag {
        -1 => -value,
        1 => 2.0 * side - value,
        _ => value,
    };
    let mut candidates: Vec<[f64; 3]> = Vec::new();
    for fx in -1..=1 {
        for fy in -1..=1 {
            for fz in -1..=1 {
                if fx == 0 && fy == 0 && fz == 0 {
                    continue;
                }
                for p in &locals {
                    candidates.push([reflect(p[0], fx), reflect(p[1], fy), reflect(p[2], fz)]);
                }
            }
        }
    }

    let distance_to_box = |p: [f64; 3]| -> f64 {
        let d: [f64; 3] = std::array::from_fn(|axis| (0.0 - p[axis]).max(p[axis] - side).max(0.0));
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    };

    let mut radius = 1.0;
    let mut iterations = 0;
    loop {
        iterations += 1;
        assert!(iterations < 16, "radius doubling failed to converge");
        candidates.retain(|&p| {
            if distance_to_box(p) <= radius {
                delaunay.add_ghost_vertex(p).unwrap();
                false
            } else {
                true
            }
        });
        if delaunay.update_search_radii(radius) == 0 {
            break;
        }
        radius *= 2.0;
    }
    delaunay.verify().unwrap();

    let voronoi = delaunay.build_voronoi().unwrap();
    let expected = side * side * side;
    assert!(
        (voronoi.total_volume() - expected).abs() < 1e-10 * expected,
        "total volume {} does not tile the box",
        voronoi.total_volume()
    );

    // Interior face midpoints lie on the bisector of their generators.
    for face in voronoi.faces(SID_INTERIOR) {
        let left = delaunay.vertices().position(face.left);
        let right = delaunay.vertices().position(face.right);
        let dist = |p: [f64; 3]| -> f64 {
            let d: [f64; 3] = std::array::from_fn(|axis| face.midpoint[axis] - p[axis]);
            (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
        };
        assert!((dist(left) - dist(right)).abs() < 1e-8);
    }
}

// =============================================================================
// DETERMINISM
// =============================================================================

#[test]
fn identical_input_and_seed_give_identical_topology() {
    let bounds = BoundingBox::cube([0.0, 0.0, 0.0], 1.0);
    let build = || {
        let mut rng = StdRng::seed_from_u64(77);
        let mut delaunay = Delaunay3d::new(&bounds, 100, 1024, 1234);
        for index in 0..100 {
            let p = [
                rng.random_range(0.0..1.0),
                rng.random_range(0.0..1.0),
                rng.random_range(0.0..1.0),
            ];
            delaunay.add_local_vertex(index, p).unwrap();
        }
        delaunay
    };
    let first = build();
    let second = build();

    assert_eq!(first.number_of_tetrahedra(), second.number_of_tetrahedra());
    for t in DUMMY_TETRAHEDRA..first.number_of_tetrahedra() {
        assert_eq!(
            first.tetrahedron(t).is_active(),
            second.tetrahedron(t).is_active()
        );
        if !first.tetrahedron(t).is_active() {
            continue;
        }
        assert_eq!(
            first.tetrahedron(t).vertices(),
            second.tetrahedron(t).vertices()
        );
        for slot in 0..4 {
            assert_eq!(
                first.tetrahedron(t).neighbour(slot),
                second.tetrahedron(t).neighbour(slot)
            );
        }
    }
}
