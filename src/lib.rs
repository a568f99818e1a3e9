//! # voronoi-tessellation
//!
//! Incremental 2D/3D Delaunay tessellations with exact integer predicates,
//! and the Delaunay-to-Voronoi conversion used by moving-mesh hydrodynamics
//! codes.
//!
//! # Overview
//!
//! The host hands the tessellation a bounding box and a stream of generator
//! positions, classified as *local* (owned by this partition) or *ghost*
//! (imported from neighbouring partitions to close the local cells). The
//! tessellation is built one insertion at a time: a point-location walk
//! finds the simplex containing the new vertex, the simplex is split, and a
//! cascade of topological flips restores the Delaunay property.
//!
//! Every topological decision runs on exact arbitrary-precision predicates
//! over 52-bit integer mantissa coordinates, obtained by rescaling all
//! positions into `[1, 2)`. A double-precision fast path with a conservative
//! error bound short-circuits the exact tests when the sign is certain.
//!
//! After [`consolidate`](core::delaunay3d::Delaunay3d::consolidate) freezes
//! the local/ghost boundary, the host iterates ghost imports against the
//! per-vertex [`search_radius`](core::delaunay3d::Delaunay3d::search_radius)
//! until every local cell is closed, then materialises the dual grid: one
//! cell (volume + centroid) per local generator and one face record (area +
//! midpoint) per Delaunay edge, binned into interior and boundary buckets
//! for the host's flux exchange.
//!
//! # Example
//!
//! ```rust
//! use voronoi_tessellation::prelude::*;
//!
//! // One local generator in a unit box, surrounded by one ring of ghosts.
//! let bounds = BoundingBox::cube([0.0, 0.0], 1.0);
//! let mut delaunay = Delaunay2d::new(&bounds, 1, 64, 42);
//! delaunay.add_local_vertex(0, [0.5, 0.5]).unwrap();
//! delaunay.consolidate().unwrap();
//! for i in -1..=1 {
//!     for j in -1..=1 {
//!         if i == 0 && j == 0 {
//!             continue;
//!         }
//!         delaunay
//!             .add_ghost_vertex([0.5 + f64::from(i), 0.5 + f64::from(j)])
//!             .unwrap();
//!     }
//! }
//!
//! // The ghost ring closes the cell: a unit square around the generator.
//! assert!(delaunay.search_radius(0).is_finite());
//! let voronoi = delaunay.build_voronoi().unwrap();
//! assert!((voronoi.cells()[0].volume - 1.0).abs() < 1e-9);
//! ```
//!
//! # Invariants
//!
//! After every public operation:
//!
//! - every active simplex is positively oriented under the exact predicate;
//! - every neighbour link is reciprocal, including the stored
//!   index-in-neighbour slots;
//! - no vertex of any neighbour lies strictly inside an active simplex's
//!   circumsphere;
//! - every vertex back-link points to an active simplex containing it.
//!
//! `verify()` on either tessellator sweeps the whole tessellation and
//! reports the first violation; it is expensive and meant for tests and
//! debugging, never for production runs.
//!
//! # Determinism
//!
//! Point location breaks walk ties with an unbiased coin flip from a
//! per-tessellation PRNG seeded by the host. Two tessellations built from
//! identical input with the same seed are topologically identical.

#![forbid(unsafe_code)]

/// Data structures and algorithms of the incremental tessellators and the
/// Voronoi builders.
pub mod core {
    /// Collection aliases tuned for id-keyed lookups and small scratch
    /// buffers.
    pub mod collections;
    /// Incremental 2D Delaunay tessellation.
    pub mod delaunay2d;
    /// Incremental 3D Delaunay tessellation.
    pub mod delaunay3d;
    /// Error types for tessellation and Voronoi construction.
    pub mod errors;
    /// Simplex storage with reciprocal neighbour tables.
    pub mod simplex;
    /// Point-location statistics.
    pub mod stats;
    /// Vertex storage: coordinate triple, back-links, search radii.
    pub mod vertex;
    /// Shared Voronoi output records.
    pub mod voronoi;
    /// 2D Delaunay-to-Voronoi conversion.
    pub mod voronoi2d;
    /// 3D Delaunay-to-Voronoi conversion.
    pub mod voronoi3d;

    pub use delaunay2d::*;
    pub use delaunay3d::*;
    pub use errors::*;
    pub use simplex::*;
    pub use stats::*;
    pub use vertex::*;
    pub use voronoi::*;
    pub use voronoi2d::*;
    pub use voronoi3d::*;
}

/// Geometric predicates and floating-point helpers.
pub mod geometry {
    /// Bounding box and the rescaled `[1, 2)` coordinate frame.
    pub mod bounds;
    /// Exact integer predicates with a reusable big-integer scratch pool.
    pub mod exact;
    /// Adaptive predicate dispatch: fast f64 path with exact fallback.
    pub mod predicates;
    /// Circumcenters, areas, volumes and centroids in double precision.
    pub mod util;

    pub use bounds::*;
    pub use exact::*;
    pub use predicates::*;
    pub use util::*;
}

/// Re-exports of the commonly used types.
pub mod prelude {
    pub use crate::core::{
        collections::*, delaunay2d::*, delaunay3d::*, errors::*, simplex::*, stats::*, vertex::*,
        voronoi::*, voronoi2d::*, voronoi3d::*,
    };
    pub use crate::geometry::{bounds::*, exact::*, predicates::*, util::*};
}
