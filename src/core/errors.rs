//! Error types shared by the 2D and 3D tessellators and Voronoi builders.
//!
//! Every error here signals a host-side precondition violation or an internal
//! consistency failure; none of them is recoverable. The host is expected to
//! present valid input or abort with the diagnostic.

use crate::geometry::bounds::RescaleError;
use thiserror::Error;

/// Errors raised while building a Delaunay tessellation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TessellationError {
    /// A vertex position fell outside the padded bounding box.
    #[error("vertex {vertex} cannot be rescaled: {source}")]
    VertexOutsideBox {
        /// Index of the offending vertex.
        vertex: usize,
        /// The rescale failure.
        source: RescaleError,
    },
    /// `add_local_vertex` was called with an index outside the reserved
    /// local block.
    #[error("local vertex index {index} outside the reserved local range 0..{vertex_end}")]
    LocalIndexOutOfRange {
        /// Index passed by the host.
        index: usize,
        /// End of the reserved local block.
        vertex_end: usize,
    },
    /// The input contains coincident or colinear/coplanar points that leave
    /// the point-location tests geometrically impossible.
    #[error("degenerate input at vertex {vertex}: {message}")]
    DegenerateInput {
        /// Vertex being inserted when the degeneracy was detected.
        vertex: usize,
        /// Description of the impossible configuration.
        message: String,
    },
    /// `consolidate` was called twice.
    #[error("tessellation is already consolidated")]
    AlreadyConsolidated,
    /// A ghost vertex was added before `consolidate`.
    #[error("ghost vertices can only be added after consolidate")]
    NotConsolidated,
    /// The point-location walk visited more simplices than exist, which can
    /// only happen on a misconfigured bounding box.
    #[error("point location did not converge for vertex {vertex}")]
    WalkDidNotConverge {
        /// Vertex being located.
        vertex: usize,
    },
    /// The point-location walk stepped across the hull of the bounding
    /// simplex; the vertex lies inside the padded box but outside the
    /// bounding simplex, so the box is too small for this input.
    #[error("vertex {vertex} lies outside the bounding simplex")]
    OutsideBoundingSimplex {
        /// Vertex being located.
        vertex: usize,
    },
    /// A tessellation-wide verification sweep found a broken invariant.
    #[error("tessellation invariant violated: {message}")]
    InvariantViolation {
        /// Description of the violated invariant.
        message: String,
    },
}

/// Errors raised while deriving the Voronoi grid from a tessellation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum VoronoiError {
    /// The tessellation has not been consolidated yet.
    #[error("tessellation must be consolidated before building the Voronoi grid")]
    NotConsolidated,
    /// A local cell's one-ring reaches the bounding simplex: the ghost
    /// coverage is insufficient (or a neighbouring region is empty) and the
    /// cell cannot be closed.
    #[error("cell of generator {generator} touches the bounding simplex; add more ghost vertices")]
    UnboundedCell {
        /// Local generator whose cell is open.
        generator: usize,
    },
    /// A local generator was never inserted into the tessellation.
    #[error("generator {generator} has no simplex link; it was never inserted")]
    MissingVertexLink {
        /// The unlinked generator.
        generator: usize,
    },
}
