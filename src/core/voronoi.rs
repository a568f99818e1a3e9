//! Output records of the Voronoi conversion, shared by the 2D and 3D
//! builders.
//!
//! Faces are binned per cell into two buckets identified by a 1-bit source
//! id (`sid`): bucket 0 holds interior faces (both generators local, stored
//! once under the lower-indexed generator), bucket 1 holds boundary faces
//! (the right generator is a ghost). The host's flux-exchange machinery
//! selects its communication pattern from the sid alone.

/// Source id of an interior face (both generators local).
pub const SID_INTERIOR: usize = 0;

/// Source id of a boundary face (right generator is a ghost).
pub const SID_BOUNDARY: usize = 1;

/// One Voronoi cell: the dual region of a local generator.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoronoiCell<const D: usize> {
    /// Position of the generator this cell belongs to.
    pub generator: [f64; D],
    /// Centroid of the cell.
    pub centroid: [f64; D],
    /// Measure of the cell: area in 2D, volume in 3D.
    pub volume: f64,
    /// Number of faces bounding the cell (deduplicated interior faces are
    /// still counted for both cells).
    pub face_count: usize,
}

/// One Voronoi face: the interface between two neighbouring cells.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoronoiFace<const D: usize> {
    /// Generator on the left of the interface; always a local vertex.
    pub left: usize,
    /// Generator on the right; local for interior faces, ghost for boundary
    /// faces.
    pub right: usize,
    /// Measure of the interface: length in 2D, area in 3D.
    pub area: f64,
    /// Midpoint (area centroid) of the interface.
    pub midpoint: [f64; D],
    /// The interface geometry: segment endpoints in 2D, the polygon of dual
    /// circumcenters in 3D.
    pub vertices: Vec<[f64; D]>,
}
