//! Point-location statistics.
//!
//! The walk starts from the simplex touched by the previous insertion, so
//! spatially sorted input (e.g. Hilbert order) keeps the amortised walk
//! length constant. Hosts can read these counters to verify that property
//! holds for their insertion order.

/// Counters for the point-location walks of one tessellation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LocateStatistics {
    /// Number of vertices inserted so far.
    pub insertions: u64,
    /// Total number of simplices visited across all walks.
    pub walk_steps: u64,
}

impl LocateStatistics {
    /// Mean number of simplices visited per insertion.
    #[must_use]
    pub fn average_walk_length(&self) -> f64 {
        if self.insertions == 0 {
            0.0
        } else {
            self.walk_steps as f64 / self.insertions as f64
        }
    }
}
