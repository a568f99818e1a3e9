//! Vertex storage for the incremental tessellators.
//!
//! Every generator keeps three coordinate views: the host-supplied double
//! position, the copy rescaled into `[1, 2)`, and the 52-bit integer
//! mantissas of the rescaled copy. The mantissas are the canonical
//! coordinates for all exact predicates; the rescaled doubles drive the
//! non-exact fast path; the original doubles feed the floating-point
//! geometry of the Voronoi conversion.
//!
//! A vertex index belongs to exactly one of the disjoint classes fixed for
//! the lifetime of a tessellation:
//!
//! - *local* generators occupy the pre-reserved block `[0, vertex_end)`,
//! - the *auxiliary* corners of the bounding simplex follow at
//!   `[vertex_end, vertex_end + D + 1)`,
//! - *ghost* generators occupy `[ghost_offset, ..)`, where `ghost_offset` is
//!   frozen once by `consolidate`.

use crate::core::collections::SlotIndex;
use crate::geometry::bounds::{mantissa, RescaleError, ScaledBox};
use crate::geometry::predicates::ScaledPosition;

/// Sentinel for a vertex that is not linked to any simplex yet.
pub const NO_SIMPLEX: usize = usize::MAX;

/// Per-vertex storage: coordinate triple, simplex back-link, search radius.
#[derive(Clone, Debug)]
pub struct VertexStore<const D: usize> {
    positions: Vec<[f64; D]>,
    rescaled: Vec<[f64; D]>,
    mantissas: Vec<[u64; D]>,
    simplex_links: Vec<usize>,
    simplex_slots: Vec<SlotIndex>,
    search_radii: Vec<f64>,
    vertex_end: usize,
    ghost_offset: Option<usize>,
}

impl<const D: usize> VertexStore<D> {
    /// Create a store with a pre-reserved local block of `local_count`
    /// vertices. The local slots are filled by `set_vertex`; auxiliary and
    /// ghost vertices are appended behind the block.
    pub(crate) fn with_local_block(local_count: usize) -> Self {
        let reserve = local_count + D + 1;
        let mut store = Self {
            positions: Vec::with_capacity(reserve),
            rescaled: Vec::with_capacity(reserve),
            mantissas: Vec::with_capacity(reserve),
            simplex_links: Vec::with_capacity(reserve),
            simplex_slots: Vec::with_capacity(reserve),
            search_radii: Vec::with_capacity(reserve),
            vertex_end: local_count,
            ghost_offset: None,
        };
        store.positions.resize(local_count, [f64::NAN; D]);
        store.rescaled.resize(local_count, [f64::NAN; D]);
        store.mantissas.resize(local_count, [0; D]);
        store.simplex_links.resize(local_count, NO_SIMPLEX);
        store.simplex_slots.resize(local_count, 0);
        store.search_radii.resize(local_count, f64::INFINITY);
        store
    }

    /// Initialise the pre-reserved slot `v` with the given position.
    pub(crate) fn set_vertex(
        &mut self,
        scaled: &ScaledBox<D>,
        v: usize,
        position: [f64; D],
    ) -> Result<(), RescaleError> {
        let rescaled = scaled.rescale(position)?;
        self.positions[v] = position;
        self.rescaled[v] = rescaled;
        self.mantissas[v] = std::array::from_fn(|axis| mantissa(rescaled[axis]));
        self.simplex_links[v] = NO_SIMPLEX;
        self.simplex_slots[v] = 0;
        self.search_radii[v] = f64::INFINITY;
        Ok(())
    }

    /// Append a vertex behind the local block and return its index.
    pub(crate) fn push_vertex(
        &mut self,
        scaled: &ScaledBox<D>,
        position: [f64; D],
    ) -> Result<usize, RescaleError> {
        let rescaled = scaled.rescale(position)?;
        let v = self.positions.len();
        self.positions.push(position);
        self.rescaled.push(rescaled);
        self.mantissas
            .push(std::array::from_fn(|axis| mantissa(rescaled[axis])));
        self.simplex_links.push(NO_SIMPLEX);
        self.simplex_slots.push(0);
        self.search_radii.push(f64::INFINITY);
        Ok(v)
    }

    /// Total number of vertices (local block + auxiliary + ghosts).
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True when the store holds no vertices at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Host-frame position of vertex `v`.
    #[must_use]
    pub fn position(&self, v: usize) -> [f64; D] {
        self.positions[v]
    }

    /// The rescaled + mantissa views of vertex `v`, as consumed by the
    /// predicates.
    #[must_use]
    pub(crate) fn scaled_position(&self, v: usize) -> ScaledPosition<D> {
        ScaledPosition {
            rescaled: self.rescaled[v],
            mantissa: self.mantissas[v],
        }
    }

    /// Record that vertex `v` sits at `slot` of `simplex`.
    pub(crate) fn set_link(&mut self, v: usize, simplex: usize, slot: SlotIndex) {
        self.simplex_links[v] = simplex;
        self.simplex_slots[v] = slot;
    }

    /// The simplex back-link of vertex `v` and the slot it occupies there.
    #[must_use]
    pub fn link(&self, v: usize) -> (usize, SlotIndex) {
        (self.simplex_links[v], self.simplex_slots[v])
    }

    /// Current search radius of vertex `v`.
    #[must_use]
    pub fn search_radius(&self, v: usize) -> f64 {
        self.search_radii[v]
    }

    pub(crate) fn set_search_radius(&mut self, v: usize, radius: f64) {
        self.search_radii[v] = radius;
    }

    /// End of the reserved local block.
    #[must_use]
    pub fn vertex_end(&self) -> usize {
        self.vertex_end
    }

    /// Offset of the ghost vertices, once consolidated.
    #[must_use]
    pub fn ghost_offset(&self) -> Option<usize> {
        self.ghost_offset
    }

    /// Freeze the local/ghost boundary at the current vertex count.
    pub(crate) fn consolidate(&mut self) {
        self.ghost_offset = Some(self.positions.len());
    }

    /// True for indices in the reserved local block.
    #[must_use]
    pub fn is_local(&self, v: usize) -> bool {
        v < self.vertex_end
    }

    /// True for the corners of the bounding simplex.
    #[must_use]
    pub fn is_auxiliary(&self, v: usize) -> bool {
        v >= self.vertex_end && v < self.vertex_end + D + 1
    }

    /// True for imported ghost generators.
    #[must_use]
    pub fn is_ghost(&self, v: usize) -> bool {
        self.ghost_offset.is_some_and(|offset| v >= offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::bounds::BoundingBox;

    #[test]
    fn vertex_classes_partition_the_index_space() {
        let bounds = BoundingBox::cube([0.0, 0.0], 1.0);
        let scaled = ScaledBox::new(&bounds, 6.0);
        let mut store: VertexStore<2> = VertexStore::with_local_block(4);

        // Auxiliary corners are appended behind the local block.
        for corner in [[-1.0, -1.0], [5.0, -1.0], [-1.0, 5.0]] {
            store.push_vertex(&scaled, corner).unwrap();
        }
        store.set_vertex(&scaled, 0, [0.25, 0.25]).unwrap();

        assert!(store.is_local(0));
        assert!(store.is_auxiliary(4));
        assert!(store.is_auxiliary(6));
        assert!(!store.is_ghost(7));

        store.consolidate();
        let ghost = store.push_vertex(&scaled, [1.5, 1.5]).unwrap();
        assert_eq!(ghost, 7);
        assert!(store.is_ghost(ghost));
        assert!(!store.is_local(ghost));
    }

    #[test]
    fn links_start_unset_and_record_slot() {
        let bounds = BoundingBox::cube([0.0, 0.0], 1.0);
        let scaled = ScaledBox::new(&bounds, 6.0);
        let mut store: VertexStore<2> = VertexStore::with_local_block(1);
        store.set_vertex(&scaled, 0, [0.5, 0.5]).unwrap();
        assert_eq!(store.link(0).0, NO_SIMPLEX);

        store.set_link(0, 7, 2);
        assert_eq!(store.link(0), (7, 2));
        assert!(store.search_radius(0).is_infinite());
    }
}
