//! Simplex storage: triangles in 2D, tetrahedra in 3D.
//!
//! A simplex carries a positively oriented vertex tuple, one neighbour id per
//! opposite-face slot, and for each neighbour slot the reciprocal slot this
//! simplex occupies in that neighbour. The reciprocal table is what makes
//! every flip a constant-time index rewrite with no face search.
//!
//! Neighbour links are ids into the owning tessellation's simplex array, not
//! references; the simplex graph is cyclic and the arrays are the single
//! owner of all topology.

use crate::core::collections::SlotIndex;

/// Sentinel vertex id used as the tip of dummy simplices.
pub const INVALID_VERTEX: usize = usize::MAX;

/// Sentinel neighbour id for not-yet-wired faces.
pub const NO_NEIGHBOUR: usize = usize::MAX;

/// A 2D simplex: vertex tuple ordered counterclockwise.
#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    vertices: [usize; 3],
    neighbours: [usize; 3],
    index_in_neighbour: [SlotIndex; 3],
}

impl Triangle {
    pub(crate) fn new(v0: usize, v1: usize, v2: usize) -> Self {
        Self {
            vertices: [v0, v1, v2],
            neighbours: [NO_NEIGHBOUR; 3],
            index_in_neighbour: [0; 3],
        }
    }

    /// Vertex id at `slot`.
    #[must_use]
    pub fn vertex(&self, slot: usize) -> usize {
        self.vertices[slot]
    }

    /// The full vertex tuple.
    #[must_use]
    pub fn vertices(&self) -> [usize; 3] {
        self.vertices
    }

    /// Neighbour across the face opposite `slot`.
    #[must_use]
    pub fn neighbour(&self, slot: usize) -> usize {
        self.neighbours[slot]
    }

    /// The slot this triangle occupies in `neighbour(slot)`.
    #[must_use]
    pub fn index_in_neighbour(&self, slot: usize) -> SlotIndex {
        self.index_in_neighbour[slot]
    }

    /// Rewrite one directed neighbour link.
    ///
    /// Callers always pair this with the mirrored update on the neighbour so
    /// that reciprocity is preserved.
    pub(crate) fn swap_neighbour(&mut self, slot: usize, neighbour: usize, reciprocal: SlotIndex) {
        self.neighbours[slot] = neighbour;
        self.index_in_neighbour[slot] = reciprocal;
    }
}

/// A 3D simplex: positively oriented vertex tuple plus a soft-delete flag.
#[derive(Clone, Copy, Debug)]
pub struct Tetrahedron {
    vertices: [usize; 4],
    neighbours: [usize; 4],
    index_in_neighbour: [SlotIndex; 4],
    active: bool,
}

impl Tetrahedron {
    pub(crate) fn new(v0: usize, v1: usize, v2: usize, v3: usize) -> Self {
        Self {
            vertices: [v0, v1, v2, v3],
            neighbours: [NO_NEIGHBOUR; 4],
            index_in_neighbour: [0; 4],
            active: true,
        }
    }

    /// Vertex id at `slot`.
    #[must_use]
    pub fn vertex(&self, slot: usize) -> usize {
        self.vertices[slot]
    }

    /// The full vertex tuple.
    #[must_use]
    pub fn vertices(&self) -> [usize; 4] {
        self.vertices
    }

    /// Neighbour across the face opposite `slot`.
    #[must_use]
    pub fn neighbour(&self, slot: usize) -> usize {
        self.neighbours[slot]
    }

    /// The slot this tetrahedron occupies in `neighbour(slot)`.
    #[must_use]
    pub fn index_in_neighbour(&self, slot: usize) -> SlotIndex {
        self.index_in_neighbour[slot]
    }

    /// False once the tetrahedron has been soft-deleted by a 3-to-2 flip.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The slot of vertex `v`, if this tetrahedron contains it.
    #[must_use]
    pub fn vertex_slot(&self, v: usize) -> Option<usize> {
        self.vertices.iter().position(|&w| w == v)
    }

    /// The slot whose opposite face borders `t`, if `t` is a neighbour.
    #[must_use]
    pub fn neighbour_slot(&self, t: usize) -> Option<usize> {
        self.neighbours.iter().position(|&n| n == t)
    }

    /// Rewrite one directed neighbour link.
    pub(crate) fn swap_neighbour(&mut self, slot: usize, neighbour: usize, reciprocal: SlotIndex) {
        self.neighbours[slot] = neighbour;
        self.index_in_neighbour[slot] = reciprocal;
    }

    /// Rewrite all four directed neighbour links at once.
    pub(crate) fn swap_neighbours(
        &mut self,
        neighbours: [usize; 4],
        reciprocals: [SlotIndex; 4],
    ) {
        self.neighbours = neighbours;
        self.index_in_neighbour = reciprocals;
    }

    /// Soft-delete this tetrahedron; the owning tessellation pushes the id
    /// onto its free stack for reuse.
    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    pub(crate) fn reactivate(&mut self, v0: usize, v1: usize, v2: usize, v3: usize) {
        self.vertices = [v0, v1, v2, v3];
        self.neighbours = [NO_NEIGHBOUR; 4];
        self.index_in_neighbour = [0; 4];
        self.active = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_neighbour_records_reciprocal_slot() {
        let mut t = Triangle::new(0, 1, 2);
        t.swap_neighbour(1, 7, 2);
        assert_eq!(t.neighbour(1), 7);
        assert_eq!(t.index_in_neighbour(1), 2);
    }

    #[test]
    fn tetrahedron_slot_lookups() {
        let mut t = Tetrahedron::new(10, 11, 12, 13);
        assert_eq!(t.vertex_slot(12), Some(2));
        assert_eq!(t.vertex_slot(99), None);

        t.swap_neighbours([4, 5, 6, 7], [0, 1, 2, 3]);
        assert_eq!(t.neighbour_slot(6), Some(2));
        assert_eq!(t.neighbour_slot(8), None);

        assert!(t.is_active());
        t.deactivate();
        assert!(!t.is_active());
        t.reactivate(1, 2, 3, 4);
        assert!(t.is_active());
        assert_eq!(t.vertices(), [1, 2, 3, 4]);
    }
}
