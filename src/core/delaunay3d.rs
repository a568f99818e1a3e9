//! Incremental 3D Delaunay tessellation.
//!
//! Insertion follows the same walk, split and flip-cascade scheme as the 2D
//! tessellator, but the 3D flip zoo is richer. The insertion split is
//! 1-to-4 (interior), 2-to-6 (on a face) or n-to-2n (on an edge shared by n
//! tetrahedra), and the cascade repairs Delaunay violations with 2-to-3,
//! 4-to-4 and 3-to-2 flips. The 3-to-2 flip removes a tetrahedron; its slot
//! is soft-deleted and pushed on a free-index stack for reuse.
//!
//! The degenerate 4-to-4 and 3-to-2 flips require a specific configuration
//! among non-adjacent neighbours. When the configuration is not present yet
//! the flip is deferred: a later flip rewires the neighbourhood and the
//! violation is revisited through the queue. Forcing an infeasible flip
//! would corrupt the topology.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::collections::{SlotIndex, SmallBuffer};
use crate::core::errors::TessellationError;
use crate::core::simplex::{Tetrahedron, INVALID_VERTEX};
use crate::core::stats::LocateStatistics;
use crate::core::vertex::{VertexStore, NO_SIMPLEX};
use crate::core::voronoi3d::Voronoi3d;
use crate::geometry::bounds::{BoundingBox, ScaledBox};
use crate::geometry::exact::ExactScratch;
use crate::geometry::predicates::{insphere, orient3d, InSphere, Orientation};
use crate::geometry::util::circumradius_3d;

/// Number of dummy border tetrahedra; they occupy ids `0..DUMMY_TETRAHEDRA`.
pub const DUMMY_TETRAHEDRA: usize = 4;

/// Ratio of the padded bounding-simplex box to the largest host box side.
/// Larger than in 2D so that the local region and all neighbouring regions
/// fit inside the single bounding tetrahedron.
const BOX_PADDING: f64 = 9.0;

/// Where a new vertex landed during point location.
enum Placement {
    /// Strictly inside one tetrahedron.
    Interior(usize),
    /// Exactly on the face opposite `face` of tetrahedron `t`.
    OnFace { t: usize, face: usize },
    /// Exactly on an edge; `ring` lists every tetrahedron sharing the edge,
    /// in rotation order around it.
    OnEdge { ring: SmallBuffer<usize, 16> },
}

/// Check whether placing labels `(l0, l1, l2, l3)` at slots `(a, b, c, d)`
/// preserves the orientation of the stored tuple, i.e. whether `abcd` is an
/// even permutation of `0123`.
fn positive_permutation(a: usize, b: usize, c: usize, d: usize) -> bool {
    if (a + 1) % 4 == b {
        c % 2 == 0
    } else if (a + 2) % 4 == b {
        b * c + a * d > b * d + a * c
    } else {
        d % 2 == 0
    }
}

/// Incremental 3D Delaunay tessellation with exact predicates.
#[derive(Debug)]
pub struct Delaunay3d {
    scaled: ScaledBox<3>,
    vertices: VertexStore<3>,
    tetrahedra: Vec<Tetrahedron>,
    /// LIFO queue of tetrahedra whose Delaunay property needs re-checking.
    queue: Vec<usize>,
    /// Slots of soft-deleted tetrahedra, reused by the next allocation.
    free_indices: Vec<usize>,
    /// Starting guess for the next point-location walk.
    last_tetrahedron: usize,
    scratch: ExactScratch,
    rng: StdRng,
    stats: LocateStatistics,
}

impl Delaunay3d {
    /// Set up the bounding tetrahedron and its dummy border.
    ///
    /// See [`crate::core::delaunay2d::Delaunay2d::new`] for the meaning of
    /// the parameters; the only difference is the dimension.
    #[must_use]
    pub fn new(
        bounds: &BoundingBox<3>,
        local_count: usize,
        tetrahedron_capacity: usize,
        seed: u64,
    ) -> Self {
        let scaled = ScaledBox::new(bounds, BOX_PADDING);
        let mut vertices = VertexStore::with_local_block(local_count);

        let anchor = scaled.anchor();
        let side = scaled.side();
        let corners = [
            anchor,
            [anchor[0] + side, anchor[1], anchor[2]],
            [anchor[0], anchor[1] + side, anchor[2]],
            [anchor[0], anchor[1], anchor[2] + side],
        ];
        let mut aux = [0_usize; 4];
        for (i, corner) in corners.into_iter().enumerate() {
            aux[i] = vertices
                .push_vertex(&scaled, corner)
                .expect("bounding-simplex corners lie inside the padded box");
        }
        let [v0, v1, v2, v3] = aux;

        let mut tetrahedra = Vec::with_capacity(tetrahedron_capacity.max(DUMMY_TETRAHEDRA + 1));
        // One dummy per face of the bounding tetrahedron, each with an
        // invalid tip in its last slot.
        tetrahedra.push(Tetrahedron::new(v1, v2, v3, INVALID_VERTEX));
        tetrahedra.push(Tetrahedron::new(v2, v0, v3, INVALID_VERTEX));
        tetrahedra.push(Tetrahedron::new(v3, v0, v1, INVALID_VERTEX));
        tetrahedra.push(Tetrahedron::new(v0, v2, v1, INVALID_VERTEX));
        let first = tetrahedra.len();
        tetrahedra.push(Tetrahedron::new(v0, v1, v2, v3));

        for (dummy, slot) in [(0_usize, 0_u8), (1, 1), (2, 2), (3, 3)] {
            tetrahedra[dummy].swap_neighbour(3, first, slot);
        }
        tetrahedra[first].swap_neighbours([0, 1, 2, 3], [3, 3, 3, 3]);

        vertices.set_link(v0, first, 0);
        vertices.set_link(v1, first, 1);
        vertices.set_link(v2, first, 2);
        vertices.set_link(v3, first, 3);

        Self {
            scaled,
            vertices,
            tetrahedra,
            queue: Vec::new(),
            free_indices: Vec::new(),
            last_tetrahedron: first,
            scratch: ExactScratch::new(),
            rng: StdRng::seed_from_u64(seed),
            stats: LocateStatistics::default(),
        }
    }

    /// Insert a local generator at its pre-reserved index.
    ///
    /// # Errors
    ///
    /// Same contract as [`crate::core::delaunay2d::Delaunay2d::add_local_vertex`].
    pub fn add_local_vertex(
        &mut self,
        index: usize,
        position: [f64; 3],
    ) -> Result<(), TessellationError> {
        if self.vertices.ghost_offset().is_some() {
            return Err(TessellationError::AlreadyConsolidated);
        }
        if index >= self.vertices.vertex_end() {
            return Err(TessellationError::LocalIndexOutOfRange {
                index,
                vertex_end: self.vertices.vertex_end(),
            });
        }
        self.vertices
            .set_vertex(&self.scaled, index, position)
            .map_err(|source| TessellationError::VertexOutsideBox {
                vertex: index,
                source,
            })?;
        self.insert_vertex(index)
    }

    /// Append a ghost generator and insert it.
    ///
    /// # Errors
    ///
    /// Same contract as [`crate::core::delaunay2d::Delaunay2d::add_ghost_vertex`].
    pub fn add_ghost_vertex(&mut self, position: [f64; 3]) -> Result<usize, TessellationError> {
        if self.vertices.ghost_offset().is_none() {
            return Err(TessellationError::NotConsolidated);
        }
        let v = self
            .vertices
            .push_vertex(&self.scaled, position)
            .map_err(|source| TessellationError::VertexOutsideBox {
                vertex: self.vertices.len(),
                source,
            })?;
        self.insert_vertex(v)?;
        Ok(v)
    }

    /// Freeze the local/ghost boundary.
    ///
    /// # Errors
    ///
    /// Fails when called a second time.
    pub fn consolidate(&mut self) -> Result<(), TessellationError> {
        if self.vertices.ghost_offset().is_some() {
            return Err(TessellationError::AlreadyConsolidated);
        }
        self.vertices.consolidate();
        tracing::debug!(
            ghost_offset = self.vertices.ghost_offset().unwrap_or(0),
            "consolidated tessellation"
        );
        Ok(())
    }

    /// Twice the largest circumradius among the tetrahedra incident to the
    /// local vertex `v`, or infinity when the incident set reaches the dummy
    /// border.
    #[must_use]
    pub fn search_radius(&self, v: usize) -> f64 {
        let (start, _) = self.vertices.link(v);
        if start == NO_SIMPLEX {
            return f64::INFINITY;
        }
        let mut visited: SmallBuffer<usize, 32> = SmallBuffer::new();
        let mut stack: SmallBuffer<usize, 32> = SmallBuffer::new();
        visited.push(start);
        stack.push(start);
        let mut radius: f64 = 0.0;
        while let Some(t) = stack.pop() {
            if t < DUMMY_TETRAHEDRA {
                return f64::INFINITY;
            }
            radius = radius.max(2.0 * self.tetrahedron_circumradius(t));
            let tet = &self.tetrahedra[t];
            let Some(v_slot) = tet.vertex_slot(v) else {
                continue;
            };
            // Every neighbour across a face containing `v` also contains
            // `v`, which floods exactly the incident set.
            for slot in 0..4 {
                if slot == v_slot {
                    continue;
                }
                let ngb = tet.neighbour(slot);
                if !visited.contains(&ngb) {
                    visited.push(ngb);
                    stack.push(ngb);
                }
            }
        }
        radius
    }

    /// Refresh the search radii of all local vertices whose stored radius
    /// exceeds `r`; returns how many still exceed `r` afterwards.
    pub fn update_search_radii(&mut self, r: f64) -> usize {
        let mut count = 0;
        for v in 0..self.vertices.vertex_end() {
            if self.vertices.search_radius(v) > r {
                let radius = self.search_radius(v);
                self.vertices.set_search_radius(v, radius);
                if radius > r {
                    count += 1;
                }
            }
        }
        count
    }

    /// Materialise the dual Voronoi grid.
    ///
    /// # Errors
    ///
    /// Fails before consolidation or when a local cell is not closed by
    /// ghost coverage.
    pub fn build_voronoi(&self) -> Result<Voronoi3d, crate::core::errors::VoronoiError> {
        Voronoi3d::build(self)
    }

    /// The vertex store.
    #[must_use]
    pub fn vertices(&self) -> &VertexStore<3> {
        &self.vertices
    }

    /// The tetrahedron with id `t`.
    #[must_use]
    pub fn tetrahedron(&self, t: usize) -> &Tetrahedron {
        &self.tetrahedra[t]
    }

    /// Total number of tetrahedron slots, dummies and inactive slots
    /// included.
    #[must_use]
    pub fn number_of_tetrahedra(&self) -> usize {
        self.tetrahedra.len()
    }

    /// Point-location counters accumulated so far.
    #[must_use]
    pub fn locate_statistics(&self) -> LocateStatistics {
        self.stats
    }

    /// Circumradius of tetrahedron `t` in host coordinates.
    #[must_use]
    pub fn tetrahedron_circumradius(&self, t: usize) -> f64 {
        let [v0, v1, v2, v3] = self.tetrahedra[t].vertices();
        circumradius_3d(
            self.vertices.position(v0),
            self.vertices.position(v1),
            self.vertices.position(v2),
            self.vertices.position(v3),
        )
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    fn insert_vertex(&mut self, v: usize) -> Result<(), TessellationError> {
        let placement = self.locate(v)?;
        match placement {
            Placement::Interior(t) => self.one_to_four_flip(v, t),
            Placement::OnFace { t, face } => self.two_to_six_flip(v, t, face),
            Placement::OnEdge { ring } => self.n_to_2n_flip(v, &ring),
        }
        self.check_tetrahedra(v);
        Ok(())
    }

    /// Walk from the last touched tetrahedron to the one containing `v`.
    fn locate(&mut self, v: usize) -> Result<Placement, TessellationError> {
        let mut t = self.last_tetrahedron;
        let mut steps = 0_u64;
        let limit = self.tetrahedra.len() as u64 + 1;
        let e = self.vertices.scaled_position(v);

        loop {
            steps += 1;
            if steps > limit {
                return Err(TessellationError::WalkDidNotConverge { vertex: v });
            }

            let [v0, v1, v2, v3] = self.tetrahedra[t].vertices();
            let a = self.vertices.scaled_position(v0);
            let b = self.vertices.scaled_position(v1);
            let c = self.vertices.scaled_position(v2);
            let d = self.vertices.scaled_position(v3);

            // One orientation test per face; a negative sign means the point
            // lies on the wrong side of that face. The vertex orders are the
            // even permutations that put the opposite slot last.
            let tests = [
                orient3d(&mut self.scratch, &b, &d, &c, &e),
                orient3d(&mut self.scratch, &a, &c, &d, &e),
                orient3d(&mut self.scratch, &a, &d, &b, &e),
                orient3d(&mut self.scratch, &a, &b, &c, &e),
            ];

            let mut negatives: SmallBuffer<usize, 4> = SmallBuffer::new();
            let mut zeros: SmallBuffer<usize, 4> = SmallBuffer::new();
            for (slot, test) in tests.iter().enumerate() {
                match test {
                    Orientation::NEGATIVE => negatives.push(slot),
                    Orientation::DEGENERATE => zeros.push(slot),
                    Orientation::POSITIVE => {}
                }
            }

            if !negatives.is_empty() {
                // Outside: step across a negative face, tie-broken by an
                // unbiased coin flip to prevent cycling.
                let slot = if negatives.len() == 1 {
                    negatives[0]
                } else {
                    negatives[self.rng.random_range(0..negatives.len())]
                };
                let next = self.tetrahedra[t].neighbour(slot);
                if next < DUMMY_TETRAHEDRA {
                    return Err(TessellationError::OutsideBoundingSimplex { vertex: v });
                }
                t = next;
                continue;
            }

            self.stats.insertions += 1;
            self.stats.walk_steps += steps;
            return match zeros.len() {
                0 => Ok(Placement::Interior(t)),
                1 => Ok(Placement::OnFace { t, face: zeros[0] }),
                2 => Ok(Placement::OnEdge {
                    ring: self.collect_edge_ring(t, zeros[0], zeros[1]),
                }),
                _ => Err(TessellationError::DegenerateInput {
                    vertex: v,
                    message: format!(
                        "vertex coincides with a vertex of tetrahedron {t} ({} zero orientations)",
                        zeros.len()
                    ),
                }),
            };
        }
    }

    /// Collect, in rotation order, every tetrahedron sharing the edge that
    /// the new vertex landed on. The edge is the intersection of the two
    /// zero faces of `t`, i.e. the two slots not named by them.
    fn collect_edge_ring(&self, t: usize, zero0: usize, zero1: usize) -> SmallBuffer<usize, 16> {
        let axis: SmallBuffer<usize, 2> = (0..4)
            .filter(|slot| *slot != zero0 && *slot != zero1)
            .collect();
        let a0 = self.tetrahedra[t].vertex(axis[0]);
        let a1 = self.tetrahedra[t].vertex(axis[1]);

        let mut ring: SmallBuffer<usize, 16> = SmallBuffer::new();
        ring.push(t);
        let mut cur = t;
        let mut exit = zero0;
        loop {
            let next = self.tetrahedra[cur].neighbour(exit);
            if next == t {
                break;
            }
            debug_assert!(next >= DUMMY_TETRAHEDRA);
            let entry = usize::from(self.tetrahedra[cur].index_in_neighbour(exit));
            ring.push(next);
            // Keep rotating: leave through the non-axis slot we did not
            // enter from.
            let mut exit_next = 0;
            for slot in 0..4 {
                let w = self.tetrahedra[next].vertex(slot);
                if slot != entry && w != a0 && w != a1 {
                    exit_next = slot;
                    break;
                }
            }
            cur = next;
            exit = exit_next;
        }
        ring
    }

    fn new_tetrahedron(&mut self) -> usize {
        if let Some(index) = self.free_indices.pop() {
            return index;
        }
        self.tetrahedra.push(Tetrahedron::new(
            INVALID_VERTEX,
            INVALID_VERTEX,
            INVALID_VERTEX,
            INVALID_VERTEX,
        ));
        self.tetrahedra.len() - 1
    }

    /// (Re)initialise slot `t` with the given positively oriented vertex
    /// tuple and refresh the vertex back-links.
    fn init_tetrahedron(&mut self, t: usize, v0: usize, v1: usize, v2: usize, v3: usize) {
        self.tetrahedra[t].reactivate(v0, v1, v2, v3);
        for (slot, v) in [v0, v1, v2, v3].into_iter().enumerate() {
            self.vertices.set_link(v, t, slot as SlotIndex);
        }
        self.last_tetrahedron = t;
    }

    /// Split tetrahedron `t` into four by connecting its faces to `v`.
    fn one_to_four_flip(&mut self, v: usize, t: usize) {
        let [v0, v1, v2, v3] = self.tetrahedra[t].vertices();
        let ngbs: [usize; 4] = std::array::from_fn(|i| self.tetrahedra[t].neighbour(i));
        let idx: [SlotIndex; 4] = std::array::from_fn(|i| self.tetrahedra[t].index_in_neighbour(i));

        let t1 = self.new_tetrahedron();
        let t2 = self.new_tetrahedron();
        let t3 = self.new_tetrahedron();
        tracing::trace!(t, t1, t2, t3, vertex = v, "1-to-4 split");

        self.init_tetrahedron(t, v0, v1, v2, v);
        self.init_tetrahedron(t1, v0, v1, v, v3);
        self.init_tetrahedron(t2, v0, v, v2, v3);
        self.init_tetrahedron(t3, v, v1, v2, v3);

        self.tetrahedra[t].swap_neighbours([t3, t2, t1, ngbs[3]], [3, 3, 3, idx[3]]);
        self.tetrahedra[t1].swap_neighbours([t3, t2, ngbs[2], t], [2, 2, idx[2], 2]);
        self.tetrahedra[t2].swap_neighbours([t3, ngbs[1], t1, t], [1, idx[1], 1, 1]);
        self.tetrahedra[t3].swap_neighbours([ngbs[0], t2, t1, t], [idx[0], 0, 0, 0]);

        self.tetrahedra[ngbs[0]].swap_neighbour(usize::from(idx[0]), t3, 0);
        self.tetrahedra[ngbs[1]].swap_neighbour(usize::from(idx[1]), t2, 1);
        self.tetrahedra[ngbs[2]].swap_neighbour(usize::from(idx[2]), t1, 2);
        self.tetrahedra[ngbs[3]].swap_neighbour(usize::from(idx[3]), t, 3);

        self.queue.extend([t, t1, t2, t3]);
    }

    /// The new vertex lies on the face opposite `face` of `t0`: split `t0`
    /// and the neighbour across that face into six tetrahedra, replacing
    /// the shared-triangle vertices with `v` one at a time.
    fn two_to_six_flip(&mut self, v: usize, t0: usize, face: usize) {
        let t1 = self.tetrahedra[t0].neighbour(face);
        debug_assert!(t1 >= DUMMY_TETRAHEDRA);
        let top1 = usize::from(self.tetrahedra[t0].index_in_neighbour(face));

        // Map the shared triangle to labels (l0, l1, l3) so that, with the
        // off-face vertex of t0 as l2 at slot `face`, the label tuple is
        // positively oriented.
        let mut tri0 = [(face + 1) % 4, (face + 2) % 4, (face + 3) % 4];
        if !positive_permutation(tri0[1], tri0[2], face, tri0[0]) {
            tri0.swap(1, 2);
        }
        let s0_l0 = tri0[1];
        let s0_l1 = tri0[2];
        let s0_l3 = tri0[0];

        let l0 = self.tetrahedra[t0].vertex(s0_l0);
        let l1 = self.tetrahedra[t0].vertex(s0_l1);
        let l2 = self.tetrahedra[t0].vertex(face);
        let l3 = self.tetrahedra[t0].vertex(s0_l3);
        let l4 = self.tetrahedra[t1].vertex(top1);

        let find_slot = |tet: &Tetrahedron, vertex: usize| {
            tet.vertex_slot(vertex)
                .expect("shared-triangle vertex present in both tetrahedra")
        };
        let s1_l0 = find_slot(&self.tetrahedra[t1], l0);
        let s1_l1 = find_slot(&self.tetrahedra[t1], l1);
        let s1_l3 = find_slot(&self.tetrahedra[t1], l3);

        // Outer faces and their reciprocal slots, captured before rewiring.
        let grab = |tet: &Tetrahedron, slot: usize| (tet.neighbour(slot), tet.index_in_neighbour(slot));
        let (ngb_a, idx_a) = grab(&self.tetrahedra[t0], s0_l0);
        let (ngb_b, idx_b) = grab(&self.tetrahedra[t0], s0_l1);
        let (ngb_c, idx_c) = grab(&self.tetrahedra[t0], s0_l3);
        let (ngb_d, idx_d) = grab(&self.tetrahedra[t1], s1_l0);
        let (ngb_e, idx_e) = grab(&self.tetrahedra[t1], s1_l1);
        let (ngb_f, idx_f) = grab(&self.tetrahedra[t1], s1_l3);

        let ta = t0;
        let td = t1;
        let tb = self.new_tetrahedron();
        let tc = self.new_tetrahedron();
        let te = self.new_tetrahedron();
        let tf = self.new_tetrahedron();
        tracing::trace!(t0, t1, vertex = v, "2-to-6 split on shared face");

        self.init_tetrahedron(ta, l0, l1, l2, v);
        self.init_tetrahedron(tb, l0, v, l2, l3);
        self.init_tetrahedron(tc, v, l1, l2, l3);
        self.init_tetrahedron(td, l0, l1, v, l4);
        self.init_tetrahedron(te, l0, v, l3, l4);
        self.init_tetrahedron(tf, v, l1, l3, l4);

        self.tetrahedra[ta].swap_neighbours([tc, tb, td, ngb_c], [3, 3, 3, idx_c]);
        self.tetrahedra[tb].swap_neighbours([tc, ngb_b, te, ta], [1, idx_b, 3, 1]);
        self.tetrahedra[tc].swap_neighbours([ngb_a, tb, tf, ta], [idx_a, 0, 3, 0]);
        self.tetrahedra[td].swap_neighbours([tf, te, ngb_f, ta], [2, 2, idx_f, 2]);
        self.tetrahedra[te].swap_neighbours([tf, ngb_e, td, tb], [1, idx_e, 1, 2]);
        self.tetrahedra[tf].swap_neighbours([ngb_d, te, td, tc], [idx_d, 0, 0, 2]);

        self.tetrahedra[ngb_c].swap_neighbour(usize::from(idx_c), ta, 3);
        self.tetrahedra[ngb_b].swap_neighbour(usize::from(idx_b), tb, 1);
        self.tetrahedra[ngb_a].swap_neighbour(usize::from(idx_a), tc, 0);
        self.tetrahedra[ngb_f].swap_neighbour(usize::from(idx_f), td, 2);
        self.tetrahedra[ngb_e].swap_neighbour(usize::from(idx_e), te, 1);
        self.tetrahedra[ngb_d].swap_neighbour(usize::from(idx_d), tf, 0);

        self.queue.extend([ta, tb, tc, td, te, tf]);
    }

    /// The new vertex lies on an edge shared by the `n` tetrahedra of
    /// `ring` (in rotation order): replace each ring tetrahedron by the two
    /// halves above and below the split edge.
    fn n_to_2n_flip(&mut self, v: usize, ring: &[usize]) {
        let n = ring.len();
        debug_assert!(n >= 3);
        tracing::trace!(n, vertex = v, "n-to-2n split on shared edge");

        // Per ring tetrahedron: the slot facing the next ring member (its
        // vertex is the previous ring vertex w_{i-1}) and the slot facing
        // the previous member (vertex w_i).
        let mut prev_slot: SmallBuffer<usize, 16> = SmallBuffer::new();
        let mut next_slot: SmallBuffer<usize, 16> = SmallBuffer::new();
        for (i, &t) in ring.iter().enumerate() {
            let towards_next = self.tetrahedra[t]
                .neighbour_slot(ring[(i + 1) % n])
                .expect("consecutive ring members are neighbours");
            let towards_prev = self.tetrahedra[t]
                .neighbour_slot(ring[(i + n - 1) % n])
                .expect("consecutive ring members are neighbours");
            prev_slot.push(towards_next);
            next_slot.push(towards_prev);
        }

        // Fix the axis labelling (a0, a1) on the first ring member so that
        // the label tuple (w_prev, a1, w_next, a0) is positively oriented;
        // the shared rotation direction keeps it consistent for the rest.
        let t0 = ring[0];
        let axis: SmallBuffer<usize, 2> = (0..4)
            .filter(|slot| *slot != prev_slot[0] && *slot != next_slot[0])
            .collect();
        let (a1_slot, a0_slot) = if positive_permutation(prev_slot[0], axis[0], next_slot[0], axis[1])
        {
            (axis[0], axis[1])
        } else {
            (axis[1], axis[0])
        };
        let a1 = self.tetrahedra[t0].vertex(a1_slot);
        let a0 = self.tetrahedra[t0].vertex(a0_slot);

        // Capture everything before rewiring: ring vertices, outer faces.
        let mut w: SmallBuffer<usize, 16> = SmallBuffer::new();
        let mut outer_a0: SmallBuffer<(usize, SlotIndex), 16> = SmallBuffer::new();
        let mut outer_a1: SmallBuffer<(usize, SlotIndex), 16> = SmallBuffer::new();
        for (i, &t) in ring.iter().enumerate() {
            let tet = &self.tetrahedra[t];
            // w[i] is the ring vertex shared with the next member.
            w.push(tet.vertex(next_slot[i]));
            let a0_here = tet.vertex_slot(a0).expect("axis vertex in every ring member");
            let a1_here = tet.vertex_slot(a1).expect("axis vertex in every ring member");
            outer_a0.push((tet.neighbour(a0_here), tet.index_in_neighbour(a0_here)));
            outer_a1.push((tet.neighbour(a1_here), tet.index_in_neighbour(a1_here)));
            debug_assert_eq!(tet.vertex(prev_slot[i]), {
                let p = (i + n - 1) % n;
                self.tetrahedra[ring[p]].vertex(next_slot[p])
            });
        }

        // Lower halves (towards a0) reuse the ring slots; upper halves
        // (towards a1) are freshly allocated.
        let lower: SmallBuffer<usize, 16> = ring.iter().copied().collect();
        let mut upper: SmallBuffer<usize, 16> = SmallBuffer::new();
        for _ in 0..n {
            let t = self.new_tetrahedron();
            upper.push(t);
        }

        for i in 0..n {
            let w_prev = w[(i + n - 1) % n];
            let w_next = w[i];
            self.init_tetrahedron(lower[i], w_prev, v, w_next, a0);
            self.init_tetrahedron(upper[i], w_prev, a1, w_next, v);
        }
        for i in 0..n {
            let next = (i + 1) % n;
            let prev = (i + n - 1) % n;
            let (oa1, oa1_idx) = outer_a1[i];
            let (oa0, oa0_idx) = outer_a0[i];
            self.tetrahedra[lower[i]]
                .swap_neighbours([lower[next], oa1, lower[prev], upper[i]], [2, oa1_idx, 0, 1]);
            self.tetrahedra[upper[i]]
                .swap_neighbours([upper[next], lower[i], upper[prev], oa0], [2, 3, 0, oa0_idx]);
            self.tetrahedra[oa1].swap_neighbour(usize::from(oa1_idx), lower[i], 1);
            self.tetrahedra[oa0].swap_neighbour(usize::from(oa0_idx), upper[i], 3);
        }

        self.queue.extend(lower.iter().copied());
        self.queue.extend(upper.iter().copied());
    }

    // ------------------------------------------------------------------
    // Flip cascade
    // ------------------------------------------------------------------

    /// Drain the to-check queue; indices freed by 3-to-2 flips are pushed on
    /// the free stack only after the queue is empty, so a queued id never
    /// gets reused while still pending.
    fn check_tetrahedra(&mut self, v: usize) {
        let mut freed: SmallBuffer<usize, 8> = SmallBuffer::new();
        while let Some(t) = self.queue.pop() {
            if !self.tetrahedra[t].is_active() {
                continue;
            }
            if let Some(freed_index) = self.check_tetrahedron(t, v) {
                freed.push(freed_index);
            }
        }
        self.free_indices.extend(freed);
    }

    /// Check the empty-circumsphere criterion for `t` against the opposite
    /// vertex of the neighbour across the face opposite the newly inserted
    /// vertex, and flip when it fails. Returns the index freed by a 3-to-2
    /// flip, if one ran.
    fn check_tetrahedron(&mut self, t: usize, v: usize) -> Option<usize> {
        let top = self.tetrahedra[t]
            .vertex_slot(v)
            .expect("queued tetrahedron contains the newly inserted vertex");

        let ngb = self.tetrahedra[t].neighbour(top);
        if ngb < DUMMY_TETRAHEDRA {
            // Dummies carry no circumsphere.
            return None;
        }
        let idx_in_ngb = usize::from(self.tetrahedra[t].index_in_neighbour(top));
        let opposite = self.tetrahedra[ngb].vertex(idx_in_ngb);

        let [v0, v1, v2, v3] = self.tetrahedra[t].vertices();
        let a = self.vertices.scaled_position(v0);
        let b = self.vertices.scaled_position(v1);
        let c = self.vertices.scaled_position(v2);
        let d = self.vertices.scaled_position(v3);
        let e = self.vertices.scaled_position(opposite);

        if insphere(&mut self.scratch, &a, &b, &c, &d, &e) != InSphere::INSIDE {
            return None;
        }

        // The flip diamond: test the orientation of the configurations that
        // replace each non-top vertex with the offending vertex. All
        // positive means the new edge pierces the shared face (2-to-3); a
        // zero means it crosses one of the face's edges (potential 4-to-4);
        // a negative means it passes outside (potential 3-to-2).
        let mut tests = [1_i32; 4];
        let sign = |o: Orientation| match o {
            Orientation::NEGATIVE => -1,
            Orientation::DEGENERATE => 0,
            Orientation::POSITIVE => 1,
        };
        if top != 3 {
            tests[0] = sign(orient3d(&mut self.scratch, &a, &b, &c, &e));
        }
        if top != 2 {
            tests[1] = sign(orient3d(&mut self.scratch, &a, &b, &e, &d));
        }
        if top != 1 {
            tests[2] = sign(orient3d(&mut self.scratch, &a, &e, &c, &d));
        }
        if top != 0 {
            tests[3] = sign(orient3d(&mut self.scratch, &e, &b, &c, &d));
        }

        let Some(i) = tests.iter().position(|&s| s <= 0) else {
            tracing::debug!(t, ngb, "2-to-3 flip");
            self.two_to_three_flip(t, ngb, top, idx_in_ngb);
            return None;
        };
        let non_axis = 3 - i;
        let other_ngb = self.tetrahedra[t].neighbour(non_axis);

        if tests[i] == 0 {
            // The edge (v, opposite) crosses an edge of the shared face. A
            // 4-to-4 flip is only possible if that edge is shared by exactly
            // four tetrahedra; otherwise defer to a later flip.
            let idx_v_in_other = self.tetrahedra[other_ngb]
                .vertex_slot(v)
                .expect("neighbour across a face containing v contains v");
            let other_ngbs_ngb = self.tetrahedra[other_ngb].neighbour(idx_v_in_other);
            if other_ngbs_ngb >= DUMMY_TETRAHEDRA
                && self.tetrahedra[ngb].neighbour_slot(other_ngbs_ngb).is_some()
            {
                tracing::debug!(t, other_ngb, ngb, other_ngbs_ngb, "4-to-4 flip");
                self.four_to_four_flip(t, other_ngb, ngb, other_ngbs_ngb, top, non_axis, idx_in_ngb);
            } else {
                tracing::debug!(t, ngb, "deferring infeasible 4-to-4 flip");
            }
            None
        } else {
            // The edge passes outside the shared face. A 3-to-2 flip needs
            // the third tetrahedron around the offending edge to border
            // both; otherwise defer.
            if self.tetrahedra[ngb].neighbour_slot(other_ngb).is_some() {
                tracing::debug!(t, ngb, other_ngb, "3-to-2 flip");
                Some(self.three_to_two_flip(t, ngb, other_ngb))
            } else {
                tracing::debug!(t, ngb, "deferring infeasible 3-to-2 flip");
                None
            }
        }
    }

    /// Replace two tetrahedra sharing a face by three sharing the edge from
    /// the new vertex to the offending vertex.
    fn two_to_three_flip(&mut self, t0: usize, t1: usize, top0: usize, top1: usize) {
        // Identify the shared triangle in both tetrahedra and order it so
        // the label tuple is positively oriented.
        let mut tri0 = [(top0 + 1) % 4, (top0 + 2) % 4, (top0 + 3) % 4];
        if !positive_permutation(tri0[1], tri0[2], top0, tri0[0]) {
            tri0.swap(1, 2);
        }
        let tri1: [usize; 3] = std::array::from_fn(|i| {
            self.tetrahedra[t1]
                .vertex_slot(self.tetrahedra[t0].vertex(tri0[i]))
                .expect("shared-triangle vertex present in both tetrahedra")
        });

        let s0_l0 = tri0[1];
        let s0_l1 = tri0[2];
        let s0_l3 = tri0[0];
        let s1_l0 = tri1[1];
        let s1_l1 = tri1[2];
        let s1_l3 = tri1[0];

        let vert = [
            self.tetrahedra[t0].vertex(s0_l0),
            self.tetrahedra[t0].vertex(s0_l1),
            self.tetrahedra[t0].vertex(top0),
            self.tetrahedra[t0].vertex(s0_l3),
            self.tetrahedra[t1].vertex(top1),
        ];

        let grab0 = |this: &Self, slot: usize| {
            (
                this.tetrahedra[t0].neighbour(slot),
                this.tetrahedra[t0].index_in_neighbour(slot),
            )
        };
        let grab1 = |this: &Self, slot: usize| {
            (
                this.tetrahedra[t1].neighbour(slot),
                this.tetrahedra[t1].index_in_neighbour(slot),
            )
        };
        let (ngb0, idx0) = grab0(self, s0_l0);
        let (ngb1, idx1) = grab1(self, s1_l0);
        let (ngb2, idx2) = grab1(self, s1_l1);
        let (ngb3, idx3) = grab0(self, s0_l1);
        let (ngb4, idx4) = grab0(self, s0_l3);
        let (ngb5, idx5) = grab1(self, s1_l3);

        let t2 = self.new_tetrahedron();
        self.init_tetrahedron(t0, vert[0], vert[1], vert[2], vert[4]);
        self.init_tetrahedron(t1, vert[0], vert[4], vert[2], vert[3]);
        self.init_tetrahedron(t2, vert[4], vert[1], vert[2], vert[3]);

        self.tetrahedra[t0].swap_neighbours([t2, t1, ngb5, ngb4], [3, 3, idx5, idx4]);
        self.tetrahedra[t1].swap_neighbours([t2, ngb3, ngb2, t0], [1, idx3, idx2, 1]);
        self.tetrahedra[t2].swap_neighbours([ngb0, t1, ngb1, t0], [idx0, 0, idx1, 0]);

        self.tetrahedra[ngb0].swap_neighbour(usize::from(idx0), t2, 0);
        self.tetrahedra[ngb1].swap_neighbour(usize::from(idx1), t2, 2);
        self.tetrahedra[ngb2].swap_neighbour(usize::from(idx2), t1, 2);
        self.tetrahedra[ngb3].swap_neighbour(usize::from(idx3), t1, 1);
        self.tetrahedra[ngb4].swap_neighbour(usize::from(idx4), t0, 3);
        self.tetrahedra[ngb5].swap_neighbour(usize::from(idx5), t0, 2);

        self.queue.extend([t0, t1, t2]);
    }

    /// Replace four tetrahedra sharing an edge by four sharing the
    /// perpendicular edge from the new vertex to the offending vertex.
    ///
    /// `t0` contains the new vertex at `top`, `t2` is its neighbour across
    /// the face opposite `top`, `t1` is the neighbour across `non_axis`, and
    /// `t3` closes the ring. `top1` is the slot of `t0` in `t2`.
    #[allow(clippy::too_many_arguments)]
    fn four_to_four_flip(
        &mut self,
        t0: usize,
        t1: usize,
        t2: usize,
        t3: usize,
        top: usize,
        non_axis: usize,
        top1: usize,
    ) {
        // Label the shared edge (l0, l1); l2 is t0's ring vertex, l3 the new
        // vertex, l5 the offending vertex, l4 the far ring vertex.
        let axis: SmallBuffer<usize, 2> = (0..4)
            .filter(|slot| *slot != top && *slot != non_axis)
            .collect();
        let (s0_l0, s0_l1) = if positive_permutation(axis[0], axis[1], non_axis, top) {
            (axis[0], axis[1])
        } else {
            (axis[1], axis[0])
        };
        let l0 = self.tetrahedra[t0].vertex(s0_l0);
        let l1 = self.tetrahedra[t0].vertex(s0_l1);
        let l2 = self.tetrahedra[t0].vertex(non_axis);
        let l3 = self.tetrahedra[t0].vertex(top);
        let l5 = self.tetrahedra[t2].vertex(top1);

        let find_slot = |tet: &Tetrahedron, vertex: usize| {
            tet.vertex_slot(vertex).expect("edge vertex present in ring")
        };
        let s1_l0 = find_slot(&self.tetrahedra[t1], l0);
        let s1_l1 = find_slot(&self.tetrahedra[t1], l1);
        let s1_l3 = find_slot(&self.tetrahedra[t1], l3);
        let s1_l4 = 6 - s1_l0 - s1_l1 - s1_l3;
        let l4 = self.tetrahedra[t1].vertex(s1_l4);

        let s2_l0 = find_slot(&self.tetrahedra[t2], l0);
        let s2_l1 = find_slot(&self.tetrahedra[t2], l1);
        let s3_l0 = find_slot(&self.tetrahedra[t3], l0);
        let s3_l1 = find_slot(&self.tetrahedra[t3], l1);

        // Eight outer faces, captured before the in-place rewrite.
        let grab = |this: &Self, t: usize, slot: usize| {
            (
                this.tetrahedra[t].neighbour(slot),
                this.tetrahedra[t].index_in_neighbour(slot),
            )
        };
        let (t0_opp_l0, t0_opp_l0_idx) = grab(self, t0, s0_l0);
        let (t0_opp_l1, t0_opp_l1_idx) = grab(self, t0, s0_l1);
        let (t1_opp_l0, t1_opp_l0_idx) = grab(self, t1, s1_l0);
        let (t1_opp_l1, t1_opp_l1_idx) = grab(self, t1, s1_l1);
        let (t2_opp_l0, t2_opp_l0_idx) = grab(self, t2, s2_l0);
        let (t2_opp_l1, t2_opp_l1_idx) = grab(self, t2, s2_l1);
        let (t3_opp_l0, t3_opp_l0_idx) = grab(self, t3, s3_l0);
        let (t3_opp_l1, t3_opp_l1_idx) = grab(self, t3, s3_l1);

        self.init_tetrahedron(t0, l0, l3, l5, l2);
        self.init_tetrahedron(t1, l1, l5, l3, l2);
        self.init_tetrahedron(t2, l0, l5, l3, l4);
        self.init_tetrahedron(t3, l1, l3, l5, l4);

        self.tetrahedra[t0]
            .swap_neighbours([t1, t2_opp_l1, t0_opp_l1, t2], [0, t2_opp_l1_idx, t0_opp_l1_idx, 3]);
        self.tetrahedra[t1]
            .swap_neighbours([t0, t0_opp_l0, t2_opp_l0, t3], [0, t0_opp_l0_idx, t2_opp_l0_idx, 3]);
        self.tetrahedra[t2]
            .swap_neighbours([t3, t1_opp_l1, t3_opp_l1, t0], [0, t1_opp_l1_idx, t3_opp_l1_idx, 3]);
        self.tetrahedra[t3]
            .swap_neighbours([t2, t3_opp_l0, t1_opp_l0, t1], [0, t3_opp_l0_idx, t1_opp_l0_idx, 3]);

        self.tetrahedra[t0_opp_l1].swap_neighbour(usize::from(t0_opp_l1_idx), t0, 2);
        self.tetrahedra[t0_opp_l0].swap_neighbour(usize::from(t0_opp_l0_idx), t1, 1);
        self.tetrahedra[t1_opp_l1].swap_neighbour(usize::from(t1_opp_l1_idx), t2, 1);
        self.tetrahedra[t1_opp_l0].swap_neighbour(usize::from(t1_opp_l0_idx), t3, 2);
        self.tetrahedra[t2_opp_l1].swap_neighbour(usize::from(t2_opp_l1_idx), t0, 1);
        self.tetrahedra[t2_opp_l0].swap_neighbour(usize::from(t2_opp_l0_idx), t1, 2);
        self.tetrahedra[t3_opp_l1].swap_neighbour(usize::from(t3_opp_l1_idx), t2, 2);
        self.tetrahedra[t3_opp_l0].swap_neighbour(usize::from(t3_opp_l0_idx), t3, 1);

        self.queue.extend([t0, t1, t2, t3]);
    }

    /// Replace three tetrahedra sharing an edge by two sharing a face; the
    /// third slot is deactivated and its index returned for the free stack.
    fn three_to_two_flip(&mut self, t0: usize, t1: usize, t2: usize) -> usize {
        // Find the common axis of the three tetrahedra and the slot of the
        // third common vertex of t0 and t1.
        let mut axis0: SmallBuffer<usize, 2> = SmallBuffer::new();
        let mut axis1: SmallBuffer<usize, 2> = SmallBuffer::new();
        let mut axis2: SmallBuffer<usize, 2> = SmallBuffer::new();
        let mut s0_l0 = usize::MAX;
        for slot in 0..4 {
            let vertex = self.tetrahedra[t0].vertex(slot);
            let in_t1 = self.tetrahedra[t1].vertex_slot(vertex);
            let in_t2 = self.tetrahedra[t2].vertex_slot(vertex);
            match (in_t1, in_t2) {
                (Some(s1), Some(s2)) => {
                    axis0.push(slot);
                    axis1.push(s1);
                    axis2.push(s2);
                }
                // The third vertex shared by t0 and t1 only.
                (Some(_), None) => s0_l0 = slot,
                _ => {}
            }
        }
        debug_assert_eq!(axis0.len(), 2);
        debug_assert_ne!(s0_l0, usize::MAX);
        // The remaining slot holds the vertex of t0 shared with t2 only,
        // which carries the newly inserted vertex through the flip.
        let s0_l1 = 6 - axis0[0] - axis0[1] - s0_l0;

        // Order the axis so the label tuple (l0, l1, l2, l4) is positively
        // oriented in t0.
        let (mut s0_l2, mut s0_l4) = (axis0[0], axis0[1]);
        let (mut s1_l2, mut s1_l4) = (axis1[0], axis1[1]);
        let (mut s2_l2, mut s2_l4) = (axis2[0], axis2[1]);
        if !positive_permutation(s0_l0, s0_l1, s0_l2, s0_l4) {
            std::mem::swap(&mut s0_l2, &mut s0_l4);
            std::mem::swap(&mut s1_l2, &mut s1_l4);
            std::mem::swap(&mut s2_l2, &mut s2_l4);
        }

        let s1_l3 = usize::from(self.tetrahedra[t0].index_in_neighbour(s0_l1));

        let vert = [
            self.tetrahedra[t0].vertex(s0_l0),
            self.tetrahedra[t0].vertex(s0_l1),
            self.tetrahedra[t0].vertex(s0_l2),
            self.tetrahedra[t1].vertex(s1_l3),
            self.tetrahedra[t0].vertex(s0_l4),
        ];

        let grab = |this: &Self, t: usize, slot: usize| {
            (
                this.tetrahedra[t].neighbour(slot),
                this.tetrahedra[t].index_in_neighbour(slot),
            )
        };
        let (ngb0, idx0) = grab(self, t2, s2_l4);
        let (ngb1, idx1) = grab(self, t2, s2_l2);
        let (ngb2, idx2) = grab(self, t1, s1_l2);
        let (ngb3, idx3) = grab(self, t1, s1_l4);
        let (ngb4, idx4) = grab(self, t0, s0_l4);
        let (ngb5, idx5) = grab(self, t0, s0_l2);

        self.init_tetrahedron(t0, vert[0], vert[1], vert[2], vert[3]);
        self.init_tetrahedron(t1, vert[0], vert[1], vert[3], vert[4]);
        self.tetrahedra[t2].deactivate();
        tracing::debug!(t2, "deactivated tetrahedron");

        self.tetrahedra[t0].swap_neighbours([ngb0, ngb3, t1, ngb4], [idx0, idx3, 3, idx4]);
        self.tetrahedra[t1].swap_neighbours([ngb1, ngb2, ngb5, t0], [idx1, idx2, idx5, 2]);

        self.tetrahedra[ngb0].swap_neighbour(usize::from(idx0), t0, 0);
        self.tetrahedra[ngb1].swap_neighbour(usize::from(idx1), t1, 0);
        self.tetrahedra[ngb2].swap_neighbour(usize::from(idx2), t1, 1);
        self.tetrahedra[ngb3].swap_neighbour(usize::from(idx3), t0, 1);
        self.tetrahedra[ngb4].swap_neighbour(usize::from(idx4), t0, 3);
        self.tetrahedra[ngb5].swap_neighbour(usize::from(idx5), t1, 2);

        self.queue.extend([t0, t1]);
        t2
    }

    // ------------------------------------------------------------------
    // Verification and debug output
    // ------------------------------------------------------------------

    /// Run the expensive tessellation-wide invariant sweep: reciprocity,
    /// positive orientation, the Delaunay property against every non-dummy
    /// neighbour, and vertex back-link validity.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant, described.
    pub fn verify(&mut self) -> Result<(), TessellationError> {
        for t in DUMMY_TETRAHEDRA..self.tetrahedra.len() {
            if !self.tetrahedra[t].is_active() {
                continue;
            }
            let [v0, v1, v2, v3] = self.tetrahedra[t].vertices();
            let a = self.vertices.scaled_position(v0);
            let b = self.vertices.scaled_position(v1);
            let c = self.vertices.scaled_position(v2);
            let d = self.vertices.scaled_position(v3);
            if orient3d(&mut self.scratch, &a, &b, &c, &d) != Orientation::POSITIVE {
                return Err(TessellationError::InvariantViolation {
                    message: format!(
                        "tetrahedron {t} ({v0} {v1} {v2} {v3}) is not positively oriented"
                    ),
                });
            }
            for slot in 0..4 {
                let ngb = self.tetrahedra[t].neighbour(slot);
                let reciprocal = usize::from(self.tetrahedra[t].index_in_neighbour(slot));
                if !self.tetrahedra[ngb].is_active() {
                    return Err(TessellationError::InvariantViolation {
                        message: format!("tetrahedron {t} has inactive neighbour {ngb}"),
                    });
                }
                if self.tetrahedra[ngb].neighbour(reciprocal) != t {
                    return Err(TessellationError::InvariantViolation {
                        message: format!(
                            "tetrahedron {t} slot {slot} links {ngb}, but {ngb} slot {reciprocal} does not link back"
                        ),
                    });
                }
                if usize::from(self.tetrahedra[ngb].index_in_neighbour(reciprocal)) != slot {
                    return Err(TessellationError::InvariantViolation {
                        message: format!(
                            "reciprocal index of tetrahedron {t} slot {slot} is stale in neighbour {ngb}"
                        ),
                    });
                }
                if ngb < DUMMY_TETRAHEDRA {
                    continue;
                }
                let opposite = self.tetrahedra[ngb].vertex(reciprocal);
                let e = self.vertices.scaled_position(opposite);
                if insphere(&mut self.scratch, &a, &b, &c, &d, &e) == InSphere::INSIDE {
                    return Err(TessellationError::InvariantViolation {
                        message: format!(
                            "vertex {opposite} lies inside the circumsphere of tetrahedron {t}"
                        ),
                    });
                }
            }
        }

        for v in 0..self.vertices.len() {
            let (t, slot) = self.vertices.link(v);
            if t == NO_SIMPLEX {
                continue;
            }
            if !self.tetrahedra[t].is_active() {
                return Err(TessellationError::InvariantViolation {
                    message: format!("vertex {v} links inactive tetrahedron {t}"),
                });
            }
            if self.tetrahedra[t].vertex(usize::from(slot)) != v {
                return Err(TessellationError::InvariantViolation {
                    message: format!(
                        "vertex {v} links tetrahedron {t} slot {slot}, which holds another vertex"
                    ),
                });
            }
        }
        Ok(())
    }

    /// Write the tessellation as tab-separated `V` and `T` records.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures from the writer.
    pub fn write_tessellation<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for v in 0..self.vertices.len() {
            let p = self.vertices.position(v);
            writeln!(writer, "V\t{v}\t{}\t{}\t{}", p[0], p[1], p[2])?;
        }
        for t in DUMMY_TETRAHEDRA..self.tetrahedra.len() {
            if !self.tetrahedra[t].is_active() {
                continue;
            }
            let [v0, v1, v2, v3] = self.tetrahedra[t].vertices();
            writeln!(writer, "T\t{v0}\t{v1}\t{v2}\t{v3}")?;
        }
        Ok(())
    }

    /// Dump the tessellation to a text file at `path`.
    ///
    /// # Errors
    ///
    /// Propagates file-creation and write failures.
    pub fn print_tessellation<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_tessellation(&mut writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundingBox<3> {
        BoundingBox::cube([0.0, 0.0, 0.0], 1.0)
    }

    #[test]
    fn init_builds_bounding_tetrahedron_and_dummies() {
        let d = Delaunay3d::new(&unit_box(), 4, 16, 42);
        assert_eq!(d.number_of_tetrahedra(), DUMMY_TETRAHEDRA + 1);
        let first = DUMMY_TETRAHEDRA;
        for slot in 0..4 {
            let ngb = d.tetrahedron(first).neighbour(slot);
            assert!(ngb < DUMMY_TETRAHEDRA);
            let back = usize::from(d.tetrahedron(first).index_in_neighbour(slot));
            assert_eq!(d.tetrahedron(ngb).neighbour(back), first);
        }
    }

    #[test]
    fn single_insertion_splits_bounding_tetrahedron() {
        let mut d = Delaunay3d::new(&unit_box(), 1, 16, 42);
        d.add_local_vertex(0, [0.5, 0.5, 0.5]).unwrap();
        assert_eq!(d.number_of_tetrahedra(), DUMMY_TETRAHEDRA + 4);
        d.verify().unwrap();
    }

    #[test]
    fn cube_corners_preserve_invariants() {
        let mut d = Delaunay3d::new(&unit_box(), 8, 64, 42);
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
        for (i, corner) in corners.into_iter().enumerate() {
            d.add_local_vertex(i, corner).unwrap();
            d.verify().unwrap();
        }
    }

    #[test]
    fn vertex_on_shared_face_triggers_two_to_six() {
        let mut d = Delaunay3d::new(&unit_box(), 5, 64, 42);
        // A z = 0 facet between the first three vertices: equal z
        // coordinates make the on-face orientation test exactly zero.
        d.add_local_vertex(0, [0.0, 0.0, 0.0]).unwrap();
        d.add_local_vertex(1, [1.0, 0.0, 0.0]).unwrap();
        d.add_local_vertex(2, [0.0, 1.0, 0.0]).unwrap();
        d.add_local_vertex(3, [0.25, 0.25, 1.0]).unwrap();
        d.verify().unwrap();
        // Strictly inside the triangle (0, 1, 2) and coplanar with it.
        d.add_local_vertex(4, [0.25, 0.25, 0.0]).unwrap();
        d.verify().unwrap();
    }

    #[test]
    fn vertex_on_shared_edge_triggers_n_to_2n() {
        let mut d = Delaunay3d::new(&unit_box(), 7, 128, 42);
        // An axis-aligned edge from (0.25, 0.5, 0.5) to (0.75, 0.5, 0.5),
        // surrounded by a ring of vertices; the midpoint lands exactly on
        // the edge because all three coordinates match pairwise.
        d.add_local_vertex(0, [0.25, 0.5, 0.5]).unwrap();
        d.add_local_vertex(1, [0.75, 0.5, 0.5]).unwrap();
        d.add_local_vertex(2, [0.5, 0.25, 0.5]).unwrap();
        d.add_local_vertex(3, [0.5, 0.75, 0.5]).unwrap();
        d.add_local_vertex(4, [0.5, 0.5, 0.25]).unwrap();
        d.add_local_vertex(5, [0.5, 0.5, 0.75]).unwrap();
        d.verify().unwrap();
        d.add_local_vertex(6, [0.5, 0.5, 0.5]).unwrap();
        d.verify().unwrap();
    }

    #[test]
    fn coincident_vertices_are_rejected() {
        let mut d = Delaunay3d::new(&unit_box(), 2, 16, 42);
        d.add_local_vertex(0, [0.5, 0.5, 0.5]).unwrap();
        let err = d.add_local_vertex(1, [0.5, 0.5, 0.5]).unwrap_err();
        assert!(matches!(err, TessellationError::DegenerateInput { .. }));
    }

    #[test]
    fn free_stack_reuses_slots_freed_by_flips() {
        let mut d = Delaunay3d::new(&unit_box(), 64, 256, 42);
        // Enough random-ish points to exercise 3-to-2 flips.
        let mut index = 0;
        for i in 0..4 {
            for j in 0..4 {
                for k in 0..4 {
                    let p = [
                        0.125 + 0.25 * f64::from(i) + 0.01 * f64::from(j + k),
                        0.125 + 0.25 * f64::from(j) + 0.013 * f64::from(i),
                        0.125 + 0.25 * f64::from(k) + 0.017 * f64::from(j),
                    ];
                    d.add_local_vertex(index, p).unwrap();
                    index += 1;
                }
            }
        }
        d.verify().unwrap();
        // No active tetrahedron may reference an inactive slot; verify()
        // checks that, so it suffices that the sweep passed with inactive
        // slots present in the array.
        let active = (DUMMY_TETRAHEDRA..d.number_of_tetrahedra())
            .filter(|&t| d.tetrahedron(t).is_active())
            .count();
        assert!(active >= 4);
    }

    #[test]
    fn ghosts_require_consolidation() {
        let mut d = Delaunay3d::new(&unit_box(), 1, 16, 42);
        d.add_local_vertex(0, [0.5, 0.5, 0.5]).unwrap();
        assert!(matches!(
            d.add_ghost_vertex([0.9, 0.9, 0.9]),
            Err(TessellationError::NotConsolidated)
        ));
        d.consolidate().unwrap();
        let ghost = d.add_ghost_vertex([0.9, 0.9, 0.9]).unwrap();
        assert!(d.vertices().is_ghost(ghost));
        d.verify().unwrap();
    }

    #[test]
    fn search_radius_is_infinite_for_lonely_generator() {
        let mut d = Delaunay3d::new(&unit_box(), 1, 16, 42);
        d.add_local_vertex(0, [0.5, 0.5, 0.5]).unwrap();
        d.consolidate().unwrap();
        assert!(d.search_radius(0).is_infinite());
        assert_eq!(d.update_search_radii(1e300), 1);
    }
}
