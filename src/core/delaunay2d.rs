//! Incremental 2D Delaunay tessellation.
//!
//! The tessellation is built one vertex at a time. Each insertion locates the
//! triangle containing the new vertex by walking from the last touched
//! triangle, splits it (1-to-3, or 2-to-4 when the vertex lands exactly on an
//! edge), and then restores the Delaunay property with a cascade of edge
//! flips driven by a LIFO queue.
//!
//! All topological decisions run on exact integer predicates over the
//! rescaled mantissa coordinates, so the walk and the flip cascade cannot be
//! derailed by floating-point inconsistencies.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::errors::TessellationError;
use crate::core::simplex::{Triangle, INVALID_VERTEX};
use crate::core::stats::LocateStatistics;
use crate::core::vertex::{VertexStore, NO_SIMPLEX};
use crate::core::voronoi2d::Voronoi2d;
use crate::geometry::bounds::{BoundingBox, ScaledBox};
use crate::geometry::exact::ExactScratch;
use crate::geometry::predicates::{incircle, orient2d, InSphere, Orientation};
use crate::geometry::util::circumradius_2d;

/// Number of dummy border triangles; they occupy ids `0..DUMMY_TRIANGLES`.
pub const DUMMY_TRIANGLES: usize = 3;

/// Ratio of the padded bounding-simplex box to the largest host box side.
const BOX_PADDING: f64 = 6.0;

/// Outcome of testing one triangle during point location.
enum Locate {
    /// Strictly inside the triangle.
    Inside,
    /// Exactly on the edge opposite the given slot.
    OnEdge(usize),
    /// Outside; continue the walk at this triangle.
    Step(usize),
}

/// Incremental 2D Delaunay tessellation with exact predicates.
#[derive(Debug)]
pub struct Delaunay2d {
    scaled: ScaledBox<2>,
    vertices: VertexStore<2>,
    triangles: Vec<Triangle>,
    /// LIFO queue of triangles whose Delaunay property needs re-checking.
    queue: Vec<usize>,
    /// Starting guess for the next point-location walk.
    last_triangle: usize,
    scratch: ExactScratch,
    rng: StdRng,
    stats: LocateStatistics,
}

impl Delaunay2d {
    /// Set up the bounding simplex and its dummy border.
    ///
    /// `local_count` local generators are pre-reserved at indices
    /// `0..local_count` and must all be supplied through
    /// [`add_local_vertex`](Self::add_local_vertex) before
    /// [`consolidate`](Self::consolidate). `triangle_capacity` is a hint for
    /// the simplex array; `seed` drives the tie-break coin flip in point
    /// location, so runs with equal input and equal seed are topologically
    /// identical.
    #[must_use]
    pub fn new(bounds: &BoundingBox<2>, local_count: usize, triangle_capacity: usize, seed: u64) -> Self {
        let scaled = ScaledBox::new(bounds, BOX_PADDING);
        let mut vertices = VertexStore::with_local_block(local_count);

        let anchor = scaled.anchor();
        let side = scaled.side();
        let corners = [
            anchor,
            [anchor[0] + side, anchor[1]],
            [anchor[0], anchor[1] + side],
        ];
        let mut aux = [0_usize; 3];
        for (i, corner) in corners.into_iter().enumerate() {
            aux[i] = vertices
                .push_vertex(&scaled, corner)
                .expect("bounding-simplex corners lie inside the padded box");
        }
        let [v0, v1, v2] = aux;

        let mut triangles = Vec::with_capacity(triangle_capacity.max(DUMMY_TRIANGLES + 1));
        // Dummy border triangles with an invalid tip; their only valid face
        // is the one shared with the bounding triangle.
        triangles.push(Triangle::new(v1, v0, INVALID_VERTEX));
        triangles.push(Triangle::new(v2, v1, INVALID_VERTEX));
        triangles.push(Triangle::new(v0, v2, INVALID_VERTEX));
        let first = triangles.len();
        triangles.push(Triangle::new(v0, v1, v2));

        triangles[0].swap_neighbour(2, first, 2);
        triangles[1].swap_neighbour(2, first, 0);
        triangles[2].swap_neighbour(2, first, 1);
        triangles[first].swap_neighbour(0, 1, 2);
        triangles[first].swap_neighbour(1, 2, 2);
        triangles[first].swap_neighbour(2, 0, 2);

        vertices.set_link(v0, first, 0);
        vertices.set_link(v1, first, 1);
        vertices.set_link(v2, first, 2);

        Self {
            scaled,
            vertices,
            triangles,
            queue: Vec::new(),
            last_triangle: first,
            scratch: ExactScratch::new(),
            rng: StdRng::seed_from_u64(seed),
            stats: LocateStatistics::default(),
        }
    }

    /// Insert a local generator at its pre-reserved index.
    ///
    /// # Errors
    ///
    /// Fails when the index is outside the reserved block, the tessellation
    /// is already consolidated, the position falls outside the padded box,
    /// or the input is degenerate (coincident points).
    pub fn add_local_vertex(
        &mut self,
        index: usize,
        position: [f64; 2],
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
    /// Fails before [`consolidate`](Self::consolidate), outside the padded
    /// box, or on degenerate input.
    pub fn add_ghost_vertex(&mut self, position: [f64; 2]) -> Result<usize, TessellationError> {
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

    /// Twice the largest circumradius among the triangles incident to the
    /// local vertex `v`, or infinity when the one-ring reaches the dummy
    /// border (the cell is still open towards the hull).
    #[must_use]
    pub fn search_radius(&self, v: usize) -> f64 {
        let (t0, slot0) = self.vertices.link(v);
        if t0 == NO_SIMPLEX {
            return f64::INFINITY;
        }
        let mut radius = 2.0 * self.triangle_circumradius(t0);
        let start_slot = (usize::from(slot0) + 1) % 3;
        let mut t = self.triangles[t0].neighbour(start_slot);
        let mut slot = usize::from(self.triangles[t0].index_in_neighbour(start_slot));
        while t != t0 {
            if t < DUMMY_TRIANGLES {
                return f64::INFINITY;
            }
            radius = radius.max(2.0 * self.triangle_circumradius(t));
            let exit = (slot + 2) % 3;
            slot = usize::from(self.triangles[t].index_in_neighbour(exit));
            t = self.triangles[t].neighbour(exit);
        }
        radius
    }

    /// Refresh the search radii of all local vertices whose stored radius
    /// exceeds `r`; returns how many still exceed `r` afterwards.
    ///
    /// Hosts iterate: import ghosts within `r`, call this, grow `r` while the
    /// count is non-zero.
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
    pub fn build_voronoi(&self) -> Result<Voronoi2d, crate::core::errors::VoronoiError> {
        Voronoi2d::build(self)
    }

    /// The vertex store.
    #[must_use]
    pub fn vertices(&self) -> &VertexStore<2> {
        &self.vertices
    }

    /// The triangle with id `t`.
    #[must_use]
    pub fn triangle(&self, t: usize) -> &Triangle {
        &self.triangles[t]
    }

    /// Total number of triangles, dummies included.
    #[must_use]
    pub fn number_of_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Point-location counters accumulated so far.
    #[must_use]
    pub fn locate_statistics(&self) -> LocateStatistics {
        self.stats
    }

    /// Circumradius of triangle `t` in host coordinates.
    #[must_use]
    pub fn triangle_circumradius(&self, t: usize) -> f64 {
        let [v0, v1, v2] = self.triangles[t].vertices();
        circumradius_2d(
            self.vertices.position(v0),
            self.vertices.position(v1),
            self.vertices.position(v2),
        )
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    fn insert_vertex(&mut self, v: usize) -> Result<(), TessellationError> {
        let mut t = self.last_triangle;
        let mut steps = 0_u64;
        let limit = self.triangles.len() as u64 + 1;
        let (containing, on_edge) = loop {
            steps += 1;
            if steps > limit {
                return Err(TessellationError::WalkDidNotConverge { vertex: v });
            }
            match self.test_vertex_in_triangle(v, t)? {
                Locate::Inside => break (t, None),
                Locate::OnEdge(slot) => break (t, Some(slot)),
                Locate::Step(next) => {
                    if next < DUMMY_TRIANGLES {
                        return Err(TessellationError::OutsideBoundingSimplex { vertex: v });
                    }
                    t = next;
                }
            }
        };
        self.stats.insertions += 1;
        self.stats.walk_steps += steps;

        match on_edge {
            None => self.one_to_three_flip(v, containing),
            Some(slot) => self.two_to_four_flip(v, containing, slot),
        }
        self.check_triangles(v);
        Ok(())
    }

    /// Exact location test of vertex `v` against triangle `t`.
    ///
    /// The consistency of the exact tests is what keeps the walk from
    /// cycling: when `v` is close to the edge between two triangles, both
    /// triangles agree on which side it lies.
    fn test_vertex_in_triangle(&mut self, v: usize, t: usize) -> Result<Locate, TessellationError> {
        debug_assert!(t >= DUMMY_TRIANGLES);
        let [vt0, vt1, vt2] = self.triangles[t].vertices();
        let a = self.vertices.scaled_position(v);
        let b = self.vertices.scaled_position(vt0);
        let c = self.vertices.scaled_position(vt1);
        let d = self.vertices.scaled_position(vt2);

        // One test per edge, ordered by the opposite-vertex slot.
        let tests = [
            orient2d(&c, &d, &a),
            orient2d(&d, &b, &a),
            orient2d(&b, &c, &a),
        ];

        let mut negatives: [usize; 3] = [0; 3];
        let mut negative_count = 0;
        let mut zeros: [usize; 3] = [0; 3];
        let mut zero_count = 0;
        for (slot, test) in tests.iter().enumerate() {
            match test {
                Orientation::NEGATIVE => {
                    negatives[negative_count] = slot;
                    negative_count += 1;
                }
                Orientation::DEGENERATE => {
                    zeros[zero_count] = slot;
                    zero_count += 1;
                }
                Orientation::POSITIVE => {}
            }
        }

        match (negative_count, zero_count) {
            // Strictly inside, or exactly on one edge.
            (0, 0) => Ok(Locate::Inside),
            (0, 1) => Ok(Locate::OnEdge(zeros[0])),
            // Outside: step across a negative face; when two faces qualify an
            // unbiased coin flip prevents cycling between nearly-degenerate
            // neighbours.
            (1, _) => Ok(Locate::Step(self.triangles[t].neighbour(negatives[0]))),
            (2, _) => {
                let first = self.triangles[t].neighbour(negatives[0]);
                let second = self.triangles[t].neighbour(negatives[1]);
                Ok(Locate::Step(self.choose(first, second)))
            }
            // Two or three zeros means the vertex coincides with a triangle
            // vertex; three negatives cannot happen for a positively
            // oriented triangle.
            _ => Err(TessellationError::DegenerateInput {
                vertex: v,
                message: format!(
                    "location test against triangle {t} returned {negative_count} negative and {zero_count} zero orientations"
                ),
            }),
        }
    }

    fn choose(&mut self, first: usize, second: usize) -> usize {
        if self.rng.random::<bool>() {
            first
        } else {
            second
        }
    }

    /// Split triangle `t0` into three by connecting its vertices to `v`.
    ///
    /// All new triangles keep `v` as their last vertex, which is what the
    /// queue checks rely on.
    fn one_to_three_flip(&mut self, v: usize, t0: usize) {
        let [tv0, tv1, tv2] = self.triangles[t0].vertices();
        let ngb0 = self.triangles[t0].neighbour(0);
        let ngb1 = self.triangles[t0].neighbour(1);
        let ngb2 = self.triangles[t0].neighbour(2);
        let ngbi0 = self.triangles[t0].index_in_neighbour(0);
        let ngbi1 = self.triangles[t0].index_in_neighbour(1);
        let ngbi2 = self.triangles[t0].index_in_neighbour(2);

        let t1 = self.new_triangle();
        let t2 = self.new_triangle();

        tracing::trace!(t0, t1, t2, vertex = v, "1-to-3 split");

        self.triangles[t0] = Triangle::new(tv0, tv1, v);
        self.triangles[t0].swap_neighbour(0, t1, 1);
        self.triangles[t0].swap_neighbour(1, t2, 0);
        self.triangles[t0].swap_neighbour(2, ngb2, ngbi2);
        self.triangles[ngb2].swap_neighbour(usize::from(ngbi2), t0, 2);

        self.triangles[t1] = Triangle::new(tv1, tv2, v);
        self.triangles[t1].swap_neighbour(0, t2, 1);
        self.triangles[t1].swap_neighbour(1, t0, 0);
        self.triangles[t1].swap_neighbour(2, ngb0, ngbi0);
        self.triangles[ngb0].swap_neighbour(usize::from(ngbi0), t1, 2);

        self.triangles[t2] = Triangle::new(tv2, tv0, v);
        self.triangles[t2].swap_neighbour(0, t0, 1);
        self.triangles[t2].swap_neighbour(1, t1, 0);
        self.triangles[t2].swap_neighbour(2, ngb1, ngbi1);
        self.triangles[ngb1].swap_neighbour(usize::from(ngbi1), t2, 2);

        self.vertices.set_link(tv0, t0, 0);
        self.vertices.set_link(tv1, t1, 0);
        self.vertices.set_link(tv2, t2, 0);
        self.vertices.set_link(v, t2, 2);

        self.queue.push(t0);
        self.queue.push(t1);
        self.queue.push(t2);
        self.last_triangle = t2;
    }

    /// The vertex lies exactly on the edge opposite `edge_slot` of `t0`:
    /// split `t0` and the neighbour across that edge into four triangles.
    fn two_to_four_flip(&mut self, v: usize, t0: usize, edge_slot: usize) {
        let t1 = self.triangles[t0].neighbour(edge_slot);
        debug_assert!(t1 >= DUMMY_TRIANGLES);

        let i0_1 = (edge_slot + 1) % 3;
        let i0_2 = (edge_slot + 2) % 3;

        let vt0_0 = self.triangles[t0].vertex(edge_slot);
        let vt0_1 = self.triangles[t0].vertex(i0_1);
        let vt0_2 = self.triangles[t0].vertex(i0_2);

        let i1_0 = usize::from(self.triangles[t0].index_in_neighbour(edge_slot));
        let i1_1 = (i1_0 + 1) % 3;
        let i1_2 = (i1_0 + 2) % 3;
        debug_assert_eq!(self.triangles[t1].vertex(i1_1), vt0_2);
        debug_assert_eq!(self.triangles[t1].vertex(i1_2), vt0_1);
        let vt1_0 = self.triangles[t1].vertex(i1_0);

        let ngb0_1 = self.triangles[t0].neighbour(i0_1);
        let ngbi0_1 = self.triangles[t0].index_in_neighbour(i0_1);
        let ngb0_2 = self.triangles[t0].neighbour(i0_2);
        let ngbi0_2 = self.triangles[t0].index_in_neighbour(i0_2);

        let ngb1_1 = self.triangles[t1].neighbour(i1_1);
        let ngbi1_1 = self.triangles[t1].index_in_neighbour(i1_1);
        let ngb1_2 = self.triangles[t1].neighbour(i1_2);
        let ngbi1_2 = self.triangles[t1].index_in_neighbour(i1_2);

        let t2 = self.new_triangle();
        let t3 = self.new_triangle();

        tracing::trace!(t0, t1, t2, t3, vertex = v, "2-to-4 split on shared edge");

        self.triangles[t0] = Triangle::new(vt0_0, vt0_1, v);
        self.triangles[t0].swap_neighbour(0, t2, 1);
        self.triangles[t0].swap_neighbour(1, t1, 0);
        self.triangles[t0].swap_neighbour(2, ngb0_2, ngbi0_2);
        self.triangles[ngb0_2].swap_neighbour(usize::from(ngbi0_2), t0, 2);

        self.triangles[t1] = Triangle::new(vt0_2, vt0_0, v);
        self.triangles[t1].swap_neighbour(0, t0, 1);
        self.triangles[t1].swap_neighbour(1, t3, 0);
        self.triangles[t1].swap_neighbour(2, ngb0_1, ngbi0_1);
        self.triangles[ngb0_1].swap_neighbour(usize::from(ngbi0_1), t1, 2);

        self.triangles[t2] = Triangle::new(vt0_1, vt1_0, v);
        self.triangles[t2].swap_neighbour(0, t3, 1);
        self.triangles[t2].swap_neighbour(1, t0, 0);
        self.triangles[t2].swap_neighbour(2, ngb1_1, ngbi1_1);
        self.triangles[ngb1_1].swap_neighbour(usize::from(ngbi1_1), t2, 2);

        self.triangles[t3] = Triangle::new(vt1_0, vt0_2, v);
        self.triangles[t3].swap_neighbour(0, t1, 1);
        self.triangles[t3].swap_neighbour(1, t2, 0);
        self.triangles[t3].swap_neighbour(2, ngb1_2, ngbi1_2);
        self.triangles[ngb1_2].swap_neighbour(usize::from(ngbi1_2), t3, 2);

        self.vertices.set_link(vt0_0, t0, 0);
        self.vertices.set_link(vt0_1, t0, 1);
        self.vertices.set_link(vt0_2, t1, 0);
        self.vertices.set_link(vt1_0, t2, 1);
        self.vertices.set_link(v, t0, 2);

        self.queue.push(t0);
        self.queue.push(t1);
        self.queue.push(t2);
        self.queue.push(t3);
        self.last_triangle = t3;
    }

    /// Drain the to-check queue, flipping edges until the Delaunay property
    /// holds everywhere around the newly inserted vertex.
    fn check_triangles(&mut self, v: usize) {
        while let Some(t) = self.queue.pop() {
            self.check_triangle(t, v);
        }
    }

    /// Test the circumcircle of `t` against the opposite vertex of the
    /// neighbour across the face opposite the newly inserted vertex (slot 2
    /// by the insertion convention), and flip the shared edge if it fails.
    fn check_triangle(&mut self, t: usize, v: usize) {
        let t2 = self.triangles[t].neighbour(2);
        if t2 < DUMMY_TRIANGLES {
            // Dummies carry no circumcircle.
            return;
        }

        let [vt1_0, vt1_1, vt1_2] = self.triangles[t].vertices();
        debug_assert_eq!(vt1_2, v);
        let i0 = usize::from(self.triangles[t].index_in_neighbour(2));
        let vt2_0 = self.triangles[t2].vertex(i0);

        let a = self.vertices.scaled_position(vt1_0);
        let b = self.vertices.scaled_position(vt1_1);
        let c = self.vertices.scaled_position(vt1_2);
        let d = self.vertices.scaled_position(vt2_0);

        if incircle(&mut self.scratch, &a, &b, &c, &d) != InSphere::INSIDE {
            return;
        }

        tracing::debug!(t, neighbour = t2, vertex = v, "edge flip");

        let i1 = (i0 + 1) % 3;
        let i2 = (i0 + 2) % 3;
        debug_assert_eq!(self.triangles[t2].vertex(i1), vt1_1);
        debug_assert_eq!(self.triangles[t2].vertex(i2), vt1_0);

        let ngb0 = self.triangles[t].neighbour(1);
        let ngbi0 = self.triangles[t].index_in_neighbour(1);
        let ngb1 = self.triangles[t].neighbour(0);
        let ngbi1 = self.triangles[t].index_in_neighbour(0);
        let ngb2 = self.triangles[t2].neighbour(i2);
        let ngbi2 = self.triangles[t2].index_in_neighbour(i2);
        let ngb3 = self.triangles[t2].neighbour(i1);
        let ngbi3 = self.triangles[t2].index_in_neighbour(i1);

        // Replace the shared edge with the other diagonal; the new vertex
        // stays in the last slot of both triangles.
        self.triangles[t] = Triangle::new(vt1_0, vt2_0, vt1_2);
        self.triangles[t].swap_neighbour(0, t2, 1);
        self.triangles[t].swap_neighbour(1, ngb0, ngbi0);
        self.triangles[ngb0].swap_neighbour(usize::from(ngbi0), t, 1);
        self.triangles[t].swap_neighbour(2, ngb3, ngbi3);
        self.triangles[ngb3].swap_neighbour(usize::from(ngbi3), t, 2);

        self.triangles[t2] = Triangle::new(vt2_0, vt1_1, vt1_2);
        self.triangles[t2].swap_neighbour(0, ngb1, ngbi1);
        self.triangles[ngb1].swap_neighbour(usize::from(ngbi1), t2, 0);
        self.triangles[t2].swap_neighbour(1, t, 0);
        self.triangles[t2].swap_neighbour(2, ngb2, ngbi2);
        self.triangles[ngb2].swap_neighbour(usize::from(ngbi2), t2, 2);

        self.vertices.set_link(vt1_0, t, 0);
        self.vertices.set_link(vt1_1, t2, 1);
        self.vertices.set_link(vt1_2, t2, 2);
        self.vertices.set_link(vt2_0, t2, 0);

        self.queue.push(t);
        self.queue.push(t2);
        self.last_triangle = t2;
    }

    fn new_triangle(&mut self) -> usize {
        self.triangles.push(Triangle::new(
            INVALID_VERTEX,
            INVALID_VERTEX,
            INVALID_VERTEX,
        ));
        self.triangles.len() - 1
    }

    // ------------------------------------------------------------------
    // Verification and debug output
    // ------------------------------------------------------------------

    /// Run the expensive tessellation-wide invariant sweep: reciprocity of
    /// all neighbour links, positive orientation, the Delaunay property
    /// against every non-dummy neighbour, and vertex back-link validity.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant, described.
    pub fn verify(&mut self) -> Result<(), TessellationError> {
        for t in DUMMY_TRIANGLES..self.triangles.len() {
            let [v0, v1, v2] = self.triangles[t].vertices();
            let a = self.vertices.scaled_position(v0);
            let b = self.vertices.scaled_position(v1);
            let c = self.vertices.scaled_position(v2);
            if orient2d(&a, &b, &c) != Orientation::POSITIVE {
                return Err(TessellationError::InvariantViolation {
                    message: format!("triangle {t} ({v0} {v1} {v2}) is not positively oriented"),
                });
            }
            for slot in 0..3 {
                let ngb = self.triangles[t].neighbour(slot);
                let reciprocal = usize::from(self.triangles[t].index_in_neighbour(slot));
                if self.triangles[ngb].neighbour(reciprocal) != t {
                    return Err(TessellationError::InvariantViolation {
                        message: format!(
                            "triangle {t} slot {slot} links {ngb}, but {ngb} slot {reciprocal} does not link back"
                        ),
                    });
                }
                if usize::from(self.triangles[ngb].index_in_neighbour(reciprocal)) != slot {
                    return Err(TessellationError::InvariantViolation {
                        message: format!(
                            "reciprocal index of triangle {t} slot {slot} is stale in neighbour {ngb}"
                        ),
                    });
                }
                if ngb < DUMMY_TRIANGLES {
                    continue;
                }
                let opposite = self.triangles[ngb].vertex(reciprocal);
                let d = self.vertices.scaled_position(opposite);
                if incircle(&mut self.scratch, &a, &b, &c, &d) == InSphere::INSIDE {
                    return Err(TessellationError::InvariantViolation {
                        message: format!(
                            "vertex {opposite} lies inside the circumcircle of triangle {t}"
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
            if self.triangles[t].vertex(usize::from(slot)) != v {
                return Err(TessellationError::InvariantViolation {
                    message: format!("vertex {v} links triangle {t} slot {slot}, which holds another vertex"),
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
            writeln!(writer, "V\t{v}\t{}\t{}", p[0], p[1])?;
        }
        for t in DUMMY_TRIANGLES..self.triangles.len() {
            let [v0, v1, v2] = self.triangles[t].vertices();
            writeln!(writer, "T\t{v0}\t{v1}\t{v2}")?;
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

    fn unit_box() -> BoundingBox<2> {
        BoundingBox::cube([0.0, 0.0], 1.0)
    }

    #[test]
    fn init_builds_bounding_triangle_and_dummies() {
        let d = Delaunay2d::new(&unit_box(), 4, 16, 42);
        assert_eq!(d.number_of_triangles(), DUMMY_TRIANGLES + 1);
        // The bounding triangle is wired to the three dummies reciprocally.
        let first = DUMMY_TRIANGLES;
        for slot in 0..3 {
            let ngb = d.triangle(first).neighbour(slot);
            assert!(ngb < DUMMY_TRIANGLES);
            let back = usize::from(d.triangle(first).index_in_neighbour(slot));
            assert_eq!(d.triangle(ngb).neighbour(back), first);
        }
    }

    #[test]
    fn single_insertion_splits_bounding_triangle() {
        let mut d = Delaunay2d::new(&unit_box(), 1, 16, 42);
        d.add_local_vertex(0, [0.5, 0.5]).unwrap();
        assert_eq!(d.number_of_triangles(), DUMMY_TRIANGLES + 3);
        d.verify().unwrap();
    }

    #[test]
    fn grid_insertions_preserve_invariants() {
        let mut d = Delaunay2d::new(&unit_box(), 16, 64, 7);
        let mut index = 0;
        for i in 0..4 {
            for j in 0..4 {
                let p = [0.125 + 0.25 * f64::from(i), 0.125 + 0.25 * f64::from(j)];
                d.add_local_vertex(index, p).unwrap();
                index += 1;
            }
        }
        d.verify().unwrap();
        d.consolidate().unwrap();
        assert_eq!(d.vertices().ghost_offset(), Some(16 + 3));
    }

    #[test]
    fn coincident_vertices_are_rejected() {
        let mut d = Delaunay2d::new(&unit_box(), 2, 16, 42);
        d.add_local_vertex(0, [0.5, 0.5]).unwrap();
        let err = d.add_local_vertex(1, [0.5, 0.5]).unwrap_err();
        assert!(matches!(err, TessellationError::DegenerateInput { .. }));
    }

    #[test]
    fn vertex_on_shared_edge_triggers_two_to_four() {
        let mut d = Delaunay2d::new(&unit_box(), 3, 32, 42);
        // An axis-aligned shared edge: equal y coordinates rescale to equal
        // mantissas, so the on-edge orientation test is exactly zero.
        d.add_local_vertex(0, [0.25, 0.5]).unwrap();
        d.add_local_vertex(1, [0.75, 0.5]).unwrap();
        d.add_local_vertex(2, [0.5, 0.5]).unwrap();
        d.verify().unwrap();
    }

    #[test]
    fn ghosts_require_consolidation() {
        let mut d = Delaunay2d::new(&unit_box(), 1, 16, 42);
        d.add_local_vertex(0, [0.5, 0.5]).unwrap();
        assert!(matches!(
            d.add_ghost_vertex([0.9, 0.9]),
            Err(TessellationError::NotConsolidated)
        ));
        d.consolidate().unwrap();
        let ghost = d.add_ghost_vertex([0.9, 0.9]).unwrap();
        assert!(d.vertices().is_ghost(ghost));
        d.verify().unwrap();
    }

    #[test]
    fn search_radius_shrinks_with_ghost_coverage() {
        let mut d = Delaunay2d::new(&unit_box(), 1, 32, 42);
        d.add_local_vertex(0, [0.5, 0.5]).unwrap();
        d.consolidate().unwrap();
        // One lonely generator: its ring touches the bounding triangle.
        assert!(d.search_radius(0).is_infinite());

        for ghost in [
            [0.5, -0.5],
            [1.5, 0.5],
            [0.5, 1.5],
            [-0.5, 0.5],
            [-0.5, -0.5],
            [1.5, -0.5],
            [1.5, 1.5],
            [-0.5, 1.5],
        ] {
            d.add_ghost_vertex(ghost).unwrap();
        }
        let radius = d.search_radius(0);
        assert!(radius.is_finite());
        assert_eq!(d.update_search_radii(radius + 1e-12), 0);
    }

    #[test]
    fn walk_statistics_accumulate() {
        let mut d = Delaunay2d::new(&unit_box(), 2, 16, 42);
        d.add_local_vertex(0, [0.25, 0.5]).unwrap();
        d.add_local_vertex(1, [0.75, 0.5]).unwrap();
        let stats = d.locate_statistics();
        assert_eq!(stats.insertions, 2);
        assert!(stats.walk_steps >= 2);
        assert!(stats.average_walk_length() >= 1.0);
    }
}
