//! 3D Delaunay-to-Voronoi conversion.
//!
//! The dual grid vertices are the circumcenters of the Delaunay tetrahedra.
//! For each local generator the builder walks every incident Delaunay edge:
//! the face separating the generator from an edge neighbour is bounded by
//! the circumcenters of exactly the tetrahedra incident to that edge,
//! enumerated by rotating around it through the neighbour links. A FIFO of
//! `(tetrahedron, edge vertex, edge slot)` entries discovers all edges of a
//! cell; a visited flag per vertex keeps each edge from being processed
//! twice.
//!
//! Cell volumes and centroids accumulate from the fan of tetrahedra spanned
//! by the generator and each face polygon.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::delaunay3d::{Delaunay3d, DUMMY_TETRAHEDRA};
use crate::core::errors::VoronoiError;
use crate::core::vertex::NO_SIMPLEX;
use crate::core::voronoi::{VoronoiCell, VoronoiFace, SID_BOUNDARY, SID_INTERIOR};
use crate::geometry::util::{circumcenter_3d, polygon_area_centroid_3d, tetrahedron_volume_centroid};

/// The 3D Voronoi grid: one cell per local generator plus the face buckets.
#[derive(Clone, Debug)]
pub struct Voronoi3d {
    cells: Vec<VoronoiCell<3>>,
    faces: [Vec<VoronoiFace<3>>; 2],
}

impl Voronoi3d {
    /// Derive the Voronoi grid from a consolidated tessellation.
    ///
    /// # Errors
    ///
    /// Fails when the tessellation is not consolidated, a local generator
    /// was never inserted, or a cell touches the bounding simplex
    /// (insufficient ghost coverage, or an empty neighbouring region).
    pub fn build(delaunay: &Delaunay3d) -> Result<Self, VoronoiError> {
        let vertices = delaunay.vertices();
        let Some(ghost_offset) = vertices.ghost_offset() else {
            return Err(VoronoiError::NotConsolidated);
        };
        let number_of_cells = vertices.vertex_end();

        // Circumcenters of every tetrahedron that touches a local vertex;
        // those are the only dual vertices any local cell can use. A
        // relevant tetrahedron with an auxiliary corner means some local
        // cell is not closed.
        let mut circumcenters: Vec<Option<[f64; 3]>> =
            vec![None; delaunay.number_of_tetrahedra()];
        for t in DUMMY_TETRAHEDRA..delaunay.number_of_tetrahedra() {
            let tet = delaunay.tetrahedron(t);
            if !tet.is_active() {
                continue;
            }
            let ids = tet.vertices();
            let Some(&local) = ids.iter().find(|&&v| v < number_of_cells) else {
                continue;
            };
            for &v in &ids {
                if v >= vertices.vertex_end() && v < ghost_offset {
                    return Err(VoronoiError::UnboundedCell { generator: local });
                }
            }
            circumcenters[t] = Some(circumcenter_3d(
                vertices.position(ids[0]),
                vertices.position(ids[1]),
                vertices.position(ids[2]),
                vertices.position(ids[3]),
            ));
        }
        let center_of = |t: usize, generator: usize| {
            circumcenters[t].ok_or(VoronoiError::UnboundedCell { generator })
        };

        let mut cells = Vec::with_capacity(number_of_cells);
        let mut faces: [Vec<VoronoiFace<3>>; 2] = [Vec::new(), Vec::new()];

        // Scratch reused across generators: the edge FIFO, the per-vertex
        // visited flags with their undo list, and the face polygon buffer.
        let mut edge_queue: VecDeque<(usize, usize, usize)> = VecDeque::new();
        let mut visited = vec![false; vertices.len()];
        let mut touched: Vec<usize> = Vec::new();
        let mut polygon: Vec<[f64; 3]> = Vec::new();

        for generator in 0..number_of_cells {
            let (start, generator_slot) = vertices.link(generator);
            if start == NO_SIMPLEX {
                return Err(VoronoiError::MissingVertexLink { generator });
            }

            let position = vertices.position(generator);
            let mut volume = 0.0;
            let mut weighted = [0.0_f64; 3];
            let mut face_count = 0;

            edge_queue.clear();
            visited[generator] = true;
            touched.push(generator);

            // Seed the edge discovery with an arbitrary other vertex of the
            // linked tetrahedron.
            let seed_slot = (usize::from(generator_slot) + 1) % 4;
            let seed_vertex = delaunay.tetrahedron(start).vertex(seed_slot);
            edge_queue.push_back((start, seed_vertex, seed_slot));
            visited[seed_vertex] = true;
            touched.push(seed_vertex);

            while let Some((first_t, axis_vertex, axis_slot)) = edge_queue.pop_front() {
                face_count += 1;

                // A third vertex of the starting tetrahedron, neither the
                // generator nor the edge vertex, fixes the rotation plane.
                let mut non_axis_slot = (axis_slot + 1) % 4;
                if delaunay.tetrahedron(first_t).vertex(non_axis_slot) == generator {
                    non_axis_slot = (non_axis_slot + 1) % 4;
                }
                let non_axis_vertex = delaunay.tetrahedron(first_t).vertex(non_axis_slot);
                if !visited[non_axis_vertex] {
                    edge_queue.push_back((first_t, non_axis_vertex, non_axis_slot));
                    visited[non_axis_vertex] = true;
                    touched.push(non_axis_vertex);
                }

                polygon.clear();
                polygon.push(center_of(first_t, generator)?);

                // Rotate around the edge (generator, axis_vertex); every
                // tetrahedron passed contributes its circumcenter, and every
                // third vertex seen is a future edge of this cell.
                let mut cur_t = delaunay.tetrahedron(first_t).neighbour(non_axis_slot);
                let mut entry_slot =
                    usize::from(delaunay.tetrahedron(first_t).index_in_neighbour(non_axis_slot));
                loop {
                    let tet = delaunay.tetrahedron(cur_t);
                    let mut exit_slot = (entry_slot + 1) % 4;
                    while tet.vertex(exit_slot) == generator || tet.vertex(exit_slot) == axis_vertex
                    {
                        exit_slot = (exit_slot + 1) % 4;
                    }
                    let next_t = tet.neighbour(exit_slot);

                    let third_vertex = tet.vertex(exit_slot);
                    if !visited[third_vertex] {
                        edge_queue.push_back((cur_t, third_vertex, exit_slot));
                        visited[third_vertex] = true;
                        touched.push(third_vertex);
                    }

                    polygon.push(center_of(cur_t, generator)?);

                    entry_slot = usize::from(tet.index_in_neighbour(exit_slot));
                    cur_t = next_t;
                    if cur_t == first_t {
                        break;
                    }
                }

                // Fan decomposition: one tetrahedron per polygon edge beyond
                // the first two vertices.
                for i in 1..polygon.len() - 1 {
                    let (v, centroid) = tetrahedron_volume_centroid(
                        position,
                        polygon[0],
                        polygon[i],
                        polygon[i + 1],
                    );
                    volume += v;
                    weighted[0] += v * centroid[0];
                    weighted[1] += v * centroid[1];
                    weighted[2] += v * centroid[2];
                }

                if axis_vertex < number_of_cells {
                    // Interior faces are stored once, under the
                    // lower-indexed generator.
                    if generator < axis_vertex {
                        faces[SID_INTERIOR].push(Self::face(generator, axis_vertex, &polygon));
                    }
                } else {
                    debug_assert!(axis_vertex >= ghost_offset);
                    faces[SID_BOUNDARY].push(Self::face(generator, axis_vertex, &polygon));
                }
            }

            let centroid = if volume != 0.0 {
                [
                    weighted[0] / volume,
                    weighted[1] / volume,
                    weighted[2] / volume,
                ]
            } else {
                position
            };
            cells.push(VoronoiCell {
                generator: position,
                centroid,
                volume: volume.abs(),
                face_count,
            });

            for &v in &touched {
                visited[v] = false;
            }
            touched.clear();
        }

        Ok(Self { cells, faces })
    }

    fn face(left: usize, right: usize, polygon: &[[f64; 3]]) -> VoronoiFace<3> {
        let (area, midpoint) = polygon_area_centroid_3d(polygon);
        VoronoiFace {
            left,
            right,
            area,
            midpoint,
            vertices: polygon.to_vec(),
        }
    }

    /// The cells, indexed by local generator.
    #[must_use]
    pub fn cells(&self) -> &[VoronoiCell<3>] {
        &self.cells
    }

    /// The faces in the given sid bucket (0 interior, 1 boundary).
    #[must_use]
    pub fn faces(&self, sid: usize) -> &[VoronoiFace<3>] {
        &self.faces[sid]
    }

    /// Sum of all cell volumes; hosts compare this against the measure of
    /// the local region to detect conversion errors.
    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.cells.iter().map(|cell| cell.volume).sum()
    }

    /// Write the grid as tab-separated `G`, `C` and `F` records.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures from the writer.
    pub fn write_grid<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for cell in &self.cells {
            writeln!(
                writer,
                "G\t{}\t{}\t{}",
                cell.generator[0], cell.generator[1], cell.generator[2]
            )?;
            writeln!(
                writer,
                "C\t{}\t{}\t{}\t{}\t{}",
                cell.centroid[0], cell.centroid[1], cell.centroid[2], cell.volume, cell.face_count
            )?;
        }
        for sid in [SID_INTERIOR, SID_BOUNDARY] {
            for face in &self.faces[sid] {
                write!(
                    writer,
                    "F\t{sid}\t{}\t{}\t{}\t{}",
                    face.area, face.midpoint[0], face.midpoint[1], face.midpoint[2]
                )?;
                for v in &face.vertices {
                    write!(writer, "\t({}, {}, {})", v[0], v[1], v[2])?;
                }
                writeln!(writer)?;
            }
        }
        Ok(())
    }

    /// Dump the grid to a text file at `path`.
    ///
    /// # Errors
    ///
    /// Propagates file-creation and write failures.
    pub fn print_grid<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_grid(&mut writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::bounds::BoundingBox;
    use approx::assert_relative_eq;

    /// A 2x2x2 block of generators with one mirrored layer of ghosts on all
    /// sides: every local cell must be a unit cube.
    fn block_tessellation() -> Delaunay3d {
        let bounds = BoundingBox::cube([0.0, 0.0, 0.0], 2.0);
        let mut d = Delaunay3d::new(&bounds, 8, 512, 5);
        let mut index = 0;
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..2 {
                    d.add_local_vertex(
                        index,
                        [
                            0.5 + f64::from(i),
                            0.5 + f64::from(j),
                            0.5 + f64::from(k),
                        ],
                    )
                    .unwrap();
                    index += 1;
                }
            }
        }
        d.consolidate().unwrap();
        for i in -1..3 {
            for j in -1..3 {
                for k in -1..3 {
                    if (0..2).contains(&i) && (0..2).contains(&j) && (0..2).contains(&k) {
                        continue;
                    }
                    d.add_ghost_vertex([
                        0.5 + f64::from(i),
                        0.5 + f64::from(j),
                        0.5 + f64::from(k),
                    ])
                    .unwrap();
                }
            }
        }
        d
    }

    #[test]
    fn block_cells_are_unit_cubes() {
        let d = block_tessellation();
        let voronoi = Voronoi3d::build(&d).unwrap();
        assert_eq!(voronoi.cells().len(), 8);
        for cell in voronoi.cells() {
            assert_relative_eq!(cell.volume, 1.0, epsilon = 1e-9);
            for axis in 0..3 {
                assert_relative_eq!(cell.centroid[axis], cell.generator[axis], epsilon = 1e-9);
            }
            // Cospherical lattice configurations may add degenerate edges
            // whose dual faces have zero area.
            assert!(cell.face_count >= 6);
        }
        assert_relative_eq!(voronoi.total_volume(), 8.0, epsilon = 1e-8);
    }

    #[test]
    fn interior_faces_are_deduplicated() {
        let d = block_tessellation();
        let voronoi = Voronoi3d::build(&d).unwrap();
        // A 2x2x2 block has 12 interior unit faces; cospherical lattice
        // degeneracies may add zero-area extras.
        let interior: Vec<_> = voronoi
            .faces(SID_INTERIOR)
            .iter()
            .filter(|face| face.area > 1e-6)
            .collect();
        assert_eq!(interior.len(), 12);
        for face in &interior {
            assert!(face.left < face.right);
            assert_relative_eq!(face.area, 1.0, epsilon = 1e-9);
        }
        // 8 cells x 6 faces - 2 x 12 interior = 24 substantive boundary
        // faces.
        let boundary = voronoi
            .faces(SID_BOUNDARY)
            .iter()
            .filter(|face| face.area > 1e-6)
            .count();
        assert_eq!(boundary, 24);
        for face in voronoi.faces(SID_BOUNDARY) {
            assert!(d.vertices().is_ghost(face.right));
        }
    }

    #[test]
    fn unconsolidated_tessellation_is_rejected() {
        let bounds = BoundingBox::cube([0.0, 0.0, 0.0], 1.0);
        let mut d = Delaunay3d::new(&bounds, 1, 16, 3);
        d.add_local_vertex(0, [0.5, 0.5, 0.5]).unwrap();
        assert!(matches!(
            Voronoi3d::build(&d),
            Err(VoronoiError::NotConsolidated)
        ));
    }

    #[test]
    fn open_cell_is_reported() {
        let bounds = BoundingBox::cube([0.0, 0.0, 0.0], 1.0);
        let mut d = Delaunay3d::new(&bounds, 1, 16, 3);
        d.add_local_vertex(0, [0.5, 0.5, 0.5]).unwrap();
        d.consolidate().unwrap();
        assert!(matches!(
            Voronoi3d::build(&d),
            Err(VoronoiError::UnboundedCell { generator: 0 })
        ));
    }
}
