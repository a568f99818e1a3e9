//! 2D Delaunay-to-Voronoi conversion.
//!
//! Each local generator's cell is traced by rotating once around the
//! generator through its ring of incident triangles. The circumcenters of
//! the ring, in rotation order, are the cell polygon; each crossed Delaunay
//! edge contributes one face (the segment between two consecutive
//! circumcenters), and the cell area and centroid accumulate from the fan of
//! triangles spanned by the generator and the polygon edges.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::delaunay2d::{Delaunay2d, DUMMY_TRIANGLES};
use crate::core::errors::VoronoiError;
use crate::core::vertex::NO_SIMPLEX;
use crate::core::voronoi::{VoronoiCell, VoronoiFace, SID_BOUNDARY, SID_INTERIOR};
use crate::geometry::util::{circumcenter_2d, triangle_area_centroid_2d};

/// The 2D Voronoi grid: one cell per local generator plus the face buckets.
#[derive(Clone, Debug)]
pub struct Voronoi2d {
    cells: Vec<VoronoiCell<2>>,
    faces: [Vec<VoronoiFace<2>>; 2],
}

impl Voronoi2d {
    /// Derive the Voronoi grid from a consolidated tessellation.
    ///
    /// # Errors
    ///
    /// Fails when the tessellation is not consolidated, a local generator
    /// was never inserted, or a cell's one-ring reaches the bounding simplex
    /// (insufficient ghost coverage).
    pub fn build(delaunay: &Delaunay2d) -> Result<Self, VoronoiError> {
        let vertices = delaunay.vertices();
        if vertices.ghost_offset().is_none() {
            return Err(VoronoiError::NotConsolidated);
        }
        let number_of_cells = vertices.vertex_end();

        // Circumcenters of all non-dummy triangles are the dual grid
        // vertices; triangle ids index the cache after the dummy offset.
        let circumcenters: Vec<[f64; 2]> = (DUMMY_TRIANGLES..delaunay.number_of_triangles())
            .map(|t| {
                let [v0, v1, v2] = delaunay.triangle(t).vertices();
                circumcenter_2d(
                    vertices.position(v0),
                    vertices.position(v1),
                    vertices.position(v2),
                )
            })
            .collect();
        let center_of = |t: usize| circumcenters[t - DUMMY_TRIANGLES];

        let mut cells = Vec::with_capacity(number_of_cells);
        let mut faces: [Vec<VoronoiFace<2>>; 2] = [Vec::new(), Vec::new()];

        for generator in 0..number_of_cells {
            let (start, start_slot) = vertices.link(generator);
            if start == NO_SIMPLEX {
                return Err(VoronoiError::MissingVertexLink { generator });
            }

            let position = vertices.position(generator);
            let mut volume = 0.0;
            let mut weighted = [0.0_f64; 2];
            let mut face_count = 0;

            // Rotate around the generator; each step crosses one Delaunay
            // edge and therefore emits one face.
            let mut t = start;
            let mut exit = (usize::from(start_slot) + 1) % 3;
            loop {
                let triangle = delaunay.triangle(t);
                for slot in 0..3 {
                    let v = triangle.vertex(slot);
                    if vertices.is_auxiliary(v) {
                        return Err(VoronoiError::UnboundedCell { generator });
                    }
                }

                let next = triangle.neighbour(exit);
                if next < DUMMY_TRIANGLES {
                    return Err(VoronoiError::UnboundedCell { generator });
                }

                // The crossed edge consists of the generator and one other
                // vertex; that vertex owns the cell across this face.
                let e1 = triangle.vertex((exit + 1) % 3);
                let e2 = triangle.vertex((exit + 2) % 3);
                debug_assert!(e1 == generator || e2 == generator);
                let neighbour = if e1 == generator { e2 } else { e1 };

                let first = center_of(t);
                let second = center_of(next);
                face_count += 1;

                let (area, centroid) = triangle_area_centroid_2d(position, first, second);
                volume += area;
                weighted[0] += area * centroid[0];
                weighted[1] += area * centroid[1];

                if vertices.is_ghost(neighbour) {
                    faces[SID_BOUNDARY].push(Self::face(generator, neighbour, first, second));
                } else if generator < neighbour {
                    // Interior faces are emitted once, by the lower-indexed
                    // endpoint.
                    faces[SID_INTERIOR].push(Self::face(generator, neighbour, first, second));
                }

                let entry_slot = usize::from(triangle.index_in_neighbour(exit));
                t = next;
                exit = (entry_slot + 2) % 3;
                if t == start {
                    break;
                }
            }

            // The ring closes around the generator, so the signed fan areas
            // sum to +/- the cell area depending on rotation direction; the
            // signs cancel in the centroid quotient.
            let centroid = if volume != 0.0 {
                [weighted[0] / volume, weighted[1] / volume]
            } else {
                position
            };
            let volume = volume.abs();
            cells.push(VoronoiCell {
                generator: position,
                centroid,
                volume,
                face_count,
            });
        }

        Ok(Self { cells, faces })
    }

    fn face(left: usize, right: usize, first: [f64; 2], second: [f64; 2]) -> VoronoiFace<2> {
        let dx = second[0] - first[0];
        let dy = second[1] - first[1];
        VoronoiFace {
            left,
            right,
            area: (dx * dx + dy * dy).sqrt(),
            midpoint: [(first[0] + second[0]) / 2.0, (first[1] + second[1]) / 2.0],
            vertices: vec![first, second],
        }
    }

    /// The cells, indexed by local generator.
    #[must_use]
    pub fn cells(&self) -> &[VoronoiCell<2>] {
        &self.cells
    }

    /// The faces in the given sid bucket (0 interior, 1 boundary).
    #[must_use]
    pub fn faces(&self, sid: usize) -> &[VoronoiFace<2>] {
        &self.faces[sid]
    }

    /// Sum of all cell areas; hosts compare this against the measure of the
    /// local region to detect conversion errors.
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
            writeln!(writer, "G\t{}\t{}", cell.generator[0], cell.generator[1])?;
            writeln!(
                writer,
                "C\t{}\t{}\t{}\t{}",
                cell.centroid[0], cell.centroid[1], cell.volume, cell.face_count
            )?;
        }
        for sid in [SID_INTERIOR, SID_BOUNDARY] {
            for face in &self.faces[sid] {
                write!(
                    writer,
                    "F\t{sid}\t{}\t{}\t{}",
                    face.area, face.midpoint[0], face.midpoint[1]
                )?;
                for v in &face.vertices {
                    write!(writer, "\t({}, {})", v[0], v[1])?;
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

    /// A 4x4 grid of generators with mirrored ghost coverage: every interior
    /// cell must come out as a unit square.
    fn grid_tessellation() -> Delaunay2d {
        let bounds = BoundingBox::cube([0.0, 0.0], 4.0);
        let mut d = Delaunay2d::new(&bounds, 16, 128, 11);
        let mut index = 0;
        for i in 0..4 {
            for j in 0..4 {
                d.add_local_vertex(index, [0.5 + f64::from(i), 0.5 + f64::from(j)])
                    .unwrap();
                index += 1;
            }
        }
        d.consolidate().unwrap();
        // Mirror the grid across all four walls (corners included) so every
        // local cell is closed.
        for i in -1..5 {
            for j in -1..5 {
                if (0..4).contains(&i) && (0..4).contains(&j) {
                    continue;
                }
                d.add_ghost_vertex([0.5 + f64::from(i), 0.5 + f64::from(j)])
                    .unwrap();
            }
        }
        d
    }

    #[test]
    fn grid_cells_are_unit_squares() {
        let d = grid_tessellation();
        let voronoi = Voronoi2d::build(&d).unwrap();
        assert_eq!(voronoi.cells().len(), 16);
        for cell in voronoi.cells() {
            assert_relative_eq!(cell.volume, 1.0, epsilon = 1e-10);
            assert_relative_eq!(cell.centroid[0], cell.generator[0], epsilon = 1e-10);
            assert_relative_eq!(cell.centroid[1], cell.generator[1], epsilon = 1e-10);
            // Cocircular grid squares may add degenerate diagonal edges
            // whose dual faces have zero length.
            assert!(cell.face_count >= 4);
        }
        assert_relative_eq!(voronoi.total_volume(), 16.0, epsilon = 1e-9);
    }

    #[test]
    fn interior_faces_are_deduplicated() {
        let d = grid_tessellation();
        let voronoi = Voronoi2d::build(&d).unwrap();
        // 4x4 grid: 24 interior unit faces, each stored once; degenerate
        // diagonal edges may add zero-length extras.
        let interior: Vec<_> = voronoi
            .faces(SID_INTERIOR)
            .iter()
            .filter(|face| face.area > 1e-6)
            .collect();
        assert_eq!(interior.len(), 24);
        for face in &interior {
            assert!(face.left < face.right);
            assert_relative_eq!(face.area, 1.0, epsilon = 1e-10);
        }
        // Every hull cell borders the ghost layer: 16 substantive boundary
        // faces.
        let boundary: Vec<_> = voronoi
            .faces(SID_BOUNDARY)
            .iter()
            .filter(|face| face.area > 1e-6)
            .collect();
        assert_eq!(boundary.len(), 16);
        for face in voronoi.faces(SID_BOUNDARY) {
            assert!(d.vertices().is_ghost(face.right));
        }
    }

    #[test]
    fn unconsolidated_tessellation_is_rejected() {
        let bounds = BoundingBox::cube([0.0, 0.0], 1.0);
        let mut d = Delaunay2d::new(&bounds, 1, 16, 3);
        d.add_local_vertex(0, [0.5, 0.5]).unwrap();
        assert!(matches!(
            Voronoi2d::build(&d),
            Err(VoronoiError::NotConsolidated)
        ));
    }

    #[test]
    fn open_cell_is_reported() {
        let bounds = BoundingBox::cube([0.0, 0.0], 1.0);
        let mut d = Delaunay2d::new(&bounds, 1, 16, 3);
        d.add_local_vertex(0, [0.5, 0.5]).unwrap();
        d.consolidate().unwrap();
        assert!(matches!(
            Voronoi2d::build(&d),
            Err(VoronoiError::UnboundedCell { generator: 0 })
        ));
    }
}
