// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The plain target surface: a point list and a triangle list, with no
//! planar-graph or parametrization structure of its own. Normal projection
//! maps domain points onto this surface; it never needs to be mutated by
//! the projection itself.

use crate::error::{Error, Result};
use crate::geom::Box3;
use nalgebra::Point3;

/// Material/boundary metadata attached to one target triangle, independent
/// of the parametrization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Patch {
    /// Material index on one side of the patch.
    pub inner_region: i32,
    /// Material index on the other side.
    pub outer_region: i32,
    /// An additional material-property tag.
    pub boundary_id: i32,
}

/// A triangle of the target surface: three point indices plus which patch
/// it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceTriangle {
    pub vertices: [usize; 3],
    pub patch: usize,
}

/// A triangulated target surface: the side normal projection maps onto.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    pub points: Vec<Point3<f64>>,
    pub triangles: Vec<SurfaceTriangle>,
    pub patches: Vec<Patch>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a surface from a flat point list and `(v0, v1, v2)` triangle
    /// corners, all assigned to a single default patch.
    pub fn from_points_and_triangles(points: Vec<Point3<f64>>, triangles: Vec<[usize; 3]>) -> Result<Self> {
        for t in &triangles {
            for &v in t {
                if v >= points.len() {
                    return Err(Error::invalid_input(format!(
                        "triangle references vertex {v} but surface has only {} points",
                        points.len()
                    )));
                }
            }
        }
        let triangles = triangles
            .into_iter()
            .map(|vertices| SurfaceTriangle { vertices, patch: 0 })
            .collect();
        Ok(Self {
            points,
            triangles,
            patches: vec![Patch::default()],
        })
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Axis-aligned bounding box over every point, or `None` for an empty
    /// surface.
    pub fn bounding_box(&self) -> Option<Box3> {
        let mut it = self.points.iter();
        let first = *it.next()?;
        let mut bbox = Box3::from_point(first);
        for &p in it {
            bbox.extend_by(p);
        }
        Some(bbox)
    }

    /// For each point, the triangles that use it as a corner.
    pub fn compute_triangles_per_point(&self) -> Vec<Vec<usize>> {
        let mut result = vec![Vec::new(); self.points.len()];
        for (ti, tri) in self.triangles.iter().enumerate() {
            for &v in &tri.vertices {
                result[v].push(ti);
            }
        }
        result
    }

    /// Drops points with no incident triangle, compacting the remaining
    /// points and rewriting triangle corner indices to match. Returns the
    /// `old_index -> new_index` mapping (`None` for a removed point).
    pub fn remove_unused_points(&mut self) -> Vec<Option<usize>> {
        let mut used = vec![false; self.points.len()];
        for tri in &self.triangles {
            for &v in &tri.vertices {
                used[v] = true;
            }
        }

        let mut mapping = vec![None; self.points.len()];
        let mut compacted = Vec::with_capacity(self.points.len());
        for (old, &is_used) in used.iter().enumerate() {
            if is_used {
                mapping[old] = Some(compacted.len());
                compacted.push(self.points[old]);
            }
        }
        self.points = compacted;

        for tri in &mut self.triangles {
            for v in &mut tri.vertices {
                *v = mapping[*v].expect("triangle referenced a point marked unused");
            }
        }

        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_surface() -> Surface {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 5.0, 5.0), // unused
        ];
        Surface::from_points_and_triangles(points, vec![[0, 1, 2]]).unwrap()
    }

    #[test]
    fn rejects_out_of_range_triangle() {
        let points = vec![Point3::origin()];
        let err = Surface::from_points_and_triangles(points, vec![[0, 1, 2]]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn bounding_box_covers_all_points() {
        let surf = triangle_surface();
        let bbox = surf.bounding_box().unwrap();
        assert!(bbox.contains_point(&Point3::new(5.0, 5.0, 5.0)));
    }

    #[test]
    fn removes_unused_points_and_renumbers() {
        let mut surf = triangle_surface();
        assert_eq!(surf.num_points(), 4);
        let mapping = surf.remove_unused_points();
        assert_eq!(surf.num_points(), 3);
        assert_eq!(mapping[3], None);
        assert!(surf.triangles[0].vertices.iter().all(|&v| v < 3));
    }

    #[test]
    fn triangles_per_point_indexes_correctly() {
        let surf = triangle_surface();
        let per_point = surf.compute_triangles_per_point();
        assert_eq!(per_point[0], vec![0]);
        assert!(per_point[3].is_empty());
    }
}
