// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The contact oracle: deciding which part of two independently meshed
//! surfaces is close enough to participate in the parametrization at all,
//! before any projection is attempted.
//!
//! The two sides are handled asymmetrically: the domain (nonmortar) side is
//! kept in full, vertex-for-vertex, because it becomes the base grid of the
//! parametrization; the target (mortar) side is pared down to the
//! neighborhood actually within `epsilon` of the domain, which keeps the
//! projection's point-location search from having to consider the whole
//! target mesh.

use crate::geom::Box3;
use crate::octree::MultiDimOctree;
use crate::surface::Surface;
use nalgebra::Point3;
use std::collections::BTreeSet;

/// The subset of one surface selected as a contact candidate: which
/// vertices survived the oracle, and which triangles have all three
/// corners among them.
#[derive(Debug, Clone, Default)]
pub struct ContactBoundary {
    /// Original-surface vertex indices kept on this side, in ascending order.
    pub vertices: Vec<usize>,
    /// Original-surface triangle indices whose three corners are all in
    /// `vertices`.
    pub tri_idx: Vec<usize>,
}

impl ContactBoundary {
    /// Maps each kept vertex's original index to its position in
    /// `vertices`, i.e. the renumbering a caller uses when it seeds a mesh
    /// from only the kept vertices. Entries for vertices that were not kept
    /// are `None`.
    pub fn vertex_offsets(&self, original_point_count: usize) -> Vec<Option<usize>> {
        let mut offsets = vec![None; original_point_count];
        for (new_idx, &old_idx) in self.vertices.iter().enumerate() {
            offsets[old_idx] = Some(new_idx);
        }
        offsets
    }
}

/// Returns the closest point to `candidate` lying on triangle `(p0, p1, p2)`,
/// by orthogonal projection onto the triangle's plane when that projection
/// falls inside the triangle, else the closest point on its boundary.
pub fn closest_point_on_triangle(p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>, candidate: Point3<f64>) -> Point3<f64> {
    let a = p1 - p0;
    let b = p2 - p0;
    let x = candidate - p0;

    let denom = nalgebra::Matrix3::from_columns(&[a, b, a.cross(&b).normalize()]).determinant();
    let alpha = nalgebra::Matrix3::from_columns(&[x, b, a.cross(&b).normalize()]).determinant() / denom;
    let beta = nalgebra::Matrix3::from_columns(&[a, x, a.cross(&b).normalize()]).determinant() / denom;

    if alpha >= 0.0 && beta >= 0.0 && (1.0 - alpha - beta) >= 0.0 {
        return p0 + alpha * a + beta * b;
    }

    let points = [p0, p1, p2];
    let mut best_dist = f64::MAX;
    let mut best_point = p0;

    for i in 0..3 {
        let from = points[i];
        let to = points[(i + 1) % 3];
        let edge = to - from;
        let edge_len = edge.norm();
        if edge_len < 1e-15 {
            continue;
        }
        let project_len = edge.dot(&(candidate - from)) / edge_len;
        let projection = edge / edge_len * project_len;
        let ortho_dist = ((candidate - from) - projection).norm();

        if (0.0..=edge_len).contains(&project_len) && ortho_dist < best_dist {
            best_dist = ortho_dist;
            best_point = projection + from;
        }
    }

    for &p in &points {
        let dist = (candidate - p).norm();
        if dist < best_dist {
            best_dist = dist;
            best_point = p;
        }
    }

    best_point
}

/// Decides, for both surfaces, which vertices participate in the contact
/// boundary. `surf1` is the domain (nonmortar) side and is kept whole;
/// `surf2` is the target (mortar) side and is pared down to within
/// `epsilon` of `surf1`.
pub fn contact_oracle(surf1: &Surface, surf2: &Surface, epsilon: f64) -> (Vec<usize>, Vec<usize>) {
    let eps_squared = epsilon * epsilon;

    let bbox1 = surf1.bounding_box().map(|mut b| {
        b.extend_by_eps(epsilon);
        b
    });
    let bbox2 = surf2.bounding_box().map(|mut b| {
        b.extend_by_eps(epsilon);
        b
    });

    let (Some(bbox1), Some(bbox2)) = (bbox1, bbox2) else {
        return (Vec::new(), Vec::new());
    };
    let Some(intersect_box) = bbox1.intersect(&bbox2) else {
        return ((0..surf1.points.len()).collect(), Vec::new());
    };

    let mut octree1 = MultiDimOctree::new(bbox1);
    for (i, p) in surf1.points.iter().enumerate() {
        octree1.insert(*p, i);
    }

    let mut octree2 = MultiDimOctree::new(intersect_box);
    for (i, p) in surf2.points.iter().enumerate() {
        if intersect_box.contains_point(p) {
            octree2.insert(*p, i);
        }
    }

    let mut contact_field2 = vec![false; surf2.points.len()];

    for tri in &surf1.triangles {
        let p0 = surf1.points[tri.vertices[0]];
        let p1 = surf1.points[tri.vertices[1]];
        let p2 = surf1.points[tri.vertices[2]];

        let mut query_box = Box3::new(p0, p1);
        query_box.extend_by(p2);
        query_box.extend_by_eps(epsilon);

        for &&candidate_idx in &octree2.query_box(&query_box) {
            if contact_field2[candidate_idx] {
                continue;
            }
            let candidate = surf2.points[candidate_idx];
            let closest = closest_point_on_triangle(p0, p1, p2, candidate);
            if (closest - candidate).norm_squared() < eps_squared {
                contact_field2[candidate_idx] = true;
            }
        }
    }

    for tri in &surf2.triangles {
        let p0 = surf2.points[tri.vertices[0]];
        let p1 = surf2.points[tri.vertices[1]];
        let p2 = surf2.points[tri.vertices[2]];

        let mut query_box = Box3::new(p0, p1);
        query_box.extend_by(p2);
        query_box.extend_by_eps(epsilon);

        if !octree1.query_box(&query_box).is_empty() {
            for &v in &tri.vertices {
                contact_field2[v] = true;
            }
        }
    }

    let contact_nodes1: Vec<usize> = (0..surf1.points.len()).collect();
    let contact_nodes2: Vec<usize> = (0..contact_field2.len()).filter(|&i| contact_field2[i]).collect();

    (contact_nodes1, contact_nodes2)
}

/// Restricts `surf` to the triangles whose three corners are all in
/// `vertices` (as selected by [`contact_oracle`]).
pub fn compute_contact_patch(surf: &Surface, vertices: &[usize]) -> Vec<usize> {
    let vertex_set: BTreeSet<usize> = vertices.iter().copied().collect();
    surf.triangles
        .iter()
        .enumerate()
        .filter(|(_, tri)| tri.vertices.iter().all(|v| vertex_set.contains(v)))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_surface(z: f64) -> Surface {
        let points = vec![
            Point3::new(0.0, 0.0, z),
            Point3::new(1.0, 0.0, z),
            Point3::new(0.0, 1.0, z),
            Point3::new(1.0, 1.0, z),
        ];
        Surface::from_points_and_triangles(points, vec![[0, 1, 2], [1, 3, 2]]).unwrap()
    }

    #[test]
    fn closest_point_orthogonal_projection_inside_triangle() {
        let p = closest_point_on_triangle(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.2, 0.2, 5.0),
        );
        assert!((p - Point3::new(0.2, 0.2, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn closest_point_falls_back_to_boundary() {
        let p = closest_point_on_triangle(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 5.0, 0.0),
        );
        assert!(p.z.abs() < 1e-9);
        assert!(p.x >= 0.0 && p.y >= 0.0);
    }

    #[test]
    fn close_parallel_surfaces_produce_full_contact() {
        let surf1 = flat_surface(0.0);
        let surf2 = flat_surface(0.01);
        let (nodes1, nodes2) = contact_oracle(&surf1, &surf2, 0.1);
        assert_eq!(nodes1.len(), surf1.points.len());
        assert_eq!(nodes2.len(), surf2.points.len());
    }

    #[test]
    fn distant_surfaces_produce_no_target_contact() {
        let surf1 = flat_surface(0.0);
        let surf2 = flat_surface(100.0);
        let (nodes1, nodes2) = contact_oracle(&surf1, &surf2, 0.1);
        assert_eq!(nodes1.len(), surf1.points.len());
        assert!(nodes2.is_empty());
    }

    #[test]
    fn vertex_offsets_renumbers_kept_vertices() {
        let boundary = ContactBoundary {
            vertices: vec![1, 3],
            tri_idx: vec![],
        };
        let offsets = boundary.vertex_offsets(4);
        assert_eq!(offsets, vec![None, Some(0), None, Some(1)]);
    }

    /// A coarse UV-sphere triangulation, fine enough to keep the chordal
    /// approximation error well under the contact tolerances used below.
    fn uv_sphere(center: Point3<f64>, radius: f64, lat: usize, lon: usize) -> Surface {
        let mut points = Vec::with_capacity((lat + 1) * lon);
        for i in 0..=lat {
            let theta = std::f64::consts::PI * (i as f64) / (lat as f64);
            for j in 0..lon {
                let phi = 2.0 * std::f64::consts::PI * (j as f64) / (lon as f64);
                let (st, ct) = theta.sin_cos();
                let (sp, cp) = phi.sin_cos();
                points.push(center + radius * nalgebra::Vector3::new(st * cp, st * sp, ct));
            }
        }
        let mut triangles = Vec::new();
        for i in 0..lat {
            for j in 0..lon {
                let a = i * lon + j;
                let b = i * lon + (j + 1) % lon;
                let c = (i + 1) * lon + j;
                let d = (i + 1) * lon + (j + 1) % lon;
                triangles.push([a, b, c]);
                triangles.push([b, d, c]);
            }
        }
        Surface::from_points_and_triangles(points, triangles).unwrap()
    }

    /// Two overlapping spheres (centers 1.9 apart, both radius 1): their
    /// surfaces physically cross at z = 0.95, so the oracle's marked band
    /// on the upper sphere should cluster tightly around that circle.
    #[test]
    fn close_spheres_produce_contact_band_near_their_crossing_circle() {
        let lower = uv_sphere(Point3::origin(), 1.0, 16, 16);
        let upper = uv_sphere(Point3::new(0.0, 0.0, 1.9), 1.0, 16, 16);

        let (nodes_lower, nodes_upper) = contact_oracle(&lower, &upper, 0.05);
        assert_eq!(nodes_lower.len(), lower.points.len());
        assert!(!nodes_upper.is_empty());
        for &idx in &nodes_upper {
            assert!((upper.points[idx].z - 0.95).abs() < 0.3);
        }
    }

    #[test]
    fn compute_contact_patch_keeps_fully_covered_triangles() {
        let surf = flat_surface(0.0);
        let patch = compute_contact_patch(&surf, &[0, 1, 2]);
        assert_eq!(patch, vec![0]);
    }
}
