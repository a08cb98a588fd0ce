// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normal projection: mapping a target surface onto the domain mesh by
//! following vertex normal rays, then stitching the target mesh's edges
//! into the domain's planar graphs as they're crossed.
//!
//! Two independent root-finding problems drive this, both solved by Newton
//! iteration in three unknowns: [`project_point_along_normals`] (does a
//! normal ray from inside a domain triangle hit a given target point?) and
//! [`edge_intersects_normal_fan`] (does a target edge cross a domain edge's
//! swept normal fan?).

use crate::arena::SurfaceBase;
use crate::config::ProjectionConfig;
use crate::error::Result;
use crate::geom::{Barycentric, Vec3};
use crate::planar_graph::NodeKind;
use crate::psurface::PSurface;
use crate::surface::Surface;
use nalgebra::{Matrix3, Point3};
use smallvec::SmallVec;

/// Where a projected point lands within a domain triangle's barycentric
/// frame (`u = dp.x`, `v = dp.y`, `w0 = 1-u-v`, matching
/// [`crate::planar_graph::DomainTriangle`]'s convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Landing {
    Interior,
    /// `(domain_edge, parameter)`, parameter increasing in the same
    /// direction as that edge's `edge_points` list.
    Edge(u8, f64),
    /// Domain corner index (0, 1 or 2).
    Corner(u8),
}

/// Why a vertex or edge could not be projected, for the caller's
/// aggregated-warnings result.
#[derive(Debug, Clone)]
pub enum ProjectionWarning {
    VertexNotProjectable { target_vertex: usize, detail: String },
    EdgeNotInsertable { target_from: usize, target_to: usize, detail: String },
}

/// The domain location a single target vertex's inverse normal projection
/// landed at, before it has been materialized into any triangle's planar
/// graph.
#[derive(Debug, Clone, Copy)]
pub struct VertexProjection {
    pub domain_tri: usize,
    pub domain_pos: Barycentric,
    pub landing: Landing,
    pub lambda: f64,
}

/// Per-point outward normals for a [`Surface`], area-weighted over incident
/// triangles. Used both for the domain mesh (which has no normals of its
/// own beyond per-triangle ones) and, when the caller has no
/// externally-supplied directions, for the target mesh.
pub fn compute_vertex_normals(points: &[Point3<f64>], triangles: &[[usize; 3]]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::zeros(); points.len()];
    for tri in triangles {
        let p0 = points[tri[0]];
        let p1 = points[tri[1]];
        let p2 = points[tri[2]];
        let n = (p1 - p0).cross(&(p2 - p0));
        for &v in tri {
            normals[v] += n;
        }
    }
    for n in &mut normals {
        *n = n.try_normalize(1e-12).unwrap_or(Vec3::z());
    }
    normals
}

/// Per-domain-mesh-vertex normals, computed the same way over
/// [`SurfaceBase`]'s live triangles. Indexed by arena vertex index, so the
/// vector's length matches the arena's vertex slot count, not its live
/// vertex count (freed slots get an arbitrary unit normal, never read).
pub fn compute_domain_vertex_normals(base: &SurfaceBase) -> Vec<Vec3> {
    let slot_count = base.triangles_iter().map(|(i, _)| i).max().map(|m| m + 1).unwrap_or(0);
    let vertex_slots = (0..slot_count)
        .flat_map(|i| base.triangle(i).map(|t| t.vertices).into_iter().flatten())
        .max()
        .map(|m| m + 1)
        .unwrap_or(0);
    let mut normals = vec![Vec3::zeros(); vertex_slots];

    for (_, t) in base.triangles_iter() {
        let p0 = base.vertex(t.vertices[0]).map(|v| v.pos).unwrap_or_default();
        let p1 = base.vertex(t.vertices[1]).map(|v| v.pos).unwrap_or_default();
        let p2 = base.vertex(t.vertices[2]).map(|v| v.pos).unwrap_or_default();
        let face_n = (p1 - p0).cross(&(p2 - p0));
        for &v in &t.vertices {
            normals[v] += face_n;
        }
    }
    for n in &mut normals {
        *n = n.try_normalize(1e-12).unwrap_or(Vec3::z());
    }
    normals
}

/// Solves `x_emb(u,v) + lambda * n_emb(u,v) = target` for `(u, v, lambda)`
/// by Newton iteration, starting from the triangle centroid.
pub fn project_point_along_normals(
    p0: Vec3,
    p1: Vec3,
    p2: Vec3,
    n0: Vec3,
    n1: Vec3,
    n2: Vec3,
    target: Vec3,
    config: &ProjectionConfig,
) -> Option<(f64, f64, f64)> {
    let mut u = 1.0 / 3.0;
    let mut v = 1.0 / 3.0;
    let mut lambda = 0.0;

    for _ in 0..config.newton_max_iter {
        let w0 = 1.0 - u - v;
        let x_emb = w0 * p0 + u * p1 + v * p2;
        let n_emb = w0 * n0 + u * n1 + v * n2;
        let f = x_emb + lambda * n_emb - target;
        if f.norm() < config.newton_tolerance {
            return Some((u, v, lambda));
        }

        let df_du = (p1 - p0) + lambda * (n1 - n0);
        let df_dv = (p2 - p0) + lambda * (n2 - n0);
        let df_dl = n_emb;
        let jac = Matrix3::from_columns(&[df_du, df_dv, df_dl]);
        let inv = jac.try_inverse()?;
        let delta = inv * f;
        u -= delta.x;
        v -= delta.y;
        lambda -= delta.z;
    }
    None
}

/// Classifies a barycentric landing point against `slack`: exactly (within
/// `eps`) at a corner, on an edge, or strictly interior.
pub fn classify_landing(u: f64, v: f64, eps: f64) -> Landing {
    let w0 = 1.0 - u - v;
    let near_zero = |x: f64| x.abs() < eps;

    if near_zero(u) && near_zero(v) {
        return Landing::Corner(0);
    }
    if near_zero(w0) && near_zero(v) {
        return Landing::Corner(1);
    }
    if near_zero(w0) && near_zero(u) {
        return Landing::Corner(2);
    }
    if near_zero(v) {
        return Landing::Edge(0, u);
    }
    if near_zero(w0) {
        return Landing::Edge(1, v);
    }
    if near_zero(u) {
        return Landing::Edge(2, w0);
    }
    Landing::Interior
}

fn in_triangle(u: f64, v: f64, slack: f64) -> bool {
    u >= -slack && v >= -slack && u + v <= 1.0 + slack
}

/// Projects one target point onto the domain mesh: tries every live domain
/// triangle, keeps the landing with the smallest `|lambda|` among those
/// that converge and land within the triangle (plus
/// [`ProjectionConfig::newton_containment_slack`]).
pub fn project_vertex(
    base: &SurfaceBase,
    domain_normals: &[Vec3],
    target: Vec3,
    config: &ProjectionConfig,
) -> Option<VertexProjection> {
    let mut best: Option<VertexProjection> = None;

    for (tri_idx, t) in base.triangles_iter() {
        let p0 = base.vertex(t.vertices[0])?.pos;
        let p1 = base.vertex(t.vertices[1])?.pos;
        let p2 = base.vertex(t.vertices[2])?.pos;
        let n0 = domain_normals[t.vertices[0]];
        let n1 = domain_normals[t.vertices[1]];
        let n2 = domain_normals[t.vertices[2]];

        let Some((u, v, lambda)) = project_point_along_normals(p0, p1, p2, n0, n1, n2, target, config) else {
            continue;
        };
        if !in_triangle(u, v, config.newton_containment_slack) {
            continue;
        }
        if best.as_ref().map(|b| lambda.abs() < b.lambda.abs()).unwrap_or(true) {
            best = Some(VertexProjection {
                domain_tri: tri_idx,
                domain_pos: Barycentric::new(u, v),
                landing: classify_landing(u, v, config.eps_geom),
                lambda,
            });
        }
    }
    best
}

/// Solves for a target-edge parameter `s` and domain-edge parameter `t`
/// such that the target-edge point `p0 + s(p1-p0)` lies on the normal ray
/// cast from the domain-edge point `q0 + t(q1-q0)`. Returns `None` if
/// Newton iteration fails to converge or the root falls outside `(0, 1)`
/// for either parameter.
pub fn edge_intersects_normal_fan(
    p0: Vec3,
    p1: Vec3,
    q0: Vec3,
    q1: Vec3,
    n0: Vec3,
    n1: Vec3,
    config: &ProjectionConfig,
) -> Option<(f64, f64)> {
    let mut s = 0.5;
    let mut t = 0.5;
    let mut lambda = 0.0;

    for _ in 0..config.newton_max_iter {
        let target_point = p0 + s * (p1 - p0);
        let domain_point = q0 + t * (q1 - q0);
        let normal = n0 + t * (n1 - n0);
        let f = target_point - domain_point - lambda * normal;
        if f.norm() < config.newton_tolerance {
            if s > 0.0 && s < 1.0 && t > 0.0 && t < 1.0 {
                return Some((s, t));
            }
            return None;
        }

        let df_ds = p1 - p0;
        let df_dt = -(q1 - q0) - lambda * (n1 - n0);
        let df_dl = -normal;
        let jac = Matrix3::from_columns(&[df_ds, df_dt, df_dl]);
        let inv = jac.try_inverse()?;
        let delta = inv * f;
        s -= delta.x;
        t -= delta.y;
        lambda -= delta.z;
    }
    None
}

/// Entry point + state for stitching one target-mesh edge into the domain
/// planar graphs, starting from a vertex that has already been projected.
pub struct EdgeInserter<'a> {
    pub target: &'a Surface,
    pub target_normals: &'a [Vec3],
    pub domain_normals: &'a [Vec3],
    pub config: &'a ProjectionConfig,
}

impl<'a> EdgeInserter<'a> {
    /// Walks from `from_projection`'s domain location toward `to_point`,
    /// creating an `Intersection` node pair each time the straight path
    /// (in the target edge's own 3D embedding, via the normal fan of the
    /// domain edge currently being crossed) leaves the current domain
    /// triangle, until it reaches a domain location already known to
    /// carry `to`'s own projection. Terminates in an `Interior` node if
    /// the walk exhausts its step budget without reaching `to` and no
    /// further crossing exists — the edge's remaining portion is then
    /// reported unprojectable.
    ///
    /// With `dry_run` set, no nodes are created; the walk only reports
    /// whether it would have completed, for
    /// [`edge_can_be_inserted`].
    pub fn insert_edge(
        &self,
        psurface: &mut PSurface,
        from: VertexProjection,
        from_node_number: usize,
        to: VertexProjection,
        to_node_number: usize,
        dry_run: bool,
    ) -> Result<bool> {
        let mut current_tri = from.domain_tri;
        let mut current_pos = from.domain_pos;
        let to_point = psurface.i_pos[to_node_number].coords;

        let max_steps = psurface.base.num_triangles() + 8;
        for _ in 0..max_steps {
            if current_tri == to.domain_tri && close(current_pos, to.domain_pos, self.config.eps_geom) {
                return Ok(true);
            }

            let Some(t) = psurface.base.triangle(current_tri) else {
                return Ok(false);
            };
            let verts = t.vertices;
            let corners = verts.map(|v| psurface.base.vertex(v).map(|d| d.pos).unwrap_or_default());
            let corner_normals = verts.map(|v| self.domain_normals.get(v).copied().unwrap_or(Vec3::z()));
            let current_point = barycentric_embed(current_pos, corners);

            let mut crossed: Option<(f64, u8, f64, Vec3)> = None;
            for edge in 0..3u8 {
                let (i0, i1) = edge_corner_indices(edge);
                let q0 = corners[i0];
                let q1 = corners[i1];
                let n0 = corner_normals[i0];
                let n1 = corner_normals[i1];

                if let Some((s, t_param)) = edge_intersects_normal_fan(current_point, to_point, q0, q1, n0, n1, self.config) {
                    let crossing_point = q0 + t_param * (q1 - q0);
                    if crossed.map(|(best_s, ..)| s < best_s).unwrap_or(true) {
                        crossed = Some((s, edge, t_param, crossing_point));
                    }
                }
            }

            match crossed {
                Some((_, edge, t_param, crossing_point)) => {
                    let dp = edge_param_to_barycentric(edge, t_param);
                    let Some(next_tri) = psurface.base.get_neighboring_triangle(current_tri, edge as usize) else {
                        return Ok(false);
                    };
                    let other_edge = matching_edge_in_neighbor(psurface, current_tri, edge as usize, next_tri);
                    let other_dp = edge_param_to_barycentric(other_edge, 1.0 - t_param);

                    if !dry_run {
                        psurface.add_intersection_node_pair(
                            current_tri,
                            next_tri,
                            dp,
                            other_dp,
                            edge,
                            other_edge,
                            crossing_point,
                        )?;
                    }

                    current_tri = next_tri;
                    current_pos = other_dp;
                }
                None => {
                    if !dry_run {
                        psurface.add_interior_node(current_tri, current_pos, from_node_number)?;
                    }
                    return Ok(false);
                }
            }
        }
        Ok(false)
    }
}

fn close(a: Barycentric, b: Barycentric, eps: f64) -> bool {
    (a - b).norm() < eps.max(1e-6)
}

fn barycentric_embed(p: Barycentric, corners: [Vec3; 3]) -> Vec3 {
    let w0 = 1.0 - p.x - p.y;
    w0 * corners[0] + p.x * corners[1] + p.y * corners[2]
}

fn edge_corner_indices(edge: u8) -> (usize, usize) {
    match edge {
        0 => (0, 1),
        1 => (1, 2),
        _ => (2, 0),
    }
}

fn edge_param_to_barycentric(edge: u8, t: f64) -> Barycentric {
    match edge {
        0 => Barycentric::new(t, 0.0),
        1 => Barycentric::new(1.0 - t, t),
        _ => Barycentric::new(0.0, 1.0 - t),
    }
}

/// Finds which local edge index of `next_tri` corresponds to the shared
/// edge crossed from `from_tri`'s `edge`-th side.
fn matching_edge_in_neighbor(psurface: &PSurface, from_tri: usize, edge: usize, next_tri: usize) -> u8 {
    let Some(shared_edge) = psurface.base.triangle(from_tri).and_then(|t| t.edges[edge]) else {
        return 0;
    };
    let Some(t) = psurface.base.triangle(next_tri) else { return 0 };
    for (i, e) in t.edges.iter().enumerate() {
        if *e == Some(shared_edge) {
            return i as u8;
        }
    }
    0
}

/// Pure dry-run pre-check: does the same walk as
/// [`EdgeInserter::insert_edge`] without mutating `psurface`.
pub fn edge_can_be_inserted(
    inserter: &EdgeInserter,
    psurface: &mut PSurface,
    from: VertexProjection,
    from_node_number: usize,
    to: VertexProjection,
    to_node_number: usize,
) -> Result<bool> {
    inserter.insert_edge(psurface, from, from_node_number, to, to_node_number, true)
}

/// Finds a target triangle incident to `vertex` and that vertex's local
/// coordinate within it — `(0,0)`, `(1,0)` or `(0,1)` depending on which of
/// the triangle's three corners `vertex` occupies. Used to give a ghost
/// node (whose image exactly is a target vertex, but whose domain landing
/// is strictly interior to a domain triangle) the `target_tri` +
/// `local_target_coords` pair [`crate::planar_graph::NodeKind::Ghost`]
/// carries.
fn target_triangle_and_local_coords(target: &Surface, vertex: usize) -> Option<(usize, Barycentric)> {
    target.triangles.iter().enumerate().find_map(|(ti, t)| {
        t.vertices.iter().position(|&v| v == vertex).map(|pos| {
            let coords = match pos {
                0 => Barycentric::new(0.0, 0.0),
                1 => Barycentric::new(1.0, 0.0),
                _ => Barycentric::new(0.0, 1.0),
            };
            (ti, coords)
        })
    })
}

/// Materializes a vertex projection into its domain triangle's planar
/// graph, returning the node's `node_number`. Corner landings are
/// propagated to every domain triangle incident to that mesh vertex so the
/// corner forms a single bundle, mirroring `addCornerNodeBundle`. A
/// strictly interior landing (§4.G) becomes a ghost node instead of a
/// plain interior one, since its image is an exact target vertex rather
/// than some blended interior point.
pub fn materialize_projection(
    psurface: &mut PSurface,
    target: &Surface,
    target_vertex: usize,
    proj: VertexProjection,
) -> Result<usize> {
    let image = target.points[target_vertex].coords;
    let node_number = psurface.add_node(image);
    match proj.landing {
        Landing::Corner(local_corner) => {
            let Some(t) = psurface.base.triangle(proj.domain_tri) else {
                return Ok(node_number);
            };
            let mesh_vertex = t.vertices[local_corner as usize];
            let incident: SmallVec<[usize; 12]> = psurface.base.get_triangles_per_vertex(mesh_vertex);
            for tri in incident {
                let Some(t) = psurface.base.triangle(tri) else { continue };
                if let Some(corner) = t.vertices.iter().position(|&v| v == mesh_vertex) {
                    psurface.add_corner_node(tri, corner, node_number)?;
                }
            }
        }
        Landing::Edge(edge, t_param) => {
            psurface.add_touching_node(proj.domain_tri, proj.domain_pos, edge, node_number)?;
            let _ = t_param;
        }
        Landing::Interior => {
            let (target_tri, local_target_coords) = target_triangle_and_local_coords(target, target_vertex)
                .ok_or_else(|| crate::error::Error::not_projectable("target vertex has no incident triangle"))?;
            psurface.add_ghost_interior_node(proj.domain_tri, proj.domain_pos, target_tri, local_target_coords, node_number)?;
        }
    }
    Ok(node_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn straight_down_projection_converges_at_centroid() {
        let config = ProjectionConfig::default();
        let p0 = Vec3::new(0.0, 0.0, 0.0);
        let p1 = Vec3::new(1.0, 0.0, 0.0);
        let p2 = Vec3::new(0.0, 1.0, 0.0);
        let up = Vec3::new(0.0, 0.0, 1.0);
        let target = Vec3::new(0.25, 0.25, 2.0);

        let (u, v, lambda) = project_point_along_normals(p0, p1, p2, up, up, up, target, &config).unwrap();
        assert_relative_eq!(u, 0.25, epsilon = 1e-8);
        assert_relative_eq!(v, 0.25, epsilon = 1e-8);
        assert_relative_eq!(lambda, 2.0, epsilon = 1e-8);
    }

    #[test]
    fn classify_landing_detects_corners_edges_and_interior() {
        let eps = 1e-6;
        assert_eq!(classify_landing(0.0, 0.0, eps), Landing::Corner(0));
        assert_eq!(classify_landing(1.0, 0.0, eps), Landing::Corner(1));
        assert_eq!(classify_landing(0.0, 1.0, eps), Landing::Corner(2));
        assert_eq!(classify_landing(0.5, 0.0, eps), Landing::Edge(0, 0.5));
        assert_eq!(classify_landing(0.3, 0.3, eps), Landing::Interior);
    }

    #[test]
    fn vertex_normals_point_away_from_flat_triangle() {
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
        let triangles = vec![[0usize, 1, 2]];
        let normals = compute_vertex_normals(&points, &triangles);
        for n in normals {
            assert_relative_eq!(n, Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-9);
        }
    }

    #[test]
    fn edge_intersects_normal_fan_finds_midpoint_crossing() {
        let config = ProjectionConfig::default();
        let p0 = Vec3::new(-1.0, 0.5, 1.0);
        let p1 = Vec3::new(1.0, 0.5, 1.0);
        let q0 = Vec3::new(0.0, 0.0, 0.0);
        let q1 = Vec3::new(0.0, 1.0, 0.0);
        let up = Vec3::new(0.0, 0.0, 1.0);

        let result = edge_intersects_normal_fan(p0, p1, q0, q1, up, up, &config);
        let (s, t) = result.expect("edge must cross the domain edge's normal fan");
        assert_relative_eq!(s, 0.5, epsilon = 1e-6);
        assert_relative_eq!(t, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn project_vertex_picks_triangle_with_smallest_lambda() {
        let mut base = SurfaceBase::new();
        let a = base.new_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = base.new_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = base.new_vertex(Vec3::new(0.0, 1.0, 0.0));
        let tri = base.create_space_for_triangle(a, b, c);
        base.integrate_triangle(tri);

        let normals = vec![Vec3::new(0.0, 0.0, 1.0); 3];
        let config = ProjectionConfig::default();
        let proj = project_vertex(&base, &normals, Vec3::new(0.2, 0.2, 3.0), &config).unwrap();
        assert_eq!(proj.domain_tri, 0);
        assert_relative_eq!(proj.lambda, 3.0, epsilon = 1e-6);
    }
}
