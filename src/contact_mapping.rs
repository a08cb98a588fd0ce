// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The public construction entry point: `build_contact_mapping`,
//! `get_merged_grid`, `delete_contact_surface`. Owns no process-wide state
//! itself, beyond the opaque handle table every caller must go through —
//! the core builder types ([`crate::psurface::PSurface`],
//! [`crate::factory::PSurfaceFactory`]) remain ordinary owned values.

use crate::config::ProjectionConfig;
use crate::contact::{compute_contact_patch, contact_oracle};
use crate::error::{Error, Result};
use crate::factory::PSurfaceFactory;
use crate::geom::Vec3;
use crate::normal_projector::{
    compute_domain_vertex_normals, compute_vertex_normals, materialize_projection, project_vertex, EdgeInserter,
    ProjectionWarning,
};
use crate::psurface::PSurface;
use crate::surface::Surface;
use nalgebra::Point3;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

/// Opaque identity for one built contact mapping. Not reused across
/// `delete_contact_surface` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContactSurfaceHandle(u64);

struct BuiltMapping {
    psurface: PSurface,
    target: Surface,
    warnings: Vec<ProjectionWarning>,
}

fn handle_table() -> &'static Mutex<FxHashMap<u64, BuiltMapping>> {
    static TABLE: OnceLock<Mutex<FxHashMap<u64, BuiltMapping>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(FxHashMap::default()))
}

fn next_handle_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// A direction callback overriding per-point outward normals, mirroring
/// the original C ABI's `obsDirections(pos, dir)`.
pub type ObsDirections<'a> = dyn Fn(Point3<f64>) -> Vec3 + 'a;

/// Builds a full contact mapping between a nonmortar (domain) mesh and a
/// mortar (target) mesh: runs the contact oracle to restrict the target
/// side to the region within `eps` of the domain, builds the `PSurface`
/// over the (fully kept) domain mesh, and projects every contact-patch
/// target vertex and edge onto it. Returns a handle into the process-wide
/// table; pass it to [`get_merged_grid`] or [`delete_contact_surface`].
pub fn build_contact_mapping(
    coords1: Vec<Point3<f64>>,
    tri1: Vec<[usize; 3]>,
    coords2: Vec<Point3<f64>>,
    tri2: Vec<[usize; 3]>,
    eps: f64,
    obs_directions: Option<&ObsDirections<'_>>,
) -> Result<ContactSurfaceHandle> {
    let surf1 = Surface::from_points_and_triangles(coords1, tri1)?;
    let surf2 = Surface::from_points_and_triangles(coords2, tri2)?;

    let (nonmortar_vertices, mortar_vertices) = contact_oracle(&surf1, &surf2, eps);
    if nonmortar_vertices.is_empty() {
        return Err(Error::invalid_input("contact oracle found no overlap between the two meshes"));
    }
    let mortar_tris = compute_contact_patch(&surf2, &mortar_vertices);

    let mut factory = PSurfaceFactory::new();
    factory.set_target_surface(surf2.clone())?;

    let mut vertex_map = vec![None; surf1.num_points()];
    for (idx, p) in surf1.points.iter().enumerate() {
        vertex_map[idx] = Some(factory.insert_vertex(p.coords)?);
    }
    for tri in &surf1.triangles {
        let verts = tri.vertices.map(|v| vertex_map[v].expect("every domain vertex was inserted"));
        factory.insert_simplex(verts[0], verts[1], verts[2])?;
    }

    let (mut psurface, target) = factory.finish()?;
    psurface.create_point_location_structure();

    let domain_normals = compute_domain_vertex_normals(&psurface.base);
    let target_normals = match obs_directions {
        Some(f) => target.points.iter().map(|p| f(*p)).collect(),
        None => compute_vertex_normals(&target.points, &target.triangles.iter().map(|t| t.vertices).collect::<Vec<_>>()),
    };

    let config = ProjectionConfig::default();
    let mut warnings = Vec::new();
    let mut projections = vec![None; target.num_points()];
    let mut node_numbers = vec![None; target.num_points()];

    for &v in &mortar_vertices {
        match project_vertex(&psurface.base, &domain_normals, target.points[v].coords, &config) {
            Some(proj) => {
                let node_number = materialize_projection(&mut psurface, &target, v, proj)?;
                projections[v] = Some(proj);
                node_numbers[v] = Some(node_number);
            }
            None => warnings.push(ProjectionWarning::VertexNotProjectable {
                target_vertex: v,
                detail: "no domain triangle within tolerance".to_string(),
            }),
        }
    }

    let inserter = EdgeInserter {
        target: &target,
        target_normals: &target_normals,
        domain_normals: &domain_normals,
        config: &config,
    };

    for &tri_idx in &mortar_tris {
        let tri = target.triangles[tri_idx];
        for i in 0..3 {
            let from = tri.vertices[i];
            let to = tri.vertices[(i + 1) % 3];
            let (Some(from_proj), Some(to_proj)) = (projections[from], projections[to]) else {
                continue;
            };
            let (Some(from_nn), Some(to_nn)) = (node_numbers[from], node_numbers[to]) else {
                continue;
            };
            match inserter.insert_edge(&mut psurface, from_proj, from_nn, to_proj, to_nn, false) {
                Ok(true) => {}
                Ok(false) => warnings.push(ProjectionWarning::EdgeNotInsertable {
                    target_from: from,
                    target_to: to,
                    detail: "walk did not reach the target edge's far endpoint".to_string(),
                }),
                Err(e) => warnings.push(ProjectionWarning::EdgeNotInsertable {
                    target_from: from,
                    target_to: to,
                    detail: e.to_string(),
                }),
            }
        }
    }

    for graph in &mut psurface.graphs {
        graph.adjust_touching_nodes();
    }
    psurface.create_point_location_structure();

    let id = next_handle_id();
    handle_table().lock().expect("handle table mutex poisoned").insert(
        id,
        BuiltMapping {
            psurface,
            target,
            warnings,
        },
    );

    Ok(ContactSurfaceHandle(id))
}

/// One triangulated piece of the merged contact grid: a nonmortar
/// sub-triangle paired with the mortar triangle its image falls in, given
/// as world-space points plus each parent triangle's local barycentric
/// coordinates.
#[derive(Debug, Clone)]
pub struct IntersectionPrimitive {
    pub world_points: [Point3<f64>; 3],
    pub nonmortar_triangle: usize,
    pub mortar_triangle: usize,
    pub nonmortar_coords: [(f64, f64, f64); 3],
    pub mortar_coords: [(f64, f64, f64); 3],
}

/// Returns every merged-grid primitive produced by the mapping at
/// `handle`.
pub fn get_merged_grid(handle: ContactSurfaceHandle) -> Result<Vec<IntersectionPrimitive>> {
    let table = handle_table().lock().expect("handle table mutex poisoned");
    let mapping = table
        .get(&handle.0)
        .ok_or_else(|| Error::invalid_input(format!("unknown contact surface handle {}", handle.0)))?;

    let mut primitives = Vec::new();
    for (tri_idx, graph) in mapping.psurface.graphs.iter().enumerate() {
        if mapping.psurface.base.triangle(tri_idx).is_none() {
            continue;
        }
        for face in graph.faces() {
            let Some(mortar_tri) = target_triangle_for_face(&mapping.psurface, &mapping.target, tri_idx, face) else {
                continue;
            };
            let world_points = face.map(|n| mapping.psurface.i_pos[graph.nodes[n].node_number]);
            let nonmortar_coords = face.map(|n| crate::geom::full_barycentric(&graph.nodes[n].domain_pos));

            let mortar_verts = mapping.target.triangles[mortar_tri].vertices;
            let a = mapping.target.points[mortar_verts[0]];
            let b = mapping.target.points[mortar_verts[1]];
            let c = mapping.target.points[mortar_verts[2]];
            let mortar_coords = world_points.map(|p| barycentric_in_triangle(p, a, b, c));

            primitives.push(IntersectionPrimitive {
                world_points,
                nonmortar_triangle: tri_idx,
                mortar_triangle: mortar_tri,
                nonmortar_coords,
                mortar_coords,
            });
        }
    }
    Ok(primitives)
}

/// Removes a built mapping from the handle table, freeing it.
pub fn delete_contact_surface(handle: ContactSurfaceHandle) -> Result<()> {
    handle_table()
        .lock()
        .expect("handle table mutex poisoned")
        .remove(&handle.0)
        .map(|_| ())
        .ok_or_else(|| Error::invalid_input(format!("unknown contact surface handle {}", handle.0)))
}

/// Warnings accumulated while building `handle`'s mapping: vertices or
/// edges that could not be projected, skipped rather than fatal.
pub fn warnings_for(handle: ContactSurfaceHandle) -> Result<Vec<String>> {
    let table = handle_table().lock().expect("handle table mutex poisoned");
    let mapping = table
        .get(&handle.0)
        .ok_or_else(|| Error::invalid_input(format!("unknown contact surface handle {}", handle.0)))?;
    Ok(mapping
        .warnings
        .iter()
        .map(|w| match w {
            ProjectionWarning::VertexNotProjectable { target_vertex, detail } => {
                format!("vertex {target_vertex} not projectable: {detail}")
            }
            ProjectionWarning::EdgeNotInsertable { target_from, target_to, detail } => {
                format!("edge {target_from}->{target_to} not insertable: {detail}")
            }
        })
        .collect())
}

fn target_triangle_for_face(psurface: &PSurface, target: &Surface, tri_idx: usize, face: [usize; 3]) -> Option<usize> {
    if let Some(t) = psurface.get_image_surface_triangle(tri_idx, face) {
        return Some(t);
    }
    let verts = psurface.get_actual_vertices(tri_idx, face).ok()?;
    target
        .triangles
        .iter()
        .position(|t| verts.iter().all(|v| t.vertices.contains(v)))
}

fn barycentric_in_triangle(p: Point3<f64>, a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> (f64, f64, f64) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(&v0);
    let d01 = v0.dot(&v1);
    let d11 = v1.dot(&v1);
    let d20 = v2.dot(&v0);
    let d21 = v2.dot(&v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < 1e-15 {
        return (1.0, 0.0, 0.0);
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;
    (u, v, w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square(z: f64) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let points = vec![
            Point3::new(0.0, 0.0, z),
            Point3::new(1.0, 0.0, z),
            Point3::new(1.0, 1.0, z),
            Point3::new(0.0, 1.0, z),
        ];
        (points, vec![[0, 1, 2], [0, 2, 3]])
    }

    #[test]
    fn build_and_delete_round_trip() {
        let (p1, t1) = unit_square(0.0);
        let (p2, t2) = unit_square(0.05);
        let handle = build_contact_mapping(p1, t1, p2, t2, 0.2, None).expect("mapping should build");
        let grid = get_merged_grid(handle).expect("grid should be readable");
        assert!(!grid.is_empty());
        delete_contact_surface(handle).unwrap();
        assert!(get_merged_grid(handle).is_err());
    }

    #[test]
    fn unknown_handle_is_an_error() {
        let err = get_merged_grid(ContactSurfaceHandle(u64::MAX)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn no_overlap_is_rejected() {
        let (p1, t1) = unit_square(0.0);
        let (p2, t2) = unit_square(100.0);
        let err = build_contact_mapping(p1, t1, p2, t2, 0.1, None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    /// A small mortar square sitting entirely inside one triangle of a much
    /// larger nonmortar quad: every mortar vertex's inverse projection lands
    /// strictly inside that domain triangle, away from any domain corner or
    /// edge, so each must materialize as a ghost node (§4.G).
    #[test]
    fn interior_vertex_projection_creates_ghost_nodes() {
        let domain_points = vec![
            Point3::new(-10.0, -10.0, 0.0),
            Point3::new(10.0, -10.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
            Point3::new(-10.0, 10.0, 0.0),
        ];
        let domain_tris = vec![[0, 1, 2], [0, 2, 3]];

        let target_points = vec![
            Point3::new(2.0, 0.0, 0.1),
            Point3::new(3.0, 0.0, 0.1),
            Point3::new(3.0, 1.0, 0.1),
            Point3::new(2.0, 1.0, 0.1),
        ];
        let target_tris = vec![[0, 1, 2], [0, 2, 3]];

        let handle = build_contact_mapping(domain_points, domain_tris, target_points, target_tris, 0.2, None)
            .expect("mapping should build");

        let table = handle_table().lock().expect("handle table mutex poisoned");
        let mapping = table.get(&handle.0).expect("handle was just inserted");

        let ghost_count = mapping
            .psurface
            .graphs
            .iter()
            .flat_map(|g| g.nodes.iter())
            .filter(|n| matches!(n.kind, crate::planar_graph::NodeKind::Ghost { .. }))
            .count();
        assert_eq!(ghost_count, 4);
    }
}
