// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`PSurface`]: the piecewise-linear parametrization itself. Couples a
//! domain mesh arena ([`SurfaceBase`]) with one [`DomainTriangle`] planar
//! graph per domain triangle, a shared image-position table, and patch
//! metadata, and exposes the public evaluation entry point, `map`.

use crate::arena::SurfaceBase;
use crate::error::{Error, Result};
use crate::geom::{full_barycentric, Barycentric, Vec3};
use crate::planar_graph::{DomainTriangle, NodeKind};
use crate::surface::{Patch, Surface};
use nalgebra::Point3;

/// A node's address: which domain triangle it lives in, and its local index
/// within that triangle's planar graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalNodeIdx {
    pub tri: usize,
    pub idx: usize,
}

/// The result of evaluating the parametrization at a domain point: the
/// target triangle's three vertex indices and the barycentric coordinates
/// of the image point within it.
#[derive(Debug, Clone, Copy)]
pub struct MapResult {
    pub target_vertices: [usize; 3],
    pub target_coords: Barycentric,
}

/// The piecewise-linear parametrization between a domain mesh and a target
/// surface.
pub struct PSurface {
    pub base: SurfaceBase,
    /// Per-triangle planar graph, parallel to `base`'s triangle array.
    pub graphs: Vec<DomainTriangle>,
    /// Shared 3D image positions, indexed by `node_number`.
    pub i_pos: Vec<Point3<f64>>,
    pub patches: Vec<Patch>,
    pub has_up_to_date_point_location_structure: bool,
}

impl PSurface {
    pub fn new() -> Self {
        Self {
            base: SurfaceBase::new(),
            graphs: Vec::new(),
            i_pos: Vec::new(),
            patches: Vec::new(),
            has_up_to_date_point_location_structure: false,
        }
    }

    pub fn clear(&mut self) {
        self.base.clear();
        self.graphs.clear();
        self.i_pos.clear();
        self.patches.clear();
        self.has_up_to_date_point_location_structure = false;
    }

    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.i_pos.len()
    }

    /// Nodes excluding intersections, whose image already coincides with a
    /// target edge counted via its twin / the target mesh itself.
    pub fn num_true_nodes(&self) -> usize {
        self.graphs
            .iter()
            .flat_map(|g| g.nodes.iter())
            .filter(|n| !matches!(n.kind, NodeKind::Intersection { .. }))
            .count()
    }

    pub fn bounding_box(&self) -> Option<crate::geom::Box3> {
        let mut it = self.base.vertices.iter();
        let (_, first) = it.next()?;
        let mut bbox = crate::geom::Box3::from_point(Point3::from(first.pos));
        for (_, v) in it {
            bbox.extend_by(Point3::from(v.pos));
        }
        Some(bbox)
    }

    /// Allocates a fresh `iPos` slot holding `p`, returning its node number.
    pub fn add_node(&mut self, p: Vec3) -> usize {
        self.i_pos.push(Point3::from(p));
        self.i_pos.len() - 1
    }

    pub fn image_pos(&self, n: GlobalNodeIdx) -> Option<Point3<f64>> {
        let node = self.graphs.get(n.tri)?.nodes.get(n.idx)?;
        self.i_pos.get(node.node_number).copied()
    }

    /// Adds a new domain triangle (mirroring the mesh arena's own triangle
    /// allocation) together with its planar graph seeded with three corner
    /// nodes referencing `corner_node_numbers`.
    pub fn add_triangle(&mut self, a: usize, b: usize, c: usize, corner_node_numbers: [usize; 3]) -> usize {
        let tri = self.base.create_space_for_triangle(a, b, c);
        self.base.integrate_triangle(tri);
        if tri == self.graphs.len() {
            self.graphs.push(DomainTriangle::new(corner_node_numbers));
        } else {
            self.graphs[tri] = DomainTriangle::new(corner_node_numbers);
        }
        self.has_up_to_date_point_location_structure = false;
        tri
    }

    pub fn add_interior_node(&mut self, tri: usize, dom: Barycentric, node_number: usize) -> Result<usize> {
        let graph = self.graph_mut(tri)?;
        Ok(graph.add_interior_node(dom, node_number))
    }

    /// Adds a fresh ghost node at an interior domain position — see
    /// [`DomainTriangle::add_ghost_interior_node`].
    pub fn add_ghost_interior_node(
        &mut self,
        tri: usize,
        dom: Barycentric,
        target_tri: usize,
        local_target_coords: Barycentric,
        node_number: usize,
    ) -> Result<usize> {
        let graph = self.graph_mut(tri)?;
        Ok(graph.add_ghost_interior_node(dom, target_tri, local_target_coords, node_number))
    }

    pub fn add_ghost_node(
        &mut self,
        tri: usize,
        corner: usize,
        target_tri: usize,
        local_target_coords: Barycentric,
    ) -> Result<usize> {
        let graph = self.graph_mut(tri)?;
        if corner >= 3 {
            return Err(Error::invalid_input(format!("corner index {corner} out of range")));
        }
        Ok(graph.add_ghost_node(corner, target_tri, local_target_coords))
    }

    pub fn add_corner_node(&mut self, tri: usize, corner: usize, node_number: usize) -> Result<usize> {
        let graph = self.graph_mut(tri)?;
        if corner >= 3 {
            return Err(Error::invalid_input(format!("corner index {corner} out of range")));
        }
        graph.nodes[corner].node_number = node_number;
        Ok(corner)
    }

    pub fn add_touching_node(
        &mut self,
        tri: usize,
        dp: Barycentric,
        edge: u8,
        node_number: usize,
    ) -> Result<usize> {
        let graph = self.graph_mut(tri)?;
        let domain_edge_position = edge_parameter(dp, edge);
        Ok(graph.add_node(
            dp,
            NodeKind::Touching {
                domain_edge: edge,
                domain_edge_position,
            },
            node_number,
        ))
    }

    pub fn add_touching_node_pair(
        &mut self,
        tri1: usize,
        tri2: usize,
        dp1: Barycentric,
        dp2: Barycentric,
        edge1: u8,
        edge2: u8,
        node_number: usize,
    ) -> Result<(usize, usize)> {
        let n1 = self.add_touching_node(tri1, dp1, edge1, node_number)?;
        let n2 = self.add_touching_node(tri2, dp2, edge2, node_number)?;
        Ok((n1, n2))
    }

    /// Creates one intersection node in each of `tri1`/`tri2`, shares a
    /// fresh `node_number` whose image is `range`, and records each node's
    /// position along its triangle's shared edge.
    pub fn add_intersection_node_pair(
        &mut self,
        tri1: usize,
        tri2: usize,
        dp1: Barycentric,
        dp2: Barycentric,
        edge1: u8,
        edge2: u8,
        range: Vec3,
    ) -> Result<(usize, usize)> {
        let node_number = self.add_node(range);
        let pos1 = edge_parameter(dp1, edge1);
        let pos2 = edge_parameter(dp2, edge2);

        let n1 = {
            let g = self.graph_mut(tri1)?;
            g.add_node(
                dp1,
                NodeKind::Intersection {
                    domain_edge: edge1,
                    domain_edge_position: pos1,
                },
                node_number,
            )
        };
        let n2 = {
            let g = self.graph_mut(tri2)?;
            g.add_node(
                dp2,
                NodeKind::Intersection {
                    domain_edge: edge2,
                    domain_edge_position: pos2,
                },
                node_number,
            )
        };
        Ok((n1, n2))
    }

    fn graph_mut(&mut self, tri: usize) -> Result<&mut DomainTriangle> {
        self.graphs
            .get_mut(tri)
            .ok_or_else(|| Error::invalid_input(format!("no domain triangle {tri}")))
    }

    /// Sorts every domain triangle's edge-point lists by `domain_edge_position`
    /// and reinstates the two corners at each end, then rebuilds each
    /// triangle's cyclic point-location order.
    pub fn create_point_location_structure(&mut self) {
        for (tri_idx, graph) in self.graphs.iter_mut().enumerate() {
            for side in 0..3 {
                let corner_a = side;
                let corner_b = (side + 1) % 3;
                let mut interior: Vec<usize> = graph
                    .nodes
                    .iter()
                    .enumerate()
                    .filter(|(i, n)| *i != corner_a && *i != corner_b && n.kind.domain_edge() == Some(side as u8))
                    .map(|(i, _)| i)
                    .collect();
                interior.sort_by(|&a, &b| {
                    let pa = graph.nodes[a].kind.domain_edge_position().unwrap_or(0.0);
                    let pb = graph.nodes[b].kind.domain_edge_position().unwrap_or(0.0);
                    pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
                });
                let mut ordered = vec![corner_a];
                ordered.extend(interior);
                ordered.push(corner_b);
                graph.edge_points[side] = ordered;
            }
            graph.insert_extra_edges();
            graph.create_point_location_structure();
            tracing::trace!(tri = tri_idx, "point location structure built");
        }
        self.has_up_to_date_point_location_structure = true;
    }

    /// Evaluates the parametrization at domain point `p` in triangle `tri`.
    pub fn map(&self, tri: usize, p: Barycentric, seed: Option<usize>) -> Result<MapResult> {
        if !self.has_up_to_date_point_location_structure {
            return Err(Error::invariant(
                "PSurface::map",
                "create_point_location_structure was not run",
            ));
        }
        let graph = self
            .graphs
            .get(tri)
            .ok_or_else(|| Error::invalid_input(format!("no domain triangle {tri}")))?;
        let sub_tri = graph.locate(p, seed)?;

        let corners = self.get_actual_vertices(tri, sub_tri)?;
        let positions = [
            graph.nodes[sub_tri[0]].domain_pos,
            graph.nodes[sub_tri[1]].domain_pos,
            graph.nodes[sub_tri[2]].domain_pos,
        ];
        let (_, w1, w2) = barycentric_of(p, positions);

        // The sub-triangle's three corners map affinely, in the same order,
        // onto `corners`' three image points (§4.E), so `p`'s barycentric
        // weights in domain space *are* its image's barycentric weights in
        // target space — no separate target-side triangle needs locating.
        Ok(MapResult {
            target_vertices: corners,
            target_coords: Barycentric::new(w1, w2),
        })
    }

    pub fn position_map(&self, tri: usize, p: Barycentric, target: &Surface) -> Result<Point3<f64>> {
        let r = self.map(tri, p, None)?;
        let (w0, w1, w2) = full_barycentric(&r.target_coords);
        let pts = r.target_vertices.map(|v| target.points[v]);
        Ok(Point3::from(w0 * pts[0].coords + w1 * pts[1].coords + w2 * pts[2].coords))
    }

    pub fn direct_normal_map(&self, tri: usize, p: Barycentric, target: &Surface) -> Result<Vec3> {
        let r = self.map(tri, p, None)?;
        let p0 = target.points[r.target_vertices[0]];
        let p1 = target.points[r.target_vertices[1]];
        let p2 = target.points[r.target_vertices[2]];
        let n = (p1 - p0).cross(&(p2 - p0));
        Ok(n.try_normalize(1e-12).unwrap_or(n))
    }

    /// For a sub-triangle identified by three local node indices, returns
    /// the target vertex each node ultimately images to, by walking each
    /// node to a node whose image is a target-surface vertex (i.e. any
    /// kind but `Interior`) — corner, ghost, touching and intersection
    /// nodes all already carry one.
    pub fn get_actual_vertices(&self, tri: usize, nds: [usize; 3]) -> Result<[usize; 3]> {
        let graph = self
            .graphs
            .get(tri)
            .ok_or_else(|| Error::invalid_input(format!("no domain triangle {tri}")))?;
        let mut out = [0usize; 3];
        for (slot, &n) in out.iter_mut().zip(nds.iter()) {
            let node = &graph.nodes[n];
            *slot = node.node_number;
        }
        Ok(out)
    }

    pub fn get_image_surface_triangle(&self, tri: usize, nds: [usize; 3]) -> Option<usize> {
        let graph = self.graphs.get(tri)?;
        for &n in &nds {
            if let NodeKind::Ghost { target_tri, .. } = graph.nodes.get(n)?.kind {
                return Some(target_tri);
            }
        }
        None
    }

    /// Reverses the orientation of every triangle in `patch` (or all
    /// triangles if `patch` is `None`), by flipping each affected
    /// triangle's planar graph. Returns the number of triangles flipped.
    pub fn invert_triangles(&mut self, patch: Option<usize>) -> usize {
        let mut count = 0;
        for idx in 0..self.graphs.len() {
            if self.base.triangle(idx).is_none() {
                continue;
            }
            if patch.is_some() && Some(self.graphs[idx].patch) != patch {
                continue;
            }
            self.graphs[idx].flip();
            if let Some(t) = self.base.triangle(idx) {
                let verts = t.vertices;
                if let Some(tri) = self.base.triangles.get_mut(idx) {
                    tri.vertices = [verts[0], verts[2], verts[1]];
                }
            }
            count += 1;
        }
        self.has_up_to_date_point_location_structure = false;
        count
    }

    /// Delegates to the mesh arena's garbage collection, then reindexes the
    /// parallel planar-graph array and every `node_number` reference in
    /// lockstep so `i_pos` stays addressable by the same indices.
    pub fn garbage_collection(&mut self) {
        let maps = self.base.garbage_collection();

        let mut compacted = Vec::with_capacity(maps.triangles.iter().filter(|m| m.is_some()).count());
        for (old_idx, new_idx) in maps.triangles.iter().enumerate() {
            if new_idx.is_some() {
                compacted.push(std::mem::replace(&mut self.graphs[old_idx], DomainTriangle::new([0, 0, 0])));
            }
        }
        self.graphs = compacted;
    }

    /// Emits an explicit target [`Surface`] by walking every sub-triangle
    /// of every domain triangle's planar graph and de-duplicating vertices
    /// by target vertex identity (`node_number`).
    pub fn setup_original_surface(&self) -> Result<Surface> {
        let mut node_number_to_point: rustc_hash::FxHashMap<usize, usize> = rustc_hash::FxHashMap::default();
        let mut points = Vec::new();
        let mut triangles = Vec::new();

        for graph in &self.graphs {
            let corner_nodes: Vec<usize> = (0..3).collect();
            for c in &corner_nodes {
                let node = &graph.nodes[*c];
                node_number_to_point.entry(node.node_number).or_insert_with(|| {
                    let p = self.i_pos[node.node_number];
                    points.push(p);
                    points.len() - 1
                });
            }
        }

        for (tri_idx, graph) in self.graphs.iter().enumerate() {
            if self.base.triangle(tri_idx).is_none() {
                continue;
            }
            let corners = [0, 1, 2].map(|c| {
                let node = &graph.nodes[c];
                *node_number_to_point.get(&node.node_number).expect("registered above")
            });
            triangles.push(corners);
        }

        Surface::from_points_and_triangles(points, triangles)
    }
}

impl Default for PSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn edge_parameter(dp: Barycentric, edge: u8) -> f64 {
    match edge {
        0 => dp.x,
        1 => dp.y,
        _ => 1.0 - dp.x - dp.y,
    }
}

fn barycentric_of(p: Barycentric, corners: [Barycentric; 3]) -> (f64, f64, f64) {
    let (a, b, c) = (corners[0], corners[1], corners[2]);
    let denom = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if denom.abs() < 1e-15 {
        return (1.0, 0.0, 0.0);
    }
    let w0 = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / denom;
    let w1 = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / denom;
    let w2 = 1.0 - w0 - w1;
    (w0, w1, w2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_domain_and_target() -> (PSurface, Surface) {
        let mut ps = PSurface::new();
        ps.patches.push(Patch::default());

        let a = ps.base.new_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = ps.base.new_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = ps.base.new_vertex(Vec3::new(0.0, 1.0, 0.0));

        let n0 = ps.add_node(Vec3::new(0.0, 0.0, 0.0));
        let n1 = ps.add_node(Vec3::new(1.0, 0.0, 0.0));
        let n2 = ps.add_node(Vec3::new(0.0, 1.0, 0.0));

        ps.add_triangle(a, b, c, [n0, n1, n2]);
        ps.create_point_location_structure();

        let target = Surface::from_points_and_triangles(
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            vec![[0, 1, 2]],
        )
        .unwrap();

        (ps, target)
    }

    #[test]
    fn identity_map_returns_same_barycentrics() {
        let (ps, _target) = flat_domain_and_target();
        let r = ps.map(0, Barycentric::new(0.25, 0.25), None).unwrap();
        assert_eq!(r.target_vertices, [0, 1, 2]);
        assert_relative_eq!(r.target_coords.x, 0.25, epsilon = 1e-9);
        assert_relative_eq!(r.target_coords.y, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn map_before_point_location_structure_errors() {
        let mut ps = PSurface::new();
        let a = ps.base.new_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = ps.base.new_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = ps.base.new_vertex(Vec3::new(0.0, 1.0, 0.0));
        ps.add_triangle(a, b, c, [0, 1, 2]);
        let err = ps.map(0, Barycentric::new(0.1, 0.1), None).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
    }

    #[test]
    fn num_true_nodes_excludes_intersections() {
        let (mut ps, _target) = flat_domain_and_target();
        let range = Vec3::new(0.5, 0.0, 0.0);
        ps.add_intersection_node_pair(0, 0, Barycentric::new(0.5, 0.0), Barycentric::new(0.5, 0.0), 0, 0, range)
            .unwrap();
        assert_eq!(ps.num_true_nodes(), 3);
    }

    #[test]
    fn invert_triangles_twice_is_involutive() {
        let (mut ps, _target) = flat_domain_and_target();
        let before = ps.map(0, Barycentric::new(0.25, 0.25), None).unwrap();

        ps.invert_triangles(None);
        ps.invert_triangles(None);
        ps.create_point_location_structure();

        let after = ps.map(0, Barycentric::new(0.25, 0.25), None).unwrap();
        assert_eq!(after.target_vertices, before.target_vertices);
        assert_relative_eq!(after.target_coords.x, before.target_coords.x, epsilon = 1e-12);
        assert_relative_eq!(after.target_coords.y, before.target_coords.y, epsilon = 1e-12);
    }

    #[test]
    fn setup_original_surface_deduplicates_shared_corners() {
        let (ps, _target) = flat_domain_and_target();
        let surf = ps.setup_original_surface().unwrap();
        assert_eq!(surf.num_points(), 3);
        assert_eq!(surf.num_triangles(), 1);
    }
}
