// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The planar graph embedded inside one domain triangle: the nodes and
//! sub-edges that, together, implicitly triangulate it and carry the
//! piecewise-linear map to the target surface.
//!
//! A [`DomainTriangle`] is stored one per arena triangle, parallel to
//! [`crate::arena::SurfaceBase`]'s triangle array and reindexed in lockstep
//! by [`crate::psurface::PSurface::garbage_collection`].

use crate::error::{Error, Result};
use crate::geom::{full_barycentric, Barycentric};
use smallvec::SmallVec;

/// What a node's image represents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// Strictly inside the domain triangle; image is interior to a target
    /// triangle.
    Interior,
    /// Coincides with a domain-triangle corner; image lies on the target
    /// surface exactly (not captured here — see [`NodeKind::Ghost`] for the
    /// case where a corner's image is itself interior to a target face).
    Corner,
    /// Lies on a domain edge; image is interior to a target triangle.
    Touching { domain_edge: u8, domain_edge_position: f64 },
    /// Lies on a domain edge; image lies on a target edge. Always created
    /// in pairs, one per triangle sharing the edge.
    Intersection { domain_edge: u8, domain_edge_position: f64 },
    /// A corner whose image is interior to a target triangle.
    Ghost { target_tri: usize, local_target_coords: Barycentric },
}

impl NodeKind {
    pub fn is_corner(&self) -> bool {
        matches!(self, NodeKind::Corner | NodeKind::Ghost { .. })
    }

    pub fn domain_edge(&self) -> Option<u8> {
        match self {
            NodeKind::Touching { domain_edge, .. } | NodeKind::Intersection { domain_edge, .. } => {
                Some(*domain_edge)
            }
            _ => None,
        }
    }

    pub fn domain_edge_position(&self) -> Option<f64> {
        match self {
            NodeKind::Touching { domain_edge_position, .. }
            | NodeKind::Intersection { domain_edge_position, .. } => Some(*domain_edge_position),
            _ => None,
        }
    }
}

/// One vertex of the planar graph inside a domain triangle.
#[derive(Debug, Clone)]
pub struct Node {
    /// Barycentric position within the domain triangle (the two stored
    /// weights; the third is `1 - b0 - b1`).
    pub domain_pos: Barycentric,
    pub kind: NodeKind,
    /// Index into `PSurface::i_pos`, shared across every node (in any
    /// triangle) that represents the same logical point.
    pub node_number: usize,
    /// Local indices (within this triangle's `nodes`) of this node's
    /// planar-graph neighbors. Cyclically ordered CCW once
    /// `create_point_location_structure` has run.
    pub neighbors: SmallVec<[usize; 8]>,
}

impl Node {
    pub fn is_on_domain_edge(&self) -> bool {
        self.kind.domain_edge().is_some()
    }
}

/// The per-triangle planar node graph and its implied sub-triangulation.
#[derive(Debug, Clone)]
pub struct DomainTriangle {
    pub patch: usize,
    pub nodes: Vec<Node>,
    /// `edge_points[i]`: node indices along edge `i`, ordered from corner
    /// `i` to corner `(i+1) % 3`, corners included at both ends.
    pub edge_points: [Vec<usize>; 3],
    point_location_ready: bool,
}

impl DomainTriangle {
    /// Creates a fresh planar graph with just the three corners, each
    /// assigned `node_number` = its mesh-level vertex index (the caller is
    /// expected to reassign these to proper `iPos` node numbers once the
    /// corner bundle is known).
    pub fn new(corner_node_numbers: [usize; 3]) -> Self {
        let corners = [
            Barycentric::new(0.0, 0.0),
            Barycentric::new(1.0, 0.0),
            Barycentric::new(0.0, 1.0),
        ];
        let nodes = (0..3)
            .map(|i| Node {
                domain_pos: corners[i],
                kind: NodeKind::Corner,
                node_number: corner_node_numbers[i],
                neighbors: SmallVec::new(),
            })
            .collect();
        Self {
            patch: 0,
            nodes,
            edge_points: [vec![0, 1], vec![1, 2], vec![2, 0]],
            point_location_ready: false,
        }
    }

    pub fn corner_node(&self, i: usize) -> usize {
        i
    }

    /// Appends a node and returns its local index. Does not wire up
    /// neighbors or edge membership; callers do that based on the node's
    /// kind.
    pub fn add_node(&mut self, domain_pos: Barycentric, kind: NodeKind, node_number: usize) -> usize {
        self.point_location_ready = false;
        self.nodes.push(Node {
            domain_pos,
            kind,
            node_number,
            neighbors: SmallVec::new(),
        });
        self.nodes.len() - 1
    }

    pub fn add_interior_node(&mut self, domain_pos: Barycentric, node_number: usize) -> usize {
        self.add_node(domain_pos, NodeKind::Interior, node_number)
    }

    pub fn add_ghost_node(&mut self, corner: usize, target_tri: usize, local_target_coords: Barycentric) -> usize {
        debug_assert!(self.nodes[corner].kind.is_corner());
        self.point_location_ready = false;
        self.nodes[corner].kind = NodeKind::Ghost {
            target_tri,
            local_target_coords,
        };
        corner
    }

    /// Appends a fresh ghost node at an arbitrary domain position (as
    /// opposed to [`Self::add_ghost_node`], which converts an existing
    /// corner) — the case of a normal-projected vertex whose landing is
    /// strictly interior to the domain triangle.
    pub fn add_ghost_interior_node(
        &mut self,
        domain_pos: Barycentric,
        target_tri: usize,
        local_target_coords: Barycentric,
        node_number: usize,
    ) -> usize {
        self.add_node(
            domain_pos,
            NodeKind::Ghost {
                target_tri,
                local_target_coords,
            },
            node_number,
        )
    }

    /// Connects two local nodes with an undirected planar-graph edge.
    pub fn connect(&mut self, a: usize, b: usize) {
        if !self.nodes[a].neighbors.contains(&b) {
            self.nodes[a].neighbors.push(b);
        }
        if !self.nodes[b].neighbors.contains(&a) {
            self.nodes[b].neighbors.push(a);
        }
        self.point_location_ready = false;
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edge_points(&self, i: usize) -> usize {
        self.edge_points[i].len()
    }

    // --- Point location structure ---

    /// Sorts every node's neighbor list into cyclic (CCW) order about its
    /// `domain_pos`, the precondition for [`Self::map`]'s Brown/Faigle walk.
    /// Boundary nodes (on a domain edge or at a corner) are additionally
    /// rotated so the first and last neighbor are the node's two
    /// edge-adjacent neighbors from `edge_points`.
    pub fn create_point_location_structure(&mut self) {
        let positions: Vec<Barycentric> = self.nodes.iter().map(|n| n.domain_pos).collect();

        for i in 0..self.nodes.len() {
            let center = positions[i];
            let mut neighbors = self.nodes[i].neighbors.clone();
            neighbors.sort_by(|&a, &b| {
                let angle_a = angle_about(center, positions[a]);
                let angle_b = angle_about(center, positions[b]);
                angle_a.partial_cmp(&angle_b).unwrap_or(std::cmp::Ordering::Equal)
            });

            if self.nodes[i].is_on_domain_edge() || self.nodes[i].kind.is_corner() {
                if let Some((prev, next)) = self.edge_neighbors_of(i) {
                    rotate_to_start_with(&mut neighbors, prev);
                    if neighbors.last().copied() != Some(next) {
                        // `next` must end up last; if the CCW order put it
                        // elsewhere, that's an edge-adjacency inconsistency
                        // the caller's edge-point construction should have
                        // prevented.
                        if let Some(pos) = neighbors.iter().position(|&n| n == next) {
                            neighbors.remove(pos);
                            neighbors.push(next);
                        }
                    }
                }
            }

            self.nodes[i].neighbors = neighbors;
        }

        self.point_location_ready = true;
    }

    pub fn point_location_ready(&self) -> bool {
        self.point_location_ready
    }

    /// Enumerates the planar graph's triangular faces (each sub-triangle
    /// of the implicit triangulation), once, in no particular order.
    /// Requires [`Self::create_point_location_structure`] to have run so
    /// neighbor lists are cyclically ordered.
    pub fn faces(&self) -> Vec<[usize; 3]> {
        let mut faces = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for i in 0..self.nodes.len() {
            let neighbors = &self.nodes[i].neighbors;
            let len = neighbors.len();
            if len < 2 {
                continue;
            }
            for k in 0..len {
                let a = neighbors[k];
                let b = neighbors[(k + 1) % len];
                if !self.nodes[a].neighbors.contains(&b) {
                    continue;
                }
                let mut key = [i, a, b];
                key.sort_unstable();
                if seen.insert(key) {
                    faces.push(order_ccw(self, i, a, b));
                }
            }
        }
        faces
    }

    /// Finds, among this node's incident `edge_points` list, the previous
    /// and next node along the edge (the two canonical boundary neighbors).
    fn edge_neighbors_of(&self, node_idx: usize) -> Option<(usize, usize)> {
        for edge_points in &self.edge_points {
            if let Some(pos) = edge_points.iter().position(|&n| n == node_idx) {
                let prev = pos.checked_sub(1).map(|p| edge_points[p]);
                let next = edge_points.get(pos + 1).copied();
                if let (Some(prev), Some(next)) = (prev, next) {
                    return Some((prev, next));
                }
            }
        }
        None
    }

    /// Locates the sub-triangle containing barycentric point `p` by a
    /// Brown/Faigle walk starting at `seed` (or corner 0 if `seed` is
    /// `None`), and returns the three local node indices of that
    /// sub-triangle in CCW order.
    pub fn locate(&self, p: Barycentric, seed: Option<usize>) -> Result<[usize; 3]> {
        if !self.point_location_ready {
            return Err(Error::invariant(
                "DomainTriangle::locate",
                "create_point_location_structure was not run",
            ));
        }

        let mut current = seed.unwrap_or(0);
        let mut guard = 0usize;
        let max_steps = self.nodes.len() * self.nodes.len() + 8;

        loop {
            guard += 1;
            if guard > max_steps {
                return Err(Error::invariant("DomainTriangle::locate", "walk did not terminate"));
            }

            let neighbors = &self.nodes[current].neighbors;
            if neighbors.len() < 2 {
                return Err(Error::invariant(
                    "DomainTriangle::locate",
                    "node has fewer than two neighbors; planar graph is not triangulated",
                ));
            }

            let center = self.nodes[current].domain_pos;
            let mut advanced = false;

            for k in 0..neighbors.len() {
                let a = neighbors[k];
                let b = neighbors[(k + 1) % neighbors.len()];
                let pa = self.nodes[a].domain_pos;
                let pb = self.nodes[b].domain_pos;

                if point_in_wedge(center, pa, pb, p) {
                    if triangle_contains(center, pa, pb, p) {
                        return Ok(order_ccw(self, current, a, b));
                    }
                    // p lies beyond edge (center,a)/(center,b) on the far
                    // side from center: cross to whichever of a/b is closer
                    // to p's direction and continue the walk from there.
                    current = if (pa - p).norm_squared() <= (pb - p).norm_squared() { a } else { b };
                    advanced = true;
                    break;
                }
            }

            if !advanced {
                // p is not within any wedge at `current` (can happen right
                // at the seed if it's a poor starting guess); fall back to
                // the nearest neighbor and keep walking.
                let nearest = *neighbors
                    .iter()
                    .min_by(|&&a, &&b| {
                        let da = (self.nodes[a].domain_pos - p).norm_squared();
                        let db = (self.nodes[b].domain_pos - p).norm_squared();
                        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .expect("checked len >= 2 above");
                if nearest == current {
                    return Err(Error::invariant("DomainTriangle::locate", "walk stalled"));
                }
                current = nearest;
            }
        }
    }

    /// Extra-edge closure: along each domain edge, connects consecutive
    /// `edge_points` entries that are not yet linked, then, for every
    /// intersection node, connects its single interior-facing neighbor to
    /// the previous edge point — splitting the quadrilateral between two
    /// consecutive target-edge crossings into two triangles. Ghost corners
    /// (the only other node kind that can appear at a polygon vertex wider
    /// than a triangle) are handled the same way, since a ghost only ever
    /// occurs at a triangle corner and so never needs more than this one
    /// diagonal.
    pub fn insert_extra_edges(&mut self) {
        for side in 0..3 {
            let points = self.edge_points[side].clone();
            for w in points.windows(2) {
                let (a, b) = (w[0], w[1]);
                if !self.nodes[a].neighbors.contains(&b) {
                    self.connect(a, b);
                }
            }

            for w in points.windows(2) {
                let (prev, node) = (w[0], w[1]);
                let is_intersection_or_ghost = matches!(self.nodes[node].kind, NodeKind::Intersection { .. })
                    || matches!(self.nodes[node].kind, NodeKind::Ghost { .. });
                if !is_intersection_or_ghost {
                    continue;
                }
                if let Some(&interior_neighbor) = self.nodes[node]
                    .neighbors
                    .iter()
                    .find(|&&n| !self.edge_points[side].contains(&n))
                {
                    if !self.nodes[prev].neighbors.contains(&interior_neighbor) {
                        self.connect(prev, interior_neighbor);
                    }
                }
            }
        }
    }

    /// Swaps the 2nd and 3rd corners, reversing orientation: reverses each
    /// `edge_points` list, re-derives every node's barycentric position
    /// under the swapped frame, and fixes up `domain_edge`/
    /// `domain_edge_position` for nodes on edges 1 and 2 (edge 0, between
    /// corners 0 and 1, becomes the edge between corners 0 and 2 and is
    /// relabeled to index 2 accordingly — the full edge relabeling is
    /// `0<->2, 1 stays, 2<->0`, matching the corner swap).
    pub fn flip(&mut self) {
        for node in &mut self.nodes {
            let (w0, w1, w2) = full_barycentric(&node.domain_pos);
            let _ = w0;
            node.domain_pos = Barycentric::new(w2, w1);
            if let NodeKind::Touching { domain_edge, .. } | NodeKind::Intersection { domain_edge, .. } =
                &mut node.kind
            {
                *domain_edge = flipped_edge_label(*domain_edge);
            }
        }
        self.edge_points.swap(0, 2);
        for list in &mut self.edge_points {
            list.reverse();
        }
        self.point_location_ready = false;
    }

    /// Cyclically shifts corners, edges and edge-point lists by one
    /// (0,1,2 -> 1,2,0), re-deriving barycentric positions under the
    /// rotated frame.
    pub fn rotate(&mut self) {
        for node in &mut self.nodes {
            let (w0, w1, w2) = full_barycentric(&node.domain_pos);
            // new corner0 = old corner1, new corner1 = old corner2, new
            // corner2 = old corner0, so the new stored (w1,w2) pair is the
            // old (w2,w0).
            node.domain_pos = Barycentric::new(w2, w0);
            let _ = w1;
            if let NodeKind::Touching { domain_edge, .. } | NodeKind::Intersection { domain_edge, .. } =
                &mut node.kind
            {
                *domain_edge = (*domain_edge + 2) % 3;
            }
        }
        self.edge_points.rotate_left(1);
        self.point_location_ready = false;
    }

    /// Snaps every touching/intersection node exactly onto its domain
    /// edge's line (`y=0`, `x+y=1`, or `x=0`), removing drift accumulated
    /// across repeated coordinate conversions.
    pub fn adjust_touching_nodes(&mut self) {
        for node in &mut self.nodes {
            let Some(edge) = node.kind.domain_edge() else { continue };
            let (x, y) = (node.domain_pos.x, node.domain_pos.y);
            node.domain_pos = match edge {
                0 => Barycentric::new(x, 0.0),
                1 => {
                    let t = x + y;
                    if t.abs() < 1e-15 {
                        Barycentric::new(x, y)
                    } else {
                        Barycentric::new(x / t, y / t)
                    }
                }
                _ => Barycentric::new(0.0, y),
            };
        }
    }
}

fn flipped_edge_label(edge: u8) -> u8 {
    match edge {
        0 => 2,
        2 => 0,
        other => other,
    }
}

fn rotate_to_start_with(items: &mut SmallVec<[usize; 8]>, start: usize) {
    if let Some(pos) = items.iter().position(|&n| n == start) {
        items.rotate_left(pos);
    }
}

fn angle_about(center: Barycentric, p: Barycentric) -> f64 {
    let d = p - center;
    d.y.atan2(d.x)
}

/// `true` if `p` lies within the infinite wedge at `center` swept CCW from
/// the direction to `a` to the direction to `b`.
fn point_in_wedge(center: Barycentric, a: Barycentric, b: Barycentric, p: Barycentric) -> bool {
    let cross_ab = cross2(a - center, b - center);
    let cross_ap = cross2(a - center, p - center);
    let cross_pb = cross2(p - center, b - center);
    if cross_ab >= 0.0 {
        cross_ap >= -1e-12 && cross_pb >= -1e-12
    } else {
        cross_ap <= 1e-12 && cross_pb <= 1e-12
    }
}

fn triangle_contains(center: Barycentric, a: Barycentric, b: Barycentric, p: Barycentric) -> bool {
    let d1 = cross2(a - center, p - center);
    let d2 = cross2(b - a, p - a);
    let d3 = cross2(center - b, p - b);
    let has_neg = d1 < -1e-9 || d2 < -1e-9 || d3 < -1e-9;
    let has_pos = d1 > 1e-9 || d2 > 1e-9 || d3 > 1e-9;
    !(has_neg && has_pos)
}

fn cross2(u: Barycentric, v: Barycentric) -> f64 {
    u.x * v.y - u.y * v.x
}

fn order_ccw(tri: &DomainTriangle, a: usize, b: usize, c: usize) -> [usize; 3] {
    let pa = tri.nodes[a].domain_pos;
    let pb = tri.nodes[b].domain_pos;
    let pc = tri.nodes[c].domain_pos;
    if cross2(pb - pa, pc - pa) >= 0.0 {
        [a, b, c]
    } else {
        [a, c, b]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri_with_center() -> DomainTriangle {
        let mut tri = DomainTriangle::new([100, 101, 102]);
        let center = tri.add_interior_node(Barycentric::new(1.0 / 3.0, 1.0 / 3.0), 999);
        tri.connect(0, center);
        tri.connect(1, center);
        tri.connect(2, center);
        tri.connect(0, 1);
        tri.connect(1, 2);
        tri.connect(2, 0);
        tri.create_point_location_structure();
        tri
    }

    #[test]
    fn new_triangle_has_three_corners() {
        let tri = DomainTriangle::new([1, 2, 3]);
        assert_eq!(tri.num_nodes(), 3);
        assert_eq!(tri.num_edge_points(0), 2);
        assert!(tri.nodes.iter().all(|n| n.kind.is_corner()));
    }

    #[test]
    fn faces_of_fan_triangulation_are_three_triangles() {
        let tri = tri_with_center();
        let faces = tri.faces();
        assert_eq!(faces.len(), 3);
        for face in &faces {
            assert!(face.contains(&3));
        }
    }

    #[test]
    fn locate_center_of_fan_triangulation() {
        let tri = tri_with_center();
        let found = tri.locate(Barycentric::new(0.3, 0.3), Some(0)).unwrap();
        assert!(found.contains(&3));
    }

    #[test]
    fn locate_requires_point_location_structure() {
        let mut tri = DomainTriangle::new([1, 2, 3]);
        tri.connect(0, 1);
        tri.connect(1, 2);
        tri.connect(2, 0);
        let err = tri.locate(Barycentric::new(0.1, 0.1), Some(0)).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
    }

    #[test]
    fn flip_swaps_corners_and_preserves_node_count() {
        let mut tri = tri_with_center();
        let before = tri.num_nodes();
        tri.flip();
        assert_eq!(tri.num_nodes(), before);
        assert_eq!(tri.edge_points[0], vec![2, 1]);
    }

    #[test]
    fn rotate_is_a_cyclic_shift() {
        let mut tri = DomainTriangle::new([10, 20, 30]);
        let original_edges = tri.edge_points.clone();
        tri.rotate();
        assert_eq!(tri.edge_points[0], original_edges[1]);
        assert_eq!(tri.edge_points[1], original_edges[2]);
        assert_eq!(tri.edge_points[2], original_edges[0]);
    }

    #[test]
    fn adjust_touching_nodes_snaps_to_edge_line() {
        let mut tri = DomainTriangle::new([1, 2, 3]);
        let n = tri.add_node(
            Barycentric::new(0.5, 1e-8),
            NodeKind::Touching {
                domain_edge: 0,
                domain_edge_position: 0.5,
            },
            500,
        );
        tri.adjust_touching_nodes();
        assert_eq!(tri.nodes[n].domain_pos.y, 0.0);
    }
}
