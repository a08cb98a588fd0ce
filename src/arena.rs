// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for a triangulated surface's vertices, edges and
//! triangles.
//!
//! [`SurfaceBase`] is the central owner of one mesh's topology. Unlike the
//! generational slot maps used elsewhere in this workspace, entities here
//! are addressed by plain, dense `usize` indices backed by [`Slotted`]: a
//! `Vec<T>` plus a free-index stack. `garbage_collection` relies on that to
//! compact the arena and renumber every cross-reference in one pass — a
//! generational key deliberately hides the notion of "this index moved",
//! which is exactly what callers need to observe here.

use smallvec::SmallVec;

use crate::geom::Vec3;

/// Triangle-list size before a per-edge `SmallVec` spills to the heap.
/// Interior mesh edges border exactly 2 triangles; boundary edges border 1.
type EdgeTriangles = SmallVec<[usize; 2]>;

/// Edge-list size before a per-vertex `SmallVec` spills to the heap.
type VertexEdges = SmallVec<[usize; 8]>;

/// A generic dense store with O(1) removal via a free-index stack, mirroring
/// `vectorArray` + `freeXStack` for each of the three entity kinds.
#[derive(Debug, Clone, Default)]
pub struct Slotted<T> {
    items: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> Slotted<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Inserts `value`, reusing a freed slot if one is available.
    pub fn insert(&mut self, value: T) -> usize {
        if let Some(idx) = self.free.pop() {
            self.items[idx] = Some(value);
            idx
        } else {
            self.items.push(Some(value));
            self.items.len() - 1
        }
    }

    /// Removes the value at `idx`, freeing the slot for reuse. Returns the
    /// removed value, or `None` if the slot was already empty.
    pub fn remove(&mut self, idx: usize) -> Option<T> {
        let value = self.items.get_mut(idx)?.take();
        if value.is_some() {
            self.free.push(idx);
        }
        value
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.items.get(idx).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.items.get_mut(idx).and_then(|s| s.as_mut())
    }

    /// Total slot count including freed (tombstoned) slots, i.e. the
    /// capacity `garbage_collection` must walk.
    pub fn slot_count(&self) -> usize {
        self.items.len()
    }

    /// Count of live (non-freed) entries.
    pub fn len(&self) -> usize {
        self.items.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_free(&self, idx: usize) -> bool {
        match self.items.get(idx) {
            Some(slot) => slot.is_none(),
            None => true,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.free.clear();
    }

    /// Compacts the store in place, dropping freed slots and shifting every
    /// live entry down to close the gaps. Returns `old_index -> new_index`
    /// for every surviving entry, in old-index order, so the caller can
    /// rewrite cross-references; `None` at position `i` means index `i` was
    /// freed.
    pub fn compact(&mut self) -> Vec<Option<usize>> {
        let mut mapping = vec![None; self.items.len()];
        let mut write = 0;
        for read in 0..self.items.len() {
            if let Some(value) = self.items[read].take() {
                mapping[read] = Some(write);
                self.items[write] = Some(value);
                write += 1;
            }
        }
        self.items.truncate(write);
        self.free.clear();
        mapping
    }
}

/// A mesh vertex: a position plus the edges incident to it.
#[derive(Debug, Clone)]
pub struct VertexData {
    pub pos: Vec3,
    pub edges: VertexEdges,
}

impl VertexData {
    pub fn new(pos: Vec3) -> Self {
        Self {
            pos,
            edges: SmallVec::new(),
        }
    }

    pub fn degree(&self) -> usize {
        self.edges.len()
    }
}

/// A mesh edge: the two endpoint vertex indices plus the triangles it
/// borders (0 for a dangling edge, 1 for a boundary edge, 2 for interior,
/// 3+ for non-manifold).
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub from: usize,
    pub to: usize,
    pub triangles: EdgeTriangles,
}

impl EdgeData {
    pub fn other_vertex(&self, v: usize) -> usize {
        if self.from == v {
            self.to
        } else {
            self.from
        }
    }

    pub fn is_connected_to_triangle(&self, tri: usize) -> bool {
        self.triangles.contains(&tri)
    }
}

/// A mesh triangle: three corner vertex indices and the (possibly absent,
/// `None`) edge opposite each corner pairing, indexed the same way as
/// `vertices`: `edges[i]` connects `vertices[i]` to `vertices[(i+1) % 3]`.
#[derive(Debug, Clone)]
pub struct TriangleData {
    pub vertices: [usize; 3],
    pub edges: [Option<usize>; 3],
}

impl TriangleData {
    pub fn new(a: usize, b: usize, c: usize) -> Self {
        Self {
            vertices: [a, b, c],
            edges: [None, None, None],
        }
    }

    pub fn is_connected_to(&self, v: usize) -> bool {
        self.vertices.contains(&v)
    }

    /// `true` if `other` traverses the edge shared with `self` in the
    /// opposite direction, i.e. the two triangles are consistently oriented.
    pub fn is_correctly_oriented(&self, other: &TriangleData) -> bool {
        for i in 0..3 {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % 3];
            for j in 0..3 {
                if other.vertices[j] == b && other.vertices[(j + 1) % 3] == a {
                    return true;
                }
            }
        }
        false
    }
}

/// Result of [`SurfaceBase::triangle_edge_intersection`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleEdgeIntersection {
    pub point: Vec3,
    pub parallel: bool,
}

/// The owner of one triangulated surface's vertices, edges and triangles,
/// with upward (vertex→edges) and implicit downward (edge→triangles,
/// triangle→vertices/edges) adjacency, plus the three-sweep garbage
/// collector that renumbers every cross-reference after removals.
#[derive(Debug, Clone, Default)]
pub struct SurfaceBase {
    pub(crate) vertices: Slotted<VertexData>,
    pub(crate) edges: Slotted<EdgeData>,
    pub(crate) triangles: Slotted<TriangleData>,
}

impl SurfaceBase {
    pub fn new() -> Self {
        Self {
            vertices: Slotted::new(),
            edges: Slotted::new(),
            triangles: Slotted::new(),
        }
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.triangles.clear();
    }

    // --- Procedural access ---

    pub fn vertex(&self, i: usize) -> Option<&VertexData> {
        self.vertices.get(i)
    }

    pub fn vertex_mut(&mut self, i: usize) -> Option<&mut VertexData> {
        self.vertices.get_mut(i)
    }

    pub fn edge(&self, i: usize) -> Option<&EdgeData> {
        self.edges.get(i)
    }

    pub fn triangle(&self, i: usize) -> Option<&TriangleData> {
        self.triangles.get(i)
    }

    /// Iterates every live triangle together with its arena index.
    pub fn triangles_iter(&self) -> impl Iterator<Item = (usize, &TriangleData)> {
        self.triangles.iter()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    // --- Insertion and removal ---

    /// Inserts a new vertex, reusing a freed slot if one is available.
    pub fn new_vertex(&mut self, pos: Vec3) -> usize {
        self.vertices.insert(VertexData::new(pos))
    }

    /// Inserts a new edge between `a` and `b`, reusing a freed slot if one
    /// is available. Does not register it with either endpoint; callers
    /// that build edges directly (rather than through
    /// [`Self::integrate_triangle`]) must also push the returned index onto
    /// both vertices' edge lists.
    pub fn new_edge(&mut self, a: usize, b: usize) -> usize {
        self.edges.insert(EdgeData {
            from: a,
            to: b,
            triangles: SmallVec::new(),
        })
    }

    /// Reserves a triangle slot for corners `(a, b, c)` without wiring up
    /// its edges; follow with [`Self::integrate_triangle`].
    pub fn create_space_for_triangle(&mut self, a: usize, b: usize, c: usize) -> usize {
        self.triangles.insert(TriangleData::new(a, b, c))
    }

    /// Finds or creates each of a triangle's three edges and links them
    /// together, the one place new edges normally come from.
    pub fn integrate_triangle(&mut self, tri_idx: usize) {
        for i in 0..3 {
            let (point_a, point_b) = {
                let tri = self.triangles.get(tri_idx).expect("triangle must exist");
                (tri.vertices[i], tri.vertices[(i + 1) % 3])
            };

            let existing = self.find_edge(point_a, point_b);
            let edge_idx = match existing {
                Some(e) => {
                    let edge = self.edges.get_mut(e).expect("edge must exist");
                    if !edge.is_connected_to_triangle(tri_idx) {
                        edge.triangles.push(tri_idx);
                    }
                    e
                }
                None => {
                    let new_idx = self.new_edge(point_a, point_b);
                    self.vertices
                        .get_mut(point_a)
                        .expect("vertex must exist")
                        .edges
                        .push(new_idx);
                    self.vertices
                        .get_mut(point_b)
                        .expect("vertex must exist")
                        .edges
                        .push(new_idx);
                    self.edges
                        .get_mut(new_idx)
                        .expect("edge must exist")
                        .triangles
                        .push(tri_idx);
                    new_idx
                }
            };

            self.triangles.get_mut(tri_idx).expect("triangle must exist").edges[i] = Some(edge_idx);
        }
    }

    /// Removes a triangle, dropping any edge left with no remaining
    /// triangle and unlinking the triangle from edges it still shares.
    pub fn remove_triangle(&mut self, tri: usize) {
        let edges = self.triangles.get(tri).map(|t| t.edges).unwrap_or([None; 3]);
        for maybe_edge in edges {
            let Some(edge_idx) = maybe_edge else { continue };
            let triangle_count = self.edges.get(edge_idx).map(|e| e.triangles.len()).unwrap_or(0);
            if triangle_count <= 1 {
                self.remove_edge(edge_idx);
            } else if let Some(edge) = self.edges.get_mut(edge_idx) {
                edge.triangles.retain(|&t| t != tri);
            }
        }
        self.triangles.remove(tri);
    }

    /// Removes an edge and unlinks it from both endpoint vertices.
    pub fn remove_edge(&mut self, edge: usize) {
        if let Some(e) = self.edges.get(edge) {
            let (from, to) = (e.from, e.to);
            if let Some(v) = self.vertices.get_mut(from) {
                v.edges.retain(|&e| e != edge);
            }
            if let Some(v) = self.vertices.get_mut(to) {
                v.edges.retain(|&e| e != edge);
            }
        }
        self.edges.remove(edge);
    }

    /// Removes a vertex. The caller must have already removed every edge
    /// incident to it.
    pub fn remove_vertex(&mut self, vertex: usize) {
        debug_assert!(
            self.vertices.get(vertex).map(|v| v.degree()).unwrap_or(0) == 0,
            "removing a vertex that still has incident edges"
        );
        self.vertices.remove(vertex);
    }

    // --- Topological queries ---

    pub fn find_edge(&self, a: usize, b: usize) -> Option<usize> {
        let va = self.vertices.get(a)?;
        for &e in &va.edges {
            let edge = self.edges.get(e)?;
            if edge.from == b || edge.to == b {
                return Some(e);
            }
        }
        None
    }

    pub fn find_triangle(&self, a: usize, b: usize, c: usize) -> Option<usize> {
        let one_edge = self.find_edge(a, b)?;
        let edge = self.edges.get(one_edge)?;
        edge.triangles
            .iter()
            .copied()
            .find(|&t| self.triangles.get(t).map(|tri| tri.is_connected_to(c)).unwrap_or(false))
    }

    /// Finds a triangle bordering both edges `a` and `b`, if one exists.
    pub fn find_common_triangle(&self, a: usize, b: usize) -> Option<usize> {
        let ea = self.edges.get(a)?;
        let eb = self.edges.get(b)?;
        ea.triangles.iter().copied().find(|t| eb.triangles.contains(t))
    }

    pub fn get_triangles_per_vertex(&self, v: usize) -> SmallVec<[usize; 12]> {
        let mut result: SmallVec<[usize; 12]> = SmallVec::new();
        let Some(vertex) = self.vertices.get(v) else {
            return result;
        };
        for &e in &vertex.edges {
            let Some(edge) = self.edges.get(e) else { continue };
            for &t in &edge.triangles {
                if !result.contains(&t) {
                    result.push(t);
                }
            }
        }
        result
    }

    pub fn get_neighbors(&self, v: usize) -> SmallVec<[usize; 12]> {
        let mut result = SmallVec::new();
        let Some(vertex) = self.vertices.get(v) else {
            return result;
        };
        for &e in &vertex.edges {
            if let Some(edge) = self.edges.get(e) {
                result.push(edge.other_vertex(v));
            }
        }
        result
    }

    /// Returns the triangle on the other side of `triangles(tri).edges[side]`
    /// from `tri`, or `None` if that edge is a boundary (or non-manifold)
    /// edge.
    pub fn get_neighboring_triangle(&self, tri: usize, side: usize) -> Option<usize> {
        let edge_idx = self.triangles.get(tri)?.edges[side]?;
        let edge = self.edges.get(edge_idx)?;
        if edge.triangles.len() == 2 {
            Some(if edge.triangles[0] == tri {
                edge.triangles[1]
            } else {
                edge.triangles[0]
            })
        } else {
            None
        }
    }

    // --- Geometrical queries ---

    pub fn normal(&self, tri: usize) -> Option<Vec3> {
        let t = self.triangles.get(tri)?;
        let p0 = self.vertices.get(t.vertices[0])?.pos;
        let p1 = self.vertices.get(t.vertices[1])?.pos;
        let p2 = self.vertices.get(t.vertices[2])?.pos;
        let n = (p1 - p0).cross(&(p2 - p0));
        n.try_normalize(1e-12).or(Some(n))
    }

    pub fn area(&self, tri: usize) -> Option<f64> {
        let t = self.triangles.get(tri)?;
        let p0 = self.vertices.get(t.vertices[0])?.pos;
        let p1 = self.vertices.get(t.vertices[1])?.pos;
        let p2 = self.vertices.get(t.vertices[2])?.pos;
        Some(0.5 * (p1 - p0).cross(&(p2 - p0)).norm())
    }

    pub fn length(&self, edge: usize) -> Option<f64> {
        let e = self.edges.get(edge)?;
        let from = self.vertices.get(e.from)?.pos;
        let to = self.vertices.get(e.to)?.pos;
        Some((from - to).norm())
    }

    pub fn min_interior_angle(&self, tri: usize) -> Option<f64> {
        let t = self.triangles.get(tri)?;
        let p: Vec<Vec3> = t
            .vertices
            .iter()
            .map(|&v| self.vertices.get(v).map(|vd| vd.pos))
            .collect::<Option<_>>()?;
        let mut min_angle = std::f64::consts::TAU;
        for i in 0..3 {
            let a = p[(i + 1) % 3] - p[i];
            let b = p[(i + 2) % 3] - p[i];
            let angle = (a.dot(&b) / (a.norm() * b.norm())).clamp(-1.0, 1.0).acos();
            if angle < min_angle {
                min_angle = angle;
            }
        }
        Some(min_angle)
    }

    pub fn aspect_ratio(&self, tri: usize) -> Option<f64> {
        let t = self.triangles.get(tri)?;
        let p0 = self.vertices.get(t.vertices[0])?.pos;
        let p1 = self.vertices.get(t.vertices[1])?.pos;
        let p2 = self.vertices.get(t.vertices[2])?.pos;
        let a = (p1 - p0).norm();
        let b = (p2 - p1).norm();
        let c = (p0 - p2).norm();
        Some((2.0 * a * b * c / ((-a + b + c) * (a - b + c) * (a + b - c))).abs())
    }

    pub fn dihedral_angle(&self, first: usize, second: usize) -> Option<f64> {
        let n1 = self.normal(first)?;
        let n2 = self.normal(second)?;
        let scal = n1.dot(&n2).clamp(-1.0, 1.0);
        let t1 = self.triangles.get(first)?;
        let t2 = self.triangles.get(second)?;
        Some(if t1.is_correctly_oriented(t2) {
            (-scal).acos()
        } else {
            scal.acos()
        })
    }

    /// Tests whether triangle `tri` intersects the segment `(p, q)`, returning
    /// the intersection point (Cramer's rule solve of the ray/plane system),
    /// and falling back to a 2D projected test when the triangle and segment
    /// are coplanar.
    pub fn triangle_edge_intersection(
        &self,
        tri: usize,
        p: Vec3,
        q: Vec3,
        eps: f64,
    ) -> Option<TriangleEdgeIntersection> {
        let t = self.triangles.get(tri)?;
        let a = self.vertices.get(t.vertices[0])?.pos;
        let b = self.vertices.get(t.vertices[1])?.pos;
        let c = self.vertices.get(t.vertices[2])?.pos;

        let mat = nalgebra::Matrix3::from_columns(&[b - a, c - a, p - q]);
        let det = mat.determinant();

        if det < -eps || det > eps {
            let nu = nalgebra::Matrix3::from_columns(&[b - a, c - a, p - a]).determinant() / det;
            if !(-eps..=1.0 + eps).contains(&nu) {
                return None;
            }
            let lambda = nalgebra::Matrix3::from_columns(&[p - a, c - a, p - q]).determinant() / det;
            if lambda < -eps {
                return None;
            }
            let mu = nalgebra::Matrix3::from_columns(&[b - a, p - a, p - q]).determinant() / det;
            if mu < -eps {
                return None;
            }
            if lambda + mu > 1.0 + eps {
                return None;
            }
            Some(TriangleEdgeIntersection {
                point: p + nu * (q - p),
                parallel: false,
            })
        } else {
            let alpha = nalgebra::Matrix3::from_columns(&[b - a, c - a, p - a]).determinant();
            if alpha < -eps || alpha > eps {
                return None;
            }

            let normal = (b - a).cross(&(c - a)).abs();
            let axis = if normal.x >= normal.y && normal.x >= normal.z {
                0
            } else if normal.y >= normal.z {
                1
            } else {
                2
            };
            let proj = |v: Vec3| -> nalgebra::Vector2<f64> {
                match axis {
                    0 => nalgebra::Vector2::new(v.y, v.z),
                    1 => nalgebra::Vector2::new(v.z, v.x),
                    _ => nalgebra::Vector2::new(v.x, v.y),
                }
            };
            let (a2, b2, c2, p2, q2) = (proj(a), proj(b), proj(c), proj(p), proj(q));

            let intersects = point_in_triangle_2d(p2, a2, b2, c2, eps)
                || point_in_triangle_2d(q2, a2, b2, c2, eps)
                || line_intersection_2d(p2, q2, a2, b2, eps)
                || line_intersection_2d(p2, q2, b2, c2, eps)
                || line_intersection_2d(p2, q2, a2, c2, eps);

            intersects.then_some(TriangleEdgeIntersection {
                point: p,
                parallel: true,
            })
        }
    }

    // --- Garbage collection ---

    /// Compacts vertices, edges and triangles, rewriting every
    /// cross-reference to match. Mirrors the original's three-sweep
    /// offset-table approach but applies the rewrite as part of each
    /// `compact()` call instead of a hand-rolled offset array.
    ///
    /// Returns the three `old_index -> new_index` maps so a caller that
    /// keeps data parallel to the triangle array (the planar-graph store in
    /// [`crate::psurface::PSurface`]) can reindex it in lockstep.
    pub fn garbage_collection(&mut self) -> GcMaps {
        let vertex_map = self.vertices.compact();
        for e in self.edges.items.iter_mut().flatten() {
            e.from = vertex_map[e.from].expect("edge references a freed vertex");
            e.to = vertex_map[e.to].expect("edge references a freed vertex");
        }
        for t in self.triangles.items.iter_mut().flatten() {
            for v in t.vertices.iter_mut() {
                *v = vertex_map[*v].expect("triangle references a freed vertex");
            }
        }

        let edge_map = self.edges.compact();
        for v in self.vertices.items.iter_mut().flatten() {
            v.edges.retain(|e| edge_map[*e].is_some());
            for e in v.edges.iter_mut() {
                *e = edge_map[*e].expect("already filtered");
            }
        }
        for t in self.triangles.items.iter_mut().flatten() {
            for e in t.edges.iter_mut() {
                *e = e.and_then(|idx| edge_map[idx]);
            }
        }

        let triangle_map = self.triangles.compact();
        for e in self.edges.items.iter_mut().flatten() {
            e.triangles.retain(|t| triangle_map[*t].is_some());
            for t in e.triangles.iter_mut() {
                *t = triangle_map[*t].expect("already filtered");
            }
        }

        tracing::debug!(
            vertices = self.vertices.len(),
            edges = self.edges.len(),
            triangles = self.triangles.len(),
            "garbage collection finished"
        );

        GcMaps {
            vertices: vertex_map,
            edges: edge_map,
            triangles: triangle_map,
        }
    }
}

/// `old_index -> new_index` renumbering produced by one
/// [`SurfaceBase::garbage_collection`] pass; `None` means the old index was
/// freed.
#[derive(Debug, Clone)]
pub struct GcMaps {
    pub vertices: Vec<Option<usize>>,
    pub edges: Vec<Option<usize>>,
    pub triangles: Vec<Option<usize>>,
}

fn point_in_triangle_2d(
    p: nalgebra::Vector2<f64>,
    a: nalgebra::Vector2<f64>,
    b: nalgebra::Vector2<f64>,
    c: nalgebra::Vector2<f64>,
    eps: f64,
) -> bool {
    let sign = |p1: nalgebra::Vector2<f64>, p2: nalgebra::Vector2<f64>, p3: nalgebra::Vector2<f64>| {
        (p1.x - p3.x) * (p2.y - p3.y) - (p2.x - p3.x) * (p1.y - p3.y)
    };
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);
    let has_neg = d1 < -eps || d2 < -eps || d3 < -eps;
    let has_pos = d1 > eps || d2 > eps || d3 > eps;
    !(has_neg && has_pos)
}

fn line_intersection_2d(
    p1: nalgebra::Vector2<f64>,
    p2: nalgebra::Vector2<f64>,
    p3: nalgebra::Vector2<f64>,
    p4: nalgebra::Vector2<f64>,
    eps: f64,
) -> bool {
    let a = p2 - p1;
    let b = p3 - p4;
    let c = p1 - p3;

    let det = a.y * b.x - a.x * b.y;

    if (-eps..=eps).contains(&det) {
        let base = (p1 - p2).norm();
        let base2 = (p3 - p4).norm();
        return ((p3 - p1).norm() + (p3 - p2).norm()) / base < 1.0 + eps
            || ((p4 - p1).norm() + (p4 - p2).norm()) / base < 1.0 + eps
            || ((p2 - p3).norm() + (p2 - p4).norm()) / base2 < 1.0 + eps
            || ((p1 - p3).norm() + (p1 - p4).norm()) / base2 < 1.0 + eps;
    }

    let mu = (a.x * c.y - a.y * c.x) / det;
    let lambda = (b.y * c.x - b.x * c.y) / det;

    mu > -eps && mu < 1.0 + eps && lambda > -eps && lambda < 1.0 + eps
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle(base: &mut SurfaceBase) -> usize {
        let a = base.new_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = base.new_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = base.new_vertex(Vec3::new(0.0, 1.0, 0.0));
        let tri = base.create_space_for_triangle(a, b, c);
        base.integrate_triangle(tri);
        tri
    }

    #[test]
    fn slotted_reuses_freed_slots() {
        let mut s: Slotted<i32> = Slotted::new();
        let a = s.insert(1);
        let b = s.insert(2);
        s.remove(a);
        let c = s.insert(3);
        assert_eq!(c, a);
        assert_eq!(s.len(), 2);
        assert_eq!(*s.get(b).unwrap(), 2);
    }

    #[test]
    fn integrate_triangle_creates_edges() {
        let mut base = SurfaceBase::new();
        let tri = unit_triangle(&mut base);
        assert_eq!(base.num_edges(), 3);
        let t = base.triangle(tri).unwrap();
        assert!(t.edges.iter().all(|e| e.is_some()));
    }

    #[test]
    fn shared_edge_links_two_triangles() {
        let mut base = SurfaceBase::new();
        let a = base.new_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = base.new_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = base.new_vertex(Vec3::new(0.0, 1.0, 0.0));
        let d = base.new_vertex(Vec3::new(1.0, 1.0, 0.0));

        let t0 = base.create_space_for_triangle(a, b, c);
        base.integrate_triangle(t0);
        let t1 = base.create_space_for_triangle(b, d, c);
        base.integrate_triangle(t1);

        let shared = base.find_edge(b, c).expect("shared edge must exist");
        assert_eq!(base.edge(shared).unwrap().triangles.len(), 2);

        let side = base
            .triangle(t0)
            .unwrap()
            .edges
            .iter()
            .position(|e| *e == Some(shared))
            .unwrap();
        assert_eq!(base.get_neighboring_triangle(t0, side), Some(t1));
    }

    #[test]
    fn area_and_normal_of_unit_triangle() {
        let mut base = SurfaceBase::new();
        let tri = unit_triangle(&mut base);
        assert_relative_eq!(base.area(tri).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(base.normal(tri).unwrap(), Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn garbage_collection_compacts_and_renumbers() {
        let mut base = SurfaceBase::new();
        let a = base.new_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = base.new_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = base.new_vertex(Vec3::new(0.0, 1.0, 0.0));
        let d = base.new_vertex(Vec3::new(2.0, 2.0, 2.0));

        let t0 = base.create_space_for_triangle(a, b, c);
        base.integrate_triangle(t0);

        base.remove_vertex(d);
        assert_eq!(base.num_vertices(), 3);
        assert_eq!(base.vertices.slot_count(), 4);

        base.garbage_collection();
        assert_eq!(base.vertices.slot_count(), 3);
        assert_eq!(base.num_triangles(), 1);

        let t = base.triangle(0).unwrap();
        assert!(t.vertices.iter().all(|&v| v < 3));
    }

    #[test]
    fn triangle_edge_intersection_hits_through_plane() {
        let mut base = SurfaceBase::new();
        let tri = unit_triangle(&mut base);
        let hit = base
            .triangle_edge_intersection(tri, Vec3::new(0.2, 0.2, 1.0), Vec3::new(0.2, 0.2, -1.0), 1e-9)
            .expect("segment through the triangle must intersect");
        assert!(!hit.parallel);
        assert_relative_eq!(hit.point.z, 0.0, epsilon = 1e-9);
    }

    /// A triangle strip over 100 vertices, removing every odd triangle and
    /// garbage-collecting, matching the "insert 100 vertices, 50 triangles"
    /// round-trip scenario.
    #[test]
    fn garbage_collection_preserves_queries_over_a_strip() {
        let mut base = SurfaceBase::new();
        let verts: Vec<usize> = (0..100).map(|i| base.new_vertex(Vec3::new(i as f64, (i % 2) as f64, 0.0))).collect();

        let mut tris = Vec::new();
        for i in 0..50 {
            let t = base.create_space_for_triangle(verts[i], verts[i + 1], verts[i + 2]);
            base.integrate_triangle(t);
            tris.push(t);
        }
        assert_eq!(base.num_triangles(), 50);

        for (i, &t) in tris.iter().enumerate() {
            if i % 2 == 1 {
                base.remove_triangle(t);
            }
        }
        assert_eq!(base.num_triangles(), 25);

        base.garbage_collection();
        assert_eq!(base.num_triangles(), 25);
        for (_, t) in base.triangles_iter() {
            for &v in &t.vertices {
                assert!(v < base.num_vertices());
            }
        }
    }

    #[test]
    fn triangle_edge_intersection_misses_outside_triangle() {
        let mut base = SurfaceBase::new();
        let tri = unit_triangle(&mut base);
        let hit = base.triangle_edge_intersection(tri, Vec3::new(5.0, 5.0, 1.0), Vec3::new(5.0, 5.0, -1.0), 1e-9);
        assert!(hit.is_none());
    }
}
