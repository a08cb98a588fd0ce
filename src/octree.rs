//! A bounded-box point octree used by the contact oracle to answer
//! "which points fall in this query box" without scanning every point.
//!
//! Mirrors `MultiDimOctree`/`PointIntersectionFunctor` as used in
//! `buildContactSurface.cpp`: points are inserted once up front with a
//! payload (there, the point's own index; here, a generic `T`), and queried
//! by axis-aligned box. Unlike the bucketed voxel-LOD octree elsewhere in
//! this workspace, this tree stores leaf data (points), not volume state, so
//! it subdivides only when a leaf overflows a small capacity.

use crate::geom::Box3;
use nalgebra::Point3;

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: u32 = 20;

enum Node<T> {
    Leaf(Vec<(Point3<f64>, T)>),
    Branch(Box<[Node<T>; 8]>),
}

/// A point octree over a fixed bounding box, queryable by axis-aligned box.
pub struct MultiDimOctree<T> {
    bounds: Box3,
    root: Node<T>,
}

impl<T> MultiDimOctree<T> {
    /// Creates an empty octree over `bounds`. Points inserted outside
    /// `bounds` are still accepted (the root box is not shrunk or enforced),
    /// matching the original's behavior of fixing the octree extent from the
    /// surface bounding box up front.
    pub fn new(bounds: Box3) -> Self {
        Self {
            bounds,
            root: Node::Leaf(Vec::new()),
        }
    }

    /// Inserts `point` with an associated `payload`.
    pub fn insert(&mut self, point: Point3<f64>, payload: T) {
        Self::insert_into(&mut self.root, self.bounds, point, payload, 0);
    }

    fn insert_into(node: &mut Node<T>, bounds: Box3, point: Point3<f64>, payload: T, depth: u32) {
        match node {
            Node::Leaf(items) => {
                if items.len() < LEAF_CAPACITY || depth >= MAX_DEPTH {
                    items.push((point, payload));
                    return;
                }
                let drained: Vec<_> = items.drain(..).collect();
                let children = Self::split(bounds);
                *node = Node::Branch(Box::new(children.map(|_| Node::Leaf(Vec::new()))));
                let kids = match node {
                    Node::Branch(kids) => kids,
                    Node::Leaf(_) => unreachable!(),
                };
                for (p, item_payload) in drained {
                    let idx = Self::octant_index(bounds, &p);
                    Self::insert_into(&mut kids[idx], children[idx], p, item_payload, depth + 1);
                }
                let idx = Self::octant_index(bounds, &point);
                Self::insert_into(&mut kids[idx], children[idx], point, payload, depth + 1);
            }
            Node::Branch(kids) => {
                let idx = Self::octant_index(bounds, &point);
                let child_bounds = Self::split(bounds)[idx];
                Self::insert_into(&mut kids[idx], child_bounds, point, payload, depth + 1);
            }
        }
    }

    fn split(bounds: Box3) -> [Box3; 8] {
        let c = bounds.center();
        let mut out = [Box3::new(bounds.min, bounds.max); 8];
        for (i, b) in out.iter_mut().enumerate() {
            let x_lo = (i & 1) == 0;
            let y_lo = (i & 2) == 0;
            let z_lo = (i & 4) == 0;
            let min = Point3::new(
                if x_lo { bounds.min.x } else { c.x },
                if y_lo { bounds.min.y } else { c.y },
                if z_lo { bounds.min.z } else { c.z },
            );
            let max = Point3::new(
                if x_lo { c.x } else { bounds.max.x },
                if y_lo { c.y } else { bounds.max.y },
                if z_lo { c.z } else { bounds.max.z },
            );
            *b = Box3::new(min, max);
        }
        out
    }

    fn octant_index(bounds: Box3, p: &Point3<f64>) -> usize {
        let c = bounds.center();
        let mut idx = 0;
        if p.x >= c.x {
            idx |= 1;
        }
        if p.y >= c.y {
            idx |= 2;
        }
        if p.z >= c.z {
            idx |= 4;
        }
        idx
    }

    /// Returns references to the payloads of every point contained in
    /// `query_box`, matching `MultiDimOctree::lookupIndex`.
    pub fn query_box(&self, query_box: &Box3) -> Vec<&T> {
        let mut out = Vec::new();
        Self::query_into(&self.root, self.bounds, query_box, &mut out);
        out
    }

    fn query_into<'a>(node: &'a Node<T>, bounds: Box3, query_box: &Box3, out: &mut Vec<&'a T>) {
        if !bounds.overlaps(query_box) {
            return;
        }
        match node {
            Node::Leaf(items) => {
                for (p, payload) in items {
                    if query_box.contains_point(p) {
                        out.push(payload);
                    }
                }
            }
            Node::Branch(kids) => {
                let children = Self::split(bounds);
                for (kid, child_bounds) in kids.iter().zip(children.iter()) {
                    Self::query_into(kid, *child_bounds, query_box, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bounds() -> Box3 {
        Box3::new(Point3::origin(), Point3::new(10.0, 10.0, 10.0))
    }

    #[test]
    fn finds_inserted_points_within_query_box() {
        let mut tree = MultiDimOctree::new(unit_bounds());
        for i in 0..50 {
            let f = i as f64;
            tree.insert(Point3::new(f * 0.2, f * 0.2, f * 0.2), i);
        }
        let hits = tree.query_box(&Box3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)));
        assert!(hits.contains(&&0));
        assert!(!hits.is_empty());
        for &&idx in &hits {
            let f = idx as f64 * 0.2;
            assert!((0.0..=1.0).contains(&f));
        }
    }

    #[test]
    fn query_outside_bounds_returns_empty() {
        let mut tree = MultiDimOctree::new(unit_bounds());
        tree.insert(Point3::new(1.0, 1.0, 1.0), "a");
        let hits = tree.query_box(&Box3::new(Point3::new(50.0, 50.0, 50.0), Point3::new(60.0, 60.0, 60.0)));
        assert!(hits.is_empty());
    }
}
