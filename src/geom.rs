//! Fixed-width vector and box primitives.
//!
//! Barycentric coordinates and 3D positions are represented with `nalgebra`'s
//! stack-allocated vector types rather than a hand-rolled fixed array, the
//! same choice the geometry and topology crates in this workspace make
//! throughout. [`Box3`] is the one primitive `nalgebra` doesn't provide: a
//! mutable axis-aligned bounding box used by the octree and the contact
//! oracle.

use nalgebra::{Point3, Vector2, Vector3};

/// A barycentric coordinate pair `(b0, b1)`; the third weight is always
/// `1 - b0 - b1` and is not stored, matching the two-of-three convention in
/// the data model.
pub type Barycentric = Vector2<f64>;

/// A point or displacement in the domain/target embedding space.
pub type Vec3 = Vector3<f64>;

/// Returns the full three barycentric weights `(b0, b1, b2)` for a stored
/// pair.
pub fn full_barycentric(b: &Barycentric) -> (f64, f64, f64) {
    (1.0 - b.x - b.y, b.x, b.y)
}

/// An axis-aligned bounding box in 3D, inclusive of its boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box3 {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Box3 {
    /// Creates a box from two corners, taking the componentwise min/max so
    /// the arguments need not already be ordered.
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Creates a degenerate box containing a single point.
    pub fn from_point(p: Point3<f64>) -> Self {
        Self { min: p, max: p }
    }

    /// Grows the box to also contain `p`.
    pub fn extend_by(&mut self, p: Point3<f64>) {
        self.min = Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    /// Grows the box by `eps` on every side.
    pub fn extend_by_eps(&mut self, eps: f64) {
        let e = Vector3::new(eps, eps, eps);
        self.min -= e;
        self.max += e;
    }

    /// Returns `true` if `p` lies within the (inclusive) box.
    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns `true` if the two boxes share any point, boundary included.
    pub fn overlaps(&self, other: &Box3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Returns the smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Box3) -> Box3 {
        Box3 {
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// Returns the overlap of `self` and `other`, or `None` if they are
    /// disjoint along any axis (a degenerate, zero-volume overlap on a
    /// shared face or edge is still returned as `Some`).
    pub fn intersect(&self, other: &Box3) -> Option<Box3> {
        let min = Point3::new(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.min.z.max(other.min.z),
        );
        let max = Point3::new(
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
            self.max.z.min(other.max.z),
        );
        (min.x <= max.x && min.y <= max.y && min.z <= max.z).then_some(Box3 { min, max })
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_barycentric_sums_to_one() {
        let b = Barycentric::new(0.25, 0.25);
        let (b0, b1, b2) = full_barycentric(&b);
        assert!((b0 + b1 + b2 - 1.0).abs() < 1e-12);
        assert!((b0 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn box_contains_and_overlap() {
        let b = Box3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert!(b.contains_point(&Point3::new(0.5, 0.5, 0.5)));
        assert!(!b.contains_point(&Point3::new(1.5, 0.0, 0.0)));

        let touching = Box3::new(Point3::new(1.0, 1.0, 1.0), Point3::new(2.0, 2.0, 2.0));
        assert!(b.overlaps(&touching));

        let disjoint = Box3::new(Point3::new(2.0, 2.0, 2.0), Point3::new(3.0, 3.0, 3.0));
        assert!(!b.overlaps(&disjoint));
    }

    #[test]
    fn extend_by_eps_grows_symmetrically() {
        let mut b = Box3::from_point(Point3::origin());
        b.extend_by_eps(0.1);
        assert!((b.min.x + 0.1).abs() < 1e-12);
        assert!((b.max.x - 0.1).abs() < 1e-12);
    }
}
