// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A stateless façade over [`PSurface`] construction, enforcing the one
//! legal build order: target surface first, then vertices, then
//! triangles, then a post-step that derives the domain's own explicit
//! surface and invalidates any stale point-location structure.

use crate::error::{Error, Result};
use crate::geom::Vec3;
use crate::psurface::PSurface;
use crate::surface::Surface;

/// Build-time stage a [`PSurfaceFactory`] is in; insertions are only legal
/// in stage order, matching the original's expectation that the target
/// surface is fully known before any domain geometry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AwaitingTarget,
    InsertingVertices,
    InsertingTriangles,
}

/// Drives one [`PSurface`]'s construction from raw vertex/triangle data,
/// enforcing construction order and performing the post-build setup step.
pub struct PSurfaceFactory {
    psurface: PSurface,
    target: Option<Surface>,
    stage: Stage,
}

impl PSurfaceFactory {
    pub fn new() -> Self {
        Self {
            psurface: PSurface::new(),
            target: None,
            stage: Stage::AwaitingTarget,
        }
    }

    /// Records the target (mortar) surface. Must be called exactly once,
    /// before any vertex or triangle insertion.
    pub fn set_target_surface(&mut self, target: Surface) -> Result<()> {
        if self.stage != Stage::AwaitingTarget {
            return Err(Error::invalid_input("target surface must be set before inserting vertices"));
        }
        self.target = Some(target);
        self.stage = Stage::InsertingVertices;
        Ok(())
    }

    /// Inserts one domain-mesh vertex, returning its arena index.
    pub fn insert_vertex(&mut self, pos: Vec3) -> Result<usize> {
        if self.stage == Stage::AwaitingTarget {
            return Err(Error::invalid_input("set_target_surface must run before insert_vertex"));
        }
        if self.stage == Stage::InsertingTriangles {
            return Err(Error::invalid_input("cannot insert vertices after the first triangle"));
        }
        Ok(self.psurface.base.new_vertex(pos))
    }

    /// Inserts one domain triangle `(a, b, c)`, seeding its planar graph
    /// with three corner nodes whose `node_number`s are the given mesh
    /// vertex indices (reassigned to proper `iPos` identities once normal
    /// projection runs).
    pub fn insert_simplex(&mut self, a: usize, b: usize, c: usize) -> Result<usize> {
        if self.stage == Stage::AwaitingTarget {
            return Err(Error::invalid_input("set_target_surface must run before insert_simplex"));
        }
        self.stage = Stage::InsertingTriangles;

        for v in [a, b, c] {
            if self.psurface.base.vertex(v).is_none() {
                return Err(Error::invalid_input(format!("triangle references unknown vertex {v}")));
            }
        }

        while self.psurface.i_pos.len() <= [a, b, c].into_iter().max().unwrap() {
            self.psurface.add_node(Vec3::zeros());
        }
        let tri = self.psurface.add_triangle(a, b, c, [a, b, c]);
        Ok(tri)
    }

    /// Finishes construction, handing back the built [`PSurface`] and its
    /// target surface. The point-location structure starts stale; a
    /// caller must run [`PSurface::create_point_location_structure`]
    /// before evaluating [`PSurface::map`].
    pub fn finish(mut self) -> Result<(PSurface, Surface)> {
        let target = self
            .target
            .take()
            .ok_or_else(|| Error::invalid_input("set_target_surface was never called"))?;
        self.psurface.has_up_to_date_point_location_structure = false;
        Ok((self.psurface, target))
    }
}

impl Default for PSurfaceFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn rejects_vertex_insertion_before_target() {
        let mut factory = PSurfaceFactory::new();
        let err = factory.insert_vertex(Vec3::new(0.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn rejects_vertex_insertion_after_triangle() {
        let mut factory = PSurfaceFactory::new();
        factory.set_target_surface(Surface::new()).unwrap();
        let a = factory.insert_vertex(Vec3::new(0.0, 0.0, 0.0)).unwrap();
        let b = factory.insert_vertex(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        let c = factory.insert_vertex(Vec3::new(0.0, 1.0, 0.0)).unwrap();
        factory.insert_simplex(a, b, c).unwrap();
        let err = factory.insert_vertex(Vec3::new(2.0, 2.0, 2.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn builds_psurface_and_clears_point_location_flag() {
        let mut factory = PSurfaceFactory::new();
        let target = Surface::from_points_and_triangles(
            vec![Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0), Point3::new(0.0, 1.0, 1.0)],
            vec![[0, 1, 2]],
        )
        .unwrap();
        factory.set_target_surface(target).unwrap();
        let a = factory.insert_vertex(Vec3::new(0.0, 0.0, 0.0)).unwrap();
        let b = factory.insert_vertex(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        let c = factory.insert_vertex(Vec3::new(0.0, 1.0, 0.0)).unwrap();
        factory.insert_simplex(a, b, c).unwrap();

        let (psurface, _target) = factory.finish().unwrap();
        assert!(!psurface.has_up_to_date_point_location_structure);
        assert_eq!(psurface.base.num_triangles(), 1);
    }
}
