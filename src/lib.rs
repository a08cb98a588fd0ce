// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # psurface-core
//!
//! A piecewise-linear parametrization between two triangulated 2-surfaces,
//! built by normal projection.
//!
//! Given a domain (base) mesh and a target mesh, this crate builds a map
//! `φ` that sends every point of the domain mesh to a point on the target
//! mesh: continuous, piecewise-affine on sub-triangles of each domain
//! triangle, and locally inverting a normal projection from the target back
//! onto the domain. The representation supports fast point evaluation
//! ([`psurface::PSurface::map`]): given a domain point, produce the target
//! triangle and the barycentric coordinates of its image.
//!
//! ## Layout
//!
//! - [`geom`] — barycentric/3D vector aliases and the axis-aligned [`geom::Box3`].
//! - [`octree`] — a bounded-box point octree, the contact oracle's spatial index.
//! - [`arena`] — [`arena::SurfaceBase`], the indexed vertex/edge/triangle mesh arena.
//! - [`surface`] — [`surface::Surface`], the plain (unparametrized) target mesh.
//! - [`planar_graph`] — [`planar_graph::DomainTriangle`], the per-triangle node graph.
//! - [`psurface`] — [`psurface::PSurface`], coupling the arena, the planar graphs
//!   and the shared image-position table, and exposing `map`.
//! - [`contact`] — the contact oracle selecting the overlapping sub-mesh of two surfaces.
//! - [`normal_projector`] — inverse-normal-projection Newton solves and edge stitching.
//! - [`factory`] — [`factory::PSurfaceFactory`], the ordered construction façade.
//! - [`contact_mapping`] — the public `build_contact_mapping` / `get_merged_grid` entry point.
//!
//! Single-threaded throughout; no operation suspends. A [`psurface::PSurface`]
//! becomes safe to read from multiple callers once
//! [`psurface::PSurface::create_point_location_structure`] has run.

pub mod arena;
pub mod config;
pub mod contact;
pub mod contact_mapping;
pub mod error;
pub mod factory;
pub mod geom;
pub mod normal_projector;
pub mod octree;
pub mod planar_graph;
pub mod psurface;
pub mod surface;

pub use contact_mapping::{build_contact_mapping, delete_contact_surface, get_merged_grid, ContactSurfaceHandle};
pub use error::{Error, Result};
pub use psurface::PSurface;
pub use surface::Surface;
