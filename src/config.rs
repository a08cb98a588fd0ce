//! Numerical tolerances for projection and geometry construction.
//!
//! These are threaded explicitly into the routines that need them rather
//! than read from global/ambient state, the same way the teacher crate
//! threads `SpatialIndex::new(cell_size)` rather than reaching for a global
//! tolerance.

/// Tolerances and iteration limits used while building a parametrization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionConfig {
    /// Geometric tolerance, relative to unit-box coordinates. Used for
    /// degenerate-triangle checks, parallel-edge detection, and
    /// point-on-edge snapping.
    pub eps_geom: f64,
    /// Maximum number of Newton iterations before a projection step is
    /// reported as non-convergent.
    pub newton_max_iter: u32,
    /// Convergence threshold on the Newton step norm.
    pub newton_tolerance: f64,
    /// Slack added to the `0 <= u, v, u+v <= 1` containment test when
    /// accepting a Newton solution, so points landing just outside a
    /// triangle due to floating point error are not spuriously rejected.
    pub newton_containment_slack: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            eps_geom: 1e-6,
            newton_max_iter: 30,
            newton_tolerance: 1e-10,
            newton_containment_slack: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = ProjectionConfig::default();
        assert_eq!(cfg.eps_geom, 1e-6);
        assert_eq!(cfg.newton_max_iter, 30);
        assert_eq!(cfg.newton_containment_slack, 0.1);
    }
}
