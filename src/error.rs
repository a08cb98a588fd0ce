//! Error types for parametrization construction.

/// Result type alias for parametrization operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or querying a [`crate::psurface::PSurface`].
///
/// `NotFound`-style outcomes (`find_edge`, `find_triangle`, ...) are not part
/// of this enum: they are expected control flow and are returned as `Option`
/// from the arena directly.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A mesh index was out of range, or integrating a triangle would make
    /// an edge non-manifold, or the triangle is degenerate (zero area).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A point could not be projected: Newton iteration failed to converge,
    /// or no domain/target triangle within tolerance exists. Recoverable —
    /// the caller skips the offending vertex/edge and continues.
    #[error("geometry not projectable: {0}")]
    GeometryNotProjectable(String),

    /// An internal consistency check failed (a planar sub-triangle wasn't a
    /// triangle, a free index was referenced live). Only raised by
    /// debug-only consistency checks; indicates a bug in this crate.
    #[error("invariant violation at {where_}: {detail}")]
    InvariantViolation { where_: &'static str, detail: String },
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn not_projectable(msg: impl Into<String>) -> Self {
        Error::GeometryNotProjectable(msg.into())
    }

    pub fn invariant(where_: &'static str, detail: impl Into<String>) -> Self {
        Error::InvariantViolation {
            where_,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = Error::invalid_input("triangle has zero area");
        assert_eq!(e.to_string(), "invalid input: triangle has zero area");

        let e = Error::not_projectable("Newton did not converge");
        assert_eq!(
            e.to_string(),
            "geometry not projectable: Newton did not converge"
        );

        let e = Error::invariant("create_point_location_structure", "non-triangular face");
        assert_eq!(
            e.to_string(),
            "invariant violation at create_point_location_structure: non-triangular face"
        );
    }
}
