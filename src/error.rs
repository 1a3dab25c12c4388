//! Error types for mender.
//!
//! Defects of individual faces handed to the builder are not errors: they
//! are counted in the [`BuildReport`](crate::mesh::BuildReport). Errors are
//! reserved for misuse of the API and for input that cannot be represented.

use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh operations.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references a vertex index that cannot be represented.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// The mesh has non-manifold topology.
    #[error("mesh has non-manifold topology: {details}")]
    NonManifold {
        /// Description of the non-manifold condition.
        details: String,
    },

    /// The index type cannot address another element.
    #[error("index type cannot address more than {max} {element}")]
    IndexOverflow {
        /// The kind of element that ran out ("vertices", "half-edges", ...).
        element: &'static str,
        /// The largest number of elements of that kind.
        max: usize,
    },

    /// An operation was called in the wrong builder state.
    #[error("invalid builder state: {0}")]
    InvalidState(String),
}
