//! Core mesh data structures.
//!
//! This module provides the half-edge mesh representation and the builder
//! that fills it from arbitrary polygon soups.
//!
//! # Overview
//!
//! The primary type is [`HalfEdgeMesh`], which represents a polygon mesh using
//! a half-edge (doubly-connected edge list) data structure. Vertex positions
//! and any other per-element attributes live in named properties (see
//! [`PropertyContainer`]).
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`HalfEdgeId`] - Identifies a half-edge
//! - [`FaceId`] - Identifies a face
//! - [`EdgeId`] - Identifies a full edge
//!
//! These indices are generic over the underlying integer type ([`MeshIndex`] trait),
//! allowing you to choose `u16`, `u32`, or `u64` based on mesh size.
//!
//! # Construction
//!
//! [`HalfEdgeMesh::add_face`] only accepts faces that keep the mesh
//! manifold. Input that may not, such as faces read from a file, goes through
//! the [`ManifoldBuilder`], or through one of the `build_from_*` functions:
//!
//! ```
//! use mender::mesh::{HalfEdgeMesh, build_from_triangles};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let (mesh, report): (HalfEdgeMesh, _) = build_from_triangles(&vertices, &faces).unwrap();
//! assert!(!report.has_issues());
//! ```

mod builder;
mod halfedge;
mod index;
mod property;

pub use builder::{
    build_from_polygons, build_from_quads, build_from_triangles, resolve_non_manifold_vertices,
    to_face_vertex, BuildReport, BuilderOptions, ManifoldBuilder, RejectedFaces, COPIED_PROPERTY,
    ORIGINAL_VERTEX_PROPERTY,
};
pub use halfedge::{
    Face, FaceHalfEdgeIter, HalfEdge, HalfEdgeMesh, Vertex, VertexHalfEdgeIter, POINT_PROPERTY,
};
pub use index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId};
pub use property::{Property, PropertyContainer};
