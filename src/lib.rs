//! # Mender
//!
//! Half-edge polygon meshes built from imperfect input.
//!
//! Mesh files routinely contain faces that a half-edge structure cannot
//! represent as they are: vertices shared by several separate fans, edges
//! used twice in the same direction, duplicated faces. Mender builds a valid,
//! manifold half-edge mesh from such input by duplicating vertices where
//! needed, and reports what it found.
//!
//! ## Features
//!
//! - **Half-edge data structure**: O(1) adjacency queries with type-safe indices
//! - **Flexible indexing**: Support for 16-bit, 32-bit, and 64-bit indices
//! - **Generic properties**: named per-vertex, half-edge, edge and face attributes
//! - **Manifold repair**: non-manifold vertices and edges are split apart,
//!   defective faces are counted and skipped
//!
//! ## Building Meshes Programmatically
//!
//! ```
//! use mender::prelude::*;
//! use nalgebra::Point3;
//!
//! // Define vertices and faces
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//!
//! let faces = vec![
//!     [0, 2, 1],  // bottom
//!     [0, 1, 3],  // front
//!     [1, 2, 3],  // right
//!     [2, 0, 3],  // left
//! ];
//!
//! // Build the mesh
//! let (mesh, report): (HalfEdgeMesh, _) = build_from_triangles(&vertices, &faces).unwrap();
//! assert_eq!(mesh.num_vertices(), 4);
//! assert_eq!(mesh.num_faces(), 4);
//! assert!(!report.has_issues());
//! ```
//!
//! ## Repairing Input
//!
//! ```
//! use mender::prelude::*;
//! use nalgebra::Point3;
//!
//! let mut mesh: HalfEdgeMesh = HalfEdgeMesh::new();
//! let mut builder = ManifoldBuilder::new(&mut mesh);
//! builder.begin_surface().unwrap();
//!
//! let v: Vec<VertexId> = (0..5)
//!     .map(|i| builder.add_vertex(Point3::new(i as f64, 0.0, 0.0)).unwrap())
//!     .collect();
//!
//! // Two triangles touching at v[0] only, and a broken face.
//! builder.add_triangle(v[0], v[1], v[2]).unwrap();
//! builder.add_triangle(v[0], v[3], v[4]).unwrap();
//! assert_eq!(builder.add_face(&[v[1], v[1], v[2]]).unwrap(), None);
//!
//! let report = builder.end_surface(true).unwrap();
//! assert_eq!(report.rejected.duplicated_vertices, 1);
//! assert_eq!(report.num_vertices, 6);
//! ```
//!
//! ## Mesh Traversal
//!
//! The half-edge structure enables efficient traversal of mesh elements:
//!
//! ```
//! use mender::prelude::*;
//! use nalgebra::Point3;
//!
//! # let vertices = vec![
//! #     Point3::new(0.0, 0.0, 0.0),
//! #     Point3::new(1.0, 0.0, 0.0),
//! #     Point3::new(0.5, 1.0, 0.0),
//! # ];
//! # let faces = vec![[0, 1, 2]];
//! # let (mesh, _): (HalfEdgeMesh, _) = build_from_triangles(&vertices, &faces).unwrap();
//! // Iterate over neighbors of a vertex
//! let v = VertexId::new(0);
//! for neighbor in mesh.vertex_neighbors(v) {
//!     println!("Neighbor: {:?}", neighbor);
//! }
//!
//! // Iterate over faces around a vertex
//! for face in mesh.vertex_faces(v) {
//!     println!("Adjacent face: {:?}", face);
//! }
//!
//! // Get vertices of a face
//! let f = FaceId::new(0);
//! let corners: Vec<VertexId> = mesh.face_vertices(f).collect();
//! assert_eq!(corners.len(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use mender::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_from_polygons, build_from_quads, build_from_triangles, to_face_vertex, BuildReport,
        BuilderOptions, EdgeId, FaceId, HalfEdgeId, HalfEdgeMesh, ManifoldBuilder, MeshIndex,
        VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;
