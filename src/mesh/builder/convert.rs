//! Conversion between face-vertex lists and half-edge meshes.
//!
//! These functions run a whole [`ManifoldBuilder`] session over index-based
//! input, as commonly found in mesh file formats.

use nalgebra::Point3;

use super::{BuildReport, BuilderOptions, ManifoldBuilder};
use crate::error::{MeshError, Result};
use crate::mesh::halfedge::HalfEdgeMesh;
use crate::mesh::index::{MeshIndex, VertexId};

/// Build a half-edge mesh from vertex positions and polygons of any size.
///
/// Every polygon goes through [`ManifoldBuilder::add_face`], so defective
/// polygons are counted in the report instead of failing the build, and
/// non-manifold input is repaired by duplicating vertices.
///
/// # Errors
/// - [`MeshError::EmptyMesh`] if `faces` is empty
/// - [`MeshError::InvalidVertexIndex`] if an index cannot be represented by
///   the index type `I`
/// - [`MeshError::NonManifold`] if the repaired mesh still has non-manifold
///   vertices
///
/// # Example
/// ```
/// use mender::mesh::{build_from_polygons, BuilderOptions, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// let positions = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.5, 2.0, 0.0),
/// ];
/// let faces = vec![vec![0, 1, 2, 3], vec![3, 2, 4]];
///
/// let (mesh, report): (HalfEdgeMesh, _) =
///     build_from_polygons(&positions, &faces, &BuilderOptions::default()).unwrap();
/// assert_eq!(mesh.num_faces(), 2);
/// assert!(!report.has_issues());
/// ```
pub fn build_from_polygons<I, F>(
    positions: &[Point3<f64>],
    faces: &[F],
    options: &BuilderOptions,
) -> Result<(HalfEdgeMesh<I>, BuildReport)>
where
    I: MeshIndex,
    F: AsRef<[usize]>,
{
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    let max_index = I::MAX.to_usize();
    for (fi, face) in faces.iter().enumerate() {
        if let Some(&vi) = face.as_ref().iter().find(|&&vi| vi > max_index) {
            return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
        }
    }

    let mut mesh = HalfEdgeMesh::with_capacity(positions.len(), faces.len());
    let report = {
        let mut builder = ManifoldBuilder::with_options(&mut mesh, options.clone());
        builder.begin_surface()?;

        for &p in positions {
            builder.add_vertex(p)?;
        }

        let mut ids: Vec<VertexId<I>> = Vec::new();
        for face in faces {
            ids.clear();
            ids.extend(face.as_ref().iter().map(|&vi| VertexId::new(vi)));
            builder.add_face(&ids)?;
        }

        builder.end_surface(true)?
    };

    if report.remaining_non_manifold_vertices > 0 {
        return Err(MeshError::NonManifold {
            details: format!(
                "{} vertices could not be split",
                report.remaining_non_manifold_vertices
            ),
        });
    }

    Ok((mesh, report))
}

/// Build a half-edge mesh from vertices and triangle faces.
///
/// # Example
/// ```
/// use mender::mesh::{build_from_triangles, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let (mesh, _report): (HalfEdgeMesh, _) = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_faces(), 1);
/// ```
pub fn build_from_triangles<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<(HalfEdgeMesh<I>, BuildReport)> {
    build_from_polygons(vertices, faces, &BuilderOptions::default())
}

/// Build a half-edge mesh from vertices and quad faces.
pub fn build_from_quads<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 4]],
) -> Result<(HalfEdgeMesh<I>, BuildReport)> {
    build_from_polygons(vertices, faces, &BuilderOptions::default())
}

/// Convert a half-edge mesh back to vertex positions and polygon indices.
///
/// Vertex `i` of the output is vertex `i` of the mesh; each polygon lists
/// its vertices in face order.
pub fn to_face_vertex<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> (Vec<Point3<f64>>, Vec<Vec<usize>>) {
    let vertices = mesh.points().to_vec();

    let faces = mesh
        .face_ids()
        .map(|f| mesh.face_vertices(f).map(|v| v.index()).collect())
        .collect();

    (vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_triangles() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        // Two triangles sharing an edge
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [1, 0, 3]];
        (vertices, faces)
    }

    fn grid(n: usize) -> (Vec<Point3<f64>>, Vec<[usize; 4]>) {
        let mut vertices = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                vertices.push(Point3::new(x as f64, y as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let i = y * (n + 1) + x;
                faces.push([i, i + 1, i + n + 2, i + n + 1]);
            }
        }
        (vertices, faces)
    }

    #[test]
    fn test_two_triangles() {
        let (vertices, faces) = two_triangles();
        let (mesh, report): (HalfEdgeMesh<u32>, _) = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 2);
        // 6 interior half-edges + 4 boundary half-edges
        assert_eq!(mesh.num_halfedges(), 10);
        assert!(mesh.is_valid());
        assert!(!report.has_issues());
    }

    #[test]
    fn test_roundtrip() {
        let (vertices, faces) = two_triangles();
        let (mesh, _): (HalfEdgeMesh<u32>, _) = build_from_triangles(&vertices, &faces).unwrap();

        let (out_verts, out_faces) = to_face_vertex(&mesh);

        assert_eq!(vertices.len(), out_verts.len());
        assert_eq!(faces.len(), out_faces.len());

        for (v_in, v_out) in vertices.iter().zip(out_verts.iter()) {
            assert_relative_eq!(*v_in, *v_out);
        }

        // Same cycles, possibly rotated.
        for (face_in, face_out) in faces.iter().zip(out_faces.iter()) {
            assert_eq!(face_out.len(), 3);
            let start = face_out.iter().position(|&v| v == face_in[0]).unwrap();
            for k in 0..3 {
                assert_eq!(face_out[(start + k) % 3], face_in[k]);
            }
        }
    }

    #[test]
    fn test_quad_grid() {
        let (vertices, faces) = grid(4);
        let (mesh, report): (HalfEdgeMesh<u32>, _) = build_from_quads(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 25);
        assert_eq!(mesh.num_faces(), 16);
        // 2 * 4 * 5 edges
        assert_eq!(mesh.num_edges(), 40);
        assert!(mesh.is_quad_mesh());
        assert!(!report.has_issues());
    }

    #[test]
    fn test_mixed_polygons() {
        let (vertices, _) = grid(1);
        let mut vertices = vertices;
        vertices.push(Point3::new(0.5, 2.0, 0.0));
        let faces = vec![vec![0, 1, 3, 2], vec![2, 3, 4]];

        let (mesh, _): (HalfEdgeMesh<u32>, _) =
            build_from_polygons(&vertices, &faces, &BuilderOptions::default()).unwrap();
        assert_eq!(mesh.num_faces(), 2);
        assert!(!mesh.is_triangle_mesh());
        assert!(!mesh.is_quad_mesh());
    }

    #[test]
    fn test_defective_faces_counted() {
        let (vertices, _) = two_triangles();
        let faces = vec![[0, 1, 2], [0, 0, 3], [1, 2, 9]];

        let (mesh, report): (HalfEdgeMesh<u32>, _) = build_from_triangles(&vertices, &faces).unwrap();
        assert_eq!(mesh.num_faces(), 1);
        assert_eq!(report.rejected.duplicated_vertices, 1);
        assert_eq!(report.rejected.out_of_range_vertices, 1);
        // Vertex 3 was only used by a rejected face.
        assert_eq!(report.isolated_vertices, 1);
    }

    #[test]
    fn test_empty_faces() {
        let (vertices, _) = two_triangles();
        let result: Result<(HalfEdgeMesh<u32>, _)> = build_from_triangles(&vertices, &[]);
        assert!(matches!(result, Err(MeshError::EmptyMesh)));
    }

    #[test]
    fn test_index_too_large_for_type() {
        let (vertices, _) = two_triangles();
        let faces = vec![[0, 1, 2], [0, 1, 70_000]];
        let result: Result<(HalfEdgeMesh<u16>, _)> = build_from_triangles(&vertices, &faces);
        assert!(matches!(
            result,
            Err(MeshError::InvalidVertexIndex { face: 1, vertex: 70_000 })
        ));
    }

    #[test]
    fn test_non_manifold_input_repaired() {
        // Bowtie: two triangles touching at vertex 0.
        let vertices: Vec<Point3<f64>> = (0..5).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let faces = vec![[0, 1, 2], [0, 3, 4]];

        let (mesh, report): (HalfEdgeMesh<u32>, _) = build_from_triangles(&vertices, &faces).unwrap();
        assert_eq!(mesh.num_vertices(), 6);
        assert_eq!(report.non_manifold_vertices, 1);

        let (out_verts, out_faces) = to_face_vertex(&mesh);
        assert_eq!(out_verts.len(), 6);
        assert_relative_eq!(out_verts[5], vertices[0]);
        assert!(out_faces[0].iter().all(|v| !out_faces[1].contains(v)));
    }
}
