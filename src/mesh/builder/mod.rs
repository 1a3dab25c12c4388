//! Building manifold meshes from arbitrary polygon soups.
//!
//! Faces coming out of a file loader do not always describe a manifold
//! surface: several fans can share one vertex, neighbouring faces can
//! disagree on orientation, and the same face can occur twice. A plain
//! [`HalfEdgeMesh::add_face`] refuses such faces. The [`ManifoldBuilder`]
//! accepts them and makes them fit by duplicating vertices. It never merges
//! vertices and never drops a face that has a valid vertex list.
//!
//! # Example
//!
//! ```
//! use mender::mesh::{HalfEdgeMesh, ManifoldBuilder};
//! use nalgebra::Point3;
//!
//! let mut mesh: HalfEdgeMesh = HalfEdgeMesh::new();
//! let mut builder = ManifoldBuilder::new(&mut mesh);
//! builder.begin_surface().unwrap();
//!
//! let a = builder.add_vertex(Point3::new(0.0, 0.0, 0.0)).unwrap();
//! let b = builder.add_vertex(Point3::new(1.0, 0.0, 0.0)).unwrap();
//! let c = builder.add_vertex(Point3::new(0.0, 1.0, 0.0)).unwrap();
//! let d = builder.add_vertex(Point3::new(0.0, -1.0, 0.0)).unwrap();
//!
//! builder.add_triangle(a, b, c).unwrap();
//! // Same orientation along a -> b: would need a second a -> b half-edge.
//! builder.add_triangle(a, b, d).unwrap();
//!
//! let report = builder.end_surface(false).unwrap();
//! drop(builder);
//!
//! assert_eq!(report.num_faces, 2);
//! assert_eq!(report.non_manifold_edges, 1);
//! assert_eq!(mesh.num_vertices(), 6);
//! assert!(mesh.non_manifold_vertices().is_empty());
//! ```

mod convert;
mod report;
mod resolve;
mod session;

pub use convert::{build_from_polygons, build_from_quads, build_from_triangles, to_face_vertex};
pub use report::{BuildReport, RejectedFaces};
pub use resolve::resolve_non_manifold_vertices;
pub use session::{COPIED_PROPERTY, ORIGINAL_VERTEX_PROPERTY};

use nalgebra::Point3;

use self::session::Session;
use super::halfedge::HalfEdgeMesh;
use super::index::{FaceId, MeshIndex, VertexId};
use crate::error::{MeshError, Result};

/// Options for a [`ManifoldBuilder`] session.
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// Delete vertices not used by any face at the end (default: true).
    pub remove_isolated_vertices: bool,

    /// Add the bool vertex property [`COPIED_PROPERTY`], set on every vertex
    /// that was created as a copy (default: false).
    pub mark_copies: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            remove_isolated_vertices: true,
            mark_copies: false,
        }
    }
}

impl BuilderOptions {
    /// Create the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether isolated vertices are removed.
    pub fn with_remove_isolated_vertices(mut self, remove: bool) -> Self {
        self.remove_isolated_vertices = remove;
        self
    }

    /// Set whether copies are marked with a vertex property.
    pub fn with_mark_copies(mut self, mark: bool) -> Self {
        self.mark_copies = mark;
        self
    }
}

enum BuildState<I: MeshIndex> {
    NotStarted,
    Building(Session<I>),
    Finished,
}

/// Adds vertices and faces to a [`HalfEdgeMesh`], resolving non-manifold
/// configurations on the way.
///
/// A session starts with [`begin_surface`](Self::begin_surface) and ends
/// with [`end_surface`](Self::end_surface). In between, faces that would
/// break the mesh are fitted in by giving them copies of their vertices;
/// faces that cannot be fitted at all are counted and skipped. A finished
/// builder can begin a new session on the same mesh.
pub struct ManifoldBuilder<'a, I: MeshIndex = u32> {
    mesh: &'a mut HalfEdgeMesh<I>,
    options: BuilderOptions,
    state: BuildState<I>,
}

impl<'a, I: MeshIndex> ManifoldBuilder<'a, I> {
    /// Create a builder with default options.
    pub fn new(mesh: &'a mut HalfEdgeMesh<I>) -> Self {
        Self::with_options(mesh, BuilderOptions::default())
    }

    /// Create a builder with the given options.
    pub fn with_options(mesh: &'a mut HalfEdgeMesh<I>, options: BuilderOptions) -> Self {
        Self {
            mesh,
            options,
            state: BuildState::NotStarted,
        }
    }

    /// The options of this builder.
    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// The mesh being built.
    pub fn mesh(&self) -> &HalfEdgeMesh<I> {
        self.mesh
    }

    /// Whether a session is in progress.
    pub fn is_building(&self) -> bool {
        matches!(self.state, BuildState::Building(_))
    }

    /// Start a session.
    pub fn begin_surface(&mut self) -> Result<()> {
        if self.is_building() {
            return Err(MeshError::InvalidState(
                "begin_surface() called twice without end_surface()".to_string(),
            ));
        }
        log::debug!(
            "begin surface: {} vertices, {} faces",
            self.mesh.num_vertices(),
            self.mesh.num_faces()
        );
        self.state = BuildState::Building(Session::begin(self.mesh)?);
        Ok(())
    }

    /// Add a vertex at `position`.
    ///
    /// Fails with [`MeshError::IndexOverflow`] if the index type cannot
    /// address another vertex.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> Result<VertexId<I>> {
        let mesh = &mut *self.mesh;
        match &mut self.state {
            BuildState::Building(session) => session.add_vertex(mesh, position),
            _ => Err(not_building("add_vertex")),
        }
    }

    /// Add a face, duplicating vertices where the face would otherwise make
    /// the mesh non-manifold.
    ///
    /// Returns `Ok(None)` if the face was ignored: it has fewer than three
    /// vertices, repeats a vertex, references a vertex that does not exist,
    /// or cannot be linked at all. Ignored faces leave the mesh unchanged and
    /// are counted in the [`BuildReport`].
    ///
    /// Fails with [`MeshError::IndexOverflow`], leaving the mesh unchanged, if
    /// the copies or edges the face needs do not fit the index type.
    pub fn add_face(&mut self, vertices: &[VertexId<I>]) -> Result<Option<FaceId<I>>> {
        let mesh = &mut *self.mesh;
        match &mut self.state {
            BuildState::Building(session) => session.add_face(mesh, vertices),
            _ => Err(not_building("add_face")),
        }
    }

    /// Add a triangle.
    pub fn add_triangle(&mut self, v0: VertexId<I>, v1: VertexId<I>, v2: VertexId<I>) -> Result<Option<FaceId<I>>> {
        self.add_face(&[v0, v1, v2])
    }

    /// Add a quad.
    pub fn add_quad(
        &mut self,
        v0: VertexId<I>,
        v1: VertexId<I>,
        v2: VertexId<I>,
        v3: VertexId<I>,
    ) -> Result<Option<FaceId<I>>> {
        self.add_face(&[v0, v1, v2, v3])
    }

    /// The vertices actually used by the last face added, after duplication.
    ///
    /// Empty if the last face was ignored or outside a session.
    pub fn face_vertices(&self) -> &[VertexId<I>] {
        match &self.state {
            BuildState::Building(session) => session.face_vertices(),
            _ => &[],
        }
    }

    /// Finish the session.
    ///
    /// Splits the remaining non-manifold vertices, removes isolated vertices
    /// if configured, checks the result and returns a summary. With
    /// `log_issues`, the summary is also logged as a warning when anything
    /// was repaired or ignored.
    pub fn end_surface(&mut self, log_issues: bool) -> Result<BuildReport> {
        match std::mem::replace(&mut self.state, BuildState::Finished) {
            BuildState::Building(session) => {
                let report = session.finish(self.mesh, &self.options, log_issues);
                log::debug!(
                    "end surface: {} vertices, {} faces",
                    report.num_vertices,
                    report.num_faces
                );
                Ok(report)
            }
            other => {
                self.state = other;
                Err(MeshError::InvalidState(
                    "end_surface() called without begin_surface()".to_string(),
                ))
            }
        }
    }
}

fn not_building(operation: &str) -> MeshError {
    MeshError::InvalidState(format!(
        "{}() must be called between begin_surface() and end_surface()",
        operation
    ))
}

impl<I: MeshIndex> Drop for ManifoldBuilder<'_, I> {
    fn drop(&mut self) {
        if self.is_building() {
            log::error!("missing call to end_surface(), which must be in pair with begin_surface()");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn point(i: usize) -> Point3<f64> {
        Point3::new(i as f64, (i % 4) as f64, (i / 4) as f64)
    }

    /// Run a builder session over index faces.
    fn build(num_vertices: usize, faces: &[Vec<usize>]) -> (HalfEdgeMesh, BuildReport) {
        init_logger();
        let mut mesh = HalfEdgeMesh::new();
        let report = {
            let mut builder = ManifoldBuilder::new(&mut mesh);
            builder.begin_surface().unwrap();
            let v: Vec<VertexId> = (0..num_vertices)
                .map(|i| builder.add_vertex(point(i)).unwrap())
                .collect();
            for face in faces {
                let ids: Vec<VertexId> = face
                    .iter()
                    .map(|&i| v.get(i).copied().unwrap_or(VertexId::new(i)))
                    .collect();
                builder.add_face(&ids).unwrap();
            }
            builder.end_surface(true).unwrap()
        };
        (mesh, report)
    }

    fn assert_manifold(mesh: &HalfEdgeMesh) {
        assert!(mesh.is_valid());
        assert!(mesh.non_manifold_vertices().is_empty());
        for h in mesh.halfedge_ids() {
            assert_eq!(h.opposite().opposite(), h);
            assert_eq!(mesh.prev(mesh.next(h)), h);
            assert_eq!(mesh.next(mesh.prev(h)), h);
        }
        // At most one face half-edge per ordered vertex pair.
        let mut pairs = std::collections::HashSet::new();
        for h in mesh.halfedge_ids().filter(|&h| !mesh.is_boundary_halfedge(h)) {
            assert!(pairs.insert((mesh.from_vertex(h), mesh.to_vertex(h))));
        }
    }

    fn tetrahedron() -> Vec<Vec<usize>> {
        vec![vec![0, 2, 1], vec![0, 1, 3], vec![1, 2, 3], vec![2, 0, 3]]
    }

    #[test]
    fn test_tetrahedron_round_trip() {
        let (mesh, report) = build(4, &tetrahedron());

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 4);
        assert_eq!(mesh.num_halfedges(), 12);
        assert_eq!(report.copy_occurrences, 0);
        assert_eq!(report.rejected.total(), 0);
        assert!(!report.has_issues());
        assert_manifold(&mesh);
    }

    #[test]
    fn test_opposite_winding() {
        // a -> b appears in both faces.
        let (mesh, report) = build(4, &[vec![0, 1, 2], vec![0, 1, 3]]);

        assert_eq!(mesh.num_faces(), 2);
        // a and b are both shared corners and both duplicated.
        assert_eq!(mesh.num_vertices(), 6);
        assert_eq!(report.non_manifold_edges, 1);
        assert_eq!(report.non_manifold_vertices, 2);
        assert_eq!(report.rejected.total(), 0);
        assert_manifold(&mesh);
    }

    #[test]
    fn test_consistent_neighbours_share_edge() {
        let (mesh, report) = build(4, &[vec![0, 1, 2], vec![1, 0, 3]]);

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_edges(), 5);
        assert_eq!(report.copy_occurrences, 0);
        assert_manifold(&mesh);
    }

    #[test]
    fn test_repeated_vertex_rejected() {
        let (mesh, report) = build(5, &[vec![0, 1, 1, 2], vec![0, 1, 2]]);

        assert_eq!(report.rejected.duplicated_vertices, 1);
        assert_eq!(report.rejected.total(), 1);
        assert_eq!(mesh.num_faces(), 1);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let (mesh, report) = build(5, &[vec![0, 1, 10], vec![0, 1, 2]]);

        assert_eq!(report.rejected.out_of_range_vertices, 1);
        assert_eq!(mesh.num_faces(), 1);
    }

    #[test]
    fn test_too_few_vertices_rejected() {
        let (mesh, report) = build(3, &[vec![0, 1], vec![], vec![0, 1, 2]]);

        assert_eq!(report.rejected.too_few_vertices, 2);
        assert_eq!(mesh.num_faces(), 1);
    }

    #[test]
    fn test_bowtie() {
        let (mesh, report) = build(5, &[vec![0, 1, 2], vec![0, 3, 4]]);

        assert_eq!(mesh.num_vertices(), 6);
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(report.split_vertices, 1);
        assert_eq!(report.non_manifold_vertices, 1);
        assert_eq!(report.copy_occurrences, 1);

        let corner = |f: usize| {
            mesh.face_vertices(FaceId::new(f))
                .find(|&v| v.index() == 0 || v.index() == 5)
                .unwrap()
        };
        assert_ne!(corner(0), corner(1));
        assert_manifold(&mesh);
    }

    #[test]
    fn test_three_fans() {
        let (mesh, report) = build(7, &[vec![0, 1, 2], vec![0, 3, 4], vec![0, 5, 6]]);

        assert_eq!(mesh.num_vertices(), 9);
        assert_eq!(report.copy_occurrences, 2);
        assert_manifold(&mesh);
        for v in mesh.vertex_ids() {
            assert_eq!(mesh.vertex_faces(v).count(), 1);
        }
    }

    #[test]
    fn test_closed_disk_gets_copy() {
        // Closed fan around 0, then another triangle at 0.
        let faces = vec![vec![0, 1, 2], vec![0, 2, 3], vec![0, 3, 1], vec![0, 4, 5]];
        let (mesh, report) = build(6, &faces);

        assert_eq!(mesh.num_faces(), 4);
        assert_eq!(mesh.num_vertices(), 7);
        assert_eq!(report.copy_occurrences, 1);
        assert_eq!(report.split_vertices, 0);
        assert_manifold(&mesh);
    }

    #[test]
    fn test_duplicate_face_becomes_patch() {
        let (mesh, report) = build(3, &[vec![0, 1, 2], vec![0, 1, 2]]);

        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.num_vertices(), 6);
        assert_eq!(report.rejected.total(), 0);
        assert_eq!(report.non_manifold_edges, 3);
        assert_manifold(&mesh);

        // The two copies do not share a vertex.
        let first: Vec<VertexId> = mesh.face_vertices(FaceId::new(0)).collect();
        assert!(mesh.face_vertices(FaceId::new(1)).all(|v| !first.contains(&v)));
    }

    #[test]
    fn test_linking_copy_at_pinched_vertex() {
        // Two triangles pinched at 0, then the first one again with the
        // other winding: its boundary edges at 0 lie in different gaps.
        let (mesh, report) = build(5, &[vec![0, 1, 2], vec![0, 3, 4], vec![1, 0, 2]]);

        assert_eq!(mesh.num_faces(), 3);
        assert_eq!(report.linking_copied_vertices, 1);
        assert_eq!(report.linking_copy_occurrences, 1);
        // One copy for linking, one from the final split of the pinch.
        assert_eq!(report.split_vertices, 1);
        assert_eq!(report.non_manifold_vertices, 1);
        assert_eq!(report.copy_occurrences, 2);
        assert_eq!(report.rejected.total(), 0);
        assert_eq!(mesh.num_vertices(), 7);
        assert_manifold(&mesh);

        // The pillow of faces 0 and 2 shares the edge 1-2 only.
        let shared = mesh.find_edge(VertexId::new(1), VertexId::new(2)).unwrap();
        assert!(!mesh.is_boundary_edge(shared));
    }

    #[test]
    fn test_failed_copy_rolls_back_face() {
        init_logger();
        let mut mesh: HalfEdgeMesh<u16> = HalfEdgeMesh::new();
        let max = HalfEdgeMesh::<u16>::max_elements();
        let mut builder = ManifoldBuilder::new(&mut mesh);
        builder.begin_surface().unwrap();

        // Room for exactly one copy.
        let v: Vec<VertexId<u16>> = (0..max - 1)
            .map(|i| builder.add_vertex(point(i % 16)).unwrap())
            .collect();
        for tri in [[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]] {
            builder.add_triangle(v[tri[0]], v[tri[1]], v[tri[2]]).unwrap().unwrap();
        }

        // Every corner of a face on the closed tetrahedron needs a copy.
        let result = builder.add_triangle(v[0], v[1], v[2]);
        assert!(matches!(
            result,
            Err(MeshError::IndexOverflow { element: "vertices", .. })
        ));
        assert_eq!(builder.mesh().num_vertices(), max - 1);
        assert_eq!(builder.mesh().num_faces(), 4);
        assert!(builder.face_vertices().is_empty());

        // The freed slot is used by a face needing a single copy.
        builder.add_triangle(v[0], v[4], v[5]).unwrap().unwrap();
        assert_eq!(builder.face_vertices()[0].index(), max - 1);
        assert!(matches!(
            builder.add_vertex(Point3::origin()),
            Err(MeshError::IndexOverflow { .. })
        ));

        let report = builder.end_surface(false).unwrap();
        assert_eq!(report.copy_occurrences, 1);
        assert_eq!(report.non_manifold_vertices, 1);
        assert_eq!(report.rejected.total(), 0);
        assert_eq!(report.num_faces, 5);
    }

    #[test]
    fn test_face_vertices_exposes_copies() {
        init_logger();
        let mut mesh: HalfEdgeMesh = HalfEdgeMesh::new();
        let mut builder = ManifoldBuilder::new(&mut mesh);
        builder.begin_surface().unwrap();
        let v: Vec<VertexId> = (0..4).map(|i| builder.add_vertex(point(i)).unwrap()).collect();

        builder.add_triangle(v[0], v[1], v[2]).unwrap().unwrap();
        assert_eq!(builder.face_vertices(), &v[..3]);

        builder.add_triangle(v[0], v[1], v[3]).unwrap().unwrap();
        assert_eq!(builder.face_vertices()[0], v[0]);
        assert_eq!(builder.face_vertices()[1].index(), 4);
        assert_eq!(builder.face_vertices()[2], v[3]);

        assert_eq!(builder.add_face(&v[..2]).unwrap(), None);
        assert!(builder.face_vertices().is_empty());

        builder.end_surface(false).unwrap();
    }

    #[test]
    fn test_copies_keep_properties() {
        init_logger();
        let mut mesh: HalfEdgeMesh = HalfEdgeMesh::new();
        let color = mesh.add_vertex_property::<[u8; 3]>("v:color", [0; 3]).unwrap();
        for i in 0..5 {
            mesh.add_vertex(point(i)).unwrap();
        }
        mesh.vertex_prop_mut(color)[0] = [255, 0, 0];

        let report = {
            let options = BuilderOptions::new().with_mark_copies(true);
            let mut builder = ManifoldBuilder::with_options(&mut mesh, options);
            builder.begin_surface().unwrap();
            let v: Vec<VertexId> = (0..5).map(VertexId::new).collect();
            builder.add_triangle(v[0], v[1], v[2]).unwrap();
            builder.add_triangle(v[0], v[3], v[4]).unwrap();
            builder.end_surface(false).unwrap()
        };

        assert_eq!(report.copy_occurrences, 1);
        assert_eq!(mesh.num_vertices(), 6);
        let copy = VertexId::new(5);
        assert_eq!(mesh.vertex_prop(color)[copy.index()], [255, 0, 0]);
        approx::assert_relative_eq!(mesh.position(copy).coords, point(0).coords);

        let copied = mesh.get_vertex_property::<bool>(COPIED_PROPERTY).unwrap();
        let marks = mesh.vertex_prop(copied);
        assert_eq!(marks.iter().filter(|&&m| m).count(), 1);
        assert!(marks[copy.index()]);

        // Provenance is session-scoped.
        assert!(mesh.get_vertex_property::<VertexId>(ORIGINAL_VERTEX_PROPERTY).is_none());
    }

    #[test]
    fn test_isolated_vertices() {
        let (mesh, report) = build(5, &[vec![0, 2, 4]]);
        assert_eq!(report.isolated_vertices, 2);
        assert_eq!(mesh.num_vertices(), 3);
        assert_manifold(&mesh);

        init_logger();
        let mut mesh: HalfEdgeMesh = HalfEdgeMesh::new();
        let options = BuilderOptions::new().with_remove_isolated_vertices(false);
        let mut builder = ManifoldBuilder::with_options(&mut mesh, options);
        builder.begin_surface().unwrap();
        let v: Vec<VertexId> = (0..5).map(|i| builder.add_vertex(point(i)).unwrap()).collect();
        builder.add_triangle(v[0], v[2], v[4]).unwrap();
        let report = builder.end_surface(false).unwrap();
        assert_eq!(report.isolated_vertices, 0);
        assert_eq!(report.num_vertices, 5);
    }

    #[test]
    fn test_state_machine() {
        init_logger();
        let mut mesh: HalfEdgeMesh = HalfEdgeMesh::new();
        let mut builder = ManifoldBuilder::new(&mut mesh);

        assert!(matches!(
            builder.add_vertex(Point3::origin()),
            Err(MeshError::InvalidState(_))
        ));
        assert!(builder.add_face(&[]).is_err());
        assert!(builder.end_surface(false).is_err());

        builder.begin_surface().unwrap();
        assert!(builder.is_building());
        assert!(builder.begin_surface().is_err());
        builder.add_vertex(Point3::origin()).unwrap();
        builder.end_surface(false).unwrap();

        assert!(!builder.is_building());
        assert!(builder.end_surface(false).is_err());
        assert!(builder.add_vertex(Point3::origin()).is_err());

        // A finished builder can start over.
        builder.begin_surface().unwrap();
        builder.end_surface(false).unwrap();
    }

    #[test]
    fn test_second_session_splits_nothing() {
        let (mut mesh, first) = build(7, &[vec![0, 1, 2], vec![0, 3, 4], vec![0, 5, 6]]);
        assert_eq!(first.split_vertices, 1);

        let n = mesh.num_vertices();
        let mut builder = ManifoldBuilder::new(&mut mesh);
        builder.begin_surface().unwrap();
        let second = builder.end_surface(false).unwrap();

        assert_eq!(second.split_vertices, 0);
        assert_eq!(second.copy_occurrences, 0);
        assert_eq!(second.num_vertices, n);
    }

    #[test]
    fn test_face_on_closed_surface_uses_copies() {
        init_logger();
        let mut mesh: HalfEdgeMesh = HalfEdgeMesh::new();
        let mut builder = ManifoldBuilder::new(&mut mesh);
        builder.begin_surface().unwrap();
        let v: Vec<VertexId> = (0..4).map(|i| builder.add_vertex(point(i)).unwrap()).collect();
        for tri in [[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]] {
            builder.add_triangle(v[tri[0]], v[tri[1]], v[tri[2]]).unwrap();
        }
        let before = builder.mesh().num_vertices();

        // Closed surface: every vertex needs a copy, and the face still links.
        assert!(builder.add_triangle(v[0], v[1], v[2]).unwrap().is_some());
        assert_eq!(builder.mesh().num_vertices(), before + 3);

        let report = builder.end_surface(false).unwrap();
        assert_eq!(report.rejected.unknown_topology, 0);
        assert_eq!(report.copy_occurrences, 3);
    }

    #[test]
    fn test_random_soups_are_repaired() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for round in 0..40 {
            let num_vertices = rng.random_range(4..16);
            let num_faces = rng.random_range(1..30);
            let faces: Vec<Vec<usize>> = (0..num_faces)
                .map(|_| {
                    let n = rng.random_range(3..6);
                    (0..n).map(|_| rng.random_range(0..num_vertices)).collect()
                })
                .collect();

            let (mesh, report) = build(num_vertices, &faces);

            assert_manifold(&mesh);
            assert_eq!(report.remaining_non_manifold_vertices, 0, "round {}", round);
            // Resolved faces always link.
            assert_eq!(report.rejected.unknown_topology, 0, "round {}", round);
            assert_eq!(
                report.num_faces + report.rejected.total(),
                num_faces,
                "round {}",
                round
            );
            assert_eq!(mesh.num_faces(), report.num_faces);

            // Every kept face has a valid vertex list.
            for f in mesh.face_ids() {
                assert!(mesh.face_vertex_count(f) >= 3);
            }

            // A second sweep has nothing left to do.
            let mut mesh = mesh;
            let split = resolve_non_manifold_vertices(&mut mesh, |m, v| m.duplicate_vertex(v));
            assert_eq!(split, 0, "round {}", round);
        }
    }

    #[test]
    fn test_random_manifold_strip_needs_no_copies() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(7);

        // A triangle strip added in random order still links without copies.
        let columns = 12;
        let mut faces: Vec<Vec<usize>> = Vec::new();
        for i in 0..columns {
            let (a, b, c, d) = (i, i + 1, columns + 1 + i, columns + 2 + i);
            faces.push(vec![a, b, d]);
            faces.push(vec![a, d, c]);
        }
        for i in (1..faces.len()).rev() {
            let j = rng.random_range(0..=i);
            faces.swap(i, j);
        }

        let (mesh, report) = build(2 * (columns + 1), &faces);
        assert_eq!(report.copy_occurrences, 0);
        assert_eq!(mesh.num_vertices(), 2 * (columns + 1));
        assert_eq!(mesh.num_faces(), 2 * columns);
        assert_manifold(&mesh);
        assert!(mesh.halfedge_ids().any(|h| mesh.is_boundary_halfedge(h)));
    }
}
