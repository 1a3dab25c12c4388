//! State of one `begin_surface` .. `end_surface` session.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use nalgebra::Point3;

use super::report::{BuildReport, RejectedFaces};
use super::resolve::resolve_non_manifold_vertices;
use super::BuilderOptions;
use crate::error::{MeshError, Result};
use crate::mesh::halfedge::HalfEdgeMesh;
use crate::mesh::index::{FaceId, HalfEdgeId, MeshIndex, VertexId};
use crate::mesh::property::Property;

/// Vertex property recording which input vertex a vertex was copied from.
pub const ORIGINAL_VERTEX_PROPERTY: &str = "v:builder:original_vertex";

/// Vertex property set on every copy when [`BuilderOptions::mark_copies`] is on.
pub const COPIED_PROPERTY: &str = "v:copied";

/// Copies made of each input vertex, in creation order.
type CopyRecord<I> = BTreeMap<VertexId<I>, Vec<VertexId<I>>>;

pub(super) struct Session<I: MeshIndex> {
    original_vertex: Property<VertexId<I>>,
    copied_vertices: CopyRecord<I>,
    copied_vertices_for_linking: CopyRecord<I>,
    /// Input vertex to the targets of its half-edges, one entry per face.
    outgoing_halfedges: HashMap<VertexId<I>, Vec<VertexId<I>>>,
    rejected: RejectedFaces,
    face_vertices: Vec<VertexId<I>>,
    /// Input vertices copied during the current `add_face`.
    pending_copies: Vec<VertexId<I>>,
    /// The subset of `pending_copies` made for linking.
    pending_linking_copies: Vec<VertexId<I>>,
}

impl<I: MeshIndex> Session<I> {
    pub(super) fn begin(mesh: &mut HalfEdgeMesh<I>) -> Result<Self> {
        let original_vertex = mesh
            .get_or_add_vertex_property(ORIGINAL_VERTEX_PROPERTY, VertexId::<I>::invalid())
            .ok_or_else(|| {
                MeshError::InvalidState(format!(
                    "vertex property {} exists with another type",
                    ORIGINAL_VERTEX_PROPERTY
                ))
            })?;

        // Vertices already in the mesh are their own originals.
        for (i, original) in mesh.vertex_prop_mut(original_vertex).iter_mut().enumerate() {
            *original = VertexId::new(i);
        }

        Ok(Self {
            original_vertex,
            copied_vertices: BTreeMap::new(),
            copied_vertices_for_linking: BTreeMap::new(),
            outgoing_halfedges: HashMap::new(),
            rejected: RejectedFaces::default(),
            face_vertices: Vec::new(),
            pending_copies: Vec::new(),
            pending_linking_copies: Vec::new(),
        })
    }

    pub(super) fn face_vertices(&self) -> &[VertexId<I>] {
        &self.face_vertices
    }

    pub(super) fn add_vertex(&mut self, mesh: &mut HalfEdgeMesh<I>, position: Point3<f64>) -> Result<VertexId<I>> {
        let v = mesh.add_vertex(position).ok_or_else(|| overflow::<I>("vertices"))?;
        mesh.vertex_prop_mut(self.original_vertex)[v.index()] = v;
        Ok(v)
    }

    pub(super) fn add_face(&mut self, mesh: &mut HalfEdgeMesh<I>, vertices: &[VertexId<I>]) -> Result<Option<FaceId<I>>> {
        self.face_vertices.clear();
        if !self.vertices_valid(mesh, vertices) {
            return Ok(None);
        }

        let num_vertices = mesh.num_vertices();
        self.pending_copies.clear();
        self.pending_linking_copies.clear();

        let face_vertices = match self.resolve_face(mesh, vertices) {
            Ok(face_vertices) => face_vertices,
            Err(e) => {
                self.rollback(mesh, num_vertices);
                return Err(e);
            }
        };

        match mesh.add_face(&face_vertices) {
            Some(f) => {
                let n = vertices.len();
                for s in 0..n {
                    let t = (s + 1) % n;
                    self.outgoing_halfedges.entry(vertices[s]).or_default().push(vertices[t]);
                }
                self.face_vertices = face_vertices;
                Ok(Some(f))
            }
            None => {
                if self.rejected.unknown_topology == 0 {
                    log::error!(
                        "failed adding face {:?} (this is the first record)",
                        vertices
                    );
                }
                self.rejected.unknown_topology += 1;
                self.rollback(mesh, num_vertices);
                Ok(None)
            }
        }
    }

    /// Pick the vertex for each corner of a valid face, copying where the
    /// face cannot use the input vertex.
    fn resolve_face(&mut self, mesh: &mut HalfEdgeMesh<I>, vertices: &[VertexId<I>]) -> Result<Vec<VertexId<I>>> {
        let n = vertices.len();

        // Prefer earlier copies over making new ones.
        let mut face_vertices = Vec::with_capacity(n);
        for &v in vertices {
            face_vertices.push(self.get(mesh, v)?);
        }

        // Duplicate edges: only the target of each edge is replaced. A copy of
        // the first vertex made for the last edge invalidates the first edge.
        let mut halfedges = vec![HalfEdgeId::<I>::invalid(); n];
        for s in 0..n {
            let t = (s + 1) % n;
            let mut h = mesh.find_halfedge(face_vertices[s], face_vertices[t]);
            if let Some(he) = h {
                if !mesh.is_boundary_halfedge(he) {
                    face_vertices[t] = self.copy(mesh, vertices[t])?;
                    h = None;
                    halfedges[t] = HalfEdgeId::invalid();
                }
            }
            halfedges[s] = h.unwrap_or_default();
        }

        // Linking: two existing boundary half-edges meeting at a vertex must
        // either be consecutive already or be movable into a free gap.
        for s in 0..n {
            let t = (s + 1) % n;
            let inner_prev = halfedges[s];
            let inner_next = halfedges[t];
            if !inner_prev.is_valid() || !inner_next.is_valid() || mesh.next(inner_prev) == inner_next {
                continue;
            }

            let boundary_next = mesh
                .find_free_gap(inner_prev, inner_next)
                .map(|boundary_prev| mesh.next(boundary_prev));
            if boundary_next.map_or(true, |b| b == inner_next) {
                let copy = self.copy(mesh, vertices[t])?;
                face_vertices[t] = copy;
                self.copied_vertices_for_linking.entry(vertices[t]).or_default().push(copy);
                self.pending_linking_copies.push(vertices[t]);
                halfedges[s] = HalfEdgeId::invalid();
                halfedges[t] = HalfEdgeId::invalid();
            }
        }

        // At most one new edge per corner.
        let new_edges = halfedges.iter().filter(|h| !h.is_valid()).count();
        if mesh.num_halfedges() + 2 * new_edges > HalfEdgeMesh::<I>::max_elements() {
            return Err(overflow::<I>("half-edges"));
        }
        if mesh.num_faces() >= HalfEdgeMesh::<I>::max_elements() {
            return Err(overflow::<I>("faces"));
        }

        Ok(face_vertices)
    }

    /// Forget the copies made for the current face and drop them from the
    /// mesh, which must not reference them.
    fn rollback(&mut self, mesh: &mut HalfEdgeMesh<I>, num_vertices: usize) {
        for v in self.pending_copies.drain(..).rev() {
            pop_copy(&mut self.copied_vertices, v);
        }
        for v in self.pending_linking_copies.drain(..).rev() {
            pop_copy(&mut self.copied_vertices_for_linking, v);
        }
        mesh.truncate_vertices(num_vertices);
    }

    /// Run the final sweep and clean-up, consuming the session.
    pub(super) fn finish(self, mesh: &mut HalfEdgeMesh<I>, options: &BuilderOptions, log_issues: bool) -> BuildReport {
        let Session {
            original_vertex,
            mut copied_vertices,
            copied_vertices_for_linking,
            outgoing_halfedges,
            rejected,
            ..
        } = self;

        let split_vertices = resolve_non_manifold_vertices(mesh, |m, v| {
            let original = m.vertex_prop(original_vertex)[v.index()];
            let source = if original.is_valid() { original } else { v };
            copy_vertex(m, original_vertex, &mut copied_vertices, source)
        });
        mesh.remove_vertex_property(original_vertex);

        let non_manifold_vertices = copied_vertices.len();
        let copy_occurrences = copied_vertices.values().map(Vec::len).sum();

        if options.mark_copies {
            match mesh.get_or_add_vertex_property::<bool>(COPIED_PROPERTY, false) {
                Some(copied) => {
                    let marks = mesh.vertex_prop_mut(copied);
                    for &c in copied_vertices.values().flatten() {
                        marks[c.index()] = true;
                    }
                }
                None => log::warn!("vertex property {} exists with another type", COPIED_PROPERTY),
            }
        }

        let non_manifold_edges = outgoing_halfedges
            .values()
            .map(|targets| targets.len() - targets.iter().collect::<HashSet<_>>().len())
            .sum();

        let isolated_vertices = if options.remove_isolated_vertices {
            mesh.remove_isolated_vertices()
        } else {
            0
        };

        if !mesh.is_valid() {
            log::error!("mesh connectivity is not valid");
        }
        let remaining = mesh.non_manifold_vertices();
        if let Some(v) = remaining.first() {
            log::error!("vertex {} is not manifold (this is the first record)", v);
            log::error!("mesh still has {} non-manifold vertices", remaining.len());
        }

        let report = BuildReport {
            rejected,
            non_manifold_vertices,
            copy_occurrences,
            linking_copied_vertices: copied_vertices_for_linking.len(),
            linking_copy_occurrences: copied_vertices_for_linking.values().map(Vec::len).sum(),
            split_vertices,
            non_manifold_edges,
            isolated_vertices,
            remaining_non_manifold_vertices: remaining.len(),
            num_vertices: mesh.num_vertices(),
            num_edges: mesh.num_edges(),
            num_faces: mesh.num_faces(),
        };

        if log_issues && report.has_issues() {
            log::warn!("{}", report);
        }
        report
    }

    /// A face cannot be linked, whatever is copied, if it has fewer than
    /// three vertices, repeats a vertex, or references a missing vertex.
    fn vertices_valid(&mut self, mesh: &HalfEdgeMesh<I>, vertices: &[VertexId<I>]) -> bool {
        if vertices.len() < 3 {
            if self.rejected.too_few_vertices == 0 {
                log::error!(
                    "face has less than 3 vertices: {:?} (this is the first record)",
                    vertices
                );
            }
            self.rejected.too_few_vertices += 1;
            return false;
        }

        let repeated = vertices
            .iter()
            .enumerate()
            .any(|(i, v)| vertices[i + 1..].contains(v));
        if repeated {
            if self.rejected.duplicated_vertices == 0 {
                log::error!(
                    "face has duplicated vertices: {:?} (this is the first record)",
                    vertices
                );
            }
            self.rejected.duplicated_vertices += 1;
            return false;
        }

        if vertices.iter().any(|&v| !mesh.contains_vertex(v)) {
            if self.rejected.out_of_range_vertices == 0 {
                log::error!(
                    "face has out-of-range vertices: {:?} (number of vertices is {}) (this is the first record)",
                    vertices,
                    mesh.num_vertices()
                );
            }
            self.rejected.out_of_range_vertices += 1;
            return false;
        }

        true
    }

    /// The vertex to use for `v` in a new face: `v` itself while it has no
    /// copies and is on the boundary, otherwise its first copy that is on the
    /// boundary, otherwise a new copy.
    fn get(&mut self, mesh: &mut HalfEdgeMesh<I>, v: VertexId<I>) -> Result<VertexId<I>> {
        match self.copied_vertices.get(&v) {
            None if mesh.is_boundary_vertex(v) => return Ok(v),
            Some(copies) => {
                if let Some(&c) = copies.iter().find(|&&c| mesh.is_boundary_vertex(c)) {
                    return Ok(c);
                }
            }
            None => {}
        }
        self.copy(mesh, v)
    }

    fn copy(&mut self, mesh: &mut HalfEdgeMesh<I>, v: VertexId<I>) -> Result<VertexId<I>> {
        let new_v = copy_vertex(mesh, self.original_vertex, &mut self.copied_vertices, v)
            .ok_or_else(|| overflow::<I>("vertices"))?;
        self.pending_copies.push(v);
        Ok(new_v)
    }
}

/// Add a copy of `v` with all its properties and record it. `None` if the
/// mesh is full.
fn copy_vertex<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    original_vertex: Property<VertexId<I>>,
    copied_vertices: &mut CopyRecord<I>,
    v: VertexId<I>,
) -> Option<VertexId<I>> {
    let new_v = mesh.duplicate_vertex(v)?;
    mesh.vertex_prop_mut(original_vertex)[new_v.index()] = v;
    copied_vertices.entry(v).or_default().push(new_v);
    Some(new_v)
}

fn overflow<I: MeshIndex>(element: &'static str) -> MeshError {
    MeshError::IndexOverflow {
        element,
        max: HalfEdgeMesh::<I>::max_elements(),
    }
}

fn pop_copy<I: MeshIndex>(record: &mut CopyRecord<I>, v: VertexId<I>) {
    if let Entry::Occupied(mut entry) = record.entry(v) {
        entry.get_mut().pop();
        if entry.get().is_empty() {
            entry.remove();
        }
    }
}
