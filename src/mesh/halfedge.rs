//! Half-edge mesh data structure.
//!
//! This module provides a half-edge (doubly-connected edge list) representation
//! for polygon meshes. This structure enables O(1) adjacency queries and is the
//! target of the [`ManifoldBuilder`](super::ManifoldBuilder).
//!
//! # Structure
//!
//! - Each edge is split into two **half-edges** pointing in opposite directions.
//!   The two half-edges of an edge are stored next to each other, so the
//!   opposite half-edge is implied by the index (see [`HalfEdgeId::opposite`]).
//! - Each half-edge knows its **target vertex**, the **next** and **previous**
//!   half-edge around its face, and its **incident face**
//! - Each vertex stores one outgoing half-edge
//! - Each face stores one half-edge on its boundary
//!
//! # Boundary Handling
//!
//! Boundary half-edges have an invalid face ID and are linked into boundary
//! loops through `next`/`prev` like face half-edges. The outgoing half-edge of
//! a boundary vertex is always a boundary half-edge, which makes
//! [`HalfEdgeMesh::is_boundary_vertex`] an O(1) query.
//!
//! # Manifoldness
//!
//! The mesh itself only performs the local checks needed to link a face
//! ([`HalfEdgeMesh::add_face`] refuses complex vertices and complex edges).
//! Repairing arbitrary input is the job of the builder.

use std::collections::HashMap;

use nalgebra::Point3;

use super::index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId};
use super::property::{Property, PropertyContainer};

/// Name of the vertex position property.
pub const POINT_PROPERTY: &str = "v:point";

/// Connectivity of a vertex.
#[derive(Debug, Clone, Copy)]
pub struct Vertex<I: MeshIndex = u32> {
    /// One outgoing half-edge from this vertex.
    /// For boundary vertices, this is guaranteed to be a boundary half-edge.
    /// Invalid for isolated vertices.
    pub halfedge: HalfEdgeId<I>,
}

impl<I: MeshIndex> Default for Vertex<I> {
    fn default() -> Self {
        Self {
            halfedge: HalfEdgeId::invalid(),
        }
    }
}

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge<I: MeshIndex = u32> {
    /// The vertex this half-edge points to.
    pub vertex: VertexId<I>,

    /// The face this half-edge belongs to.
    /// Invalid for boundary half-edges.
    pub face: FaceId<I>,

    /// The next half-edge around the face (counter-clockwise).
    pub next: HalfEdgeId<I>,

    /// The previous half-edge around the face (clockwise).
    pub prev: HalfEdgeId<I>,
}

impl<I: MeshIndex> HalfEdge<I> {
    /// Create an unlinked half-edge pointing to `vertex`.
    pub fn new(vertex: VertexId<I>) -> Self {
        Self {
            vertex,
            face: FaceId::invalid(),
            next: HalfEdgeId::invalid(),
            prev: HalfEdgeId::invalid(),
        }
    }

    /// Check if this half-edge is on the boundary.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        !self.face.is_valid()
    }
}

/// A face in the half-edge mesh.
#[derive(Debug, Clone, Copy)]
pub struct Face<I: MeshIndex = u32> {
    /// One half-edge on the boundary of this face.
    pub halfedge: HalfEdgeId<I>,
}

impl<I: MeshIndex> Default for Face<I> {
    fn default() -> Self {
        Self {
            halfedge: HalfEdgeId::invalid(),
        }
    }
}

/// A half-edge mesh data structure for polygon meshes.
///
/// Connectivity is stored in flat arrays indexed by [`VertexId`],
/// [`HalfEdgeId`] and [`FaceId`]; attributes (including vertex positions) are
/// stored in per-element [`PropertyContainer`]s.
#[derive(Debug, Clone)]
pub struct HalfEdgeMesh<I: MeshIndex = u32> {
    pub(crate) vertices: Vec<Vertex<I>>,
    pub(crate) halfedges: Vec<HalfEdge<I>>,
    pub(crate) faces: Vec<Face<I>>,

    /// Directed edge (from, to) to half-edge lookup.
    edge_index: HashMap<(VertexId<I>, VertexId<I>), HalfEdgeId<I>>,

    vprops: PropertyContainer,
    hprops: PropertyContainer,
    eprops: PropertyContainer,
    fprops: PropertyContainer,

    points: Property<Point3<f64>>,
}

impl<I: MeshIndex> Default for HalfEdgeMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! property_accessors {
    (
        $kind:literal, $id:ident, $container:ident,
        $add:ident, $get:ident, $get_or_add:ident, $remove:ident,
        $prop:ident, $prop_mut:ident, $all:ident
    ) => {
        #[doc = concat!("Add a ", $kind, " property filled with `default`.")]
        ///
        /// Returns `None` if a property with this name already exists.
        pub fn $add<T: Clone + Send + Sync + 'static>(&mut self, name: &str, default: T) -> Option<Property<T>> {
            self.$container.add(name, default)
        }

        #[doc = concat!("Look up a ", $kind, " property by name and type.")]
        pub fn $get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Option<Property<T>> {
            self.$container.get(name)
        }

        #[doc = concat!("Look up a ", $kind, " property, adding it if missing.")]
        pub fn $get_or_add<T: Clone + Send + Sync + 'static>(&mut self, name: &str, default: T) -> Option<Property<T>> {
            self.$container.get_or_add(name, default)
        }

        #[doc = concat!("Remove a ", $kind, " property. Returns `false` for a stale handle.")]
        ///
        /// The vertex positions ([`POINT_PROPERTY`]) cannot be removed.
        pub fn $remove<T: 'static>(&mut self, p: Property<T>) -> bool {
            if self.is_protected_property($kind, p.slot()) {
                return false;
            }
            self.$container.remove(p)
        }

        #[doc = concat!("Values of a ", $kind, " property, indexed by `", stringify!($id), "::index()`.")]
        ///
        /// # Panics
        /// Panics if the handle was removed.
        pub fn $prop<T: 'static>(&self, p: Property<T>) -> &[T] {
            match self.$container.array(p) {
                Some(values) => values,
                None => panic!("stale {} property handle {:?}", $kind, p),
            }
        }

        #[doc = concat!("Mutable values of a ", $kind, " property.")]
        ///
        /// # Panics
        /// Panics if the handle was removed.
        pub fn $prop_mut<T: 'static>(&mut self, p: Property<T>) -> &mut [T] {
            match self.$container.array_mut(p) {
                Some(values) => values,
                None => panic!("stale {} property handle {:?}", $kind, p),
            }
        }

        #[doc = concat!("All ", $kind, " properties.")]
        pub fn $all(&self) -> &PropertyContainer {
            &self.$container
        }
    };
}

impl<I: MeshIndex> HalfEdgeMesh<I> {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        let mut vprops = PropertyContainer::new();
        let points = match vprops.add(POINT_PROPERTY, Point3::origin()) {
            Some(p) => p,
            None => unreachable!("fresh container already has {}", POINT_PROPERTY),
        };

        Self {
            vertices: Vec::new(),
            halfedges: Vec::new(),
            faces: Vec::new(),
            edge_index: HashMap::new(),
            vprops,
            hprops: PropertyContainer::new(),
            eprops: PropertyContainer::new(),
            fprops: PropertyContainer::new(),
            points,
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        // Closed triangle mesh: E = 3F/2, so HE = 3F; leave room for boundary.
        let num_halfedges = num_faces * 3 + num_faces / 2;

        let mut mesh = Self::new();
        mesh.vertices.reserve(num_vertices);
        mesh.halfedges.reserve(num_halfedges);
        mesh.faces.reserve(num_faces);
        mesh.edge_index.reserve(num_halfedges);
        mesh
    }

    // ==================== Accessors ====================

    /// Get the number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of half-edges.
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    /// Get the number of edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.halfedges.len() / 2
    }

    /// Get the number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId<I>) -> &Vertex<I> {
        &self.vertices[id.index()]
    }

    /// Get a half-edge by ID.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId<I>) -> &HalfEdge<I> {
        &self.halfedges[id.index()]
    }

    /// Get a face by ID.
    #[inline]
    pub fn face(&self, id: FaceId<I>) -> &Face<I> {
        &self.faces[id.index()]
    }

    /// Check whether a vertex ID refers to an existing vertex.
    #[inline]
    pub fn contains_vertex(&self, v: VertexId<I>) -> bool {
        v.is_valid() && v.index() < self.vertices.len()
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.points()[v.index()]
    }

    /// Set the position of a vertex.
    #[inline]
    pub fn set_position(&mut self, v: VertexId<I>, pos: Point3<f64>) {
        let points = self.points;
        self.vertex_prop_mut(points)[v.index()] = pos;
    }

    /// All vertex positions, indexed by vertex.
    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        self.vertex_prop(self.points)
    }

    // ==================== Topology Queries ====================

    /// Get the outgoing half-edge of a vertex (invalid if isolated).
    #[inline]
    pub fn vertex_halfedge(&self, v: VertexId<I>) -> HalfEdgeId<I> {
        self.vertex(v).halfedge
    }

    /// Get one half-edge of a face.
    #[inline]
    pub fn face_halfedge(&self, f: FaceId<I>) -> HalfEdgeId<I> {
        self.face(f).halfedge
    }

    /// Get the opposite half-edge.
    #[inline]
    pub fn opposite(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        he.opposite()
    }

    /// Get the next half-edge around the face.
    #[inline]
    pub fn next(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).next
    }

    /// Get the previous half-edge around the face.
    #[inline]
    pub fn prev(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).prev
    }

    /// Get the vertex a half-edge points to.
    #[inline]
    pub fn to_vertex(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.halfedge(he).vertex
    }

    /// Get the vertex a half-edge emanates from.
    #[inline]
    pub fn from_vertex(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.to_vertex(he.opposite())
    }

    /// Get the face of a half-edge.
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId<I>) -> FaceId<I> {
        self.halfedge(he).face
    }

    /// Get the edge a half-edge belongs to.
    #[inline]
    pub fn edge(&self, he: HalfEdgeId<I>) -> EdgeId<I> {
        he.edge()
    }

    /// Rotate an outgoing half-edge clockwise around its origin.
    #[inline]
    pub fn cw_rotated_halfedge(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.next(he.opposite())
    }

    /// Rotate an outgoing half-edge counter-clockwise around its origin.
    #[inline]
    pub fn ccw_rotated_halfedge(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.prev(he).opposite()
    }

    /// Check if a half-edge is on the boundary.
    #[inline]
    pub fn is_boundary_halfedge(&self, he: HalfEdgeId<I>) -> bool {
        self.halfedge(he).is_boundary()
    }

    /// Check if an edge is on the boundary (either side has no face).
    #[inline]
    pub fn is_boundary_edge(&self, e: EdgeId<I>) -> bool {
        self.is_boundary_halfedge(e.halfedge(0)) || self.is_boundary_halfedge(e.halfedge(1))
    }

    /// Check if a vertex is on the boundary.
    ///
    /// Isolated vertices count as boundary vertices. This relies on the
    /// outgoing half-edge of a boundary vertex being a boundary half-edge,
    /// which every mutation of this mesh maintains.
    #[inline]
    pub fn is_boundary_vertex(&self, v: VertexId<I>) -> bool {
        let h = self.vertex_halfedge(v);
        !(h.is_valid() && self.face_of(h).is_valid())
    }

    /// Check if a vertex has no incident edge.
    #[inline]
    pub fn is_isolated(&self, v: VertexId<I>) -> bool {
        !self.vertex_halfedge(v).is_valid()
    }

    /// Check that the rotation cycle of `v` has at most one boundary gap.
    ///
    /// This is a local check: only the cycle reachable from the vertex's
    /// outgoing half-edge is looked at, so a vertex shared by two disjoint
    /// closed fans passes. Use
    /// [`non_manifold_vertices`](Self::non_manifold_vertices) to find every
    /// non-manifold vertex.
    pub fn is_manifold(&self, v: VertexId<I>) -> bool {
        self.vertex_halfedges(v)
            .filter(|&h| self.is_boundary_halfedge(h))
            .count()
            < 2
    }

    /// Find the half-edge from `start` to `end`.
    pub fn find_halfedge(&self, start: VertexId<I>, end: VertexId<I>) -> Option<HalfEdgeId<I>> {
        self.edge_index.get(&(start, end)).copied()
    }

    /// Find the edge between `a` and `b`.
    pub fn find_edge(&self, a: VertexId<I>, b: VertexId<I>) -> Option<EdgeId<I>> {
        self.find_halfedge(a, b).map(|h| h.edge())
    }

    /// Number of edges incident to a vertex.
    pub fn valence(&self, v: VertexId<I>) -> usize {
        self.vertex_halfedges(v).count()
    }

    /// Number of vertices (and half-edges) of a face.
    pub fn face_vertex_count(&self, f: FaceId<I>) -> usize {
        self.face_halfedges(f).count()
    }

    /// Check if every face is a triangle.
    pub fn is_triangle_mesh(&self) -> bool {
        self.face_ids().all(|f| self.face_vertex_count(f) == 3)
    }

    /// Check if every face is a quad.
    pub fn is_quad_mesh(&self) -> bool {
        self.face_ids().all(|f| self.face_vertex_count(f) == 4)
    }

    // ==================== Iteration ====================

    /// Iterate over all vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        (0..self.vertices.len()).map(VertexId::new)
    }

    /// Iterate over all half-edge IDs.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId<I>> + '_ {
        (0..self.halfedges.len()).map(HalfEdgeId::new)
    }

    /// Iterate over all edge IDs.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId<I>> + '_ {
        (0..self.num_edges()).map(EdgeId::new)
    }

    /// Iterate over all face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        (0..self.faces.len()).map(FaceId::new)
    }

    /// Iterate over half-edges around a vertex (outgoing half-edges).
    pub fn vertex_halfedges(&self, v: VertexId<I>) -> VertexHalfEdgeIter<'_, I> {
        VertexHalfEdgeIter::new(self, v)
    }

    /// Iterate over vertices adjacent to a vertex.
    pub fn vertex_neighbors(&self, v: VertexId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertex_halfedges(v).map(|he| self.to_vertex(he))
    }

    /// Iterate over faces adjacent to a vertex.
    pub fn vertex_faces(&self, v: VertexId<I>) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.vertex_halfedges(v).filter_map(|he| self.face_of(he).valid())
    }

    /// Iterate over half-edges around a face.
    pub fn face_halfedges(&self, f: FaceId<I>) -> FaceHalfEdgeIter<'_, I> {
        FaceHalfEdgeIter::new(self, f)
    }

    /// Iterate over vertices of a face.
    pub fn face_vertices(&self, f: FaceId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.face_halfedges(f).map(|he| self.to_vertex(he))
    }

    // ==================== Properties ====================

    property_accessors!(
        "vertex", VertexId, vprops,
        add_vertex_property, get_vertex_property, get_or_add_vertex_property,
        remove_vertex_property, vertex_prop, vertex_prop_mut, vertex_properties
    );

    property_accessors!(
        "halfedge", HalfEdgeId, hprops,
        add_halfedge_property, get_halfedge_property, get_or_add_halfedge_property,
        remove_halfedge_property, halfedge_prop, halfedge_prop_mut, halfedge_properties
    );

    property_accessors!(
        "edge", EdgeId, eprops,
        add_edge_property, get_edge_property, get_or_add_edge_property,
        remove_edge_property, edge_prop, edge_prop_mut, edge_properties
    );

    property_accessors!(
        "face", FaceId, fprops,
        add_face_property, get_face_property, get_or_add_face_property,
        remove_face_property, face_prop, face_prop_mut, face_properties
    );

    /// The position property handle.
    pub fn point_property(&self) -> Property<Point3<f64>> {
        self.points
    }

    fn is_protected_property(&self, kind: &str, slot: usize) -> bool {
        kind == "vertex" && slot == self.points.slot()
    }

    // ==================== Construction ====================

    /// Largest number of vertices, half-edges or faces the index type `I`
    /// can address.
    pub fn max_elements() -> usize {
        I::MAX.to_usize()
    }

    /// Check whether `n` more vertices fit the index type.
    pub fn has_vertex_capacity(&self, n: usize) -> bool {
        self.vertices.len() + n <= Self::max_elements()
    }

    /// Add a new vertex and return its ID.
    ///
    /// Returns `None` if the index type cannot address another vertex.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> Option<VertexId<I>> {
        if !self.has_vertex_capacity(1) {
            return None;
        }
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex::default());
        self.vprops.push();
        self.set_position(id, position);
        Some(id)
    }

    /// Add a new vertex carrying a copy of every property of `v`.
    ///
    /// The copy is isolated: no half-edge is attached to it. Returns `None`
    /// if the index type cannot address another vertex.
    pub fn duplicate_vertex(&mut self, v: VertexId<I>) -> Option<VertexId<I>> {
        if !self.has_vertex_capacity(1) {
            return None;
        }
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex::default());
        self.vprops.push();
        self.vprops.copy(v.index(), id.index());
        Some(id)
    }

    /// Allocate a new pair of half-edges `v0 -> v1` and `v1 -> v0` that
    /// belongs to no face.
    ///
    /// The pair is spliced into the boundary loop at each endpoint that
    /// already has edges, and closes on itself at an isolated endpoint. An
    /// isolated endpoint gets the new half-edge leaving it as its outgoing
    /// half-edge. Either way [`add_face`](Self::add_face) can later link the
    /// edge like any other boundary edge.
    ///
    /// Returns `None` if `v0 == v1`, if the two vertices are already
    /// connected, if an endpoint is not a boundary vertex, or if the index
    /// type cannot address another edge.
    pub fn new_edge(&mut self, v0: VertexId<I>, v1: VertexId<I>) -> Option<HalfEdgeId<I>> {
        if v0 == v1
            || self.find_halfedge(v0, v1).is_some()
            || !self.is_boundary_vertex(v0)
            || !self.is_boundary_vertex(v1)
            || !self.has_halfedge_capacity(2)
        {
            return None;
        }

        let h0 = self.alloc_edge(v0, v1);
        let h1 = h0.opposite();
        self.splice_edge_end(h0, v0);
        self.splice_edge_end(h1, v1);
        Some(h0)
    }

    /// Link the end of a dangling edge at `v`, where `out` leaves `v`.
    fn splice_edge_end(&mut self, out: HalfEdgeId<I>, v: VertexId<I>) {
        let boundary_next = self.vertex_halfedge(v);
        if boundary_next.is_valid() {
            let boundary_prev = self.prev(boundary_next);
            self.set_next(boundary_prev, out);
            self.set_next(out.opposite(), boundary_next);
        } else {
            self.set_next(out.opposite(), out);
            self.set_vertex_halfedge(v, out);
        }
    }

    fn has_halfedge_capacity(&self, n: usize) -> bool {
        self.halfedges.len() + n <= Self::max_elements()
    }

    fn alloc_edge(&mut self, v0: VertexId<I>, v1: VertexId<I>) -> HalfEdgeId<I> {
        let h0 = HalfEdgeId::new(self.halfedges.len());
        let h1 = h0.opposite();
        self.halfedges.push(HalfEdge::new(v1));
        self.halfedges.push(HalfEdge::new(v0));
        self.hprops.push();
        self.hprops.push();
        self.eprops.push();
        self.edge_index.insert((v0, v1), h0);
        self.edge_index.insert((v1, v0), h1);
        h0
    }

    fn new_face(&mut self, halfedge: HalfEdgeId<I>) -> FaceId<I> {
        let id = FaceId::new(self.faces.len());
        self.faces.push(Face { halfedge });
        self.fprops.push();
        id
    }

    /// Add a triangle connecting `v0`, `v1`, `v2`.
    pub fn add_triangle(&mut self, v0: VertexId<I>, v1: VertexId<I>, v2: VertexId<I>) -> Option<FaceId<I>> {
        self.add_face(&[v0, v1, v2])
    }

    /// Add a quad connecting `v0`, `v1`, `v2`, `v3`.
    pub fn add_quad(
        &mut self,
        v0: VertexId<I>,
        v1: VertexId<I>,
        v2: VertexId<I>,
        v3: VertexId<I>,
    ) -> Option<FaceId<I>> {
        self.add_face(&[v0, v1, v2, v3])
    }

    /// Link a new face into the mesh.
    ///
    /// Existing boundary half-edges between consecutive vertices are reused
    /// and missing ones are created. Returns `None`, leaving the mesh
    /// untouched, if the face has fewer than three vertices, repeats or
    /// references a missing vertex, touches a vertex that is not on the
    /// boundary (complex vertex), reuses a half-edge that already has a face
    /// (complex edge), or would need to relink a patch around a vertex that
    /// has no free gap, or if the index type cannot address the new edges or
    /// the face.
    pub fn add_face(&mut self, vertices: &[VertexId<I>]) -> Option<FaceId<I>> {
        let n = vertices.len();
        if n < 3 {
            return None;
        }
        for (i, &v) in vertices.iter().enumerate() {
            if !self.contains_vertex(v) || vertices[i + 1..].contains(&v) {
                return None;
            }
        }

        let mut halfedges = vec![HalfEdgeId::invalid(); n];
        let mut is_new = vec![false; n];
        let mut needs_adjust = vec![false; n];
        let mut next_cache: Vec<(HalfEdgeId<I>, HalfEdgeId<I>)> = Vec::with_capacity(3 * n);

        // Test for topological errors
        for i in 0..n {
            let ii = (i + 1) % n;
            if !self.is_boundary_vertex(vertices[i]) {
                log::trace!("add_face: complex vertex {}", vertices[i]);
                return None;
            }

            match self.find_halfedge(vertices[i], vertices[ii]) {
                Some(h) if !self.is_boundary_halfedge(h) => {
                    log::trace!("add_face: complex edge {} -> {}", vertices[i], vertices[ii]);
                    return None;
                }
                Some(h) => halfedges[i] = h,
                None => is_new[i] = true,
            }
        }

        // Re-link patches if necessary
        for i in 0..n {
            let ii = (i + 1) % n;
            if is_new[i] || is_new[ii] {
                continue;
            }

            let inner_prev = halfedges[i];
            let inner_next = halfedges[ii];
            if self.next(inner_prev) == inner_next {
                continue;
            }

            // The patch between inner_prev and inner_next has to move into
            // the free gap between boundary_prev and boundary_next.
            let Some(boundary_prev) = self.find_free_gap(inner_prev, inner_next) else {
                log::trace!("add_face: no free gap around {}", vertices[ii]);
                return None;
            };
            let boundary_next = self.next(boundary_prev);
            if boundary_next == inner_next {
                log::trace!("add_face: patch re-linking failed at {}", vertices[ii]);
                return None;
            }

            let patch_start = self.next(inner_prev);
            let patch_end = self.prev(inner_next);

            next_cache.push((boundary_prev, patch_start));
            next_cache.push((patch_end, boundary_next));
            next_cache.push((inner_prev, inner_next));
        }

        let new_edges = is_new.iter().filter(|&&b| b).count();
        if !self.has_halfedge_capacity(2 * new_edges) || self.faces.len() >= Self::max_elements() {
            log::trace!("add_face: index type exhausted");
            return None;
        }

        // Nothing has been modified up to here.

        // Create missing edges
        for i in 0..n {
            if is_new[i] {
                halfedges[i] = self.alloc_edge(vertices[i], vertices[(i + 1) % n]);
            }
        }

        let f = self.new_face(halfedges[n - 1]);

        // Set up half-edges
        for i in 0..n {
            let ii = (i + 1) % n;
            let v = vertices[ii];
            let inner_prev = halfedges[i];
            let inner_next = halfedges[ii];

            match (is_new[i], is_new[ii]) {
                (false, false) => {
                    needs_adjust[ii] = self.vertex_halfedge(v) == inner_next;
                }
                (prev_new, next_new) => {
                    let outer_prev = inner_next.opposite();
                    let outer_next = inner_prev.opposite();

                    if !next_new {
                        // prev is new, next is old
                        let boundary_prev = self.prev(inner_next);
                        next_cache.push((boundary_prev, outer_next));
                        self.set_vertex_halfedge(v, outer_next);
                    } else if !prev_new {
                        // next is new, prev is old
                        let boundary_next = self.next(inner_prev);
                        next_cache.push((outer_prev, boundary_next));
                        self.set_vertex_halfedge(v, boundary_next);
                    } else {
                        // both are new
                        let boundary_next = self.vertex_halfedge(v);
                        if !boundary_next.is_valid() {
                            self.set_vertex_halfedge(v, outer_next);
                            next_cache.push((outer_prev, outer_next));
                        } else {
                            let boundary_prev = self.prev(boundary_next);
                            next_cache.push((boundary_prev, outer_next));
                            next_cache.push((outer_prev, boundary_next));
                        }
                    }

                    next_cache.push((inner_prev, inner_next));
                }
            }

            self.set_face(inner_prev, f);
        }

        for (h, next) in next_cache {
            self.set_next(h, next);
        }

        for (i, &v) in vertices.iter().enumerate() {
            if needs_adjust[i] {
                self.adjust_outgoing_halfedge(v);
            }
        }

        Some(f)
    }

    /// Search the boundary gap around the target of `inner_prev` that a
    /// patch starting at `inner_next` can be moved into.
    ///
    /// Returns the boundary half-edge entering the gap, or `None` if the
    /// rotation does not find one within the number of half-edges.
    pub(crate) fn find_free_gap(
        &self,
        inner_prev: HalfEdgeId<I>,
        inner_next: HalfEdgeId<I>,
    ) -> Option<HalfEdgeId<I>> {
        let mut boundary_prev = inner_next.opposite();
        for _ in 0..self.halfedges.len() {
            boundary_prev = self.next(boundary_prev).opposite();
            if self.is_boundary_halfedge(boundary_prev) && boundary_prev != inner_prev {
                return Some(boundary_prev);
            }
        }
        None
    }

    // ==================== Low-level connectivity ====================

    /// Set the outgoing half-edge of a vertex.
    #[inline]
    pub(crate) fn set_vertex_halfedge(&mut self, v: VertexId<I>, h: HalfEdgeId<I>) {
        self.vertices[v.index()].halfedge = h;
    }

    /// Link `h -> next` (and `next.prev = h`).
    #[inline]
    pub(crate) fn set_next(&mut self, h: HalfEdgeId<I>, next: HalfEdgeId<I>) {
        self.halfedges[h.index()].next = next;
        self.halfedges[next.index()].prev = h;
    }

    #[inline]
    pub(crate) fn set_face(&mut self, h: HalfEdgeId<I>, f: FaceId<I>) {
        self.halfedges[h.index()].face = f;
    }

    /// Redirect half-edge `h` to point to `v`, keeping the edge index in sync.
    ///
    /// The opposite half-edge thereby starts at `v`.
    pub(crate) fn set_to_vertex(&mut self, h: HalfEdgeId<I>, v: VertexId<I>) {
        let from = self.from_vertex(h);
        let to = self.to_vertex(h);
        self.edge_index.remove(&(from, to));
        self.edge_index.remove(&(to, from));

        self.halfedges[h.index()].vertex = v;

        self.edge_index.insert((from, v), h);
        self.edge_index.insert((v, from), h.opposite());
    }

    /// Make the outgoing half-edge of `v` a boundary half-edge, if it has one.
    pub(crate) fn adjust_outgoing_halfedge(&mut self, v: VertexId<I>) {
        let boundary = self
            .vertex_halfedges(v)
            .find(|&h| self.is_boundary_halfedge(h));
        if let Some(h) = boundary {
            self.set_vertex_halfedge(v, h);
        }
    }

    /// Drop vertices `n..`. They must be isolated.
    pub(crate) fn truncate_vertices(&mut self, n: usize) {
        debug_assert!(self.vertices[n.min(self.vertices.len())..]
            .iter()
            .all(|v| !v.halfedge.is_valid()));
        self.vertices.truncate(n);
        self.vprops.resize(self.vertices.len());
    }

    /// Delete every vertex without incident edges and compact the vertex
    /// indices.
    ///
    /// Half-edges are remapped to the new indices. Returns the number of
    /// removed vertices.
    pub fn remove_isolated_vertices(&mut self) -> usize {
        let mut keep: Vec<bool> = self.vertices.iter().map(|v| v.halfedge.is_valid()).collect();
        // Endpoints of unlinked edges have no outgoing half-edge yet.
        for he in &self.halfedges {
            keep[he.vertex.index()] = true;
        }
        let removed = keep.iter().filter(|&&k| !k).count();
        if removed == 0 {
            return 0;
        }

        let mut remap = vec![VertexId::invalid(); keep.len()];
        let mut next = 0;
        for (old, &k) in keep.iter().enumerate() {
            if k {
                remap[old] = VertexId::new(next);
                next += 1;
            }
        }

        for he in &mut self.halfedges {
            he.vertex = remap[he.vertex.index()];
        }

        let mut i = 0;
        self.vertices.retain(|_| {
            let k = keep[i];
            i += 1;
            k
        });
        self.vprops.retain(&keep);

        self.edge_index.clear();
        for (h, he) in self.halfedges.iter().enumerate() {
            let h = HalfEdgeId::new(h);
            self.edge_index.insert((self.halfedges[h.opposite().index()].vertex, he.vertex), h);
        }

        removed
    }

    // ==================== Validation ====================

    /// Vertices whose incident faces do not form a single fan.
    ///
    /// A vertex is reported if its rotation cycle contains more than one
    /// boundary gap, or if some half-edge leaving it is not on that cycle.
    pub fn non_manifold_vertices(&self) -> Vec<VertexId<I>> {
        let mut degree = vec![0usize; self.vertices.len()];
        for (h, he) in self.halfedges.iter().enumerate() {
            if he.next.is_valid() {
                degree[self.from_vertex(HalfEdgeId::new(h)).index()] += 1;
            }
        }

        self.vertex_ids()
            .filter(|&v| {
                let mut cycle = 0;
                let mut gaps = 0;
                for h in self.vertex_halfedges(v) {
                    cycle += 1;
                    if self.is_boundary_halfedge(h) {
                        gaps += 1;
                    }
                }
                gaps > 1 || cycle != degree[v.index()]
            })
            .collect()
    }

    /// Check if the mesh is valid (all connectivity is consistent).
    pub fn is_valid(&self) -> bool {
        if self.halfedges.len() % 2 != 0 {
            return false;
        }

        // Check vertices
        for (i, v) in self.vertices.iter().enumerate() {
            if v.halfedge.is_valid()
                && (v.halfedge.index() >= self.halfedges.len() || self.from_vertex(v.halfedge).index() != i)
            {
                return false;
            }
        }

        // Check half-edges
        for (i, he) in self.halfedges.iter().enumerate() {
            let h = HalfEdgeId::new(i);
            if !self.contains_vertex(he.vertex) || he.vertex == self.from_vertex(h) {
                return false;
            }

            if he.next.is_valid() {
                if self.halfedge(he.next).prev != h {
                    return false;
                }
                // next leaves the vertex this one enters
                if self.from_vertex(he.next) != he.vertex {
                    return false;
                }
            }

            if he.prev.is_valid() && self.halfedge(he.prev).next != h {
                return false;
            }

            if he.face.is_valid() && he.face.index() >= self.faces.len() {
                return false;
            }
        }

        // Check faces
        for (i, f) in self.faces.iter().enumerate() {
            if !f.halfedge.is_valid() {
                return false;
            }
            let fid = FaceId::new(i);
            let mut len = 0;
            let mut h = f.halfedge;
            loop {
                if self.face_of(h) != fid || !self.next(h).is_valid() {
                    return false;
                }
                len += 1;
                h = self.next(h);
                if h == f.halfedge {
                    break;
                }
                if len > self.halfedges.len() {
                    return false;
                }
            }
            if len < 3 {
                return false;
            }
        }

        true
    }
}

/// Iterator over outgoing half-edges around a vertex.
///
/// The walk is bounded by the number of half-edges in the mesh, so it
/// terminates even on inconsistent connectivity.
pub struct VertexHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    remaining: usize,
}

impl<'a, I: MeshIndex> VertexHalfEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, v: VertexId<I>) -> Self {
        let start = mesh.vertex_halfedge(v);
        Self {
            mesh,
            start,
            current: start,
            remaining: if start.is_valid() { mesh.num_halfedges() } else { 0 },
        }
    }
}

impl<'a, I: MeshIndex> Iterator for VertexHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let result = self.current;

        // If he goes v -> w, opposite(he) goes w -> v and the half-edge after
        // it in its face (or boundary loop) leaves v again.
        self.current = self.mesh.cw_rotated_halfedge(self.current);

        if self.current == self.start || !self.current.is_valid() {
            self.remaining = 0;
        }

        Some(result)
    }
}

/// Iterator over half-edges around a face.
pub struct FaceHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    remaining: usize,
}

impl<'a, I: MeshIndex> FaceHalfEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, f: FaceId<I>) -> Self {
        let start = mesh.face_halfedge(f);
        Self {
            mesh,
            start,
            current: start,
            remaining: if start.is_valid() { mesh.num_halfedges() } else { 0 },
        }
    }
}

impl<'a, I: MeshIndex> Iterator for FaceHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let result = self.current;
        self.current = self.mesh.next(self.current);

        if self.current == self.start || !self.current.is_valid() {
            self.remaining = 0;
        }

        Some(result)
    }
}
