//! Splitting of non-manifold vertices.
//!
//! After all faces have been linked, a vertex can still be shared by several
//! fans of faces. It either appears in several disjoint rotation cycles (two
//! closed disks touching at a point), or in one cycle that crosses the
//! boundary more than once (a bowtie). Both are repaired here by giving each
//! fan its own vertex.
//!
//! The sweep works on incoming half-edges: the *star* of a half-edge `h`
//! pointing to `v` is the cycle `h, prev(opposite(h)), ...` of all half-edges
//! pointing to `v` that can be reached by rotation.

use std::collections::BTreeMap;

use crate::mesh::halfedge::HalfEdgeMesh;
use crate::mesh::index::{HalfEdgeId, MeshIndex, VertexId};

/// Split every non-manifold vertex of `mesh` into one vertex per fan.
///
/// For each affected vertex the first fan found keeps the vertex; every other
/// fan is moved to a vertex obtained from `copy_vertex`, which receives the
/// vertex being split and must return a new isolated vertex, or `None` if no
/// vertex can be added. Boundary loops are re-linked so that each fan gets
/// its own gap. When `copy_vertex` returns `None` the remaining fans stay on
/// the vertex, which is then still reported by
/// [`HalfEdgeMesh::non_manifold_vertices`].
///
/// Returns the number of vertices that were split. Running the sweep on its
/// own output returns 0.
///
/// # Example
///
/// ```
/// use mender::mesh::{resolve_non_manifold_vertices, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// // Two triangles touching at a single vertex.
/// let mut mesh: HalfEdgeMesh = HalfEdgeMesh::new();
/// let v: Vec<_> = (0..5)
///     .map(|i| mesh.add_vertex(Point3::new(i as f64, (i % 2) as f64, 0.0)).unwrap())
///     .collect();
/// mesh.add_triangle(v[0], v[1], v[2]).unwrap();
/// mesh.add_triangle(v[0], v[3], v[4]).unwrap();
/// assert!(!mesh.is_manifold(v[0]));
///
/// let split = resolve_non_manifold_vertices(&mut mesh, |m, v| m.duplicate_vertex(v));
/// assert_eq!(split, 1);
/// assert_eq!(mesh.num_vertices(), 6);
/// assert!(mesh.non_manifold_vertices().is_empty());
/// ```
pub fn resolve_non_manifold_vertices<I, F>(mesh: &mut HalfEdgeMesh<I>, mut copy_vertex: F) -> usize
where
    I: MeshIndex,
    F: FnMut(&mut HalfEdgeMesh<I>, VertexId<I>) -> Option<VertexId<I>>,
{
    let cones = find_non_manifold_cones(mesh);
    if cones.is_empty() {
        return 0;
    }
    log::debug!("resolving {} non-manifold stars", cones.len());

    let mut copy_record: BTreeMap<VertexId<I>, Vec<VertexId<I>>> = BTreeMap::new();
    for h in cones {
        resolve_non_manifold_vertex(mesh, h, &mut copy_record, &mut copy_vertex);
    }

    copy_record.len()
}

/// One incoming half-edge per star that has to be split off or repaired.
fn find_non_manifold_cones<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> Vec<HalfEdgeId<I>> {
    let mut visited_halfedges = vec![false; mesh.num_halfedges()];
    let mut first_star = vec![HalfEdgeId::<I>::invalid(); mesh.num_vertices()];
    let mut known_non_manifold = vec![false; mesh.num_vertices()];
    let mut cones = Vec::new();

    for h in mesh.halfedge_ids() {
        if visited_halfedges[h.index()] {
            continue;
        }
        visited_halfedges[h.index()] = true;
        if !mesh.next(h).is_valid() {
            continue;
        }

        let v = mesh.to_vertex(h);
        let mut is_non_manifold = false;

        let first = first_star[v.index()];
        if first.is_valid() {
            // Seen before, but not from this star.
            is_non_manifold = true;
            if !known_non_manifold[v.index()] {
                cones.push(first);
            }
        } else {
            first_star[v.index()] = h;
        }

        let Some(star) = incoming_star(mesh, h) else {
            log::error!("star of vertex {} does not close, vertex skipped", v);
            known_non_manifold[v.index()] = true;
            continue;
        };

        let mut borders = 0;
        for &ih in &star {
            visited_halfedges[ih.index()] = true;
            if mesh.is_boundary_halfedge(ih) {
                borders += 1;
            }
        }

        // Pinched: the star crosses the boundary more than once.
        if borders > 1 {
            is_non_manifold = true;
        }

        if is_non_manifold {
            cones.push(h);
            known_non_manifold[v.index()] = true;
        }
    }

    cones
}

/// The half-edges pointing to `to_vertex(h)` reachable by rotation, starting
/// with `h`. `None` if the rotation does not return to `h`.
fn incoming_star<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, h: HalfEdgeId<I>) -> Option<Vec<HalfEdgeId<I>>> {
    let mut star = Vec::new();
    let mut ih = h;
    for _ in 0..mesh.num_halfedges() {
        star.push(ih);
        ih = mesh.prev(ih.opposite());
        if !ih.is_valid() {
            return None;
        }
        if ih == h {
            return Some(star);
        }
    }
    None
}

/// Give every sector of the star of `h` its own vertex, except the first
/// sector met for that vertex. Returns the number of vertices created.
fn resolve_non_manifold_vertex<I, F>(
    mesh: &mut HalfEdgeMesh<I>,
    h: HalfEdgeId<I>,
    copy_record: &mut BTreeMap<VertexId<I>, Vec<VertexId<I>>>,
    copy_vertex: &mut F,
) -> usize
where
    I: MeshIndex,
    F: FnMut(&mut HalfEdgeMesh<I>, VertexId<I>) -> Option<VertexId<I>>,
{
    let old_v = mesh.to_vertex(h);
    let Some(star) = incoming_star(mesh, h) else {
        log::error!("star of vertex {} does not close, vertex skipped", old_v);
        return 0;
    };

    let borders: Vec<HalfEdgeId<I>> = star
        .iter()
        .copied()
        .filter(|&ih| mesh.is_boundary_halfedge(ih))
        .collect();

    if borders.len() <= 1 {
        // A single fan. The first one met keeps the vertex, any later one
        // moves as a whole.
        if !copy_record.contains_key(&old_v) {
            copy_record.insert(old_v, Vec::new());
            mesh.set_vertex_halfedge(old_v, h.opposite());
            mesh.adjust_outgoing_halfedge(old_v);
            return 0;
        }

        let Some(new_v) = copy_vertex(mesh, old_v) else {
            log::error!("no vertex left to split {}", old_v);
            return 0;
        };
        for &ih in &star {
            mesh.set_to_vertex(ih, new_v);
        }
        mesh.set_vertex_halfedge(new_v, h.opposite());
        mesh.adjust_outgoing_halfedge(new_v);
        copy_record.entry(old_v).or_default().push(new_v);
        return 1;
    }

    // Several sectors, each bounded by a boundary half-edge coming in and a
    // boundary half-edge going out.
    let border_h = borders[0];
    let mut sector_start = border_h;
    let mut is_main_sector = true;
    let mut created = 0;

    for _ in 0..borders.len() {
        let mut sector = vec![sector_start];
        let mut sector_last = sector_start;
        for _ in 0..star.len() {
            let next_h = mesh.prev(sector_last.opposite());
            if mesh.is_boundary_halfedge(next_h) || next_h == sector_start {
                break;
            }
            sector_last = next_h;
            sector.push(next_h);
        }

        let next_start = mesh.prev(sector_last.opposite());
        let outgoing = sector_last.opposite();

        // Close the boundary loop around this sector.
        mesh.set_next(sector_start, outgoing);

        if !is_main_sector || copy_record.contains_key(&old_v) {
            // Without a copy the sector keeps the vertex as a separate cycle.
            match copy_vertex(mesh, old_v) {
                Some(new_v) => {
                    for &ih in &sector {
                        mesh.set_to_vertex(ih, new_v);
                    }
                    mesh.set_vertex_halfedge(new_v, outgoing);
                    copy_record.entry(old_v).or_default().push(new_v);
                    created += 1;
                }
                None => log::error!("no vertex left to split {}", old_v),
            }
        } else {
            mesh.set_vertex_halfedge(old_v, outgoing);
        }

        is_main_sector = false;
        sector_start = next_start;
        if sector_start == border_h {
            break;
        }
    }

    created
}
