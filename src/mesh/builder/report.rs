//! Summary of a builder session.

use std::fmt;

/// Faces that were ignored, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectedFaces {
    /// Faces with fewer than three vertices.
    pub too_few_vertices: usize,
    /// Faces referencing the same vertex more than once.
    pub duplicated_vertices: usize,
    /// Faces referencing a vertex that does not exist.
    pub out_of_range_vertices: usize,
    /// Faces that could not be linked even after duplicating vertices.
    pub unknown_topology: usize,
}

impl RejectedFaces {
    /// Total number of ignored faces.
    pub fn total(&self) -> usize {
        self.too_few_vertices + self.duplicated_vertices + self.out_of_range_vertices + self.unknown_topology
    }
}

/// What a [`ManifoldBuilder`](super::ManifoldBuilder) session found and fixed.
///
/// The `Display` implementation renders the multi-line summary that
/// [`end_surface`](super::ManifoldBuilder::end_surface) logs when asked to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Ignored faces.
    pub rejected: RejectedFaces,

    /// Input vertices that had to be copied at least once.
    pub non_manifold_vertices: usize,
    /// Total number of copies made, over all input vertices.
    pub copy_occurrences: usize,
    /// Input vertices copied so that a face could be linked into a fan.
    pub linking_copied_vertices: usize,
    /// Copies made so that a face could be linked into a fan.
    pub linking_copy_occurrences: usize,
    /// Vertices split apart by the final sweep.
    pub split_vertices: usize,

    /// Directed input edges used by more than one face.
    pub non_manifold_edges: usize,
    /// Vertices not used by any face, removed at the end.
    pub isolated_vertices: usize,
    /// Vertices still non-manifold after the sweep (should be zero).
    pub remaining_non_manifold_vertices: usize,

    /// Number of vertices of the result.
    pub num_vertices: usize,
    /// Number of edges of the result.
    pub num_edges: usize,
    /// Number of faces of the result.
    pub num_faces: usize,
}

impl BuildReport {
    /// Whether anything was ignored, repaired or removed.
    pub fn has_issues(&self) -> bool {
        self.rejected.total() > 0
            || self.non_manifold_vertices > 0
            || self.non_manifold_edges > 0
            || self.isolated_vertices > 0
            || self.remaining_non_manifold_vertices > 0
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_issues() {
            return write!(
                f,
                "mesh built without issues: {} faces, {} vertices, {} edges",
                self.num_faces, self.num_vertices, self.num_edges
            );
        }

        write!(f, "mesh has topological issues:")?;

        let r = &self.rejected;
        if r.too_few_vertices > 0 {
            write!(f, "\n\t\t{} faces with less than 3 vertices (ignored)", r.too_few_vertices)?;
        }
        if r.duplicated_vertices > 0 {
            write!(f, "\n\t\t{} faces with duplicated vertices (ignored)", r.duplicated_vertices)?;
        }
        if r.out_of_range_vertices > 0 {
            write!(f, "\n\t\t{} faces with out-of-range vertices (ignored)", r.out_of_range_vertices)?;
        }
        if r.unknown_topology > 0 {
            write!(f, "\n\t\t{} complex faces with unknown topology (ignored)", r.unknown_topology)?;
        }
        if self.non_manifold_vertices > 0 {
            write!(f, "\n\t\t{} non-manifold vertices (fixed)", self.non_manifold_vertices)?;
        }
        if self.non_manifold_edges > 0 {
            write!(f, "\n\t\t{} non-manifold edges (fixed)", self.non_manifold_edges)?;
        }
        if self.isolated_vertices > 0 {
            write!(f, "\n\t\t{} isolated vertices (removed)", self.isolated_vertices)?;
        }
        if self.remaining_non_manifold_vertices > 0 {
            write!(
                f,
                "\n\t\t{} non-manifold vertices could not be fixed",
                self.remaining_non_manifold_vertices
            )?;
        }

        if self.copy_occurrences > 0 || self.isolated_vertices > 0 {
            write!(f, "\n\tSolution:")?;
            if self.copy_occurrences > 0 {
                write!(
                    f,
                    "\n\t\t{} vertices copied ({} occurrences) to ensure manifoldness",
                    self.non_manifold_vertices, self.copy_occurrences
                )?;
                if self.linking_copied_vertices > 0 {
                    write!(
                        f,
                        " (among which {} vertices with {} occurrences are for linking new faces)",
                        self.linking_copied_vertices, self.linking_copy_occurrences
                    )?;
                }
            }
            if self.isolated_vertices > 0 {
                write!(f, "\n\t\t{} isolated vertices deleted", self.isolated_vertices)?;
            }
        }

        write!(
            f,
            "\n\tResult:\n\t\t{} faces\n\t\t{} vertices\n\t\t{} edges",
            self.num_faces, self.num_vertices, self.num_edges
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_report() {
        let report = BuildReport {
            num_vertices: 4,
            num_edges: 6,
            num_faces: 4,
            ..Default::default()
        };
        assert!(!report.has_issues());
        assert_eq!(
            report.to_string(),
            "mesh built without issues: 4 faces, 4 vertices, 6 edges"
        );
    }

    #[test]
    fn test_report_lists_issues() {
        let report = BuildReport {
            rejected: RejectedFaces {
                duplicated_vertices: 1,
                ..Default::default()
            },
            non_manifold_vertices: 2,
            copy_occurrences: 3,
            linking_copied_vertices: 1,
            linking_copy_occurrences: 1,
            isolated_vertices: 1,
            num_vertices: 9,
            num_edges: 12,
            num_faces: 4,
            ..Default::default()
        };
        assert!(report.has_issues());
        assert_eq!(report.rejected.total(), 1);

        let text = report.to_string();
        assert!(text.contains("1 faces with duplicated vertices (ignored)"));
        assert!(text.contains("2 vertices copied (3 occurrences)"));
        assert!(text.contains("among which 1 vertices with 1 occurrences"));
        assert!(text.contains("1 isolated vertices deleted"));
        assert!(text.ends_with("4 faces\n\t\t9 vertices\n\t\t12 edges"));
        assert!(!text.contains("out-of-range"));
    }
}
