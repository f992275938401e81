//! # voronoi
//!
//! Incremental 3D Voronoi tessellation via its dual Delaunay
//! tetrahedralization, with per-site statistics for the analysis of atomic
//! and particle configurations.
//!
//! Sites are inserted one at a time; after each insertion the full diagram
//! around every site is queryable. The builder maintains the Delaunay
//! property with exact-arithmetic geometric predicates (a floating-point
//! filter backed by a Shewchuk-style expansion pipeline) and bistellar
//! flips, and derives the Voronoi statistics (coordination number, atomic
//! volume, cavity radius, and the Voronoi index histogram) lazily from the
//! dual.
//!
//! # Basic usage
//!
//! ```rust
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use voronoi::Builder;
//!
//! // A seeded RNG makes the run reproducible.
//! let mut builder = Builder::with_rng(StdRng::seed_from_u64(42));
//! builder.no_warning(true);
//!
//! // The eight corners of a unit cube, then its center.
//! for x in [0.0, 1.0] {
//!     for y in [0.0, 1.0] {
//!         for z in [0.0, 1.0] {
//!             builder.insert(x, y, z).unwrap();
//!         }
//!     }
//! }
//! let center = builder.insert(0.5, 0.5, 0.5).unwrap();
//!
//! assert_eq!(builder.num_sites(), 9);
//! builder.validate().unwrap(); // orientation, adjacency, Delaunay
//!
//! // The center's Voronoi cell is the octahedron bounded by the
//! // bisectors to the eight corners.
//! assert_eq!(builder.coordination(center), 8);
//! assert!((builder.atomic_volume(center) - 0.5625).abs() < 1e-9);
//! ```
//!
//! # Statistics configuration
//!
//! Truncation thresholds tame degenerate faces and edges; the relative and
//! absolute variants are mutually exclusive per axis:
//!
//! ```rust
//! use voronoi::Builder;
//!
//! let mut builder = Builder::new();
//! builder
//!     .area_threshold(0.01)      // drop faces below 1% of the cell surface
//!     .length_threshold(0.05)    // collapse short Voronoi polygon edges
//!     .index_length(9)           // histogram buckets
//!     .no_warning(true);         // silence incomplete-cell diagnostics
//! ```
//!
//! # Concurrency
//!
//! A builder instance is single-threaded; distinct instances are
//! independent. The exact predicates keep their scratch buffers in
//! thread-local storage, so builders on different threads never contend.

#![forbid(unsafe_code)]

/// Mesh data structure and the incremental algorithms operating on it.
pub mod core {
    /// The incremental builder: configuration, insertion, queries.
    pub mod builder;
    /// Per-site Voronoi cell statistics.
    pub mod cell;
    /// Collection aliases tuned for the mesh algorithms.
    pub mod collections;
    /// Bistellar flips restoring the Delaunay property.
    pub(crate) mod flips;
    /// Randomized walk point location.
    pub(crate) mod locate;
    /// Sites, tetrahedra, and the arena that owns them.
    pub mod mesh;

    pub use builder::*;
    pub use mesh::{SiteKey, TetKey};
}

/// Geometric types and the robust predicate stack.
pub mod geometry {
    /// Expansion arithmetic for the exact predicates.
    pub mod expansion;
    /// The 3D point type.
    pub mod point;
    /// Filtered/exact geometric predicates.
    pub mod predicates;

    pub use point::Point3;
    pub use predicates::*;
}

/// Commonly used types, re-exported for convenience.
pub mod prelude {
    pub use crate::core::builder::{Builder, InsertError, Threshold, ValidationError};
    pub use crate::core::mesh::{SiteKey, TetKey};
    pub use crate::geometry::point::Point3;
    pub use crate::geometry::predicates::{area, center_sphere, in_sphere, left_of_plane};
}

pub use crate::core::builder::{Builder, InsertError, Threshold, ValidationError};
pub use crate::core::mesh::{SiteKey, TetKey};
pub use crate::geometry::point::Point3;
