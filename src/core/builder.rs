//! The incremental Voronoi/Delaunay builder.
//!
//! A [`Builder`] owns the mesh arena, the walk RNG, and the statistics
//! configuration. It starts from a "universe" tetrahedron whose corners sit
//! far outside any realistic working domain (±2³⁰-scale coordinates along
//! asymmetric directions, which breaks symmetry and keeps planar inputs
//! manageable), so every inserted point lies strictly inside some
//! tetrahedron of the mesh.
//!
//! Builders are single-threaded; distinct instances are independent and may
//! run on different threads. With an explicitly seeded RNG a builder is
//! fully deterministic: the RNG draws of the location walk are the only
//! source of nondeterminism.

use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::collections::SmallBuffer;
use crate::core::flips::{flip1to4, try_flip};
use crate::core::locate::locate;
use crate::core::mesh::{Mesh, Site, SiteKey, TetKey, FACES, FACE_RING};
use crate::geometry::point::Point3;
use crate::geometry::predicates::{center_sphere, left_of_plane};

/// Half-extent scale of the universe tetrahedron.
const SCALE: f64 = 1_073_741_824.0; // 2^30

/// A truncation threshold for the statistics pass. The relative and the
/// absolute form are mutually exclusive per axis; setting one through the
/// builder deactivates the other. A value of zero disables truncation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Threshold {
    /// Compare against `ratio * reference`.
    Relative(f64),
    /// Compare against the bare value.
    Absolute(f64),
}

impl Threshold {
    /// Whether `value` survives truncation against `reference`.
    pub(crate) fn admits(self, value: f64, reference: f64) -> bool {
        match self {
            Self::Relative(r) => r == 0.0 || value > r * reference,
            Self::Absolute(a) => a == 0.0 || value > a,
        }
    }
}

/// Error returned by [`Builder::insert`].
#[derive(Debug, Error)]
pub enum InsertError {
    /// The point coincides bit-for-bit with an existing site or a universe
    /// corner. The mesh is left untouched.
    #[error("point {position:?} coincides with an existing site")]
    DuplicateSite {
        /// The rejected position.
        position: Point3,
    },

    /// A coordinate is NaN or infinite; the predicates are undefined on
    /// non-finite input.
    #[error("point {position:?} has a non-finite coordinate")]
    NonFiniteCoordinates {
        /// The rejected position.
        position: Point3,
    },
}

/// Structural or geometric invariant violation found by
/// [`Builder::validate`].
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A live tetrahedron is not positively oriented.
    #[error("tetrahedron {tet:?} is not positively oriented")]
    NonPositiveOrientation {
        /// The offending tetrahedron.
        tet: TetKey,
    },

    /// A neighbor reference points at a deleted tetrahedron.
    #[error("tetrahedron {tet:?} references dead neighbor {neighbor:?}")]
    DeadNeighbor {
        /// The referencing tetrahedron.
        tet: TetKey,
        /// The stale key.
        neighbor: TetKey,
    },

    /// Neighborhood is not mutual.
    #[error("tetrahedron {tet:?} is not referenced back by neighbor {neighbor:?}")]
    AsymmetricAdjacency {
        /// The referencing tetrahedron.
        tet: TetKey,
        /// The neighbor missing the back reference.
        neighbor: TetKey,
    },

    /// Two face neighbors do not share the three face vertices.
    #[error("tetrahedra {tet:?} and {neighbor:?} do not share a face")]
    FaceMismatch {
        /// The referencing tetrahedron.
        tet: TetKey,
        /// The neighbor across the mismatched face.
        neighbor: TetKey,
    },

    /// A vertex of a neighboring tetrahedron lies strictly inside a
    /// circumsphere.
    #[error("site {site:?} lies strictly inside the circumsphere of {tet:?}")]
    DelaunayViolation {
        /// The tetrahedron whose circumsphere is violated.
        tet: TetKey,
        /// The intruding site.
        site: SiteKey,
    },

    /// A site hint references a deleted tetrahedron.
    #[error("site {site:?} has a stale adjacent-tetrahedron hint")]
    StaleHint {
        /// The site with the stale hint.
        site: SiteKey,
    },

    /// A site hint references a tetrahedron that does not contain the site.
    #[error("hint of site {site:?} does not contain it")]
    HintMissingSite {
        /// The site with the wrong hint.
        site: SiteKey,
    },
}

/// Incremental 3D Delaunay tetrahedralization with on-demand Voronoi
/// statistics per site.
#[derive(Debug)]
pub struct Builder {
    pub(crate) mesh: Mesh,
    universe: [SiteKey; 4],
    /// The most recently created tetrahedron; seeds the next location walk.
    last: TetKey,
    rng: StdRng,
    /// Sites in insertion order.
    order: Vec<SiteKey>,
    /// Statistics epoch; bumped by every structural mutation, compared by
    /// the per-site caches.
    pub(crate) epoch: u64,
    pub(crate) area_threshold: Threshold,
    pub(crate) length_threshold: Threshold,
    pub(crate) index_length: usize,
    pub(crate) no_warning: bool,
}

impl Builder {
    /// Creates a builder with an entropy-seeded RNG.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates a builder with an explicit RNG; required for reproducible
    /// runs.
    #[must_use]
    pub fn with_rng(rng: StdRng) -> Self {
        let mut mesh = Mesh::default();
        let a = mesh
            .sites
            .insert(Site::new(Point3::new(-SCALE * 1.1, SCALE * 1.6, -SCALE * 2.3)));
        let b = mesh
            .sites
            .insert(Site::new(Point3::new(SCALE * 1.5, SCALE * 1.9, SCALE * 1.8)));
        let c = mesh
            .sites
            .insert(Site::new(Point3::new(SCALE * 2.2, -SCALE * 1.4, -SCALE * 1.7)));
        let d = mesh
            .sites
            .insert(Site::new(Point3::new(-SCALE * 1.2, -SCALE * 2.1, SCALE * 1.3)));
        let last = mesh.new_tet(a, b, c, d);
        Self {
            mesh,
            universe: [a, b, c, d],
            last,
            rng,
            order: Vec::new(),
            epoch: 1,
            area_threshold: Threshold::Relative(0.0),
            length_threshold: Threshold::Relative(0.0),
            index_length: 9,
            no_warning: false,
        }
    }

    // -----------------------------------------------------------------
    // Configuration (chainable)
    // -----------------------------------------------------------------

    /// Drops Voronoi faces whose area is at most `ratio` times the cell
    /// surface area from coordination and index counts. Deactivates the
    /// absolute area threshold.
    pub fn area_threshold(&mut self, ratio: f64) -> &mut Self {
        let new = Threshold::Relative(ratio.max(0.0));
        if self.area_threshold != new {
            self.epoch += 1;
        }
        self.area_threshold = new;
        self
    }

    /// Absolute variant of [`Builder::area_threshold`]; deactivates the
    /// relative one.
    pub fn area_threshold_abs(&mut self, area: f64) -> &mut Self {
        let new = Threshold::Absolute(area.max(0.0));
        if self.area_threshold != new {
            self.epoch += 1;
        }
        self.area_threshold = new;
        self
    }

    /// Collapses Voronoi polygon edges shorter than `ratio` times the
    /// site-to-neighbor distance when counting face sides. Deactivates the
    /// absolute length threshold.
    pub fn length_threshold(&mut self, ratio: f64) -> &mut Self {
        let new = Threshold::Relative(ratio.max(0.0));
        if self.length_threshold != new {
            self.epoch += 1;
        }
        self.length_threshold = new;
        self
    }

    /// Absolute variant of [`Builder::length_threshold`]; deactivates the
    /// relative one.
    pub fn length_threshold_abs(&mut self, length: f64) -> &mut Self {
        let new = Threshold::Absolute(length.max(0.0));
        if self.length_threshold != new {
            self.epoch += 1;
        }
        self.length_threshold = new;
        self
    }

    /// Number of buckets of the Voronoi index histogram (at least 1;
    /// default 9). Faces with more sides are clamped into the last bucket.
    pub fn index_length(&mut self, length: usize) -> &mut Self {
        self.index_length = length.max(1);
        self
    }

    /// Suppresses diagnostic warnings about incomplete cells and
    /// out-of-range histogram buckets.
    pub fn no_warning(&mut self, suppress: bool) -> &mut Self {
        self.no_warning = suppress;
        self
    }

    // -----------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------

    /// Inserts a site at `(x, y, z)`.
    ///
    /// # Errors
    ///
    /// Rejects non-finite coordinates and exact duplicates of an existing
    /// site (or universe corner); the mesh is unchanged on error.
    pub fn insert(&mut self, x: f64, y: f64, z: f64) -> Result<SiteKey, InsertError> {
        self.insert_point(Point3::new(x, y, z))
    }

    /// Inserts a site at `p`. See [`Builder::insert`].
    ///
    /// The point must lie strictly inside the universe tetrahedron, i.e.
    /// coordinates must stay well below the 2³⁰ bootstrap scale.
    ///
    /// # Errors
    ///
    /// Rejects non-finite coordinates and exact duplicates of an existing
    /// site (or universe corner); the mesh is unchanged on error.
    pub fn insert_point(&mut self, p: Point3) -> Result<SiteKey, InsertError> {
        if !p.is_finite() {
            return Err(InsertError::NonFiniteCoordinates { position: p });
        }
        let enclosing = locate(&self.mesh, &mut self.rng, p, self.last);
        self.last = enclosing;
        for corner in self.mesh.tets[enclosing].verts {
            if self.mesh.position(corner).coincides(&p) {
                return Err(InsertError::DuplicateSite { position: p });
            }
        }

        self.epoch += 1;
        let site = self.mesh.sites.insert(Site::new(p));
        self.mesh.sites[site].hint = enclosing;

        let mut ears = Vec::new();
        self.last = flip1to4(&mut self.mesh, enclosing, site, &mut ears);
        while let Some(ear) = ears.pop() {
            if let Some(t) = try_flip(&mut self.mesh, ear, &mut ears) {
                self.last = t;
            }
        }

        self.order.push(site);
        Ok(site)
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Number of inserted sites (universe corners excluded).
    #[must_use]
    pub fn num_sites(&self) -> usize {
        self.order.len()
    }

    /// True when no site has been inserted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The `i`-th inserted site.
    #[must_use]
    pub fn site(&self, i: usize) -> Option<SiteKey> {
        self.order.get(i).copied()
    }

    /// All inserted sites, in insertion order.
    pub fn sites(&self) -> impl Iterator<Item = SiteKey> + '_ {
        self.order.iter().copied()
    }

    /// Position of a site.
    #[must_use]
    pub fn position(&self, site: SiteKey) -> Point3 {
        self.mesh.position(site)
    }

    /// True for the four bootstrap corners of the universe tetrahedron.
    #[must_use]
    pub fn is_universe(&self, site: SiteKey) -> bool {
        self.universe.contains(&site)
    }

    /// True when any corner of `t` is a universe corner.
    #[must_use]
    pub fn is_universe_tetrahedron(&self, t: TetKey) -> bool {
        self.mesh.tets[t]
            .verts
            .iter()
            .any(|v| self.universe.contains(v))
    }

    /// The most recently created tetrahedron.
    #[must_use]
    pub fn last_tetrahedron(&self) -> TetKey {
        self.last
    }

    /// All live tetrahedra, in arbitrary order.
    pub fn tetrahedra(&self) -> impl Iterator<Item = TetKey> + '_ {
        self.mesh.tets.keys()
    }

    /// Number of live tetrahedra.
    #[must_use]
    pub fn num_tetrahedra(&self) -> usize {
        self.mesh.tets.len()
    }

    /// Whether `t` is still part of the mesh.
    #[must_use]
    pub fn contains_tetrahedron(&self, t: TetKey) -> bool {
        self.mesh.is_live(t)
    }

    /// The four corner sites of `t` in ordinal order.
    #[must_use]
    pub fn tetrahedron_sites(&self, t: TetKey) -> [SiteKey; 4] {
        self.mesh.tets[t].verts
    }

    /// The non-universe corner sites of `t`.
    #[must_use]
    pub fn tetrahedron_neighbor_sites(&self, t: TetKey) -> SmallBuffer<SiteKey, 4> {
        self.mesh.tets[t]
            .verts
            .iter()
            .copied()
            .filter(|v| !self.universe.contains(v))
            .collect()
    }

    /// The live face neighbors of `t`.
    #[must_use]
    pub fn tetrahedron_neighbors(&self, t: TetKey) -> SmallBuffer<TetKey, 4> {
        self.mesh.tets[t]
            .neighbors
            .iter()
            .flatten()
            .copied()
            .filter(|&n| self.mesh.is_live(n))
            .collect()
    }

    /// Circumcenter of `t`, or `None` (with a warning) for universe
    /// tetrahedra, whose far-away corners make the value meaningless.
    pub fn circumcenter(&mut self, t: TetKey) -> Option<Point3> {
        if self.is_universe_tetrahedron(t) {
            if !self.no_warning {
                warn!("circumcenter of universe tetrahedron {t:?} is undefined");
            }
            return None;
        }
        Some(self.circumcenter_raw(t))
    }

    /// Cached circumcenter, computed on first access. The corner sites of a
    /// tetrahedron never change, so the cache needs no invalidation.
    pub(crate) fn circumcenter_raw(&mut self, t: TetKey) -> Point3 {
        if let Some(c) = self.mesh.tets[t].center {
            return c;
        }
        let [a, b, c, d] = self.mesh.tets[t].verts;
        let center = center_sphere(
            self.mesh.position(a),
            self.mesh.position(b),
            self.mesh.position(c),
            self.mesh.position(d),
        );
        self.mesh.tets[t].center = Some(center);
        center
    }

    // -----------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------

    /// Checks the structural and geometric invariants of the mesh:
    /// positive orientation, mutual face adjacency, the Delaunay property,
    /// and site-hint validity. Returns the first violation found.
    ///
    /// This is a full-mesh sweep intended for tests and debugging, not for
    /// per-insertion use.
    ///
    /// # Errors
    ///
    /// The first [`ValidationError`] encountered, if any.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (t, tet) in &self.mesh.tets {
            let [a, b, c, d] = tet.verts;
            if left_of_plane(
                self.mesh.position(a),
                self.mesh.position(b),
                self.mesh.position(c),
                self.mesh.position(d),
            ) <= 0.0
            {
                return Err(ValidationError::NonPositiveOrientation { tet: t });
            }
            for f in FACES {
                let Some(n) = tet.neighbors[f] else { continue };
                let Some(ntet) = self.mesh.tets.get(n) else {
                    return Err(ValidationError::DeadNeighbor { tet: t, neighbor: n });
                };
                let Some(back) = self.mesh.ordinal_of_neighbor(n, t) else {
                    return Err(ValidationError::AsymmetricAdjacency { tet: t, neighbor: n });
                };
                if FACE_RING[f]
                    .iter()
                    .any(|&r| !ntet.verts.contains(&tet.verts[r]))
                {
                    return Err(ValidationError::FaceMismatch { tet: t, neighbor: n });
                }
                let opposite = ntet.verts[back];
                if self.mesh.in_sphere_of(t, self.mesh.position(opposite)) > 0.0 {
                    return Err(ValidationError::DelaunayViolation {
                        tet: t,
                        site: opposite,
                    });
                }
            }
        }
        for (s, site) in &self.mesh.sites {
            if !self.mesh.is_live(site.hint) {
                return Err(ValidationError::StaleHint { site: s });
            }
            if !self.mesh.contains_vertex(site.hint, s) {
                return Err(ValidationError::HintMissingSite { site: s });
            }
        }
        Ok(())
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
