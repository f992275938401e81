//! Per-site Voronoi cell statistics.
//!
//! The Voronoi cell of a site is the dual of its star in the Delaunay
//! tetrahedralization: every incident tetrahedron contributes one cell
//! vertex (its circumcenter), and every Delaunay edge from the site to a
//! neighbor contributes one polygonal cell face, traced by walking the ring
//! of tetrahedra around the edge.
//!
//! Statistics are computed on demand and cached on the site, stamped with
//! the builder epoch; any insertion (or threshold change) invalidates every
//! cache at the cost of a single counter bump.
//!
//! Cells touching the universe tetrahedron cannot be closed; their faces
//! are skipped with a warning and the remaining statistics stay meaningful.

use log::warn;

use crate::core::builder::Builder;
use crate::core::collections::FastHashSet;
use crate::core::mesh::{SiteKey, TetKey, NEIGHBOR_ORDER};
use crate::geometry::predicates::area;

/// One Voronoi face: the polygon dual to the Delaunay edge from the site to
/// one of its neighbors.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FaceInfo {
    /// Number of polygon vertices after short-edge truncation.
    pub ring_len: usize,
    /// Face area (untruncated, so volumes stay exact).
    pub area: f64,
    /// Distance from the site to the neighbor site.
    pub distance: f64,
}

/// Cached statistics of one site's Voronoi cell.
#[derive(Clone, Debug, Default)]
pub(crate) struct CellStats {
    /// Neighbor sites in discovery order; `None` face info marks a face
    /// that could not be traced (incomplete cell).
    pub faces: Vec<(SiteKey, Option<FaceInfo>)>,
    /// Every tetrahedron incident to the site, universe tetrahedra
    /// included (they still carry valid neighbor sites).
    pub incident_tets: Vec<TetKey>,
    /// Sum of all traced face areas.
    pub surface_area: f64,
    /// Largest distance from the site to an incident circumcenter
    /// (universe tetrahedra excluded).
    pub cavity_radius: f64,
}

impl Builder {
    /// Coordination number: the count of Voronoi faces surviving the area
    /// threshold.
    pub fn coordination(&mut self, site: SiteKey) -> usize {
        self.ensure_stats(site);
        let threshold = self.area_threshold;
        let stats = self.stats(site);
        let reference = stats.surface_area;
        stats
            .faces
            .iter()
            .filter(|(_, info)| matches!(info, Some(i) if threshold.admits(i.area, reference)))
            .count()
    }

    /// Atomic (Voronoi cell) volume: the sum of the pyramid volumes
    /// `area · distance / 6` over all traced faces. Unbounded cells report
    /// the volume of their traced part only.
    pub fn atomic_volume(&mut self, site: SiteKey) -> f64 {
        self.ensure_stats(site);
        self.stats(site)
            .faces
            .iter()
            .filter_map(|(_, info)| info.as_ref())
            .map(|i| i.area * i.distance / 6.0)
            .sum()
    }

    /// Cavity radius: the largest distance from the site to the
    /// circumcenter of an incident tetrahedron.
    pub fn cavity_radius(&mut self, site: SiteKey) -> f64 {
        self.ensure_stats(site);
        self.stats(site).cavity_radius
    }

    /// Total traced surface area of the Voronoi cell.
    pub fn surface_area(&mut self, site: SiteKey) -> f64 {
        self.ensure_stats(site);
        self.stats(site).surface_area
    }

    /// Voronoi index histogram: bucket `i` counts the faces with `i + 1`
    /// sides (after truncation) that survive the area threshold. Faces with
    /// more than `index_length` sides are clamped into the last bucket with
    /// a warning.
    pub fn voronoi_index(&mut self, site: SiteKey) -> Vec<usize> {
        self.ensure_stats(site);
        let threshold = self.area_threshold;
        let length = self.index_length;
        let no_warning = self.no_warning;
        let stats = self.stats(site);
        let reference = stats.surface_area;
        let mut histogram = vec![0_usize; length];
        for info in stats.faces.iter().filter_map(|(_, info)| info.as_ref()) {
            if !threshold.admits(info.area, reference) {
                continue;
            }
            let mut bucket = info.ring_len;
            if bucket > length {
                if !no_warning {
                    warn!("voronoi index {bucket} exceeds the histogram length {length}");
                }
                bucket = length;
            }
            histogram[bucket - 1] += 1;
        }
        histogram
    }

    /// Neighbor sites of the Voronoi cell, in discovery order.
    pub fn neighbor_sites(&mut self, site: SiteKey) -> Vec<SiteKey> {
        self.ensure_stats(site);
        self.stats(site).faces.iter().map(|&(s, _)| s).collect()
    }

    /// All tetrahedra incident to the site (universe tetrahedra included).
    pub fn neighbor_tetrahedra(&mut self, site: SiteKey) -> Vec<TetKey> {
        self.ensure_stats(site);
        self.stats(site).incident_tets.clone()
    }

    fn stats(&self, site: SiteKey) -> &CellStats {
        self.mesh.sites[site]
            .stats
            .as_ref()
            .expect("ensure_stats filled the cache")
    }

    fn ensure_stats(&mut self, site: SiteKey) {
        let fresh = {
            let s = &self.mesh.sites[site];
            s.stamp == self.epoch && s.stats.is_some()
        };
        if fresh {
            return;
        }
        let stats = self.compute_cell(site);
        let epoch = self.epoch;
        let s = &mut self.mesh.sites[site];
        s.stats = Some(stats);
        s.stamp = epoch;
    }

    /// Traverses the site's star and traces every Voronoi face.
    fn compute_cell(&mut self, site: SiteKey) -> CellStats {
        let origin = self.mesh.position(site);

        // Depth-first sweep over the star: every tetrahedron incident to
        // the site, reached through the three faces containing it. The
        // three other corners of each are the candidate neighbor sites;
        // universe corners are excluded but universe tetrahedra stay in the
        // incident set, since they hold neighbor sites of boundary cells.
        let hint = self.mesh.sites[site].hint;
        if !self.mesh.is_live(hint) {
            self.warn_incomplete(site);
            return CellStats::default();
        }
        let mut visited: FastHashSet<TetKey> = FastHashSet::default();
        let mut incident: Vec<TetKey> = Vec::new();
        let mut seen: FastHashSet<SiteKey> = FastHashSet::default();
        let mut neighbors: Vec<SiteKey> = Vec::new();
        let mut stack = vec![hint];
        while let Some(t) = stack.pop() {
            if visited.contains(&t) {
                continue;
            }
            let center = self
                .mesh
                .ordinal_of_vertex(t, site)
                .expect("star traversal only reaches tetrahedra containing the site");
            for o in NEIGHBOR_ORDER[center] {
                let v = self.mesh.vertex(t, o);
                if !self.is_universe(v) && seen.insert(v) {
                    neighbors.push(v);
                }
            }
            for o in NEIGHBOR_ORDER[center] {
                if let Some(n) = self.mesh.neighbor(t, o) {
                    if self.mesh.is_live(n) && !visited.contains(&n) {
                        stack.push(n);
                    }
                }
            }
            visited.insert(t);
            incident.push(t);
        }

        // Trace each face by circling the Delaunay edge (site, neighbor).
        // Consecutive circumcenters closer than the length threshold are
        // collapsed for the side count; areas are never truncated.
        let mut faces: Vec<(SiteKey, Option<FaceInfo>)> =
            neighbors.into_iter().map(|w| (w, None)).collect();
        let mut surface_area = 0.0;
        for i in 0..faces.len() {
            let w = faces[i].0;
            let distance = origin.distance(&self.mesh.position(w));

            let Some(&t0) = incident.iter().find(|&&t| {
                !self.is_universe_tetrahedron(t) && self.mesh.contains_vertex(t, w)
            }) else {
                // The edge is carried by universe tetrahedra only.
                self.warn_incomplete(site);
                continue;
            };
            let pa = self.circumcenter_raw(t0);

            let Some(t2) = self
                .mesh
                .neighbor_around_edge(t0, site, w, None)
                .filter(|t| visited.contains(t) && !self.is_universe_tetrahedron(*t))
            else {
                self.warn_incomplete(site);
                continue;
            };
            let mut pb = self.circumcenter_raw(t2);

            let mut ring_len = 1;
            if self.length_threshold.admits(pa.distance(&pb), distance) {
                ring_len += 1;
            }
            let mut face_area = 0.0;
            let (mut t_prev, mut t_cur) = (t0, t2);
            loop {
                let Some(t3) = self
                    .mesh
                    .neighbor_around_edge(t_cur, site, w, Some(t_prev))
                    .filter(|t| visited.contains(t) && !self.is_universe_tetrahedron(*t))
                else {
                    // Open ring: record what was traced.
                    self.warn_incomplete(site);
                    break;
                };
                if t3 == t0 {
                    break;
                }
                let pc = self.circumcenter_raw(t3);
                if self.length_threshold.admits(pb.distance(&pc), distance) {
                    ring_len += 1;
                }
                face_area += area(pa, pb, pc);
                pb = pc;
                t_prev = t_cur;
                t_cur = t3;
            }

            surface_area += face_area;
            faces[i].1 = Some(FaceInfo {
                ring_len,
                area: face_area,
                distance,
            });
        }

        let mut cavity_radius: f64 = 0.0;
        for t in incident.clone() {
            if !self.is_universe_tetrahedron(t) {
                cavity_radius = cavity_radius.max(origin.distance(&self.circumcenter_raw(t)));
            }
        }

        CellStats {
            faces,
            incident_tets: incident,
            surface_area,
            cavity_radius,
        }
    }

    fn warn_incomplete(&self, site: SiteKey) {
        if !self.no_warning {
            warn!("voronoi cell of site {site:?} is incomplete; its statistics may be wrong");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded() -> Builder {
        let mut builder = Builder::with_rng(StdRng::seed_from_u64(7));
        builder.no_warning(true);
        builder
    }

    #[test]
    fn lone_site_has_no_neighbors() {
        let mut builder = seeded();
        let v = builder.insert(0.0, 0.0, 0.0).expect("insertion succeeds");
        assert!(builder.neighbor_sites(v).is_empty());
        assert_eq!(builder.coordination(v), 0);
        assert_eq!(builder.atomic_volume(v), 0.0);
        // All four incident tetrahedra touch the universe.
        assert_eq!(builder.neighbor_tetrahedra(v).len(), 4);
    }

    #[test]
    fn stats_cache_is_invalidated_by_insertions() {
        let mut builder = seeded();
        let v = builder.insert(0.0, 0.0, 0.0).expect("insertion succeeds");
        assert!(builder.neighbor_sites(v).is_empty());
        let w = builder.insert(1.0, 0.0, 0.0).expect("insertion succeeds");
        assert_eq!(builder.neighbor_sites(v), vec![w]);
        assert_eq!(builder.neighbor_sites(w), vec![v]);
    }

    #[test]
    fn surface_area_is_the_sum_of_face_areas() {
        let mut builder = seeded();
        let corners = [
            (1.0, 1.0, 1.0),
            (1.0, -1.0, -1.0),
            (-1.0, 1.0, -1.0),
            (-1.0, -1.0, 1.0),
        ];
        for (x, y, z) in corners {
            builder.insert(x, y, z).expect("insertion succeeds");
        }
        let v = builder.insert(0.0, 0.0, 0.0).expect("insertion succeeds");
        builder.ensure_stats(v);
        let stats = builder.stats(v).clone();
        let sum: f64 = stats
            .faces
            .iter()
            .filter_map(|(_, info)| info.map(|i| i.area))
            .sum();
        assert!((sum - stats.surface_area).abs() <= 1e-9 * stats.surface_area);
        assert!(stats.surface_area > 0.0);
    }
}
