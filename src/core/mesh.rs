//! Mesh primitives: sites, tetrahedra, and the arena that owns them.
//!
//! The tetrahedralization is a cyclic pointer graph, so records live in
//! slotmap arenas and refer to each other by generational key. A deleted
//! tetrahedron's key stops resolving, which is how liveness is expressed:
//! stale keys held by queued flip candidates or site hints simply fail the
//! lookup instead of dangling.
//!
//! Vertex ordinals and face ordinals coincide: face `X` of a tetrahedron is
//! the triangle opposite vertex `X`, and the neighbor stored at `X` is the
//! tetrahedron sharing that triangle. The vertices `A, B, C, D` of every
//! live tetrahedron are ordered so that `left_of_plane(A, B, C, D) > 0`.

use slotmap::{new_key_type, SlotMap};

use crate::core::cell::CellStats;
use crate::geometry::point::Point3;
use crate::geometry::predicates::{in_sphere, left_of_plane};

new_key_type! {
    /// Key of a site (an inserted point or a universe corner).
    pub struct SiteKey;
}

new_key_type! {
    /// Key of a tetrahedron.
    pub struct TetKey;
}

/// Vertex/face ordinal `A`.
pub(crate) const A: usize = 0;
/// Vertex/face ordinal `B`.
pub(crate) const B: usize = 1;
/// Vertex/face ordinal `C`.
pub(crate) const C: usize = 2;
/// Vertex/face ordinal `D`.
pub(crate) const D: usize = 3;

/// All four face ordinals.
pub(crate) const FACES: [usize; 4] = [A, B, C, D];

/// Ring vertices of each face in CCW order as seen from the incident side.
/// The triple also serves as the oriented base triangle of the face for
/// outward orientation tests.
pub(crate) const FACE_RING: [[usize; 3]; 4] = [
    [C, B, D], // face A
    [D, A, C], // face B
    [A, D, B], // face C
    [B, C, A], // face D
];

/// Order in which the star traversal visits the three corners (and face
/// neighbors) of an incident tetrahedron, indexed by the ordinal of the
/// site at its center. This order decides the discovery order of a cell's
/// neighbor sites.
pub(crate) const NEIGHBOR_ORDER: [[usize; 3]; 4] = [
    [B, C, D], // center at A
    [A, C, D], // center at B
    [B, A, D], // center at C
    [B, C, A], // center at D
];

/// Oriented triples used by the reflex-edge test: `REFLEX_TRIPLE[f][i]` is
/// the triangle whose positive side the adjacent vertex must lie on for ring
/// edge `i` of face `f` to be reflex.
pub(crate) const REFLEX_TRIPLE: [[[usize; 3]; 3]; 4] = [
    [[A, B, D], [C, A, D], [C, B, A]], // face A
    [[B, A, C], [D, B, C], [D, A, B]], // face B
    [[C, D, B], [A, C, B], [A, D, C]], // face C
    [[D, C, A], [B, D, A], [B, C, D]], // face D
];

/// The six test orders of the three exit candidates during the location
/// walk, indexed by the face we entered through. The entry face is never
/// re-tested; the permutation is drawn uniformly per step.
pub(crate) const WALK_ORDER: [[[usize; 3]; 6]; 4] = [
    [
        [B, C, D],
        [C, B, D],
        [C, D, B],
        [B, D, C],
        [D, B, C],
        [D, C, B],
    ],
    [
        [A, C, D],
        [C, A, D],
        [C, D, A],
        [A, D, C],
        [D, A, C],
        [D, C, A],
    ],
    [
        [B, A, D],
        [A, B, D],
        [A, D, B],
        [B, D, A],
        [D, B, A],
        [D, A, B],
    ],
    [
        [B, C, A],
        [C, B, A],
        [C, A, B],
        [B, A, C],
        [A, B, C],
        [A, C, B],
    ],
];

/// The two faces of a tetrahedron containing the edge through vertex
/// ordinals `(i, j)`, in the order the ring walk prefers them.
pub(crate) fn edge_faces(i: usize, j: usize) -> [usize; 2] {
    match (i, j) {
        (A, B) | (B, A) => [C, D],
        (A, C) | (C, A) => [B, D],
        (A, D) | (D, A) => [B, C],
        (B, C) | (C, B) => [A, D],
        (B, D) => [A, C],
        (C, D) | (D, C) => [B, A],
        (D, B) => [C, A],
        _ => unreachable!("edge requires two distinct vertex ordinals"),
    }
}

/// A site of the tessellation: its position, a hint tetrahedron used to
/// seed traversals, and the epoch-stamped statistics cache.
#[derive(Debug)]
pub(crate) struct Site {
    pub position: Point3,
    /// Some tetrahedron incident to this site. May go stale when flips
    /// delete it; refreshed whenever a live incident tetrahedron is seen.
    pub hint: TetKey,
    pub stats: Option<CellStats>,
    /// Builder epoch at which `stats` was computed.
    pub stamp: u64,
}

impl Site {
    pub fn new(position: Point3) -> Self {
        Self {
            position,
            hint: TetKey::default(),
            stats: None,
            stamp: 0,
        }
    }
}

/// A tetrahedron: four corner sites in ordinals A–D and the neighbor across
/// each face, plus a lazily computed circumcenter.
#[derive(Debug)]
pub(crate) struct Tetrahedron {
    pub verts: [SiteKey; 4],
    pub neighbors: [Option<TetKey>; 4],
    pub center: Option<Point3>,
}

/// The arena of sites and tetrahedra together with the primitive topology
/// operations shared by location, flips, and the statistics traversals.
#[derive(Debug, Default)]
pub(crate) struct Mesh {
    pub sites: SlotMap<SiteKey, Site>,
    pub tets: SlotMap<TetKey, Tetrahedron>,
}

impl Mesh {
    /// Creates a tetrahedron over the given corner sites and points each
    /// corner's hint at it.
    pub fn new_tet(&mut self, a: SiteKey, b: SiteKey, c: SiteKey, d: SiteKey) -> TetKey {
        let key = self.tets.insert(Tetrahedron {
            verts: [a, b, c, d],
            neighbors: [None; 4],
            center: None,
        });
        for v in [a, b, c, d] {
            self.sites[v].hint = key;
        }
        key
    }

    /// Removes a tetrahedron from the arena. Keys held elsewhere stop
    /// resolving; callers are responsible for repatching live references.
    pub fn delete_tet(&mut self, t: TetKey) {
        self.tets.remove(t);
    }

    pub fn is_live(&self, t: TetKey) -> bool {
        self.tets.contains_key(t)
    }

    pub fn position(&self, s: SiteKey) -> Point3 {
        self.sites[s].position
    }

    pub fn vertex(&self, t: TetKey, ordinal: usize) -> SiteKey {
        self.tets[t].verts[ordinal]
    }

    pub fn neighbor(&self, t: TetKey, face: usize) -> Option<TetKey> {
        self.tets[t].neighbors[face]
    }

    pub fn contains_vertex(&self, t: TetKey, v: SiteKey) -> bool {
        self.tets[t].verts.contains(&v)
    }

    /// Ordinal of site `v` within tetrahedron `t`, if present.
    pub fn ordinal_of_vertex(&self, t: TetKey, v: SiteKey) -> Option<usize> {
        self.tets[t].verts.iter().position(|&w| w == v)
    }

    /// Ordinal at which `t` has `n` as its neighbor, if any.
    pub fn ordinal_of_neighbor(&self, t: TetKey, n: TetKey) -> Option<usize> {
        self.tets[t].neighbors.iter().position(|&w| w == Some(n))
    }

    /// Neighbor of `t` across the face opposite site `v` (which must be a
    /// corner of `t`).
    pub fn neighbor_opposite(&self, t: TetKey, v: SiteKey) -> Option<TetKey> {
        let f = self
            .ordinal_of_vertex(t, v)
            .expect("site is a corner of the tetrahedron");
        self.neighbor(t, f)
    }

    /// Splices `new_tet` into the adjacency where `t`'s neighbor across
    /// `old_face` used to see `t`: the outside tetrahedron and `new_tet`
    /// become mutual neighbors (`new_tet` at `new_face`). A missing outside
    /// neighbor leaves both sides untouched.
    pub fn patch(&mut self, t: TetKey, old_face: usize, new_tet: TetKey, new_face: usize) {
        if let Some(outside) = self.tets[t].neighbors[old_face] {
            if let Some(back) = self.ordinal_of_neighbor(outside, t) {
                self.tets[outside].neighbors[back] = Some(new_tet);
            }
            self.tets[new_tet].neighbors[new_face] = Some(outside);
        }
    }

    /// [`Mesh::patch`] addressed by the corner site opposite the face.
    pub fn patch_vertex(&mut self, t: TetKey, v: SiteKey, new_tet: TetKey, new_face: usize) {
        let f = self
            .ordinal_of_vertex(t, v)
            .expect("site is a corner of the tetrahedron");
        self.patch(t, f, new_tet, new_face);
    }

    /// Steps around the edge `(v1, v2)` of `t`: returns the neighbor of `t`
    /// containing that edge which is not `from`. With `from = None` the
    /// walk direction is chosen by the preference order of [`edge_faces`].
    pub fn neighbor_around_edge(
        &self,
        t: TetKey,
        v1: SiteKey,
        v2: SiteKey,
        from: Option<TetKey>,
    ) -> Option<TetKey> {
        let i = self
            .ordinal_of_vertex(t, v1)
            .expect("edge site is a corner of the tetrahedron");
        let j = self
            .ordinal_of_vertex(t, v2)
            .expect("edge site is a corner of the tetrahedron");
        let [f1, f2] = edge_faces(i, j);
        if self.tets[t].neighbors[f1] == from {
            self.tets[t].neighbors[f2]
        } else {
            self.tets[t].neighbors[f1]
        }
    }

    /// Orientation of `p` against face `f` of `t`: positive when `p` is on
    /// the inner side, negative when crossing the face leads toward `p`.
    pub fn orient_face(&self, t: TetKey, f: usize, p: Point3) -> f64 {
        let [r0, r1, r2] = FACE_RING[f];
        let tet = &self.tets[t];
        left_of_plane(
            self.position(tet.verts[r0]),
            self.position(tet.verts[r1]),
            self.position(tet.verts[r2]),
            p,
        )
    }

    /// In-sphere test of `p` against the circumsphere of `t`; positive when
    /// strictly inside.
    pub fn in_sphere_of(&self, t: TetKey, p: Point3) -> f64 {
        let [a, b, c, d] = self.tets[t].verts;
        in_sphere(
            self.position(a),
            self.position(b),
            self.position(c),
            self.position(d),
            p,
        )
    }

    /// Points the hint of `v` at `t` if the current hint is no longer live.
    pub fn refresh_hint(&mut self, v: SiteKey, t: TetKey) {
        let hint = self.sites[v].hint;
        if !self.tets.contains_key(hint) {
            self.sites[v].hint = t;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mesh() -> (Mesh, [SiteKey; 5], TetKey) {
        let mut mesh = Mesh::default();
        let a = mesh.sites.insert(Site::new(Point3::new(0.0, 0.0, 0.0)));
        let b = mesh.sites.insert(Site::new(Point3::new(1.0, 0.0, 0.0)));
        let c = mesh.sites.insert(Site::new(Point3::new(0.0, 1.0, 0.0)));
        let d = mesh.sites.insert(Site::new(Point3::new(0.0, 0.0, -1.0)));
        let e = mesh.sites.insert(Site::new(Point3::new(0.0, 0.0, 1.0)));
        let t = mesh.new_tet(a, b, c, d);
        (mesh, [a, b, c, d, e], t)
    }

    #[test]
    fn new_tet_sets_corner_hints() {
        let (mesh, [a, b, c, d, _], t) = sample_mesh();
        for v in [a, b, c, d] {
            assert_eq!(mesh.sites[v].hint, t);
        }
    }

    #[test]
    fn ordinals_round_trip() {
        let (mesh, [a, b, c, d, e], t) = sample_mesh();
        assert_eq!(mesh.ordinal_of_vertex(t, a), Some(A));
        assert_eq!(mesh.ordinal_of_vertex(t, d), Some(D));
        assert_eq!(mesh.ordinal_of_vertex(t, e), None);
        assert!(mesh.contains_vertex(t, b));
        assert!(!mesh.contains_vertex(t, e));
        assert_eq!(mesh.vertex(t, C), c);
    }

    #[test]
    fn sample_tet_is_positively_oriented() {
        let (mesh, [a, b, c, d, _], _) = sample_mesh();
        let det = left_of_plane(
            mesh.position(a),
            mesh.position(b),
            mesh.position(c),
            mesh.position(d),
        );
        assert!(det > 0.0);
    }

    #[test]
    fn orient_face_is_negative_outward() {
        let (mut mesh, [a, b, c, d, e], t) = sample_mesh();
        // e = (0, 0, 1) lies beyond face D (the triangle a, b, c).
        let p = mesh.position(e);
        let f = mesh
            .ordinal_of_vertex(t, d)
            .expect("d is a corner of the sample tetrahedron");
        assert!(mesh.orient_face(t, f, p) < 0.0);
        // Every face sees the centroid on the inner side.
        let centroid = (mesh.position(a)
            + mesh.position(b)
            + mesh.position(c)
            + mesh.position(d))
            / 4.0;
        for f in FACES {
            assert!(mesh.orient_face(t, f, centroid) > 0.0);
        }
        mesh.delete_tet(t);
        assert!(!mesh.is_live(t));
    }

    #[test]
    fn patch_links_both_sides() {
        let (mut mesh, [a, b, c, d, e], t) = sample_mesh();
        // Second tetrahedron glued across face D (triangle a, b, c), with
        // apex e above the plane: CCW order is (b, a, c, e).
        let u = mesh.new_tet(b, a, c, e);
        mesh.tets[t].neighbors[D] = Some(u);
        mesh.tets[u].neighbors[D] = Some(t);

        // Replace u by a fresh tetrahedron from t's point of view.
        let w = mesh.new_tet(b, a, c, e);
        mesh.patch(u, D, w, D);
        assert_eq!(mesh.neighbor(t, D), Some(w));
        assert_eq!(mesh.neighbor(w, D), Some(t));
        assert_eq!(mesh.ordinal_of_neighbor(t, w), Some(D));
    }

    #[test]
    fn edge_faces_excludes_edge_ordinals() {
        for i in FACES {
            for j in FACES {
                if i == j {
                    continue;
                }
                let [f1, f2] = edge_faces(i, j);
                assert_ne!(f1, f2);
                assert!(f1 != i && f1 != j);
                assert!(f2 != i && f2 != j);
            }
        }
    }

    #[test]
    fn refresh_hint_only_replaces_dead_hints() {
        let (mut mesh, [a, b, c, _d, e], t) = sample_mesh();
        let u = mesh.new_tet(b, a, c, e);
        // new_tet pointed a's hint at u; a live hint is kept.
        mesh.refresh_hint(a, t);
        assert_eq!(mesh.sites[a].hint, u);
        mesh.delete_tet(u);
        mesh.refresh_hint(a, t);
        assert_eq!(mesh.sites[a].hint, t);
    }
}
