//! Bistellar flips: the local retriangulations restoring the Delaunay
//! property after an insertion.
//!
//! An insertion splits the enclosing tetrahedron 1→4 and pushes the four
//! outward faces as flip candidates ("ears"). Draining the ear stack applies
//! 2→3 and 3→2 flips until every remaining face is locally regular. Faces
//! are transient `(tetrahedron, ordinal)` values; a candidate whose
//! tetrahedron has been deleted by an earlier flip fails its validity check
//! and is dropped.

use smallvec::smallvec;

use crate::core::collections::SmallBuffer;
use crate::core::mesh::{Mesh, SiteKey, TetKey, A, B, C, D, FACE_RING, REFLEX_TRIPLE};
use crate::geometry::predicates::left_of_plane;

/// A face of a tetrahedron, oriented from the incident side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OrientedFace {
    /// The incident tetrahedron.
    pub tet: TetKey,
    /// Face ordinal; the incident vertex is the corner at this ordinal.
    pub face: usize,
}

impl OrientedFace {
    /// The tetrahedron on the other side of this face, if it exists and is
    /// still live.
    pub fn adjacent(&self, mesh: &Mesh) -> Option<TetKey> {
        mesh.neighbor(self.tet, self.face).filter(|&t| mesh.is_live(t))
    }

    /// Both tetrahedra of the face are live.
    pub fn is_valid(&self, mesh: &Mesh) -> bool {
        mesh.is_live(self.tet) && self.adjacent(mesh).is_some()
    }

    /// The corner of the incident tetrahedron opposite this face.
    pub fn incident_vertex(&self, mesh: &Mesh) -> SiteKey {
        mesh.vertex(self.tet, self.face)
    }

    /// The corner of the adjacent tetrahedron opposite this face.
    pub fn adjacent_vertex(&self, mesh: &Mesh) -> Option<SiteKey> {
        let adjacent = self.adjacent(mesh)?;
        let back = mesh
            .ordinal_of_neighbor(adjacent, self.tet)
            .expect("face neighbors reference each other");
        Some(mesh.vertex(adjacent, back))
    }

    /// Ring vertex `i` of this face, in the CCW order of [`FACE_RING`].
    pub fn ring_vertex(&self, mesh: &Mesh, i: usize) -> SiteKey {
        mesh.vertex(self.tet, FACE_RING[self.face][i])
    }

    /// True when the adjacent vertex lies strictly inside the circumsphere
    /// of the incident tetrahedron, i.e. the face violates the Delaunay
    /// property.
    pub fn not_regular(&self, mesh: &Mesh) -> bool {
        match self.adjacent_vertex(mesh) {
            Some(v) => mesh.in_sphere_of(self.tet, mesh.position(v)) > 0.0,
            None => false,
        }
    }

    /// True when ring edge `i` is reflex: the adjacent vertex lies on the
    /// positive side of the oriented triangle [`REFLEX_TRIPLE`] assigns to
    /// `(face, i)`, making the corresponding face of the reconstructed
    /// tetrahedron visible.
    pub fn is_reflex(&self, mesh: &Mesh, i: usize) -> bool {
        let Some(adjacent_vertex) = self.adjacent_vertex(mesh) else {
            return false;
        };
        let [v0, v1, v2] = REFLEX_TRIPLE[self.face][i];
        left_of_plane(
            mesh.position(mesh.vertex(self.tet, v0)),
            mesh.position(mesh.vertex(self.tet, v1)),
            mesh.position(mesh.vertex(self.tet, v2)),
            mesh.position(adjacent_vertex),
        ) > 0.0
    }
}

/// Splits tetrahedron `t` into four around the interior site `v`, patching
/// the four original outer faces and pushing each new outward face onto the
/// ear stack. Returns one of the new tetrahedra as the next walk hint.
pub(crate) fn flip1to4(
    mesh: &mut Mesh,
    t: TetKey,
    v: SiteKey,
    ears: &mut Vec<OrientedFace>,
) -> TetKey {
    let [a, b, c, d] = mesh.tets[t].verts;

    let t0 = mesh.new_tet(a, b, c, v);
    let t1 = mesh.new_tet(a, d, b, v);
    let t2 = mesh.new_tet(a, c, d, v);
    let t3 = mesh.new_tet(b, d, c, v);

    mesh.tets[t0].neighbors[A] = Some(t3);
    mesh.tets[t0].neighbors[B] = Some(t2);
    mesh.tets[t0].neighbors[C] = Some(t1);

    mesh.tets[t1].neighbors[A] = Some(t3);
    mesh.tets[t1].neighbors[B] = Some(t0);
    mesh.tets[t1].neighbors[C] = Some(t2);

    mesh.tets[t2].neighbors[A] = Some(t3);
    mesh.tets[t2].neighbors[B] = Some(t1);
    mesh.tets[t2].neighbors[C] = Some(t0);

    mesh.tets[t3].neighbors[A] = Some(t2);
    mesh.tets[t3].neighbors[B] = Some(t0);
    mesh.tets[t3].neighbors[C] = Some(t1);

    mesh.patch(t, D, t0, D);
    mesh.patch(t, C, t1, D);
    mesh.patch(t, B, t2, D);
    mesh.patch(t, A, t3, D);

    mesh.delete_tet(t);

    for tet in [t0, t1, t2, t3] {
        let ear = OrientedFace { tet, face: D };
        if ear.adjacent(mesh).is_some() {
            ears.push(ear);
        }
    }

    t1
}

/// Attempts to restore regularity across `face`.
///
/// With `r` reflex ring edges (counted with an early exit at two): `r = 0`
/// and a non-regular face flips 2→3; `r = 1` flips 3→2 when the two
/// tetrahedra flanking the reflex edge share a third one; otherwise the face
/// is left pending for later flips to resolve. New outward faces holding the
/// incident vertex are pushed onto the ear stack; the return value is one of
/// the new tetrahedra, used as the mesh-walk hint.
pub(crate) fn try_flip(
    mesh: &mut Mesh,
    face: OrientedFace,
    ears: &mut Vec<OrientedFace>,
) -> Option<TetKey> {
    if !face.is_valid(mesh) {
        return None;
    }
    let incident_vertex = face.incident_vertex(mesh);

    let mut reflex_edge = 0;
    let mut reflex_count = 0;
    let mut i = 0;
    while reflex_count < 2 && i < 3 {
        if face.is_reflex(mesh, i) {
            reflex_edge = i;
            reflex_count += 1;
        }
        i += 1;
    }

    let mut out = None;
    if reflex_count == 0 && face.not_regular(mesh) {
        for tet in flip2to3(mesh, face) {
            push_ear(mesh, tet, incident_vertex, ears);
            out = Some(tet);
        }
    } else if reflex_count == 1 && face.not_regular(mesh) {
        let opposing = face.ring_vertex(mesh, reflex_edge);
        let adjacent = face.adjacent(mesh).expect("validity was checked above");
        let t1 = mesh.neighbor_opposite(face.tet, opposing);
        let t2 = mesh.neighbor_opposite(adjacent, opposing);
        if t1.is_some() && t1 == t2 {
            for tet in flip3to2(mesh, face, reflex_edge) {
                push_ear(mesh, tet, incident_vertex, ears);
                out = Some(tet);
            }
        }
    }
    // Two or three reflex edges: no action; the face stays pending.
    out
}

fn push_ear(mesh: &Mesh, tet: TetKey, vertex: SiteKey, ears: &mut Vec<OrientedFace>) {
    let face = mesh
        .ordinal_of_vertex(tet, vertex)
        .expect("every flip product keeps the inserted vertex");
    let ear = OrientedFace { tet, face };
    if ear.adjacent(mesh).is_some() {
        ears.push(ear);
    }
}

/// Replaces the two tetrahedra sharing `face` by three around the edge from
/// the incident to the adjacent vertex. Returns the surviving new
/// tetrahedra (degenerate-pair removal may delete some of them).
fn flip2to3(mesh: &mut Mesh, face: OrientedFace) -> SmallBuffer<TetKey, 3> {
    let incident = face.tet;
    let adjacent = face
        .adjacent(mesh)
        .expect("flip requires an adjacent tetrahedron");
    let top = face.incident_vertex(mesh);
    let bottom = face
        .adjacent_vertex(mesh)
        .expect("flip requires an adjacent vertex");
    let v0 = face.ring_vertex(mesh, 0);
    let v1 = face.ring_vertex(mesh, 1);
    let v2 = face.ring_vertex(mesh, 2);

    let t0 = mesh.new_tet(v0, top, v1, bottom);
    let t1 = mesh.new_tet(v1, top, v2, bottom);
    let t2 = mesh.new_tet(v0, v2, top, bottom);

    mesh.tets[t0].neighbors[A] = Some(t1);
    mesh.tets[t0].neighbors[C] = Some(t2);

    mesh.tets[t1].neighbors[A] = Some(t2);
    mesh.tets[t1].neighbors[C] = Some(t0);

    mesh.tets[t2].neighbors[A] = Some(t1);
    mesh.tets[t2].neighbors[B] = Some(t0);

    mesh.patch_vertex(incident, v2, t0, D);
    mesh.patch_vertex(incident, v0, t1, D);
    mesh.patch_vertex(incident, v1, t2, D);

    mesh.patch_vertex(adjacent, v0, t1, B);
    mesh.patch_vertex(adjacent, v1, t2, C);
    mesh.patch_vertex(adjacent, v2, t0, B);

    mesh.delete_tet(incident);
    mesh.delete_tet(adjacent);

    remove_any_degenerate_pair(mesh, t0);
    remove_any_degenerate_pair(mesh, t1);
    remove_any_degenerate_pair(mesh, t2);

    [t0, t1, t2]
        .into_iter()
        .filter(|&t| mesh.is_live(t))
        .collect()
}

/// Replaces the three tetrahedra around the reflex edge by two stacked along
/// the axis (ring vertex, incident vertex, adjacent vertex), choosing the
/// top assignment that keeps both new tetrahedra positively oriented.
fn flip3to2(mesh: &mut Mesh, face: OrientedFace, reflex_edge: usize) -> SmallBuffer<TetKey, 2> {
    let incident = face.tet;
    let adjacent = face
        .adjacent(mesh)
        .expect("flip requires an adjacent tetrahedron");
    let x = face.ring_vertex(mesh, reflex_edge);
    let third = mesh
        .neighbor_opposite(incident, x)
        .expect("the flip policy verified the shared third tetrahedron");

    let (top0, top1) = match reflex_edge {
        0 => (face.ring_vertex(mesh, 1), face.ring_vertex(mesh, 2)),
        1 => (face.ring_vertex(mesh, 0), face.ring_vertex(mesh, 2)),
        2 => (face.ring_vertex(mesh, 0), face.ring_vertex(mesh, 1)),
        _ => unreachable!("ring edges are indexed 0..3"),
    };

    let y = face.incident_vertex(mesh);
    let z = face
        .adjacent_vertex(mesh)
        .expect("flip requires an adjacent vertex");

    let axis_positive = left_of_plane(
        mesh.position(x),
        mesh.position(y),
        mesh.position(z),
        mesh.position(top0),
    ) > 0.0;
    let (t0, t1) = if axis_positive {
        (mesh.new_tet(x, y, z, top0), mesh.new_tet(y, x, z, top1))
    } else {
        (mesh.new_tet(x, y, z, top1), mesh.new_tet(y, x, z, top0))
    };

    mesh.tets[t0].neighbors[D] = Some(t1);
    mesh.tets[t1].neighbors[D] = Some(t0);

    let t0_top = mesh.vertex(t0, D);
    let t1_top = mesh.vertex(t1, D);
    let z_in_t0 = mesh
        .ordinal_of_vertex(t0, z)
        .expect("axis vertex is a corner of both new tetrahedra");
    let z_in_t1 = mesh
        .ordinal_of_vertex(t1, z)
        .expect("axis vertex is a corner of both new tetrahedra");
    let y_in_t0 = mesh
        .ordinal_of_vertex(t0, y)
        .expect("axis vertex is a corner of both new tetrahedra");
    let y_in_t1 = mesh
        .ordinal_of_vertex(t1, y)
        .expect("axis vertex is a corner of both new tetrahedra");
    let x_in_t0 = mesh
        .ordinal_of_vertex(t0, x)
        .expect("axis vertex is a corner of both new tetrahedra");
    let x_in_t1 = mesh
        .ordinal_of_vertex(t1, x)
        .expect("axis vertex is a corner of both new tetrahedra");

    mesh.patch_vertex(incident, t0_top, t1, z_in_t1);
    mesh.patch_vertex(incident, t1_top, t0, z_in_t0);

    mesh.patch_vertex(adjacent, t0_top, t1, y_in_t1);
    mesh.patch_vertex(adjacent, t1_top, t0, y_in_t0);

    mesh.patch_vertex(third, t0_top, t1, x_in_t1);
    mesh.patch_vertex(third, t1_top, t0, x_in_t0);

    mesh.delete_tet(incident);
    mesh.delete_tet(adjacent);
    mesh.delete_tet(third);

    smallvec![t0, t1]
}

/// Deletes a zero-volume pair: if `t` shares two distinct faces with the
/// same neighbor, the two tetrahedra have identical corner sets and enclose
/// no volume. The far neighbors across the duplicated faces are stitched to
/// each other, both tetrahedra are deleted, and the corner hints are moved
/// to the survivors.
fn remove_any_degenerate_pair(mesh: &mut Mesh, t: TetKey) {
    if !mesh.is_live(t) {
        return;
    }
    let n = mesh.tets[t].neighbors;
    if let Some(na) = n[A] {
        if n[B] == Some(na) {
            return remove_degenerate_pair(mesh, t, A, B, C, D);
        }
        if n[C] == Some(na) {
            return remove_degenerate_pair(mesh, t, A, C, B, D);
        }
        if n[D] == Some(na) {
            return remove_degenerate_pair(mesh, t, A, D, B, C);
        }
    }
    if let Some(nb) = n[B] {
        if n[C] == Some(nb) {
            return remove_degenerate_pair(mesh, t, B, C, A, D);
        }
        if n[D] == Some(nb) {
            return remove_degenerate_pair(mesh, t, B, D, A, C);
        }
    }
    if let Some(nc) = n[C] {
        if n[D] == Some(nc) {
            return remove_degenerate_pair(mesh, t, C, D, A, B);
        }
    }
}

fn remove_degenerate_pair(mesh: &mut Mesh, t: TetKey, e1: usize, e2: usize, f1: usize, f2: usize) {
    let shared = mesh.tets[t].neighbors[e1].expect("caller found the duplicated neighbor");
    let vf1 = mesh.vertex(t, f1);
    let vf2 = mesh.vertex(t, f2);
    // Both tetrahedra have the same corners, so the far sides are the
    // neighbors of the partner opposite the same two sites.
    let far1 = mesh.neighbor_opposite(shared, vf1);
    let far2 = mesh.neighbor_opposite(shared, vf2);

    if let Some(far1) = far1 {
        let back = mesh
            .ordinal_of_neighbor(far1, shared)
            .expect("face neighbors reference each other");
        mesh.patch(t, f1, far1, back);
    }
    if let Some(far2) = far2 {
        let back = mesh
            .ordinal_of_neighbor(far2, shared)
            .expect("face neighbors reference each other");
        mesh.patch(t, f2, far2, back);
    }

    let ve1 = mesh.vertex(t, e1);
    let ve2 = mesh.vertex(t, e2);

    mesh.delete_tet(t);
    mesh.delete_tet(shared);

    if let Some(far1) = far1 {
        mesh.refresh_hint(ve1, far1);
        mesh.refresh_hint(vf2, far1);
    }
    if let Some(far2) = far2 {
        mesh.refresh_hint(ve2, far2);
        mesh.refresh_hint(vf1, far2);
    }
}
