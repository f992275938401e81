//! Point location by randomized face walking.
//!
//! Starting from a hint tetrahedron, the walk repeatedly finds a face whose
//! outward side contains the query point and crosses to the neighbor behind
//! it. At each step the three exit candidates (the entry face is never
//! re-tested) are probed in one of six fixed permutations drawn uniformly
//! from the builder RNG; the randomization breaks the cycles that a fixed
//! probe order can fall into on degenerate configurations.
//!
//! Termination relies on two facts: the predicates are exact, and every
//! query point lies strictly inside the universe tetrahedron bootstrap, so
//! the unique enclosing tetrahedron exists and the walk can never exit the
//! mesh.

use rand::rngs::StdRng;
use rand::Rng;

use crate::core::mesh::{Mesh, TetKey, FACES, WALK_ORDER};
use crate::geometry::point::Point3;

/// Walks from `start` to the tetrahedron strictly or weakly enclosing `p`.
pub(crate) fn locate(mesh: &Mesh, rng: &mut StdRng, p: Point3, start: TetKey) -> TetKey {
    let mut next_face = FACES
        .into_iter()
        .find(|&f| mesh.orient_face(start, f, p) < 0.0);
    let mut current = start;
    while let Some(f) = next_face {
        let next = mesh
            .neighbor(current, f)
            .expect("the universe tetrahedron encloses every query point");
        let entry = mesh
            .ordinal_of_neighbor(next, current)
            .expect("face neighbors reference each other");
        next_face = None;
        for &face in &WALK_ORDER[entry][rng.random_range(0..6)] {
            if mesh.orient_face(next, face, p) < 0.0 {
                next_face = Some(face);
                break;
            }
        }
        // All remaining faces see p on the inner side: next encloses p.
        current = next;
    }
    current
}
