//! Robust geometric predicates for the 3D Delaunay tetrahedralization.
//!
//! Each predicate runs a fast floating-point evaluation first and compares
//! the result against an a-priori roundoff bound (a *permanent*, the sum of
//! the absolute products entering the determinant, scaled by a small multiple
//! of the machine epsilon). Only when the sign cannot be certified does the
//! predicate fall back to an exact evaluation over Shewchuk expansions built
//! from the kernel in [`crate::geometry::expansion`]. The predicates are
//! adapted from Shewchuk's robust predicates in the two-stage (fastest +
//! exact) arrangement; the adaptive intermediate stages are intentionally
//! omitted.
//!
//! The exact pipelines are allocation-free after first use: every invocation
//! re-borrows a per-thread scratch arena whose buffer capacities bound the
//! worst case of the expansion composition (the dominant `in_sphere` chain
//! peaks at 27,648 components).

use std::cell::RefCell;
use std::sync::LazyLock;

use super::expansion::{
    epsilon, fast_expansion_sum_zeroelim, scale_expansion_zeroelim, two_diff, two_two_product,
};
use super::point::Point3;

struct ErrorBounds {
    o3d: f64,
    insphere: f64,
}

static BOUNDS: LazyLock<ErrorBounds> = LazyLock::new(|| {
    let eps = epsilon();
    ErrorBounds {
        o3d: 8.0 * eps,
        insphere: 17.0 * eps,
    }
});

/// Determines whether point `d` lies to the left of the plane through `a`,
/// `b`, `c` (assumed CCW as seen from the right side of the plane).
///
/// Returns a positive value if left of the plane, negative if right of it,
/// and exactly zero when the four points are coplanar. The sign is correct
/// for every finite `f64` input; non-finite coordinates yield an undefined
/// result.
#[must_use]
pub fn left_of_plane(a: Point3, b: Point3, c: Point3, d: Point3) -> f64 {
    let adx = a.x - d.x;
    let bdx = b.x - d.x;
    let cdx = c.x - d.x;
    let ady = a.y - d.y;
    let bdy = b.y - d.y;
    let cdy = c.y - d.y;
    let adz = a.z - d.z;
    let bdz = b.z - d.z;
    let cdz = c.z - d.z;

    let bdxcdy = bdx * cdy;
    let cdxbdy = cdx * bdy;
    let cdxady = cdx * ady;
    let adxcdy = adx * cdy;
    let adxbdy = adx * bdy;
    let bdxady = bdx * ady;

    let det = adz * (bdxcdy - cdxbdy) + bdz * (cdxady - adxcdy) + cdz * (adxbdy - bdxady);

    let permanent = (bdxcdy.abs() + cdxbdy.abs()) * adz.abs()
        + (cdxady.abs() + adxcdy.abs()) * bdz.abs()
        + (adxbdy.abs() + bdxady.abs()) * cdz.abs();
    let errbound = BOUNDS.o3d * permanent;
    if det > errbound || -det > errbound {
        return det;
    }

    SCRATCH.with(|s| left_of_plane_exact(&mut s.borrow_mut(), a, b, c, d))
}

/// Determines whether point `e` lies inside the sphere through `a`, `b`,
/// `c`, `d`, which are assumed to satisfy `left_of_plane(a, b, c, d) > 0`.
///
/// Returns a positive value if strictly inside the sphere, negative if
/// outside, and exactly zero when the five points are cospherical.
#[must_use]
pub fn in_sphere(a: Point3, b: Point3, c: Point3, d: Point3, e: Point3) -> f64 {
    let aex = a.x - e.x;
    let bex = b.x - e.x;
    let cex = c.x - e.x;
    let dex = d.x - e.x;
    let aey = a.y - e.y;
    let bey = b.y - e.y;
    let cey = c.y - e.y;
    let dey = d.y - e.y;
    let aez = a.z - e.z;
    let bez = b.z - e.z;
    let cez = c.z - e.z;
    let dez = d.z - e.z;

    let aexbey = aex * bey;
    let bexaey = bex * aey;
    let ab = aexbey - bexaey;
    let bexcey = bex * cey;
    let cexbey = cex * bey;
    let bc = bexcey - cexbey;
    let cexdey = cex * dey;
    let dexcey = dex * cey;
    let cd = cexdey - dexcey;
    let dexaey = dex * aey;
    let aexdey = aex * dey;
    let da = dexaey - aexdey;

    let aexcey = aex * cey;
    let cexaey = cex * aey;
    let ac = aexcey - cexaey;
    let bexdey = bex * dey;
    let dexbey = dex * bey;
    let bd = bexdey - dexbey;

    let abc = aez * bc - bez * ac + cez * ab;
    let bcd = bez * cd - cez * bd + dez * bc;
    let cda = cez * da + dez * ac + aez * cd;
    let dab = dez * ab + aez * bd + bez * da;

    let alift = aex * aex + aey * aey + aez * aez;
    let blift = bex * bex + bey * bey + bez * bez;
    let clift = cex * cex + cey * cey + cez * cez;
    let dlift = dex * dex + dey * dey + dez * dez;

    let det = dlift * abc - clift * dab + (blift * cda - alift * bcd);

    let permanent = ((cexdey.abs() + dexcey.abs()) * bez.abs()
        + (dexbey.abs() + bexdey.abs()) * cez.abs()
        + (bexcey.abs() + cexbey.abs()) * dez.abs())
        * alift
        + ((dexaey.abs() + aexdey.abs()) * cez.abs()
            + (aexcey.abs() + cexaey.abs()) * dez.abs()
            + (cexdey.abs() + dexcey.abs()) * aez.abs())
            * blift
        + ((aexbey.abs() + bexaey.abs()) * dez.abs()
            + (bexdey.abs() + dexbey.abs()) * aez.abs()
            + (dexaey.abs() + aexdey.abs()) * bez.abs())
            * clift
        + ((bexcey.abs() + cexbey.abs()) * aez.abs()
            + (cexaey.abs() + aexcey.abs()) * bez.abs()
            + (aexbey.abs() + bexaey.abs()) * cez.abs())
            * dlift;
    let errbound = BOUNDS.insphere * permanent;
    if det > errbound || -det > errbound {
        return det;
    }

    SCRATCH.with(|s| in_sphere_exact(&mut s.borrow_mut(), a, b, c, d, e))
}

/// Computes the center of the sphere through `a`, `b`, `c`, `d`, which are
/// assumed to satisfy `left_of_plane(a, b, c, d) > 0`.
///
/// This is a plain floating-point estimate, not an exact construction; it is
/// only defined when the four points are not coplanar.
#[must_use]
pub fn center_sphere(a: Point3, b: Point3, c: Point3, d: Point3) -> Point3 {
    let adx = a.x - d.x;
    let bdx = b.x - d.x;
    let cdx = c.x - d.x;
    let ady = a.y - d.y;
    let bdy = b.y - d.y;
    let cdy = c.y - d.y;
    let adz = a.z - d.z;
    let bdz = b.z - d.z;
    let cdz = c.z - d.z;
    let ads = adx * adx + ady * ady + adz * adz;
    let bds = bdx * bdx + bdy * bdy + bdz * bdz;
    let cds = cdx * cdx + cdy * cdy + cdz * cdz;
    let scale = 0.5 / left_of_plane(a, b, c, d);
    Point3::new(
        d.x + scale
            * (ads * (bdy * cdz - cdy * bdz)
                + bds * (cdy * adz - ady * cdz)
                + cds * (ady * bdz - bdy * adz)),
        d.y + scale
            * (ads * (bdz * cdx - cdz * bdx)
                + bds * (cdz * adx - adz * cdx)
                + cds * (adz * bdx - bdz * adx)),
        d.z + scale
            * (ads * (bdx * cdy - cdx * bdy)
                + bds * (cdx * ady - adx * cdy)
                + cds * (adx * bdy - bdx * ady)),
    )
}

/// The nonnegative area of triangle `(a, b, c)`: half the norm of
/// `(b - a) × (c - a)`.
#[must_use]
pub fn area(a: Point3, b: Point3, c: Point3) -> f64 {
    0.5 * (b - a).cross(&(c - a)).norm()
}

// ---------------------------------------------------------------------------
// Exact pipelines
// ---------------------------------------------------------------------------

/// Working buffers shared by the per-minor and per-corner stages of the exact
/// pipelines. Nothing in here survives a single stage; every slot is
/// overwritten before it is read.
struct Work {
    t32a: Box<[f64]>,
    t32b: Box<[f64]>,
    t64: [Box<[f64]>; 3],
    t128: Box<[f64]>,
    t192: Box<[f64]>,
    t384a: Box<[f64]>,
    t384b: Box<[f64]>,
    t768a: Box<[f64]>,
    t768b: Box<[f64]>,
    t768c: Box<[f64]>,
    t1536: Box<[f64]>,
    t2304: [Box<[f64]>; 3],
    t4608: Box<[f64]>,
}

/// Per-thread scratch arena for the exact predicates. Capacities are the
/// static bounds of the expansion composition: a scale at most doubles a
/// length and a sum concatenates, so each buffer bounds every value routed
/// through it (the final `in_sphere` merge receives 2 × 13,824 components).
struct Scratch {
    t8a: Box<[f64]>,
    t8b: Box<[f64]>,
    t8c: Box<[f64]>,
    t8d: Box<[f64]>,
    t8e: Box<[f64]>,
    t8f: Box<[f64]>,
    // The six 2x2 minors of the in-sphere determinant, ab .. bd, each a
    // 16-component expansion. left_of_plane_exact reuses `ab` for its
    // pairwise sums.
    ab: Box<[f64]>,
    bc: Box<[f64]>,
    cd: Box<[f64]>,
    da: Box<[f64]>,
    ac: Box<[f64]>,
    bd: Box<[f64]>,
    work: Work,
    t6912a: Box<[f64]>,
    t6912b: Box<[f64]>,
    t6912c: Box<[f64]>,
    t6912d: Box<[f64]>,
    t13824a: Box<[f64]>,
    t13824b: Box<[f64]>,
    t27648: Box<[f64]>,
}

fn buf(n: usize) -> Box<[f64]> {
    vec![0.0; n].into_boxed_slice()
}

impl Scratch {
    fn new() -> Self {
        Self {
            t8a: buf(8),
            t8b: buf(8),
            t8c: buf(8),
            t8d: buf(8),
            t8e: buf(8),
            t8f: buf(8),
            ab: buf(16),
            bc: buf(16),
            cd: buf(16),
            da: buf(16),
            ac: buf(16),
            bd: buf(16),
            work: Work {
                t32a: buf(32),
                t32b: buf(32),
                t64: [buf(64), buf(64), buf(64)],
                t128: buf(128),
                t192: buf(192),
                t384a: buf(384),
                t384b: buf(384),
                t768a: buf(768),
                t768b: buf(768),
                t768c: buf(768),
                t1536: buf(1536),
                t2304: [buf(2304), buf(2304), buf(2304)],
                t4608: buf(4608),
            },
            t6912a: buf(6912),
            t6912b: buf(6912),
            t6912c: buf(6912),
            t6912d: buf(6912),
            t13824a: buf(13824),
            t13824b: buf(13824),
            t27648: buf(27648),
        }
    }
}

thread_local! {
    static SCRATCH: RefCell<Scratch> = RefCell::new(Scratch::new());
}

fn left_of_plane_exact(s: &mut Scratch, a: Point3, b: Point3, c: Point3, d: Point3) -> f64 {
    let (adx, adxtail) = two_diff(a.x, d.x);
    let (ady, adytail) = two_diff(a.y, d.y);
    let (adz, adztail) = two_diff(a.z, d.z);
    let (bdx, bdxtail) = two_diff(b.x, d.x);
    let (bdy, bdytail) = two_diff(b.y, d.y);
    let (bdz, bdztail) = two_diff(b.z, d.z);
    let (cdx, cdxtail) = two_diff(c.x, d.x);
    let (cdy, cdytail) = two_diff(c.y, d.y);
    let (cdz, cdztail) = two_diff(c.z, d.z);

    two_two_product(adx, adxtail, bdy, bdytail, &mut s.t8a); // axby
    two_two_product(bdx, bdxtail, -ady, -adytail, &mut s.t8b); // bxay
    two_two_product(bdx, bdxtail, cdy, cdytail, &mut s.t8c); // bxcy
    two_two_product(cdx, cdxtail, -bdy, -bdytail, &mut s.t8d); // cxby
    two_two_product(cdx, cdxtail, ady, adytail, &mut s.t8e); // cxay
    two_two_product(adx, adxtail, -cdy, -cdytail, &mut s.t8f); // axcy

    let w = &mut s.work;
    let sums = &mut s.ab[..];

    let mut len64 = [0usize; 3];
    for (i, (lo, hi, z, ztail)) in [
        (&s.t8c[..], &s.t8d[..], adz, adztail),
        (&s.t8e[..], &s.t8f[..], bdz, bdztail),
        (&s.t8a[..], &s.t8b[..], cdz, cdztail),
    ]
    .into_iter()
    .enumerate()
    {
        let nsum = fast_expansion_sum_zeroelim(lo, hi, &mut sums[..]);
        let n32a = scale_expansion_zeroelim(&sums[..nsum], z, &mut w.t32a);
        let n32b = scale_expansion_zeroelim(&sums[..nsum], ztail, &mut w.t32b);
        len64[i] = fast_expansion_sum_zeroelim(&w.t32a[..n32a], &w.t32b[..n32b], &mut w.t64[i]);
    }

    let n128 = fast_expansion_sum_zeroelim(&w.t64[0][..len64[0]], &w.t64[1][..len64[1]], &mut w.t128);
    let n192 = fast_expansion_sum_zeroelim(&w.t128[..n128], &w.t64[2][..len64[2]], &mut w.t192);

    w.t192[n192 - 1]
}

/// One corner term of the exact in-sphere determinant: the signed sum of the
/// three scaled 2x2 minors, multiplied by the corner's lifted coordinate
/// `x² + y² + z²` (with heads and tails expanded). Writes the 6912-component
/// result into `out` and returns its length.
fn corner_term(
    w: &mut Work,
    minors: [(&[f64], f64, f64); 3],
    coords: [(f64, f64); 3],
    out: &mut [f64],
) -> usize {
    let mut len64 = [0usize; 3];
    for (i, &(m, z, ztail)) in minors.iter().enumerate() {
        let n32a = scale_expansion_zeroelim(m, z, &mut w.t32a);
        let n32b = scale_expansion_zeroelim(m, ztail, &mut w.t32b);
        len64[i] = fast_expansion_sum_zeroelim(&w.t32a[..n32a], &w.t32b[..n32b], &mut w.t64[i]);
    }
    let n128 = fast_expansion_sum_zeroelim(&w.t64[0][..len64[0]], &w.t64[1][..len64[1]], &mut w.t128);
    let n192 = fast_expansion_sum_zeroelim(&w.t64[2][..len64[2]], &w.t128[..n128], &mut w.t192);

    let mut len2304 = [0usize; 3];
    for (i, &(c, ctail)) in coords.iter().enumerate() {
        // (c + ctail)² = c·c + 2·c·ctail + ctail·ctail, each scaled onto the
        // 192-component determinant term.
        let n384a = scale_expansion_zeroelim(&w.t192[..n192], c, &mut w.t384a);
        let n768a = scale_expansion_zeroelim(&w.t384a[..n384a], c, &mut w.t768a);
        let n384b = scale_expansion_zeroelim(&w.t192[..n192], ctail, &mut w.t384b);
        let n768b = scale_expansion_zeroelim(&w.t384b[..n384b], c, &mut w.t768b);
        for v in &mut w.t768b[..n768b] {
            *v *= 2.0;
        }
        let n768c = scale_expansion_zeroelim(&w.t384b[..n384b], ctail, &mut w.t768c);
        let n1536 = fast_expansion_sum_zeroelim(&w.t768a[..n768a], &w.t768b[..n768b], &mut w.t1536);
        len2304[i] =
            fast_expansion_sum_zeroelim(&w.t1536[..n1536], &w.t768c[..n768c], &mut w.t2304[i]);
    }

    let n4608 = fast_expansion_sum_zeroelim(
        &w.t2304[0][..len2304[0]],
        &w.t2304[1][..len2304[1]],
        &mut w.t4608,
    );
    fast_expansion_sum_zeroelim(&w.t2304[2][..len2304[2]], &w.t4608[..n4608], out)
}

#[allow(clippy::similar_names)]
fn in_sphere_exact(s: &mut Scratch, a: Point3, b: Point3, c: Point3, d: Point3, e: Point3) -> f64 {
    let (aex, aextail) = two_diff(a.x, e.x);
    let (aey, aeytail) = two_diff(a.y, e.y);
    let (aez, aeztail) = two_diff(a.z, e.z);
    let (bex, bextail) = two_diff(b.x, e.x);
    let (bey, beytail) = two_diff(b.y, e.y);
    let (bez, beztail) = two_diff(b.z, e.z);
    let (cex, cextail) = two_diff(c.x, e.x);
    let (cey, ceytail) = two_diff(c.y, e.y);
    let (cez, ceztail) = two_diff(c.z, e.z);
    let (dex, dextail) = two_diff(d.x, e.x);
    let (dey, deytail) = two_diff(d.y, e.y);
    let (dez, deztail) = two_diff(d.z, e.z);

    // The six 2x2 minors m_uv = u_x v_y − v_x u_y as 16-component expansions.
    let ablen = {
        two_two_product(aex, aextail, bey, beytail, &mut s.t8a);
        two_two_product(bex, bextail, -aey, -aeytail, &mut s.t8b);
        fast_expansion_sum_zeroelim(&s.t8a, &s.t8b, &mut s.ab)
    };
    let bclen = {
        two_two_product(bex, bextail, cey, ceytail, &mut s.t8a);
        two_two_product(cex, cextail, -bey, -beytail, &mut s.t8b);
        fast_expansion_sum_zeroelim(&s.t8a, &s.t8b, &mut s.bc)
    };
    let cdlen = {
        two_two_product(cex, cextail, dey, deytail, &mut s.t8a);
        two_two_product(dex, dextail, -cey, -ceytail, &mut s.t8b);
        fast_expansion_sum_zeroelim(&s.t8a, &s.t8b, &mut s.cd)
    };
    let dalen = {
        two_two_product(dex, dextail, aey, aeytail, &mut s.t8a);
        two_two_product(aex, aextail, -dey, -deytail, &mut s.t8b);
        fast_expansion_sum_zeroelim(&s.t8a, &s.t8b, &mut s.da)
    };
    let aclen = {
        two_two_product(aex, aextail, cey, ceytail, &mut s.t8a);
        two_two_product(cex, cextail, -aey, -aeytail, &mut s.t8b);
        fast_expansion_sum_zeroelim(&s.t8a, &s.t8b, &mut s.ac)
    };
    let bdlen = {
        two_two_product(bex, bextail, dey, deytail, &mut s.t8a);
        two_two_product(dex, dextail, -bey, -beytail, &mut s.t8b);
        fast_expansion_sum_zeroelim(&s.t8a, &s.t8b, &mut s.bd)
    };

    // Corner a: alift · (cd·(−bez) + bd·cez + bc·(−dez))
    let n6912a = corner_term(
        &mut s.work,
        [
            (&s.cd[..cdlen], -bez, -beztail),
            (&s.bd[..bdlen], cez, ceztail),
            (&s.bc[..bclen], -dez, -deztail),
        ],
        [(aex, aextail), (aey, aeytail), (aez, aeztail)],
        &mut s.t6912a,
    );
    // Corner b: blift · (da·cez + ac·dez + cd·aez)
    let n6912b = corner_term(
        &mut s.work,
        [
            (&s.da[..dalen], cez, ceztail),
            (&s.ac[..aclen], dez, deztail),
            (&s.cd[..cdlen], aez, aeztail),
        ],
        [(bex, bextail), (bey, beytail), (bez, beztail)],
        &mut s.t6912b,
    );
    // Corner c: clift · (ab·(−dez) + bd·(−aez) + da·(−bez))
    let n6912c = corner_term(
        &mut s.work,
        [
            (&s.ab[..ablen], -dez, -deztail),
            (&s.bd[..bdlen], -aez, -aeztail),
            (&s.da[..dalen], -bez, -beztail),
        ],
        [(cex, cextail), (cey, ceytail), (cez, ceztail)],
        &mut s.t6912c,
    );
    // Corner d: dlift · (bc·aez + ac·(−bez) + ab·cez)
    let n6912d = corner_term(
        &mut s.work,
        [
            (&s.bc[..bclen], aez, aeztail),
            (&s.ac[..aclen], -bez, -beztail),
            (&s.ab[..ablen], cez, ceztail),
        ],
        [(dex, dextail), (dey, deytail), (dez, deztail)],
        &mut s.t6912d,
    );

    let nab = fast_expansion_sum_zeroelim(&s.t6912a[..n6912a], &s.t6912b[..n6912b], &mut s.t13824a);
    let ncd = fast_expansion_sum_zeroelim(&s.t6912c[..n6912c], &s.t6912d[..n6912d], &mut s.t13824b);
    let n = fast_expansion_sum_zeroelim(&s.t13824a[..nab], &s.t13824b[..ncd], &mut s.t27648);

    s.t27648[n - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_of_plane_signs() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        assert!(left_of_plane(a, b, c, Point3::new(0.0, 0.0, -1.0)) > 0.0);
        assert!(left_of_plane(a, b, c, Point3::new(0.0, 0.0, 1.0)) < 0.0);
        assert_eq!(left_of_plane(a, b, c, Point3::new(0.5, 0.5, 0.0)), 0.0);
    }

    #[test]
    fn left_of_plane_exact_branch_on_coplanar_input() {
        // Collinear points whose determinant the filter cannot certify:
        // the exact branch must return a hard zero.
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(2.0 + 2.0 * f64::EPSILON, 0.0, 0.0);
        let d = Point3::new(3.0, 0.0, 0.0);
        assert_eq!(left_of_plane(a, b, c, d), 0.0);
    }

    #[test]
    fn in_sphere_signs() {
        // Four points of the unit sphere in CCW order.
        let a = Point3::new(0.0, 0.0, -1.0);
        let b = Point3::new(0.0, 1.0, 0.0);
        let c = Point3::new(1.0, 0.0, 0.0);
        let d = Point3::new(0.0, 0.0, 1.0);
        assert!(left_of_plane(a, b, c, d) > 0.0);
        assert!(in_sphere(a, b, c, d, Point3::new(0.1, 0.1, 0.1)) > 0.0);
        assert!(in_sphere(a, b, c, d, Point3::new(3.0, 3.0, 3.0)) < 0.0);
        // (-1, 0, 0) lies exactly on the unit sphere.
        assert_eq!(in_sphere(a, b, c, d, Point3::new(-1.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn center_sphere_equidistant_from_corners() {
        let a = Point3::new(1.0, 1.0, 1.0);
        let b = Point3::new(1.0, -1.0, -1.0);
        let c = Point3::new(-1.0, 1.0, -1.0);
        let d = Point3::new(-1.0, -1.0, 1.0);
        let (a, b, c, d) = if left_of_plane(a, b, c, d) > 0.0 {
            (a, b, c, d)
        } else {
            (b, a, c, d)
        };
        let o = center_sphere(a, b, c, d);
        let r = o.distance(&a);
        for p in [b, c, d] {
            assert!((o.distance(&p) - r).abs() < 1e-12 * r.max(1.0));
        }
    }

    #[test]
    fn area_of_unit_right_triangle() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        assert_eq!(area(a, b, c), 0.5);
        assert_eq!(area(a, c, b), 0.5);
    }
}
