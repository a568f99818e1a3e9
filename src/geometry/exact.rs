//! Exact integer predicates on 52-bit mantissa coordinates.
//!
//! Inputs are the unsigned mantissa coordinates produced by
//! [`crate::geometry::bounds::mantissa`]. Every predicate reduces its
//! determinant to sums of products of coordinate differences; differences fit
//! an `i64` and low-degree sub-determinants fit an `i128`, so arbitrary
//! precision is only needed for the final degree-3+ accumulations. Only the
//! sign of the determinant is returned.
//!
//! The big-integer accumulators live in [`ExactScratch`], one instance per
//! tessellation, reused across calls. The scratch is deliberately not
//! shareable between threads; each tessellation owns its own.

use num_bigint::{BigInt, Sign};
use num_traits::Zero;

#[inline]
fn diff(a: u64, b: u64) -> i64 {
    // Mantissas are < 2^52, so the difference is exact in i64.
    a as i64 - b as i64
}

#[inline]
fn sign_of(value: &BigInt) -> i32 {
    match value.sign() {
        Sign::Minus => -1,
        Sign::NoSign => 0,
        Sign::Plus => 1,
    }
}

#[inline]
fn sign_of_i128(value: i128) -> i32 {
    match value.cmp(&0) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

/// Sign of the 2D orientation determinant.
///
/// Positive when `c` lies to the left of the directed line `a -> b`, i.e.
/// when the triangle `(a, b, c)` is ordered counterclockwise. The degree-2
/// determinant of 53-bit differences fits an `i128`, so no big integers are
/// needed.
#[inline]
#[must_use]
pub fn orient2d_sign(a: [u64; 2], b: [u64; 2], c: [u64; 2]) -> i32 {
    let abx = i128::from(diff(b[0], a[0]));
    let aby = i128::from(diff(b[1], a[1]));
    let acx = i128::from(diff(c[0], a[0]));
    let acy = i128::from(diff(c[1], a[1]));
    sign_of_i128(abx * acy - acx * aby)
}

/// Reusable big-integer accumulators for the exact predicates.
///
/// Allocating fresh big integers for every test dominates the predicate cost,
/// so a tessellation keeps one scratch instance alive and threads it through
/// all calls. The scratch holds no geometric state between calls.
#[derive(Debug, Default)]
pub struct ExactScratch {
    acc: BigInt,
    term: BigInt,
    inner: BigInt,
}

impl ExactScratch {
    /// Create an empty scratch pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign of the 2D in-circle determinant.
    ///
    /// Positive when `d` lies strictly inside the circle through the
    /// counterclockwise triangle `(a, b, c)`, zero when it lies exactly on
    /// it.
    pub fn incircle_sign(&mut self, a: [u64; 2], b: [u64; 2], c: [u64; 2], d: [u64; 2]) -> i32 {
        let adx = i128::from(diff(a[0], d[0]));
        let ady = i128::from(diff(a[1], d[1]));
        let bdx = i128::from(diff(b[0], d[0]));
        let bdy = i128::from(diff(b[1], d[1]));
        let cdx = i128::from(diff(c[0], d[0]));
        let cdy = i128::from(diff(c[1], d[1]));

        let ab = adx * bdy - bdx * ady;
        let bc = bdx * cdy - cdx * bdy;
        let ca = cdx * ady - adx * cdy;

        let alift = adx * adx + ady * ady;
        let blift = bdx * bdx + bdy * bdy;
        let clift = cdx * cdx + cdy * cdy;

        self.acc = BigInt::from(alift) * BigInt::from(bc);
        self.term = BigInt::from(blift) * BigInt::from(ca);
        self.acc += &self.term;
        self.term = BigInt::from(clift) * BigInt::from(ab);
        self.acc += &self.term;
        sign_of(&self.acc)
    }

    /// Sign of the 3D orientation determinant.
    ///
    /// Positive when the tetrahedron `(a, b, c, d)` is positively oriented,
    /// i.e. when `d` lies on the side of the plane `(a, b, c)` from which the
    /// triangle appears counterclockwise.
    pub fn orient3d_sign(&mut self, a: [u64; 3], b: [u64; 3], c: [u64; 3], d: [u64; 3]) -> i32 {
        let s1 = [diff(b[0], a[0]), diff(b[1], a[1]), diff(b[2], a[2])];
        let s2 = [diff(c[0], a[0]), diff(c[1], a[1]), diff(c[2], a[2])];
        let s3 = [diff(d[0], a[0]), diff(d[1], a[1]), diff(d[2], a[2])];

        let m1 = i128::from(s2[1]) * i128::from(s3[2]) - i128::from(s2[2]) * i128::from(s3[1]);
        let m2 = i128::from(s2[0]) * i128::from(s3[2]) - i128::from(s2[2]) * i128::from(s3[0]);
        let m3 = i128::from(s2[0]) * i128::from(s3[1]) - i128::from(s2[1]) * i128::from(s3[0]);

        self.acc = BigInt::from(s1[0]) * BigInt::from(m1);
        self.term = BigInt::from(s1[1]) * BigInt::from(m2);
        self.acc -= &self.term;
        self.term = BigInt::from(s1[2]) * BigInt::from(m3);
        self.acc += &self.term;
        sign_of(&self.acc)
    }

    /// Sign of the 3D in-sphere determinant.
    ///
    /// Positive when `e` lies strictly inside the circumsphere of the
    /// positively oriented tetrahedron `(a, b, c, d)`, zero when it lies
    /// exactly on the sphere.
    #[allow(clippy::similar_names)]
    pub fn insphere_sign(
        &mut self,
        a: [u64; 3],
        b: [u64; 3],
        c: [u64; 3],
        d: [u64; 3],
        e: [u64; 3],
    ) -> i32 {
        let s1 = [diff(a[0], e[0]), diff(a[1], e[1]), diff(a[2], e[2])];
        let s2 = [diff(b[0], e[0]), diff(b[1], e[1]), diff(b[2], e[2])];
        let s3 = [diff(c[0], e[0]), diff(c[1], e[1]), diff(c[2], e[2])];
        let s4 = [diff(d[0], e[0]), diff(d[1], e[1]), diff(d[2], e[2])];

        let cross = |p: [i64; 3], q: [i64; 3]| -> i128 {
            i128::from(p[0]) * i128::from(q[1]) - i128::from(q[0]) * i128::from(p[1])
        };
        let ab = cross(s1, s2);
        let bc = cross(s2, s3);
        let cd = cross(s3, s4);
        let da = cross(s4, s1);
        let ac = cross(s1, s3);
        let bd = cross(s2, s4);

        let lift = |s: [i64; 3]| -> i128 {
            i128::from(s[0]) * i128::from(s[0])
                + i128::from(s[1]) * i128::from(s[1])
                + i128::from(s[2]) * i128::from(s[2])
        };

        // Cofactor expansion along the lifted column; each z-weighted 2x2
        // term exceeds i128, so the inner sums accumulate in big integers.
        self.inner = BigInt::from(s1[2]) * BigInt::from(bc);
        self.term = BigInt::from(s2[2]) * BigInt::from(ac);
        self.inner -= &self.term;
        self.term = BigInt::from(s3[2]) * BigInt::from(ab);
        self.inner += &self.term;
        self.acc = BigInt::from(lift(s4)) * &self.inner;

        self.inner = BigInt::from(s4[2]) * BigInt::from(ab);
        self.term = BigInt::from(s1[2]) * BigInt::from(bd);
        self.inner += &self.term;
        self.term = BigInt::from(s2[2]) * BigInt::from(da);
        self.inner += &self.term;
        self.term = BigInt::from(lift(s3)) * &self.inner;
        self.acc -= &self.term;

        self.inner = BigInt::from(s3[2]) * BigInt::from(da);
        self.term = BigInt::from(s4[2]) * BigInt::from(ac);
        self.inner += &self.term;
        self.term = BigInt::from(s1[2]) * BigInt::from(cd);
        self.inner += &self.term;
        self.term = BigInt::from(lift(s2)) * &self.inner;
        self.acc += &self.term;

        self.inner = BigInt::from(s2[2]) * BigInt::from(cd);
        self.term = BigInt::from(s3[2]) * BigInt::from(bd);
        self.inner -= &self.term;
        self.term = BigInt::from(s4[2]) * BigInt::from(bc);
        self.inner += &self.term;
        self.term = BigInt::from(lift(s1)) * &self.inner;
        self.acc -= &self.term;

        // The expansion above evaluates the determinant for the mirrored row
        // order; negate so that "inside" is positive for positively oriented
        // tetrahedra.
        if self.acc.is_zero() {
            0
        } else {
            -sign_of(&self.acc)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Small integer coordinates stand in for mantissas; the predicates only
    // require unsigned inputs below 2^52.

    #[test]
    fn orient2d_matches_counterclockwise_convention() {
        assert_eq!(orient2d_sign([0, 0], [1, 0], [0, 1]), 1);
        assert_eq!(orient2d_sign([0, 0], [0, 1], [1, 0]), -1);
        assert_eq!(orient2d_sign([0, 0], [1, 1], [2, 2]), 0);
    }

    #[test]
    fn incircle_detects_interior_point_of_unit_square() {
        let mut scratch = ExactScratch::new();
        // Counterclockwise triangle on a 2x2 square; its circumcircle is
        // centred at (1, 1) with radius sqrt(2).
        let a = [0, 0];
        let b = [2, 0];
        let c = [0, 2];
        assert_eq!(scratch.incircle_sign(a, b, c, [1, 1]), 1);
        assert_eq!(scratch.incircle_sign(a, b, c, [2, 2]), 0);
        assert_eq!(scratch.incircle_sign(a, b, c, [3, 3]), -1);
    }

    #[test]
    fn orient3d_positive_for_right_handed_tetrahedron() {
        let mut scratch = ExactScratch::new();
        let a = [0, 0, 0];
        let b = [1, 0, 0];
        let c = [0, 1, 0];
        let d = [0, 0, 1];
        assert_eq!(scratch.orient3d_sign(a, b, c, d), 1);
        assert_eq!(scratch.orient3d_sign(b, a, c, d), -1);
        assert_eq!(scratch.orient3d_sign(a, b, c, [1, 1, 0]), 0);
    }

    #[test]
    fn insphere_detects_interior_point_of_unit_cube_corner() {
        let mut scratch = ExactScratch::new();
        // Positively oriented tetrahedron on a 2x2x2 cube corner; its
        // circumsphere is centred at (1, 1, 1) with radius sqrt(3).
        let a = [0, 0, 0];
        let b = [2, 0, 0];
        let c = [0, 2, 0];
        let d = [0, 0, 2];
        assert_eq!(scratch.orient3d_sign(a, b, c, d), 1);
        assert_eq!(scratch.insphere_sign(a, b, c, d, [1, 1, 1]), 1);
        assert_eq!(scratch.insphere_sign(a, b, c, d, [2, 2, 2]), 0);
        assert_eq!(scratch.insphere_sign(a, b, c, d, [3, 3, 3]), -1);
    }

    #[test]
    fn insphere_sign_flips_with_query_side() {
        let mut scratch = ExactScratch::new();
        let a = [10, 10, 10];
        let b = [20, 10, 10];
        let c = [10, 20, 10];
        let d = [10, 10, 20];
        // A point close to the centroid of the tetrahedron is inside.
        assert_eq!(scratch.insphere_sign(a, b, c, d, [13, 13, 13]), 1);
        // A far-away point is outside.
        assert_eq!(scratch.insphere_sign(a, b, c, d, [40, 40, 40]), -1);
    }
}
