//! Arithmetic in the ring Z/2^31Z.
//!
//! Every database cell, selector component and protocol mask is a [`Ring31`].
//! Reduction is a mask with `2^31 - 1` after native arithmetic; products
//! widen to 64 bits first so no intermediate overflows. The top bit of the
//! 4-byte big-endian wire form is therefore always zero.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use rand::Rng;

use crate::error::DuoramError;

/// The ring modulus, 2^31.
pub const MOD: u32 = 1 << 31;
/// Reduction mask, 2^31 - 1.
pub const MASK: u32 = MOD - 1;

/// An element of Z/2^31Z, stored reduced (top bit clear).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Ring31(u32);

impl Ring31 {
    /// Additive identity.
    pub const ZERO: Self = Ring31(0);
    /// Multiplicative identity.
    pub const ONE: Self = Ring31(1);

    /// Construct from a raw word, reducing modulo 2^31.
    #[inline]
    pub const fn new(v: u32) -> Self {
        Ring31(v & MASK)
    }

    /// The reduced representative in `[0, 2^31)`.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Sample uniformly from the full ring.
    pub fn random(rng: &mut impl Rng) -> Self {
        Ring31(rng.random::<u32>() & MASK)
    }

    /// Units of Z/2^31Z are exactly the odd residues.
    #[inline]
    pub const fn is_unit(self) -> bool {
        self.0 & 1 == 1
    }

    /// Multiplicative inverse, defined only for odd elements.
    ///
    /// Newton lifting doubles the precision of an inverse each step, so five
    /// steps from the trivial 1-bit inverse cover all 31 bits.
    pub fn inv(self) -> Result<Self, DuoramError> {
        if !self.is_unit() {
            return Err(DuoramError::NoInverse(self.0));
        }
        let a = self.0 as u64;
        let mut x: u64 = 1;
        for _ in 0..5 {
            let ax = (a * x) & MASK as u64;
            // (2 - a*x) mod 2^31; u64 wrap-around is harmless since 2^64
            // is a multiple of the modulus.
            let two_minus = 2u64.wrapping_sub(ax) & MASK as u64;
            x = (x * two_minus) & MASK as u64;
        }
        Ok(Ring31(x as u32))
    }

    /// Big-endian wire form; the top bit is always zero.
    #[inline]
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Parse the wire form, reducing in case a peer set the top bit.
    #[inline]
    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Ring31::new(u32::from_be_bytes(bytes))
    }
}

impl Add for Ring31 {
    type Output = Ring31;
    #[inline]
    fn add(self, rhs: Ring31) -> Ring31 {
        Ring31(self.0.wrapping_add(rhs.0) & MASK)
    }
}

impl AddAssign for Ring31 {
    #[inline]
    fn add_assign(&mut self, rhs: Ring31) {
        *self = *self + rhs;
    }
}

impl Sub for Ring31 {
    type Output = Ring31;
    #[inline]
    fn sub(self, rhs: Ring31) -> Ring31 {
        Ring31(self.0.wrapping_sub(rhs.0) & MASK)
    }
}

impl SubAssign for Ring31 {
    #[inline]
    fn sub_assign(&mut self, rhs: Ring31) {
        *self = *self - rhs;
    }
}

impl Mul for Ring31 {
    type Output = Ring31;
    #[inline]
    fn mul(self, rhs: Ring31) -> Ring31 {
        Ring31((((self.0 as u64) * (rhs.0 as u64)) & MASK as u64) as u32)
    }
}

impl MulAssign for Ring31 {
    #[inline]
    fn mul_assign(&mut self, rhs: Ring31) {
        *self = *self * rhs;
    }
}

impl Neg for Ring31 {
    type Output = Ring31;
    #[inline]
    fn neg(self) -> Ring31 {
        Ring31(0u32.wrapping_sub(self.0) & MASK)
    }
}

impl fmt::Display for Ring31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Vector helpers
// ============================================================================

/// Inner product over the ring.
pub fn dot(xs: &[Ring31], ys: &[Ring31]) -> Ring31 {
    assert_eq!(xs.len(), ys.len(), "dot: length mismatch");
    xs.iter()
        .zip(ys)
        .fold(Ring31::ZERO, |acc, (x, y)| acc + *x * *y)
}

/// Elementwise sum of two vectors.
pub fn add_vec(xs: &[Ring31], ys: &[Ring31]) -> Vec<Ring31> {
    assert_eq!(xs.len(), ys.len(), "add_vec: length mismatch");
    xs.iter().zip(ys).map(|(x, y)| *x + *y).collect()
}

/// Sample a vector uniformly from R^dim.
pub fn random_vector(dim: usize, rng: &mut impl Rng) -> Vec<Ring31> {
    (0..dim).map(|_| Ring31::random(rng)).collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn test_add_wraps_at_modulus() {
        let a = Ring31::new(MASK);
        assert_eq!(a + Ring31::ONE, Ring31::ZERO);
        assert_eq!(Ring31::new(5) + Ring31::new(7), Ring31::new(12));
    }

    #[test]
    fn test_sub_and_neg() {
        assert_eq!(Ring31::new(3) - Ring31::new(5), Ring31::new(MOD - 2));
        assert_eq!(-Ring31::new(1), Ring31::new(MASK));
        assert_eq!(-Ring31::ZERO, Ring31::ZERO);
        let a = Ring31::new(123_456_789);
        assert_eq!(a + (-a), Ring31::ZERO);
    }

    #[test]
    fn test_mul_widens_before_reduction() {
        // (2^30)^2 = 2^60 ≡ 0 (mod 2^31)
        let a = Ring31::new(1 << 30);
        assert_eq!(a * a, Ring31::ZERO);
        // (2^31 - 1)^2 mod 2^31 = 1
        let b = Ring31::new(MASK);
        assert_eq!(b * b, Ring31::ONE);
    }

    #[test]
    fn test_identities() {
        let a = Ring31::new(987_654_321);
        assert_eq!(a + Ring31::ZERO, a);
        assert_eq!(a * Ring31::ONE, a);
    }

    #[test]
    fn test_inverse_of_odd_elements() {
        for v in [1u32, 3, 5, 12345, 1 << 20 | 1, MASK] {
            let a = Ring31::new(v);
            let inv = a.inv().unwrap();
            assert_eq!(a * inv, Ring31::ONE, "inverse failed for {v}");
        }
    }

    #[test]
    fn test_inverse_of_even_element_is_an_error() {
        assert!(Ring31::new(2).inv().is_err());
        assert!(Ring31::ZERO.inv().is_err());
    }

    #[test]
    fn test_wire_form_round_trip() {
        let a = Ring31::new(0x1234_5678);
        assert_eq!(Ring31::from_be_bytes(a.to_be_bytes()), a);
        // Top bit must come back reduced.
        assert_eq!(Ring31::from_be_bytes([0xFF; 4]), Ring31::new(MASK));
        assert_eq!(a.to_be_bytes()[0] & 0x80, 0);
    }

    #[test]
    fn test_dot() {
        let xs = [Ring31::new(1), Ring31::new(2), Ring31::new(3)];
        let ys = [Ring31::new(4), Ring31::new(5), Ring31::new(6)];
        assert_eq!(dot(&xs, &ys), Ring31::new(32));
    }

    #[test]
    fn test_random_stays_reduced() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(Ring31::random(&mut rng).raw() < MOD);
        }
    }
}
