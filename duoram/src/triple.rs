//! Du-Atallah correlated randomness.
//!
//! A triple for dimension `d` is four uniform vectors `(a0, a1, b0, b1)` in
//! R^d plus scalars `(c0, c1)` with `c0 + c1 = ⟨a0 + a1, b0 + b1⟩`. Party P
//! only ever sees its half `(a_P, b_P, c_P)`; the halves mask the online
//! inner-product exchange and are consumed by exactly one secure read.

use rand::Rng;

use crate::ring::{self, Ring31};

/// One party's half of a Du-Atallah triple.
#[derive(Clone, Debug)]
pub struct TripleHalf {
    /// This party's share of the `a` mask family.
    pub a: Vec<Ring31>,
    /// This party's share of the `b` mask family.
    pub b: Vec<Ring31>,
    /// This party's additive share of `⟨a, b⟩`.
    pub c: Ring31,
}

impl TripleHalf {
    /// Dimension this half was generated for.
    pub fn dim(&self) -> usize {
        self.a.len()
    }
}

/// Generate a fresh triple for `dim`, split into the two party halves.
///
/// The first element of the pair goes to the first-arrived requester
/// (party index 0 within the pair), the second to the other.
pub fn generate(dim: usize, rng: &mut impl Rng) -> (TripleHalf, TripleHalf) {
    let a0 = ring::random_vector(dim, rng);
    let a1 = ring::random_vector(dim, rng);
    let b0 = ring::random_vector(dim, rng);
    let b1 = ring::random_vector(dim, rng);

    let a = ring::add_vec(&a0, &a1);
    let b = ring::add_vec(&b0, &b1);
    let c = ring::dot(&a, &b);

    let c0 = Ring31::random(rng);
    let c1 = c - c0;

    (
        TripleHalf { a: a0, b: b0, c: c0 },
        TripleHalf { a: a1, b: b1, c: c1 },
    )
}
