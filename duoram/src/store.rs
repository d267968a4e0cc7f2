//! A party's local share of the logical database.
//!
//! The store is the sole mutable state of a party: one allocation of `rows`
//! ring elements, all zero at boot. Oblivious writes add an update share
//! elementwise; secure reads only ever take a snapshot. The invariant
//! `S_A[i] + S_B[i] = D[i]` holds between requests by construction.

use crate::error::DuoramError;
use crate::ring::Ring31;

/// One additive share vector of the logical database.
#[derive(Clone, Debug)]
pub struct ShareStore {
    rows: Vec<Ring31>,
}

impl ShareStore {
    /// A zeroed share of `rows` cells, so both parties boot consistent.
    pub fn new(rows: usize) -> Self {
        assert!(rows > 0, "store must have at least one row");
        ShareStore {
            rows: vec![Ring31::ZERO; rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Bounds-checked plain read of a single share cell.
    pub fn row(&self, idx: usize) -> Result<Ring31, DuoramError> {
        self.rows
            .get(idx)
            .copied()
            .ok_or(DuoramError::OutOfRange {
                idx: idx as u32,
                dim: self.rows.len() as u32,
            })
    }

    /// Bounds-checked plain write of a single share cell.
    pub fn set_row(&mut self, idx: usize, value: Ring31) -> Result<(), DuoramError> {
        let dim = self.rows.len() as u32;
        let cell = self.rows.get_mut(idx).ok_or(DuoramError::OutOfRange {
            idx: idx as u32,
            dim,
        })?;
        *cell = value;
        Ok(())
    }

    /// Apply an update share: `S[i] <- S[i] + u[i]` for every row.
    pub fn apply_update(&mut self, update: &[Ring31]) -> Result<(), DuoramError> {
        if update.len() != self.rows.len() {
            return Err(DuoramError::DimMismatch {
                expected: self.rows.len() as u32,
                got: update.len() as u32,
            });
        }
        for (cell, u) in self.rows.iter_mut().zip(update) {
            *cell += *u;
        }
        Ok(())
    }

    /// Copy of the share vector for a read's working set.
    pub fn snapshot(&self) -> Vec<Ring31> {
        self.rows.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boots_zeroed() {
        let s = ShareStore::new(4);
        assert_eq!(s.rows(), 4);
        assert!(s.snapshot().iter().all(|r| *r == Ring31::ZERO));
    }

    #[test]
    fn test_updates_accumulate() {
        let mut s = ShareStore::new(3);
        s.apply_update(&[Ring31::new(1), Ring31::new(2), Ring31::new(3)])
            .unwrap();
        s.apply_update(&[Ring31::new(10), Ring31::ZERO, Ring31::new(30)])
            .unwrap();
        assert_eq!(s.row(0).unwrap(), Ring31::new(11));
        assert_eq!(s.row(1).unwrap(), Ring31::new(2));
        assert_eq!(s.row(2).unwrap(), Ring31::new(33));
    }

    #[test]
    fn test_update_dim_mismatch() {
        let mut s = ShareStore::new(2);
        assert!(matches!(
            s.apply_update(&[Ring31::ONE]),
            Err(DuoramError::DimMismatch { .. })
        ));
    }

    #[test]
    fn test_row_bounds() {
        let mut s = ShareStore::new(2);
        assert!(s.row(2).is_err());
        assert!(s.set_row(2, Ring31::ONE).is_err());
        s.set_row(1, Ring31::new(9)).unwrap();
        assert_eq!(s.row(1).unwrap(), Ring31::new(9));
    }
}
