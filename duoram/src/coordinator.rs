//! Client-side share splitting and answer reconstruction.
//!
//! A logical request is a scaled standard-basis vector `e` with `e[idx] = v`
//! (v = 1 for reads). The coordinator samples a uniform vector `f`, splits
//! `e` as `share0 = e - f` and `share1 = f`, ships the shares to the two
//! parties **concurrently** (sequential transmission deadlocks, since each
//! party blocks on its peer exchange) and sums the replies.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use crate::error::DuoramError;
use crate::party::DEFAULT_IO_TIMEOUT;
use crate::ring::{self, Ring31};
use crate::wire;

/// Split `value · e_idx` into two additive share vectors.
///
/// Each half on its own is uniform over R^dim, so a single party's view is
/// independent of both `idx` and `value`.
pub fn split_selector(
    dim: u32,
    idx: u32,
    value: Ring31,
    rng: &mut impl Rng,
) -> Result<(Vec<Ring31>, Vec<Ring31>), DuoramError> {
    if idx >= dim {
        return Err(DuoramError::OutOfRange { idx, dim });
    }
    let f = ring::random_vector(dim as usize, rng);
    let mut e: Vec<Ring31> = f.iter().map(|x| -*x).collect();
    e[idx as usize] += value;
    Ok((e, f))
}

/// Issues logical reads and writes through a party pair.
pub struct Coordinator {
    /// Party A's client-facing address.
    pub c0: String,
    /// Party B's client-facing address.
    pub c1: String,
    pub io_timeout: Duration,
}

impl Coordinator {
    pub fn new(c0: impl Into<String>, c1: impl Into<String>) -> Self {
        Coordinator {
            c0: c0.into(),
            c1: c1.into(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Reconstruct the value at `idx`. Index bounds are checked before any
    /// socket is opened.
    pub fn read(&self, dim: u32, idx: u32) -> Result<Ring31, DuoramError> {
        let (share0, share1) = split_selector(dim, idx, Ring31::ONE, &mut rand::rng())?;
        debug!("read idx {idx} of dim {dim}");

        let (r0, r1) = thread::scope(|s| {
            let h0 = s.spawn(|| self.read_share(&self.c0, &share0));
            let h1 = s.spawn(|| self.read_share(&self.c1, &share1));
            (join(h0), join(h1))
        });
        let value = r0? + r1?;
        info!("read idx {idx} -> {value}");
        Ok(value)
    }

    /// Add `value` into the cell at `idx`. Success requires both parties'
    /// acknowledgements; there is no rollback if only one side applied.
    pub fn write(&self, dim: u32, idx: u32, value: Ring31) -> Result<(), DuoramError> {
        let (share0, share1) = split_selector(dim, idx, value, &mut rand::rng())?;
        debug!("write idx {idx} of dim {dim}");

        let (r0, r1) = thread::scope(|s| {
            let h0 = s.spawn(|| self.write_share(&self.c0, &share0, 0));
            let h1 = s.spawn(|| self.write_share(&self.c1, &share1, 1));
            (join(h0), join(h1))
        });
        r0?;
        r1?;
        info!("write idx {idx} acknowledged by both parties");
        Ok(())
    }

    fn open(&self, addr: &str) -> Result<TcpStream, DuoramError> {
        let sock = TcpStream::connect(addr)?;
        sock.set_read_timeout(Some(self.io_timeout))?;
        sock.set_write_timeout(Some(self.io_timeout))?;
        Ok(sock)
    }

    fn read_share(&self, addr: &str, share: &[Ring31]) -> Result<Ring31, DuoramError> {
        let mut sock = self.open(addr)?;
        wire::write_u8(&mut sock, wire::OP_READ_SECURE)?;
        wire::write_u32(&mut sock, share.len() as u32)?;
        wire::write_vec(&mut sock, share)?;
        sock.flush()?;
        let raw = wire::read_u32(&mut sock)?;
        Ok(Ring31::new(raw))
    }

    fn write_share(&self, addr: &str, share: &[Ring31], party: usize) -> Result<(), DuoramError> {
        let mut sock = self.open(addr)?;
        wire::write_u8(&mut sock, wire::OP_WRITE_VEC)?;
        wire::write_u32(&mut sock, share.len() as u32)?;
        wire::write_vec(&mut sock, share)?;
        sock.flush()?;
        let mut ack = [0u8; 2];
        sock.read_exact(&mut ack)
            .map_err(|_| DuoramError::WriteNotAcked(party))?;
        if &ack != wire::WRITE_ACK {
            return Err(DuoramError::WriteNotAcked(party));
        }
        Ok(())
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, Result<T, DuoramError>>) -> Result<T, DuoramError> {
    handle
        .join()
        .map_err(|_| DuoramError::Internal("party request thread panicked".into()))?
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::ring::MOD;

    #[test]
    fn test_shares_sum_to_scaled_basis() {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let (s0, s1) = split_selector(8, 3, Ring31::new(42), &mut rng).unwrap();
        let sum = ring::add_vec(&s0, &s1);
        for (i, v) in sum.iter().enumerate() {
            let expect = if i == 3 { Ring31::new(42) } else { Ring31::ZERO };
            assert_eq!(*v, expect, "component {i}");
        }
    }

    #[test]
    fn test_out_of_range_is_rejected_before_io() {
        let mut rng = ChaCha20Rng::seed_from_u64(22);
        assert!(matches!(
            split_selector(4, 4, Ring31::ONE, &mut rng),
            Err(DuoramError::OutOfRange { .. })
        ));

        // The coordinator points at addresses nothing listens on; a bounds
        // error must surface without any connection attempt.
        let coord = Coordinator::new("203.0.113.1:1", "203.0.113.1:2");
        assert!(matches!(
            coord.read(4, 9),
            Err(DuoramError::OutOfRange { idx: 9, dim: 4 })
        ));
        assert!(matches!(
            coord.write(4, 4, Ring31::ONE),
            Err(DuoramError::OutOfRange { .. })
        ));
    }

    /// A single party's share vector must look uniform regardless of the
    /// queried index: with a fixed seed, the empirical distribution of one
    /// component is compared across two distinct indices.
    #[test]
    fn test_share_distribution_is_index_independent() {
        const SAMPLES: usize = 4000;
        const BUCKETS: u64 = 8;
        let bucket = |v: Ring31| (v.raw() as u64 * BUCKETS / MOD as u64) as usize;

        let mut counts = [[0usize; BUCKETS as usize]; 2];
        for (slot, idx, seed) in [(0usize, 0u32, 23u64), (1, 2, 24)] {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            for _ in 0..SAMPLES {
                let (s0, _s1) = split_selector(4, idx, Ring31::ONE, &mut rng).unwrap();
                // The component that carries the secret is the interesting one.
                counts[slot][bucket(s0[idx as usize])] += 1;
            }
        }

        for b in 0..BUCKETS as usize {
            let p0 = counts[0][b] as f64 / SAMPLES as f64;
            let p1 = counts[1][b] as f64 / SAMPLES as f64;
            assert!(
                (p0 - p1).abs() < 0.05 && (p0 - 1.0 / BUCKETS as f64).abs() < 0.05,
                "bucket {b}: {p0:.3} vs {p1:.3}"
            );
        }
    }
}
