//! Big-endian framing shared by every protocol socket.
//!
//! All integers on the wire are unsigned big-endian; ring elements are the
//! 4-byte form of [`Ring31`]. Partial reads surface as `UnexpectedEof` i/o
//! errors from `read_exact`, which callers treat as fatal to the request.

use std::io::{Read, Write};

use crate::error::DuoramError;
use crate::ring::Ring31;
use crate::triple::TripleHalf;

// ---- opcodes ----

/// Requester -> pairing server: `[op][u32 dim]`.
pub const OP_TRIPLE_REQUEST: u8 = 0x31;
/// Pairing server -> requester: `[op][u32 dim][u64 sid][a..][b..][c]`.
pub const OP_TRIPLE_RESPONSE: u8 = 0x33;
/// Coordinator -> party: apply an additive update share.
pub const OP_WRITE_VEC: u8 = 0x40;
/// Coordinator -> party: oblivious read with a selector share.
pub const OP_READ_SECURE: u8 = 0x41;

/// Cross term `⟨S_A, e_B⟩`: party A is the X-side.
pub const TAG_CROSS_01: u8 = 0x01;
/// Cross term `⟨S_B, e_A⟩`: party B is the X-side.
pub const TAG_CROSS_10: u8 = 0x10;

/// Acknowledgement for a write share.
pub const WRITE_ACK: &[u8; 2] = b"OK";

/// Upper bound on any dimension accepted off the wire, so a corrupt header
/// cannot demand a multi-gigabyte allocation.
pub const MAX_DIM: u32 = 1 << 20;

// ---- scalar codecs ----

pub fn read_u8(r: &mut impl Read) -> Result<u8, DuoramError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn write_u8(w: &mut impl Write, v: u8) -> Result<(), DuoramError> {
    w.write_all(&[v])?;
    Ok(())
}

pub fn read_u32(r: &mut impl Read) -> Result<u32, DuoramError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

pub fn write_u32(w: &mut impl Write, v: u32) -> Result<(), DuoramError> {
    w.write_all(&v.to_be_bytes())?;
    Ok(())
}

pub fn read_u64(r: &mut impl Read) -> Result<u64, DuoramError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

pub fn write_u64(w: &mut impl Write, v: u64) -> Result<(), DuoramError> {
    w.write_all(&v.to_be_bytes())?;
    Ok(())
}

pub fn read_elem(r: &mut impl Read) -> Result<Ring31, DuoramError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(Ring31::from_be_bytes(buf))
}

pub fn write_elem(w: &mut impl Write, v: Ring31) -> Result<(), DuoramError> {
    w.write_all(&v.to_be_bytes())?;
    Ok(())
}

/// Validate a dimension read off the wire.
pub fn check_dim(dim: u32) -> Result<(), DuoramError> {
    if dim == 0 {
        return Err(DuoramError::ZeroDim);
    }
    if dim > MAX_DIM {
        return Err(DuoramError::DimTooLarge(dim));
    }
    Ok(())
}

// ---- vector codecs ----

pub fn read_vec(r: &mut impl Read, dim: u32) -> Result<Vec<Ring31>, DuoramError> {
    let mut buf = vec![0u8; dim as usize * 4];
    r.read_exact(&mut buf)?;
    Ok(buf
        .chunks_exact(4)
        .map(|c| Ring31::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

pub fn write_vec(w: &mut impl Write, vec: &[Ring31]) -> Result<(), DuoramError> {
    let mut buf = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        buf.extend_from_slice(&v.to_be_bytes());
    }
    w.write_all(&buf)?;
    Ok(())
}

// ---- triple delivery ----

/// Serialize one triple half as the pairing-server response.
pub fn write_triple_half(
    w: &mut impl Write,
    dim: u32,
    sid: u64,
    half: &TripleHalf,
) -> Result<(), DuoramError> {
    write_u8(w, OP_TRIPLE_RESPONSE)?;
    write_u32(w, dim)?;
    write_u64(w, sid)?;
    write_vec(w, &half.a)?;
    write_vec(w, &half.b)?;
    write_elem(w, half.c)?;
    w.flush()?;
    Ok(())
}

/// Parse a pairing-server response, checking op and dimension.
pub fn read_triple_half(
    r: &mut impl Read,
    expect_dim: u32,
) -> Result<(u64, TripleHalf), DuoramError> {
    let op = read_u8(r)?;
    if op != OP_TRIPLE_RESPONSE {
        return Err(DuoramError::BadOp {
            expected: OP_TRIPLE_RESPONSE,
            got: op,
        });
    }
    let dim = read_u32(r)?;
    if dim != expect_dim {
        return Err(DuoramError::DimMismatch {
            expected: expect_dim,
            got: dim,
        });
    }
    let sid = read_u64(r)?;
    let a = read_vec(r, dim)?;
    let b = read_vec(r, dim)?;
    let c = read_elem(r)?;
    Ok((sid, TripleHalf { a, b, c }))
}

// ---- peer residual frames ----

/// One party's contribution to a masked inner-product exchange.
///
/// `u_part` and `v_part` are the sender's additive contributions to the
/// masked vectors `u = x + a` and `v = y + b`; the receiver adds its own
/// contributions to recover the full masked vectors.
#[derive(Clone, Debug)]
pub struct PeerFrame {
    pub sid: u64,
    pub tag: u8,
    pub u_part: Vec<Ring31>,
    pub v_part: Vec<Ring31>,
}

impl PeerFrame {
    pub fn dim(&self) -> u32 {
        self.u_part.len() as u32
    }

    pub fn write_to(&self, w: &mut impl Write) -> Result<(), DuoramError> {
        write_u64(w, self.sid)?;
        write_u8(w, self.tag)?;
        write_u32(w, self.dim())?;
        write_vec(w, &self.u_part)?;
        write_vec(w, &self.v_part)?;
        w.flush()?;
        Ok(())
    }

    pub fn read_from(r: &mut impl Read) -> Result<Self, DuoramError> {
        let sid = read_u64(r)?;
        let tag = read_u8(r)?;
        let dim = read_u32(r)?;
        check_dim(dim)?;
        let u_part = read_vec(r, dim)?;
        let v_part = read_vec(r, dim)?;
        Ok(PeerFrame {
            sid,
            tag,
            u_part,
            v_part,
        })
    }
}
