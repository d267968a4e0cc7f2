//! A party node: one additive share of the database plus the online
//! Du-Atallah protocol.
//!
//! The node serves coordinator requests on its client port and exchanges
//! masked residuals with its peer party over a dedicated peer port. A write
//! is a purely local vector addition; a secure read fetches one fresh triple
//! from the pairing server, runs the two cross-term exchanges (tag 0x01 then
//! 0x10) and replies with this party's additive share of `⟨S, e⟩`.
//!
//! For one cross term `⟨x, y⟩`, the X-side holds `x` and the Y-side `y`;
//! each side sends its additive contributions to the masked vectors
//! `u = x + a` and `v = y + b`, both sides reconstruct the full `u` and `v`,
//! and the role-fixed shares
//!
//! ```text
//! s_A = -⟨u, b_A⟩ - ⟨a_A, v⟩ + c_A
//! s_B = ⟨u, v⟩ - ⟨u, b_B⟩ - ⟨a_B, v⟩ + c_B
//! ```
//!
//! sum to `⟨u - a, v - b⟩ = ⟨x, y⟩` because `c_A + c_B = ⟨a, b⟩`.

use std::fmt;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::DuoramError;
use crate::peer::{self, PeerRouter};
use crate::ring::{self, Ring31};
use crate::store::ShareStore;
use crate::triple::TripleHalf;
use crate::wire::{self, PeerFrame};

/// Default cap on any single blocking protocol step.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Which of the two non-colluding parties this node is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    A,
    B,
}

impl Role {
    /// The X-side contributes the masked `x` input of a cross term and
    /// sends first; roles alternate across the two tags so the exchange
    /// never deadlocks symmetrically.
    pub fn is_x_side(self, tag: u8) -> bool {
        match tag {
            wire::TAG_CROSS_01 => self == Role::A,
            wire::TAG_CROSS_10 => self == Role::B,
            _ => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::A => f.write_str("A"),
            Role::B => f.write_str("B"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "a" => Ok(Role::A),
            "B" | "b" => Ok(Role::B),
            other => Err(format!("role must be A or B, got {other:?}")),
        }
    }
}

/// Addresses and sizing for one party node.
#[derive(Clone, Debug)]
pub struct PartyConfig {
    pub role: Role,
    /// Number of database rows; every request must carry exactly this dim.
    pub rows: u32,
    /// Client-facing listen address.
    pub listen: String,
    /// Listen address for inbound peer residuals.
    pub peer_listen: String,
    /// The peer party's residual listener.
    pub peer: String,
    /// The pairing server.
    pub pairing: String,
    pub io_timeout: Duration,
}

/// One running party.
pub struct PartyNode {
    cfg: PartyConfig,
    store: Arc<RwLock<ShareStore>>,
    router: Arc<PeerRouter>,
}

impl PartyNode {
    pub fn new(cfg: PartyConfig) -> Self {
        let store = Arc::new(RwLock::new(ShareStore::new(cfg.rows as usize)));
        PartyNode {
            cfg,
            store,
            router: PeerRouter::new(),
        }
    }

    /// Bind the configured addresses and serve forever.
    pub fn run(self) -> Result<(), DuoramError> {
        let client_listener = TcpListener::bind(&self.cfg.listen)?;
        let peer_listener = TcpListener::bind(&self.cfg.peer_listen)?;
        self.serve(client_listener, peer_listener)
    }

    /// Serve on pre-bound listeners (lets callers pick ephemeral ports).
    pub fn serve(
        self,
        client_listener: TcpListener,
        peer_listener: TcpListener,
    ) -> Result<(), DuoramError> {
        info!(
            "party {} serving {} rows on {} (residuals in on {}, peer at {}, pairing at {})",
            self.cfg.role,
            self.cfg.rows,
            client_listener.local_addr()?,
            peer_listener.local_addr()?,
            self.cfg.peer,
            self.cfg.pairing,
        );
        self.router.spawn_listener(peer_listener, self.cfg.io_timeout);

        let node = Arc::new(self);
        for conn in client_listener.incoming() {
            match conn {
                Ok(sock) => {
                    let node = Arc::clone(&node);
                    thread::spawn(move || {
                        if let Err(e) = node.handle_client(sock) {
                            warn!("party {} request failed: {e}", node.cfg.role);
                        }
                    });
                }
                Err(e) => warn!("accept failed: {e}"),
            }
        }
        Ok(())
    }

    /// One coordinator connection carries one request. Any error closes the
    /// connection; the node keeps serving.
    fn handle_client(&self, mut sock: TcpStream) -> Result<(), DuoramError> {
        sock.set_read_timeout(Some(self.cfg.io_timeout))?;
        sock.set_write_timeout(Some(self.cfg.io_timeout))?;

        let op = wire::read_u8(&mut sock)?;
        let dim = wire::read_u32(&mut sock)?;
        if dim != self.cfg.rows {
            return Err(DuoramError::DimMismatch {
                expected: self.cfg.rows,
                got: dim,
            });
        }

        match op {
            wire::OP_WRITE_VEC => {
                let update = wire::read_vec(&mut sock, dim)?;
                self.store_mut()?.apply_update(&update)?;
                sock.write_all(wire::WRITE_ACK)?;
                sock.flush()?;
                info!("party {} applied a write share of dim {dim}", self.cfg.role);
                Ok(())
            }
            wire::OP_READ_SECURE => {
                let e_share = wire::read_vec(&mut sock, dim)?;
                let share = self.read_secure(&e_share)?;
                wire::write_u32(&mut sock, share.raw())?;
                info!("party {} answered a secure read of dim {dim}", self.cfg.role);
                Ok(())
            }
            other => Err(DuoramError::BadOp {
                expected: wire::OP_READ_SECURE,
                got: other,
            }),
        }
    }

    /// The online protocol for one secure read. The share vector is only
    /// read through a snapshot, so a failed request leaves no trace.
    fn read_secure(&self, e_share: &[Ring31]) -> Result<Ring31, DuoramError> {
        let dim = e_share.len() as u32;

        let (sid, half) = self.fetch_triple(dim)?;
        debug!("party {} read session {sid:#018x}", self.cfg.role);

        let snapshot = self.store_ref()?.snapshot();

        let z01 = self.cross_term(wire::TAG_CROSS_01, sid, &snapshot, e_share, &half)?;
        let z10 = self.cross_term(wire::TAG_CROSS_10, sid, &snapshot, e_share, &half)?;
        let self_term = ring::dot(&snapshot, e_share);

        Ok(self_term + z01 + z10)
    }

    /// One masked inner-product exchange against the peer.
    ///
    /// Tag 0x01 computes shares of `⟨S_A, e_B⟩`, tag 0x10 of `⟨S_B, e_A⟩`;
    /// in both cases the X-side's input is its database share and the
    /// Y-side's input is its selector share. The X-side sends before it
    /// receives, the Y-side receives before it sends.
    fn cross_term(
        &self,
        tag: u8,
        sid: u64,
        s_share: &[Ring31],
        e_share: &[Ring31],
        half: &TripleHalf,
    ) -> Result<Ring31, DuoramError> {
        let x_side = self.cfg.role.is_x_side(tag);
        let my_input = if x_side { s_share } else { e_share };
        let (u_part, v_part) = mask_contribution(x_side, my_input, half);
        let mine = PeerFrame {
            sid,
            tag,
            u_part,
            v_part,
        };

        let dim = my_input.len() as u32;
        let theirs = if x_side {
            peer::send_frame(&self.cfg.peer, &mine, self.cfg.io_timeout)?;
            self.router.recv(sid, tag, dim, self.cfg.io_timeout)?
        } else {
            let got = self.router.recv(sid, tag, dim, self.cfg.io_timeout)?;
            peer::send_frame(&self.cfg.peer, &mine, self.cfg.io_timeout)?;
            got
        };

        let u = ring::add_vec(&mine.u_part, &theirs.u_part);
        let v = ring::add_vec(&mine.v_part, &theirs.v_part);
        Ok(residual_share(self.cfg.role, &u, &v, half))
    }

    fn fetch_triple(&self, dim: u32) -> Result<(u64, TripleHalf), DuoramError> {
        let mut sock = TcpStream::connect(&self.cfg.pairing)?;
        sock.set_read_timeout(Some(self.cfg.io_timeout))?;
        sock.set_write_timeout(Some(self.cfg.io_timeout))?;
        wire::write_u8(&mut sock, wire::OP_TRIPLE_REQUEST)?;
        wire::write_u32(&mut sock, dim)?;
        sock.flush()?;
        wire::read_triple_half(&mut sock, dim)
    }

    fn store_ref(&self) -> Result<std::sync::RwLockReadGuard<'_, ShareStore>, DuoramError> {
        self.store
            .read()
            .map_err(|_| DuoramError::Internal("share store lock poisoned".into()))
    }

    fn store_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, ShareStore>, DuoramError> {
        self.store
            .write()
            .map_err(|_| DuoramError::Internal("share store lock poisoned".into()))
    }
}

/// The sender's additive contributions to the masked vectors `u` and `v`.
///
/// The X-side contributes `x + a_P` to `u` and its bare `b_P` to `v`; the
/// Y-side contributes its bare `a_P` to `u` and `y + b_P` to `v`. Summed
/// across both parties these reconstruct `u = x + a` and `v = y + b`.
fn mask_contribution(
    x_side: bool,
    my_input: &[Ring31],
    half: &TripleHalf,
) -> (Vec<Ring31>, Vec<Ring31>) {
    if x_side {
        (ring::add_vec(my_input, &half.a), half.b.clone())
    } else {
        (half.a.clone(), ring::add_vec(my_input, &half.b))
    }
}

/// Role-fixed share of one cross term, given the reconstructed `u` and `v`.
fn residual_share(role: Role, u: &[Ring31], v: &[Ring31], half: &TripleHalf) -> Ring31 {
    match role {
        Role::A => -ring::dot(u, &half.b) - ring::dot(&half.a, v) + half.c,
        Role::B => {
            ring::dot(u, v) - ring::dot(u, &half.b) - ring::dot(&half.a, v) + half.c
        }
    }
}
