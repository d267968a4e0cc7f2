//! The pairing server: preprocessing for the online protocol.
//!
//! Two parties each ask for a triple of the same dimension; the server parks
//! the first requester (without reading further from its socket) until the
//! second arrives, then generates one triple, mints a fresh 64-bit session
//! id and delivers one half to each socket. The per-dimension queue is the
//! only shared mutable state.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::DuoramError;
use crate::triple;
use crate::wire;

/// How long a matched delivery may block before the pair is abandoned.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Stateless-across-pairs triple server with a per-dimension waiting room.
pub struct PairingServer {
    waiting: Mutex<HashMap<u32, VecDeque<TcpStream>>>,
}

impl Default for PairingServer {
    fn default() -> Self {
        Self::new()
    }
}

impl PairingServer {
    pub fn new() -> Self {
        PairingServer {
            waiting: Mutex::new(HashMap::new()),
        }
    }

    /// Accept loop; each connection is handled on its own thread.
    pub fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), DuoramError> {
        info!("pairing server listening on {}", listener.local_addr()?);
        for conn in listener.incoming() {
            match conn {
                Ok(sock) => {
                    let server = Arc::clone(&self);
                    thread::spawn(move || {
                        if let Err(e) = server.handle_conn(sock) {
                            warn!("pairing connection error: {e}");
                        }
                    });
                }
                Err(e) => warn!("accept failed: {e}"),
            }
        }
        Ok(())
    }

    /// Read one request header, then pair or park. Errors close the socket.
    fn handle_conn(&self, mut sock: TcpStream) -> Result<(), DuoramError> {
        sock.set_read_timeout(Some(DELIVERY_TIMEOUT))?;
        sock.set_write_timeout(Some(DELIVERY_TIMEOUT))?;

        let op = wire::read_u8(&mut sock)?;
        if op != wire::OP_TRIPLE_REQUEST {
            return Err(DuoramError::BadOp {
                expected: wire::OP_TRIPLE_REQUEST,
                got: op,
            });
        }
        let dim = wire::read_u32(&mut sock)?;
        wire::check_dim(dim)?;
        debug!("triple request for dim {dim}");

        // A requester that died while parked shows up as a delivery failure;
        // drop it and re-run the match with the live socket.
        let mut second = sock;
        loop {
            let (mut first, live) = match self.pair_or_park(dim, second) {
                Some(pair) => pair,
                None => {
                    debug!("parked first requester for dim {dim}");
                    return Ok(());
                }
            };
            second = live;

            let mut rng = rand::rng();
            let (h0, h1) = triple::generate(dim as usize, &mut rng);
            let sid: u64 = rng.random();

            if let Err(e) = wire::write_triple_half(&mut first, dim, sid, &h0) {
                warn!("parked requester dropped before matching: {e}");
                continue;
            }
            wire::write_triple_half(&mut second, dim, sid, &h1)?;
            info!("paired dim {dim} under sid {sid:#018x}");
            return Ok(());
        }
    }

    /// Pop a parked peer for `dim`, or park `sock` and return `None`.
    fn pair_or_park(&self, dim: u32, sock: TcpStream) -> Option<(TcpStream, TcpStream)> {
        let mut waiting = self.waiting.lock().unwrap_or_else(|e| e.into_inner());
        match waiting.entry(dim).or_default().pop_front() {
            Some(first) => {
                if waiting.get(&dim).is_some_and(|q| q.is_empty()) {
                    waiting.remove(&dim);
                }
                Some((first, sock))
            }
            None => {
                waiting.entry(dim).or_default().push_back(sock);
                None
            }
        }
    }
}
