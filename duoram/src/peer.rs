//! Inbound residual routing for the party-to-party channel.
//!
//! Peer residual frames for concurrent secure reads arrive interleaved on a
//! single listener. A dedicated ingress loop parses each frame and hands it
//! to the in-flight request registered for its `(sid, tag)`; frames that
//! arrive before the local request has learned its session id are stashed
//! until claimed. A request only ever sees frames matching the exact
//! `(sid, tag, dim)` it awaits.

use std::collections::HashMap;
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::DuoramError;
use crate::wire::PeerFrame;

enum Slot {
    /// A request is blocked waiting for this frame.
    Waiting(mpsc::Sender<PeerFrame>),
    /// The frame arrived before anyone asked for it.
    Parked(PeerFrame),
}

/// Demultiplexes inbound peer frames by `(sid, tag)`.
pub struct PeerRouter {
    slots: Mutex<HashMap<(u64, u8), Slot>>,
}

impl PeerRouter {
    pub fn new() -> Arc<Self> {
        Arc::new(PeerRouter {
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Spawn the ingress accept loop. Each connection carries one frame.
    pub fn spawn_listener(self: &Arc<Self>, listener: TcpListener, io_timeout: Duration) {
        let router = Arc::clone(self);
        thread::spawn(move || {
            for conn in listener.incoming() {
                match conn {
                    Ok(sock) => {
                        let router = Arc::clone(&router);
                        thread::spawn(move || router.ingest(sock, io_timeout));
                    }
                    Err(e) => warn!("peer accept failed: {e}"),
                }
            }
        });
    }

    fn ingest(&self, mut sock: TcpStream, io_timeout: Duration) {
        if sock.set_read_timeout(Some(io_timeout)).is_err() {
            return;
        }
        match PeerFrame::read_from(&mut sock) {
            Ok(frame) => self.deliver(frame),
            Err(e) => warn!("dropping malformed peer frame: {e}"),
        }
    }

    fn deliver(&self, frame: PeerFrame) {
        let key = (frame.sid, frame.tag);
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.remove(&key) {
            Some(Slot::Waiting(tx)) => {
                // The waiter may have timed out and gone away; nothing to do.
                let _ = tx.send(frame);
            }
            Some(Slot::Parked(earlier)) => {
                warn!(
                    "duplicate peer frame for sid {:#018x} tag {:#04x}; keeping the first",
                    key.0, key.1
                );
                slots.insert(key, Slot::Parked(earlier));
            }
            None => {
                debug!(
                    "stashing early peer frame for sid {:#018x} tag {:#04x}",
                    key.0, key.1
                );
                slots.insert(key, Slot::Parked(frame));
            }
        }
    }

    /// Block until the frame for `(sid, tag)` arrives, then validate its
    /// dimension. Timing out abandons the slot.
    pub fn recv(
        &self,
        sid: u64,
        tag: u8,
        dim: u32,
        timeout: Duration,
    ) -> Result<PeerFrame, DuoramError> {
        let key = (sid, tag);
        let rx = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            match slots.remove(&key) {
                Some(Slot::Parked(frame)) => return Self::validate(frame, sid, tag, dim),
                Some(Slot::Waiting(_)) => {
                    return Err(DuoramError::Internal(format!(
                        "two requests awaiting sid {sid:#018x} tag {tag:#04x}"
                    )));
                }
                None => {
                    let (tx, rx) = mpsc::channel();
                    slots.insert(key, Slot::Waiting(tx));
                    rx
                }
            }
        };
        match rx.recv_timeout(timeout) {
            Ok(frame) => Self::validate(frame, sid, tag, dim),
            Err(_) => {
                let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
                slots.remove(&key);
                Err(DuoramError::PeerTimeout(sid))
            }
        }
    }

    fn validate(frame: PeerFrame, sid: u64, tag: u8, dim: u32) -> Result<PeerFrame, DuoramError> {
        if frame.sid != sid || frame.tag != tag {
            return Err(DuoramError::SessionMismatch {
                want_sid: sid,
                want_tag: tag,
                got_sid: frame.sid,
                got_tag: frame.tag,
            });
        }
        if frame.dim() != dim || frame.v_part.len() as u32 != dim {
            return Err(DuoramError::DimMismatch {
                expected: dim,
                got: frame.dim(),
            });
        }
        Ok(frame)
    }
}

/// Ship one residual frame to the peer's ingress listener.
pub fn send_frame(peer: &str, frame: &PeerFrame, io_timeout: Duration) -> Result<(), DuoramError> {
    let mut sock = TcpStream::connect(peer)?;
    sock.set_write_timeout(Some(io_timeout))?;
    frame.write_to(&mut sock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::Ring31;
    use crate::wire::TAG_CROSS_01;

    fn frame(sid: u64, tag: u8, dim: usize) -> PeerFrame {
        PeerFrame {
            sid,
            tag,
            u_part: vec![Ring31::ONE; dim],
            v_part: vec![Ring31::ZERO; dim],
        }
    }

    #[test]
    fn test_parked_frame_is_claimed() {
        let router = PeerRouter::new();
        router.deliver(frame(9, TAG_CROSS_01, 4));
        let got = router
            .recv(9, TAG_CROSS_01, 4, Duration::from_millis(10))
            .unwrap();
        assert_eq!(got.sid, 9);
    }

    #[test]
    fn test_waiter_receives_late_frame() {
        let router = PeerRouter::new();
        let r2 = Arc::clone(&router);
        let handle = std::thread::spawn(move || {
            r2.recv(5, TAG_CROSS_01, 2, Duration::from_secs(2))
        });
        std::thread::sleep(Duration::from_millis(50));
        router.deliver(frame(5, TAG_CROSS_01, 2));
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_dim_mismatch_is_rejected() {
        let router = PeerRouter::new();
        router.deliver(frame(7, TAG_CROSS_01, 4));
        assert!(matches!(
            router.recv(7, TAG_CROSS_01, 8, Duration::from_millis(10)),
            Err(DuoramError::DimMismatch { .. })
        ));
    }

    #[test]
    fn test_timeout_clears_slot() {
        let router = PeerRouter::new();
        assert!(matches!(
            router.recv(1, TAG_CROSS_01, 1, Duration::from_millis(20)),
            Err(DuoramError::PeerTimeout(_))
        ));
        // The abandoned slot must not block a retry.
        router.deliver(frame(1, TAG_CROSS_01, 1));
        assert!(router
            .recv(1, TAG_CROSS_01, 1, Duration::from_millis(20))
            .is_ok());
    }
}
