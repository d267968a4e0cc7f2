//! Two-server distributed oblivious RAM over the ring Z/2^31Z.
//!
//! The logical database never exists anywhere: each of two non-colluding
//! parties holds one additive share of it. A coordinator reads or writes by
//! splitting a scaled standard-basis vector into two uniformly random share
//! vectors, and the parties cooperatively reconstruct additive shares of the
//! inner product of the database with the selector, masked by Du-Atallah
//! correlated randomness from a pairing server.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`ring`] | Fixed-modulus 2^31 arithmetic and vector helpers |
//! | [`triple`] | Du-Atallah correlated randomness |
//! | [`wire`] | Big-endian framing shared by every protocol socket |
//! | [`pairing`] | Preprocessing server pairing two requesters per triple |
//! | [`party`] | A party node: share storage plus the online protocol |
//! | [`coordinator`] | Client-side share splitting and reconstruction |

pub mod coordinator;
pub mod error;
pub mod pairing;
pub mod party;
pub mod peer;
pub mod ring;
pub mod store;
pub mod triple;
pub mod wire;

// Re-export commonly used types for convenience
pub use coordinator::Coordinator;
pub use error::DuoramError;
pub use pairing::PairingServer;
pub use party::{PartyConfig, PartyNode, Role};
pub use ring::Ring31;
pub use store::ShareStore;
pub use triple::TripleHalf;
