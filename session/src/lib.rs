//! The per-tunnel reliability and multiplexing state machine: handshake, sequence/ACK
//! arithmetic over a 16-bit modular space, retransmission by non-consumption of unacknowledged
//! bytes, and the chunked-download one-way mode. Wired to the rest of the process only through
//! [`bus::Bus`] and a [`codec::PacketCodec`].

mod engine;
mod session;

pub use engine::{NewSession, SessionEngine};
pub use session::{Session, State};

/// A session may transmit only after this much time has passed since its last transmission.
pub const RETRANSMIT_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

/// Default ceiling on the size of one outbound packet's worth of application bytes.
pub const DEFAULT_MAX_PACKET_LENGTH: usize = 10_000;
