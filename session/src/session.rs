use bus::SessionId;
use codec::Options;
use std::collections::VecDeque;
use std::num::Wrapping;
use std::time::Instant;

/// A session's position in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	New,
	Established,
}

/// One live tunnel session.
#[derive(Debug)]
pub struct Session {
	pub id: SessionId,
	pub state: State,
	pub my_seq: Wrapping<u16>,
	pub their_seq: Wrapping<u16>,
	pub options: Options,
	pub outgoing_data: VecDeque<u8>,
	pub name: Option<String>,
	pub download: Option<String>,
	/// `Some(n)` puts the session in chunked-download mode starting at chunk `n`; `None` is a
	/// normal two-way stream. This replaces the source's "zero means unset" sentinel on a raw
	/// integer, which collided with chunk 0 being a legitimate starting point.
	pub download_first_chunk: Option<u32>,
	pub download_current_chunk: u32,
	pub is_command: bool,
	pub is_closed: bool,
	pub last_transmit: Option<Instant>,
}

impl Session {
	pub fn is_chunked(&self) -> bool {
		self.download_first_chunk.is_some()
	}

	/// Whether the retransmit gate allows a send right now.
	pub fn can_transmit(&self, now: Instant) -> bool {
		match self.last_transmit {
			None => true,
			Some(t) => now.saturating_duration_since(t) > crate::RETRANSMIT_DELAY,
		}
	}

	/// Copy up to `limit` unacknowledged bytes from the front of the outgoing buffer, without
	/// removing them. Removal happens only once the peer ACKs them.
	pub fn peek_outgoing(&self, limit: usize) -> Vec<u8> {
		self.outgoing_data.iter().take(limit).copied().collect()
	}

	pub fn consume_outgoing(&mut self, count: usize) {
		self.outgoing_data.drain(..count.min(self.outgoing_data.len()));
	}
}
