use bus::SessionId;
use utils::error::*;

/// The wire discriminant carried in every packet's third byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
	Syn = 0,
	Msg = 1,
	Fin = 2,
	Ping = 3,
}

impl PacketType {
	pub(crate) fn from_byte(byte: u8) -> Result<Self> {
		match byte {
			0 => Ok(PacketType::Syn),
			1 => Ok(PacketType::Msg),
			2 => Ok(PacketType::Fin),
			3 => Ok(PacketType::Ping),
			other => Err(log::warn!("Unknown packet type {other}")),
		}
	}
}

/// One frame of the session-layer protocol.
///
/// MSG is split into `MsgNormal` and `MsgChunked` here rather than carrying both fields in one
/// variant, since a given session's negotiated options fix which shape it will ever see; callers
/// shouldn't have to check for a chunk index on a normal stream or vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
	/// Opens a session. `seq` is the sender's initial sequence number.
	Syn {
		session_id: SessionId,
		seq: u16,
		name: Option<String>,
		download: Option<String>,
		is_command: bool,
		chunked_download: bool,
	},
	/// One window's worth of a two-way stream: `data` starting at `seq`, acknowledging up to `ack`.
	MsgNormal { session_id: SessionId, seq: u16, ack: u16, data: Vec<u8> },
	/// One indexed chunk of a one-way chunked download.
	MsgChunked { session_id: SessionId, chunk: u32, data: Vec<u8> },
	/// Closes a session, carrying a human-readable reason.
	Fin { session_id: SessionId, reason: String },
	/// A session-less liveness echo.
	Ping { session_id: SessionId, payload: String },
}

impl Packet {
	pub fn session_id(&self) -> SessionId {
		match self {
			Packet::Syn { session_id, .. }
			| Packet::MsgNormal { session_id, .. }
			| Packet::MsgChunked { session_id, .. }
			| Packet::Fin { session_id, .. }
			| Packet::Ping { session_id, .. } => *session_id,
		}
	}

	pub fn kind(&self) -> PacketType {
		match self {
			Packet::Syn { .. } => PacketType::Syn,
			Packet::MsgNormal { .. } | Packet::MsgChunked { .. } => PacketType::Msg,
			Packet::Fin { .. } => PacketType::Fin,
			Packet::Ping { .. } => PacketType::Ping,
		}
	}
}
