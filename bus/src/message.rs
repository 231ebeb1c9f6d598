/// The 16-bit session identifier shared by every component that talks about a session.
pub type SessionId = u16;

/// A recognized value carried by [`Message::Config`], mirroring the wire CONFIG message's
/// `type: INT|STRING` discriminant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
	Int(i64),
	Str(String),
}

/// The sum type carried over the [`crate::Bus`].
///
/// Each variant owns its payload; publishing a message transfers that payload to the bus, which
/// hands a shared read-only borrow to every subscriber for the duration of `post`. `CREATE_SESSION`
/// from the original message union is not a variant here — see the module-level docs.
#[derive(Debug, Clone)]
pub enum Message {
	/// A named runtime option, e.g. `max_packet_length`. Unrecognized names are ignored.
	Config { name: String, value: ConfigValue },
	/// The process has been asked to shut down. Every live session should be closed.
	Shutdown,
	/// A new session was created and assigned `session_id`.
	SessionCreated { session_id: SessionId },
	/// Advisory request to tear down `session_id` once its outgoing buffer drains.
	CloseSession { session_id: SessionId },
	/// `session_id` has been fully torn down and removed from the registry.
	SessionClosed { session_id: SessionId },
	/// Application bytes supplied by the I/O driver, to be queued on `session_id`.
	DataOut { session_id: SessionId, bytes: Vec<u8> },
	/// Application bytes received on `session_id`, for the I/O driver to render.
	DataIn { session_id: SessionId, bytes: Vec<u8> },
	/// One serialized frame to hand to the transport driver.
	PacketOut { bytes: Vec<u8> },
	/// One serialized frame received from the transport driver.
	PacketIn { bytes: Vec<u8> },
	/// Periodic wall-clock tick driving retransmission and session reaping.
	Heartbeat,
	/// An echo request that needs no session.
	PingRequest { payload: String },
	/// The answer to a [`Message::PingRequest`].
	PingResponse { payload: String },
}
