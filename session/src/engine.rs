use bus::{Bus, ConfigValue, Kind, Message, SessionId};
use codec::{Options, Packet, PacketCodec, PacketType};
use rand::Rng;
use std::cell::RefCell;
use std::collections::HashMap;
use std::num::Wrapping;
use std::rc::Rc;
use std::time::Instant;

use crate::session::{Session, State};

/// session_id(2) + type(1) + seq(2) + ack(2) + len(2), matching `codec::WireCodec`'s normal-MSG
/// layout. If a different codec is plugged in with a larger header, outbound sends will simply
/// peek more bytes than fit and the transport driver will reject the frame; this constant exists
/// to keep well-behaved codecs from ever needing to split a send.
const NORMAL_HEADER_OVERHEAD: usize = 9;

const MAX_ID_ATTEMPTS: u32 = 64;

/// Parameters for a newly requested session.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
	pub name: Option<String>,
	pub download: Option<String>,
	/// `Some(n)` requests a chunked download starting at chunk `n`; `None` is a normal stream.
	pub first_chunk: Option<u32>,
	pub is_command: bool,
}

/// Owns every live session and the process-wide knobs (`is_shutdown`, `max_packet_length`).
///
/// Mutated only by its own methods, which are reached either directly (as in tests, which drive
/// the clock explicitly) or via bus subscriptions installed by [`SessionEngine::install`].
pub struct SessionEngine {
	bus: Bus,
	codec: Rc<dyn PacketCodec>,
	sessions: HashMap<SessionId, Session>,
	is_shutdown: bool,
	max_packet_length: usize,
	/// Set when a FIN arrives while a session is still in `NEW`: the peer rejected us outright.
	/// The runtime is expected to check this after each dispatch and exit non-zero.
	pub fatal: Option<String>,
}

impl SessionEngine {
	pub fn new(bus: Bus, codec: Rc<dyn PacketCodec>) -> Self {
		Self {
			bus,
			codec,
			sessions: HashMap::new(),
			is_shutdown: false,
			max_packet_length: crate::DEFAULT_MAX_PACKET_LENGTH,
			fatal: None,
		}
	}

	/// Construct an engine and subscribe it to every bus event it consumes. The returned handle
	/// is the shared owner production code and the runtime's timers hold onto.
	///
	/// `Shutdown` and `PacketIn` need special care: the engine is itself the sole subscriber of
	/// `CloseSession`, so a handler that is still holding this engine's `RefCell` borrow must not
	/// post `CloseSession` directly — that would re-enter `borrow_mut` and panic. Both handlers
	/// instead return the session id(s) to close, and the closure posts `CloseSession` only after
	/// the borrow has been dropped.
	pub fn install(bus: Bus, codec: Rc<dyn PacketCodec>) -> Rc<RefCell<Self>> {
		let engine = Rc::new(RefCell::new(Self::new(bus.clone(), codec)));

		{
			let engine = engine.clone();
			bus.subscribe(Kind::Config, move |message| {
				if let Message::Config { name, value } = message {
					engine.borrow_mut().handle_config(name.clone(), value.clone());
				}
			});
		}
		{
			let engine = engine.clone();
			let bus = bus.clone();
			bus.subscribe(Kind::Shutdown, move |_| {
				let ids = engine.borrow_mut().begin_shutdown();

				for session_id in ids {
					bus.post(Message::CloseSession { session_id });
				}
			});
		}
		{
			let engine = engine.clone();
			bus.subscribe(Kind::CloseSession, move |message| {
				if let Message::CloseSession { session_id } = message {
					engine.borrow_mut().handle_close_session(*session_id);
				}
			});
		}
		{
			let engine = engine.clone();
			bus.subscribe(Kind::DataOut, move |message| {
				if let Message::DataOut { session_id, bytes } = message {
					engine.borrow_mut().handle_data_out(*session_id, bytes.clone(), Instant::now());
				}
			});
		}
		{
			let engine = engine.clone();
			let bus = bus.clone();
			bus.subscribe(Kind::PacketIn, move |message| {
				if let Message::PacketIn { bytes } = message {
					let to_close = engine.borrow_mut().handle_packet_in(bytes, Instant::now());

					if let Some(session_id) = to_close {
						bus.post(Message::CloseSession { session_id });
					}
				}
			});
		}
		{
			let engine = engine.clone();
			bus.subscribe(Kind::PingRequest, move |message| {
				if let Message::PingRequest { payload } = message {
					engine.borrow_mut().handle_ping_request(payload.clone());
				}
			});
		}
		{
			let engine = engine.clone();
			bus.subscribe(Kind::Heartbeat, move |_| engine.borrow_mut().heartbeat(Instant::now()));
		}

		engine
	}

	/// Applies a recognized CONFIG option by name. Unknown names, or a value of the wrong shape,
	/// are ignored (logged, not an error).
	pub fn handle_config(&mut self, name: String, value: ConfigValue) {
		match (name.as_str(), value) {
			("max_packet_length", ConfigValue::Int(n)) if n > 0 => {
				self.max_packet_length = n as usize;
				log::info!("max_packet_length set to {n}");
			}
			("max_packet_length", _) => {
				log::warn!("Ignoring CONFIG max_packet_length: expected a positive integer");
			}
			(other, _) => log::trace!("Ignoring unrecognized CONFIG option {other:?}"),
		}
	}

	pub fn is_shutdown(&self) -> bool {
		self.is_shutdown
	}

	/// Whether the runtime may exit: shutdown was requested and every session has drained.
	pub fn should_exit(&self) -> bool {
		self.is_shutdown && self.sessions.is_empty()
	}

	pub fn session(&self, id: SessionId) -> Option<&Session> {
		self.sessions.get(&id)
	}

	pub fn session_count(&self) -> usize {
		self.sessions.len()
	}

	fn alloc_id(&self) -> SessionId {
		let mut rng = rand::thread_rng();

		for _ in 0..MAX_ID_ATTEMPTS {
			let id = rng.gen();

			if !self.sessions.contains_key(&id) {
				return id;
			}
		}

		(0..=u16::MAX).find(|id| !self.sessions.contains_key(id)).expect("session registry is full")
	}

	/// Synchronously allocates an id, inserts the session, and publishes SESSION_CREATED.
	pub fn create_session(&mut self, req: NewSession) -> SessionId {
		let id = self.alloc_id();
		let my_seq = Wrapping(rand::thread_rng().gen());

		let session = Session {
			id,
			state: State::New,
			my_seq,
			their_seq: Wrapping(0),
			options: Options::empty(),
			outgoing_data: Default::default(),
			name: req.name,
			download: req.download,
			download_first_chunk: req.first_chunk,
			download_current_chunk: req.first_chunk.unwrap_or(0),
			is_command: req.is_command,
			is_closed: false,
			last_transmit: None,
		};

		self.sessions.insert(id, session);
		self.bus.post(Message::SessionCreated { session_id: id });

		id
	}

	/// Latches `is_shutdown` and returns every currently live session id. The caller (see
	/// [`Self::install`]) posts `CLOSE_SESSION` for each after releasing this engine's borrow.
	pub fn begin_shutdown(&mut self) -> Vec<SessionId> {
		self.is_shutdown = true;

		self.sessions.keys().copied().collect()
	}

	pub fn handle_close_session(&mut self, session_id: SessionId) {
		match self.sessions.get_mut(&session_id) {
			Some(session) => session.is_closed = true,
			None => log::warn!("CLOSE_SESSION for unknown session {session_id}"),
		}
	}

	pub fn handle_data_out(&mut self, session_id: SessionId, bytes: Vec<u8>, now: Instant) {
		{
			let Some(session) = self.sessions.get_mut(&session_id) else {
				log::warn!("DATA_OUT for unknown session {session_id}");
				return;
			};

			if session.is_chunked() {
				log::warn!("DATA_OUT ignored for session {session_id}: it is a one-way chunked download");
				return;
			}

			session.outgoing_data.extend(bytes);
		}

		self.try_send(session_id, now);
	}

	/// Answers a PING_REQUEST by sending a wire PING to the peer; the reply to the bus's own
	/// `PING_REQUEST` is not synthesized locally. `PING_RESPONSE` is only ever posted once the
	/// peer's own PING actually comes back in through PACKET_IN (below).
	pub fn handle_ping_request(&mut self, payload: String) {
		let packet = Packet::Ping { session_id: 0, payload };
		let bytes = self.codec.serialize(&packet, Options::empty());

		self.bus.post(Message::PacketOut { bytes });
	}

	/// Entry point for PACKET_IN. Parses the header with no session context, resolves the
	/// session, re-parses with its negotiated options, and dispatches per the state table.
	///
	/// Returns the session id to post `CLOSE_SESSION` for, if the peer just closed it — see the
	/// note on [`Self::install`] for why this isn't posted from here directly.
	pub fn handle_packet_in(&mut self, bytes: &[u8], now: Instant) -> Option<SessionId> {
		let Ok((session_id, kind)) = self.codec.peek_header(bytes) else {
			log::warn!("Dropping unparseable packet");
			return None;
		};

		if kind == PacketType::Ping {
			match self.codec.parse(bytes, Options::empty()) {
				Ok(Packet::Ping { payload, .. }) => self.bus.post(Message::PingResponse { payload }),
				_ => log::warn!("Dropping malformed PING"),
			}
			return None;
		}

		let (options, state) = {
			let Some(session) = self.sessions.get(&session_id) else {
				log::warn!("Dropping packet for unknown session {session_id}");
				return None;
			};

			(session.options, session.state)
		};

		let packet = match self.codec.parse(bytes, options) {
			Ok(packet) => packet,
			Err(()) => {
				log::warn!("Dropping unparseable packet for session {session_id}");
				return None;
			}
		};

		match (state, packet) {
			(State::New, Packet::Syn { seq, chunked_download, .. }) => {
				self.on_syn_established(session_id, seq, chunked_download);
				None
			}
			(State::New, Packet::MsgNormal { .. }) | (State::New, Packet::MsgChunked { .. }) => {
				log::warn!("Ignoring MSG for session {session_id}: handshake is not complete");
				None
			}
			(State::New, Packet::Fin { reason, .. }) => {
				log::error!("Session {session_id} rejected by peer during handshake: {reason}");
				self.fatal = Some(reason);
				None
			}
			(_, Packet::Ping { .. }) => unreachable!("PING is intercepted above before a session lookup"),
			(State::Established, Packet::Syn { .. }) => {
				log::warn!("Ignoring duplicate SYN for established session {session_id}");
				None
			}
			(State::Established, Packet::MsgNormal { seq, ack, data, .. }) => {
				self.on_msg_normal(session_id, seq, ack, data, now);
				None
			}
			(State::Established, Packet::MsgChunked { chunk, data, .. }) => {
				self.on_msg_chunked(session_id, chunk, data, now);
				None
			}
			(State::Established, Packet::Fin { reason, .. }) => {
				log::error!("Session {session_id} closed by peer: {reason}");
				Some(session_id)
			}
		}
	}

	fn on_syn_established(&mut self, session_id: SessionId, seq: u16, chunked_download: bool) {
		let Some(session) = self.sessions.get_mut(&session_id) else { return };

		session.their_seq = Wrapping(seq);
		session.state = State::Established;
		session.options.set(Options::CHUNKED_DOWNLOAD, chunked_download);
		session.last_transmit = None;

		log::info!("Session {session_id} established, their_seq={seq:#06x}");
	}

	fn on_msg_normal(&mut self, session_id: SessionId, seq: u16, ack: u16, data: Vec<u8>, now: Instant) {
		let progressed;
		let inbound;

		{
			let Some(session) = self.sessions.get_mut(&session_id) else { return };

			let bytes_acked = (Wrapping(ack) - session.my_seq).0 as usize;

			if bytes_acked > session.outgoing_data.len() {
				log::warn!("Dropping MSG for session {session_id}: ACK {ack:#06x} is outside the window");
				return;
			}

			if seq != session.their_seq.0 {
				log::warn!("Dropping MSG for session {session_id}: SEQ {seq:#06x} != expected {:#06x}", session.their_seq.0);
				return;
			}

			session.consume_outgoing(bytes_acked);
			session.my_seq += Wrapping(bytes_acked as u16);
			session.their_seq += Wrapping(data.len() as u16);

			progressed = bytes_acked > 0 || !data.is_empty();

			if progressed {
				session.last_transmit = None;
			}

			inbound = (!data.is_empty()).then_some(data);
		}

		if let Some(bytes) = inbound {
			self.bus.post(Message::DataIn { session_id, bytes });
		}

		if progressed {
			self.try_send(session_id, now);
		}
	}

	fn on_msg_chunked(&mut self, session_id: SessionId, chunk: u32, data: Vec<u8>, now: Instant) {
		let matched;
		let inbound;

		{
			let Some(session) = self.sessions.get_mut(&session_id) else { return };

			matched = chunk == session.download_current_chunk;

			if !matched {
				log::warn!("Dropping chunk {chunk} for session {session_id}: expected {}", session.download_current_chunk);
				return;
			}

			session.download_current_chunk = session.download_current_chunk.wrapping_add(1);
			session.last_transmit = None;
			inbound = (!data.is_empty()).then_some(data);
		}

		if let Some(bytes) = inbound {
			self.bus.post(Message::DataIn { session_id, bytes });
		}

		self.try_send(session_id, now);
	}

	/// Emits a packet for `session_id` if the retransmit gate allows it. Because unacknowledged
	/// bytes are never removed from `outgoing_data`, this naturally retransmits on every call
	/// where nothing has been acknowledged since the last send.
	fn try_send(&mut self, session_id: SessionId, now: Instant) {
		let packet;
		let options;

		{
			let Some(session) = self.sessions.get_mut(&session_id) else { return };

			if !session.can_transmit(now) {
				return;
			}

			options = session.options;

			packet = match (session.state, session.is_chunked()) {
				(State::New, _) => Packet::Syn {
					session_id,
					seq: session.my_seq.0,
					name: session.name.clone(),
					download: session.download.clone(),
					is_command: session.is_command,
					chunked_download: session.is_chunked(),
				},
				(State::Established, true) => {
					Packet::MsgChunked { session_id, chunk: session.download_current_chunk, data: Vec::new() }
				}
				(State::Established, false) => {
					let limit = self.max_packet_length.saturating_sub(NORMAL_HEADER_OVERHEAD);
					let data = session.peek_outgoing(limit);

					Packet::MsgNormal { session_id, seq: session.my_seq.0, ack: session.their_seq.0, data }
				}
			};

			session.last_transmit = Some(now);
		}

		let bytes = self.codec.serialize(&packet, options);
		self.bus.post(Message::PacketOut { bytes });
	}

	/// Drives retransmission and reaps sessions that have closed and drained. Should be called
	/// roughly once a second by the runtime's timer.
	pub fn heartbeat(&mut self, now: Instant) {
		let ids: Vec<SessionId> = self.sessions.keys().copied().collect();

		for id in ids {
			if let Some(session) = self.sessions.get_mut(&id) {
				if session.outgoing_data.is_empty() {
					session.outgoing_data.shrink_to_fit();
				}
			}

			self.try_send(id, now);
		}

		let closed: Vec<SessionId> = self
			.sessions
			.iter()
			.filter(|(_, session)| session.is_closed && session.outgoing_data.is_empty())
			.map(|(&id, _)| id)
			.collect();

		for id in closed {
			let options = self.sessions.get(&id).map(|s| s.options).unwrap_or_default();
			let packet = Packet::Fin { session_id: id, reason: "Session closed".into() };
			let bytes = self.codec.serialize(&packet, options);

			self.bus.post(Message::PacketOut { bytes });
			self.sessions.remove(&id);
			self.bus.post(Message::SessionClosed { session_id: id });

			log::info!("Session {id} closed");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use codec::WireCodec;
	use std::cell::RefCell as StdRefCell;
	use std::rc::Rc as StdRc;
	use std::time::Duration;

	fn harness() -> (Bus, SessionEngine, StdRc<StdRefCell<Vec<Vec<u8>>>>, StdRc<StdRefCell<Vec<(SessionId, Vec<u8>)>>>) {
		let bus = Bus::new();
		let engine = SessionEngine::new(bus.clone(), StdRc::new(WireCodec));

		let packets_out = StdRc::new(StdRefCell::new(Vec::new()));
		{
			let packets_out = packets_out.clone();
			bus.subscribe(Kind::PacketOut, move |message| {
				if let Message::PacketOut { bytes } = message {
					packets_out.borrow_mut().push(bytes.clone());
				}
			});
		}

		let data_in = StdRc::new(StdRefCell::new(Vec::new()));
		{
			let data_in = data_in.clone();
			bus.subscribe(Kind::DataIn, move |message| {
				if let Message::DataIn { session_id, bytes } = message {
					data_in.borrow_mut().push((*session_id, bytes.clone()));
				}
			});
		}

		(bus, engine, packets_out, data_in)
	}

	fn inject(engine: &mut SessionEngine, packet: &Packet, options: Options, now: Instant) {
		let bytes = WireCodec.serialize(packet, options);
		let _ = engine.handle_packet_in(&bytes, now);
	}

	#[test]
	fn handshake_establishes_session() {
		let (_bus, mut engine, packets_out, _data_in) = harness();
		let t0 = Instant::now();

		let id = engine.create_session(NewSession { name: Some("t".into()), ..Default::default() });
		engine.heartbeat(t0);

		assert_eq!(packets_out.borrow().len(), 1);
		let sent = WireCodec.parse(&packets_out.borrow()[0], Options::empty()).unwrap();
		let my_seq = match sent {
			Packet::Syn { session_id, seq, .. } => {
				assert_eq!(session_id, id);
				seq
			}
			_ => panic!("expected a SYN"),
		};

		let reply = Packet::Syn { session_id: id, seq: 0x1000, name: None, download: None, is_command: false, chunked_download: false };
		inject(&mut engine, &reply, Options::empty(), t0);

		let session = engine.session(id).unwrap();
		assert_eq!(session.state, State::Established);
		assert_eq!(session.their_seq.0, 0x1000);
		assert_eq!(session.my_seq.0, my_seq);
	}

	#[test]
	fn data_exchange_round_trips() {
		let (_bus, mut engine, packets_out, data_in) = harness();
		let t0 = Instant::now();

		let id = engine.create_session(NewSession::default());
		engine.heartbeat(t0);

		let isn = match WireCodec.parse(&packets_out.borrow()[0], Options::empty()).unwrap() {
			Packet::Syn { seq, .. } => seq,
			_ => panic!("expected a SYN"),
		};

		inject(
			&mut engine,
			&Packet::Syn { session_id: id, seq: 0x1000, name: None, download: None, is_command: false, chunked_download: false },
			Options::empty(),
			t0,
		);

		engine.handle_data_out(id, b"hello".to_vec(), t0);

		let sent = packets_out.borrow().last().cloned().unwrap();
		match WireCodec.parse(&sent, Options::empty()).unwrap() {
			Packet::MsgNormal { seq, ack, data, .. } => {
				assert_eq!(seq, isn);
				assert_eq!(ack, 0x1000);
				assert_eq!(data, b"hello");
			}
			_ => panic!("expected a normal MSG"),
		}

		let ack = isn.wrapping_add(5);
		inject(
			&mut engine,
			&Packet::MsgNormal { session_id: id, seq: 0x1000, ack, data: b"world".to_vec() },
			Options::empty(),
			t0,
		);

		assert_eq!(data_in.borrow().as_slice(), &[(id, b"world".to_vec())]);

		let session = engine.session(id).unwrap();
		assert!(session.outgoing_data.is_empty());
		assert_eq!(session.my_seq.0, ack);
		assert_eq!(session.their_seq.0, 0x1005);
	}

	#[test]
	fn unacked_data_is_retransmitted_after_the_gate() {
		let (_bus, mut engine, packets_out, _data_in) = harness();
		let t0 = Instant::now();

		let id = engine.create_session(NewSession::default());
		engine.heartbeat(t0);
		inject(
			&mut engine,
			&Packet::Syn { session_id: id, seq: 0x1000, name: None, download: None, is_command: false, chunked_download: false },
			Options::empty(),
			t0,
		);

		engine.handle_data_out(id, b"a".to_vec(), t0);
		assert_eq!(packets_out.borrow().len(), 2);

		engine.heartbeat(t0 + Duration::from_millis(500));
		assert_eq!(packets_out.borrow().len(), 2, "gate should still be closed at 0.5s");

		engine.heartbeat(t0 + Duration::from_millis(1100));
		assert_eq!(packets_out.borrow().len(), 3, "gate should be open past 1s and retransmit");

		let first = WireCodec.parse(&packets_out.borrow()[1], Options::empty()).unwrap();
		let last = WireCodec.parse(&packets_out.borrow()[2], Options::empty()).unwrap();
		assert_eq!(first, last, "retransmission resends identical unacknowledged bytes");
	}

	#[test]
	fn bad_ack_is_dropped() {
		let (_bus, mut engine, packets_out, _data_in) = harness();
		let t0 = Instant::now();

		let id = engine.create_session(NewSession::default());
		engine.heartbeat(t0);
		let isn = match WireCodec.parse(&packets_out.borrow()[0], Options::empty()).unwrap() {
			Packet::Syn { seq, .. } => seq,
			_ => unreachable!(),
		};
		inject(
			&mut engine,
			&Packet::Syn { session_id: id, seq: 0x1000, name: None, download: None, is_command: false, chunked_download: false },
			Options::empty(),
			t0,
		);

		engine.handle_data_out(id, b"ab".to_vec(), t0);

		inject(
			&mut engine,
			&Packet::MsgNormal { session_id: id, seq: 0x1000, ack: isn.wrapping_add(99), data: vec![] },
			Options::empty(),
			t0,
		);

		let session = engine.session(id).unwrap();
		assert_eq!(session.outgoing_data.len(), 2);
		assert_eq!(session.my_seq.0, isn);
	}

	#[test]
	fn chunked_download_advances_and_rejects_out_of_order_chunks() {
		let (_bus, mut engine, packets_out, data_in) = harness();
		let t0 = Instant::now();

		let id = engine.create_session(NewSession { download: Some("f".into()), first_chunk: Some(0), ..Default::default() });
		engine.heartbeat(t0);

		match WireCodec.parse(&packets_out.borrow()[0], Options::empty()).unwrap() {
			Packet::Syn { chunked_download, .. } => assert!(chunked_download),
			_ => panic!("expected a SYN"),
		}

		inject(
			&mut engine,
			&Packet::Syn { session_id: id, seq: 0, name: None, download: None, is_command: false, chunked_download: true },
			Options::empty(),
			t0,
		);

		let chunked_opts = Options::CHUNKED_DOWNLOAD;
		inject(&mut engine, &Packet::MsgChunked { session_id: id, chunk: 0, data: b"A".to_vec() }, chunked_opts, t0);

		assert_eq!(data_in.borrow().as_slice(), &[(id, b"A".to_vec())]);
		assert_eq!(engine.session(id).unwrap().download_current_chunk, 1);

		let before = packets_out.borrow().len();
		inject(&mut engine, &Packet::MsgChunked { session_id: id, chunk: 5, data: b"X".to_vec() }, chunked_opts, t0);

		assert_eq!(data_in.borrow().len(), 1, "out-of-order chunk must not produce DATA_IN");
		assert_eq!(engine.session(id).unwrap().download_current_chunk, 1);
		assert_eq!(packets_out.borrow().len(), before, "rejected chunk does not trigger a poll");
	}

	#[test]
	fn shutdown_drains_and_closes_every_session() {
		let bus = Bus::new();
		let engine = SessionEngine::install(bus.clone(), StdRc::new(WireCodec));
		let t0 = Instant::now();

		let packets_out = StdRc::new(StdRefCell::new(Vec::new()));
		{
			let packets_out = packets_out.clone();
			bus.subscribe(Kind::PacketOut, move |message| {
				if let Message::PacketOut { bytes } = message {
					packets_out.borrow_mut().push(bytes.clone());
				}
			});
		}

		let closed = StdRc::new(StdRefCell::new(Vec::new()));
		{
			let closed = closed.clone();
			bus.subscribe(Kind::CloseSession, move |message| {
				if let Message::CloseSession { session_id } = message {
					closed.borrow_mut().push(*session_id);
				}
			});
		}

		let (a, b) = {
			let mut engine = engine.borrow_mut();
			let a = engine.create_session(NewSession::default());
			let b = engine.create_session(NewSession::default());
			engine.heartbeat(t0);
			(a, b)
		};

		for id in [a, b] {
			inject(
				&mut engine.borrow_mut(),
				&Packet::Syn { session_id: id, seq: 0x2000, name: None, download: None, is_command: false, chunked_download: false },
				Options::empty(),
				t0,
			);
		}
		packets_out.borrow_mut().clear();

		bus.post(Message::Shutdown);

		// The CLOSE_SESSION subscription above proves the engine actually posted on the bus,
		// rather than mutating sessions through a direct internal call no one else observes.
		let mut closed_ids = closed.borrow().clone();
		closed_ids.sort();
		let mut expected = vec![a, b];
		expected.sort();
		assert_eq!(closed_ids, expected);

		assert!(engine.borrow().session(a).unwrap().is_closed);
		assert!(engine.borrow().session(b).unwrap().is_closed);
		assert!(!engine.borrow().should_exit(), "sessions haven't drained yet");

		engine.borrow_mut().heartbeat(t0 + Duration::from_millis(1100));

		assert_eq!(engine.borrow().session_count(), 0);
		assert!(engine.borrow().should_exit());

		let fin_count = packets_out
			.borrow()
			.iter()
			.filter(|bytes| matches!(WireCodec.parse(bytes, Options::empty()), Ok(Packet::Fin { .. })))
			.count();
		assert_eq!(fin_count, 2, "one FIN per closed session");
	}
}
