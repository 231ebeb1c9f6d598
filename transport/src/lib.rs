//! Carries PACKET_OUT/PACKET_IN across an actual socket.
//!
//! The real carrier (DNS query/response pairs, with payload bytes folded into TXT/MX/CNAME/A/AAAA
//! labels) is out of scope. [`UdpTransport`] stands in for it: a datagram socket to a fixed peer,
//! wired into the bus the same way a DNS resolver driver would be.

use bus::{Bus, Kind, Message};
use runtime::Io;
use stakker::{fwd_to, CX};
use std::net::UdpSocket;
use utils::error::*;

/// Forwards PACKET_OUT to a connected UDP socket and incoming datagrams back as PACKET_IN.
///
/// A stakker actor, not an `Rc<RefCell<..>>` like [`bus::Bus`] and the session engine: its job is
/// exactly the asynchronous, readiness-driven I/O the teacher's own actors (`Wireguard`, DNS
/// `Resolver`) are built around, so it keeps their shape rather than the bus's synchronous one.
pub struct UdpTransport {
	io: Io<UdpSocket>,
	bus: Bus,
}

impl UdpTransport {
	/// Connects to `peer` and subscribes to PACKET_OUT so every frame the session engine emits
	/// is sent immediately.
	pub fn init(cx: CX![], bus: Bus, socket: UdpSocket) -> Option<Self> {
		socket.set_nonblocking(true).ok_or(|err| log::error!("Failed to set socket non-blocking: {err}"))?;

		let read_fwd = fwd_to!([cx], recv() as (Vec<u8>));
		let io = Io::new(socket, read_fwd);

		Some(Self { io, bus })
	}

	fn recv(&mut self, _cx: CX![], bytes: Vec<u8>) {
		log::trace!("Received {} byte(s) from the carrier", bytes.len());
		self.bus.post(Message::PacketIn { bytes });
	}

	pub fn send(&mut self, _cx: CX![], bytes: Vec<u8>) {
		if self.io.write(bytes).is_err() {
			log::error!("Failed to send packet to the carrier");
		}
	}
}

/// Subscribes `transport` to PACKET_OUT on `bus`. Kept separate from `init` so the subscription
/// closure can hold an owned `ActorOwn` handle without `UdpTransport` needing to know about the
/// bus's subscription API at construction time.
pub fn wire(bus: &Bus, transport: stakker::ActorOwn<UdpTransport>) {
	bus.subscribe(Kind::PacketOut, move |message| {
		if let Message::PacketOut { bytes } = message {
			stakker::call!([transport], send(bytes.clone()));
		}
	});
}
