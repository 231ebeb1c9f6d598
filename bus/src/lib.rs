//! A synchronous, single-threaded, typed publish/subscribe hub.
//!
//! This plays the role the teacher gives to inter-actor `Fwd` channels, except delivery here is
//! immediate and depth-first rather than deferred to the next turn of the event loop: a `post`
//! call invokes every subscriber before returning, and subscribers may themselves `post` further
//! messages. There is exactly one thread, so no locking is needed anywhere in this crate.

use std::cell::RefCell;
use std::rc::Rc;

mod message;

pub use message::{ConfigValue, Message, SessionId};

/// The closed set of message kinds a [`Bus`] can dispatch.
///
/// `CREATE_SESSION` from the original design is deliberately absent: it carried a mutable
/// out-field (the allocated session id) that the bus had to thread back to the caller, which
/// broke the fire-and-forget contract every other message keeps. Session creation is a direct
/// method call on the registry instead; see the `session` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Kind {
	Config,
	Shutdown,
	SessionCreated,
	CloseSession,
	SessionClosed,
	DataOut,
	DataIn,
	PacketOut,
	PacketIn,
	Heartbeat,
	PingRequest,
	PingResponse,
}

impl Kind {
	const COUNT: usize = 12;

	fn of(message: &Message) -> Self {
		match message {
			Message::Config { .. } => Kind::Config,
			Message::Shutdown => Kind::Shutdown,
			Message::SessionCreated { .. } => Kind::SessionCreated,
			Message::CloseSession { .. } => Kind::CloseSession,
			Message::SessionClosed { .. } => Kind::SessionClosed,
			Message::DataOut { .. } => Kind::DataOut,
			Message::DataIn { .. } => Kind::DataIn,
			Message::PacketOut { .. } => Kind::PacketOut,
			Message::PacketIn { .. } => Kind::PacketIn,
			Message::Heartbeat => Kind::Heartbeat,
			Message::PingRequest { .. } => Kind::PingRequest,
			Message::PingResponse { .. } => Kind::PingResponse,
		}
	}
}

type Handler = Rc<RefCell<dyn FnMut(&Message)>>;

#[derive(Default)]
struct Inner {
	handlers: [Vec<Handler>; Kind::COUNT],
}

/// The message bus itself. Cheaply cloneable (it is a thin `Rc` wrapper) so every component
/// that needs to publish or subscribe can hold its own handle.
#[derive(Clone, Default)]
pub struct Bus {
	inner: Rc<RefCell<Inner>>,
}

impl Bus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `callback` to run whenever a message of `kind` is posted.
	///
	/// New subscribers are inserted at the head of the list for their kind, so among handlers of
	/// the same kind, delivery order is last-subscribed-first. Callers must not depend on any
	/// ordering relationship between handlers of *different* kinds.
	pub fn subscribe(&self, kind: Kind, callback: impl FnMut(&Message) + 'static) {
		let handler: Handler = Rc::new(RefCell::new(callback));

		self.inner.borrow_mut().handlers[kind as usize].insert(0, handler);
	}

	/// Synchronously invoke every handler subscribed to `message`'s kind, in subscription order.
	///
	/// The list of handlers is snapshotted before dispatch begins: a handler that subscribes a
	/// new handler for the same kind while `post` is running will not have that new handler
	/// invoked until a later `post` call. Handlers themselves may call `post` re-entrantly; this
	/// produces depth-first delivery, matching the source's callback-recursion model.
	pub fn post(&self, message: Message) {
		let kind = Kind::of(&message);

		let handlers = self.inner.borrow().handlers[kind as usize].clone();

		if handlers.is_empty() {
			log::trace!("No subscribers for {kind:?}, dropping message");
		}

		for handler in handlers {
			(handler.borrow_mut())(&message);
		}
	}
}

impl std::fmt::Debug for Bus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Bus").finish_non_exhaustive()
	}
}
