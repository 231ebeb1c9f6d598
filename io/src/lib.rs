//! Produces DATA_OUT from whatever the local user is typing and renders DATA_IN as it arrives.
//!
//! A real deployment would drive a pty and a spawned shell; here a plain console is the
//! reference, wired to one session at a time.

use bus::{Bus, Kind, Message, SessionId};
use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Produces outbound application bytes and consumes inbound ones.
pub trait IoDriver {
	/// Returns the next chunk of user-supplied bytes, if any are ready. Must not block.
	fn poll_input(&mut self) -> Option<Vec<u8>>;
	/// Displays bytes received from the peer.
	fn render_output(&mut self, bytes: &[u8]);
}

/// Reads stdin on a background thread (since there is no portable non-blocking stdin) and
/// writes replies straight to stdout.
pub struct ConsoleDriver {
	input: Receiver<Vec<u8>>,
}

impl ConsoleDriver {
	pub fn new() -> Self {
		let (tx, rx) = mpsc::channel();

		thread::spawn(move || {
			let stdin = io::stdin();
			let mut handle = stdin.lock();
			let mut buf = [0u8; 4096];

			loop {
				match handle.read(&mut buf) {
					Ok(0) => break,
					Ok(n) if tx.send(buf[..n].to_vec()).is_err() => break,
					Ok(_) => {}
					Err(err) => {
						log::error!("Failed to read stdin: {err}");
						break;
					}
				}
			}
		});

		Self { input: rx }
	}
}

impl Default for ConsoleDriver {
	fn default() -> Self {
		Self::new()
	}
}

impl IoDriver for ConsoleDriver {
	fn poll_input(&mut self) -> Option<Vec<u8>> {
		match self.input.try_recv() {
			Ok(bytes) => Some(bytes),
			Err(TryRecvError::Empty) => None,
			Err(TryRecvError::Disconnected) => None,
		}
	}

	fn render_output(&mut self, bytes: &[u8]) {
		let mut stdout = io::stdout();

		if stdout.write_all(bytes).and_then(|_| stdout.flush()).is_err() {
			log::error!("Failed to write to stdout");
		}
	}
}

/// Subscribes `driver` to DATA_IN for `session_id` so its bytes are rendered as they arrive, and
/// returns the shared handle so the runtime can separately poll it for input on a timer tick.
pub fn wire(bus: &Bus, session_id: SessionId, driver: impl IoDriver + 'static) -> Rc<RefCell<dyn IoDriver>> {
	let driver: Rc<RefCell<dyn IoDriver>> = Rc::new(RefCell::new(driver));

	{
		let driver = driver.clone();
		bus.subscribe(Kind::DataIn, move |message| {
			if let Message::DataIn { session_id: id, bytes } = message {
				if *id == session_id {
					driver.borrow_mut().render_output(bytes);
				}
			}
		});
	}

	driver
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::RefCell;
	use std::rc::Rc;

	struct RecordingDriver {
		rendered: Rc<RefCell<Vec<Vec<u8>>>>,
	}

	impl IoDriver for RecordingDriver {
		fn poll_input(&mut self) -> Option<Vec<u8>> {
			None
		}

		fn render_output(&mut self, bytes: &[u8]) {
			self.rendered.borrow_mut().push(bytes.to_vec());
		}
	}

	#[test]
	fn renders_only_its_own_session() {
		let bus = Bus::new();
		let rendered = Rc::new(RefCell::new(Vec::new()));

		let _ = wire(&bus, 7, RecordingDriver { rendered: rendered.clone() });

		bus.post(Message::DataIn { session_id: 7, bytes: b"hi".to_vec() });
		bus.post(Message::DataIn { session_id: 8, bytes: b"nope".to_vec() });

		assert_eq!(rendered.borrow().as_slice(), &[b"hi".to_vec()]);
	}
}
