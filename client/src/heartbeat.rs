//! Self-rescheduling timer actor: on each tick it drains whatever the I/O driver has buffered
//! into DATA_OUT, runs the engine's heartbeat, and reschedules itself, the way the teacher's own
//! `Timers` reschedules its rekey and keepalive timers through `cx.after`.

use bus::{Bus, Message, SessionId};
use io::IoDriver;
use session::SessionEngine;
use stakker::{StopCause, CX};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub struct HeartbeatTimer {
	bus: Bus,
	engine: Rc<RefCell<SessionEngine>>,
	io: Rc<RefCell<dyn IoDriver>>,
	session_id: SessionId,
	interval: Duration,
}

impl HeartbeatTimer {
	pub fn init(
		cx: CX![],
		bus: Bus,
		engine: Rc<RefCell<SessionEngine>>,
		io: Rc<RefCell<dyn IoDriver>>,
		session_id: SessionId,
		interval: Duration,
	) -> Option<Self> {
		let this = Self { bus, engine, io, session_id, interval };
		this.schedule(cx);
		Some(this)
	}

	fn schedule(&self, cx: CX![]) {
		let actor = cx.access_actor().clone();
		let interval = self.interval;

		cx.after(interval, move |s| actor.apply(s, |this, cx| this.fire(cx)));
	}

	fn fire(&mut self, cx: CX![]) {
		if let Some(bytes) = self.io.borrow_mut().poll_input() {
			self.bus.post(Message::DataOut { session_id: self.session_id, bytes });
		}

		self.engine.borrow_mut().heartbeat(Instant::now());

		let exit_reason = {
			let engine = self.engine.borrow();

			if engine.fatal.is_some() {
				engine.fatal.clone()
			} else if engine.should_exit() {
				Some("all sessions drained".to_string())
			} else {
				None
			}
		};

		match exit_reason {
			Some(reason) => {
				log::info!("Shutting down: {reason}");
				cx.shutdown(StopCause::Stopped);
			}
			None => self.schedule(cx),
		}
	}
}
