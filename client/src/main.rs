//! Reference client binary: wires the session engine to a UDP stand-in transport and a console
//! I/O driver, then drives the bundle to completion under stakker's single-threaded runtime.

mod heartbeat;

use bus::{Bus, ConfigValue, Message};
use clap::Parser;
use codec::{PacketCodec, WireCodec};
use heartbeat::HeartbeatTimer;
use io::ConsoleDriver;
use runtime::logger::Logger;
use session::{NewSession, SessionEngine};
use stakker::{actor, ret_nop};
use std::net::UdpSocket;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;
use transport::UdpTransport;

/// Reference client for the session-layer tunnel.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
	/// Address of the reference transport peer, e.g. 127.0.0.1:4444.
	#[clap(long)]
	connect: std::net::SocketAddr,

	/// Upper bound on a single MSG payload plus its framing overhead.
	#[clap(long, default_value_t = session::DEFAULT_MAX_PACKET_LENGTH)]
	max_packet_length: usize,

	/// Client-supplied name advertised in the SYN.
	#[clap(long)]
	name: Option<String>,

	/// Request a one-way download of the named resource instead of an interactive stream.
	#[clap(long)]
	download: Option<String>,

	/// The download above is chunked (indexed MSG bodies carrying a payload) rather than a plain
	/// byte stream. Ignored unless `--download` is also given.
	#[clap(long)]
	chunked: bool,

	/// Run a shell command on the far end instead of attaching to an interactive stream.
	#[clap(long)]
	command: bool,

	/// Log verbosity.
	#[clap(long, default_value = "info")]
	log_level: log::LevelFilter,
}

fn main() -> ExitCode {
	let args = Args::parse();

	log::set_max_level(args.log_level);

	if log::set_logger(&Logger).is_err() {
		eprintln!("logger already initialized");
	}

	let socket = match connect(args.connect) {
		Ok(socket) => socket,
		Err(err) => {
			log::error!("Failed to connect to {}: {err}", args.connect);
			return ExitCode::FAILURE;
		}
	};

	let bus = Bus::new();
	let codec: Rc<dyn PacketCodec> = Rc::new(WireCodec);
	let engine = SessionEngine::install(bus.clone(), codec);
	bus.post(Message::Config {
		name: "max_packet_length".to_string(),
		value: ConfigValue::Int(args.max_packet_length as i64),
	});

	let session_id = engine.borrow_mut().create_session(NewSession {
		name: args.name,
		download: args.download,
		first_chunk: args.chunked.then_some(0),
		is_command: args.command,
	});

	let io_handle = io::wire(&bus, session_id, ConsoleDriver::new());

	let mut stakker = runtime::init();
	let core = &mut stakker;

	let transport = actor!(core, UdpTransport::init(bus.clone(), socket), ret_nop!());
	transport::wire(&bus, transport);

	let _heartbeat = actor!(core, HeartbeatTimer::init(bus.clone(), engine.clone(), io_handle, session_id, Duration::from_secs(1)), ret_nop!());

	let exit_bus = bus.clone();
	if runtime::exec(core, move || exit_bus.post(Message::Shutdown)).is_err() {
		return ExitCode::FAILURE;
	}

	if engine.borrow().fatal.is_some() {
		ExitCode::FAILURE
	} else {
		ExitCode::SUCCESS
	}
}

fn connect(peer: std::net::SocketAddr) -> std::io::Result<UdpSocket> {
	let bind = match peer {
		std::net::SocketAddr::V4(_) => "0.0.0.0:0",
		std::net::SocketAddr::V6(_) => "[::]:0",
	};

	let socket = UdpSocket::bind(bind)?;
	socket.connect(peer)?;

	Ok(socket)
}
