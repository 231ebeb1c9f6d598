//! The wire framing contract the session engine is built against.
//!
//! The actual DNS carrier (TXT/MX/CNAME/A/AAAA label encoding, resolver I/O) is out of scope;
//! what's defined here is the private contract between a client and its server for the bytes
//! that ride *inside* one carrier round trip. [`WireCodec`] is a reference implementation of
//! that contract, simple enough to drive the engine end to end in tests.

use bus::SessionId;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};
use utils::error::*;

mod options;
mod packet;

pub use options::Options;
pub use packet::{Packet, PacketType};

/// Serializes and parses the four packet kinds the session engine speaks.
///
/// `options` controls variable header shape — in this contract, solely whether a MSG packet's
/// body is a chunk index or a seq/ack pair, matching the bit negotiated in the SYN exchange.
pub trait PacketCodec {
	fn serialize(&self, packet: &Packet, options: Options) -> Vec<u8>;
	fn parse(&self, bytes: &[u8], options: Options) -> Result<Packet>;

	/// Read just enough of `bytes` to learn the packet's type and session id, without
	/// committing to a body shape. Used by the engine's first inbound pass, since the session
	/// (and therefore its negotiated `options`) isn't known yet at that point.
	fn peek_header(&self, bytes: &[u8]) -> Result<(SessionId, PacketType)>;
}

/// A simple length-prefixed binary framing. Not a DNS label encoder — see the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCodec;

fn read_string(r: &mut impl Read) -> Result<String> {
	let len = r.read_u8().map_err(|_| log::warn!("Truncated string length"))?;

	let mut buf = vec![0u8; len as usize];

	r.read_exact(&mut buf).map_err(|_| log::warn!("Truncated string body"))?;

	String::from_utf8(buf).map_err(|_| log::warn!("String body is not valid UTF-8"))
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
	let bytes = s.as_bytes();
	let len = bytes.len().min(u8::MAX as usize);

	buf.write_u8(len as u8).expect("writing to a Vec cannot fail");
	buf.extend_from_slice(&bytes[..len]);
}

impl PacketCodec for WireCodec {
	fn peek_header(&self, bytes: &[u8]) -> Result<(SessionId, PacketType)> {
		let mut r = Cursor::new(bytes);

		let session_id = r.read_u16::<BigEndian>().map_err(|_| log::warn!("Packet too short to contain a header"))?;
		let kind = PacketType::from_byte(r.read_u8().map_err(|_| log::warn!("Packet too short to contain a header"))?)?;

		Ok((session_id, kind))
	}

	fn serialize(&self, packet: &Packet, options: Options) -> Vec<u8> {
		let mut buf = Vec::with_capacity(32);

		match packet {
			Packet::Syn { session_id, seq, name, download, is_command, chunked_download } => {
				buf.write_u16::<BigEndian>(*session_id).unwrap();
				buf.write_u8(PacketType::Syn as u8).unwrap();
				buf.write_u16::<BigEndian>(*seq).unwrap();

				let mut syn_options = Options::empty();
				syn_options.set(Options::NAME, name.is_some());
				syn_options.set(Options::DOWNLOAD, download.is_some());
				syn_options.set(Options::CHUNKED_DOWNLOAD, *chunked_download);
				syn_options.set(Options::COMMAND, *is_command);

				buf.write_u16::<BigEndian>(syn_options.bits()).unwrap();

				if let Some(name) = name {
					write_string(&mut buf, name);
				}

				if let Some(download) = download {
					write_string(&mut buf, download);
				}
			}

			Packet::MsgChunked { session_id, chunk, data } => {
				buf.write_u16::<BigEndian>(*session_id).unwrap();
				buf.write_u8(PacketType::Msg as u8).unwrap();
				buf.write_u32::<BigEndian>(*chunk).unwrap();
				buf.write_u16::<BigEndian>(data.len().min(u16::MAX as usize) as u16).unwrap();
				buf.extend_from_slice(data);
			}

			Packet::MsgNormal { session_id, seq, ack, data } => {
				buf.write_u16::<BigEndian>(*session_id).unwrap();
				buf.write_u8(PacketType::Msg as u8).unwrap();
				buf.write_u16::<BigEndian>(*seq).unwrap();
				buf.write_u16::<BigEndian>(*ack).unwrap();
				buf.write_u16::<BigEndian>(data.len().min(u16::MAX as usize) as u16).unwrap();
				buf.extend_from_slice(data);
			}

			Packet::Fin { session_id, reason } => {
				buf.write_u16::<BigEndian>(*session_id).unwrap();
				buf.write_u8(PacketType::Fin as u8).unwrap();
				write_string(&mut buf, reason);
			}

			Packet::Ping { session_id, payload } => {
				buf.write_u16::<BigEndian>(*session_id).unwrap();
				buf.write_u8(PacketType::Ping as u8).unwrap();
				write_string(&mut buf, payload);
			}
		}

		let _ = options;
		buf
	}

	fn parse(&self, bytes: &[u8], options: Options) -> Result<Packet> {
		let mut r = Cursor::new(bytes);

		let session_id = r.read_u16::<BigEndian>().map_err(|_| log::warn!("Packet too short to contain a header"))?;
		let kind = PacketType::from_byte(r.read_u8().map_err(|_| log::warn!("Packet too short to contain a header"))?)?;

		match kind {
			PacketType::Syn => {
				let seq = r.read_u16::<BigEndian>().map_err(|_| log::warn!("Truncated SYN"))?;
				let syn_options = Options::from_bits_truncate(r.read_u16::<BigEndian>().map_err(|_| log::warn!("Truncated SYN"))?);

				let name = syn_options.contains(Options::NAME).then(|| read_string(&mut r)).transpose()?;
				let download = syn_options.contains(Options::DOWNLOAD).then(|| read_string(&mut r)).transpose()?;

				Ok(Packet::Syn {
					session_id,
					seq,
					name,
					download,
					is_command: syn_options.contains(Options::COMMAND),
					chunked_download: syn_options.contains(Options::CHUNKED_DOWNLOAD),
				})
			}

			PacketType::Msg if options.contains(Options::CHUNKED_DOWNLOAD) => {
				let chunk = r.read_u32::<BigEndian>().map_err(|_| log::warn!("Truncated chunked MSG"))?;
				let len = r.read_u16::<BigEndian>().map_err(|_| log::warn!("Truncated chunked MSG"))?;

				let mut data = vec![0u8; len as usize];
				r.read_exact(&mut data).map_err(|_| log::warn!("Truncated chunked MSG payload"))?;

				Ok(Packet::MsgChunked { session_id, chunk, data })
			}

			PacketType::Msg => {
				let seq = r.read_u16::<BigEndian>().map_err(|_| log::warn!("Truncated MSG"))?;
				let ack = r.read_u16::<BigEndian>().map_err(|_| log::warn!("Truncated MSG"))?;
				let len = r.read_u16::<BigEndian>().map_err(|_| log::warn!("Truncated MSG"))?;

				let mut data = vec![0u8; len as usize];
				r.read_exact(&mut data).map_err(|_| log::warn!("Truncated MSG payload"))?;

				Ok(Packet::MsgNormal { session_id, seq, ack, data })
			}

			PacketType::Fin => {
				let reason = read_string(&mut r)?;

				Ok(Packet::Fin { session_id, reason })
			}

			PacketType::Ping => {
				let payload = read_string(&mut r)?;

				Ok(Packet::Ping { session_id, payload })
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn syn_round_trips() {
		let codec = WireCodec;
		let packet = Packet::Syn {
			session_id: 0xBEEF,
			seq: 0x1234,
			name: Some("shell".into()),
			download: None,
			is_command: true,
			chunked_download: false,
		};

		let bytes = codec.serialize(&packet, Options::empty());
		let parsed = codec.parse(&bytes, Options::empty()).unwrap();

		match parsed {
			Packet::Syn { session_id, seq, name, is_command, chunked_download, .. } => {
				assert_eq!(session_id, 0xBEEF);
				assert_eq!(seq, 0x1234);
				assert_eq!(name.as_deref(), Some("shell"));
				assert!(is_command);
				assert!(!chunked_download);
			}
			_ => panic!("expected a SYN"),
		}
	}

	#[test]
	fn msg_normal_round_trips_with_empty_payload() {
		let codec = WireCodec;
		let packet = Packet::MsgNormal { session_id: 7, seq: 0xFFFE, ack: 2, data: vec![] };

		let bytes = codec.serialize(&packet, Options::empty());
		let parsed = codec.parse(&bytes, Options::empty()).unwrap();

		match parsed {
			Packet::MsgNormal { seq, ack, data, .. } => {
				assert_eq!(seq, 0xFFFE);
				assert_eq!(ack, 2);
				assert!(data.is_empty());
			}
			_ => panic!("expected a normal MSG"),
		}
	}

	#[test]
	fn msg_chunked_round_trips() {
		let codec = WireCodec;
		let packet = Packet::MsgChunked { session_id: 7, chunk: 42, data: b"A".to_vec() };
		let opts = Options::CHUNKED_DOWNLOAD;

		let bytes = codec.serialize(&packet, opts);
		let parsed = codec.parse(&bytes, opts).unwrap();

		match parsed {
			Packet::MsgChunked { chunk, data, .. } => {
				assert_eq!(chunk, 42);
				assert_eq!(data, b"A");
			}
			_ => panic!("expected a chunked MSG"),
		}
	}

	#[test]
	fn peek_header_does_not_need_options() {
		let codec = WireCodec;
		let packet = Packet::MsgChunked { session_id: 99, chunk: 1, data: vec![] };
		let bytes = codec.serialize(&packet, Options::CHUNKED_DOWNLOAD);

		let (session_id, kind) = codec.peek_header(&bytes).unwrap();

		assert_eq!(session_id, 99);
		assert_eq!(kind, PacketType::Msg);
	}

	#[test]
	fn truncated_packet_is_rejected() {
		let codec = WireCodec;

		assert!(codec.parse(&[0x00], Options::empty()).is_err());
	}
}
