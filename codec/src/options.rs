use bitflags::bitflags;

bitflags! {
	/// Negotiated SYN options, mirroring the bit layout the wire format uses.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct Options: u16 {
		/// The SYN body carries a client-supplied session name.
		const NAME = 0x01;
		/// This session is a one-way download rather than a two-way stream.
		const DOWNLOAD = 0x08;
		/// The download is chunked: MSG bodies carry a chunk index instead of seq/ack.
		const CHUNKED_DOWNLOAD = 0x10;
		/// Data carried on this session is a shell command rather than raw bytes.
		const COMMAND = 0x20;
	}
}
