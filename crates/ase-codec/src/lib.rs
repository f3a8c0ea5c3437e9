//! # ase-codec
//!
//! Async framing layer for TDS 5.0 packets.
//!
//! This crate turns a raw byte stream into [`Packet`]s and back, handling
//! packets split across TCP segments. Packets are not reassembled into
//! messages here: the client hands them to a per-channel packet queue,
//! which decodes packages spanning several packets.
//!
//! ## Architecture
//!
//! ```text
//! TCP/TLS stream → PacketCodec (framing) → PacketReader → connection reader task
//! channel → PacketWriter → PacketCodec → TCP/TLS stream
//! ```
//!
//! [`Packet`]: ase_protocol::Packet

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod framed;
pub mod packet_codec;

pub use error::CodecError;
pub use framed::{PacketReader, PacketWriter, split};
pub use packet_codec::PacketCodec;
