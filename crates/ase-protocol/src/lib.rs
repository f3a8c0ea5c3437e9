//! # ase-protocol
//!
//! Implementation of the TDS 5.0 wire protocol spoken by SAP ASE.
//!
//! This crate provides packet structures, the multi-packet byte cursor,
//! package (token) parsing and serialization and the login record.
//!
//! ## Design Philosophy
//!
//! This crate is IO-agnostic. It contains no networking logic and makes no
//! assumptions about the async runtime. Packets are handed to a
//! [`PacketQueue`], packages are decoded from it speculatively and
//! outbound packages are written into it. `ase-codec` and `ase-client`
//! build the transport on top.
//!
//! ## Example
//!
//! ```rust
//! use ase_protocol::{Package, PacketQueue, package::LanguagePackage};
//! use ase_types::Endian;
//!
//! let mut queue = PacketQueue::new(Default::default(), Endian::Little);
//! Package::Language(LanguagePackage::new("select 1"))
//!     .encode(&mut queue)
//!     .unwrap();
//! let packets = queue.take_packets(true);
//! assert_eq!(packets.len(), 1);
//! assert!(packets[0].header.is_eom());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod field;
mod flags;
pub mod login;
pub mod package;
pub mod packet;
pub mod queue;
pub mod token;
pub mod version;

pub use error::ProtocolError;
pub use field::{FieldData, FieldFmt, FormatShape};
pub use login::LoginRecord;
pub use package::Package;
pub use packet::{
    DEFAULT_PACKET_SIZE, MAX_PACKET_SIZE, MessageType, PACKET_HEADER_SIZE, Packet, PacketHeader,
    PacketSize, PacketStatus,
};
pub use queue::{PacketQueue, Position};
pub use token::Token;
pub use version::{LIBRARY_NAME, LIBRARY_VERSION, Version};
