//! # ase-types
//!
//! SAP ASE data types and their TDS 5.0 byte encodings.
//!
//! The protocol layer never interprets values itself. It routes bytes
//! through this crate keyed by a [`DataType`] and the [`Endian`] negotiated
//! for the connection:
//!
//! - [`encode_value`] turns a [`SqlValue`] into the payload bytes of a field
//! - [`decode_value`] turns field payload bytes back into a [`SqlValue`]
//!
//! ## Type Mappings
//!
//! | ASE Type | Rust Type |
//! |-----------------|-----------|
//! | `BIT` | `bool` |
//! | `INT1` / `SINT1` | `u8` / `i8` |
//! | `INT2` / `UINT2` | `i16` / `u16` |
//! | `INT4` / `UINT4` | `i32` / `u32` |
//! | `INT8` / `UINT8` | `i64` / `u64` |
//! | `FLT4` / `FLT8` | `f32` / `f64` |
//! | `DECN` / `NUMN` / `MONEY` | [`Decimal`] |
//! | `CHAR` / `VARCHAR` / `TEXT` | `String` |
//! | `BINARY` / `IMAGE` / `LONGBINARY` | `bytes::Bytes` |
//! | `DATE` | `chrono::NaiveDate` |
//! | `TIME` / `BIGTIMEN` | `chrono::NaiveTime` |
//! | `DATETIME` / `BIGDATETIMEN` | `chrono::NaiveDateTime` |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod data_type;
pub mod decimal;
pub mod decode;
pub mod encode;
pub mod endian;
pub mod error;
pub mod time;
pub mod value;

pub use data_type::DataType;
pub use decimal::Decimal;
pub use decode::decode_value;
pub use encode::encode_value;
pub use endian::Endian;
pub use error::TypeError;
pub use value::SqlValue;
