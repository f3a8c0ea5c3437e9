//! Type conversion error types.

use thiserror::Error;

use crate::data_type::DataType;

/// Errors that can occur during type conversion.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TypeError {
    /// The byte representation does not have the length the type requires.
    #[error("invalid length {actual} for {data_type}, expected {expected}")]
    InvalidLength {
        /// Data type being decoded.
        data_type: DataType,
        /// Expected length description.
        expected: &'static str,
        /// Actual length.
        actual: usize,
    },

    /// Type mismatch during conversion.
    #[error("type mismatch: {data_type} cannot hold {actual}")]
    TypeMismatch {
        /// Target data type.
        data_type: DataType,
        /// Kind of the value that was supplied.
        actual: &'static str,
    },

    /// Value is out of range for target type.
    #[error("value out of range for {target_type}")]
    OutOfRange {
        /// Target type name.
        target_type: &'static str,
    },

    /// A decimal has more digits than its precision allows.
    #[error("decimal has {digits} digits, precision allows {precision}")]
    PrecisionExceeded {
        /// Digits of the unscaled value.
        digits: u32,
        /// Declared precision.
        precision: u8,
    },

    /// Invalid encoding in string data.
    #[error("invalid string encoding: {0}")]
    InvalidEncoding(String),

    /// Invalid date/time value.
    #[error("invalid date/time: {0}")]
    InvalidDateTime(String),

    /// Invalid decimal value.
    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),

    /// Unknown data type byte.
    #[error("unknown data type 0x{0:02X}")]
    UnknownDataType(u8),

    /// The data type has no value conversion.
    #[error("unsupported data type {0}")]
    Unsupported(DataType),
}
