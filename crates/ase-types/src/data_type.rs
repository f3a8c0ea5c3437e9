//! ASE data type identifiers.
//!
//! These correspond to the type bytes sent in parameter and row format
//! descriptors.

use std::fmt;

use crate::error::TypeError;

/// TDS 5.0 data type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    // Fixed-length types (no length prefix)
    /// Bit (boolean).
    Bit = 0x32,
    /// 4-byte date, days since 1900-01-01.
    Date = 0x31,
    /// 8-byte datetime.
    DateTime = 0x3D,
    /// 4-byte small datetime.
    ShortDate = 0x3A,
    /// 32-bit floating point.
    Flt4 = 0x3B,
    /// 64-bit floating point.
    Flt8 = 0x3E,
    /// 8-bit unsigned integer.
    Int1 = 0x30,
    /// 16-bit signed integer.
    Int2 = 0x34,
    /// 32-bit signed integer.
    Int4 = 0x38,
    /// 64-bit signed integer.
    Int8 = 0xBF,
    /// 8-byte interval.
    Interval = 0x2E,
    /// 8-bit signed integer.
    Sint1 = 0xB0,
    /// 16-bit unsigned integer.
    Uint2 = 0x41,
    /// 32-bit unsigned integer.
    Uint4 = 0x42,
    /// 64-bit unsigned integer.
    Uint8 = 0x43,
    /// 8-byte money.
    Money = 0x3C,
    /// 4-byte money.
    ShortMoney = 0x7A,
    /// 4-byte time, 1/300 seconds since midnight.
    Time = 0x33,

    // Variable-length types (with length prefix)
    /// Fixed-width binary.
    Binary = 0x2D,
    /// Security boundary.
    Boundary = 0x68,
    /// Fixed-width character.
    Char = 0x2F,
    /// Nullable date.
    DateN = 0x7B,
    /// Nullable datetime (4 or 8 bytes).
    DateTimeN = 0x6F,
    /// Nullable float (4 or 8 bytes).
    FltN = 0x6D,
    /// Nullable signed integer.
    IntN = 0x26,
    /// Nullable unsigned integer.
    UintN = 0x44,
    /// Long binary with a 4-byte length.
    LongBinary = 0xE1,
    /// Long character with a 4-byte length.
    LongChar = 0xAF,
    /// Nullable money (4 or 8 bytes).
    MoneyN = 0x6E,
    /// Security sensitivity.
    Sensitivity = 0x67,
    /// Nullable time.
    TimeN = 0x93,
    /// Variable-length binary.
    VarBinary = 0x25,
    /// Variable-length character.
    VarChar = 0x27,

    // Scaled and precise types
    /// Microsecond datetime.
    BigDateTimeN = 0xBB,
    /// Microsecond time.
    BigTimeN = 0xBC,
    /// Decimal with precision and scale.
    DecN = 0x6A,
    /// Numeric with precision and scale.
    NumN = 0x6C,

    // Large object types
    /// Serialized object.
    Blob = 0x24,
    /// Image, carried with a text pointer.
    Image = 0x22,
    /// Text, carried with a text pointer.
    Text = 0x23,
    /// UTF-16 text, carried with a text pointer.
    UniText = 0xAE,
    /// XML, carried with a text pointer.
    Xml = 0xA3,
}

impl DataType {
    /// Create a data type from a raw byte.
    pub fn from_u8(value: u8) -> Result<Self, TypeError> {
        let data_type = match value {
            0x32 => Self::Bit,
            0x31 => Self::Date,
            0x3D => Self::DateTime,
            0x3A => Self::ShortDate,
            0x3B => Self::Flt4,
            0x3E => Self::Flt8,
            0x30 => Self::Int1,
            0x34 => Self::Int2,
            0x38 => Self::Int4,
            0xBF => Self::Int8,
            0x2E => Self::Interval,
            0xB0 => Self::Sint1,
            0x41 => Self::Uint2,
            0x42 => Self::Uint4,
            0x43 => Self::Uint8,
            0x3C => Self::Money,
            0x7A => Self::ShortMoney,
            0x33 => Self::Time,
            0x2D => Self::Binary,
            0x68 => Self::Boundary,
            0x2F => Self::Char,
            0x7B => Self::DateN,
            0x6F => Self::DateTimeN,
            0x6D => Self::FltN,
            0x26 => Self::IntN,
            0x44 => Self::UintN,
            0xE1 => Self::LongBinary,
            0xAF => Self::LongChar,
            0x6E => Self::MoneyN,
            0x67 => Self::Sensitivity,
            0x93 => Self::TimeN,
            0x25 => Self::VarBinary,
            0x27 => Self::VarChar,
            0xBB => Self::BigDateTimeN,
            0xBC => Self::BigTimeN,
            0x6A => Self::DecN,
            0x6C => Self::NumN,
            0x24 => Self::Blob,
            0x22 => Self::Image,
            0x23 => Self::Text,
            0xAE => Self::UniText,
            0xA3 => Self::Xml,
            other => return Err(TypeError::UnknownDataType(other)),
        };
        Ok(data_type)
    }

    /// The wire byte for this type.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Size of the value in bytes for fixed-length types, `None` for
    /// variable-length types.
    #[must_use]
    pub const fn byte_size(self) -> Option<usize> {
        match self {
            Self::Bit | Self::Int1 | Self::Sint1 => Some(1),
            Self::Int2 | Self::Uint2 => Some(2),
            Self::Date
            | Self::ShortDate
            | Self::Flt4
            | Self::Int4
            | Self::Uint4
            | Self::ShortMoney
            | Self::Time => Some(4),
            Self::DateTime
            | Self::Flt8
            | Self::Int8
            | Self::Interval
            | Self::Uint8
            | Self::Money => Some(8),
            _ => None,
        }
    }

    /// Whether values of this type always have the same size.
    #[must_use]
    pub const fn is_fixed_length(self) -> bool {
        self.byte_size().is_some()
    }

    /// Width of the length prefix preceding variable-length values.
    ///
    /// Returns 0 for fixed-length types and for types whose data carries
    /// its own framing (blobs).
    #[must_use]
    pub const fn length_bytes(self) -> usize {
        match self {
            Self::LongBinary
            | Self::LongChar
            | Self::Image
            | Self::Text
            | Self::UniText
            | Self::Xml => 4,
            Self::Blob => 0,
            _ if self.is_fixed_length() => 0,
            _ => 1,
        }
    }

    /// The nullable counterpart of a fixed-length type.
    ///
    /// Variable-length types are already nullable and are returned as-is.
    pub fn nullable(self) -> Result<Self, TypeError> {
        if !self.is_fixed_length() {
            return Ok(self);
        }

        match self {
            Self::Date => Ok(Self::DateN),
            Self::DateTime | Self::ShortDate => Ok(Self::DateTimeN),
            Self::Flt4 | Self::Flt8 => Ok(Self::FltN),
            Self::Int1 | Self::Int2 | Self::Int4 | Self::Int8 => Ok(Self::IntN),
            Self::Money | Self::ShortMoney => Ok(Self::MoneyN),
            Self::Time => Ok(Self::TimeN),
            Self::Uint2 | Self::Uint4 | Self::Uint8 => Ok(Self::UintN),
            other => Err(TypeError::Unsupported(other)),
        }
    }

    /// Canonical protocol name of the type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bit => "BIT",
            Self::Date => "DATE",
            Self::DateTime => "DATETIME",
            Self::ShortDate => "SHORTDATE",
            Self::Flt4 => "FLT4",
            Self::Flt8 => "FLT8",
            Self::Int1 => "INT1",
            Self::Int2 => "INT2",
            Self::Int4 => "INT4",
            Self::Int8 => "INT8",
            Self::Interval => "INTERVAL",
            Self::Sint1 => "SINT1",
            Self::Uint2 => "UINT2",
            Self::Uint4 => "UINT4",
            Self::Uint8 => "UINT8",
            Self::Money => "MONEY",
            Self::ShortMoney => "SHORTMONEY",
            Self::Time => "TIME",
            Self::Binary => "BINARY",
            Self::Boundary => "BOUNDARY",
            Self::Char => "CHAR",
            Self::DateN => "DATEN",
            Self::DateTimeN => "DATETIMEN",
            Self::FltN => "FLTN",
            Self::IntN => "INTN",
            Self::UintN => "UINTN",
            Self::LongBinary => "LONGBINARY",
            Self::LongChar => "LONGCHAR",
            Self::MoneyN => "MONEYN",
            Self::Sensitivity => "SENSITIVITY",
            Self::TimeN => "TIMEN",
            Self::VarBinary => "VARBINARY",
            Self::VarChar => "VARCHAR",
            Self::BigDateTimeN => "BIGDATETIMEN",
            Self::BigTimeN => "BIGTIMEN",
            Self::DecN => "DECN",
            Self::NumN => "NUMN",
            Self::Blob => "BLOB",
            Self::Image => "IMAGE",
            Self::Text => "TEXT",
            Self::UniText => "UNITEXT",
            Self::Xml => "XML",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_roundtrip() {
        for byte in 0..=u8::MAX {
            if let Ok(data_type) = DataType::from_u8(byte) {
                assert_eq!(data_type.as_u8(), byte);
            }
        }
        assert!(matches!(
            DataType::from_u8(0x01),
            Err(TypeError::UnknownDataType(0x01))
        ));
    }

    #[test]
    fn test_length_bytes() {
        assert_eq!(DataType::Int4.length_bytes(), 0);
        assert_eq!(DataType::VarChar.length_bytes(), 1);
        assert_eq!(DataType::LongBinary.length_bytes(), 4);
        assert_eq!(DataType::Text.length_bytes(), 4);
        assert_eq!(DataType::Blob.length_bytes(), 0);
    }

    #[test]
    fn test_nullable() {
        assert_eq!(DataType::Int2.nullable().unwrap(), DataType::IntN);
        assert_eq!(DataType::ShortDate.nullable().unwrap(), DataType::DateTimeN);
        assert_eq!(DataType::VarChar.nullable().unwrap(), DataType::VarChar);
        assert!(DataType::Bit.nullable().is_err());
    }
}
