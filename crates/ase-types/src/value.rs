//! SQL value representation.

use std::fmt;

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::decimal::Decimal;

/// A value of any ASE data type, including NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value (BIT).
    Bool(bool),
    /// 8-bit unsigned integer (INT1).
    TinyInt(u8),
    /// 8-bit signed integer (SINT1).
    SignedTinyInt(i8),
    /// 16-bit signed integer (INT2).
    SmallInt(i16),
    /// 16-bit unsigned integer (UINT2).
    UnsignedSmallInt(u16),
    /// 32-bit signed integer (INT4).
    Int(i32),
    /// 32-bit unsigned integer (UINT4).
    UnsignedInt(u32),
    /// 64-bit signed integer (INT8).
    BigInt(i64),
    /// 64-bit unsigned integer (UINT8).
    UnsignedBigInt(u64),
    /// 32-bit floating point (FLT4).
    Float(f32),
    /// 64-bit floating point (FLT8).
    Double(f64),
    /// Decimal value (DECN, NUMN, MONEY, SHORTMONEY).
    Decimal(Decimal),
    /// String value (CHAR, VARCHAR, LONGCHAR, TEXT, UNITEXT, XML).
    String(String),
    /// Binary value (BINARY, VARBINARY, LONGBINARY, IMAGE, BLOB).
    Binary(Bytes),
    /// Date value (DATE).
    Date(NaiveDate),
    /// Time value (TIME, BIGTIMEN).
    Time(NaiveTime),
    /// DateTime value (DATETIME, SHORTDATE, BIGDATETIMEN).
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as an i32, if it is one.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            Self::SmallInt(v) => Some(i32::from(*v)),
            Self::TinyInt(v) => Some(i32::from(*v)),
            Self::SignedTinyInt(v) => Some(i32::from(*v)),
            _ => None,
        }
    }

    /// Get the value as an i64, if it is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::BigInt(v) => Some(*v),
            Self::UnsignedInt(v) => Some(i64::from(*v)),
            Self::UnsignedSmallInt(v) => Some(i64::from(*v)),
            other => other.as_i32().map(i64::from),
        }
    }

    /// Get the value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as bytes, if it is binary.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as a decimal, if it is one.
    #[must_use]
    pub fn as_decimal(&self) -> Option<&Decimal> {
        match self {
            Self::Decimal(v) => Some(v),
            _ => None,
        }
    }

    /// Short name of the variant, used in conversion errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::TinyInt(_) => "u8",
            Self::SignedTinyInt(_) => "i8",
            Self::SmallInt(_) => "i16",
            Self::UnsignedSmallInt(_) => "u16",
            Self::Int(_) => "i32",
            Self::UnsignedInt(_) => "u32",
            Self::BigInt(_) => "i64",
            Self::UnsignedBigInt(_) => "u64",
            Self::Float(_) => "f32",
            Self::Double(_) => "f64",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
        }
    }
}

impl Default for SqlValue {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::TinyInt(v) => write!(f, "{v}"),
            Self::SignedTinyInt(v) => write!(f, "{v}"),
            Self::SmallInt(v) => write!(f, "{v}"),
            Self::UnsignedSmallInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UnsignedInt(v) => write!(f, "{v}"),
            Self::BigInt(v) => write!(f, "{v}"),
            Self::UnsignedBigInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Binary(v) => write!(f, "0x{}", hex(v)),
            Self::Date(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{v}"),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(v))
    }
}

impl From<Bytes> for SqlValue {
    fn from(v: Bytes) -> Self {
        Self::Binary(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
