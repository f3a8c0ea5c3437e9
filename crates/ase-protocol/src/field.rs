//! Field formats and field data of parameter and row packages.
//!
//! A [`FieldFmt`] describes one column or parameter as announced by a
//! `PARAMFMT`/`ROWFMT` package; the matching [`FieldData`] carries one value
//! of that column in a `PARAMS`/`ROW` package. Formats differ only in the
//! type-specific information following the data type byte, which is
//! captured by [`FormatShape`].

use std::fmt;

use ase_types::{DataType, SqlValue, decode_value, encode_value};
use bitflags::bitflags;
use bytes::Bytes;

use crate::error::ProtocolError;
use crate::flags::write_flags;
use crate::queue::PacketQueue;

/// Default maximum length of `VARCHAR` formats.
pub const DEFAULT_VARCHAR_LENGTH: u32 = 255;

/// Default maximum length of `LONGBINARY` formats.
pub const DEFAULT_LONGBINARY_LENGTH: u32 = i32::MAX as u32;

/// Blob data is split into chunks of this size when written.
pub const BLOB_CHUNK_SIZE: usize = 1024;

const BLOB_LAST_CHUNK: u32 = 0x8000_0000;

bitflags! {
    /// Status of a parameter format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamFmtStatus: u32 {
        /// Output parameter.
        const RETURN = 0x01;
        /// Each value is preceded by a data status byte.
        const COLUMNSTATUS = 0x08;
        /// The parameter may be NULL.
        const NULLALLOWED = 0x20;
    }
}

bitflags! {
    /// Status of a row format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RowFmtStatus: u32 {
        /// Column is hidden.
        const HIDDEN = 0x01;
        /// Column is part of the key.
        const KEY = 0x02;
        /// Column is a version column.
        const VERSION = 0x04;
        /// Each value is preceded by a data status byte.
        const COLUMNSTATUS = 0x08;
        /// Column may be updated.
        const UPDATEABLE = 0x10;
        /// Column may be NULL.
        const NULLALLOWED = 0x20;
        /// Identity column.
        const IDENTITY = 0x40;
        /// Column is padded with blanks.
        const PADCHAR = 0x80;
    }
}

bitflags! {
    /// Status byte preceding a value when the format requests it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DataStatus: u8 {
        /// Value is NULL.
        const NULL = 0x01;
        /// Value is an empty, non-NULL value.
        const ZEROLENGTHNONNULL = 0x02;
    }
}

impl fmt::Display for DataStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self, "NONNULL")
    }
}

/// Kind of a blob column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlobType {
    /// Java object identified by its full class name.
    FullClassName = 0x01,
    /// Java object identified by a database class definition.
    DbIdClassDef = 0x02,
    /// Character data.
    Char = 0x03,
    /// Binary data.
    Binary = 0x04,
    /// Unicode character data.
    UniChar = 0x05,
    /// Locator of a character LOB.
    LobLocChar = 0x06,
    /// Locator of a binary LOB.
    LobLocBinary = 0x07,
    /// Locator of a unicode LOB.
    LobLocUniChar = 0x08,
}

impl BlobType {
    /// Look up a blob type by its byte value.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        Ok(match value {
            0x01 => Self::FullClassName,
            0x02 => Self::DbIdClassDef,
            0x03 => Self::Char,
            0x04 => Self::Binary,
            0x05 => Self::UniChar,
            0x06 => Self::LobLocChar,
            0x07 => Self::LobLocBinary,
            0x08 => Self::LobLocUniChar,
            _ => {
                return Err(ProtocolError::InvalidValue {
                    field: "blob type",
                    value: u64::from(value),
                });
            }
        })
    }

    /// Whether the format carries a class id.
    #[must_use]
    pub const fn has_class_id(self) -> bool {
        matches!(self, Self::FullClassName | Self::DbIdClassDef)
    }

    /// Whether the data carries a LOB locator.
    #[must_use]
    pub const fn is_locator(self) -> bool {
        matches!(self, Self::LobLocChar | Self::LobLocBinary | Self::LobLocUniChar)
    }

    /// Serialization implied by a serialization byte of 0.
    #[must_use]
    pub const fn native_serialization(self) -> BlobSerialization {
        match self {
            Self::FullClassName | Self::DbIdClassDef => BlobSerialization::NativeJava,
            Self::Char | Self::LobLocChar => BlobSerialization::NativeCharacter,
            Self::UniChar | Self::LobLocUniChar => BlobSerialization::UniCharUtf16,
            Self::Binary | Self::LobLocBinary => BlobSerialization::Binary,
        }
    }
}

/// Serialization of blob data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobSerialization {
    /// Native Java serialization.
    NativeJava,
    /// Character data in the client charset.
    NativeCharacter,
    /// Raw bytes.
    Binary,
    /// UTF-16.
    UniCharUtf16,
    /// UTF-8.
    UniCharUtf8,
    /// SCSU compressed unicode.
    UniCharScsu,
}

impl BlobSerialization {
    fn decode(byte: u8, blob_type: BlobType) -> Result<Self, ProtocolError> {
        match byte {
            0 => Ok(blob_type.native_serialization()),
            1 if blob_type == BlobType::UniChar => Ok(Self::UniCharUtf8),
            2 if blob_type == BlobType::UniChar => Ok(Self::UniCharScsu),
            _ => Err(ProtocolError::InvalidValue {
                field: "blob serialization",
                value: u64::from(byte),
            }),
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::UniCharUtf8 => 1,
            Self::UniCharScsu => 2,
            _ => 0,
        }
    }
}

/// Type-specific format information following the data type byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatShape {
    /// Only the maximum length, and only for variable-length types.
    Length,
    /// Maximum length and scale.
    LengthScale {
        /// Fractional second digits.
        scale: u8,
    },
    /// Maximum length, precision and scale.
    LengthPrecisionScale {
        /// Total number of digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Blob type and optional class id.
    Blob {
        /// Kind of blob.
        blob_type: BlobType,
        /// Class id for Java object blobs.
        class_id: String,
    },
    /// Maximum length and the name of the table holding the text.
    TextPointer {
        /// Table name.
        table_name: String,
    },
}

impl FormatShape {
    fn for_type(data_type: DataType) -> Self {
        match data_type {
            DataType::BigDateTimeN | DataType::BigTimeN => Self::LengthScale { scale: 6 },
            DataType::DecN | DataType::NumN => Self::LengthPrecisionScale {
                precision: ase_types::decimal::DEFAULT_PRECISION,
                scale: ase_types::decimal::DEFAULT_SCALE,
            },
            DataType::Blob => Self::Blob {
                blob_type: BlobType::Binary,
                class_id: String::new(),
            },
            DataType::Image | DataType::Text | DataType::UniText | DataType::Xml => {
                Self::TextPointer {
                    table_name: String::new(),
                }
            }
            _ => Self::Length,
        }
    }
}

/// Format of one parameter or column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFmt {
    /// Data type of the values.
    pub data_type: DataType,
    /// Column or parameter name.
    pub name: String,
    /// Raw status; see [`ParamFmtStatus`] and [`RowFmtStatus`].
    pub status: u32,
    /// User type id.
    pub user_type: i32,
    /// Locale information.
    pub locale: String,
    /// Maximum length of variable-length values.
    pub max_length: u32,
    /// Type-specific information.
    pub shape: FormatShape,
    /// Column label, wide row formats only.
    pub column_label: String,
    /// Catalogue, wide row formats only.
    pub catalogue: String,
    /// Schema, wide row formats only.
    pub schema: String,
    /// Table, wide row formats only.
    pub table: String,
}

impl FieldFmt {
    /// Create a format for `data_type` with its default length and shape.
    #[must_use]
    pub fn new(data_type: DataType) -> Self {
        let max_length = match data_type {
            DataType::VarChar => DEFAULT_VARCHAR_LENGTH,
            DataType::LongBinary => DEFAULT_LONGBINARY_LENGTH,
            other => other.byte_size().unwrap_or(0) as u32,
        };

        Self {
            data_type,
            name: String::new(),
            status: 0,
            user_type: 0,
            locale: String::new(),
            max_length,
            shape: FormatShape::for_type(data_type),
            column_label: String::new(),
            catalogue: String::new(),
            schema: String::new(),
            table: String::new(),
        }
    }

    /// Set the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the maximum length.
    #[must_use]
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set the raw status.
    #[must_use]
    pub fn with_status(mut self, status: u32) -> Self {
        self.status = status;
        self
    }

    /// Set precision and scale of decimal formats, or the scale of
    /// high-resolution time formats.
    #[must_use]
    pub fn with_precision_scale(mut self, precision: u8, new_scale: u8) -> Self {
        match &mut self.shape {
            FormatShape::LengthPrecisionScale {
                precision: p,
                scale,
            } => {
                *p = precision;
                *scale = new_scale;
            }
            FormatShape::LengthScale { scale } => *scale = new_scale,
            _ => {}
        }
        self
    }

    /// Whether every value is preceded by a data status byte.
    #[must_use]
    pub fn has_column_status(&self) -> bool {
        self.status & RowFmtStatus::COLUMNSTATUS.bits() != 0
    }

    /// Whether the column is part of the key.
    #[must_use]
    pub fn is_key(&self) -> bool {
        self.status & RowFmtStatus::KEY.bits() != 0
    }

    fn length_bytes(&self) -> usize {
        self.data_type.length_bytes()
    }

    /// Number of bytes of the type-specific information.
    #[must_use]
    pub fn type_info_len(&self) -> usize {
        let length = self.length_bytes();
        match &self.shape {
            FormatShape::Length => length,
            FormatShape::LengthScale { .. } => length + 1,
            FormatShape::LengthPrecisionScale { .. } => length + 2,
            FormatShape::Blob {
                blob_type,
                class_id,
            } => {
                if blob_type.has_class_id() {
                    1 + 2 + class_id.len()
                } else {
                    1
                }
            }
            FormatShape::TextPointer { table_name } => length + 2 + table_name.len(),
        }
    }

    /// Read the type-specific information following the data type byte.
    pub fn read_type_info(&mut self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let length = self.length_bytes();
        if length > 0 {
            self.max_length = read_length(queue, length)?;
        }

        match &mut self.shape {
            FormatShape::Length => {}
            FormatShape::LengthScale { scale } => *scale = queue.u8()?,
            FormatShape::LengthPrecisionScale { precision, scale } => {
                *precision = queue.u8()?;
                *scale = queue.u8()?;
            }
            FormatShape::Blob {
                blob_type,
                class_id,
            } => {
                *blob_type = BlobType::from_u8(queue.u8()?)?;
                if blob_type.has_class_id() {
                    *class_id = queue.u16_string()?;
                }
            }
            FormatShape::TextPointer { table_name } => *table_name = queue.u16_string()?,
        }
        Ok(())
    }

    /// Write the type-specific information following the data type byte.
    pub fn write_type_info(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let length = self.length_bytes();
        if length > 0 {
            write_length(queue, "max length", length, self.max_length as usize)?;
        }

        match &self.shape {
            FormatShape::Length => {}
            FormatShape::LengthScale { scale } => queue.write_u8(*scale),
            FormatShape::LengthPrecisionScale { precision, scale } => {
                queue.write_u8(*precision);
                queue.write_u8(*scale);
            }
            FormatShape::Blob {
                blob_type,
                class_id,
            } => {
                queue.write_u8(*blob_type as u8);
                if blob_type.has_class_id() {
                    queue.write_u16_string("class id", class_id)?;
                }
            }
            FormatShape::TextPointer { table_name } => {
                queue.write_u16_string("table name", table_name)?;
            }
        }
        Ok(())
    }

    /// Read one value of this format.
    pub fn read_data(&self, queue: &mut PacketQueue) -> Result<FieldData, ProtocolError> {
        let status = if self.has_column_status() {
            DataStatus::from_bits_retain(queue.u8()?)
        } else {
            DataStatus::empty()
        };

        let mut data = FieldData {
            status,
            ..FieldData::default()
        };

        match &self.shape {
            FormatShape::Blob { blob_type, .. } => self.read_blob(queue, *blob_type, &mut data)?,
            FormatShape::TextPointer { .. } => self.read_text_pointer(queue, &mut data)?,
            _ => {
                let len = match self.data_type.byte_size() {
                    Some(size) => size,
                    None => read_length(queue, self.length_bytes())? as usize,
                };
                let bytes = queue.bytes(len)?;
                data.value = self.decode_bytes(queue, &bytes, status)?;
            }
        }

        Ok(data)
    }

    fn decode_bytes(
        &self,
        queue: &PacketQueue,
        bytes: &[u8],
        status: DataStatus,
    ) -> Result<SqlValue, ProtocolError> {
        if bytes.is_empty() && status.contains(DataStatus::ZEROLENGTHNONNULL) {
            return Ok(match self.data_type {
                DataType::Char
                | DataType::VarChar
                | DataType::LongChar
                | DataType::Text
                | DataType::UniText
                | DataType::Xml => SqlValue::String(String::new()),
                _ => SqlValue::Binary(Bytes::new()),
            });
        }

        let mut value = decode_value(self.data_type, queue.endian(), bytes)?;
        if let (
            SqlValue::Decimal(dec),
            FormatShape::LengthPrecisionScale { precision, scale },
        ) = (&mut value, &self.shape)
        {
            dec.set_precision_scale(*precision, *scale)?;
        }
        Ok(value)
    }

    fn read_blob(
        &self,
        queue: &mut PacketQueue,
        blob_type: BlobType,
        data: &mut FieldData,
    ) -> Result<(), ProtocolError> {
        let serialization = BlobSerialization::decode(queue.u8()?, blob_type)?;
        let mut sub_class_id = String::new();
        let mut locator = String::new();
        if blob_type.has_class_id() {
            sub_class_id = queue.u16_string()?;
        } else if blob_type.is_locator() {
            locator = queue.u16_string()?;
        }

        let mut value = Vec::new();
        loop {
            let header = queue.u32()?;
            let last = header & BLOB_LAST_CHUNK != 0;
            let len = (header & !BLOB_LAST_CHUNK) as usize;
            if len > 0 {
                value.extend_from_slice(&queue.bytes(len)?);
            }
            if last {
                break;
            }
        }

        data.value = SqlValue::Binary(Bytes::from(value));
        data.extra = FieldExtra::Blob {
            serialization,
            sub_class_id,
            locator,
        };
        Ok(())
    }

    fn read_text_pointer(
        &self,
        queue: &mut PacketQueue,
        data: &mut FieldData,
    ) -> Result<(), ProtocolError> {
        let ptr_len = queue.u8()?;
        if ptr_len == 0 {
            data.value = SqlValue::Null;
            return Ok(());
        }

        let text_ptr = queue.bytes(usize::from(ptr_len))?;
        let timestamp = queue.bytes(8)?;
        let len = queue.u32()? as usize;
        let bytes = queue.bytes(len)?;

        data.value = self.decode_bytes(queue, &bytes, data.status)?;
        data.extra = FieldExtra::TextPointer {
            text_ptr: Bytes::from(text_ptr),
            timestamp: Bytes::from(timestamp),
        };
        Ok(())
    }

    /// Write one value of this format.
    pub fn write_data(&self, queue: &mut PacketQueue, data: &FieldData) -> Result<(), ProtocolError> {
        if self.has_column_status() {
            let status = if data.value.is_null() {
                data.status | DataStatus::NULL
            } else {
                data.status
            };
            queue.write_u8(status.bits());
        }

        match &self.shape {
            FormatShape::Blob { blob_type, .. } => self.write_blob(queue, *blob_type, data),
            FormatShape::TextPointer { .. } => self.write_text_pointer(queue, data),
            _ => {
                let bytes = self.encode_bytes(queue, &data.value)?;
                if self.data_type.byte_size().is_none() {
                    write_length(queue, "value", self.length_bytes(), bytes.len())?;
                }
                queue.write_bytes(&bytes);
                Ok(())
            }
        }
    }

    fn encode_bytes(&self, queue: &PacketQueue, value: &SqlValue) -> Result<Vec<u8>, ProtocolError> {
        let length = match self.data_type.byte_size() {
            Some(_) => None,
            None if self.max_length > 0 => Some(self.max_length as usize),
            None => None,
        };

        let bytes = match (value, &self.shape) {
            (SqlValue::Decimal(dec), FormatShape::LengthPrecisionScale { precision, scale }) => {
                let rescaled = ase_types::Decimal::from_mantissa(
                    dec.rescaled_mantissa(*scale)?,
                    *precision,
                    *scale,
                )?;
                encode_value(
                    self.data_type,
                    queue.endian(),
                    &SqlValue::Decimal(rescaled),
                    length,
                )?
            }
            _ => encode_value(self.data_type, queue.endian(), value, length)?,
        };
        Ok(bytes)
    }

    fn write_blob(
        &self,
        queue: &mut PacketQueue,
        blob_type: BlobType,
        data: &FieldData,
    ) -> Result<(), ProtocolError> {
        let (serialization, sub_class_id, locator) = match &data.extra {
            FieldExtra::Blob {
                serialization,
                sub_class_id,
                locator,
            } => (*serialization, sub_class_id.as_str(), locator.as_str()),
            _ => (blob_type.native_serialization(), "", ""),
        };

        queue.write_u8(serialization.as_u8());
        if blob_type.has_class_id() {
            queue.write_u16_string("sub class id", sub_class_id)?;
        } else if blob_type.is_locator() {
            queue.write_u16_string("locator", locator)?;
        }

        let bytes = match &data.value {
            SqlValue::Null => Vec::new(),
            SqlValue::String(s) => s.clone().into_bytes(),
            SqlValue::Binary(b) => b.to_vec(),
            other => {
                return Err(ase_types::TypeError::TypeMismatch {
                    data_type: self.data_type,
                    actual: other.kind(),
                }
                .into());
            }
        };

        let mut chunks = bytes.chunks(BLOB_CHUNK_SIZE).peekable();
        if chunks.peek().is_none() {
            queue.write_u32(BLOB_LAST_CHUNK);
            return Ok(());
        }
        while let Some(chunk) = chunks.next() {
            let mut header = chunk.len() as u32;
            if chunks.peek().is_none() {
                header |= BLOB_LAST_CHUNK;
            }
            queue.write_u32(header);
            queue.write_bytes(chunk);
        }
        Ok(())
    }

    fn write_text_pointer(&self, queue: &mut PacketQueue, data: &FieldData) -> Result<(), ProtocolError> {
        if data.value.is_null() {
            queue.write_u8(0);
            return Ok(());
        }

        let (text_ptr, timestamp) = match &data.extra {
            FieldExtra::TextPointer {
                text_ptr,
                timestamp,
            } => (text_ptr.clone(), timestamp.clone()),
            _ => (Bytes::from_static(&[0u8; 16]), Bytes::from_static(&[0u8; 8])),
        };

        let ptr_len = u8::try_from(text_ptr.len()).map_err(|_| ProtocolError::TooLong {
            field: "text pointer",
            max: u8::MAX as usize,
            actual: text_ptr.len(),
        })?;
        if timestamp.len() != 8 {
            return Err(ProtocolError::InvalidValue {
                field: "text timestamp length",
                value: timestamp.len() as u64,
            });
        }

        let bytes = self.encode_bytes(queue, &data.value)?;
        queue.write_u8(ptr_len);
        queue.write_bytes(&text_ptr);
        queue.write_bytes(&timestamp);
        write_length(queue, "text", 4, bytes.len())?;
        queue.write_bytes(&bytes);
        Ok(())
    }
}

impl fmt::Display for FieldFmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.data_type.name())?;
        if self.length_bytes() > 0 {
            write!(f, "[{}]", self.max_length)?;
        }
        match &self.shape {
            FormatShape::LengthScale { scale } => write!(f, " scale={scale}"),
            FormatShape::LengthPrecisionScale { precision, scale } => {
                write!(f, " precision={precision} scale={scale}")
            }
            FormatShape::Blob { blob_type, .. } => write!(f, " {blob_type:?}"),
            FormatShape::TextPointer { table_name } if !table_name.is_empty() => {
                write!(f, " table={table_name}")
            }
            _ => Ok(()),
        }
    }
}

/// Additional data carried by blob and text values.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldExtra {
    /// Plain value.
    #[default]
    None,
    /// Blob value details.
    Blob {
        /// Serialization of the data.
        serialization: BlobSerialization,
        /// Sub class id for Java object blobs.
        sub_class_id: String,
        /// LOB locator.
        locator: String,
    },
    /// Text pointer value details.
    TextPointer {
        /// Text pointer.
        text_ptr: Bytes,
        /// Text timestamp, always 8 bytes.
        timestamp: Bytes,
    },
}

/// One value of a parameter or row package.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldData {
    /// Data status, only transmitted when the format requests it.
    pub status: DataStatus,
    /// The value.
    pub value: SqlValue,
    /// Blob or text pointer details.
    pub extra: FieldExtra,
}

impl FieldData {
    /// Create field data holding `value`.
    #[must_use]
    pub fn new(value: impl Into<SqlValue>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for FieldData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

fn read_length(queue: &mut PacketQueue, bytes: usize) -> Result<u32, ProtocolError> {
    match bytes {
        4 => queue.u32(),
        2 => queue.u16().map(u32::from),
        _ => queue.u8().map(u32::from),
    }
}

fn write_length(
    queue: &mut PacketQueue,
    field: &'static str,
    bytes: usize,
    len: usize,
) -> Result<(), ProtocolError> {
    let max = match bytes {
        4 => u32::MAX as usize,
        2 => u16::MAX as usize,
        _ => u8::MAX as usize,
    };
    if len > max {
        return Err(ProtocolError::TooLong {
            field,
            max,
            actual: len,
        });
    }

    match bytes {
        4 => queue.write_u32(len as u32),
        2 => queue.write_u16(len as u16),
        _ => queue.write_u8(len as u8),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ase_types::{Decimal, Endian};

    use super::*;
    use crate::packet::PacketSize;

    fn roundtrip(format: &FieldFmt, data: &FieldData) -> (Vec<u8>, FieldData) {
        let mut tx = PacketQueue::new(PacketSize::default(), Endian::Little);
        format.write_data(&mut tx, data).unwrap();
        let bytes = tx.written_bytes();
        let mut rx = PacketQueue::from_payload(&bytes, Endian::Little);
        let decoded = format.read_data(&mut rx).unwrap();
        assert!(rx.all_packets_consumed());
        (bytes, decoded)
    }

    #[test]
    fn test_lookup_defaults() {
        assert_eq!(FieldFmt::new(DataType::VarChar).max_length, 255);
        assert_eq!(FieldFmt::new(DataType::LongBinary).max_length, 2_147_483_647);
        assert_eq!(FieldFmt::new(DataType::Int4).max_length, 4);
        assert!(matches!(
            FieldFmt::new(DataType::DecN).shape,
            FormatShape::LengthPrecisionScale { .. }
        ));
        assert!(matches!(
            FieldFmt::new(DataType::Text).shape,
            FormatShape::TextPointer { .. }
        ));
    }

    #[test]
    fn test_fixed_value_has_no_length_prefix() {
        let format = FieldFmt::new(DataType::Int4);
        let (bytes, data) = roundtrip(&format, &FieldData::new(7));
        assert_eq!(bytes, vec![7, 0, 0, 0]);
        assert_eq!(data.value, SqlValue::Int(7));
    }

    #[test]
    fn test_column_status_null() {
        let format = FieldFmt::new(DataType::IntN)
            .with_max_length(4)
            .with_status(RowFmtStatus::COLUMNSTATUS.bits());
        let (bytes, data) = roundtrip(&format, &FieldData::new(SqlValue::Null));
        assert_eq!(bytes, vec![DataStatus::NULL.bits(), 0]);
        assert!(data.value.is_null());
        assert!(data.status.contains(DataStatus::NULL));
    }

    #[test]
    fn test_decimal_takes_format_precision() {
        let format = FieldFmt::new(DataType::DecN)
            .with_max_length(17)
            .with_precision_scale(10, 2);
        let value = Decimal::parse(10, 2, "-12.50").unwrap();
        let (_, data) = roundtrip(&format, &FieldData::new(value));
        let dec = data.value.as_decimal().unwrap();
        assert_eq!(dec.precision(), 10);
        assert_eq!(dec.scale(), 2);
        assert_eq!(dec.to_string(), "-12.5");
    }

    #[test]
    fn test_decimal_wider_than_format_is_rejected() {
        let format = FieldFmt::new(DataType::DecN)
            .with_max_length(17)
            .with_precision_scale(5, 2);
        let value = Decimal::parse(10, 2, "1234.50").unwrap();
        let mut tx = PacketQueue::new(PacketSize::default(), Endian::Little);

        let err = format
            .write_data(&mut tx, &FieldData::new(value))
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Type(ase_types::TypeError::PrecisionExceeded { precision: 5, .. })
        ));
    }

    #[test]
    fn test_format_type_info() {
        let format = FieldFmt::new(DataType::NumN)
            .with_max_length(9)
            .with_precision_scale(18, 4);
        let mut tx = PacketQueue::new(PacketSize::default(), Endian::Little);
        format.write_type_info(&mut tx).unwrap();
        assert_eq!(tx.written_bytes(), vec![9, 18, 4]);
        assert_eq!(format.type_info_len(), 3);

        let mut rx = PacketQueue::from_payload(&tx.written_bytes(), Endian::Little);
        let mut decoded = FieldFmt::new(DataType::NumN);
        decoded.read_type_info(&mut rx).unwrap();
        assert_eq!(decoded, format);
    }

    #[test]
    fn test_blob_chunks() {
        let format = FieldFmt::new(DataType::Blob);
        let payload = vec![0xAB; BLOB_CHUNK_SIZE + 10];
        let (bytes, data) = roundtrip(&format, &FieldData::new(payload.clone()));

        // serialization byte, then a full chunk without the last-chunk bit
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..5], &(BLOB_CHUNK_SIZE as u32).to_le_bytes());
        assert_eq!(data.value.as_bytes().unwrap(), &payload[..]);
    }

    #[test]
    fn test_blob_zero_length_chunks() {
        let format = FieldFmt::new(DataType::Blob);
        let mut payload = vec![0u8];
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&2u32.to_le_bytes());
        payload.extend_from_slice(&[1, 2]);
        payload.extend_from_slice(&BLOB_LAST_CHUNK.to_le_bytes());
        let mut rx = PacketQueue::from_payload(&payload, Endian::Little);
        let data = format.read_data(&mut rx).unwrap();
        assert_eq!(data.value.as_bytes().unwrap(), &[1, 2]);
        assert!(rx.all_packets_consumed());
    }

    #[test]
    fn test_invalid_blob_serialization() {
        let format = FieldFmt::new(DataType::Blob);
        let mut rx = PacketQueue::from_payload(&[1, 0, 0, 0, 0x80], Endian::Little);
        assert!(matches!(
            format.read_data(&mut rx),
            Err(ProtocolError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_text_pointer() {
        let format = FieldFmt::new(DataType::Text).with_max_length(1000);
        let (_, data) = roundtrip(&format, &FieldData::new("some text"));
        assert_eq!(data.value.as_str(), Some("some text"));
        assert!(matches!(data.extra, FieldExtra::TextPointer { .. }));

        let (bytes, data) = roundtrip(&format, &FieldData::new(SqlValue::Null));
        assert_eq!(bytes, vec![0]);
        assert!(data.value.is_null());
    }

    #[test]
    fn test_value_too_long_for_prefix() {
        let format = FieldFmt::new(DataType::VarChar);
        let mut tx = PacketQueue::new(PacketSize::default(), Endian::Little);
        let err = format
            .write_data(&mut tx, &FieldData::new("x".repeat(300)))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::TooLong { .. }));
    }
}
