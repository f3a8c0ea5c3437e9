//! `PARAMS`, `ROW` and `KEY` packages.
//!
//! None of these carry a length: the values are laid out as described by
//! the formats of a preceding package.

use std::fmt;
use std::sync::Arc;

use ase_types::{DataType, SqlValue, decode_value, encode_value};

use crate::error::ProtocolError;
use crate::field::{FieldData, FieldFmt};
use crate::queue::PacketQueue;
use crate::token::Token;

/// Parameter or row values bound to their formats.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPackage {
    /// Formats the values follow.
    pub formats: Arc<[FieldFmt]>,
    /// Values in format order.
    pub fields: Vec<FieldData>,
}

impl DataPackage {
    /// Create a data package for `formats`.
    #[must_use]
    pub fn new(formats: Arc<[FieldFmt]>, fields: Vec<FieldData>) -> Self {
        Self { formats, fields }
    }

    pub(crate) fn decode(
        queue: &mut PacketQueue,
        formats: Arc<[FieldFmt]>,
    ) -> Result<Self, ProtocolError> {
        let fields = formats
            .iter()
            .map(|format| format.read_data(queue))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { formats, fields })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue, token: Token) -> Result<(), ProtocolError> {
        if self.formats.len() != self.fields.len() {
            return Err(ProtocolError::FieldCountMismatch {
                formats: self.formats.len(),
                values: self.fields.len(),
            });
        }

        queue.write_u8(token.as_u8());
        for (format, field) in self.formats.iter().zip(&self.fields) {
            format.write_data(queue, field)?;
        }
        Ok(())
    }
}

impl fmt::Display for DataPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (format, field)) in self.formats.iter().zip(&self.fields).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if format.name.is_empty() {
                write!(f, "{field}")?;
            } else {
                write!(f, "{}={field}", format.name)?;
            }
        }
        f.write_str("]")
    }
}

/// Key value of the current row of a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPackage {
    /// Data type of the key.
    pub data_type: DataType,
    /// Key value.
    pub value: SqlValue,
}

impl KeyPackage {
    /// Data type of the first key column of `formats`.
    pub(crate) fn key_type(formats: &[FieldFmt]) -> Option<DataType> {
        formats.iter().find(|f| f.is_key()).map(|f| f.data_type)
    }

    pub(crate) fn decode(
        queue: &mut PacketQueue,
        data_type: DataType,
    ) -> Result<Self, ProtocolError> {
        let len = match data_type.byte_size() {
            Some(size) => size,
            None => usize::from(queue.u8()?),
        };
        let bytes = queue.bytes(len)?;
        let value = decode_value(data_type, queue.endian(), &bytes)?;
        Ok(Self { data_type, value })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let fixed = self.data_type.byte_size();
        let bytes = encode_value(self.data_type, queue.endian(), &self.value, fixed)?;

        queue.write_u8(Token::Key.as_u8());
        if fixed.is_none() {
            let len = u8::try_from(bytes.len()).map_err(|_| ProtocolError::TooLong {
                field: "key",
                max: usize::from(u8::MAX),
                actual: bytes.len(),
            })?;
            queue.write_u8(len);
        }
        queue.write_bytes(&bytes);
        Ok(())
    }
}

impl fmt::Display for KeyPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.data_type, self.value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ase_types::{Decimal, Endian};

    use super::*;
    use crate::field::RowFmtStatus;
    use crate::package::format::{FormatKind, FormatPackage};
    use crate::package::test_util::{decode_after, encode};
    use crate::package::Package;

    fn row_fmt() -> FormatPackage {
        FormatPackage::new(
            FormatKind::Row,
            false,
            vec![
                FieldFmt::new(DataType::Int4)
                    .with_name("id")
                    .with_status(RowFmtStatus::KEY.bits()),
                FieldFmt::new(DataType::VarChar).with_name("name"),
                FieldFmt::new(DataType::NumN)
                    .with_name("amount")
                    .with_precision_scale(10, 2),
            ],
        )
    }

    fn row(fmt: &FormatPackage) -> DataPackage {
        fmt.data(vec![
            FieldData::new(7),
            FieldData::new("seven"),
            FieldData::new(Decimal::parse(10, 2, "7.25").unwrap()),
        ])
    }

    #[test]
    fn test_row_follows_row_fmt() {
        let fmt = row_fmt();
        let preceding = Package::RowFmt(fmt.clone());
        let package = Package::Row(row(&fmt));

        let bytes = encode(&package, Endian::Little);
        assert_eq!(bytes[..5], [0xD1, 7, 0, 0, 0]);
        assert_eq!(decode_after(&bytes, Endian::Little, &preceding), package);

        // A second row decodes with the formats of the first.
        assert_eq!(decode_after(&bytes, Endian::Little, &package), package);
        assert_eq!(
            package.to_string(),
            r#"Row([id=7, name="seven", amount=7.25])"#
        );
    }

    #[test]
    fn test_row_without_format() {
        let bytes = [0xD1, 7, 0, 0, 0];
        let mut queue = PacketQueue::from_payload(&bytes, Endian::Little);
        let err = Package::decode(&mut queue, None).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingFormat { package: "Row" }));

        let mut queue = PacketQueue::from_payload(&bytes, Endian::Little);
        let preceding = Package::Done(Default::default());
        let err = Package::decode(&mut queue, Some(&preceding)).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidPredecessor { package: "Row", .. }
        ));
    }

    #[test]
    fn test_field_count_mismatch() {
        let fmt = row_fmt();
        let package = Package::Params(fmt.data(vec![FieldData::new(1)]));
        let mut queue = PacketQueue::new(Default::default(), Endian::Little);
        assert!(matches!(
            package.encode(&mut queue),
            Err(ProtocolError::FieldCountMismatch {
                formats: 3,
                values: 1
            })
        ));
    }

    #[test]
    fn test_key_uses_key_column_type() {
        let preceding = Package::RowFmt(row_fmt());
        let key = Package::Key(KeyPackage {
            data_type: DataType::Int4,
            value: SqlValue::Int(42),
        });

        let bytes = encode(&key, Endian::Big);
        assert_eq!(bytes, [0xCA, 0, 0, 0, 42]);
        assert_eq!(decode_after(&bytes, Endian::Big, &preceding), key);
    }

    #[test]
    fn test_variable_key_has_length() {
        let key = Package::Key(KeyPackage {
            data_type: DataType::VarChar,
            value: SqlValue::String("ab".into()),
        });
        assert_eq!(encode(&key, Endian::Little), [0xCA, 2, b'a', b'b']);
    }
}
