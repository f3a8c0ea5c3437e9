//! `PARAMFMT`, `PARAMFMT2`, `ROWFMT` and `ROWFMT2` packages.

use std::fmt;
use std::sync::Arc;

use ase_types::DataType;

use super::data::DataPackage;
use super::{check_length, u8_string_len};
use crate::error::ProtocolError;
use crate::field::{FieldData, FieldFmt};
use crate::queue::PacketQueue;
use crate::token::Token;

/// Whether a format describes parameters or result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// Parameter format.
    Param,
    /// Row format.
    Row,
}

/// Ordered field formats for the following parameters or rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPackage {
    /// Parameters or rows.
    pub kind: FormatKind,
    /// Wide variant with 32 bit lengths and status.
    pub wide: bool,
    /// Field formats in order.
    pub formats: Arc<[FieldFmt]>,
}

impl FormatPackage {
    /// Create a format package.
    #[must_use]
    pub fn new(kind: FormatKind, wide: bool, formats: Vec<FieldFmt>) -> Self {
        Self {
            kind,
            wide,
            formats: formats.into(),
        }
    }

    /// Data package of values for these formats.
    #[must_use]
    pub fn data(&self, fields: Vec<FieldData>) -> DataPackage {
        DataPackage::new(Arc::clone(&self.formats), fields)
    }

    pub(crate) fn token(&self) -> Token {
        match (self.kind, self.wide) {
            (FormatKind::Param, false) => Token::ParamFmt,
            (FormatKind::Param, true) => Token::ParamFmt2,
            (FormatKind::Row, false) => Token::RowFmt,
            (FormatKind::Row, true) => Token::RowFmt2,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match (self.kind, self.wide) {
            (FormatKind::Param, false) => "ParamFmt",
            (FormatKind::Param, true) => "ParamFmt2",
            (FormatKind::Row, false) => "RowFmt",
            (FormatKind::Row, true) => "RowFmt2",
        }
    }

    fn has_labels(&self) -> bool {
        self.kind == FormatKind::Row && self.wide
    }

    pub(crate) fn decode(
        queue: &mut PacketQueue,
        kind: FormatKind,
        wide: bool,
    ) -> Result<Self, ProtocolError> {
        let mut package = Self::new(kind, wide, Vec::new());

        let length = if wide {
            queue.u32()? as usize
        } else {
            usize::from(queue.u16()?)
        };
        let start = queue.consumed();

        let count = queue.u16()?;
        let mut formats = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let (column_label, catalogue, schema, table) = if package.has_labels() {
                (
                    queue.u8_string()?,
                    queue.u8_string()?,
                    queue.u8_string()?,
                    queue.u8_string()?,
                )
            } else {
                Default::default()
            };

            let name = queue.u8_string()?;
            let status = if wide {
                queue.u32()?
            } else {
                u32::from(queue.u8()?)
            };
            let user_type = queue.i32()?;
            let raw_type = queue.u8()?;
            let data_type = DataType::from_u8(raw_type)?;

            let mut format = FieldFmt::new(data_type);
            format.name = name;
            format.status = status;
            format.user_type = user_type;
            format.column_label = column_label;
            format.catalogue = catalogue;
            format.schema = schema;
            format.table = table;
            format.read_type_info(queue)?;
            format.locale = queue.u8_string()?;
            formats.push(format);
        }

        check_length(package.name(), length, start, queue)?;
        package.formats = formats.into();
        Ok(package)
    }

    fn field_length(&self, format: &FieldFmt) -> usize {
        let labels = if self.has_labels() {
            u8_string_len(&format.column_label)
                + u8_string_len(&format.catalogue)
                + u8_string_len(&format.schema)
                + u8_string_len(&format.table)
        } else {
            0
        };
        let status = if self.wide { 4 } else { 1 };

        labels
            + u8_string_len(&format.name)
            + status
            + 4
            + 1
            + format.type_info_len()
            + u8_string_len(&format.locale)
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let count = u16::try_from(self.formats.len()).map_err(|_| ProtocolError::TooLong {
            field: "field count",
            max: usize::from(u16::MAX),
            actual: self.formats.len(),
        })?;
        let length = 2 + self
            .formats
            .iter()
            .map(|f| self.field_length(f))
            .sum::<usize>();

        queue.write_u8(self.token().as_u8());
        if self.wide {
            let length = u32::try_from(length).map_err(|_| ProtocolError::TooLong {
                field: self.name(),
                max: u32::MAX as usize,
                actual: length,
            })?;
            queue.write_u32(length);
        } else {
            let length = u16::try_from(length).map_err(|_| ProtocolError::TooLong {
                field: self.name(),
                max: usize::from(u16::MAX),
                actual: length,
            })?;
            queue.write_u16(length);
        }
        queue.write_u16(count);

        for format in self.formats.iter() {
            if self.has_labels() {
                queue.write_u8_string("column label", &format.column_label)?;
                queue.write_u8_string("catalogue", &format.catalogue)?;
                queue.write_u8_string("schema", &format.schema)?;
                queue.write_u8_string("table", &format.table)?;
            }

            queue.write_u8_string("field name", &format.name)?;
            if self.wide {
                queue.write_u32(format.status);
            } else {
                let status = u8::try_from(format.status).map_err(|_| {
                    ProtocolError::InvalidValue {
                        field: "field status",
                        value: u64::from(format.status),
                    }
                })?;
                queue.write_u8(status);
            }
            queue.write_i32(format.user_type);
            queue.write_u8(format.data_type.as_u8());
            format.write_type_info(queue)?;
            queue.write_u8_string("locale", &format.locale)?;
        }
        Ok(())
    }
}

impl fmt::Display for FormatPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, format) in self.formats.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{format}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ase_types::Endian;

    use super::*;
    use crate::field::{FormatShape, RowFmtStatus};
    use crate::package::Package;
    use crate::package::test_util::{decode, encode};

    fn formats() -> Vec<FieldFmt> {
        vec![
            FieldFmt::new(DataType::IntN).with_name("id").with_max_length(4),
            FieldFmt::new(DataType::VarChar).with_name("name"),
            FieldFmt::new(DataType::NumN)
                .with_name("amount")
                .with_precision_scale(10, 2),
        ]
    }

    #[test]
    fn test_param_fmt_wire_format() {
        let package = Package::ParamFmt(FormatPackage::new(
            FormatKind::Param,
            false,
            vec![FieldFmt::new(DataType::IntN).with_name("a").with_max_length(4)],
        ));
        let bytes = encode(&package, Endian::Little);
        assert_eq!(
            bytes,
            [
                0xEC, 12, 0, // token and length
                1, 0, // count
                1, b'a', // name
                0,    // status
                0, 0, 0, 0, // user type
                0x26, 4, // INTN and its length
                0, // locale
            ]
        );
        assert_eq!(decode(&bytes, Endian::Little), package);
    }

    #[test]
    fn test_wide_row_fmt_carries_labels() {
        let mut formats = formats();
        formats[0].column_label = "ID".into();
        formats[0].table = "accounts".into();
        formats[0].status = RowFmtStatus::KEY.bits() | RowFmtStatus::IDENTITY.bits();
        let package = Package::RowFmt(FormatPackage::new(FormatKind::Row, true, formats));

        let bytes = encode(&package, Endian::Big);
        assert_eq!(bytes[0], 0x61);
        let decoded = decode(&bytes, Endian::Big);
        assert_eq!(decoded, package);

        let Package::RowFmt(row_fmt) = decoded else {
            panic!("expected row format");
        };
        assert!(row_fmt.formats[0].is_key());
        assert_eq!(
            row_fmt.formats[2].shape,
            FormatShape::LengthPrecisionScale {
                precision: 10,
                scale: 2
            }
        );
    }

    #[test]
    fn test_row_fmt_length_mismatch() {
        let package = Package::RowFmt(FormatPackage::new(FormatKind::Row, false, formats()));
        let mut bytes = encode(&package, Endian::Little);
        bytes[1] -= 1;

        let mut queue = PacketQueue::from_payload(&bytes, Endian::Little);
        let err = Package::decode(&mut queue, None).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::LengthMismatch {
                package: "RowFmt",
                ..
            }
        ));
    }

    #[test]
    fn test_narrow_status_overflow() {
        let format = FieldFmt::new(DataType::Int4).with_status(0x100);
        let package = Package::ParamFmt(FormatPackage::new(FormatKind::Param, false, vec![format]));
        let mut queue = PacketQueue::new(Default::default(), Endian::Little);
        assert!(matches!(
            package.encode(&mut queue),
            Err(ProtocolError::InvalidValue { .. })
        ));
    }
}
