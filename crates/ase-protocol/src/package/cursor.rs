//! Cursor packages.
//!
//! Only the wire encoding is provided; cursor semantics are up to the
//! caller. Every package carries a declared length that is checked on
//! decode.

use std::fmt;

use bitflags::bitflags;

use super::{check_length, u8_string_len};
use crate::error::ProtocolError;
use crate::flags::write_flags;
use crate::queue::PacketQueue;
use crate::token::Token;

bitflags! {
    /// Options of a declared cursor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CursorOptions: u32 {
        /// Read only cursor.
        const RDONLY = 0x01;
        /// Updatable cursor.
        const UPDATABLE = 0x02;
        /// Sensitive cursor.
        const SENSITIVE = 0x04;
        /// Dynamic cursor.
        const DYNAMIC = 0x08;
        /// Implicit cursor.
        const IMPLICIT = 0x10;
        /// Insensitive cursor.
        const INSENSITIVE = 0x20;
        /// Semi-sensitive cursor.
        const SEMISENSITIVE = 0x40;
        /// Keyset driven cursor.
        const KEYSETDRIVEN = 0x80;
        /// Scrollable cursor.
        const SCROLLABLE = 0x100;
        /// Locks are released when the cursor is closed.
        const RELLOCKSONCLOSE = 0x200;
    }
}

bitflags! {
    /// Status of a cursor declare, open, delete or update.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CursorStatus: u8 {
        /// Parameters follow.
        const HASARGS = 0x01;
        /// Consecutive updates.
        const CONSEC_UPDS = 0x02;
    }
}

bitflags! {
    /// Options of a cursor close.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CursorCloseOptions: u8 {
        /// Deallocate the cursor.
        const DEALLOC = 0x01;
    }
}

bitflags! {
    /// Status reported by cursor info.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CursorInfoStatus: u32 {
        /// Cursor is declared.
        const DECLARED = 0x01;
        /// Cursor is open.
        const OPEN = 0x02;
        /// Cursor is closed.
        const CLOSED = 0x04;
        /// Cursor is read only.
        const RDONLY = 0x08;
        /// Cursor is updatable.
        const UPDATABLE = 0x10;
        /// The row count is valid.
        const ROWCNT = 0x20;
        /// Cursor is deallocated.
        const DEALLOC = 0x40;
        /// Cursor is scrollable.
        const SCROLLABLE = 0x80;
        /// Cursor is implicit.
        const IMPLICIT = 0x100;
        /// Cursor is sensitive.
        const SENSITIVE = 0x200;
        /// Cursor is insensitive.
        const INSENSITIVE = 0x400;
        /// Cursor is semi-sensitive.
        const SEMISENSITIVE = 0x800;
        /// Cursor is keyset driven.
        const KEYSETDRIVEN = 0x1000;
        /// Locks are released when the cursor is closed.
        const RELLOCKSONCLOSE = 0x2000;
    }
}

impl fmt::Display for CursorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self, "UNUSED")
    }
}

impl fmt::Display for CursorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self, "UNUSED")
    }
}

impl fmt::Display for CursorCloseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self, "UNUSED")
    }
}

impl fmt::Display for CursorInfoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self, "UNUSED")
    }
}

/// Identifies a cursor by id, or by name while the id is 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CursorRef {
    /// Cursor id assigned by the server.
    pub id: i32,
    /// Cursor name, only transmitted when `id` is 0.
    pub name: String,
}

impl CursorRef {
    /// Reference a cursor by id.
    #[must_use]
    pub fn id(id: i32) -> Self {
        Self {
            id,
            name: String::new(),
        }
    }

    /// Reference a cursor by name.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
        }
    }

    fn length(&self) -> usize {
        if self.id == 0 {
            4 + u8_string_len(&self.name)
        } else {
            4
        }
    }

    fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let id = queue.i32()?;
        let name = if id == 0 {
            queue.u8_string()?
        } else {
            String::new()
        };
        Ok(Self { id, name })
    }

    fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        queue.write_i32(self.id);
        if self.id == 0 {
            queue.write_u8_string("cursor name", &self.name)?;
        }
        Ok(())
    }
}

impl fmt::Display for CursorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == 0 {
            write!(f, "'{}'", self.name)
        } else {
            write!(f, "#{}", self.id)
        }
    }
}

fn length_u16(package: &'static str, length: usize) -> Result<u16, ProtocolError> {
    u16::try_from(length).map_err(|_| ProtocolError::TooLong {
        field: package,
        max: usize::from(u16::MAX),
        actual: length,
    })
}

/// Declares a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurDeclarePackage {
    /// Wide variant with 32 bit lengths and options.
    pub wide: bool,
    /// Cursor name.
    pub name: String,
    /// Cursor options.
    pub options: CursorOptions,
    /// Declare status.
    pub status: CursorStatus,
    /// Select statement.
    pub statement: String,
    /// Updatable columns.
    pub columns: Vec<String>,
}

impl CurDeclarePackage {
    pub(crate) fn decode(queue: &mut PacketQueue, wide: bool) -> Result<Self, ProtocolError> {
        let length = if wide {
            queue.u32()? as usize
        } else {
            usize::from(queue.u16()?)
        };
        let start = queue.consumed();

        let name = queue.u8_string()?;
        let options = if wide {
            CursorOptions::from_bits_retain(queue.u32()?)
        } else {
            CursorOptions::from_bits_retain(u32::from(queue.u8()?))
        };
        let status = CursorStatus::from_bits_retain(queue.u8()?);
        let statement = if wide {
            queue.u32_string()?
        } else {
            queue.u16_string()?
        };
        let count = queue.u16()?;
        let columns = (0..count)
            .map(|_| queue.u8_string())
            .collect::<Result<Vec<_>, _>>()?;

        check_length("CurDeclare", length, start, queue)?;
        Ok(Self {
            wide,
            name,
            options,
            status,
            statement,
            columns,
        })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let (options_len, statement_prefix) = if self.wide { (4, 4) } else { (1, 2) };
        let length = u8_string_len(&self.name)
            + options_len
            + 1
            + statement_prefix
            + self.statement.len()
            + 2
            + self.columns.iter().map(|c| u8_string_len(c)).sum::<usize>();
        let count = u16::try_from(self.columns.len()).map_err(|_| ProtocolError::TooLong {
            field: "cursor columns",
            max: usize::from(u16::MAX),
            actual: self.columns.len(),
        })?;

        if self.wide {
            queue.write_u8(Token::CurDeclare3.as_u8());
            let length = u32::try_from(length).map_err(|_| ProtocolError::TooLong {
                field: "CurDeclare",
                max: u32::MAX as usize,
                actual: length,
            })?;
            queue.write_u32(length);
        } else {
            queue.write_u8(Token::CurDeclare.as_u8());
            queue.write_u16(length_u16("CurDeclare", length)?);
        }

        queue.write_u8_string("cursor name", &self.name)?;
        if self.wide {
            queue.write_u32(self.options.bits());
        } else {
            let options =
                u8::try_from(self.options.bits()).map_err(|_| ProtocolError::InvalidValue {
                    field: "cursor options",
                    value: u64::from(self.options.bits()),
                })?;
            queue.write_u8(options);
        }
        queue.write_u8(self.status.bits());
        if self.wide {
            queue.write_u32_string("cursor statement", &self.statement)?;
        } else {
            queue.write_u16_string("cursor statement", &self.statement)?;
        }
        queue.write_u16(count);
        for column in &self.columns {
            queue.write_u8_string("cursor column", column)?;
        }
        Ok(())
    }
}

impl fmt::Display for CurDeclarePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}', {}, {}: {}",
            self.name, self.options, self.status, self.statement
        )
    }
}

/// Opens a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurOpenPackage {
    /// Cursor to open.
    pub cursor: CursorRef,
    /// Open status.
    pub status: CursorStatus,
}

impl CurOpenPackage {
    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let cursor = CursorRef::decode(queue)?;
        let status = CursorStatus::from_bits_retain(queue.u8()?);

        check_length("CurOpen", length, start, queue)?;
        Ok(Self { cursor, status })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let length = self.cursor.length() + 1;

        queue.write_u8(Token::CurOpen.as_u8());
        queue.write_u16(length_u16("CurOpen", length)?);
        self.cursor.encode(queue)?;
        queue.write_u8(self.status.bits());
        Ok(())
    }
}

impl fmt::Display for CurOpenPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.cursor, self.status)
    }
}

/// Closes a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurClosePackage {
    /// Cursor to close.
    pub cursor: CursorRef,
    /// Close options.
    pub options: CursorCloseOptions,
}

impl CurClosePackage {
    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let cursor = CursorRef::decode(queue)?;
        let options = CursorCloseOptions::from_bits_retain(queue.u8()?);

        check_length("CurClose", length, start, queue)?;
        Ok(Self { cursor, options })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let length = self.cursor.length() + 1;

        queue.write_u8(Token::CurClose.as_u8());
        queue.write_u16(length_u16("CurClose", length)?);
        self.cursor.encode(queue)?;
        queue.write_u8(self.options.bits());
        Ok(())
    }
}

impl fmt::Display for CurClosePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.cursor, self.options)
    }
}

/// Direction of a cursor fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchType {
    /// Next row.
    Next,
    /// Previous row.
    Prev,
    /// First row.
    First,
    /// Last row.
    Last,
    /// Absolute row number.
    Absolute(i32),
    /// Row number relative to the current row.
    Relative(i32),
}

impl FetchType {
    fn as_u8(self) -> u8 {
        match self {
            Self::Next => 1,
            Self::Prev => 2,
            Self::First => 3,
            Self::Last => 4,
            Self::Absolute(_) => 5,
            Self::Relative(_) => 6,
        }
    }
}

impl fmt::Display for FetchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => f.write_str("NEXT"),
            Self::Prev => f.write_str("PREV"),
            Self::First => f.write_str("FIRST"),
            Self::Last => f.write_str("LAST"),
            Self::Absolute(row) => write!(f, "ABS {row}"),
            Self::Relative(row) => write!(f, "REL {row}"),
        }
    }
}

/// Fetches from a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurFetchPackage {
    /// Cursor to fetch from.
    pub cursor: CursorRef,
    /// Fetch direction.
    pub fetch: FetchType,
}

impl CurFetchPackage {
    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let cursor = CursorRef::decode(queue)?;
        let fetch = match queue.u8()? {
            1 => FetchType::Next,
            2 => FetchType::Prev,
            3 => FetchType::First,
            4 => FetchType::Last,
            5 => FetchType::Absolute(queue.i32()?),
            6 => FetchType::Relative(queue.i32()?),
            other => {
                return Err(ProtocolError::InvalidValue {
                    field: "fetch type",
                    value: u64::from(other),
                });
            }
        };

        check_length("CurFetch", length, start, queue)?;
        Ok(Self { cursor, fetch })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let row = match self.fetch {
            FetchType::Absolute(row) | FetchType::Relative(row) => Some(row),
            _ => None,
        };
        let length = self.cursor.length() + 1 + if row.is_some() { 4 } else { 0 };

        queue.write_u8(Token::CurFetch.as_u8());
        queue.write_u16(length_u16("CurFetch", length)?);
        self.cursor.encode(queue)?;
        queue.write_u8(self.fetch.as_u8());
        if let Some(row) = row {
            queue.write_i32(row);
        }
        Ok(())
    }
}

impl fmt::Display for CurFetchPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.cursor, self.fetch)
    }
}

/// Deletes the current row of a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurDeletePackage {
    /// Cursor positioned on the row.
    pub cursor: CursorRef,
    /// Delete status.
    pub status: CursorStatus,
    /// Table to delete from.
    pub table: String,
}

impl CurDeletePackage {
    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let cursor = CursorRef::decode(queue)?;
        let status = CursorStatus::from_bits_retain(queue.u8()?);
        let table = queue.u8_string()?;

        check_length("CurDelete", length, start, queue)?;
        Ok(Self {
            cursor,
            status,
            table,
        })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let length = self.cursor.length() + 1 + u8_string_len(&self.table);

        queue.write_u8(Token::CurDelete.as_u8());
        queue.write_u16(length_u16("CurDelete", length)?);
        self.cursor.encode(queue)?;
        queue.write_u8(self.status.bits());
        queue.write_u8_string("table name", &self.table)?;
        Ok(())
    }
}

impl fmt::Display for CurDeletePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, '{}'", self.cursor, self.status, self.table)
    }
}

/// Updates the current row of a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurUpdatePackage {
    /// Cursor positioned on the row.
    pub cursor: CursorRef,
    /// Update status.
    pub status: CursorStatus,
    /// Table to update.
    pub table: String,
    /// Update statement, omitted on the wire when empty.
    pub statement: String,
}

impl CurUpdatePackage {
    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let cursor = CursorRef::decode(queue)?;
        let status = CursorStatus::from_bits_retain(queue.u8()?);
        let table = queue.u8_string()?;
        let statement = if queue.consumed() - start < length {
            queue.u16_string()?
        } else {
            String::new()
        };

        check_length("CurUpdate", length, start, queue)?;
        Ok(Self {
            cursor,
            status,
            table,
            statement,
        })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let mut length = self.cursor.length() + 1 + u8_string_len(&self.table);
        if !self.statement.is_empty() {
            length += 2 + self.statement.len();
        }

        queue.write_u8(Token::CurUpdate.as_u8());
        queue.write_u16(length_u16("CurUpdate", length)?);
        self.cursor.encode(queue)?;
        queue.write_u8(self.status.bits());
        queue.write_u8_string("table name", &self.table)?;
        if !self.statement.is_empty() {
            queue.write_u16_string("update statement", &self.statement)?;
        }
        Ok(())
    }
}

impl fmt::Display for CurUpdatePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, '{}'", self.cursor, self.status, self.table)?;
        if !self.statement.is_empty() {
            write!(f, ": {}", self.statement)?;
        }
        Ok(())
    }
}

/// Cursor info command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CursorCommand {
    /// Set the number of rows per fetch.
    SetCurRows = 1,
    /// Ask for cursor information.
    Inquire = 2,
    /// Report cursor information.
    Inform = 3,
    /// List all cursors.
    ListAll = 4,
}

impl CursorCommand {
    fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(Self::SetCurRows),
            2 => Ok(Self::Inquire),
            3 => Ok(Self::Inform),
            4 => Ok(Self::ListAll),
            _ => Err(ProtocolError::InvalidValue {
                field: "cursor command",
                value: u64::from(value),
            }),
        }
    }
}

impl fmt::Display for CursorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SetCurRows => "SETCURROWS",
            Self::Inquire => "INQUIRE",
            Self::Inform => "INFORM",
            Self::ListAll => "LISTALL",
        })
    }
}

/// Cursor information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurInfoPackage {
    /// Wide variant carrying row positions.
    pub wide: bool,
    /// Cursor the information is about.
    pub cursor: CursorRef,
    /// Info command.
    pub command: CursorCommand,
    /// Cursor status.
    pub status: CursorInfoStatus,
    /// Current row number, wide variant only.
    pub row_num: i32,
    /// Total number of rows, wide variant only.
    pub total_rows: i32,
    /// Rows per fetch, transmitted when [`CursorInfoStatus::ROWCNT`] is set.
    pub row_count: i32,
}

impl CurInfoPackage {
    pub(crate) fn decode(queue: &mut PacketQueue, wide: bool) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let cursor = CursorRef::decode(queue)?;
        let command = CursorCommand::from_u8(queue.u8()?)?;
        let status = if wide {
            CursorInfoStatus::from_bits_retain(queue.u32()?)
        } else {
            CursorInfoStatus::from_bits_retain(u32::from(queue.u16()?))
        };
        let (row_num, total_rows) = if wide {
            (queue.i32()?, queue.i32()?)
        } else {
            (0, 0)
        };
        let row_count = if status.contains(CursorInfoStatus::ROWCNT) {
            queue.i32()?
        } else {
            0
        };

        check_length("CurInfo", length, start, queue)?;
        Ok(Self {
            wide,
            cursor,
            command,
            status,
            row_num,
            total_rows,
            row_count,
        })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let mut length = self.cursor.length() + 1;
        length += if self.wide { 4 + 8 } else { 2 };
        if self.status.contains(CursorInfoStatus::ROWCNT) {
            length += 4;
        }

        let token = if self.wide {
            Token::CurInfo3
        } else {
            Token::CurInfo
        };
        queue.write_u8(token.as_u8());
        queue.write_u16(length_u16("CurInfo", length)?);
        self.cursor.encode(queue)?;
        queue.write_u8(self.command as u8);
        if self.wide {
            queue.write_u32(self.status.bits());
            queue.write_i32(self.row_num);
            queue.write_i32(self.total_rows);
        } else {
            let status =
                u16::try_from(self.status.bits()).map_err(|_| ProtocolError::InvalidValue {
                    field: "cursor info status",
                    value: u64::from(self.status.bits()),
                })?;
            queue.write_u16(status);
        }
        if self.status.contains(CursorInfoStatus::ROWCNT) {
            queue.write_i32(self.row_count);
        }
        Ok(())
    }
}

impl fmt::Display for CurInfoPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.cursor, self.command, self.status)?;
        if self.status.contains(CursorInfoStatus::ROWCNT) {
            write!(f, ", RowCount={}", self.row_count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ase_types::Endian;

    use super::*;
    use crate::package::Package;
    use crate::package::test_util::{decode, encode};

    #[test]
    fn test_cursor_name_only_without_id() {
        let by_name = Package::CurOpen(CurOpenPackage {
            cursor: CursorRef::name("c1"),
            status: CursorStatus::HASARGS,
        });
        assert_eq!(
            encode(&by_name, Endian::Little),
            [0x84, 8, 0, 0, 0, 0, 0, 2, b'c', b'1', 1]
        );

        let by_id = Package::CurOpen(CurOpenPackage {
            cursor: CursorRef::id(3),
            status: CursorStatus::empty(),
        });
        let bytes = encode(&by_id, Endian::Little);
        assert_eq!(bytes, [0x84, 5, 0, 3, 0, 0, 0, 0]);
        assert_eq!(decode(&bytes, Endian::Little), by_id);
    }

    #[test]
    fn test_fetch_row_number_only_for_abs_and_rel() {
        let next = Package::CurFetch(CurFetchPackage {
            cursor: CursorRef::id(1),
            fetch: FetchType::Next,
        });
        assert_eq!(encode(&next, Endian::Big).len(), 1 + 2 + 4 + 1);

        let abs = Package::CurFetch(CurFetchPackage {
            cursor: CursorRef::id(1),
            fetch: FetchType::Absolute(-5),
        });
        let bytes = encode(&abs, Endian::Big);
        assert_eq!(bytes.len(), 1 + 2 + 4 + 1 + 4);
        assert_eq!(decode(&bytes, Endian::Big), abs);
    }

    #[test]
    fn test_declare_narrow_and_wide() {
        let mut declare = CurDeclarePackage {
            wide: false,
            name: "c1".into(),
            options: CursorOptions::UPDATABLE,
            status: CursorStatus::empty(),
            statement: "select a from t".into(),
            columns: vec!["a".into()],
        };
        let bytes = encode(&Package::CurDeclare(declare.clone()), Endian::Little);
        assert_eq!(bytes[0], 0x86);
        assert_eq!(decode(&bytes, Endian::Little), Package::CurDeclare(declare.clone()));

        declare.wide = true;
        declare.options |= CursorOptions::SCROLLABLE;
        let bytes = encode(&Package::CurDeclare(declare.clone()), Endian::Little);
        assert_eq!(bytes[0], 0x10);
        assert_eq!(decode(&bytes, Endian::Little), Package::CurDeclare(declare));
    }

    #[test]
    fn test_update_statement_optional() {
        let mut update = CurUpdatePackage {
            cursor: CursorRef::id(9),
            status: CursorStatus::empty(),
            table: "t".into(),
            statement: String::new(),
        };
        let bytes = encode(&Package::CurUpdate(update.clone()), Endian::Little);
        assert_eq!(bytes[1], 4 + 1 + 2);
        assert_eq!(decode(&bytes, Endian::Little), Package::CurUpdate(update.clone()));

        update.statement = "update t set a = 1".into();
        let bytes = encode(&Package::CurUpdate(update.clone()), Endian::Little);
        assert_eq!(decode(&bytes, Endian::Little), Package::CurUpdate(update));
    }

    #[test]
    fn test_info_row_count() {
        let info = CurInfoPackage {
            wide: true,
            cursor: CursorRef::id(2),
            command: CursorCommand::Inform,
            status: CursorInfoStatus::OPEN | CursorInfoStatus::ROWCNT,
            row_num: 10,
            total_rows: 100,
            row_count: 25,
        };
        let bytes = encode(&Package::CurInfo(info.clone()), Endian::Big);
        assert_eq!(bytes[0], 0x88);
        assert_eq!(decode(&bytes, Endian::Big), Package::CurInfo(info.clone()));
        assert_eq!(info.to_string(), "#2, INFORM, OPEN|ROWCNT, RowCount=25");
    }

    #[test]
    fn test_close_length_mismatch() {
        let bytes = [0x80, 6, 0, 1, 0, 0, 0, 1, 0];
        let mut queue = PacketQueue::from_payload(&bytes, Endian::Little);
        assert!(matches!(
            Package::decode(&mut queue, None),
            Err(ProtocolError::LengthMismatch {
                package: "CurClose",
                expected: 6,
                actual: 5
            })
        ));
    }
}
