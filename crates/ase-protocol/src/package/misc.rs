//! Small packages: language commands, logout, return status, order by,
//! control, and the packages without a token.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::error::ProtocolError;
use crate::field::FieldFmt;
use crate::flags::write_flags;
use crate::packet::PacketHeader;
use crate::queue::PacketQueue;
use crate::token::Token;

bitflags! {
    /// Status of a language command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LanguageStatus: u8 {
        /// Parameters follow.
        const HASARGS = 0x01;
        /// Parameters are sent in batches.
        const BATCH_PARAMS = 0x04;
    }
}

impl fmt::Display for LanguageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self, "NOARGS")
    }
}

/// A SQL command batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LanguagePackage {
    /// Status flags.
    pub status: LanguageStatus,
    /// Command text.
    pub command: String,
}

impl LanguagePackage {
    /// Create a language package without parameters.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            status: LanguageStatus::empty(),
            command: command.into(),
        }
    }

    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = queue.u32()? as usize;
        if length == 0 {
            return Err(ProtocolError::LengthMismatch {
                package: "Language",
                expected: 0,
                actual: 1,
            });
        }

        let status = LanguageStatus::from_bits_retain(queue.u8()?);
        let command = queue.string(length - 1)?;
        Ok(Self { status, command })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let length = 1 + self.command.len();
        let length = u32::try_from(length).map_err(|_| ProtocolError::TooLong {
            field: "Language",
            max: u32::MAX as usize,
            actual: length,
        })?;

        queue.write_u8(Token::Language.as_u8());
        queue.write_u32(length);
        queue.write_u8(self.status.bits());
        queue.write_string(&self.command);
        Ok(())
    }
}

impl fmt::Display for LanguagePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.command)
    }
}

/// Requests the end of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogoutPackage;

impl LogoutPackage {
    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        match queue.u8()? {
            0 => Ok(Self),
            other => Err(ProtocolError::InvalidValue {
                field: "logout options",
                value: u64::from(other),
            }),
        }
    }

    pub(crate) fn encode(self, queue: &mut PacketQueue) {
        queue.write_u8(Token::Logout.as_u8());
        queue.write_u8(0);
    }
}

/// Return status of a stored procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReturnStatusPackage {
    /// Returned value.
    pub value: i32,
}

impl ReturnStatusPackage {
    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        Ok(Self {
            value: queue.i32()?,
        })
    }

    pub(crate) fn encode(self, queue: &mut PacketQueue) {
        queue.write_u8(Token::ReturnStatus.as_u8());
        queue.write_i32(self.value);
    }
}

/// Sort order of the columns of the preceding row format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByPackage {
    /// Wide variant with 16 bit column numbers and a length.
    pub wide: bool,
    /// Column numbers in sort order.
    pub columns: Vec<u16>,
    /// Row formats the column numbers refer to.
    pub formats: Arc<[FieldFmt]>,
}

impl OrderByPackage {
    pub(crate) fn decode(
        queue: &mut PacketQueue,
        wide: bool,
        formats: Arc<[FieldFmt]>,
    ) -> Result<Self, ProtocolError> {
        if !wide {
            let count = queue.u16()?;
            let columns = (0..count)
                .map(|_| queue.u8().map(u16::from))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self {
                wide,
                columns,
                formats,
            });
        }

        let length = queue.u32()? as usize;
        let start = queue.consumed();
        let count = queue.u16()?;
        let columns = (0..count)
            .map(|_| queue.u16())
            .collect::<Result<Vec<_>, _>>()?;
        super::check_length("OrderBy2", length, start, queue)?;

        Ok(Self {
            wide,
            columns,
            formats,
        })
    }

    /// Names of the sort columns, where the row format knows them.
    /// Column numbers start at 1.
    pub fn column_names(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        self.columns.iter().map(|column| {
            usize::from(*column)
                .checked_sub(1)
                .and_then(|i| self.formats.get(i))
                .map(|f| f.name.as_str())
        })
    }
}

impl fmt::Display for OrderByPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.columns.len(), self.columns)
    }
}

/// Control package. Carries nothing on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlPackage;

/// Raw bytes of a response without a recognized token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenlessPackage {
    /// Payload including the leading byte.
    pub data: Vec<u8>,
}

impl TokenlessPackage {
    /// Read everything up to the end of the message.
    ///
    /// Waits for more packets until the message is complete.
    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        if !queue.received_eom() {
            return Err(ProtocolError::NotEnoughBytes);
        }
        Ok(Self {
            data: queue.remaining_bytes(),
        })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) {
        queue.write_bytes(&self.data);
    }
}

impl fmt::Display for TokenlessPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.first() {
            Some(byte) => write!(f, "possibleToken=0x{byte:02x}, {} bytes", self.data.len()),
            None => f.write_str("empty"),
        }
    }
}

/// A packet without payload, used to set up and tear down channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderOnlyPackage {
    /// Header of the packet.
    pub header: PacketHeader,
}

impl fmt::Display for HeaderOnlyPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Header: {}", self.header)
    }
}
