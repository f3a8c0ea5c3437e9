//! `DYNAMIC` and `DYNAMIC2` packages for prepared statements.

use std::fmt;

use bitflags::bitflags;

use super::{check_length, u8_string_len};
use crate::error::ProtocolError;
use crate::flags::write_flags;
use crate::queue::PacketQueue;
use crate::token::Token;

bitflags! {
    /// Operation of a dynamic package. The empty set is invalid.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DynamicOperation: u8 {
        /// Prepare a statement.
        const PREPARE = 0x01;
        /// Execute a prepared statement.
        const EXEC = 0x02;
        /// Deallocate a prepared statement.
        const DEALLOC = 0x04;
        /// Prepare and execute in one step.
        const EXEC_IMMED = 0x08;
        /// Procedure name.
        const PROCNAME = 0x10;
        /// Acknowledgment.
        const ACK = 0x20;
        /// Describe input parameters.
        const DESCIN = 0x40;
        /// Describe output columns.
        const DESCOUT = 0x80;
    }
}

impl fmt::Display for DynamicOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self, "INVALID")
    }
}

bitflags! {
    /// Status of a dynamic package.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DynamicStatus: u8 {
        /// Parameters follow.
        const HASARGS = 0x01;
        /// Suppress the row format.
        const SUPPRESS_FMT = 0x02;
        /// Parameters are sent in batches.
        const BATCH_PARAMS = 0x04;
        /// Suppress the parameter format.
        const SUPPRESS_PARAMFMT = 0x08;
    }
}

impl fmt::Display for DynamicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self, "UNUSED")
    }
}

/// Prepared statement handling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DynamicPackage {
    /// Wide variant with 32 bit lengths.
    pub wide: bool,
    /// Requested operation.
    pub operation: DynamicOperation,
    /// Status flags.
    pub status: DynamicStatus,
    /// Statement id.
    pub id: String,
    /// Statement text, transmitted for prepare and immediate execution.
    pub statement: String,
}

impl DynamicPackage {
    fn has_statement(&self) -> bool {
        self.operation
            .intersects(DynamicOperation::PREPARE | DynamicOperation::EXEC_IMMED)
    }

    fn name(&self) -> &'static str {
        if self.wide { "Dynamic2" } else { "Dynamic" }
    }

    pub(crate) fn decode(queue: &mut PacketQueue, wide: bool) -> Result<Self, ProtocolError> {
        let length = if wide {
            queue.u32()? as usize
        } else {
            usize::from(queue.u16()?)
        };
        let start = queue.consumed();

        let mut package = Self {
            wide,
            operation: DynamicOperation::from_bits_retain(queue.u8()?),
            status: DynamicStatus::from_bits_retain(queue.u8()?),
            id: queue.u8_string()?,
            statement: String::new(),
        };
        if package.has_statement() {
            package.statement = if wide {
                queue.u32_string()?
            } else {
                queue.u16_string()?
            };
        }

        check_length(package.name(), length, start, queue)?;
        Ok(package)
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        if self.operation.is_empty() {
            return Err(ProtocolError::Unsupported("dynamic package without operation"));
        }

        let mut length = 1 + 1 + u8_string_len(&self.id);
        if self.has_statement() {
            let prefix = if self.wide { 4 } else { 2 };
            length += prefix + self.statement.len();
        }

        let max = if self.wide {
            i32::MAX as usize
        } else {
            i16::MAX as usize
        };
        if length >= max {
            return Err(ProtocolError::TooLong {
                field: self.name(),
                max,
                actual: length,
            });
        }

        if self.wide {
            queue.write_u8(Token::Dynamic2.as_u8());
            queue.write_u32(length as u32);
        } else {
            queue.write_u8(Token::Dynamic.as_u8());
            queue.write_u16(length as u16);
        }
        queue.write_u8(self.operation.bits());
        queue.write_u8(self.status.bits());
        queue.write_u8_string("statement id", &self.id)?;
        if self.has_statement() {
            if self.wide {
                queue.write_u32_string("statement", &self.statement)?;
            } else {
                queue.write_u16_string("statement", &self.statement)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for DynamicPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, '{}'", self.operation, self.status, self.id)?;
        if self.has_statement() {
            write!(f, ": {}", self.statement)?;
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
    fn test_prepare_carries_statement() {
        let prepare = Package::Dynamic(DynamicPackage {
            wide: false,
            operation: DynamicOperation::PREPARE,
            status: DynamicStatus::empty(),
            id: "s1".into(),
            statement: "create proc s1 as select 1".into(),
        });
        let bytes = encode(&prepare, Endian::Little);
        assert_eq!(bytes[..3], [0xE7, 33, 0]);
        assert_eq!(decode(&bytes, Endian::Little), prepare);
    }

    #[test]
    fn test_exec_omits_statement() {
        let exec = DynamicPackage {
            wide: true,
            operation: DynamicOperation::EXEC,
            status: DynamicStatus::HASARGS,
            id: "s1".into(),
            statement: "ignored".into(),
        };
        let bytes = encode(&Package::Dynamic(exec.clone()), Endian::Big);
        assert_eq!(bytes, [0x62, 0, 0, 0, 5, 2, 1, 2, b's', b'1']);

        let Package::Dynamic(decoded) = decode(&bytes, Endian::Big) else {
            panic!("expected dynamic package");
        };
        assert_eq!(decoded.statement, "");
        assert_eq!(decoded.to_string(), "EXEC, HASARGS, 's1'");
    }

    #[test]
    fn test_invalid_operation() {
        let invalid = Package::Dynamic(DynamicPackage::default());
        let mut queue = PacketQueue::new(Default::default(), Endian::Little);
        assert!(matches!(
            invalid.encode(&mut queue),
            Err(ProtocolError::Unsupported(_))
        ));
    }
}
