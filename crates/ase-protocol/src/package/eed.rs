//! Server messages: extended error data and the plain error package.

use std::fmt;

use bitflags::bitflags;

use super::done::TransState;
use super::{check_length, u8_string_len};
use crate::error::ProtocolError;
use crate::flags::write_flags;
use crate::queue::PacketQueue;
use crate::token::Token;

bitflags! {
    /// Status of an extended error data package.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EedStatus: u8 {
        /// More extended error data follows.
        const FOLLOWS = 0x01;
        /// The message is informational only.
        const INFO = 0x02;
    }
}

impl fmt::Display for EedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self, "NO_EED")
    }
}

/// Extended error data sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EedPackage {
    /// Server message number.
    pub msg_number: u32,
    /// Error state.
    pub state: u8,
    /// Severity class.
    pub class: u8,
    /// SQL state.
    pub sql_state: Vec<u8>,
    /// Status flags.
    pub status: EedStatus,
    /// Transaction state.
    pub tran_state: TransState,
    /// Message text without trailing newline.
    pub msg: String,
    /// Name of the server that produced the message.
    pub server_name: String,
    /// Name of the procedure that produced the message.
    pub proc_name: String,
    /// Line number within the batch or procedure.
    pub line_nr: u16,
}

impl EedPackage {
    /// Whether the message is informational only.
    #[must_use]
    pub fn is_info(&self) -> bool {
        self.status.contains(EedStatus::INFO)
    }

    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let msg_number = queue.u32()?;
        let state = queue.u8()?;
        let class = queue.u8()?;
        let sql_state_len = queue.u8()?;
        let sql_state = queue.bytes(usize::from(sql_state_len))?;
        let status = EedStatus::from_bits_retain(queue.u8()?);
        let tran_state = TransState::from_u16(queue.u16()?)?;

        let mut msg = queue.u16_string()?;
        if msg.ends_with('\n') {
            msg.pop();
        }

        let server_name = queue.u8_string()?;
        let proc_name = queue.u8_string()?;
        let line_nr = queue.u16()?;

        check_length("EED", length, start, queue)?;

        Ok(Self {
            msg_number,
            state,
            class,
            sql_state,
            status,
            tran_state,
            msg,
            server_name,
            proc_name,
            line_nr,
        })
    }

    fn length(&self) -> usize {
        4 + 1 + 1 + 1 + self.sql_state.len() + 1 + 2 + 2 + self.msg.len()
            + u8_string_len(&self.server_name)
            + u8_string_len(&self.proc_name)
            + 2
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let length = self.length();
        let length = u16::try_from(length).map_err(|_| ProtocolError::TooLong {
            field: "EED",
            max: usize::from(u16::MAX),
            actual: length,
        })?;
        let sql_state_len =
            u8::try_from(self.sql_state.len()).map_err(|_| ProtocolError::TooLong {
                field: "sql state",
                max: usize::from(u8::MAX),
                actual: self.sql_state.len(),
            })?;

        queue.write_u8(Token::Eed.as_u8());
        queue.write_u16(length);
        queue.write_u32(self.msg_number);
        queue.write_u8(self.state);
        queue.write_u8(self.class);
        queue.write_u8(sql_state_len);
        queue.write_bytes(&self.sql_state);
        queue.write_u8(self.status.bits());
        queue.write_u16(self.tran_state as u16);
        queue.write_u16_string("message", &self.msg)?;
        queue.write_u8_string("server name", &self.server_name)?;
        queue.write_u8_string("procedure name", &self.proc_name)?;
        queue.write_u16(self.line_nr);
        Ok(())
    }
}

impl fmt::Display for EedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Msg {}, Level {}, State {}, Server '{}'",
            self.msg_number, self.class, self.state, self.server_name
        )?;
        if !self.proc_name.is_empty() {
            write!(f, ", Procedure '{}'", self.proc_name)?;
        }
        write!(f, ", Line {} ({}): {}", self.line_nr, self.status, self.msg)
    }
}

/// Plain error or informational message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorPackage {
    /// Server message number.
    pub msg_number: i32,
    /// Error state.
    pub state: u8,
    /// Severity class.
    pub class: u8,
    /// Message text.
    pub msg: String,
    /// Name of the server that produced the message.
    pub server_name: String,
    /// Name of the procedure that produced the message.
    pub proc_name: String,
    /// Line number within the batch or procedure.
    pub line_nr: u16,
}

impl ErrorPackage {
    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let package = Self {
            msg_number: queue.i32()?,
            state: queue.u8()?,
            class: queue.u8()?,
            msg: queue.u16_string()?,
            server_name: queue.u8_string()?,
            proc_name: queue.u8_string()?,
            line_nr: queue.u16()?,
        };

        check_length("Error", length, start, queue)?;
        Ok(package)
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let length = 4
            + 1
            + 1
            + 2
            + self.msg.len()
            + u8_string_len(&self.server_name)
            + u8_string_len(&self.proc_name)
            + 2;
        let length = u16::try_from(length).map_err(|_| ProtocolError::TooLong {
            field: "Error",
            max: usize::from(u16::MAX),
            actual: length,
        })?;

        queue.write_u8(Token::Error.as_u8());
        queue.write_u16(length);
        queue.write_i32(self.msg_number);
        queue.write_u8(self.state);
        queue.write_u8(self.class);
        queue.write_u16_string("message", &self.msg)?;
        queue.write_u8_string("server name", &self.server_name)?;
        queue.write_u8_string("procedure name", &self.proc_name)?;
        queue.write_u16(self.line_nr);
        Ok(())
    }
}

impl fmt::Display for ErrorPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Msg {}, Level {}, State {}, Server '{}', Line {}: {}",
            self.msg_number, self.class, self.state, self.server_name, self.line_nr, self.msg
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ase_types::Endian;

    use super::*;
    use crate::package::Package;
    use crate::package::test_util::{decode, encode};

    fn sample() -> EedPackage {
        EedPackage {
            msg_number: 5701,
            state: 2,
            class: 10,
            sql_state: b"ZZZZZ".to_vec(),
            status: EedStatus::INFO,
            tran_state: TransState::NotInTran,
            msg: "Changed database context to 'master'.".into(),
            server_name: "ASE".into(),
            proc_name: String::new(),
            line_nr: 1,
        }
    }

    #[test]
    fn test_eed_trailing_newline_trimmed() {
        let mut eed = sample();
        eed.msg.push('\n');
        let bytes = encode(&Package::Eed(eed), Endian::Little);
        let Package::Eed(decoded) = decode(&bytes, Endian::Little) else {
            panic!("expected EED");
        };
        assert_eq!(decoded, sample());
        assert!(decoded.is_info());
    }

    #[test]
    fn test_eed_length_mismatch() {
        let mut bytes = encode(&Package::Eed(sample()), Endian::Little);
        // Declare one byte more than the body holds and append a filler.
        bytes[1] += 1;
        bytes.push(0);

        let mut queue = PacketQueue::from_payload(&bytes, Endian::Little);
        let err = Package::decode(&mut queue, None).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::LengthMismatch { package: "EED", .. }
        ));
    }

    #[test]
    fn test_info_token_decodes_as_error() {
        let error = ErrorPackage {
            msg_number: 102,
            state: 1,
            class: 15,
            msg: "Incorrect syntax".into(),
            server_name: "ASE".into(),
            proc_name: String::new(),
            line_nr: 3,
        };
        let mut bytes = encode(&Package::Error(error.clone()), Endian::Big);
        bytes[0] = Token::Info.as_u8();

        let Package::Error(decoded) = decode(&bytes, Endian::Big) else {
            panic!("expected error package");
        };
        assert_eq!(decoded, error);
        assert_eq!(
            decoded.to_string(),
            "Msg 102, Level 15, State 1, Server 'ASE', Line 3: Incorrect syntax"
        );
    }
}
