//! `LOGINACK` package.

use std::fmt;

use super::{check_length, u8_string_len};
use crate::error::ProtocolError;
use crate::queue::PacketQueue;
use crate::token::Token;
use crate::version::Version;

/// Outcome of a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoginAckStatus {
    /// Login succeeded.
    Succeed = 5,
    /// Login failed.
    Fail = 6,
    /// The server requires a negotiation before accepting the login.
    Negotiate = 7,
}

impl LoginAckStatus {
    /// Look up a status by value.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            5 => Ok(Self::Succeed),
            6 => Ok(Self::Fail),
            7 => Ok(Self::Negotiate),
            _ => Err(ProtocolError::InvalidValue {
                field: "login ack status",
                value: u64::from(value),
            }),
        }
    }
}

impl fmt::Display for LoginAckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Succeed => "LOG_SUCCEED",
            Self::Fail => "LOG_FAIL",
            Self::Negotiate => "LOG_NEGOTIATE",
        })
    }
}

/// Login acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAckPackage {
    /// Outcome of the login.
    pub status: LoginAckStatus,
    /// TDS version accepted by the server.
    pub tds_version: Version,
    /// Server program name.
    pub program_name: String,
    /// Server program version.
    pub program_version: Version,
}

impl LoginAckPackage {
    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let status = LoginAckStatus::from_u8(queue.u8()?)?;
        let tds_version = Version::from_bytes(&queue.bytes(4)?)?;
        let program_name = queue.u8_string()?;
        let program_version = Version::from_bytes(&queue.bytes(4)?)?;

        check_length("LoginAck", length, start, queue)?;
        Ok(Self {
            status,
            tds_version,
            program_name,
            program_version,
        })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let length = 1 + 4 + u8_string_len(&self.program_name) + 4;

        queue.write_u8(Token::LoginAck.as_u8());
        queue.write_u16(length as u16);
        queue.write_u8(self.status as u8);
        queue.write_bytes(&self.tds_version.to_bytes());
        queue.write_u8_string("program name", &self.program_name)?;
        queue.write_bytes(&self.program_version.to_bytes());
        Ok(())
    }
}

impl fmt::Display for LoginAckPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, TDS {}, {} {}",
            self.status, self.tds_version, self.program_name, self.program_version
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

    #[test]
    fn test_login_ack_wire_format() {
        let ack = Package::LoginAck(LoginAckPackage {
            status: LoginAckStatus::Negotiate,
            tds_version: Version::new(5, 0, 0, 0),
            program_name: "ASE".into(),
            program_version: Version::new(16, 0, 3, 2),
        });

        let bytes = encode(&ack, Endian::Little);
        assert_eq!(bytes[..4], [0xAD, 13, 0, 7]);
        assert_eq!(decode(&bytes, Endian::Little), ack);
    }

    #[test]
    fn test_login_ack_invalid_status() {
        let bytes = [0xAD, 13, 0, 9, 5, 0, 0, 0, 3, b'A', b'S', b'E', 16, 0, 3, 2];
        let mut queue = PacketQueue::from_payload(&bytes, Endian::Little);
        let err = Package::decode(&mut queue, None).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { value: 9, .. }));
    }
}
