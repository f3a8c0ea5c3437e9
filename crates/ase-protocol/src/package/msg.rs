//! `MSG` package, used to signal sub-negotiations such as password
//! encryption.

use std::fmt;

use crate::error::ProtocolError;
use crate::queue::PacketQueue;
use crate::token::Token;

/// Whether parameters follow the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MsgStatus {
    /// No parameters follow.
    #[default]
    HasNoArgs = 0,
    /// A parameter format and parameters follow.
    HasArgs = 1,
}

impl fmt::Display for MsgStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HasNoArgs => "HASNOARGS",
            Self::HasArgs => "HASARGS",
        })
    }
}

macro_rules! msg_ids {
    ($($variant:ident = $value:literal => $name:literal,)+) => {
        /// Message identifier.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum MsgId {
            $(
                #[doc = concat!("`TDS_MSG_", $name, "`")]
                $variant = $value,
            )+
        }

        impl MsgId {
            /// Look up a message id by value.
            pub fn from_u16(value: u16) -> Result<Self, ProtocolError> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(ProtocolError::InvalidValue {
                        field: "message id",
                        value: u64::from(value),
                    }),
                }
            }

            /// Protocol name without prefix.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }
    };
}

msg_ids! {
    SecEncrypt = 1 => "SEC_ENCRYPT",
    SecLogPwd = 2 => "SEC_LOGPWD",
    SecRemPwd = 3 => "SEC_REMPWD",
    SecChallenge = 4 => "SEC_CHALLENGE",
    SecResponse = 5 => "SEC_RESPONSE",
    SecGetLabel = 6 => "SEC_GETLABEL",
    SecLabel = 7 => "SEC_LABEL",
    SqlTblName = 8 => "SQL_TBLNAME",
    GwReserved = 9 => "GW_RESERVED",
    OmniCapabilities = 10 => "OMNI_CAPABILITIES",
    SecOpaque = 11 => "SEC_OPAQUE",
    HaFailover = 12 => "HAFAILOVER",
    Empty = 13 => "EMPTY",
    SecEncrypt2 = 14 => "SEC_ENCRYPT2",
    SecLogPwd2 = 15 => "SEC_LOGPWD2",
    SecSupCipher2 = 16 => "SEC_SUP_CIPHER2",
    MigReq = 17 => "MIG_REQ",
    MigSync = 18 => "MIG_SYNC",
    MigCont = 19 => "MIG_CONT",
    MigIgn = 20 => "MIG_IGN",
    MigFail = 21 => "MIG_FAIL",
    SecRemPwd2 = 22 => "SEC_REMPWD2",
    MigResume = 23 => "MIG_RESUME",
    Hello = 24 => "HELLO",
    LoginParams = 25 => "LOGINPARAMS",
    GridMigReq = 26 => "GRID_MIGREQ",
    GridQuiesce = 27 => "GRID_QUIESCE",
    GridUnquiesce = 28 => "GRID_UNQUIESCE",
    GridEvent = 29 => "GRID_EVENT",
    SecEncrypt3 = 30 => "SEC_ENCRYPT3",
    SecLogPwd3 = 31 => "SEC_LOGPWD3",
    SecRemPwd3 = 32 => "SEC_REMPWD3",
    DrMap = 33 => "DR_MAP",
    SecSymKey = 34 => "SEC_SYMKEY",
    SecEncrypt4 = 35 => "SEC_ENCRYPT4",
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Message package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgPackage {
    /// Whether parameters follow.
    pub status: MsgStatus,
    /// Message identifier.
    pub msg_id: MsgId,
}

impl MsgPackage {
    const LENGTH: u8 = 3;

    /// Create a message package.
    #[must_use]
    pub fn new(status: MsgStatus, msg_id: MsgId) -> Self {
        Self { status, msg_id }
    }

    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = queue.u8()?;
        if length != Self::LENGTH {
            return Err(ProtocolError::LengthMismatch {
                package: "Msg",
                expected: usize::from(length),
                actual: usize::from(Self::LENGTH),
            });
        }

        let status = match queue.u8()? {
            0 => MsgStatus::HasNoArgs,
            1 => MsgStatus::HasArgs,
            other => {
                return Err(ProtocolError::InvalidValue {
                    field: "message status",
                    value: u64::from(other),
                });
            }
        };
        let msg_id = MsgId::from_u16(queue.u16()?)?;
        Ok(Self { status, msg_id })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) {
        queue.write_u8(Token::Msg.as_u8());
        queue.write_u8(Self::LENGTH);
        queue.write_u8(self.status as u8);
        queue.write_u16(self.msg_id as u16);
    }
}

impl fmt::Display for MsgPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.status, self.msg_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ase_types::Endian;

    use super::*;
    use crate::package::test_util::{decode, encode};
    use crate::package::Package;

    #[test]
    fn test_msg_wire_format() {
        let msg = MsgPackage::new(MsgStatus::HasArgs, MsgId::SecEncrypt4);
        let bytes = encode(&Package::Msg(msg), Endian::Big);
        assert_eq!(bytes, [0x65, 3, 1, 0, 35]);
        assert_eq!(decode(&bytes, Endian::Big), Package::Msg(msg));
    }

    #[test]
    fn test_msg_unknown_id() {
        let err = MsgId::from_u16(99).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { value: 99, .. }));
        assert_eq!(MsgId::SecLogPwd3.to_string(), "SEC_LOGPWD3");
    }
}
