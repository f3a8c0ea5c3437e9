//! `ENVCHANGE` package.

use std::fmt;

use super::{check_length, u8_string_len};
use crate::error::ProtocolError;
use crate::queue::PacketQueue;
use crate::token::Token;

/// Environment variable changed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvChangeType {
    /// Current database.
    Database = 1,
    /// Language.
    Language = 2,
    /// Character set.
    Charset = 3,
    /// Packet size.
    PacketSize = 4,
}

impl EnvChangeType {
    /// Look up a type by value.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(Self::Database),
            2 => Ok(Self::Language),
            3 => Ok(Self::Charset),
            4 => Ok(Self::PacketSize),
            _ => Err(ProtocolError::InvalidValue {
                field: "environment change type",
                value: u64::from(value),
            }),
        }
    }
}

impl fmt::Display for EnvChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Database => "ENV_DB",
            Self::Language => "ENV_LANG",
            Self::Charset => "ENV_CHARSET",
            Self::PacketSize => "ENV_PACKSIZE",
        })
    }
}

/// A single changed variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvChangeMember {
    /// Changed variable.
    pub kind: EnvChangeType,
    /// New value.
    pub new_value: String,
    /// Previous value.
    pub old_value: String,
}

impl EnvChangeMember {
    fn length(&self) -> usize {
        1 + u8_string_len(&self.new_value) + u8_string_len(&self.old_value)
    }
}

/// One or more environment changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvChangePackage {
    /// Changed variables in wire order.
    pub members: Vec<EnvChangeMember>,
}

impl EnvChangePackage {
    /// New packet size, if this package changes it.
    ///
    /// The last member wins when the size changes more than once.
    #[must_use]
    pub fn packet_size(&self) -> Option<usize> {
        self.members
            .iter()
            .rev()
            .filter(|m| m.kind == EnvChangeType::PacketSize)
            .find_map(|m| m.new_value.trim().parse().ok())
    }

    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let mut members = Vec::new();
        while queue.consumed() - start < length {
            let kind = EnvChangeType::from_u8(queue.u8()?)?;
            let new_value = queue.u8_string()?;
            let old_value = queue.u8_string()?;
            members.push(EnvChangeMember {
                kind,
                new_value,
                old_value,
            });
        }

        check_length("EnvChange", length, start, queue)?;
        Ok(Self { members })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let length: usize = self.members.iter().map(EnvChangeMember::length).sum();
        let length = u16::try_from(length).map_err(|_| ProtocolError::TooLong {
            field: "EnvChange",
            max: usize::from(u16::MAX),
            actual: length,
        })?;

        queue.write_u8(Token::EnvChange.as_u8());
        queue.write_u16(length);
        for member in &self.members {
            queue.write_u8(member.kind as u8);
            queue.write_u8_string("new value", &member.new_value)?;
            queue.write_u8_string("old value", &member.old_value)?;
        }
        Ok(())
    }
}

impl fmt::Display for EnvChangePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{}: '{}' -> '{}'",
                member.kind, member.old_value, member.new_value
            )?;
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
    fn test_env_change_members() {
        let env = EnvChangePackage {
            members: vec![
                EnvChangeMember {
                    kind: EnvChangeType::Database,
                    new_value: "master".into(),
                    old_value: String::new(),
                },
                EnvChangeMember {
                    kind: EnvChangeType::PacketSize,
                    new_value: "2048".into(),
                    old_value: "512".into(),
                },
            ],
        };

        let bytes = encode(&Package::EnvChange(env.clone()), Endian::Little);
        // length covers both members: (1 + 7 + 1) + (1 + 5 + 4)
        assert_eq!(bytes[..3], [0xE3, 19, 0]);
        assert_eq!(decode(&bytes, Endian::Little), Package::EnvChange(env.clone()));
        assert_eq!(env.packet_size(), Some(2048));
        assert_eq!(
            env.to_string(),
            "ENV_DB: '' -> 'master', ENV_PACKSIZE: '512' -> '2048'"
        );
    }

    #[test]
    fn test_env_change_overrun_is_length_mismatch() {
        // Declared length 4 ends inside the member, which needs 5 bytes.
        let bytes = [0xE3, 4, 0, 1, 1, b'a', 1, b'b'];
        let mut queue = PacketQueue::from_payload(&bytes, Endian::Little);
        let err = Package::decode(&mut queue, None).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::LengthMismatch {
                expected: 4,
                actual: 5,
                ..
            }
        ));
    }
}
