//! Packages: the protocol messages carried by packets.
//!
//! A package starts with a [`Token`] byte that selects its layout.
//! [`Package::decode`] reads one package from a [`PacketQueue`];
//! [`Package::encode`] writes one, including its token.
//!
//! Decoding is speculative: when the queue runs dry the decode fails with
//! [`ProtocolError::NotEnoughBytes`] and the caller restores the queue
//! position and retries once more packets have arrived.

pub mod capability;
pub mod cursor;
pub mod data;
pub mod done;
pub mod dynamic;
pub mod eed;
pub mod env_change;
pub mod format;
pub mod login_ack;
pub mod misc;
pub mod msg;

use std::fmt;
use std::sync::Arc;

pub use capability::{
    CapabilityPackage, CapabilityType, RequestCapability, ResponseCapability, ValueMask,
};
pub use cursor::{
    CurClosePackage, CurDeclarePackage, CurDeletePackage, CurFetchPackage, CurInfoPackage,
    CurOpenPackage, CurUpdatePackage, CursorCloseOptions, CursorCommand, CursorInfoStatus,
    CursorOptions, CursorRef, CursorStatus, FetchType,
};
pub use data::{DataPackage, KeyPackage};
pub use done::{DonePackage, DoneState, TransState};
pub use dynamic::{DynamicOperation, DynamicPackage, DynamicStatus};
pub use eed::{EedPackage, EedStatus, ErrorPackage};
pub use env_change::{EnvChangeMember, EnvChangePackage, EnvChangeType};
pub use format::{FormatKind, FormatPackage};
pub use login_ack::{LoginAckPackage, LoginAckStatus};
pub use misc::{
    ControlPackage, HeaderOnlyPackage, LanguagePackage, LanguageStatus, LogoutPackage,
    OrderByPackage, ReturnStatusPackage, TokenlessPackage,
};
pub use msg::{MsgId, MsgPackage, MsgStatus};

use crate::error::ProtocolError;
use crate::field::FieldFmt;
use crate::queue::PacketQueue;
use crate::token::Token;

/// A decoded or to be encoded package.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Package {
    /// Capability negotiation.
    Capability(CapabilityPackage),
    /// Login acknowledgment.
    LoginAck(LoginAckPackage),
    /// Extended error data.
    Eed(EedPackage),
    /// Plain error or info message.
    Error(ErrorPackage),
    /// Environment change.
    EnvChange(EnvChangePackage),
    /// End of a command.
    Done(DonePackage),
    /// End of a stored procedure.
    DoneProc(DonePackage),
    /// End of a command within a stored procedure.
    DoneInProc(DonePackage),
    /// Sub-negotiation message.
    Msg(MsgPackage),
    /// Parameter format.
    ParamFmt(FormatPackage),
    /// Row format.
    RowFmt(FormatPackage),
    /// Parameter values.
    Params(DataPackage),
    /// Row values.
    Row(DataPackage),
    /// Sort order of the result columns.
    OrderBy(OrderByPackage),
    /// Return status of a stored procedure.
    ReturnStatus(ReturnStatusPackage),
    /// Logout request.
    Logout(LogoutPackage),
    /// SQL command batch.
    Language(LanguagePackage),
    /// Prepared statement handling.
    Dynamic(DynamicPackage),
    /// Cursor declaration.
    CurDeclare(CurDeclarePackage),
    /// Cursor open.
    CurOpen(CurOpenPackage),
    /// Cursor fetch.
    CurFetch(CurFetchPackage),
    /// Cursor information.
    CurInfo(CurInfoPackage),
    /// Cursor close.
    CurClose(CurClosePackage),
    /// Cursor delete.
    CurDelete(CurDeletePackage),
    /// Cursor update.
    CurUpdate(CurUpdatePackage),
    /// Cursor row key.
    Key(KeyPackage),
    /// Control marker.
    Control(ControlPackage),
    /// Response without a recognized token.
    Tokenless(TokenlessPackage),
    /// Packet without payload.
    HeaderOnly(HeaderOnlyPackage),
}

impl Package {
    /// Decode one package from `queue`.
    ///
    /// `preceding` is the package decoded before this one on the same
    /// channel. Data, order by and key packages take their formats from
    /// it and fail when it does not carry any.
    pub fn decode(
        queue: &mut PacketQueue,
        preceding: Option<&Package>,
    ) -> Result<Self, ProtocolError> {
        let start = queue.position();
        let byte = queue.u8()?;

        let Some(token) = Token::from_u8(byte) else {
            queue.set_position(start);
            return TokenlessPackage::decode(queue).map(Self::Tokenless);
        };

        Ok(match token {
            Token::Capability => Self::Capability(CapabilityPackage::decode(queue)?),
            Token::LoginAck => Self::LoginAck(LoginAckPackage::decode(queue)?),
            Token::Eed => Self::Eed(EedPackage::decode(queue)?),
            Token::Error | Token::Info => Self::Error(ErrorPackage::decode(queue)?),
            Token::EnvChange => Self::EnvChange(EnvChangePackage::decode(queue)?),
            Token::Done => Self::Done(DonePackage::decode(queue)?),
            Token::DoneProc => Self::DoneProc(DonePackage::decode(queue)?),
            Token::DoneInProc => Self::DoneInProc(DonePackage::decode(queue)?),
            Token::Msg => Self::Msg(MsgPackage::decode(queue)?),
            Token::ParamFmt => {
                Self::ParamFmt(FormatPackage::decode(queue, FormatKind::Param, false)?)
            }
            Token::ParamFmt2 => {
                Self::ParamFmt(FormatPackage::decode(queue, FormatKind::Param, true)?)
            }
            Token::RowFmt => Self::RowFmt(FormatPackage::decode(queue, FormatKind::Row, false)?),
            Token::RowFmt2 => Self::RowFmt(FormatPackage::decode(queue, FormatKind::Row, true)?),
            Token::Params => {
                let formats = preceding_formats("Params", preceding)?;
                Self::Params(DataPackage::decode(queue, formats)?)
            }
            Token::Row => {
                let formats = preceding_formats("Row", preceding)?;
                Self::Row(DataPackage::decode(queue, formats)?)
            }
            Token::OrderBy | Token::OrderBy2 => {
                let formats = preceding_row_formats(preceding)?;
                Self::OrderBy(OrderByPackage::decode(
                    queue,
                    token == Token::OrderBy2,
                    formats,
                )?)
            }
            Token::ReturnStatus => Self::ReturnStatus(ReturnStatusPackage::decode(queue)?),
            Token::Logout => Self::Logout(LogoutPackage::decode(queue)?),
            Token::Language => Self::Language(LanguagePackage::decode(queue)?),
            Token::Dynamic => Self::Dynamic(DynamicPackage::decode(queue, false)?),
            Token::Dynamic2 => Self::Dynamic(DynamicPackage::decode(queue, true)?),
            Token::CurDeclare => Self::CurDeclare(CurDeclarePackage::decode(queue, false)?),
            Token::CurDeclare2 | Token::CurDeclare3 => {
                Self::CurDeclare(CurDeclarePackage::decode(queue, true)?)
            }
            Token::CurOpen => Self::CurOpen(CurOpenPackage::decode(queue)?),
            Token::CurFetch => Self::CurFetch(CurFetchPackage::decode(queue)?),
            Token::CurInfo => Self::CurInfo(CurInfoPackage::decode(queue, false)?),
            Token::CurInfo3 => Self::CurInfo(CurInfoPackage::decode(queue, true)?),
            Token::CurClose => Self::CurClose(CurClosePackage::decode(queue)?),
            Token::CurDelete => Self::CurDelete(CurDeletePackage::decode(queue)?),
            Token::CurUpdate => Self::CurUpdate(CurUpdatePackage::decode(queue)?),
            Token::Key => {
                let formats = preceding_formats("Key", preceding)?;
                let data_type = KeyPackage::key_type(&formats)
                    .ok_or(ProtocolError::MissingFormat { package: "Key" })?;
                Self::Key(KeyPackage::decode(queue, data_type)?)
            }
            _ => {
                queue.set_position(start);
                Self::Tokenless(TokenlessPackage::decode(queue)?)
            }
        })
    }

    /// Encode the package including its token.
    pub fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        match self {
            Self::Capability(p) => p.encode(queue),
            Self::LoginAck(p) => p.encode(queue),
            Self::Eed(p) => p.encode(queue),
            Self::Error(p) => p.encode(queue),
            Self::EnvChange(p) => p.encode(queue),
            Self::Done(p) => {
                queue.write_u8(Token::Done.as_u8());
                p.encode(queue);
                Ok(())
            }
            Self::DoneProc(p) => {
                queue.write_u8(Token::DoneProc.as_u8());
                p.encode(queue);
                Ok(())
            }
            Self::DoneInProc(p) => {
                queue.write_u8(Token::DoneInProc.as_u8());
                p.encode(queue);
                Ok(())
            }
            Self::Msg(p) => {
                p.encode(queue);
                Ok(())
            }
            Self::ParamFmt(p) | Self::RowFmt(p) => p.encode(queue),
            Self::Params(p) => p.encode(queue, Token::Params),
            Self::Row(p) => p.encode(queue, Token::Row),
            Self::OrderBy(_) => Err(ProtocolError::Unsupported(
                "order by packages are only sent by the server",
            )),
            Self::ReturnStatus(p) => {
                p.encode(queue);
                Ok(())
            }
            Self::Logout(p) => {
                p.encode(queue);
                Ok(())
            }
            Self::Language(p) => p.encode(queue),
            Self::Dynamic(p) => p.encode(queue),
            Self::CurDeclare(p) => p.encode(queue),
            Self::CurOpen(p) => p.encode(queue),
            Self::CurFetch(p) => p.encode(queue),
            Self::CurInfo(p) => p.encode(queue),
            Self::CurClose(p) => p.encode(queue),
            Self::CurDelete(p) => p.encode(queue),
            Self::CurUpdate(p) => p.encode(queue),
            Self::Key(p) => p.encode(queue),
            Self::Control(_) => Ok(()),
            Self::Tokenless(p) => {
                p.encode(queue);
                Ok(())
            }
            Self::HeaderOnly(_) => Err(ProtocolError::Unsupported(
                "header-only packages are sent as bare packets",
            )),
        }
    }

    /// Short name of the package kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capability(_) => "Capability",
            Self::LoginAck(_) => "LoginAck",
            Self::Eed(_) => "EED",
            Self::Error(_) => "Error",
            Self::EnvChange(_) => "EnvChange",
            Self::Done(_) => "Done",
            Self::DoneProc(_) => "DoneProc",
            Self::DoneInProc(_) => "DoneInProc",
            Self::Msg(_) => "Msg",
            Self::ParamFmt(p) | Self::RowFmt(p) => p.name(),
            Self::Params(_) => "Params",
            Self::Row(_) => "Row",
            Self::OrderBy(p) if p.wide => "OrderBy2",
            Self::OrderBy(_) => "OrderBy",
            Self::ReturnStatus(_) => "ReturnStatus",
            Self::Logout(_) => "Logout",
            Self::Language(_) => "Language",
            Self::Dynamic(p) if p.wide => "Dynamic2",
            Self::Dynamic(_) => "Dynamic",
            Self::CurDeclare(_) => "CurDeclare",
            Self::CurOpen(_) => "CurOpen",
            Self::CurFetch(_) => "CurFetch",
            Self::CurInfo(_) => "CurInfo",
            Self::CurClose(_) => "CurClose",
            Self::CurDelete(_) => "CurDelete",
            Self::CurUpdate(_) => "CurUpdate",
            Self::Key(_) => "Key",
            Self::Control(_) => "Control",
            Self::Tokenless(_) => "Tokenless",
            Self::HeaderOnly(_) => "HeaderOnly",
        }
    }

    /// Whether this is a `DONE` ending the command batch.
    #[must_use]
    pub fn is_done_final(&self) -> bool {
        matches!(self, Self::Done(done) if done.is_final())
    }

    /// Formats carried by this package for a following data package.
    #[must_use]
    pub fn formats(&self) -> Option<&Arc<[FieldFmt]>> {
        match self {
            Self::ParamFmt(p) | Self::RowFmt(p) => Some(&p.formats),
            Self::Params(p) | Self::Row(p) => Some(&p.formats),
            Self::OrderBy(p) => Some(&p.formats),
            _ => None,
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        match self {
            Self::Capability(p) => write!(f, "{p}"),
            Self::LoginAck(p) => write!(f, "{p}"),
            Self::Eed(p) => write!(f, "{p}"),
            Self::Error(p) => write!(f, "{p}"),
            Self::EnvChange(p) => write!(f, "{p}"),
            Self::Done(p) | Self::DoneProc(p) | Self::DoneInProc(p) => write!(f, "{p}"),
            Self::Msg(p) => write!(f, "{p}"),
            Self::ParamFmt(p) | Self::RowFmt(p) => write!(f, "{p}"),
            Self::Params(p) | Self::Row(p) => write!(f, "{p}"),
            Self::OrderBy(p) => write!(f, "{p}"),
            Self::ReturnStatus(p) => write!(f, "{}", p.value),
            Self::Logout(_) | Self::Control(_) => Ok(()),
            Self::Language(p) => write!(f, "{p}"),
            Self::Dynamic(p) => write!(f, "{p}"),
            Self::CurDeclare(p) => write!(f, "{p}"),
            Self::CurOpen(p) => write!(f, "{p}"),
            Self::CurFetch(p) => write!(f, "{p}"),
            Self::CurInfo(p) => write!(f, "{p}"),
            Self::CurClose(p) => write!(f, "{p}"),
            Self::CurDelete(p) => write!(f, "{p}"),
            Self::CurUpdate(p) => write!(f, "{p}"),
            Self::Key(p) => write!(f, "{p}"),
            Self::Tokenless(p) => write!(f, "{p}"),
            Self::HeaderOnly(p) => write!(f, "{p}"),
        }?;
        f.write_str(")")
    }
}

fn preceding_formats(
    package: &'static str,
    preceding: Option<&Package>,
) -> Result<Arc<[FieldFmt]>, ProtocolError> {
    let preceding = preceding.ok_or(ProtocolError::MissingFormat { package })?;
    preceding
        .formats()
        .cloned()
        .ok_or_else(|| ProtocolError::InvalidPredecessor {
            package,
            preceding: preceding.name().to_string(),
        })
}

fn preceding_row_formats(preceding: Option<&Package>) -> Result<Arc<[FieldFmt]>, ProtocolError> {
    match preceding {
        Some(Package::RowFmt(row_fmt)) => Ok(Arc::clone(&row_fmt.formats)),
        Some(other) => Err(ProtocolError::InvalidPredecessor {
            package: "OrderBy",
            preceding: other.name().to_string(),
        }),
        None => Err(ProtocolError::MissingFormat { package: "OrderBy" }),
    }
}

/// Compare the bytes consumed since `start` with the declared length.
pub(crate) fn check_length(
    package: &'static str,
    expected: usize,
    start: usize,
    queue: &PacketQueue,
) -> Result<(), ProtocolError> {
    let actual = queue.consumed() - start;
    if actual != expected {
        return Err(ProtocolError::LengthMismatch {
            package,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Encoded length of a string with a single byte length prefix.
pub(crate) fn u8_string_len(s: &str) -> usize {
    1 + s.len()
}

#[cfg(test)]
pub(crate) mod test_util {
    #![allow(clippy::unwrap_used)]

    use ase_types::Endian;

    use super::Package;
    use crate::packet::PacketSize;
    use crate::queue::PacketQueue;

    /// Encoded bytes of `package`.
    pub(crate) fn encode(package: &Package, endian: Endian) -> Vec<u8> {
        let mut queue = PacketQueue::new(PacketSize::default(), endian);
        package.encode(&mut queue).unwrap();
        queue.written_bytes()
    }

    /// Decode a single package that needs no predecessor.
    pub(crate) fn decode(bytes: &[u8], endian: Endian) -> Package {
        let mut queue = PacketQueue::from_payload(bytes, endian);
        let package = Package::decode(&mut queue, None).unwrap();
        assert!(queue.is_eom(), "package left bytes unread");
        package
    }

    /// Decode a single package following `preceding`.
    pub(crate) fn decode_after(bytes: &[u8], endian: Endian, preceding: &Package) -> Package {
        let mut queue = PacketQueue::from_payload(bytes, endian);
        let package = Package::decode(&mut queue, Some(preceding)).unwrap();
        assert!(queue.is_eom(), "package left bytes unread");
        package
    }
}
