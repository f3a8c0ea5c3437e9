//! `DONE`, `DONEPROC` and `DONEINPROC` packages.

use std::fmt;

use bitflags::bitflags;

use crate::error::ProtocolError;
use crate::flags::write_flags;
use crate::queue::PacketQueue;

bitflags! {
    /// Completion status of a command.
    ///
    /// The empty set is the final done of a command batch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DoneState: u16 {
        /// More results follow.
        const MORE = 0x01;
        /// The command failed.
        const ERROR = 0x02;
        /// A transaction is in progress.
        const INXACT = 0x04;
        /// Sent from within a stored procedure.
        const PROC = 0x08;
        /// The count field is valid.
        const COUNT = 0x10;
        /// Acknowledges an attention.
        const ATTN = 0x20;
        /// Sent as part of an event notification.
        const EVENT = 0x40;
        /// The count is cumulative.
        const CUMULATIVE = 0x80;
    }
}

impl fmt::Display for DoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self, "FINAL")
    }
}

/// Transaction state reported by a done package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum TransState {
    /// Not inside a transaction.
    #[default]
    NotInTran = 0,
    /// Transaction in progress.
    TranInProgress = 1,
    /// Transaction completed.
    TranCompleted = 2,
    /// Transaction failed.
    TranFail = 3,
    /// Statement within the transaction failed.
    TranStmtFail = 4,
}

impl TransState {
    /// Look up a transaction state by value.
    pub fn from_u16(value: u16) -> Result<Self, ProtocolError> {
        Ok(match value {
            0 => Self::NotInTran,
            1 => Self::TranInProgress,
            2 => Self::TranCompleted,
            3 => Self::TranFail,
            4 => Self::TranStmtFail,
            _ => {
                return Err(ProtocolError::InvalidValue {
                    field: "transaction state",
                    value: u64::from(value),
                });
            }
        })
    }
}

impl fmt::Display for TransState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotInTran => "NOT_IN_TRAN",
            Self::TranInProgress => "TRAN_IN_PROGRESS",
            Self::TranCompleted => "TRAN_COMPLETED",
            Self::TranFail => "TRAN_FAIL",
            Self::TranStmtFail => "TRAN_STMT_FAIL",
        })
    }
}

/// Completion of a command. The three done tokens share this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DonePackage {
    /// Completion status.
    pub status: DoneState,
    /// Transaction state.
    pub tran_state: TransState,
    /// Affected rows, valid when [`DoneState::COUNT`] is set.
    pub count: i32,
}

impl DonePackage {
    /// Final done of a command batch.
    #[must_use]
    pub fn final_done() -> Self {
        Self::default()
    }

    /// Whether this done ends the command batch.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.status.is_empty()
    }

    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let status = DoneState::from_bits_retain(queue.u16()?);
        let tran_state = TransState::from_u16(queue.u16()?)?;
        let count = queue.i32()?;
        Ok(Self {
            status,
            tran_state,
            count,
        })
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) {
        queue.write_u16(self.status.bits());
        queue.write_u16(self.tran_state as u16);
        queue.write_i32(self.count);
    }
}

impl fmt::Display for DonePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, Count={}", self.status, self.tran_state, self.count)
    }
}
