//! The oracle round phase, derived purely from ledger height.

use std::fmt;

/// Number of sub-rounds in one full oracle round.
pub const SUB_ROUND_COUNT: u64 = 4;

/// One of the four phases every oracle round cycles through.
///
/// The phase is a total function of the ledger height; every oracle observing
/// the same height is in the same phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubRound {
    Commit,
    Reveal,
    Result,
    SendToTargetChain,
}

impl SubRound {
    /// Compute the sub-round for a ledger height.
    pub fn from_height(height: u64) -> Self {
        match height % SUB_ROUND_COUNT {
            0 => SubRound::Commit,
            1 => SubRound::Reveal,
            2 => SubRound::Result,
            _ => SubRound::SendToTargetChain,
        }
    }
}

impl fmt::Display for SubRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubRound::Commit => write!(f, "commit"),
            SubRound::Reveal => write!(f, "reveal"),
            SubRound::Result => write!(f, "result"),
            SubRound::SendToTargetChain => write!(f, "send"),
        }
    }
}
