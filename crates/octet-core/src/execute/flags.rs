//! `F` register update behaviors for different instruction classes.

use crate::state::{FLAG_C, FLAG_N, FLAG_V, FLAG_Z};

/// Describes how `F` changes after an instruction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagsUpdate {
    /// `F` is untouched.
    #[default]
    None,
    /// Loads, moves, `POP`, `NOT`: update `Z` and `N`, preserve `C` and `V`.
    ZeroNegative {
        /// Result value the flags describe.
        result: u8,
    },
    /// `INC`/`DEC`: update `Z`, `N` and `V`, preserve `C`.
    ZeroNegativeOverflow {
        /// Result value.
        result: u8,
        /// Signed overflow.
        overflow: bool,
    },
    /// ALU and shifts: replace all four flags.
    All {
        /// Result value.
        result: u8,
        /// Carry out or borrow.
        carry: bool,
        /// Signed overflow.
        overflow: bool,
    },
}

impl FlagsUpdate {
    /// Applies the update to a current `F` value.
    #[must_use]
    pub const fn apply(self, flags: u8) -> u8 {
        match self {
            Self::None => flags,
            Self::ZeroNegative { result } => (flags & (FLAG_C | FLAG_V)) | zero_negative(result),
            Self::ZeroNegativeOverflow { result, overflow } => {
                (flags & FLAG_C) | zero_negative(result) | bit(overflow, FLAG_V)
            }
            Self::All {
                result,
                carry,
                overflow,
            } => zero_negative(result) | bit(carry, FLAG_C) | bit(overflow, FLAG_V),
        }
    }
}

const fn zero_negative(result: u8) -> u8 {
    bit(result == 0, FLAG_Z) | bit(result & 0x80 != 0, FLAG_N)
}

const fn bit(set: bool, flag: u8) -> u8 {
    if set {
        flag
    } else {
        0
    }
}
