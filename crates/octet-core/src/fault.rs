use thiserror::Error;

/// Fault classes used for diagnostics aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Address arithmetic escaped the memory image or a region.
    Memory,
    /// Decoder mapped the opcode to the illegal operation.
    Decode,
    /// Host drove the execution-control contract out of order.
    Control,
}

/// Stable fault taxonomy surfaced by `step`.
///
/// Every fault freezes the core until the host calls `init` again; none of
/// them is retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum FaultCode {
    /// A fetch, operand read, data access, or control-transfer target fell
    /// outside the memory image or the region it must stay in.
    #[error("out-of-bounds memory access")]
    OutOfBoundsAccess = 0x01,
    /// The fetched opcode has no entry in the decode table.
    #[error("illegal instruction")]
    IllegalInstruction = 0x02,
    /// `step` was called before `init`.
    #[error("step called before init")]
    PreconditionViolation = 0x03,
}

impl FaultCode {
    /// Converts a fault code to its stable byte value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable byte value back into a fault code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::OutOfBoundsAccess),
            0x02 => Some(Self::IllegalInstruction),
            0x03 => Some(Self::PreconditionViolation),
            _ => None,
        }
    }

    /// Returns the diagnostics fault class for this fault code.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::OutOfBoundsAccess => FaultClass::Memory,
            Self::IllegalInstruction => FaultClass::Decode,
            Self::PreconditionViolation => FaultClass::Control,
        }
    }

    /// Faults that latch the core into the `Faulted` state.
    ///
    /// A precondition violation is reported without touching state, so the
    /// core stays `Uninitialized` instead.
    #[must_use]
    pub const fn latches(self) -> bool {
        !matches!(self, Self::PreconditionViolation)
    }
}
