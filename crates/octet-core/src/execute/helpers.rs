//! Arithmetic and address helpers shared by the execute stage.

use super::flags::FlagsUpdate;
use crate::decoder::UnaryOp;
use crate::encoding::AluOp;
use crate::memory::{validate_access, AccessWidth, MemoryLayout, DATA_BANK_BYTES};
use crate::FaultCode;

/// Result of an ALU or unary computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    /// 8-bit result.
    pub value: u8,
    /// Flag update produced by the operation.
    pub flags: FlagsUpdate,
}

/// Computes `a op b` for accumulator ALU operations.
///
/// `carry_in` is consumed by `ADC` (as carry) and `SBC` (as borrow).
#[must_use]
pub const fn alu(op: AluOp, a: u8, b: u8, carry_in: bool) -> AluResult {
    match op {
        AluOp::Add => add(a, b, false),
        AluOp::Adc => add(a, b, carry_in),
        AluOp::Sub | AluOp::Cmp => sub(a, b, false),
        AluOp::Sbc => sub(a, b, carry_in),
        AluOp::And => logic(a & b),
        AluOp::Or => logic(a | b),
        AluOp::Xor => logic(a ^ b),
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn add(a: u8, b: u8, carry_in: bool) -> AluResult {
    let wide = a as u16 + b as u16 + carry_in as u16;
    let value = wide as u8;
    AluResult {
        value,
        flags: FlagsUpdate::All {
            result: value,
            carry: wide > 0xFF,
            overflow: (!(a ^ b) & (a ^ value) & 0x80) != 0,
        },
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn sub(a: u8, b: u8, borrow_in: bool) -> AluResult {
    let subtrahend = b as u16 + borrow_in as u16;
    let value = (a as u16).wrapping_sub(subtrahend) as u8;
    AluResult {
        value,
        flags: FlagsUpdate::All {
            result: value,
            carry: (a as u16) < subtrahend,
            overflow: ((a ^ b) & (a ^ value) & 0x80) != 0,
        },
    }
}

const fn logic(value: u8) -> AluResult {
    AluResult {
        value,
        flags: FlagsUpdate::All {
            result: value,
            carry: false,
            overflow: false,
        },
    }
}

/// Computes a single-register operation.
#[must_use]
pub const fn unary(op: UnaryOp, value: u8) -> AluResult {
    match op {
        UnaryOp::Inc => {
            let result = value.wrapping_add(1);
            AluResult {
                value: result,
                flags: FlagsUpdate::ZeroNegativeOverflow {
                    result,
                    overflow: value == 0x7F,
                },
            }
        }
        UnaryOp::Dec => {
            let result = value.wrapping_sub(1);
            AluResult {
                value: result,
                flags: FlagsUpdate::ZeroNegativeOverflow {
                    result,
                    overflow: value == 0x80,
                },
            }
        }
        UnaryOp::Shl => {
            let result = value << 1;
            AluResult {
                value: result,
                flags: FlagsUpdate::All {
                    result,
                    carry: value & 0x80 != 0,
                    overflow: false,
                },
            }
        }
        UnaryOp::Shr => {
            let result = value >> 1;
            AluResult {
                value: result,
                flags: FlagsUpdate::All {
                    result,
                    carry: value & 0x01 != 0,
                    overflow: false,
                },
            }
        }
        UnaryOp::Not => {
            let result = !value;
            AluResult {
                value: result,
                flags: FlagsUpdate::ZeroNegative { result },
            }
        }
    }
}

/// Banked data effective address `DP:hi:lo`.
#[must_use]
pub const fn banked_address(dp: u8, hi: u8, lo: u8) -> u32 {
    (dp as u32) * DATA_BANK_BYTES + (((hi as u32) << 8) | lo as u32)
}

/// Translates a data effective address into an image offset.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfBoundsAccess`] when any byte of the access lies
/// outside the data region.
pub fn data_offset(layout: MemoryLayout, ea: u32, width: AccessWidth) -> Result<u32, FaultCode> {
    validate_access(ea, width, layout.data_len() as usize)?;
    Ok(layout.data_base() + ea)
}

/// Translates a stack pointer into an image offset. The stack is bank 0 of
/// the data region; an access that would run past `0xFFFF` faults instead of
/// spilling into bank 1.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfBoundsAccess`] when the access crosses the end
/// of bank 0 or lies outside the data region.
pub fn stack_offset(layout: MemoryLayout, sp: u16, width: AccessWidth) -> Result<u32, FaultCode> {
    validate_access(u32::from(sp), width, DATA_BANK_BYTES as usize)?;
    data_offset(layout, u32::from(sp), width)
}

/// Validates a control-transfer target.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfBoundsAccess`] when `target` is not a code offset.
pub const fn code_target(layout: MemoryLayout, target: u32) -> Result<u32, FaultCode> {
    if layout.is_code_offset(target) {
        Ok(target)
    } else {
        Err(FaultCode::OutOfBoundsAccess)
    }
}
