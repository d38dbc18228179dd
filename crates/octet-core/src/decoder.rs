//! Instruction decoder for the Octet ISA.
//!
//! Decoding is a lookup into [`DECODE_TABLE`], built at compile time from
//! [`crate::encoding::OPCODE_FAMILY_TABLE`]. The table maps every one of the
//! 256 opcode bytes to an [`Operation`]; each operation knows how many
//! operand bytes follow the opcode.

use crate::encoding::{
    alu_register_op, classify_opcode, high_register, low_register, AluOp, Condition, OpcodeFamily,
};
use crate::state::GeneralRegister;

/// Largest operand width of any instruction.
pub const MAX_OPERAND_BYTES: usize = 3;

/// Single-register read-modify-write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum UnaryOp {
    Inc,
    Dec,
    Shl,
    Shr,
    Not,
}

impl UnaryOp {
    /// Assembly mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Inc => "INC",
            Self::Dec => "DEC",
            Self::Shl => "SHL",
            Self::Shr => "SHR",
            Self::Not => "NOT",
        }
    }
}

/// Decoded meaning of an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operation {
    /// No effect beyond advancing `PC`.
    Nop,
    /// Enter the halted state.
    Halt,
    /// Emit a register value to the diagnostic sink.
    Log(GeneralRegister),
    /// `r <- imm8`.
    LoadImmediate(GeneralRegister),
    /// `r <- data[DP:addr16]`.
    LoadAbsolute(GeneralRegister),
    /// `data[DP:addr16] <- r`.
    StoreAbsolute(GeneralRegister),
    /// `r <- data[DP:C:D]`.
    LoadIndirect(GeneralRegister),
    /// `data[DP:C:D] <- r`.
    StoreIndirect(GeneralRegister),
    /// Push one byte onto the stack.
    Push(GeneralRegister),
    /// Pop one byte from the stack.
    Pop(GeneralRegister),
    /// `DP <- r`.
    SetDp(GeneralRegister),
    /// `dst <- src`.
    Move {
        /// Destination register.
        dst: GeneralRegister,
        /// Source register.
        src: GeneralRegister,
    },
    /// `A <- A op src`.
    AluRegister {
        /// Operation.
        op: AluOp,
        /// Right-hand operand.
        src: GeneralRegister,
    },
    /// `A <- A op imm8`.
    AluImmediate(AluOp),
    /// `r <- op r`.
    Unary {
        /// Operation.
        op: UnaryOp,
        /// Operand and destination.
        reg: GeneralRegister,
    },
    /// Conditional or unconditional jump to a 24-bit code offset.
    Jump(Condition),
    /// Push the return address and jump.
    Call,
    /// Pop the return address.
    Return,
    /// Unassigned opcode.
    Illegal,
}

impl Operation {
    /// Number of operand bytes that follow the opcode.
    #[must_use]
    pub const fn operand_width(self) -> u8 {
        match self {
            Self::LoadImmediate(_) | Self::AluImmediate(_) => 1,
            Self::LoadAbsolute(_) | Self::StoreAbsolute(_) => 2,
            Self::Jump(_) | Self::Call => 3,
            Self::Nop
            | Self::Halt
            | Self::Log(_)
            | Self::LoadIndirect(_)
            | Self::StoreIndirect(_)
            | Self::Push(_)
            | Self::Pop(_)
            | Self::SetDp(_)
            | Self::Move { .. }
            | Self::AluRegister { .. }
            | Self::Unary { .. }
            | Self::Return
            | Self::Illegal => 0,
        }
    }

    /// Total encoded length in bytes, opcode included.
    #[must_use]
    pub const fn encoded_len(self) -> u8 {
        1 + self.operand_width()
    }

    /// Returns `true` for the illegal operation.
    #[must_use]
    pub const fn is_illegal(self) -> bool {
        matches!(self, Self::Illegal)
    }

    /// Returns `true` when the operation may write `PC` with a target other
    /// than the next sequential instruction.
    #[must_use]
    pub const fn is_control_transfer(self) -> bool {
        matches!(self, Self::Jump(_) | Self::Call | Self::Return)
    }
}

const fn operation_for(opcode: u8) -> Operation {
    let Some(family) = classify_opcode(opcode) else {
        return Operation::Illegal;
    };
    let r = low_register(opcode);
    match family {
        OpcodeFamily::Nop => Operation::Nop,
        OpcodeFamily::Halt => Operation::Halt,
        OpcodeFamily::Log => Operation::Log(r),
        OpcodeFamily::LoadImmediate => Operation::LoadImmediate(r),
        OpcodeFamily::LoadAbsolute => Operation::LoadAbsolute(r),
        OpcodeFamily::StoreAbsolute => Operation::StoreAbsolute(r),
        OpcodeFamily::LoadIndirect => Operation::LoadIndirect(r),
        OpcodeFamily::StoreIndirect => Operation::StoreIndirect(r),
        OpcodeFamily::Push => Operation::Push(r),
        OpcodeFamily::Pop => Operation::Pop(r),
        OpcodeFamily::SetDp => Operation::SetDp(r),
        OpcodeFamily::Move => Operation::Move {
            dst: high_register(opcode),
            src: r,
        },
        OpcodeFamily::AluRegister => Operation::AluRegister {
            op: alu_register_op(opcode),
            src: r,
        },
        OpcodeFamily::AluImmediate => Operation::AluImmediate(AluOp::from_u3(opcode)),
        OpcodeFamily::Increment => unary(UnaryOp::Inc, r),
        OpcodeFamily::Decrement => unary(UnaryOp::Dec, r),
        OpcodeFamily::ShiftLeft => unary(UnaryOp::Shl, r),
        OpcodeFamily::ShiftRight => unary(UnaryOp::Shr, r),
        OpcodeFamily::Not => unary(UnaryOp::Not, r),
        OpcodeFamily::Jump => match Condition::from_u3(opcode & 0b111) {
            Some(cond) => Operation::Jump(cond),
            None => Operation::Illegal,
        },
        OpcodeFamily::Call => Operation::Call,
        OpcodeFamily::Return => Operation::Return,
    }
}

const fn unary(op: UnaryOp, reg: GeneralRegister) -> Operation {
    Operation::Unary { op, reg }
}

const fn build_decode_table() -> [Operation; 256] {
    let mut table = [Operation::Illegal; 256];
    let mut opcode = 0;
    while opcode < 256 {
        #[allow(clippy::cast_possible_truncation)]
        let byte = opcode as u8;
        table[opcode] = operation_for(byte);
        opcode += 1;
    }
    table
}

/// Opcode byte to operation, for all 256 opcodes.
pub const DECODE_TABLE: [Operation; 256] = build_decode_table();

/// A fetched instruction: opcode, its decoded operation, and operand bytes.
///
/// Operand bytes beyond [`Operation::operand_width`] are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Instruction {
    /// Code offset of the opcode byte.
    pub pc: u32,
    /// Raw opcode byte.
    pub opcode: u8,
    /// Decoded operation.
    pub operation: Operation,
    /// Operand bytes in fetch order.
    pub operands: [u8; MAX_OPERAND_BYTES],
}

impl Instruction {
    /// Builds an instruction from raw bytes, keeping only the declared
    /// operand width.
    #[must_use]
    pub fn new(pc: u32, opcode: u8, operand_bytes: &[u8]) -> Self {
        let operation = Decoder::decode(opcode);
        let width = usize::from(operation.operand_width()).min(operand_bytes.len());
        let mut operands = [0; MAX_OPERAND_BYTES];
        operands[..width].copy_from_slice(&operand_bytes[..width]);
        Self {
            pc,
            opcode,
            operation,
            operands,
        }
    }

    /// Encoded length in bytes.
    #[must_use]
    pub const fn len(&self) -> u8 {
        self.operation.encoded_len()
    }

    /// Always `false`; an instruction has at least its opcode byte.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Offset of the next sequential instruction, or `None` on overflow.
    #[must_use]
    pub const fn sequential_pc(&self) -> Option<u32> {
        self.pc.checked_add(self.len() as u32)
    }

    /// First operand as an 8-bit immediate.
    #[must_use]
    pub const fn imm8(&self) -> u8 {
        self.operands[0]
    }

    /// First two operands as a little-endian 16-bit address.
    #[must_use]
    pub const fn addr16(&self) -> u16 {
        u16::from_le_bytes([self.operands[0], self.operands[1]])
    }

    /// All three operands as a little-endian 24-bit code offset.
    #[must_use]
    pub const fn addr24(&self) -> u32 {
        u32::from_le_bytes([self.operands[0], self.operands[1], self.operands[2], 0])
    }
}

/// Stateless decoder over [`DECODE_TABLE`].
pub struct Decoder;

impl Decoder {
    /// Decodes an opcode byte. Pure: the same byte always yields the same
    /// operation.
    #[must_use]
    pub const fn decode(opcode: u8) -> Operation {
        DECODE_TABLE[opcode as usize]
    }

    /// Operand width declared for an opcode byte.
    #[must_use]
    pub const fn operand_width(opcode: u8) -> u8 {
        Self::decode(opcode).operand_width()
    }
}

#[cfg(test)]
mod tests {
    use super::{Decoder, Instruction, Operation, UnaryOp, DECODE_TABLE};
    use crate::encoding::{self, AluOp, Condition};
    use crate::state::GeneralRegister;

    #[test]
    fn table_agrees_with_family_classification() {
        for opcode in 0..=u8::MAX {
            let legal = encoding::classify_opcode(opcode).is_some();
            assert_eq!(
                !DECODE_TABLE[usize::from(opcode)].is_illegal(),
                legal,
                "opcode {opcode:#04x}"
            );
        }
    }

    #[test]
    fn decode_is_pure() {
        for opcode in 0..=u8::MAX {
            assert_eq!(Decoder::decode(opcode), Decoder::decode(opcode));
        }
    }

    #[test]
    fn operand_widths_match_the_instruction_set() {
        assert_eq!(Decoder::operand_width(encoding::NOP), 0);
        assert_eq!(Decoder::operand_width(encoding::ldi(GeneralRegister::A)), 1);
        assert_eq!(Decoder::operand_width(encoding::ld_abs(GeneralRegister::B)), 2);
        assert_eq!(Decoder::operand_width(encoding::st_abs(GeneralRegister::C)), 2);
        assert_eq!(Decoder::operand_width(encoding::alu_imm(AluOp::Xor)), 1);
        assert_eq!(Decoder::operand_width(encoding::jump(Condition::Zero)), 3);
        assert_eq!(Decoder::operand_width(encoding::CALL), 3);
        assert_eq!(Decoder::operand_width(encoding::RET), 0);
        assert_eq!(Decoder::operand_width(0xFF), 0);
    }

    #[test]
    fn representative_opcodes_decode() {
        assert_eq!(
            Decoder::decode(0x80),
            Operation::AluRegister {
                op: AluOp::Add,
                src: GeneralRegister::B
            }
        );
        assert_eq!(
            Decoder::decode(0x49),
            Operation::Move {
                dst: GeneralRegister::D,
                src: GeneralRegister::C
            }
        );
        assert_eq!(
            Decoder::decode(0xAB),
            Operation::Unary {
                op: UnaryOp::Inc,
                reg: GeneralRegister::A
            }
        );
        assert_eq!(Decoder::decode(0xC6), Operation::Jump(Condition::Overflow));
        assert_eq!(Decoder::decode(0xC7), Operation::Call);
        assert_eq!(Decoder::decode(0x02), Operation::Illegal);
    }

    #[test]
    fn instruction_ignores_bytes_past_declared_width() {
        let instr = Instruction::new(4, encoding::ldi(GeneralRegister::B), &[0x7F, 0xAA, 0xBB]);
        assert_eq!(instr.operands, [0x7F, 0, 0]);
        assert_eq!(instr.imm8(), 0x7F);
        assert_eq!(instr.len(), 2);
        assert_eq!(instr.sequential_pc(), Some(6));
    }

    #[test]
    fn multi_byte_operands_are_little_endian() {
        let jmp = Instruction::new(0, encoding::jump(Condition::Always), &[0x56, 0x34, 0x12]);
        assert_eq!(jmp.addr24(), 0x12_3456);
        let ld = Instruction::new(0, encoding::ld_abs(GeneralRegister::A), &[0x34, 0x12]);
        assert_eq!(ld.addr16(), 0x1234);
    }

    #[test]
    fn sequential_pc_reports_overflow() {
        let instr = Instruction::new(u32::MAX, encoding::NOP, &[]);
        assert_eq!(instr.sequential_pc(), None);
    }
}
