//! Opcode bit-field layout and encode helpers.
//!
//! Every opcode byte belongs to at most one family. Register operands are
//! 2-bit fields in the low bits of the opcode (`00=B, 01=C, 10=D, 11=A`);
//! immediates and addresses follow the opcode as little-endian bytes.

use crate::state::{GeneralRegister, FLAG_C, FLAG_N, FLAG_V, FLAG_Z};

/// Opcode families, each covering a contiguous pattern of opcode bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OpcodeFamily {
    Nop,
    Halt,
    Log,
    LoadImmediate,
    LoadAbsolute,
    StoreAbsolute,
    LoadIndirect,
    StoreIndirect,
    Push,
    Pop,
    SetDp,
    Move,
    AluRegister,
    AluImmediate,
    Increment,
    Decrement,
    ShiftLeft,
    ShiftRight,
    Not,
    Call,
    Jump,
    Return,
}

/// Single source-of-truth `(base, mask, family)` table.
///
/// An opcode belongs to the family whose row satisfies `opcode & mask == base`;
/// rows never overlap. Any opcode matching no row is illegal.
pub const OPCODE_FAMILY_TABLE: &[(u8, u8, OpcodeFamily)] = &[
    (0x00, 0xFF, OpcodeFamily::Nop),
    (0x01, 0xFF, OpcodeFamily::Halt),
    (0x08, 0xFC, OpcodeFamily::Log),
    (0x10, 0xFC, OpcodeFamily::LoadImmediate),
    (0x20, 0xFC, OpcodeFamily::LoadAbsolute),
    (0x24, 0xFC, OpcodeFamily::StoreAbsolute),
    (0x28, 0xFC, OpcodeFamily::LoadIndirect),
    (0x2C, 0xFC, OpcodeFamily::StoreIndirect),
    (0x30, 0xFC, OpcodeFamily::Push),
    (0x34, 0xFC, OpcodeFamily::Pop),
    (0x38, 0xFC, OpcodeFamily::SetDp),
    (0x40, 0xF0, OpcodeFamily::Move),
    (0x80, 0xE0, OpcodeFamily::AluRegister),
    (0xA0, 0xF8, OpcodeFamily::AluImmediate),
    (0xA8, 0xFC, OpcodeFamily::Increment),
    (0xAC, 0xFC, OpcodeFamily::Decrement),
    (0xB0, 0xFC, OpcodeFamily::ShiftLeft),
    (0xB4, 0xFC, OpcodeFamily::ShiftRight),
    (0xB8, 0xFC, OpcodeFamily::Not),
    (0xC0, 0xFC, OpcodeFamily::Jump),
    (0xC4, 0xFE, OpcodeFamily::Jump),
    (0xC6, 0xFF, OpcodeFamily::Jump),
    (0xC7, 0xFF, OpcodeFamily::Call),
    (0xC8, 0xFF, OpcodeFamily::Return),
];

/// Returns the family an opcode belongs to, or `None` for illegal opcodes.
#[must_use]
pub const fn classify_opcode(opcode: u8) -> Option<OpcodeFamily> {
    let mut i = 0;
    while i < OPCODE_FAMILY_TABLE.len() {
        let (base, mask, family) = OPCODE_FAMILY_TABLE[i];
        if opcode & mask == base {
            return Some(family);
        }
        i += 1;
    }
    None
}

/// Accumulator ALU operations selected by the 3-bit `ooo` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum AluOp {
    Add = 0,
    Adc = 1,
    Sub = 2,
    Sbc = 3,
    And = 4,
    Or = 5,
    Xor = 6,
    Cmp = 7,
}

impl AluOp {
    /// Decodes the low three bits of `bits`.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Self::Add,
            1 => Self::Adc,
            2 => Self::Sub,
            3 => Self::Sbc,
            4 => Self::And,
            5 => Self::Or,
            6 => Self::Xor,
            _ => Self::Cmp,
        }
    }

    /// The 3-bit field value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Assembly mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Adc => "ADC",
            Self::Sub => "SUB",
            Self::Sbc => "SBC",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Cmp => "CMP",
        }
    }

    /// `CMP` only updates flags.
    #[must_use]
    pub const fn writes_result(self) -> bool {
        !matches!(self, Self::Cmp)
    }
}

/// Branch condition selected by the low three bits of `0xC0..=0xC6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Condition {
    /// Unconditional (`JMP`).
    Always = 0,
    /// `Z` set.
    Zero = 1,
    /// `Z` clear.
    NotZero = 2,
    /// `C` set.
    Carry = 3,
    /// `C` clear.
    NoCarry = 4,
    /// `N` set.
    Negative = 5,
    /// `V` set.
    Overflow = 6,
}

impl Condition {
    /// Decodes a condition field; `7` is not a condition (it is `CALL`).
    #[must_use]
    pub const fn from_u3(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Always),
            1 => Some(Self::Zero),
            2 => Some(Self::NotZero),
            3 => Some(Self::Carry),
            4 => Some(Self::NoCarry),
            5 => Some(Self::Negative),
            6 => Some(Self::Overflow),
            _ => None,
        }
    }

    /// The 3-bit field value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Assembly mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Always => "JMP",
            Self::Zero => "JZ",
            Self::NotZero => "JNZ",
            Self::Carry => "JC",
            Self::NoCarry => "JNC",
            Self::Negative => "JN",
            Self::Overflow => "JV",
        }
    }

    /// Evaluates the condition against an `F` value.
    #[must_use]
    pub const fn holds(self, flags: u8) -> bool {
        match self {
            Self::Always => true,
            Self::Zero => flags & FLAG_Z != 0,
            Self::NotZero => flags & FLAG_Z == 0,
            Self::Carry => flags & FLAG_C != 0,
            Self::NoCarry => flags & FLAG_C == 0,
            Self::Negative => flags & FLAG_N != 0,
            Self::Overflow => flags & FLAG_V != 0,
        }
    }
}

/// Extracts the 2-bit register field in bits 1..0.
#[must_use]
pub const fn low_register(opcode: u8) -> GeneralRegister {
    GeneralRegister::from_u2(opcode)
}

/// Extracts the 2-bit register field in bits 3..2 (the `MOV` destination).
#[must_use]
pub const fn high_register(opcode: u8) -> GeneralRegister {
    GeneralRegister::from_u2(opcode >> 2)
}

/// Extracts the `ooo` field of a register-form ALU opcode (`100o_ooss`).
#[must_use]
pub const fn alu_register_op(opcode: u8) -> AluOp {
    AluOp::from_u3(opcode >> 2)
}

/// `NOP`.
pub const NOP: u8 = 0x00;
/// `HALT`.
pub const HALT: u8 = 0x01;
/// `CALL a24`.
pub const CALL: u8 = 0xC7;
/// `RET`.
pub const RET: u8 = 0xC8;

/// `LOG r`.
#[must_use]
pub const fn log(r: GeneralRegister) -> u8 {
    0x08 | r.bits()
}

/// `LDI r, imm8`.
#[must_use]
pub const fn ldi(r: GeneralRegister) -> u8 {
    0x10 | r.bits()
}

/// `LD r, [addr16]`.
#[must_use]
pub const fn ld_abs(r: GeneralRegister) -> u8 {
    0x20 | r.bits()
}

/// `ST [addr16], r`.
#[must_use]
pub const fn st_abs(r: GeneralRegister) -> u8 {
    0x24 | r.bits()
}

/// `LD r, [CD]`.
#[must_use]
pub const fn ld_ind(r: GeneralRegister) -> u8 {
    0x28 | r.bits()
}

/// `ST [CD], r`.
#[must_use]
pub const fn st_ind(r: GeneralRegister) -> u8 {
    0x2C | r.bits()
}

/// `PUSH r`.
#[must_use]
pub const fn push(r: GeneralRegister) -> u8 {
    0x30 | r.bits()
}

/// `POP r`.
#[must_use]
pub const fn pop(r: GeneralRegister) -> u8 {
    0x34 | r.bits()
}

/// `SETDP r`.
#[must_use]
pub const fn setdp(r: GeneralRegister) -> u8 {
    0x38 | r.bits()
}

/// `MOV dst, src`.
#[must_use]
pub const fn mov(dst: GeneralRegister, src: GeneralRegister) -> u8 {
    0x40 | (dst.bits() << 2) | src.bits()
}

/// `<op> A, src`.
#[must_use]
pub const fn alu(op: AluOp, src: GeneralRegister) -> u8 {
    0x80 | (op.bits() << 2) | src.bits()
}

/// `<op> A, imm8`.
#[must_use]
pub const fn alu_imm(op: AluOp) -> u8 {
    0xA0 | op.bits()
}

/// `INC r`.
#[must_use]
pub const fn inc(r: GeneralRegister) -> u8 {
    0xA8 | r.bits()
}

/// `DEC r`.
#[must_use]
pub const fn dec(r: GeneralRegister) -> u8 {
    0xAC | r.bits()
}

/// `SHL r`.
#[must_use]
pub const fn shl(r: GeneralRegister) -> u8 {
    0xB0 | r.bits()
}

/// `SHR r`.
#[must_use]
pub const fn shr(r: GeneralRegister) -> u8 {
    0xB4 | r.bits()
}

/// `NOT r`.
#[must_use]
pub const fn not(r: GeneralRegister) -> u8 {
    0xB8 | r.bits()
}

/// `JMP`/`Jcc a24`.
#[must_use]
pub const fn jump(cond: Condition) -> u8 {
    0xC0 | cond.bits()
}

/// Little-endian bytes of a 16-bit data address.
#[must_use]
pub const fn addr16(addr: u16) -> [u8; 2] {
    addr.to_le_bytes()
}

/// Little-endian bytes of a 24-bit code address; bits above 23 are dropped.
#[must_use]
pub const fn addr24(addr: u32) -> [u8; 3] {
    let [lo, mid, hi, _] = addr.to_le_bytes();
    [lo, mid, hi]
}

#[cfg(test)]
mod tests {
    use super::{
        alu, alu_imm, alu_register_op, classify_opcode, high_register, jump, low_register, mov,
        AluOp, Condition, OpcodeFamily, CALL, OPCODE_FAMILY_TABLE, RET,
    };
    use crate::state::{GeneralRegister, FLAG_C, FLAG_N, FLAG_V, FLAG_Z};

    #[test]
    fn conditions_test_single_flags() {
        assert!(Condition::Always.holds(0));
        assert!(Condition::Zero.holds(FLAG_Z));
        assert!(!Condition::NotZero.holds(FLAG_Z));
        assert!(Condition::Carry.holds(FLAG_C | FLAG_Z));
        assert!(Condition::NoCarry.holds(FLAG_N));
        assert!(Condition::Negative.holds(FLAG_N));
        assert!(!Condition::Overflow.holds(FLAG_C | FLAG_N | FLAG_Z));
        assert!(Condition::Overflow.holds(FLAG_V));
    }

    #[test]
    fn family_table_rows_do_not_overlap() {
        for opcode in 0..=u8::MAX {
            let matches = OPCODE_FAMILY_TABLE
                .iter()
                .filter(|(base, mask, _)| opcode & mask == *base)
                .count();
            assert!(matches <= 1, "opcode {opcode:#04x} matches {matches} families");
        }
    }

    #[test]
    fn assigned_opcode_count_is_stable() {
        let assigned = (0..=u8::MAX)
            .filter(|opcode| classify_opcode(*opcode).is_some())
            .count();
        // NOP, HALT, 9 register-field families of 4, MOV 16, ALU 32 + 8,
        // 5 unary families of 4, 7 jumps, CALL, RET.
        assert_eq!(assigned, 2 + 9 * 4 + 16 + 32 + 8 + 5 * 4 + 7 + 2);
    }

    #[test]
    fn add_a_b_is_0x80() {
        assert_eq!(alu(AluOp::Add, GeneralRegister::B), 0x80);
        assert_eq!(classify_opcode(0x80), Some(OpcodeFamily::AluRegister));
        assert_eq!(alu_register_op(0x80), AluOp::Add);
        assert_eq!(low_register(0x80), GeneralRegister::B);
    }

    #[test]
    fn alu_fields_roundtrip() {
        for bits in 0..8 {
            let op = AluOp::from_u3(bits);
            assert_eq!(op.bits(), bits);
            for src in GeneralRegister::ALL {
                let opcode = alu(op, src);
                assert_eq!(alu_register_op(opcode), op);
                assert_eq!(low_register(opcode), src);
            }
            assert_eq!(classify_opcode(alu_imm(op)), Some(OpcodeFamily::AluImmediate));
        }
        assert!(!AluOp::Cmp.writes_result());
    }

    #[test]
    fn mov_fields_roundtrip() {
        for dst in GeneralRegister::ALL {
            for src in GeneralRegister::ALL {
                let opcode = mov(dst, src);
                assert_eq!(high_register(opcode), dst);
                assert_eq!(low_register(opcode), src);
            }
        }
    }

    #[test]
    fn call_is_not_a_jump_condition() {
        assert_eq!(Condition::from_u3(7), None);
        assert_eq!(classify_opcode(CALL), Some(OpcodeFamily::Call));
        assert_eq!(classify_opcode(RET), Some(OpcodeFamily::Return));
        for bits in 0..7 {
            let cond = Condition::from_u3(bits).expect("defined condition");
            assert_eq!(classify_opcode(jump(cond)), Some(OpcodeFamily::Jump));
        }
    }

    #[test]
    fn unassigned_ranges_are_illegal() {
        for opcode in [0x02, 0x07, 0x0C, 0x14, 0x1F, 0x3C, 0x50, 0x7F, 0xBC, 0xC9, 0xFF] {
            assert_eq!(classify_opcode(opcode), None, "{opcode:#04x}");
        }
    }
}
