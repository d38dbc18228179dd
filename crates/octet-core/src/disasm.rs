//! Instruction disassembly for the Octet ISA.
//!
//! Converts code bytes into assembly rows for trace output and host-side
//! program listings.

use core::fmt;

use crate::decoder::{Decoder, Instruction, Operation};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Code offset of the opcode byte.
    pub addr_start: u32,
    /// Encoded length in bytes (1 to 4).
    pub len_bytes: u8,
    /// Opcode followed by operand bytes.
    pub raw_bytes: Vec<u8>,
    /// Instruction mnemonic (e.g. `"ADD"`, `"LDI"`).
    pub mnemonic: String,
    /// Formatted operands (e.g. `"A, 0x05"`).
    pub operands: String,
    /// Whether the opcode is unassigned.
    pub is_illegal: bool,
}

/// Disassembles `count` consecutive instructions starting at `start`.
///
/// Stops early at the end of `code` or at an instruction whose operands run
/// past it.
#[must_use]
pub fn disassemble_range(start: u32, count: usize, code: &[u8]) -> Vec<DisassemblyRow> {
    let mut rows = Vec::with_capacity(count);
    let mut pc = start;
    while rows.len() < count {
        let Some(row) = disassemble_one(pc, code) else {
            break;
        };
        pc = pc.saturating_add(u32::from(row.len_bytes));
        rows.push(row);
    }
    rows
}

/// Disassembles a window of instructions around `center_pc`.
///
/// Backward rows are found by trying every instruction length that would
/// end exactly at the current row, longest first. Rows that cannot be
/// decoded are omitted, so the window may be shorter than requested.
#[must_use]
pub fn disassemble_window(
    center_pc: u32,
    before: usize,
    after: usize,
    code: &[u8],
) -> Vec<DisassemblyRow> {
    let mut found_before = Vec::with_capacity(before);
    let mut scan_pc = center_pc;
    while scan_pc > 0 && found_before.len() < before {
        let row = (1..=4_u32).rev().find_map(|len| {
            let try_pc = scan_pc.checked_sub(len)?;
            disassemble_one(try_pc, code).filter(|row| u32::from(row.len_bytes) == len)
        });
        match row {
            Some(row) => {
                scan_pc = row.addr_start;
                found_before.push(row);
            }
            None => scan_pc -= 1,
        }
    }
    found_before.reverse();

    let mut rows = found_before;
    rows.extend(disassemble_range(center_pc, after + 1, code));
    rows
}

/// Disassembles the instruction at `pc`, or `None` when its bytes run past
/// the end of `code`.
#[must_use]
pub fn disassemble_one(pc: u32, code: &[u8]) -> Option<DisassemblyRow> {
    let start = usize::try_from(pc).ok()?;
    let opcode = *code.get(start)?;
    let operation = Decoder::decode(opcode);
    let len = usize::from(operation.encoded_len());
    let raw = code.get(start..start.checked_add(len)?)?;
    let instr = Instruction::new(pc, opcode, &raw[1..]);

    Some(DisassemblyRow {
        addr_start: pc,
        len_bytes: operation.encoded_len(),
        raw_bytes: raw.to_vec(),
        mnemonic: mnemonic(operation).to_string(),
        operands: format_operands(&instr),
        is_illegal: operation.is_illegal(),
    })
}

/// Assembly mnemonic of an operation.
#[must_use]
pub const fn mnemonic(operation: Operation) -> &'static str {
    match operation {
        Operation::Nop => "NOP",
        Operation::Halt => "HALT",
        Operation::Log(_) => "LOG",
        Operation::LoadImmediate(_) => "LDI",
        Operation::LoadAbsolute(_) | Operation::LoadIndirect(_) => "LD",
        Operation::StoreAbsolute(_) | Operation::StoreIndirect(_) => "ST",
        Operation::Push(_) => "PUSH",
        Operation::Pop(_) => "POP",
        Operation::SetDp(_) => "SETDP",
        Operation::Move { .. } => "MOV",
        Operation::AluRegister { op, .. } | Operation::AluImmediate(op) => op.mnemonic(),
        Operation::Unary { op, .. } => op.mnemonic(),
        Operation::Jump(cond) => cond.mnemonic(),
        Operation::Call => "CALL",
        Operation::Return => "RET",
        Operation::Illegal => ".byte",
    }
}

fn format_operands(instr: &Instruction) -> String {
    match instr.operation {
        Operation::Nop | Operation::Halt | Operation::Return => String::new(),
        Operation::Log(r)
        | Operation::Push(r)
        | Operation::Pop(r)
        | Operation::SetDp(r)
        | Operation::Unary { reg: r, .. } => r.name().to_string(),
        Operation::LoadImmediate(r) => format!("{}, 0x{:02X}", r.name(), instr.imm8()),
        Operation::LoadAbsolute(r) => format!("{}, [0x{:04X}]", r.name(), instr.addr16()),
        Operation::StoreAbsolute(r) => format!("[0x{:04X}], {}", instr.addr16(), r.name()),
        Operation::LoadIndirect(r) => format!("{}, [CD]", r.name()),
        Operation::StoreIndirect(r) => format!("[CD], {}", r.name()),
        Operation::Move { dst, src } => format!("{}, {}", dst.name(), src.name()),
        Operation::AluRegister { src, .. } => format!("A, {}", src.name()),
        Operation::AluImmediate(_) => format!("A, 0x{:02X}", instr.imm8()),
        Operation::Jump(_) | Operation::Call => format!("0x{:06X}", instr.addr24()),
        Operation::Illegal => format!("0x{:02X} ; ILLEGAL", instr.opcode),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operands = format_operands(self);
        if operands.is_empty() {
            f.write_str(mnemonic(self.operation))
        } else {
            write!(f, "{} {operands}", mnemonic(self.operation))
        }
    }
}
