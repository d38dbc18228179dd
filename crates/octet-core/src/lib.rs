//! Core emulator crate for the Octet 8-bit virtual CPU.
//!
//! The core executes byte-encoded programs from a code region and mutates a
//! banked data region, one instruction per host-driven [`CoreState::step`].

/// Fault taxonomy surfaced by `step`.
pub mod fault;
pub use fault::{FaultClass, FaultCode};

/// Memory layout, access widths and the fixed-capacity image.
pub mod memory;
pub use memory::{
    AccessWidth, LayoutError, MemoryError, MemoryImage, MemoryLayout, MemoryRegion,
    RegionDescriptor, DATA_BANK_BYTES, DEFAULT_CODE_PAGES, DEFAULT_DATA_PAGES, PAGE_BYTES,
};

/// Architectural CPU state: registers and run state.
pub mod state;
pub use state::{
    GeneralRegister, Register, RegisterFile, RunState, FLAGS_ACTIVE_MASK, FLAG_C, FLAG_N, FLAG_V,
    FLAG_Z, GENERAL_REGISTER_COUNT,
};

/// Opcode bit-field layout and encode helpers.
pub mod encoding;
pub use encoding::{classify_opcode, AluOp, Condition, OpcodeFamily, OPCODE_FAMILY_TABLE};

/// Static decode table and fetched-instruction type.
pub mod decoder;
pub use decoder::{Decoder, Instruction, Operation, UnaryOp, DECODE_TABLE, MAX_OPERAND_BYTES};

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{
    execute_instruction, fetch_instruction, AluResult, ExecuteState, FlagsUpdate, PendingWrite,
};

/// Host-facing bridge: core state, configuration, outcomes and trace sink.
pub mod api;
pub use api::{
    CodeWritePolicy, CoreConfig, CoreState, ExecutionPhase, HostAccessError, NullTraceSink,
    RunOutcome, StepOutcome, TraceEvent, TraceSink,
};

/// Diagnostic counters.
pub mod diag;
pub use diag::DiagCounters;

/// Human-readable disassembly.
pub mod disasm;
pub use disasm::{disassemble_one, disassemble_range, disassemble_window, DisassemblyRow};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tracing_subscriber as _;
