//! Instruction execution pipeline for the Octet ISA.
//!
//! One step runs the full sequence:
//! 1. Fetch the opcode at `PC`
//! 2. Decode it through the static table
//! 3. Fetch the declared operand bytes
//! 4. Execute into a staged [`ExecuteState`]
//! 5. Commit the memory write, registers, sink output and next `PC`
//!
//! Faults are precise: anything raised before commit leaves registers and
//! memory untouched.

mod flags;
mod helpers;

pub use flags::FlagsUpdate;
pub use helpers::{
    alu, banked_address, code_target, data_offset, stack_offset, unary, AluResult,
};

use crate::api::{CoreState, StepOutcome, TraceEvent, TraceSink};
use crate::decoder::{Decoder, Instruction, Operation};
use crate::encoding::AluOp;
use crate::memory::{AccessWidth, MemoryImage};
use crate::state::{GeneralRegister, RegisterFile, RunState, FLAG_C};
use crate::FaultCode;

/// A single staged memory write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    /// Image offset of the first byte.
    pub offset: u32,
    /// Access width.
    pub width: AccessWidth,
    /// Value, written little-endian.
    pub value: u32,
}

/// Side effects of one instruction, staged until commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteState {
    /// Register file after the instruction, including the next `PC`.
    pub registers: RegisterFile,
    /// At most one memory write.
    pub memory_write: Option<PendingWrite>,
    /// Value emitted by `LOG`.
    pub log_value: Option<u8>,
    /// Set by `HALT`.
    pub halted: bool,
}

impl ExecuteState {
    /// Starts staging from the current register file.
    #[must_use]
    pub const fn new(registers: RegisterFile) -> Self {
        Self {
            registers,
            memory_write: None,
            log_value: None,
            halted: false,
        }
    }

    const fn load(&mut self, reg: GeneralRegister, value: u8) {
        self.registers.set_gpr(reg, value);
        self.set_flags(FlagsUpdate::ZeroNegative { result: value });
    }

    const fn set_flags(&mut self, update: FlagsUpdate) {
        let flags = update.apply(self.registers.flags());
        self.registers.set_flags(flags);
    }

    const fn write(&mut self, offset: u32, width: AccessWidth, value: u32) {
        self.memory_write = Some(PendingWrite {
            offset,
            width,
            value,
        });
    }

    const fn accumulate(&mut self, op: AluOp, operand: u8) {
        let a = self.registers.a();
        let carry_in = self.registers.flag_is_set(FLAG_C);
        let result = alu(op, a, operand, carry_in);
        if op.writes_result() {
            self.registers.set_gpr(GeneralRegister::A, result.value);
        }
        self.set_flags(result.flags);
    }
}

/// Fetches and decodes the instruction at `pc`.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfBoundsAccess`] when `pc` or any operand byte lies
/// outside the code region, and [`FaultCode::IllegalInstruction`] when the
/// opcode is unassigned.
pub fn fetch_instruction(memory: &MemoryImage, pc: u32) -> Result<Instruction, FaultCode> {
    let layout = memory.layout();
    if !layout.is_code_offset(pc) {
        return Err(FaultCode::OutOfBoundsAccess);
    }
    let opcode = memory.read_u8(pc)?;
    let operation = Decoder::decode(opcode);
    if operation.is_illegal() {
        return Err(FaultCode::IllegalInstruction);
    }

    let width = operation.operand_width();
    let end = u64::from(pc) + 1 + u64::from(width);
    if end > u64::from(layout.code_len()) {
        return Err(FaultCode::OutOfBoundsAccess);
    }
    let operands = memory.read_bytes(pc + 1, usize::from(width))?;
    Ok(Instruction::new(pc, opcode, operands))
}

/// Executes one instruction against a read-only view of the machine.
///
/// Pure: the result depends only on the instruction, the register file and
/// the memory image.
///
/// # Errors
///
/// Returns the fault the instruction raises. No state is staged in that case.
pub fn execute_instruction(
    instr: &Instruction,
    registers: &RegisterFile,
    memory: &MemoryImage,
) -> Result<ExecuteState, FaultCode> {
    let layout = memory.layout();
    let mut exec = ExecuteState::new(*registers);
    let mut next_pc = instr
        .sequential_pc()
        .ok_or(FaultCode::OutOfBoundsAccess)?;

    match instr.operation {
        Operation::Nop => {}
        Operation::Halt => exec.halted = true,
        Operation::Log(r) => exec.log_value = Some(registers.gpr(r)),
        Operation::LoadImmediate(r) => exec.load(r, instr.imm8()),
        Operation::LoadAbsolute(r) => {
            let [lo, hi] = instr.addr16().to_le_bytes();
            let ea = banked_address(registers.dp(), hi, lo);
            let offset = data_offset(layout, ea, AccessWidth::Byte)?;
            exec.load(r, memory.read_u8(offset)?);
        }
        Operation::StoreAbsolute(r) => {
            let [lo, hi] = instr.addr16().to_le_bytes();
            let ea = banked_address(registers.dp(), hi, lo);
            let offset = data_offset(layout, ea, AccessWidth::Byte)?;
            exec.write(offset, AccessWidth::Byte, u32::from(registers.gpr(r)));
        }
        Operation::LoadIndirect(r) => {
            let offset = data_offset(layout, indirect_address(registers), AccessWidth::Byte)?;
            exec.load(r, memory.read_u8(offset)?);
        }
        Operation::StoreIndirect(r) => {
            let offset = data_offset(layout, indirect_address(registers), AccessWidth::Byte)?;
            exec.write(offset, AccessWidth::Byte, u32::from(registers.gpr(r)));
        }
        Operation::Push(r) => {
            let sp = registers.sp().wrapping_sub(1);
            let offset = stack_offset(layout, sp, AccessWidth::Byte)?;
            exec.write(offset, AccessWidth::Byte, u32::from(registers.gpr(r)));
            exec.registers.set_sp(sp);
        }
        Operation::Pop(r) => {
            let sp = registers.sp();
            let offset = stack_offset(layout, sp, AccessWidth::Byte)?;
            exec.load(r, memory.read_u8(offset)?);
            exec.registers.set_sp(sp.wrapping_add(1));
        }
        Operation::SetDp(r) => exec.registers.set_dp(registers.gpr(r)),
        Operation::Move { dst, src } => exec.load(dst, registers.gpr(src)),
        Operation::AluRegister { op, src } => exec.accumulate(op, registers.gpr(src)),
        Operation::AluImmediate(op) => exec.accumulate(op, instr.imm8()),
        Operation::Unary { op, reg } => {
            let result = unary(op, registers.gpr(reg));
            exec.registers.set_gpr(reg, result.value);
            exec.set_flags(result.flags);
        }
        Operation::Jump(cond) => {
            if cond.holds(registers.flags()) {
                next_pc = instr.addr24();
            }
        }
        Operation::Call => {
            let sp = registers.sp().wrapping_sub(4);
            let offset = stack_offset(layout, sp, AccessWidth::Word)?;
            exec.write(offset, AccessWidth::Word, next_pc);
            exec.registers.set_sp(sp);
            next_pc = instr.addr24();
        }
        Operation::Return => {
            let sp = registers.sp();
            let offset = stack_offset(layout, sp, AccessWidth::Word)?;
            next_pc = memory.read(offset, AccessWidth::Word)?;
            exec.registers.set_sp(sp.wrapping_add(4));
        }
        Operation::Illegal => return Err(FaultCode::IllegalInstruction),
    }

    // HALT may leave PC one past the code region; the core is terminal then.
    if !exec.halted {
        next_pc = code_target(layout, next_pc)?;
    }
    exec.registers.set_pc(next_pc);
    Ok(exec)
}

fn indirect_address(registers: &RegisterFile) -> u32 {
    banked_address(
        registers.dp(),
        registers.gpr(GeneralRegister::C),
        registers.gpr(GeneralRegister::D),
    )
}

/// Applies staged side effects. The memory write goes first so a failing
/// write leaves the register file untouched.
pub(crate) fn commit_execution(
    state: &mut CoreState,
    instr: &Instruction,
    exec: &ExecuteState,
    sink: &mut dyn TraceSink,
) -> Result<(), FaultCode> {
    if let Some(write) = exec.memory_write {
        state.memory.write(write.offset, write.width, write.value)?;
    }
    state.registers = exec.registers;
    if let Some(value) = exec.log_value {
        sink.on_event(TraceEvent::Log {
            pc: instr.pc,
            value,
        });
    }
    Ok(())
}

/// Executes exactly one instruction and updates the run state.
pub(crate) fn step_one(state: &mut CoreState, sink: &mut dyn TraceSink) -> StepOutcome {
    match state.run_state {
        RunState::Uninitialized => {
            tracing::error!("step called before init");
            return report_fault(state, sink, FaultCode::PreconditionViolation);
        }
        RunState::Halted => return StepOutcome::Halted,
        RunState::Faulted(cause) => return StepOutcome::Faulted { cause },
        RunState::Ready => state.run_state = RunState::Running,
        RunState::Running => {}
    }

    let pc = state.registers.pc();
    match retire(state, sink) {
        Ok((instr, exec)) => {
            state.diag.record_retired();
            tracing::trace!(pc, opcode = instr.opcode, instruction = %instr, "retired");
            if state.config.tracing_enabled {
                sink.on_event(TraceEvent::InstructionRetired {
                    pc,
                    opcode: instr.opcode,
                });
            }
            if exec.halted {
                state.run_state = RunState::Halted;
                tracing::debug!(pc, "halted");
                StepOutcome::Halted
            } else {
                StepOutcome::Running
            }
        }
        Err(cause) => {
            tracing::warn!(pc, %cause, "fault raised");
            if cause.latches() {
                state.run_state = RunState::Faulted(cause);
            }
            report_fault(state, sink, cause)
        }
    }
}

fn retire(
    state: &mut CoreState,
    sink: &mut dyn TraceSink,
) -> Result<(Instruction, ExecuteState), FaultCode> {
    let instr = fetch_instruction(&state.memory, state.registers.pc())?;
    let exec = execute_instruction(&instr, &state.registers, &state.memory)?;
    commit_execution(state, &instr, &exec, sink)?;
    Ok((instr, exec))
}

fn report_fault(state: &mut CoreState, sink: &mut dyn TraceSink, cause: FaultCode) -> StepOutcome {
    let pc = state.registers.pc();
    state.diag.record_fault(cause, pc);
    if state.config.tracing_enabled {
        sink.on_event(TraceEvent::FaultRaised { pc, cause });
    }
    StepOutcome::Faulted { cause }
}

#[cfg(test)]
mod tests {
    use super::{execute_instruction, fetch_instruction, ExecuteState, PendingWrite};
    use crate::decoder::Instruction;
    use crate::encoding::{self, AluOp, Condition};
    use crate::memory::{AccessWidth, MemoryImage, MemoryLayout};
    use crate::state::{GeneralRegister, Register, RegisterFile, FLAG_C, FLAG_N, FLAG_Z};
    use crate::FaultCode;

    const CODE_LEN: u32 = 0x100;
    const DATA_LEN: u32 = 0x2_0000;

    fn image(code: &[u8]) -> MemoryImage {
        let layout = MemoryLayout::new(CODE_LEN, DATA_LEN).expect("valid layout");
        let mut memory = MemoryImage::new(layout).expect("valid image");
        memory.write_bytes(0, code).expect("program fits");
        memory
    }

    fn exec(code: &[u8], registers: &RegisterFile) -> Result<ExecuteState, FaultCode> {
        let memory = image(code);
        let instr = fetch_instruction(&memory, registers.pc())?;
        execute_instruction(&instr, registers, &memory)
    }

    #[test]
    fn nop_only_advances_pc() {
        let registers = RegisterFile::default();
        let staged = exec(&[encoding::NOP], &registers).expect("nop executes");
        assert_eq!(staged.registers.pc(), 1);
        assert_eq!(staged.memory_write, None);
        assert!(!staged.halted);
    }

    #[test]
    fn load_immediate_sets_zero_and_negative() {
        let mut registers = RegisterFile::default();
        registers.set_flags(FLAG_C);
        let staged = exec(&[encoding::ldi(GeneralRegister::D), 0x90], &registers)
            .expect("ldi executes");
        assert_eq!(staged.registers.gpr(GeneralRegister::D), 0x90);
        assert_eq!(staged.registers.flags(), FLAG_C | FLAG_N);
        assert_eq!(staged.registers.pc(), 2);
    }

    #[test]
    fn add_a_b_follows_the_documented_examples() {
        let mut registers = RegisterFile::default();
        registers.set_gpr(GeneralRegister::A, 10);
        registers.set_gpr(GeneralRegister::B, 5);
        let staged = exec(&[0x80], &registers).expect("add executes");
        assert_eq!(staged.registers.a(), 15);
        assert_eq!(staged.registers.gpr(GeneralRegister::B), 5);
        assert_eq!(staged.registers.pc(), 1);
        assert_eq!(staged.registers.flags() & FLAG_C, 0);

        registers.set_gpr(GeneralRegister::A, 250);
        registers.set_gpr(GeneralRegister::B, 10);
        let staged = exec(&[0x80], &registers).expect("add executes");
        assert_eq!(staged.registers.a(), 4);
        assert_eq!(staged.registers.gpr(GeneralRegister::B), 10);
        assert_eq!(staged.registers.pc(), 1);
        assert_ne!(staged.registers.flags() & FLAG_C, 0);
    }

    #[test]
    fn compare_only_touches_flags() {
        let mut registers = RegisterFile::default();
        registers.set_gpr(GeneralRegister::A, 7);
        let staged = exec(&[encoding::alu_imm(AluOp::Cmp), 7], &registers).expect("cmp executes");
        assert_eq!(staged.registers.a(), 7);
        assert_eq!(staged.registers.flags(), FLAG_Z);
    }

    #[test]
    fn store_is_staged_not_applied() {
        let mut registers = RegisterFile::default();
        registers.set_gpr(GeneralRegister::B, 0xAB);
        registers.set_dp(1);
        let code = [encoding::st_abs(GeneralRegister::B), 0x34, 0x12];
        let staged = exec(&code, &registers).expect("store executes");
        assert_eq!(
            staged.memory_write,
            Some(PendingWrite {
                offset: CODE_LEN + 0x1_1234,
                width: AccessWidth::Byte,
                value: 0xAB,
            })
        );
    }

    #[test]
    fn banked_load_past_the_data_region_faults() {
        let mut registers = RegisterFile::default();
        registers.set_dp(2);
        let code = [encoding::ld_abs(GeneralRegister::A), 0x00, 0x00];
        assert_eq!(exec(&code, &registers), Err(FaultCode::OutOfBoundsAccess));
    }

    #[test]
    fn indirect_address_uses_c_high_and_d_low() {
        let mut registers = RegisterFile::default();
        registers.set_gpr(GeneralRegister::C, 0x12);
        registers.set_gpr(GeneralRegister::D, 0x34);
        registers.set_gpr(GeneralRegister::A, 0x55);
        let staged = exec(&[encoding::st_ind(GeneralRegister::A)], &registers)
            .expect("indirect store executes");
        assert_eq!(
            staged.memory_write.map(|write| write.offset),
            Some(CODE_LEN + 0x1234)
        );
    }

    #[test]
    fn first_push_after_reset_writes_the_top_of_bank_zero() {
        let mut registers = RegisterFile::default();
        registers.set_gpr(GeneralRegister::A, 9);
        let staged = exec(&[encoding::push(GeneralRegister::A)], &registers).expect("push");
        assert_eq!(staged.registers.sp(), 0xFFFF);
        assert_eq!(
            staged.memory_write.map(|write| write.offset),
            Some(CODE_LEN + 0xFFFF)
        );
    }

    #[test]
    fn taken_and_not_taken_branches() {
        let code = [encoding::jump(Condition::Zero), 0x40, 0x00, 0x00];
        let mut registers = RegisterFile::default();
        let staged = exec(&code, &registers).expect("branch executes");
        assert_eq!(staged.registers.pc(), 4);

        registers.set_flags(FLAG_Z);
        let staged = exec(&code, &registers).expect("branch executes");
        assert_eq!(staged.registers.pc(), 0x40);
    }

    #[test]
    fn jump_outside_code_faults_without_staging() {
        let code = [encoding::jump(Condition::Always), 0x00, 0x01, 0x00];
        assert_eq!(
            exec(&code, &RegisterFile::default()),
            Err(FaultCode::OutOfBoundsAccess)
        );
    }

    #[test]
    fn call_pushes_a_four_byte_return_address() {
        let code = [encoding::CALL, 0x20, 0x00, 0x00];
        let staged = exec(&code, &RegisterFile::default()).expect("call executes");
        assert_eq!(staged.registers.pc(), 0x20);
        assert_eq!(staged.registers.sp(), 0xFFFC);
        assert_eq!(
            staged.memory_write,
            Some(PendingWrite {
                offset: CODE_LEN + 0xFFFC,
                width: AccessWidth::Word,
                value: 4,
            })
        );
    }

    #[test]
    fn halt_at_the_last_code_byte_is_allowed() {
        let mut memory = image(&[]);
        let last = CODE_LEN - 1;
        memory
            .write_bytes(last, &[encoding::HALT])
            .expect("in bounds");
        let mut registers = RegisterFile::default();
        registers.set(Register::Pc, last);
        let instr = fetch_instruction(&memory, last).expect("fetch");
        let staged = execute_instruction(&instr, &registers, &memory).expect("halt executes");
        assert!(staged.halted);
        assert_eq!(staged.registers.pc(), CODE_LEN);
    }

    #[test]
    fn falling_off_the_code_region_faults() {
        let mut memory = image(&[]);
        let last = CODE_LEN - 1;
        memory.write_bytes(last, &[encoding::NOP]).expect("in bounds");
        let instr = fetch_instruction(&memory, last).expect("fetch");
        assert_eq!(
            execute_instruction(&instr, &RegisterFile::default(), &memory),
            Err(FaultCode::OutOfBoundsAccess)
        );
    }

    #[test]
    fn operands_past_the_code_end_fault_at_fetch() {
        let mut memory = image(&[]);
        memory
            .write_bytes(CODE_LEN - 2, &[encoding::CALL, 0x00])
            .expect("in bounds");
        assert_eq!(
            fetch_instruction(&memory, CODE_LEN - 2),
            Err(FaultCode::OutOfBoundsAccess)
        );
    }

    #[test]
    fn illegal_opcodes_fault_at_fetch() {
        let memory = image(&[0xFF]);
        assert_eq!(
            fetch_instruction(&memory, 0),
            Err(FaultCode::IllegalInstruction)
        );
        let instr = Instruction::new(0, 0xFF, &[]);
        assert_eq!(
            execute_instruction(&instr, &RegisterFile::default(), &memory),
            Err(FaultCode::IllegalInstruction)
        );
    }
}
