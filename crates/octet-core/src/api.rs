//! Public host-facing API for embedding the emulator core.
//!
//! The host owns the cadence: it constructs a [`CoreState`], seeds the code
//! region, calls [`CoreState::init`] once and then [`CoreState::step`] as
//! often as it likes, inspecting registers and memory between steps.

use thiserror::Error;

use crate::execute::step_one;
use crate::memory::{AccessWidth, LayoutError, MemoryError, MemoryImage, MemoryLayout};
use crate::state::{Register, RegisterFile, RunState};
use crate::{DiagCounters, FaultCode};

/// When the host may write into the code region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CodeWritePolicy {
    /// Code bytes stay writable for the whole lifetime of the core.
    #[default]
    Always,
    /// Code bytes are writable only until the first `init`.
    BeforeInit,
}

/// Core construction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Code/data region sizes.
    pub layout: MemoryLayout,
    /// Emits `InstructionRetired` and `FaultRaised` events to the trace sink
    /// in addition to `LOG` output.
    pub tracing_enabled: bool,
    /// Host write policy for the code region.
    pub code_writes: CodeWritePolicy,
}

/// Who currently owns registers and memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ExecutionPhase {
    /// Between steps; the host may read and write.
    #[default]
    Idle,
    /// The engine is executing an instruction. Observed by the host only
    /// when a step unwound, in which case it persists until `init`.
    Stepping,
}

/// Result of one `step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StepOutcome {
    /// An instruction retired and the core can continue.
    Running,
    /// The core is halted.
    Halted,
    /// The core is faulted, or the call violated the execution contract.
    Faulted {
        /// Fault cause.
        cause: FaultCode,
    },
}

impl StepOutcome {
    /// Returns `true` when another step could make progress.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Result of a bounded multi-step run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Number of `step` calls made.
    pub steps: u32,
    /// Outcome of the last step, or the current status when no step ran.
    pub final_step: StepOutcome,
}

/// Host-visible diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TraceEvent {
    /// Value emitted by `LOG`. Always delivered.
    Log {
        /// Address of the `LOG` instruction.
        pc: u32,
        /// Register value.
        value: u8,
    },
    /// An instruction retired. Delivered only with tracing enabled.
    InstructionRetired {
        /// Address of the instruction.
        pc: u32,
        /// Opcode byte.
        opcode: u8,
    },
    /// A fault was raised. Delivered only with tracing enabled.
    FaultRaised {
        /// `PC` at the fault.
        pc: u32,
        /// Fault cause.
        cause: FaultCode,
    },
}

/// Fire-and-forget diagnostic sink.
pub trait TraceSink {
    /// Receives one event. Cannot influence execution.
    fn on_event(&mut self, event: TraceEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn on_event(&mut self, _event: TraceEvent) {}
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Host access refused by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostAccessError {
    /// A step is in progress or unwound; call `init` to recover.
    #[error("core is mid-step; host access refused until init")]
    StepInProgress,
    /// The range lies outside the memory image or the target region.
    #[error("access of {len} bytes at offset {offset:#x} is out of bounds")]
    OutOfBounds {
        /// First byte of the access.
        offset: u32,
        /// Number of bytes requested.
        len: usize,
    },
    /// The code region is locked by [`CodeWritePolicy::BeforeInit`].
    #[error("code region is locked after init (write at {offset:#x})")]
    CodeRegionLocked {
        /// First byte of the refused write.
        offset: u32,
    },
    /// No register has this name.
    #[error("unknown register `{0}`")]
    UnknownRegister(String),
}

impl From<MemoryError> for HostAccessError {
    fn from(value: MemoryError) -> Self {
        match value {
            MemoryError::OutOfBounds { offset, len, .. } => Self::OutOfBounds { offset, len },
            MemoryError::GrowthRefused { requested, capacity } => Self::OutOfBounds {
                offset: u32::try_from(capacity).unwrap_or(u32::MAX),
                len: requested,
            },
        }
    }
}

/// The emulator core: configuration, registers, memory image and run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreState {
    pub(crate) config: CoreConfig,
    pub(crate) registers: RegisterFile,
    pub(crate) memory: MemoryImage,
    pub(crate) run_state: RunState,
    pub(crate) phase: ExecutionPhase,
    pub(crate) diag: DiagCounters,
}

impl CoreState {
    /// Allocates a zeroed image for `config.layout` and an uninitialized core.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] when the layout is invalid.
    pub fn new(config: CoreConfig) -> Result<Self, LayoutError> {
        let memory = MemoryImage::new(config.layout)?;
        Ok(Self::with_memory(config, memory))
    }

    /// Binds the core to a host-allocated image. The image's layout replaces
    /// `config.layout`.
    #[must_use]
    pub fn with_memory(mut config: CoreConfig, memory: MemoryImage) -> Self {
        config.layout = memory.layout();
        Self {
            config,
            registers: RegisterFile::default(),
            memory,
            run_state: RunState::Uninitialized,
            phase: ExecutionPhase::Idle,
            diag: DiagCounters::default(),
        }
    }

    /// Configuration the core was built with.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Region layout of the memory image.
    #[must_use]
    pub const fn layout(&self) -> MemoryLayout {
        self.config.layout
    }

    /// Current run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Current ownership phase.
    #[must_use]
    pub const fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    /// Counters accumulated since the last `init`.
    #[must_use]
    pub const fn diagnostics(&self) -> &DiagCounters {
        &self.diag
    }

    /// Resets registers and counters, keeps memory, and moves to `Ready`.
    ///
    /// Also clears a poisoned [`ExecutionPhase::Stepping`].
    pub fn init(&mut self) {
        self.registers = RegisterFile::default();
        self.diag.reset();
        self.phase = ExecutionPhase::Idle;
        self.run_state = RunState::Ready;
        tracing::debug!(
            code_len = self.config.layout.code_len(),
            data_len = self.config.layout.data_len(),
            "core initialized"
        );
    }

    /// Executes exactly one instruction.
    ///
    /// Before `init`, and while a previous step is poisoned, this reports
    /// [`FaultCode::PreconditionViolation`] and changes nothing.
    pub fn step(&mut self, sink: &mut dyn TraceSink) -> StepOutcome {
        if self.phase == ExecutionPhase::Stepping {
            tracing::error!("step refused: previous step did not complete");
            return StepOutcome::Faulted {
                cause: FaultCode::PreconditionViolation,
            };
        }
        self.phase = ExecutionPhase::Stepping;
        let outcome = step_one(self, sink);
        self.phase = ExecutionPhase::Idle;
        outcome
    }

    /// Steps up to `max_steps` times, stopping early once the core halts or
    /// faults.
    pub fn run(&mut self, sink: &mut dyn TraceSink, max_steps: u32) -> RunOutcome {
        let mut outcome = RunOutcome {
            steps: 0,
            final_step: self.status(),
        };
        while outcome.steps < max_steps {
            outcome.final_step = self.step(sink);
            outcome.steps += 1;
            if !outcome.final_step.is_running() {
                break;
            }
        }
        outcome
    }

    fn status(&self) -> StepOutcome {
        match self.run_state {
            RunState::Uninitialized => StepOutcome::Faulted {
                cause: FaultCode::PreconditionViolation,
            },
            RunState::Ready | RunState::Running => StepOutcome::Running,
            RunState::Halted => StepOutcome::Halted,
            RunState::Faulted(cause) => StepOutcome::Faulted { cause },
        }
    }

    const fn ensure_idle(&self) -> Result<(), HostAccessError> {
        match self.phase {
            ExecutionPhase::Idle => Ok(()),
            ExecutionPhase::Stepping => Err(HostAccessError::StepInProgress),
        }
    }

    /// Snapshot of the register file.
    ///
    /// # Errors
    ///
    /// Returns [`HostAccessError::StepInProgress`] while a step owns the core.
    pub fn registers(&self) -> Result<&RegisterFile, HostAccessError> {
        self.ensure_idle()?;
        Ok(&self.registers)
    }

    /// Reads a register.
    ///
    /// # Errors
    ///
    /// Returns [`HostAccessError::StepInProgress`] while a step owns the core.
    pub fn read_register(&self, reg: Register) -> Result<u32, HostAccessError> {
        self.registers().map(|registers| registers.get(reg))
    }

    /// Reads a register by case-insensitive name (`"A"`, `"dp"`, `"PC"`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`HostAccessError::UnknownRegister`] for unknown names and
    /// [`HostAccessError::StepInProgress`] while a step owns the core.
    pub fn read_register_by_name(&self, name: &str) -> Result<u32, HostAccessError> {
        let reg = Register::from_name(name)
            .ok_or_else(|| HostAccessError::UnknownRegister(name.to_string()))?;
        self.read_register(reg)
    }

    /// Reads a little-endian value at an image offset.
    ///
    /// # Errors
    ///
    /// Returns [`HostAccessError::OutOfBounds`] past the image end and
    /// [`HostAccessError::StepInProgress`] while a step owns the core.
    pub fn read_memory(&self, offset: u32, width: AccessWidth) -> Result<u32, HostAccessError> {
        self.ensure_idle()?;
        Ok(self.memory.read(offset, width)?)
    }

    /// Borrows a byte range of the image.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_memory`].
    pub fn read_memory_bytes(&self, offset: u32, len: usize) -> Result<&[u8], HostAccessError> {
        self.ensure_idle()?;
        Ok(self.memory.read_bytes(offset, len)?)
    }

    /// Borrows the whole memory image.
    ///
    /// # Errors
    ///
    /// Returns [`HostAccessError::StepInProgress`] while a step owns the core.
    pub fn memory(&self) -> Result<&MemoryImage, HostAccessError> {
        self.ensure_idle()?;
        Ok(&self.memory)
    }

    /// Copies `bytes` into the image at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`HostAccessError::OutOfBounds`] past the image end,
    /// [`HostAccessError::CodeRegionLocked`] when the write touches code after
    /// `init` under [`CodeWritePolicy::BeforeInit`], and
    /// [`HostAccessError::StepInProgress`] while a step owns the core.
    pub fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> Result<(), HostAccessError> {
        self.ensure_idle()?;
        let locked = self.config.code_writes == CodeWritePolicy::BeforeInit
            && self.run_state != RunState::Uninitialized;
        if locked && !bytes.is_empty() && self.config.layout.is_code_offset(offset) {
            return Err(HostAccessError::CodeRegionLocked { offset });
        }
        self.memory.write_bytes(offset, bytes)?;
        Ok(())
    }

    /// Seeds the code region from offset 0.
    ///
    /// # Errors
    ///
    /// Returns [`HostAccessError::OutOfBounds`] when the program is larger
    /// than the code region, plus the errors of [`Self::write_memory`].
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), HostAccessError> {
        if program.len() > self.config.layout.code_len() as usize {
            return Err(HostAccessError::OutOfBounds {
                offset: 0,
                len: program.len(),
            });
        }
        self.write_memory(0, program)?;
        tracing::debug!(len = program.len(), "program loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CodeWritePolicy, CoreConfig, CoreState, ExecutionPhase, HostAccessError, NullTraceSink,
        StepOutcome, TraceEvent,
    };
    use crate::encoding::{self, AluOp};
    use crate::memory::{AccessWidth, MemoryImage, MemoryLayout, PAGE_BYTES};
    use crate::state::{GeneralRegister, Register, RunState};
    use crate::FaultCode;

    fn small_config() -> CoreConfig {
        CoreConfig {
            layout: MemoryLayout::new(0x100, 0x1_0000).expect("valid layout"),
            ..CoreConfig::default()
        }
    }

    fn core_with(program: &[u8]) -> CoreState {
        let mut core = CoreState::new(small_config()).expect("valid config");
        core.load_program(program).expect("program fits");
        core.init();
        core
    }

    #[test]
    fn default_config_is_sixteen_plus_two_pages() {
        let config = CoreConfig::default();
        assert_eq!(config.layout.total_len(), 18 * PAGE_BYTES as usize);
        assert!(!config.tracing_enabled);
        assert_eq!(config.code_writes, CodeWritePolicy::Always);
    }

    #[test]
    fn construction_leaves_the_core_uninitialized() {
        let core = CoreState::new(small_config()).expect("valid config");
        assert_eq!(core.run_state(), RunState::Uninitialized);
        assert_eq!(core.phase(), ExecutionPhase::Idle);
    }

    #[test]
    fn with_memory_adopts_the_image_layout() {
        let layout = MemoryLayout::new(0x40, 0x40).expect("valid layout");
        let image = MemoryImage::new(layout).expect("valid image");
        let core = CoreState::with_memory(CoreConfig::default(), image);
        assert_eq!(core.layout(), layout);
    }

    #[test]
    fn step_before_init_is_a_precondition_violation() {
        let mut core = CoreState::new(small_config()).expect("valid config");
        let outcome = core.step(&mut NullTraceSink);
        assert_eq!(
            outcome,
            StepOutcome::Faulted {
                cause: FaultCode::PreconditionViolation
            }
        );
        assert_eq!(core.run_state(), RunState::Uninitialized);
        assert_eq!(core.read_register(Register::Pc), Ok(0));
    }

    #[test]
    fn init_moves_to_ready_and_first_step_to_running() {
        let mut core = core_with(&[encoding::NOP, encoding::HALT]);
        assert_eq!(core.run_state(), RunState::Ready);
        assert_eq!(core.step(&mut NullTraceSink), StepOutcome::Running);
        assert_eq!(core.run_state(), RunState::Running);
        assert_eq!(core.step(&mut NullTraceSink), StepOutcome::Halted);
        assert_eq!(core.run_state(), RunState::Halted);
        assert_eq!(core.read_register(Register::Pc), Ok(2));
    }

    #[test]
    fn init_resets_registers_and_keeps_memory() {
        let program = [encoding::ldi(GeneralRegister::A), 0x42, encoding::HALT];
        let mut core = core_with(&program);
        core.run(&mut NullTraceSink, 10);
        assert_eq!(core.read_register(Register::A), Ok(0x42));

        core.init();
        assert_eq!(core.read_register(Register::A), Ok(0));
        assert_eq!(core.diagnostics().instruction_count, 0);
        assert_eq!(
            core.read_memory_bytes(0, 3).expect("in bounds"),
            &program[..]
        );
    }

    #[test]
    fn registers_are_readable_by_name() {
        let core = core_with(&[]);
        assert_eq!(core.read_register_by_name("sp"), Ok(0));
        assert_eq!(
            core.read_register_by_name("R0"),
            Err(HostAccessError::UnknownRegister("R0".to_string()))
        );
    }

    #[test]
    fn log_reaches_the_sink_even_without_tracing() {
        let program = [
            encoding::ldi(GeneralRegister::C),
            7,
            encoding::log(GeneralRegister::C),
            encoding::HALT,
        ];
        let mut core = core_with(&program);
        let mut events: Vec<TraceEvent> = Vec::new();
        core.run(&mut events, 10);
        assert_eq!(events, vec![TraceEvent::Log { pc: 2, value: 7 }]);
    }

    #[test]
    fn tracing_adds_retire_and_fault_events() {
        let config = CoreConfig {
            tracing_enabled: true,
            ..small_config()
        };
        let mut core = CoreState::new(config).expect("valid config");
        core.load_program(&[encoding::NOP, 0xFF]).expect("fits");
        core.init();
        let mut events: Vec<TraceEvent> = Vec::new();
        core.run(&mut events, 10);
        assert_eq!(
            events,
            vec![
                TraceEvent::InstructionRetired { pc: 0, opcode: 0 },
                TraceEvent::FaultRaised {
                    pc: 1,
                    cause: FaultCode::IllegalInstruction
                },
            ]
        );
    }

    #[test]
    fn run_stops_at_halt() {
        let mut core = core_with(&[encoding::NOP, encoding::NOP, encoding::HALT, encoding::NOP]);
        let outcome = core.run(&mut NullTraceSink, 100);
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.final_step, StepOutcome::Halted);

        let again = core.run(&mut NullTraceSink, 0);
        assert_eq!(again.steps, 0);
        assert_eq!(again.final_step, StepOutcome::Halted);
    }

    #[test]
    fn code_writes_follow_the_policy() {
        let config = CoreConfig {
            code_writes: CodeWritePolicy::BeforeInit,
            ..small_config()
        };
        let mut core = CoreState::new(config).expect("valid config");
        core.load_program(&[encoding::NOP]).expect("writable before init");
        core.init();
        assert_eq!(
            core.write_memory(0, &[encoding::HALT]),
            Err(HostAccessError::CodeRegionLocked { offset: 0 })
        );
        core.write_memory(0x100, &[1, 2]).expect("data stays writable");
        assert_eq!(core.read_memory(0x100, AccessWidth::Half), Ok(0x0201));

        let mut open = core_with(&[encoding::NOP]);
        open.write_memory(0, &[encoding::HALT]).expect("always writable");
        assert_eq!(open.step(&mut NullTraceSink), StepOutcome::Halted);
    }

    #[test]
    fn host_memory_access_is_bounds_checked() {
        let mut core = core_with(&[]);
        let end = u32::try_from(core.layout().total_len()).expect("fits");
        assert_eq!(
            core.write_memory(end - 1, &[0, 0]),
            Err(HostAccessError::OutOfBounds {
                offset: end - 1,
                len: 2
            })
        );
        assert!(core.read_memory(end, AccessWidth::Byte).is_err());
        assert!(core.load_program(&[0; 0x101]).is_err());
    }

    #[test]
    fn accumulator_program_updates_flags() {
        let program = [
            encoding::ldi(GeneralRegister::A),
            0xF0,
            encoding::alu_imm(AluOp::Add),
            0x10,
            encoding::HALT,
        ];
        let mut core = core_with(&program);
        core.run(&mut NullTraceSink, 10);
        assert_eq!(core.read_register(Register::A), Ok(0));
        assert_eq!(core.read_register(Register::F), Ok(0b0101));
    }
}
