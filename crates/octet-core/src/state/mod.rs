//! Architectural CPU state: register file and run state.

/// Register names, widths and storage.
pub mod registers;
/// Execution-control state machine.
pub mod run_state;

pub use registers::{
    GeneralRegister, Register, RegisterFile, FLAGS_ACTIVE_MASK, FLAG_C, FLAG_N, FLAG_V, FLAG_Z,
    GENERAL_REGISTER_COUNT,
};
pub use run_state::RunState;
