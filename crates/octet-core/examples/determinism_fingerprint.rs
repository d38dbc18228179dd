//! Deterministic run fingerprint used for cross-host comparison.
//!
//! Runs a fixed counter program to completion and prints an FNV-1a hash of
//! the final registers, `LOG` output and data region. Set `RUST_LOG=trace`
//! to see every retired instruction.

use octet_core::encoding::{self, AluOp, Condition, CALL, HALT, RET};
use octet_core::{CoreConfig, CoreState, GeneralRegister::*, Register, StepOutcome, TraceEvent};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber::EnvFilter;

const STEP_LIMIT: u32 = 10_000;

fn program() -> Vec<u8> {
    let mut code = vec![
        encoding::ldi(A),
        0x00,
        encoding::ldi(C),
        0x00,
        encoding::ldi(D),
        0x00,
        // loop @ 0x06
        CALL,
        0x20,
        0x00,
        0x00,
        encoding::alu_imm(AluOp::Cmp),
        0x0A,
        encoding::jump(Condition::NotZero),
        0x06,
        0x00,
        0x00,
        HALT,
    ];
    code.resize(0x20, encoding::NOP);
    // 0x20: A += 1, LOG A, store at [C:D], D += 1
    code.extend([
        encoding::inc(A),
        encoding::log(A),
        encoding::st_ind(A),
        encoding::inc(D),
        encoding::push(A),
        encoding::pop(B),
        RET,
    ]);
    code
}

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> Result<String, Box<dyn std::error::Error>> {
    let mut core = CoreState::new(CoreConfig::default())?;
    core.load_program(&program())?;
    core.init();

    let mut events: Vec<TraceEvent> = Vec::new();
    let outcome = core.run(&mut events, STEP_LIMIT);
    if outcome.final_step != StepOutcome::Halted {
        return Err(format!("program did not halt: {:?}", outcome.final_step).into());
    }

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    hash_bytes(&mut hash, &outcome.steps.to_le_bytes());
    for register in Register::ALL {
        hash_bytes(&mut hash, &core.read_register(register)?.to_le_bytes());
    }
    for event in &events {
        if let TraceEvent::Log { pc, value } = event {
            hash_bytes(&mut hash, &pc.to_le_bytes());
            hash_bytes(&mut hash, &[*value]);
        }
    }
    hash_bytes(&mut hash, core.memory()?.data());

    Ok(format!("{hash:016x}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("{}", fingerprint()?);
    Ok(())
}
