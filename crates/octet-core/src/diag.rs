//! Diagnostic counters maintained by the core across steps.

use crate::{FaultClass, FaultCode};

/// Saturating counters describing what the core has executed since `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DiagCounters {
    /// Instructions retired, `HALT` included.
    pub instruction_count: u64,
    /// Memory-class faults raised.
    pub fault_count_memory: u32,
    /// Decode-class faults raised.
    pub fault_count_decode: u32,
    /// Control-class faults raised (precondition violations).
    pub fault_count_control: u32,
    /// Most recent fault, if any.
    pub last_fault_code: Option<FaultCode>,
    /// `PC` at the most recent fault.
    pub last_fault_pc: u32,
}

impl DiagCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one retired instruction.
    pub const fn record_retired(&mut self) {
        self.instruction_count = self.instruction_count.saturating_add(1);
    }

    /// Records a fault and bumps its class counter.
    pub const fn record_fault(&mut self, code: FaultCode, pc: u32) {
        self.last_fault_code = Some(code);
        self.last_fault_pc = pc;
        match code.class() {
            FaultClass::Memory => {
                self.fault_count_memory = self.fault_count_memory.saturating_add(1);
            }
            FaultClass::Decode => {
                self.fault_count_decode = self.fault_count_decode.saturating_add(1);
            }
            FaultClass::Control => {
                self.fault_count_control = self.fault_count_control.saturating_add(1);
            }
        }
    }

    /// Number of faults of a given class.
    #[must_use]
    pub const fn fault_count(&self, class: FaultClass) -> u32 {
        match class {
            FaultClass::Memory => self.fault_count_memory,
            FaultClass::Decode => self.fault_count_decode,
            FaultClass::Control => self.fault_count_control,
        }
    }

    /// Resets all counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
