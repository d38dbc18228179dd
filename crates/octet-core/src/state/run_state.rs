use crate::FaultCode;

/// Execution-control state machine driven by `init` and `step`.
///
/// `Uninitialized -> Ready` on init, `Ready -> Running` on the first step,
/// then `Halted` or `Faulted` are terminal until the next init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Constructed but never initialized; `step` is a precondition violation.
    #[default]
    Uninitialized,
    /// Initialized and waiting for the first step.
    Ready,
    /// At least one instruction retired and the core can continue.
    Running,
    /// A `HALT` retired.
    Halted,
    /// A fault froze the core.
    Faulted(FaultCode),
}

impl RunState {
    /// Returns the fault that froze the core, if any.
    #[must_use]
    pub const fn latched_fault(self) -> Option<FaultCode> {
        match self {
            Self::Faulted(cause) => Some(cause),
            Self::Uninitialized | Self::Ready | Self::Running | Self::Halted => None,
        }
    }

    /// Returns `true` when `step` may execute an instruction.
    #[must_use]
    pub const fn can_step(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    /// Returns `true` for `Halted` and `Faulted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Halted | Self::Faulted(_))
    }

    /// Short lower-case label for host display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Halted => "halted",
            Self::Faulted(_) => "faulted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RunState;
    use crate::FaultCode;

    #[test]
    fn run_state_default_is_uninitialized() {
        assert_eq!(RunState::default(), RunState::Uninitialized);
        assert!(!RunState::default().can_step());
    }

    #[test]
    fn latched_fault_accessor_reports_only_faulted_variant() {
        assert_eq!(RunState::Ready.latched_fault(), None);
        assert_eq!(RunState::Halted.latched_fault(), None);
        assert_eq!(
            RunState::Faulted(FaultCode::IllegalInstruction).latched_fault(),
            Some(FaultCode::IllegalInstruction)
        );
    }

    #[test]
    fn only_ready_and_running_can_step() {
        let states = [
            RunState::Uninitialized,
            RunState::Ready,
            RunState::Running,
            RunState::Halted,
            RunState::Faulted(FaultCode::OutOfBoundsAccess),
        ];
        let steppable: Vec<_> = states.iter().map(|state| state.can_step()).collect();
        assert_eq!(steppable, [false, true, true, false, false]);
        assert!(RunState::Halted.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }
}
