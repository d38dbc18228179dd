//! WebAssembly bindings for the Octet core.
//!
//! Mirrors the host bridge for a browser page: construct, load, `init`, then
//! `cycle` once per animation frame.

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

use octet_core::{
    AccessWidth, CoreConfig, CoreState, DiagCounters, FaultCode, MemoryImage, MemoryLayout,
    RegisterFile, RunOutcome, StepOutcome, TraceEvent, TraceSink,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

macro_rules! console_log {
    ($($t:tt)*) => (web_sys::console::log_1(&format!($($t)*).into()))
}

/// JS-compatible version of StepOutcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WasmStepOutcome {
    Running,
    Halted,
    Faulted { code: u8, cause: String },
}

impl From<StepOutcome> for WasmStepOutcome {
    fn from(value: StepOutcome) -> Self {
        match value {
            StepOutcome::Running => Self::Running,
            StepOutcome::Halted => Self::Halted,
            StepOutcome::Faulted { cause } => Self::Faulted {
                code: cause.as_u8(),
                cause: cause.to_string(),
            },
        }
    }
}

/// JS-compatible version of RunOutcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmRunOutcome {
    pub steps: u32,
    pub final_step: WasmStepOutcome,
}

impl From<RunOutcome> for WasmRunOutcome {
    fn from(value: RunOutcome) -> Self {
        Self {
            steps: value.steps,
            final_step: value.final_step.into(),
        }
    }
}

/// Host-visible snapshot returned by `getState`. Memory is left out; use
/// `memoryView` for that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WasmCoreState {
    pub run_state: &'static str,
    pub fault: Option<u8>,
    pub registers: RegisterFile,
    pub layout: MemoryLayout,
    pub diagnostics: DiagCounters,
}

fn snapshot(core: &CoreState) -> Result<WasmCoreState, JsError> {
    let run_state = core.run_state();
    Ok(WasmCoreState {
        run_state: run_state.label(),
        fault: run_state.latched_fault().map(FaultCode::as_u8),
        registers: *core.registers()?,
        layout: core.layout(),
        diagnostics: *core.diagnostics(),
    })
}

/// Forwards `LOG` values to the host callback, or to the console when none
/// is installed.
struct JsSink<'a> {
    callback: Option<&'a js_sys::Function>,
}

impl TraceSink for JsSink<'_> {
    fn on_event(&mut self, event: TraceEvent) {
        match (event, self.callback) {
            (TraceEvent::Log { value, .. }, Some(callback)) => {
                // Fire-and-forget: a throwing callback does not affect the core.
                let _ = callback.call1(&JsValue::NULL, &JsValue::from(value));
            }
            (TraceEvent::Log { pc, value }, None) => console_log!("LOG @{pc:#08x}: {value}"),
            (TraceEvent::InstructionRetired { pc, opcode }, _) => {
                console_log!("retired {opcode:#04x} @{pc:#08x}");
            }
            (TraceEvent::FaultRaised { pc, cause }, _) => {
                console_log!("fault @{pc:#08x}: {cause}");
            }
        }
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    Ok(serde_wasm_bindgen::to_value(value)?)
}

#[wasm_bindgen]
pub struct WasmCore {
    core: CoreState,
    log: Option<js_sys::Function>,
}

impl WasmCore {
    fn from_config(config: CoreConfig) -> Result<Self, JsError> {
        console_error_panic_hook::set_once();
        Ok(Self {
            core: CoreState::new(config)?,
            log: None,
        })
    }
}

#[wasm_bindgen]
impl WasmCore {
    /// Creates a core with the default 16 + 2 page layout.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Self, JsError> {
        Self::from_config(CoreConfig::default())
    }

    /// Creates a core from a serialized `CoreConfig`.
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config: JsValue) -> Result<Self, JsError> {
        let config: CoreConfig = serde_wasm_bindgen::from_value(config)?;
        Self::from_config(config)
    }

    /// Creates a core over an allocation of `capacity_pages` pages split into
    /// `code_pages` and `data_pages`. Fails when the split does not cover the
    /// allocation exactly.
    #[wasm_bindgen(js_name = withPages)]
    pub fn with_pages(
        code_pages: u32,
        data_pages: u32,
        capacity_pages: u32,
    ) -> Result<Self, JsError> {
        console_error_panic_hook::set_once();
        let layout = MemoryLayout::from_pages(code_pages, data_pages)?;
        let image = MemoryImage::with_capacity_pages(layout, capacity_pages)?;
        Ok(Self {
            core: CoreState::with_memory(CoreConfig::default(), image),
            log: None,
        })
    }

    /// Installs the host `log(number)` callback for `LOG` output.
    #[wasm_bindgen(js_name = setLog)]
    pub fn set_log(&mut self, callback: Option<js_sys::Function>) {
        self.log = callback;
    }

    /// Copies a program into the code region starting at offset 0.
    #[wasm_bindgen(js_name = loadProgram)]
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), JsError> {
        self.core.load_program(program)?;
        console_log!("Loaded {} bytes into the code region", program.len());
        Ok(())
    }

    /// Copies bytes into the image at an absolute offset.
    #[wasm_bindgen(js_name = writeMemory)]
    pub fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> Result<(), JsError> {
        Ok(self.core.write_memory(offset, bytes)?)
    }

    /// Resets registers and moves the core to `Ready`.
    pub fn init(&mut self) {
        self.core.init();
    }

    /// Executes one instruction and returns the outcome object.
    pub fn step(&mut self) -> Result<JsValue, JsError> {
        let mut sink = JsSink {
            callback: self.log.as_ref(),
        };
        let outcome = WasmStepOutcome::from(self.core.step(&mut sink));
        to_js(&outcome)
    }

    /// Executes one instruction; returns `true` while the core can continue.
    /// Suited to a `requestAnimationFrame` loop.
    pub fn cycle(&mut self) -> bool {
        let mut sink = JsSink {
            callback: self.log.as_ref(),
        };
        match self.core.step(&mut sink) {
            StepOutcome::Running => true,
            StepOutcome::Halted => false,
            StepOutcome::Faulted { cause } => {
                console_log!("core faulted: {cause}");
                false
            }
        }
    }

    /// Steps up to `max_steps` times.
    pub fn run(&mut self, max_steps: u32) -> Result<JsValue, JsError> {
        let mut sink = JsSink {
            callback: self.log.as_ref(),
        };
        let outcome = WasmRunOutcome::from(self.core.run(&mut sink, max_steps));
        to_js(&outcome)
    }

    /// Reads a register by name (`"A"`, `"DP"`, `"PC"`, ...).
    pub fn register(&self, name: &str) -> Result<u32, JsError> {
        Ok(self.core.read_register_by_name(name)?)
    }

    /// Reads a little-endian value of 1, 2 or 4 bytes.
    #[wasm_bindgen(js_name = readMemory)]
    pub fn read_memory(&self, offset: u32, width: u8) -> Result<u32, JsError> {
        let width = AccessWidth::from_bytes(width)
            .ok_or_else(|| JsError::new(&format!("unsupported access width {width}")))?;
        Ok(self.core.read_memory(offset, width)?)
    }

    /// Current run state label.
    #[wasm_bindgen(js_name = runState)]
    pub fn run_state(&self) -> String {
        self.core.run_state().label().to_string()
    }

    /// Returns registers, run state, layout and diagnostics as an object.
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> Result<JsValue, JsError> {
        to_js(&snapshot(&self.core)?)
    }

    /// Zero-copy view of the memory image.
    ///
    /// The view is invalidated by any call that mutates the core; re-fetch
    /// it after every step.
    #[wasm_bindgen(js_name = memoryView)]
    pub fn memory_view(&self) -> Result<js_sys::Uint8Array, JsError> {
        let bytes = self.core.memory()?.as_bytes();
        // SAFETY: the image is a fixed boxed slice that never reallocates;
        // the caller drops the view before the next mutating call.
        Ok(unsafe { js_sys::Uint8Array::view(bytes) })
    }
}
