#![no_main]

use libfuzzer_sys::fuzz_target;
use octet_core::{
    disassemble_range, execute_instruction, fetch_instruction, CoreConfig, CoreState, Decoder,
    MemoryLayout, NullTraceSink,
};

const CODE_LEN: u32 = 0x100;

fuzz_target!(|data: &[u8]| {
    let code = &data[..data.len().min(CODE_LEN as usize)];
    for &opcode in code {
        let _ = Decoder::decode(opcode);
    }
    let _ = disassemble_range(0, code.len(), code);

    let Ok(layout) = MemoryLayout::new(CODE_LEN, 0x1_0000) else {
        return;
    };
    let Ok(mut core) = CoreState::new(CoreConfig {
        layout,
        ..CoreConfig::default()
    }) else {
        return;
    };
    if core.load_program(code).is_err() {
        return;
    }
    core.init();

    if let (Ok(memory), Ok(registers)) = (core.memory(), core.registers()) {
        for pc in 0..CODE_LEN {
            if let Ok(instr) = fetch_instruction(memory, pc) {
                let _ = execute_instruction(&instr, registers, memory);
            }
        }
    }
    let _ = core.run(&mut NullTraceSink, 4096);
});
