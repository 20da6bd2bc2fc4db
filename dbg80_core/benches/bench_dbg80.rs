use dbg80_core::debugger::address::Address;
use dbg80_core::debugger::breakpoints::BreakpointKind;
use dbg80_core::debugger::disassembler::decode_one;
use dbg80_core::instructions::MnemonicStyle;
use dbg80_core::{BufferedOutput, Debugger, DebuggerConfig, Machine};
use divan::black_box;

fn main() {
    divan::main();
}

// counts BC down to zero: LXI B,0400 ; DCX B ; MOV A,B ; ORA C ; JNZ 0003 ; JMP 0000
const COUNTDOWN: [u8; 12] = [
    0x01, 0x00, 0x04, 0x0B, 0x78, 0xB1, 0xC2, 0x03, 0x00, 0xC3, 0x00, 0x00,
];

fn machine() -> Machine {
    let mut machine = Machine::new();
    machine.load_image(0, &COUNTDOWN).unwrap();
    machine
}

#[divan::bench]
fn decode_all_opcodes() -> usize {
    let mut machine = Machine::new();
    for op_code in 0..=255u8 {
        machine.memory.set_byte(op_code as u16 * 3, op_code);
    }

    let mut total = 0;
    for op_code in 0..256u16 {
        let mut addr = Address::new(op_code * 3);
        if let Some(decoded) = decode_one(&machine.memory, &mut addr, MnemonicStyle::Intel8080, None) {
            total += decoded.format_line().len();
        }
    }
    black_box(total)
}

#[divan::bench(args = [false, true])]
fn step_10k(bencher: divan::Bencher, checked: bool) {
    bencher
        .with_inputs(|| {
            let mut machine = machine();
            let mut debugger = Debugger::with_output(DebuggerConfig::default(), BufferedOutput::new().into());
            if checked {
                // never reached, but forces every fetch through the checked bus
                debugger
                    .add_breakpoint(&mut machine, BreakpointKind::Exec, Address::new(0xFFF0))
                    .unwrap();
            }
            (debugger, machine)
        })
        .bench_local_values(|(mut debugger, mut machine)| {
            for _ in 0..10_000 {
                black_box(debugger.step(&mut machine));
            }
        });
}
