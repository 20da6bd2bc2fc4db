use dbg80_core::cpu::EngineState;
use dbg80_core::debugger::symbols::SymbolDef;
use dbg80_core::memory::BlockType;
use dbg80_core::{BufferedOutput, Debugger, DebuggerConfig, Machine, SavedState, StepResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn setup(program: &[u8]) -> (Debugger, Machine) {
    setup_with(DebuggerConfig::default(), program)
}

fn setup_with(config: DebuggerConfig, program: &[u8]) -> (Debugger, Machine) {
    let mut machine = Machine::new();
    machine.load_image(0, program).unwrap();
    let debugger = Debugger::with_output(config, BufferedOutput::new().into());
    (debugger, machine)
}

fn small_run_limit() -> DebuggerConfig {
    DebuggerConfig {
        run_chunk: 100,
        run_limit: 1000,
        ..DebuggerConfig::default()
    }
}

// NOP ; NOP ; JMP 0000
const LOOP: [u8; 5] = [0x00, 0x00, 0xC3, 0x00, 0x00];

#[test]
fn breakpoint_on_a_symbol_reports_its_address() {
    let (mut debugger, mut machine) = setup(&LOOP);
    debugger
        .symbols
        .add_group("ROM", 0x0000, 0x100, vec![("START".to_string(), SymbolDef::Offset(0))]);

    assert!(debugger.do_command(&mut machine, "bp START"));
    match debugger.step(&mut machine) {
        StepResult::Break(reason) => {
            let line = reason.to_string();
            assert!(line.contains("0000"), "{}", line);
            assert!(line.contains("bp"), "{}", line);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(machine.cpu.reg_pc, 0);
}

#[test]
fn false_condition_keeps_running() {
    let (mut debugger, mut machine) = setup_with(small_run_limit(), &LOOP);

    assert!(debugger.do_command(&mut machine, "bp 1 \"if a==1; h\""));
    assert!(debugger.do_command(&mut machine, "g"));

    let output = debugger.take_output();
    assert!(output.iter().any(|line| line == "run limit of 1000 instructions reached"));
    assert!(!output.iter().any(|line| line.contains("hit")));
    assert!(!machine.is_running());
}

#[test]
fn true_condition_halts_at_the_breakpoint() {
    let (mut debugger, mut machine) = setup_with(small_run_limit(), &LOOP);

    assert!(debugger.do_command(&mut machine, "bp 1 \"if a==1; h\""));
    assert!(debugger.do_command(&mut machine, "r a=1; g"));

    let output = debugger.take_output();
    assert_eq!(output[0], "bp 0001 hit");
    assert_eq!(machine.cpu.reg_pc, 1);

    // resuming skips the breakpoint we are sitting on
    assert!(debugger.do_command(&mut machine, "t"));
    assert_eq!(machine.cpu.reg_pc, 2);
}

#[test]
fn breakpoint_listing_shows_scripts() {
    let (mut debugger, mut machine) = setup(&LOOP);
    assert!(debugger.do_command(&mut machine, "bp 1 \"r; h\"; bw 2000; bn 5; bi 10"));
    assert!(!debugger.do_command(&mut machine, "bp 1"));
    debugger.take_output();

    assert!(debugger.do_command(&mut machine, "bl"));
    assert_eq!(
        debugger.take_output(),
        vec!["bp 0001 \"r; h\"", "bw 2000", "bn 5", "bi 10"]
    );

    assert!(debugger.do_command(&mut machine, "bc 1"));
    assert!(!debugger.do_command(&mut machine, "bc 1"));
    assert!(debugger.do_command(&mut machine, "bc *; bi *; bl"));
    assert_eq!(
        debugger.take_output(),
        vec!["no breakpoint at 0001", "1 breakpoints cleared", "no breakpoints"]
    );
    assert!(!debugger.history().is_enabled());
}

#[test]
fn go_to_address_stops_silently() {
    let (mut debugger, mut machine) = setup(&[0x00; 8]);

    assert!(debugger.do_command(&mut machine, "g 5"));
    assert_eq!(machine.cpu.reg_pc, 5);
    assert_eq!(debugger.take_output(), vec!["0005 00        NOP"]);
    assert!(debugger.breakpoints().is_empty());
}

#[test]
fn countdown_stops_after_n_instructions() {
    let (mut debugger, mut machine) = setup(&[0x00; 8]);

    assert!(debugger.do_command(&mut machine, "bn 3; g"));
    assert_eq!(machine.cpu.reg_pc, 3);
    assert_eq!(debugger.take_output()[0], "bn countdown expired at 0003");
}

#[test]
fn step_over_runs_the_whole_call() {
    // CALL 0010 ; NOP ... 0010: MVI B,7 ; RET
    let mut program = vec![0u8; 0x20];
    program[..4].copy_from_slice(&[0xCD, 0x10, 0x00, 0x00]);
    program[0x10..0x13].copy_from_slice(&[0x06, 0x07, 0xC9]);
    let (mut debugger, mut machine) = setup(&program);

    assert!(debugger.do_command(&mut machine, "p"));
    assert_eq!(machine.cpu.reg_pc, 3);
    assert_eq!(machine.cpu.reg_b, 7);
    assert_eq!(debugger.take_output(), vec!["0003 00        NOP"]);

    assert!(debugger.do_command(&mut machine, "pr"));
    let output = debugger.take_output();
    assert_eq!(output[0], "0004 00        NOP");
    assert!(output[1].starts_with("A=00 BC=0700"));
}

#[test]
fn edit_then_dump() {
    let (mut debugger, mut machine) = setup(&[]);

    assert!(debugger.do_command(&mut machine, "e 100 41 42 43; ew 103 1234"));
    assert_eq!(machine.memory.get_word(0x103), 0x1234);
    // one refresh for the image, one per edited location
    assert_eq!(machine.memory.edit_generation, 5);

    assert!(debugger.do_command(&mut machine, "d 100 3"));
    let output = debugger.take_output();
    assert_eq!(output.len(), 1);
    assert!(output[0].starts_with("0100  41 42 43 "), "{}", output[0]);
    assert!(output[0].ends_with(" ABC"), "{}", output[0]);

    assert!(debugger.do_command(&mut machine, "dw 103 2"));
    assert!(debugger.take_output()[0].starts_with("0103  1234 "));

    assert!(!debugger.do_command(&mut machine, "e 100 1FF"));
}

#[test]
fn faults_are_reported_not_raised() {
    let (mut debugger, mut machine) = setup(&[0xC3, 0x00, 0x80]);
    machine.memory.set_block_type(0x8000, 0x400, BlockType::None);

    assert!(debugger.do_command(&mut machine, "t 5"));
    assert_eq!(machine.cpu.state, EngineState::Error);
    assert!(debugger
        .take_output()
        .iter()
        .any(|line| line == "fault: Fetch from unmapped memory at addr: 0x8000"));
}

#[test]
fn write_breakpoint_and_history() {
    // MVI A,7 ; STA 2000 ; HLT
    let (mut debugger, mut machine) = setup(&[0x3E, 0x07, 0x32, 0x00, 0x20, 0x76]);

    assert!(debugger.do_command(&mut machine, "bw 2000; g"));
    assert_eq!(machine.cpu.reg_pc, 5);
    assert_eq!(machine.memory.get_byte(0x2000), 7);
    assert_eq!(debugger.take_output()[0], "bw 2000 hit");

    assert!(debugger.do_command(&mut machine, "dh"));
    assert_eq!(
        debugger.take_output(),
        vec!["0000 3E 07     MVI    A,07", "0002 32 00 20  STA    2000"]
    );

    assert!(debugger.do_command(&mut machine, "dh 10 sta"));
    assert_eq!(debugger.take_output(), vec!["0002 32 00 20  STA    2000"]);

    assert!(debugger.do_command(&mut machine, "f"));
    let frequencies = debugger.take_output();
    assert_eq!(frequencies.len(), 2);
}

#[test]
fn port_output_breakpoint() {
    // MVI A,5 ; OUT 10 ; HLT
    let (mut debugger, mut machine) = setup(&[0x3E, 0x05, 0xD3, 0x10, 0x76]);

    assert!(debugger.do_command(&mut machine, "bo 10; g"));
    assert_eq!(debugger.take_output()[0], "bo 10 hit (05)");
    assert_eq!(machine.memory.port_output(0x10), 5);

    machine.memory.set_port_input(0x30, 0x42);
    assert!(debugger.do_command(&mut machine, "o 20 #65; i 30; i 31"));
    assert_eq!(machine.memory.port_output(0x20), 65);
    assert_eq!(debugger.take_output(), vec!["in 30: 42", "in 31: FF"]);
}

#[test]
fn stack_trace_follows_return_addresses() {
    // 0000: CALL 0010 ... 0010: CALL 0020 ... 0020: NOP
    let mut program = vec![0u8; 0x30];
    program[..3].copy_from_slice(&[0xCD, 0x10, 0x00]);
    program[0x10..0x13].copy_from_slice(&[0xCD, 0x20, 0x00]);
    let (mut debugger, mut machine) = setup(&program);
    debugger.symbols.add_group(
        "ROM",
        0x0000,
        0x100,
        vec![
            ("MAIN".to_string(), SymbolDef::Offset(0x00)),
            ("HELPER".to_string(), SymbolDef::Offset(0x10)),
        ],
    );

    assert!(debugger.do_command(&mut machine, "r sp=1000; t 2"));
    assert_eq!(machine.cpu.reg_pc, 0x20);
    debugger.take_output();

    assert!(debugger.do_command(&mut machine, "k"));
    assert_eq!(
        debugger.take_output(),
        vec![
            "0FFC: 0013  0010 CD 20 00  CALL   0020",
            "0FFE: 0003  0000 CD 10 00  CALL   0010",
        ]
    );

    assert!(debugger.do_command(&mut machine, "ks 1"));
    assert_eq!(
        debugger.take_output(),
        vec!["0FFC: 0013  0010 CD 20 00  CALL   0020  HELPER+0"]
    );
}

#[test]
fn symbols_resolve_in_expressions_and_listings() {
    let (mut debugger, mut machine) = setup(&[]);
    let count = debugger
        .symbols
        .load_json(r#"{ "module": "ROM", "base": 256, "length": 256, "symbols": { "ENTRY": 0, "LOOP": { "offset": 16, "comment": "spin" } } }"#)
        .unwrap();
    assert_eq!(count, 1);

    assert!(debugger.do_command(&mut machine, "print loop + 2; ln 108; ls l"));
    assert_eq!(
        debugger.take_output(),
        vec![
            "112h 274",
            "0100 ENTRY+8",
            "0110 LOOP-8",
            "0110 LOOP                     ROM",
        ]
    );

    assert!(debugger.do_command(&mut machine, "u 110 110"));
    assert_eq!(
        debugger.take_output(),
        vec!["LOOP:", "0110 00        NOP              ; spin"]
    );
}

#[test]
fn state_persists_through_a_file() {
    let (mut debugger, mut machine) = setup(&[]);
    assert!(debugger.do_command(&mut machine, "var answer = #42; u 40 40"));

    let path = std::env::temp_dir().join(format!("dbg80-state-{}.json", std::process::id()));
    debugger.save_state().unwrap().save(&path).unwrap();

    let (mut restored, mut machine) = setup(&[]);
    restored.restore_state(&SavedState::load(&path).unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(restored.variables().get("answer"), Some(&42));
    assert!(restored.do_command(&mut machine, "print answer"));
    assert_eq!(restored.take_output(), vec!["2Ah 42"]);
}

#[test]
fn memory_map_lists_block_runs() {
    let (mut debugger, mut machine) = setup(&[]);
    machine.memory.set_block_type(0xF000, 0x1000, BlockType::Rom);

    assert!(debugger.do_command(&mut machine, "dm"));
    assert_eq!(debugger.take_output(), vec!["0000-EFFF RAM", "F000-FFFF ROM"]);
}

#[test]
fn step_over_drops_its_return_breakpoint_when_stopped_inside() {
    // 0000: CALL 0010 ; NOP ; JMP 0000 ... 0010: NOP ; RET
    let mut program = vec![0u8; 0x20];
    program[..7].copy_from_slice(&[0xCD, 0x10, 0x00, 0x00, 0xC3, 0x00, 0x00]);
    program[0x10..0x12].copy_from_slice(&[0x00, 0xC9]);
    let (mut debugger, mut machine) = setup_with(small_run_limit(), &program);

    assert!(debugger.do_command(&mut machine, "r sp=1000; bp 10; p"));
    assert_eq!(machine.cpu.reg_pc, 0x10);
    assert_eq!(debugger.take_output()[0], "bp 0010 hit");

    assert!(debugger.do_command(&mut machine, "bc 10"));
    assert!(debugger.breakpoints().is_empty());
    assert!(!debugger.history().is_enabled());

    // nothing left to stop at the old return address
    assert!(debugger.do_command(&mut machine, "g"));
    assert!(debugger
        .take_output()
        .iter()
        .any(|line| line == "run limit of 1000 instructions reached"));
}

#[test]
fn go_to_a_scripted_breakpoint_still_stops_there() {
    // NOP x5 ; JMP 0000
    let (mut debugger, mut machine) = setup_with(small_run_limit(), &[0x00, 0x00, 0x00, 0x00, 0x00, 0xC3, 0x00, 0x00]);

    assert!(debugger.do_command(&mut machine, "var n = 0; bp 5 \"var n = n + 1\"; g 5"));
    assert_eq!(machine.cpu.reg_pc, 5);
    assert_eq!(debugger.variables().get("n"), Some(&1));

    let output = debugger.take_output();
    assert!(!output.iter().any(|line| line.starts_with("run limit")), "{:?}", output);
    assert_eq!(debugger.breakpoints().list().len(), 1);
}

#[test]
fn trace_counts_only_executed_instructions() {
    let (mut debugger, mut machine) = setup(&[0x00; 8]);

    assert!(debugger.do_command(&mut machine, "bp 1 \"var n = 1\"; t 3"));
    assert_eq!(machine.cpu.reg_pc, 3);
    assert_eq!(
        debugger.take_output(),
        vec!["0000 00        NOP", "0001 00        NOP", "0002 00        NOP"]
    );
    assert_eq!(debugger.variables().get("n"), Some(&1));
}

#[test]
fn checksum_is_printed_every_interval() {
    let (mut debugger, mut machine) = setup(&[0x00; 8]);

    assert!(debugger.do_command(&mut machine, "s cs 2; t 4"));
    let checksums: Vec<String> = debugger
        .take_output()
        .into_iter()
        .filter(|line| line.starts_with("checksum"))
        .collect();
    assert_eq!(checksums.len(), 2);
    assert!(checksums[0].starts_with("checksum 00000100 at cycle"), "{}", checksums[0]);
    assert!(checksums[1].starts_with("checksum 00000300 at cycle"), "{}", checksums[1]);

    assert!(debugger.do_command(&mut machine, "s cs 0"));
    assert!(!debugger.history().is_enabled());
}

#[test]
fn speed_scales_the_chunk_but_not_the_limit() {
    let (mut debugger, mut machine) = setup_with(small_run_limit(), &LOOP);

    assert!(debugger.do_command(&mut machine, "s sp 4; s"));
    assert_eq!(debugger.take_output(), vec!["style 8080", "cs 0", "sp 4"]);

    assert!(debugger.do_command(&mut machine, "g"));
    assert!(debugger
        .take_output()
        .iter()
        .any(|line| line == "run limit of 1000 instructions reached"));

    assert!(debugger.do_command(&mut machine, "s sp 0"));
    assert_eq!(machine.cpu.speed, 1);
}

#[test]
fn stop_request_ends_a_long_run() {
    let config = DebuggerConfig {
        run_chunk: 10,
        run_limit: u64::MAX,
        ..DebuggerConfig::default()
    };
    let (mut debugger, mut machine) = setup_with(config, &LOOP);

    // the run clears the flag when it starts, so keep raising it until it is seen
    let stop = machine.stop_handle();
    let done = Arc::new(AtomicBool::new(false));
    let signaller = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                stop.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
            }
        })
    };

    assert!(debugger.do_command(&mut machine, "g"));
    done.store(true, Ordering::SeqCst);
    signaller.join().unwrap();

    assert!(debugger.take_output().iter().any(|line| line == "stop requested"));
    assert!(!machine.is_running());
}

#[test]
fn dump_length_is_bounded_by_the_address_space() {
    let (mut debugger, mut machine) = setup(&[]);

    assert!(debugger.do_command(&mut machine, "d 0 7FFFFFFFFFFFFFFF"));
    let output = debugger.take_output();
    assert_eq!(output.len(), 0x10000 / 16);
    assert!(output[0].starts_with("0000  "));
    assert!(output[output.len() - 1].starts_with("FFF0  "));
}
