use crate::config::DebuggerConfig;
use crate::cpu::{Flag, Register};
use crate::debugger::address::Address;
use crate::debugger::breakpoints::{BreakpointHit, BreakpointKind, Breakpoints};
use crate::debugger::history::History;
use crate::debugger::output::{ConsoleOutput, Output, OutputSink};
use crate::debugger::symbols::SymbolTable;
use crate::errors::{DebuggerError, EmulationError};
use crate::expr::{self, EvalContext};
use crate::instructions::MnemonicStyle;
use crate::memory::{AccessKind, MemMapped, Memory};
use crate::Machine;

use std::collections::{BTreeMap, VecDeque};
use std::fmt::{self, Display};

pub mod address;
pub mod breakpoints;
pub mod command;
pub mod disassembler;
pub mod frontends;
pub mod history;
mod interpreter;
pub mod output;
pub mod stack;
pub mod state;
pub mod symbols;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageCategory {
    Cpu,
    Mem,
    Port,
    Int,
    Break,
    Hist,
}

impl MessageCategory {
    pub const ALL: [MessageCategory; 6] = [
        MessageCategory::Cpu,
        MessageCategory::Mem,
        MessageCategory::Port,
        MessageCategory::Int,
        MessageCategory::Break,
        MessageCategory::Hist,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MessageCategory::Cpu => "cpu",
            MessageCategory::Mem => "mem",
            MessageCategory::Port => "port",
            MessageCategory::Int => "int",
            MessageCategory::Break => "break",
            MessageCategory::Hist => "hist",
        }
    }

    pub fn parse(name: &str) -> Option<MessageCategory> {
        MessageCategory::ALL
            .iter()
            .copied()
            .find(|category| category.name().eq_ignore_ascii_case(name))
    }

    #[inline]
    pub fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Why execution stopped before or after an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint(BreakpointHit),
    Port { input: bool, port: u8, byte: u8 },
}

impl Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StopReason::Breakpoint(BreakpointHit::Countdown(pc)) => {
                write!(f, "bn countdown expired at {:04X}", pc)
            }
            StopReason::Breakpoint(BreakpointHit::Address { kind, ref addr, .. }) => {
                write!(f, "{} {} hit", kind.tag(), addr)
            }
            StopReason::Port { input, port, byte } => {
                let tag = if input { "bi" } else { "bo" };
                write!(f, "{} {:02X} hit ({:02X})", tag, port, byte)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Cycles(u8),
    Break(StopReason),
    Fault(EmulationError),
}

impl StepResult {
    pub fn cycles(&self) -> u8 {
        match *self {
            StepResult::Cycles(cycles) => cycles,
            _ => 0,
        }
    }
}

#[derive(Debug, Default)]
struct Checksum {
    interval: u32,
    counter: u32,
    value: u32,
    due: bool,
}

/// State the checked bus updates while the CPU executes.
#[derive(Debug)]
struct Checks {
    breakpoints: Breakpoints,
    history: History,
    checksum: Checksum,
    messages: u32,
    pending: Option<StopReason>,
    notes: Vec<String>,
}

impl Checks {
    fn message_enabled(&self, category: MessageCategory) -> bool {
        self.messages & category.bit() != 0
    }

    fn needs_bus(&self, memory: &Memory) -> bool {
        self.breakpoints.needs_checks()
            || self.history.is_enabled()
            || self.checksum.interval > 0
            || memory.has_port_breakpoints()
            || self.message_enabled(MessageCategory::Port)
    }

    fn record_fetch(&mut self, addr: u16, op_code: u8) {
        self.history.record(addr, op_code);

        let checksum = &mut self.checksum;
        if checksum.interval > 0 {
            checksum.value = checksum.value.rotate_left(1) ^ (((addr as u32) << 8) | op_code as u32);
            checksum.counter += 1;
            if checksum.counter >= checksum.interval {
                checksum.counter = 0;
                checksum.due = true;
            }
        }
    }

    fn access(&mut self, kind: AccessKind, addr: u16) {
        if self.pending.is_none() {
            if let Some(hit) = self.breakpoints.check_access(kind, addr, 1) {
                self.pending = Some(StopReason::Breakpoint(hit));
            }
        }
    }

    fn port(&mut self, memory: &Memory, input: bool, port: u8, byte: u8) {
        let text = format!("{} {:02X}: {:02X}", if input { "in" } else { "out" }, port, byte);
        log::debug!("{}", text);
        if self.message_enabled(MessageCategory::Port) {
            self.notes.push(text);
        }

        if memory.has_port_breakpoint(port, input) && !self.breakpoints.is_suppressed() && self.pending.is_none() {
            self.pending = Some(StopReason::Port { input, port, byte });
        }
    }
}

/// Sits between the CPU and memory while checks are enabled.
struct CheckedBus<'a> {
    memory: &'a mut Memory,
    checks: &'a mut Checks,
}

impl<'a> MemMapped for CheckedBus<'a> {
    fn read(&mut self, index: u16) -> u8 {
        let byte = self.memory.read(index);
        if self.memory.is_watched(index, AccessKind::Read) {
            self.checks.access(AccessKind::Read, index);
        }
        byte
    }

    fn write(&mut self, index: u16, byte: u8) {
        self.memory.write(index, byte);
        if self.memory.is_watched(index, AccessKind::Write) {
            self.checks.access(AccessKind::Write, index);
        }
    }

    fn fetch(&mut self, index: u16) -> Result<u8, EmulationError> {
        let op_code = self.memory.fetch(index)?;

        match self.checks.breakpoints.check_execution(index) {
            None => {
                self.checks.record_fetch(index, op_code);
                Ok(op_code)
            }
            Some(hit) => {
                let error = match hit {
                    BreakpointHit::Countdown(pc) => EmulationError::DebuggerCountdown(pc),
                    BreakpointHit::Address { .. } => EmulationError::DebuggerBreakpoint(index),
                };
                self.checks.pending = Some(StopReason::Breakpoint(hit));
                Err(error)
            }
        }
    }

    fn input(&mut self, port: u8) -> u8 {
        let byte = self.memory.input(port);
        self.checks.port(&*self.memory, true, port, byte);
        byte
    }

    fn output(&mut self, port: u8, byte: u8) {
        self.memory.output(port, byte);
        self.checks.port(&*self.memory, false, port, byte);
    }
}

/// Resolves expression names against the debugger and the machine.
struct Scope<'a> {
    debugger: &'a Debugger,
    machine: &'a Machine,
}

impl<'a> EvalContext for Scope<'a> {
    fn lookup_variable(&self, name: &str) -> Option<i64> {
        self.debugger.variables.get(name).copied()
    }

    fn lookup_register(&self, name: &str) -> Option<i64> {
        if let Some(reg) = Register::parse(name) {
            return Some(self.machine.cpu.get_register(reg) as i64);
        }
        Flag::parse(name).map(|flag| self.machine.cpu.get_flag(flag) as i64)
    }

    fn lookup_symbol(&self, name: &str) -> Option<i64> {
        self.debugger
            .symbols
            .find_by_name(name)
            .and_then(|addr| addr.get())
            .map(i64::from)
    }

    fn read_byte(&self, addr: u16) -> u8 {
        self.machine.memory.get_byte(addr)
    }
}

pub struct Debugger {
    pub config: DebuggerConfig,
    pub symbols: SymbolTable,

    out: OutputSink,
    checks: Checks,

    variables: BTreeMap<String, i64>,
    style: MnemonicStyle,

    next_unassemble: Address,
    next_dump: Address,
    next_assemble: Address,

    command_history: VecDeque<String>,
}

impl Debugger {
    pub fn new(config: DebuggerConfig) -> Debugger {
        Debugger::with_output(config, ConsoleOutput.into())
    }

    pub fn with_output(config: DebuggerConfig, out: OutputSink) -> Debugger {
        let mut messages = 0;
        for name in &config.messages {
            match MessageCategory::parse(name) {
                Some(category) => messages |= category.bit(),
                None => log::warn!("unknown message category in config: {}", name),
            }
        }

        let mut debugger = Debugger {
            style: config.style,
            checks: Checks {
                breakpoints: Breakpoints::new(),
                history: History::new(config.history_capacity),
                checksum: Checksum::default(),
                messages,
                pending: None,
                notes: Vec::new(),
            },
            config,
            symbols: SymbolTable::new(),
            out,
            variables: BTreeMap::new(),
            next_unassemble: Address::invalid(),
            next_dump: Address::invalid(),
            next_assemble: Address::invalid(),
            command_history: VecDeque::new(),
        };

        debugger.history_init();
        debugger
    }

    //
    // output
    //

    pub fn print<S: AsRef<str>>(&mut self, line: S) {
        self.out.print_line(line.as_ref());
    }

    /// Drains collected lines when output is buffered.
    pub fn take_output(&mut self) -> Vec<String> {
        self.out.take_lines()
    }

    pub fn message<S: AsRef<str>>(&mut self, category: MessageCategory, text: S) {
        log::debug!("{}: {}", category.name(), text.as_ref());
        if self.checks.message_enabled(category) {
            self.out.print_line(text.as_ref());
        }
    }

    pub fn messages(&self) -> u32 {
        self.checks.messages
    }

    pub fn set_message(&mut self, category: MessageCategory, enabled: bool) {
        if enabled {
            self.checks.messages |= category.bit();
        } else {
            self.checks.messages &= !category.bit();
        }
    }

    fn flush_notes(&mut self) {
        let notes = std::mem::replace(&mut self.checks.notes, Vec::new());
        for note in notes {
            self.out.print_line(&note);
        }
    }

    //
    // accessors
    //

    pub fn style(&self) -> MnemonicStyle {
        self.style
    }

    pub fn variables(&self) -> &BTreeMap<String, i64> {
        &self.variables
    }

    pub fn command_history(&self) -> impl Iterator<Item = &String> {
        self.command_history.iter()
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.checks.breakpoints
    }

    pub fn history(&self) -> &History {
        &self.checks.history
    }

    pub fn get_byte(&self, machine: &Machine, addr: &Address) -> u8 {
        addr.get().map_or(0xFF, |a| machine.memory.get_byte(a))
    }

    pub fn get_word(&self, machine: &Machine, addr: &Address) -> u16 {
        addr.get().map_or(0xFFFF, |a| machine.memory.get_word(a))
    }

    pub fn set_byte(&mut self, machine: &mut Machine, addr: &Address, byte: u8) {
        if let Some(a) = addr.get() {
            machine.memory.set_byte(a, byte);
            machine.refresh(a, 1);
            self.message(MessageCategory::Mem, format!("{:04X}: {:02X}", a, byte));
        }
    }

    pub fn set_word(&mut self, machine: &mut Machine, addr: &Address, word: u16) {
        if let Some(a) = addr.get() {
            machine.memory.set_word(a, word);
            machine.refresh(a, 2);
            self.message(MessageCategory::Mem, format!("{:04X}: {:04X}", a, word));
        }
    }

    pub fn evaluate(&self, machine: &Machine, text: &str) -> Result<i64, DebuggerError> {
        let scope = Scope {
            debugger: self,
            machine,
        };
        Ok(expr::evaluate(text, &scope)?)
    }

    pub fn parse_address(&self, machine: &Machine, text: &str) -> Result<Address, DebuggerError> {
        if let Some(addr) = self.symbols.find_by_name(text) {
            return Ok(addr);
        }
        let value = self.evaluate(machine, text)?;
        if value < -0x8000 || value > 0xFFFF {
            return Err(DebuggerError::InvalidAddress(text.to_string()));
        }
        Ok(Address::new(value as u16))
    }

    //
    // breakpoints
    //

    pub fn add_breakpoint(
        &mut self,
        machine: &mut Machine,
        kind: BreakpointKind,
        addr: Address,
    ) -> Result<(), DebuggerError> {
        let target = addr.get();
        let temporary = addr.temporary;
        self.checks.breakpoints.add(kind, addr)?;

        if let (Some(access), Some(target)) = (kind.access(), target) {
            machine.memory.add_access_breakpoint(target, access);
        }
        if !temporary {
            if let Some(target) = target {
                self.message(MessageCategory::Break, format!("{} {:04X} set", kind.tag(), target));
            }
        }

        self.history_init();
        Ok(())
    }

    /// Removes breakpoints at `addr`, or all of them; returns how many went away.
    pub fn clear_breakpoints(&mut self, machine: &mut Machine, addr: Option<u16>) -> usize {
        let removed = match addr {
            Some(addr) => self.checks.breakpoints.remove(addr),
            None => self.checks.breakpoints.clear(),
        };

        for (kind, addr) in &removed {
            self.release_access(machine, *kind, addr);
        }

        self.history_init();
        removed.len()
    }

    /// Removes run-to and step-over entries that were never reached.
    pub fn clear_temporary_breakpoints(&mut self, machine: &mut Machine) -> usize {
        let removed = self.checks.breakpoints.clear_temporary();
        if removed.is_empty() {
            return 0;
        }

        for (kind, addr) in &removed {
            self.release_access(machine, *kind, addr);
        }
        log::debug!("{} temporary breakpoints dropped", removed.len());
        self.history_init();
        removed.len()
    }

    pub fn arm_countdown(&mut self, count: u32) {
        self.checks.breakpoints.arm_countdown(count);
        self.history_init();
    }

    pub fn set_checksum_interval(&mut self, interval: u32) {
        self.checks.checksum = Checksum {
            interval,
            ..Checksum::default()
        };
        self.history_init();
    }

    pub fn checksum_interval(&self) -> u32 {
        self.checks.checksum.interval
    }

    fn release_access(&mut self, machine: &mut Machine, kind: BreakpointKind, addr: &Address) {
        if let (Some(access), Some(target)) = (kind.access(), addr.get()) {
            machine.memory.remove_access_breakpoint(target, access);
        }
    }

    /// Allocates or frees the history ring to match the current checks.
    pub fn history_init(&mut self) {
        let enabled = self.config.always_record_history
            || self.checks.breakpoints.needs_checks()
            || self.checks.checksum.interval > 0;

        if enabled != self.checks.history.is_enabled() {
            self.checks.history.init(enabled);
            let state = if enabled { "enabled" } else { "disabled" };
            self.message(MessageCategory::Hist, format!("history {}", state));
        }
    }

    //
    // execution
    //

    /// Executes one instruction through the checked bus when checks are active.
    pub fn step(&mut self, machine: &mut Machine) -> StepResult {
        let result = {
            let Machine { cpu, memory, .. } = machine;
            if self.checks.needs_bus(memory) {
                let mut bus = CheckedBus {
                    memory,
                    checks: &mut self.checks,
                };
                cpu.step(&mut bus)
            } else {
                cpu.step(memory)
            }
        };

        self.flush_notes();
        if self.checks.checksum.due {
            self.checks.checksum.due = false;
            let line = format!(
                "checksum {:08X} at cycle {}",
                self.checks.checksum.value,
                machine.cpu_cycles()
            );
            self.print(line);
        }

        let result = match result {
            Ok(cycles) => match self.checks.pending.take() {
                Some(reason) => StepResult::Break(reason),
                None => StepResult::Cycles(cycles),
            },
            Err(EmulationError::DebuggerBreakpoint(pc)) | Err(EmulationError::DebuggerCountdown(pc)) => {
                let reason = self
                    .checks
                    .pending
                    .take()
                    .unwrap_or(StopReason::Breakpoint(BreakpointHit::Countdown(pc)));
                StepResult::Break(reason)
            }
            Err(error) => {
                machine.set_error();
                log::warn!("engine fault: {}", error);
                self.print(format!("fault: {}", error));
                StepResult::Fault(error)
            }
        };

        if let StepResult::Break(StopReason::Breakpoint(BreakpointHit::Address { kind, ref addr, .. })) = result {
            if addr.temporary {
                let addr = addr.clone();
                self.release_access(machine, kind, &addr);
                self.history_init();
            }
        }

        result
    }

    //
    // host notifications
    //

    pub fn on_power(&mut self, machine: &mut Machine, on: bool) {
        let state = if on { "on" } else { "off" };
        self.message(MessageCategory::Cpu, format!("power {}", state));
        if on {
            self.next_unassemble = Address::new(machine.cpu.reg_pc);
        }
    }

    pub fn on_reset(&mut self, machine: &mut Machine) {
        self.checks.history.clear();
        self.next_unassemble = Address::new(machine.cpu.reg_pc);
        self.next_dump = Address::invalid();
        self.message(MessageCategory::Cpu, "reset");
    }

    pub fn on_stop(&mut self, machine: &mut Machine) {
        self.message(MessageCategory::Cpu, format!("stopped at {:04X}", machine.cpu.reg_pc));
        self.print_current(machine);
    }

    pub fn on_interrupt(&mut self, machine: &mut Machine, vector: u8) {
        machine.cpu.interrupt(vector);
        self.message(MessageCategory::Int, format!("interrupt RST {}", vector & 0x07));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::output::BufferedOutput;

    fn setup(program: &[u8]) -> (Debugger, Machine) {
        let mut machine = Machine::new();
        machine.load_image(0, program).unwrap();
        let debugger = Debugger::with_output(DebuggerConfig::default(), BufferedOutput::new().into());
        (debugger, machine)
    }

    #[test]
    fn unchecked_step_reports_cycles() {
        let (mut debugger, mut machine) = setup(&[0x00, 0x3E, 0x12]);
        assert_eq!(debugger.step(&mut machine), StepResult::Cycles(4));
        assert_eq!(debugger.step(&mut machine), StepResult::Cycles(7));
        assert_eq!(machine.cpu.reg_a, 0x12);
        assert!(!debugger.history().is_enabled());
    }

    #[test]
    fn exec_breakpoint_stops_before_the_instruction() {
        let (mut debugger, mut machine) = setup(&[0x00, 0x00]);
        debugger
            .add_breakpoint(&mut machine, BreakpointKind::Exec, Address::new(1))
            .unwrap();
        assert!(debugger.history().is_enabled());

        assert_eq!(debugger.step(&mut machine), StepResult::Cycles(4));
        match debugger.step(&mut machine) {
            StepResult::Break(reason) => assert_eq!(reason.to_string(), "bp 0001 hit"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(machine.cpu.reg_pc, 1);
        assert_eq!(debugger.history().entries(8, 8), vec![0]);
    }

    #[test]
    fn write_breakpoint_stops_after_the_instruction() {
        // MVI A,7 ; STA 2000
        let (mut debugger, mut machine) = setup(&[0x3E, 0x07, 0x32, 0x00, 0x20]);
        debugger
            .add_breakpoint(&mut machine, BreakpointKind::Write, Address::new(0x2000))
            .unwrap();
        assert!(machine.memory.is_watched(0x2000, AccessKind::Write));

        debugger.step(&mut machine);
        assert!(matches!(debugger.step(&mut machine), StepResult::Break(_)));
        assert_eq!(machine.memory.get_byte(0x2000), 7);
        assert_eq!(machine.cpu.reg_pc, 5);

        assert_eq!(debugger.clear_breakpoints(&mut machine, None), 1);
        assert!(!machine.memory.is_watched(0x2000, AccessKind::Write));
        assert!(!debugger.history().is_enabled());
    }

    #[test]
    fn faults_become_step_results() {
        let (mut debugger, mut machine) = setup(&[]);
        machine.memory.set_block_type(0, 0x400, crate::memory::BlockType::None);

        let result = debugger.step(&mut machine);
        assert_eq!(result, StepResult::Fault(EmulationError::UnmappedFetch(0)));
        assert_eq!(result.cycles(), 0);
        assert_eq!(machine.cpu.state, crate::cpu::EngineState::Error);
        assert_eq!(debugger.take_output(), vec!["fault: Fetch from unmapped memory at addr: 0x0000"]);
    }

    #[test]
    fn port_breakpoints_and_messages() {
        // MVI A,5 ; OUT 10
        let (mut debugger, mut machine) = setup(&[0x3E, 0x05, 0xD3, 0x10]);
        debugger.set_message(MessageCategory::Port, true);
        machine.memory.toggle_port_breakpoint(0x10, false);

        debugger.step(&mut machine);
        let result = debugger.step(&mut machine);
        assert_eq!(
            result,
            StepResult::Break(StopReason::Port {
                input: false,
                port: 0x10,
                byte: 5
            })
        );
        assert_eq!(debugger.take_output(), vec!["out 10: 05"]);
    }

    #[test]
    fn host_notifications() {
        let (mut debugger, mut machine) = setup(&[0x00, 0x00]);
        debugger.set_message(MessageCategory::Int, true);
        debugger.set_message(MessageCategory::Cpu, true);

        machine.cpu.interrupts_enabled = true;
        debugger.on_interrupt(&mut machine, 7);
        assert_eq!(debugger.step(&mut machine), StepResult::Cycles(11));
        assert_eq!(machine.cpu.reg_pc, 0x38);

        machine.reset();
        debugger.on_reset(&mut machine);
        assert_eq!(debugger.take_output(), vec!["interrupt RST 7", "reset"]);
    }

    #[test]
    fn invalid_addresses_read_as_fill() {
        let (debugger, machine) = setup(&[0x12]);
        assert_eq!(debugger.get_byte(&machine, &Address::invalid()), 0xFF);
        assert_eq!(debugger.get_word(&machine, &Address::invalid()), 0xFFFF);
        assert_eq!(debugger.get_byte(&machine, &Address::new(0)), 0x12);
    }
}
