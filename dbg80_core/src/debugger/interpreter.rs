use crate::cpu::{EngineState, Flag, Register};
use crate::debugger::address::Address;
use crate::debugger::breakpoints::{BreakpointHit, BreakpointKind};
use crate::debugger::command::{self, Command, DataSize, TraceMode, VarCommand};
use crate::debugger::disassembler::{self, DecodedInstruction};
use crate::debugger::stack::StackTracer;
use crate::debugger::{Debugger, MessageCategory, StepResult, StopReason};
use crate::errors::DebuggerError;
use crate::expr::ExprError;
use crate::instructions::{self, MnemonicStyle};
use crate::memory::MemMapped;
use crate::Machine;

use std::panic::{self, AssertUnwindSafe};

const DUMP_LINE_BYTES: usize = 16;
const ADDRESS_SPACE: usize = 0x10000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ScriptOutcome {
    Completed,
    // a false `if` with no `else` left to jump to
    Aborted,
    Failed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RunMode {
    Go,
    Trace(TraceMode, u64),
    Quiet(u64),
}

impl Debugger {
    /// Runs one operator line. Returns false if a command in it failed.
    pub fn do_command(&mut self, machine: &mut Machine, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return true;
        }

        self.remember(line);
        let commands = command::split_commands(line);
        log::trace!("dispatch {:?}", commands);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_script(machine, &commands)));
        match outcome {
            Ok(ScriptOutcome::Failed) => false,
            Ok(_) => true,
            Err(cause) => {
                let text = cause
                    .downcast_ref::<&str>()
                    .map(|text| text.to_string())
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::warn!("command panicked: {}", text);
                self.print(format!("internal error: {}", text));
                false
            }
        }
    }

    fn remember(&mut self, line: &str) {
        self.command_history.retain(|previous| previous != line);
        self.command_history.push_front(line.to_string());
        self.command_history.truncate(self.config.command_history_len);
    }

    fn report(&mut self, error: &DebuggerError) {
        log::debug!("command failed: {:?}", error);
        self.print(error.to_string());
    }

    fn run_script(&mut self, machine: &mut Machine, commands: &[String]) -> ScriptOutcome {
        let mut index = 0;

        while index < commands.len() {
            let text = &commands[index];
            index += 1;

            let command = match Command::parse(text) {
                Ok(command) => command,
                Err(error) => {
                    self.report(&error);
                    return ScriptOutcome::Failed;
                }
            };

            match command {
                Command::If(condition) => match self.evaluate(machine, &condition) {
                    Ok(value) if value != 0 => {}
                    Ok(_) => match commands[index..].iter().position(|c| is_else(c)) {
                        Some(offset) => index += offset + 1,
                        None => return ScriptOutcome::Aborted,
                    },
                    Err(error) => {
                        self.report(&error);
                        return ScriptOutcome::Failed;
                    }
                },
                // the taken branch ends where the other one starts
                Command::Else => return ScriptOutcome::Completed,
                command => {
                    if let Err(error) = self.execute(machine, command) {
                        self.report(&error);
                        return ScriptOutcome::Failed;
                    }
                }
            }
        }

        ScriptOutcome::Completed
    }

    fn execute(&mut self, machine: &mut Machine, command: Command) -> Result<(), DebuggerError> {
        match command {
            Command::Help => {
                self.show_usage();
                Ok(())
            }
            Command::Assemble {
                addr,
                mnemonic,
                operands,
            } => self.assemble(machine, addr, mnemonic, operands),
            Command::BreakpointSet { kind, addr, commands } => {
                let mut target = self.parse_address(machine, &addr)?;
                if let Some(script) = commands {
                    let list = command::split_commands(&script);
                    target = target.with_command(&script, list);
                }
                self.add_breakpoint(machine, kind, target)
            }
            Command::BreakpointClear(addr) => self.breakpoint_clear(machine, addr),
            Command::BreakpointList => {
                self.breakpoint_list(machine);
                Ok(())
            }
            Command::BreakAfter(count) => self.break_after(machine, count),
            Command::PortBreakpoint { input, port } => self.port_breakpoint(machine, input, port),
            Command::Dump { size, addr, len } => self.dump(machine, size, addr, len),
            Command::DumpHistory { back, filter } => self.dump_history(machine, back, filter),
            Command::DumpMap => {
                for (start, len, block_type) in machine.memory.block_ranges() {
                    let end = start as usize + len - 1;
                    self.print(format!("{:04X}-{:04X} {}", start, end, block_type.name()));
                }
                Ok(())
            }
            Command::Edit { size, addr, values } => self.edit(machine, size, &addr, &values),
            Command::Frequencies { clear } => {
                self.frequencies(clear);
                Ok(())
            }
            Command::Go(addr) => {
                if let Some(addr) = addr {
                    let target = self.parse_address(machine, &addr)?;
                    let target = Address::temporary(target.get().unwrap_or(0));
                    self.add_breakpoint(machine, BreakpointKind::Exec, target)?;
                }
                self.run(machine, RunMode::Go)
            }
            Command::Halt => {
                machine.stop();
                self.message(MessageCategory::Cpu, format!("halt at {:04X}", machine.cpu.reg_pc));
                Ok(())
            }
            Command::PortInput(port) => {
                let port = self.port_number(machine, &port)?;
                let byte = machine.memory.input(port);
                self.print(format!("in {:02X}: {:02X}", port, byte));
                Ok(())
            }
            Command::PortOutput(port, byte) => {
                let port = self.port_number(machine, &port)?;
                let byte = self.byte_value(machine, &byte)?;
                machine.memory.output(port, byte);
                self.message(MessageCategory::Port, format!("out {:02X}: {:02X}", port, byte));
                Ok(())
            }
            Command::StackTrace { symbols, count } => self.stack_trace(machine, symbols, count),
            Command::NearestSymbol(addr) => self.nearest_symbol(machine, &addr),
            Command::ListSymbols(prefix) => {
                self.list_symbols(prefix);
                Ok(())
            }
            Command::Messages { category, enable } => self.messages_command(category, enable),
            Command::StepOver { registers } => {
                self.step_over(machine)?;
                if registers {
                    self.print(machine.cpu.to_string());
                }
                Ok(())
            }
            Command::Print(text) => {
                let value = self.evaluate(machine, &text)?;
                let line = if value < 0 {
                    format!("-{:X}h {}", value.unsigned_abs(), value)
                } else {
                    format!("{:X}h {}", value, value)
                };
                self.print(line);
                Ok(())
            }
            Command::Registers(args) => self.registers(machine, args),
            Command::SetOption(args) => self.set_option(machine, &args),
            Command::Trace { mode, count } => {
                let count = match count {
                    Some(count) => self.count_value(machine, &count)?,
                    None => 1,
                };
                self.run(machine, RunMode::Trace(mode, count as u64))
            }
            Command::Unassemble { addr, end } => self.unassemble(machine, addr, end),
            Command::Var(var) => self.var(machine, var),
            Command::If(_) | Command::Else => Err(DebuggerError::Syntax("if/else".to_string())),
        }
    }

    //
    // argument helpers
    //

    fn count_value(&self, machine: &Machine, text: &str) -> Result<usize, DebuggerError> {
        let value = self.evaluate(machine, text)?;
        if value < 0 {
            return Err(DebuggerError::Syntax(format!("negative count: {}", text)));
        }
        Ok(value as usize)
    }

    fn byte_value(&self, machine: &Machine, text: &str) -> Result<u8, DebuggerError> {
        let value = self.evaluate(machine, text)?;
        if value < -0x80 || value > 0xFF {
            return Err(DebuggerError::Syntax(format!("byte out of range: {}", text)));
        }
        Ok(value as u8)
    }

    fn port_number(&self, machine: &Machine, text: &str) -> Result<u8, DebuggerError> {
        let value = self.evaluate(machine, text)?;
        if value < 0 || value > 0xFF {
            return Err(DebuggerError::Syntax(format!("port out of range: {}", text)));
        }
        Ok(value as u8)
    }

    fn address_or(&self, machine: &Machine, text: Option<String>, cursor: &Address) -> Result<Address, DebuggerError> {
        match text {
            Some(text) => self.parse_address(machine, &text),
            None if cursor.is_valid() => Ok(cursor.clone()),
            None => Ok(Address::new(machine.cpu.reg_pc)),
        }
    }

    //
    // breakpoints
    //

    fn breakpoint_clear(&mut self, machine: &mut Machine, addr: Option<String>) -> Result<(), DebuggerError> {
        match addr {
            None => {
                let count = self.clear_breakpoints(machine, None);
                self.checks.breakpoints.arm_countdown(0);
                self.history_init();
                self.print(format!("{} breakpoints cleared", count));
            }
            Some(text) => {
                let target = self
                    .parse_address(machine, &text)?
                    .get()
                    .ok_or_else(|| DebuggerError::InvalidAddress(text.clone()))?;
                if self.clear_breakpoints(machine, Some(target)) == 0 {
                    return Err(DebuggerError::Breakpoint(format!("no breakpoint at {:04X}", target)));
                }
            }
        }
        Ok(())
    }

    fn breakpoint_list(&mut self, machine: &Machine) {
        let mut lines: Vec<String> = self
            .checks
            .breakpoints
            .list()
            .into_iter()
            .filter(|(_, addr)| !addr.temporary)
            .map(|(kind, addr)| match addr.command {
                Some(ref script) => format!("{} {} \"{}\"", kind.tag(), addr, script),
                None => format!("{} {}", kind.tag(), addr),
            })
            .collect();

        if let Some(count) = self.checks.breakpoints.countdown() {
            lines.push(format!("bn {}", count));
        }
        for (input, tag) in [(true, "bi"), (false, "bo")].iter() {
            for port in machine.memory.port_breakpoints(*input) {
                lines.push(format!("{} {:02X}", tag, port));
            }
        }

        if lines.is_empty() {
            self.print("no breakpoints");
        }
        for line in lines {
            self.print(line);
        }
    }

    fn break_after(&mut self, machine: &Machine, count: Option<String>) -> Result<(), DebuggerError> {
        match count {
            None => {
                let line = match self.checks.breakpoints.countdown() {
                    Some(count) => format!("bn {}", count),
                    None => "bn disarmed".to_string(),
                };
                self.print(line);
            }
            Some(text) => {
                let count = self.count_value(machine, &text)?;
                self.arm_countdown(count.min(u32::MAX as usize) as u32);
            }
        }
        Ok(())
    }

    fn port_breakpoint(&mut self, machine: &mut Machine, input: bool, port: Option<String>) -> Result<(), DebuggerError> {
        let tag = if input { "bi" } else { "bo" };

        match port.as_deref() {
            None => {
                let ports = machine.memory.port_breakpoints(input);
                if ports.is_empty() {
                    self.print(format!("{}: none", tag));
                }
                for port in ports {
                    self.print(format!("{} {:02X}", tag, port));
                }
            }
            Some("*") => machine.memory.clear_port_breakpoints(input),
            Some(text) => {
                let port = self.port_number(machine, text)?;
                let set = machine.memory.toggle_port_breakpoint(port, input);
                let state = if set { "set" } else { "cleared" };
                self.message(MessageCategory::Break, format!("{} {:02X} {}", tag, port, state));
            }
        }
        Ok(())
    }

    //
    // memory
    //

    fn dump(
        &mut self,
        machine: &Machine,
        size: DataSize,
        addr: Option<String>,
        len: Option<String>,
    ) -> Result<(), DebuggerError> {
        let cursor = self.next_dump.clone();
        let mut at = self.address_or(machine, addr, &cursor)?;
        // one pass over the address space at most
        let len = match len {
            Some(len) => self.count_value(machine, &len)?,
            None => self.config.dump_bytes,
        }
        .min(ADDRESS_SPACE);

        let unit = size.bytes() as usize;
        let mut units = (len + unit - 1) / unit;
        let per_line = DUMP_LINE_BYTES / unit;

        while units > 0 {
            let start = at.clone();
            let mut items = Vec::new();
            let mut text = String::new();

            for _ in 0..units.min(per_line) {
                let mut value: u32 = 0;
                for i in 0..unit {
                    let byte = self.get_byte(machine, &at);
                    value |= (byte as u32) << (8 * i);
                    text.push(if byte.is_ascii_graphic() || byte == b' ' {
                        byte as char
                    } else {
                        '.'
                    });
                    at.advance(1);
                }
                items.push(match size {
                    DataSize::Byte => format!("{:02X}", value),
                    DataSize::Word => format!("{:04X}", value),
                    DataSize::DoubleWord => format!("{:08X}", value),
                });
            }
            units -= items.len();

            let width = per_line * (unit * 2 + 1);
            self.print(format!("{}  {:<width$} {}", start, items.join(" "), text, width = width));
        }

        self.next_dump = at;
        Ok(())
    }

    fn edit(&mut self, machine: &mut Machine, size: DataSize, addr: &str, values: &[String]) -> Result<(), DebuggerError> {
        let mut at = self.parse_address(machine, addr)?;
        if !at.is_valid() {
            return Err(DebuggerError::InvalidAddress(addr.to_string()));
        }

        for text in values {
            match size {
                DataSize::Word => {
                    let value = self.evaluate(machine, text)?;
                    if value < -0x8000 || value > 0xFFFF {
                        return Err(DebuggerError::Syntax(format!("word out of range: {}", text)));
                    }
                    self.set_word(machine, &at, value as u16);
                    at.advance(2);
                }
                _ => {
                    let byte = self.byte_value(machine, text)?;
                    self.set_byte(machine, &at, byte);
                    at.advance(1);
                }
            }
        }
        Ok(())
    }

    //
    // history
    //

    fn dump_history(
        &mut self,
        machine: &Machine,
        back: Option<String>,
        filter: Option<String>,
    ) -> Result<(), DebuggerError> {
        if !self.checks.history.is_enabled() {
            return Err(DebuggerError::Failed("history is not being recorded".to_string()));
        }

        let back = match back {
            Some(back) => self.count_value(machine, &back)?,
            None => self.config.unassemble_count,
        };
        // a second argument starting with a letter filters by mnemonic
        let (count, filter) = match filter {
            Some(ref text) if text.starts_with(|c: char| c.is_ascii_alphabetic() || c == '.') => {
                (back, Some(text.to_ascii_uppercase()))
            }
            Some(ref text) => (self.count_value(machine, text)?, None),
            None => (back, None),
        };

        let style = self.style;
        let lines: Vec<String> = self
            .checks
            .history
            .entries(back, count)
            .into_iter()
            .filter_map(|addr| disassembler::decode_one(&machine.memory, &mut Address::new(addr), style, None))
            .filter(|decoded| match filter.as_deref() {
                None => true,
                Some("CALL") => decoded.is_call(),
                Some(prefix) => decoded.mnemonic.starts_with(prefix),
            })
            .map(|decoded| decoded.format_line())
            .collect();

        if lines.is_empty() {
            self.print("history empty");
        }
        for line in lines {
            self.print(line);
        }
        Ok(())
    }

    fn frequencies(&mut self, clear: bool) {
        if clear {
            self.checks.history.clear_frequencies();
            return;
        }

        let counts = self.checks.history.frequencies();
        if counts.is_empty() {
            self.print("no instructions recorded");
        }
        for (op_code, count) in counts {
            let mnemonic = instructions::opcode(op_code).id.mnemonic(self.style);
            self.print(format!("{:02X} {:<6} {}", op_code, mnemonic, count));
        }
    }

    //
    // symbols and stack
    //

    fn stack_trace(&mut self, machine: &Machine, symbols: bool, count: Option<String>) -> Result<(), DebuggerError> {
        let max_frames = match count {
            Some(count) => self.count_value(machine, &count)?,
            None => self.config.max_stack_frames,
        };

        let tracer = StackTracer {
            memory: &machine.memory,
            style: self.style,
            scan_window: self.config.call_scan_window,
            symbols: if symbols { Some(&self.symbols) } else { None },
        };
        let lines: Vec<String> = tracer
            .trace(&machine.cpu, max_frames)
            .into_iter()
            .map(|frame| {
                let mut line = format!("{:04X}: {:04X}  {}", frame.sp, frame.return_addr, frame.call);
                if let Some(symbol) = frame.symbol {
                    line.push_str(&format!("  {}+{:X}", symbol.name, frame.call.addr.wrapping_sub(symbol.addr)));
                }
                line
            })
            .collect();

        if lines.is_empty() {
            self.print("no stack frames");
        }
        for line in lines {
            self.print(line);
        }
        Ok(())
    }

    fn nearest_symbol(&mut self, machine: &Machine, text: &str) -> Result<(), DebuggerError> {
        let addr = self.parse_address(machine, text)?;
        let lookup = match self.symbols.find_by_address(&addr, true) {
            Some(lookup) => lookup,
            None => {
                self.print(format!("no symbol near {}", addr));
                return Ok(());
            }
        };

        let target = addr.get().unwrap_or(0);
        if let Some(exact) = lookup.exact {
            self.print(format!("{} = {}", addr, exact.name));
            return Ok(());
        }
        if let Some(before) = lookup.preceding {
            self.print(format!("{:04X} {}+{:X}", before.addr, before.name, target.wrapping_sub(before.addr)));
        }
        if let Some(after) = lookup.following {
            self.print(format!("{:04X} {}-{:X}", after.addr, after.name, after.addr.wrapping_sub(target)));
        }
        Ok(())
    }

    fn list_symbols(&mut self, prefix: Option<String>) {
        let prefix = prefix.map(|p| p.to_ascii_uppercase());
        let lines: Vec<String> = self
            .symbols
            .iter()
            .filter(|(_, symbol)| {
                prefix
                    .as_deref()
                    .map_or(true, |p| symbol.name.to_ascii_uppercase().starts_with(p))
            })
            .map(|(module, symbol)| format!("{:04X} {:<24} {}", symbol.addr, symbol.name, module))
            .collect();

        if lines.is_empty() {
            self.print("no symbols");
        }
        for line in lines {
            self.print(line);
        }
    }

    //
    // registers, options, variables
    //

    fn registers(&mut self, machine: &mut Machine, args: Option<(String, Option<String>)>) -> Result<(), DebuggerError> {
        let (name, value) = match args {
            None => {
                self.print(machine.cpu.to_string());
                return Ok(());
            }
            Some(args) => args,
        };

        if let Some(reg) = Register::parse(&name) {
            match value {
                None => {
                    let value = machine.cpu.get_register(reg);
                    let line = if reg.is_byte() {
                        format!("{}={:02X}", name.to_ascii_uppercase(), value)
                    } else {
                        format!("{}={:04X}", name.to_ascii_uppercase(), value)
                    };
                    self.print(line);
                }
                Some(text) => {
                    let value = self.evaluate(machine, &text)?;
                    let (low, high) = if reg.is_byte() { (-0x80, 0xFF) } else { (-0x8000, 0xFFFF) };
                    if value < low || value > high {
                        return Err(DebuggerError::Syntax(format!("value out of range: {}", text)));
                    }
                    machine.cpu.set_register(reg, value as u16);
                    self.message(MessageCategory::Cpu, format!("{}={:X}", name.to_ascii_uppercase(), value as u16));
                }
            }
            return Ok(());
        }

        if let Some(flag) = Flag::parse(&name) {
            match value {
                None => {
                    let line = format!("{}={}", name.to_ascii_uppercase(), machine.cpu.get_flag(flag) as u8);
                    self.print(line);
                }
                Some(text) => {
                    let value = self.evaluate(machine, &text)?;
                    machine.cpu.set_flag(flag, value != 0);
                }
            }
            return Ok(());
        }

        Err(DebuggerError::UnknownRegister(name))
    }

    fn set_option(&mut self, machine: &mut Machine, args: &[String]) -> Result<(), DebuggerError> {
        let option = args.first().map(|option| option.to_ascii_lowercase());

        match (option.as_deref(), args.get(1)) {
            (None, _) => {
                let style = match self.style {
                    MnemonicStyle::Intel8080 => "8080",
                    MnemonicStyle::Intel8086 => "8086",
                };
                self.print(format!("style {}", style));
                self.print(format!("cs {}", self.checksum_interval()));
                self.print(format!("sp {}", machine.cpu.speed));
            }
            (Some("8080"), None) => self.style = MnemonicStyle::Intel8080,
            (Some("8086"), None) => self.style = MnemonicStyle::Intel8086,
            (Some("cs"), Some(value)) => {
                let interval = self.count_value(machine, value)?;
                self.set_checksum_interval(interval.min(u32::MAX as usize) as u32);
            }
            (Some("sp"), Some(value)) => {
                let speed = self.count_value(machine, value)?;
                machine.cpu.speed = speed.max(1).min(u32::MAX as usize) as u32;
            }
            _ => return Err(DebuggerError::Syntax(format!("s {}", args.join(" ")))),
        }
        Ok(())
    }

    fn var(&mut self, machine: &Machine, var: VarCommand) -> Result<(), DebuggerError> {
        match var {
            VarCommand::List => {
                if self.variables.is_empty() {
                    self.print("no variables");
                }
                let lines: Vec<String> = self
                    .variables
                    .iter()
                    .map(|(name, value)| format!("{} = {:X}h {}", name, value, value))
                    .collect();
                for line in lines {
                    self.print(line);
                }
            }
            VarCommand::Show(name) => {
                let value = *self
                    .variables
                    .get(&name)
                    .ok_or_else(|| ExprError::Undefined(name.clone()))?;
                self.print(format!("{} = {:X}h {}", name, value, value));
            }
            VarCommand::Delete(name) => {
                self.variables
                    .remove(&name)
                    .ok_or_else(|| ExprError::Undefined(name.clone()))?;
            }
            VarCommand::Assign(name, text) => {
                let value = self.evaluate(machine, &text)?;
                self.variables.insert(name, value);
            }
        }
        Ok(())
    }

    fn messages_command(&mut self, category: Option<String>, enable: Option<bool>) -> Result<(), DebuggerError> {
        let category = match category {
            None => {
                for category in MessageCategory::ALL.iter() {
                    let state = if self.messages() & category.bit() != 0 { "on" } else { "off" };
                    self.print(format!("{:<6} {}", category.name(), state));
                }
                return Ok(());
            }
            Some(category) => category,
        };

        if category.eq_ignore_ascii_case("all") {
            for each in MessageCategory::ALL.iter() {
                self.set_message(*each, enable.unwrap_or(true));
            }
            return Ok(());
        }

        let parsed = MessageCategory::parse(&category).ok_or_else(|| DebuggerError::Syntax(format!("m {}", category)))?;
        let enabled = enable.unwrap_or(self.messages() & parsed.bit() == 0);
        self.set_message(parsed, enabled);
        Ok(())
    }

    fn assemble(
        &mut self,
        machine: &mut Machine,
        addr: Option<String>,
        mnemonic: Option<String>,
        operands: Vec<String>,
    ) -> Result<(), DebuggerError> {
        let cursor = self.next_assemble.clone();
        let mut at = self.address_or(machine, addr, &cursor)?;

        let operands: Vec<&str> = operands.iter().map(String::as_str).collect();
        let bytes = disassembler::encode_one(mnemonic.as_deref().unwrap_or(""), &operands, &at);
        if bytes.is_empty() {
            self.print("assemble: not supported");
        }
        for byte in bytes {
            self.set_byte(machine, &at, byte);
            at.advance(1);
        }

        self.next_assemble = at;
        Ok(())
    }

    //
    // disassembly
    //

    /// Decodes at `addr`, returning an optional label line and the instruction line.
    fn decode_lines(&self, machine: &Machine, addr: &mut Address) -> Option<(Option<String>, DecodedInstruction)> {
        let start = addr.get()?;
        let live = if start == machine.cpu.reg_pc {
            Some(&machine.cpu)
        } else {
            None
        };
        let mut decoded = disassembler::decode_one(&machine.memory, addr, self.style, live)?;

        let mut label = None;
        if let Some(exact) = self
            .symbols
            .find_by_address(&Address::new(start), false)
            .and_then(|lookup| lookup.exact)
        {
            label = Some(format!("{}:", exact.name));
            decoded.annotations.extend(exact.annotation);
            decoded.annotations.extend(exact.comment);
        }

        Some((label, decoded))
    }

    fn print_decoded(&mut self, machine: &Machine, addr: &mut Address) -> Option<DecodedInstruction> {
        let (label, decoded) = self.decode_lines(machine, addr)?;
        if let Some(label) = label {
            self.print(label);
        }
        self.print(decoded.format_line());
        Some(decoded)
    }

    pub(crate) fn print_current(&mut self, machine: &Machine) {
        let mut pc = Address::new(machine.cpu.reg_pc);
        self.print_decoded(machine, &mut pc);
    }

    fn unassemble(&mut self, machine: &Machine, addr: Option<String>, end: Option<String>) -> Result<(), DebuggerError> {
        let cursor = self.next_unassemble.clone();
        let mut at = self.address_or(machine, addr, &cursor)?;

        match end {
            Some(end) => {
                let end = self
                    .parse_address(machine, &end)?
                    .get()
                    .ok_or_else(|| DebuggerError::InvalidAddress(end.clone()))?;
                let start = at.get().unwrap_or(0);
                // walk forward until the cursor leaves [start, end]
                while let Some(current) = at.get() {
                    if current.wrapping_sub(start) > end.wrapping_sub(start) {
                        break;
                    }
                    let decoded = match self.print_decoded(machine, &mut at) {
                        Some(decoded) => decoded,
                        None => break,
                    };
                    if decoded.next_addr() < decoded.addr {
                        break;
                    }
                }
            }
            None => {
                for _ in 0..self.config.unassemble_count {
                    if self.print_decoded(machine, &mut at).is_none() {
                        break;
                    }
                }
            }
        }

        self.next_unassemble = at;
        Ok(())
    }

    //
    // execution
    //

    fn step_over(&mut self, machine: &mut Machine) -> Result<(), DebuggerError> {
        let mut pc = Address::new(machine.cpu.reg_pc);
        let decoded = disassembler::decode_one(&machine.memory, &mut pc, self.style, None);

        match decoded {
            Some(ref decoded) if decoded.is_call() => {
                let target = Address::temporary(decoded.next_addr());
                self.add_breakpoint(machine, BreakpointKind::Exec, target)?;
                self.run(machine, RunMode::Go)
            }
            _ => {
                self.run(machine, RunMode::Quiet(1))?;
                self.print_current(machine);
                Ok(())
            }
        }
    }

    fn run(&mut self, machine: &mut Machine, mode: RunMode) -> Result<(), DebuggerError> {
        if !machine.cpu.is_powered() {
            return Err(DebuggerError::Failed("machine is powered off".to_string()));
        }
        if machine.cpu.state == EngineState::Error {
            self.message(MessageCategory::Cpu, "clearing error state");
            machine.cpu.state = EngineState::Ready;
        }

        // scripts may trace; only the outermost run owns the engine state
        let nested = machine.is_running();
        machine.start();
        self.checks.breakpoints.skip_once(machine.cpu.reg_pc);

        let chunk = self.config.run_chunk.max(1) * machine.cpu.speed.max(1) as u64;
        let limit = self.config.run_limit;
        let mut remaining = match mode {
            RunMode::Go => u64::MAX,
            RunMode::Trace(_, count) | RunMode::Quiet(count) => count,
        };
        let mut executed: u64 = 0;
        let mut stopped = false;

        'run: while remaining > 0 && executed < limit {
            if machine.stop_requested() {
                self.print("stop requested");
                stopped = true;
                break;
            }

            let burst = chunk.min(remaining).min(limit - executed);
            for _ in 0..burst {
                let before = match mode {
                    RunMode::Trace(..) => self.decode_lines(machine, &mut Address::new(machine.cpu.reg_pc)),
                    _ => None,
                };

                let result = self.step(machine);
                if retired(&result) {
                    executed += 1;
                    remaining -= 1;
                    if let (RunMode::Trace(trace, _), Some((label, decoded))) = (mode, before) {
                        self.trace_line(machine, trace, label, decoded);
                    }
                }

                match result {
                    StepResult::Cycles(_) => {
                        if machine.cpu.halted && !machine.cpu.interrupts_enabled {
                            self.print(format!("halted at {:04X}", machine.cpu.reg_pc));
                            stopped = true;
                            break 'run;
                        }
                    }
                    StepResult::Break(reason) => {
                        if !self.handle_stop(machine, reason) {
                            stopped = true;
                            break 'run;
                        }
                    }
                    StepResult::Fault(_) => {
                        stopped = true;
                        break 'run;
                    }
                }
            }
        }

        if executed >= limit && !stopped {
            self.print(format!("run limit of {} instructions reached", limit));
        }

        if !nested {
            machine.stop();
            self.clear_temporary_breakpoints(machine);
        }
        self.next_unassemble = Address::new(machine.cpu.reg_pc);
        if mode == RunMode::Go && !nested {
            self.on_stop(machine);
        }
        Ok(())
    }

    fn trace_line(&mut self, machine: &Machine, mode: TraceMode, label: Option<String>, decoded: DecodedInstruction) {
        match mode {
            TraceMode::Calls if !decoded.is_call() => {}
            TraceMode::Registers => {
                if let Some(label) = label {
                    self.print(label);
                }
                self.print(decoded.format_line());
                self.print(format!("    {}", machine.cpu));
            }
            _ => {
                if let Some(label) = label {
                    self.print(label);
                }
                self.print(decoded.format_line());
            }
        }
    }

    /// Returns true when execution should carry on past this stop.
    fn handle_stop(&mut self, machine: &mut Machine, reason: StopReason) -> bool {
        match reason {
            StopReason::Breakpoint(BreakpointHit::Address {
                kind,
                ref addr,
                consumed,
            }) if !addr.commands.is_empty() => {
                self.checks.breakpoints.suppress();
                let outcome = self.run_script(machine, &addr.commands);
                self.checks.breakpoints.unsuppress();

                if outcome == ScriptOutcome::Failed || !machine.is_running() {
                    self.print(reason.to_string());
                    return false;
                }
                // a run-to target shared with a scripted breakpoint still ends the run
                if consumed {
                    return false;
                }
                if kind == BreakpointKind::Exec {
                    self.checks.breakpoints.skip_once(machine.cpu.reg_pc);
                }
                true
            }
            StopReason::Breakpoint(BreakpointHit::Address { ref addr, .. }) if addr.temporary => false,
            reason => {
                self.print(reason.to_string());
                false
            }
        }
    }

    fn show_usage(&mut self) {
        let usage = [
            "",
            "Usage:",
            "---------------------------------------------------------------",
            "Command                     Description",
            "---------------------------------------------------------------",
            "a [addr] [mnemonic] [op]    assembles an instruction (not supported)",
            "bp/br/bw addr [\"cmds\"]      sets an exec/read/write breakpoint",
            "bc addr|*                   clears breakpoints at addr, or all",
            "bl                          lists breakpoints",
            "bn [n]                      breaks after n instructions (0 disarms)",
            "bi/bo [port|*]              toggles a port input/output breakpoint",
            "d/db/dw/dd [addr] [len]     dumps memory as bytes/words/dwords",
            "dh [n] [n|filter]           shows execution history",
            "dm                          shows the memory block map",
            "e/eb/ew addr values...      edits memory",
            "f [clear]                   shows opcode frequencies",
            "g [addr]                    runs, optionally until addr",
            "h                           halts execution",
            "i port / o port byte        reads or writes a port",
            "k/ks [n]                    shows a stack trace (ks: with symbols)",
            "ln addr                     shows the nearest symbol",
            "ls [prefix]                 lists symbols",
            "m [category] [on|off]       shows or toggles message categories",
            "p/pr                        steps over (pr: then shows registers)",
            "print expr                  evaluates an expression",
            "r [reg[=value]]             shows or sets registers",
            "s [8080|8086|cs n|sp n]     shows or sets options",
            "t/tr/tc [n]                 traces n instructions (tr: registers, tc: calls)",
            "u [addr] [end]              unassembles",
            "var [name [= expr]]         lists, shows, sets or deletes variables",
            "if expr / else              script conditionals",
            "",
        ];
        for line in usage.iter() {
            self.print(line);
        }
    }
}

fn is_else(text: &str) -> bool {
    matches!(Command::parse(text), Ok(Command::Else))
}

/// Exec breakpoints refuse the fetch; every other stop comes after the instruction ran.
fn retired(result: &StepResult) -> bool {
    match *result {
        StepResult::Cycles(_) => true,
        StepResult::Break(StopReason::Breakpoint(BreakpointHit::Address { kind, .. })) => {
            kind != BreakpointKind::Exec
        }
        StepResult::Break(StopReason::Port { .. }) => true,
        StepResult::Break(StopReason::Breakpoint(BreakpointHit::Countdown(_))) => false,
        StepResult::Fault(_) => false,
    }
}
