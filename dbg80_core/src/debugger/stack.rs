use crate::cpu::Cpu;
use crate::debugger::address::Address;
use crate::debugger::disassembler::{decode_one, DecodedInstruction};
use crate::debugger::symbols::{SymbolMatch, SymbolTable};
use crate::instructions::MnemonicStyle;
use crate::memory::Memory;

#[derive(Debug, Clone)]
pub struct StackFrame {
    pub sp: u16,
    pub return_addr: u16,
    pub call: DecodedInstruction,
    pub symbol: Option<SymbolMatch>,
}

pub struct StackTracer<'a> {
    pub memory: &'a Memory,
    pub style: MnemonicStyle,
    pub scan_window: u16,
    pub symbols: Option<&'a SymbolTable>,
}

impl<'a> StackTracer<'a> {
    /// Rebuilds the call chain by treating stack words as return addresses.
    pub fn trace(&self, cpu: &Cpu, max_frames: usize) -> Vec<StackFrame> {
        let mut frames: Vec<StackFrame> = Vec::new();
        let mut sp = Address::new(cpu.reg_sp);

        while frames.len() < max_frames {
            let frame_sp = match sp.get() {
                Some(addr) => addr,
                None => break,
            };
            let return_addr = self.memory.get_word(frame_sp);
            sp.advance(2);

            let call = match self.find_call(return_addr) {
                Some(call) => call,
                None => break,
            };

            let line = call.format_line();
            if frames.last().map_or(false, |prev| prev.call.format_line() == line) {
                break;
            }

            let symbol = self.symbols.and_then(|symbols| {
                let lookup = symbols.find_by_address(&Address::new(call.addr), true)?;
                lookup.exact.or(lookup.preceding)
            });

            frames.push(StackFrame {
                sp: frame_sp,
                return_addr,
                call,
                symbol,
            });
        }

        frames
    }

    fn find_call(&self, return_addr: u16) -> Option<DecodedInstruction> {
        (1..=self.scan_window).find_map(|back| {
            let mut addr = Address::new(return_addr.wrapping_sub(back));
            let decoded = decode_one(self.memory, &mut addr, self.style, None)?;

            if decoded.is_call() && decoded.next_addr() == return_addr {
                Some(decoded)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::symbols::SymbolDef;

    fn tracer(memory: &Memory) -> StackTracer {
        StackTracer {
            memory,
            style: MnemonicStyle::Intel8080,
            scan_window: 4,
            symbols: None,
        }
    }

    #[test]
    fn follows_nested_calls() {
        let mut memory = Memory::new();
        // 0100: CALL 0200 ; 0200: CALL 0300
        memory.load(0x0100, &[0xCD, 0x00, 0x02]);
        memory.load(0x0200, &[0xCD, 0x00, 0x03]);
        // stack grows down from 1000: innermost return first
        memory.set_word(0x0FFC, 0x0203);
        memory.set_word(0x0FFE, 0x0103);

        let mut cpu = Cpu::new();
        cpu.reg_sp = 0x0FFC;

        let frames = tracer(&memory).trace(&cpu, 16);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].call.addr, 0x0200);
        assert_eq!(frames[1].call.addr, 0x0100);
        assert_eq!(frames[1].sp, 0x0FFE);
    }

    #[test]
    fn stops_without_a_call_or_at_max_frames() {
        let mut memory = Memory::new();
        memory.load(0x0100, &[0xCD, 0x00, 0x02]);
        memory.set_word(0x0FF0, 0x0103);
        memory.set_word(0x0FF2, 0x0103);
        memory.set_word(0x0FF4, 0x0103);

        let mut cpu = Cpu::new();
        cpu.reg_sp = 0x0FF0;

        // identical call lines end the walk
        assert_eq!(tracer(&memory).trace(&cpu, 16).len(), 1);
        assert_eq!(tracer(&memory).trace(&cpu, 0).len(), 0);

        cpu.reg_sp = 0x0F00;
        assert!(tracer(&memory).trace(&cpu, 16).is_empty());
    }

    #[test]
    fn rst_counts_as_a_call_and_frames_carry_symbols() {
        let mut memory = Memory::new();
        memory.load(0x0040, &[0xFF]);
        memory.set_word(0x0FFE, 0x0041);

        let mut symbols = SymbolTable::new();
        symbols.add_group("ROM", 0, 0x100, vec![("MAIN".to_string(), SymbolDef::Offset(0x30))]);

        let mut cpu = Cpu::new();
        cpu.reg_sp = 0x0FFE;

        let tracer = StackTracer {
            symbols: Some(&symbols),
            ..tracer(&memory)
        };
        let frames = tracer.trace(&cpu, 16);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].call.mnemonic, "RST");
        assert_eq!(frames[0].symbol.as_ref().map(|s| s.name.as_str()), Some("MAIN"));
    }
}
