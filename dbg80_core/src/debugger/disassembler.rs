use crate::cpu::Cpu;
use crate::debugger::address::Address;
use crate::instructions::{self, Direction, MnemonicStyle, Opcode, OperandMode, OperandSize, Reg};
use crate::memory::Memory;

use std::fmt::{self, Display};

const ANNOTATION_COLUMN: usize = 32;

#[derive(Debug, Clone)]
pub struct DecodedInstruction {
    pub addr: u16,
    pub bytes: Vec<u8>,
    pub opcode: &'static Opcode,
    pub mnemonic: &'static str,
    pub operands: Vec<String>,
    pub annotations: Vec<String>,
}

impl DecodedInstruction {
    pub fn len(&self) -> u16 {
        self.bytes.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_call(&self) -> bool {
        self.opcode.id.is_call()
    }

    pub fn next_addr(&self) -> u16 {
        self.addr.wrapping_add(self.len())
    }

    pub fn format_line(&self) -> String {
        let bytes = self
            .bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        let marker = if self.opcode.undocumented { '*' } else { ' ' };

        let mut line = format!(
            "{:04X} {:<9}{}{:<6} {}",
            self.addr,
            bytes,
            marker,
            self.mnemonic,
            self.operands.join(",")
        );

        if !self.annotations.is_empty() {
            let line_len = line.trim_end().len();
            line.truncate(line_len);
            line.push_str(&" ".repeat(ANNOTATION_COLUMN.saturating_sub(line_len).max(1)));
            line.push_str("; ");
            line.push_str(&self.annotations.join(" "));
        }

        line.trim_end().to_string()
    }
}

impl Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format_line())
    }
}

/// Decodes the instruction at `addr` and advances `addr` past it.
///
/// With a `cpu`, memory operands read by the instruction are annotated with
/// their current contents. Memory is read without side effects.
pub fn decode_one(
    memory: &Memory,
    addr: &mut Address,
    style: MnemonicStyle,
    cpu: Option<&Cpu>,
) -> Option<DecodedInstruction> {
    let start = addr.get()?;
    let op_code = memory.get_byte(start);
    addr.advance(1);

    let opcode = instructions::opcode(op_code);
    let mut bytes = vec![op_code];
    let mut operands = Vec::new();
    let mut annotations = Vec::new();
    let mut size = OperandSize::Byte;

    for (index, operand) in opcode.operands().enumerate() {
        size = operand.size.unwrap_or(size);
        let direction = operand.direction.unwrap_or(if index == 0 {
            Direction::Output
        } else {
            Direction::Input
        });

        // operand bytes are consumed even when the operand is not rendered
        let value = read_operand(memory, addr, operand.byte_count(size), &mut bytes);

        if let (Some(cpu), OperandMode::Memory, Direction::Input) = (cpu, operand.mode, direction) {
            let target = match operand.reg {
                Some(reg) => register_target(cpu, reg),
                None => value,
            };
            annotations.push(match size {
                OperandSize::Word => format!("[{:04X}]={:04X}", target, memory.get_word(target)),
                _ => format!("[{:04X}]={:02X}", target, memory.get_byte(target)),
            });
        }

        if operand.optional && style == MnemonicStyle::Intel8080 {
            continue;
        }

        let text = match operand.mode {
            OperandMode::Register => operand.reg.map_or("?", |reg| reg.name(style)).to_string(),
            OperandMode::Immediate => match size {
                OperandSize::Byte => format!("{:02X}", value),
                OperandSize::SignedByte => format!("{:04X}", value as u8 as i8 as i16 as u16),
                OperandSize::Word => format!("{:04X}", value),
            },
            OperandMode::InterruptNumber => format!("{}", (op_code >> 3) & 0x07),
            OperandMode::Memory => {
                let inner = match operand.reg {
                    Some(reg) => reg.name(style).to_string(),
                    None => format!("{:04X}", value),
                };
                match style {
                    MnemonicStyle::Intel8080 => inner,
                    MnemonicStyle::Intel8086 => format!("[{}]", inner),
                }
            }
        };
        operands.push(text);
    }

    Some(DecodedInstruction {
        addr: start,
        bytes,
        opcode,
        mnemonic: opcode.id.mnemonic(style),
        operands,
        annotations,
    })
}

/// Assembling from mnemonics is not supported; always returns no bytes.
pub fn encode_one(mnemonic: &str, operands: &[&str], addr: &Address) -> Vec<u8> {
    log::debug!("encode {} {:?} at {}: not supported", mnemonic, operands, addr);
    Vec::new()
}

fn read_operand(memory: &Memory, addr: &mut Address, count: u16, bytes: &mut Vec<u8>) -> u16 {
    let mut value = 0u16;
    for i in 0..count {
        let byte = addr.get().map_or(0xFF, |a| memory.get_byte(a));
        addr.advance(1);
        bytes.push(byte);
        value |= (byte as u16) << (8 * i);
    }
    value
}

fn register_target(cpu: &Cpu, reg: Reg) -> u16 {
    match reg {
        Reg::BC => cpu.bc(),
        Reg::DE => cpu.de(),
        Reg::SP => cpu.reg_sp,
        _ => cpu.hl(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(program: &[u8], style: MnemonicStyle) -> (DecodedInstruction, Address) {
        let mut memory = Memory::new();
        memory.load(0x100, program);
        let mut addr = Address::new(0x100);
        let decoded = decode_one(&memory, &mut addr, style, None).unwrap();
        (decoded, addr)
    }

    #[test]
    fn decodes_nop_and_jmp() {
        let (nop, next) = decode(&[0x00], MnemonicStyle::Intel8080);
        assert_eq!(nop.mnemonic, "NOP");
        assert_eq!(nop.len(), 1);
        assert_eq!(next.get(), Some(0x101));

        let (jmp, next) = decode(&[0xC3, 0x34, 0x12], MnemonicStyle::Intel8080);
        assert_eq!(jmp.len(), 3);
        assert_eq!(jmp.operands, vec!["1234"]);
        assert_eq!(next.get(), Some(0x103));
        assert_eq!(jmp.format_line(), "0100 C3 34 12  JMP    1234");
    }

    #[test]
    fn every_opcode_decodes() {
        let mut memory = Memory::new();
        for op_code in 0..=255u8 {
            memory.set_byte(0, op_code);
            let mut addr = Address::new(0);
            let decoded = decode_one(&memory, &mut addr, MnemonicStyle::Intel8080, None).unwrap();
            assert!(!decoded.mnemonic.is_empty());
            assert_eq!(decoded.len(), decoded.opcode.length());
            assert_eq!(addr.get(), Some(decoded.len()));
        }
    }

    #[test]
    fn optional_operands_depend_on_style() {
        let (lda, _) = decode(&[0x3A, 0x00, 0x20], MnemonicStyle::Intel8080);
        assert_eq!(lda.operands, vec!["2000"]);

        let (lda, _) = decode(&[0x3A, 0x00, 0x20], MnemonicStyle::Intel8086);
        assert_eq!(lda.mnemonic, "MOV");
        assert_eq!(lda.operands, vec!["AL", "[2000]"]);

        let (mov, _) = decode(&[0x7E], MnemonicStyle::Intel8086);
        assert_eq!(mov.operands, vec!["AL", "[BX]"]);
    }

    #[test]
    fn rst_renders_its_vector_and_undocumented_opcodes_are_marked() {
        let (rst, _) = decode(&[0xEF], MnemonicStyle::Intel8080);
        assert_eq!(rst.operands, vec!["5"]);

        let (alias, _) = decode(&[0xCB, 0x00, 0x00], MnemonicStyle::Intel8080);
        assert!(alias.format_line().contains("*JMP"));
    }

    #[test]
    fn live_decode_annotates_memory_inputs() {
        let mut memory = Memory::new();
        memory.load(0, &[0x7E]);
        memory.set_byte(0x4000, 0x5A);
        let mut cpu = Cpu::new();
        cpu.reg_h = 0x40;

        let mut addr = Address::new(0);
        let mov = decode_one(&memory, &mut addr, MnemonicStyle::Intel8080, Some(&cpu)).unwrap();
        assert_eq!(mov.annotations, vec!["[4000]=5A"]);
        assert!(mov.format_line().ends_with("; [4000]=5A"));
    }

    #[test]
    fn invalid_addresses_do_not_decode() {
        let memory = Memory::new();
        assert!(decode_one(&memory, &mut Address::invalid(), MnemonicStyle::Intel8080, None).is_none());
        assert!(encode_one("MVI", &["A", "1"], &Address::new(0)).is_empty());
    }
}
