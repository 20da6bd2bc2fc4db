// 8080
use crate::errors::EmulationError;
use crate::memory::MemMapped;

use std::fmt::{self, Display};

#[rustfmt::skip]
const CYCLES: [u8; 256] = [
    4, 10, 7, 5, 5, 5, 7, 4, 4, 10, 7, 5, 5, 5, 7, 4,
    4, 10, 7, 5, 5, 5, 7, 4, 4, 10, 7, 5, 5, 5, 7, 4,
    4, 10, 16, 5, 5, 5, 7, 4, 4, 10, 16, 5, 5, 5, 7, 4,
    4, 10, 13, 5, 10, 10, 10, 4, 4, 10, 13, 5, 5, 5, 7, 4,
    5, 5, 5, 5, 5, 5, 7, 5, 5, 5, 5, 5, 5, 5, 7, 5,
    5, 5, 5, 5, 5, 5, 7, 5, 5, 5, 5, 5, 5, 5, 7, 5,
    5, 5, 5, 5, 5, 5, 7, 5, 5, 5, 5, 5, 5, 5, 7, 5,
    7, 7, 7, 7, 7, 7, 7, 7, 5, 5, 5, 5, 5, 5, 7, 5,
    4, 4, 4, 4, 4, 4, 7, 4, 4, 4, 4, 4, 4, 4, 7, 4,
    4, 4, 4, 4, 4, 4, 7, 4, 4, 4, 4, 4, 4, 4, 7, 4,
    4, 4, 4, 4, 4, 4, 7, 4, 4, 4, 4, 4, 4, 4, 7, 4,
    4, 4, 4, 4, 4, 4, 7, 4, 4, 4, 4, 4, 4, 4, 7, 4,
    5, 10, 10, 10, 11, 11, 7, 11, 5, 10, 10, 10, 11, 17, 7, 11,
    5, 10, 10, 10, 11, 11, 7, 11, 5, 10, 10, 10, 11, 17, 7, 11,
    5, 10, 10, 18, 11, 11, 7, 11, 5, 5, 10, 4, 11, 17, 7, 11,
    5, 10, 10, 4, 11, 11, 7, 11, 5, 5, 10, 4, 11, 17, 7, 11,
];

// taken conditional calls and returns
const CONDITION_TAKEN_CYCLES: u8 = 6;
const INTERRUPT_CYCLES: u8 = 11;
const HALT_CYCLES: u8 = 4;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct StatusReg {
    pub sign_flag: bool,
    pub zero_flag: bool,
    pub aux_carry_flag: bool,
    pub parity_flag: bool,
    pub carry_flag: bool,
}

impl StatusReg {
    // S Z 0 AC 0 P 1 CY
    pub fn byte(&self) -> u8 {
        let mut byte = 0u8;

        byte = byte | self.sign_flag as u8;
        byte = (byte << 1) | self.zero_flag as u8;
        byte = byte << 1;
        byte = (byte << 1) | self.aux_carry_flag as u8;
        byte = byte << 1;
        byte = (byte << 1) | self.parity_flag as u8;
        byte = (byte << 1) | 1;
        byte = (byte << 1) | self.carry_flag as u8;

        byte
    }

    pub fn set_byte(&mut self, byte: u8) {
        self.carry_flag = byte & 0b0000_0001 != 0;
        self.parity_flag = byte & 0b0000_0100 != 0;
        self.aux_carry_flag = byte & 0b0001_0000 != 0;
        self.zero_flag = byte & 0b0100_0000 != 0;
        self.sign_flag = byte & 0b1000_0000 != 0;
    }

    pub fn toggle_zero_sign_parity(&mut self, byte: u8) {
        self.zero_flag = byte == 0;
        self.sign_flag = byte & 0x80 != 0;
        self.parity_flag = byte.count_ones() % 2 == 0;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Register {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    F,
    BC,
    DE,
    HL,
    PSW,
    SP,
    PC,
}

impl Register {
    pub fn parse(name: &str) -> Option<Register> {
        use self::Register::*;

        let reg = match name.to_ascii_uppercase().as_str() {
            "A" => A,
            "B" => B,
            "C" => C,
            "D" => D,
            "E" => E,
            "H" => H,
            "L" => L,
            "F" => F,
            "BC" => BC,
            "DE" => DE,
            "HL" => HL,
            "PSW" => PSW,
            "SP" => SP,
            "PC" => PC,
            _ => return None,
        };
        Some(reg)
    }

    pub fn is_byte(self) -> bool {
        use self::Register::*;

        matches!(self, A | B | C | D | E | H | L | F)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flag {
    Carry,
    Parity,
    AuxCarry,
    Zero,
    Sign,
    InterruptEnable,
}

impl Flag {
    pub fn parse(name: &str) -> Option<Flag> {
        let flag = match name.to_ascii_uppercase().as_str() {
            "CF" => Flag::Carry,
            "PF" => Flag::Parity,
            "HF" => Flag::AuxCarry,
            "ZF" => Flag::Zero,
            "SF" => Flag::Sign,
            "IF" => Flag::InterruptEnable,
            _ => return None,
        };
        Some(flag)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineState {
    Ready,
    Running,
    Error,
    PoweredOff,
}

#[derive(Debug, Clone)]
pub struct Cpu {
    pub reg_a: u8,
    pub reg_b: u8,
    pub reg_c: u8,
    pub reg_d: u8,
    pub reg_e: u8,
    pub reg_h: u8,
    pub reg_l: u8,

    pub reg_status: StatusReg,

    pub reg_sp: u16,
    pub reg_pc: u16,

    pub interrupts_enabled: bool,
    pub halted: bool,
    pending_interrupt: Option<u8>,

    pub cycle_count: u64,
    pub state: EngineState,
    // multiplier applied by hosts that pace execution
    pub speed: u32,
}

impl Default for Cpu {
    fn default() -> Cpu {
        Cpu::new()
    }
}

impl Cpu {
    pub fn new() -> Cpu {
        Cpu {
            reg_a: 0,
            reg_b: 0,
            reg_c: 0,
            reg_d: 0,
            reg_e: 0,
            reg_h: 0,
            reg_l: 0,
            reg_status: StatusReg::default(),
            reg_sp: 0,
            reg_pc: 0,
            interrupts_enabled: false,
            halted: false,
            pending_interrupt: None,
            cycle_count: 0,
            state: EngineState::Ready,
            speed: 1,
        }
    }

    pub fn reset(&mut self) {
        let state = if self.state == EngineState::PoweredOff {
            EngineState::PoweredOff
        } else {
            EngineState::Ready
        };
        let speed = self.speed;

        *self = Cpu::new();
        self.state = state;
        self.speed = speed;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn is_powered(&self) -> bool {
        self.state != EngineState::PoweredOff
    }

    /// Requests RST `vector`; taken before the next instruction when interrupts are enabled.
    pub fn interrupt(&mut self, vector: u8) {
        self.pending_interrupt = Some(vector & 0x07);
    }

    pub fn step<M: MemMapped + ?Sized>(&mut self, bus: &mut M) -> Result<u8, EmulationError> {
        if self.state == EngineState::PoweredOff {
            return Err(EmulationError::PoweredOff);
        }

        if self.interrupts_enabled {
            if let Some(vector) = self.pending_interrupt.take() {
                self.interrupts_enabled = false;
                self.halted = false;
                self.push(bus, self.reg_pc);
                self.reg_pc = (vector as u16) << 3;
                self.cycle_count += INTERRUPT_CYCLES as u64;
                return Ok(INTERRUPT_CYCLES);
            }
        }

        if self.halted {
            self.cycle_count += HALT_CYCLES as u64;
            return Ok(HALT_CYCLES);
        }

        let op_code = bus.fetch(self.reg_pc)?;
        self.reg_pc = self.reg_pc.wrapping_add(1);

        let cycles = self.execute_instruction(op_code, bus);
        self.cycle_count += cycles as u64;

        Ok(cycles)
    }

    fn execute_instruction<M: MemMapped + ?Sized>(&mut self, op_code: u8, bus: &mut M) -> u8 {
        let mut cycles = CYCLES[op_code as usize];
        let y = (op_code >> 3) & 0x07;
        let z = op_code & 0x07;

        match op_code {
            0x00 | 0x08 | 0x10 | 0x18 | 0x20 | 0x28 | 0x30 | 0x38 => {}
            0x76 => self.halted = true,
            //
            // 16-bit loads and stores
            //
            0x01 | 0x11 | 0x21 | 0x31 => {
                let word = self.read_imm16(bus);
                self.set_pair(y >> 1, word);
            }
            0x02 => bus.write(self.bc(), self.reg_a),
            0x12 => bus.write(self.de(), self.reg_a),
            0x0A => self.reg_a = bus.read(self.bc()),
            0x1A => self.reg_a = bus.read(self.de()),
            0x22 => {
                let addr = self.read_imm16(bus);
                bus.write_word(addr, self.hl());
            }
            0x2A => {
                let addr = self.read_imm16(bus);
                let word = bus.read_word(addr);
                self.set_hl(word);
            }
            0x32 => {
                let addr = self.read_imm16(bus);
                bus.write(addr, self.reg_a);
            }
            0x3A => {
                let addr = self.read_imm16(bus);
                self.reg_a = bus.read(addr);
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                let word = self.get_pair(y >> 1).wrapping_add(1);
                self.set_pair(y >> 1, word);
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let word = self.get_pair(y >> 1).wrapping_sub(1);
                self.set_pair(y >> 1, word);
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                let result = self.hl() as u32 + self.get_pair(y >> 1) as u32;
                self.reg_status.carry_flag = result > 0xFFFF;
                self.set_hl(result as u16);
            }
            //
            // accumulator and flag instructions
            //
            0x07 => {
                let carry = self.reg_a >> 7;
                self.reg_a = (self.reg_a << 1) | carry;
                self.reg_status.carry_flag = carry == 1;
            }
            0x0F => {
                let carry = self.reg_a & 1;
                self.reg_a = (self.reg_a >> 1) | (carry << 7);
                self.reg_status.carry_flag = carry == 1;
            }
            0x17 => {
                let carry = self.reg_a >> 7;
                self.reg_a = (self.reg_a << 1) | self.reg_status.carry_flag as u8;
                self.reg_status.carry_flag = carry == 1;
            }
            0x1F => {
                let carry = self.reg_a & 1;
                self.reg_a = (self.reg_a >> 1) | ((self.reg_status.carry_flag as u8) << 7);
                self.reg_status.carry_flag = carry == 1;
            }
            0x27 => self.instr_daa(),
            0x2F => self.reg_a = !self.reg_a,
            0x37 => self.reg_status.carry_flag = true,
            0x3F => self.reg_status.carry_flag = !self.reg_status.carry_flag,
            //
            // 8-bit register instructions
            //
            op if op & 0xC7 == 0x04 => {
                let result = self.get_reg(y, bus).wrapping_add(1);
                self.reg_status.aux_carry_flag = result & 0x0F == 0;
                self.reg_status.toggle_zero_sign_parity(result);
                self.set_reg(y, result, bus);
            }
            op if op & 0xC7 == 0x05 => {
                let result = self.get_reg(y, bus).wrapping_sub(1);
                self.reg_status.aux_carry_flag = result & 0x0F != 0x0F;
                self.reg_status.toggle_zero_sign_parity(result);
                self.set_reg(y, result, bus);
            }
            op if op & 0xC7 == 0x06 => {
                let byte = self.read_imm8(bus);
                self.set_reg(y, byte, bus);
            }
            0x40..=0x7F => {
                let byte = self.get_reg(z, bus);
                self.set_reg(y, byte, bus);
            }
            0x80..=0xBF => {
                let byte = self.get_reg(z, bus);
                self.instr_alu(y, byte);
            }
            //
            // jump, call and return instructions
            //
            0xC3 | 0xCB => self.reg_pc = self.read_imm16(bus),
            0xC9 | 0xD9 => self.reg_pc = self.pop(bus),
            0xCD | 0xDD | 0xED | 0xFD => {
                let addr = self.read_imm16(bus);
                self.push(bus, self.reg_pc);
                self.reg_pc = addr;
            }
            0xE9 => self.reg_pc = self.hl(),
            op if op & 0xC7 == 0xC0 => {
                if self.condition(y) {
                    self.reg_pc = self.pop(bus);
                    cycles += CONDITION_TAKEN_CYCLES;
                }
            }
            op if op & 0xC7 == 0xC2 => {
                let addr = self.read_imm16(bus);
                if self.condition(y) {
                    self.reg_pc = addr;
                }
            }
            op if op & 0xC7 == 0xC4 => {
                let addr = self.read_imm16(bus);
                if self.condition(y) {
                    self.push(bus, self.reg_pc);
                    self.reg_pc = addr;
                    cycles += CONDITION_TAKEN_CYCLES;
                }
            }
            op if op & 0xC7 == 0xC7 => {
                self.push(bus, self.reg_pc);
                self.reg_pc = (op & 0x38) as u16;
            }
            //
            // stack instructions
            //
            op if op & 0xCF == 0xC1 => {
                let word = self.pop(bus);
                self.set_stack_pair(y >> 1, word);
            }
            op if op & 0xCF == 0xC5 => {
                let word = self.get_stack_pair(y >> 1);
                self.push(bus, word);
            }
            0xE3 => {
                let word = bus.read_word(self.reg_sp);
                bus.write_word(self.reg_sp, self.hl());
                self.set_hl(word);
            }
            0xF9 => self.reg_sp = self.hl(),
            0xEB => {
                std::mem::swap(&mut self.reg_d, &mut self.reg_h);
                std::mem::swap(&mut self.reg_e, &mut self.reg_l);
            }
            //
            // immediate ALU instructions
            //
            op if op & 0xC7 == 0xC6 => {
                let byte = self.read_imm8(bus);
                self.instr_alu(y, byte);
            }
            //
            // I/O and interrupt control
            //
            0xD3 => {
                let port = self.read_imm8(bus);
                bus.output(port, self.reg_a);
            }
            0xDB => {
                let port = self.read_imm8(bus);
                self.reg_a = bus.input(port);
            }
            0xF3 => self.interrupts_enabled = false,
            0xFB => self.interrupts_enabled = true,
            _ => unreachable!("opcode 0x{:02X} has no handler", op_code),
        }

        cycles
    }

    fn instr_alu(&mut self, op: u8, value: u8) {
        let a = self.reg_a;
        let carry_in = self.reg_status.carry_flag as u8;

        let result = match op {
            // ADD, ADC
            0 | 1 => {
                let carry = if op == 1 { carry_in } else { 0 };
                let sum = a as u16 + value as u16 + carry as u16;
                self.reg_status.aux_carry_flag = (a & 0x0F) + (value & 0x0F) + carry > 0x0F;
                self.reg_status.carry_flag = sum > 0xFF;
                sum as u8
            }
            // SUB, SBB, CMP
            2 | 3 | 7 => {
                let borrow = if op == 3 { carry_in } else { 0 } as i16;
                let diff = a as i16 - value as i16 - borrow;
                self.reg_status.aux_carry_flag = (a & 0x0F) as i16 - (value & 0x0F) as i16 - borrow >= 0;
                self.reg_status.carry_flag = diff < 0;
                diff as u8
            }
            // ANA
            4 => {
                self.reg_status.aux_carry_flag = (a | value) & 0x08 != 0;
                self.reg_status.carry_flag = false;
                a & value
            }
            // XRA
            5 => {
                self.reg_status.aux_carry_flag = false;
                self.reg_status.carry_flag = false;
                a ^ value
            }
            // ORA
            _ => {
                self.reg_status.aux_carry_flag = false;
                self.reg_status.carry_flag = false;
                a | value
            }
        };

        self.reg_status.toggle_zero_sign_parity(result);
        if op != 7 {
            self.reg_a = result;
        }
    }

    fn instr_daa(&mut self) {
        let low = self.reg_a & 0x0F;
        let high = self.reg_a >> 4;
        let mut carry = self.reg_status.carry_flag;
        let mut correction = 0u8;

        if self.reg_status.aux_carry_flag || low > 9 {
            correction |= 0x06;
        }
        if carry || high > 9 || (high >= 9 && low > 9) {
            correction |= 0x60;
            carry = true;
        }

        self.instr_alu(0, correction);
        self.reg_status.carry_flag = carry;
    }

    fn condition(&self, code: u8) -> bool {
        match code {
            0 => !self.reg_status.zero_flag,
            1 => self.reg_status.zero_flag,
            2 => !self.reg_status.carry_flag,
            3 => self.reg_status.carry_flag,
            4 => !self.reg_status.parity_flag,
            5 => self.reg_status.parity_flag,
            6 => !self.reg_status.sign_flag,
            _ => self.reg_status.sign_flag,
        }
    }

    //
    // operand helpers
    //

    fn read_imm8<M: MemMapped + ?Sized>(&mut self, bus: &mut M) -> u8 {
        let byte = bus.read(self.reg_pc);
        self.reg_pc = self.reg_pc.wrapping_add(1);
        byte
    }

    fn read_imm16<M: MemMapped + ?Sized>(&mut self, bus: &mut M) -> u16 {
        let word = bus.read_word(self.reg_pc);
        self.reg_pc = self.reg_pc.wrapping_add(2);
        word
    }

    fn push<M: MemMapped + ?Sized>(&mut self, bus: &mut M, word: u16) {
        self.reg_sp = self.reg_sp.wrapping_sub(2);
        bus.write_word(self.reg_sp, word);
    }

    fn pop<M: MemMapped + ?Sized>(&mut self, bus: &mut M) -> u16 {
        let word = bus.read_word(self.reg_sp);
        self.reg_sp = self.reg_sp.wrapping_add(2);
        word
    }

    // B C D E H L M A
    fn get_reg<M: MemMapped + ?Sized>(&mut self, code: u8, bus: &mut M) -> u8 {
        match code {
            0 => self.reg_b,
            1 => self.reg_c,
            2 => self.reg_d,
            3 => self.reg_e,
            4 => self.reg_h,
            5 => self.reg_l,
            6 => bus.read(self.hl()),
            _ => self.reg_a,
        }
    }

    fn set_reg<M: MemMapped + ?Sized>(&mut self, code: u8, byte: u8, bus: &mut M) {
        match code {
            0 => self.reg_b = byte,
            1 => self.reg_c = byte,
            2 => self.reg_d = byte,
            3 => self.reg_e = byte,
            4 => self.reg_h = byte,
            5 => self.reg_l = byte,
            6 => bus.write(self.hl(), byte),
            _ => self.reg_a = byte,
        }
    }

    // BC DE HL SP
    fn get_pair(&self, code: u8) -> u16 {
        match code {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.reg_sp,
        }
    }

    fn set_pair(&mut self, code: u8, word: u16) {
        match code {
            0 => self.set_register(Register::BC, word),
            1 => self.set_register(Register::DE, word),
            2 => self.set_hl(word),
            _ => self.reg_sp = word,
        }
    }

    // BC DE HL PSW
    fn get_stack_pair(&self, code: u8) -> u16 {
        match code {
            3 => self.get_register(Register::PSW),
            _ => self.get_pair(code),
        }
    }

    fn set_stack_pair(&mut self, code: u8, word: u16) {
        match code {
            3 => self.set_register(Register::PSW, word),
            _ => self.set_pair(code, word),
        }
    }

    #[inline]
    pub fn bc(&self) -> u16 {
        ((self.reg_b as u16) << 8) | self.reg_c as u16
    }

    #[inline]
    pub fn de(&self) -> u16 {
        ((self.reg_d as u16) << 8) | self.reg_e as u16
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        ((self.reg_h as u16) << 8) | self.reg_l as u16
    }

    fn set_hl(&mut self, word: u16) {
        self.reg_h = (word >> 8) as u8;
        self.reg_l = word as u8;
    }

    //
    // debugger access
    //

    pub fn get_register(&self, reg: Register) -> u16 {
        match reg {
            Register::A => self.reg_a as u16,
            Register::B => self.reg_b as u16,
            Register::C => self.reg_c as u16,
            Register::D => self.reg_d as u16,
            Register::E => self.reg_e as u16,
            Register::H => self.reg_h as u16,
            Register::L => self.reg_l as u16,
            Register::F => self.reg_status.byte() as u16,
            Register::BC => self.bc(),
            Register::DE => self.de(),
            Register::HL => self.hl(),
            Register::PSW => ((self.reg_a as u16) << 8) | self.reg_status.byte() as u16,
            Register::SP => self.reg_sp,
            Register::PC => self.reg_pc,
        }
    }

    pub fn set_register(&mut self, reg: Register, value: u16) {
        let byte = value as u8;
        let high = (value >> 8) as u8;

        match reg {
            Register::A => self.reg_a = byte,
            Register::B => self.reg_b = byte,
            Register::C => self.reg_c = byte,
            Register::D => self.reg_d = byte,
            Register::E => self.reg_e = byte,
            Register::H => self.reg_h = byte,
            Register::L => self.reg_l = byte,
            Register::F => self.reg_status.set_byte(byte),
            Register::BC => {
                self.reg_b = high;
                self.reg_c = byte;
            }
            Register::DE => {
                self.reg_d = high;
                self.reg_e = byte;
            }
            Register::HL => self.set_hl(value),
            Register::PSW => {
                self.reg_a = high;
                self.reg_status.set_byte(byte);
            }
            Register::SP => self.reg_sp = value,
            Register::PC => self.reg_pc = value,
        }
    }

    pub fn get_flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Carry => self.reg_status.carry_flag,
            Flag::Parity => self.reg_status.parity_flag,
            Flag::AuxCarry => self.reg_status.aux_carry_flag,
            Flag::Zero => self.reg_status.zero_flag,
            Flag::Sign => self.reg_status.sign_flag,
            Flag::InterruptEnable => self.interrupts_enabled,
        }
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::Carry => self.reg_status.carry_flag = value,
            Flag::Parity => self.reg_status.parity_flag = value,
            Flag::AuxCarry => self.reg_status.aux_carry_flag = value,
            Flag::Zero => self.reg_status.zero_flag = value,
            Flag::Sign => self.reg_status.sign_flag = value,
            Flag::InterruptEnable => self.interrupts_enabled = value,
        }
    }
}

impl Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "A={:02X} BC={:04X} DE={:04X} HL={:04X} SP={:04X} PC={:04X} S{} Z{} A{} P{} C{} I{}",
            self.reg_a,
            self.bc(),
            self.de(),
            self.hl(),
            self.reg_sp,
            self.reg_pc,
            self.reg_status.sign_flag as u8,
            self.reg_status.zero_flag as u8,
            self.reg_status.aux_carry_flag as u8,
            self.reg_status.parity_flag as u8,
            self.reg_status.carry_flag as u8,
            self.interrupts_enabled as u8,
        )
    }
}
