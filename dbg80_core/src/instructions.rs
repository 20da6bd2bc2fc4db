// Intel 8080 opcode table.
//
// Every opcode maps to one descriptor. Operand rendering is driven entirely by
// the operand types, so the same table serves both mnemonic styles.

use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum InstructionId {
    ACI, ADC, ADD, ADI, ANA, ANI, CALL, CC, CM, CMA,
    CMC, CMP, CNC, CNZ, CP, CPE, CPI, CPO, CZ, DAA,
    DAD, DCR, DCX, DI, EI, HLT, IN, INR, INX, JC,
    JM, JMP, JNC, JNZ, JP, JPE, JPO, JZ, LDA, LDAX,
    LHLD, LXI, MOV, MVI, NOP, ORA, ORI, OUT, PCHL, POP,
    PUSH, RAL, RAR, RC, RET, RLC, RM, RNC, RNZ, RP,
    RPE, RPO, RRC, RST, RZ, SBB, SBI, SHLD, SPHL, STA,
    STAX, STC, SUB, SUI, XCHG, XRA, XRI, XTHL,
}

pub const INSTRUCTION_COUNT: usize = InstructionId::XTHL as usize + 1;

static MNEMONICS_8080: [&str; INSTRUCTION_COUNT] = [
    "ACI", "ADC", "ADD", "ADI", "ANA", "ANI", "CALL", "CC", "CM", "CMA",
    "CMC", "CMP", "CNC", "CNZ", "CP", "CPE", "CPI", "CPO", "CZ", "DAA",
    "DAD", "DCR", "DCX", "DI", "EI", "HLT", "IN", "INR", "INX", "JC",
    "JM", "JMP", "JNC", "JNZ", "JP", "JPE", "JPO", "JZ", "LDA", "LDAX",
    "LHLD", "LXI", "MOV", "MVI", "NOP", "ORA", "ORI", "OUT", "PCHL", "POP",
    "PUSH", "RAL", "RAR", "RC", "RET", "RLC", "RM", "RNC", "RNZ", "RP",
    "RPE", "RPO", "RRC", "RST", "RZ", "SBB", "SBI", "SHLD", "SPHL", "STA",
    "STAX", "STC", "SUB", "SUI", "XCHG", "XRA", "XRI", "XTHL",
];

static MNEMONICS_8086: [&str; INSTRUCTION_COUNT] = [
    "ADC", "ADC", "ADD", "ADD", "AND", "AND", "CALL", "CALLC", "CALLS", "NOT",
    "CMC", "CMP", "CALLNC", "CALLNZ", "CALLNS", "CALLP", "CMP", "CALLNP", "CALLZ", "DAA",
    "ADD", "DEC", "DEC", "CLI", "STI", "HLT", "IN", "INC", "INC", "JC",
    "JS", "JMP", "JNC", "JNZ", "JNS", "JP", "JNP", "JZ", "MOV", "MOV",
    "MOV", "MOV", "MOV", "MOV", "NOP", "OR", "OR", "OUT", "JMP", "POP",
    "PUSH", "RCL", "RCR", "RETC", "RET", "ROL", "RETS", "RETNC", "RETNZ", "RETNS",
    "RETP", "RETNP", "ROR", "INT", "RETZ", "SBB", "SBB", "MOV", "MOV", "MOV",
    "MOV", "STC", "SUB", "SUB", "XCHG", "XOR", "XOR", "XCHG",
];

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MnemonicStyle {
    #[serde(rename = "8080")]
    Intel8080,
    #[serde(rename = "8086")]
    Intel8086,
}

impl Default for MnemonicStyle {
    fn default() -> Self {
        MnemonicStyle::Intel8080
    }
}

impl InstructionId {
    pub fn mnemonic(self, style: MnemonicStyle) -> &'static str {
        match style {
            MnemonicStyle::Intel8080 => MNEMONICS_8080[self as usize],
            MnemonicStyle::Intel8086 => MNEMONICS_8086[self as usize],
        }
    }

    pub fn is_call(self) -> bool {
        matches!(
            self,
            InstructionId::CALL
                | InstructionId::CC
                | InstructionId::CNC
                | InstructionId::CZ
                | InstructionId::CNZ
                | InstructionId::CP
                | InstructionId::CM
                | InstructionId::CPE
                | InstructionId::CPO
                | InstructionId::RST
        )
    }

    pub fn is_return(self) -> bool {
        matches!(
            self,
            InstructionId::RET
                | InstructionId::RC
                | InstructionId::RNC
                | InstructionId::RZ
                | InstructionId::RNZ
                | InstructionId::RP
                | InstructionId::RM
                | InstructionId::RPE
                | InstructionId::RPO
        )
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic(MnemonicStyle::Intel8080))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reg {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    M,
    BC,
    DE,
    HL,
    SP,
    PSW,
}

impl Reg {
    pub fn name(self, style: MnemonicStyle) -> &'static str {
        use self::Reg::*;

        match style {
            MnemonicStyle::Intel8080 => match self {
                A => "A",
                B | BC => "B",
                C => "C",
                D | DE => "D",
                E => "E",
                H | HL => "H",
                L => "L",
                M => "M",
                SP => "SP",
                PSW => "PSW",
            },
            MnemonicStyle::Intel8086 => match self {
                A => "AL",
                B => "CH",
                C => "CL",
                D => "DH",
                E => "DL",
                H => "BH",
                L => "BL",
                M | HL => "BX",
                BC => "CX",
                DE => "DX",
                SP => "SP",
                PSW => "AX",
            },
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OperandSize {
    Byte,
    SignedByte,
    Word,
}

impl OperandSize {
    pub fn byte_count(self) -> u16 {
        match self {
            OperandSize::Byte | OperandSize::SignedByte => 1,
            OperandSize::Word => 2,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OperandMode {
    Register,
    Immediate,
    InterruptNumber,
    // through a register when `reg` is set, otherwise through a 16-bit address
    Memory,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OperandType {
    pub size: Option<OperandSize>,
    pub mode: OperandMode,
    pub reg: Option<Reg>,
    pub direction: Option<Direction>,
    // hidden in the terse 8080 style
    pub optional: bool,
}

impl OperandType {
    pub const fn reg(reg: Reg) -> OperandType {
        OperandType {
            size: None,
            mode: OperandMode::Register,
            reg: Some(reg),
            direction: None,
            optional: false,
        }
    }

    pub const fn imm() -> OperandType {
        OperandType {
            size: None,
            mode: OperandMode::Immediate,
            reg: None,
            direction: None,
            optional: false,
        }
    }

    pub const fn direct() -> OperandType {
        OperandType {
            size: None,
            mode: OperandMode::Memory,
            reg: None,
            direction: None,
            optional: false,
        }
    }

    pub const fn interrupt() -> OperandType {
        OperandType {
            size: None,
            mode: OperandMode::InterruptNumber,
            reg: None,
            direction: None,
            optional: false,
        }
    }

    pub const fn byte(self) -> OperandType {
        OperandType { size: Some(OperandSize::Byte), ..self }
    }

    pub const fn signed_byte(self) -> OperandType {
        OperandType { size: Some(OperandSize::SignedByte), ..self }
    }

    pub const fn word(self) -> OperandType {
        OperandType { size: Some(OperandSize::Word), ..self }
    }

    pub const fn mem(self) -> OperandType {
        OperandType { mode: OperandMode::Memory, ..self }
    }

    pub const fn input(self) -> OperandType {
        OperandType { direction: Some(Direction::Input), ..self }
    }

    pub const fn output(self) -> OperandType {
        OperandType { direction: Some(Direction::Output), ..self }
    }

    pub const fn optional(self) -> OperandType {
        OperandType { optional: true, ..self }
    }

    /// Bytes this operand occupies in the instruction stream.
    pub fn byte_count(&self, size: OperandSize) -> u16 {
        match self.mode {
            OperandMode::Immediate => size.byte_count(),
            OperandMode::Memory if self.reg.is_none() => 2,
            _ => 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub id: InstructionId,
    pub operands: [Option<OperandType>; 3],
    // undocumented aliases have no operand of their own to carry the marker
    pub undocumented: bool,
}

impl Opcode {
    pub fn operands(&self) -> impl Iterator<Item = &OperandType> {
        self.operands.iter().filter_map(|o| o.as_ref())
    }

    /// Total instruction length, opcode byte included.
    pub fn length(&self) -> u16 {
        let mut length = 1;
        let mut size = OperandSize::Byte;
        for operand in self.operands() {
            size = operand.size.unwrap_or(size);
            length += operand.byte_count(size);
        }
        length
    }
}

const fn op0(id: InstructionId) -> Opcode {
    Opcode { id, operands: [None, None, None], undocumented: false }
}

const fn op1(id: InstructionId, a: OperandType) -> Opcode {
    Opcode { id, operands: [Some(a), None, None], undocumented: false }
}

const fn op2(id: InstructionId, a: OperandType, b: OperandType) -> Opcode {
    Opcode { id, operands: [Some(a), Some(b), None], undocumented: false }
}

const fn undoc0(id: InstructionId) -> Opcode {
    Opcode { id, operands: [None, None, None], undocumented: true }
}

const fn undoc1(id: InstructionId, a: OperandType) -> Opcode {
    Opcode { id, operands: [Some(a), None, None], undocumented: true }
}

const RA: OperandType = OperandType::reg(Reg::A).byte();
const RB: OperandType = OperandType::reg(Reg::B).byte();
const RC: OperandType = OperandType::reg(Reg::C).byte();
const RD: OperandType = OperandType::reg(Reg::D).byte();
const RE: OperandType = OperandType::reg(Reg::E).byte();
const RH: OperandType = OperandType::reg(Reg::H).byte();
const RL: OperandType = OperandType::reg(Reg::L).byte();
const RM: OperandType = OperandType::reg(Reg::M).byte().mem();

const RBC: OperandType = OperandType::reg(Reg::BC).word();
const RDE: OperandType = OperandType::reg(Reg::DE).word();
const RHL: OperandType = OperandType::reg(Reg::HL).word();
const RSP: OperandType = OperandType::reg(Reg::SP).word();
const RPSW: OperandType = OperandType::reg(Reg::PSW).word();

const MBC: OperandType = OperandType::reg(Reg::BC).byte().mem();
const MDE: OperandType = OperandType::reg(Reg::DE).byte().mem();

const A_OPT: OperandType = RA.optional();
const HL_OPT: OperandType = RHL.optional();
const DE_OPT: OperandType = RDE.optional();
const SP_OPT: OperandType = RSP.optional();
const MSP_OPT: OperandType = OperandType::reg(Reg::SP).word().mem().optional();

// size comes from the preceding operand
const IMM: OperandType = OperandType::imm();
const D16: OperandType = OperandType::imm().word();
const PORT: OperandType = OperandType::imm().byte();
const DIRECT_BYTE: OperandType = OperandType::direct().byte();
const DIRECT_WORD: OperandType = OperandType::direct().word();
const INT: OperandType = OperandType::interrupt();

pub static OPCODE_TABLE: [Opcode; 256] = [
    op0(InstructionId::NOP),                                // 0x00
    op2(InstructionId::LXI, RBC, IMM),                      // 0x01
    op2(InstructionId::STAX, MBC, A_OPT),                   // 0x02
    op1(InstructionId::INX, RBC),                           // 0x03
    op1(InstructionId::INR, RB),                            // 0x04
    op1(InstructionId::DCR, RB),                            // 0x05
    op2(InstructionId::MVI, RB, IMM),                       // 0x06
    op1(InstructionId::RLC, A_OPT),                         // 0x07
    undoc0(InstructionId::NOP),                             // 0x08
    op2(InstructionId::DAD, HL_OPT, RBC),                   // 0x09
    op2(InstructionId::LDAX, A_OPT, MBC),                   // 0x0A
    op1(InstructionId::DCX, RBC),                           // 0x0B
    op1(InstructionId::INR, RC),                            // 0x0C
    op1(InstructionId::DCR, RC),                            // 0x0D
    op2(InstructionId::MVI, RC, IMM),                       // 0x0E
    op1(InstructionId::RRC, A_OPT),                         // 0x0F
    undoc0(InstructionId::NOP),                             // 0x10
    op2(InstructionId::LXI, RDE, IMM),                      // 0x11
    op2(InstructionId::STAX, MDE, A_OPT),                   // 0x12
    op1(InstructionId::INX, RDE),                           // 0x13
    op1(InstructionId::INR, RD),                            // 0x14
    op1(InstructionId::DCR, RD),                            // 0x15
    op2(InstructionId::MVI, RD, IMM),                       // 0x16
    op1(InstructionId::RAL, A_OPT),                         // 0x17
    undoc0(InstructionId::NOP),                             // 0x18
    op2(InstructionId::DAD, HL_OPT, RDE),                   // 0x19
    op2(InstructionId::LDAX, A_OPT, MDE),                   // 0x1A
    op1(InstructionId::DCX, RDE),                           // 0x1B
    op1(InstructionId::INR, RE),                            // 0x1C
    op1(InstructionId::DCR, RE),                            // 0x1D
    op2(InstructionId::MVI, RE, IMM),                       // 0x1E
    op1(InstructionId::RAR, A_OPT),                         // 0x1F
    undoc0(InstructionId::NOP),                             // 0x20
    op2(InstructionId::LXI, RHL, IMM),                      // 0x21
    op2(InstructionId::SHLD, DIRECT_WORD, HL_OPT),          // 0x22
    op1(InstructionId::INX, RHL),                           // 0x23
    op1(InstructionId::INR, RH),                            // 0x24
    op1(InstructionId::DCR, RH),                            // 0x25
    op2(InstructionId::MVI, RH, IMM),                       // 0x26
    op0(InstructionId::DAA),                                // 0x27
    undoc0(InstructionId::NOP),                             // 0x28
    op2(InstructionId::DAD, HL_OPT, RHL),                   // 0x29
    op2(InstructionId::LHLD, HL_OPT, DIRECT_WORD),          // 0x2A
    op1(InstructionId::DCX, RHL),                           // 0x2B
    op1(InstructionId::INR, RL),                            // 0x2C
    op1(InstructionId::DCR, RL),                            // 0x2D
    op2(InstructionId::MVI, RL, IMM),                       // 0x2E
    op1(InstructionId::CMA, A_OPT),                         // 0x2F
    undoc0(InstructionId::NOP),                             // 0x30
    op2(InstructionId::LXI, RSP, IMM),                      // 0x31
    op2(InstructionId::STA, DIRECT_BYTE, A_OPT),            // 0x32
    op1(InstructionId::INX, RSP),                           // 0x33
    op1(InstructionId::INR, RM),                            // 0x34
    op1(InstructionId::DCR, RM),                            // 0x35
    op2(InstructionId::MVI, RM, IMM),                       // 0x36
    op0(InstructionId::STC),                                // 0x37
    undoc0(InstructionId::NOP),                             // 0x38
    op2(InstructionId::DAD, HL_OPT, RSP),                   // 0x39
    op2(InstructionId::LDA, A_OPT, DIRECT_BYTE),            // 0x3A
    op1(InstructionId::DCX, RSP),                           // 0x3B
    op1(InstructionId::INR, RA),                            // 0x3C
    op1(InstructionId::DCR, RA),                            // 0x3D
    op2(InstructionId::MVI, RA, IMM),                       // 0x3E
    op0(InstructionId::CMC),                                // 0x3F
    op2(InstructionId::MOV, RB, RB),                        // 0x40
    op2(InstructionId::MOV, RB, RC),                        // 0x41
    op2(InstructionId::MOV, RB, RD),                        // 0x42
    op2(InstructionId::MOV, RB, RE),                        // 0x43
    op2(InstructionId::MOV, RB, RH),                        // 0x44
    op2(InstructionId::MOV, RB, RL),                        // 0x45
    op2(InstructionId::MOV, RB, RM),                        // 0x46
    op2(InstructionId::MOV, RB, RA),                        // 0x47
    op2(InstructionId::MOV, RC, RB),                        // 0x48
    op2(InstructionId::MOV, RC, RC),                        // 0x49
    op2(InstructionId::MOV, RC, RD),                        // 0x4A
    op2(InstructionId::MOV, RC, RE),                        // 0x4B
    op2(InstructionId::MOV, RC, RH),                        // 0x4C
    op2(InstructionId::MOV, RC, RL),                        // 0x4D
    op2(InstructionId::MOV, RC, RM),                        // 0x4E
    op2(InstructionId::MOV, RC, RA),                        // 0x4F
    op2(InstructionId::MOV, RD, RB),                        // 0x50
    op2(InstructionId::MOV, RD, RC),                        // 0x51
    op2(InstructionId::MOV, RD, RD),                        // 0x52
    op2(InstructionId::MOV, RD, RE),                        // 0x53
    op2(InstructionId::MOV, RD, RH),                        // 0x54
    op2(InstructionId::MOV, RD, RL),                        // 0x55
    op2(InstructionId::MOV, RD, RM),                        // 0x56
    op2(InstructionId::MOV, RD, RA),                        // 0x57
    op2(InstructionId::MOV, RE, RB),                        // 0x58
    op2(InstructionId::MOV, RE, RC),                        // 0x59
    op2(InstructionId::MOV, RE, RD),                        // 0x5A
    op2(InstructionId::MOV, RE, RE),                        // 0x5B
    op2(InstructionId::MOV, RE, RH),                        // 0x5C
    op2(InstructionId::MOV, RE, RL),                        // 0x5D
    op2(InstructionId::MOV, RE, RM),                        // 0x5E
    op2(InstructionId::MOV, RE, RA),                        // 0x5F
    op2(InstructionId::MOV, RH, RB),                        // 0x60
    op2(InstructionId::MOV, RH, RC),                        // 0x61
    op2(InstructionId::MOV, RH, RD),                        // 0x62
    op2(InstructionId::MOV, RH, RE),                        // 0x63
    op2(InstructionId::MOV, RH, RH),                        // 0x64
    op2(InstructionId::MOV, RH, RL),                        // 0x65
    op2(InstructionId::MOV, RH, RM),                        // 0x66
    op2(InstructionId::MOV, RH, RA),                        // 0x67
    op2(InstructionId::MOV, RL, RB),                        // 0x68
    op2(InstructionId::MOV, RL, RC),                        // 0x69
    op2(InstructionId::MOV, RL, RD),                        // 0x6A
    op2(InstructionId::MOV, RL, RE),                        // 0x6B
    op2(InstructionId::MOV, RL, RH),                        // 0x6C
    op2(InstructionId::MOV, RL, RL),                        // 0x6D
    op2(InstructionId::MOV, RL, RM),                        // 0x6E
    op2(InstructionId::MOV, RL, RA),                        // 0x6F
    op2(InstructionId::MOV, RM, RB),                        // 0x70
    op2(InstructionId::MOV, RM, RC),                        // 0x71
    op2(InstructionId::MOV, RM, RD),                        // 0x72
    op2(InstructionId::MOV, RM, RE),                        // 0x73
    op2(InstructionId::MOV, RM, RH),                        // 0x74
    op2(InstructionId::MOV, RM, RL),                        // 0x75
    op0(InstructionId::HLT),                                // 0x76
    op2(InstructionId::MOV, RM, RA),                        // 0x77
    op2(InstructionId::MOV, RA, RB),                        // 0x78
    op2(InstructionId::MOV, RA, RC),                        // 0x79
    op2(InstructionId::MOV, RA, RD),                        // 0x7A
    op2(InstructionId::MOV, RA, RE),                        // 0x7B
    op2(InstructionId::MOV, RA, RH),                        // 0x7C
    op2(InstructionId::MOV, RA, RL),                        // 0x7D
    op2(InstructionId::MOV, RA, RM),                        // 0x7E
    op2(InstructionId::MOV, RA, RA),                        // 0x7F
    op2(InstructionId::ADD, A_OPT, RB),                     // 0x80
    op2(InstructionId::ADD, A_OPT, RC),                     // 0x81
    op2(InstructionId::ADD, A_OPT, RD),                     // 0x82
    op2(InstructionId::ADD, A_OPT, RE),                     // 0x83
    op2(InstructionId::ADD, A_OPT, RH),                     // 0x84
    op2(InstructionId::ADD, A_OPT, RL),                     // 0x85
    op2(InstructionId::ADD, A_OPT, RM),                     // 0x86
    op2(InstructionId::ADD, A_OPT, RA),                     // 0x87
    op2(InstructionId::ADC, A_OPT, RB),                     // 0x88
    op2(InstructionId::ADC, A_OPT, RC),                     // 0x89
    op2(InstructionId::ADC, A_OPT, RD),                     // 0x8A
    op2(InstructionId::ADC, A_OPT, RE),                     // 0x8B
    op2(InstructionId::ADC, A_OPT, RH),                     // 0x8C
    op2(InstructionId::ADC, A_OPT, RL),                     // 0x8D
    op2(InstructionId::ADC, A_OPT, RM),                     // 0x8E
    op2(InstructionId::ADC, A_OPT, RA),                     // 0x8F
    op2(InstructionId::SUB, A_OPT, RB),                     // 0x90
    op2(InstructionId::SUB, A_OPT, RC),                     // 0x91
    op2(InstructionId::SUB, A_OPT, RD),                     // 0x92
    op2(InstructionId::SUB, A_OPT, RE),                     // 0x93
    op2(InstructionId::SUB, A_OPT, RH),                     // 0x94
    op2(InstructionId::SUB, A_OPT, RL),                     // 0x95
    op2(InstructionId::SUB, A_OPT, RM),                     // 0x96
    op2(InstructionId::SUB, A_OPT, RA),                     // 0x97
    op2(InstructionId::SBB, A_OPT, RB),                     // 0x98
    op2(InstructionId::SBB, A_OPT, RC),                     // 0x99
    op2(InstructionId::SBB, A_OPT, RD),                     // 0x9A
    op2(InstructionId::SBB, A_OPT, RE),                     // 0x9B
    op2(InstructionId::SBB, A_OPT, RH),                     // 0x9C
    op2(InstructionId::SBB, A_OPT, RL),                     // 0x9D
    op2(InstructionId::SBB, A_OPT, RM),                     // 0x9E
    op2(InstructionId::SBB, A_OPT, RA),                     // 0x9F
    op2(InstructionId::ANA, A_OPT, RB),                     // 0xA0
    op2(InstructionId::ANA, A_OPT, RC),                     // 0xA1
    op2(InstructionId::ANA, A_OPT, RD),                     // 0xA2
    op2(InstructionId::ANA, A_OPT, RE),                     // 0xA3
    op2(InstructionId::ANA, A_OPT, RH),                     // 0xA4
    op2(InstructionId::ANA, A_OPT, RL),                     // 0xA5
    op2(InstructionId::ANA, A_OPT, RM),                     // 0xA6
    op2(InstructionId::ANA, A_OPT, RA),                     // 0xA7
    op2(InstructionId::XRA, A_OPT, RB),                     // 0xA8
    op2(InstructionId::XRA, A_OPT, RC),                     // 0xA9
    op2(InstructionId::XRA, A_OPT, RD),                     // 0xAA
    op2(InstructionId::XRA, A_OPT, RE),                     // 0xAB
    op2(InstructionId::XRA, A_OPT, RH),                     // 0xAC
    op2(InstructionId::XRA, A_OPT, RL),                     // 0xAD
    op2(InstructionId::XRA, A_OPT, RM),                     // 0xAE
    op2(InstructionId::XRA, A_OPT, RA),                     // 0xAF
    op2(InstructionId::ORA, A_OPT, RB),                     // 0xB0
    op2(InstructionId::ORA, A_OPT, RC),                     // 0xB1
    op2(InstructionId::ORA, A_OPT, RD),                     // 0xB2
    op2(InstructionId::ORA, A_OPT, RE),                     // 0xB3
    op2(InstructionId::ORA, A_OPT, RH),                     // 0xB4
    op2(InstructionId::ORA, A_OPT, RL),                     // 0xB5
    op2(InstructionId::ORA, A_OPT, RM),                     // 0xB6
    op2(InstructionId::ORA, A_OPT, RA),                     // 0xB7
    op2(InstructionId::CMP, A_OPT, RB),                     // 0xB8
    op2(InstructionId::CMP, A_OPT, RC),                     // 0xB9
    op2(InstructionId::CMP, A_OPT, RD),                     // 0xBA
    op2(InstructionId::CMP, A_OPT, RE),                     // 0xBB
    op2(InstructionId::CMP, A_OPT, RH),                     // 0xBC
    op2(InstructionId::CMP, A_OPT, RL),                     // 0xBD
    op2(InstructionId::CMP, A_OPT, RM),                     // 0xBE
    op2(InstructionId::CMP, A_OPT, RA),                     // 0xBF
    op0(InstructionId::RNZ),                                // 0xC0
    op1(InstructionId::POP, RBC),                           // 0xC1
    op1(InstructionId::JNZ, D16),                           // 0xC2
    op1(InstructionId::JMP, D16),                           // 0xC3
    op1(InstructionId::CNZ, D16),                           // 0xC4
    op1(InstructionId::PUSH, RBC),                          // 0xC5
    op2(InstructionId::ADI, A_OPT, IMM),                    // 0xC6
    op1(InstructionId::RST, INT),                           // 0xC7
    op0(InstructionId::RZ),                                 // 0xC8
    op0(InstructionId::RET),                                // 0xC9
    op1(InstructionId::JZ, D16),                            // 0xCA
    undoc1(InstructionId::JMP, D16),                        // 0xCB
    op1(InstructionId::CZ, D16),                            // 0xCC
    op1(InstructionId::CALL, D16),                          // 0xCD
    op2(InstructionId::ACI, A_OPT, IMM),                    // 0xCE
    op1(InstructionId::RST, INT),                           // 0xCF
    op0(InstructionId::RNC),                                // 0xD0
    op1(InstructionId::POP, RDE),                           // 0xD1
    op1(InstructionId::JNC, D16),                           // 0xD2
    op2(InstructionId::OUT, PORT, A_OPT),                   // 0xD3
    op1(InstructionId::CNC, D16),                           // 0xD4
    op1(InstructionId::PUSH, RDE),                          // 0xD5
    op2(InstructionId::SUI, A_OPT, IMM),                    // 0xD6
    op1(InstructionId::RST, INT),                           // 0xD7
    op0(InstructionId::RC),                                 // 0xD8
    undoc0(InstructionId::RET),                             // 0xD9
    op1(InstructionId::JC, D16),                            // 0xDA
    op2(InstructionId::IN, A_OPT, PORT),                    // 0xDB
    op1(InstructionId::CC, D16),                            // 0xDC
    undoc1(InstructionId::CALL, D16),                       // 0xDD
    op2(InstructionId::SBI, A_OPT, IMM),                    // 0xDE
    op1(InstructionId::RST, INT),                           // 0xDF
    op0(InstructionId::RPO),                                // 0xE0
    op1(InstructionId::POP, RHL),                           // 0xE1
    op1(InstructionId::JPO, D16),                           // 0xE2
    op2(InstructionId::XTHL, MSP_OPT, HL_OPT),              // 0xE3
    op1(InstructionId::CPO, D16),                           // 0xE4
    op1(InstructionId::PUSH, RHL),                          // 0xE5
    op2(InstructionId::ANI, A_OPT, IMM),                    // 0xE6
    op1(InstructionId::RST, INT),                           // 0xE7
    op0(InstructionId::RPE),                                // 0xE8
    op1(InstructionId::PCHL, HL_OPT),                       // 0xE9
    op1(InstructionId::JPE, D16),                           // 0xEA
    op2(InstructionId::XCHG, DE_OPT, HL_OPT),               // 0xEB
    op1(InstructionId::CPE, D16),                           // 0xEC
    undoc1(InstructionId::CALL, D16),                       // 0xED
    op2(InstructionId::XRI, A_OPT, IMM),                    // 0xEE
    op1(InstructionId::RST, INT),                           // 0xEF
    op0(InstructionId::RP),                                 // 0xF0
    op1(InstructionId::POP, RPSW),                          // 0xF1
    op1(InstructionId::JP, D16),                            // 0xF2
    op0(InstructionId::DI),                                 // 0xF3
    op1(InstructionId::CP, D16),                            // 0xF4
    op1(InstructionId::PUSH, RPSW),                         // 0xF5
    op2(InstructionId::ORI, A_OPT, IMM),                    // 0xF6
    op1(InstructionId::RST, INT),                           // 0xF7
    op0(InstructionId::RM),                                 // 0xF8
    op2(InstructionId::SPHL, SP_OPT, HL_OPT),               // 0xF9
    op1(InstructionId::JM, D16),                            // 0xFA
    op0(InstructionId::EI),                                 // 0xFB
    op1(InstructionId::CM, D16),                            // 0xFC
    undoc1(InstructionId::CALL, D16),                       // 0xFD
    op2(InstructionId::CPI, A_OPT, IMM),                    // 0xFE
    op1(InstructionId::RST, INT),                           // 0xFF
];

#[inline]
pub fn opcode(op_code: u8) -> &'static Opcode {
    &OPCODE_TABLE[op_code as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lengths_match_the_8080_encoding() {
        assert_eq!(opcode(0x00).length(), 1);
        assert_eq!(opcode(0x01).length(), 3); // LXI B
        assert_eq!(opcode(0x06).length(), 2); // MVI B
        assert_eq!(opcode(0x22).length(), 3); // SHLD
        assert_eq!(opcode(0x3A).length(), 3); // LDA
        assert_eq!(opcode(0x7E).length(), 1); // MOV A,M
        assert_eq!(opcode(0xC3).length(), 3); // JMP
        assert_eq!(opcode(0xC6).length(), 2); // ADI
        assert_eq!(opcode(0xD3).length(), 2); // OUT
        assert_eq!(opcode(0xE3).length(), 1); // XTHL
        assert_eq!(opcode(0xFF).length(), 1); // RST 7
    }

    #[test]
    fn undocumented_aliases_are_marked() {
        let undocumented: Vec<usize> = OPCODE_TABLE
            .iter()
            .enumerate()
            .filter(|(_, o)| o.undocumented)
            .map(|(i, _)| i)
            .collect();

        assert_eq!(
            undocumented,
            vec![0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38, 0xCB, 0xD9, 0xDD, 0xED, 0xFD]
        );
        assert_eq!(opcode(0xCB).id, InstructionId::JMP);
        assert_eq!(opcode(0xFD).id, InstructionId::CALL);
    }

    #[test]
    fn call_family() {
        assert!(opcode(0xCD).id.is_call());
        assert!(opcode(0xC4).id.is_call());
        assert!(opcode(0xC7).id.is_call());
        assert!(!opcode(0xC3).id.is_call());
        assert!(opcode(0xC9).id.is_return());
    }

    #[test]
    fn styles_share_the_decode_table() {
        let mov = opcode(0x78);
        assert_eq!(mov.id.mnemonic(MnemonicStyle::Intel8080), "MOV");
        assert_eq!(mov.id.mnemonic(MnemonicStyle::Intel8086), "MOV");
        assert_eq!(opcode(0xA8).id.mnemonic(MnemonicStyle::Intel8086), "XOR");
        assert_eq!(Reg::HL.name(MnemonicStyle::Intel8080), "H");
        assert_eq!(Reg::HL.name(MnemonicStyle::Intel8086), "BX");
    }
}
