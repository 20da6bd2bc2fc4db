use crate::expr::ExprError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmulationError {
    #[error("Hit breakpoint at addr: 0x{0:04X}")]
    DebuggerBreakpoint(u16),
    #[error("Instruction countdown expired at addr: 0x{0:04X}")]
    DebuggerCountdown(u16),
    #[error("Fetch from unmapped memory at addr: 0x{0:04X}")]
    UnmappedFetch(u16),
    #[error("CPU is powered off")]
    PoweredOff,
}

#[derive(Error, Debug)]
pub enum DebuggerError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("unknown register: {0}")]
    UnknownRegister(String),
    #[error("{0}")]
    Breakpoint(String),
    #[error("{0}")]
    Expression(#[from] ExprError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Failed(String),
}
