use crate::debugger::breakpoints::BreakpointKind;
use crate::errors::DebuggerError;
use crate::expr::is_identifier;

use nom::IResult::*;
use nom::{rest, space, IResult};
use std::str;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataSize {
    Byte,
    Word,
    DoubleWord,
}

impl DataSize {
    pub fn bytes(self) -> u16 {
        match self {
            DataSize::Byte => 1,
            DataSize::Word => 2,
            DataSize::DoubleWord => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TraceMode {
    Plain,
    Registers,
    Calls,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarCommand {
    List,
    Show(String),
    Delete(String),
    Assign(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Assemble {
        addr: Option<String>,
        mnemonic: Option<String>,
        operands: Vec<String>,
    },
    BreakpointSet {
        kind: BreakpointKind,
        addr: String,
        commands: Option<String>,
    },
    // None clears every breakpoint
    BreakpointClear(Option<String>),
    BreakpointList,
    BreakAfter(Option<String>),
    PortBreakpoint {
        input: bool,
        port: Option<String>,
    },
    Dump {
        size: DataSize,
        addr: Option<String>,
        len: Option<String>,
    },
    DumpHistory {
        back: Option<String>,
        filter: Option<String>,
    },
    DumpMap,
    Edit {
        size: DataSize,
        addr: String,
        values: Vec<String>,
    },
    Frequencies {
        clear: bool,
    },
    Go(Option<String>),
    Halt,
    PortInput(String),
    PortOutput(String, String),
    StackTrace {
        symbols: bool,
        count: Option<String>,
    },
    NearestSymbol(String),
    ListSymbols(Option<String>),
    Messages {
        category: Option<String>,
        enable: Option<bool>,
    },
    StepOver {
        registers: bool,
    },
    Print(String),
    Registers(Option<(String, Option<String>)>),
    SetOption(Vec<String>),
    Trace {
        mode: TraceMode,
        count: Option<String>,
    },
    Unassemble {
        addr: Option<String>,
        end: Option<String>,
    },
    Var(VarCommand),
    If(String),
    Else,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, DebuggerError> {
        let line = line.trim();
        let split = line.find(char::is_whitespace).unwrap_or_else(|| line.len());
        let (keyword, raw_args) = line.split_at(split);
        let raw_args = raw_args.trim();
        let args = tokenize(raw_args);

        let arg = |i: usize| args.get(i).cloned();
        let syntax = || DebuggerError::Syntax(line.to_string());

        let command = match keyword.to_ascii_lowercase().as_str() {
            "?" | "help" => Command::Help,
            "a" => Command::Assemble {
                addr: arg(0),
                mnemonic: arg(1),
                operands: args.iter().skip(2).cloned().collect(),
            },
            tag @ "bp" | tag @ "br" | tag @ "bw" => {
                let kind = match tag {
                    "bp" => BreakpointKind::Exec,
                    "br" => BreakpointKind::Read,
                    _ => BreakpointKind::Write,
                };
                Command::BreakpointSet {
                    kind,
                    addr: arg(0).ok_or_else(syntax)?,
                    commands: arg(1),
                }
            }
            "bc" => match arg(0).ok_or_else(syntax)?.as_str() {
                "*" => Command::BreakpointClear(None),
                addr => Command::BreakpointClear(Some(addr.to_string())),
            },
            "bl" => Command::BreakpointList,
            "bn" => Command::BreakAfter(arg(0)),
            "bi" | "bo" => Command::PortBreakpoint {
                input: keyword.eq_ignore_ascii_case("bi"),
                port: arg(0),
            },
            "d" | "db" | "dw" | "dd" => Command::Dump {
                size: data_size(keyword),
                addr: arg(0),
                len: arg(1),
            },
            "dh" => Command::DumpHistory {
                back: arg(0),
                filter: arg(1),
            },
            "dm" => Command::DumpMap,
            "e" | "eb" | "ew" => {
                if args.len() < 2 {
                    return Err(syntax());
                }
                Command::Edit {
                    size: data_size(keyword),
                    addr: args[0].clone(),
                    values: args[1..].to_vec(),
                }
            }
            "f" => match arg(0).as_deref() {
                None => Command::Frequencies { clear: false },
                Some("clear") => Command::Frequencies { clear: true },
                Some(_) => return Err(syntax()),
            },
            "g" => Command::Go(arg(0)),
            "h" => Command::Halt,
            "i" => Command::PortInput(arg(0).ok_or_else(syntax)?),
            "o" => Command::PortOutput(arg(0).ok_or_else(syntax)?, arg(1).ok_or_else(syntax)?),
            "k" | "ks" => Command::StackTrace {
                symbols: keyword.len() == 2,
                count: arg(0),
            },
            "ln" => Command::NearestSymbol(arg(0).ok_or_else(syntax)?),
            "ls" => Command::ListSymbols(arg(0)),
            "m" => Command::Messages {
                category: arg(0),
                enable: match arg(1).as_deref() {
                    None => None,
                    Some(on_off) if on_off.eq_ignore_ascii_case("on") => Some(true),
                    Some(on_off) if on_off.eq_ignore_ascii_case("off") => Some(false),
                    Some(_) => return Err(syntax()),
                },
            },
            "p" | "pr" => Command::StepOver {
                registers: keyword.len() == 2,
            },
            "print" if !raw_args.is_empty() => Command::Print(raw_args.to_string()),
            "r" => match register_args(raw_args.as_bytes()) {
                Done(_, args) => Command::Registers(args),
                _ => return Err(syntax()),
            },
            "s" => Command::SetOption(args.clone()),
            "t" | "tr" | "tc" => Command::Trace {
                mode: match keyword.to_ascii_lowercase().as_str() {
                    "tr" => TraceMode::Registers,
                    "tc" => TraceMode::Calls,
                    _ => TraceMode::Plain,
                },
                count: arg(0),
            },
            "u" => Command::Unassemble {
                addr: arg(0),
                end: arg(1),
            },
            "var" => match var_args(raw_args.as_bytes()) {
                Done(_, var) => Command::Var(var),
                _ => return Err(syntax()),
            },
            "if" if !raw_args.is_empty() => Command::If(raw_args.to_string()),
            "else" if raw_args.is_empty() => Command::Else,
            "print" | "if" | "else" => return Err(syntax()),
            _ => return Err(DebuggerError::UnknownCommand(keyword.to_string())),
        };

        Ok(command)
    }
}

fn data_size(keyword: &str) -> DataSize {
    match keyword.to_ascii_lowercase().as_str() {
        "dw" | "ew" => DataSize::Word,
        "dd" => DataSize::DoubleWord,
        _ => DataSize::Byte,
    }
}

/// Splits a line into commands on `;`, leaving quoted text intact.
pub fn split_commands(line: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match (quote, c) {
            (None, ';') => {
                commands.push(current.trim().to_string());
                current.clear();
                continue;
            }
            (None, '"') | (None, '\'') => quote = Some(c),
            (Some(q), c) if q == c => quote = None,
            _ => {}
        }
        current.push(c);
    }
    commands.push(current.trim().to_string());

    commands.retain(|command| !command.is_empty());
    commands
}

/// Splits a command into whitespace separated tokens, honoring quotes.
///
/// Inside a double quoted string a doubled double quote yields a single quote.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some('"') if c == '"' => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('\'');
                } else {
                    quote = None;
                }
            }
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::replace(&mut current, String::new()));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    tokens
}

//
// argument parsers
//

fn identifier(input: &[u8]) -> IResult<&[u8], String> {
    match is_a!(
        input,
        &b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_"[..]
    ) {
        Error(e) => Error(e),
        Incomplete(e) => Incomplete(e),
        Done(i, o) => match str::from_utf8(o) {
            Ok(name) if is_identifier(name) => Done(i, name.to_string()),
            _ => Error(error_position!(nom::ErrorKind::Custom(0), input)),
        },
    }
}

fn opt_space(input: &[u8]) -> IResult<&[u8], Option<&[u8]>> {
    opt!(input, complete!(space))
}

named!(
    rest_string<String>,
    map!(map_res!(rest, str::from_utf8), |s: &str| s.trim().to_string())
);

named!(
    var_args<VarCommand>,
    alt_complete!(
        do_parse!(
            opt!(complete!(space))      >>
            name: identifier            >>
            opt!(complete!(space))      >>
            tag!("=")                   >>
            value: rest_string          >>
            ( if value.is_empty() {
                VarCommand::Delete(name)
            } else {
                VarCommand::Assign(name, value)
            } )
        ) |
        do_parse!(
            opt!(complete!(space))      >>
            name: identifier            >>
            opt!(complete!(space))      >>
            eof!()                      >>
            ( VarCommand::Show(name) )
        ) |
        do_parse!(
            opt_space                   >>
            eof!()                      >>
            ( VarCommand::List )
        )
    )
);

named!(
    register_args<Option<(String, Option<String>)>>,
    alt_complete!(
        do_parse!(
            opt!(complete!(space))                                  >>
            reg: identifier                                         >>
            opt!(complete!(space))                                  >>
            value: opt!(complete!(preceded!(tag!("="), rest_string))) >>
            eof!()                                                  >>
            ( Some((reg, value)) )
        ) |
        do_parse!(
            opt_space               >>
            eof!()                  >>
            ( None )
        )
    )
);
