use crate::debugger::Debugger;
use crate::Machine;

use std::io::{self, BufRead, Write};

/// Line oriented REPL feeding operator input to the debugger.
pub struct TerminalDebugger {
    show_prompt: bool,
}

impl Default for TerminalDebugger {
    fn default() -> TerminalDebugger {
        TerminalDebugger::new()
    }
}

impl TerminalDebugger {
    pub fn new() -> TerminalDebugger {
        TerminalDebugger { show_prompt: true }
    }

    pub fn without_prompt() -> TerminalDebugger {
        TerminalDebugger { show_prompt: false }
    }

    /// Reads commands until end of input or `q`. Returns how many commands failed.
    pub fn start_listening<R: BufRead>(
        &mut self,
        debugger: &mut Debugger,
        machine: &mut Machine,
        input: R,
    ) -> io::Result<usize> {
        let mut stdout = io::stdout();
        let mut lines = input.lines();
        let mut failures = 0;

        loop {
            if self.show_prompt {
                print!("{:04X} -> ", machine.cpu.reg_pc);
                stdout.flush()?;
            }

            let line = match lines.next() {
                Some(line) => line?,
                None => break,
            };

            match line.trim() {
                "q" | "quit" => break,
                line => {
                    if !debugger.do_command(machine, line) {
                        failures += 1;
                    }
                }
            }
        }

        log::debug!("terminal session ended, {} failed commands", failures);
        Ok(failures)
    }
}
