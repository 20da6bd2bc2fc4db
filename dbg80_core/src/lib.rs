#[macro_use]
extern crate nom;

pub mod config;
pub mod cpu;
pub mod debugger;
pub mod errors;
pub mod expr;
pub mod instructions;
pub mod memory;

use self::cpu::{Cpu, EngineState};
use self::memory::Memory;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub use crate::config::DebuggerConfig;
pub use crate::debugger::output::{BufferedOutput, ConsoleOutput, Output, OutputSink};
pub use crate::debugger::state::SavedState;
pub use crate::debugger::{Debugger, StepResult, StopReason};
pub use crate::errors::{DebuggerError, EmulationError};

#[derive(Error, Debug)]
pub enum MachineError {
    #[error("Error loading image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image of {len} bytes does not fit at 0x{addr:04X}")]
    ImageTooLarge { addr: u16, len: usize },
}

/// The emulated computer: one 8080 and its 64K address space.
pub struct Machine {
    pub cpu: Cpu,
    pub memory: Memory,

    stop: Arc<AtomicBool>,
}

impl Default for Machine {
    fn default() -> Machine {
        Machine::new()
    }
}

impl Machine {
    pub fn new() -> Machine {
        Machine {
            cpu: Cpu::new(),
            memory: Memory::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn load_image(&mut self, addr: u16, data: &[u8]) -> Result<(), MachineError> {
        if addr as usize + data.len() > memory::MEMORY_SIZE {
            return Err(MachineError::ImageTooLarge {
                addr,
                len: data.len(),
            });
        }

        self.memory.load(addr, data);
        self.refresh(addr, data.len());
        Ok(())
    }

    pub fn load_image_file(&mut self, file_path: &Path, addr: u16) -> Result<usize, MachineError> {
        let data = fs::read(file_path)?;
        self.load_image(addr, &data)?;
        log::debug!("loaded {} bytes from {} at {:04X}", data.len(), file_path.display(), addr);
        Ok(data.len())
    }

    #[inline]
    pub fn cpu_cycles(&self) -> u64 {
        self.cpu.cycle_count
    }

    pub fn set_entry_point(&mut self, entry_point_addr: u16) {
        self.cpu.reg_pc = entry_point_addr;
    }

    pub fn power_on(&mut self) {
        if !self.cpu.is_powered() {
            self.cpu.state = EngineState::Ready;
        }
    }

    pub fn power_off(&mut self) {
        self.cpu.state = EngineState::PoweredOff;
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.stop.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    /// Marks the engine busy and clears any pending stop request.
    pub fn start(&mut self) {
        if self.cpu.state == EngineState::Ready {
            self.cpu.state = EngineState::Running;
        }
        self.stop.store(false, Ordering::SeqCst);
    }

    pub fn stop(&mut self) {
        if self.cpu.state == EngineState::Running {
            self.cpu.state = EngineState::Ready;
        }
    }

    pub fn set_error(&mut self) {
        self.cpu.state = EngineState::Error;
    }

    /// Flag another thread may set to interrupt a long run.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Tells the engine memory was changed behind its back.
    pub fn refresh(&mut self, addr: u16, len: usize) {
        self.memory.edit_generation += 1;
        log::trace!(
            "memory refresh {:04X}+{:X} (generation {})",
            addr,
            len,
            self.memory.edit_generation
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_stop_follow_engine_state() {
        let mut machine = Machine::new();
        machine.start();
        assert!(machine.is_running());
        machine.stop();
        assert!(!machine.is_running());

        machine.power_off();
        machine.start();
        assert!(!machine.is_running());
        machine.power_on();
        assert_eq!(machine.cpu.state, EngineState::Ready);
    }

    #[test]
    fn stop_handle_is_shared() {
        let mut machine = Machine::new();
        let handle = machine.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(machine.stop_requested());

        machine.start();
        assert!(!machine.stop_requested());
    }

    #[test]
    fn images_are_bounds_checked() {
        let mut machine = Machine::new();
        machine.load_image(0x100, &[0xC3, 0x00, 0x01]).unwrap();
        assert_eq!(machine.memory.get_byte(0x100), 0xC3);
        assert_eq!(machine.memory.edit_generation, 1);

        assert!(machine.load_image(0xFFFF, &[0, 0]).is_err());
    }
}
