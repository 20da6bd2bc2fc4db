use crate::debugger::address::Address;
use crate::debugger::Debugger;
use crate::errors::DebuggerError;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const SLOT_NEXT_UNASSEMBLE: u8 = 0;
pub const SLOT_NEXT_DUMP: u8 = 1;
pub const SLOT_NEXT_ASSEMBLE: u8 = 2;
pub const SLOT_COMMAND_HISTORY: u8 = 3;
pub const SLOT_STYLE: u8 = 4;
pub const SLOT_MESSAGES: u8 = 5;
pub const SLOT_SYMBOLS: u8 = 6;
pub const SLOT_VARIABLES: u8 = 7;

/// Debugger state a host keeps across sessions, keyed by small slot numbers.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub slots: BTreeMap<u8, Value>,
}

impl SavedState {
    pub fn new() -> SavedState {
        SavedState::default()
    }

    pub fn set<T: Serialize>(&mut self, slot: u8, value: &T) -> Result<(), DebuggerError> {
        self.slots.insert(slot, serde_json::to_value(value)?);
        Ok(())
    }

    /// Missing slots are not an error; they leave the debugger's value alone.
    pub fn get<T: DeserializeOwned>(&self, slot: u8) -> Result<Option<T>, DebuggerError> {
        match self.slots.get(&slot) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<SavedState, DebuggerError> {
        let text = fs::read_to_string(path.as_ref())?;
        let state = serde_json::from_str(&text)?;
        log::debug!("state loaded from {}", path.as_ref().display());
        Ok(state)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DebuggerError> {
        fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        log::debug!("state saved to {}", path.as_ref().display());
        Ok(())
    }
}

fn unpack_slot(state: &SavedState, slot: u8) -> Result<Option<Address>, DebuggerError> {
    match state.get::<Vec<u8>>(slot)? {
        Some(bytes) => Address::unpack(&bytes)
            .map(Some)
            .ok_or_else(|| DebuggerError::Failed(format!("malformed address in state slot {}", slot))),
        None => Ok(None),
    }
}

impl Debugger {
    pub fn save_state(&self) -> Result<SavedState, DebuggerError> {
        let mut state = SavedState::new();

        state.set(SLOT_NEXT_UNASSEMBLE, &self.next_unassemble.pack())?;
        state.set(SLOT_NEXT_DUMP, &self.next_dump.pack())?;
        state.set(SLOT_NEXT_ASSEMBLE, &self.next_assemble.pack())?;
        state.set(SLOT_COMMAND_HISTORY, &self.command_history)?;
        state.set(SLOT_STYLE, &self.style)?;
        state.set(SLOT_MESSAGES, &self.checks.messages)?;
        state.set(SLOT_SYMBOLS, &self.symbols)?;
        state.set(SLOT_VARIABLES, &self.variables)?;

        Ok(state)
    }

    /// Applies every slot present in `state`. Nothing is changed if a slot is malformed.
    pub fn restore_state(&mut self, state: &SavedState) -> Result<(), DebuggerError> {
        let next_unassemble = unpack_slot(state, SLOT_NEXT_UNASSEMBLE)?;
        let next_dump = unpack_slot(state, SLOT_NEXT_DUMP)?;
        let next_assemble = unpack_slot(state, SLOT_NEXT_ASSEMBLE)?;
        let command_history = state.get(SLOT_COMMAND_HISTORY)?;
        let style = state.get(SLOT_STYLE)?;
        let messages = state.get(SLOT_MESSAGES)?;
        let symbols = state.get(SLOT_SYMBOLS)?;
        let variables = state.get(SLOT_VARIABLES)?;

        if let Some(addr) = next_unassemble {
            self.next_unassemble = addr;
        }
        if let Some(addr) = next_dump {
            self.next_dump = addr;
        }
        if let Some(addr) = next_assemble {
            self.next_assemble = addr;
        }
        if let Some(command_history) = command_history {
            self.command_history = command_history;
            self.command_history.truncate(self.config.command_history_len);
        }
        if let Some(style) = style {
            self.style = style;
        }
        if let Some(messages) = messages {
            self.checks.messages = messages;
        }
        if let Some(symbols) = symbols {
            self.symbols = symbols;
        }
        if let Some(variables) = variables {
            self.variables = variables;
        }

        log::debug!("restored {} state slots", state.slots.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::output::BufferedOutput;
    use crate::debugger::MessageCategory;
    use crate::instructions::MnemonicStyle;
    use crate::{DebuggerConfig, Machine};

    fn debugger() -> Debugger {
        Debugger::with_output(DebuggerConfig::default(), BufferedOutput::new().into())
    }

    #[test]
    fn state_survives_a_json_round_trip() {
        let mut machine = Machine::new();
        let mut source = debugger();
        source.do_command(&mut machine, "var count = 2A; s 8086; d 200 10; m port on");

        let state = source.save_state().unwrap();
        let text = serde_json::to_string(&state).unwrap();
        let loaded: SavedState = serde_json::from_str(&text).unwrap();

        let mut target = debugger();
        target.restore_state(&loaded).unwrap();
        assert_eq!(target.variables().get("count"), Some(&0x2A));
        assert_eq!(target.style(), MnemonicStyle::Intel8086);
        assert_eq!(target.next_dump.get(), Some(0x210));
        assert!(!target.next_assemble.is_valid());
        assert_ne!(target.messages() & MessageCategory::Port.bit(), 0);
        assert_eq!(target.command_history().count(), 1);
    }

    #[test]
    fn missing_slots_are_skipped_and_bad_ones_rejected() {
        let mut target = debugger();
        target.restore_state(&SavedState::new()).unwrap();
        assert!(target.variables().is_empty());

        let mut state = SavedState::new();
        state.set(SLOT_NEXT_DUMP, &vec![1u8, 2]).unwrap();
        state.set(SLOT_VARIABLES, &"not a map").unwrap();
        assert!(target.restore_state(&state).is_err());
        assert!(!target.next_dump.is_valid());
    }
}
