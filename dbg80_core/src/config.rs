use crate::errors::DebuggerError;
use crate::instructions::MnemonicStyle;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerConfig {
    pub history_capacity: usize,
    pub max_stack_frames: usize,
    // bytes scanned back from a return address looking for its call
    pub call_scan_window: u16,
    pub unassemble_count: usize,
    pub dump_bytes: usize,
    pub run_chunk: u64,
    pub run_limit: u64,
    pub command_history_len: usize,
    pub style: MnemonicStyle,
    pub messages: Vec<String>,
    pub always_record_history: bool,
}

impl Default for DebuggerConfig {
    fn default() -> DebuggerConfig {
        DebuggerConfig {
            history_capacity: 1024,
            max_stack_frames: 16,
            call_scan_window: 4,
            unassemble_count: 16,
            dump_bytes: 128,
            run_chunk: 10_000,
            run_limit: 50_000_000,
            command_history_len: 64,
            style: MnemonicStyle::Intel8080,
            messages: Vec::new(),
            always_record_history: false,
        }
    }
}

impl DebuggerConfig {
    pub fn from_json_str(text: &str) -> Result<DebuggerConfig, DebuggerError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<DebuggerConfig, DebuggerError> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = DebuggerConfig::from_json_str(&text)?;
        log::debug!("config loaded from {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = DebuggerConfig::from_json_str(r#"{ "history_capacity": 64, "style": "8086" }"#).unwrap();
        assert_eq!(config.history_capacity, 64);
        assert_eq!(config.style, MnemonicStyle::Intel8086);
        assert_eq!(config.run_chunk, DebuggerConfig::default().run_chunk);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(DebuggerConfig::from_json_str("{ history_capacity: }").is_err());
        assert!(DebuggerConfig::from_json_file("/nonexistent/dbg80.json").is_err());
    }
}
