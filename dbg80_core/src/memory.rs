use crate::errors::EmulationError;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

pub const MEMORY_SIZE: usize = 0x10000;
pub const BLOCK_SIZE: usize = 0x400;
const BLOCK_COUNT: usize = MEMORY_SIZE / BLOCK_SIZE;

pub trait MemMapped {
    fn read(&mut self, index: u16) -> u8;
    fn write(&mut self, index: u16, byte: u8);

    fn read_word(&mut self, index: u16) -> u16 {
        // little-endian!
        let low = self.read(index);
        let high = self.read(index.wrapping_add(1));

        ((high as u16) << 8) | low as u16
    }

    fn write_word(&mut self, index: u16, word: u16) {
        self.write(index, word as u8);
        self.write(index.wrapping_add(1), (word >> 8) as u8);
    }

    fn fetch(&mut self, index: u16) -> Result<u8, EmulationError> {
        Ok(self.read(index))
    }

    fn input(&mut self, port: u8) -> u8;
    fn output(&mut self, port: u8, byte: u8);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    None,
    Ram,
    Rom,
    Video,
}

impl BlockType {
    pub fn name(&self) -> &'static str {
        match *self {
            BlockType::None => "NONE",
            BlockType::Ram => "RAM",
            BlockType::Rom => "ROM",
            BlockType::Video => "VIDEO",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

pub struct Memory {
    bytes: Vec<u8>,
    blocks: [BlockType; BLOCK_COUNT],

    ports_in: [u8; 256],
    ports_out: [u8; 256],

    // address -> number of breakpoints watching it
    read_watch: BTreeMap<u16, usize>,
    write_watch: BTreeMap<u16, usize>,

    port_in_breaks: BTreeSet<u8>,
    port_out_breaks: BTreeSet<u8>,

    pub edit_generation: u64,
}

impl Default for Memory {
    fn default() -> Memory {
        Memory::new()
    }
}

impl Memory {
    pub fn new() -> Memory {
        Memory {
            bytes: vec![0; MEMORY_SIZE],
            blocks: [BlockType::Ram; BLOCK_COUNT],
            ports_in: [0xFF; 256],
            ports_out: [0; 256],
            read_watch: BTreeMap::new(),
            write_watch: BTreeMap::new(),
            port_in_breaks: BTreeSet::new(),
            port_out_breaks: BTreeSet::new(),
            edit_generation: 0,
        }
    }

    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.set_byte(addr.wrapping_add(i as u16), *byte);
        }
    }

    //
    // unchecked accessors
    //

    #[inline]
    pub fn get_byte(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    #[inline]
    pub fn set_byte(&mut self, addr: u16, byte: u8) {
        self.bytes[addr as usize] = byte;
    }

    pub fn get_word(&self, addr: u16) -> u16 {
        let low = self.get_byte(addr);
        let high = self.get_byte(addr.wrapping_add(1));

        ((high as u16) << 8) | low as u16
    }

    pub fn set_word(&mut self, addr: u16, word: u16) {
        self.set_byte(addr, word as u8);
        self.set_byte(addr.wrapping_add(1), (word >> 8) as u8);
    }

    //
    // blocks
    //

    pub fn block_type(&self, addr: u16) -> BlockType {
        self.blocks[addr as usize / BLOCK_SIZE]
    }

    pub fn set_block_type(&mut self, start: u16, len: usize, block_type: BlockType) {
        let first = start as usize / BLOCK_SIZE;
        let last = ((start as usize + len + BLOCK_SIZE - 1) / BLOCK_SIZE).min(BLOCK_COUNT);
        for block in &mut self.blocks[first..last] {
            *block = block_type;
        }
    }

    /// Contiguous runs of identically typed blocks as (start, length, type).
    pub fn block_ranges(&self) -> Vec<(u16, usize, BlockType)> {
        let mut ranges: Vec<(u16, usize, BlockType)> = Vec::new();

        for (i, block_type) in self.blocks.iter().enumerate() {
            match ranges.last_mut() {
                Some(last) if last.2 == *block_type => last.1 += BLOCK_SIZE,
                _ => ranges.push(((i * BLOCK_SIZE) as u16, BLOCK_SIZE, *block_type)),
            }
        }

        ranges
    }

    //
    // access interception
    //

    pub fn add_access_breakpoint(&mut self, addr: u16, kind: AccessKind) {
        let watch = match kind {
            AccessKind::Read => &mut self.read_watch,
            AccessKind::Write => &mut self.write_watch,
        };
        *watch.entry(addr).or_insert(0) += 1;
    }

    pub fn remove_access_breakpoint(&mut self, addr: u16, kind: AccessKind) {
        let watch = match kind {
            AccessKind::Read => &mut self.read_watch,
            AccessKind::Write => &mut self.write_watch,
        };
        if let Some(count) = watch.get_mut(&addr) {
            *count -= 1;
            if *count == 0 {
                watch.remove(&addr);
            }
        }
    }

    #[inline]
    pub fn is_watched(&self, addr: u16, kind: AccessKind) -> bool {
        let watch = match kind {
            AccessKind::Read => &self.read_watch,
            AccessKind::Write => &self.write_watch,
        };
        !watch.is_empty() && watch.contains_key(&addr)
    }

    //
    // ports
    //

    /// Returns true if the port breakpoint is now set.
    pub fn toggle_port_breakpoint(&mut self, port: u8, input: bool) -> bool {
        let breaks = if input {
            &mut self.port_in_breaks
        } else {
            &mut self.port_out_breaks
        };
        if breaks.remove(&port) {
            false
        } else {
            breaks.insert(port);
            true
        }
    }

    pub fn clear_port_breakpoints(&mut self, input: bool) {
        if input {
            self.port_in_breaks.clear();
        } else {
            self.port_out_breaks.clear();
        }
    }

    pub fn has_port_breakpoint(&self, port: u8, input: bool) -> bool {
        if input {
            self.port_in_breaks.contains(&port)
        } else {
            self.port_out_breaks.contains(&port)
        }
    }

    pub fn has_port_breakpoints(&self) -> bool {
        !self.port_in_breaks.is_empty() || !self.port_out_breaks.is_empty()
    }

    pub fn port_breakpoints(&self, input: bool) -> Vec<u8> {
        if input {
            self.port_in_breaks.iter().copied().collect()
        } else {
            self.port_out_breaks.iter().copied().collect()
        }
    }

    /// Value the next IN instruction on this port will see.
    pub fn set_port_input(&mut self, port: u8, byte: u8) {
        self.ports_in[port as usize] = byte;
    }

    pub fn port_output(&self, port: u8) -> u8 {
        self.ports_out[port as usize]
    }
}

impl MemMapped for Memory {
    #[inline]
    fn read(&mut self, index: u16) -> u8 {
        match self.block_type(index) {
            BlockType::None => 0xFF,
            _ => self.bytes[index as usize],
        }
    }

    #[inline]
    fn write(&mut self, index: u16, byte: u8) {
        match self.block_type(index) {
            BlockType::Ram | BlockType::Video => self.bytes[index as usize] = byte,
            BlockType::Rom | BlockType::None => {}
        }
    }

    fn fetch(&mut self, index: u16) -> Result<u8, EmulationError> {
        match self.block_type(index) {
            BlockType::None => Err(EmulationError::UnmappedFetch(index)),
            _ => Ok(self.bytes[index as usize]),
        }
    }

    fn input(&mut self, port: u8) -> u8 {
        self.ports_in[port as usize]
    }

    fn output(&mut self, port: u8, byte: u8) {
        self.ports_out[port as usize] = byte;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_blocks_ignore_checked_writes() {
        let mut memory = Memory::new();
        memory.set_block_type(0x0000, 0x400, BlockType::Rom);
        memory.set_byte(0x0010, 0x12);

        memory.write(0x0010, 0x34);
        assert_eq!(memory.read(0x0010), 0x12);

        memory.write(0x0400, 0x34);
        assert_eq!(memory.read(0x0400), 0x34);
    }

    #[test]
    fn unmapped_blocks_read_as_fill_and_fault_on_fetch() {
        let mut memory = Memory::new();
        memory.set_block_type(0x8000, 0x800, BlockType::None);

        assert_eq!(memory.read(0x8123), 0xFF);
        assert_eq!(memory.fetch(0x8123), Err(EmulationError::UnmappedFetch(0x8123)));
        assert_eq!(memory.fetch(0x7FFF), Ok(0));
    }

    #[test]
    fn block_ranges_merge_neighbours() {
        let mut memory = Memory::new();
        memory.set_block_type(0xF000, 0x1000, BlockType::Rom);

        let ranges = memory.block_ranges();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], (0x0000, 0xF000, BlockType::Ram));
        assert_eq!(ranges[1], (0xF000, 0x1000, BlockType::Rom));
    }

    #[test]
    fn access_interception_is_reference_counted() {
        let mut memory = Memory::new();
        memory.add_access_breakpoint(0x100, AccessKind::Write);
        memory.add_access_breakpoint(0x100, AccessKind::Write);

        memory.remove_access_breakpoint(0x100, AccessKind::Write);
        assert!(memory.is_watched(0x100, AccessKind::Write));
        assert!(!memory.is_watched(0x100, AccessKind::Read));

        memory.remove_access_breakpoint(0x100, AccessKind::Write);
        assert!(!memory.is_watched(0x100, AccessKind::Write));
    }

    #[test]
    fn port_breakpoints_toggle() {
        let mut memory = Memory::new();
        assert!(memory.toggle_port_breakpoint(0x10, true));
        assert!(memory.has_port_breakpoint(0x10, true));
        assert!(!memory.has_port_breakpoint(0x10, false));
        assert!(!memory.toggle_port_breakpoint(0x10, true));
        assert!(memory.port_breakpoints(true).is_empty());
    }
}
