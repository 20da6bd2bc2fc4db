use std::fmt::{self, Display};

const PACKED_VALID: u8 = 0x01;
const PACKED_TEMPORARY: u8 = 0x02;

/// A logical address the debugger tracks: a cursor, a breakpoint location or a decode position.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Address {
    addr: Option<u16>,
    pub temporary: bool,
    // source text of a breakpoint's script, kept for listings
    pub command: Option<String>,
    pub commands: Vec<String>,
}

impl Address {
    pub fn new(addr: u16) -> Address {
        Address {
            addr: Some(addr),
            ..Address::default()
        }
    }

    pub fn invalid() -> Address {
        Address::default()
    }

    pub fn temporary(addr: u16) -> Address {
        Address {
            addr: Some(addr),
            temporary: true,
            ..Address::default()
        }
    }

    pub fn with_command(mut self, command: &str, commands: Vec<String>) -> Address {
        self.command = Some(command.to_string());
        self.commands = commands;
        self
    }

    #[inline]
    pub fn get(&self) -> Option<u16> {
        self.addr
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.addr.is_some()
    }

    pub fn set(&mut self, addr: u16) {
        self.addr = Some(addr);
        self.temporary = false;
    }

    pub fn advance(&mut self, delta: i32) {
        if let Some(addr) = self.addr {
            self.addr = Some(addr.wrapping_add(delta as u16));
        }
    }

    /// Address bytes (little-endian) followed by a flag byte.
    pub fn pack(&self) -> [u8; 3] {
        let addr = self.addr.unwrap_or(0);
        let mut flags = 0;
        if self.addr.is_some() {
            flags |= PACKED_VALID;
        }
        if self.temporary {
            flags |= PACKED_TEMPORARY;
        }

        [addr as u8, (addr >> 8) as u8, flags]
    }

    pub fn unpack(bytes: &[u8]) -> Option<Address> {
        match *bytes {
            [low, high, flags] => {
                let addr = if flags & PACKED_VALID != 0 {
                    Some(((high as u16) << 8) | low as u16)
                } else {
                    None
                };

                Some(Address {
                    addr,
                    temporary: flags & PACKED_TEMPORARY != 0,
                    ..Address::default()
                })
            }
            _ => None,
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.addr {
            Some(addr) => write!(f, "{:04X}", addr),
            None => write!(f, "????"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_and_ignores_invalid() {
        let mut addr = Address::new(0xFFFE);
        addr.advance(3);
        assert_eq!(addr.get(), Some(0x0001));
        addr.advance(-2);
        assert_eq!(addr.get(), Some(0xFFFF));

        let mut invalid = Address::invalid();
        invalid.advance(5);
        assert_eq!(invalid.get(), None);
    }

    #[test]
    fn set_clears_temporary() {
        let mut addr = Address::temporary(0x10);
        addr.set(0x20);
        assert!(!addr.temporary);
        assert_eq!(addr.to_string(), "0020");
    }

    #[test]
    fn pack_unpack_round_trip() {
        for addr in &[Address::new(0x1234), Address::temporary(0), Address::invalid()] {
            let unpacked = Address::unpack(&addr.pack()).unwrap();
            assert_eq!(unpacked.get(), addr.get());
            assert_eq!(unpacked.temporary, addr.temporary);
        }

        assert!(Address::unpack(&[1, 2]).is_none());
        assert_eq!(Address::invalid().to_string(), "????");
    }
}
