use crate::debugger::address::Address;
use crate::errors::DebuggerError;
use crate::memory::AccessKind;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BreakpointKind {
    Exec,
    Read,
    Write,
}

impl BreakpointKind {
    pub const ALL: [BreakpointKind; 3] = [BreakpointKind::Exec, BreakpointKind::Read, BreakpointKind::Write];

    pub fn tag(self) -> &'static str {
        match self {
            BreakpointKind::Exec => "bp",
            BreakpointKind::Read => "br",
            BreakpointKind::Write => "bw",
        }
    }

    /// Memory interception needed for this kind, if any.
    pub fn access(self) -> Option<AccessKind> {
        match self {
            BreakpointKind::Exec => None,
            BreakpointKind::Read => Some(AccessKind::Read),
            BreakpointKind::Write => Some(AccessKind::Write),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointHit {
    Countdown(u16),
    /// `consumed` is set when a temporary entry went away with this hit,
    /// even if a permanent entry at the same spot is the one reported.
    Address {
        kind: BreakpointKind,
        addr: Address,
        consumed: bool,
    },
}

#[derive(Debug, Default)]
pub struct Breakpoints {
    sets: [Vec<Address>; 3],
    countdown: Option<u32>,
    suppress: u32,
    skip_exec: Option<u16>,
}

impl Breakpoints {
    pub fn new() -> Breakpoints {
        Breakpoints::default()
    }

    pub fn add(&mut self, kind: BreakpointKind, addr: Address) -> Result<(), DebuggerError> {
        let target = addr
            .get()
            .ok_or_else(|| DebuggerError::InvalidAddress(addr.to_string()))?;

        let set = &mut self.sets[kind.index()];
        let exists = set
            .iter()
            .any(|entry| entry.get() == Some(target) && entry.temporary == addr.temporary);
        if exists && !addr.temporary {
            return Err(DebuggerError::Breakpoint(format!(
                "{} {:04X} already exists",
                kind.tag(),
                target
            )));
        }

        if !exists {
            log::debug!("breakpoint {} {} added", kind.tag(), addr);
            set.push(addr);
        }
        Ok(())
    }

    /// Removes every entry at `addr` across all sets.
    pub fn remove(&mut self, addr: u16) -> Vec<(BreakpointKind, Address)> {
        let mut removed = Vec::new();

        for kind in BreakpointKind::ALL.iter() {
            let set = &mut self.sets[kind.index()];
            let mut i = 0;
            while i < set.len() {
                if set[i].get() == Some(addr) {
                    removed.push((*kind, set.remove(i)));
                } else {
                    i += 1;
                }
            }
        }

        removed
    }

    /// Drops the temporary entries that were never reached.
    pub fn clear_temporary(&mut self) -> Vec<(BreakpointKind, Address)> {
        let mut removed = Vec::new();

        for kind in BreakpointKind::ALL.iter() {
            let set = &mut self.sets[kind.index()];
            let mut i = 0;
            while i < set.len() {
                if set[i].temporary {
                    removed.push((*kind, set.remove(i)));
                } else {
                    i += 1;
                }
            }
        }

        removed
    }

    pub fn clear(&mut self) -> Vec<(BreakpointKind, Address)> {
        let mut removed = Vec::new();
        for kind in BreakpointKind::ALL.iter() {
            removed.extend(self.sets[kind.index()].drain(..).map(|addr| (*kind, addr)));
        }
        removed
    }

    pub fn find(&self, kind: BreakpointKind, addr: u16) -> Option<&Address> {
        self.sets[kind.index()].iter().find(|entry| entry.get() == Some(addr))
    }

    pub fn list(&self) -> Vec<(BreakpointKind, &Address)> {
        BreakpointKind::ALL
            .iter()
            .flat_map(|kind| self.sets[kind.index()].iter().map(move |addr| (*kind, addr)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.iter().all(|set| set.is_empty())
    }

    //
    // instruction countdown
    //

    pub fn arm_countdown(&mut self, count: u32) {
        self.countdown = if count == 0 { None } else { Some(count) };
    }

    pub fn countdown(&self) -> Option<u32> {
        self.countdown
    }

    /// True when fetches or accesses have to be checked at all.
    pub fn needs_checks(&self) -> bool {
        self.countdown.is_some() || !self.is_empty()
    }

    //
    // recursion guard
    //

    pub fn suppress(&mut self) {
        self.suppress += 1;
    }

    pub fn unsuppress(&mut self) {
        self.suppress = self.suppress.saturating_sub(1);
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppress > 0
    }

    /// Ignores an exec breakpoint at `pc` once, so execution can resume from it.
    pub fn skip_once(&mut self, pc: u16) {
        self.skip_exec = Some(pc);
    }

    //
    // checks
    //

    pub fn check_execution(&mut self, pc: u16) -> Option<BreakpointHit> {
        if self.is_suppressed() {
            return None;
        }

        if let Some(count) = self.countdown {
            if count == 0 {
                self.countdown = None;
                log::debug!("countdown expired at {:04X}", pc);
                return Some(BreakpointHit::Countdown(pc));
            }
            self.countdown = Some(count - 1);
        }

        if self.skip_exec.take() == Some(pc) {
            return None;
        }

        self.check_range(BreakpointKind::Exec, pc, 1)
    }

    pub fn check_access(&mut self, kind: AccessKind, addr: u16, len: u16) -> Option<BreakpointHit> {
        if self.is_suppressed() {
            return None;
        }

        let kind = match kind {
            AccessKind::Read => BreakpointKind::Read,
            AccessKind::Write => BreakpointKind::Write,
        };
        self.check_range(kind, addr, len)
    }

    fn check_range(&mut self, kind: BreakpointKind, addr: u16, len: u16) -> Option<BreakpointHit> {
        let set = &mut self.sets[kind.index()];
        let in_range = |entry: &Address| {
            entry
                .get()
                .map_or(false, |a| a.wrapping_sub(addr) < len.max(1))
        };

        // permanent entries win; temporary ones at the same spot are consumed
        let permanent = set.iter().find(|e| in_range(e) && !e.temporary).cloned();
        let temporary = set.iter().position(|e| in_range(e) && e.temporary).map(|i| set.remove(i));
        set.retain(|e| !(in_range(e) && e.temporary));

        let consumed = temporary.is_some();
        let addr = permanent.or(temporary)?;
        log::debug!("breakpoint {} {} hit", kind.tag(), addr);
        Some(BreakpointHit::Address { kind, addr, consumed })
    }
}
