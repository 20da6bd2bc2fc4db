/// Ring of recently fetched instruction addresses plus an opcode frequency table.
#[derive(Debug)]
pub struct History {
    slots: Option<Vec<Option<u16>>>,
    cursor: usize,
    capacity: usize,
    frequencies: [u64; 256],
}

impl History {
    pub fn new(capacity: usize) -> History {
        History {
            slots: None,
            cursor: 0,
            capacity: capacity.max(1),
            frequencies: [0; 256],
        }
    }

    /// Allocates or frees the ring. Existing contents survive while enabled.
    pub fn init(&mut self, enabled: bool) {
        match (enabled, self.slots.is_some()) {
            (true, false) => {
                log::debug!("history: allocating {} slots", self.capacity);
                self.slots = Some(vec![None; self.capacity]);
                self.cursor = 0;
            }
            (false, true) => {
                log::debug!("history: released");
                self.slots = None;
                self.cursor = 0;
            }
            _ => {}
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.slots.is_some()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn record(&mut self, addr: u16, op_code: u8) {
        self.frequencies[op_code as usize] += 1;

        if let Some(slots) = self.slots.as_mut() {
            slots[self.cursor] = Some(addr);
            self.cursor = (self.cursor + 1) % slots.len();
        }
    }

    pub fn len(&self) -> usize {
        match self.slots {
            Some(ref slots) if slots[self.cursor].is_some() => slots.len(),
            Some(_) => self.cursor,
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walks back `back` entries, then returns up to `count` of them, oldest first.
    pub fn entries(&self, back: usize, count: usize) -> Vec<u16> {
        let slots = match self.slots {
            Some(ref slots) => slots,
            None => return Vec::new(),
        };

        let back = back.min(self.len());
        let capacity = slots.len();
        let start = (self.cursor + capacity - back) % capacity;

        (0..back.min(count))
            .filter_map(|i| slots[(start + i) % capacity])
            .collect()
    }

    pub fn clear(&mut self) {
        if let Some(slots) = self.slots.as_mut() {
            for slot in slots.iter_mut() {
                *slot = None;
            }
        }
        self.cursor = 0;
    }

    /// Non-zero opcode counts, most frequent first.
    pub fn frequencies(&self) -> Vec<(u8, u64)> {
        let mut counts: Vec<(u8, u64)> = self
            .frequencies
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(op_code, count)| (op_code as u8, *count))
            .collect();

        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts
    }

    pub fn clear_frequencies(&mut self) {
        self.frequencies = [0; 256];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_ring_records_only_frequencies() {
        let mut history = History::new(4);
        history.record(0x10, 0x00);
        assert!(history.entries(4, 4).is_empty());
        assert_eq!(history.frequencies(), vec![(0x00, 1)]);
    }

    #[test]
    fn entries_before_wrap() {
        let mut history = History::new(8);
        history.init(true);
        for addr in 0..3u16 {
            history.record(addr, 0);
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.entries(10, 10), vec![0, 1, 2]);
        assert_eq!(history.entries(2, 1), vec![1]);
    }

    #[test]
    fn entries_after_wrap_are_oldest_first_without_duplicates() {
        let capacity = 16;
        let mut history = History::new(capacity);
        history.init(true);
        for addr in 0..40u16 {
            history.record(addr, 0x3E);
        }

        let entries = history.entries(capacity, capacity);
        let expected: Vec<u16> = (24..40).collect();
        assert_eq!(entries, expected);
        assert_eq!(history.frequencies(), vec![(0x3E, 40)]);
    }

    #[test]
    fn init_false_releases_the_ring() {
        let mut history = History::new(4);
        history.init(true);
        history.record(1, 0);
        history.init(false);
        assert!(!history.is_enabled());
        assert!(history.is_empty());

        history.init(true);
        assert!(history.entries(4, 4).is_empty());
    }
}
