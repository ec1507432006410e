use super::Interpreter;
use crate::consts::*;
use crate::error::RuntimeError;

use hatch_asm::AddressFlags;

/// First-fit allocator over the runtime region between the program image
/// and the reserved register cells.
///
/// The map never coalesces and never moves live entries; fragmentation is
/// bounded by the 240-byte ceiling.
#[derive(Debug, Clone)]
pub(crate) struct MemoryMap {
    origin: usize,
    used: Vec<bool>,
}

impl MemoryMap {
    pub(crate) fn new(origin: usize) -> Self {
        Self {
            origin,
            used: vec![false; PROGRAM_CEILING.saturating_sub(origin)],
        }
    }

    /// First fit: the lowest run of `len` contiguous free cells.
    pub(crate) fn acquire(&mut self, len: usize) -> Option<u8> {
        let start = (0..=self.used.len().checked_sub(len)?)
            .find(|&start| self.used[start..start + len].iter().all(|used| !used))?;

        self.used[start..start + len].iter_mut().for_each(|used| *used = true);
        Some((self.origin + start) as u8)
    }

    pub(crate) fn release(&mut self, address: u8, len: usize) {
        for cell in address as usize..(address as usize + len).min(PROGRAM_CEILING) {
            if let Some(index) = cell.checked_sub(self.origin) {
                if let Some(used) = self.used.get_mut(index) {
                    *used = false;
                }
            }
        }
    }

    pub(crate) fn is_clear(&self) -> bool {
        self.used.iter().all(|used| !used)
    }
}

impl Interpreter {
    /// `PUSH`: reserves `cells` contiguous bytes and records the run's
    /// starting address on the data stack.
    pub(crate) fn stack_push(&mut self, cells: u8) -> Result<(), RuntimeError> {
        let address = self
            .memory_map
            .acquire(cells as usize)
            .ok_or(RuntimeError::OutOfMemory {
                cells: cells as usize,
            })?;
        self.data_stack.push(address);
        Ok(())
    }

    /// `POP`: drops entries without touching the allocator. Used for cells
    /// whose storage is owned elsewhere.
    pub(crate) fn stack_pop(&mut self, entries: u8) -> Result<(), RuntimeError> {
        let entries = entries as usize;
        if entries > self.data_stack.len() {
            return Err(RuntimeError::DataStackUnderflow);
        }
        self.data_stack.truncate(self.data_stack.len() - entries);
        Ok(())
    }

    /// `FREE`: releases `operand` scalar cells, or — with the memory flag
    /// — one length-prefixed aggregate.
    pub(crate) fn free(&mut self, flags: AddressFlags, operand: u8) -> Result<(), RuntimeError> {
        if flags.contains(AddressFlags::MEM) {
            let address = self
                .data_stack
                .pop()
                .ok_or(RuntimeError::DataStackUnderflow)?;
            let len = self.mem_read(address) as usize;
            self.memory_map.release(address, len + 1);
        } else {
            for _ in 0..operand {
                let address = self
                    .data_stack
                    .pop()
                    .ok_or(RuntimeError::DataStackUnderflow)?;
                self.memory_map.release(address, 1);
            }
        }
        Ok(())
    }

    /// `SAVE`: parks `A` then `B` on the data stack for the matching
    /// `RET` to restore. The entries are values, not addresses; the
    /// caller/callee contract guarantees nothing frees them.
    pub(crate) fn save(&mut self) {
        self.data_stack.push(self.registers[REG_A]);
        self.data_stack.push(self.registers[REG_B]);
    }

    /// `DUP`: copies the aggregate addressed at the given stack offset
    /// into a fresh allocation of the same size.
    pub(crate) fn dup(&mut self, operand: u8) -> Result<(), RuntimeError> {
        let source = self.stack_entry(operand)?;
        let len = self.mem_read(source) as usize + 1;
        let target = self
            .memory_map
            .acquire(len)
            .ok_or(RuntimeError::OutOfMemory { cells: len })?;

        for index in 0..len {
            let value = self.mem_read(source.wrapping_add(index as u8));
            self.mem_write(target.wrapping_add(index as u8), value);
        }

        self.data_stack.push(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryMap;

    #[test]
    fn first_fit_reuses_the_lowest_hole() {
        let mut map = MemoryMap::new(100);
        let a = map.acquire(2).unwrap();
        let b = map.acquire(3).unwrap();
        assert_eq!(100, a);
        assert_eq!(102, b);

        map.release(a, 2);
        assert_eq!(100, map.acquire(1).unwrap());
        assert_eq!(101, map.acquire(1).unwrap());
    }

    #[test]
    fn acquire_release_round_trip_clears_the_map() {
        let mut map = MemoryMap::new(10);
        let address = map.acquire(7).unwrap();
        assert!(!map.is_clear());
        map.release(address, 7);
        assert!(map.is_clear());
    }

    #[test]
    fn oversized_requests_fail_without_marking() {
        let mut map = MemoryMap::new(238);
        assert!(map.acquire(3).is_none());
        assert!(map.is_clear());
    }

    #[test]
    fn holes_are_not_coalesced_across_live_entries() {
        let mut map = MemoryMap::new(200);
        let a = map.acquire(1).unwrap();
        let _b = map.acquire(1).unwrap();
        let c = map.acquire(1).unwrap();
        map.release(a, 1);
        map.release(c, 1);

        // A two-cell request cannot straddle the live middle cell.
        assert_eq!(203, map.acquire(2).unwrap());
    }
}
