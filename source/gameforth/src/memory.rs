//! Byte-addressed VM memory.
//!
//! Compiled code, inline string data, variables and `allot`ed buffers all
//! live in one fixed-size buffer. Space is handed out by bumping `here`,
//! and cells are stored as little-endian `i32`s.

use core::{fmt, mem::size_of};

/// Size of one cell in bytes.
pub const CELL: usize = size_of::<i32>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// An access of `len` bytes at `addr` falls outside the buffer.
    OutOfBounds { addr: i64, len: usize },
    /// A bump allocation of `requested` bytes did not fit.
    Exhausted { requested: usize, available: usize },
    NegativeAllot(i32),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::OutOfBounds { addr, len } => {
                write!(f, "memory access of {len} byte(s) at address {addr} is out of bounds")
            }
            MemoryError::Exhausted { requested, available } => write!(
                f,
                "out of memory: requested {requested} byte(s), {available} available"
            ),
            MemoryError::NegativeAllot(n) => write!(f, "cannot allot {n} bytes"),
        }
    }
}

pub struct Memory {
    bytes: Box<[u8]>,
    here: usize,
}

/// Converts a cell value into an address, without bounds checking.
pub fn addr_from_cell(val: i32) -> Result<usize, MemoryError> {
    usize::try_from(val).map_err(|_| MemoryError::OutOfBounds {
        addr: i64::from(val),
        len: 0,
    })
}

/// Converts an address into a cell value.
pub fn cell_from_addr(addr: usize) -> Result<i32, MemoryError> {
    i32::try_from(addr).map_err(|_| MemoryError::OutOfBounds {
        addr: addr as i64,
        len: 0,
    })
}

/// Rounds `addr` up to the next cell boundary.
pub const fn aligned(addr: usize) -> usize {
    (addr + (CELL - 1)) & !(CELL - 1)
}

impl Memory {
    /// Creates a zero-filled memory of `capacity` bytes.
    ///
    /// The capacity is clamped so that every address fits in a cell.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(i32::MAX as usize);
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            here: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// The next free address.
    #[inline]
    pub fn here(&self) -> usize {
        self.here
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.here
    }

    fn range(&self, addr: usize, len: usize) -> Result<core::ops::Range<usize>, MemoryError> {
        match addr.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(addr..end),
            _ => Err(MemoryError::OutOfBounds {
                addr: addr as i64,
                len,
            }),
        }
    }

    pub fn fetch_byte(&self, addr: usize) -> Result<u8, MemoryError> {
        let range = self.range(addr, 1)?;
        Ok(self.bytes[range.start])
    }

    pub fn store_byte(&mut self, addr: usize, val: u8) -> Result<(), MemoryError> {
        let range = self.range(addr, 1)?;
        self.bytes[range.start] = val;
        Ok(())
    }

    pub fn fetch_cell(&self, addr: usize) -> Result<i32, MemoryError> {
        let range = self.range(addr, CELL)?;
        let mut buf = [0u8; CELL];
        buf.copy_from_slice(&self.bytes[range]);
        Ok(i32::from_le_bytes(buf))
    }

    pub fn store_cell(&mut self, addr: usize, val: i32) -> Result<(), MemoryError> {
        let range = self.range(addr, CELL)?;
        self.bytes[range].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    /// Borrows `len` bytes starting at `addr`.
    pub fn bytes(&self, addr: usize, len: usize) -> Result<&[u8], MemoryError> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    /// Reserves `len` zeroed bytes at `here`, returning their address.
    pub fn bump(&mut self, len: usize) -> Result<usize, MemoryError> {
        let available = self.available();
        if len > available {
            return Err(MemoryError::Exhausted {
                requested: len,
                available,
            });
        }
        let addr = self.here;
        self.here += len;
        self.bytes[addr..self.here].fill(0);
        Ok(addr)
    }

    /// Aligns `here` to a cell boundary.
    pub fn align(&mut self) -> Result<(), MemoryError> {
        let pad = aligned(self.here) - self.here;
        self.bump(pad).map(drop)
    }

    /// Appends one aligned cell, returning its address.
    pub fn bump_cell(&mut self, val: i32) -> Result<usize, MemoryError> {
        self.align()?;
        let addr = self.bump(CELL)?;
        self.store_cell(addr, val)?;
        Ok(addr)
    }

    /// Appends raw bytes, returning the address of the first one.
    pub fn bump_bytes(&mut self, data: &[u8]) -> Result<usize, MemoryError> {
        let addr = self.bump(data.len())?;
        self.bytes[addr..addr + data.len()].copy_from_slice(data);
        Ok(addr)
    }

    /// Moves `here` by `n` bytes, as the `allot` word does.
    pub fn allot(&mut self, n: i32) -> Result<usize, MemoryError> {
        let len = usize::try_from(n).map_err(|_| MemoryError::NegativeAllot(n))?;
        self.bump(len)
    }

    /// Rolls `here` back to a previous mark.
    pub(crate) fn truncate(&mut self, mark: usize) {
        if mark < self.here {
            self.here = mark;
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::{aligned, Memory, MemoryError, CELL};

    #[test]
    fn cells_and_bytes() {
        let mut mem = Memory::new(64);
        let a = mem.bump_cell(-2).unwrap();
        assert_eq!(a, 0);
        assert_eq!(mem.fetch_cell(a).unwrap(), -2);
        assert_eq!(mem.fetch_byte(a).unwrap(), 0xFE);

        let s = mem.bump_bytes(b"hi!").unwrap();
        assert_eq!(s, CELL);
        assert_eq!(mem.bytes(s, 3).unwrap(), b"hi!");
        assert_eq!(mem.here(), 7);

        // the next cell lands on a boundary
        let b = mem.bump_cell(7).unwrap();
        assert_eq!(b, 8);
        assert_eq!(aligned(7), 8);
        assert_eq!(aligned(8), 8);
    }

    #[test]
    fn bounds() {
        let mut mem = Memory::new(8);
        assert!(mem.fetch_byte(7).is_ok());
        assert_eq!(
            mem.fetch_byte(8),
            Err(MemoryError::OutOfBounds { addr: 8, len: 1 })
        );
        assert_eq!(
            mem.fetch_cell(6),
            Err(MemoryError::OutOfBounds { addr: 6, len: 4 })
        );
        assert_eq!(
            mem.store_cell(usize::MAX, 1),
            Err(MemoryError::OutOfBounds {
                addr: usize::MAX as i64,
                len: 4
            })
        );

        mem.bump(6).unwrap();
        assert_eq!(
            mem.bump_cell(1),
            Err(MemoryError::Exhausted {
                requested: 4,
                available: 0
            })
        );
        assert_eq!(mem.allot(-1), Err(MemoryError::NegativeAllot(-1)));
    }

    #[test]
    fn truncate_rolls_back() {
        let mut mem = Memory::new(32);
        mem.bump_cell(1).unwrap();
        let mark = mem.here();
        mem.bump_cell(2).unwrap();
        mem.truncate(mark);
        assert_eq!(mem.here(), mark);
        // truncating forward is a no-op
        mem.truncate(mark + 8);
        assert_eq!(mem.here(), mark);
    }
}
