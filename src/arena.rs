//! Command-lifetime scratch arena
//!
//! A bulk-reserved byte region owned by the command context. Subsystems park
//! short-lived metadata scratch in it and address it by range, so the whole
//! region is released in one step at teardown instead of through many small
//! frees.

use crate::error::{Result, VolmanError};
use std::ops::Range;

pub struct Arena {
    buf: Vec<u8>,
}

impl Arena {
    /// Reserve an arena of `bytes` capacity up front. Failure to reserve is
    /// reported as an allocation error rather than aborting the process.
    pub fn with_capacity(bytes: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes).map_err(|e| {
            VolmanError::Allocation(format!("arena of {} bytes: {}", bytes, e))
        })?;
        Ok(Arena { buf })
    }

    /// Copy `data` into the arena and return the range addressing it.
    pub fn alloc(&mut self, data: &[u8]) -> Range<usize> {
        let start = self.buf.len();
        self.buf.extend_from_slice(data);
        start..self.buf.len()
    }

    /// Copy a string into the arena.
    pub fn alloc_str(&mut self, s: &str) -> Range<usize> {
        self.alloc(s.as_bytes())
    }

    /// Resolve a range previously returned by [`alloc`](Self::alloc).
    pub fn get(&self, range: Range<usize>) -> &[u8] {
        &self.buf[range]
    }

    /// Drop all allocations at once; capacity is retained.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }
}
