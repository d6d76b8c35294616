//! Paged linear memory with a first-fit allocator.
//!
//! Mirrors a WebAssembly linear memory: a flat byte array grown in 64 KiB
//! pages up to a configured maximum. Offset `0` is reserved so that a null
//! pointer is never handed out.

use std::collections::BTreeMap;
use std::ops::Range;

use sigil_core::Ptr;

/// Linear memory page size (64 KiB).
pub const PAGE_SIZE: usize = 65536;

/// Linear memory configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Pages reserved at startup.
    pub initial_pages: usize,
    /// Upper bound the memory may grow to.
    pub max_pages: usize,
    /// Allocation alignment in bytes (power of two).
    pub alignment: usize,
}

impl ArenaConfig {
    /// Small memory for constrained hosts (256 KiB, fixed).
    pub fn compact() -> Self {
        ArenaConfig {
            initial_pages: 4,
            max_pages: 4,
            alignment: 8,
        }
    }
}

impl Default for ArenaConfig {
    /// 1 MiB initially, growable to 64 MiB, 16-byte alignment.
    fn default() -> Self {
        ArenaConfig {
            initial_pages: 16,
            max_pages: 1024,
            alignment: 16,
        }
    }
}

/// Linear memory plus allocator bookkeeping.
#[derive(Debug)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    max_pages: usize,
    alignment: usize,
    /// Live allocations: offset -> rounded length.
    live: BTreeMap<Ptr, usize>,
    /// Free blocks: offset -> length, coalesced.
    free: BTreeMap<Ptr, usize>,
}

impl LinearMemory {
    /// Reserve memory according to `config`.
    pub fn new(config: ArenaConfig) -> Self {
        let alignment = config.alignment.max(1).next_power_of_two();
        let initial_pages = config.initial_pages.max(1);
        let size = initial_pages * PAGE_SIZE;

        let mut free = BTreeMap::new();
        free.insert(alignment as Ptr, size - alignment);

        Self {
            bytes: vec![0u8; size],
            max_pages: config.max_pages.max(initial_pages),
            alignment,
            live: BTreeMap::new(),
            free,
        }
    }

    /// Raw memory.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Raw memory, writable.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Current number of pages.
    pub fn pages(&self) -> usize {
        self.bytes.len() / PAGE_SIZE
    }

    /// Number of live allocations.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Bytes held by live allocations, alignment padding included.
    pub fn used_bytes(&self) -> usize {
        self.live.values().sum()
    }

    /// Allocate at least `size` bytes.
    pub fn malloc(&mut self, size: usize) -> Option<Ptr> {
        let rounded = self.round(size.max(1))?;

        let ptr = match self.first_fit(rounded) {
            Some(ptr) => ptr,
            None => {
                self.grow(rounded)?;
                self.first_fit(rounded)?
            }
        };

        let block = self.free.remove(&ptr)?;
        if block > rounded {
            self.free.insert(ptr + rounded as Ptr, block - rounded);
        }
        self.live.insert(ptr, rounded);
        Some(ptr)
    }

    /// Release a live allocation. Returns false for unknown pointers.
    pub fn free(&mut self, ptr: Ptr) -> bool {
        let Some(len) = self.live.remove(&ptr) else {
            return false;
        };

        let mut start = ptr;
        let mut len = len;

        if let Some((&next, &next_len)) = self.free.range(ptr..).next() {
            if next == start + len as Ptr {
                self.free.remove(&next);
                len += next_len;
            }
        }
        if let Some((&prev, &prev_len)) = self.free.range(..ptr).next_back() {
            if prev + prev_len as Ptr == start {
                self.free.remove(&prev);
                start = prev;
                len += prev_len;
            }
        }

        self.free.insert(start, len);
        true
    }

    /// Bounds of `len` bytes at `ptr`, if they lie inside one live allocation.
    pub fn region(&self, ptr: Ptr, len: usize) -> Option<Range<usize>> {
        let (&base, &block) = self.live.range(..=ptr).next_back()?;
        let start = ptr as usize;
        let end = start.checked_add(len)?;
        (end <= base as usize + block).then_some(start..end)
    }

    /// Read `len` bytes of a live allocation.
    pub fn get(&self, ptr: Ptr, len: usize) -> Option<&[u8]> {
        let range = self.region(ptr, len)?;
        self.bytes.get(range)
    }

    /// Overwrite bytes of a live allocation.
    pub fn put(&mut self, ptr: Ptr, data: &[u8]) -> bool {
        match self.region(ptr, data.len()) {
            Some(range) => {
                self.bytes[range].copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    fn round(&self, size: usize) -> Option<usize> {
        let mask = self.alignment - 1;
        size.checked_add(mask).map(|s| s & !mask)
    }

    fn first_fit(&self, size: usize) -> Option<Ptr> {
        self.free
            .iter()
            .find(|(_, &len)| len >= size)
            .map(|(&ptr, _)| ptr)
    }

    fn grow(&mut self, size: usize) -> Option<()> {
        let old_len = self.bytes.len();

        // A free block touching the end of memory can absorb part of the request.
        let tail = self
            .free
            .iter()
            .next_back()
            .filter(|(&ptr, &len)| ptr as usize + len == old_len)
            .map(|(&ptr, &len)| (ptr, len));
        let missing = size - tail.map_or(0, |(_, len)| len);

        let extra_pages = missing.div_ceil(PAGE_SIZE);
        let new_pages = self.pages() + extra_pages;
        let new_len = new_pages.checked_mul(PAGE_SIZE)?;
        if new_pages > self.max_pages || new_len > Ptr::MAX as usize {
            return None;
        }

        self.bytes.resize(new_len, 0);
        match tail {
            Some((ptr, len)) => {
                self.free.insert(ptr, len + extra_pages * PAGE_SIZE);
            }
            None => {
                self.free.insert(old_len as Ptr, extra_pages * PAGE_SIZE);
            }
        }
        tracing::debug!(pages = new_pages, "linear memory grown");
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> LinearMemory {
        LinearMemory::new(ArenaConfig {
            initial_pages: 1,
            max_pages: 2,
            alignment: 16,
        })
    }

    #[test]
    fn test_never_returns_null() {
        let mut mem = small();
        let ptr = mem.malloc(0).unwrap();
        assert_ne!(ptr, 0);
        assert_eq!(ptr % 16, 0);
    }

    #[test]
    fn test_allocations_do_not_overlap() {
        let mut mem = small();
        let a = mem.malloc(10).unwrap();
        let b = mem.malloc(40).unwrap();
        let c = mem.malloc(1).unwrap();

        assert!(b >= a + 16);
        assert!(c >= b + 48);
        assert_eq!(mem.live_count(), 3);
        assert_eq!(mem.used_bytes(), 16 + 48 + 16);
    }

    #[test]
    fn test_free_and_reuse() {
        let mut mem = small();
        let a = mem.malloc(100).unwrap();
        let _b = mem.malloc(100).unwrap();

        assert!(mem.free(a));
        assert!(!mem.free(a), "second free of the same pointer is refused");

        let c = mem.malloc(64).unwrap();
        assert_eq!(c, a, "first fit reuses the freed block");
    }

    #[test]
    fn test_coalescing_restores_full_block() {
        let mut mem = small();
        let ptrs: Vec<_> = (0..8).map(|_| mem.malloc(1000).unwrap()).collect();
        for ptr in ptrs.iter().rev().step_by(2) {
            mem.free(*ptr);
        }
        for ptr in ptrs.iter().step_by(2) {
            mem.free(*ptr);
        }
        assert_eq!(mem.live_count(), 0);

        // Everything merged back, so a near-page allocation fits without growth.
        assert!(mem.malloc(PAGE_SIZE - 64).is_some());
        assert_eq!(mem.pages(), 1);
    }

    #[test]
    fn test_grows_up_to_max_pages() {
        let mut mem = small();
        let big = mem.malloc(PAGE_SIZE + 100).unwrap();
        assert_eq!(mem.pages(), 2);
        assert!(mem.region(big, PAGE_SIZE + 100).is_some());

        assert!(mem.malloc(PAGE_SIZE).is_none(), "max_pages is a hard limit");
    }

    #[test]
    fn test_region_confined_to_allocation() {
        let mut mem = small();
        let a = mem.malloc(32).unwrap();

        assert!(mem.region(a, 32).is_some());
        assert!(mem.region(a + 8, 24).is_some());
        assert!(mem.region(a, 33).is_none());
        assert!(mem.region(a + 32, 1).is_none());
        assert!(mem.region(1, 1).is_none());
    }

    #[test]
    fn test_put_and_get() {
        let mut mem = small();
        let a = mem.malloc(4).unwrap();

        assert!(mem.put(a, b"abcd"));
        assert_eq!(mem.get(a, 4), Some(&b"abcd"[..]));
        assert!(!mem.put(a, &[0u8; 64]));
    }
}
