//! Foreign memory bridge.
//!
//! [`Arena`] is an exclusive session over one kernel's linear memory.
//! Buffers staged through it are [`ArenaBuf`] handles that borrow the
//! session, so a handle can only be released against the arena that
//! produced it and cannot outlive it. Releasing consumes the handle and
//! dropping an unreleased handle releases it, which makes double release
//! and use-after-release unrepresentable.
//!
//! Sensitivity is chosen at allocation time. Buffers created through
//! [`Arena::alloc_secret`] or [`Arena::stage_secret`] are zeroed inside the
//! kernel's memory before being freed, on every path.

use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::ops::Range;

use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result};
use crate::kernel::{Kernel, ParamSet, Ptr, Status};

/// Counters describing bridge traffic against one kernel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    /// Buffers allocated in the arena.
    pub allocations: u64,
    /// Buffers released without wiping.
    pub releases: u64,
    /// Buffers wiped and released.
    pub secure_releases: u64,
    /// Kernel primitives invoked.
    pub kernel_calls: u64,
}

impl BridgeStats {
    /// Buffers allocated but not yet released.
    pub fn live(&self) -> u64 {
        self.allocations - self.releases - self.secure_releases
    }

    /// Add another set of counters into this one.
    pub fn merge(&mut self, other: &BridgeStats) {
        self.allocations += other.allocations;
        self.releases += other.releases;
        self.secure_releases += other.secure_releases;
        self.kernel_calls += other.kernel_calls;
    }
}

/// Exclusive session over a kernel's linear memory.
pub struct Arena<'k> {
    kernel: RefCell<&'k mut dyn Kernel>,
    params: ParamSet,
    stats: Cell<BridgeStats>,
}

impl<'k> Arena<'k> {
    /// Open a session on `kernel`.
    pub fn new(kernel: &'k mut dyn Kernel) -> Self {
        let params = kernel.params();
        Self {
            kernel: RefCell::new(kernel),
            params,
            stats: Cell::new(BridgeStats::default()),
        }
    }

    /// Parameter set of the underlying kernel.
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    /// Traffic counters for this session.
    pub fn stats(&self) -> BridgeStats {
        self.stats.get()
    }

    /// Allocate an uninitialized buffer of `size` bytes.
    pub fn alloc(&self, size: usize) -> Result<ArenaBuf<'_, 'k>> {
        self.allocate(size, false)
    }

    /// Allocate an uninitialized buffer that will be wiped on release.
    pub fn alloc_secret(&self, size: usize) -> Result<ArenaBuf<'_, 'k>> {
        self.allocate(size, true)
    }

    /// Allocate a buffer of exactly `data.len()` bytes and copy `data` in.
    pub fn stage(&self, data: &[u8]) -> Result<ArenaBuf<'_, 'k>> {
        let mut buf = self.allocate(data.len(), false)?;
        buf.write(data)?;
        Ok(buf)
    }

    /// Like [`Arena::stage`], for seed or secret key material.
    pub fn stage_secret(&self, data: &[u8]) -> Result<ArenaBuf<'_, 'k>> {
        let mut buf = self.allocate(data.len(), true)?;
        buf.write(data)?;
        Ok(buf)
    }

    /// Invoke a kernel primitive and report whether it succeeded.
    ///
    /// Pointers passed to the primitive must come from buffers of this arena.
    pub fn invoke<F>(&self, primitive: F) -> bool
    where
        F: FnOnce(&mut dyn Kernel) -> Status,
    {
        self.bump(|s| s.kernel_calls += 1);
        let mut kernel = self.kernel.borrow_mut();
        primitive(&mut **kernel).is_ok()
    }

    fn allocate(&self, size: usize, secret: bool) -> Result<ArenaBuf<'_, 'k>> {
        let mut kernel = self.kernel.borrow_mut();
        let ptr = kernel
            .malloc(size)
            .ok_or(Error::AllocationFailed { requested: size })?;

        if ptr == 0 || region(ptr, size).end > kernel.memory().len() {
            kernel.free(ptr);
            return Err(Error::MemoryFault {
                offset: ptr,
                len: size,
            });
        }
        drop(kernel);

        self.bump(|s| s.allocations += 1);
        Ok(ArenaBuf {
            arena: self,
            ptr,
            len: size,
            secret,
        })
    }

    fn release(&self, ptr: Ptr, len: usize, wipe: bool) {
        let mut kernel = self.kernel.borrow_mut();
        if wipe {
            if let Some(bytes) = kernel.memory_mut().get_mut(region(ptr, len)) {
                bytes.zeroize();
            }
        }
        kernel.free(ptr);
        drop(kernel);

        if wipe {
            self.bump(|s| s.secure_releases += 1);
        } else {
            self.bump(|s| s.releases += 1);
        }
    }

    fn bump(&self, f: impl FnOnce(&mut BridgeStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("params", &self.params)
            .field("stats", &self.stats.get())
            .finish()
    }
}

/// A buffer living in kernel memory, owned by exactly one call site.
pub struct ArenaBuf<'a, 'k> {
    arena: &'a Arena<'k>,
    ptr: Ptr,
    len: usize,
    secret: bool,
}

impl ArenaBuf<'_, '_> {
    /// Offset of the buffer in the kernel's linear memory.
    pub fn ptr(&self) -> Ptr {
        self.ptr
    }

    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the buffer is wiped on release.
    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// Copy `data` into the start of the buffer.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.len {
            return Err(Error::MemoryFault {
                offset: self.ptr,
                len: data.len(),
            });
        }
        let mut kernel = self.arena.kernel.borrow_mut();
        kernel
            .memory_mut()
            .get_mut(region(self.ptr, data.len()))
            .ok_or(Error::MemoryFault {
                offset: self.ptr,
                len: data.len(),
            })?
            .copy_from_slice(data);
        Ok(())
    }

    /// Copy the buffer contents out without releasing it.
    pub fn read(&self) -> Result<Vec<u8>> {
        let kernel = self.arena.kernel.borrow();
        kernel
            .memory()
            .get(region(self.ptr, self.len))
            .map(<[u8]>::to_vec)
            .ok_or(Error::MemoryFault {
                offset: self.ptr,
                len: self.len,
            })
    }

    /// Copy sensitive contents out into a self-wiping vector.
    pub fn read_secret(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.read().map(Zeroizing::new)
    }

    /// Return the buffer to the arena.
    ///
    /// Secret buffers are still wiped first.
    pub fn release(self) {
        let this = core::mem::ManuallyDrop::new(self);
        this.arena.release(this.ptr, this.len, this.secret);
    }

    /// Zero the buffer inside kernel memory, then return it to the arena.
    pub fn release_secure(self) {
        let this = core::mem::ManuallyDrop::new(self);
        this.arena.release(this.ptr, this.len, true);
    }
}

impl Drop for ArenaBuf<'_, '_> {
    fn drop(&mut self) {
        self.arena.release(self.ptr, self.len, self.secret);
    }
}

impl fmt::Debug for ArenaBuf<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaBuf")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("secret", &self.secret)
            .finish()
    }
}

fn region(ptr: Ptr, len: usize) -> Range<usize> {
    let start = ptr as usize;
    start..start.saturating_add(len)
}
