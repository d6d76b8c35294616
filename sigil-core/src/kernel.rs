//! The kernel interface.
//!
//! A kernel is an opaque signature engine that owns a private linear memory.
//! Every primitive takes offsets into that memory, never host slices, and
//! reports success as a raw status word. The host side only ever touches the
//! memory through [`crate::Arena`].

/// Offset into a kernel's linear memory. `0` is never a valid allocation.
pub type Ptr = u32;

/// Raw status word returned by kernel primitives.
///
/// Nonzero means success, zero means failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Status(pub i32);

impl Status {
    /// Success status.
    pub const OK: Status = Status(1);

    /// Failure status.
    pub const FAIL: Status = Status(0);

    /// Whether the primitive reported success.
    #[inline]
    pub fn is_ok(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Status {
    fn from(ok: bool) -> Self {
        if ok {
            Status::OK
        } else {
            Status::FAIL
        }
    }
}

/// Fixed-size parameters of one algorithm, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamSet {
    /// Key generation seed size.
    pub seed_bytes: usize,
    /// Public key size.
    pub public_key_bytes: usize,
    /// Secret key size.
    pub secret_key_bytes: usize,
    /// Maximum signature size, header and nonce included.
    pub signature_bytes: usize,
    /// Signing salt size.
    pub salt_bytes: usize,
    /// Nonce size embedded in each signature.
    pub nonce_bytes: usize,
}

/// A loaded signature kernel.
///
/// Implementations are not required to be internally synchronized; every
/// method that touches memory takes `&mut self`, so callers sharing one
/// kernel must serialize access.
///
/// # Memory
///
/// `malloc` returns an offset into [`Kernel::memory`] with at least `size`
/// addressable bytes, or `None` when the arena is exhausted. Contents of a
/// fresh allocation are unspecified.
///
/// # Primitives
///
/// All pointer arguments must come from `malloc` on the same kernel and be
/// sized according to [`Kernel::params`]. The message pointer addresses a
/// frame of an 8-byte big-endian length followed by that many bytes.
pub trait Kernel: Send {
    /// Fixed parameter set of this kernel.
    fn params(&self) -> ParamSet;

    /// Allocate `size` bytes of linear memory.
    fn malloc(&mut self, size: usize) -> Option<Ptr>;

    /// Return an allocation to the arena.
    fn free(&mut self, ptr: Ptr);

    /// The whole linear memory.
    fn memory(&self) -> &[u8];

    /// The whole linear memory, writable.
    fn memory_mut(&mut self) -> &mut [u8];

    /// Derive a key pair from `seed`, writing the public key to `pk` and the
    /// secret key to `sk`.
    fn genkey(&mut self, seed: Ptr, pk: Ptr, sk: Ptr) -> Status;

    /// Derive the public key for the secret key at `sk`.
    fn public_key_create(&mut self, sk: Ptr, pk: Ptr) -> Status;

    /// Sign the framed message at `msg`, writing the signature blob to `out`.
    fn sign(&mut self, out: Ptr, msg: Ptr, sk: Ptr, salt: Ptr) -> Status;

    /// Verify the signature blob at `sig` over the framed message at `msg`.
    fn verify(&mut self, sig: Ptr, msg: Ptr, pk: Ptr) -> Status;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_nonzero_is_success() {
        assert!(Status(1).is_ok());
        assert!(Status(-1).is_ok());
        assert!(Status(42).is_ok());
        assert!(!Status(0).is_ok());
    }

    #[test]
    fn test_status_from_bool() {
        assert_eq!(Status::from(true), Status::OK);
        assert_eq!(Status::from(false), Status::FAIL);
    }
}
