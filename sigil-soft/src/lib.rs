//! # Sigil Soft Kernel
//!
//! An in-process implementation of the [`sigil_core::Kernel`] interface.
//!
//! The kernel owns a paged linear memory with its own allocator, exactly like
//! a precompiled module would, and runs CRYSTALS-Dilithium underneath. Each
//! signature carries a 40-byte nonce derived from the caller's salt and the
//! message, so two signatures over the same message with different salts
//! differ while both verify.
//!
//! # Example
//!
//! ```ignore
//! use sigil_soft::{ArenaConfig, Level, SoftKernel};
//!
//! let kernel = SoftKernel::start(Level::Dilithium3, ArenaConfig::default())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod engine;
mod kernel;
mod memory;

pub use engine::{Level, SEED_BYTES};
pub use kernel::{SoftKernel, StartupError, NONCE_BYTES, SALT_BYTES};
pub use memory::{ArenaConfig, LinearMemory, PAGE_SIZE};
