//! # Sigil Core
//!
//! Building blocks shared by Sigil kernels and the signing protocol.
//!
//! This crate provides:
//! - The error taxonomy
//! - The [`Kernel`] interface a signature engine exposes
//! - The foreign memory bridge ([`Arena`], [`ArenaBuf`]) with plain and
//!   secure release
//! - Wire formats for signature blobs and message frames

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

extern crate alloc;

mod bridge;
mod error;
mod kernel;
pub mod wire;

pub use bridge::{Arena, ArenaBuf, BridgeStats};
pub use error::{Error, Result};
pub use kernel::{Kernel, ParamSet, Ptr, Status};
pub use wire::Signature;

/// Re-export zeroize for convenience.
pub use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};
