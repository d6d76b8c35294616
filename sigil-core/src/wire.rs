//! Wire formats crossing the kernel boundary.
//!
//! Signature blob:
//!
//! ```text
//! [u16 LE declared length][nonce][payload: declared length bytes]
//! ```
//!
//! Message frame handed to the kernel for both signing and verification:
//!
//! ```text
//! [u64 BE message length][message]
//! ```
//!
//! The two length fields deliberately use different byte orders; existing
//! kernels read them that way.

use alloc::vec::Vec;

use crate::error::{Error, Result};

/// Size of the declared-length field at the start of a signature.
pub const LENGTH_FIELD_BYTES: usize = 2;

/// Size of the length prefix of a message frame.
pub const FRAME_HEADER_BYTES: usize = 8;

/// Largest message that can be framed into a 32-bit linear memory.
pub const MAX_MESSAGE_BYTES: usize = u32::MAX as usize - FRAME_HEADER_BYTES;

/// Build the length-prefixed message frame.
pub fn frame_message(message: &[u8]) -> Result<Vec<u8>> {
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(Error::MessageTooLong {
            actual: message.len(),
        });
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_BYTES + message.len());
    frame.extend_from_slice(&(message.len() as u64).to_be_bytes());
    frame.extend_from_slice(message);
    Ok(frame)
}

/// Length announced by a frame header, if the header is present.
pub fn frame_len(header: &[u8]) -> Option<u64> {
    let bytes: [u8; FRAME_HEADER_BYTES] = header.get(..FRAME_HEADER_BYTES)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Message bytes of a complete frame.
///
/// Returns `None` if the frame is shorter than its header announces.
pub fn unframe(frame: &[u8]) -> Option<&[u8]> {
    let len = usize::try_from(frame_len(frame)?).ok()?;
    frame.get(FRAME_HEADER_BYTES..FRAME_HEADER_BYTES.checked_add(len)?)
}

/// Declared payload length of a signature blob.
pub fn declared_len(blob: &[u8]) -> Option<usize> {
    let bytes: [u8; LENGTH_FIELD_BYTES] = blob.get(..LENGTH_FIELD_BYTES)?.try_into().ok()?;
    Some(u16::from_le_bytes(bytes) as usize)
}

/// Total blob length implied by a declared length.
pub fn blob_len(declared: usize, nonce_bytes: usize) -> usize {
    LENGTH_FIELD_BYTES + nonce_bytes + declared
}

/// Whether the blob's declared length matches its actual length.
pub fn is_well_formed(blob: &[u8], nonce_bytes: usize) -> bool {
    declared_len(blob).is_some_and(|declared| blob_len(declared, nonce_bytes) == blob.len())
}

/// Write a signature blob into `out`, returning the number of bytes used.
///
/// Returns `None` if the payload does not fit the length field or `out`.
pub fn encode_signature(out: &mut [u8], nonce: &[u8], payload: &[u8]) -> Option<usize> {
    let declared = u16::try_from(payload.len()).ok()?;
    let total = blob_len(payload.len(), nonce.len());
    let out = out.get_mut(..total)?;

    let (header, rest) = out.split_at_mut(LENGTH_FIELD_BYTES);
    let (nonce_out, payload_out) = rest.split_at_mut(nonce.len());
    header.copy_from_slice(&declared.to_le_bytes());
    nonce_out.copy_from_slice(nonce);
    payload_out.copy_from_slice(payload);
    Some(total)
}

/// A signature blob whose declared length matches its size.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    bytes: Vec<u8>,
    nonce_bytes: usize,
}

impl Signature {
    /// Validate a stored blob.
    pub fn parse(bytes: &[u8], nonce_bytes: usize) -> Option<Self> {
        is_well_formed(bytes, nonce_bytes).then(|| Self {
            bytes: bytes.to_vec(),
            nonce_bytes,
        })
    }

    /// Cut the meaningful prefix out of a fixed-capacity kernel output buffer.
    ///
    /// Padding past the declared length is discarded. Returns `None` if the
    /// header claims more bytes than the buffer holds.
    pub fn from_kernel_output(mut buf: Vec<u8>, nonce_bytes: usize) -> Option<Self> {
        let total = blob_len(declared_len(&buf)?, nonce_bytes);
        if total > buf.len() {
            return None;
        }
        buf.truncate(total);
        buf.shrink_to_fit();
        Some(Self {
            bytes: buf,
            nonce_bytes,
        })
    }

    /// Declared payload length.
    pub fn declared_len(&self) -> usize {
        self.bytes.len() - LENGTH_FIELD_BYTES - self.nonce_bytes
    }

    /// Kernel-produced nonce.
    pub fn nonce(&self) -> &[u8] {
        &self.bytes[LENGTH_FIELD_BYTES..LENGTH_FIELD_BYTES + self.nonce_bytes]
    }

    /// Signature payload.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[LENGTH_FIELD_BYTES + self.nonce_bytes..]
    }

    /// Whole blob, as transmitted.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Blob length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; a blob carries at least its header.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Take the blob bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl core::fmt::Debug for Signature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Signature")
            .field("len", &self.bytes.len())
            .field("declared_len", &self.declared_len())
            .finish()
    }
}


#[cfg(all(test, feature = "std"))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn encoded_blob_is_well_formed(
            nonce in prop::collection::vec(any::<u8>(), 0..48),
            payload in prop::collection::vec(any::<u8>(), 0..512),
            padding in 0usize..64,
        ) {
            let mut out = vec![0u8; LENGTH_FIELD_BYTES + nonce.len() + payload.len() + padding];
            let used = encode_signature(&mut out, &nonce, &payload).unwrap();
            prop_assert!(is_well_formed(&out[..used], nonce.len()));

            let sig = Signature::from_kernel_output(out, nonce.len()).unwrap();
            prop_assert_eq!(sig.nonce(), &nonce[..]);
            prop_assert_eq!(sig.payload(), &payload[..]);
        }

        #[test]
        fn parse_agrees_with_declared_length(blob in prop::collection::vec(any::<u8>(), 0..96), nonce_bytes in 0usize..16) {
            let expected = declared_len(&blob)
                .map(|declared| blob_len(declared, nonce_bytes) == blob.len())
                .unwrap_or(false);
            prop_assert_eq!(Signature::parse(&blob, nonce_bytes).is_some(), expected);
        }
    }
}
