//! Canonical byte encodings.

use crate::error::Error;

/// Canonical byte representation of keys and signatures.
///
/// # Canonical Format
///
/// - All field elements are converted to canonical `u32` form (not Montgomery)
/// - All `u32`/`u64` values are encoded in little-endian order
/// - Parameter sets appear as their one-byte tag
///
/// Every type has exactly one byte representation; decoding rejects anything
/// else with [`Error::Deserialization`] (or [`Error::ParameterMismatch`] for a
/// recognized-but-different parameter tag).
pub trait Serializable: Sized {
    /// Converts this object to its canonical byte representation.
    fn to_bytes(&self) -> Vec<u8>;

    /// Parses an object from its canonical byte representation.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error>;
}
