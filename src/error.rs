//! Error kinds surfaced by the signature scheme.
//!
//! Cryptographic mismatches during verification are reported as `Ok(false)`,
//! never as an error. The variants here cover structural and state failures
//! only, and none of them is retried internally except for target-sum
//! rejection sampling, which is bounded and reported as [`Error::EncodingRejected`].

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operands carry incompatible parameter sets.
    #[error("parameter mismatch: expected tag {expected:#04x}, found {found:#04x}")]
    ParameterMismatch { expected: u8, found: u8 },

    /// The epoch lies outside the key's activation interval.
    #[error("epoch {epoch} outside activation interval [{start}, {end})")]
    EpochOutOfRange { epoch: u64, start: u64, end: u64 },

    /// The epoch exceeds the scheme lifetime entirely.
    #[error("epoch {epoch} exceeds key lifetime 2^{lifetime_log2}")]
    EpochTooLarge { epoch: u64, lifetime_log2: usize },

    /// The preparation window does not contain the epoch.
    #[error("epoch {epoch} not in prepared window [{start}, {end}); advance preparation first")]
    EpochNotPrepared { epoch: u64, start: u64, end: u64 },

    /// Preparation cannot be advanced past the end of the activation interval.
    #[error("preparation exhausted: no epochs left after {end}")]
    LifetimeExhausted { end: u64 },

    /// The target-sum sampler ran out of attempts.
    #[error("message encoding rejected after {attempts} attempts")]
    EncodingRejected { attempts: usize },

    /// A byte stream does not match the expected layout, or an embedded
    /// tag is unknown.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl From<ssz::DecodeError> for Error {
    fn from(err: ssz::DecodeError) -> Self {
        Error::Deserialization(format!("{err:?}"))
    }
}
