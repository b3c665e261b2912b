use rand::Rng;

use crate::MESSAGE_LENGTH;
use crate::error::Error;
use crate::serialization::Serializable;

/// Retention policy for materialised subtrees.
///
/// Chosen at key generation; it decides what `advance_preparation` does with
/// the oldest prepared subtree and therefore which serialized form
/// [`Serializable::to_bytes`] produces for the secret key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRetention {
    /// Keep every materialised subtree. The prepared window only grows at
    /// the end; a fully advanced key serializes with its complete tree and
    /// signs any active epoch without recomputation.
    Full,
    /// Keep only the most recent subtrees. The prepared window slides; the
    /// key serializes in the minimal form (PRF key and metadata only).
    Minimal,
}

/// Trait to model the secret key of a synchronized signature scheme: epochs
/// must be prepared before they can be signed for, and preparation advances
/// through the activation interval one subtree at a time.
pub trait SignatureSchemeSecretKey: Sized {
    /// Range of epochs this key can ever sign for.
    fn activation_interval(&self) -> std::ops::Range<u64>;

    /// Range of epochs the key is currently prepared to sign for.
    /// Empty for a key whose subtrees are not materialised yet.
    fn prepared_interval(&self) -> std::ops::Range<u64>;

    /// Materialises the initial preparation window if it is not present
    /// (e.g. after decoding the minimal serialized form). Does nothing on an
    /// already prepared key.
    fn prepare(&mut self) -> Result<(), Error>;

    /// Extends the prepared window by one subtree. Depending on the key's
    /// [`KeyRetention`], the oldest subtree is kept or dropped. Fails with
    /// [`Error::LifetimeExhausted`] once the window has reached the end of
    /// the activation interval.
    fn advance_preparation(&mut self) -> Result<(), Error>;
}

/// Trait to model a synchronized signature scheme, i.e., a signature scheme
/// in which signing takes the current epoch as additional input, and each
/// epoch can be used at most once.
///
/// It is the responsibility of the caller to never sign twice at the same
/// epoch; the deterministic rho derivation merely makes re-signing the same
/// `(epoch, message)` pair harmless.
pub trait SignatureScheme {
    type PublicKey: Serializable;
    type SecretKey: Serializable + SignatureSchemeSecretKey;
    type Signature: Serializable;

    /// Total number of epochs, i.e., 2^lifetime_log2.
    const LIFETIME: u64;

    /// Wire tag of this instantiation's parameter set.
    const PARAMETER_TAG: u8;

    /// Generates a new key pair whose secret key can sign for epochs in
    /// `[activation_epoch, activation_epoch + num_active_epochs)`. The
    /// interval may be widened to align with subtree boundaries; read it
    /// back from the returned key. The public key commits to the entire
    /// epoch space regardless.
    fn key_gen<R: Rng>(
        rng: &mut R,
        activation_epoch: u64,
        num_active_epochs: u64,
        retention: KeyRetention,
    ) -> Result<(Self::PublicKey, Self::SecretKey), Error>;

    /// Signs a message for the given epoch. The epoch must be in the key's
    /// activation interval and prepared window. Signing is deterministic in
    /// `(secret key, epoch, message)`.
    fn sign(
        sk: &Self::SecretKey,
        epoch: u64,
        message: &[u8; MESSAGE_LENGTH],
    ) -> Result<Self::Signature, Error>;

    /// Verifies a signature. Cryptographic mismatch is `Ok(false)`;
    /// structural problems (epoch beyond the lifetime, foreign parameter
    /// sets) are errors.
    fn verify(
        pk: &Self::PublicKey,
        epoch: u64,
        message: &[u8; MESSAGE_LENGTH],
        sig: &Self::Signature,
    ) -> Result<bool, Error>;

    /// Function to check internal consistency of any given parameters.
    /// For testing only, and expected to panic if something is wrong.
    #[cfg(test)]
    fn internal_consistency_check();
}

pub mod generalized_xmss;
