//! Cryptographic primitives for the vault.
//!
//! Provides password-based key derivation and authenticated encryption.

pub mod aead;
pub mod kdf;

pub use aead::{CipherSuite, decrypt, encrypt, secure_random};
pub use kdf::{KdfParams, derive_key, generate_salt};

/// Length of the salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the authentication tag appended by every supported AEAD.
pub const TAG_LEN: usize = 16;
/// Nonce length of XChaCha20-Poly1305.
pub const XCHACHA_NONCE_LEN: usize = 24;
/// Nonce length of AES-256-GCM.
pub const AES_GCM_NONCE_LEN: usize = 12;
