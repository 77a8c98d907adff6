//! Sealing descriptors with an authenticated cipher.
//!
//! The sealed form is `base64(nonce ‖ ciphertext+tag)`: a random 12-byte
//! nonce per seal, with the Poly1305 tag carried inline so any tampering
//! or truncation fails authentication on open. The key is derived from
//! the configured secret with SHA-256, so operators configure a
//! passphrase rather than raw key bytes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};

use crate::{SessionDescriptor, SessionError};

/// ChaCha20-Poly1305 nonces are 96 bits.
const NONCE_LEN: usize = 12;

/// Seals and opens session descriptors under a server-held secret.
#[derive(Clone)]
pub struct DescriptorSealer {
    cipher: ChaCha20Poly1305,
}

impl DescriptorSealer {
    /// Derives the sealing key from a secret passphrase.
    pub fn new(secret: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }

    /// Seals a descriptor into its opaque wire form.
    pub fn seal(&self, descriptor: &SessionDescriptor) -> String {
        let plaintext =
            serde_json::to_vec(descriptor).expect("descriptor fields always serialize");
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .expect("ChaCha20-Poly1305 encryption is infallible for in-memory data");

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        BASE64.encode(sealed)
    }

    /// Opens a sealed descriptor, authenticating it in the process.
    ///
    /// Fails with [`SessionError::InvalidDescriptor`] on any tampering,
    /// truncation, or a blob sealed under a different secret.
    pub fn open(&self, sealed: &str) -> Result<SessionDescriptor, SessionError> {
        let bytes = BASE64
            .decode(sealed)
            .map_err(|e| SessionError::InvalidDescriptor(format!("bad encoding: {e}")))?;
        if bytes.len() <= NONCE_LEN {
            return Err(SessionError::InvalidDescriptor("truncated".into()));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SessionError::InvalidDescriptor("authentication failed".into()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| SessionError::InvalidDescriptor(format!("bad payload: {e}")))
    }
}

impl std::fmt::Debug for DescriptorSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The cipher holds key material; never derive Debug over it.
        f.debug_struct("DescriptorSealer").finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================
