//! Digest/sign primitive over the OpenSSL library
//!
//! Produces the same bytes as `openssl dgst -<md> -sign <key>` and checks them the way
//! `openssl dgst -<md> -verify <pub> -signature <sig>` does, without spawning a process.

use crate::signature::certificate::Certificate;
use crate::signature::error::SignError;
use crate::signature::passphrase::Passphrase;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Digest applied to the payload before the asymmetric operation
///
/// Signatures do not record which digest produced them, so signer and verifier
/// must be configured alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// Legacy protocol digest
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    fn message_digest(self) -> MessageDigest {
        match self {
            DigestAlgorithm::Sha1 => MessageDigest::sha1(),
            DigestAlgorithm::Sha256 => MessageDigest::sha256(),
            DigestAlgorithm::Sha512 => MessageDigest::sha512(),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        })
    }
}

/// Decrypt a PEM private key with `passphrase` and sign `payload` with it
///
/// The decrypted key only exists for the duration of this call.
pub fn sign(
    payload: &[u8],
    key_pem: &[u8],
    passphrase: &Passphrase,
    digest: DigestAlgorithm,
) -> Result<Vec<u8>, SignError> {
    let key = load_private_key(key_pem, passphrase)?;

    let mut signer = openssl::sign::Signer::new(digest.message_digest(), &key)
        .map_err(|e| SignError::tool("sign", e))?;
    signer
        .update(payload)
        .map_err(|e| SignError::tool("sign", e))?;
    signer
        .sign_to_vec()
        .map_err(|e| SignError::tool("sign", e))
}

/// Public key embedded in a certificate
pub fn extract_public_key(certificate: &Certificate) -> Result<PKey<Public>, SignError> {
    certificate
        .x509()
        .public_key()
        .map_err(|e| SignError::tool("extract public key", e))
}

/// Check `signature` over `payload`
///
/// `Ok(())` only when the signature matches; a well-formed but wrong signature is
/// [`SignError::VerificationMismatch`], anything the backend rejects outright is
/// [`SignError::ToolInvocationFailure`].
pub fn verify(
    payload: &[u8],
    signature: &[u8],
    public_key: &PKey<Public>,
    digest: DigestAlgorithm,
) -> Result<(), SignError> {
    let mut verifier = openssl::sign::Verifier::new(digest.message_digest(), public_key)
        .map_err(|e| SignError::tool("verify", e))?;
    verifier
        .update(payload)
        .map_err(|e| SignError::tool("verify", e))?;

    match verifier.verify(signature) {
        Ok(true) => Ok(()),
        Ok(false) => Err(SignError::VerificationMismatch),
        Err(e) => Err(SignError::tool("verify", e)),
    }
}

fn load_private_key(key_pem: &[u8], passphrase: &Passphrase) -> Result<PKey<Private>, SignError> {
    PKey::private_key_from_pem_passphrase(key_pem, passphrase.expose()).map_err(|e| {
        SignError::tool(
            "load private key",
            format!("wrong passphrase or unsupported key ({e})"),
        )
    })
}
