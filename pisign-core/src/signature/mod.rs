//! pisign Signature System - detached signatures and trust verification for packages
//!
//! This module signs artifacts with an X.509 key pair and later classifies them
//! into a [`Verdict`] an installer can act on.
//!
//! Artifact kinds:
//! - Plain files - signature and certificate live in `<file>.sig` / `<file>.crt` sidecars
//! - Archives (`.zip`, `.pisi`) - a member digest manifest is signed and the result is
//!   embedded in the archive comment as a `pisi-signed:<cert>:<sig>` blob
//!
//! Verification order is fixed: locate, certificate validity, trust, signature.

pub mod archive;
pub mod blob;
pub mod certificate;
pub mod error;
pub mod hasher;
pub mod manifest;
pub mod passphrase;
pub mod primitive;
pub mod service;
pub mod signer;
pub mod trust_store;
pub mod verdict;
pub mod verifier;

pub use blob::SignedBlob;
pub use certificate::{Certificate, CertificateValidator, CertificateValidity};
pub use error::SignError;
pub use passphrase::Passphrase;
pub use service::SigningService;
pub use signer::{SignedArtifact, Signer, SigningKey};
pub use trust_store::TrustStore;
pub use verdict::Verdict;
pub use verifier::{SignatureLocation, Verifier};

/// Header that opens every embedded signature blob
pub const BLOB_HEADER: &str = "pisi-signed";

/// Archive manifest format version, written into the manifest header line
pub const MANIFEST_VERSION: u32 = 1;
