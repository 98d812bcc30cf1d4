//! Verification - classifies an artifact into a [`Verdict`]
//!
//! The checks always run in the same order and the first failing one decides:
//!
//! 1. locate the signature and certificate (absent: unsigned, malformed: corrupted)
//! 2. validate the certificate chain (corrupted)
//! 3. look the certificate up in the trust directory, if one was given (untrusted)
//! 4. verify the signature over the payload (corrupted)
//! 5. self-signed or ok, as decided in step 2
//!
//! Nothing here writes to disk. Every error is turned into a verdict, so one bad
//! artifact never stops a batch.

use crate::config::SigningConfig;
use crate::signature::archive;
use crate::signature::blob::SignedBlob;
use crate::signature::certificate::{Certificate, CertificateValidator, CertificateValidity};
use crate::signature::error::SignError;
use crate::signature::manifest::Manifest;
use crate::signature::primitive;
use crate::signature::trust_store::TrustStore;
use crate::signature::verdict::Verdict;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where to find the signature of an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureLocation {
    /// `<artifact>.sig` and `<artifact>.crt` next to the artifact
    Sidecar,
    /// Separately named signature and certificate files
    Explicit {
        signature: PathBuf,
        certificate: PathBuf,
    },
    /// A blob in the archive comment; the payload is the member manifest
    Embedded,
}

/// Signature material found for an artifact
struct Located {
    certificate: Vec<u8>,
    signature: Vec<u8>,
}

/// Verifies artifacts according to a [`SigningConfig`]
pub struct Verifier {
    config: SigningConfig,
    validator: CertificateValidator,
}

impl Verifier {
    /// Build a verifier; loads the configured root certificates once
    pub fn new(config: SigningConfig) -> Result<Self, SignError> {
        let validator = CertificateValidator::from_config(&config)?;
        Ok(Self { config, validator })
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Verify an artifact, locating its signature by the artifact kind
    pub fn verify_artifact(&self, artifact: &Path, trust_dir: Option<&Path>) -> Verdict {
        let location = if self.config.is_archive(artifact) {
            SignatureLocation::Embedded
        } else {
            SignatureLocation::Sidecar
        };
        self.verify_with(artifact, &location, trust_dir)
    }

    /// Verify a plain file against its sidecars
    pub fn verify_file(&self, artifact: &Path, trust_dir: Option<&Path>) -> Verdict {
        self.verify_with(artifact, &SignatureLocation::Sidecar, trust_dir)
    }

    /// Verify an archive against the blob in its comment
    pub fn verify_archive(&self, artifact: &Path, trust_dir: Option<&Path>) -> Verdict {
        self.verify_with(artifact, &SignatureLocation::Embedded, trust_dir)
    }

    /// Verify an artifact with an explicit signature location
    pub fn verify_with(
        &self,
        artifact: &Path,
        location: &SignatureLocation,
        trust_dir: Option<&Path>,
    ) -> Verdict {
        let verdict = match location {
            SignatureLocation::Sidecar => {
                let signature = self.config.signature_path(artifact);
                let certificate = self.config.certificate_path(artifact);
                self.verify_detached(artifact, &signature, &certificate, trust_dir)
            }
            SignatureLocation::Explicit {
                signature,
                certificate,
            } => self.verify_detached(artifact, signature, certificate, trust_dir),
            SignatureLocation::Embedded => self.verify_embedded(artifact, trust_dir),
        };

        info!(
            event_type = "verification.verdict",
            artifact = %artifact.display(),
            verdict = %verdict,
            "Artifact verified"
        );
        verdict
    }

    /// Verify in-memory data against an encoded blob
    pub fn verify_data(&self, payload: &[u8], blob: &[u8], trust_dir: Option<&Path>) -> Verdict {
        match SignedBlob::parse(blob) {
            Ok(Some(blob)) => {
                let located = Located {
                    certificate: blob.certificate,
                    signature: blob.signature,
                };
                self.evaluate(located, || Ok(payload.to_vec()), trust_dir)
            }
            Ok(None) => Verdict::Unsigned,
            Err(e) => corrupted(e),
        }
    }

    fn verify_detached(
        &self,
        artifact: &Path,
        signature_path: &Path,
        certificate_path: &Path,
        trust_dir: Option<&Path>,
    ) -> Verdict {
        if !signature_path.exists() || !certificate_path.exists() {
            debug!("No signature sidecars for {}", artifact.display());
            return Verdict::Unsigned;
        }

        let located = match (
            read_sidecar(signature_path),
            read_sidecar(certificate_path),
        ) {
            (Ok(signature), Ok(certificate)) => Located {
                certificate,
                signature,
            },
            (Err(e), _) | (_, Err(e)) => return corrupted(e),
        };

        self.evaluate(located, || read_payload(artifact), trust_dir)
    }

    fn verify_embedded(&self, artifact: &Path, trust_dir: Option<&Path>) -> Verdict {
        let mut zip = match archive::open(artifact) {
            Ok(zip) => zip,
            Err(SignError::MissingArtifact { .. }) => return Verdict::Unsigned,
            Err(e) => return corrupted(e),
        };

        let located = match SignedBlob::parse(zip.comment()) {
            Ok(Some(blob)) => Located {
                certificate: blob.certificate,
                signature: blob.signature,
            },
            Ok(None) => {
                debug!("No signature blob in {}", artifact.display());
                return Verdict::Unsigned;
            }
            Err(e) => return corrupted(e),
        };

        self.evaluate(
            located,
            || Manifest::from_archive(&mut zip, artifact).map(|m| m.to_bytes()),
            trust_dir,
        )
    }

    /// Steps 2 to 5, with the payload produced only once it is needed
    fn evaluate(
        &self,
        located: Located,
        payload: impl FnOnce() -> Result<Vec<u8>, SignError>,
        trust_dir: Option<&Path>,
    ) -> Verdict {
        let certificate = match Certificate::from_bytes(located.certificate) {
            Ok(certificate) => certificate,
            Err(e) => return corrupted(e),
        };

        let validity = self.validator.validate(&certificate);
        if validity == CertificateValidity::Corrupted {
            return Verdict::Corrupted;
        }

        if let Some(dir) = trust_dir {
            if !TrustStore::new(dir).is_trusted(&certificate) {
                debug!("Signer {} is not in {}", certificate.subject(), dir.display());
                return Verdict::Untrusted;
            }
        }

        let checked = payload().and_then(|payload| {
            let public_key = primitive::extract_public_key(&certificate)?;
            primitive::verify(
                &payload,
                &located.signature,
                &public_key,
                self.config.digest,
            )
        });
        if let Err(e) = checked {
            return corrupted(e);
        }

        match validity {
            CertificateValidity::SelfSigned => Verdict::SelfSigned,
            _ => Verdict::Ok,
        }
    }
}

fn corrupted(error: SignError) -> Verdict {
    error.log_if_security_critical();
    warn!("Treating artifact as corrupted: {error}");
    Verdict::Corrupted
}

fn read_sidecar(path: &Path) -> Result<Vec<u8>, SignError> {
    std::fs::read(path).map_err(|e| SignError::ArtifactReadError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_payload(artifact: &Path) -> Result<Vec<u8>, SignError> {
    std::fs::read(artifact).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SignError::MissingArtifact {
            path: artifact.to_path_buf(),
        },
        _ => SignError::ArtifactReadError {
            path: artifact.to_path_buf(),
            source: e,
        },
    })
}
