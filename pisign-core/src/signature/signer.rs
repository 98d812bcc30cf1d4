//! Signing orchestration
//!
//! Plain files get `<file>.sig` and `<file>.crt` sidecars. Archives get the signed
//! blob written into their comment. In both cases the signature is produced first
//! and every write is staged in a temporary file next to the target, so a failure
//! leaves the previous state on disk.

use crate::config::SigningConfig;
use crate::signature::archive::{self, parent_dir, StagedArchive};
use crate::signature::blob::SignedBlob;
use crate::signature::certificate::Certificate;
use crate::signature::error::SignError;
use crate::signature::manifest::Manifest;
use crate::signature::passphrase::Passphrase;
use crate::signature::primitive;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// A private key file and the certificate that goes with it
///
/// The key stays encrypted in memory; it is only decrypted inside a single
/// signing call. The buffer is wiped on drop.
pub struct SigningKey {
    key_path: PathBuf,
    key_pem: Zeroizing<Vec<u8>>,
    certificate: Certificate,
}

impl SigningKey {
    pub fn load(key_path: &Path, cert_path: &Path) -> Result<Self, SignError> {
        let key_pem = std::fs::read(key_path).map_err(|e| SignError::KeyReadError {
            path: key_path.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            key_path: key_path.to_path_buf(),
            key_pem: Zeroizing::new(key_pem),
            certificate: Certificate::load(cert_path)?,
        })
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_path", &self.key_path)
            .field("certificate", &self.certificate)
            .finish()
    }
}

/// What a successful signing call left on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedArtifact {
    Sidecars {
        signature: PathBuf,
        certificate: PathBuf,
    },
    Embedded {
        archive: PathBuf,
    },
}

const GATE_RUNNING: u8 = 0;
const GATE_COMMITTING: u8 = 1;
const GATE_ABANDONED: u8 = 2;

/// Decides, exactly once, whether a signing call may write to disk
///
/// The signing work calls [`try_commit`](Self::try_commit) before its first rename;
/// a caller that stops waiting calls [`abandon`](Self::abandon). Whichever runs first
/// wins, so an abandoned call never writes and a committing call is never abandoned.
#[derive(Debug, Default)]
pub struct CommitGate {
    state: AtomicU8,
}

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to write; fails once the gate was abandoned
    pub fn try_commit(&self) -> Result<(), SignError> {
        match self.state.compare_exchange(
            GATE_RUNNING,
            GATE_COMMITTING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) | Err(GATE_COMMITTING) => Ok(()),
            Err(_) => Err(SignError::tool("sign", "abandoned after timeout")),
        }
    }

    /// Forbid any write; `false` when the work already started committing
    pub fn abandon(&self) -> bool {
        match self.state.compare_exchange(
            GATE_RUNNING,
            GATE_ABANDONED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) | Err(GATE_ABANDONED) => true,
            Err(_) => false,
        }
    }
}

/// Signs plain files and archives according to a [`SigningConfig`]
#[derive(Debug, Clone)]
pub struct Signer {
    config: SigningConfig,
}

impl Signer {
    pub fn new(config: SigningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Sign one artifact, choosing sidecars or an embedded blob by its extension
    ///
    /// Errors are wrapped in [`SignError::SigningFailed`] naming the artifact and key.
    pub fn sign_artifact(
        &self,
        artifact: &Path,
        key: &SigningKey,
        passphrase: &Passphrase,
    ) -> Result<SignedArtifact, SignError> {
        self.sign_gated(artifact, key, passphrase, &CommitGate::new())
    }

    /// Like [`sign_artifact`](Self::sign_artifact), but nothing is written unless
    /// `gate` lets the call commit
    pub(crate) fn sign_gated(
        &self,
        artifact: &Path,
        key: &SigningKey,
        passphrase: &Passphrase,
        gate: &CommitGate,
    ) -> Result<SignedArtifact, SignError> {
        debug!(
            "Signing {} with {}",
            artifact.display(),
            key.key_path().display()
        );

        let result = if self.config.is_archive(artifact) {
            self.sign_archive(artifact, key, passphrase, gate)
        } else {
            self.sign_file(artifact, key, passphrase, gate)
        };

        match result {
            Ok(signed) => {
                info!(
                    event_type = "signing.success",
                    artifact = %artifact.display(),
                    key = %key.key_path().display(),
                    "Artifact signed"
                );
                Ok(signed)
            }
            Err(e) => {
                let err = SignError::SigningFailed {
                    artifact: artifact.to_path_buf(),
                    key: key.key_path().to_path_buf(),
                    source: Box::new(e),
                };
                err.log_if_security_critical();
                Err(err)
            }
        }
    }

    /// Write both sidecars
    ///
    /// The signature is renamed into place first. If the certificate rename then
    /// fails, the new signature is removed; a signature it replaced is not restored.
    fn sign_file(
        &self,
        artifact: &Path,
        key: &SigningKey,
        passphrase: &Passphrase,
        gate: &CommitGate,
    ) -> Result<SignedArtifact, SignError> {
        let payload = std::fs::read(artifact).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SignError::MissingArtifact {
                path: artifact.to_path_buf(),
            },
            _ => SignError::ArtifactReadError {
                path: artifact.to_path_buf(),
                source: e,
            },
        })?;

        let signature = self.sign_payload(&payload, key, passphrase)?;

        let signature_path = self.config.signature_path(artifact);
        let certificate_path = self.config.certificate_path(artifact);
        let dir = parent_dir(artifact);

        let staged_signature = stage_sidecar(dir, &signature, &signature_path)?;
        let staged_certificate =
            stage_sidecar(dir, key.certificate().as_bytes(), &certificate_path)?;

        gate.try_commit()?;

        persist(staged_signature, &signature_path)?;
        if let Err(e) = persist(staged_certificate, &certificate_path) {
            // Never leave a signature without its certificate
            if let Err(remove_err) = std::fs::remove_file(&signature_path) {
                warn!(
                    "Failed to remove {} after certificate write failed: {remove_err}",
                    signature_path.display()
                );
            }
            return Err(e);
        }

        Ok(SignedArtifact::Sidecars {
            signature: signature_path,
            certificate: certificate_path,
        })
    }

    fn sign_archive(
        &self,
        artifact: &Path,
        key: &SigningKey,
        passphrase: &Passphrase,
        gate: &CommitGate,
    ) -> Result<SignedArtifact, SignError> {
        let manifest = {
            let mut zip = archive::open(artifact)?;
            Manifest::from_archive(&mut zip, artifact)?
        };

        let signature = self.sign_payload(&manifest.to_bytes(), key, passphrase)?;
        let blob = SignedBlob::new(key.certificate().as_bytes().to_vec(), signature);

        let staged = StagedArchive::with_comment(artifact, &blob.encode())?;
        gate.try_commit()?;
        staged.commit()?;

        debug!(
            "Embedded signature over {} members in {}",
            manifest.entries().len(),
            artifact.display()
        );

        Ok(SignedArtifact::Embedded {
            archive: artifact.to_path_buf(),
        })
    }

    /// Sign and check the result against the certificate, so a key/certificate
    /// mismatch fails here instead of producing signatures that never verify
    fn sign_payload(
        &self,
        payload: &[u8],
        key: &SigningKey,
        passphrase: &Passphrase,
    ) -> Result<Vec<u8>, SignError> {
        let signature = primitive::sign(payload, &key.key_pem, passphrase, self.config.digest)?;

        let public_key = primitive::extract_public_key(key.certificate())?;
        match primitive::verify(payload, &signature, &public_key, self.config.digest) {
            Ok(()) => Ok(signature),
            Err(SignError::VerificationMismatch) => Err(SignError::InvalidCertificate {
                reason: "certificate does not match the private key".to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

fn stage_sidecar(dir: &Path, contents: &[u8], target: &Path) -> Result<NamedTempFile, SignError> {
    let write_err = |e: std::io::Error| SignError::ArtifactWriteError {
        path: target.to_path_buf(),
        source: e,
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".pisign-")
        .tempfile_in(dir)
        .map_err(write_err)?;
    temp.write_all(contents).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o644))
            .map_err(write_err)?;
    }

    Ok(temp)
}

fn persist(staged: NamedTempFile, target: &Path) -> Result<(), SignError> {
    staged
        .persist(target)
        .map_err(|e| SignError::ArtifactWriteError {
            path: target.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}
