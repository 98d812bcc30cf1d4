//! Signature system error types with clear, actionable messages

use std::path::PathBuf;
use thiserror::Error;

/// Signature system specific errors
#[derive(Error, Debug)]
pub enum SignError {
    /// The artifact, or the signature material it should carry, does not exist
    #[error("Artifact not found: {path}")]
    MissingArtifact { path: PathBuf },

    /// A signature blob was present but did not follow the `pisi-signed:<cert>:<sig>` layout
    #[error("Signature blob is malformed: {reason}")]
    MalformedBlob { reason: String },

    /// The cryptographic backend could not perform the requested operation
    #[error("Crypto backend failed during {operation}: {reason}")]
    ToolInvocationFailure {
        operation: &'static str,
        reason: String,
    },

    /// The signature does not match the payload it claims to cover
    #[error("Signature does not match the signed payload")]
    VerificationMismatch,

    /// Signing one artifact failed; the artifact was left untouched
    #[error("Failed to sign {artifact} with key {key}")]
    SigningFailed {
        artifact: PathBuf,
        key: PathBuf,
        #[source]
        source: Box<SignError>,
    },

    /// Failed to read the private key file
    #[error("Failed to read private key from {path}")]
    KeyReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a certificate file
    #[error("Failed to read certificate from {path}")]
    CertificateReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The certificate bytes are neither PEM nor DER X.509
    #[error("Invalid certificate: {reason}")]
    InvalidCertificate { reason: String },

    /// Failed to read an artifact's contents
    #[error("Failed to read artifact {path}")]
    ArtifactReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a sidecar file or a rewritten archive
    #[error("Failed to write {path}")]
    ArtifactWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive could not be opened or rewritten
    #[error("Archive error in {path}")]
    ArchiveError {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// An archive member name cannot be represented in the manifest
    #[error("Archive {path} contains an unsupported member name: {name:?}")]
    InvalidMemberName { path: PathBuf, name: String },

    /// Failed to read the configuration file
    #[error("Failed to read configuration from {path}")]
    ConfigReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration file
    #[error("Failed to parse configuration {path} (invalid JSON or unknown values)")]
    ConfigParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SignError {
    /// Shorthand for a backend failure built from any displayable cause
    pub fn tool(operation: &'static str, reason: impl ToString) -> Self {
        SignError::ToolInvocationFailure {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Log security-critical signature errors
    pub fn log_if_security_critical(&self) {
        match self {
            SignError::MalformedBlob { .. } | SignError::VerificationMismatch => {
                tracing::error!(target: "security", "SIGNATURE VIOLATION: {}", self);
            }
            SignError::SigningFailed { source, .. } => source.log_if_security_critical(),
            _ => {}
        }
    }
}
