//! X.509 certificates: parsing, fingerprints and chain classification

use crate::config::SigningConfig;
use crate::signature::error::SignError;
use crate::signature::hasher::hash_bytes;
use openssl::stack::Stack;
use openssl::x509::store::{X509Store, X509StoreBuilder};
use openssl::x509::{X509StoreContext, X509};
use std::path::Path;
use tracing::{debug, warn};

/// `X509_V_ERR_DEPTH_ZERO_SELF_SIGNED_CERT`: the leaf is its own issuer and is not a root
const DEPTH_ZERO_SELF_SIGNED_CERT: i32 = 18;

/// A parsed certificate together with the exact bytes it was read from
///
/// The original bytes are what gets copied into sidecars and blobs, so a PEM
/// certificate stays PEM on the way through.
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
    raw: Vec<u8>,
}

impl Certificate {
    /// Parse PEM or DER certificate bytes
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, SignError> {
        let parsed = if raw.windows(11).any(|w| w == b"-----BEGIN ") {
            X509::from_pem(&raw)
        } else {
            X509::from_der(&raw)
        };

        let x509 = parsed.map_err(|e| SignError::InvalidCertificate {
            reason: e.to_string(),
        })?;

        Ok(Self { x509, raw })
    }

    /// Read and parse a certificate file
    pub fn load(path: &Path) -> Result<Self, SignError> {
        let raw = std::fs::read(path).map_err(|e| SignError::CertificateReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_bytes(raw)
    }

    /// Content fingerprint, `sha256:<hex>` over the DER encoding
    ///
    /// PEM and DER copies of one certificate share a fingerprint.
    pub fn fingerprint(&self) -> Result<String, SignError> {
        let der = self
            .x509
            .to_der()
            .map_err(|e| SignError::InvalidCertificate {
                reason: e.to_string(),
            })?;
        Ok(hash_bytes(&der))
    }

    /// Bytes exactly as supplied
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// The parsed OpenSSL handle
    pub fn x509(&self) -> &X509 {
        &self.x509
    }

    /// Subject rendered as `key=value` pairs, for logs
    pub fn subject(&self) -> String {
        self.x509
            .subject_name()
            .entries()
            .filter_map(|entry| {
                let key = entry.object().nid().short_name().ok()?;
                let value = entry.data().to_string().ok()?;
                Some(format!("{key}={value}"))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject())
            .finish()
    }
}

/// Chain-of-trust classification of a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateValidity {
    /// Chains to a configured root
    Ok,
    /// Self-signed and not itself a configured root
    SelfSigned,
    /// Any other validation failure
    Corrupted,
}

/// Validates certificates against the configured root certificates
pub struct CertificateValidator {
    store: X509Store,
}

impl CertificateValidator {
    /// Build the root store described by `config`
    ///
    /// Unreadable entries in `ca_dir` are skipped with a warning; an unreadable
    /// `ca_file` is an error because it was named explicitly.
    pub fn from_config(config: &SigningConfig) -> Result<Self, SignError> {
        let mut builder =
            X509StoreBuilder::new().map_err(|e| SignError::tool("build root store", e))?;

        if config.system_roots {
            builder
                .set_default_paths()
                .map_err(|e| SignError::tool("load system roots", e))?;
        }

        if let Some(ca_file) = &config.ca_file {
            let pem = std::fs::read(ca_file).map_err(|e| SignError::CertificateReadError {
                path: ca_file.clone(),
                source: e,
            })?;
            let roots = X509::stack_from_pem(&pem).map_err(|e| SignError::InvalidCertificate {
                reason: format!("{}: {e}", ca_file.display()),
            })?;
            for root in roots {
                add_root(&mut builder, root);
            }
        }

        if let Some(ca_dir) = &config.ca_dir {
            match std::fs::read_dir(ca_dir) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        match Certificate::load(&entry.path()) {
                            Ok(root) => add_root(&mut builder, root.x509),
                            Err(e) => debug!("Skipping CA candidate {}: {e}", entry.path().display()),
                        }
                    }
                }
                Err(e) => warn!("Cannot read CA directory {}: {e}", ca_dir.display()),
            }
        }

        Ok(Self {
            store: builder.build(),
        })
    }

    /// Classify `certificate` against the root store
    pub fn validate(&self, certificate: &Certificate) -> CertificateValidity {
        let outcome = Stack::<X509>::new().and_then(|chain| {
            let mut context = X509StoreContext::new()?;
            context.init(&self.store, certificate.x509(), &chain, |ctx| {
                let verified = ctx.verify_cert()?;
                Ok((verified, ctx.error()))
            })
        });

        match outcome {
            Ok((true, _)) => CertificateValidity::Ok,
            Ok((false, error)) if error.as_raw() == DEPTH_ZERO_SELF_SIGNED_CERT => {
                debug!("Certificate is self-signed: {}", certificate.subject());
                CertificateValidity::SelfSigned
            }
            Ok((false, error)) => {
                debug!(
                    "Certificate chain validation failed for {}: {} ({})",
                    certificate.subject(),
                    error.error_string(),
                    error.as_raw()
                );
                CertificateValidity::Corrupted
            }
            Err(e) => {
                warn!("Certificate validation could not run: {e}");
                CertificateValidity::Corrupted
            }
        }
    }
}

fn add_root(builder: &mut X509StoreBuilder, root: X509) {
    if let Err(e) = builder.add_cert(root) {
        debug!("Ignoring root certificate: {e}");
    }
}
