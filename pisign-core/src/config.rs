//! Signing configuration
//!
//! Everything the engine would otherwise hard-code (digest, file extensions,
//! certificate roots, worker limits) lives here and is passed in explicitly.
//!
//! ## Configuration Sources (in precedence order)
//!
//! 1. `--config <path>` - explicit file, must exist and parse
//! 2. `<platform config dir>/pisign/config.json` - e.g. `~/.config/pisign/config.json`
//! 3. Built-in defaults
//!
//! ```json
//! {
//!   "digest": "sha256",
//!   "archive_extensions": ["zip", "pisi"],
//!   "ca_file": "/etc/pisi/ca.pem",
//!   "timeout_seconds": 30
//! }
//! ```

use crate::signature::error::SignError;
use crate::signature::primitive::DigestAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Engine configuration shared by the signer, the verifier and the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Digest used for signing and verification; not recorded in the signature
    #[serde(default)]
    pub digest: DigestAlgorithm,

    /// File extensions (without the dot) treated as archives
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,

    /// Sidecar extension for detached signatures
    #[serde(default = "default_signature_extension")]
    pub signature_extension: String,

    /// Sidecar extension for the signer's certificate
    #[serde(default = "default_certificate_extension")]
    pub certificate_extension: String,

    /// Whether the platform's default root certificates take part in chain validation
    #[serde(default = "default_true")]
    pub system_roots: bool,

    /// Additional PEM bundle of root certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,

    /// Additional directory of root certificates (one certificate per file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_dir: Option<PathBuf>,

    /// Upper bound for a single sign/verify call in the service, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of concurrent sign/verify calls in the service
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::default(),
            archive_extensions: default_archive_extensions(),
            signature_extension: default_signature_extension(),
            certificate_extension: default_certificate_extension(),
            system_roots: true,
            ca_file: None,
            ca_dir: None,
            timeout_seconds: default_timeout(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_archive_extensions() -> Vec<String> {
    vec!["zip".to_string(), "pisi".to_string()]
}

fn default_signature_extension() -> String {
    "sig".to_string()
}

fn default_certificate_extension() -> String {
    "crt".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    4
}

impl SigningConfig {
    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self, SignError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SignError::ConfigReadError {
                path: path.to_path_buf(),
                source: e,
            })?;

        serde_json::from_str(&content).map_err(|e| SignError::ConfigParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Resolve configuration with an optional CLI override
    ///
    /// An explicit override must load cleanly. A discovered file that fails to
    /// parse is reported and replaced by the defaults.
    pub fn discover(cli_override: Option<&Path>) -> Result<Self, SignError> {
        if let Some(path) = cli_override {
            debug!("Using --config override: {}", path.display());
            return Self::load_from(path);
        }

        let Some(path) = Self::default_path() else {
            debug!("No platform config directory; using built-in defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            debug!("No configuration found at {}", path.display());
            return Ok(Self::default());
        }

        match Self::load_from(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("{e}; falling back to built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Platform-specific location of `config.json`
    ///
    /// On Linux: `~/.config/pisign/config.json`
    pub fn default_path() -> Option<PathBuf> {
        use directories::ProjectDirs;

        ProjectDirs::from("", "", "pisign").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Whether `path` should be handled as an archive rather than a plain file
    pub fn is_archive(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.archive_extensions.iter().any(|a| a == ext))
    }

    /// Sidecar path holding the detached signature of `artifact`
    pub fn signature_path(&self, artifact: &Path) -> PathBuf {
        sidecar(artifact, &self.signature_extension)
    }

    /// Sidecar path holding the certificate of `artifact`
    pub fn certificate_path(&self, artifact: &Path) -> PathBuf {
        sidecar(artifact, &self.certificate_extension)
    }

    /// Timeout applied by the service to each call
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Append `.ext` to the full file name, so `a.tar.gz` becomes `a.tar.gz.sig`
fn sidecar(artifact: &Path, ext: &str) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
