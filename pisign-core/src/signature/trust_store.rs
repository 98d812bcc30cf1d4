//! Local trust directory lookup
//!
//! A certificate is trusted when some regular file in the trust directory holds a
//! certificate with the same fingerprint. File names carry no meaning. The directory
//! is rescanned on every lookup so adding or removing a file takes effect on the
//! next call.

use crate::signature::certificate::Certificate;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A directory of trusted certificates
#[derive(Debug, Clone)]
pub struct TrustStore {
    dir: PathBuf,
}

impl TrustStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Whether `certificate` is present in the trust directory
    ///
    /// A missing or unreadable directory trusts nothing. Entries that cannot be read
    /// or parsed as certificates are skipped.
    pub fn is_trusted(&self, certificate: &Certificate) -> bool {
        let wanted = match certificate.fingerprint() {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!("Cannot fingerprint certificate: {e}");
                return false;
            }
        };

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Trust directory {} is not readable: {e}", self.dir.display());
                return false;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let candidate = match Certificate::load(&path) {
                Ok(candidate) => candidate,
                Err(e) => {
                    debug!("Skipping trust entry {}: {e}", path.display());
                    continue;
                }
            };

            if candidate.fingerprint().is_ok_and(|fp| fp == wanted) {
                debug!("Certificate {wanted} trusted via {}", path.display());
                return true;
            }
        }

        debug!("Certificate {wanted} not found in {}", self.dir.display());
        false
    }
}
