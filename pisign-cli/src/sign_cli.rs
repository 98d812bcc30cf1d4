//! `pisign sign`

use crate::prompt::acquire_passphrase;
use anyhow::{bail, Context, Result};
use pisign_core::signature::{SigningKey, SigningService};
use pisign_core::SigningConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;

/// Sign every file with one key; the passphrase is asked for once
///
/// A failure on one file does not stop the others, but makes the command fail.
pub async fn sign_command(
    config: SigningConfig,
    key: &Path,
    cert: &Path,
    files: &[PathBuf],
    passphrase_fd: Option<i32>,
) -> Result<()> {
    let signing_key = SigningKey::load(key, cert)
        .with_context(|| format!("Failed to load signing key {}", key.display()))?;
    let passphrase = acquire_passphrase(key, passphrase_fd)?;

    let service = SigningService::new(config).context("Failed to start signing service")?;
    let signing_key = Arc::new(signing_key);
    let passphrase = Arc::new(passphrase);

    let mut failures = 0;
    for file in files {
        let result = service
            .sign(file.clone(), Arc::clone(&signing_key), Arc::clone(&passphrase))
            .await;

        match result {
            Ok(_) => println!("Signed {} with {}", file.display(), key.display()),
            Err(e) => {
                failures += 1;
                error!("Signing {} failed: {}", file.display(), e);
                eprintln!("Error: {:#}", anyhow::Error::from(e));
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} files could not be signed", files.len());
    }
    Ok(())
}
