//! Trust commands: `pisign verify` and `pisign fingerprint`

use anyhow::{bail, Context, Result};
use pisign_core::signature::{
    Certificate, CertificateValidator, CertificateValidity, SigningService,
};
use pisign_core::{SigningConfig, Verdict};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// One line of `verify --json` output
#[derive(Debug, Serialize)]
struct VerifyRecord {
    artifact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Verify files and print one line per file
///
/// Verdicts never fail the command. Only calls that produced no verdict at all
/// (timeouts, worker failures) do.
pub async fn verify_command(
    config: SigningConfig,
    trust_dir: &Path,
    files: Vec<PathBuf>,
    json: bool,
) -> Result<()> {
    if !trust_dir.is_dir() {
        warn!(
            "Trust directory {} does not exist; nothing is trusted",
            trust_dir.display()
        );
    }

    let service = SigningService::new(config).context("Failed to start verification service")?;
    let results = service
        .verify_all(files, Some(trust_dir.to_path_buf()))
        .await;

    let mut failures = 0;
    for (artifact, result) in results {
        let record = match result {
            Ok(verdict) => {
                if !json {
                    println!("{} {}", artifact.display(), verdict.describe());
                }
                VerifyRecord {
                    artifact: artifact.display().to_string(),
                    verdict: Some(verdict),
                    error: None,
                }
            }
            Err(e) => {
                failures += 1;
                error!("Verifying {} failed: {}", artifact.display(), e);
                if !json {
                    eprintln!("Error: {}: {e}", artifact.display());
                }
                VerifyRecord {
                    artifact: artifact.display().to_string(),
                    verdict: None,
                    error: Some(e.to_string()),
                }
            }
        };

        if json {
            println!("{}", serde_json::to_string(&record)?);
        }
    }

    if failures > 0 {
        bail!("{failures} files could not be verified");
    }
    Ok(())
}

/// Print `<path>: <fingerprint> (<chain validity>)` for each certificate
pub fn fingerprint_command(config: &SigningConfig, certs: &[PathBuf]) -> Result<()> {
    let validator =
        CertificateValidator::from_config(config).context("Failed to load root certificates")?;

    for path in certs {
        let certificate = Certificate::load(path)
            .with_context(|| format!("Failed to load certificate {}", path.display()))?;
        let fingerprint = certificate.fingerprint()?;

        println!(
            "{}: {} ({})",
            path.display(),
            fingerprint,
            validity_name(validator.validate(&certificate))
        );
    }
    Ok(())
}

fn validity_name(validity: CertificateValidity) -> &'static str {
    match validity {
        CertificateValidity::Ok => "ok",
        CertificateValidity::SelfSigned => "self_signed",
        CertificateValidity::Corrupted => "corrupted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_record_omits_absent_fields() {
        let record = VerifyRecord {
            artifact: "a.txt".to_string(),
            verdict: Some(Verdict::SelfSigned),
            error: None,
        };
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"artifact":"a.txt","verdict":"self_signed"}"#
        );
    }

    #[test]
    fn test_validity_names_match_verdict_names() {
        assert_eq!(validity_name(CertificateValidity::Ok), Verdict::Ok.to_string());
        assert_eq!(
            validity_name(CertificateValidity::SelfSigned),
            Verdict::SelfSigned.to_string()
        );
        assert_eq!(
            validity_name(CertificateValidity::Corrupted),
            Verdict::Corrupted.to_string()
        );
    }
}
