//! Final classification of a verification call

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of verifying one artifact
///
/// Verification never fails with an error; every problem maps to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Signature is valid and the certificate chains to a known root
    Ok,
    /// No signature material was found
    Unsigned,
    /// Signature is valid but the certificate is self-signed
    SelfSigned,
    /// Signature material is present but the certificate is not in the trust store
    Untrusted,
    /// Signature material is malformed, the certificate is invalid, or the signature
    /// does not match the payload
    Corrupted,
}

impl Verdict {
    /// Whether an installer may accept the artifact without further prompting
    pub fn is_acceptable(&self) -> bool {
        matches!(self, Verdict::Ok | Verdict::SelfSigned)
    }

    /// Human-readable predicate, completes "`<artifact>` ..."
    pub fn describe(&self) -> &'static str {
        match self {
            Verdict::Ok => "is signed by a trusted source.",
            Verdict::Unsigned => "is unsigned.",
            Verdict::SelfSigned => "is self-signed by a trusted source.",
            Verdict::Untrusted => "is signed by an untrusted source.",
            Verdict::Corrupted => "is corrupted.",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::Ok => "ok",
            Verdict::Unsigned => "unsigned",
            Verdict::SelfSigned => "self_signed",
            Verdict::Untrusted => "untrusted",
            Verdict::Corrupted => "corrupted",
        };
        f.write_str(name)
    }
}
