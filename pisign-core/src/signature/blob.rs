//! Embedded signature blob codec
//!
//! Layout: `pisi-signed:<base64 certificate>:<base64 signature>`, exactly two colons.
//! Standard base64 never produces a colon, so the split is unambiguous.

use crate::signature::error::SignError;
use crate::signature::BLOB_HEADER;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Certificate and signature carried inside an archive comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBlob {
    pub certificate: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedBlob {
    pub fn new(certificate: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            certificate,
            signature,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{BLOB_HEADER}:{}:{}",
            BASE64.encode(&self.certificate),
            BASE64.encode(&self.signature)
        )
    }

    /// Decode a comment
    ///
    /// `Ok(None)` means the comment carries no signature at all (empty, or not
    /// starting with the header). Anything that starts like a blob but does not
    /// decode cleanly is [`SignError::MalformedBlob`].
    pub fn parse(comment: &[u8]) -> Result<Option<Self>, SignError> {
        if !comment.starts_with(BLOB_HEADER.as_bytes()) {
            return Ok(None);
        }

        let text = std::str::from_utf8(comment).map_err(|_| malformed("not valid UTF-8"))?;

        let fields: Vec<&str> = text.split(':').collect();
        let [header, certificate, signature] = fields.as_slice() else {
            return Err(malformed(format!(
                "expected 3 fields, found {}",
                fields.len()
            )));
        };

        if *header != BLOB_HEADER {
            return Err(malformed(format!("unexpected header {header:?}")));
        }

        let certificate = BASE64
            .decode(certificate)
            .map_err(|e| malformed(format!("certificate field: {e}")))?;
        let signature = BASE64
            .decode(signature)
            .map_err(|e| malformed(format!("signature field: {e}")))?;

        if certificate.is_empty() || signature.is_empty() {
            return Err(malformed("empty field"));
        }

        Ok(Some(Self {
            certificate,
            signature,
        }))
    }
}

fn malformed(reason: impl Into<String>) -> SignError {
    SignError::MalformedBlob {
        reason: reason.into(),
    }
}
