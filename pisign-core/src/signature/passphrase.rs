//! Passphrase handling for encrypted private keys
//!
//! The passphrase is kept in a [`SecretString`] for the lifetime of one signing
//! run and is zeroized when the [`Passphrase`] is dropped, on every exit path.
//! It is never formatted by `Debug`, never logged and never written to disk.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::io::Read;
use zeroize::Zeroizing;

/// In-memory passphrase for decrypting a private key
pub struct Passphrase {
    secret: SecretString,
}

impl Passphrase {
    /// Wrap an already acquired secret
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Read a passphrase from a reader, such as an inherited file descriptor
    ///
    /// Only the first line is used, with its line terminator stripped. This matches
    /// how `-passin fd:N` has always been interpreted for package keys.
    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut raw = Zeroizing::new(Vec::new());
        reader.read_to_end(&mut raw)?;

        let line_end = raw
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(raw.len());
        let mut line = &raw[..line_end];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }

        let text = std::str::from_utf8(line).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "passphrase is not valid UTF-8",
            )
        })?;

        Ok(Self::new(SecretString::from(text.to_string())))
    }

    /// Read a passphrase from an inherited file descriptor, taking ownership of it
    #[cfg(unix)]
    pub fn from_fd(fd: std::os::fd::OwnedFd) -> std::io::Result<Self> {
        Self::from_reader(std::fs::File::from(fd))
    }

    /// Bytes handed to the crypto backend; must not outlive the borrow
    pub(crate) fn expose(&self) -> &[u8] {
        self.secret.expose_secret().as_bytes()
    }
}

impl From<String> for Passphrase {
    fn from(value: String) -> Self {
        Self::new(SecretString::from(value))
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase([REDACTED])")
    }
}
