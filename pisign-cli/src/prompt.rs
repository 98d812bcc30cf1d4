//! Passphrase acquisition: an inherited file descriptor or a no-echo terminal prompt

use anyhow::{bail, Context, Result};
use pisign_core::signature::Passphrase;
use std::path::Path;

/// Read the passphrase from `fd`, or prompt on the controlling terminal
pub fn acquire_passphrase(key: &Path, fd: Option<i32>) -> Result<Passphrase> {
    match fd {
        Some(fd) => from_fd(fd),
        None => prompt(&format!("Enter passphrase for {}: ", key.display())),
    }
}

#[cfg(unix)]
fn from_fd(fd: i32) -> Result<Passphrase> {
    use std::os::fd::{FromRawFd, OwnedFd};

    // SAFETY: F_GETFD only inspects the descriptor table
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        bail!("--passphrase-fd {fd} is not an open file descriptor");
    }

    // SAFETY: the descriptor is open and was handed to us for exclusive use
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };
    Passphrase::from_fd(owned).with_context(|| format!("Failed to read passphrase from fd {fd}"))
}

#[cfg(not(unix))]
fn from_fd(_fd: i32) -> Result<Passphrase> {
    bail!("--passphrase-fd is only supported on Unix")
}

#[cfg(unix)]
fn prompt(message: &str) -> Result<Passphrase> {
    use std::fs::OpenOptions;
    use std::io::{Read, Write};
    use std::os::fd::AsRawFd;
    use zeroize::Zeroizing;

    let mut tty = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")
        .context("No terminal for the passphrase prompt; use --passphrase-fd")?;

    let _echo = EchoGuard::disable(tty.as_raw_fd())
        .context("Failed to disable terminal echo for the passphrase prompt")?;

    tty.write_all(message.as_bytes())?;
    tty.flush()?;

    let mut line = Zeroizing::new(Vec::new());
    let mut byte = [0u8; 1];
    loop {
        match tty.read(&mut byte)? {
            0 => break,
            _ if byte[0] == b'\n' => break,
            _ => line.push(byte[0]),
        }
    }
    byte[0] = 0;

    Passphrase::from_reader(line.as_slice()).context("Failed to read passphrase")
}

#[cfg(not(unix))]
fn prompt(_message: &str) -> Result<Passphrase> {
    bail!("Interactive passphrase prompt is only supported on Unix; use --passphrase-fd")
}

/// Turns terminal echo off and restores the previous settings on drop
#[cfg(unix)]
struct EchoGuard {
    fd: i32,
    original: libc::termios,
}

#[cfg(unix)]
impl EchoGuard {
    fn disable(fd: i32) -> std::io::Result<Self> {
        let mut original = std::mem::MaybeUninit::<libc::termios>::uninit();

        // SAFETY: tcgetattr fully initializes the struct when it returns 0
        if unsafe { libc::tcgetattr(fd, original.as_mut_ptr()) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        let original = unsafe { original.assume_init() };

        let mut silent = original;
        silent.c_lflag &= !libc::ECHO;
        silent.c_lflag |= libc::ECHONL;

        // SAFETY: `silent` is a valid termios copied from the terminal
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &silent) } != 0 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(Self { fd, original })
    }
}

#[cfg(unix)]
impl Drop for EchoGuard {
    fn drop(&mut self) {
        // SAFETY: restores the settings read in `disable`
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSANOW, &self.original);
        }
    }
}
