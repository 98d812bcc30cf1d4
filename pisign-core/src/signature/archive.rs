//! Archive access: open, read the comment, stage a rewrite with a new comment

use crate::signature::error::SignError;
use std::fs::File;
use std::io::Seek;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use zip::{ZipArchive, ZipWriter};

/// Open an archive for reading
///
/// A missing file is [`SignError::MissingArtifact`]; a file that is not a readable
/// archive is [`SignError::ArchiveError`].
pub fn open(path: &Path) -> Result<ZipArchive<File>, SignError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SignError::MissingArtifact {
            path: path.to_path_buf(),
        },
        _ => SignError::ArtifactReadError {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    ZipArchive::new(file).map_err(|e| SignError::ArchiveError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// A rewritten copy of an archive waiting to replace the original
///
/// Dropping it without [`commit`](StagedArchive::commit) deletes the copy and leaves
/// the original untouched.
pub struct StagedArchive {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedArchive {
    /// Copy `path` next to itself and replace the copy's comment
    pub fn with_comment(path: &Path, comment: &str) -> Result<Self, SignError> {
        let parent = parent_dir(path);
        let write_err = |e: std::io::Error| SignError::ArtifactWriteError {
            path: path.to_path_buf(),
            source: e,
        };

        let mut source = File::open(path).map_err(|e| SignError::ArtifactReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let permissions = source
            .metadata()
            .map_err(|e| SignError::ArtifactReadError {
                path: path.to_path_buf(),
                source: e,
            })?
            .permissions();

        let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
        std::io::copy(&mut source, temp.as_file_mut()).map_err(write_err)?;

        // The writer borrows the temp file; release it before touching the path
        {
            let mut writer = ZipWriter::new_append(temp.as_file_mut()).map_err(|e| {
                SignError::ArchiveError {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
            writer.set_comment(comment);
            let file = writer.finish().map_err(|e| SignError::ArchiveError {
                path: path.to_path_buf(),
                source: e,
            })?;

            // The rewritten directory may be shorter than the old one
            let end = file.stream_position().map_err(write_err)?;
            file.set_len(end).map_err(write_err)?;
            file.sync_all().map_err(write_err)?;
        }

        std::fs::set_permissions(temp.path(), permissions).map_err(write_err)?;

        debug!(
            "Staged {} with new comment at {}",
            path.display(),
            temp.path().display()
        );

        Ok(Self {
            temp,
            target: path.to_path_buf(),
        })
    }

    /// Atomically replace the original archive
    pub fn commit(self) -> Result<(), SignError> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| SignError::ArtifactWriteError {
                path: target.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}

/// Directory a file lives in, `.` for bare file names
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
