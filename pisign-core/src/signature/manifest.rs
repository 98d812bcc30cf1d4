//! Archive manifest - the payload that gets signed for archives
//!
//! The manifest lists every member with the SHA-256 of its uncompressed contents.
//! Serialization is byte-for-byte deterministic:
//!
//! ```text
//! pisi-manifest/1 sha256
//! <hex digest>  <member name>
//! ...
//! ```
//!
//! Lines are sorted by name, then digest, so the storage order inside the archive
//! does not matter. The archive comment is not a member and never appears here,
//! which is what lets the signature live in it.

use crate::signature::archive;
use crate::signature::error::SignError;
use crate::signature::hasher::hash_reader;
use crate::signature::MANIFEST_VERSION;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// One archive member
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ManifestEntry {
    pub name: String,
    /// Lowercase hex SHA-256 of the member contents
    pub digest: String,
}

/// Sorted digest listing of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build from entries in any order
    ///
    /// Names containing line breaks would make the serialization ambiguous and are
    /// rejected.
    pub fn from_entries(
        archive: &Path,
        mut entries: Vec<ManifestEntry>,
    ) -> Result<Self, SignError> {
        if let Some(bad) = entries
            .iter()
            .find(|e| e.name.contains(['\n', '\r']))
        {
            return Err(SignError::InvalidMemberName {
                path: archive.to_path_buf(),
                name: bad.name.clone(),
            });
        }

        entries.sort();
        Ok(Self { entries })
    }

    /// Hash every member of an open archive
    pub fn from_archive<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        path: &Path,
    ) -> Result<Self, SignError> {
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut member = archive
                .by_index(index)
                .map_err(|e| SignError::ArchiveError {
                    path: path.to_path_buf(),
                    source: e,
                })?;

            let name = member.name().to_string();
            let digest = hash_reader(&mut member).map_err(|e| SignError::ArchiveError {
                path: path.to_path_buf(),
                source: e.into(),
            })?;

            entries.push(ManifestEntry { name, digest });
        }

        debug!("Hashed {} members of {}", entries.len(), path.display());
        Self::from_entries(path, entries)
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Canonical serialization, the exact bytes that are signed
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("pisi-manifest/{MANIFEST_VERSION} sha256\n");
        for entry in &self.entries {
            out.push_str(&entry.digest);
            out.push_str("  ");
            out.push_str(&entry.name);
            out.push('\n');
        }
        out.into_bytes()
    }
}

/// Canonical manifest bytes of the archive at `path`
pub fn build_manifest(path: &Path) -> Result<Vec<u8>, SignError> {
    let mut zip = archive::open(path)?;
    Ok(Manifest::from_archive(&mut zip, path)?.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn archive(members: &[(&str, &[u8])]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in members {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        let cursor = writer.finish().unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    #[test]
    fn test_storage_order_does_not_matter() {
        let path = Path::new("test.zip");
        let mut forward = archive(&[("a.txt", b"one"), ("b/c.txt", b"two")]);
        let mut backward = archive(&[("b/c.txt", b"two"), ("a.txt", b"one")]);

        let forward = Manifest::from_archive(&mut forward, path).unwrap();
        let backward = Manifest::from_archive(&mut backward, path).unwrap();
        assert_eq!(forward.to_bytes(), backward.to_bytes());
    }

    #[test]
    fn test_serialization_layout() {
        let mut zip = archive(&[("x", b"")]);
        let manifest = Manifest::from_archive(&mut zip, Path::new("x.zip")).unwrap();

        let text = String::from_utf8(manifest.to_bytes()).unwrap();
        assert_eq!(
            text,
            "pisi-manifest/1 sha256\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855  x\n"
        );
    }

    #[test]
    fn test_member_content_changes_manifest() {
        let path = Path::new("test.zip");
        let mut original = archive(&[("a.txt", b"one")]);
        let mut modified = archive(&[("a.txt", b"One")]);

        assert_ne!(
            Manifest::from_archive(&mut original, path).unwrap(),
            Manifest::from_archive(&mut modified, path).unwrap()
        );
    }

    #[test]
    fn test_line_break_in_name_is_rejected() {
        let entries = vec![ManifestEntry {
            name: "evil\nname".to_string(),
            digest: "00".to_string(),
        }];
        let result = Manifest::from_entries(Path::new("bad.zip"), entries);
        assert!(matches!(result, Err(SignError::InvalidMemberName { .. })));
    }
}
