//! Embedded signatures in archive comments

mod common;

use common::{init_test_logging, passphrase, trust_dir, write_zip, zip_comment, TestPki};
use pisign_core::signature::manifest::build_manifest;
use pisign_core::signature::{SignedArtifact, SignedBlob};
use pisign_core::{Signer, Verdict, Verifier};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

const MEMBERS: &[(&str, &[u8])] = &[
    ("metadata.xml", b"<PISI><Package>demo</Package></PISI>" as &[u8]),
    ("files.xml", b"<Files/>" as &[u8]),
    ("install.tar.xz", &[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x01] as &[u8]),
];

#[test]
fn test_archive_roundtrip_embeds_blob() {
    init_test_logging();
    let pki = TestPki::generate();
    let work = TempDir::new().unwrap();
    let package = work.path().join("demo-1.0-1-p1-x86_64.pisi");
    write_zip(&package, MEMBERS, None);

    let signed = Signer::new(pki.config())
        .sign_artifact(&package, &pki.leaf.signing_key(), &passphrase())
        .unwrap();
    assert_eq!(
        signed,
        SignedArtifact::Embedded {
            archive: package.clone()
        }
    );

    let blob = SignedBlob::parse(&zip_comment(&package)).unwrap().unwrap();
    assert_eq!(blob.certificate, pki.leaf.cert_bytes());

    // No sidecars and no leftover temp files for archives
    assert_eq!(fs::read_dir(work.path()).unwrap().count(), 1);

    let trusted = trust_dir();
    pki.leaf.trust_in(trusted.path(), "leaf");
    let verifier = Verifier::new(pki.config()).unwrap();
    assert_eq!(
        verifier.verify_artifact(&package, Some(trusted.path())),
        Verdict::Ok
    );
}

#[test]
fn test_member_change_is_corrupted() {
    init_test_logging();
    let pki = TestPki::generate();
    let work = TempDir::new().unwrap();
    let package = work.path().join("demo.zip");
    write_zip(&package, MEMBERS, None);

    Signer::new(pki.config())
        .sign_artifact(&package, &pki.leaf.signing_key(), &passphrase())
        .unwrap();
    let comment = String::from_utf8(zip_comment(&package)).unwrap();

    // Same blob, one member byte different
    let mut members = MEMBERS.to_vec();
    members[1] = ("files.xml", b"<Filez/>" as &[u8]);
    write_zip(&package, &members, Some(&comment));

    let verifier = Verifier::new(pki.config()).unwrap();
    assert_eq!(verifier.verify_artifact(&package, None), Verdict::Corrupted);
}

#[test]
fn test_added_member_is_corrupted() {
    init_test_logging();
    let pki = TestPki::generate();
    let work = TempDir::new().unwrap();
    let package = work.path().join("demo.zip");
    write_zip(&package, MEMBERS, None);

    Signer::new(pki.config())
        .sign_artifact(&package, &pki.leaf.signing_key(), &passphrase())
        .unwrap();
    let comment = String::from_utf8(zip_comment(&package)).unwrap();

    let mut members = MEMBERS.to_vec();
    members.push(("postinstall.sh", b"rm -rf /" as &[u8]));
    write_zip(&package, &members, Some(&comment));

    let verifier = Verifier::new(pki.config()).unwrap();
    assert_eq!(verifier.verify_artifact(&package, None), Verdict::Corrupted);
}

#[test]
fn test_repacking_in_another_order_still_verifies() {
    init_test_logging();
    let pki = TestPki::generate();
    let work = TempDir::new().unwrap();
    let package = work.path().join("demo.zip");
    write_zip(&package, MEMBERS, None);

    Signer::new(pki.config())
        .sign_artifact(&package, &pki.leaf.signing_key(), &passphrase())
        .unwrap();
    let comment = String::from_utf8(zip_comment(&package)).unwrap();

    let mut reversed = MEMBERS.to_vec();
    reversed.reverse();
    write_zip(&package, &reversed, Some(&comment));

    let verifier = Verifier::new(pki.config()).unwrap();
    assert_eq!(verifier.verify_artifact(&package, None), Verdict::Ok);
}

#[test]
fn test_comment_states() {
    init_test_logging();
    let pki = TestPki::generate();
    let work = TempDir::new().unwrap();
    let verifier = Verifier::new(pki.config()).unwrap();

    let plain = work.path().join("plain.zip");
    write_zip(&plain, MEMBERS, None);
    assert_eq!(verifier.verify_artifact(&plain, None), Verdict::Unsigned);

    let foreign = work.path().join("foreign.zip");
    write_zip(&foreign, MEMBERS, Some("created by some archiver"));
    assert_eq!(verifier.verify_artifact(&foreign, None), Verdict::Unsigned);

    let missing_field = work.path().join("missing_field.zip");
    write_zip(&missing_field, MEMBERS, Some("pisi-signed:Y2VydA=="));
    assert_eq!(
        verifier.verify_artifact(&missing_field, None),
        Verdict::Corrupted
    );

    let bad_base64 = work.path().join("bad_base64.zip");
    write_zip(&bad_base64, MEMBERS, Some("pisi-signed:@@@@:c2ln"));
    assert_eq!(
        verifier.verify_artifact(&bad_base64, None),
        Verdict::Corrupted
    );
}

#[test]
fn test_resigning_replaces_blob() {
    init_test_logging();
    let pki = TestPki::generate();
    let work = TempDir::new().unwrap();
    let package = work.path().join("demo.zip");
    write_zip(&package, MEMBERS, Some("pisi-signed:garbage"));

    let signer = Signer::new(pki.config());
    signer
        .sign_artifact(&package, &pki.self_signed.signing_key(), &passphrase())
        .unwrap();
    signer
        .sign_artifact(&package, &pki.leaf.signing_key(), &passphrase())
        .unwrap();

    let blob = SignedBlob::parse(&zip_comment(&package)).unwrap().unwrap();
    assert_eq!(blob.certificate, pki.leaf.cert_bytes());

    let verifier = Verifier::new(pki.config()).unwrap();
    assert_eq!(verifier.verify_artifact(&package, None), Verdict::Ok);
}

#[test]
fn test_verify_data_against_blob() {
    init_test_logging();
    let pki = TestPki::generate();
    let work = TempDir::new().unwrap();
    let package = work.path().join("demo.zip");
    write_zip(&package, MEMBERS, None);

    Signer::new(pki.config())
        .sign_artifact(&package, &pki.self_signed.signing_key(), &passphrase())
        .unwrap();
    let comment = zip_comment(&package);

    // The manifest is the signed payload, not the raw archive bytes
    let manifest = build_manifest(&package).unwrap();

    let verifier = Verifier::new(pki.config()).unwrap();
    assert_eq!(
        verifier.verify_data(&manifest, &comment, None),
        Verdict::SelfSigned
    );
    assert_eq!(
        verifier.verify_data(&fs::read(&package).unwrap(), &comment, None),
        Verdict::Corrupted
    );
}
