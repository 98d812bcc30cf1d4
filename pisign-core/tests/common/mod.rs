//! Test helper functions for integration tests
//!
//! Generates a throwaway PKI (a CA, a CA-issued signing certificate and a
//! self-signed one) in a temporary directory, plus small archive helpers.

#![allow(dead_code)]

use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::symm::Cipher;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509};
use pisign_core::signature::{Passphrase, SigningKey};
use pisign_core::SigningConfig;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

pub const PASSPHRASE: &str = "correct horse battery staple";

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Key and certificate files for one identity
pub struct Identity {
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
}

impl Identity {
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::load(&self.key_path, &self.cert_path).unwrap()
    }

    pub fn cert_bytes(&self) -> Vec<u8> {
        fs::read(&self.cert_path).unwrap()
    }

    /// Copy the certificate into a trust directory under an unrelated name
    pub fn trust_in(&self, trust_dir: &Path, file_name: &str) {
        fs::write(trust_dir.join(file_name), self.cert_bytes()).unwrap();
    }
}

/// A CA, a leaf issued by it, and an unrelated self-signed identity
pub struct TestPki {
    pub dir: TempDir,
    pub ca_file: PathBuf,
    pub leaf: Identity,
    pub self_signed: Identity,
}

impl TestPki {
    pub fn generate() -> Self {
        let dir = TempDir::new().unwrap();

        let ca_name = name("pisign test CA");
        let (ca_key, ca_cert) = ca(&ca_name);
        let ca_file = dir.path().join("ca.pem");
        fs::write(&ca_file, ca_cert.to_pem().unwrap()).unwrap();

        let leaf_key = rsa_key();
        let leaf_cert = leaf("release signer", &leaf_key, &ca_key, &ca_name);
        let leaf = write_identity(dir.path(), "leaf", &leaf_key, &leaf_cert);

        let self_key = rsa_key();
        let self_name = name("self signer");
        let self_cert = build_cert(&self_name, &self_name, &self_key, &self_key, 7, true);
        let self_signed = write_identity(dir.path(), "self", &self_key, &self_cert);

        Self {
            dir,
            ca_file,
            leaf,
            self_signed,
        }
    }

    /// Configuration whose only root is the test CA
    pub fn config(&self) -> SigningConfig {
        SigningConfig {
            system_roots: false,
            ca_file: Some(self.ca_file.clone()),
            ..SigningConfig::default()
        }
    }
}

pub fn passphrase() -> Passphrase {
    Passphrase::from(PASSPHRASE.to_string())
}

/// An empty trust directory
pub fn trust_dir() -> TempDir {
    TempDir::new().unwrap()
}

/// Write a zip with the given members, in the given order
pub fn write_zip(path: &Path, members: &[(&str, &[u8])], comment: Option<&str>) {
    let file = fs::File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    if let Some(comment) = comment {
        writer.set_comment(comment);
    }
    for (name, content) in members {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

/// Raw archive comment bytes
pub fn zip_comment(path: &Path) -> Vec<u8> {
    let file = fs::File::open(path).unwrap();
    zip::ZipArchive::new(file).unwrap().comment().to_vec()
}

fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

fn name(cn: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_text("CN", cn).unwrap();
    builder.build()
}

fn ca(subject: &X509Name) -> (PKey<Private>, X509) {
    let key = rsa_key();
    let cert = build_cert(subject, subject, &key, &key, 1, true);
    (key, cert)
}

fn leaf(
    cn: &str,
    key: &PKey<Private>,
    issuer_key: &PKey<Private>,
    issuer: &X509Name,
) -> X509 {
    build_cert(&name(cn), issuer, key, issuer_key, 2, false)
}

fn build_cert(
    subject: &X509Name,
    issuer: &X509Name,
    key: &PKey<Private>,
    issuer_key: &PKey<Private>,
    serial: u32,
    is_ca: bool,
) -> X509 {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();

    let serial = Asn1Integer::from_bn(&BigNum::from_u32(serial).unwrap()).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(subject).unwrap();
    builder.set_issuer_name(issuer).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();

    if is_ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    } else {
        builder
            .append_extension(BasicConstraints::new().build().unwrap())
            .unwrap();
        builder
            .append_extension(KeyUsage::new().digital_signature().build().unwrap())
            .unwrap();
    }

    builder.sign(issuer_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

fn write_identity(dir: &Path, stem: &str, key: &PKey<Private>, cert: &X509) -> Identity {
    let key_path = dir.join(format!("{stem}.key"));
    let cert_path = dir.join(format!("{stem}.crt"));

    let pem = key
        .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), PASSPHRASE.as_bytes())
        .unwrap();
    fs::write(&key_path, pem).unwrap();
    fs::write(&cert_path, cert.to_pem().unwrap()).unwrap();

    Identity {
        key_path,
        cert_path,
    }
}
