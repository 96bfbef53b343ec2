#![allow(dead_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509ReqBuilder, X509};

use certvault::{CaCreationData, CaStore, CertCreationData};

pub fn timestamp_s(from_now_in_years: u64) -> i64 {
    let time = SystemTime::now() + Duration::from_secs(60 * 60 * 24 * 365 * from_now_in_years);
    time.duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

pub fn cert_creation_data() -> CertCreationData {
    CertCreationData {
        activation: timestamp_s(0),
        expiration: timestamp_s(1),
    }
}

fn generate_private_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let ec_key = EcKey::generate(&group).unwrap();
    PKey::from_ec_key(ec_key).unwrap()
}

fn create_cn(cn: &str) -> X509Name {
    let mut name_builder = X509NameBuilder::new().unwrap();
    name_builder.append_entry_by_text("CN", cn).unwrap();
    name_builder.build()
}

fn random_serial() -> BigNum {
    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    serial
}

/// Self-signed EC-P256 root certificate; returns (key PEM, certificate PEM).
pub fn generate_root_ca(cn: &str) -> (String, String) {
    let key = generate_private_key();
    let name = create_cn(cn);

    let mut x509 = X509Builder::new().unwrap();
    x509.set_version(2).unwrap();
    x509.set_serial_number(&BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    x509.set_subject_name(&name).unwrap();
    x509.set_issuer_name(&name).unwrap();
    x509.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    x509.set_not_after(&Asn1Time::days_from_now(3650).unwrap()).unwrap();
    x509.set_pubkey(&key).unwrap();
    x509.append_extension(BasicConstraints::new().ca().build().unwrap())
        .unwrap();
    x509.sign(&key, MessageDigest::sha256()).unwrap();
    let cert = x509.build();

    (
        String::from_utf8(key.private_key_to_pem_pkcs8().unwrap()).unwrap(),
        String::from_utf8(cert.to_pem().unwrap()).unwrap(),
    )
}

/// Leaf certificate signed by the given CA; returns (key PEM, certificate PEM).
pub fn generate_leaf(cn: &str, ca_key_pem: &str, ca_cert_pem: &str) -> (String, String) {
    let ca_cert = X509::from_pem(ca_cert_pem.as_bytes()).unwrap();
    let ca_key = PKey::private_key_from_pem(ca_key_pem.as_bytes()).unwrap();

    let key = generate_private_key();
    let name = create_cn(cn);

    let mut x509 = X509Builder::new().unwrap();
    x509.set_version(2).unwrap();
    x509.set_serial_number(&random_serial().to_asn1_integer().unwrap())
        .unwrap();
    x509.set_subject_name(&name).unwrap();
    x509.set_issuer_name(ca_cert.subject_name()).unwrap();
    x509.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    x509.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
    x509.set_pubkey(&key).unwrap();
    x509.sign(&ca_key, MessageDigest::sha256()).unwrap();
    let cert = x509.build();

    (
        String::from_utf8(key.private_key_to_pem_pkcs8().unwrap()).unwrap(),
        String::from_utf8(cert.to_pem().unwrap()).unwrap(),
    )
}

/// Signing request for the given CN; returns (key PEM, CSR PEM).
pub fn generate_csr(cn: &str) -> (String, String) {
    let key = generate_private_key();

    let mut req = X509ReqBuilder::new().unwrap();
    req.set_subject_name(&create_cn(cn)).unwrap();
    req.set_pubkey(&key).unwrap();
    req.sign(&key, MessageDigest::sha256()).unwrap();
    let req = req.build();

    (
        String::from_utf8(key.private_key_to_pem_pkcs8().unwrap()).unwrap(),
        String::from_utf8(req.to_pem().unwrap()).unwrap(),
    )
}

/// A freshly created store persisted into its own temp directory, with the
/// root key material kept around for issuing leaves.
pub struct TestCa {
    pub store: CaStore,
    pub key_pem: String,
    pub cert_pem: String,
    // Held so the store file outlives the test body.
    pub dir: tempfile::TempDir,
}

pub fn create_ca(cn: &str, password: Option<&str>) -> TestCa {
    let dir = tempfile::tempdir().unwrap();
    let (key_pem, cert_pem) = generate_root_ca(cn);

    let creation = CaCreationData {
        cn: cn.to_string(),
        activation: timestamp_s(0),
        expiration: timestamp_s(10),
        password: password.map(str::to_string),
    };

    let temp = CaStore::create(&creation, &key_pem, &cert_pem).unwrap();
    let store = temp.persist(dir.path().join("store.db3")).unwrap();

    TestCa {
        store,
        key_pem,
        cert_pem,
        dir,
    }
}
