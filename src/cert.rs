//! Thin wrappers turning PEM text into the structured metadata the store
//! persists alongside it. All X.509 handling is delegated to openssl; the
//! store itself never interprets certificate contents beyond these fields.

use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::x509::{X509, X509NameRef, X509Req};

use crate::data::error::Result;

/// Metadata extracted from one certificate PEM.
#[derive(Clone, Debug)]
pub struct ParsedCertificate {
    pub subject_dn: String,
    pub issuer_dn: String,
    pub cn: Option<String>,
    /// Decimal representation of the X.509 serial number field. Distinct
    /// from the store's own per-CA serial column.
    pub serial: String,
    pub not_before: i64,
    pub not_after: i64,
    pub sha256_fingerprint: String,
}

/// Metadata extracted from one certificate signing request PEM.
#[derive(Clone, Debug)]
pub struct ParsedRequest {
    pub subject_dn: String,
    pub cn: Option<String>,
}

pub fn parse_certificate_pem(pem: &str) -> Result<ParsedCertificate> {
    let x509 = X509::from_pem(pem.as_bytes())?;

    Ok(ParsedCertificate {
        subject_dn: name_to_dn(x509.subject_name())?,
        issuer_dn: name_to_dn(x509.issuer_name())?,
        cn: name_cn(x509.subject_name()),
        serial: x509.serial_number().to_bn()?.to_dec_str()?.to_string(),
        not_before: asn1_to_unix(x509.not_before())?,
        not_after: asn1_to_unix(x509.not_after())?,
        sha256_fingerprint: fingerprint_hex(&x509.digest(MessageDigest::sha256())?),
    })
}

pub fn parse_request_pem(pem: &str) -> Result<ParsedRequest> {
    let req = X509Req::from_pem(pem.as_bytes())?;

    Ok(ParsedRequest {
        subject_dn: name_to_dn(req.subject_name())?,
        cn: name_cn(req.subject_name()),
    })
}

/// Renders a name as `CN=…,O=…,…` in certificate order. Stores written by
/// earlier versions carry exactly this shape in their dn columns, so the
/// rendering must stay stable.
fn name_to_dn(name: &X509NameRef) -> Result<String> {
    let mut parts = Vec::new();
    for entry in name.entries() {
        let key = entry.object().nid().short_name()?;
        let value = entry.data().as_utf8()?;
        parts.push(format!("{key}={value}"));
    }
    Ok(parts.join(","))
}

fn name_cn(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|value| value.to_string())
}

fn asn1_to_unix(time: &Asn1TimeRef) -> Result<i64> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    Ok(i64::from(diff.days) * 86_400 + i64::from(diff.secs))
}

fn fingerprint_hex(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}
