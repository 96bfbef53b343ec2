use serde::{Deserialize, Serialize};

/// Parameters collected when a new CA store is created. The key and
/// certificate PEM blobs travel separately.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaCreationData {
    /// Common name of the root CA, shown in listings.
    pub cn: String,
    /// Unix timestamp the root certificate becomes valid at.
    pub activation: i64,
    /// Unix timestamp the root certificate expires at.
    pub expiration: i64,
    /// When set, the store is password protected from creation on and the
    /// root private key is stored encrypted under this password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Parameters for issuing one certificate; subject fields come from the
/// certificate PEM itself.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CertCreationData {
    pub activation: i64,
    pub expiration: i64,
}

/// One row of the certificate listing, in table order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CertificateRow {
    pub id: i64,
    pub is_ca: bool,
    pub serial: i64,
    pub subject: Option<String>,
    pub activation: i64,
    pub expiration: i64,
    /// Unix timestamp of revocation; `None` while the certificate is valid.
    pub revocation: Option<i64>,
    pub private_key_in_db: bool,
    pub pem: String,
}

/// One row of the pending-request listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestRow {
    pub id: i64,
    pub subject: Option<String>,
    pub private_key_in_db: bool,
    pub pem: String,
}

/// One per-CA policy setting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyRow {
    pub ca_id: i64,
    pub name: String,
    pub value: i64,
}

/// A revoked, not-yet-expired certificate; these rows are the candidate
/// set for CRL generation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevokedCertificate {
    pub pem: String,
    pub revocation: i64,
}
