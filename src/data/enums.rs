use serde::{Deserialize, Serialize};

/// Which of the two key-bearing tables an id refers to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    Certificate,
    Request,
}

impl ElementType {
    pub(crate) fn table(self) -> &'static str {
        match self {
            ElementType::Certificate => "certificates",
            ElementType::Request => "cert_requests",
        }
    }
}

/// Columns reachable through [`CaStore::field_by_id`]. A closed enum so that
/// only known identifiers are ever spliced into SQL; values still go through
/// bound parameters.
///
/// [`CaStore::field_by_id`]: crate::CaStore::field_by_id
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Subject,
    Pem,
    PrivateKeyInDb,
    PrivateKey,
    Dn,
    /// Issuer DN; certificates only.
    ParentDn,
    /// Certificates only.
    Serial,
    /// Certificates only.
    Activation,
    /// Certificates only.
    Expiration,
    /// Certificates only.
    Revocation,
}

impl Field {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Field::Subject => "subject",
            Field::Pem => "pem",
            Field::PrivateKeyInDb => "private_key_in_db",
            Field::PrivateKey => "private_key",
            Field::Dn => "dn",
            Field::ParentDn => "parent_dn",
            Field::Serial => "serial",
            Field::Activation => "activation",
            Field::Expiration => "expiration",
            Field::Revocation => "revocation",
        }
    }
}
