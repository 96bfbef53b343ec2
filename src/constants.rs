use argon2::{Algorithm, Argon2, Params, Version};
use once_cell::sync::Lazy;

/// Schema version written by this build; stores at lower versions are
/// migrated in place on open.
pub const CURRENT_DB_VERSION: i64 = 5;

pub(crate) const PROP_DB_VERSION: &str = "ca_db_version";
pub(crate) const PROP_ROOT_CERTIFICATE_PEM: &str = "ca_root_certificate_pem";
pub(crate) const PROP_LAST_ASSIGNED_SERIAL: &str = "ca_root_last_assigned_serial";
pub(crate) const PROP_IS_PASSWORD_PROTECTED: &str = "ca_db_is_password_protected";
pub(crate) const PROP_HASHED_PASSWORD: &str = "ca_db_hashed_password";

pub const POLICY_MONTHS_TO_EXPIRE: &str = "MONTHS_TO_EXPIRE";
pub const POLICY_HOURS_BETWEEN_CRL_UPDATES: &str = "HOURS_BETWEEN_CRL_UPDATES";
pub const POLICY_DIGITAL_SIGNATURE: &str = "DIGITAL_SIGNATURE";
pub const POLICY_KEY_ENCIPHERMENT: &str = "KEY_ENCIPHERMENT";
pub const POLICY_KEY_AGREEMENT: &str = "KEY_AGREEMENT";
pub const POLICY_DATA_ENCIPHERMENT: &str = "DATA_ENCIPHERMENT";
pub const POLICY_TLS_WEB_SERVER: &str = "TLS_WEB_SERVER";
pub const POLICY_TLS_WEB_CLIENT: &str = "TLS_WEB_CLIENT";
pub const POLICY_EMAIL_PROTECTION: &str = "EMAIL_PROTECTION";

/// Policies seeded for the root CA when a store is created.
pub(crate) const DEFAULT_POLICIES: &[(&str, i64)] = &[
    (POLICY_MONTHS_TO_EXPIRE, 60),
    (POLICY_HOURS_BETWEEN_CRL_UPDATES, 24),
    (POLICY_DIGITAL_SIGNATURE, 1),
    (POLICY_KEY_ENCIPHERMENT, 1),
    (POLICY_KEY_AGREEMENT, 1),
    (POLICY_DATA_ENCIPHERMENT, 1),
    (POLICY_TLS_WEB_SERVER, 1),
    (POLICY_TLS_WEB_CLIENT, 1),
    (POLICY_EMAIL_PROTECTION, 1),
];

#[cfg(not(test))]
pub(crate) static ARGON2: Lazy<Argon2<'static>> = Lazy::new(|| {
    let params = Params::new(64 * 1024, 3, 4, None)
        .expect("Failed to create Argon2 parameters");

    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
});

#[cfg(test)]
pub(crate) static ARGON2: Lazy<Argon2<'static>> = Lazy::new(|| {
    // Test setup (weaker params for speed)
    let params = Params::new(1024, 1, 1, None).unwrap();
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
});

/// Key-derivation instance for private-key encryption. Separate from
/// [`ARGON2`] because `hash_password_into` requires the configured output
/// length to match the 32-byte AES key.
#[cfg(not(test))]
pub(crate) static ARGON2_KDF: Lazy<Argon2<'static>> = Lazy::new(|| {
    let params = Params::new(64 * 1024, 3, 4, Some(32))
        .expect("Failed to create Argon2 parameters");

    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
});

#[cfg(test)]
pub(crate) static ARGON2_KDF: Lazy<Argon2<'static>> = Lazy::new(|| {
    let params = Params::new(1024, 1, 1, Some(32)).unwrap();
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
});
