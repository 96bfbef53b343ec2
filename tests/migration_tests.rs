mod common;

use rusqlite::{params, Connection};

use certvault::{CaStore, ElementType, Error};
use common::{generate_csr, generate_leaf, generate_root_ca, timestamp_s};

/// Lay out a store the way version 1 wrote it: no version property, no
/// policy table, no dn columns, no revocation column, no CRL table.
fn build_v1_store(path: &std::path::Path) {
    let (root_key, root_cert) = generate_root_ca("Legacy Root");
    let (leaf_key, leaf_cert) = generate_leaf("legacy.example", &root_key, &root_cert);
    let (csr_key, csr_pem) = generate_csr("pending.example");

    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE ca_properties (id INTEGER PRIMARY KEY, name TEXT UNIQUE, value TEXT);
         CREATE TABLE certificates (id INTEGER PRIMARY KEY, is_ca BOOLEAN, serial INT, subject TEXT, activation TIMESTAMP, expiration TIMESTAMP, pem TEXT, private_key_in_db BOOLEAN, private_key TEXT);
         CREATE TABLE cert_requests (id INTEGER PRIMARY KEY, subject TEXT, pem TEXT, private_key_in_db BOOLEAN, private_key TEXT);",
    )
    .unwrap();

    conn.execute(
        "INSERT INTO ca_properties (name, value) VALUES ('ca_root_certificate_pem', ?1)",
        params![root_cert],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO ca_properties (name, value) VALUES ('ca_root_last_assigned_serial', '2')",
        [],
    )
    .unwrap();

    conn.execute(
        "INSERT INTO certificates (is_ca, serial, subject, activation, expiration, pem, private_key_in_db, private_key) \
         VALUES (1, 1, 'Legacy Root', ?1, ?2, ?3, 1, ?4)",
        params![timestamp_s(0), timestamp_s(10), root_cert, root_key],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO certificates (is_ca, serial, subject, activation, expiration, pem, private_key_in_db, private_key) \
         VALUES (0, 2, 'legacy.example', ?1, ?2, ?3, 1, ?4)",
        params![timestamp_s(0), timestamp_s(1), leaf_cert, leaf_key],
    )
    .unwrap();

    conn.execute(
        "INSERT INTO cert_requests (subject, pem, private_key_in_db, private_key) \
         VALUES ('pending.example', ?1, 1, ?2)",
        params![csr_pem, csr_key],
    )
    .unwrap();
}

#[test]
fn version_1_store_migrates_to_current() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db3");
    build_v1_store(&path);

    let mut store = CaStore::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), certvault::constants::CURRENT_DB_VERSION);

    // 2→3 backfilled the DN columns by re-parsing each stored PEM.
    let certs = store.certificates(true).unwrap();
    assert_eq!(certs.len(), 2);
    for cert in &certs {
        let dn = store.dn_by_id(ElementType::Certificate, cert.id).unwrap();
        assert!(dn.is_some(), "dn not backfilled for certificate {}", cert.id);
    }
    assert_eq!(
        store.dn_by_id(ElementType::Certificate, certs[0].id).unwrap().as_deref(),
        Some("CN=Legacy Root")
    );
    assert_eq!(
        store
            .field_by_id(ElementType::Certificate, certs[1].id, certvault::Field::ParentDn)
            .unwrap()
            .as_deref(),
        Some("CN=Legacy Root")
    );

    let requests = store.requests().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        store.dn_by_id(ElementType::Request, requests[0].id).unwrap().as_deref(),
        Some("CN=pending.example")
    );

    // 3→4 added the revocation column and the CRL table.
    assert!(certs.iter().all(|cert| cert.revocation.is_none()));
    store.revoke(certs[1].id).unwrap();
    assert_eq!(store.revoked_certificates().unwrap().len(), 1);

    let reservation = store.begin_crl(1, timestamp_s(0)).unwrap();
    assert_eq!(reservation.version(), 1);
    reservation.commit().unwrap();

    // 4→5 defaulted the password properties to unprotected.
    assert!(!store.is_protected());
    assert!(!store.check_password("anything"));

    // The serial counter carried over untouched.
    assert_eq!(store.last_serial().unwrap(), 2);
}

#[test]
fn migration_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db3");
    build_v1_store(&path);

    let store = CaStore::open(&path).unwrap();
    let certs_before = store.certificates(true).unwrap().len();
    store.close();

    // Reopening an already-current store changes nothing.
    let store = CaStore::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), certvault::constants::CURRENT_DB_VERSION);
    assert_eq!(store.certificates(true).unwrap().len(), certs_before);
}

#[test]
fn newer_store_versions_are_refused() {
    let ca = common::create_ca("Future Root", None);
    let path = ca.store.path().to_path_buf();
    ca.store.close();

    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE ca_properties SET value = '6' WHERE name = 'ca_db_version'",
        [],
    )
    .unwrap();
    drop(conn);

    let result = CaStore::open(&path);
    assert!(matches!(result, Err(Error::UnsupportedVersion(6))));
}
