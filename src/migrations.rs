//! In-place schema evolution. The store records its schema version in a
//! `ca_properties` row; opening a store at an older version walks the
//! ordered step list below, one transaction per step, until the current
//! version is reached. There is no downgrade path.

use rusqlite::{params, Connection, Transaction};
use tracing::info;

use crate::cert;
use crate::constants::{
    CURRENT_DB_VERSION, PROP_DB_VERSION, PROP_HASHED_PASSWORD, PROP_IS_PASSWORD_PROTECTED,
};
use crate::data::error::{Error, Result};
use crate::db::{property_get, property_upsert};

struct Migration {
    from: i64,
    apply: fn(&Transaction) -> Result<()>,
}

static MIGRATIONS: &[Migration] = &[
    Migration { from: 1, apply: policy_table },
    Migration { from: 2, apply: dn_columns },
    Migration { from: 3, apply: revocation_and_crl },
    Migration { from: 4, apply: password_properties },
];

/// Bring `conn` to [`CURRENT_DB_VERSION`]. A no-op for current stores; an
/// error for stores written by a newer build. Each step commits its own
/// transaction together with the version bump, so a failure leaves the file
/// at the last completed version.
pub(crate) fn run(conn: &mut Connection) -> Result<()> {
    let mut version = stored_version(conn)?;

    if version > CURRENT_DB_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    while version < CURRENT_DB_VERSION {
        let step = MIGRATIONS
            .iter()
            .find(|migration| migration.from == version)
            .ok_or(Error::UnsupportedVersion(version))?;

        let tx = conn.transaction()?;
        (step.apply)(&tx)?;
        property_upsert(&tx, PROP_DB_VERSION, &(version + 1).to_string())?;
        tx.commit()?;

        info!("Migrated store schema from version {} to {}", version, version + 1);
        version += 1;
    }

    Ok(())
}

/// Stores predating the version property are version 1.
fn stored_version(conn: &Connection) -> Result<i64> {
    Ok(property_get(conn, PROP_DB_VERSION)?
        .and_then(|value| value.parse().ok())
        .unwrap_or(1))
}

/// 1 → 2: per-CA policy table.
fn policy_table(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        "CREATE TABLE ca_policies (id INTEGER PRIMARY KEY, ca_id INTEGER, name TEXT, value TEXT, UNIQUE (ca_id, name));",
    )?;
    Ok(())
}

/// 2 → 3: DN and issuer-DN columns on both tables, backfilled by re-parsing
/// every stored PEM. `cert_requests` is rebuilt because the new dn column
/// carries a UNIQUE constraint.
fn dn_columns(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        "ALTER TABLE certificates ADD dn TEXT;
         ALTER TABLE certificates ADD parent_dn TEXT;",
    )?;

    for (id, pem) in table_pems(tx, "SELECT id, pem FROM certificates")? {
        let parsed = cert::parse_certificate_pem(&pem)?;
        tx.execute(
            "UPDATE certificates SET dn = ?1, parent_dn = ?2 WHERE id = ?3",
            params![parsed.subject_dn, parsed.issuer_dn, id],
        )?;
    }

    tx.execute_batch(
        "CREATE TABLE cert_requests_new (id INTEGER PRIMARY KEY, subject TEXT, pem TEXT, private_key_in_db BOOLEAN, private_key TEXT, dn TEXT UNIQUE);
         INSERT OR REPLACE INTO cert_requests_new SELECT *, NULL FROM cert_requests;
         DROP TABLE cert_requests;
         ALTER TABLE cert_requests_new RENAME TO cert_requests;",
    )?;

    for (id, pem) in table_pems(tx, "SELECT id, pem FROM cert_requests")? {
        let parsed = cert::parse_request_pem(&pem)?;
        tx.execute(
            "UPDATE cert_requests SET dn = ?1 WHERE id = ?2",
            params![parsed.subject_dn, id],
        )?;
    }

    Ok(())
}

/// 3 → 4: nullable revocation column (a table rebuild, since SQLite cannot
/// ALTER a column into the middle of the row) and the CRL sequence table.
fn revocation_and_crl(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        "CREATE TABLE certificates_new (id INTEGER PRIMARY KEY, is_ca BOOLEAN, serial INT, subject TEXT, activation TIMESTAMP, expiration TIMESTAMP, revocation TIMESTAMP, pem TEXT, private_key_in_db BOOLEAN, private_key TEXT, dn TEXT, parent_dn TEXT);
         INSERT OR REPLACE INTO certificates_new SELECT id, is_ca, serial, subject, activation, expiration, NULL, pem, private_key_in_db, private_key, dn, parent_dn FROM certificates;
         DROP TABLE certificates;
         ALTER TABLE certificates_new RENAME TO certificates;
         CREATE TABLE ca_crl (id INTEGER PRIMARY KEY, ca_id INTEGER, crl_version INTEGER, date TIMESTAMP, UNIQUE (ca_id, crl_version));",
    )?;
    Ok(())
}

/// 4 → 5: password-protection properties, default unprotected.
fn password_properties(tx: &Transaction) -> Result<()> {
    property_upsert(tx, PROP_IS_PASSWORD_PROTECTED, "0")?;
    property_upsert(tx, PROP_HASHED_PASSWORD, "")?;
    Ok(())
}

fn table_pems(tx: &Transaction, query: &str) -> Result<Vec<(i64, String)>> {
    let mut stmt = tx.prepare(query)?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}
