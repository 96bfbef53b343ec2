//! Certificate and request ledger: serial allocation, issuance and
//! revocation records, pending requests, and per-CA policies, all against
//! one open [`CaStore`].

use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::cert;
use crate::constants::PROP_LAST_ASSIGNED_SERIAL;
use crate::data::enums::{ElementType, Field};
use crate::data::error::{Error, Result};
use crate::data::objects::{
    CertCreationData, CertificateRow, PolicyRow, RequestRow, RevokedCertificate,
};
use crate::db::{policy_upsert, property_get, property_upsert, value_to_string, CaStore};

impl CaStore {
    /// Serial of the most recently issued certificate. The next issuance
    /// reserves `last_serial() + 1` inside its own transaction.
    pub fn last_serial(&self) -> Result<i64> {
        let value = property_get(&self.conn, PROP_LAST_ASSIGNED_SERIAL)?
            .ok_or(Error::MissingProperty(PROP_LAST_ASSIGNED_SERIAL))?;
        value
            .parse()
            .map_err(|_| Error::MissingProperty(PROP_LAST_ASSIGNED_SERIAL))
    }

    /// Record one issued certificate and return its assigned serial.
    ///
    /// Subject CN and the DN columns come from parsing `pem_certificate`;
    /// the serial counter is read, incremented, and persisted in the same
    /// transaction as the insert, so a failure leaves it unchanged.
    ///
    /// When the store is password protected the caller must pass
    /// `pem_private_key` already encrypted under the store password (see
    /// [`keywrap`](crate::keywrap)), keeping every stored key consistent
    /// with the protection flag.
    pub fn insert_certificate(
        &mut self,
        creation: &CertCreationData,
        pem_private_key: Option<&str>,
        pem_certificate: &str,
    ) -> Result<i64> {
        let parsed = cert::parse_certificate_pem(pem_certificate)?;

        let tx = self.conn.transaction()?;

        let serial = property_get(&tx, PROP_LAST_ASSIGNED_SERIAL)?
            .and_then(|value| value.parse::<i64>().ok())
            .ok_or(Error::MissingProperty(PROP_LAST_ASSIGNED_SERIAL))?
            + 1;

        tx.execute(
            "INSERT INTO certificates (is_ca, serial, subject, activation, expiration, revocation, pem, private_key_in_db, private_key, dn, parent_dn) \
             VALUES (0, ?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?8, ?9)",
            params![
                serial,
                parsed.cn,
                creation.activation,
                creation.expiration,
                pem_certificate,
                pem_private_key.is_some(),
                pem_private_key,
                parsed.subject_dn,
                parsed.issuer_dn
            ],
        )?;

        property_upsert(&tx, PROP_LAST_ASSIGNED_SERIAL, &serial.to_string())?;
        tx.commit()?;

        debug!("Issued certificate '{}' with serial {}", parsed.subject_dn, serial);
        Ok(serial)
    }

    /// Record one pending signing request and return its row id. The subject
    /// comes from the CSR itself; a second pending request for the same DN
    /// is rejected.
    pub fn insert_request(
        &mut self,
        pem_private_key: Option<&str>,
        pem_csr: &str,
    ) -> Result<i64> {
        let parsed = cert::parse_request_pem(pem_csr)?;

        let tx = self.conn.transaction()?;

        if let Err(error) = tx.execute(
            "INSERT INTO cert_requests (subject, pem, private_key_in_db, private_key, dn) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                parsed.cn,
                pem_csr,
                pem_private_key.is_some(),
                pem_private_key,
                parsed.subject_dn
            ],
        ) {
            if is_constraint_violation(&error) {
                return Err(Error::DuplicateRequest(parsed.subject_dn));
            }
            return Err(error.into());
        }

        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Delete a pending request.
    pub fn remove_request(&mut self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM cert_requests WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Stamp a certificate revoked at the current time. Revocation is a
    /// one-way transition: an already-revoked certificate is an error, never
    /// a timestamp overwrite.
    pub fn revoke(&mut self, id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;

        let revocation: Option<Option<i64>> = tx
            .query_row(
                "SELECT revocation FROM certificates WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match revocation {
            None => return Err(Error::CertificateNotFound(id)),
            Some(Some(_)) => return Err(Error::AlreadyRevoked(id)),
            Some(None) => {}
        }

        let now = chrono::Utc::now().timestamp();
        tx.execute(
            "UPDATE certificates SET revocation = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        tx.commit()?;

        debug!("Revoked certificate {} at {}", id, now);
        Ok(())
    }

    /// Revoked certificates whose expiration is still in the future: the
    /// candidate set for CRL generation, ordered by id.
    pub fn revoked_certificates(&self) -> Result<Vec<RevokedCertificate>> {
        let mut stmt = self.conn.prepare(
            "SELECT pem, revocation FROM certificates \
             WHERE revocation IS NOT NULL \
             AND expiration > strftime('%s','now') ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RevokedCertificate {
                pem: row.get(0)?,
                revocation: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// All certificates ordered by id, optionally including revoked ones.
    pub fn certificates(&self, include_revoked: bool) -> Result<Vec<CertificateRow>> {
        let query = if include_revoked {
            "SELECT id, is_ca, serial, subject, activation, expiration, revocation, private_key_in_db, pem \
             FROM certificates ORDER BY id"
        } else {
            "SELECT id, is_ca, serial, subject, activation, expiration, revocation, private_key_in_db, pem \
             FROM certificates WHERE revocation IS NULL ORDER BY id"
        };

        let mut stmt = self.conn.prepare(query)?;
        let rows = stmt.query_map([], |row| {
            Ok(CertificateRow {
                id: row.get(0)?,
                is_ca: row.get(1)?,
                serial: row.get(2)?,
                subject: row.get(3)?,
                activation: row.get(4)?,
                expiration: row.get(5)?,
                revocation: row.get(6)?,
                private_key_in_db: row.get(7)?,
                pem: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// All pending requests ordered by id.
    pub fn requests(&self) -> Result<Vec<RequestRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject, private_key_in_db, pem FROM cert_requests ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RequestRow {
                id: row.get(0)?,
                subject: row.get(1)?,
                private_key_in_db: row.get(2)?,
                pem: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// All policies of one CA ordered by id.
    pub fn policies(&self, ca_id: i64) -> Result<Vec<PolicyRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT ca_id, name, value FROM ca_policies WHERE ca_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![ca_id], |row| {
            let raw: Value = row.get(2)?;
            Ok(PolicyRow {
                ca_id: row.get(0)?,
                name: row.get(1)?,
                value: value_to_string(raw)
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(0),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Single-field lookup by id against either table. `None` when the row
    /// does not exist or the column is NULL.
    pub fn field_by_id(
        &self,
        element: ElementType,
        id: i64,
        field: Field,
    ) -> Result<Option<String>> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            field.column(),
            element.table()
        );
        let value: Option<Value> = self
            .conn
            .query_row(&query, params![id], |row| row.get(0))
            .optional()?;
        Ok(value.and_then(value_to_string))
    }

    pub fn dn_by_id(&self, element: ElementType, id: i64) -> Result<Option<String>> {
        self.field_by_id(element, id, Field::Dn)
    }

    pub fn pem_by_id(&self, element: ElementType, id: i64) -> Result<Option<String>> {
        self.field_by_id(element, id, Field::Pem)
    }

    pub fn private_key_by_id(&self, element: ElementType, id: i64) -> Result<Option<String>> {
        self.field_by_id(element, id, Field::PrivateKey)
    }

    pub fn private_key_in_db(&self, element: ElementType, id: i64) -> Result<bool> {
        Ok(self
            .field_by_id(element, id, Field::PrivateKeyInDb)?
            .map(|value| value != "0")
            .unwrap_or(false))
    }

    /// Value of one policy; 0 when it was never set.
    pub fn policy_get(&self, ca_id: i64, name: &str) -> Result<i64> {
        let value: Option<Value> = self
            .conn
            .query_row(
                "SELECT value FROM ca_policies WHERE name = ?1 AND ca_id = ?2",
                params![name, ca_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value
            .and_then(value_to_string)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0))
    }

    /// Set one policy, inserting or updating as needed.
    pub fn policy_set(&mut self, ca_id: i64, name: &str, value: i64) -> Result<()> {
        policy_upsert(&self.conn, ca_id, name, value)
    }
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
