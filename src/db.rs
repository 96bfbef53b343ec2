use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use tempfile::TempPath;
use tracing::{debug, info};

use crate::cert;
use crate::constants::{
    CURRENT_DB_VERSION, PROP_DB_VERSION, PROP_HASHED_PASSWORD, PROP_IS_PASSWORD_PROTECTED,
    PROP_LAST_ASSIGNED_SERIAL, PROP_ROOT_CERTIFICATE_PEM,
};
use crate::data::error::{Error, Result};
use crate::data::objects::CaCreationData;
use crate::keywrap;
use crate::migrations;
use crate::password::StorePassword;

/// An open CA store: one SQLite file holding all state of one certification
/// authority. All ledger, policy, CRL, and password operations are methods on
/// this session object; dropping it closes the file.
#[derive(Debug)]
pub struct CaStore {
    pub(crate) conn: Connection,
    path: PathBuf,
}

/// A store that has been created but not yet confirmed to a final location.
/// It exclusively owns its temporary file: dropping the value deletes the
/// file, [`persist`](TempStore::persist) moves the contents into place.
#[derive(Debug)]
pub struct TempStore {
    path: TempPath,
}

/// Failure of [`CaStore::save_as`]. The original session is closed before the
/// byte copy starts, so on failure it is reopened and handed back here;
/// `store` is `None` only if that reopen failed as well.
#[derive(Debug)]
pub struct SaveAsError {
    pub error: Error,
    pub store: Option<CaStore>,
}

impl Display for SaveAsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "save-as failed: {}", self.error)
    }
}

impl std::error::Error for SaveAsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl CaStore {
    /// Create a new store at a fresh temporary path: all tables, the store
    /// properties, the root certificate row (`is_ca = 1`, serial 1), and the
    /// default policy set, written in a single transaction. The file is
    /// closed afterwards; confirm it to its final location with
    /// [`TempStore::persist`] or let it drop.
    pub fn create(
        creation: &CaCreationData,
        pem_private_key: &str,
        pem_certificate: &str,
    ) -> Result<TempStore> {
        let root = cert::parse_certificate_pem(pem_certificate)?;

        let temp = tempfile::Builder::new()
            .prefix("certvault-")
            .suffix(".db3")
            .tempfile()?;
        let path = temp.into_temp_path();
        debug!("Creating new CA store at {}", path.display());

        let mut conn = Connection::open(&path)?;
        let tx = conn.transaction()?;

        tx.execute_batch(
            "CREATE TABLE ca_properties (id INTEGER PRIMARY KEY, name TEXT UNIQUE, value TEXT);
             CREATE TABLE certificates (id INTEGER PRIMARY KEY, is_ca BOOLEAN, serial INT, subject TEXT, activation TIMESTAMP, expiration TIMESTAMP, revocation TIMESTAMP, pem TEXT, private_key_in_db BOOLEAN, private_key TEXT, dn TEXT, parent_dn TEXT);
             CREATE TABLE cert_requests (id INTEGER PRIMARY KEY, subject TEXT, pem TEXT, private_key_in_db BOOLEAN, private_key TEXT, dn TEXT UNIQUE);
             CREATE TABLE ca_policies (id INTEGER PRIMARY KEY, ca_id INTEGER, name TEXT, value TEXT, UNIQUE (ca_id, name));
             CREATE TABLE ca_crl (id INTEGER PRIMARY KEY, ca_id INTEGER, crl_version INTEGER, date TIMESTAMP, UNIQUE (ca_id, crl_version));",
        )?;

        property_upsert(&tx, PROP_DB_VERSION, &CURRENT_DB_VERSION.to_string())?;
        property_upsert(&tx, PROP_ROOT_CERTIFICATE_PEM, pem_certificate)?;

        // The root private key follows the protection invariant from the
        // first committed row on.
        let stored_key = match &creation.password {
            Some(password) => {
                keywrap::encrypt_private_key(pem_private_key, &root.subject_dn, password)?
            }
            None => pem_private_key.to_string(),
        };

        tx.execute(
            "INSERT INTO certificates (is_ca, serial, subject, activation, expiration, revocation, pem, private_key_in_db, private_key, dn, parent_dn) \
             VALUES (1, 1, ?1, ?2, ?3, NULL, ?4, 1, ?5, ?6, ?7)",
            params![
                creation.cn,
                creation.activation,
                creation.expiration,
                pem_certificate,
                stored_key,
                root.subject_dn,
                root.issuer_dn
            ],
        )?;
        let root_id = tx.last_insert_rowid();

        property_upsert(&tx, PROP_LAST_ASSIGNED_SERIAL, "1")?;

        match &creation.password {
            Some(password) => {
                let hashed = StorePassword::new(password)?;
                property_upsert(&tx, PROP_IS_PASSWORD_PROTECTED, "1")?;
                property_upsert(&tx, PROP_HASHED_PASSWORD, &hashed.to_string())?;
            }
            None => {
                property_upsert(&tx, PROP_IS_PASSWORD_PROTECTED, "0")?;
                property_upsert(&tx, PROP_HASHED_PASSWORD, "")?;
            }
        }

        for (name, value) in crate::constants::DEFAULT_POLICIES {
            policy_upsert(&tx, root_id, name, *value)?;
        }

        tx.commit()?;
        drop(conn);

        info!("Created CA store for '{}' at {}", creation.cn, path.display());
        Ok(TempStore { path })
    }

    /// Open an existing store and bring its schema up to the current
    /// version. Fails without touching the file if it does not exist; fails
    /// with the store unchanged at its pre-step version if a migration step
    /// cannot complete.
    pub fn open(path: impl AsRef<Path>) -> Result<CaStore> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let mut conn = Connection::open(path)?;
        migrations::run(&mut conn)?;

        debug!("Opened CA store at {}", path.display());
        Ok(CaStore {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Close the store, releasing the underlying file.
    pub fn close(self) {}

    /// Path the store was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the store, byte-copy it to `new_path`, and reopen there. On
    /// failure the original store is reopened and returned inside the error
    /// so the session survives a failed copy.
    pub fn save_as(self, new_path: impl AsRef<Path>) -> std::result::Result<CaStore, SaveAsError> {
        let new_path = new_path.as_ref();
        let CaStore { conn, path: old_path } = self;
        drop(conn);

        if let Err(error) = fs::copy(&old_path, new_path) {
            return Err(SaveAsError {
                error: error.into(),
                store: CaStore::open(&old_path).ok(),
            });
        }

        match CaStore::open(new_path) {
            Ok(store) => Ok(store),
            Err(error) => Err(SaveAsError {
                error,
                store: CaStore::open(&old_path).ok(),
            }),
        }
    }

    /// Schema version recorded in the store.
    pub fn schema_version(&self) -> Result<i64> {
        let value = property_get(&self.conn, PROP_DB_VERSION)?
            .ok_or(Error::MissingProperty(PROP_DB_VERSION))?;
        value
            .parse()
            .map_err(|_| Error::MissingProperty(PROP_DB_VERSION))
    }

    /// PEM of the root CA certificate as recorded at creation.
    pub fn root_certificate_pem(&self) -> Result<String> {
        property_get(&self.conn, PROP_ROOT_CERTIFICATE_PEM)?
            .ok_or(Error::MissingProperty(PROP_ROOT_CERTIFICATE_PEM))
    }
}

impl TempStore {
    /// Current (temporary) location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte-copy the store to its final location, delete the temporary
    /// file, and open the result.
    pub fn persist(self, new_path: impl AsRef<Path>) -> Result<CaStore> {
        let new_path = new_path.as_ref();
        fs::copy(&self.path, new_path)?;
        self.path.close()?;
        CaStore::open(new_path)
    }

    /// Delete the temporary store without confirming it.
    pub fn discard(self) -> Result<()> {
        Ok(self.path.close()?)
    }
}

/// Read one store property, stringified regardless of the storage class the
/// writing program used for the value.
pub(crate) fn property_get(conn: &Connection, name: &str) -> Result<Option<String>> {
    let value: Option<Value> = conn
        .query_row(
            "SELECT value FROM ca_properties WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;

    Ok(value.and_then(value_to_string))
}

pub(crate) fn property_upsert(conn: &Connection, name: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO ca_properties (name, value) VALUES (?1, ?2) \
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        params![name, value],
    )?;
    Ok(())
}

pub(crate) fn policy_upsert(conn: &Connection, ca_id: i64, name: &str, value: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO ca_policies (ca_id, name, value) VALUES (?1, ?2, ?3) \
         ON CONFLICT(ca_id, name) DO UPDATE SET value = excluded.value",
        params![ca_id, name, value],
    )?;
    Ok(())
}

pub(crate) fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(r) => Some(r.to_string()),
        Value::Text(t) => Some(t),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}
