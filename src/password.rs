//! Store password protection: every private key in the ledger is either in
//! clear (store unprotected) or encrypted under the current store password.
//! The three state transitions rewrite every stored key and the properties
//! in one transaction each, so a failure part-way is never committed.

use std::fmt::Display;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHashString, SaltString};
use argon2::{password_hash, PasswordHasher, PasswordVerifier};
use rusqlite::{params, Transaction};
use tracing::{info, warn};

use crate::constants::{ARGON2, PROP_HASHED_PASSWORD, PROP_IS_PASSWORD_PROTECTED};
use crate::data::error::{Error, Result};
use crate::db::{property_get, property_upsert, CaStore};
use crate::keywrap;

/// Argon2id hash of the store password, stored as a PHC string in
/// `ca_properties`.
#[derive(Clone, Debug)]
pub struct StorePassword(PasswordHashString);

impl StorePassword {
    pub(crate) fn new(password: &str) -> Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = ARGON2.hash_password(password.as_bytes(), &salt)?.serialize();
        Ok(StorePassword(hash))
    }

    /// Verify a candidate password against the stored hash.
    pub(crate) fn verify(&self, candidate: &str) -> bool {
        ARGON2
            .verify_password(candidate.as_bytes(), &self.0.password_hash())
            .is_ok()
    }
}

impl Display for StorePassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for StorePassword {
    type Error = password_hash::Error;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        Ok(StorePassword(PasswordHashString::new(s)?))
    }
}

impl CaStore {
    /// Whether private keys in this store are encrypted under a password.
    pub fn is_protected(&self) -> bool {
        match property_get(&self.conn, PROP_IS_PASSWORD_PROTECTED) {
            Ok(Some(value)) => value != "0",
            Ok(None) => false,
            Err(error) => {
                warn!("Failed to read protection flag: {error}");
                false
            }
        }
    }

    /// Verify a candidate store password. Always false for an unprotected
    /// store; no detail about why a password fails is exposed.
    pub fn check_password(&self, candidate: &str) -> bool {
        if !self.is_protected() {
            return false;
        }

        let stored = match property_get(&self.conn, PROP_HASHED_PASSWORD) {
            Ok(Some(stored)) => stored,
            _ => return false,
        };

        match StorePassword::try_from(stored.as_str()) {
            Ok(hash) => hash.verify(candidate),
            Err(_) => false,
        }
    }

    /// Turn protection on: set the flag and hashed password, then encrypt
    /// every stored private key under `new_password`.
    pub fn protect(&mut self, new_password: &str) -> Result<()> {
        if self.is_protected() {
            return Err(Error::AlreadyProtected);
        }

        let hashed = StorePassword::new(new_password)?;
        let tx = self.conn.transaction()?;

        property_upsert(&tx, PROP_IS_PASSWORD_PROTECTED, "1")?;
        property_upsert(&tx, PROP_HASHED_PASSWORD, &hashed.to_string())?;

        for table in KEY_TABLES {
            rewrite_keys(&tx, table, |key, dn| {
                keywrap::encrypt_private_key(key, dn, new_password)
            })?;
        }

        tx.commit()?;
        info!("Store password protection enabled");
        Ok(())
    }

    /// Turn protection off: decrypt every stored private key back to clear
    /// text, then clear the flag. Requires the current password; any key
    /// that fails to decrypt aborts the whole operation and the store stays
    /// protected.
    pub fn unprotect(&mut self, old_password: &str) -> Result<()> {
        if !self.is_protected() {
            return Err(Error::NotProtected);
        }
        if !self.check_password(old_password) {
            return Err(Error::WrongPassword);
        }

        let tx = self.conn.transaction()?;

        for table in KEY_TABLES {
            rewrite_keys(&tx, table, |key, dn| {
                keywrap::decrypt_private_key(key, dn, old_password)
            })?;
        }

        property_upsert(&tx, PROP_IS_PASSWORD_PROTECTED, "0")?;

        tx.commit()?;
        info!("Store password protection disabled");
        Ok(())
    }

    /// Re-encrypt every stored private key from `old_password` to
    /// `new_password` and update the stored hash, without any intermediate
    /// state ever being committed.
    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<()> {
        if !self.is_protected() {
            return Err(Error::NotProtected);
        }
        if !self.check_password(old_password) {
            return Err(Error::WrongPassword);
        }

        let tx = self.conn.transaction()?;

        for table in KEY_TABLES {
            rewrite_keys(&tx, table, |key, dn| {
                let clear = keywrap::decrypt_private_key(key, dn, old_password)?;
                keywrap::encrypt_private_key(&clear, dn, new_password)
            })?;
        }

        let hashed = StorePassword::new(new_password)?;
        property_upsert(&tx, PROP_HASHED_PASSWORD, &hashed.to_string())?;

        tx.commit()?;
        info!("Store password changed");
        Ok(())
    }
}

const KEY_TABLES: [&str; 2] = ["certificates", "cert_requests"];

/// Rewrite the private key of every key-bearing row of one table through
/// `rewrite`, inside the caller's transaction.
fn rewrite_keys<F>(tx: &Transaction, table: &str, mut rewrite: F) -> Result<()>
where
    F: FnMut(&str, &str) -> Result<String>,
{
    let rows: Vec<(i64, String, String)> = {
        let mut stmt = tx.prepare(&format!(
            "SELECT id, private_key, dn FROM {table} WHERE private_key_in_db != 0"
        ))?;
        let mapped = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        mapped.collect::<std::result::Result<Vec<_>, _>>()?
    };

    for (id, key, dn) in rows {
        let rewritten = rewrite(&key, &dn)?;
        tx.execute(
            &format!("UPDATE {table} SET private_key = ?1 WHERE id = ?2"),
            params![rewritten, id],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::StorePassword;

    #[test]
    fn hash_and_verify() {
        let hash = StorePassword::new("correct horse").unwrap();
        assert!(hash.verify("correct horse"));
        assert!(!hash.verify("battery staple"));
    }

    #[test]
    fn phc_round_trip() {
        let hash = StorePassword::new("s3cret").unwrap();
        let restored = StorePassword::try_from(hash.to_string().as_str()).unwrap();
        assert!(restored.verify("s3cret"));
    }

    #[test]
    fn malformed_hash_is_rejected() {
        assert!(StorePassword::try_from("not a phc string").is_err());
    }
}
