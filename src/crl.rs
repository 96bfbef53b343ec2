//! CRL sequence numbering. A generation run reserves the next version
//! inside an open transaction, performs its (external) CRL build, and then
//! either commits or rolls back the reservation. Versions are monotonic
//! and never reused, though a rolled-back reservation may leave a gap.

use rusqlite::{params, Transaction};
use tracing::debug;

use crate::data::error::Result;
use crate::db::CaStore;

/// A reserved CRL version, holding the reserving transaction open. Dropping
/// the reservation rolls it back.
pub struct CrlReservation<'store> {
    tx: Transaction<'store>,
    version: i64,
}

impl CaStore {
    /// Reserve the next CRL version for `ca_id` (1 when none exists yet),
    /// recording `timestamp` as the generation date.
    pub fn begin_crl(&mut self, ca_id: i64, timestamp: i64) -> Result<CrlReservation<'_>> {
        let tx = self.conn.transaction()?;

        let last: Option<i64> = tx.query_row(
            "SELECT MAX(crl_version) FROM ca_crl WHERE ca_id = ?1",
            params![ca_id],
            |row| row.get(0),
        )?;
        let version = last.unwrap_or(0) + 1;

        tx.execute(
            "INSERT INTO ca_crl (ca_id, crl_version, date) VALUES (?1, ?2, ?3)",
            params![ca_id, version, timestamp],
        )?;

        debug!("Reserved CRL version {} for CA {}", version, ca_id);
        Ok(CrlReservation { tx, version })
    }
}

impl CrlReservation<'_> {
    /// The reserved version number.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Commit the reservation; the version is now permanently recorded.
    pub fn commit(self) -> Result<()> {
        Ok(self.tx.commit()?)
    }

    /// Discard the reservation. The version number may be handed out again
    /// by the next `begin_crl`.
    pub fn rollback(self) -> Result<()> {
        Ok(self.tx.rollback()?)
    }
}
