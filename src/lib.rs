//! Persistence and lifecycle engine for a private X.509 certification
//! authority. All CA state (root key and certificate, issued certificates,
//! pending signing requests, per-CA policies, CRL sequence numbers) lives
//! in one transactional SQLite file, the *store*.
//!
//! [`CaStore`] is the session object: create a store with
//! [`CaStore::create`] (yielding a [`TempStore`] until it is confirmed to a
//! final path), open an existing one with [`CaStore::open`] (which migrates
//! older schema versions in place), and run every ledger, policy, CRL, and
//! password operation as a method on the open session.

pub mod cert;
pub mod constants;
mod crl;
pub mod data;
mod db;
pub mod keywrap;
mod ledger;
mod migrations;
mod password;

pub use crl::CrlReservation;
pub use data::enums::{ElementType, Field};
pub use data::error::{Error, Result};
pub use data::objects::{
    CaCreationData, CertCreationData, CertificateRow, PolicyRow, RequestRow, RevokedCertificate,
};
pub use db::{CaStore, SaveAsError, TempStore};
pub use password::StorePassword;
