//! ldap-utils StoredSafe -- vault API client and token handling.
//!
//! This crate lists and edits StoredSafe user accounts, keeps the shared
//! `~/.storedsafe-client.rc` token file up to date, and logs in
//! interactively when no valid token is available.

pub mod client;
pub mod models;
pub mod rc;
pub mod session;
