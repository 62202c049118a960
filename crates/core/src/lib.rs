//! ldap-utils core: configuration, errors, and the field extraction and
//! matching rules shared by the LDAP and StoredSafe sides of a sync.

pub mod config;
pub mod error;
pub mod extract;
pub mod mapping;
pub mod models;
pub mod source;
