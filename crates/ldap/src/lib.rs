//! ldap-utils LDAP -- directory searches feeding the StoredSafe sync.
//!
//! This crate binds to the configured server and runs paged searches,
//! turning each result entry into an [`ldap_utils_core::models::LdapUser`].

pub mod client;
