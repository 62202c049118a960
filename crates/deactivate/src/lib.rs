//! ldap-utils Deactivate -- disable StoredSafe accounts of departed LDAP users.
//!
//! [`search`] runs the configured LDAP searches and matches the results
//! against active StoredSafe users; [`engine`] clears the active flag on
//! every matched account.

pub mod engine;
pub mod search;

#[cfg(test)]
mod testing;
