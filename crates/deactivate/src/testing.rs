//! In-memory directory and vault used by the pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use ldap_utils_core::config::{Config, SearchConfig};
use ldap_utils_core::error::{LdapUtilsError, Result};
use ldap_utils_core::extract::{extract_record, FieldRule};
use ldap_utils_core::models::{LdapUser, VaultUser};
use ldap_utils_core::source::{DirectorySource, VaultDirectory};

/// A raw directory entry: DN and attribute values as the server returns them.
pub type Entry = (String, HashMap<String, Vec<String>>);

pub struct MockDirectory {
    /// Raw entries per search base. The search's field rules are applied to them.
    pub results: Vec<(String, Vec<Entry>)>,
}

#[async_trait]
impl DirectorySource for MockDirectory {
    async fn search(&self, search: &SearchConfig) -> Result<Vec<LdapUser>> {
        let rules = FieldRule::compile_all(&search.fields)?;
        let mut users = Vec::new();
        for options in &search.search_options {
            for (base, entries) in &self.results {
                if *base != options.search_base {
                    continue;
                }
                users.extend(
                    entries
                        .iter()
                        .map(|(dn, attrs)| extract_record(dn, attrs, &rules)),
                );
            }
        }
        Ok(users)
    }
}

pub struct MockVault {
    pub users: Vec<VaultUser>,
    pub fail_ids: Vec<String>,
    pub edits: Mutex<Vec<(String, u32)>>,
}

impl MockVault {
    pub fn new(users: Vec<VaultUser>) -> Self {
        Self {
            users,
            fail_ids: Vec::new(),
            edits: Mutex::new(Vec::new()),
        }
    }

    pub fn edits(&self) -> Vec<(String, u32)> {
        self.edits.lock().unwrap().clone()
    }
}

#[async_trait]
impl VaultDirectory for MockVault {
    async fn list_active_users(&self) -> Result<Vec<VaultUser>> {
        Ok(self.users.iter().filter(|u| u.is_active()).cloned().collect())
    }

    async fn set_user_status(&self, user_id: &str, status: u32) -> Result<()> {
        if self.fail_ids.iter().any(|id| id == user_id) {
            return Err(LdapUtilsError::StoredSafe(format!(
                "edit user failed (403 Forbidden): user {user_id}"
            )));
        }
        self.edits
            .lock()
            .unwrap()
            .push((user_id.to_string(), status));
        Ok(())
    }
}

pub fn entry(dn: &str, attrs: &[(&str, Vec<&str>)]) -> Entry {
    (
        dn.into(),
        attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect(),
    )
}

pub fn vault_user(id: &str, username: &str, email: &str, status: u32) -> VaultUser {
    serde_json::from_value(json!({
        "id": id,
        "username": username,
        "email": email,
        "status": status.to_string()
    }))
    .unwrap()
}

/// Two searches (disabled and expired accounts) matched on the full `mail` value.
pub fn config() -> Config {
    Config::from_json(
        r#"{
            "ldap": {
                "server_parameters": { "host": "dc01.example.com" },
                "search": [
                    {
                        "search_options": [
                            { "search_base": "OU=Disabled,DC=example,DC=com", "search_filter": "(objectClass=user)" }
                        ],
                        "fields": [ { "attribute": "mail" } ]
                    },
                    {
                        "search_options": [
                            { "search_base": "OU=Expired,DC=example,DC=com", "search_filter": "(objectClass=user)" }
                        ],
                        "fields": [ { "attribute": "mail" } ]
                    }
                ]
            },
            "convert": [ { "ldap": "mail", "storedsafe": "email" } ],
            "match": [ "email" ]
        }"#,
    )
    .unwrap()
}
