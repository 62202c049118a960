//! Records flowing through the search pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bit in a StoredSafe user's `status` field marking the account active.
pub const STATUS_ACTIVE: u32 = 1 << 7;

/// Attributes extracted from one LDAP search result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LdapUser {
    pub dn: String,
    /// Extracted attribute values, keyed by attribute name.
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl LdapUser {
    /// Values extracted for `attribute`, empty when none were extracted.
    pub fn values(&self, attribute: &str) -> &[String] {
        self.attributes
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// An LDAP user re-keyed by StoredSafe field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvertedUser {
    /// DN of the LDAP entry this record came from.
    pub dn: String,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ConvertedUser {
    /// Candidate values for a StoredSafe field.
    pub fn values(&self, field: &str) -> &[String] {
        self.fields
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A StoredSafe user account as returned by the user listing API.
///
/// The full record is kept so match rules can compare any field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct VaultUser {
    pub id: String,
    pub username: String,
    pub status: u32,
    pub fields: Map<String, Value>,
}

impl VaultUser {
    /// Whether the active bit is set.
    pub fn is_active(&self) -> bool {
        self.status & STATUS_ACTIVE != 0
    }

    /// Status value with the active bit cleared.
    pub fn deactivated_status(&self) -> u32 {
        self.status & !STATUS_ACTIVE
    }

    /// String form of a record field; numbers and booleans are rendered.
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(scalar_to_string)
    }
}

impl TryFrom<Map<String, Value>> for VaultUser {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = fields
            .get("id")
            .and_then(scalar_to_string)
            .ok_or("user record without id")?;
        let username = fields
            .get("username")
            .and_then(scalar_to_string)
            .unwrap_or_default();
        let status = fields
            .get("status")
            .and_then(scalar_to_string)
            .ok_or_else(|| format!("user {id} has no status"))?
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("user {id} has invalid status: {e}"))?;

        Ok(Self {
            id,
            username,
            status,
            fields,
        })
    }
}

impl From<VaultUser> for Map<String, Value> {
    fn from(user: VaultUser) -> Self {
        user.fields
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
