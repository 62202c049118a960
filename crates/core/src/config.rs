//! JSON configuration for ldap-utils.
//!
//! The file describes how to reach the LDAP server, which searches to run,
//! which attributes to extract from each result, and how extracted LDAP
//! attributes correspond to StoredSafe user fields.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LdapUtilsError, Result};

/// File name of the StoredSafe token file in the user's home directory.
pub const RC_FILE_NAME: &str = ".storedsafe-client.rc";

/// Top-level configuration, deserialized from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ldap: LdapConfig,
    #[serde(default)]
    pub convert: Vec<FieldPair>,
    #[serde(rename = "match")]
    pub match_rules: Vec<MatchRule>,
    #[serde(default)]
    pub storedsafe: StoredSafeSettings,
}

/// LDAP server, bind credentials and searches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    pub server_parameters: LdapServerConfig,
    #[serde(default, alias = "connection")]
    pub connection_parameters: LdapConnectionConfig,
    pub search: Vec<SearchConfig>,
}

/// Where and how to reach the LDAP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapServerConfig {
    /// Host name, optionally with an `ldap://` or `ldaps://` scheme.
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
    #[serde(default)]
    pub starttls: bool,
    /// Connect timeout in seconds.
    #[serde(default)]
    pub connect_timeout: Option<u64>,
}

impl LdapServerConfig {
    /// Build the `ldap://` / `ldaps://` URL for this server.
    pub fn url(&self) -> String {
        if self.host.contains("://") {
            return match self.port {
                Some(port) if !has_port(&self.host) => format!("{}:{port}", self.host),
                _ => self.host.clone(),
            };
        }
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        let port = self
            .port
            .unwrap_or(if self.use_ssl { 636 } else { 389 });
        format!("{scheme}://{}:{port}", self.host)
    }
}

fn has_port(url: &str) -> bool {
    url.split("://")
        .nth(1)
        .map(|rest| rest.contains(':'))
        .unwrap_or(false)
}

/// Bind credentials. Without a user the connection binds anonymously.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LdapConnectionConfig {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// One configured query: a set of paged searches sharing the same field rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub search_options: Vec<SearchOptions>,
    pub fields: Vec<FieldConfig>,
}

impl SearchConfig {
    /// Names of the attributes requested from the server.
    pub fn attributes(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.attribute.clone()).collect()
    }
}

/// Parameters for a single paged search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub search_base: String,
    pub search_filter: String,
    #[serde(default)]
    pub search_scope: SearchScope,
    #[serde(default = "default_paged_size")]
    pub paged_size: i32,
}

fn default_paged_size() -> i32 {
    100
}

/// LDAP search scope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SearchScope {
    #[serde(alias = "base")]
    Base,
    #[serde(alias = "level")]
    Level,
    #[default]
    #[serde(alias = "subtree")]
    Subtree,
}

/// An attribute to extract from each search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub attribute: String,
    /// Only keep values matching this regex; capture group 1 is used when present.
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replace: Vec<ReplaceRule>,
}

/// A `[pattern, replacement]` pair applied to every extracted value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplaceRule(pub String, pub String);

/// Correspondence between an LDAP attribute and a StoredSafe user field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldPair {
    pub ldap: String,
    pub storedsafe: String,
}

/// A match criterion, either a StoredSafe field named by `convert` or an inline pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MatchRule {
    Field(String),
    Pair(FieldPair),
}

impl MatchRule {
    /// StoredSafe field compared by this rule.
    pub fn storedsafe_field(&self) -> &str {
        match self {
            Self::Field(field) => field,
            Self::Pair(pair) => &pair.storedsafe,
        }
    }
}

/// StoredSafe client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSafeSettings {
    /// Token file; defaults to `~/.storedsafe-client.rc`.
    #[serde(default)]
    pub rc_path: Option<PathBuf>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

impl Default for StoredSafeSettings {
    fn default() -> Self {
        Self {
            rc_path: None,
            api_version: default_api_version(),
            tls_verify: true,
        }
    }
}

impl StoredSafeSettings {
    /// Resolve the token file location.
    pub fn rc_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.rc_path {
            return Ok(path.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(RC_FILE_NAME))
            .ok_or_else(|| LdapUtilsError::Config("unable to locate home directory".into()))
    }
}

fn default_api_version() -> String {
    "1.0".into()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LdapUtilsError::ConfigNotFound(path.display().to_string()));
            }
            Err(e) => {
                return Err(LdapUtilsError::Config(format!(
                    "unable to read {}: {e}",
                    path.display()
                )));
            }
        };
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Check the configuration for structural problems before connecting anywhere.
    pub fn validate(&self) -> Result<()> {
        if self.ldap.server_parameters.host.is_empty() {
            return Err(LdapUtilsError::Config(
                "ldap.server_parameters.host must not be empty".into(),
            ));
        }

        if self.ldap.search.is_empty() {
            return Err(LdapUtilsError::Config(
                "ldap.search must contain at least one search".into(),
            ));
        }

        let mut requested: HashSet<&str> = HashSet::new();
        for (i, search) in self.ldap.search.iter().enumerate() {
            if search.search_options.is_empty() {
                return Err(LdapUtilsError::Config(format!(
                    "ldap.search[{i}].search_options must not be empty"
                )));
            }
            if search.fields.is_empty() {
                return Err(LdapUtilsError::Config(format!(
                    "ldap.search[{i}].fields must not be empty"
                )));
            }
            for options in &search.search_options {
                if options.paged_size <= 0 {
                    return Err(LdapUtilsError::Config(format!(
                        "ldap.search[{i}] paged_size must be positive"
                    )));
                }
            }
            for field in &search.fields {
                if field.attribute.is_empty() {
                    return Err(LdapUtilsError::InvalidAttribute(format!(
                        "empty attribute name in ldap.search[{i}].fields"
                    )));
                }
                if let Some(ref pattern) = field.pattern {
                    regex::Regex::new(pattern)?;
                }
                for ReplaceRule(pattern, _) in &field.replace {
                    regex::Regex::new(pattern)?;
                }
                requested.insert(field.attribute.as_str());
            }
        }

        if self.match_rules.is_empty() {
            return Err(LdapUtilsError::Config(
                "match must contain at least one rule".into(),
            ));
        }

        for pair in &self.convert {
            if !requested.contains(pair.ldap.as_str()) {
                return Err(LdapUtilsError::InvalidAttribute(format!(
                    "convert references `{}` which no search requests",
                    pair.ldap
                )));
            }
        }

        for rule in &self.match_rules {
            match rule {
                MatchRule::Field(field) => {
                    if !self.convert.iter().any(|p| &p.storedsafe == field) {
                        return Err(LdapUtilsError::Config(format!(
                            "match field `{field}` is not produced by any convert entry"
                        )));
                    }
                }
                MatchRule::Pair(pair) => {
                    if !requested.contains(pair.ldap.as_str()) {
                        return Err(LdapUtilsError::InvalidAttribute(format!(
                            "match references `{}` which no search requests",
                            pair.ldap
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
