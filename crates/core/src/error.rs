//! Error types shared by all ldap-utils crates.

use thiserror::Error;

/// Top-level error type for all ldap-utils operations.
#[derive(Debug, Error)]
pub enum LdapUtilsError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid config path `{0}`")]
    ConfigNotFound(String),

    #[error("failed to parse JSON in config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("unable to reach host `{host}`: {message}")]
    LdapConnect { host: String, message: String },

    #[error("unexpected error while connecting to `{host}`: {message}")]
    LdapConnectUnexpected { host: String, message: String },

    #[error("unable to authenticate: {0}")]
    LdapBind(String),

    #[error("unexpected error while searching for users: {0}")]
    LdapSearch(String),

    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error("StoredSafe error: {0}")]
    StoredSafe(String),

    #[error("StoredSafe authentication error: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("prompt error: {0}")]
    Prompt(String),
}

impl LdapUtilsError {
    /// Process exit code reported by the CLI for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LdapSearch(_) | Self::Io(_) => 1,
            Self::InvalidAttribute(_) => 3,
            Self::LdapConnectUnexpected { .. } => 11,
            Self::LdapConnect { .. } => 13,
            Self::LdapBind(_) => 12,
            Self::Config(_) | Self::Regex(_) => 21,
            Self::ConfigNotFound(_) => 22,
            Self::ConfigParse(_) => 23,
            Self::StoredSafe(_) | Self::Http(_) => 31,
            Self::Auth(_) | Self::Prompt(_) => 32,
        }
    }
}

/// A convenience Result alias that defaults to [`LdapUtilsError`].
pub type Result<T> = std::result::Result<T, LdapUtilsError>;
