//! Seams between the search pipeline and the systems it talks to.

use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::error::Result;
use crate::models::{LdapUser, VaultUser};

/// A directory that can run configured searches.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Run every paged search of `search` and extract its configured fields.
    async fn search(&self, search: &SearchConfig) -> Result<Vec<LdapUser>>;
}

/// The StoredSafe user directory.
#[async_trait]
pub trait VaultDirectory: Send + Sync {
    /// All user accounts with the active flag set.
    async fn list_active_users(&self) -> Result<Vec<VaultUser>>;

    /// Overwrite a user's status bit field.
    async fn set_user_status(&self, user_id: &str, status: u32) -> Result<()>;
}
