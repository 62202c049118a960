//! The LDAP → StoredSafe search pipeline.

use tracing::info;

use ldap_utils_core::config::Config;
use ldap_utils_core::error::Result;
use ldap_utils_core::mapping::{conversion_pairs, get_matched_users, ldap_to_storedsafe};
use ldap_utils_core::models::{ConvertedUser, LdapUser, VaultUser};
use ldap_utils_core::source::{DirectorySource, VaultDirectory};

/// Everything produced by one pass of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub ldap_users: Vec<LdapUser>,
    pub vault_users: Vec<VaultUser>,
    pub converted_users: Vec<ConvertedUser>,
    pub matched_users: Vec<VaultUser>,
}

/// Run every configured search, fetch active vault users, convert and match.
pub async fn run_search<D, V>(config: &Config, directory: &D, vault: &V) -> Result<SearchOutcome>
where
    D: DirectorySource + ?Sized,
    V: VaultDirectory + ?Sized,
{
    let mut ldap_users = Vec::new();
    for search in &config.ldap.search {
        ldap_users.extend(directory.search(search).await?);
    }
    info!(count = ldap_users.len(), "LDAP search complete");

    let vault_users = vault.list_active_users().await?;

    let pairs = conversion_pairs(&config.convert, &config.match_rules);
    let converted_users = ldap_to_storedsafe(&ldap_users, &pairs);
    let matched_users = get_matched_users(&converted_users, &vault_users, &config.match_rules);

    Ok(SearchOutcome {
        ldap_users,
        vault_users,
        converted_users,
        matched_users,
    })
}
