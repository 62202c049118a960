//! Deactivation of StoredSafe users matched against LDAP.

use tracing::{debug, error, info};

use ldap_utils_core::config::Config;
use ldap_utils_core::error::Result;
use ldap_utils_core::models::VaultUser;
use ldap_utils_core::source::{DirectorySource, VaultDirectory};

use crate::search::run_search;

/// Summary of a deactivation run.
#[derive(Debug, Clone, Default)]
pub struct DeactivateSummary {
    pub ldap_users: usize,
    pub vault_users: usize,
    pub matched: usize,
    pub deactivated: usize,
    pub errors: usize,
    pub error_details: Option<String>,
    pub dry_run: bool,
    /// Usernames of every matched account, in vault order.
    pub matched_usernames: Vec<String>,
}

/// Clears the active flag on StoredSafe users matched by the configured searches.
pub struct DeactivateEngine<D, V> {
    directory: D,
    vault: V,
    config: Config,
}

impl<D: DirectorySource, V: VaultDirectory> DeactivateEngine<D, V> {
    /// Create a new engine.
    pub fn new(directory: D, vault: V, config: Config) -> Self {
        Self {
            directory,
            vault,
            config,
        }
    }

    /// Run the search and deactivate every match. With `dry_run` nothing is changed.
    ///
    /// A failed deactivation is logged and recorded; the remaining users are
    /// still processed.
    pub async fn run(&self, dry_run: bool) -> Result<DeactivateSummary> {
        info!(dry_run, "starting StoredSafe deactivation");

        let outcome = run_search(&self.config, &self.directory, &self.vault).await?;
        info!(
            matched = outcome.matched_users.len(),
            "matched users to be deactivated"
        );

        let mut summary = DeactivateSummary {
            ldap_users: outcome.ldap_users.len(),
            vault_users: outcome.vault_users.len(),
            matched: outcome.matched_users.len(),
            dry_run,
            matched_usernames: outcome
                .matched_users
                .iter()
                .map(|u| u.username.clone())
                .collect(),
            ..Default::default()
        };

        for user in &outcome.matched_users {
            debug!(user = %user.username, id = %user.id, "user should be deactivated");
            if dry_run {
                continue;
            }
            match self.deactivate(user).await {
                Ok(()) => summary.deactivated += 1,
                Err(e) => {
                    error!(user = %user.username, id = %user.id, error = %e, "failed to deactivate StoredSafe user");
                    record_error(&mut summary, &user.username, &e);
                }
            }
        }

        info!(
            deactivated = summary.deactivated,
            errors = summary.errors,
            dry_run,
            "StoredSafe deactivation completed"
        );
        Ok(summary)
    }

    async fn deactivate(&self, user: &VaultUser) -> Result<()> {
        let status = user.deactivated_status();
        info!(user = %user.username, id = %user.id, "deactivating");
        debug!(id = %user.id, from = user.status, to = status, "status change");
        self.vault.set_user_status(&user.id, status).await
    }
}

/// Record a per-user error in the summary, incrementing the error count
/// and appending the username and error message to the error details.
fn record_error(summary: &mut DeactivateSummary, username: &str, error: &dyn std::fmt::Display) {
    summary.errors += 1;
    let details = summary.error_details.get_or_insert_with(String::new);
    details.push_str(&format!("{username}: {error}\n"));
}
