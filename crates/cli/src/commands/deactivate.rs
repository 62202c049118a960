use std::path::Path;

use ldap_utils_core::config::Config;
use ldap_utils_deactivate::engine::{DeactivateEngine, DeactivateSummary};
use ldap_utils_ldap::client::LdapClient;
use ldap_utils_storedsafe::session::{open_session, TerminalPrompt};
use tracing::info;

/// Run the `deactivate` command: deactivate StoredSafe users matching the LDAP searches.
pub async fn run(config_path: &str, test: bool) -> anyhow::Result<()> {
    let config = Config::load(Path::new(config_path))?;
    config.validate()?;
    info!(path = %config_path, "loaded configuration");

    let directory = LdapClient::new(&config.ldap);
    directory.test_connection().await?;

    let vault = open_session(&config.storedsafe, &TerminalPrompt).await?;

    let engine = DeactivateEngine::new(directory, vault, config);
    let summary = engine.run(test).await?;
    print_summary(&summary);

    Ok(())
}

fn print_summary(summary: &DeactivateSummary) {
    println!(
        "Deactivation {}!",
        if summary.dry_run {
            "preview"
        } else {
            "completed"
        }
    );
    println!("  LDAP users:        {}", summary.ldap_users);
    println!("  StoredSafe users:  {}", summary.vault_users);
    println!("  Matched:           {}", summary.matched);
    println!("  Deactivated:       {}", summary.deactivated);
    println!("  Errors:            {}", summary.errors);

    if let Some(ref details) = summary.error_details {
        println!("  Error details:");
        for line in details.lines() {
            println!("    {}", line);
        }
    }

    if summary.dry_run {
        println!();
        for username in &summary.matched_usernames {
            println!("  would deactivate: {}", username);
        }
        println!("This was a test run. No StoredSafe users were changed.");
        println!("Run `ldap-utils deactivate` without --test to apply changes.");
    }
}
