use std::path::Path;

use ldap_utils_core::config::{Config, StoredSafeSettings};
use ldap_utils_storedsafe::session::{self, TerminalPrompt};

/// StoredSafe settings from the config file, or defaults when none is given.
fn settings(config_path: Option<&str>) -> anyhow::Result<StoredSafeSettings> {
    match config_path {
        Some(path) => Ok(Config::load(Path::new(path))?.storedsafe),
        None => Ok(StoredSafeSettings::default()),
    }
}

/// Run the `login` command: log in and save a fresh token.
pub async fn login(config_path: Option<&str>) -> anyhow::Result<()> {
    let settings = settings(config_path)?;
    session::login(&settings, &TerminalPrompt).await?;
    println!("Logged in. Token saved to {}", settings.rc_path()?.display());
    Ok(())
}

/// Run the `check` command: report whether the saved token is valid.
pub async fn check(config_path: Option<&str>) -> anyhow::Result<()> {
    let settings = settings(config_path)?;
    if session::check(&settings).await? {
        println!("StoredSafe token is valid.");
        Ok(())
    } else {
        anyhow::bail!(ldap_utils_core::error::LdapUtilsError::Auth(
            "no valid StoredSafe token, run `ldap-utils login`".into()
        ))
    }
}

/// Run the `logout` command: invalidate the saved token.
pub async fn logout(config_path: Option<&str>) -> anyhow::Result<()> {
    let settings = settings(config_path)?;
    session::logout(&settings).await?;
    println!("Logged out.");
    Ok(())
}
