//! StoredSafe session handling: reuse a saved token or log in interactively.

use std::io::IsTerminal;
use std::path::Path;

use dialoguer::{Input, Password, Select};
use tracing::info;

use ldap_utils_core::config::StoredSafeSettings;
use ldap_utils_core::error::{LdapUtilsError, Result};

use crate::client::StoredSafeClient;
use crate::rc::RcFile;

/// Second factor used when logging in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginType {
    Totp,
    Yubikey,
}

/// Everything needed to log in.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub site: String,
    pub apikey: String,
    pub username: String,
    pub passphrase: String,
    pub login_type: LoginType,
    pub otp: String,
}

/// Source of login credentials.
pub trait CredentialPrompt {
    /// Ask for credentials, offering values from the RC file as defaults.
    fn credentials(&self, saved: &RcFile) -> Result<Credentials>;
}

/// Prompts on the terminal using dialoguer.
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn credentials(&self, saved: &RcFile) -> Result<Credentials> {
        if !std::io::stdin().is_terminal() {
            return Err(LdapUtilsError::Prompt(
                "no valid StoredSafe token and stdin is not a terminal; run `ldap-utils login` first"
                    .into(),
            ));
        }

        let site = prompt_text("Site", saved.site())?;
        let apikey = prompt_text("API key", saved.apikey())?;
        let username = prompt_text("Username", saved.username())?;
        let passphrase = Password::new()
            .with_prompt("Passphrase")
            .interact()
            .map_err(|e| LdapUtilsError::Prompt(e.to_string()))?;
        let choice = Select::new()
            .with_prompt("Login type")
            .items(&["TOTP", "YubiKey"])
            .default(0)
            .interact()
            .map_err(|e| LdapUtilsError::Prompt(e.to_string()))?;
        let (login_type, otp_prompt) = if choice == 0 {
            (LoginType::Totp, "TOTP code")
        } else {
            (LoginType::Yubikey, "Press your YubiKey")
        };
        let otp = Password::new()
            .with_prompt(otp_prompt)
            .interact()
            .map_err(|e| LdapUtilsError::Prompt(e.to_string()))?;

        Ok(Credentials {
            site,
            apikey,
            username,
            passphrase,
            login_type,
            otp,
        })
    }
}

fn prompt_text(prompt: &str, default: Option<&str>) -> Result<String> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(value) = default {
        input = input.default(value.to_string());
    }
    input
        .interact_text()
        .map_err(|e| LdapUtilsError::Prompt(e.to_string()))
}

/// Return a client with a valid token, logging in when the saved one is missing or expired.
pub async fn open_session(
    settings: &StoredSafeSettings,
    prompt: &dyn CredentialPrompt,
) -> Result<StoredSafeClient> {
    let rc_path = settings.rc_path()?;
    let saved = match RcFile::load(&rc_path)? {
        Some(rc) => rc,
        None => {
            info!(path = %rc_path.display(), "no RC file found, logging in for the first time");
            return login_with(settings, &rc_path, RcFile::default(), prompt).await;
        }
    };

    match saved_client(settings, &saved)? {
        Some(client) => {
            if client.check().await? {
                return Ok(client);
            }
            info!("no valid token found, logging in");
        }
        None => info!("no token found, logging in"),
    }
    login_with(settings, &rc_path, saved, prompt).await
}

/// Log in unconditionally and save the new token.
pub async fn login(
    settings: &StoredSafeSettings,
    prompt: &dyn CredentialPrompt,
) -> Result<StoredSafeClient> {
    let rc_path = settings.rc_path()?;
    let saved = RcFile::load(&rc_path)?.unwrap_or_default();
    login_with(settings, &rc_path, saved, prompt).await
}

/// Whether the saved token is valid. Missing RC file or token counts as invalid.
pub async fn check(settings: &StoredSafeSettings) -> Result<bool> {
    let rc_path = settings.rc_path()?;
    let Some(saved) = RcFile::load(&rc_path)? else {
        return Ok(false);
    };
    match saved_client(settings, &saved)? {
        Some(client) => client.check().await,
        None => Ok(false),
    }
}

/// Invalidate the saved token and drop it from the RC file.
pub async fn logout(settings: &StoredSafeSettings) -> Result<()> {
    let rc_path = settings.rc_path()?;
    let Some(mut saved) = RcFile::load(&rc_path)? else {
        info!("no RC file found, nothing to log out");
        return Ok(());
    };
    if let Some(mut client) = saved_client(settings, &saved)? {
        client.logout().await?;
    }
    saved.remove("token");
    saved.save(&rc_path)
}

fn saved_client(settings: &StoredSafeSettings, saved: &RcFile) -> Result<Option<StoredSafeClient>> {
    match (saved.site(), saved.apikey(), saved.token()) {
        (Some(site), Some(apikey), Some(token)) => {
            Ok(Some(StoredSafeClient::new(site, apikey, settings)?.with_token(token)))
        }
        _ => Ok(None),
    }
}

async fn login_with(
    settings: &StoredSafeSettings,
    rc_path: &Path,
    mut saved: RcFile,
    prompt: &dyn CredentialPrompt,
) -> Result<StoredSafeClient> {
    let creds = prompt.credentials(&saved)?;
    let mut client = StoredSafeClient::new(&creds.site, &creds.apikey, settings)?;
    match creds.login_type {
        LoginType::Totp => {
            client
                .login_totp(&creds.username, &creds.passphrase, &creds.otp)
                .await?
        }
        LoginType::Yubikey => {
            client
                .login_yubikey(&creds.username, &creds.passphrase, &creds.otp)
                .await?
        }
    }

    let token = client
        .token()
        .ok_or_else(|| LdapUtilsError::Auth("login returned no token".into()))?;
    saved.set("username", &creds.username);
    saved.set("apikey", &creds.apikey);
    saved.set("mysite", &creds.site);
    saved.set("token", token);
    saved.save(rc_path)?;
    info!(path = %rc_path.display(), "saved StoredSafe token");

    Ok(client)
}
