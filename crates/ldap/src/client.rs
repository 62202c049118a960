//! LDAP client wrapper for directory searches.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use tracing::{debug, info};

use ldap_utils_core::config::{LdapConfig, SearchConfig, SearchOptions, SearchScope};
use ldap_utils_core::error::{LdapUtilsError, Result};
use ldap_utils_core::extract::{extract_record, FieldRule};
use ldap_utils_core::models::LdapUser;
use ldap_utils_core::source::DirectorySource;

/// LDAP client for read-only directory searches.
pub struct LdapClient {
    url: String,
    bind_dn: Option<String>,
    bind_password: String,
    tls_verify: bool,
    starttls: bool,
    connect_timeout: Option<Duration>,
}

impl LdapClient {
    /// Create a new client from the server and connection parameters.
    pub fn new(config: &LdapConfig) -> Self {
        let server = &config.server_parameters;
        let connection = &config.connection_parameters;
        Self {
            url: server.url(),
            bind_dn: connection.user.clone(),
            bind_password: connection.password.clone().unwrap_or_default(),
            tls_verify: server.tls_verify,
            starttls: server.starttls,
            connect_timeout: server.connect_timeout.map(Duration::from_secs),
        }
    }

    /// Return the server URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn settings(&self) -> LdapConnSettings {
        let mut settings = LdapConnSettings::new()
            .set_no_tls_verify(!self.tls_verify)
            .set_starttls(self.starttls);
        if let Some(timeout) = self.connect_timeout {
            settings = settings.set_conn_timeout(timeout);
        }
        settings
    }

    async fn connect(&self) -> Result<Ldap> {
        let (conn, mut ldap) = LdapConnAsync::with_settings(self.settings(), &self.url)
            .await
            .map_err(|e| connect_error(&self.url, e))?;

        ldap3::drive!(conn);

        match self.bind_dn {
            Some(ref bind_dn) => {
                ldap.simple_bind(bind_dn, &self.bind_password)
                    .await
                    .map_err(|e| LdapUtilsError::LdapBind(format!("LDAP bind failed: {e}")))?
                    .success()
                    .map_err(|e| LdapUtilsError::LdapBind(format!("LDAP bind rejected: {e}")))?;
                debug!(url = %self.url, bind_dn = %bind_dn, "LDAP bind successful");
            }
            None => debug!(url = %self.url, "using anonymous LDAP connection"),
        }

        Ok(ldap)
    }

    /// Test the LDAP connection by binding and unbinding.
    pub async fn test_connection(&self) -> Result<()> {
        let mut ldap = self.connect().await?;
        ldap.unbind()
            .await
            .map_err(|e| LdapUtilsError::LdapSearch(format!("LDAP unbind failed: {e}")))?;
        info!(url = %self.url, "LDAP connection test successful");
        Ok(())
    }

    /// Run a single paged search on a fresh connection.
    pub async fn paged_search(
        &self,
        options: &SearchOptions,
        attributes: &[String],
    ) -> Result<Vec<SearchEntry>> {
        let mut ldap = self.connect().await?;
        let entries = paged_search_with(&mut ldap, options, attributes).await?;
        ldap.unbind().await.ok();
        Ok(entries)
    }
}

/// Socket and timeout failures mean the host is unreachable; anything else
/// (bad URL, TLS setup) is unexpected.
fn connect_error(url: &str, err: LdapError) -> LdapUtilsError {
    match err {
        LdapError::Io { .. } | LdapError::Timeout { .. } => LdapUtilsError::LdapConnect {
            host: url.to_string(),
            message: err.to_string(),
        },
        other => LdapUtilsError::LdapConnectUnexpected {
            host: url.to_string(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl DirectorySource for LdapClient {
    async fn search(&self, search: &SearchConfig) -> Result<Vec<LdapUser>> {
        let rules = FieldRule::compile_all(&search.fields)?;
        let attributes = search.attributes();

        let mut ldap = self.connect().await?;
        let mut users = Vec::new();
        for options in &search.search_options {
            let entries = paged_search_with(&mut ldap, options, &attributes).await?;
            debug!(
                base = %options.search_base,
                filter = %options.search_filter,
                entries = entries.len(),
                "paged search finished"
            );
            users.extend(
                entries
                    .iter()
                    .map(|entry| extract_record(&entry.dn, &entry.attrs, &rules)),
            );
        }
        ldap.unbind().await.ok();

        info!(count = users.len(), "successfully fetched LDAP users");
        Ok(users)
    }
}

/// Stream a search through the paged results control, collecting every entry.
async fn paged_search_with(
    ldap: &mut Ldap,
    options: &SearchOptions,
    attributes: &[String],
) -> Result<Vec<SearchEntry>> {
    let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
        Box::new(EntriesOnly::new()),
        Box::new(PagedResults::new(options.paged_size)),
    ];
    let mut stream = ldap
        .streaming_search_with(
            adapters,
            &options.search_base,
            scope(options.search_scope),
            &options.search_filter,
            attributes.to_vec(),
        )
        .await
        .map_err(|e| LdapUtilsError::LdapSearch(format!("LDAP search failed: {e}")))?;

    let mut entries = Vec::new();
    while let Some(entry) = stream
        .next()
        .await
        .map_err(|e| LdapUtilsError::LdapSearch(format!("LDAP search error: {e}")))?
    {
        entries.push(SearchEntry::construct(entry));
    }

    stream
        .finish()
        .await
        .success()
        .map_err(|e| LdapUtilsError::LdapSearch(format!("LDAP search error: {e}")))?;

    Ok(entries)
}

fn scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::Level => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}
