use std::path::Path;

use ldap_utils_core::config::Config;
use ldap_utils_ldap::client::LdapClient;

/// Run the `test-connection` command: bind to LDAP and unbind.
pub async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = Config::load(Path::new(config_path))?;
    let client = LdapClient::new(&config.ldap);

    println!("Testing LDAP connection to {}...", client.url());
    match client.test_connection().await {
        Ok(()) => {
            println!("LDAP connection successful!");
            Ok(())
        }
        Err(e) => {
            println!("LDAP connection failed: {e}");
            Err(e.into())
        }
    }
}
