//! Typed reqwest wrapper for the StoredSafe REST API.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use ldap_utils_core::config::StoredSafeSettings;
use ldap_utils_core::error::{LdapUtilsError, Result};
use ldap_utils_core::models::VaultUser;
use ldap_utils_core::source::VaultDirectory;

use crate::models::{ApiResponse, TotpLogin, YubikeyLogin};

/// Header carrying the session token.
const TOKEN_HEADER: &str = "X-Http-Token";

/// HTTP client for StoredSafe API operations.
pub struct StoredSafeClient {
    http: reqwest::Client,
    base_url: String,
    apikey: String,
    token: Option<String>,
}

impl StoredSafeClient {
    /// Create a client for `site` (a host name, or a full `https://` URL).
    pub fn new(site: &str, apikey: &str, settings: &StoredSafeSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!settings.tls_verify)
            .build()
            .map_err(|e| LdapUtilsError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: api_base_url(site, &settings.api_version),
            apikey: apikey.to_string(),
            token: None,
        })
    }

    /// Override the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Use an existing session token.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// The current session token, if logged in.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Return the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| LdapUtilsError::Auth("no StoredSafe token, log in first".into()))?;
        Ok(req.header(TOKEN_HEADER, token))
    }

    /// Check whether the current token is still valid.
    pub async fn check(&self) -> Result<bool> {
        let req = self.authorized(self.http.post(self.url("/auth/check")))?;
        let resp = req
            .send()
            .await
            .map_err(|e| LdapUtilsError::Http(format!("token check request failed: {e}")))?;

        let status = resp.status();
        let body = resp.json::<ApiResponse>().await.ok();
        let valid = status.is_success() && body.is_some_and(|b| b.is_success());
        debug!(%status, valid, "StoredSafe token check");
        Ok(valid)
    }

    /// Log in with passphrase and a TOTP code, storing the returned token.
    pub async fn login_totp(&mut self, username: &str, passphrase: &str, otp: &str) -> Result<()> {
        let body = TotpLogin {
            username,
            passphrase,
            otp,
            apikey: &self.apikey,
            logintype: "totp",
        };
        let req = self.http.post(self.url("/auth")).json(&body);
        self.finish_login(req, username).await
    }

    /// Log in with passphrase and a YubiKey OTP, storing the returned token.
    pub async fn login_yubikey(
        &mut self,
        username: &str,
        passphrase: &str,
        otp: &str,
    ) -> Result<()> {
        let body = YubikeyLogin {
            username,
            keys: format!("{passphrase}{}{otp}", self.apikey),
        };
        let req = self.http.post(self.url("/auth")).json(&body);
        self.finish_login(req, username).await
    }

    async fn finish_login(&mut self, req: RequestBuilder, username: &str) -> Result<()> {
        let resp = req
            .send()
            .await
            .map_err(|e| LdapUtilsError::Http(format!("login request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .json::<ApiResponse>()
            .await
            .map_err(|e| LdapUtilsError::Auth(format!("login failed ({status}): {e}")))?;

        if !status.is_success() || !body.is_success() {
            return Err(LdapUtilsError::Auth(format!(
                "login failed ({status}): {}",
                body.error_summary()
            )));
        }

        let token = body
            .callinfo
            .token
            .ok_or_else(|| LdapUtilsError::Auth("login response contained no token".into()))?;
        self.token = Some(token);
        info!(username = %username, "logged in to StoredSafe");
        Ok(())
    }

    /// Invalidate the current token.
    pub async fn logout(&mut self) -> Result<()> {
        let req = self.authorized(self.http.get(self.url("/auth/logout")))?;
        let resp = req
            .send()
            .await
            .map_err(|e| LdapUtilsError::Http(format!("logout request failed: {e}")))?;
        read_response(resp, "logout").await?;
        self.token = None;
        info!("logged out of StoredSafe");
        Ok(())
    }

    /// List all StoredSafe users, active or not.
    pub async fn list_users(&self) -> Result<Vec<VaultUser>> {
        let req = self.authorized(self.http.get(self.url("/user")))?;
        let resp = req
            .send()
            .await
            .map_err(|e| LdapUtilsError::Http(format!("list users request failed: {e}")))?;
        let body = read_response(resp, "list users").await?;

        let records = body.callinfo.users.unwrap_or_default();
        let mut users = Vec::with_capacity(records.len());
        for record in records {
            match VaultUser::try_from(record) {
                Ok(user) => users.push(user),
                Err(e) => warn!(error = %e, "skipping malformed StoredSafe user record"),
            }
        }
        Ok(users)
    }

    /// Update fields on a user account.
    pub async fn edit_user(&self, user_id: &str, fields: &Map<String, Value>) -> Result<()> {
        let req = self.authorized(self.http.put(self.url(&format!("/user/{user_id}"))))?;
        let resp = req
            .json(fields)
            .send()
            .await
            .map_err(|e| LdapUtilsError::Http(format!("edit user request failed: {e}")))?;
        read_response(resp, "edit user").await?;
        Ok(())
    }
}

#[async_trait]
impl VaultDirectory for StoredSafeClient {
    async fn list_active_users(&self) -> Result<Vec<VaultUser>> {
        let users: Vec<VaultUser> = self
            .list_users()
            .await?
            .into_iter()
            .filter(VaultUser::is_active)
            .collect();
        info!(count = users.len(), "successfully fetched StoredSafe users");
        Ok(users)
    }

    async fn set_user_status(&self, user_id: &str, status: u32) -> Result<()> {
        let mut fields = Map::new();
        fields.insert("status".to_string(), Value::from(status));
        self.edit_user(user_id, &fields).await
    }
}

/// Reject non-2xx responses and API-level failures.
async fn read_response(resp: Response, action: &str) -> Result<ApiResponse> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(LdapUtilsError::StoredSafe(format!(
            "{action} failed ({status}): {body}"
        )));
    }

    let body = resp
        .json::<ApiResponse>()
        .await
        .map_err(|e| LdapUtilsError::StoredSafe(format!("{action} parse failed: {e}")))?;

    if !body.is_success() {
        return Err(LdapUtilsError::StoredSafe(format!(
            "{action} failed: {}",
            body.error_summary()
        )));
    }
    Ok(body)
}

/// `https://{site}/api/{version}`; sites given as full URLs keep their scheme.
fn api_base_url(site: &str, version: &str) -> String {
    let site = site.trim_end_matches('/');
    if site.starts_with("http://") || site.starts_with("https://") {
        format!("{site}/api/{version}")
    } else {
        format!("https://{site}/api/{version}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, StoredSafeClient) {
        let server = MockServer::start().await;
        let client = StoredSafeClient::new("unused", "api-key", &StoredSafeSettings::default())
            .unwrap()
            .with_base_url(&server.uri())
            .with_token("test-token");
        (server, client)
    }

    #[test]
    fn base_url_from_host() {
        assert_eq!(
            api_base_url("safe.example.com", "1.0"),
            "https://safe.example.com/api/1.0"
        );
        assert_eq!(
            api_base_url("http://127.0.0.1:8080/", "1.0"),
            "http://127.0.0.1:8080/api/1.0"
        );
    }

    #[tokio::test]
    async fn check_valid_token() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/auth/check"))
            .and(header("X-Http-Token", "test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "CALLINFO": { "status": "SUCCESS" } })),
            )
            .mount(&server)
            .await;

        assert!(client.check().await.unwrap());
    }

    #[tokio::test]
    async fn check_rejected_token() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/auth/check"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "CALLINFO": { "status": "FAIL" },
                "ERRORS": ["Invalid token"]
            })))
            .mount(&server)
            .await;

        assert!(!client.check().await.unwrap());
    }

    #[tokio::test]
    async fn check_without_token_is_auth_error() {
        let client =
            StoredSafeClient::new("safe.example.com", "key", &StoredSafeSettings::default())
                .unwrap();
        let err = client.check().await.unwrap_err();
        assert!(matches!(err, LdapUtilsError::Auth(_)));
    }

    #[tokio::test]
    async fn login_totp_stores_token() {
        let server = MockServer::start().await;
        let mut client =
            StoredSafeClient::new(&server.uri(), "api-key", &StoredSafeSettings::default())
                .unwrap()
                .with_base_url(&server.uri());

        Mock::given(method("POST"))
            .and(path("/auth"))
            .and(body_json(json!({
                "username": "alice",
                "passphrase": "pw",
                "otp": "123456",
                "apikey": "api-key",
                "logintype": "totp"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "CALLINFO": { "status": "SUCCESS", "token": "new-token" }
            })))
            .mount(&server)
            .await;

        client.login_totp("alice", "pw", "123456").await.unwrap();
        assert_eq!(client.token(), Some("new-token"));
    }

    #[tokio::test]
    async fn login_yubikey_concatenates_keys() {
        let server = MockServer::start().await;
        let mut client =
            StoredSafeClient::new(&server.uri(), "api-key", &StoredSafeSettings::default())
                .unwrap()
                .with_base_url(&server.uri());

        Mock::given(method("POST"))
            .and(path("/auth"))
            .and(body_json(json!({
                "username": "alice",
                "keys": "pwapi-keycccccbtlkfl"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "CALLINFO": { "status": "SUCCESS", "token": "yk-token" }
            })))
            .mount(&server)
            .await;

        client
            .login_yubikey("alice", "pw", "cccccbtlkfl")
            .await
            .unwrap();
        assert_eq!(client.token(), Some("yk-token"));
    }

    #[tokio::test]
    async fn login_failure_is_auth_error() {
        let server = MockServer::start().await;
        let mut client =
            StoredSafeClient::new(&server.uri(), "api-key", &StoredSafeSettings::default())
                .unwrap()
                .with_base_url(&server.uri());

        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "CALLINFO": { "status": "FAIL" },
                "ERRORS": ["Authentication failed"]
            })))
            .mount(&server)
            .await;

        let err = client.login_totp("alice", "bad", "000000").await.unwrap_err();
        assert!(matches!(err, LdapUtilsError::Auth(_)));
        assert!(err.to_string().contains("Authentication failed"));
        assert!(client.token().is_none());
    }

    #[tokio::test]
    async fn list_users_skips_malformed_records() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("X-Http-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "CALLINFO": {
                    "status": "SUCCESS",
                    "users": [
                        { "id": "1", "username": "alice", "status": "128", "email": "a@example.com" },
                        { "id": "2", "username": "bob", "status": "4" },
                        { "username": "broken" }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let users = client.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].field("email").as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn list_active_users_filters_inactive() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "CALLINFO": {
                    "status": "SUCCESS",
                    "users": [
                        { "id": "1", "username": "alice", "status": "128" },
                        { "id": "2", "username": "bob", "status": "4" },
                        { "id": "3", "username": "carol", "status": "134" }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let users = client.list_active_users().await.unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn list_users_server_error() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let err = client.list_users().await.unwrap_err();
        assert!(matches!(err, LdapUtilsError::StoredSafe(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn set_user_status_puts_status() {
        let (server, client) = setup().await;

        Mock::given(method("PUT"))
            .and(path("/user/42"))
            .and(header("X-Http-Token", "test-token"))
            .and(body_json(json!({ "status": 6 })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "CALLINFO": { "status": "SUCCESS" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        client.set_user_status("42", 6).await.unwrap();
    }

    #[tokio::test]
    async fn edit_user_api_failure() {
        let (server, client) = setup().await;

        Mock::given(method("PUT"))
            .and(path("/user/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "CALLINFO": { "status": "FAIL" },
                "ERRORS": ["Insufficient privileges"]
            })))
            .mount(&server)
            .await;

        let err = client.set_user_status("42", 6).await.unwrap_err();
        assert!(err.to_string().contains("Insufficient privileges"));
    }

    #[tokio::test]
    async fn logout_clears_token() {
        let (server, mut client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/auth/logout"))
            .and(header("X-Http-Token", "test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "CALLINFO": { "status": "SUCCESS" } })),
            )
            .mount(&server)
            .await;

        client.logout().await.unwrap();
        assert!(client.token().is_none());
    }
}
