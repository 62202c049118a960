//! StoredSafe API request/response structs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope returned by every StoredSafe API call.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "CALLINFO", default)]
    pub callinfo: CallInfo,
    #[serde(rename = "ERRORS", default)]
    pub errors: Vec<Value>,
}

impl ApiResponse {
    /// Whether the server reported the call as successful.
    pub fn is_success(&self) -> bool {
        self.callinfo.status.as_deref() == Some("SUCCESS")
    }

    /// Server-side error messages joined for logging.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// The `CALLINFO` section of a response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    /// Raw user records; converted to `VaultUser` by the client.
    #[serde(default)]
    pub users: Option<Vec<Map<String, Value>>>,
}

/// Body of a TOTP login request.
#[derive(Debug, Clone, Serialize)]
pub struct TotpLogin<'a> {
    pub username: &'a str,
    pub passphrase: &'a str,
    pub otp: &'a str,
    pub apikey: &'a str,
    pub logintype: &'a str,
}

/// Body of a YubiKey login request.
#[derive(Debug, Clone, Serialize)]
pub struct YubikeyLogin<'a> {
    pub username: &'a str,
    pub keys: String,
}
