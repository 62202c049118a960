//! The StoredSafe RC file (`~/.storedsafe-client.rc`).
//!
//! A plain `key:value` list shared with the other StoredSafe command line
//! tools. Known keys are `token`, `username`, `apikey` and `mysite`; any other
//! lines are kept untouched when the file is rewritten.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use ldap_utils_core::error::Result;

/// Parsed contents of an RC file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RcFile {
    entries: Vec<(String, String)>,
}

impl RcFile {
    /// Parse `key:value` lines. Lines without a colon are ignored.
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((key.to_string(), value.trim().to_string()))
            })
            .collect();
        Self { entries }
    }

    /// Render the file contents.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| format!("{key}:{value}\n"))
            .collect()
    }

    /// Read an RC file; `None` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(Self::parse(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the file, readable only by the owner on Unix. An existing file's
    /// mode is tightened as well.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(self.render().as_bytes())?;
        debug!(path = %path.display(), "wrote StoredSafe RC file");
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Set a key, replacing an existing entry in place.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    pub fn token(&self) -> Option<&str> {
        self.get("token")
    }

    pub fn username(&self) -> Option<&str> {
        self.get("username")
    }

    pub fn apikey(&self) -> Option<&str> {
        self.get("apikey")
    }

    pub fn site(&self) -> Option<&str> {
        self.get("mysite")
    }
}
