//! Which replica to watch and how to log in.
//!
//! Parsed from a compact NID string:
//!
//! ```text
//! h=<host>,P=<port>,u=<user>,p=<password>
//! ```
//!
//! Every key is optional; missing keys fall back to `localhost`, `3306`,
//! `rpl` and an empty password.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Read-only identity of the monitored node.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "rpl".to_string(),
            password: String::new(),
        }
    }
}

impl NodeIdentity {
    /// `host:port`, as used in logs and notifications.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl FromStr for NodeIdentity {
    type Err = ConfigError;

    fn from_str(nid: &str) -> Result<Self, Self::Err> {
        let mut node = NodeIdentity::default();
        if nid.trim().is_empty() {
            return Ok(node);
        }

        for token in nid.split(',') {
            let Some((key, value)) = token.split_once('=') else {
                return Err(ConfigError::MalformedNid(token.to_string()));
            };
            match key.trim() {
                "h" => node.host = value.to_string(),
                "P" => {
                    node.port = value
                        .trim()
                        .parse::<u16>()
                        .map_err(|_| ConfigError::InvalidPort(value.to_string()))?;
                }
                "u" => node.user = value.to_string(),
                "p" => node.password = value.to_string(),
                _ => return Err(ConfigError::MalformedNid(token.to_string())),
            }
        }

        if node.host.is_empty() {
            return Err(ConfigError::MalformedNid(nid.to_string()));
        }
        Ok(node)
    }
}
