//! rplwatchd.toml configuration.
//!
//! ```toml
//! node = "h=db-7,P=3306,u=rpl,p=secret"
//! pidfile = "/run/rplwatchd.pid"
//!
//! [monitor]
//! poll_interval_secs = 60
//! retry_interval_secs = 60
//! statement_timeout_secs = 30
//! auto_skip = true
//! reminder_gap = 480
//!
//! [mail]
//! recipients = ["dba@example.com"]
//! command = "/usr/sbin/sendmail -t"
//!
//! [log]
//! level = "info"
//! format = "json"
//! fault_file = "/var/log/rplwatch/faults.log"
//! ```
//!
//! Every field is optional. Command-line flags override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rplwatch_core::{ConfigError, MonitorConfig, NodeIdentity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Node identity string; `h=...,P=...,u=...,p=...`.
    pub node: Option<String>,
    pub pidfile: Option<PathBuf>,
    pub monitor: MonitorSection,
    pub mail: MailSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSection {
    pub poll_interval_secs: u64,
    pub retry_interval_secs: u64,
    pub connect_timeout_secs: u64,
    /// Deadline for each statement sent to the node.
    pub statement_timeout_secs: u64,
    pub auto_skip: bool,
    pub reminder_gap: u64,
    pub max_cycle_gap: u64,
    pub batch: bool,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            retry_interval_secs: 60,
            connect_timeout_secs: 10,
            statement_timeout_secs: 30,
            auto_skip: true,
            reminder_gap: 480,
            max_cycle_gap: 1,
            batch: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailSection {
    /// Empty disables mail; notifications are then only logged.
    pub recipients: Vec<String>,
    pub command: String,
    pub queue_capacity: usize,
    pub drain_timeout_secs: u64,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            command: "/usr/sbin/sendmail -t".to_string(),
            queue_capacity: 16,
            drain_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub level: String,
    pub format: LogFormat,
    /// General log; stderr when unset.
    pub file: Option<PathBuf>,
    /// Fault log; stdout when unset.
    pub fault_file: Option<PathBuf>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
            fault_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogSection {
    /// Where new fault occurrences end up, for notification text.
    pub fn fault_log_name(&self) -> String {
        match &self.fault_file {
            Some(path) => path.display().to_string(),
            None => "stdout".to_string(),
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    /// The node to monitor; the default identity when none is given.
    pub fn node_identity(&self) -> Result<NodeIdentity, ConfigError> {
        match &self.node {
            Some(nid) => nid.parse(),
            None => Ok(NodeIdentity::default()),
        }
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        let m = &self.monitor;
        MonitorConfig {
            poll_interval: Duration::from_secs(m.poll_interval_secs),
            retry_interval: Duration::from_secs(m.retry_interval_secs),
            auto_skip: m.auto_skip,
            batch: m.batch,
            ..MonitorConfig::default()
        }
        .with_reminder_gap(m.reminder_gap)?
        .with_max_cycle_gap(m.max_cycle_gap)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.connect_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.statement_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.mail.drain_timeout_secs)
    }
}
