use std::path::PathBuf;

use clap::Parser;
use rplwatch_notify::parse_recipients;

use crate::config::{DaemonConfig, LogFormat};

/// Watch a MySQL replica, skip broken apply events and mail the operators.
#[derive(Debug, Parser)]
#[command(name = "rplwatchd", version, about)]
pub struct Cli {
    /// Node to monitor: "h=<host>,P=<port>,u=<user>,p=<password>".
    #[arg(value_name = "NID")]
    pub nid: Option<String>,

    /// Configuration file (TOML). Flags override its values.
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Retry interval after a connection failure, in seconds [default: 60].
    #[arg(short = 'r', long = "retry-interval", value_name = "SECS")]
    pub retry_interval: Option<u64>,

    /// Sleep between two checks, in seconds [default: 60].
    #[arg(short = 't', long = "interval", value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Skip apply errors automatically [default: true].
    #[arg(short = 's', long = "skip", value_name = "BOOL")]
    pub auto_skip: Option<bool>,

    /// Cycles between reminder mails for a persisting fault [default: 480].
    #[arg(short = 'g', long = "reminder-gap", value_name = "CYCLES")]
    pub reminder_gap: Option<u64>,

    /// Largest cycle distance at which a fault still counts as continuing [default: 1].
    #[arg(long, value_name = "CYCLES")]
    pub max_cycle_gap: Option<u64>,

    /// Check once and exit.
    #[arg(short = 'b', long)]
    pub batch: bool,

    /// Mail recipients, delimited by ','.
    #[arg(short = 'm', long = "mail-to", value_name = "ADDRS")]
    pub recipients: Option<String>,

    /// MTA command [default: "/usr/sbin/sendmail -t"].
    #[arg(long = "mail", value_name = "COMMAND")]
    pub mail_command: Option<String>,

    /// General log file [default: stderr].
    #[arg(short = 'e', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Fault log file [default: stdout].
    #[arg(short = 'f', long = "fault-log", value_name = "FILE")]
    pub fault_log: Option<PathBuf>,

    /// Log level: debug|info|warn|error [default: info].
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// General log format.
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,

    /// File holding the process id while running.
    #[arg(long, value_name = "FILE")]
    pub pidfile: Option<PathBuf>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut DaemonConfig) {
        if let Some(nid) = &self.nid {
            config.node = Some(nid.clone());
        }
        if let Some(secs) = self.retry_interval {
            config.monitor.retry_interval_secs = secs;
        }
        if let Some(secs) = self.poll_interval {
            config.monitor.poll_interval_secs = secs;
        }
        if let Some(skip) = self.auto_skip {
            config.monitor.auto_skip = skip;
        }
        if let Some(gap) = self.reminder_gap {
            config.monitor.reminder_gap = gap;
        }
        if let Some(gap) = self.max_cycle_gap {
            config.monitor.max_cycle_gap = gap;
        }
        if self.batch {
            config.monitor.batch = true;
        }
        if let Some(list) = &self.recipients {
            config.mail.recipients = parse_recipients(list);
        }
        if let Some(command) = &self.mail_command {
            config.mail.command = command.clone();
        }
        if let Some(path) = &self.log_file {
            config.log.file = Some(path.clone());
        }
        if let Some(path) = &self.fault_log {
            config.log.fault_file = Some(path.clone());
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log.format = format;
        }
        if let Some(path) = &self.pidfile {
            config.pidfile = Some(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rplwatchd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn no_flags_leave_config_untouched() {
        let mut config = DaemonConfig::default();
        parse(&[]).apply(&mut config);
        assert_eq!(config, DaemonConfig::default());
    }

    #[test]
    fn short_flags() {
        let cli = parse(&[
            "-r", "10", "-t", "5", "-s", "false", "-g", "3", "-b", "-m", "a@x, b@y", "-e",
            "/tmp/general.log", "-f", "/tmp/faults.log", "-l", "debug", "h=db-7,P=3307",
        ]);
        let mut config = DaemonConfig::default();
        cli.apply(&mut config);

        let monitor = config.monitor_config().unwrap();
        assert_eq!(monitor.retry_interval, Duration::from_secs(10));
        assert_eq!(monitor.poll_interval, Duration::from_secs(5));
        assert!(!monitor.auto_skip);
        assert_eq!(monitor.reminder_gap.get(), 3);
        assert!(monitor.batch);
        assert_eq!(config.mail.recipients, vec!["a@x", "b@y"]);
        assert_eq!(config.log.file.as_deref(), Some(Path::new("/tmp/general.log")));
        assert_eq!(config.log.fault_log_name(), "/tmp/faults.log");
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.node_identity().unwrap().address(), "db-7:3307");
    }

    #[test]
    fn flags_override_file_values() {
        let mut config = DaemonConfig::default();
        config.monitor.poll_interval_secs = 120;
        config.monitor.reminder_gap = 100;
        config.mail.command = "/usr/lib/sendmail -t".to_string();

        parse(&["-t", "30", "--mail", "/opt/bin/msmtp -t", "--log-format", "json", "--max-cycle-gap", "2"])
            .apply(&mut config);

        assert_eq!(config.monitor.poll_interval_secs, 30);
        assert_eq!(config.monitor.reminder_gap, 100);
        assert_eq!(config.monitor.max_cycle_gap, 2);
        assert_eq!(config.mail.command, "/opt/bin/msmtp -t");
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn bad_port_in_nid_surfaces_as_config_error() {
        let mut config = DaemonConfig::default();
        parse(&["h=db-7,P=99999"]).apply(&mut config);
        assert!(config.node_identity().is_err());
    }
}
