//! rplwatchd — the replication monitor daemon.
//!
//! Watches one MySQL replica:
//! - polls its replication status on a fixed interval
//! - records every new fault occurrence in the fault log
//! - skips the offending event on apply errors and restarts the apply thread
//! - mails the operators, with reminders while a fault persists
//!
//! # Usage
//!
//! ```text
//! rplwatchd -m dba@example.com -f /var/log/rplwatch/faults.log "h=db-7,P=3306,u=rpl,p=secret"
//! rplwatchd --config /etc/rplwatchd.toml -b
//! ```

mod cli;
mod config;
mod logging;
mod pidfile;
mod shutdown;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use rplwatch_core::{Endpoint, Monitor, Notification, NotificationSink, ReportContext, Supervisor};
use rplwatch_mysql::MysqlConnector;
use rplwatch_notify::{DispatchHandle, MailDispatcher, SendmailTransport};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::cli::Cli;
use crate::config::DaemonConfig;
use crate::pidfile::Pidfile;
use crate::shutdown::Signals;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("rplwatchd: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    cli.apply(&mut config);

    let node = config.node_identity()?;
    let monitor_config = config.monitor_config()?;
    logging::init(&config.log)?;

    // Installed before anything needs cleanup, in batch mode too.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    Signals::install()
        .context("failed to install signal handlers")?
        .forward(shutdown_tx);

    let _pidfile = config
        .pidfile
        .as_deref()
        .map(Pidfile::create)
        .transpose()
        .context("failed to write pidfile")?;

    let hostname = local_hostname();
    let context = ReportContext {
        replica: Endpoint::new(node.host.clone(), node.port),
        hostname: hostname.clone(),
        fault_log: config.log.fault_log_name(),
    };

    let (sink, dispatch) = if config.mail.recipients.is_empty() {
        warn!("no mail recipients configured, notifications will only be logged");
        (Sink::LogOnly, None)
    } else {
        let transport = SendmailTransport::new(&config.mail.command, config.mail.recipients.clone(), &hostname)?;
        info!(
            mta = %transport.program().display(),
            recipients = %transport.recipients().join(","),
            "mail notifications enabled"
        );
        let (dispatcher, handle) = MailDispatcher::spawn(transport, config.mail.queue_capacity);
        (Sink::Mail(dispatcher), Some(handle))
    };

    info!(
        node = ?node,
        poll_interval = ?monitor_config.poll_interval,
        retry_interval = ?monitor_config.retry_interval,
        auto_skip = monitor_config.auto_skip,
        reminder_gap = monitor_config.reminder_gap.get(),
        batch = monitor_config.batch,
        "rplwatchd starting"
    );

    let connector = MysqlConnector::new(config.connect_timeout())
        .with_statement_timeout(config.statement_timeout());
    let monitor = Monitor::new(&monitor_config, context);
    let mut supervisor = Supervisor::new(connector, node, monitor, sink, &monitor_config);

    let result = if monitor_config.batch {
        supervisor.run_once(shutdown_rx).await
    } else {
        supervisor.run(shutdown_rx).await
    };

    // Closes the queue so the worker can finish.
    drop(supervisor);
    drain(dispatch, config.drain_timeout()).await;

    match result {
        Ok(reason) => {
            info!(?reason, "rplwatchd stopped");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "rplwatchd stopped");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn drain(dispatch: Option<DispatchHandle>, timeout: std::time::Duration) {
    let Some(handle) = dispatch else {
        return;
    };
    if let Err(e) = handle.drain(timeout).await {
        warn!(error = %e, "pending notifications were not delivered");
    }
}

fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!(error = %e, "can't determine local host name");
            "localhost".to_string()
        }
    }
}

/// Where composed notifications go.
enum Sink {
    Mail(MailDispatcher),
    LogOnly,
}

impl NotificationSink for Sink {
    fn dispatch(&self, notification: Notification) {
        match self {
            Sink::Mail(dispatcher) => dispatcher.dispatch(notification),
            Sink::LogOnly => {
                warn!(subject = %notification.subject, "notification not mailed");
                info!("{}", notification.body);
            }
        }
    }
}
