//! Sendmail-compatible transport.
//!
//! The message (headers, blank line, body) is written to the command's
//! stdin, the way `sendmail -t` expects it. Whatever the MTA prints is
//! logged: stdout at info, stderr at warn.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use rplwatch_core::{ConfigError, Notification};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{MailTransport, NotifyError};

/// Split a comma-separated recipient list, dropping blanks.
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pipes messages into a local MTA command such as `/usr/sbin/sendmail -t`.
#[derive(Debug, Clone)]
pub struct SendmailTransport {
    program: PathBuf,
    args: Vec<String>,
    recipients: Vec<String>,
    sender: String,
}

impl SendmailTransport {
    /// Build a transport for `command` (program and arguments split on
    /// whitespace). The program must exist now.
    pub fn new(command: &str, recipients: Vec<String>, hostname: &str) -> Result<Self, ConfigError> {
        let mut tokens = command.split_whitespace();
        let program = tokens
            .next()
            .ok_or_else(|| ConfigError::MissingTransport(PathBuf::new()))?;
        if recipients.is_empty() {
            return Err(ConfigError::NoRecipients);
        }
        let program =
            locate(program).ok_or_else(|| ConfigError::MissingTransport(PathBuf::from(program)))?;
        debug!(program = %program.display(), "mail transport located");

        Ok(Self {
            program,
            args: tokens.map(str::to_string).collect(),
            recipients,
            sender: format!("rplwatch@{hostname}"),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Render the full message with the given `Date` header value.
    pub fn format_message(&self, notification: &Notification, date: &str) -> String {
        let mut message = String::with_capacity(notification.body.len() + 256);
        message.push_str(&format!("To: {}\n", self.recipients.join(", ")));
        message.push_str(&format!("Subject: {}\n", notification.subject));
        message.push_str(&format!("From: {}\n", self.sender));
        message.push_str(&format!("Date: {date}\n"));
        message.push_str("Content-Type: text/plain; charset=utf-8\n");
        message.push('\n');
        message.push_str(&notification.body);
        message
    }
}

#[async_trait]
impl MailTransport for SendmailTransport {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let program = self.program.display().to_string();
        let message = self.format_message(notification, &chrono::Local::now().to_rfc2822());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| NotifyError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| NotifyError::Pipe {
            program: program.clone(),
            source: std::io::Error::other("stdin not captured"),
        })?;
        let write = async move {
            let written = stdin.write_all(message.as_bytes()).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output.map_err(|source| NotifyError::Pipe {
            program: program.clone(),
            source,
        })?;

        for line in String::from_utf8_lossy(&output.stdout).lines().filter(|l| !l.trim().is_empty()) {
            info!(mta = %program, "{line}");
        }
        for line in String::from_utf8_lossy(&output.stderr).lines().filter(|l| !l.trim().is_empty()) {
            warn!(mta = %program, "{line}");
        }

        if !output.status.success() {
            return Err(NotifyError::Exit {
                program,
                status: output.status,
            });
        }
        written.map_err(|source| NotifyError::Pipe { program, source })
    }
}

/// Resolve `program` to an existing file, searching `PATH` for bare names.
fn locate(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return path.is_file().then_some(path);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
