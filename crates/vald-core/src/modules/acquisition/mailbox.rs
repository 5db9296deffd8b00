//! Local maildir access for VALD notifications.
//!
//! Messages are plain RFC 2822 files, either directly in the mailbox root or in
//! its `new/` and `cur/` subdirectories. Only the `From` and `Date` headers are
//! interpreted.

use super::model::MailMessage;
use crate::domain::{ValdError, ValdResult, ValdServer};
use crate::modules::traits::Mailbox;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAILDIR_SUBDIRECTORIES: [&str; 2] = ["new", "cur"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaildirMailbox {
    root: PathBuf,
}

impl MaildirMailbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn message_files(&self) -> ValdResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        for subdirectory in MAILDIR_SUBDIRECTORIES {
            let path = self.root.join(subdirectory);
            if path.is_dir() {
                collect_files(&path, &mut files)?;
            }
        }
        files.sort();
        Ok(files)
    }
}

fn collect_files(directory: &Path, files: &mut Vec<PathBuf>) -> ValdResult<()> {
    let entries = fs::read_dir(directory).map_err(|source| {
        ValdError::io_system(
            "IO.MAILBOX_READ",
            format!("failed to list mailbox '{}': {}", directory.display(), source),
        )
    })?;
    for entry in entries {
        let path = entry
            .map_err(|source| {
                ValdError::io_system(
                    "IO.MAILBOX_READ",
                    format!("failed to list mailbox '{}': {}", directory.display(), source),
                )
            })?
            .path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

/// A parsed message: unfolded headers plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawMessage {
    pub fn parse(source: &str) -> Self {
        let source = source.replace("\r\n", "\n");
        let (head, body) = match source.split_once("\n\n") {
            Some((head, body)) => (head, body),
            None => (source.as_str(), ""),
        };

        let mut headers: Vec<(String, String)> = Vec::new();
        for line in head.lines() {
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        Self {
            headers,
            body: body.to_string(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_from(&self, address: &str) -> bool {
        self.header("From")
            .is_some_and(|from| from.to_ascii_lowercase().contains(&address.to_ascii_lowercase()))
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        let value = self.header("Date")?;
        DateTime::parse_from_rfc2822(value)
            .ok()
            .map(|date| date.with_timezone(&Utc))
    }
}

impl Mailbox for MaildirMailbox {
    fn newest_message(&mut self, server: ValdServer) -> ValdResult<Option<MailMessage>> {
        let sender = server.sender_address();
        let mut newest: Option<MailMessage> = None;

        for path in self.message_files()? {
            let bytes = fs::read(&path).map_err(|source| {
                ValdError::io_system(
                    "IO.MAILBOX_READ",
                    format!("failed to read message '{}': {}", path.display(), source),
                )
            })?;
            let message = RawMessage::parse(&String::from_utf8_lossy(&bytes));
            if !message.is_from(sender) {
                continue;
            }
            let Some(received) = message.date() else {
                debug!(path = %path.display(), "skipping message without a parseable Date header");
                continue;
            };
            if newest.as_ref().is_none_or(|current| received > current.received) {
                newest = Some(MailMessage {
                    received,
                    body: message.body,
                });
            }
        }

        Ok(newest)
    }
}
