use crate::domain::{ValdResult, ValdServer};
use crate::modules::acquisition::{ExtractionRequest, MailMessage};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Converts one VALD line list into Turbospectrum format.
pub trait LineListReformatter {
    fn reformat(&self, input: &Path, output: &Path) -> ValdResult<()>;
}

/// Submits an "Extract All" request to VALD.
pub trait ExtractionForm {
    fn submit(&mut self, request: &ExtractionRequest) -> ValdResult<()>;
}

/// Source of VALD notification mail.
pub trait Mailbox {
    fn newest_message(&mut self, server: ValdServer) -> ValdResult<Option<MailMessage>>;
}

/// Downloads an extraction archive into `destination_dir` and returns its path.
pub trait ArchiveFetcher {
    fn fetch(&mut self, url: &str, destination_dir: &Path) -> ValdResult<PathBuf>;
}

pub trait PollClock {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl PollClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
