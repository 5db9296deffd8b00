//! Extraction loop against a VALD server.
//!
//! Each pass submits the "Extract All" form for `[start, end + margin]`, waits
//! for the notification mail, downloads and decompresses the archive, and
//! restarts from the last wavelength received until the requested end is
//! covered.

mod config;
mod fetch;
mod form;
mod mailbox;
mod model;

pub use config::{
    AcquisitionConfig, AcquisitionConfigError, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_REQUESTS,
    DEFAULT_MAX_WAIT_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_RANGE_MARGIN,
};
pub use fetch::{HttpArchiveFetcher, archive_file_name, decompress_archive, decompressed_path};
pub use form::CommandExtractionForm;
pub use mailbox::{MaildirMailbox, RawMessage};
pub use model::{
    AcquiredFile, AcquisitionError, AcquisitionReport, AcquisitionStage, DataRetrieval,
    ExtractionFormat, ExtractionRequest, LinelistConfig, MailMessage, StopReason,
};

use crate::domain::{ValdError, ValdResult, WavelengthRange};
use crate::modules::linelist::read_line_list;
use crate::modules::traits::{ArchiveFetcher, ExtractionForm, Mailbox, PollClock, SystemClock};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Text from the first `http` through the first `gz` after it.
pub fn extract_download_link(body: &str) -> Option<&str> {
    let start = body.find("http")?;
    let length = body[start..].find("gz")?;
    Some(&body[start..start + length + 2])
}

/// The production collaborator set.
pub type SystemAcquisitionPipeline =
    AcquisitionPipeline<CommandExtractionForm, MaildirMailbox, HttpArchiveFetcher, SystemClock>;

impl SystemAcquisitionPipeline {
    pub fn from_config(config: AcquisitionConfig) -> ValdResult<Self> {
        let form = CommandExtractionForm::new(&config);
        let mailbox = MaildirMailbox::new(&config.mailbox_dir);
        let fetcher = HttpArchiveFetcher::new(config.http_timeout())?;
        Ok(Self::new(config, form, mailbox, fetcher, SystemClock))
    }
}

pub struct AcquisitionPipeline<F, M, D, C> {
    config: AcquisitionConfig,
    form: F,
    mailbox: M,
    fetcher: D,
    clock: C,
    stage: AcquisitionStage,
}

impl<F, M, D, C> AcquisitionPipeline<F, M, D, C>
where
    F: ExtractionForm,
    M: Mailbox,
    D: ArchiveFetcher,
    C: PollClock,
{
    pub fn new(config: AcquisitionConfig, form: F, mailbox: M, fetcher: D, clock: C) -> Self {
        Self {
            config,
            form,
            mailbox,
            fetcher,
            clock,
            stage: AcquisitionStage::Idle,
        }
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Last stage completed.
    pub fn stage(&self) -> AcquisitionStage {
        self.stage
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    pub fn fetcher(&self) -> &D {
        &self.fetcher
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn run(&mut self, requested: WavelengthRange) -> Result<AcquisitionReport, AcquisitionError> {
        self.stage = AcquisitionStage::Idle;
        let mut start = requested.start;
        let mut files = Vec::new();

        for index in 1..=self.config.max_requests {
            let range = WavelengthRange::new(start, requested.end + self.config.range_margin)
                .map_err(|source| AcquisitionError {
                    index,
                    range: requested,
                    stage: AcquisitionStage::FormSubmitted,
                    source,
                })?;
            let request = ExtractionRequest::new(index, range);
            info!(index, range = %range, "requesting VALD extraction");

            let file = self.acquire(&request)?;
            let last_wavelength = file.last_wavelength;
            files.push(file);

            let stop_reason = match last_wavelength {
                None => Some(StopReason::EmptyExtraction),
                Some(last) if last >= requested.end => Some(StopReason::RangeCovered),
                Some(last) if last <= start => Some(StopReason::NoProgress),
                Some(last) => {
                    start = last;
                    None
                }
            };

            if let Some(stop_reason) = stop_reason {
                if stop_reason != StopReason::RangeCovered {
                    warn!(index, ?stop_reason, "stopping acquisition before the requested end");
                }
                self.stage = AcquisitionStage::Done;
                return Ok(AcquisitionReport {
                    requested,
                    files,
                    stop_reason,
                });
            }
        }

        warn!(
            max_requests = self.config.max_requests,
            last_start = start,
            "request limit reached before the requested end"
        );
        self.stage = AcquisitionStage::Done;
        Ok(AcquisitionReport {
            requested,
            files,
            stop_reason: StopReason::RequestLimit,
        })
    }

    fn acquire(&mut self, request: &ExtractionRequest) -> Result<AcquiredFile, AcquisitionError> {
        let fail = |stage: AcquisitionStage| {
            move |source: ValdError| AcquisitionError {
                index: request.index,
                range: request.range,
                stage,
                source,
            }
        };

        self.form
            .submit(request)
            .map_err(fail(AcquisitionStage::FormSubmitted))?;
        let submitted = self.submission_time();
        self.stage = AcquisitionStage::FormSubmitted;

        let message = self
            .await_message(request.index, submitted)
            .map_err(fail(AcquisitionStage::EmailPolled))?;
        self.stage = AcquisitionStage::EmailPolled;

        let link = extract_download_link(&message.body)
            .ok_or_else(|| {
                ValdError::input_validation(
                    "ACQUIRE.DOWNLOAD_LINK",
                    "notification mail contains no download link",
                )
            })
            .map_err(fail(AcquisitionStage::Downloaded))?;
        let archive = self
            .fetcher
            .fetch(link, &self.config.download_dir)
            .map_err(fail(AcquisitionStage::Downloaded))?;
        self.stage = AcquisitionStage::Downloaded;

        let output = decompressed_path(&archive, &self.config.output_dir, request.index);
        decompress_archive(&archive, &output).map_err(fail(AcquisitionStage::Decompressed))?;
        self.stage = AcquisitionStage::Decompressed;

        let (records, last_wavelength) =
            last_record_wavelength(&output).map_err(fail(AcquisitionStage::Decompressed))?;
        info!(
            index = request.index,
            path = %output.display(),
            records,
            last_wavelength,
            "extraction received"
        );

        Ok(AcquiredFile {
            index: request.index,
            range: request.range,
            path: output,
            records,
            last_wavelength,
        })
    }

    /// Mail `Date` headers have whole-second precision; a reply must carry a later second.
    fn submission_time(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        now.duration_trunc(TimeDelta::seconds(1)).unwrap_or(now)
    }

    fn await_message(&mut self, index: usize, submitted: DateTime<Utc>) -> ValdResult<MailMessage> {
        let interval = self.config.poll_interval();
        let max_wait = self.config.max_wait();
        let mut waited = Duration::ZERO;

        loop {
            if let Some(message) = self.mailbox.newest_message(self.config.server)? {
                if message.received > submitted {
                    return Ok(message);
                }
                debug!(index, received = %message.received, "newest mail predates the request");
            }

            if waited >= max_wait {
                return Err(ValdError::acquisition_timeout(
                    "ACQUIRE.MAIL_TIMEOUT",
                    format!(
                        "no VALD mail from {} within {} s",
                        self.config.server.sender_address(),
                        max_wait.as_secs()
                    ),
                ));
            }

            let pause = interval.min(max_wait - waited);
            debug!(index, waited_secs = waited.as_secs(), "waiting for VALD mail");
            self.clock.sleep(pause);
            waited += pause;
        }
    }
}

fn last_record_wavelength(path: &Path) -> ValdResult<(usize, Option<f64>)> {
    let file = read_line_list(path)?;
    let last_wavelength = file
        .records
        .last()
        .map(|record| record.wavelength())
        .transpose()?;
    Ok((file.records.len(), last_wavelength))
}

#[cfg(test)]
mod tests {
    use super::{
        AcquisitionConfig, AcquisitionPipeline, AcquisitionStage, ExtractionRequest, MailMessage,
        StopReason, extract_download_link,
    };
    use crate::domain::{ValdError, ValdErrorCategory, ValdResult, ValdServer, WavelengthRange};
    use crate::modules::traits::{ArchiveFetcher, ExtractionForm, Mailbox, PollClock};
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::collections::{BTreeMap, VecDeque};
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeForm {
        requests: Vec<ExtractionRequest>,
        fail: bool,
    }

    impl ExtractionForm for FakeForm {
        fn submit(&mut self, request: &ExtractionRequest) -> ValdResult<()> {
            self.requests.push(request.clone());
            if self.fail {
                return Err(ValdError::external_tool("ACQUIRE.FORM_SUBMIT", "login rejected"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeMailbox {
        replies: VecDeque<Option<MailMessage>>,
        polls: usize,
    }

    impl Mailbox for FakeMailbox {
        fn newest_message(&mut self, server: ValdServer) -> ValdResult<Option<MailMessage>> {
            assert_eq!(server, ValdServer::Uppsala);
            self.polls += 1;
            Ok(self.replies.pop_front().flatten())
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        archives: BTreeMap<String, String>,
        fetched: Vec<String>,
    }

    impl ArchiveFetcher for FakeFetcher {
        fn fetch(&mut self, url: &str, destination_dir: &Path) -> ValdResult<PathBuf> {
            self.fetched.push(url.to_string());
            let text = self
                .archives
                .get(url)
                .ok_or_else(|| ValdError::io_system("IO.DOWNLOAD", format!("404 for {url}")))?;
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(text.as_bytes()).expect("encode");
            fs::create_dir_all(destination_dir).expect("download dir");
            let name = url.rsplit('/').next().expect("file name");
            let path = destination_dir.join(name);
            fs::write(&path, encoder.finish().expect("finish")).expect("archive written");
            Ok(path)
        }
    }

    struct FakeClock {
        now: DateTime<Utc>,
        sleeps: Vec<Duration>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now: Utc.with_ymd_and_hms(2021, 2, 15, 10, 0, 0).unwrap() + TimeDelta::milliseconds(250),
                sleeps: Vec::new(),
            }
        }
    }

    /// Leaves whatever bytes it was given as the archive, gzip or not.
    struct RawFetcher {
        bytes: Vec<u8>,
    }

    impl ArchiveFetcher for RawFetcher {
        fn fetch(&mut self, url: &str, destination_dir: &Path) -> ValdResult<PathBuf> {
            fs::create_dir_all(destination_dir).expect("download dir");
            let path = destination_dir.join(url.rsplit('/').next().expect("file name"));
            fs::write(&path, &self.bytes).expect("archive written");
            Ok(path)
        }
    }

    impl PollClock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            self.now
        }

        fn sleep(&mut self, duration: Duration) {
            self.now += TimeDelta::from_std(duration).expect("duration in range");
            self.sleeps.push(duration);
        }
    }

    fn config(temp: &TempDir) -> AcquisitionConfig {
        AcquisitionConfig {
            email: "observer@example.org".to_string(),
            server: ValdServer::Uppsala,
            extraction_format: Default::default(),
            data_retrieval: Default::default(),
            linelist_config: Default::default(),
            download_dir: temp.path().join("downloads"),
            output_dir: temp.path().join("linelists"),
            mailbox_dir: temp.path().join("mail"),
            form_helper: PathBuf::from("unused"),
            web_driver: None,
            show_browser: false,
            poll_interval_secs: 60,
            max_wait_secs: 1800,
            range_margin: 5.0,
            max_requests: 50,
            http_timeout_secs: 300,
        }
    }

    fn extraction(wavelengths: &[f64]) -> String {
        let mut text = String::from(" 5000.00000, 5015.00000, 3, 3, 1.0, Wavelength region\n");
        for wavelength in wavelengths {
            text.push_str(&format!(
                "'Fe 1',       {wavelength:.4},  -3.123,  3.3960,  3.0,  5.8750,  4.0,\n'  LS  a5F'\n'  LS  z5D*'\n'_                             Fe     '\n"
            ));
        }
        text.push_str("* oscillator strengths were scaled by the solar isotopic ratios.\n References:\n");
        text
    }

    fn mail(minute: u32, second: u32, link: &str) -> Option<MailMessage> {
        Some(MailMessage {
            received: Utc.with_ymd_and_hms(2021, 2, 15, 10, minute, second).unwrap(),
            body: format!("Dear observer,\nYour request is ready: {link}\nVALD"),
        })
    }

    #[test]
    fn download_link_spans_http_to_gz() {
        assert_eq!(
            extract_download_link("See http://vald.astro.uu.se/~vald/FTP/obs.004217.gz now"),
            Some("http://vald.astro.uu.se/~vald/FTP/obs.004217.gz")
        );
        assert_eq!(extract_download_link("no link here"), None);
        assert_eq!(extract_download_link("http://host/without-archive"), None);
    }

    #[test]
    fn pipeline_loops_until_the_range_is_covered() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mailbox = FakeMailbox {
            replies: VecDeque::from([
                None,
                mail(1, 0, "http://vald.example/FTP/a.gz"),
                mail(0, 30, "http://vald.example/FTP/stale.gz"),
                mail(2, 0, "http://vald.example/FTP/b.gz"),
            ]),
            polls: 0,
        };
        let fetcher = FakeFetcher {
            archives: BTreeMap::from([
                ("http://vald.example/FTP/a.gz".to_string(), extraction(&[5000.5, 5006.0])),
                ("http://vald.example/FTP/b.gz".to_string(), extraction(&[5007.0, 5012.0])),
            ]),
            fetched: Vec::new(),
        };
        let mut pipeline = AcquisitionPipeline::new(
            config(&temp),
            FakeForm::default(),
            mailbox,
            fetcher,
            FakeClock::new(),
        );

        let requested = WavelengthRange::new(5000.0, 5010.0).expect("valid range");
        let report = pipeline.run(requested).expect("acquisition succeeds");

        assert_eq!(report.stop_reason, StopReason::RangeCovered);
        assert_eq!(pipeline.stage(), AcquisitionStage::Done);

        let requests = &pipeline.form().requests;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].range, WavelengthRange { start: 5000.0, end: 5015.0 });
        assert_eq!(requests[0].comment, "Range 1");
        assert_eq!(requests[1].range, WavelengthRange { start: 5006.0, end: 5015.0 });
        assert_eq!(requests[1].comment, "Range 2");

        assert_eq!(pipeline.mailbox().polls, 4);
        assert_eq!(pipeline.clock().sleeps, [Duration::from_secs(60); 2]);
        assert_eq!(
            pipeline.fetcher().fetched,
            ["http://vald.example/FTP/a.gz", "http://vald.example/FTP/b.gz"]
        );

        let outputs = temp.path().join("linelists");
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].path, outputs.join("a_1.lst"));
        assert_eq!(report.files[0].last_wavelength, Some(5006.0));
        assert_eq!(report.files[1].path, outputs.join("b_2.lst"));
        assert_eq!(report.files[1].records, 2);
        assert!(outputs.join("b_2.lst").is_file());
        assert!(!temp.path().join("downloads/a.gz").exists());
    }

    #[test]
    fn mail_from_the_submission_second_is_not_a_reply() {
        let temp = TempDir::new().expect("tempdir should be created");
        let first = mail(1, 0, "http://vald.example/FTP/a.gz");
        let mailbox = FakeMailbox {
            replies: VecDeque::from([
                None,
                first.clone(),
                first,
                mail(2, 0, "http://vald.example/FTP/b.gz"),
            ]),
            polls: 0,
        };
        let fetcher = FakeFetcher {
            archives: BTreeMap::from([
                ("http://vald.example/FTP/a.gz".to_string(), extraction(&[5000.5, 5006.0])),
                ("http://vald.example/FTP/b.gz".to_string(), extraction(&[5007.0, 5012.0])),
            ]),
            fetched: Vec::new(),
        };
        let mut pipeline = AcquisitionPipeline::new(
            config(&temp),
            FakeForm::default(),
            mailbox,
            fetcher,
            FakeClock::new(),
        );

        let requested = WavelengthRange::new(5000.0, 5010.0).expect("valid range");
        let report = pipeline.run(requested).expect("acquisition succeeds");

        // The second request is submitted at 10:01:00.250, the second the first reply carries.
        assert_eq!(report.stop_reason, StopReason::RangeCovered);
        assert_eq!(
            pipeline.fetcher().fetched,
            ["http://vald.example/FTP/a.gz", "http://vald.example/FTP/b.gz"]
        );
        assert_eq!(pipeline.mailbox().polls, 4);
        assert_eq!(pipeline.clock().sleeps, [Duration::from_secs(60); 2]);
    }

    #[test]
    fn corrupt_archive_fails_at_decompression_and_is_kept() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mailbox = FakeMailbox {
            replies: VecDeque::from([mail(0, 1, "http://vald.example/FTP/broken.gz")]),
            polls: 0,
        };
        let mut pipeline = AcquisitionPipeline::new(
            config(&temp),
            FakeForm::default(),
            mailbox,
            RawFetcher {
                bytes: b"not a gzip stream".to_vec(),
            },
            FakeClock::new(),
        );

        let requested = WavelengthRange::new(5000.0, 5010.0).expect("valid range");
        let error = pipeline.run(requested).expect_err("decompression fails");

        assert_eq!(error.index, 1);
        assert_eq!(error.range, WavelengthRange { start: 5000.0, end: 5015.0 });
        assert_eq!(error.stage, AcquisitionStage::Decompressed);
        assert_eq!(error.source.code(), "IO.ARCHIVE_DECOMPRESS");
        assert_eq!(pipeline.stage(), AcquisitionStage::Downloaded);
        assert!(temp.path().join("downloads/broken.gz").is_file());
        assert!(!temp.path().join("linelists/broken_1.lst").exists());
    }

    #[test]
    fn mail_wait_is_bounded() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut config = config(&temp);
        config.max_wait_secs = 150;
        let mut pipeline = AcquisitionPipeline::new(
            config,
            FakeForm::default(),
            FakeMailbox::default(),
            FakeFetcher::default(),
            FakeClock::new(),
        );

        let requested = WavelengthRange::new(5000.0, 5010.0).expect("valid range");
        let error = pipeline.run(requested).expect_err("no mail should time out");

        assert_eq!(error.index, 1);
        assert_eq!(error.stage, AcquisitionStage::EmailPolled);
        assert_eq!(error.source.category(), ValdErrorCategory::AcquisitionTimeout);
        assert_eq!(error.source.code(), "ACQUIRE.MAIL_TIMEOUT");
        assert_eq!(
            pipeline.clock().sleeps,
            [
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(30)
            ]
        );
        assert_eq!(pipeline.mailbox().polls, 4);
        assert_eq!(pipeline.stage(), AcquisitionStage::FormSubmitted);
    }

    #[test]
    fn form_failure_reports_stage_without_polling() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut pipeline = AcquisitionPipeline::new(
            config(&temp),
            FakeForm {
                fail: true,
                ..FakeForm::default()
            },
            FakeMailbox::default(),
            FakeFetcher::default(),
            FakeClock::new(),
        );

        let requested = WavelengthRange::new(5000.0, 5010.0).expect("valid range");
        let error = pipeline.run(requested).expect_err("form failure propagates");

        assert_eq!(error.stage, AcquisitionStage::FormSubmitted);
        assert_eq!(error.source.category(), ValdErrorCategory::ExternalToolFailure);
        assert_eq!(error.range, WavelengthRange { start: 5000.0, end: 5015.0 });
        assert_eq!(pipeline.mailbox().polls, 0);
    }

    #[test]
    fn stalled_or_empty_extractions_stop_the_loop() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mailbox = FakeMailbox {
            replies: VecDeque::from([mail(0, 1, "http://vald.example/FTP/same.gz")]),
            polls: 0,
        };
        let fetcher = FakeFetcher {
            archives: BTreeMap::from([(
                "http://vald.example/FTP/same.gz".to_string(),
                extraction(&[4999.0, 5000.0]),
            )]),
            fetched: Vec::new(),
        };
        let mut pipeline =
            AcquisitionPipeline::new(config(&temp), FakeForm::default(), mailbox, fetcher, FakeClock::new());
        let requested = WavelengthRange::new(5000.0, 5010.0).expect("valid range");
        let report = pipeline.run(requested).expect("acquisition succeeds");
        assert_eq!(report.stop_reason, StopReason::NoProgress);

        let temp = TempDir::new().expect("tempdir should be created");
        let mailbox = FakeMailbox {
            replies: VecDeque::from([mail(0, 1, "http://vald.example/FTP/empty.gz")]),
            polls: 0,
        };
        let fetcher = FakeFetcher {
            archives: BTreeMap::from([(
                "http://vald.example/FTP/empty.gz".to_string(),
                extraction(&[]),
            )]),
            fetched: Vec::new(),
        };
        let mut pipeline =
            AcquisitionPipeline::new(config(&temp), FakeForm::default(), mailbox, fetcher, FakeClock::new());
        let report = pipeline.run(requested).expect("acquisition succeeds");
        assert_eq!(report.stop_reason, StopReason::EmptyExtraction);
        assert_eq!(report.files[0].records, 0);
        assert_eq!(report.files[0].last_wavelength, None);
    }

    #[test]
    fn request_cap_ends_the_run() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut config = config(&temp);
        config.max_requests = 1;
        let mailbox = FakeMailbox {
            replies: VecDeque::from([mail(0, 1, "http://vald.example/FTP/a.gz")]),
            polls: 0,
        };
        let fetcher = FakeFetcher {
            archives: BTreeMap::from([(
                "http://vald.example/FTP/a.gz".to_string(),
                extraction(&[5000.5, 5006.0]),
            )]),
            fetched: Vec::new(),
        };
        let mut pipeline =
            AcquisitionPipeline::new(config, FakeForm::default(), mailbox, fetcher, FakeClock::new());

        let requested = WavelengthRange::new(5000.0, 5010.0).expect("valid range");
        let report = pipeline.run(requested).expect("acquisition succeeds");
        assert_eq!(report.stop_reason, StopReason::RequestLimit);
        assert_eq!(report.files.len(), 1);
    }

    #[test]
    fn missing_archive_fails_at_download_stage() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mailbox = FakeMailbox {
            replies: VecDeque::from([mail(0, 1, "http://vald.example/FTP/gone.gz")]),
            polls: 0,
        };
        let mut pipeline = AcquisitionPipeline::new(
            config(&temp),
            FakeForm::default(),
            mailbox,
            FakeFetcher::default(),
            FakeClock::new(),
        );

        let requested = WavelengthRange::new(5000.0, 5010.0).expect("valid range");
        let error = pipeline.run(requested).expect_err("download fails");
        assert_eq!(error.stage, AcquisitionStage::Downloaded);
        assert_eq!(error.source.code(), "IO.DOWNLOAD");
    }
}
