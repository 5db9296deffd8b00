use crate::domain::{ValdError, ValdResult};
use crate::modules::serialization::{ensure_directory, persist_staged, staging_file_for};
use crate::modules::traits::ArchiveFetcher;
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("vald-tools/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP download into a `.part` file renamed on completion.
#[derive(Debug, Clone)]
pub struct HttpArchiveFetcher {
    client: Client,
}

impl HttpArchiveFetcher {
    pub fn new(timeout: Duration) -> ValdResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| {
                ValdError::internal(
                    "ACQUIRE.HTTP_CLIENT",
                    format!("failed to initialise HTTP client: {source}"),
                )
            })?;
        Ok(Self { client })
    }
}

/// Last path segment of `url`, without query or fragment.
pub fn archive_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

impl ArchiveFetcher for HttpArchiveFetcher {
    fn fetch(&mut self, url: &str, destination_dir: &Path) -> ValdResult<PathBuf> {
        let file_name = archive_file_name(url).ok_or_else(|| {
            ValdError::input_validation(
                "ACQUIRE.DOWNLOAD_URL",
                format!("download link '{url}' has no file name"),
            )
        })?;
        ensure_directory(destination_dir)?;
        let destination = destination_dir.join(file_name);
        let partial = destination_dir.join(format!("{file_name}.part"));

        debug!(url, destination = %destination.display(), "downloading archive");
        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|source| {
                ValdError::io_system(
                    "IO.DOWNLOAD",
                    format!("failed to download '{url}': {source}"),
                )
            })?;

        let write_partial = |response: &mut reqwest::blocking::Response| -> io::Result<u64> {
            let mut file = File::create(&partial)?;
            let written = io::copy(response, &mut file)?;
            file.sync_all()?;
            Ok(written)
        };
        let bytes = match write_partial(&mut response) {
            Ok(bytes) => bytes,
            Err(source) => {
                let _ = fs::remove_file(&partial);
                return Err(ValdError::io_system(
                    "IO.DOWNLOAD",
                    format!("failed to save '{url}' to '{}': {}", partial.display(), source),
                ));
            }
        };

        fs::rename(&partial, &destination).map_err(|source| {
            ValdError::io_system(
                "IO.OUTPUT_RENAME",
                format!(
                    "failed to move download into '{}': {}",
                    destination.display(),
                    source
                ),
            )
        })?;
        info!(destination = %destination.display(), bytes, "archive downloaded");
        Ok(destination)
    }
}

/// `<archive stem>_<index>.lst` in `output_dir`; `foo.gz` gives `foo_1.lst`.
pub fn decompressed_path(archive: &Path, output_dir: &Path, index: usize) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vald".to_string());
    output_dir.join(format!("{stem}_{index}.lst"))
}

/// Gunzips `archive` into `destination`. The archive is removed only on success.
pub fn decompress_archive(archive: &Path, destination: &Path) -> ValdResult<()> {
    let input = File::open(archive).map_err(|source| {
        ValdError::io_system(
            "IO.ARCHIVE_READ",
            format!("failed to open archive '{}': {}", archive.display(), source),
        )
    })?;
    let mut decoder = GzDecoder::new(BufReader::new(input));

    let mut staged = staging_file_for(destination)?;
    io::copy(&mut decoder, &mut staged).map_err(|source| {
        ValdError::io_system(
            "IO.ARCHIVE_DECOMPRESS",
            format!("failed to decompress '{}': {}", archive.display(), source),
        )
    })?;
    persist_staged(staged, destination)?;

    fs::remove_file(archive).map_err(|source| {
        ValdError::io_system(
            "IO.ARCHIVE_REMOVE",
            format!("failed to remove archive '{}': {}", archive.display(), source),
        )
    })?;
    debug!(archive = %archive.display(), output = %destination.display(), "archive decompressed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{archive_file_name, decompress_archive, decompressed_path};
    use crate::domain::ValdErrorCategory;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn archive_names_come_from_the_url_path() {
        assert_eq!(
            archive_file_name("http://vald.astro.uu.se/~vald/FTP/obs.004217.gz"),
            Some("obs.004217.gz")
        );
        assert_eq!(archive_file_name("https://host/dir/x.gz?token=1"), Some("x.gz"));
        assert_eq!(archive_file_name("https://host/dir/"), None);
    }

    #[test]
    fn decompressed_names_carry_the_request_index() {
        assert_eq!(
            decompressed_path(Path::new("/dl/obs.004217.gz"), Path::new("/out"), 2),
            Path::new("/out/obs.004217_2.lst")
        );
    }

    #[test]
    fn successful_decompression_removes_archive() {
        let temp = TempDir::new().expect("tempdir should be created");
        let archive = temp.path().join("obs.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"header\n'Fe 1', 5000.0\n").expect("encode");
        fs::write(&archive, encoder.finish().expect("finish")).expect("archive staged");

        let output = temp.path().join("out/obs_1.lst");
        decompress_archive(&archive, &output).expect("decompression succeeds");

        assert_eq!(
            fs::read_to_string(&output).expect("output exists"),
            "header\n'Fe 1', 5000.0\n"
        );
        assert!(!archive.exists());
    }

    #[test]
    fn corrupt_archive_is_kept_and_no_output_written() {
        let temp = TempDir::new().expect("tempdir should be created");
        let archive = temp.path().join("broken.gz");
        fs::write(&archive, b"this is not gzip").expect("archive staged");

        let output = temp.path().join("broken_1.lst");
        let error = decompress_archive(&archive, &output).expect_err("corrupt archive fails");

        assert_eq!(error.category(), ValdErrorCategory::IoSystem);
        assert_eq!(error.code(), "IO.ARCHIVE_DECOMPRESS");
        assert!(archive.exists());
        assert!(!output.exists());
    }
}
