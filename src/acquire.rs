//! Fetches the source archive once and keeps it on disk.
//!
//! There is no checksum and no retry. A download that dies midway leaves a
//! partial file behind, and because the only check is "does the file exist",
//! the next run will use that partial file as-is.

use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::error::{Error, Result};

/// Writes a remote resource verbatim to a local path.
pub trait Downloader {
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Blocking HTTP(S) downloader.
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self> {
        // The county archive is several hundred megabytes.
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30 * 60))
            .build()?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send()?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file = File::create(dest)?;
        let written = response.copy_to(&mut file)?;
        Ok(written)
    }
}

/// Download `url` to `archive_path` unless a file is already there.
///
/// Creates the containing directory when it is missing. Returns `true` when a
/// download took place.
pub fn ensure_archive(downloader: &dyn Downloader, url: &str, archive_path: &Path) -> Result<bool> {
    if let Some(dir) = archive_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            info!("Creating folder: {}", dir.display());
            fs::create_dir_all(dir)?;
        }
    }

    if archive_path.is_file() {
        return Ok(false);
    }

    info!("Downloading from: {}", url);
    let bytes = downloader.download(url, archive_path)?;
    info!("Downloaded {} bytes to {}", bytes, archive_path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;

    struct FakeDownloader {
        calls: Cell<usize>,
        body: &'static [u8],
    }

    impl Downloader for FakeDownloader {
        fn download(&self, _url: &str, dest: &Path) -> Result<u64> {
            self.calls.set(self.calls.get() + 1);
            let mut file = File::create(dest)?;
            file.write_all(self.body)?;
            Ok(self.body.len() as u64)
        }
    }

    #[test]
    fn test_downloads_when_absent_and_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data").join("Parcels.zip");
        let fake = FakeDownloader { calls: Cell::new(0), body: b"zip bytes" };

        assert!(ensure_archive(&fake, "http://example.invalid/p.zip", &path).unwrap());
        assert_eq!(fake.calls.get(), 1);
        assert_eq!(fs::read(&path).unwrap(), b"zip bytes");
    }

    #[test]
    fn test_existing_file_is_not_downloaded_again() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Parcels.zip");
        fs::write(&path, b"partial").unwrap();
        let fake = FakeDownloader { calls: Cell::new(0), body: b"fresh" };

        assert!(!ensure_archive(&fake, "http://example.invalid/p.zip", &path).unwrap());
        assert_eq!(fake.calls.get(), 0);
        // A truncated archive is kept as-is.
        assert_eq!(fs::read(&path).unwrap(), b"partial");
    }

    #[test]
    fn test_download_failure_propagates() {
        struct Failing;
        impl Downloader for Failing {
            fn download(&self, url: &str, _dest: &Path) -> Result<u64> {
                Err(Error::HttpStatus { url: url.to_string(), status: 404 })
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Parcels.zip");
        let err = ensure_archive(&Failing, "http://example.invalid/p.zip", &path).unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
        assert!(!path.exists());
    }
}
