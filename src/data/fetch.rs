use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::{DatasetConfig, DatasetRef};
use crate::data::auth::KaggleClient;
use crate::data::model::StepOutcome;
use crate::error::{Error, Result};
use crate::progress;

// ---------------------------------------------------------------------------
// Host seam
// ---------------------------------------------------------------------------

/// Something that can deliver a dataset archive to a local file.
pub trait DatasetHost {
    /// Write the archive of `dataset` to `dest`. On error `dest` must not
    /// exist afterwards.
    fn download(&self, dataset: &DatasetRef, dest: &Path, verbose: bool) -> Result<()>;
}

impl DatasetHost for KaggleClient {
    fn download(&self, dataset: &DatasetRef, dest: &Path, verbose: bool) -> Result<()> {
        let url = format!(
            "{}/datasets/download/{}/{}",
            self.api_base, dataset.owner, dataset.name
        );
        log::debug!("GET {url}");

        let mut response = self
            .http
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.key))
            .send()?
            .error_for_status()?;

        let bar = progress::bytes_bar(
            response.content_length().unwrap_or(0),
            "Downloading",
            verbose,
        );
        write_via_part_file(dest, |file| {
            let mut writer = bar.wrap_write(file);
            response.copy_to(&mut writer)?;
            writer.flush()?;
            Ok(())
        })?;
        bar.finish_and_clear();
        Ok(())
    }
}

/// An archive already on local disk, e.g. fetched by hand or produced by
/// the `generate_sample` tool.
#[derive(Debug, Clone)]
pub struct LocalArchive {
    pub source: PathBuf,
}

impl LocalArchive {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        LocalArchive {
            source: source.into(),
        }
    }
}

impl DatasetHost for LocalArchive {
    fn download(&self, dataset: &DatasetRef, dest: &Path, verbose: bool) -> Result<()> {
        if !self.source.is_file() {
            return Err(Error::Precondition(format!(
                "local archive for {dataset} not found at {}",
                self.source.display()
            )));
        }
        let reader = File::open(&self.source)?;
        let bar = progress::bytes_bar(reader.metadata()?.len(), "Copying", verbose);
        write_via_part_file(dest, |file| {
            let mut reader = bar.wrap_read(reader);
            let mut file = file;
            io::copy(&mut reader, &mut file)?;
            file.flush()?;
            Ok(())
        })?;
        bar.finish_and_clear();
        Ok(())
    }
}

/// Write to `{dest}.part` and rename into place only once `write` succeeded.
fn write_via_part_file(dest: &Path, write: impl FnOnce(File) -> Result<()>) -> Result<()> {
    let mut part: OsString = dest.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let result = File::create(&part)
        .map_err(Error::from)
        .and_then(write)
        .and_then(|()| fs::rename(&part, dest).map_err(Error::from));

    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Make sure the raw archive is present in the download directory.
///
/// * archive present, not forced → [`StepOutcome::Skipped`], host untouched
/// * archive present, forced → removed and downloaded again ([`StepOutcome::Overwritten`])
/// * archive absent → downloaded ([`StepOutcome::Performed`])
pub fn fetch_archive(host: &dyn DatasetHost, config: &DatasetConfig) -> Result<StepOutcome> {
    let archive = config.archive_path();

    if archive.exists() && !config.force {
        log::info!(
            "Archive already present at {}, skipping download",
            archive.display()
        );
        return Ok(StepOutcome::Skipped);
    }

    let outcome = if archive.exists() {
        log::info!("Removing stale archive {}", archive.display());
        if archive.is_dir() {
            fs::remove_dir_all(&archive)?;
        } else {
            fs::remove_file(&archive)?;
        }
        StepOutcome::Overwritten
    } else {
        StepOutcome::Performed
    };

    fs::create_dir_all(&config.download_dir)?;
    let shown =
        fs::canonicalize(&config.download_dir).unwrap_or_else(|_| config.download_dir.clone());
    log::info!("Downloading dataset {} to {}", config.dataset, shown.display());

    host.download(&config.dataset, &archive, config.verbose)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingHost {
        calls: Cell<usize>,
        payload: &'static [u8],
    }

    impl CountingHost {
        fn new(payload: &'static [u8]) -> Self {
            CountingHost {
                calls: Cell::new(0),
                payload,
            }
        }
    }

    impl DatasetHost for CountingHost {
        fn download(&self, _dataset: &DatasetRef, dest: &Path, _verbose: bool) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            fs::write(dest, self.payload)?;
            Ok(())
        }
    }

    struct FailingHost;

    impl DatasetHost for FailingHost {
        fn download(&self, _dataset: &DatasetRef, dest: &Path, _verbose: bool) -> Result<()> {
            write_via_part_file(dest, |mut file| {
                file.write_all(b"half an archi")?;
                Err(Error::Precondition("connection dropped".into()))
            })
        }
    }

    fn config(root: &Path, force: bool) -> DatasetConfig {
        DatasetConfig {
            dataset: "owner/stanford-dogs-dataset".parse().unwrap(),
            download_dir: root.join("dados"),
            image_dir: root.join("dados").join("Imagens"),
            force,
            verbose: false,
        }
    }

    #[test]
    fn test_fresh_download() {
        let dir = tempfile::tempdir().unwrap();
        let host = CountingHost::new(b"zip bytes");
        let cfg = config(dir.path(), false);

        assert_eq!(fetch_archive(&host, &cfg).unwrap(), StepOutcome::Performed);
        assert_eq!(host.calls.get(), 1);
        assert_eq!(fs::read(cfg.archive_path()).unwrap(), b"zip bytes");
    }

    #[test]
    fn test_present_archive_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), false);
        fs::create_dir_all(&cfg.download_dir).unwrap();
        fs::write(cfg.archive_path(), b"old").unwrap();

        let host = CountingHost::new(b"new");
        assert_eq!(fetch_archive(&host, &cfg).unwrap(), StepOutcome::Skipped);
        assert_eq!(host.calls.get(), 0);
        assert_eq!(fs::read(cfg.archive_path()).unwrap(), b"old");
    }

    #[test]
    fn test_force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), true);
        fs::create_dir_all(&cfg.download_dir).unwrap();
        fs::write(cfg.archive_path(), b"old").unwrap();

        let host = CountingHost::new(b"new");
        assert_eq!(fetch_archive(&host, &cfg).unwrap(), StepOutcome::Overwritten);
        assert_eq!(host.calls.get(), 1);
        assert_eq!(fs::read(cfg.archive_path()).unwrap(), b"new");
    }

    #[test]
    fn test_force_without_archive_is_performed() {
        let dir = tempfile::tempdir().unwrap();
        let host = CountingHost::new(b"new");
        assert_eq!(
            fetch_archive(&host, &config(dir.path(), true)).unwrap(),
            StepOutcome::Performed
        );
    }

    #[test]
    fn test_failed_download_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), true);
        fs::create_dir_all(&cfg.download_dir).unwrap();
        fs::write(cfg.archive_path(), b"stale").unwrap();

        assert!(fetch_archive(&FailingHost, &cfg).is_err());
        assert!(!cfg.archive_path().exists());
        let leftovers: Vec<_> = fs::read_dir(&cfg.download_dir).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_local_archive_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("mirror.zip");
        fs::write(&source, b"PK fake").unwrap();
        let cfg = config(dir.path(), false);

        let outcome = fetch_archive(&LocalArchive::new(&source), &cfg).unwrap();
        assert_eq!(outcome, StepOutcome::Performed);
        assert_eq!(fs::read(cfg.archive_path()).unwrap(), b"PK fake");
    }

    #[test]
    fn test_local_archive_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), false);
        let err = fetch_archive(&LocalArchive::new(dir.path().join("nope.zip")), &cfg).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }
}
