use std::fs::{self, File};
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::config::DatasetConfig;
use crate::data::model::StepOutcome;
use crate::error::{Error, Result};
use crate::progress;

/// Per-image XML annotations; not used.
pub const ANNOTATIONS_DIR: &str = "annotations";
/// Top-level folder holding the image tree inside the archive.
pub const IMAGES_DIR: &str = "images";
/// Breed folders live in `images/Images`.
pub const IMAGES_SUBDIR: &str = "Images";

/// Extract the archive and promote its breed folders to `config.image_dir`.
///
/// Skipped when the image directory already has content and the run is not
/// forced. Transient extraction folders are removed afterwards; the archive
/// itself is kept so a forced re-run does not need the network.
pub fn unpack_archive(config: &DatasetConfig) -> Result<StepOutcome> {
    let image_dir = &config.image_dir;
    let populated = is_populated(image_dir)?;

    if populated && !config.force {
        log::info!(
            "Images already present in {}, skipping extraction",
            image_dir.display()
        );
        return Ok(StepOutcome::Skipped);
    }

    let archive = config.archive_path();
    if !archive.is_file() {
        return Err(Error::Precondition(format!(
            "archive {} does not exist",
            archive.display()
        )));
    }

    if image_dir.is_dir() {
        fs::remove_dir_all(image_dir)?;
    } else if image_dir.exists() {
        fs::remove_file(image_dir)?;
    }

    log::info!("Unpacking dataset to {}", image_dir.display());
    extract_all(&archive, &config.download_dir, config.verbose)?;

    let annotations = config.download_dir.join(ANNOTATIONS_DIR);
    if annotations.exists() {
        fs::remove_dir_all(&annotations)?;
    }

    let images_root = config.download_dir.join(IMAGES_DIR);
    let breeds = images_root.join(IMAGES_SUBDIR);
    if !breeds.is_dir() {
        return Err(Error::Precondition(format!(
            "archive did not contain {IMAGES_DIR}/{IMAGES_SUBDIR}"
        )));
    }
    move_dir(&breeds, image_dir)?;
    fs::remove_dir_all(&images_root)?;

    Ok(if populated {
        StepOutcome::Overwritten
    } else {
        StepOutcome::Performed
    })
}

fn is_populated(dir: &Path) -> Result<bool> {
    Ok(dir.is_dir() && fs::read_dir(dir)?.next().is_some())
}

/// Extract every member of `archive_path` below `dest`.
fn extract_all(archive_path: &Path, dest: &Path, verbose: bool) -> Result<()> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;

    let total = (0..archive.len())
        .map(|i| archive.by_index_raw(i).map(|entry| entry.compressed_size()))
        .sum::<zip::result::ZipResult<u64>>()?;
    let bar = progress::bytes_bar(total, "Unpacking", verbose);

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        bar.inc(entry.compressed_size());

        let relative = entry.enclosed_name().ok_or_else(|| {
            Error::Validation(format!(
                "archive member '{}' points outside the destination",
                entry.name()
            ))
        })?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
    }

    bar.finish_and_clear();
    log::debug!("Extracted {} archive members", archive.len());
    Ok(())
}

/// Rename `from` to `to`, copying when a rename is not possible (e.g. across
/// filesystems).
fn move_dir(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    log::debug!(
        "Rename {} -> {} failed, copying instead",
        from.display(),
        to.display()
    );
    copy_dir(from, to)?;
    fs::remove_dir_all(from)?;
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
