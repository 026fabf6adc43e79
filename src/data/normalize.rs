use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::model::is_hidden;
use crate::error::{Error, Result};
use crate::progress;

/// Outcome of flattening the breed folders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Breed folders flattened and removed.
    pub breeds: usize,
    /// Images renamed into the flat layout.
    pub images: usize,
}

/// Label for a breed folder: drop the ID prefix up to the first hyphen and
/// lowercase the rest.
///
/// `"n02085620-Chihuahua"` → `"chihuahua"`,
/// `"n02090379-Lakeland-terrier"` → `"lakeland-terrier"`.
pub fn breed_label(folder_name: &str) -> Option<String> {
    let (id, rest) = folder_name.split_once('-')?;
    if id.is_empty() || rest.is_empty() {
        return None;
    }
    Some(rest.to_lowercase())
}

/// `{label}_{index:03}{.ext}`
pub fn normalized_file_name(label: &str, index: usize, source: &Path) -> String {
    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{label}_{index:03}.{ext}"),
        None => format!("{label}_{index:03}"),
    }
}

/// Sorted subdirectories of `dir`.
fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// A breed folder whose contents have been checked but not yet moved.
struct BreedFolder {
    path: PathBuf,
    label: String,
    /// Sorted image files, in index order.
    images: Vec<PathBuf>,
    /// Dot-entries and whether each one is a directory.
    hidden: Vec<(PathBuf, bool)>,
}

impl BreedFolder {
    fn read(path: PathBuf, label: String) -> Result<Self> {
        let mut images = Vec::new();
        let mut hidden = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let entry_path = entry.path();
            if is_hidden(&entry_path) {
                hidden.push((entry_path, file_type.is_dir()));
            } else if file_type.is_file() {
                images.push(entry_path);
            } else {
                return Err(Error::Validation(format!(
                    "breed folder '{}' contains '{}', which is not a file",
                    path.display(),
                    entry.file_name().to_string_lossy()
                )));
            }
        }
        images.sort();
        Ok(BreedFolder {
            path,
            label,
            images,
            hidden,
        })
    }

    fn targets<'a>(&'a self, image_dir: &'a Path) -> impl Iterator<Item = PathBuf> + 'a {
        self.images.iter().enumerate().map(move |(index, image)| {
            image_dir.join(normalized_file_name(&self.label, index, image))
        })
    }
}

/// Flatten every breed subfolder of `image_dir` into `image_dir` itself.
///
/// Everything is checked before anything moves: a folder without an ID
/// prefix, two folders sharing a label, a breed folder holding anything
/// other than files, or a rename target that already exists all abort the
/// run with the directory untouched. Dot-files inside breed folders are
/// deleted and never take an index.
pub fn flatten_breed_folders(image_dir: &Path, verbose: bool) -> Result<NormalizeReport> {
    let folders = sorted_dirs(image_dir)?;
    if folders.is_empty() {
        log::debug!("No breed folders left in {}", image_dir.display());
        return Ok(NormalizeReport::default());
    }

    let mut plan: Vec<BreedFolder> = Vec::with_capacity(folders.len());
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    for folder in folders {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let label = breed_label(&name).ok_or_else(|| {
            Error::Validation(format!(
                "breed folder '{name}' is not of the form '{{id}}-{{breed}}'"
            ))
        })?;
        if let Some(first) = seen.get(&label) {
            return Err(Error::LabelCollision {
                label,
                first: first.clone(),
                second: folder,
            });
        }
        seen.insert(label.clone(), folder.clone());
        plan.push(BreedFolder::read(folder, label)?);
    }
    for breed in &plan {
        if let Some(target) = breed.targets(image_dir).find(|t| t.exists()) {
            return Err(Error::TargetExists(target));
        }
    }

    let bar = progress::items_bar(plan.len() as u64, "Organizing breed folders", verbose);
    let mut report = NormalizeReport::default();

    for breed in plan {
        log::info!("Organizing {} images of {}", breed.images.len(), breed.label);

        for (path, is_dir) in &breed.hidden {
            log::debug!("Removing {}", path.display());
            if *is_dir {
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_file(path)?;
            }
        }
        for (image, target) in breed.images.iter().zip(breed.targets(image_dir)) {
            fs::rename(image, &target)?;
        }
        fs::remove_dir(&breed.path)?;

        report.breeds += 1;
        report.images += breed.images.len();
        bar.inc(1);
    }

    bar.finish_and_clear();
    Ok(report)
}
