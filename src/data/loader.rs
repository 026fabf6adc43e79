use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DatasetConfig;
use crate::data::fetch::{fetch_archive, DatasetHost};
use crate::data::model::{
    is_hidden, DatasetIndex, ImageRecord, ImageTensor, Sample, StepOutcome,
};
use crate::data::normalize::{flatten_breed_folders, NormalizeReport};
use crate::data::unpack::unpack_archive;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Pipeline driver
// ---------------------------------------------------------------------------

/// What each stage of [`generate_dataset`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub download: StepOutcome,
    pub unpack: StepOutcome,
    pub normalize: NormalizeReport,
}

/// Download → unpack → flatten. Each stage is skipped when its output is
/// already there and `config.force` is off.
pub fn generate_dataset(config: &DatasetConfig, host: &dyn DatasetHost) -> Result<PipelineReport> {
    if config.force {
        log::info!(
            "Force flag set: existing data under {} will be overwritten",
            config.image_dir.display()
        );
    }

    let download = fetch_archive(host, config)?;
    let unpack = unpack_archive(config)?;
    let normalize = flatten_breed_folders(&config.image_dir, config.verbose)?;

    let shown = fs::canonicalize(&config.image_dir).unwrap_or_else(|_| config.image_dir.clone());
    log::info!(
        "Dataset available at {} (download {download}, unpack {unpack}, {} images regrouped)",
        shown.display(),
        normalize.images
    );

    Ok(PipelineReport {
        download,
        unpack,
        normalize,
    })
}

// ---------------------------------------------------------------------------
// Indexer
// ---------------------------------------------------------------------------

/// List the flat image directory once, in sorted file-name order.
///
/// Hidden files, subdirectories and names without a `_{index}` suffix are
/// left out of the index.
pub fn scan_image_dir(image_dir: &Path) -> Result<DatasetIndex> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(image_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        if is_hidden(&path) {
            continue;
        }
        match ImageRecord::from_path(&path) {
            Some(record) => records.push(record),
            None => log::warn!("Skipping {}: not a normalized image name", path.display()),
        }
    }
    Ok(DatasetIndex::from_records(records))
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Indexed collection a training loop can draw samples from.
pub trait Dataset {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<Self::Item>;
}

pub type ImageTransform = Box<dyn Fn(ImageTensor) -> ImageTensor + Send + Sync>;
pub type LabelTransform = Box<dyn Fn(String) -> String + Send + Sync>;

/// Flattened dog breed images with labels taken from the file names.
pub struct DogBreedDataset {
    root: PathBuf,
    index: DatasetIndex,
    transform: Option<ImageTransform>,
    target_transform: Option<LabelTransform>,
}

impl fmt::Debug for DogBreedDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DogBreedDataset")
            .field("root", &self.root)
            .field("len", &self.index.len())
            .field("transform", &self.transform.is_some())
            .field("target_transform", &self.target_transform.is_some())
            .finish()
    }
}

impl DogBreedDataset {
    /// Index an already-normalized image directory.
    pub fn open(image_dir: &Path) -> Result<Self> {
        if !image_dir.is_dir() {
            log::error!(
                "Image directory {} does not exist; the dataset download or extraction failed",
                image_dir.display()
            );
            return Err(Error::Precondition(format!(
                "image directory {} does not exist",
                image_dir.display()
            )));
        }

        let index = scan_image_dir(image_dir)?;
        log::debug!("Indexed {} images in {}", index.len(), image_dir.display());
        Ok(DogBreedDataset {
            root: image_dir.to_path_buf(),
            index,
            transform: None,
            target_transform: None,
        })
    }

    /// Run the acquisition pipeline, then index the result.
    pub fn prepare(config: &DatasetConfig, host: &dyn DatasetHost) -> Result<Self> {
        generate_dataset(config, host)?;
        Self::open(&config.image_dir)
    }

    /// Apply `f` to every decoded image.
    pub fn with_transform(
        mut self,
        f: impl Fn(ImageTensor) -> ImageTensor + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Box::new(f));
        self
    }

    /// Apply `f` to every label.
    pub fn with_target_transform(
        mut self,
        f: impl Fn(String) -> String + Send + Sync + 'static,
    ) -> Self {
        self.target_transform = Some(Box::new(f));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    /// Samples in index order, decoded lazily.
    pub fn iter(&self) -> impl Iterator<Item = Result<Sample>> + '_ {
        (0..self.index.len()).map(move |i| self.get(i))
    }
}

impl Dataset for DogBreedDataset {
    type Item = Sample;

    fn len(&self) -> usize {
        self.index.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let record = self.index.get(index).ok_or(Error::IndexOutOfBounds {
            index,
            len: self.index.len(),
        })?;

        let mut image = ImageTensor::from_image(image::open(&record.path)?);
        let mut label = record.label.clone();

        if let Some(transform) = &self.transform {
            image = transform(image);
        }
        if let Some(target_transform) = &self.target_transform {
            label = target_transform(label);
        }

        Ok(Sample { image, label })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn save_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([200, 100, 50]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = DogBreedDataset::open(&dir.path().join("Imagens")).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_scan_skips_non_images() {
        let dir = tempfile::tempdir().unwrap();
        save_png(&dir.path().join("pug_001.png"), 2, 2);
        save_png(&dir.path().join("Beagle_000.png"), 2, 2);
        fs::write(dir.path().join(".DS_Store"), b"").unwrap();
        fs::write(dir.path().join("README"), b"").unwrap();
        fs::create_dir(dir.path().join("n1-Pug")).unwrap();

        let index = scan_image_dir(dir.path()).unwrap();
        let labels: Vec<&str> = index.records().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["beagle", "pug"]);
    }

    #[test]
    fn test_get_decodes_and_transforms() {
        let dir = tempfile::tempdir().unwrap();
        save_png(&dir.path().join("pug_000.png"), 4, 3);

        let dataset = DogBreedDataset::open(dir.path())
            .unwrap()
            .with_transform(|mut t| {
                t.data.iter_mut().for_each(|v| *v /= 2);
                t
            })
            .with_target_transform(|label| label.to_uppercase());

        assert_eq!(dataset.len(), 1);
        let sample = dataset.get(0).unwrap();
        assert_eq!(sample.label, "PUG");
        assert_eq!(sample.image.shape(), [3, 3, 4]);
        assert_eq!(sample.image.at(0, 0, 0), 100);
        assert_eq!(sample.image.at(1, 2, 3), 50);
    }

    #[test]
    fn test_get_without_transforms() {
        let dir = tempfile::tempdir().unwrap();
        save_png(&dir.path().join("pug_000.png"), 1, 1);
        let dataset = DogBreedDataset::open(dir.path()).unwrap();
        let sample = dataset.get(0).unwrap();
        assert_eq!(sample.label, "pug");
        assert_eq!(sample.image.data, vec![200, 100, 50]);
    }

    #[test]
    fn test_get_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        save_png(&dir.path().join("pug_000.png"), 1, 1);
        let dataset = DogBreedDataset::open(dir.path()).unwrap();
        assert!(matches!(
            dataset.get(1),
            Err(Error::IndexOutOfBounds { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_iter_yields_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        save_png(&dir.path().join("pug_000.png"), 1, 1);
        save_png(&dir.path().join("pug_001.png"), 1, 1);
        let dataset = DogBreedDataset::open(dir.path()).unwrap();
        let samples: Vec<Sample> = dataset.iter().collect::<Result<_>>().unwrap();
        assert_eq!(samples.len(), 2);
        assert!(!dataset.is_empty());
    }
}
