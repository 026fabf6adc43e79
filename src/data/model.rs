use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use image::DynamicImage;

// ---------------------------------------------------------------------------
// StepOutcome – what an idempotent pipeline step did
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Output already present and not forced; nothing touched.
    Skipped,
    /// Output was absent and has been produced.
    Performed,
    /// Stale output was removed and produced again.
    Overwritten,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Skipped => write!(f, "skipped"),
            StepOutcome::Performed => write!(f, "performed"),
            StepOutcome::Overwritten => write!(f, "overwritten"),
        }
    }
}

// ---------------------------------------------------------------------------
// ImageRecord / DatasetIndex
// ---------------------------------------------------------------------------

/// One flattened image and its breed label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub label: String,
}

impl ImageRecord {
    /// Build a record from a normalized file name (`{label}_{index}.{ext}`).
    /// Returns `None` for names that do not follow the scheme.
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let label = label_from_stem(stem)?;
        Some(ImageRecord {
            path: path.to_path_buf(),
            label,
        })
    }
}

/// `"Toy_terrier_007"` → `"toy_terrier"`.
pub fn label_from_stem(stem: &str) -> Option<String> {
    let (label, index) = stem.rsplit_once('_')?;
    if label.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(label.to_lowercase())
}

/// Dot-files such as `.DS_Store` or AppleDouble `._x.jpg` entries.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

/// Ordered list of records built once from the image directory.
#[derive(Debug, Clone, Default)]
pub struct DatasetIndex {
    records: Vec<ImageRecord>,
}

impl DatasetIndex {
    pub fn from_records(records: Vec<ImageRecord>) -> Self {
        DatasetIndex { records }
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&ImageRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted unique labels.
    pub fn classes(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of images per label.
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.label.clone()).or_insert(0) += 1;
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// ImageTensor / Sample
// ---------------------------------------------------------------------------

/// Decoded image in channel-first (C, H, W) layout, one `u8` per value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<u8>,
}

impl ImageTensor {
    /// Convert a decoded image, keeping grayscale / alpha channels as they are.
    pub fn from_image(img: DynamicImage) -> Self {
        let width = img.width() as usize;
        let height = img.height() as usize;
        let (channels, interleaved) = match img.color().channel_count() {
            1 => (1, img.into_luma8().into_raw()),
            2 => (2, img.into_luma_alpha8().into_raw()),
            4 => (4, img.into_rgba8().into_raw()),
            _ => (3, img.into_rgb8().into_raw()),
        };

        let plane = width * height;
        let mut data = vec![0u8; interleaved.len()];
        for (pixel_idx, pixel) in interleaved.chunks_exact(channels).enumerate() {
            for (c, &value) in pixel.iter().enumerate() {
                data[c * plane + pixel_idx] = value;
            }
        }

        ImageTensor {
            channels,
            height,
            width,
            data,
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    /// Value at channel `c`, row `y`, column `x`.
    pub fn at(&self, c: usize, y: usize, x: usize) -> u8 {
        self.data[c * self.height * self.width + y * self.width + x]
    }
}

/// What the dataset yields per index.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: ImageTensor,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_label_from_stem() {
        assert_eq!(label_from_stem("chihuahua_000").as_deref(), Some("chihuahua"));
        assert_eq!(label_from_stem("Toy_terrier_123").as_deref(), Some("toy_terrier"));
        assert_eq!(
            label_from_stem("Bernese_mountain_dog_1024").as_deref(),
            Some("bernese_mountain_dog")
        );
        assert_eq!(label_from_stem("chihuahua"), None);
        assert_eq!(label_from_stem("_001"), None);
        assert_eq!(label_from_stem("chihuahua_"), None);
        assert_eq!(label_from_stem("chihuahua_x1"), None);
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(Path::new("n1-Pug/._n1_10.jpg")));
        assert!(is_hidden(Path::new(".DS_Store")));
        assert!(!is_hidden(Path::new(".hidden/pug_000.jpg")));
        assert!(!is_hidden(Path::new("pug_000.jpg")));
    }

    #[test]
    fn test_record_from_path() {
        let rec = ImageRecord::from_path(Path::new("/data/Imagens/pug_012.jpg")).unwrap();
        assert_eq!(rec.label, "pug");
        assert_eq!(rec.path, PathBuf::from("/data/Imagens/pug_012.jpg"));
        assert!(ImageRecord::from_path(Path::new("/data/Imagens/.DS_Store")).is_none());
    }

    #[test]
    fn test_index_classes_and_counts() {
        let rec = |p: &str| ImageRecord::from_path(Path::new(p)).unwrap();
        let index = DatasetIndex::from_records(vec![
            rec("pug_000.jpg"),
            rec("beagle_000.jpg"),
            rec("pug_001.jpg"),
        ]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.classes(), vec!["beagle".to_string(), "pug".to_string()]);
        assert_eq!(index.label_counts().get("pug"), Some(&2));
        assert_eq!(index.get(1).map(|r| r.label.as_str()), Some("beagle"));
        assert!(index.get(3).is_none());
    }

    #[test]
    fn test_tensor_is_channel_first() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([10, 20, 30]));
        img.put_pixel(1, 0, Rgb([40, 50, 60]));
        let tensor = ImageTensor::from_image(DynamicImage::ImageRgb8(img));
        assert_eq!(tensor.shape(), [3, 1, 2]);
        assert_eq!(tensor.data, vec![10, 40, 20, 50, 30, 60]);
        assert_eq!(tensor.at(2, 0, 1), 60);
    }

    #[test]
    fn test_tensor_keeps_grayscale() {
        let img = GrayImage::from_pixel(3, 2, Luma([7]));
        let tensor = ImageTensor::from_image(DynamicImage::ImageLuma8(img));
        assert_eq!(tensor.shape(), [1, 2, 3]);
        assert!(tensor.data.iter().all(|&v| v == 7));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(StepOutcome::Skipped.to_string(), "skipped");
        assert_eq!(StepOutcome::Overwritten.to_string(), "overwritten");
    }
}
