//! Acquire the Stanford Dogs dataset and expose it as a flat, labeled image
//! collection.

pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod progress;

pub use config::{DatasetConfig, DatasetRef, Metadata};
pub use data::auth::{Credentials, KaggleClient};
pub use data::fetch::{DatasetHost, LocalArchive};
pub use data::loader::{generate_dataset, Dataset, DogBreedDataset, PipelineReport};
pub use data::model::{DatasetIndex, ImageRecord, ImageTensor, Sample, StepOutcome};
pub use error::{Error, Result};
