//! Data layer: dataset acquisition, layout normalization, and indexing.
//!
//! Architecture:
//! ```text
//!   dataset host (Kaggle API / local archive)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  fetch    │  {download_dir}/{name}.zip      skipped if present
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  unpack   │  images/Images/{id}-{Breed}/ → {image_dir}/
//!   └──────────┘
//!        │
//!        ▼
//!   ┌───────────┐
//!   │ normalize  │  {image_dir}/{breed}_{000}.jpg, no subfolders
//!   └───────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  DatasetIndex → DogBreedDataset::get(i) → Sample
//!   └──────────┘
//! ```

pub mod auth;
pub mod fetch;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod unpack;
