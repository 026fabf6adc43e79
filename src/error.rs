//! Error types for the dataset pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for busca-doggo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed metadata / logger configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A value that must be a path (or another typed argument) is not one
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// Something the pipeline expected on disk is not there
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// No usable credentials for the dataset host
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Two breed folders derive the same label
    #[error(
        "Breed folders '{}' and '{}' both normalize to label '{label}'",
        first.display(),
        second.display()
    )]
    LabelCollision {
        label: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A rename would overwrite an existing file
    #[error("Refusing to overwrite existing file: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("Index {index} out of bounds for dataset of {len} images")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Specialized Result type for busca-doggo operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("logs_folder must be a path".to_string());
        assert_eq!(err.to_string(), "Invalid argument: logs_folder must be a path");
    }

    #[test]
    fn test_label_collision_names_both_folders() {
        let err = Error::LabelCollision {
            label: "chihuahua".to_string(),
            first: PathBuf::from("n02085620-Chihuahua"),
            second: PathBuf::from("n09999999-chihuahua"),
        };
        let msg = err.to_string();
        assert!(msg.contains("n02085620-Chihuahua"));
        assert!(msg.contains("n09999999-chihuahua"));
        assert!(msg.contains("'chihuahua'"));
    }

    #[test]
    fn test_json_error_is_config() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }
}
