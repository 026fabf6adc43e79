use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Dataset used when the metadata file does not name one.
pub const DEFAULT_DATASET: &str = "jessicali9530/stanford-dogs-dataset";

// ---------------------------------------------------------------------------
// Metadata file
// ---------------------------------------------------------------------------

/// Project version as written in the metadata file (`5` or `"0.1.0"`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Version {
    Number(u64),
    Text(String),
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Number(n) => write!(f, "{n}"),
            Version::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Project metadata loaded from `metadata.json`.
///
/// ```json
/// {
///   "project_name": "busca_doggo",
///   "version": "0.1.0",
///   "logger": { "folder": "logs", "config": "logging.json" },
///   "data": { "download_path": "dados", "image_path": "dados/Imagens" }
/// }
/// ```
///
/// The `logger` and `data` sections are kept as raw JSON so that each path
/// is validated when it is asked for, not when the file is read.
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    project_name: String,
    version: Version,
    #[serde(default)]
    logger: BTreeMap<String, JsonValue>,
    #[serde(default)]
    data: BTreeMap<String, JsonValue>,
}

impl Metadata {
    /// Read and parse a metadata file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read metadata {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
            .map_err(|e| Error::Config(format!("Failed to parse metadata {}: {e}", path.display())))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// A path from the `logger` section (`folder`, `config`).
    pub fn logger_path(&self, key: &str) -> Result<PathBuf> {
        section_path(&self.logger, "logger", key)
    }

    /// A path from the `data` section (`download_path`, `image_path`).
    pub fn data_path(&self, key: &str) -> Result<PathBuf> {
        section_path(&self.data, "data", key)
    }

    /// Dataset reference from `data.dataset`, or [`DEFAULT_DATASET`].
    pub fn dataset(&self) -> Result<DatasetRef> {
        match self.data.get("dataset") {
            None => DEFAULT_DATASET.parse(),
            Some(JsonValue::String(s)) => s.parse(),
            Some(other) => Err(Error::Validation(format!(
                "data.dataset must be a string like 'owner/name', not {}",
                json_kind(other)
            ))),
        }
    }
}

fn section_path(section: &BTreeMap<String, JsonValue>, name: &str, key: &str) -> Result<PathBuf> {
    let value = section
        .get(key)
        .ok_or_else(|| Error::Config(format!("metadata is missing '{name}.{key}'")))?;
    json_to_path(value).map_err(|e| match e {
        Error::Validation(msg) => Error::Validation(format!("{name}.{key}: {msg}")),
        other => other,
    })
}

/// Interpret a JSON value as a filesystem path.
///
/// Only a non-empty string qualifies; every other JSON type is rejected.
pub fn json_to_path(value: &JsonValue) -> Result<PathBuf> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Ok(PathBuf::from(s)),
        JsonValue::String(_) => Err(Error::Validation(
            "expected a path, got an empty string".into(),
        )),
        other => Err(Error::Validation(format!(
            "expected a path, got {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(n) if n.is_f64() => "a float",
        JsonValue::Number(_) => "an integer",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Dataset reference and per-invocation config
// ---------------------------------------------------------------------------

/// `owner/name` identifier of a dataset on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub owner: String,
    pub name: String,
}

impl DatasetRef {
    /// File name the host delivers the archive under.
    pub fn archive_file_name(&self) -> String {
        format!("{}.zip", self.name)
    }
}

impl FromStr for DatasetRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(DatasetRef {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(Error::Validation(format!(
                "dataset reference '{s}' is not of the form 'owner/name'"
            ))),
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Everything one pipeline run needs. Immutable once built.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub dataset: DatasetRef,
    /// Where the raw archive is downloaded and extracted.
    pub download_dir: PathBuf,
    /// Where the flattened, renamed images end up.
    pub image_dir: PathBuf,
    pub force: bool,
    pub verbose: bool,
}

impl DatasetConfig {
    pub fn from_metadata(meta: &Metadata, force: bool, verbose: bool) -> Result<Self> {
        Ok(DatasetConfig {
            dataset: meta.dataset()?,
            download_dir: meta.data_path("download_path")?,
            image_dir: meta.data_path("image_path")?,
            force,
            verbose,
        })
    }

    pub fn archive_path(&self) -> PathBuf {
        self.download_dir.join(self.dataset.archive_file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const META: &str = r#"{
        "project_name": "teste",
        "version": 5,
        "logger": { "config": "teste.log", "folder": "logs" },
        "data": { "download_path": "dados", "image_path": "dados/Imagens" }
    }"#;

    #[test]
    fn test_name_and_version() {
        let meta = Metadata::from_json(META).unwrap();
        assert_eq!(meta.project_name(), "teste");
        assert_eq!(meta.version(), &Version::Number(5));
        assert_eq!(meta.version().to_string(), "5");
    }

    #[test]
    fn test_string_version() {
        let meta = Metadata::from_json(r#"{"project_name": "x", "version": "0.1.0"}"#).unwrap();
        assert_eq!(meta.version().to_string(), "0.1.0");
    }

    #[test]
    fn test_logger_path() {
        let meta = Metadata::from_json(META).unwrap();
        assert_eq!(meta.logger_path("config").unwrap(), PathBuf::from("teste.log"));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let meta = Metadata::from_json(META).unwrap();
        assert!(matches!(meta.logger_path("nope"), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let err = Metadata::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        std::fs::write(&path, "{ \"project_name\": ").unwrap();
        assert!(matches!(Metadata::from_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_non_path_values_rejected() {
        let bad = [
            json!(1),
            json!(2.0),
            json!({ "dict": "teste" }),
            json!(["lista"]),
            json!(["set"]),
            json!(["tupla"]),
            json!(true),
            json!(null),
            json!(""),
        ];
        for value in bad {
            let result = json_to_path(&value);
            assert!(
                matches!(result, Err(Error::Validation(_))),
                "{value} should not be accepted as a path"
            );
        }
    }

    #[test]
    fn test_non_path_in_metadata_rejected() {
        let meta = Metadata::from_json(
            r#"{"project_name": "x", "version": 1, "logger": {"folder": 3}}"#,
        )
        .unwrap();
        let err = meta.logger_path("folder").unwrap_err();
        assert!(err.to_string().contains("logger.folder"));
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn test_dataset_default_and_parse() {
        let meta = Metadata::from_json(META).unwrap();
        let ds = meta.dataset().unwrap();
        assert_eq!(ds.owner, "jessicali9530");
        assert_eq!(ds.name, "stanford-dogs-dataset");
        assert_eq!(ds.archive_file_name(), "stanford-dogs-dataset.zip");
        assert_eq!(ds.to_string(), DEFAULT_DATASET);
    }

    #[test]
    fn test_dataset_ref_malformed() {
        for bad in ["", "noslash", "/name", "owner/", "a/b/c"] {
            assert!(bad.parse::<DatasetRef>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_dataset_config_from_metadata() {
        let meta = Metadata::from_json(META).unwrap();
        let config = DatasetConfig::from_metadata(&meta, true, false).unwrap();
        assert_eq!(config.download_dir, PathBuf::from("dados"));
        assert_eq!(config.image_dir, PathBuf::from("dados/Imagens"));
        assert_eq!(
            config.archive_path(),
            PathBuf::from("dados").join("stanford-dogs-dataset.zip")
        );
        assert!(config.force);
        assert!(!config.verbose);
    }
}
