//! Logger setup driven by a JSON configuration file.
//!
//! The file follows the familiar `version / formatters / handlers /
//! loggers / root` layout:
//!
//! ```json
//! {
//!   "version": 1,
//!   "formatters": {
//!     "simple": {
//!       "format": "{timestamp} | {level:<8} | {target} : {message}",
//!       "datefmt": "%Y-%m-%d %H:%M:%S"
//!     }
//!   },
//!   "handlers": {
//!     "console": {
//!       "class": "console",
//!       "level": "WARNING",
//!       "formatter": "simple",
//!       "stream": "stdout"
//!     }
//!   },
//!   "loggers": {
//!     "busca_doggo": { "level": "INFO", "handlers": ["console"] }
//!   }
//! }
//! ```
//!
//! env_logger drives a single output target, so only the first handler of
//! the project logger is installed.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use log::{Level, LevelFilter};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Name of the project logger in the configuration file; matches the crate's
/// module path so it covers every log target inside the crate.
pub const LOGGER_NAME: &str = "busca_doggo";

pub const DEFAULT_FORMAT: &str = "{timestamp} | {level:<8} | {target} : {message}";
pub const DEFAULT_DATEFMT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Log folder
// ---------------------------------------------------------------------------

/// Create the folder that file handlers write into, if needed.
pub fn setup_logs_folder(logs_folder: &Path) -> Result<()> {
    if logs_folder.exists() && !logs_folder.is_dir() {
        return Err(Error::Validation(format!(
            "logs folder {} exists and is not a directory",
            logs_folder.display()
        )));
    }
    std::fs::create_dir_all(logs_folder)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Configuration file schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    pub version: u32,
    #[serde(default)]
    pub formatters: BTreeMap<String, FormatterConfig>,
    #[serde(default)]
    pub handlers: BTreeMap<String, HandlerConfig>,
    #[serde(default)]
    pub loggers: BTreeMap<String, LoggerEntry>,
    #[serde(default)]
    pub root: Option<LoggerEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatterConfig {
    pub format: String,
    #[serde(default = "default_datefmt")]
    pub datefmt: String,
}

fn default_datefmt() -> String {
    DEFAULT_DATEFMT.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerClass {
    Console,
    File,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    #[default]
    Stderr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HandlerConfig {
    pub class: HandlerClass,
    #[serde(default)]
    pub level: Option<ConfigLevel>,
    #[serde(default)]
    pub formatter: Option<String>,
    #[serde(default)]
    pub stream: Stream,
    #[serde(default)]
    pub filename: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggerEntry {
    #[serde(default)]
    pub level: Option<ConfigLevel>,
    #[serde(default)]
    pub handlers: Vec<String>,
}

/// A level name as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigLevel(pub LevelFilter);

impl<'de> Deserialize<'de> for ConfigLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        parse_level(&name)
            .map(ConfigLevel)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown log level '{name}'")))
    }
}

/// Accepts `log` level names plus `WARNING` and `CRITICAL`.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "critical" | "error" => Some(LevelFilter::Error),
        "warning" | "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Line format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Timestamp,
    Level { width: usize },
    Target,
    Message,
}

/// A parsed `format` + `datefmt` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LogFormat {
    segments: Vec<Segment>,
    datefmt: String,
}

impl Default for LogFormat {
    fn default() -> Self {
        // The built-in templates always parse.
        Self::parse(DEFAULT_FORMAT, DEFAULT_DATEFMT).unwrap_or(LogFormat {
            segments: vec![Segment::Message],
            datefmt: DEFAULT_DATEFMT.to_string(),
        })
    }
}

impl LogFormat {
    /// Parse a template such as `{timestamp} | {level:<8} | {message}`.
    /// `{{` and `}}` are literal braces.
    pub fn parse(template: &str, datefmt: &str) -> Result<Self> {
        if StrftimeItems::new(datefmt).any(|item| matches!(item, Item::Error)) {
            return Err(Error::Validation(format!("invalid datefmt '{datefmt}'")));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(Error::Validation(format!(
                                    "unclosed placeholder in log format '{template}'"
                                )))
                            }
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(&name)?);
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(LogFormat {
            segments,
            datefmt: datefmt.to_string(),
        })
    }

    /// Render one log line (without trailing newline).
    pub fn render(
        &self,
        now: &DateTime<Local>,
        level: Level,
        target: &str,
        message: &std::fmt::Arguments<'_>,
    ) -> String {
        let mut line = String::new();
        for segment in &self.segments {
            // Writing into a String only fails on a bad datefmt, which parse() rejects.
            let _ = match segment {
                Segment::Literal(text) => line.write_str(text),
                Segment::Timestamp => write!(line, "{}", now.format(&self.datefmt)),
                Segment::Level { width } => write!(line, "{:<w$}", level.as_str(), w = *width),
                Segment::Target => line.write_str(target),
                Segment::Message => write!(line, "{message}"),
            };
        }
        line
    }
}

fn parse_placeholder(name: &str) -> Result<Segment> {
    match name {
        "timestamp" => Ok(Segment::Timestamp),
        "level" => Ok(Segment::Level { width: 0 }),
        "target" => Ok(Segment::Target),
        "message" => Ok(Segment::Message),
        other => {
            let width = other
                .strip_prefix("level:<")
                .and_then(|w| w.parse::<usize>().ok())
                .ok_or_else(|| {
                    Error::Validation(format!("unknown log format placeholder '{{{other}}}'"))
                })?;
            Ok(Segment::Level { width })
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved logger plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    Stderr,
    File(PathBuf),
}

/// What gets installed: one format, one target, two filters.
#[derive(Debug, Clone)]
pub struct LoggerPlan {
    pub format: LogFormat,
    pub target: LogTarget,
    /// Filter for everything outside the project.
    pub root_level: LevelFilter,
    /// Filter for the project logger (stricter of logger and handler level).
    pub project_level: LevelFilter,
    /// Messages to log once the logger is live.
    pub warnings: Vec<String>,
}

impl Default for LoggerPlan {
    fn default() -> Self {
        LoggerPlan {
            format: LogFormat::default(),
            target: LogTarget::Stderr,
            root_level: LevelFilter::Info,
            project_level: LevelFilter::Info,
            warnings: Vec::new(),
        }
    }
}

impl LoggerPlan {
    /// Resolve the plan for `config_path`, falling back to the default
    /// console format when there is no file.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let Some(path) = config_path else {
            return Ok(LoggerPlan::default());
        };
        if !path.exists() {
            let shown = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            let mut plan = LoggerPlan::default();
            plan.warnings.push(format!(
                "Logger config file not found at {} - using default configuration",
                shown.display()
            ));
            return Ok(plan);
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read logger config {}: {e}", path.display()))
        })?;
        let config: LoggerConfig = serde_json::from_str(&text).map_err(|e| {
            Error::Config(format!("Failed to parse logger config {}: {e}", path.display()))
        })?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &LoggerConfig) -> Result<Self> {
        if config.version != 1 {
            return Err(Error::Config(format!(
                "unsupported logger config version {}",
                config.version
            )));
        }

        let root = config.root.clone().unwrap_or_default();
        let root_level = root.level.map(|l| l.0).unwrap_or(LevelFilter::Warn);
        let project = config.loggers.get(LOGGER_NAME);
        let logger_level = project.and_then(|p| p.level).map(|l| l.0).unwrap_or(root_level);

        let handler_names = match project {
            Some(p) if !p.handlers.is_empty() => &p.handlers,
            _ => &root.handlers,
        };

        let mut plan = LoggerPlan {
            root_level,
            project_level: logger_level,
            ..LoggerPlan::default()
        };

        let Some((first, rest)) = handler_names.split_first() else {
            return Ok(plan);
        };
        for ignored in rest {
            plan.warnings.push(format!(
                "Logger handler '{ignored}' ignored: \
                 only the first handler ('{first}') is installed"
            ));
        }

        let handler = config
            .handlers
            .get(first)
            .ok_or_else(|| Error::Config(format!("logger references unknown handler '{first}'")))?;

        if let Some(level) = handler.level {
            plan.project_level = plan.project_level.min(level.0);
            plan.root_level = plan.root_level.min(level.0);
        }

        plan.target = match handler.class {
            HandlerClass::Console => match handler.stream {
                Stream::Stdout => LogTarget::Stdout,
                Stream::Stderr => LogTarget::Stderr,
            },
            HandlerClass::File => LogTarget::File(handler.filename.clone().ok_or_else(|| {
                Error::Config(format!("file handler '{first}' has no filename"))
            })?),
        };

        if let Some(name) = &handler.formatter {
            let formatter = config.formatters.get(name).ok_or_else(|| {
                Error::Config(format!("handler '{first}' references unknown formatter '{name}'"))
            })?;
            plan.format = LogFormat::parse(&formatter.format, &formatter.datefmt)?;
        }

        Ok(plan)
    }

    /// Build an env_logger builder for this plan. Does not read `RUST_LOG`.
    pub fn builder(&self) -> Result<env_logger::Builder> {
        let mut builder = env_logger::Builder::new();
        builder
            .filter_level(self.root_level)
            .filter_module(LOGGER_NAME, self.project_level);

        match &self.target {
            LogTarget::Stdout => {
                builder.target(env_logger::Target::Stdout);
            }
            LogTarget::Stderr => {
                builder.target(env_logger::Target::Stderr);
            }
            LogTarget::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                builder
                    .target(env_logger::Target::Pipe(Box::new(file)))
                    .write_style(env_logger::WriteStyle::Never);
            }
        }

        let format = self.format.clone();
        builder.format(move |buf, record| {
            let line = format.render(&Local::now(), record.level(), record.target(), record.args());
            writeln!(buf, "{line}")
        });

        Ok(builder)
    }
}

/// Install the process-wide logger from `config_path`.
///
/// With no config file the default console format is used and a warning
/// naming the missing path is logged.
pub fn setup_logger(config_path: Option<&Path>) -> Result<()> {
    let plan = LoggerPlan::load(config_path)?;
    let mut builder = plan.builder()?;
    builder.parse_default_env();
    builder
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logger: {e}")))?;

    for warning in &plan.warnings {
        log::warn!("{warning}");
    }
    Ok(())
}
