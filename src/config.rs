use crate::codec::Format;
use crate::error::ConfigError;
use crate::prefix::validate_prefix;
use crate::vote::Cascade;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a settings file.
pub const SETTINGS_ENV: &str = "DETVOTE_SETTINGS";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub cascade: CascadeSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CascadeSettings {
    pub thresh_iou: Vec<f64>,
    pub min_votes: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    /// `dataset` or `log`.
    pub format: String,
    pub directory: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
    /// Append logs to this file instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            thresh_iou: vec![0.5],
            min_votes: vec![1],
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: "dataset".to_string(),
            directory: PathBuf::from("./output"),
            prefix: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, else `$DETVOTE_SETTINGS`, else the user
    /// config directory. Only a missing default file falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = std::env::var_os(SETTINGS_ENV).filter(|v| !v.is_empty()) {
            return Self::from_file(Path::new(&path));
        }
        match Self::settings_file_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content, path)
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn settings_file_path() -> Option<PathBuf> {
        Self::config_dir().map(|mut path| {
            path.push("settings.toml");
            path
        })
    }

    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("detvote");
            path
        })
    }

    pub fn cascade(&self) -> Result<Cascade, ConfigError> {
        Cascade::new(&self.cascade.thresh_iou, &self.cascade.min_votes)
    }

    pub fn format(&self) -> Result<Format, ConfigError> {
        self.output.format.parse()
    }

    /// Every check that must pass before any input is read. `reference` is
    /// the representative input path the prefix has to occur in.
    pub fn validate(&self, reference: Option<&str>) -> Result<(), ConfigError> {
        self.cascade()?;
        self.format()?;
        if let Some(reference) = reference {
            validate_prefix(self.output.prefix.as_deref(), reference)?;
        }
        Ok(())
    }
}
