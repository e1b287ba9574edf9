//! Serialization of detection sets: the detector line format and the JSON dataset mapping.

pub mod dataset;
pub mod log;

use crate::detection::ImageDetectionSet;
use crate::error::{ConfigError, DecodeError, EncodeError};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON mapping `image -> [{box, score, landmarks}]`.
    Dataset,
    /// One `<image> <count> $d ...` line per image.
    Log,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Dataset => "json",
            Format::Log => "txt",
        }
    }

    /// Pick the format from a file extension (`.json` or `.txt`).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Format::Dataset),
            Some("txt") => Ok(Format::Log),
            other => Err(ConfigError::UnknownFormat(
                other.map(|e| format!(".{e}")).unwrap_or_else(|| path.display().to_string()),
            )),
        }
    }

    pub fn encode(self, set: &ImageDetectionSet) -> Result<String, EncodeError> {
        match self {
            Format::Dataset => dataset::encode(set),
            Format::Log => log::encode(set),
        }
    }

    /// Decode a whole source. Duplicate image lines in the log format keep the last one.
    pub fn decode(self, text: &str) -> Result<ImageDetectionSet, DecodeError> {
        match self {
            Format::Dataset => dataset::decode(text),
            Format::Log => Ok(log::decode(text)?
                .into_iter()
                .map(|entry| (entry.image, entry.detections))
                .collect()),
        }
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dataset" | "json" => Ok(Format::Dataset),
            "log" | "txt" => Ok(Format::Log),
            _ => Err(ConfigError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Dataset => "dataset",
            Format::Log => "log",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BBox, Detection};

    #[test]
    fn parses_format_selectors() {
        assert_eq!("dataset".parse::<Format>(), Ok(Format::Dataset));
        assert_eq!("LOG".parse::<Format>(), Ok(Format::Log));
        assert_eq!(
            "yaml".parse::<Format>(),
            Err(ConfigError::UnknownFormat("yaml".into()))
        );
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("out/a.json")), Ok(Format::Dataset));
        assert_eq!(Format::from_path(Path::new("out/a.txt")), Ok(Format::Log));
        assert!(Format::from_path(Path::new("out/a.csv")).is_err());
    }

    #[test]
    fn log_and_dataset_agree_on_content() {
        let mut set = ImageDetectionSet::new();
        set.insert(
            "img/1.jpg",
            vec![Detection::new(
                BBox::new(1, 2, 30, 40),
                0.75,
                vec![5.0, 6.0, -1.0, -1.0, 7.5, 8.0, 9.0, 10.0, 11.0, 12.0],
            )],
        );
        set.insert("img/2.jpg", vec![]);

        let via_log = Format::Log
            .decode(&Format::Log.encode(&set).unwrap())
            .unwrap();
        let via_json = Format::Dataset
            .decode(&Format::Dataset.encode(&set).unwrap())
            .unwrap();
        assert_eq!(via_log, set);
        assert_eq!(via_json, set);
    }
}
