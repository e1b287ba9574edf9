use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with settings or CLI arguments, detected before any image is processed.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error(
        "thresh_iou and min_votes must have the same length (got {thresh_iou} and {min_votes})"
    )]
    CascadeLengthMismatch { thresh_iou: usize, min_votes: usize },
    #[error("IoU threshold must be a number, got {0}")]
    InvalidThreshold(f64),
    #[error("unknown output format `{0}` (expected `dataset` or `log`)")]
    UnknownFormat(String),
    #[error("prefix `{prefix}` does not occur in input path `{reference}`")]
    PrefixNotFound { prefix: String, reference: String },
    #[error("cannot derive an output file name: pass --filename or --dataset")]
    MissingOutputName,
    #[error("no detector logs given: pass log files or --logs-dir")]
    NoInputs,
    #[error("invalid settings file {}: {message}", .path.display())]
    Settings { path: PathBuf, message: String },
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum DecodeErrorKind {
    #[error("missing `$d` separator")]
    MissingMarker,
    #[error("expected `<image> <count> $d` header")]
    MalformedHeader,
    #[error("invalid detection count `{0}`")]
    InvalidCount(String),
    #[error("expected {expected} payload tokens for {count} detections, found {found}")]
    TokenCount {
        count: usize,
        expected: usize,
        found: usize,
    },
    #[error("non-numeric {field} `{token}`")]
    NonNumeric { field: &'static str, token: String },
    #[error("landmark list must hold (x, y) pairs, got {0} values")]
    OddLandmarks(usize),
    #[error("{0}")]
    Json(String),
}

/// Where in a source a decode error happened.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Location {
    /// 1-based line, with the image key when the header was readable.
    Line { line: usize, image: Option<String> },
    /// 0-based record within an image's dataset list.
    Record { image: String, index: usize },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line { line, image: None } => write!(f, "line {line}"),
            Location::Line {
                line,
                image: Some(image),
            } => write!(f, "line {line} ({image})"),
            Location::Record { image, index } => write!(f, "{image} record {index}"),
        }
    }
}

/// A malformed detector log line or dataset record.
#[derive(Debug, Error, PartialEq, Clone)]
#[error("{location}: {kind}")]
pub struct DecodeError {
    pub location: Location,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn at_line(line: usize, kind: DecodeErrorKind) -> Self {
        Self {
            location: Location::Line { line, image: None },
            kind,
        }
    }

    pub fn at_record(image: impl Into<String>, index: usize, kind: DecodeErrorKind) -> Self {
        Self {
            location: Location::Record {
                image: image.into(),
                index,
            },
            kind,
        }
    }

    /// Attach the image key to a line location.
    pub fn with_image(mut self, name: impl Into<String>) -> Self {
        if let Location::Line { image, .. } = &mut self.location {
            *image = Some(name.into());
        }
        self
    }
}

/// Detection pool and landmark mask are not index-aligned.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("{detections} detections but {mask} landmark flags")]
pub struct ConsistencyError {
    pub detections: usize,
    pub mask: usize,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EncodeError {
    #[error("image key `{0}` is empty or contains whitespace and cannot be written as a log line")]
    UnrepresentableKey(String),
    #[error("{image}: log lines need 0 or {expected} landmark values, got {found}")]
    LandmarkSlots {
        image: String,
        expected: usize,
        found: usize,
    },
    #[error("{0}: scores and landmarks must be finite numbers")]
    NonFinite(String),
    #[error("failed to serialize dataset: {0}")]
    Json(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("cannot start worker threads: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(path: impl Into<PathBuf>, source: DecodeError) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_names_line_and_image() {
        let err = DecodeError::at_line(7, DecodeErrorKind::MissingMarker).with_image("a/b.jpg");
        assert_eq!(err.to_string(), "line 7 (a/b.jpg): missing `$d` separator");
    }

    #[test]
    fn decode_error_without_image() {
        let err = DecodeError::at_line(3, DecodeErrorKind::MalformedHeader);
        assert_eq!(
            err.to_string(),
            "line 3: expected `<image> <count> $d` header"
        );
    }

    #[test]
    fn record_location_names_image_and_index() {
        let err = DecodeError::at_record("x.jpg", 2, DecodeErrorKind::OddLandmarks(3));
        assert_eq!(
            err.to_string(),
            "x.jpg record 2: landmark list must hold (x, y) pairs, got 3 values"
        );
    }

    #[test]
    fn crate_error_prefixes_path() {
        let err = Error::decode(
            "logs/retina/out.txt",
            DecodeError::at_line(2, DecodeErrorKind::InvalidCount("x".into())),
        );
        assert_eq!(
            err.to_string(),
            "logs/retina/out.txt: line 2: invalid detection count `x`"
        );
    }
}
