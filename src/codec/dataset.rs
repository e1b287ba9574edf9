//! The JSON dataset mapping: `{"<image>": [{"box": [x1, y1, x2, y2], "score": s, "landmarks": [...]}]}`.

use crate::detection::{BBox, Detection, ImageDetectionSet, Landmarks};
use crate::error::{DecodeError, DecodeErrorKind, EncodeError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One detection as stored in the dataset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetRecord {
    /// `[x1, y1, x2, y2]` in pixels.
    #[serde(rename = "box")]
    pub bbox: [i32; 4],
    pub score: f64,
    /// Flat `(x, y)` keypoint coordinates; `-1` marks an absent value.
    #[serde(default)]
    pub landmarks: Vec<f64>,
}

/// Whole dataset file, keyed by image path.
pub type Dataset = BTreeMap<String, Vec<DatasetRecord>>;

impl From<&Detection> for DatasetRecord {
    fn from(detection: &Detection) -> Self {
        Self {
            bbox: detection.bbox.to_array(),
            score: detection.score,
            landmarks: detection.landmarks.to_output(),
        }
    }
}

impl TryFrom<DatasetRecord> for Detection {
    type Error = DecodeErrorKind;

    fn try_from(record: DatasetRecord) -> Result<Self, Self::Error> {
        if record.landmarks.len() % 2 != 0 {
            return Err(DecodeErrorKind::OddLandmarks(record.landmarks.len()));
        }
        Ok(Detection::new(
            BBox::from_array(record.bbox),
            record.score,
            Landmarks::new(record.landmarks),
        ))
    }
}

pub fn to_dataset(set: &ImageDetectionSet) -> Dataset {
    set.iter()
        .map(|(image, detections)| {
            (
                image.clone(),
                detections.iter().map(DatasetRecord::from).collect(),
            )
        })
        .collect()
}

pub fn from_dataset(dataset: Dataset) -> Result<ImageDetectionSet, DecodeError> {
    dataset
        .into_iter()
        .map(|(image, records)| {
            let detections = records
                .into_iter()
                .enumerate()
                .map(|(index, record)| {
                    Detection::try_from(record)
                        .map_err(|kind| DecodeError::at_record(image.clone(), index, kind))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok((image, detections))
        })
        .collect()
}

/// Non-finite values would be written as `null` and could not be read back.
pub fn encode(set: &ImageDetectionSet) -> Result<String, EncodeError> {
    if let Some((image, _)) = set
        .iter()
        .find(|(_, detections)| detections.iter().any(|d| !d.is_finite()))
    {
        return Err(EncodeError::NonFinite(image.clone()));
    }
    serde_json::to_string(&to_dataset(set)).map_err(|e| EncodeError::Json(e.to_string()))
}

pub fn decode(text: &str) -> Result<ImageDetectionSet, DecodeError> {
    let dataset: Dataset = serde_json::from_str(text)
        .map_err(|e| DecodeError::at_line(e.line(), DecodeErrorKind::Json(e.to_string())))?;
    from_dataset(dataset)
}
