//! In-memory detection records.
//!
//! A [`Detection`] carries its own landmarks, so the detection list and the
//! landmark list of an image are index-aligned by construction. Code that
//! needs the landmarks as a separate parallel sequence (the landmark mask fed
//! to suppression) derives it with [`landmark_mask`].

use std::collections::BTreeMap;
use std::collections::btree_map;

/// Number of keypoints carried per detection in the line format.
pub const KEYPOINTS: usize = 5;
/// Scalar landmark slots per detection (x and y per keypoint).
pub const LANDMARK_SLOTS: usize = KEYPOINTS * 2;
/// Coordinate value meaning "this landmark is absent".
pub const ABSENT: f64 = -1.0;

/// Axis-aligned box in pixel coordinates, always stored with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    /// Build a box from two corners in any order.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn from_array(coords: [i32; 4]) -> Self {
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    pub fn to_array(self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    #[inline]
    pub fn area(&self) -> f64 {
        (f64::from(self.x2) - f64::from(self.x1)) * (f64::from(self.y2) - f64::from(self.y1))
    }

    /// Intersection over union using the discrete-pixel convention: the
    /// intersection spans `x2 - x1 + 1` pixels, while areas do not add the
    /// extra pixel. Boxes sharing no pixel score 0. Tiny boxes whose inclusive
    /// intersection outgrows their areas score 1 rather than a non-positive union.
    pub fn iou(&self, other: &BBox) -> f64 {
        let w = (i64::from(self.x2.min(other.x2)) - i64::from(self.x1.max(other.x1)) + 1).max(0);
        let h = (i64::from(self.y2.min(other.y2)) - i64::from(self.y1.max(other.y1)) + 1).max(0);
        if w * h == 0 {
            return 0.0;
        }
        let intersection = (w * h) as f64;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 1.0;
        }
        intersection / union
    }
}

/// Flat landmark coordinates `[x0, y0, x1, y1, ...]`, with [`ABSENT`] marking missing values.
///
/// An empty list means the detector reported no landmark data at all.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Landmarks(Vec<f64>);

impl Landmarks {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Ten absent slots, the line-format placeholder.
    pub fn absent() -> Self {
        Self(vec![ABSENT; LANDMARK_SLOTS])
    }

    /// True when at least one coordinate is a real (non-negative) value.
    pub fn is_present(&self) -> bool {
        self.0.iter().any(|&v| v >= 0.0)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values as written to output: the stored ones, or ten absent slots when empty.
    pub fn to_output(&self) -> Vec<f64> {
        if self.0.is_empty() {
            vec![ABSENT; LANDMARK_SLOTS]
        } else {
            self.0.clone()
        }
    }
}

impl From<Vec<f64>> for Landmarks {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub score: f64,
    pub landmarks: Landmarks,
}

impl Detection {
    pub fn new(bbox: BBox, score: f64, landmarks: impl Into<Landmarks>) -> Self {
        Self {
            bbox,
            score,
            landmarks: landmarks.into(),
        }
    }

    /// A detection without landmark data.
    pub fn bare(bbox: BBox, score: f64) -> Self {
        Self::new(bbox, score, Landmarks::default())
    }

    pub fn has_landmarks(&self) -> bool {
        self.landmarks.is_present()
    }

    /// Score and every landmark value are finite, so both formats can hold them.
    pub fn is_finite(&self) -> bool {
        self.score.is_finite() && self.landmarks.values().iter().all(|v| v.is_finite())
    }
}

/// "Has landmarks" flag per detection, index-aligned with `detections`.
pub fn landmark_mask(detections: &[Detection]) -> Vec<bool> {
    detections.iter().map(Detection::has_landmarks).collect()
}

/// Detections keyed by image path. Keys are opaque and iterate in lexicographic order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageDetectionSet {
    images: BTreeMap<String, Vec<Detection>>,
}

impl ImageDetectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the detections of `image`, returning the ones it replaces.
    pub fn insert(
        &mut self,
        image: impl Into<String>,
        detections: Vec<Detection>,
    ) -> Option<Vec<Detection>> {
        self.images.insert(image.into(), detections)
    }

    /// Append detections to `image`, creating the entry if needed.
    pub fn extend_image(&mut self, image: impl Into<String>, detections: Vec<Detection>) {
        self.images
            .entry(image.into())
            .or_default()
            .extend(detections);
    }

    pub fn get(&self, image: &str) -> Option<&[Detection]> {
        self.images.get(image).map(Vec::as_slice)
    }

    pub fn contains(&self, image: &str) -> bool {
        self.images.contains_key(image)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Total number of detections over all images.
    pub fn detection_count(&self) -> usize {
        self.images.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<Detection>> {
        self.images.iter()
    }

    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    /// Apply `f` to every image's detection list, keeping the keys.
    pub fn map_detections<F>(self, mut f: F) -> Self
    where
        F: FnMut(&str, Vec<Detection>) -> Vec<Detection>,
    {
        let images = self
            .images
            .into_iter()
            .map(|(image, detections)| {
                let detections = f(&image, detections);
                (image, detections)
            })
            .collect();
        Self { images }
    }
}

impl IntoIterator for ImageDetectionSet {
    type Item = (String, Vec<Detection>);
    type IntoIter = btree_map::IntoIter<String, Vec<Detection>>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.into_iter()
    }
}

impl<'a> IntoIterator for &'a ImageDetectionSet {
    type Item = (&'a String, &'a Vec<Detection>);
    type IntoIter = btree_map::Iter<'a, String, Vec<Detection>>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

impl FromIterator<(String, Vec<Detection>)> for ImageDetectionSet {
    fn from_iter<T: IntoIterator<Item = (String, Vec<Detection>)>>(iter: T) -> Self {
        Self {
            images: iter.into_iter().collect(),
        }
    }
}
