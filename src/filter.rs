//! Post-hoc confidence filtering of aggregated output.

use crate::detection::ImageDetectionSet;
use std::path::Path;

/// Drop detections scoring below `thresh_conf`. Images left without detections are kept.
pub fn filter_by_confidence(set: ImageDetectionSet, thresh_conf: f64) -> ImageDetectionSet {
    set.map_detections(|_, detections| {
        detections
            .into_iter()
            .filter(|d| d.score >= thresh_conf)
            .collect()
    })
}

/// Default output name for a filtered file: `<stem>_filtered_<thresh>.<ext>`.
pub fn filtered_file_name(input: &Path, thresh_conf: f64) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    match input.extension() {
        Some(ext) => format!("{stem}_filtered_{thresh_conf}.{}", ext.to_string_lossy()),
        None => format!("{stem}_filtered_{thresh_conf}"),
    }
}
