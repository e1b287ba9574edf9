//! Progress and diagnostics hooks.
//!
//! The library never installs a global logger; it reports through a
//! [`Reporter`] handed in by the caller. [`TracingReporter`] forwards to
//! `tracing`, [`NoopReporter`] drops everything.

use crate::vote::Cluster;
use std::path::Path;
use tracing::{debug, info, trace, warn};

/// Outcome of one cascade stage over one image.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary<'a> {
    pub image: &'a str,
    /// 0-based stage position in the cascade.
    pub stage: usize,
    pub thresh_iou: f64,
    pub min_votes: usize,
    pub before: usize,
    pub after: usize,
    pub clusters: usize,
}

/// Totals for a finished aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub sources: usize,
    pub images: usize,
    pub detections_in: usize,
    pub detections_out: usize,
}

pub trait Reporter: Sync {
    fn cluster(&self, _image: &str, _stage: usize, _cluster: &Cluster) {}

    fn stage(&self, _summary: &StageSummary<'_>) {}

    fn source_loaded(&self, _path: &Path, _images: usize, _detections: usize) {}

    /// A source listed the same image on more than one line; the later line wins.
    fn duplicate_image(&self, _path: &Path, _image: &str, _line: usize) {}

    /// An output key did not contain the prefix and was left unchanged.
    fn prefix_missing(&self, _image: &str, _prefix: &str) {}

    fn finished(&self, _summary: &RunSummary) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn cluster(&self, image: &str, stage: usize, cluster: &Cluster) {
        trace!(
            image,
            stage,
            seed = cluster.seed,
            representative = cluster.representative,
            votes = cluster.votes,
            kept = cluster.kept,
            "cluster resolved"
        );
    }

    fn stage(&self, s: &StageSummary<'_>) {
        debug!(
            image = s.image,
            stage = s.stage,
            thresh_iou = s.thresh_iou,
            min_votes = s.min_votes,
            before = s.before,
            after = s.after,
            clusters = s.clusters,
            "stage applied"
        );
    }

    fn source_loaded(&self, path: &Path, images: usize, detections: usize) {
        info!(source = %path.display(), images, detections, "loaded detector log");
    }

    fn duplicate_image(&self, path: &Path, image: &str, line: usize) {
        warn!(source = %path.display(), image, line, "image listed twice, keeping the later line");
    }

    fn prefix_missing(&self, image: &str, prefix: &str) {
        warn!(image, prefix, "prefix not found in image path, key left unchanged");
    }

    fn finished(&self, s: &RunSummary) {
        info!(
            sources = s.sources,
            images = s.images,
            detections_in = s.detections_in,
            detections_out = s.detections_out,
            "aggregation finished"
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records events as strings for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingReporter {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().map(|e| e.clone()).unwrap_or_default()
        }

        fn push(&self, event: String) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }

    impl Reporter for RecordingReporter {
        fn cluster(&self, image: &str, stage: usize, c: &Cluster) {
            self.push(format!(
                "cluster {image} stage={stage} rep={} votes={} kept={}",
                c.representative, c.votes, c.kept
            ));
        }

        fn stage(&self, s: &StageSummary<'_>) {
            self.push(format!(
                "stage {} stage={} {}->{}",
                s.image, s.stage, s.before, s.after
            ));
        }

        fn duplicate_image(&self, _path: &Path, image: &str, line: usize) {
            self.push(format!("duplicate {image} line={line}"));
        }

        fn prefix_missing(&self, image: &str, prefix: &str) {
            self.push(format!("prefix-missing {image} {prefix}"));
        }
    }
}
