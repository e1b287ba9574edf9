use crate::detection::ImageDetectionSet;
use crate::error::{ConsistencyError, Result};
use crate::merge::merge_sources;
use crate::prefix::strip_prefix;
use crate::report::{Reporter, RunSummary, TracingReporter};
use crate::sources::read_log;
use crate::vote::{Cascade, aggregate_image};
use rayon::prelude::*;
use std::path::PathBuf;

static TRACING: TracingReporter = TracingReporter;

/// Merges detector outputs and runs the voting cascade on every image.
pub struct AggregationEngine<'r> {
    cascade: Cascade,
    prefix: Option<String>,
    jobs: Option<usize>,
    reporter: &'r dyn Reporter,
}

impl AggregationEngine<'static> {
    pub fn new(cascade: Cascade) -> Self {
        Self {
            cascade,
            prefix: None,
            jobs: None,
            reporter: &TRACING,
        }
    }
}

impl<'r> AggregationEngine<'r> {
    /// Prefix stripped from every output key.
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    /// Worker threads for per-image aggregation; `None` uses the global pool.
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_reporter<'n>(self, reporter: &'n dyn Reporter) -> AggregationEngine<'n> {
        AggregationEngine {
            cascade: self.cascade,
            prefix: self.prefix,
            jobs: self.jobs,
            reporter,
        }
    }

    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    /// Read, merge and aggregate log files, in the given order.
    pub fn run_files(&self, paths: &[PathBuf]) -> Result<(ImageDetectionSet, RunSummary)> {
        let sources = paths
            .iter()
            .map(|path| read_log(path, self.reporter))
            .collect::<Result<Vec<_>>>()?;
        self.run(sources)
    }

    /// Merge already decoded sources and aggregate them.
    pub fn run(&self, sources: Vec<ImageDetectionSet>) -> Result<(ImageDetectionSet, RunSummary)> {
        let source_count = sources.len();
        let merged = merge_sources(sources);
        let detections_in = merged.detection_count();

        let aggregated = self.aggregate(merged)?;
        let output = self.apply_prefix(aggregated);

        let summary = RunSummary {
            sources: source_count,
            images: output.len(),
            detections_in,
            detections_out: output.detection_count(),
        };
        self.reporter.finished(&summary);
        Ok((output, summary))
    }

    /// Run the cascade on every image. Images are independent and may run in parallel;
    /// the result is ordered by key regardless.
    pub fn aggregate(&self, merged: ImageDetectionSet) -> Result<ImageDetectionSet> {
        let images: Vec<_> = merged.into_iter().collect();
        let work = || {
            images
                .into_par_iter()
                .map(|(image, detections)| {
                    let kept = aggregate_image(&image, detections, &self.cascade, self.reporter)?;
                    Ok((image, kept))
                })
                .collect::<std::result::Result<Vec<_>, ConsistencyError>>()
        };

        let results = match self.jobs {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?
                .install(work)?,
            None => work()?,
        };
        Ok(results.into_iter().collect())
    }

    /// Rewrite keys with the configured prefix removed. Keys that collapse onto
    /// the same name are concatenated.
    pub fn apply_prefix(&self, set: ImageDetectionSet) -> ImageDetectionSet {
        let Some(prefix) = self.prefix.as_deref() else {
            return set;
        };
        let mut out = ImageDetectionSet::new();
        for (image, detections) in set {
            let key = match strip_prefix(&image, Some(prefix)) {
                Some(stripped) => stripped,
                None => {
                    self.reporter.prefix_missing(&image, prefix);
                    image
                }
            };
            out.extend_image(key, detections);
        }
        out
    }
}
