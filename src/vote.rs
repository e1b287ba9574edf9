//! Cascaded, vote-gated, landmark-aware non-maximum suppression.
//!
//! Each cascade stage clusters the current pool around the highest-scoring
//! remaining box, picks one representative per cluster (landmark-bearing
//! boxes first, then higher score) and keeps it only when the cluster has at
//! least `min_votes` members. Survivors of a stage are the only input of the
//! next one; boxes are selected or dropped, never synthesized.

use crate::detection::{Detection, landmark_mask};
use crate::error::{ConfigError, ConsistencyError};
use crate::report::{NoopReporter, Reporter, StageSummary};
use std::cmp::Ordering;

/// One `(thresh_iou, min_votes)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stage {
    pub thresh_iou: f64,
    pub min_votes: usize,
}

/// Ordered suppression stages. An empty cascade leaves pools untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cascade {
    stages: Vec<Stage>,
}

impl Cascade {
    /// Pair up the two configured lists. They must have equal length and hold no NaN thresholds.
    pub fn new(thresh_iou: &[f64], min_votes: &[usize]) -> Result<Self, ConfigError> {
        if thresh_iou.len() != min_votes.len() {
            return Err(ConfigError::CascadeLengthMismatch {
                thresh_iou: thresh_iou.len(),
                min_votes: min_votes.len(),
            });
        }
        if let Some(&bad) = thresh_iou.iter().find(|t| t.is_nan()) {
            return Err(ConfigError::InvalidThreshold(bad));
        }
        let stages = thresh_iou
            .iter()
            .zip(min_votes)
            .map(|(&thresh_iou, &min_votes)| Stage {
                thresh_iou,
                min_votes,
            })
            .collect();
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// A resolved cluster of one suppression pass. Indices refer to the pass input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cluster {
    /// Highest-scoring box the cluster was built around.
    pub seed: usize,
    pub representative: usize,
    /// Cluster size, seed included.
    pub votes: usize,
    pub kept: bool,
}

/// Run one suppression pass and return every cluster in resolution order.
///
/// `has_landmarks` must be index-aligned with `detections`. A box votes for
/// the current seed when its IoU with the seed is positive and at least
/// `thresh_iou`; the seed always votes for itself.
pub fn clusters(
    detections: &[Detection],
    has_landmarks: &[bool],
    thresh_iou: f64,
    min_votes: usize,
) -> Result<Vec<Cluster>, ConsistencyError> {
    if detections.len() != has_landmarks.len() {
        return Err(ConsistencyError {
            detections: detections.len(),
            mask: has_landmarks.len(),
        });
    }

    // Ascending by score; the stable sort keeps input order among equal scores.
    let mut order: Vec<usize> = (0..detections.len()).collect();
    order.sort_by(|&a, &b| detections[a].score.total_cmp(&detections[b].score));

    let mut resolved = Vec::new();
    while let Some(&seed) = order.last() {
        let seed_box = detections[seed].bbox;
        let (mut candidates, left): (Vec<usize>, Vec<usize>) =
            std::mem::take(&mut order).into_iter().partition(|&i| {
                if i == seed {
                    return true;
                }
                let ratio = seed_box.iou(&detections[i].bbox);
                ratio > 0.0 && ratio >= thresh_iou
            });

        candidates.sort_by(|&a, &b| representative_order(detections, has_landmarks, a, b));
        let votes = candidates.len();
        resolved.push(Cluster {
            seed,
            representative: candidates[0],
            votes,
            kept: votes >= min_votes,
        });
        order = left;
    }
    Ok(resolved)
}

/// Landmark-bearing first, then higher score. Callers rely on a stable sort for the rest.
fn representative_order(
    detections: &[Detection],
    has_landmarks: &[bool],
    a: usize,
    b: usize,
) -> Ordering {
    has_landmarks[b]
        .cmp(&has_landmarks[a])
        .then_with(|| detections[b].score.total_cmp(&detections[a].score))
}

/// Indices kept by one suppression pass, in the order their clusters were resolved.
pub fn nms_landmarks(
    detections: &[Detection],
    has_landmarks: &[bool],
    thresh_iou: f64,
    min_votes: usize,
) -> Result<Vec<usize>, ConsistencyError> {
    Ok(clusters(detections, has_landmarks, thresh_iou, min_votes)?
        .into_iter()
        .filter(|c| c.kept)
        .map(|c| c.representative)
        .collect())
}

/// Apply every cascade stage in turn to one image's merged pool.
pub fn aggregate(
    detections: Vec<Detection>,
    cascade: &Cascade,
) -> Result<Vec<Detection>, ConsistencyError> {
    aggregate_image("", detections, cascade, &NoopReporter)
}

/// [`aggregate`] with per-stage reporting under the given image key.
pub fn aggregate_image(
    image: &str,
    detections: Vec<Detection>,
    cascade: &Cascade,
    reporter: &dyn Reporter,
) -> Result<Vec<Detection>, ConsistencyError> {
    let mut pool = detections;
    for (position, stage) in cascade.stages().iter().enumerate() {
        let mask = landmark_mask(&pool);
        let resolved = clusters(&pool, &mask, stage.thresh_iou, stage.min_votes)?;
        for cluster in &resolved {
            reporter.cluster(image, position, cluster);
        }

        let before = pool.len();
        let mut slots: Vec<Option<Detection>> = pool.into_iter().map(Some).collect();
        pool = resolved
            .iter()
            .filter(|c| c.kept)
            .filter_map(|c| slots[c.representative].take())
            .collect();

        reporter.stage(&StageSummary {
            image,
            stage: position,
            thresh_iou: stage.thresh_iou,
            min_votes: stage.min_votes,
            before,
            after: pool.len(),
            clusters: resolved.len(),
        });
    }
    Ok(pool)
}
