pub mod codec;
pub mod config;
pub mod detection;
pub mod engine;
pub mod error;
pub mod filter;
pub mod logging;
pub mod merge;
pub mod prefix;
pub mod report;
pub mod sources;
pub mod vote;

pub use detection::{BBox, Detection, ImageDetectionSet, Landmarks};
pub use engine::AggregationEngine;
pub use error::{Error, Result};
pub use vote::{Cascade, aggregate, nms_landmarks};
