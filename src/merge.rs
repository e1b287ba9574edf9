use crate::detection::ImageDetectionSet;

/// Types that absorb detections from further sources.
pub trait DetectionMerger {
    /// Append every image of `source` after what is already held for that image.
    fn merge_detections(&mut self, source: ImageDetectionSet);
}

impl DetectionMerger for ImageDetectionSet {
    fn merge_detections(&mut self, source: ImageDetectionSet) {
        for (image, detections) in source {
            self.extend_image(image, detections);
        }
    }
}

/// Union of all sources, per image concatenated in source order.
///
/// Nothing is deduplicated here; overlapping boxes from different detectors
/// are exactly what the voting stage counts.
pub fn merge_sources<I>(sources: I) -> ImageDetectionSet
where
    I: IntoIterator<Item = ImageDetectionSet>,
{
    let mut merged = ImageDetectionSet::new();
    for source in sources {
        merged.merge_detections(source);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BBox, Detection};

    fn det(score: f64) -> Detection {
        Detection::bare(BBox::new(0, 0, 10, 10), score)
    }

    fn source(entries: &[(&str, &[f64])]) -> ImageDetectionSet {
        entries
            .iter()
            .map(|(image, scores)| (image.to_string(), scores.iter().map(|&s| det(s)).collect()))
            .collect()
    }

    #[test]
    fn concatenates_in_source_order() {
        let merged = merge_sources([
            source(&[("a.jpg", &[0.9, 0.8])]),
            source(&[("a.jpg", &[0.1])]),
            source(&[("a.jpg", &[0.5, 0.5])]),
        ]);
        let scores: Vec<f64> = merged.get("a.jpg").unwrap().iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![0.9, 0.8, 0.1, 0.5, 0.5]);
    }

    #[test]
    fn keeps_images_seen_by_one_source() {
        let merged = merge_sources([
            source(&[("a.jpg", &[0.9]), ("empty.jpg", &[])]),
            source(&[("b.jpg", &[0.4])]),
        ]);
        assert_eq!(
            merged.images().collect::<Vec<_>>(),
            vec!["a.jpg", "b.jpg", "empty.jpg"]
        );
        assert_eq!(merged.get("empty.jpg"), Some(&[][..]));
        assert_eq!(merged.detection_count(), 2);
    }

    #[test]
    fn disjoint_sources_merge_independently_of_order() {
        let a = source(&[("a.jpg", &[0.9])]);
        let b = source(&[("b.jpg", &[0.4, 0.3])]);
        assert_eq!(
            merge_sources([a.clone(), b.clone()]),
            merge_sources([b, a])
        );
    }

    #[test]
    fn no_sources_gives_empty_set() {
        assert!(merge_sources(Vec::new()).is_empty());
    }
}
