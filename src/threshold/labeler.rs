use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{PredictionStore, Threshold};
use crate::Result;

/// Binary label assigned to a single segment.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SegmentLabel {
    pub video: String,
    pub segment: String,
    /// 0 if the score is below the threshold, 1 otherwise.
    pub label: u8,
    pub score: f32,
}

impl Display for SegmentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.video, self.segment, self.label, self.score
        )
    }
}

/// Converts prediction scores into binary labels using a fixed threshold.
#[derive(Copy, Clone, Debug)]
pub struct Labeler {
    threshold: f32,
}

impl Labeler {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    #[inline]
    pub fn classify(&self, score: f32) -> u8 {
        if score < self.threshold {
            0
        } else {
            1
        }
    }

    /// Labels the segments of one video, in segment order.
    pub fn label_video(&self, store: &PredictionStore, video: &str) -> Result<Vec<SegmentLabel>> {
        Ok(store
            .segments(video)?
            .into_iter()
            .map(|segment| SegmentLabel {
                video: video.to_owned(),
                label: self.classify(segment.score),
                segment: segment.name,
                score: segment.score,
            })
            .collect())
    }

    /// Labels every segment of every video. Videos are visited in sorted order.
    pub fn label_all(&self, store: &PredictionStore) -> Result<Vec<SegmentLabel>> {
        let mut labels = Vec::with_capacity(store.len());
        for video in store.videos() {
            labels.extend(self.label_video(store, video)?);
        }
        Ok(labels)
    }

    /// Labels each video using its own threshold. Videos without a threshold are skipped.
    pub fn label_with(
        store: &PredictionStore,
        thresholds: &BTreeMap<String, Threshold>,
    ) -> Result<Vec<SegmentLabel>> {
        let mut labels = Vec::new();
        for (video, threshold) in thresholds {
            labels.extend(Self::new(threshold.value).label_video(store, video)?);
        }
        Ok(labels)
    }
}

/// Writes labels to `path` as a JSON array.
pub fn write_labels(labels: &[SegmentLabel], path: impl AsRef<Path>) -> Result<()> {
    let mut f = std::io::BufWriter::new(std::fs::File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut f, labels)?;
    Ok(())
}
