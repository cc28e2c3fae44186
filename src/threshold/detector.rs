#[cfg(feature = "rayon")]
extern crate rayon;

use std::collections::BTreeMap;
use std::path::Path;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{PredictionStore, ThresholdFile};
use crate::curve::{self, Curve};
use crate::{Error, Result};

/// Result of a threshold detection.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Threshold {
    /// Position of the threshold in the ascending-sorted scores.
    pub index: usize,
    /// The raw (un-normalized) score at `index`.
    pub value: f32,
    /// Number of scores the threshold was derived from.
    pub count: usize,
}

/// Derives a decision threshold from a set of prediction scores.
///
/// The scores are sorted in ascending order and normalized by their maximum, which yields
/// a monotone curve that is flat for the bulk of (negative) low scores and bends upwards
/// where the (positive) high scores begin. The curve is then smoothed according to the
/// configured [Curve], differentiated twice, and the threshold is placed at the first
/// index where the second derivative exceeds `second_derivative_threshold`. If no point
/// exceeds it, the threshold is the largest score.
///
/// # Example
///
/// ```
/// use scorecut::curve::Curve;
/// use scorecut::threshold::Detector;
///
/// let scores = [0.3, 0.05, 1.0, 0.15, 0.25, 0.6, 0.1, 0.2];
/// let detector = Detector::default().with_curve(Curve::Raw);
/// let threshold = detector.detect(&scores).unwrap();
/// assert_eq!(threshold.value, 0.25);
/// ```
#[derive(Clone, Debug)]
pub struct Detector {
    curve: Curve,
    second_derivative_threshold: f32,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            curve: Curve::default(),
            second_derivative_threshold: super::DEFAULT_SECOND_DERIVATIVE_THRESHOLD,
        }
    }
}

impl Detector {
    /// Constructs a [Detector] configured for pooled detection across all videos: a cubic
    /// polynomial curve with the pooled default threshold.
    pub fn pooled() -> Self {
        Self::default()
            .with_curve(Curve::Polynomial {
                degree: curve::DEFAULT_POLYNOMIAL_DEGREE,
            })
            .with_second_derivative_threshold(super::DEFAULT_POOLED_SECOND_DERIVATIVE_THRESHOLD)
    }

    /// Returns a new [Detector] with the provided `curve`.
    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    /// Returns a new [Detector] with the provided `second_derivative_threshold`.
    pub fn with_second_derivative_threshold(mut self, second_derivative_threshold: f32) -> Self {
        self.second_derivative_threshold = second_derivative_threshold;
        self
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn second_derivative_threshold(&self) -> f32 {
        self.second_derivative_threshold
    }

    /// Name of the group under which this detector's results are persisted.
    pub fn group_name(&self) -> String {
        format!(
            "threshold_{}_{}",
            self.curve, self.second_derivative_threshold
        )
    }

    /// Detects the threshold for an arbitrary set of scores.
    pub fn detect(&self, scores: &[f32]) -> Result<Threshold> {
        let span = tracing::span!(tracing::Level::TRACE, "detect");
        let _enter = span.enter();

        if scores.is_empty() {
            return Err(Error::EmptyScores);
        }

        let mut sorted = scores.to_vec();
        // NaN scores sort last.
        sorted.sort_by(|a, b| {
            a.partial_cmp(b)
                .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
        });

        let max = sorted.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !max.is_finite() || max == 0.0 {
            return Err(Error::DegenerateScores(max));
        }

        let normalized: Vec<f64> = sorted
            .iter()
            .map(|&s| f64::from(s) / f64::from(max))
            .collect();
        let smoothed = self.curve.apply(&normalized)?;
        let second_derivative = curve::second_derivative(&smoothed)?;

        let cutoff = f64::from(self.second_derivative_threshold);
        let index = second_derivative
            .iter()
            .position(|&d| d > cutoff)
            .unwrap_or(sorted.len() - 1);

        tracing::trace!(index, count = sorted.len(), "found second derivative crossing");

        Ok(Threshold {
            index,
            value: sorted[index],
            count: sorted.len(),
        })
    }

    /// Detects the threshold for the segments of a single video.
    pub fn detect_video(&self, store: &PredictionStore, video: &str) -> Result<Threshold> {
        let threshold = self.detect(&store.scores(video)?)?;
        tracing::debug!(
            index = threshold.index,
            value = threshold.value,
            "detected threshold for {}",
            video
        );
        Ok(threshold)
    }

    /// Detects a single threshold over the segments of all videos.
    pub fn detect_pooled(&self, store: &PredictionStore) -> Result<Threshold> {
        let threshold = self.detect(&store.all_scores())?;
        tracing::debug!(
            index = threshold.index,
            value = threshold.value,
            count = threshold.count,
            "detected pooled threshold"
        );
        Ok(threshold)
    }

    fn detect_many(
        &self,
        store: &PredictionStore,
        videos: &[String],
        threading: bool,
    ) -> Result<Vec<(String, Threshold)>> {
        let detect = |video: &String| {
            self.detect_video(store, video)
                .map(|threshold| (video.clone(), threshold))
        };

        let mut data = Vec::new();

        if cfg!(feature = "rayon") && threading {
            #[cfg(feature = "rayon")]
            {
                data = videos.par_iter().map(detect).collect::<Result<Vec<_>>>()?;
            }
        } else {
            data = videos.iter().map(detect).collect::<Result<Vec<_>>>()?;
        }

        Ok(data)
    }

    /// Runs per-video detection on the prediction file at `path`.
    ///
    /// * If `videos` is empty, every video in the file is processed.
    /// * If `persist` is set, the results are written to a [ThresholdFile] alongside the
    ///   predictions, under [Detector::group_name].
    /// * Unless `force` is set, thresholds already present in the threshold file for this
    ///   detector are reused, provided the prediction file has not changed since.
    /// * If `threading` is set, videos are processed in parallel.
    pub fn run(
        &self,
        path: impl AsRef<Path>,
        videos: &[String],
        persist: bool,
        force: bool,
        threading: bool,
    ) -> Result<BTreeMap<String, Threshold>> {
        let span = tracing::span!(tracing::Level::TRACE, "run");
        let _enter = span.enter();

        let path = path.as_ref();
        let store = PredictionStore::from_path(path)?;
        let videos: Vec<String> = if videos.is_empty() {
            store.videos().map(str::to_owned).collect()
        } else {
            videos.to_vec()
        };

        let md5 = crate::util::compute_md5sum(path)?;
        let threshold_path = ThresholdFile::path_for(path);
        let mut threshold_file = match ThresholdFile::from_path(&threshold_path)? {
            Some(f) if f.md5 == md5 => f,
            Some(_) => {
                tracing::debug!(
                    "predictions changed since {} was written, discarding it",
                    threshold_path.display()
                );
                ThresholdFile {
                    md5,
                    ..Default::default()
                }
            }
            None => ThresholdFile {
                md5,
                ..Default::default()
            },
        };

        let group = self.group_name();
        let mut results = BTreeMap::new();
        let mut pending = Vec::new();
        {
            let cached = if force {
                None
            } else {
                threshold_file.group(&group)
            };
            for video in videos {
                match cached.and_then(|g| g.get(&video)) {
                    Some(threshold) => {
                        tracing::debug!("reusing stored threshold for {}", video);
                        results.insert(video, *threshold);
                    }
                    None => pending.push(video),
                }
            }
        }

        let computed = self.detect_many(&store, &pending, threading)?;

        if persist && !computed.is_empty() {
            threshold_file
                .groups
                .entry(group)
                .or_default()
                .extend(computed.iter().cloned());
            threshold_file.write(&threshold_path)?;
            tracing::debug!("wrote thresholds to {}", threshold_path.display());
        }

        results.extend(computed);

        Ok(results)
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::*;

    fn fixture_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("resources")
            .join("predictions.json")
    }

    // Copies the fixture into a scratch directory so that threshold files do not end up
    // in resources/.
    fn scratch_predictions(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scorecut-{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("predictions.json");
        std::fs::copy(fixture_path(), &path).unwrap();
        let _ = std::fs::remove_file(ThresholdFile::path_for(&path));
        path
    }

    #[test]
    fn test_detect_raw_curve() {
        let scores = [0.3, 0.05, 1.0, 0.15, 0.25, 0.6, 0.1, 0.2];
        let detector = Detector::default().with_curve(Curve::Raw);
        let threshold = detector.detect(&scores).unwrap();
        assert_eq!(
            threshold,
            Threshold {
                index: 4,
                value: 0.25,
                count: 8
            }
        );
    }

    #[test]
    fn test_detect_without_crossing_picks_largest_score() {
        let detector = Detector::default()
            .with_curve(Curve::Raw)
            .with_second_derivative_threshold(0.5);
        let threshold = detector.detect(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(threshold.index, 3);
        assert_eq!(threshold.value, 4.0);
    }

    #[test]
    fn test_detect_polynomial_curve() {
        let scores: Vec<f32> = (0..=10).map(|i| (i as f32 / 10.0).powi(3)).collect();

        // The second derivative of the fitted cubic is 0.006 * i in the interior.
        let detector = Detector::pooled().with_second_derivative_threshold(0.02);
        let threshold = detector.detect(&scores).unwrap();
        assert_eq!(threshold.index, 4);
        assert_eq!(threshold.value, scores[4]);

        // Any upward bend crosses zero, starting at the very first point.
        let threshold = Detector::pooled().detect(&scores).unwrap();
        assert_eq!(threshold.index, 0);
    }

    #[test]
    fn test_detect_invalid_scores() {
        let detector = Detector::default();
        assert!(matches!(detector.detect(&[]), Err(Error::EmptyScores)));
        assert!(matches!(
            detector.detect(&[0.0, 0.0]),
            Err(Error::DegenerateScores(_))
        ));
        assert!(matches!(
            detector.detect(&[0.5]),
            Err(Error::InsufficientPoints { .. })
        ));
    }

    #[test]
    fn test_detect_video_from_fixture() {
        let store = PredictionStore::from_path(fixture_path()).unwrap();
        let detector = Detector::default();
        let expected = [
            ("video_52", 7, 0.0519),
            ("video_53", 6, 0.1291),
            ("video_54", 5, 0.0121),
        ];
        for (video, index, value) in expected {
            let threshold = detector.detect_video(&store, video).unwrap();
            assert_eq!(threshold.index, index, "{}", video);
            assert_eq!(threshold.value, value, "{}", video);
            assert_eq!(threshold.count, store.scores(video).unwrap().len());
        }
        assert!(matches!(
            detector.detect_video(&store, "video_99"),
            Err(Error::VideoNotFound(_))
        ));
    }

    #[test]
    fn test_detect_pooled_from_fixture() {
        let store = PredictionStore::from_path(fixture_path()).unwrap();
        let threshold = Detector::pooled().detect_pooled(&store).unwrap();
        assert_eq!(
            threshold,
            Threshold {
                index: 10,
                value: 0.0298,
                count: 30
            }
        );
    }

    #[test]
    fn test_detect_savitzky_golay_from_fixture() {
        let store = PredictionStore::from_path(fixture_path()).unwrap();
        let detector = Detector::default().with_curve(Curve::SavitzkyGolay {
            window: 5,
            order: 2,
        });
        let expected = [
            ("video_52", 7, 0.0519),
            ("video_53", 5, 0.1120),
            ("video_54", 4, 0.0109),
        ];
        for (video, index, value) in expected {
            let threshold = detector.detect_video(&store, video).unwrap();
            assert_eq!(threshold.index, index, "{}", video);
            assert_eq!(threshold.value, value, "{}", video);
        }
    }

    #[test]
    fn test_detect_savitzky_golay_keeps_line_straight() {
        // A linear curve has no bend, so the threshold falls back to the largest score.
        let scores: Vec<f32> = (1..=10).map(|i| i as f32).collect();
        let detector = Detector::default().with_curve(Curve::SavitzkyGolay {
            window: 5,
            order: 2,
        });
        let threshold = detector.detect(&scores).unwrap();
        assert_eq!(threshold.index, 9);
        assert_eq!(threshold.value, 10.0);
    }

    #[test]
    fn test_group_name() {
        assert_eq!(Detector::default().second_derivative_threshold(), 0.01);
        assert_eq!(Detector::pooled().second_derivative_threshold(), 0.0);
        assert_eq!(Detector::default().group_name(), "threshold_mean5_0.01");
        assert_eq!(Detector::pooled().group_name(), "threshold_poly3_0");
    }

    #[test]
    fn test_run_persists_and_reuses_thresholds() {
        let path = scratch_predictions("run");
        let detector = Detector::default();

        let first = detector.run(&path, &[], true, false, false).unwrap();
        assert_eq!(first.len(), 3);

        // Tamper with the stored thresholds: a second run must pick them up as-is.
        let threshold_path = ThresholdFile::path_for(&path);
        let mut file = ThresholdFile::from_path(&threshold_path).unwrap().unwrap();
        let group = file.groups.get_mut(&detector.group_name()).unwrap();
        group.get_mut("video_52").unwrap().value = -1.0;
        file.write(&threshold_path).unwrap();

        let second = detector
            .run(&path, &["video_52".to_owned()], true, false, true)
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second["video_52"].value, -1.0);

        // Forcing recomputes.
        let forced = detector
            .run(&path, &["video_52".to_owned()], false, true, true)
            .unwrap();
        assert_eq!(forced["video_52"], first["video_52"]);
    }

    #[test]
    fn test_run_discards_stale_threshold_file() {
        let path = scratch_predictions("stale");
        let threshold_path = ThresholdFile::path_for(&path);
        let detector = Detector::default();

        let mut stale = ThresholdFile {
            md5: "0".repeat(32),
            ..Default::default()
        };
        let mut group = BTreeMap::new();
        group.insert(
            "video_53".to_owned(),
            Threshold {
                index: 0,
                value: -1.0,
                count: 1,
            },
        );
        stale.groups.insert(detector.group_name(), group);
        stale.write(&threshold_path).unwrap();

        let result = detector
            .run(&path, &["video_53".to_owned()], true, false, false)
            .unwrap();
        assert_ne!(result["video_53"].value, -1.0);

        let file = ThresholdFile::from_path(&threshold_path).unwrap().unwrap();
        assert_eq!(file.md5(), crate::util::compute_md5sum(&path).unwrap());
    }
}
