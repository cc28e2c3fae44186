use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::Threshold;
use crate::{Error, Result};

/// A single scored segment of a video.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// Position of the segment inside its video.
    pub index: usize,
    pub name: String,
    pub score: f32,
}

impl Segment {
    /// Parses a segment key of the form `"<index>_<name>"`.
    ///
    /// `name` is everything after the first underscore, so `"3_shot_12"` is named `shot_12`
    /// rather than being cut at the second underscore.
    fn parse_key(key: &str, score: f32) -> Result<Self> {
        let (index, name) = key
            .split_once('_')
            .ok_or_else(|| Error::InvalidSegmentKey(key.to_owned()))?;
        let index = index
            .parse::<usize>()
            .map_err(|_| Error::InvalidSegmentKey(key.to_owned()))?;
        if name.is_empty() {
            return Err(Error::InvalidSegmentKey(key.to_owned()));
        }
        Ok(Self {
            index,
            name: name.to_owned(),
            score,
        })
    }
}

/// Prediction scores for a set of videos, keyed by video name and then by segment key.
///
/// Segment keys have the form `"<index>_<name>"`, where `index` gives the position of the
/// segment inside its video.
///
/// On disk, a store is either JSON (for paths ending in `.json`) or bincode.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PredictionStore {
    videos: BTreeMap<String, BTreeMap<String, f32>>,
}

impl PredictionStore {
    /// Load a prediction store from a path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::PredictionDataNotFound(path.to_owned()));
        }
        let f = std::io::BufReader::new(std::fs::File::open(path)?);
        let store: Self = if crate::util::is_json_path(path) {
            serde_json::from_reader(f)?
        } else {
            bincode::deserialize_from(f)?
        };
        tracing::debug!(
            videos = store.videos.len(),
            segments = store.len(),
            "loaded predictions from {}",
            path.display()
        );
        Ok(store)
    }

    /// Write this store to `path`, using the format implied by its extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut f = std::io::BufWriter::new(std::fs::File::create(path)?);
        if crate::util::is_json_path(path) {
            serde_json::to_writer_pretty(&mut f, self)?;
        } else {
            bincode::serialize_into(&mut f, self)?;
        }
        Ok(())
    }

    /// Record the score for one segment of a video.
    pub fn insert(&mut self, video: impl Into<String>, segment_key: impl Into<String>, score: f32) {
        self.videos
            .entry(video.into())
            .or_default()
            .insert(segment_key.into(), score);
    }

    /// Returns the video names in sorted order.
    pub fn videos(&self) -> impl Iterator<Item = &str> {
        self.videos.keys().map(String::as_str)
    }

    /// Total number of segments across all videos.
    pub fn len(&self) -> usize {
        self.videos.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every score of a single video, in no particular order.
    pub fn scores(&self, video: &str) -> Result<Vec<f32>> {
        self.videos
            .get(video)
            .map(|segments| segments.values().copied().collect())
            .ok_or_else(|| Error::VideoNotFound(video.to_owned()))
    }

    /// Returns every score of every video, in no particular order.
    pub fn all_scores(&self) -> Vec<f32> {
        self.videos
            .values()
            .flat_map(|segments| segments.values().copied())
            .collect()
    }

    /// Returns the segments of a video ordered by segment index.
    pub fn segments(&self, video: &str) -> Result<Vec<Segment>> {
        let segments = self
            .videos
            .get(video)
            .ok_or_else(|| Error::VideoNotFound(video.to_owned()))?;
        let mut parsed = segments
            .iter()
            .map(|(key, &score)| Segment::parse_key(key, score))
            .collect::<Result<Vec<_>>>()?;
        parsed.sort_by_key(|s| s.index);
        Ok(parsed)
    }
}

/// Per-video thresholds persisted alongside a prediction store.
///
/// Thresholds are grouped by the detector configuration that produced them. The MD5 hash
/// of the prediction file is stored so that stale thresholds can be detected.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ThresholdFile {
    pub(crate) md5: String,
    pub(crate) groups: BTreeMap<String, BTreeMap<String, Threshold>>,
}

impl ThresholdFile {
    /// Returns the threshold file path for the given prediction file.
    pub fn path_for(predictions: impl AsRef<Path>) -> PathBuf {
        predictions
            .as_ref()
            .with_extension(super::THRESHOLD_FILE_EXT)
    }

    /// Load a threshold file. Returns `None` if it does not exist.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let f = std::fs::File::open(path)?;
        Ok(Some(serde_json::from_reader(&f)?))
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut f = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(&mut f, self)?;
        Ok(())
    }

    pub fn md5(&self) -> &str {
        &self.md5
    }

    /// Returns the thresholds stored under `group`, keyed by video name.
    pub fn group(&self, group: &str) -> Option<&BTreeMap<String, Threshold>> {
        self.groups.get(group)
    }
}
