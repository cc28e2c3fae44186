use std::collections::BTreeMap;
use std::fmt::Display;

use crate::{Error, Result};

/// Class weighting scheme used to compensate for class imbalance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassWeight {
    /// Every class gets a weight of 1.
    Uniform,
    /// `n_samples / (n_classes * count(class))`.
    Balanced,
    /// Reciprocal class frequency divided by its mean. The weights sum to the number of
    /// classes.
    Auto,
}

/// Counts the occurrences of each class in `labels`.
///
/// The result has one entry per class, in `classes` order. Fails if a label is not one of
/// the classes.
pub fn class_counts<L: Ord + Display>(classes: &[L], labels: &[L]) -> Result<Vec<usize>> {
    if classes.is_empty() {
        return Err(Error::NoClasses);
    }

    let index: BTreeMap<&L, usize> = classes.iter().enumerate().map(|(i, c)| (c, i)).collect();
    let mut counts = vec![0usize; classes.len()];
    for label in labels {
        let i = index
            .get(label)
            .ok_or_else(|| Error::UnknownLabel(label.to_string()))?;
        counts[*i] += 1;
    }

    Ok(counts)
}

/// Computes one weight per class, in `classes` order.
///
/// Every label must be one of the classes. For [ClassWeight::Balanced] and
/// [ClassWeight::Auto], every class must also occur at least once in `labels`.
pub fn compute_class_weight<L: Ord + Display>(
    mode: ClassWeight,
    classes: &[L],
    labels: &[L],
) -> Result<Vec<f64>> {
    let counts = class_counts(classes, labels)?;
    if mode != ClassWeight::Uniform {
        if let Some(missing) = counts.iter().position(|&c| c == 0) {
            return Err(Error::ClassNotPresent(classes[missing].to_string()));
        }
    }

    let weights = match mode {
        ClassWeight::Uniform => vec![1.0; classes.len()],
        ClassWeight::Balanced => {
            let n_samples = labels.len() as f64;
            let n_classes = classes.len() as f64;
            counts
                .iter()
                .map(|&c| n_samples / (n_classes * c as f64))
                .collect()
        }
        ClassWeight::Auto => {
            let reciprocal: Vec<f64> = counts.iter().map(|&c| 1.0 / c as f64).collect();
            let mean = reciprocal.iter().sum::<f64>() / reciprocal.len() as f64;
            reciprocal.iter().map(|r| r / mean).collect()
        }
    };

    tracing::debug!(?mode, ?counts, "computed class weights");

    Ok(weights)
}
