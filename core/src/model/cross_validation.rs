//! Stratified splitting.
//!
//! Both splitters keep each class's share roughly equal across partitions.
//! Shuffling draws from the trainer's StageRng only, so a fixed run seed
//! always yields the same partitions.

use crate::{
    error::{PipelineError, PipelineResult},
    rng::StageRng,
};
use ndarray::Array1;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test:  Vec<usize>,
}

/// Row indices grouped by label, each group shuffled.
fn shuffled_classes(y: &Array1<f64>, rng: &mut StageRng) -> BTreeMap<i64, Vec<usize>> {
    let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in y.iter().enumerate() {
        classes.entry(label.round() as i64).or_default().push(idx);
    }
    for members in classes.values_mut() {
        rng.shuffle(members);
    }
    classes
}

/// Deal rows of each class round-robin into `k` folds. The deal position
/// carries over between classes so fold sizes differ by at most one.
pub fn stratified_k_fold(y: &Array1<f64>, k: usize, rng: &mut StageRng) -> PipelineResult<Vec<Fold>> {
    if k < 2 || y.len() < k {
        return Err(PipelineError::InsufficientData {
            what:   "cross-validation rows",
            needed: k.max(2),
            actual: y.len(),
        });
    }

    let mut assignment = vec![0usize; y.len()];
    let mut dealt = 0usize;
    for members in shuffled_classes(y, rng).into_values() {
        for idx in members {
            assignment[idx] = dealt % k;
            dealt += 1;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| assignment[i] == fold);
            Fold { train, test }
        })
        .collect())
}

/// Hold out `test_fraction` of each class.
pub fn stratified_split(y: &Array1<f64>, test_fraction: f64, rng: &mut StageRng) -> PipelineResult<Fold> {
    let mut train = Vec::new();
    let mut test = Vec::new();

    for members in shuffled_classes(y, rng).into_values() {
        let n_test = ((members.len() as f64) * test_fraction).round() as usize;
        let (held, kept) = members.split_at(n_test.min(members.len()));
        test.extend_from_slice(held);
        train.extend_from_slice(kept);
    }

    if train.is_empty() || test.is_empty() {
        return Err(PipelineError::InsufficientData {
            what:   "train/test split rows",
            needed: 2,
            actual: y.len(),
        });
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Fold { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, StageSlot};

    fn labels(pos: usize, neg: usize) -> Array1<f64> {
        (0..pos + neg).map(|i| if i < pos { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn k_fold_partitions_every_row_once_and_keeps_class_balance() {
        let y = labels(10, 20);
        let mut rng = RngBank::new(1).for_stage(StageSlot::Trainer);
        let folds = stratified_k_fold(&y, 5, &mut rng).unwrap();

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..30).collect::<Vec<_>>());

        for fold in &folds {
            assert_eq!(fold.test.len(), 6);
            assert_eq!(fold.train.len(), 24);
            let pos = fold.test.iter().filter(|&&i| y[i] > 0.5).count();
            assert_eq!(pos, 2, "each fold should hold a fifth of the positives");
        }
    }

    #[test]
    fn split_holds_out_fraction_per_class() {
        let y = labels(8, 12);
        let mut rng = RngBank::new(3).for_stage(StageSlot::Trainer);
        let fold = stratified_split(&y, 0.25, &mut rng).unwrap();
        assert_eq!(fold.test.len(), 5);
        assert_eq!(fold.train.len(), 15);
        assert_eq!(fold.test.iter().filter(|&&i| y[i] > 0.5).count(), 2);
    }

    #[test]
    fn split_rejects_too_few_rows() {
        let y = labels(1, 0);
        let mut rng = RngBank::new(3).for_stage(StageSlot::Trainer);
        assert!(stratified_split(&y, 0.25, &mut rng).is_err());
    }
}
