//! Binary classification scores. Labels and predictions are 0.0 / 1.0.

use ndarray::Array1;

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| (**t > 0.5) == (**p > 0.5)).count();
    hits as f64 / y_true.len() as f64
}

/// F1 of the positive class; 0 when precision or recall is undefined.
pub fn f1_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t > 0.5, p > 0.5) {
            (true, true)   => tp += 1,
            (false, true)  => fp += 1,
            (true, false)  => fn_ += 1,
            (false, false) => {}
        }
    }
    let denom = 2 * tp + fp + fn_;
    if tp == 0 || denom == 0 {
        return 0.0;
    }
    (2 * tp) as f64 / denom as f64
}

/// Area under the ROC curve as the Mann-Whitney statistic, with tied
/// scores given their average rank. None when only one class is present.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; order.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based.
        let avg = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = avg;
        }
        start = end + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();
    let n_pos_f = n_pos as f64;
    Some((pos_rank_sum - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn f1_and_accuracy_on_known_confusion() {
        // tp=2 fp=1 fn=1 tn=1
        let y = array![1.0, 1.0, 1.0, 0.0, 0.0];
        let p = array![1.0, 1.0, 0.0, 1.0, 0.0];
        assert!((f1_score(&y, &p) - 4.0 / 6.0).abs() < 1e-12);
        assert!((accuracy(&y, &p) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn f1_is_zero_without_positive_predictions() {
        let y = array![1.0, 0.0];
        let p = array![0.0, 0.0];
        assert_eq!(f1_score(&y, &p), 0.0);
    }

    #[test]
    fn auc_handles_perfect_ties_and_single_class() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &array![0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&y, &array![0.5, 0.5, 0.5, 0.5]), Some(0.5));
        assert_eq!(roc_auc(&array![1.0, 1.0], &array![0.3, 0.4]), None);
    }
}
