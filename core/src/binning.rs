//! Binning of continuous customer traits.
//!
//!   income, membership duration : quantile bins (equal population)
//!   age                         : fixed edges
//!
//! Intervals are right-closed. Quantile bins also include their lowest
//! edge so the minimum value is never left without a bin.

use crate::{
    config::BinningConfig,
    error::{PipelineError, PipelineResult},
    view_detection::AttributedOffer,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Binner {
    edges:          Vec<f64>,
    include_lowest: bool,
}

impl Binner {
    /// Bins (e0, e1], (e1, e2], ... ; values outside get no bin.
    pub fn fixed(edges: &[f64]) -> Self {
        Self { edges: edges.to_vec(), include_lowest: false }
    }

    /// Edges at the given quantiles of `values`. Repeated edges collapse,
    /// so heavily tied data yields fewer bins. None when `values` is empty.
    pub fn quantile(values: &[f64], quantiles: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let mut edges: Vec<f64> = quantiles.iter().map(|&q| quantile(&sorted, q)).collect();
        edges.dedup();
        Some(Self { edges, include_lowest: true })
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn bin_count(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    /// Zero-based bin of `value`.
    pub fn assign(&self, value: f64) -> Option<usize> {
        if value.is_nan() || self.edges.len() < 2 {
            return None;
        }
        if self.include_lowest && value == self.edges[0] {
            return Some(0);
        }
        self.edges
            .windows(2)
            .position(|w| w[0] < value && value <= w[1])
    }

    /// `prefix_g<n>` label, numbered from 1 in ascending order.
    pub fn label(&self, prefix: &str, value: f64) -> Option<String> {
        self.assign(value).map(|idx| format!("{prefix}_g{}", idx + 1))
    }
}

/// Linear-interpolated quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Binners fitted to one attributed table.
#[derive(Debug, Clone, PartialEq)]
pub struct BinningPlan {
    pub income:     Binner,
    pub age:        Binner,
    pub membership: Binner,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowBins {
    pub income:     Option<String>,
    pub age:        Option<String>,
    pub membership: Option<String>,
}

impl BinningPlan {
    pub fn fit(rows: &[AttributedOffer], config: &BinningConfig) -> PipelineResult<Self> {
        let incomes: Vec<f64> = rows.iter().map(|r| r.income).collect();
        let durations: Vec<f64> = rows.iter().map(|r| f64::from(r.membership_days)).collect();

        let empty = || PipelineError::InsufficientData {
            what:   "quantile binning",
            needed: 1,
            actual: 0,
        };

        Ok(Self {
            income:     Binner::quantile(&incomes, &config.quantiles).ok_or_else(empty)?,
            age:        Binner::fixed(&config.age_edges),
            membership: Binner::quantile(&durations, &config.quantiles).ok_or_else(empty)?,
        })
    }

    pub fn bins_for(&self, row: &AttributedOffer) -> RowBins {
        RowBins {
            income:     self.income.label("inc", row.income),
            age:        self.age.label("age", f64::from(row.age)),
            membership: self.membership.label("dur", f64::from(row.membership_days)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_interpolates_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&v, 0.0), 1.0);
        assert_eq!(quantile(&v, 1.0), 4.0);
        assert!((quantile(&v, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&v, 0.25) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn fixed_bins_are_right_closed_and_exclude_lowest_edge() {
        let age = Binner::fixed(&[17.0, 40.0, 60.0, 80.0, 102.0]);
        assert_eq!(age.assign(17.0), None);
        assert_eq!(age.assign(18.0), Some(0));
        assert_eq!(age.assign(40.0), Some(0));
        assert_eq!(age.assign(40.5), Some(1));
        assert_eq!(age.assign(102.0), Some(3));
        assert_eq!(age.assign(118.0), None);
        assert_eq!(age.label("age", 61.0).as_deref(), Some("age_g3"));
    }

    #[test]
    fn quantile_bins_include_minimum_and_split_evenly() {
        let values: Vec<f64> = (1..=8).map(f64::from).collect();
        let b = Binner::quantile(&values, &[0.0, 0.25, 0.5, 0.75, 1.0]).unwrap();
        assert_eq!(b.bin_count(), 4);
        let counts = values.iter().fold([0usize; 4], |mut acc, &v| {
            acc[b.assign(v).unwrap()] += 1;
            acc
        });
        assert_eq!(counts, [2, 2, 2, 2]);
    }

    #[test]
    fn tied_quantile_edges_collapse() {
        let values = [5.0, 5.0, 5.0, 5.0, 9.0];
        let b = Binner::quantile(&values, &[0.0, 0.25, 0.5, 0.75, 1.0]).unwrap();
        assert_eq!(b.edges(), &[5.0, 9.0]);
        assert_eq!(b.assign(5.0), Some(0));
        assert_eq!(b.assign(9.0), Some(0));
    }
}
