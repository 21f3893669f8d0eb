//! Mean imputation followed by standard scaling

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fitted statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    /// Imputation value and centering offset
    pub mean: f64,
    /// Population standard deviation of the imputed column, or 1.0 when it
    /// is zero so a constant column stays at 0 after centering
    pub scale: f64,
}

impl NumericColumn {
    /// Fit from the column's values; `None` marks a missing cell.
    pub fn fit(name: &str, values: &[Option<f64>]) -> Self {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let mean = if present.is_empty() {
            warn!(column = name, "Numeric column has no observed values, imputing 0.0");
            0.0
        } else {
            present.iter().sum::<f64>() / present.len() as f64
        };

        let scale = if values.is_empty() {
            1.0
        } else {
            // Missing cells sit at the mean and contribute nothing to the
            // squared deviations, but still count towards n.
            let sum_sq: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
            let std = (sum_sq / values.len() as f64).sqrt();
            if std > 0.0 && std.is_finite() {
                std
            } else {
                1.0
            }
        };

        Self {
            name: name.to_string(),
            mean,
            scale,
        }
    }

    pub fn transform(&self, value: Option<f64>) -> f64 {
        let x = value.unwrap_or(self.mean);
        (x - self.mean) / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_population_std() {
        let col = NumericColumn::fit(
            "x",
            &[Some(2.0), Some(4.0), Some(4.0), Some(4.0), Some(5.0), Some(5.0), Some(7.0), Some(9.0)],
        );
        assert_eq!(col.mean, 5.0);
        assert!((col.scale - 2.0).abs() < 1e-12);
        assert_eq!(col.transform(Some(7.0)), 1.0);
    }

    #[test]
    fn test_missing_imputed_with_mean() {
        let col = NumericColumn::fit("x", &[Some(1.0), None, Some(3.0)]);
        assert_eq!(col.mean, 2.0);
        assert_eq!(col.transform(None), 0.0);
    }

    #[test]
    fn test_constant_column_never_divides_by_zero() {
        let col = NumericColumn::fit("x", &[Some(3.0), Some(3.0), Some(3.0)]);
        assert_eq!(col.scale, 1.0);
        assert_eq!(col.transform(Some(3.0)), 0.0);
        assert_eq!(col.transform(Some(5.0)), 2.0);
    }

    #[test]
    fn test_all_missing_column() {
        let col = NumericColumn::fit("x", &[None, None]);
        assert_eq!(col.mean, 0.0);
        assert_eq!(col.scale, 1.0);
        assert_eq!(col.transform(None), 0.0);
    }
}
