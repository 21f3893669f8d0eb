//! Most-frequent imputation followed by one-hot encoding

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNKNOWN_SLOT: &str = "<unknown>";

/// Fitted vocabulary for one categorical column.
///
/// The encoded block has one slot per category in first-seen order,
/// followed by a single unknown slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub categories: Vec<String>,
    /// Imputation value; `None` when the column was never observed
    pub mode: Option<String>,
}

impl CategoricalColumn {
    pub fn fit(name: &str, values: &[Option<&str>]) -> Self {
        let mut categories: Vec<String> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();

        for &value in values.iter().flatten() {
            let count = counts.entry(value).or_insert(0);
            if *count == 0 {
                categories.push(value.to_string());
            }
            *count += 1;
        }

        // Ties go to the lexicographically smallest value.
        let mode = counts
            .iter()
            .max_by(|(a_val, a_n), (b_val, b_n)| a_n.cmp(b_n).then_with(|| b_val.cmp(a_val)))
            .map(|(v, _)| v.to_string());

        Self {
            name: name.to_string(),
            categories,
            mode,
        }
    }

    /// Width of the encoded block including the unknown slot.
    pub fn width(&self) -> usize {
        self.categories.len() + 1
    }

    /// Append this column's one-hot block to `out`.
    pub fn encode_into(&self, value: Option<&str>, out: &mut Vec<f64>) {
        let start = out.len();
        out.resize(start + self.width(), 0.0);

        let resolved = value.or(self.mode.as_deref());
        let slot = resolved
            .and_then(|v| self.categories.iter().position(|c| c == v))
            .unwrap_or(self.categories.len());
        out[start + slot] = 1.0;
    }

    pub fn slot_names(&self) -> impl Iterator<Item = String> + '_ {
        self.categories
            .iter()
            .map(move |c| format!("{}={}", self.name, c))
            .chain(std::iter::once(format!("{}={}", self.name, UNKNOWN_SLOT)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn needle() -> CategoricalColumn {
        CategoricalColumn::fit(
            "Needle",
            &[Some("25G"), Some("22G"), Some("25G"), None, Some("27G")],
        )
    }

    #[test]
    fn test_first_seen_order() {
        assert_eq!(needle().categories, vec!["25G", "22G", "27G"]);
        assert_eq!(needle().width(), 4);
    }

    #[test]
    fn test_mode() {
        assert_eq!(needle().mode.as_deref(), Some("25G"));
    }

    #[test]
    fn test_mode_tie_breaks_lexicographically() {
        let col = CategoricalColumn::fit("g", &[Some("b"), Some("a"), Some("b"), Some("a")]);
        assert_eq!(col.mode.as_deref(), Some("a"));
    }

    #[test]
    fn test_known_category_encoding() {
        let mut out = vec![9.0];
        needle().encode_into(Some("22G"), &mut out);
        assert_eq!(out, vec![9.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unknown_category_hits_only_unknown_slot() {
        let mut out = Vec::new();
        needle().encode_into(Some("30G"), &mut out);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_missing_imputed_with_mode() {
        let mut out = Vec::new();
        needle().encode_into(None, &mut out);
        assert_eq!(out, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_never_observed_column_uses_unknown_slot() {
        let col = CategoricalColumn::fit("g", &[None, None]);
        let mut out = Vec::new();
        col.encode_into(None, &mut out);
        assert_eq!(out, vec![1.0]);
    }

    #[test]
    fn test_slot_names() {
        let names: Vec<String> = needle().slot_names().collect();
        assert_eq!(
            names,
            vec!["Needle=25G", "Needle=22G", "Needle=27G", "Needle=<unknown>"]
        );
    }
}
