//! Tabular preprocessing
//!
//! Turns raw records into fixed-length encoded vectors. Numeric columns are
//! mean-imputed and standard-scaled; categorical columns are mode-imputed and
//! one-hot encoded against the vocabulary seen at fit time, with one
//! reserved unknown slot per column.
//!
//! Output layout: all numeric columns in declaration order, then each
//! categorical block in declaration order. The layout is captured at fit
//! time and reproduced exactly by every later `transform`.

mod categorical;
mod numeric;

pub use categorical::{CategoricalColumn, UNKNOWN_SLOT};
pub use numeric::NumericColumn;

use crate::error::{ModelError, Result};
use crate::models::{EncodedVector, FeatureValue, RawRecord};
use crate::schema::TaskSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Trained statistics for every column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedState {
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    #[serde(default)]
    fitted: Option<FittedState>,
}

impl Preprocessor {
    /// Create an untrained preprocessor for the schema's column layout.
    pub fn new(schema: &TaskSchema) -> Self {
        Self {
            numeric_columns: schema.numeric_columns().iter().map(|s| s.to_string()).collect(),
            categorical_columns: schema
                .categorical_columns()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fitted: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn fitted_state(&self) -> Option<&FittedState> {
        self.fitted.as_ref()
    }

    /// Fit column statistics from a training batch.
    pub fn fit(&mut self, batch: &[RawRecord]) -> Result<&FittedState> {
        if self.fitted.is_some() {
            return Err(ModelError::AlreadyFitted);
        }
        if batch.is_empty() {
            return Err(ModelError::dataset("cannot fit preprocessor on an empty batch"));
        }

        let mut numeric = Vec::with_capacity(self.numeric_columns.len());
        for name in &self.numeric_columns {
            let values = batch
                .iter()
                .map(|r| numeric_cell(r, name))
                .collect::<Result<Vec<_>>>()?;
            numeric.push(NumericColumn::fit(name, &values));
        }

        let mut categorical = Vec::with_capacity(self.categorical_columns.len());
        for name in &self.categorical_columns {
            let values = batch
                .iter()
                .map(|r| text_cell(r, name))
                .collect::<Result<Vec<_>>>()?;
            categorical.push(CategoricalColumn::fit(name, &values));
        }

        let state = FittedState {
            numeric,
            categorical,
        };
        info!(
            rows = batch.len(),
            numeric_columns = state.numeric.len(),
            categorical_columns = state.categorical.len(),
            output_width = width_of(&state),
            "Fitted preprocessor"
        );
        let state = self.fitted.insert(state);
        Ok(&*state)
    }

    /// Encode one record. Keys are looked up by fitted column name, so the
    /// record's own key order never matters.
    pub fn transform_one(&self, record: &RawRecord) -> Result<EncodedVector> {
        let state = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let mut out = Vec::with_capacity(width_of(state));

        for column in &state.numeric {
            out.push(column.transform(numeric_cell(record, &column.name)?));
        }
        for column in &state.categorical {
            column.encode_into(text_cell(record, &column.name)?, &mut out);
        }
        Ok(EncodedVector::new(out))
    }

    pub fn transform(&self, records: &[RawRecord]) -> Result<Vec<EncodedVector>> {
        records.iter().map(|r| self.transform_one(r)).collect()
    }

    /// Length of every encoded vector.
    pub fn output_width(&self) -> Result<usize> {
        self.fitted.as_ref().map(width_of).ok_or(ModelError::NotFitted)
    }

    /// Names of the encoded slots, in vector order.
    pub fn feature_names_out(&self) -> Result<Vec<String>> {
        let state = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let mut names: Vec<String> = state.numeric.iter().map(|c| c.name.clone()).collect();
        for column in &state.categorical {
            names.extend(column.slot_names());
        }
        Ok(names)
    }

    /// Input columns in the order they are encoded.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .map(String::as_str)
    }

    /// Verify this preprocessor was built for `schema`'s column layout.
    pub fn check_schema(&self, schema: &TaskSchema) -> Result<()> {
        let state = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let fitted_numeric: Vec<&str> = state.numeric.iter().map(|c| c.name.as_str()).collect();
        let fitted_categorical: Vec<&str> =
            state.categorical.iter().map(|c| c.name.as_str()).collect();

        if fitted_numeric != schema.numeric_columns() {
            return Err(ModelError::schema_mismatch(format!(
                "numeric columns {:?} do not match schema {:?}",
                fitted_numeric,
                schema.numeric_columns()
            )));
        }
        if fitted_categorical != schema.categorical_columns() {
            return Err(ModelError::schema_mismatch(format!(
                "categorical columns {:?} do not match schema {:?}",
                fitted_categorical,
                schema.categorical_columns()
            )));
        }
        Ok(())
    }
}

fn width_of(state: &FittedState) -> usize {
    state.numeric.len() + state.categorical.iter().map(|c| c.width()).sum::<usize>()
}

fn numeric_cell(record: &RawRecord, name: &str) -> Result<Option<f64>> {
    match record.get(name) {
        Some(FeatureValue::Number(v)) => Ok(Some(*v)),
        Some(FeatureValue::Missing) => Ok(None),
        Some(FeatureValue::Text(_)) => Err(ModelError::schema_mismatch(format!(
            "column '{}' expects a number",
            name
        ))),
        None => Err(ModelError::schema_mismatch(format!(
            "record is missing column '{}'",
            name
        ))),
    }
}

fn text_cell<'a>(record: &'a RawRecord, name: &str) -> Result<Option<&'a str>> {
    match record.get(name) {
        Some(FeatureValue::Text(s)) => Ok(Some(s.as_str())),
        Some(FeatureValue::Missing) => Ok(None),
        Some(FeatureValue::Number(_)) => Err(ModelError::schema_mismatch(format!(
            "column '{}' expects text",
            name
        ))),
        None => Err(ModelError::schema_mismatch(format!(
            "record is missing column '{}'",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Task;
    use proptest::prelude::*;

    const GEOMETRIES: [&str; 2] = ["Body Centered", "Body Centered Cubic"];

    /// 20 synthetic degradation records: porosity 40..59 (mean 49.5),
    /// alternating geometry.
    fn training_batch() -> Vec<RawRecord> {
        (0..20)
            .map(|i| {
                RawRecord::new()
                    .with("Scaffold_Geometry", GEOMETRIES[i % 2])
                    .with("Porosity_Percentage", 40.0 + i as f64)
                    .with("Immersion_Time_Days", (i * 7) as f64)
                    .with("Mechanical_Loading", (i % 2) as f64)
            })
            .collect()
    }

    fn fitted() -> Preprocessor {
        let schema = TaskSchema::for_task(Task::Degradation);
        let mut pre = Preprocessor::new(&schema);
        pre.fit(&training_batch()).unwrap();
        pre
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let pre = Preprocessor::new(&TaskSchema::for_task(Task::Degradation));
        let err = pre.transform_one(&training_batch()[0]).unwrap_err();
        assert!(matches!(err, ModelError::NotFitted));
        assert!(matches!(pre.output_width(), Err(ModelError::NotFitted)));
    }

    #[test]
    fn test_refit_rejected() {
        let mut pre = fitted();
        assert!(matches!(
            pre.fit(&training_batch()),
            Err(ModelError::AlreadyFitted)
        ));
    }

    #[test]
    fn test_empty_batch_rejected() {
        let mut pre = Preprocessor::new(&TaskSchema::for_task(Task::Degradation));
        assert!(matches!(pre.fit(&[]), Err(ModelError::Dataset(_))));
    }

    #[test]
    fn test_output_layout() {
        let pre = fitted();
        assert_eq!(pre.output_width().unwrap(), 3 + 3);
        assert_eq!(
            pre.feature_names_out().unwrap(),
            vec![
                "Porosity_Percentage",
                "Immersion_Time_Days",
                "Mechanical_Loading",
                "Scaffold_Geometry=Body Centered",
                "Scaffold_Geometry=Body Centered Cubic",
                "Scaffold_Geometry=<unknown>",
            ]
        );
    }

    #[test]
    fn test_round_trip_mean_value_and_known_category() {
        let pre = fitted();
        let held_out = RawRecord::new()
            .with("Scaffold_Geometry", "Body Centered Cubic")
            .with("Porosity_Percentage", 49.5)
            .with("Immersion_Time_Days", 70.0)
            .with("Mechanical_Loading", 1.0);
        let v = pre.transform_one(&held_out).unwrap();
        assert_eq!(v.as_slice()[0], 0.0);
        assert_eq!(v.as_slice()[3], 0.0);
        assert_eq!(v.as_slice()[4], 1.0);
        assert_eq!(v.as_slice()[5], 0.0);
    }

    #[test]
    fn test_padded_known_category_encodes_to_its_slot() {
        let schema = TaskSchema::for_task(Task::Degradation);
        let pre = fitted();
        let record = training_batch()[0]
            .clone()
            .with("Scaffold_Geometry", "Body Centered ");
        let validated = crate::validation::Validator::new(&schema)
            .validate(&record)
            .unwrap();
        let v = pre.transform_one(&validated).unwrap();
        assert_eq!(&v.as_slice()[3..], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unknown_category_activates_only_unknown_slot() {
        let pre = fitted();
        let record = training_batch()[0].clone().with("Scaffold_Geometry", "Gyroid");
        let v = pre.transform_one(&record).unwrap();
        assert_eq!(&v.as_slice()[3..], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_missing_numeric_imputed_to_zero_after_scaling() {
        let pre = fitted();
        let record = training_batch()[3]
            .clone()
            .with("Porosity_Percentage", FeatureValue::Missing);
        let v = pre.transform_one(&record).unwrap();
        assert_eq!(v.as_slice()[0], 0.0);
    }

    #[test]
    fn test_absent_column_is_schema_mismatch() {
        let pre = fitted();
        let mut record = training_batch()[0].clone();
        record.remove("Scaffold_Geometry");
        assert!(matches!(
            pre.transform_one(&record),
            Err(ModelError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_check_schema() {
        let pre = fitted();
        assert!(pre.check_schema(&TaskSchema::for_task(Task::Degradation)).is_ok());
        assert!(matches!(
            pre.check_schema(&TaskSchema::for_task(Task::Printability)),
            Err(ModelError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_serde_round_trip_keeps_state() {
        let pre = fitted();
        let json = serde_json::to_string(&pre).unwrap();
        let restored: Preprocessor = serde_json::from_str(&json).unwrap();
        let record = training_batch()[5].clone();
        assert_eq!(
            pre.transform_one(&record).unwrap(),
            restored.transform_one(&record).unwrap()
        );
    }

    #[test]
    fn test_deserialized_without_state_is_not_fitted() {
        let json = r#"{"numeric_columns":["x"],"categorical_columns":[]}"#;
        let pre: Preprocessor = serde_json::from_str(json).unwrap();
        let record = RawRecord::new().with("x", 1.0);
        assert!(matches!(pre.transform_one(&record), Err(ModelError::NotFitted)));
    }

    proptest! {
        #[test]
        fn transform_is_idempotent_and_order_independent(
            porosity in 0.0f64..100.0,
            days in 0.0f64..150.0,
            loading in 0u8..2,
            geometry in 0usize..3,
            rotate in 0usize..4,
        ) {
            let pre = fitted();
            let geometry = ["Body Centered", "Body Centered Cubic", "Lattice"][geometry];
            let mut entries: Vec<(&str, FeatureValue)> = vec![
                ("Scaffold_Geometry", geometry.into()),
                ("Porosity_Percentage", porosity.into()),
                ("Immersion_Time_Days", days.into()),
                ("Mechanical_Loading", (loading as f64).into()),
            ];
            let forward: RawRecord = entries.clone().into_iter().collect();
            entries.rotate_left(rotate);
            entries.reverse();
            let permuted: RawRecord = entries.into_iter().collect();

            let first = pre.transform_one(&forward).unwrap();
            let second = pre.transform_one(&forward).unwrap();
            let third = pre.transform_one(&permuted).unwrap();
            prop_assert_eq!(first.as_slice(), second.as_slice());
            prop_assert_eq!(first.as_slice(), third.as_slice());
        }
    }
}
