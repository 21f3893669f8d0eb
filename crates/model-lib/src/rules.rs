//! Rule-override policy table
//!
//! Domain rules that short-circuit the model for inputs with a known
//! outcome. Entries are evaluated in order against the validated raw record
//! and the first match wins.

use crate::models::{FeatureValue, OutputRecord, OutputValue, RawRecord};
use crate::schema::Task;
use serde::Serialize;

/// Predicate over a single raw feature value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RuleCondition {
    Equals { feature: &'static str, value: f64 },
    LessThan { feature: &'static str, value: f64 },
    GreaterThan { feature: &'static str, value: f64 },
}

impl RuleCondition {
    /// Missing or non-numeric values never match.
    pub fn matches(&self, record: &RawRecord) -> bool {
        let Some(x) = record.get(self.feature()).and_then(FeatureValue::as_number) else {
            return false;
        };
        match *self {
            RuleCondition::Equals { value, .. } => x == value,
            RuleCondition::LessThan { value, .. } => x < value,
            RuleCondition::GreaterThan { value, .. } => x > value,
        }
    }

    pub fn feature(&self) -> &'static str {
        match *self {
            RuleCondition::Equals { feature, .. }
            | RuleCondition::LessThan { feature, .. }
            | RuleCondition::GreaterThan { feature, .. } => feature,
        }
    }
}

/// Fixed outputs produced when a rule fires.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub outputs: Vec<(&'static str, OutputValue)>,
}

impl RuleOutcome {
    pub fn label(target: &'static str, label: u8) -> Self {
        Self {
            outputs: vec![(target, OutputValue::Label(label))],
        }
    }

    pub fn to_record(&self) -> OutputRecord {
        let mut record = OutputRecord::new();
        for (name, value) in &self.outputs {
            record.push(*name, *value);
        }
        record
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverrideRule {
    pub name: &'static str,
    pub condition: RuleCondition,
    pub outcome: RuleOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RulePolicy {
    rules: Vec<OverrideRule>,
}

impl RulePolicy {
    pub fn new(rules: Vec<OverrideRule>) -> Self {
        Self { rules }
    }

    pub fn for_task(task: Task) -> Self {
        match task {
            Task::Printability => Self::new(vec![
                OverrideRule {
                    name: "no_gelation_time",
                    condition: RuleCondition::Equals {
                        feature: "TG_min",
                        value: 0.0,
                    },
                    outcome: RuleOutcome::label("Printable", 0),
                },
                OverrideRule {
                    name: "no_print_speed",
                    condition: RuleCondition::Equals {
                        feature: "PS",
                        value: 0.0,
                    },
                    outcome: RuleOutcome::label("Printable", 0),
                },
            ]),
            Task::Degradation => Self::default(),
        }
    }

    /// First matching rule, if any.
    pub fn evaluate(&self, record: &RawRecord) -> Option<&OverrideRule> {
        self.rules.iter().find(|r| r.condition.matches(record))
    }

    pub fn rules(&self) -> &[OverrideRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printable_record(tg_min: f64, ps: f64) -> RawRecord {
        RawRecord::new()
            .with("Gelatin_pct", 15.0)
            .with("PS", ps)
            .with("TG_min", tg_min)
    }

    #[test]
    fn test_zero_gelation_time_fires() {
        let policy = RulePolicy::for_task(Task::Printability);
        let rule = policy.evaluate(&printable_record(0.0, 10.0)).unwrap();
        assert_eq!(rule.name, "no_gelation_time");
        assert_eq!(
            rule.outcome.to_record().get("Printable"),
            Some(OutputValue::Label(0))
        );
    }

    #[test]
    fn test_zero_print_speed_fires() {
        let policy = RulePolicy::for_task(Task::Printability);
        let rule = policy.evaluate(&printable_record(5.0, 0.0)).unwrap();
        assert_eq!(rule.name, "no_print_speed");
    }

    #[test]
    fn test_first_match_wins() {
        let policy = RulePolicy::for_task(Task::Printability);
        let rule = policy.evaluate(&printable_record(0.0, 0.0)).unwrap();
        assert_eq!(rule.name, "no_gelation_time");
    }

    #[test]
    fn test_no_match() {
        let policy = RulePolicy::for_task(Task::Printability);
        assert!(policy.evaluate(&printable_record(6.0, 10.0)).is_none());
    }

    #[test]
    fn test_missing_value_never_matches() {
        let policy = RulePolicy::for_task(Task::Printability);
        let record = printable_record(6.0, 10.0).with("TG_min", FeatureValue::Missing);
        assert!(policy.evaluate(&record).is_none());
    }

    #[test]
    fn test_degradation_has_no_rules() {
        assert!(RulePolicy::for_task(Task::Degradation).is_empty());
    }

    #[test]
    fn test_threshold_conditions() {
        let record = RawRecord::new().with("x", 3.0);
        assert!(RuleCondition::LessThan { feature: "x", value: 4.0 }.matches(&record));
        assert!(!RuleCondition::GreaterThan { feature: "x", value: 4.0 }.matches(&record));
        assert!(!RuleCondition::Equals { feature: "y", value: 3.0 }.matches(&record));
    }
}
