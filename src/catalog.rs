//! Question-set catalog: which dimensions exist, which family each belongs to,
//! and the canonical option domain the calculators enumerate.

use crate::error::{Result, SurveyError};
use crate::models::AnalysisRow;

/// Group key used when a summary is computed over the whole input.
pub const TOTAL_GROUP: &str = "_total";
/// Group key for rows whose grouping value is missing.
pub const UNKNOWN_GROUP: &str = "unknown";

pub const GENDER: &str = "gender";
pub const AGE_GROUP: &str = "ageGroup";
pub const UNDERSTANDING: &str = "understanding";
pub const SATISFACTION: &str = "satisfaction";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Gender,
    AgeGroup,
    Understanding,
    Satisfaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionKind {
    Categorical,
    Numeric,
}

impl RowField {
    pub fn kind(&self) -> DimensionKind {
        match self {
            Self::Gender | Self::AgeGroup => DimensionKind::Categorical,
            Self::Understanding | Self::Satisfaction => DimensionKind::Numeric,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DimensionSpec {
    pub code: String,
    pub field: RowField,
    pub options: Vec<String>,
}

impl DimensionSpec {
    fn new(code: &str, field: RowField, options: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            field,
            options: options.iter().map(|option| option.to_string()).collect(),
        }
    }

    pub fn kind(&self) -> DimensionKind {
        self.field.kind()
    }

    /// Trimmed categorical value, `None` when blank or the field is numeric.
    pub fn categorical_value<'a>(&self, row: &'a AnalysisRow) -> Option<&'a str> {
        let value = match self.field {
            RowField::Gender => row.gender.trim(),
            RowField::AgeGroup => row.age_group.trim(),
            RowField::Understanding | RowField::Satisfaction => return None,
        };
        (!value.is_empty()).then_some(value)
    }

    /// Finite numeric value, `None` otherwise.
    pub fn numeric_value(&self, row: &AnalysisRow) -> Option<f64> {
        let value = match self.field {
            RowField::Understanding => row.understanding,
            RowField::Satisfaction => row.satisfaction,
            RowField::Gender | RowField::AgeGroup => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Index into `options` of the option this row falls into.
    pub fn option_index(&self, row: &AnalysisRow) -> Option<usize> {
        match self.kind() {
            DimensionKind::Categorical => {
                let value = self.categorical_value(row)?;
                self.options
                    .iter()
                    .position(|option| option.eq_ignore_ascii_case(value))
            }
            DimensionKind::Numeric => {
                let bucket = self.numeric_value(row)?.round();
                self.options
                    .iter()
                    .position(|option| option.parse::<f64>().ok() == Some(bucket))
            }
        }
    }

    pub fn contains_option(&self, value: &str) -> bool {
        self.options
            .iter()
            .any(|option| option.eq_ignore_ascii_case(value.trim()))
    }
}

/// Which statistics an analysis run produces.
#[derive(Debug, Clone)]
pub struct AnalysisPlan {
    pub simple: Vec<String>,
    pub cross: Vec<(String, String)>,
    /// `(target, group)`; a `None` group means ungrouped.
    pub summary: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone)]
pub struct SurveyCatalog {
    pub dimensions: Vec<DimensionSpec>,
    pub excluded_gender: String,
    pub rating_min: f64,
    pub rating_max: f64,
    pub plan: AnalysisPlan,
}

impl Default for SurveyCatalog {
    fn default() -> Self {
        let dimensions = vec![
            DimensionSpec::new(
                GENDER,
                RowField::Gender,
                &["male", "female", "other", "preferNotToSay"],
            ),
            DimensionSpec::new(
                AGE_GROUP,
                RowField::AgeGroup,
                &["under20", "20s", "30s", "40s", "50s", "60plus"],
            ),
            DimensionSpec::new(UNDERSTANDING, RowField::Understanding, &["1", "2", "3", "4", "5"]),
            DimensionSpec::new(SATISFACTION, RowField::Satisfaction, &["1", "2", "3", "4", "5"]),
        ];

        let codes: Vec<String> = dimensions.iter().map(|dim| dim.code.clone()).collect();
        let mut cross = Vec::new();
        for (i, first) in codes.iter().enumerate() {
            for second in codes.iter().skip(i + 1) {
                cross.push((first.clone(), second.clone()));
            }
        }

        let mut summary = Vec::new();
        for target in [UNDERSTANDING, SATISFACTION] {
            summary.push((target.to_string(), None));
            summary.push((target.to_string(), Some(GENDER.to_string())));
            summary.push((target.to_string(), Some(AGE_GROUP.to_string())));
        }

        Self {
            dimensions,
            excluded_gender: "preferNotToSay".to_string(),
            rating_min: 1.0,
            rating_max: 5.0,
            plan: AnalysisPlan {
                simple: codes,
                cross,
                summary,
            },
        }
    }
}

impl SurveyCatalog {
    pub fn dimension(&self, code: &str) -> Result<&DimensionSpec> {
        self.dimensions
            .iter()
            .find(|dim| dim.code == code)
            .ok_or_else(|| SurveyError::UnknownDimension(code.to_string()))
    }

    pub fn dimension_for(&self, field: RowField) -> Option<&DimensionSpec> {
        self.dimensions.iter().find(|dim| dim.field == field)
    }

    pub fn is_excluded_gender(&self, value: &str) -> bool {
        self.excluded_gender.eq_ignore_ascii_case(value.trim())
    }

    pub fn rating_in_range(&self, value: f64) -> bool {
        value.is_finite() && value >= self.rating_min && value <= self.rating_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(gender: &str, age_group: &str, understanding: f64, satisfaction: f64) -> AnalysisRow {
        AnalysisRow {
            gender: gender.to_string(),
            age_group: age_group.to_string(),
            understanding,
            satisfaction,
        }
    }

    #[test]
    fn default_catalog_has_four_gender_options() {
        let catalog = SurveyCatalog::default();
        let gender = catalog.dimension(GENDER).unwrap();
        assert_eq!(gender.options.len(), 4);
        assert_eq!(gender.kind(), DimensionKind::Categorical);
    }

    #[test]
    fn unknown_dimension_is_an_error() {
        let catalog = SurveyCatalog::default();
        assert!(matches!(
            catalog.dimension("height"),
            Err(SurveyError::UnknownDimension(code)) if code == "height"
        ));
    }

    #[test]
    fn default_plan_covers_every_pair_once() {
        let catalog = SurveyCatalog::default();
        assert_eq!(catalog.plan.simple.len(), 4);
        assert_eq!(catalog.plan.cross.len(), 6);
        assert_eq!(catalog.plan.summary.len(), 6);
        assert!(catalog.plan.cross.iter().all(|(a, b)| a != b));
    }

    #[test]
    fn options_match_case_insensitively_and_numbers_by_rounding() {
        let catalog = SurveyCatalog::default();
        let gender = catalog.dimension(GENDER).unwrap();
        let understanding = catalog.dimension(UNDERSTANDING).unwrap();

        let sample = row("prefernottosay", "20s", 3.6, 5.0);
        assert_eq!(gender.option_index(&sample), Some(3));
        assert_eq!(understanding.option_index(&sample), Some(3));
        assert_eq!(understanding.numeric_value(&sample), Some(3.6));
        assert_eq!(gender.numeric_value(&sample), None);
    }

    #[test]
    fn blank_and_non_finite_values_are_missing() {
        let catalog = SurveyCatalog::default();
        let gender = catalog.dimension(GENDER).unwrap();
        let satisfaction = catalog.dimension(SATISFACTION).unwrap();

        let sample = row("  ", "20s", 4.0, f64::NAN);
        assert_eq!(gender.categorical_value(&sample), None);
        assert_eq!(satisfaction.numeric_value(&sample), None);
        assert_eq!(satisfaction.option_index(&sample), None);
    }
}
