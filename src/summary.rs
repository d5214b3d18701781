use crate::catalog::{DimensionKind, DimensionSpec, SurveyCatalog, TOTAL_GROUP, UNKNOWN_GROUP};
use crate::error::{Result, SurveyError};
use crate::models::{AnalysisRow, SummaryRow};
use crate::stats::{mean, round2};

/// Mean of a numeric dimension, optionally per group of a categorical one.
///
/// Ungrouped (or grouped by `_total`) always yields exactly one row, even for
/// empty input. Grouped output follows the catalog's option order, then the
/// `unknown` bucket for rows whose group value is missing or not an option.
pub fn calculate_summary(
    catalog: &SurveyCatalog,
    rows: &[AnalysisRow],
    target_dim: &str,
    group_dim: Option<&str>,
) -> Result<Vec<SummaryRow>> {
    let target = catalog.dimension(target_dim)?;
    let group = match group_dim {
        None | Some(TOTAL_GROUP) => None,
        Some(code) => Some(catalog.dimension(code)?),
    };

    let invalid_pair = || SurveyError::InvalidSummaryPair {
        target: target_dim.to_string(),
        group: group_dim.unwrap_or(TOTAL_GROUP).to_string(),
    };
    if target.kind() != DimensionKind::Numeric {
        return Err(invalid_pair());
    }
    if group.is_some_and(|dim| dim.kind() != DimensionKind::Categorical) {
        return Err(invalid_pair());
    }

    let Some(group) = group else {
        let values: Vec<f64> = rows.iter().filter_map(|row| target.numeric_value(row)).collect();
        return Ok(vec![summary_row(TOTAL_GROUP, TOTAL_GROUP, target, &values)]);
    };

    Ok(group_values(group, target, rows)
        .into_iter()
        .map(|(option, values)| summary_row(&group.code, &option, target, &values))
        .collect())
}

fn summary_row(group_dim: &str, group_option: &str, target: &DimensionSpec, values: &[f64]) -> SummaryRow {
    SummaryRow {
        group_dim: group_dim.to_string(),
        group_option: group_option.to_string(),
        target_dim: target.code.clone(),
        avg_score: round2(mean(values)),
        base_n: values.len() as i64,
    }
}

/// Buckets valid target values by group label, in output order.
fn group_values(
    group: &DimensionSpec,
    target: &DimensionSpec,
    rows: &[AnalysisRow],
) -> Vec<(String, Vec<f64>)> {
    let mut known: Vec<Option<Vec<f64>>> = vec![None; group.options.len()];
    let mut unknown: Option<Vec<f64>> = None;

    for row in rows {
        let bucket = match group.option_index(row) {
            Some(index) => known[index].get_or_insert_with(Vec::new),
            None => unknown.get_or_insert_with(Vec::new),
        };
        if let Some(value) = target.numeric_value(row) {
            bucket.push(value);
        }
    }

    group
        .options
        .iter()
        .zip(known)
        .filter_map(|(option, values)| values.map(|values| (option.clone(), values)))
        .chain(unknown.map(|values| (UNKNOWN_GROUP.to_string(), values)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AGE_GROUP, GENDER, SATISFACTION, UNDERSTANDING};

    fn row(gender: &str, age_group: &str, understanding: f64, satisfaction: f64) -> AnalysisRow {
        AnalysisRow {
            gender: gender.to_string(),
            age_group: age_group.to_string(),
            understanding,
            satisfaction,
        }
    }

    fn sample() -> Vec<AnalysisRow> {
        vec![
            row("male", "20s", 4.0, 5.0),
            row("female", "30s", 3.0, 4.0),
            row("male", "20s", 5.0, 5.0),
        ]
    }

    #[test]
    fn ungrouped_summary_is_a_single_total_row() {
        let catalog = SurveyCatalog::default();
        let rows = calculate_summary(&catalog, &sample(), UNDERSTANDING, None).unwrap();
        assert_eq!(
            rows,
            vec![SummaryRow {
                group_dim: TOTAL_GROUP.to_string(),
                group_option: TOTAL_GROUP.to_string(),
                target_dim: UNDERSTANDING.to_string(),
                avg_score: 4.0,
                base_n: 3,
            }]
        );
    }

    #[test]
    fn ungrouped_summary_of_empty_input_is_zero_row() {
        let catalog = SurveyCatalog::default();
        for group in [None, Some(TOTAL_GROUP)] {
            let rows = calculate_summary(&catalog, &[], SATISFACTION, group).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].avg_score, 0.0);
            assert_eq!(rows[0].base_n, 0);
        }
    }

    #[test]
    fn groups_follow_catalog_order_and_skip_absent_options() {
        let catalog = SurveyCatalog::default();
        let rows = calculate_summary(&catalog, &sample(), SATISFACTION, Some(GENDER)).unwrap();
        let summary: Vec<(&str, f64, i64)> = rows
            .iter()
            .map(|r| (r.group_option.as_str(), r.avg_score, r.base_n))
            .collect();
        assert_eq!(summary, vec![("male", 5.0, 2), ("female", 4.0, 1)]);
    }

    #[test]
    fn averages_are_rounded() {
        let catalog = SurveyCatalog::default();
        let data = vec![
            row("male", "20s", 4.0, 5.0),
            row("male", "20s", 4.0, 4.0),
            row("male", "20s", 5.0, 4.0),
        ];
        let rows = calculate_summary(&catalog, &data, UNDERSTANDING, Some(AGE_GROUP)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_score, 4.33);
    }

    #[test]
    fn missing_group_values_land_in_unknown_and_invalid_numbers_are_excluded() {
        let catalog = SurveyCatalog::default();
        let data = vec![
            row("", "20s", 4.0, f64::NAN),
            row("", "20s", 2.0, 3.0),
            row("male", "20s", 5.0, f64::INFINITY),
        ];
        let rows = calculate_summary(&catalog, &data, SATISFACTION, Some(GENDER)).unwrap();
        let summary: Vec<(&str, f64, i64)> = rows
            .iter()
            .map(|r| (r.group_option.as_str(), r.avg_score, r.base_n))
            .collect();
        assert_eq!(summary, vec![("male", 0.0, 0), (UNKNOWN_GROUP, 3.0, 1)]);
    }

    #[test]
    fn values_outside_the_option_domain_share_the_unknown_bucket() {
        let catalog = SurveyCatalog::default();
        let data = vec![
            row("robot", "20s", 4.0, 2.0),
            row("", "20s", 2.0, 4.0),
            row("Female", "30s", 3.0, 5.0),
        ];
        let rows = calculate_summary(&catalog, &data, SATISFACTION, Some(GENDER)).unwrap();
        let summary: Vec<(&str, f64, i64)> = rows
            .iter()
            .map(|r| (r.group_option.as_str(), r.avg_score, r.base_n))
            .collect();
        assert_eq!(summary, vec![("female", 5.0, 1), (UNKNOWN_GROUP, 3.0, 2)]);
    }

    #[test]
    fn rejects_invalid_pairings() {
        let catalog = SurveyCatalog::default();
        for (target, group) in [
            (GENDER, None),
            (UNDERSTANDING, Some(SATISFACTION)),
            (SATISFACTION, Some(SATISFACTION)),
        ] {
            let err = calculate_summary(&catalog, &sample(), target, group).unwrap_err();
            assert!(err.is_contract_violation(), "{target} by {group:?}");
        }
        assert!(matches!(
            calculate_summary(&catalog, &sample(), UNDERSTANDING, Some("height")),
            Err(SurveyError::UnknownDimension(_))
        ));
    }
}
