use crate::catalog::{RowField, SurveyCatalog};
use crate::models::{AnalysisRow, RawResponse};
use crate::stats::round2;

/// Filters raw responses down to analysis-ready rows, keeping input order.
///
/// A response is dropped when a rating is missing or outside the catalog's
/// rating range, when gender or age group is missing or not a known option,
/// or when gender is the excluded sentinel. Dropped rows stay in raw storage.
pub fn normalize_responses(catalog: &SurveyCatalog, responses: &[RawResponse]) -> Vec<AnalysisRow> {
    responses
        .iter()
        .filter_map(|response| normalize_one(catalog, response))
        .collect()
}

fn normalize_one(catalog: &SurveyCatalog, response: &RawResponse) -> Option<AnalysisRow> {
    let understanding = response.understanding?;
    let satisfaction = response.satisfaction?;
    if !catalog.rating_in_range(understanding) || !catalog.rating_in_range(satisfaction) {
        return None;
    }

    let gender = canonical_text(response.gender.as_deref())?;
    let age_group = canonical_text(response.age_group.as_deref())?;
    if catalog.is_excluded_gender(&gender) {
        return None;
    }
    if !known_option(catalog, RowField::Gender, &gender)
        || !known_option(catalog, RowField::AgeGroup, &age_group)
    {
        return None;
    }

    Some(AnalysisRow {
        gender,
        age_group,
        understanding: round2(understanding),
        satisfaction: round2(satisfaction),
    })
}

fn canonical_text(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    (!value.is_empty()).then(|| value.to_lowercase())
}

fn known_option(catalog: &SurveyCatalog, field: RowField, value: &str) -> bool {
    catalog
        .dimension_for(field)
        .map_or(true, |dim| dim.contains_option(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn response(
        gender: Option<&str>,
        age_group: Option<&str>,
        understanding: Option<f64>,
        satisfaction: Option<f64>,
    ) -> RawResponse {
        RawResponse {
            id: Uuid::new_v4(),
            lecture_id: Uuid::nil(),
            gender: gender.map(str::to_string),
            age_group: age_group.map(str::to_string),
            understanding,
            satisfaction,
            comment: None,
            submitted_at: Utc::now(),
            client_info: None,
        }
    }

    #[test]
    fn canonicalizes_surviving_rows() {
        let catalog = SurveyCatalog::default();
        let rows = normalize_responses(
            &catalog,
            &[response(Some("  Male "), Some("20S"), Some(4.456), Some(5.0))],
        );

        assert_eq!(
            rows,
            vec![AnalysisRow {
                gender: "male".to_string(),
                age_group: "20s".to_string(),
                understanding: 4.46,
                satisfaction: 5.0,
            }]
        );
    }

    #[test]
    fn drops_out_of_range_and_missing_ratings() {
        let catalog = SurveyCatalog::default();
        let rows = normalize_responses(
            &catalog,
            &[
                response(Some("male"), Some("20s"), Some(0.0), Some(3.0)),
                response(Some("male"), Some("20s"), Some(3.0), Some(6.0)),
                response(Some("male"), Some("20s"), None, Some(3.0)),
                response(Some("male"), Some("20s"), Some(f64::NAN), Some(3.0)),
                response(Some("male"), Some("20s"), Some(1.0), Some(5.0)),
            ],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].understanding, 1.0);
    }

    #[test]
    fn drops_missing_categories_and_excluded_gender() {
        let catalog = SurveyCatalog::default();
        let rows = normalize_responses(
            &catalog,
            &[
                response(None, Some("20s"), Some(3.0), Some(3.0)),
                response(Some("female"), Some("   "), Some(3.0), Some(3.0)),
                response(Some("PreferNotToSay"), Some("30s"), Some(3.0), Some(3.0)),
                response(Some("robot"), Some("30s"), Some(3.0), Some(3.0)),
                response(Some("female"), Some("30s"), Some(2.0), Some(3.0)),
            ],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].gender, "female");
    }

    #[test]
    fn preserves_input_order() {
        let catalog = SurveyCatalog::default();
        let rows = normalize_responses(
            &catalog,
            &[
                response(Some("other"), Some("40s"), Some(1.0), Some(1.0)),
                response(Some("male"), Some("20s"), Some(2.0), Some(2.0)),
                response(Some("female"), Some("50s"), Some(3.0), Some(3.0)),
            ],
        );
        let genders: Vec<&str> = rows.iter().map(|row| row.gender.as_str()).collect();
        assert_eq!(genders, vec!["other", "male", "female"]);
    }
}
