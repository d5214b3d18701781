use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::catalog::SurveyCatalog;
use crate::crosstab::calculate_cross_analysis;
use crate::distribution::calculate_distribution;
use crate::error::Result;
use crate::models::{AnalysisRow, Lecture, NewResultSet, ResultFact, ResultSet, ResultsCount, SurveyStatus};
use crate::store::{LectureStore, ResultStore};
use crate::summary::calculate_summary;

/// Fact lists produced by one analysis run, one per stat type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisFacts {
    pub simple: Vec<ResultFact>,
    pub cross: Vec<ResultFact>,
    pub summary: Vec<ResultFact>,
}

impl AnalysisFacts {
    pub fn counts(&self) -> ResultsCount {
        ResultsCount {
            simple: self.simple.len(),
            cross: self.cross.len(),
            summary: self.summary.len(),
        }
    }
}

/// Runs every calculator the catalog's plan asks for.
pub fn compute_facts(catalog: &SurveyCatalog, rows: &[AnalysisRow]) -> Result<AnalysisFacts> {
    let mut facts = AnalysisFacts::default();

    for code in &catalog.plan.simple {
        let rows = calculate_distribution(catalog, rows, code)?;
        facts.simple.extend(rows.iter().map(ResultFact::from));
    }
    for (dim1, dim2) in &catalog.plan.cross {
        let rows = calculate_cross_analysis(catalog, rows, dim1, dim2)?;
        facts.cross.extend(rows.iter().map(ResultFact::from));
    }
    for (target, group) in &catalog.plan.summary {
        let rows = calculate_summary(catalog, rows, target, group.as_deref())?;
        facts.summary.extend(rows.iter().map(ResultFact::from));
    }

    Ok(facts)
}

/// Writes a new result set and its facts, then marks the lecture analyzed.
///
/// Each fact batch is its own insert. If any write fails the lecture keeps its
/// current status, so the next cycle redoes the whole run; facts already written
/// stay behind under the abandoned result set.
pub async fn persist_analysis(
    lectures: &dyn LectureStore,
    results: &dyn ResultStore,
    lecture_id: Uuid,
    total_responses: i64,
    facts: &AnalysisFacts,
    calculated_at: DateTime<Utc>,
) -> Result<Uuid> {
    let result_set_id = results
        .create_result_set(NewResultSet {
            lecture_id,
            closed_at: calculated_at,
            total_responses,
        })
        .await?;

    for batch in [&facts.simple, &facts.cross, &facts.summary] {
        let written = results
            .append_facts(result_set_id, lecture_id, batch, calculated_at)
            .await?;
        debug!(%lecture_id, %result_set_id, written, "appended fact batch");
    }

    lectures
        .set_status(lecture_id, SurveyStatus::Analyzed, calculated_at)
        .await?;

    Ok(result_set_id)
}

/// The result set that moved the lecture to `analyzed`, with its facts.
///
/// Sets left behind by runs that failed part way are never returned, even when
/// they are newer. `None` means the lecture has not been analyzed yet.
pub async fn current_result(
    results: &dyn ResultStore,
    lecture: &Lecture,
) -> Result<Option<(ResultSet, Vec<ResultFact>)>> {
    let Some(analyzed_at) = lecture.analyzed_at else {
        return Ok(None);
    };
    let Some(result_set) = results.result_set_at(lecture.id, analyzed_at).await? else {
        return Ok(None);
    };
    let facts = results.facts_for(result_set.id).await?;
    Ok(Some((result_set, facts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AnalysisPlan;
    use crate::models::StatType;

    fn row(gender: &str, age_group: &str, understanding: f64, satisfaction: f64) -> AnalysisRow {
        AnalysisRow {
            gender: gender.to_string(),
            age_group: age_group.to_string(),
            understanding,
            satisfaction,
        }
    }

    #[test]
    fn default_plan_fact_counts() {
        let catalog = SurveyCatalog::default();
        let rows = vec![
            row("male", "20s", 4.0, 5.0),
            row("female", "30s", 3.0, 4.0),
            row("male", "20s", 5.0, 5.0),
        ];
        let facts = compute_facts(&catalog, &rows).unwrap();

        assert_eq!(
            facts.counts(),
            ResultsCount {
                simple: 4 + 6 + 5 + 5,
                cross: 24 + 20 + 20 + 30 + 30 + 25,
                summary: 2 * (1 + 2 + 2),
            }
        );
        assert!(facts.simple.iter().all(|fact| fact.stat_type == StatType::Simple));
        assert!(facts.cross.iter().all(|fact| fact.stat_type == StatType::Cross));
        assert!(facts.summary.iter().all(|fact| fact.stat_type == StatType::Summary));
    }

    #[test]
    fn empty_input_keeps_only_ungrouped_summaries() {
        let catalog = SurveyCatalog::default();
        let facts = compute_facts(&catalog, &[]).unwrap();
        assert_eq!(
            facts.counts(),
            ResultsCount {
                simple: 0,
                cross: 0,
                summary: 2,
            }
        );
        assert!(facts
            .summary
            .iter()
            .all(|fact| fact.avg_score == Some(0.0) && fact.base_n == 0));
    }

    #[test]
    fn misconfigured_plan_fails_fast() {
        let mut catalog = SurveyCatalog::default();
        catalog.plan = AnalysisPlan {
            simple: vec!["height".to_string()],
            cross: Vec::new(),
            summary: Vec::new(),
        };
        let err = compute_facts(&catalog, &[]).unwrap_err();
        assert!(err.is_contract_violation());
    }
}
