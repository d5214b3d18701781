use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SurveyError;

/// Lecture lifecycle. Ordered: a lecture only ever moves to a later variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    Active,
    Closed,
    Analyzed,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Analyzed => "analyzed",
        }
    }
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurveyStatus {
    type Err = SurveyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            "analyzed" => Ok(Self::Analyzed),
            other => Err(SurveyError::Other(anyhow::anyhow!(
                "unknown survey status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Lecture {
    pub id: Uuid,
    pub title: String,
    pub created_by: String,
    pub survey_close_date: NaiveDate,
    pub survey_close_time: NaiveTime,
    pub survey_status: SurveyStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl Lecture {
    /// Survey deadline; close date and time are stored in UTC.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.survey_close_date
            .and_time(self.survey_close_time)
            .and_utc()
    }
}

/// One respondent's submission, exactly as stored.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub gender: Option<String>,
    pub age_group: Option<String>,
    pub understanding: Option<f64>,
    pub satisfaction: Option<f64>,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub client_info: Option<serde_json::Value>,
}

/// Canonical projection of a response used by the calculators.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRow {
    pub gender: String,
    pub age_group: String,
    pub understanding: f64,
    pub satisfaction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionRow {
    pub dimension_code: String,
    pub option_code: String,
    pub n: i64,
    pub base_n: i64,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossRow {
    pub dim1: String,
    pub opt1: String,
    pub dim2: String,
    pub opt2: String,
    pub n: i64,
    pub row_pct: f64,
    pub row_base_n: i64,
    pub col_pct: f64,
    pub col_base_n: i64,
    pub total_pct: f64,
    pub total_base_n: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub group_dim: String,
    pub group_option: String,
    pub target_dim: String,
    pub avg_score: f64,
    pub base_n: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    Simple,
    Cross,
    Summary,
}

impl StatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Cross => "cross",
            Self::Summary => "summary",
        }
    }
}

impl FromStr for StatType {
    type Err = SurveyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "simple" => Ok(Self::Simple),
            "cross" => Ok(Self::Cross),
            "summary" => Ok(Self::Summary),
            other => Err(SurveyError::Other(anyhow::anyhow!(
                "unknown stat type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewResultSet {
    pub lecture_id: Uuid,
    pub closed_at: DateTime<Utc>,
    pub total_responses: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub closed_at: DateTime<Utc>,
    pub total_responses: i64,
}

/// One persisted statistic. Columns that do not apply to a stat type stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultFact {
    pub stat_type: StatType,
    pub dimension1: String,
    pub option1: String,
    pub dimension2: Option<String>,
    pub option2: Option<String>,
    pub n: Option<i64>,
    pub base_n: i64,
    pub pct: Option<f64>,
    pub row_pct: Option<f64>,
    pub row_base_n: Option<i64>,
    pub col_pct: Option<f64>,
    pub col_base_n: Option<i64>,
    pub avg_score: Option<f64>,
}

impl From<&DistributionRow> for ResultFact {
    fn from(row: &DistributionRow) -> Self {
        Self {
            stat_type: StatType::Simple,
            dimension1: row.dimension_code.clone(),
            option1: row.option_code.clone(),
            dimension2: None,
            option2: None,
            n: Some(row.n),
            base_n: row.base_n,
            pct: Some(row.pct),
            row_pct: None,
            row_base_n: None,
            col_pct: None,
            col_base_n: None,
            avg_score: None,
        }
    }
}

impl From<&CrossRow> for ResultFact {
    fn from(row: &CrossRow) -> Self {
        Self {
            stat_type: StatType::Cross,
            dimension1: row.dim1.clone(),
            option1: row.opt1.clone(),
            dimension2: Some(row.dim2.clone()),
            option2: Some(row.opt2.clone()),
            n: Some(row.n),
            base_n: row.total_base_n,
            pct: Some(row.total_pct),
            row_pct: Some(row.row_pct),
            row_base_n: Some(row.row_base_n),
            col_pct: Some(row.col_pct),
            col_base_n: Some(row.col_base_n),
            avg_score: None,
        }
    }
}

impl From<&SummaryRow> for ResultFact {
    fn from(row: &SummaryRow) -> Self {
        Self {
            stat_type: StatType::Summary,
            dimension1: row.group_dim.clone(),
            option1: row.group_option.clone(),
            dimension2: Some(row.target_dim.clone()),
            option2: None,
            n: None,
            base_n: row.base_n,
            pct: None,
            row_pct: None,
            row_base_n: None,
            col_pct: None,
            col_base_n: None,
            avg_score: Some(row.avg_score),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Auto,
    Manual,
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub lecture_id: Uuid,
    pub triggered_by: Option<String>,
    pub trigger_type: TriggerType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultsCount {
    pub simple: usize,
    pub cross: usize,
    pub summary: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_set_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_responses: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_count: Option<ResultsCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClosureRequest {
    pub lecture_id: Uuid,
    pub trigger_analysis: bool,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub lecture_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Closure,
    Analysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub lecture_id: Uuid,
    pub phase: CyclePhase,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub closed_count: usize,
    pub analyzed_count: usize,
    pub total_processing_time_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub skipped: bool,
    pub failures: Vec<ItemFailure>,
}
