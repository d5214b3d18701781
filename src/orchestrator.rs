use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::{compute_facts, persist_analysis};
use crate::catalog::SurveyCatalog;
use crate::error::{Result, SurveyError};
use crate::lifecycle::{is_awaiting_analysis, is_closable, is_due_for_closure, is_valid_status_transition};
use crate::models::{
    AnalysisOutcome, AnalysisRequest, ClosureOutcome, ClosureRequest, CyclePhase, CycleReport,
    ItemFailure, Lecture, ResultsCount, SurveyStatus, TriggerType,
};
use crate::normalize::normalize_responses;
use crate::store::{LectureStore, ResponseStore, ResultStore, RunLease};

/// Lectures the closure phase should close.
pub fn plan_closures(candidates: &[Lecture], now: DateTime<Utc>) -> Vec<Uuid> {
    candidates
        .iter()
        .filter(|lecture| is_due_for_closure(lecture, now))
        .map(|lecture| lecture.id)
        .collect()
}

/// Lectures the analysis phase should analyze.
pub fn plan_analyses(candidates: &[Lecture]) -> Vec<Uuid> {
    candidates
        .iter()
        .filter(|lecture| is_awaiting_analysis(lecture))
        .map(|lecture| lecture.id)
        .collect()
}

struct AnalysisRun {
    result_set_id: Uuid,
    total_responses: i64,
    results_count: ResultsCount,
}

pub struct ClosureOrchestrator {
    lectures: Arc<dyn LectureStore>,
    responses: Arc<dyn ResponseStore>,
    results: Arc<dyn ResultStore>,
    lease: Arc<dyn RunLease>,
    catalog: SurveyCatalog,
    lease_owner: String,
    lease_ttl: Duration,
}

impl ClosureOrchestrator {
    pub fn new<S>(store: Arc<S>, catalog: SurveyCatalog, lease_owner: String, lease_ttl: Duration) -> Self
    where
        S: LectureStore + ResponseStore + ResultStore + RunLease + 'static,
    {
        Self {
            lectures: store.clone(),
            responses: store.clone(),
            results: store.clone(),
            lease: store,
            catalog,
            lease_owner,
            lease_ttl,
        }
    }

    pub async fn run_scheduled_cycle(&self) -> Result<CycleReport> {
        self.run_scheduled_cycle_at(Utc::now()).await
    }

    /// Closes every due survey, then analyzes every closed one.
    ///
    /// Per-lecture failures are recorded and skipped. A failure that breaks the
    /// whole run is reported through `error` with zero counts. Contract
    /// violations are returned as `Err`.
    pub async fn run_scheduled_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let started = Instant::now();

        match self.lease.try_acquire(&self.lease_owner, now, self.lease_ttl).await {
            Ok(true) => {}
            Ok(false) => {
                info!(owner = %self.lease_owner, "run lease held elsewhere, skipping cycle");
                return Ok(CycleReport {
                    skipped: true,
                    total_processing_time_ms: elapsed_ms(started),
                    ..CycleReport::default()
                });
            }
            Err(err) => {
                error!(error = %err, "could not acquire run lease");
                return Ok(CycleReport {
                    error: Some(err.to_string()),
                    total_processing_time_ms: elapsed_ms(started),
                    ..CycleReport::default()
                });
            }
        }

        let outcome = self.run_phases(now).await;

        if let Err(err) = self.lease.release(&self.lease_owner).await {
            warn!(error = %err, "could not release run lease");
        }

        let mut report = match outcome {
            Ok(report) => report,
            Err(err) if err.is_contract_violation() => return Err(err),
            Err(err) => {
                error!(error = %err, "scheduled cycle aborted");
                CycleReport {
                    error: Some(err.to_string()),
                    ..CycleReport::default()
                }
            }
        };
        report.total_processing_time_ms = elapsed_ms(started);

        info!(
            closed = report.closed_count,
            analyzed = report.analyzed_count,
            failed = report.failures.len(),
            elapsed_ms = report.total_processing_time_ms,
            "scheduled cycle finished"
        );
        Ok(report)
    }

    async fn run_phases(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let candidates = self.lectures.find_active_with_deadline_before(now).await?;
        for lecture_id in plan_closures(&candidates, now) {
            match self.lectures.set_status(lecture_id, SurveyStatus::Closed, now).await {
                Ok(()) => {
                    info!(%lecture_id, "survey closed");
                    report.closed_count += 1;
                }
                Err(err) => record_failure(&mut report, lecture_id, CyclePhase::Closure, err)?,
            }
        }

        let candidates = self.lectures.find_closed_unanalyzed().await?;
        for lecture_id in plan_analyses(&candidates) {
            match self.analyze_lecture(lecture_id, TriggerType::Auto, now).await {
                Ok(run) => {
                    info!(
                        %lecture_id,
                        result_set_id = %run.result_set_id,
                        responses = run.total_responses,
                        "survey analyzed"
                    );
                    report.analyzed_count += 1;
                }
                Err(err) => record_failure(&mut report, lecture_id, CyclePhase::Analysis, err)?,
            }
        }

        Ok(report)
    }

    pub async fn run_single_lecture_closure(&self, request: ClosureRequest) -> Result<ClosureOutcome> {
        self.run_single_lecture_closure_at(request, Utc::now()).await
    }

    /// Manually closes one survey, optionally analyzing it right away.
    pub async fn run_single_lecture_closure_at(
        &self,
        request: ClosureRequest,
        now: DateTime<Utc>,
    ) -> Result<ClosureOutcome> {
        let lecture_id = request.lecture_id;
        let rejected = |message: String| -> Result<ClosureOutcome> {
            warn!(%lecture_id, %message, "manual closure rejected");
            Ok(ClosureOutcome {
                success: false,
                message: Some(message),
                lecture_id,
            })
        };

        let lecture = match self.lectures.get(lecture_id).await {
            Ok(Some(lecture)) => lecture,
            Ok(None) => return rejected(SurveyError::LectureNotFound(lecture_id).to_string()),
            Err(err) => return rejected(err.to_string()),
        };

        if !is_valid_status_transition(lecture.survey_status, SurveyStatus::Closed) {
            return rejected(
                SurveyError::InvalidStatusTransition {
                    from: lecture.survey_status,
                    to: SurveyStatus::Closed,
                }
                .to_string(),
            );
        }
        if !is_closable(&lecture, now) {
            let message = if lecture.survey_status == SurveyStatus::Active {
                "survey deadline has passed; the scheduled cycle will close it".to_string()
            } else {
                SurveyError::NotClosable {
                    id: lecture_id,
                    status: lecture.survey_status,
                }
                .to_string()
            };
            return rejected(message);
        }

        if let Err(err) = self.lectures.set_status(lecture_id, SurveyStatus::Closed, now).await {
            if err.is_contract_violation() {
                return Err(err);
            }
            return rejected(err.to_string());
        }
        info!(%lecture_id, user = ?request.user_id, "survey closed manually");

        if !request.trigger_analysis {
            return Ok(ClosureOutcome {
                success: true,
                message: Some("survey closed".to_string()),
                lecture_id,
            });
        }

        let analysis = self
            .run_analysis_at(
                AnalysisRequest {
                    lecture_id,
                    triggered_by: request.user_id,
                    trigger_type: TriggerType::Manual,
                },
                now,
            )
            .await?;

        let message = match analysis.error {
            None => "survey closed and analyzed".to_string(),
            Some(err) => format!("survey closed; analysis failed: {err}"),
        };
        Ok(ClosureOutcome {
            success: analysis.success,
            message: Some(message),
            lecture_id,
        })
    }

    pub async fn run_analysis(&self, request: AnalysisRequest) -> Result<AnalysisOutcome> {
        self.run_analysis_at(request, Utc::now()).await
    }

    /// Analyzes one lecture outside the scheduled cycle.
    pub async fn run_analysis_at(&self, request: AnalysisRequest, now: DateTime<Utc>) -> Result<AnalysisOutcome> {
        let started = Instant::now();
        let lecture_id = request.lecture_id;
        info!(
            %lecture_id,
            trigger = ?request.trigger_type,
            triggered_by = ?request.triggered_by,
            "analysis requested"
        );

        match self.analyze_lecture(lecture_id, request.trigger_type, now).await {
            Ok(run) => Ok(AnalysisOutcome {
                success: true,
                result_set_id: Some(run.result_set_id),
                execution_time: Some(elapsed_ms(started)),
                total_responses: Some(run.total_responses),
                results_count: Some(run.results_count),
                error: None,
                message: Some("analysis completed".to_string()),
            }),
            Err(err) if err.is_contract_violation() => Err(err),
            Err(err) => {
                warn!(%lecture_id, error = %err, "analysis failed");
                Ok(AnalysisOutcome {
                    success: false,
                    execution_time: Some(elapsed_ms(started)),
                    error: Some(err.to_string()),
                    message: Some("analysis failed".to_string()),
                    ..AnalysisOutcome::default()
                })
            }
        }
    }

    /// Full pipeline for one lecture: normalize, calculate, persist, flip status.
    ///
    /// The scheduled path only analyzes closed lectures. A manual trigger may
    /// also re-run an analyzed one, which appends a fresh result set.
    async fn analyze_lecture(
        &self,
        lecture_id: Uuid,
        trigger: TriggerType,
        now: DateTime<Utc>,
    ) -> Result<AnalysisRun> {
        let lecture = self
            .lectures
            .get(lecture_id)
            .await?
            .ok_or(SurveyError::LectureNotFound(lecture_id))?;

        let analyzable = match (lecture.survey_status, trigger) {
            (SurveyStatus::Closed, _) => true,
            (SurveyStatus::Analyzed, TriggerType::Manual) => true,
            _ => false,
        };
        if !analyzable {
            return Err(SurveyError::NotAnalyzable {
                id: lecture_id,
                status: lecture.survey_status,
            });
        }

        let responses = self.responses.find_by_lecture(lecture_id).await?;
        let rows = normalize_responses(&self.catalog, &responses);
        let facts = compute_facts(&self.catalog, &rows)?;
        let total_responses = rows.len() as i64;

        let result_set_id = persist_analysis(
            self.lectures.as_ref(),
            self.results.as_ref(),
            lecture_id,
            total_responses,
            &facts,
            now,
        )
        .await?;

        Ok(AnalysisRun {
            result_set_id,
            total_responses,
            results_count: facts.counts(),
        })
    }
}

/// Absorbs a per-lecture failure into the report. Contract violations escape.
fn record_failure(report: &mut CycleReport, lecture_id: Uuid, phase: CyclePhase, err: SurveyError) -> Result<()> {
    if err.is_contract_violation() {
        return Err(err);
    }
    warn!(%lecture_id, ?phase, error = %err, "lecture skipped");
    report.failures.push(ItemFailure {
        lecture_id,
        phase,
        message: err.to_string(),
    });
    Ok(())
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}
