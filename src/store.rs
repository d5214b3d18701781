//! Collaborator interfaces the closure pipeline consumes.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Lecture, NewResultSet, RawResponse, ResultFact, ResultSet, SurveyStatus};

#[async_trait]
pub trait LectureStore: Send + Sync {
    async fn get(&self, lecture_id: Uuid) -> Result<Option<Lecture>>;

    async fn find_active_with_deadline_before(&self, now: DateTime<Utc>) -> Result<Vec<Lecture>>;

    async fn find_closed_unanalyzed(&self) -> Result<Vec<Lecture>>;

    /// Moves a lecture forward and stamps `closed_at` or `analyzed_at` with `at`.
    /// A backward move is `InvalidStatusTransition`.
    async fn set_status(&self, lecture_id: Uuid, status: SurveyStatus, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn find_by_lecture(&self, lecture_id: Uuid) -> Result<Vec<RawResponse>>;
}

/// Append-only result storage. Nothing here updates or deletes.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn create_result_set(&self, result_set: NewResultSet) -> Result<Uuid>;

    /// Inserts one batch of facts; returns how many were written.
    async fn append_facts(
        &self,
        result_set_id: Uuid,
        lecture_id: Uuid,
        facts: &[ResultFact],
        calculated_at: DateTime<Utc>,
    ) -> Result<usize>;

    /// The result set written by the run that finished at `closed_at`.
    async fn result_set_at(&self, lecture_id: Uuid, closed_at: DateTime<Utc>) -> Result<Option<ResultSet>>;

    async fn facts_for(&self, result_set_id: Uuid) -> Result<Vec<ResultFact>>;
}

/// Single-row lease guarding against overlapping scheduled cycles.
#[async_trait]
pub trait RunLease: Send + Sync {
    /// Takes the lease when it is free, expired, or already held by `owner`.
    async fn try_acquire(&self, owner: &str, now: DateTime<Utc>, ttl: Duration) -> Result<bool>;

    async fn release(&self, owner: &str) -> Result<()>;
}
