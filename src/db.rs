use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{Result, SurveyError};
use crate::lifecycle::is_forward_transition;
use crate::models::{Lecture, NewResultSet, RawResponse, ResultFact, ResultSet, SurveyStatus};
use crate::store::{LectureStore, ResponseStore, ResultStore, RunLease};

const LECTURE_COLUMNS: &str = "id, title, created_by, survey_close_date, survey_close_time, \
     survey_status, closed_at, analyzed_at";

const FACT_COLUMNS: &str = "stat_type, dimension1, option1, dimension2, option2, n, base_n, \
     pct, row_pct, row_base_n, col_pct, col_base_n, avg_score";

const CYCLE_LEASE: &str = "scheduled-cycle";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed implementation of every pipeline collaborator.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn lecture_from_row(row: &PgRow) -> Result<Lecture> {
    let status: String = row.try_get("survey_status")?;
    Ok(Lecture {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        created_by: row.try_get("created_by")?,
        survey_close_date: row.try_get("survey_close_date")?,
        survey_close_time: row.try_get("survey_close_time")?,
        survey_status: status.parse()?,
        closed_at: row.try_get("closed_at")?,
        analyzed_at: row.try_get("analyzed_at")?,
    })
}

fn fact_from_row(row: &PgRow) -> Result<ResultFact> {
    let stat_type: String = row.try_get("stat_type")?;
    Ok(ResultFact {
        stat_type: stat_type.parse()?,
        dimension1: row.try_get("dimension1")?,
        option1: row.try_get("option1")?,
        dimension2: row.try_get("dimension2")?,
        option2: row.try_get("option2")?,
        n: row.try_get("n")?,
        base_n: row.try_get("base_n")?,
        pct: row.try_get("pct")?,
        row_pct: row.try_get("row_pct")?,
        row_base_n: row.try_get("row_base_n")?,
        col_pct: row.try_get("col_pct")?,
        col_base_n: row.try_get("col_base_n")?,
        avg_score: row.try_get("avg_score")?,
    })
}

#[async_trait]
impl LectureStore for PgStore {
    async fn get(&self, lecture_id: Uuid) -> Result<Option<Lecture>> {
        let query = format!("SELECT {LECTURE_COLUMNS} FROM lecture_survey.lectures WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(lecture_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(lecture_from_row).transpose()
    }

    async fn find_active_with_deadline_before(&self, now: DateTime<Utc>) -> Result<Vec<Lecture>> {
        let query = format!(
            "SELECT {LECTURE_COLUMNS} FROM lecture_survey.lectures \
             WHERE survey_status = 'active' \
             AND (survey_close_date + survey_close_time) <= $1 \
             ORDER BY survey_close_date, survey_close_time"
        );
        let rows = sqlx::query(&query)
            .bind(now.naive_utc())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(lecture_from_row).collect()
    }

    async fn find_closed_unanalyzed(&self) -> Result<Vec<Lecture>> {
        let query = format!(
            "SELECT {LECTURE_COLUMNS} FROM lecture_survey.lectures \
             WHERE survey_status = 'closed' AND analyzed_at IS NULL \
             ORDER BY closed_at NULLS FIRST"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(lecture_from_row).collect()
    }

    async fn set_status(&self, lecture_id: Uuid, status: SurveyStatus, at: DateTime<Utc>) -> Result<()> {
        let allowed_from: Vec<String> = [SurveyStatus::Active, SurveyStatus::Closed, SurveyStatus::Analyzed]
            .into_iter()
            .filter(|from| is_forward_transition(*from, status))
            .map(|from| from.as_str().to_string())
            .collect();

        let result = sqlx::query(
            r#"
            UPDATE lecture_survey.lectures
            SET survey_status = $2,
                closed_at = CASE WHEN $2 = 'closed' THEN $3 ELSE closed_at END,
                analyzed_at = CASE WHEN $2 = 'analyzed' THEN $3 ELSE analyzed_at END
            WHERE id = $1 AND survey_status = ANY($4)
            "#,
        )
        .bind(lecture_id)
        .bind(status.as_str())
        .bind(at)
        .bind(&allowed_from)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.get(lecture_id).await? {
            None => Err(SurveyError::LectureNotFound(lecture_id)),
            Some(lecture) => Err(SurveyError::InvalidStatusTransition {
                from: lecture.survey_status,
                to: status,
            }),
        }
    }
}

#[async_trait]
impl ResponseStore for PgStore {
    async fn find_by_lecture(&self, lecture_id: Uuid) -> Result<Vec<RawResponse>> {
        let rows = sqlx::query(
            r#"
            SELECT id, lecture_id, gender, age_group, understanding, satisfaction,
                   comment, submitted_at, client_info
            FROM lecture_survey.responses
            WHERE lecture_id = $1
            ORDER BY submitted_at, id
            "#,
        )
        .bind(lecture_id)
        .fetch_all(&self.pool)
        .await?;

        let mut responses = Vec::with_capacity(rows.len());
        for row in rows {
            responses.push(RawResponse {
                id: row.try_get("id")?,
                lecture_id: row.try_get("lecture_id")?,
                gender: row.try_get("gender")?,
                age_group: row.try_get("age_group")?,
                understanding: row.try_get("understanding")?,
                satisfaction: row.try_get("satisfaction")?,
                comment: row.try_get("comment")?,
                submitted_at: row.try_get("submitted_at")?,
                client_info: row.try_get("client_info")?,
            });
        }

        Ok(responses)
    }
}

#[async_trait]
impl ResultStore for PgStore {
    async fn create_result_set(&self, result_set: NewResultSet) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO lecture_survey.result_sets (id, lecture_id, closed_at, total_responses)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(result_set.lecture_id)
        .bind(result_set.closed_at)
        .bind(result_set.total_responses)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn append_facts(
        &self,
        result_set_id: Uuid,
        lecture_id: Uuid,
        facts: &[ResultFact],
        calculated_at: DateTime<Utc>,
    ) -> Result<usize> {
        if facts.is_empty() {
            return Ok(0);
        }

        let query = format!(
            "INSERT INTO lecture_survey.result_facts \
             (result_set_id, lecture_id, calculated_at, {FACT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        );

        let mut tx = self.pool.begin().await?;
        for fact in facts {
            sqlx::query(&query)
                .bind(result_set_id)
                .bind(lecture_id)
                .bind(calculated_at)
                .bind(fact.stat_type.as_str())
                .bind(&fact.dimension1)
                .bind(&fact.option1)
                .bind(&fact.dimension2)
                .bind(&fact.option2)
                .bind(fact.n)
                .bind(fact.base_n)
                .bind(fact.pct)
                .bind(fact.row_pct)
                .bind(fact.row_base_n)
                .bind(fact.col_pct)
                .bind(fact.col_base_n)
                .bind(fact.avg_score)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(facts.len())
    }

    async fn result_set_at(&self, lecture_id: Uuid, closed_at: DateTime<Utc>) -> Result<Option<ResultSet>> {
        let row = sqlx::query(
            r#"
            SELECT id, lecture_id, closed_at, total_responses
            FROM lecture_survey.result_sets
            WHERE lecture_id = $1 AND closed_at = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(lecture_id)
        .bind(closed_at)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ResultSet {
            id: row.try_get("id")?,
            lecture_id: row.try_get("lecture_id")?,
            closed_at: row.try_get("closed_at")?,
            total_responses: row.try_get("total_responses")?,
        }))
    }

    async fn facts_for(&self, result_set_id: Uuid) -> Result<Vec<ResultFact>> {
        let query = format!(
            "SELECT {FACT_COLUMNS} FROM lecture_survey.result_facts \
             WHERE result_set_id = $1 ORDER BY id"
        );
        let rows = sqlx::query(&query)
            .bind(result_set_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(fact_from_row).collect()
    }
}

#[async_trait]
impl RunLease for PgStore {
    async fn try_acquire(&self, owner: &str, now: DateTime<Utc>, ttl: Duration) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO lecture_survey.run_leases (name, owner, acquired_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
            SET owner = EXCLUDED.owner, acquired_at = EXCLUDED.acquired_at
            WHERE lecture_survey.run_leases.owner = EXCLUDED.owner
               OR lecture_survey.run_leases.acquired_at <= $4
            "#,
        )
        .bind(CYCLE_LEASE)
        .bind(owner)
        .bind(now)
        .bind(now - ttl)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, owner: &str) -> Result<()> {
        sqlx::query("DELETE FROM lecture_survey.run_leases WHERE name = $1 AND owner = $2")
            .bind(CYCLE_LEASE)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let evening = NaiveTime::from_hms_opt(18, 0, 0).context("invalid time")?;
    let lectures = vec![
        (
            Uuid::parse_str("5b8a3c1e-7d42-4f0b-9a6e-2c1d8e4f7a90")?,
            "Operating Systems: Scheduling",
            "prof.lindqvist",
            today - Duration::days(1),
            "active",
        ),
        (
            Uuid::parse_str("c3e91f27-0a5d-4b68-8f14-6d2b7e9a0c35")?,
            "Databases: Query Planning",
            "prof.okafor",
            today - Duration::days(3),
            "closed",
        ),
        (
            Uuid::parse_str("8f0d6a42-3b1c-4e97-a5d8-1e7c9b2f4d06")?,
            "Networks: Congestion Control",
            "prof.lindqvist",
            today + Duration::days(7),
            "active",
        ),
    ];

    for (id, title, created_by, close_date, status) in &lectures {
        sqlx::query(
            r#"
            INSERT INTO lecture_survey.lectures
            (id, title, created_by, survey_close_date, survey_close_time, survey_status, closed_at)
            VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $6 = 'closed' THEN now() ELSE NULL END)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title, survey_close_date = EXCLUDED.survey_close_date
            "#,
        )
        .bind(*id)
        .bind(*title)
        .bind(*created_by)
        .bind(*close_date)
        .bind(evening)
        .bind(*status)
        .execute(pool)
        .await?;
    }

    let responses = [
        ("seed-r-001", 0, "male", "20s", 4.0, 5.0, "Clear examples on run queues"),
        ("seed-r-002", 0, "female", "30s", 3.0, 4.0, "Slides were dense"),
        ("seed-r-003", 0, "male", "20s", 5.0, 5.0, ""),
        ("seed-r-004", 0, "preferNotToSay", "40s", 2.0, 3.0, "Too fast"),
        ("seed-r-005", 1, "female", "20s", 4.0, 4.0, "Loved the EXPLAIN walkthrough"),
        ("seed-r-006", 1, "other", "under20", 3.0, 3.0, ""),
        ("seed-r-007", 1, "male", "50s", 5.0, 4.0, "More on join ordering please"),
        ("seed-r-008", 2, "female", "60plus", 4.0, 5.0, ""),
    ];

    for (source_key, lecture_idx, gender, age_group, understanding, satisfaction, comment) in responses {
        let (lecture_id, _, _, close_date, _) = lectures[lecture_idx];
        let submitted_at = close_date
            .pred_opt()
            .context("invalid date")?
            .and_time(evening)
            .and_utc();

        sqlx::query(
            r#"
            INSERT INTO lecture_survey.responses
            (id, lecture_id, gender, age_group, understanding, satisfaction, comment, submitted_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, NULLIF($7, ''), $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(lecture_id)
        .bind(gender)
        .bind(age_group)
        .bind(understanding)
        .bind(satisfaction)
        .bind(comment)
        .bind(submitted_at)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, lecture_id: Uuid, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        gender: Option<String>,
        age_group: Option<String>,
        understanding: Option<f64>,
        satisfaction: Option<f64>,
        comment: Option<String>,
        submitted_at: Option<DateTime<Utc>>,
        source_key: Option<String>,
    }

    let exists: bool = sqlx::query("SELECT EXISTS (SELECT 1 FROM lecture_survey.lectures WHERE id = $1) AS found")
        .bind(lecture_id)
        .fetch_one(pool)
        .await?
        .get("found");
    if !exists {
        anyhow::bail!("lecture {lecture_id} does not exist");
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO lecture_survey.responses
            (id, lecture_id, gender, age_group, understanding, satisfaction, comment, submitted_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, now()), $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(lecture_id)
        .bind(&row.gender)
        .bind(&row.age_group)
        .bind(row.understanding)
        .bind(row.satisfaction)
        .bind(&row.comment)
        .bind(row.submitted_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
