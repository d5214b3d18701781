use thiserror::Error;
use uuid::Uuid;

use crate::models::SurveyStatus;

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("unknown dimension code '{0}'")]
    UnknownDimension(String),

    #[error("invalid dimension pair ({0}, {1})")]
    InvalidDimensionPair(String, String),

    #[error("invalid summary pair: target '{target}' grouped by '{group}'")]
    InvalidSummaryPair { target: String, group: String },

    #[error("invalid status transition {from} -> {to}")]
    InvalidStatusTransition { from: SurveyStatus, to: SurveyStatus },

    #[error("lecture {0} not found")]
    LectureNotFound(Uuid),

    #[error("lecture {id} cannot be closed (status {status})")]
    NotClosable { id: Uuid, status: SurveyStatus },

    #[error("lecture {id} cannot be analyzed (status {status})")]
    NotAnalyzable { id: Uuid, status: SurveyStatus },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SurveyError {
    /// Caller mistakes that no retry can fix. These are never absorbed by the
    /// per-lecture isolation of a cycle.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::UnknownDimension(_)
                | Self::InvalidDimensionPair(..)
                | Self::InvalidSummaryPair { .. }
                | Self::InvalidStatusTransition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SurveyError>;
