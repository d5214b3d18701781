use chrono::{DateTime, Utc};

use crate::models::{Lecture, SurveyStatus};

/// Transitions allowed through an explicit edit: staying put, or closing an
/// active survey. Anything else, `closed -> active` in particular, is refused.
pub fn is_valid_status_transition(from: SurveyStatus, to: SurveyStatus) -> bool {
    from == to || (from == SurveyStatus::Active && to == SurveyStatus::Closed)
}

/// Transitions the pipeline itself may apply: never backwards.
pub fn is_forward_transition(from: SurveyStatus, to: SurveyStatus) -> bool {
    to >= from
}

/// Manual closing is only offered for an active survey whose deadline has not
/// yet passed. Past the deadline the scheduled cycle closes it instead.
pub fn is_closable(lecture: &Lecture, now: DateTime<Utc>) -> bool {
    lecture.survey_status == SurveyStatus::Active && now <= lecture.deadline()
}

pub fn is_due_for_closure(lecture: &Lecture, now: DateTime<Utc>) -> bool {
    lecture.survey_status == SurveyStatus::Active && lecture.deadline() <= now
}

pub fn is_awaiting_analysis(lecture: &Lecture) -> bool {
    lecture.survey_status == SurveyStatus::Closed && lecture.analyzed_at.is_none()
}
