use rusqlite::ErrorCode;

use crate::model::FormType;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid scope: {0}")]
    InvalidScope(String),
    #[error("failed to issue sequence number: {0}")]
    IssuanceFailure(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("course not found or inactive")]
    CourseUnavailable,
    #[error("question {0} does not belong to this course")]
    UnknownQuestion(String),
    #[error("please answer all questions: expected {expected}, got {actual}")]
    IncompleteSubmission { expected: usize, actual: usize },
    #[error("answer for {question_id} must be between 1 and 5, got {value}")]
    OutOfRangeValue { question_id: String, value: String },
    #[error("{0} already submitted for this course")]
    AlreadySubmitted(FormType),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidScope(_) => "invalid_scope",
            CoreError::IssuanceFailure(_) => "issuance_failure",
            CoreError::StorageUnavailable(_) => "storage_unavailable",
            CoreError::CourseUnavailable => "course_unavailable",
            CoreError::UnknownQuestion(_) => "unknown_question",
            CoreError::IncompleteSubmission { .. } => "incomplete_submission",
            CoreError::OutOfRangeValue { .. } => "out_of_range_value",
            CoreError::AlreadySubmitted(_) => "already_submitted",
        }
    }

    /// Transient infrastructure failures the caller may retry as-is.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            CoreError::IssuanceFailure(_) | CoreError::StorageUnavailable(_)
        )
    }

    pub fn storage(e: rusqlite::Error) -> Self {
        CoreError::StorageUnavailable(e.to_string())
    }
}

/// True when the store rejected a write because of a UNIQUE or PRIMARY KEY index.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(f, _) => {
            f.code == ErrorCode::ConstraintViolation
                && (f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_message_is_stable_per_form_type() {
        let a = CoreError::AlreadySubmitted(FormType::Survey).to_string();
        let b = CoreError::AlreadySubmitted(FormType::Survey).to_string();
        assert_eq!(a, b);
        assert_eq!(a, "survey already submitted for this course");
        assert_eq!(
            CoreError::AlreadySubmitted(FormType::Feedback).code(),
            "already_submitted"
        );
    }

    #[test]
    fn only_infrastructure_errors_are_retryable() {
        assert!(CoreError::StorageUnavailable("busy".into()).retryable());
        assert!(CoreError::IssuanceFailure("busy".into()).retryable());
        assert!(!CoreError::CourseUnavailable.retryable());
        assert!(!CoreError::AlreadySubmitted(FormType::Feedback).retryable());
    }
}
