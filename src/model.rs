use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ScopeLimits;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Survey,
    Feedback,
}

impl FormType {
    pub fn as_str(self) -> &'static str {
        match self {
            FormType::Survey => "survey",
            FormType::Feedback => "feedback",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "survey" => Some(FormType::Survey),
            "feedback" => Some(FormType::Feedback),
            _ => None,
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cohort key: (department, academic year, semester).
///
/// Only constructed through [`ScopeKey::new`], so a value in hand is always
/// normalised and within bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeKey {
    dept_code: String,
    year: i64,
    semester: i64,
}

impl ScopeKey {
    pub fn new(
        dept_code: &str,
        year: i64,
        semester: i64,
        limits: &ScopeLimits,
    ) -> Result<Self, CoreError> {
        let dept = dept_code.trim().to_ascii_uppercase();
        if dept.is_empty() {
            return Err(CoreError::InvalidScope(
                "deptCode must not be empty".to_string(),
            ));
        }
        if !dept.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::InvalidScope(format!(
                "deptCode must be alphabetic, got {dept}"
            )));
        }
        if year < limits.min_year || year > limits.max_year {
            return Err(CoreError::InvalidScope(format!(
                "year must be between {} and {}, got {year}",
                limits.min_year, limits.max_year
            )));
        }
        if !(1..=8).contains(&semester) {
            return Err(CoreError::InvalidScope(format!(
                "semester must be between 1 and 8, got {semester}"
            )));
        }
        Ok(Self {
            dept_code: dept,
            year,
            semester,
        })
    }

    pub fn dept_code(&self) -> &str {
        &self.dept_code
    }

    pub fn year(&self) -> i64 {
        self.year
    }

    pub fn semester(&self) -> i64 {
        self.semester
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.dept_code, self.year, self.semester)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_id: String,
    pub text: String,
}

impl Question {
    pub fn new(question_id: &str, text: &str) -> Self {
        Self {
            question_id: question_id.to_string(),
            text: text.to_string(),
        }
    }
}

/// One Likert answer. The value stays a plain integer so legacy rows with
/// out-of-domain values still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    pub value: i64,
}

/// An answer as submitted. Any JSON number decodes here; only integers
/// 1..=5 survive validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: String,
    pub value: serde_json::Number,
}

impl SubmittedAnswer {
    pub fn likert(&self) -> Option<i64> {
        self.value.as_i64().filter(|v| (1..=5).contains(v))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub id: String,
    pub course_id: String,
    pub student_id: String,
    pub form_type: FormType,
    pub answers: Vec<Answer>,
    pub recommendation: Option<String>,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub course_code: String,
    pub course_name: String,
    pub dept_code: String,
    pub year: i64,
    pub semester: i64,
    pub is_active: bool,
    pub survey_questions: Vec<Question>,
    pub feedback_questions: Vec<Question>,
    pub created_at: String,
}

impl Course {
    pub fn questions(&self, form_type: FormType) -> &[Question] {
        match form_type {
            FormType::Survey => &self.survey_questions,
            FormType::Feedback => &self.feedback_questions,
        }
    }
}
