use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::{is_unique_violation, CoreError};
use crate::model::{Answer, AnswerRecord, FormType, ScopeKey, SubmittedAnswer};

#[derive(Debug, Clone)]
pub struct Submission {
    pub course_id: String,
    pub student_id: String,
    pub form_type: FormType,
    pub answers: Vec<SubmittedAnswer>,
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub response_id: String,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseStatus {
    pub course_id: String,
    pub course_code: String,
    pub course_name: String,
    pub survey_submitted: bool,
    pub feedback_submitted: bool,
}

/// Validates a submission and inserts it.
///
/// Preconditions are checked in a fixed order and short-circuit. Duplicates
/// are never pre-checked: the UNIQUE(course, student, form) index rejects
/// the losing insert and that rejection becomes `AlreadySubmitted`.
pub fn submit(conn: &Connection, sub: Submission) -> Result<Accepted, CoreError> {
    let course = db::load_course(conn, &sub.course_id).map_err(CoreError::storage)?;
    let Some(course) = course.filter(|c| c.is_active) else {
        return reject(&sub, CoreError::CourseUnavailable);
    };
    let questions = course.questions(sub.form_type);
    if questions.is_empty() {
        return reject(&sub, CoreError::CourseUnavailable);
    }

    let known: HashSet<&str> = questions.iter().map(|q| q.question_id.as_str()).collect();
    if let Some(a) = sub
        .answers
        .iter()
        .find(|a| !known.contains(a.question_id.as_str()))
    {
        let e = CoreError::UnknownQuestion(a.question_id.clone());
        return reject(&sub, e);
    }

    let answered: HashSet<&str> = sub.answers.iter().map(|a| a.question_id.as_str()).collect();
    if sub.answers.len() != questions.len() || answered.len() != questions.len() {
        let e = CoreError::IncompleteSubmission {
            expected: questions.len(),
            actual: answered.len(),
        };
        return reject(&sub, e);
    }

    let mut answers = Vec::with_capacity(sub.answers.len());
    for a in &sub.answers {
        let Some(value) = a.likert() else {
            let e = CoreError::OutOfRangeValue {
                question_id: a.question_id.clone(),
                value: a.value.to_string(),
            };
            return reject(&sub, e);
        };
        answers.push(Answer {
            question_id: a.question_id.clone(),
            value,
        });
    }

    let recommendation = match sub.form_type {
        FormType::Feedback => sub
            .recommendation
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        FormType::Survey => None,
    };

    let record = AnswerRecord {
        id: Uuid::new_v4().to_string(),
        course_id: sub.course_id,
        student_id: sub.student_id,
        form_type: sub.form_type,
        answers,
        recommendation,
        submitted_at: chrono::Utc::now().to_rfc3339(),
    };

    match db::insert_response(conn, &record) {
        Ok(()) => {}
        Err(e) if is_unique_violation(&e) => {
            info!(
                course_id = %record.course_id,
                student_id = %record.student_id,
                form_type = %record.form_type,
                "duplicate submission rejected"
            );
            return Err(CoreError::AlreadySubmitted(record.form_type));
        }
        Err(e) => {
            warn!(course_id = %record.course_id, error = %e, "response insert failed");
            return Err(CoreError::storage(e));
        }
    }

    info!(
        course_id = %record.course_id,
        student_id = %record.student_id,
        form_type = %record.form_type,
        response_id = %record.id,
        "submission accepted"
    );
    Ok(Accepted {
        response_id: record.id,
        submitted_at: record.submitted_at,
    })
}

fn reject(sub: &Submission, e: CoreError) -> Result<Accepted, CoreError> {
    info!(
        course_id = %sub.course_id,
        student_id = %sub.student_id,
        form_type = %sub.form_type,
        reason = e.code(),
        "submission rejected"
    );
    Err(e)
}

/// Which forms the student has submitted for each active course in scope.
pub fn status(
    conn: &Connection,
    student_id: &str,
    scope: &ScopeKey,
) -> Result<Vec<CourseStatus>, CoreError> {
    let courses = db::courses_in_scope(conn, scope, true).map_err(CoreError::storage)?;
    let ids: Vec<String> = courses.iter().map(|c| c.id.clone()).collect();
    let done = db::submitted_forms(conn, student_id, &ids).map_err(CoreError::storage)?;
    let has = |course_id: &str, form: FormType| {
        done.contains(&(course_id.to_string(), form.as_str().to_string()))
    };
    Ok(courses
        .iter()
        .map(|c| CourseStatus {
            course_id: c.id.clone(),
            course_code: c.course_code.clone(),
            course_name: c.course_name.clone(),
            survey_submitted: has(&c.id, FormType::Survey),
            feedback_submitted: has(&c.id, FormType::Feedback),
        })
        .collect())
}
