use crate::categories::standard_feedback_questions;
use crate::db;
use crate::error::CoreError;
use crate::ipc::params::{
    get_optional_bool, get_optional_str, get_optional_typed, get_required_str, get_scope, reply,
    require_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Course, Question};
use serde_json::json;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

fn non_empty(raw: &str, key: &str) -> Result<String, HandlerErr> {
    let v = raw.trim();
    if v.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(v.to_string())
}

/// Trims ids and text; ids must be non-empty and distinct within the set.
fn clean_questions(raw: Vec<Question>, key: &str) -> Result<Vec<Question>, HandlerErr> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for q in raw {
        let id = q.question_id.trim();
        let text = q.text.trim();
        if id.is_empty() || text.is_empty() {
            return Err(HandlerErr::bad_params(format!(
                "{}: questionId and text must not be empty",
                key
            )));
        }
        if !seen.insert(id.to_string()) {
            return Err(HandlerErr::bad_params(format!(
                "{}: duplicate questionId {}",
                key, id
            )));
        }
        out.push(Question::new(id, text));
    }
    Ok(out)
}

fn load_existing(conn: &rusqlite::Connection, course_id: &str) -> Result<Course, HandlerErr> {
    db::load_course(conn, course_id)
        .map_err(CoreError::storage)?
        .ok_or_else(|| HandlerErr::not_found("course not found"))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course_code = non_empty(&get_required_str(&req.params, "courseCode")?, "courseCode")?
        .to_ascii_uppercase();
    let course_name = non_empty(&get_required_str(&req.params, "courseName")?, "courseName")?;
    let scope = get_scope(&req.params, &state.config.scope)?;
    let survey_questions = match get_optional_typed(&req.params, "surveyQuestions")? {
        Some(qs) => clean_questions(qs, "surveyQuestions")?,
        None => Vec::new(),
    };
    let feedback_questions = match get_optional_typed(&req.params, "feedbackQuestions")? {
        Some(qs) => clean_questions(qs, "feedbackQuestions")?,
        None => standard_feedback_questions(),
    };
    let is_active = get_optional_bool(&req.params, "isActive")?.unwrap_or(true);
    let conn = require_db(state)?;

    let course = Course {
        id: Uuid::new_v4().to_string(),
        course_code,
        course_name,
        dept_code: scope.dept_code().to_string(),
        year: scope.year(),
        semester: scope.semester(),
        is_active,
        survey_questions,
        feedback_questions,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    db::insert_course(conn, &course).map_err(CoreError::storage)?;
    info!(
        course_id = %course.id,
        course_code = %course.course_code,
        scope = %scope,
        "course created"
    );
    Ok(json!({ "course": course }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(&req.params, "courseId")?;
    let conn = require_db(state)?;
    let mut course = load_existing(conn, &course_id)?;

    if let Some(code) = get_optional_str(&req.params, "courseCode")? {
        course.course_code = non_empty(&code, "courseCode")?.to_ascii_uppercase();
    }
    if let Some(name) = get_optional_str(&req.params, "courseName")? {
        course.course_name = non_empty(&name, "courseName")?;
    }
    if let Some(qs) = get_optional_typed(&req.params, "surveyQuestions")? {
        course.survey_questions = clean_questions(qs, "surveyQuestions")?;
    }
    if let Some(qs) = get_optional_typed(&req.params, "feedbackQuestions")? {
        course.feedback_questions = clean_questions(qs, "feedbackQuestions")?;
    }
    if let Some(active) = get_optional_bool(&req.params, "isActive")? {
        course.is_active = active;
    }

    db::update_course(conn, &course).map_err(CoreError::storage)?;
    info!(course_id = %course.id, "course updated");
    Ok(json!({ "course": course }))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let scope = get_scope(&req.params, &state.config.scope)?;
    let active_only = get_optional_bool(&req.params, "activeOnly")?.unwrap_or(false);
    let conn = require_db(state)?;
    let courses = db::courses_in_scope(conn, &scope, active_only).map_err(CoreError::storage)?;
    Ok(json!({ "courses": courses }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(&req.params, "courseId")?;
    let conn = require_db(state)?;
    let Some(removed) = db::delete_course(conn, &course_id).map_err(CoreError::storage)? else {
        return Err(HandlerErr::not_found("course not found"));
    };
    info!(course_id = %course_id, responses_removed = removed, "course deleted");
    Ok(json!({ "deleted": true, "responsesRemoved": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(reply(&req.id, handle_create(state, req))),
        "courses.update" => Some(reply(&req.id, handle_update(state, req))),
        "courses.list" => Some(reply(&req.id, handle_list(state, req))),
        "courses.delete" => Some(reply(&req.id, handle_delete(state, req))),
        _ => None,
    }
}
