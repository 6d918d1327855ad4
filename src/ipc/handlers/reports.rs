use crate::calc::{self, CourseReport};
use crate::db;
use crate::error::CoreError;
use crate::ipc::params::{
    get_form_type, get_optional_str, get_optional_usize, get_required_str, get_scope, reply,
    require_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Course, FormType};
use crate::{render, sample};
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

fn course_report(conn: &Connection, course: &Course) -> Result<CourseReport, CoreError> {
    let survey =
        db::responses_for_course(conn, &course.id, FormType::Survey).map_err(CoreError::storage)?;
    let feedback = db::responses_for_course(conn, &course.id, FormType::Feedback)
        .map_err(CoreError::storage)?;
    Ok(calc::course_report(course, &survey, &feedback))
}

fn reports_for(conn: &Connection, courses: &[Course]) -> Result<Vec<CourseReport>, CoreError> {
    courses.iter().map(|c| course_report(conn, c)).collect()
}

fn load_course(conn: &Connection, course_id: &str) -> Result<Course, HandlerErr> {
    db::load_course(conn, course_id)
        .map_err(CoreError::storage)?
        .ok_or_else(|| HandlerErr::not_found("course not found"))
}

fn handle_scope_model(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    if let Some(course_id) = get_optional_str(&req.params, "courseId")? {
        let conn = require_db(state)?;
        let course = load_course(conn, &course_id)?;
        let report = course_report(conn, &course)?;
        return Ok(json!({ "courses": [report] }));
    }
    let scope = get_scope(&req.params, &state.config.scope)?;
    let conn = require_db(state)?;
    let courses = db::courses_in_scope(conn, &scope, false).map_err(CoreError::storage)?;
    let reports = reports_for(conn, &courses)?;
    Ok(json!({ "scope": scope, "courses": reports }))
}

fn handle_render(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let scope = get_scope(&req.params, &state.config.scope)?;
    let kind = get_form_type(&req.params, "kind")?;
    let conn = require_db(state)?;
    let courses = db::courses_in_scope(conn, &scope, false).map_err(CoreError::storage)?;
    let reports = reports_for(conn, &courses)?;
    let generated_at = chrono::Utc::now().to_rfc3339();
    let doc = render::render(&scope, &reports, kind, &state.config.layout, &generated_at);
    info!(
        scope = %scope,
        kind = %kind,
        courses = reports.len(),
        pages = doc.page_count(),
        filename = %doc.filename,
        "report rendered"
    );
    Ok(json!(doc))
}

fn handle_samples(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(&req.params, "courseId")?;
    let kind = get_form_type(&req.params, "kind")?;
    let requested = get_optional_usize(&req.params, "size")?;
    let size = sample::effective_size(requested, &state.config.samples);
    let conn = require_db(state)?;
    let course = load_course(conn, &course_id)?;
    let records =
        db::responses_for_course(conn, &course.id, kind).map_err(CoreError::storage)?;
    let picked = sample::sample(&records, size, &mut rand::thread_rng());
    let generated_at = chrono::Utc::now().to_rfc3339();
    let doc = render::render_samples(
        &course,
        kind,
        records.len(),
        &picked,
        &state.config.layout,
        &generated_at,
    );
    info!(
        course_id = %course.id,
        kind = %kind,
        total = records.len(),
        sampled = picked.len(),
        pages = doc.page_count(),
        "samples rendered"
    );
    Ok(json!(doc))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.scopeModel" => Some(reply(&req.id, handle_scope_model(state, req))),
        "reports.render" => Some(reply(&req.id, handle_render(state, req))),
        "reports.samples" => Some(reply(&req.id, handle_samples(state, req))),
        _ => None,
    }
}
