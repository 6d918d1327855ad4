use crate::ipc::params::{get_required_str, get_scope, reply, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::{sequence, submission};
use serde_json::json;

fn handle_generate_id(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let scope = get_scope(&req.params, &state.config.scope)?;
    let conn = require_db(state)?;
    let issued = sequence::provision(conn, &scope)?;
    Ok(json!({
        "studentId": issued.student_id,
        "sequence": issued.sequence,
        "issuedAt": issued.issued_at,
    }))
}

fn handle_status(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let student_id = student_id.trim();
    if student_id.is_empty() {
        return Err(HandlerErr::bad_params("studentId must not be empty"));
    }
    let scope = get_scope(&req.params, &state.config.scope)?;
    let conn = require_db(state)?;
    let courses = submission::status(conn, student_id, &scope)?;
    Ok(json!({ "courses": courses }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.generateId" => Some(reply(&req.id, handle_generate_id(state, req))),
        "students.status" => Some(reply(&req.id, handle_status(state, req))),
        _ => None,
    }
}
