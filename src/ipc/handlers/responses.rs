use crate::ipc::params::{
    get_form_type, get_optional_str, get_optional_typed, get_required_str, reply, require_db,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::SubmittedAnswer;
use crate::submission::{self, Submission};
use serde_json::json;

fn handle_submit(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(&req.params, "courseId")?;
    let student_id = get_required_str(&req.params, "studentId")?.trim().to_string();
    if student_id.is_empty() {
        return Err(HandlerErr::bad_params("studentId must not be empty"));
    }
    let form_type = get_form_type(&req.params, "formType")?;
    let answers: Vec<SubmittedAnswer> = get_optional_typed(&req.params, "answers")?
        .ok_or_else(|| HandlerErr::bad_params("missing answers"))?;
    let recommendation = get_optional_str(&req.params, "recommendation")?;
    let conn = require_db(state)?;

    let accepted = submission::submit(
        conn,
        Submission {
            course_id,
            student_id,
            form_type,
            answers,
            recommendation,
        },
    )?;
    Ok(json!(accepted))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "responses.submit" => Some(reply(&req.id, handle_submit(state, req))),
        _ => None,
    }
}
