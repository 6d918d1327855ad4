use rusqlite::Connection;
use serde_json::json;

use crate::config::ScopeLimits;
use crate::error::CoreError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::AppState;
use crate::model::{FormType, ScopeKey};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: "not_found",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<CoreError> for HandlerErr {
    fn from(e: CoreError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            details: Some(json!({ "retryable": e.retryable() })),
        }
    }
}

/// Unwraps a handler body into the reply envelope.
pub fn reply(id: &str, res: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match res {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_optional_bool(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

/// Integer parameter given either as a JSON number or a numeric string.
pub fn get_required_int(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    let v = params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key)))
}

pub fn get_optional_usize(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<usize>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                HandlerErr::bad_params(format!("{} must be a non-negative integer", key))
            }),
    }
}

pub fn get_form_type(params: &serde_json::Value, key: &str) -> Result<FormType, HandlerErr> {
    let raw = get_required_str(params, key)?;
    FormType::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be survey or feedback", key)))
}

/// deptCode + year + semester, validated into a ScopeKey.
pub fn get_scope(params: &serde_json::Value, limits: &ScopeLimits) -> Result<ScopeKey, HandlerErr> {
    let dept = get_required_str(params, "deptCode")?;
    let year = get_required_int(params, "year")?;
    let semester = get_required_int(params, "semester")?;
    Ok(ScopeKey::new(&dept, year, semester, limits)?)
}

/// Optional typed field decoded with serde; a present but malformed value is bad_params.
pub fn get_optional_typed<T: serde::de::DeserializeOwned>(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<T>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| HandlerErr::bad_params(format!("invalid {}: {}", key, e))),
    }
}
