use crate::config::ServiceConfig;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    // A broken config file must not prevent the workspace from opening.
    let config = match ServiceConfig::load(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(
                workspace = %path.to_string_lossy(),
                error = %reason,
                "ignoring workspace config"
            );
            ServiceConfig::default().with_env_overrides()
        }
    };

    match db::open_db(&path, Duration::from_millis(config.storage.busy_timeout_ms)) {
        Ok(conn) => {
            info!(workspace = %path.to_string_lossy(), "workspace opened");
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            state.config = config;
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(workspace = %path.to_string_lossy(), error = %reason, "workspace open failed");
            err(
                &req.id,
                "storage_unavailable",
                reason,
                Some(json!({ "retryable": true })),
            )
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
