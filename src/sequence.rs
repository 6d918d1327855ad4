//! Sequence numbers and student identities per cohort.
//!
//! The counter increment is a single `INSERT .. ON CONFLICT .. RETURNING`
//! statement, so any number of processes sharing the store get distinct,
//! gapless numbers without an in-process lock.

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db;
use crate::error::{is_unique_violation, CoreError};
use crate::model::ScopeKey;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedIdentity {
    pub student_id: String,
    pub sequence: i64,
    pub scope: ScopeKey,
    pub issued_at: String,
}

pub fn issue(conn: &Connection, scope: &ScopeKey) -> Result<i64, CoreError> {
    db::counter_next(conn, scope).map_err(|e| {
        warn!(scope = %scope, error = %e, "sequence increment failed");
        CoreError::IssuanceFailure(e.to_string())
    })
}

/// `<DEPT><YEAR><SEM><SEQ3>`, e.g. `CSE202611023`.
pub fn compose_identity(scope: &ScopeKey, sequence: i64) -> String {
    format!(
        "{}{}{}{:03}",
        scope.dept_code(),
        scope.year(),
        scope.semester(),
        sequence
    )
}

/// Issues the next sequence number for `scope` and records the derived identity.
///
/// An identity row that already exists is not an error.
pub fn provision(conn: &Connection, scope: &ScopeKey) -> Result<IssuedIdentity, CoreError> {
    let sequence = issue(conn, scope)?;
    let student_id = compose_identity(scope, sequence);
    let issued_at = chrono::Utc::now().to_rfc3339();

    match db::insert_student_identity(conn, &student_id, scope, sequence, &issued_at) {
        Ok(()) => {}
        Err(e) if is_unique_violation(&e) => {
            debug!(student_id = %student_id, "identity already recorded");
        }
        Err(e) => {
            // The sequence number is spent; the gap is tolerated.
            warn!(student_id = %student_id, error = %e, "identity persistence failed");
            return Err(CoreError::IssuanceFailure(e.to_string()));
        }
    }

    info!(student_id = %student_id, scope = %scope, sequence, "student identity issued");
    Ok(IssuedIdentity {
        student_id,
        sequence,
        scope: scope.clone(),
        issued_at,
    })
}
