use anyhow::Context;
use rusqlite::{
    params_from_iter, types::Type, types::Value, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::model::{Answer, AnswerRecord, Course, FormType, Question, ScopeKey};

pub const DB_FILE_NAME: &str = "feedback.sqlite3";

pub fn open_db(workspace: &Path, busy_timeout: Duration) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    // Set before any schema statement: other instances may be writing already.
    conn.busy_timeout(busy_timeout)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS counters(
            dept_code TEXT NOT NULL,
            year INTEGER NOT NULL,
            semester INTEGER NOT NULL,
            current INTEGER NOT NULL DEFAULT 0 CHECK(current >= 0),
            PRIMARY KEY(dept_code, year, semester)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            student_id TEXT PRIMARY KEY,
            dept_code TEXT NOT NULL,
            year INTEGER NOT NULL,
            semester INTEGER NOT NULL,
            sequence INTEGER NOT NULL,
            issued_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            course_code TEXT NOT NULL,
            course_name TEXT NOT NULL,
            dept_code TEXT NOT NULL,
            year INTEGER NOT NULL,
            semester INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            survey_questions TEXT NOT NULL DEFAULT '[]',
            feedback_questions TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_scope
         ON courses(dept_code, year, semester, is_active)",
        [],
    )?;

    // The UNIQUE triple is what makes a submission exactly-once across
    // processes; nothing else checks for duplicates.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS responses(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            form_type TEXT NOT NULL CHECK(form_type IN ('survey', 'feedback')),
            answers TEXT NOT NULL,
            recommendation TEXT,
            submitted_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id),
            UNIQUE(course_id, student_id, form_type)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_responses_course
         ON responses(course_id, form_type, submitted_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_responses_student ON responses(student_id)",
        [],
    )?;

    Ok(conn)
}

/// Atomic increment-or-create of the scope's counter. Returns the
/// post-increment value.
pub fn counter_next(conn: &Connection, scope: &ScopeKey) -> rusqlite::Result<i64> {
    conn.query_row(
        "INSERT INTO counters(dept_code, year, semester, current)
         VALUES(?, ?, ?, 1)
         ON CONFLICT(dept_code, year, semester) DO UPDATE SET
           current = current + 1
         RETURNING current",
        (scope.dept_code(), scope.year(), scope.semester()),
        |r| r.get(0),
    )
}

#[cfg(test)]
pub fn counter_current(conn: &Connection, scope: &ScopeKey) -> rusqlite::Result<i64> {
    Ok(conn
        .query_row(
            "SELECT current FROM counters WHERE dept_code = ? AND year = ? AND semester = ?",
            (scope.dept_code(), scope.year(), scope.semester()),
            |r| r.get(0),
        )
        .optional()?
        .unwrap_or(0))
}

pub fn insert_student_identity(
    conn: &Connection,
    student_id: &str,
    scope: &ScopeKey,
    sequence: i64,
    issued_at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO students(student_id, dept_code, year, semester, sequence, issued_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            student_id,
            scope.dept_code(),
            scope.year(),
            scope.semester(),
            sequence,
            issued_at,
        ),
    )?;
    Ok(())
}

pub fn insert_response(conn: &Connection, record: &AnswerRecord) -> rusqlite::Result<()> {
    let answers = serde_json::to_string(&record.answers)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO responses(id, course_id, student_id, form_type, answers, recommendation, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &record.id,
            &record.course_id,
            &record.student_id,
            record.form_type.as_str(),
            &answers,
            &record.recommendation,
            &record.submitted_at,
        ),
    )?;
    Ok(())
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const COURSE_COLUMNS: &str = "id, course_code, course_name, dept_code, year, semester,
    is_active, survey_questions, feedback_questions, created_at";

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: r.get(0)?,
        course_code: r.get(1)?,
        course_name: r.get(2)?,
        dept_code: r.get(3)?,
        year: r.get(4)?,
        semester: r.get(5)?,
        is_active: r.get::<_, i64>(6)? != 0,
        survey_questions: json_column::<Vec<Question>>(r, 7)?,
        feedback_questions: json_column::<Vec<Question>>(r, 8)?,
        created_at: r.get(9)?,
    })
}

pub fn load_course(conn: &Connection, course_id: &str) -> rusqlite::Result<Option<Course>> {
    let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?");
    conn.query_row(&sql, [course_id], course_from_row).optional()
}

pub fn courses_in_scope(
    conn: &Connection,
    scope: &ScopeKey,
    active_only: bool,
) -> rusqlite::Result<Vec<Course>> {
    let sql = format!(
        "SELECT {COURSE_COLUMNS}
         FROM courses
         WHERE dept_code = ? AND year = ? AND semester = ? AND (? = 0 OR is_active = 1)
         ORDER BY course_code, created_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            (
                scope.dept_code(),
                scope.year(),
                scope.semester(),
                active_only as i64,
            ),
            course_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_course(conn: &Connection, course: &Course) -> rusqlite::Result<()> {
    let survey = serde_json::to_string(&course.survey_questions)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let feedback = serde_json::to_string(&course.feedback_questions)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO courses(id, course_code, course_name, dept_code, year, semester,
                             is_active, survey_questions, feedback_questions, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            course.id,
            course.course_code,
            course.course_name,
            course.dept_code,
            course.year,
            course.semester,
            course.is_active as i64,
            survey,
            feedback,
            course.created_at,
        ],
    )?;
    Ok(())
}

/// Writes the mutable course fields. Question sets are replaced whole.
pub fn update_course(conn: &Connection, course: &Course) -> rusqlite::Result<()> {
    let survey = serde_json::to_string(&course.survey_questions)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let feedback = serde_json::to_string(&course.feedback_questions)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "UPDATE courses SET
           course_code = ?,
           course_name = ?,
           is_active = ?,
           survey_questions = ?,
           feedback_questions = ?
         WHERE id = ?",
        (
            &course.course_code,
            &course.course_name,
            course.is_active as i64,
            &survey,
            &feedback,
            &course.id,
        ),
    )?;
    Ok(())
}

/// Deletes a course and, first, every response that references it.
/// Returns the number of responses removed, or None if the course did not exist.
pub fn delete_course(conn: &Connection, course_id: &str) -> rusqlite::Result<Option<usize>> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let exists: Option<i64> = tx
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Ok(None);
    }
    let removed = tx.execute("DELETE FROM responses WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM courses WHERE id = ?", [course_id])?;
    tx.commit()?;
    Ok(Some(removed))
}

pub fn responses_for_course(
    conn: &Connection,
    course_id: &str,
    form_type: FormType,
) -> rusqlite::Result<Vec<AnswerRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, course_id, student_id, answers, recommendation, submitted_at
         FROM responses
         WHERE course_id = ? AND form_type = ?
         ORDER BY submitted_at, id",
    )?;
    let rows = stmt
        .query_map((course_id, form_type.as_str()), |r| {
            Ok(AnswerRecord {
                id: r.get(0)?,
                course_id: r.get(1)?,
                student_id: r.get(2)?,
                form_type,
                answers: json_column::<Vec<Answer>>(r, 3)?,
                recommendation: r.get(4)?,
                submitted_at: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// (course_id, form_type) pairs the student has already submitted among `course_ids`.
pub fn submitted_forms(
    conn: &Connection,
    student_id: &str,
    course_ids: &[String],
) -> rusqlite::Result<HashSet<(String, String)>> {
    if course_ids.is_empty() {
        return Ok(HashSet::new());
    }
    let placeholders = std::iter::repeat("?")
        .take(course_ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "SELECT course_id, form_type
         FROM responses
         WHERE student_id = ? AND course_id IN ({})",
        placeholders
    );
    let mut bind_values: Vec<Value> = Vec::with_capacity(course_ids.len() + 1);
    bind_values.push(Value::Text(student_id.to_string()));
    for id in course_ids {
        bind_values.push(Value::Text(id.clone()));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind_values), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::path::PathBuf;

    pub fn temp_workspace(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    pub fn open(workspace: &Path) -> Connection {
        open_db(workspace, Duration::from_secs(10)).expect("open db")
    }

    pub fn seed_course(
        conn: &Connection,
        survey: &[&str],
        feedback: &[&str],
        active: bool,
    ) -> Course {
        let course = Course {
            id: uuid::Uuid::new_v4().to_string(),
            course_code: "CS101".to_string(),
            course_name: "Programming".to_string(),
            dept_code: "CSE".to_string(),
            year: 2026,
            semester: 1,
            is_active: active,
            survey_questions: survey
                .iter()
                .map(|id| Question::new(id, &format!("Survey {id}")))
                .collect(),
            feedback_questions: feedback
                .iter()
                .map(|id| Question::new(id, &format!("Feedback {id}")))
                .collect(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        insert_course(conn, &course).expect("insert course");
        course
    }
}
