use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_feedbackd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn feedbackd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn is_ok(value: &serde_json::Value) -> bool {
    value.get("ok").and_then(|v| v.as_bool()) == Some(true)
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("feedbackd-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(is_ok(&health));
    assert!(health["result"]["workspacePath"].is_null());

    // Storage-backed methods refuse to run before a workspace is selected.
    let early = request(
        &mut stdin,
        &mut reader,
        "2",
        "students.generateId",
        json!({ "deptCode": "CSE", "year": 2026, "semester": 1 }),
    );
    assert_eq!(error_code(&early), Some("no_workspace"));

    let selected = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(is_ok(&selected), "{}", selected);
    assert!(workspace.join("feedback.sqlite3").is_file());

    let created = request(
        &mut stdin,
        &mut reader,
        "4",
        "courses.create",
        json!({
            "courseCode": "cs101",
            "courseName": "Programming",
            "deptCode": "cse",
            "year": 2026,
            "semester": 1,
            "surveyQuestions": [
                { "questionId": "Q1", "text": "Outcome one" },
                { "questionId": "Q2", "text": "Outcome two" }
            ]
        }),
    );
    assert!(is_ok(&created), "{}", created);
    let course = &created["result"]["course"];
    assert_eq!(course["courseCode"], "CS101");
    assert_eq!(course["deptCode"], "CSE");
    assert_eq!(course["feedbackQuestions"].as_array().map(|a| a.len()), Some(20));
    let course_id = course["id"].as_str().expect("course id").to_string();

    let listed = request(
        &mut stdin,
        &mut reader,
        "5",
        "courses.list",
        json!({ "deptCode": "CSE", "year": "2026", "semester": "1" }),
    );
    assert_eq!(listed["result"]["courses"].as_array().map(|a| a.len()), Some(1));

    let updated = request(
        &mut stdin,
        &mut reader,
        "6",
        "courses.update",
        json!({ "courseId": course_id, "courseName": "Programming I" }),
    );
    assert_eq!(updated["result"]["course"]["courseName"], "Programming I");

    let issued = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.generateId",
        json!({ "deptCode": "CSE", "year": 2026, "semester": 1 }),
    );
    assert_eq!(issued["result"]["studentId"], "CSE20261001");

    let status = request(
        &mut stdin,
        &mut reader,
        "8",
        "students.status",
        json!({ "studentId": "CSE20261001", "deptCode": "CSE", "year": 2026, "semester": 1 }),
    );
    assert_eq!(status["result"]["courses"][0]["surveySubmitted"], false);

    let submitted = request(
        &mut stdin,
        &mut reader,
        "9",
        "responses.submit",
        json!({
            "courseId": course_id,
            "studentId": "CSE20261001",
            "formType": "survey",
            "answers": [
                { "questionId": "Q1", "value": 5 },
                { "questionId": "Q2", "value": 4 }
            ]
        }),
    );
    assert!(is_ok(&submitted), "{}", submitted);
    assert!(submitted["result"]["responseId"].is_string());

    let model = request(
        &mut stdin,
        &mut reader,
        "10",
        "reports.scopeModel",
        json!({ "courseId": course_id }),
    );
    assert_eq!(model["result"]["courses"][0]["survey"]["totalResponses"], 1);

    let rendered = request(
        &mut stdin,
        &mut reader,
        "11",
        "reports.render",
        json!({ "deptCode": "CSE", "year": 2026, "semester": 1, "kind": "survey" }),
    );
    assert_eq!(rendered["result"]["filename"], "CSE_2026_Sem1_survey_Report.pdf");

    let samples = request(
        &mut stdin,
        &mut reader,
        "12",
        "reports.samples",
        json!({ "courseId": course_id, "kind": "survey" }),
    );
    assert_eq!(samples["result"]["filename"], "course_CS101_survey_samples.pdf");

    let deleted = request(
        &mut stdin,
        &mut reader,
        "13",
        "courses.delete",
        json!({ "courseId": course_id }),
    );
    assert_eq!(deleted["result"]["responsesRemoved"], 1);

    let unknown = request(&mut stdin, &mut reader, "14", "grades.explode", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    let health = request(&mut stdin, &mut reader, "15", "health", json!({}));
    assert!(health["result"]["workspacePath"].is_string());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_params_are_rejected_without_side_effects() {
    let workspace = temp_dir("feedbackd-router-params");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let missing = request(&mut stdin, &mut reader, "2", "courses.create", json!({}));
    assert_eq!(error_code(&missing), Some("bad_params"));

    let bad_scope = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.generateId",
        json!({ "deptCode": "C5E", "year": 2026, "semester": 1 }),
    );
    assert_eq!(error_code(&bad_scope), Some("invalid_scope"));
    assert_eq!(bad_scope["error"]["details"]["retryable"], false);

    let bad_semester = request(
        &mut stdin,
        &mut reader,
        "4",
        "students.generateId",
        json!({ "deptCode": "CSE", "year": 2026, "semester": 9 }),
    );
    assert_eq!(error_code(&bad_semester), Some("invalid_scope"));

    let bad_kind = request(
        &mut stdin,
        &mut reader,
        "5",
        "reports.render",
        json!({ "deptCode": "CSE", "year": 2026, "semester": 1, "kind": "exam" }),
    );
    assert_eq!(error_code(&bad_kind), Some("bad_params"));

    let dup_questions = request(
        &mut stdin,
        &mut reader,
        "6",
        "courses.create",
        json!({
            "courseCode": "CS102",
            "courseName": "Data Structures",
            "deptCode": "CSE",
            "year": 2026,
            "semester": 1,
            "surveyQuestions": [
                { "questionId": "Q1", "text": "a" },
                { "questionId": "Q1", "text": "b" }
            ]
        }),
    );
    assert_eq!(error_code(&dup_questions), Some("bad_params"));

    let missing_course = request(
        &mut stdin,
        &mut reader,
        "7",
        "courses.delete",
        json!({ "courseId": "nope" }),
    );
    assert_eq!(error_code(&missing_course), Some("not_found"));

    // Nothing was issued by the rejected calls.
    let issued = request(
        &mut stdin,
        &mut reader,
        "8",
        "students.generateId",
        json!({ "deptCode": "CSE", "year": 2026, "semester": 1 }),
    );
    assert_eq!(issued["result"]["sequence"], 1);

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json reply");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse");
    assert_eq!(error_code(&value), Some("bad_json"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
