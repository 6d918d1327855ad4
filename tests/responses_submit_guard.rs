use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Barrier};
use std::thread;
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
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> String {
    value["error"]["code"].as_str().unwrap_or("").to_string()
}

fn open_workspace(workspace: &PathBuf) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    (child, stdin, reader)
}

fn create_survey_course(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    question_count: usize,
) -> String {
    let questions: Vec<_> = (1..=question_count)
        .map(|i| json!({ "questionId": format!("Q{}", i), "text": format!("Outcome {}", i) }))
        .collect();
    let created = request_ok(
        stdin,
        reader,
        "create",
        "courses.create",
        json!({
            "courseCode": "CS201",
            "courseName": "Operating Systems",
            "deptCode": "CSE",
            "year": 2026,
            "semester": 3,
            "surveyQuestions": questions
        }),
    );
    created["course"]["id"].as_str().expect("course id").to_string()
}

fn answers(values: &[i64]) -> serde_json::Value {
    json!(values
        .iter()
        .enumerate()
        .map(|(i, v)| json!({ "questionId": format!("Q{}", i + 1), "value": v }))
        .collect::<Vec<_>>())
}

fn response_rows(workspace: &PathBuf) -> i64 {
    let conn = rusqlite::Connection::open(workspace.join("feedback.sqlite3")).expect("open db");
    conn.query_row("SELECT COUNT(*) FROM responses", [], |r| r.get(0))
        .expect("count responses")
}

#[test]
fn validation_failures_store_nothing() {
    let workspace = temp_dir("feedbackd-submit-validation");
    let (mut child, mut stdin, mut reader) = open_workspace(&workspace);
    let course_id = create_survey_course(&mut stdin, &mut reader, 5);

    let incomplete = request(
        &mut stdin,
        &mut reader,
        "1",
        "responses.submit",
        json!({
            "courseId": course_id,
            "studentId": "CSE20263001",
            "formType": "survey",
            "answers": answers(&[4, 4, 4, 4])
        }),
    );
    assert_eq!(error_code(&incomplete), "incomplete_submission");
    assert_eq!(incomplete["error"]["details"]["retryable"], false);

    let out_of_range = request(
        &mut stdin,
        &mut reader,
        "2",
        "responses.submit",
        json!({
            "courseId": course_id,
            "studentId": "CSE20263001",
            "formType": "survey",
            "answers": answers(&[4, 4, 6, 4, 4])
        }),
    );
    assert_eq!(error_code(&out_of_range), "out_of_range_value");

    let fractional = request(
        &mut stdin,
        &mut reader,
        "2b",
        "responses.submit",
        json!({
            "courseId": course_id,
            "studentId": "CSE20263001",
            "formType": "survey",
            "answers": [
                { "questionId": "Q1", "value": 4 },
                { "questionId": "Q2", "value": 3.5 },
                { "questionId": "Q3", "value": 4 },
                { "questionId": "Q4", "value": 1e20 },
                { "questionId": "Q5", "value": 4 }
            ]
        }),
    );
    assert_eq!(error_code(&fractional), "out_of_range_value");
    assert!(fractional["error"]["message"]
        .as_str()
        .expect("message")
        .contains("Q2"));

    let unknown = request(
        &mut stdin,
        &mut reader,
        "3",
        "responses.submit",
        json!({
            "courseId": course_id,
            "studentId": "CSE20263001",
            "formType": "survey",
            "answers": [{ "questionId": "FQ1", "value": 3 }]
        }),
    );
    assert_eq!(error_code(&unknown), "unknown_question");

    let no_course = request(
        &mut stdin,
        &mut reader,
        "4",
        "responses.submit",
        json!({
            "courseId": "missing",
            "studentId": "CSE20263001",
            "formType": "survey",
            "answers": answers(&[4])
        }),
    );
    assert_eq!(error_code(&no_course), "course_unavailable");

    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "courses.update",
        json!({ "courseId": course_id, "isActive": false }),
    );
    let inactive = request(
        &mut stdin,
        &mut reader,
        "6",
        "responses.submit",
        json!({
            "courseId": course_id,
            "studentId": "CSE20263001",
            "formType": "survey",
            "answers": answers(&[4, 4, 4, 4, 4])
        }),
    );
    assert_eq!(error_code(&inactive), "course_unavailable");

    assert_eq!(response_rows(&workspace), 0);
    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn second_submission_is_already_submitted() {
    let workspace = temp_dir("feedbackd-submit-duplicate");
    let (mut child, mut stdin, mut reader) = open_workspace(&workspace);
    let course_id = create_survey_course(&mut stdin, &mut reader, 3);

    let params = json!({
        "courseId": course_id,
        "studentId": "CSE20263001",
        "formType": "survey",
        "answers": answers(&[5, 4, 3])
    });
    request_ok(&mut stdin, &mut reader, "1", "responses.submit", params.clone());
    let again = request(&mut stdin, &mut reader, "2", "responses.submit", params);
    assert_eq!(error_code(&again), "already_submitted");
    assert_eq!(again["error"]["message"], "survey already submitted for this course");

    let status = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.status",
        json!({ "studentId": "CSE20263001", "deptCode": "CSE", "year": 2026, "semester": 3 }),
    );
    assert_eq!(status["courses"][0]["surveySubmitted"], true);
    assert_eq!(status["courses"][0]["feedbackSubmitted"], false);

    assert_eq!(response_rows(&workspace), 1);
    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn racing_sidecars_admit_exactly_one_submission() {
    const SIDECARS: usize = 4;
    let workspace = temp_dir("feedbackd-submit-race");
    let course_id = {
        let (mut child, mut stdin, mut reader) = open_workspace(&workspace);
        let id = create_survey_course(&mut stdin, &mut reader, 2);
        drop(stdin);
        let _ = child.wait();
        id
    };

    let barrier = Arc::new(Barrier::new(SIDECARS));
    let handles: Vec<_> = (0..SIDECARS)
        .map(|w| {
            let workspace = workspace.clone();
            let course_id = course_id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let (mut child, mut stdin, mut reader) = open_workspace(&workspace);
                barrier.wait();
                let value = request(
                    &mut stdin,
                    &mut reader,
                    &format!("race-{}", w),
                    "responses.submit",
                    json!({
                        "courseId": course_id,
                        "studentId": "CSE20263007",
                        "formType": "survey",
                        "answers": answers(&[1 + w as i64 % 5, 3])
                    }),
                );
                drop(stdin);
                let _ = child.wait();
                value
            })
        })
        .collect();

    let results: Vec<serde_json::Value> = handles
        .into_iter()
        .map(|h| h.join().expect("sidecar worker"))
        .collect();
    let accepted = results
        .iter()
        .filter(|v| v["ok"].as_bool() == Some(true))
        .count();
    let duplicates = results
        .iter()
        .filter(|v| error_code(v) == "already_submitted")
        .count();
    assert_eq!(accepted, 1, "{:?}", results);
    assert_eq!(duplicates, SIDECARS - 1, "{:?}", results);
    assert_eq!(response_rows(&workspace), 1);
    let _ = std::fs::remove_dir_all(workspace);
}
