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
    let exe = env!("CARGO_BIN_EXE_studyflowd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn studyflowd");
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

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "expected failure: {}",
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn class_create_update_delete_cascades_to_assignments() {
    let workspace = temp_dir("studyflow-crud");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({
            "name": "Algebra",
            "code": "MATH101",
            "schedule": [{ "dayOfWeek": "Monday", "startTime": "09:00", "endTime": "10:15" }]
        }),
    );
    let class_id = created["classId"].as_i64().expect("classId");
    assert_eq!(created["class"]["credits"].as_i64(), Some(3));
    assert_eq!(created["class"]["schedule"].as_array().map(|s| s.len()), Some(1));

    let missing_code = request(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({ "name": "No Code" }),
    );
    assert_eq!(error_code(&missing_code), "bad_params");
    assert_eq!(missing_code["error"]["details"]["field"].as_str(), Some("code"));

    let zero_credits = request(
        &mut stdin,
        &mut reader,
        "4",
        "classes.create",
        json!({ "name": "Free", "code": "FREE0", "credits": 0 }),
    );
    assert_eq!(error_code(&zero_credits), "bad_params");

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.update",
        json!({ "classId": class_id, "patch": { "credits_c": 4, "instructor": "Dr. Ada" } }),
    );
    assert_eq!(updated["class"]["credits"].as_i64(), Some(4));
    assert_eq!(updated["class"]["instructor"].as_str(), Some("Dr. Ada"));
    assert_eq!(updated["class"]["code"].as_str(), Some("MATH101"));
    assert_eq!(updated["class"]["schedule"][0]["startTime"].as_str(), Some("09:00"));

    let hw = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "assignments.create",
        json!({ "title": "HW1", "classId": class_id, "dueDate": "2026-10-21T09:00:00" }),
    );
    let hw_id = hw["assignmentId"].as_i64().expect("assignmentId");

    let listed = request_ok(&mut stdin, &mut reader, "7", "classes.list", json!({}));
    assert_eq!(listed["classes"][0]["assignmentCount"].as_i64(), Some(1));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "classes.delete",
        json!({ "classId": class_id }),
    );
    let gone = request(
        &mut stdin,
        &mut reader,
        "9",
        "classes.get",
        json!({ "classId": class_id }),
    );
    assert_eq!(error_code(&gone), "not_found");
    let orphan = request(
        &mut stdin,
        &mut reader,
        "10",
        "assignments.get",
        json!({ "assignmentId": hw_id }),
    );
    assert_eq!(error_code(&orphan), "not_found");

    let again = request(
        &mut stdin,
        &mut reader,
        "11",
        "classes.delete",
        json!({ "classId": class_id }),
    );
    assert_eq!(error_code(&again), "not_found");

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn assignment_lifecycle_validates_and_tracks_completion() {
    let workspace = temp_dir("studyflow-assignments");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "name": "Biology", "code": "BIO110" }),
    )["classId"]
        .as_i64()
        .expect("classId");

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.create",
        json!({ "title": "Lab", "classId": class_id, "dueDate": "tomorrow-ish" }),
    );
    assert_eq!(error_code(&bad_date), "bad_params");
    assert_eq!(bad_date["error"]["details"]["field"].as_str(), Some("dueDate"));

    let no_class = request(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.create",
        json!({ "title": "Lab", "classId": 999, "dueDate": "2026-10-21T09:00:00" }),
    );
    assert_eq!(error_code(&no_class), "not_found");

    let hw1 = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.create",
        json!({
            "title": "HW1",
            "classId": class_id,
            "dueDate": "2026-10-21T09:00:00",
            "priority": true
        }),
    )["assignmentId"]
        .as_i64()
        .expect("hw1");
    let hw2 = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "assignments.create",
        json!({ "title": "HW2", "classId": class_id.to_string(), "dueDate": "2026-10-17T09:00:00" }),
    )["assignmentId"]
        .as_i64()
        .expect("hw2");

    let now = "2026-10-19T10:00:00";
    let by_due = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "assignments.list",
        json!({ "now": now }),
    );
    let ids: Vec<i64> = by_due["assignments"]
        .as_array()
        .expect("assignments")
        .iter()
        .filter_map(|row| row["assignment"]["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![hw2, hw1]);
    assert_eq!(by_due["assignments"][0]["status"]["status"].as_str(), Some("overdue"));
    assert_eq!(by_due["assignments"][1]["status"]["status"].as_str(), Some("dueSoon"));
    assert_eq!(by_due["assignments"][1]["status"]["days"].as_i64(), Some(2));

    let by_priority = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "assignments.list",
        json!({ "now": now, "filters": { "sortBy": "priority" } }),
    );
    assert_eq!(by_priority["assignments"][0]["assignment"]["id"].as_i64(), Some(hw1));

    let overdue = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "assignments.list",
        json!({ "now": now, "filters": { "status": "overdue", "classId": class_id } }),
    );
    assert_eq!(overdue["assignments"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(overdue["assignments"][0]["assignment"]["id"].as_i64(), Some(hw2));

    let bad_filter = request(
        &mut stdin,
        &mut reader,
        "10",
        "assignments.list",
        json!({ "filters": { "status": "someday" } }),
    );
    assert_eq!(error_code(&bad_filter), "bad_params");

    let done = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "assignments.setCompleted",
        json!({ "assignmentId": hw1, "completed": true, "now": now }),
    );
    assert_eq!(done["assignment"]["completed"].as_bool(), Some(true));
    assert_eq!(done["assignment"]["completedDate"].as_str(), Some(now));

    let graded = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "assignments.setGrade",
        json!({ "assignmentId": hw1, "grade": 92.5 }),
    );
    assert_eq!(graded["assignment"]["grade"].as_f64(), Some(92.5));

    let out_of_range = request(
        &mut stdin,
        &mut reader,
        "13",
        "assignments.setGrade",
        json!({ "assignmentId": hw1, "grade": 101 }),
    );
    assert_eq!(error_code(&out_of_range), "bad_params");

    let completed_only = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "assignments.list",
        json!({ "now": now, "filters": { "status": "completed" } }),
    );
    assert_eq!(completed_only["assignments"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(
        completed_only["assignments"][0]["status"]["status"].as_str(),
        Some("completed")
    );

    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "assignments.setCompleted",
        json!({ "assignmentId": hw1, "completed": false, "now": now }),
    );
    assert_eq!(reopened["assignment"]["completed"].as_bool(), Some(false));
    assert!(reopened["assignment"]["completedDate"].is_null());

    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "assignments.setGrade",
        json!({ "assignmentId": hw1, "grade": null }),
    );
    assert!(cleared["assignment"]["grade"].is_null());

    let renamed = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "assignments.update",
        json!({ "assignmentId": hw2, "patch": { "title_c": "HW2 revised" } }),
    );
    assert_eq!(renamed["assignment"]["title"].as_str(), Some("HW2 revised"));
    assert_eq!(renamed["assignment"]["dueDate"].as_str(), Some("2026-10-17T09:00:00"));

    let bad_patch = request(
        &mut stdin,
        &mut reader,
        "18",
        "assignments.update",
        json!({ "assignmentId": hw2, "patch": { "dueDate": "whenever" } }),
    );
    assert_eq!(error_code(&bad_patch), "bad_params");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "assignments.delete",
        json!({ "assignmentId": hw2 }),
    );
    let missing = request(
        &mut stdin,
        &mut reader,
        "20",
        "assignments.delete",
        json!({ "assignmentId": hw2 }),
    );
    assert_eq!(error_code(&missing), "not_found");

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}
