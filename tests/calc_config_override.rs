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

#[test]
fn config_defaults_updates_and_persists_per_workspace() {
    let workspace = temp_dir("studyflow-calc-config");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        let selected = request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        assert_eq!(
            selected["config"],
            json!({
                "dueSoonDays": 3,
                "upcomingWindowDays": 7,
                "upcomingLimit": 5,
                "defaultCredits": 3
            })
        );

        let updated = request_ok(
            &mut stdin,
            &mut reader,
            "2",
            "calc.config.update",
            json!({ "defaultCredits": 4, "upcomingLimit": 2 }),
        );
        assert_eq!(updated["config"]["defaultCredits"].as_i64(), Some(4));
        assert_eq!(updated["config"]["upcomingLimit"].as_i64(), Some(2));
        assert_eq!(updated["config"]["dueSoonDays"].as_i64(), Some(3));

        let rejected = request(
            &mut stdin,
            &mut reader,
            "3",
            "calc.config.update",
            json!({ "dueSoonDays": 0 }),
        );
        assert_eq!(rejected.get("ok").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(rejected["error"]["code"].as_str(), Some("bad_params"));

        // New classes without credits pick up the configured default.
        let created = request_ok(
            &mut stdin,
            &mut reader,
            "4",
            "classes.create",
            json!({ "name": "Seminar", "code": "SEM300" }),
        );
        assert_eq!(created["class"]["credits"].as_i64(), Some(4));

        let _ = child.kill();
    }

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let config = request_ok(&mut stdin, &mut reader, "2", "calc.config.get", json!({}));
    assert_eq!(config["config"]["defaultCredits"].as_i64(), Some(4));
    assert_eq!(config["config"]["upcomingLimit"].as_i64(), Some(2));
    assert_eq!(config["config"]["dueSoonDays"].as_i64(), Some(3));

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn upcoming_limit_caps_the_dashboard_list() {
    let workspace = temp_dir("studyflow-upcoming-limit");
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
        json!({ "name": "Writing", "code": "WRT101" }),
    )["classId"]
        .as_i64()
        .expect("classId");
    for day in 20..=24 {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("a{}", day),
            "assignments.create",
            json!({
                "title": format!("Draft {}", day),
                "classId": class_id,
                "dueDate": format!("2026-10-{}T09:00:00", day)
            }),
        );
    }

    let now = json!({ "now": "2026-10-19T10:00:00" });
    let full = request_ok(&mut stdin, &mut reader, "3", "calc.dashboard", now.clone());
    assert_eq!(full["summary"]["upcoming"].as_array().map(|u| u.len()), Some(5));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "calc.config.update",
        json!({ "upcomingLimit": 2, "upcomingWindowDays": 3 }),
    );
    let capped = request_ok(&mut stdin, &mut reader, "5", "calc.dashboard", now);
    let titles: Vec<&str> = capped["summary"]["upcoming"]
        .as_array()
        .expect("upcoming")
        .iter()
        .filter_map(|u| u["assignment"]["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Draft 20", "Draft 21"]);
    assert_eq!(capped["summary"]["upcomingAssignments"].as_i64(), Some(5));

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}
