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
    let exe = env!("CARGO_BIN_EXE_screenerd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn screenerd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn eval_status(result: &serde_json::Value) -> String {
    result
        .get("evaluation")
        .and_then(|e| e.get("status"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn eval_flag(result: &serde_json::Value, key: &str) -> bool {
    result
        .get("evaluation")
        .and_then(|e| e.get(key))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[test]
fn screening_record_walks_through_terminal_statuses() {
    let workspace = temp_dir("screener-lifecycle");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "settings.set",
        json!({ "key": "default_cycle", "value": "2025-2026" }),
    );
    let school = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schools.create",
        json!({ "name": "Lifecycle Elementary" }),
    );
    let school_id = school
        .get("schoolId")
        .and_then(|v| v.as_str())
        .expect("schoolId")
        .to_string();
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({
            "schoolId": school_id,
            "lastName": "Alvarez",
            "firstName": "Dana",
            "grade": "1st",
            "gender": "female",
            "birthDate": "2019-02-14"
        }),
    );
    let student_id = student
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();

    // Scenario A: nothing entered, no screening date.
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "screenings.open",
        json!({ "studentId": student_id }),
    );
    assert_eq!(opened.get("exists").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(eval_status(&opened), "not_started");

    // Scenario B: dated but absent, still no field data.
    let absent = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "screenings.update",
        json!({
            "studentId": student_id,
            "patch": { "initialDate": "2025-10-06", "wasAbsent": true }
        }),
    );
    assert_eq!(eval_status(&absent), "absent");

    // Scenario C: vision fails on the right eye, everything else passes.
    let failed = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "screenings.update",
        json!({
            "studentId": student_id,
            "patch": {
                "wasAbsent": false,
                "visionInitialRight": "F",
                "visionInitialLeft": "P",
                "hearingInitialRight1000": "P",
                "hearingInitialRight2000": "P",
                "hearingInitialRight4000": "P",
                "hearingInitialLeft1000": "P",
                "hearingInitialLeft2000": "P",
                "hearingInitialLeft4000": "P",
                "acanthosisInitial": "P"
            }
        }),
    );
    assert_eq!(eval_status(&failed), "incomplete");
    assert!(eval_flag(&failed, "hasFailedTest"));
    assert!(eval_flag(&failed, "needsRescreen"));

    // Scenario D: a passing rescreen completes the record but the initial
    // failure stays flagged.
    let completed = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "screenings.update",
        json!({
            "studentId": student_id,
            "patch": {
                "visionRescreenRight": "P",
                "visionRescreenLeft": "P"
            }
        }),
    );
    assert_eq!(eval_status(&completed), "completed");
    assert!(eval_flag(&completed, "hasFailedTest"));
    assert!(eval_flag(&completed, "allRescreensPassed"));
    assert!(!eval_flag(&completed, "needsRescreen"));
    let vision_outcome = completed
        .get("evaluation")
        .and_then(|e| e.get("categories"))
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("rescreenOutcome"))
        .and_then(|v| v.as_str());
    assert_eq!(vision_outcome, Some("passed"));

    // Forcing an extra category reopens the record; clearing the override
    // defers back to the grade table.
    let forced = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "screenings.setRequired",
        json!({ "studentId": student_id, "category": "scoliosis", "required": true }),
    );
    assert_eq!(eval_status(&forced), "incomplete");
    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "screenings.setRequired",
        json!({ "studentId": student_id, "category": "scoliosis", "required": null }),
    );
    assert_eq!(eval_status(&cleared), "completed");

    // Administrator override wins over everything, and bad values are
    // rejected at the boundary.
    let overridden = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "screenings.setStatusOverride",
        json!({ "studentId": student_id, "status": "absent" }),
    );
    assert_eq!(eval_status(&overridden), "absent");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "12",
        "screenings.setStatusOverride",
        json!({ "studentId": student_id, "status": "done-ish" }),
    );
    assert_eq!(code, "bad_params");
    let restored = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "screenings.setStatusOverride",
        json!({ "studentId": student_id, "status": null }),
    );
    assert_eq!(eval_status(&restored), "completed");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
