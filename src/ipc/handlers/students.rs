use crate::engine::Grade;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_required_str, list_students, parse_iso_date, school_exists, student_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params_from_iter, types::Value, Connection};
use serde_json::json;
use uuid::Uuid;

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Grade strings are validated against the closed 15-value set at this
/// boundary; the engine itself degrades on unknown grades rather than erroring.
fn canonical_grade(raw: &str) -> Result<String, HandlerErr> {
    Grade::parse(raw)
        .map(|g| g.as_str().to_string())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("unknown grade: {}", raw),
            details: Some(json!({ "grade": raw })),
        })
}

fn canonical_enrollment(raw: &str) -> Result<String, HandlerErr> {
    let t = raw.trim().to_ascii_lowercase();
    match t.as_str() {
        "new" | "returning" => Ok(t),
        _ => Err(HandlerErr::bad_params(
            "enrollmentStatus must be one of: new, returning",
        )),
    }
}

fn canonical_gender(raw: &str) -> Result<String, HandlerErr> {
    let t = raw.trim().to_ascii_lowercase();
    match t.as_str() {
        "male" | "female" | "other" => Ok(t),
        _ => Err(HandlerErr::bad_params(
            "gender must be one of: male, female, other",
        )),
    }
}

fn students_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    if !school_exists(conn, &school_id)? {
        return Err(HandlerErr::not_found("school not found"));
    }
    let students: Vec<serde_json::Value> = list_students(conn, &school_id)?
        .iter()
        .map(student_json)
        .collect();
    Ok(json!({ "students": students }))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    if !school_exists(conn, &school_id)? {
        return Err(HandlerErr::not_found("school not found"));
    }
    let last_name = get_required_str(params, "lastName")?;
    let first_name = get_required_str(params, "firstName")?;
    let grade = canonical_grade(&get_required_str(params, "grade")?)?;

    let enrollment = match params.get("enrollmentStatus").and_then(|v| v.as_str()) {
        Some(raw) => canonical_enrollment(raw)?,
        None => "returning".to_string(),
    };
    let gender = match params.get("gender").and_then(|v| v.as_str()) {
        Some(raw) => canonical_gender(raw)?,
        None => "other".to_string(),
    };
    let birth_date = match params.get("birthDate").and_then(|v| v.as_str()) {
        Some(raw) => Some(parse_iso_date(raw)?.format("%Y-%m-%d").to_string()),
        None => None,
    };
    let student_no = params
        .get("studentNo")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let active = params.get("active").and_then(|v| v.as_bool()).unwrap_or(true);

    let sort_order: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students WHERE school_id = ?",
            [&school_id],
            |r| r.get(0),
        )
        .map_err(HandlerErr::db_query)?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(
            id, school_id, last_name, first_name, student_no, grade,
            enrollment_status, gender, birth_date, active, sort_order, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &school_id,
            last_name.trim(),
            first_name.trim(),
            &student_no,
            &grade,
            &enrollment,
            &gender,
            &birth_date,
            active as i64,
            sort_order,
            now_stamp(),
        ),
    )
    .map_err(HandlerErr::db_update)?;
    Ok(json!({ "studentId": id }))
}

fn students_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing patch object"));
    };

    let mut columns: Vec<&'static str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    for (key, raw) in patch {
        match key.as_str() {
            "lastName" | "firstName" => {
                let Some(s) = raw.as_str() else {
                    return Err(HandlerErr::bad_params(format!("{} must be a string", key)));
                };
                columns.push(if key == "lastName" {
                    "last_name"
                } else {
                    "first_name"
                });
                values.push(Value::Text(s.trim().to_string()));
            }
            "studentNo" => {
                columns.push("student_no");
                values.push(match raw.as_str() {
                    Some(s) => Value::Text(s.to_string()),
                    None if raw.is_null() => Value::Null,
                    None => return Err(HandlerErr::bad_params("studentNo must be string or null")),
                });
            }
            "grade" => {
                let Some(s) = raw.as_str() else {
                    return Err(HandlerErr::bad_params("grade must be a string"));
                };
                columns.push("grade");
                values.push(Value::Text(canonical_grade(s)?));
            }
            "enrollmentStatus" => {
                let Some(s) = raw.as_str() else {
                    return Err(HandlerErr::bad_params("enrollmentStatus must be a string"));
                };
                columns.push("enrollment_status");
                values.push(Value::Text(canonical_enrollment(s)?));
            }
            "gender" => {
                let Some(s) = raw.as_str() else {
                    return Err(HandlerErr::bad_params("gender must be a string"));
                };
                columns.push("gender");
                values.push(Value::Text(canonical_gender(s)?));
            }
            "birthDate" => {
                columns.push("birth_date");
                values.push(match raw.as_str() {
                    Some(s) => Value::Text(parse_iso_date(s)?.format("%Y-%m-%d").to_string()),
                    None if raw.is_null() => Value::Null,
                    None => return Err(HandlerErr::bad_params("birthDate must be string or null")),
                });
            }
            "active" => {
                let Some(b) = raw.as_bool() else {
                    return Err(HandlerErr::bad_params("active must be a boolean"));
                };
                columns.push("active");
                values.push(Value::Integer(b as i64));
            }
            "sortOrder" => {
                let Some(n) = raw.as_i64() else {
                    return Err(HandlerErr::bad_params("sortOrder must be an integer"));
                };
                columns.push("sort_order");
                values.push(Value::Integer(n));
            }
            other => {
                return Err(HandlerErr {
                    code: "bad_params",
                    message: format!("unknown patch field: {}", other),
                    details: Some(json!({ "field": other })),
                })
            }
        }
    }

    if columns.is_empty() {
        return Err(HandlerErr::bad_params("patch must not be empty"));
    }

    let set_clause = columns
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE students SET {}, updated_at = ? WHERE id = ?",
        set_clause
    );
    values.push(Value::Text(now_stamp()));
    values.push(Value::Text(student_id.clone()));

    let changed = conn
        .execute(&sql, params_from_iter(values))
        .map_err(HandlerErr::db_update)?;
    if changed == 0 {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "ok": true }))
}

fn students_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let tx = conn.unchecked_transaction().map_err(HandlerErr::db_update)?;
    tx.execute(
        "DELETE FROM screening_records WHERE student_id = ?",
        [&student_id],
    )
    .map_err(HandlerErr::db_update)?;
    let changed = tx
        .execute("DELETE FROM students WHERE id = ?", [&student_id])
        .map_err(HandlerErr::db_update)?;
    tx.commit().map_err(HandlerErr::db_update)?;
    if changed == 0 {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "ok": true }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(dispatch(state, req, students_list)),
        "students.create" => Some(dispatch(state, req, students_create)),
        "students.update" => Some(dispatch(state, req, students_update)),
        "students.delete" => Some(dispatch(state, req, students_delete)),
        _ => None,
    }
}
