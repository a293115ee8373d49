use crate::engine::{self, ScreeningStatus};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_required_str, get_student, load_record, load_record_or_blank, parse_iso_date, record_json,
    resolve_cycle, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params_from_iter, types::Value, Connection};
use serde_json::json;
use uuid::Uuid;

/// Patchable result-token fields, keyed the way the editing UI sends them.
const SLOT_FIELDS: &[(&str, &str)] = &[
    ("visionInitialRight", "vision_initial_right"),
    ("visionInitialLeft", "vision_initial_left"),
    ("visionInitialOverall", "vision_initial_overall"),
    ("visionInitialScreener", "vision_initial_screener"),
    ("visionRescreenRight", "vision_rescreen_right"),
    ("visionRescreenLeft", "vision_rescreen_left"),
    ("visionRescreenOverall", "vision_rescreen_overall"),
    ("visionRescreenScreener", "vision_rescreen_screener"),
    ("hearingInitialRight1000", "hearing_initial_right_1000"),
    ("hearingInitialRight2000", "hearing_initial_right_2000"),
    ("hearingInitialRight4000", "hearing_initial_right_4000"),
    ("hearingInitialLeft1000", "hearing_initial_left_1000"),
    ("hearingInitialLeft2000", "hearing_initial_left_2000"),
    ("hearingInitialLeft4000", "hearing_initial_left_4000"),
    ("hearingInitialOverall", "hearing_initial_overall"),
    ("hearingRescreenRight1000", "hearing_rescreen_right_1000"),
    ("hearingRescreenRight2000", "hearing_rescreen_right_2000"),
    ("hearingRescreenRight4000", "hearing_rescreen_right_4000"),
    ("hearingRescreenLeft1000", "hearing_rescreen_left_1000"),
    ("hearingRescreenLeft2000", "hearing_rescreen_left_2000"),
    ("hearingRescreenLeft4000", "hearing_rescreen_left_4000"),
    ("hearingRescreenOverall", "hearing_rescreen_overall"),
    ("acanthosisInitial", "acanthosis_initial"),
    ("acanthosisRescreen", "acanthosis_rescreen"),
    ("scoliosisInitial", "scoliosis_initial"),
    ("scoliosisRescreen", "scoliosis_rescreen"),
];

fn slot_column(key: &str) -> Option<&'static str> {
    SLOT_FIELDS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, col)| *col)
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Records are created lazily on first write for a (student, cycle) pair.
fn ensure_record(conn: &Connection, student_id: &str, cycle: &str) -> Result<(), HandlerErr> {
    conn.execute(
        "INSERT OR IGNORE INTO screening_records(id, student_id, cycle, was_absent)
         VALUES(?, ?, ?, 0)",
        (Uuid::new_v4().to_string(), student_id, cycle),
    )
    .map_err(HandlerErr::db_update)?;
    Ok(())
}

fn evaluation_json(
    conn: &Connection,
    student_id: &str,
    cycle: &str,
) -> Result<serde_json::Value, HandlerErr> {
    let student = get_student(conn, student_id)?;
    let record = load_record_or_blank(conn, student_id, cycle)?;
    let eval = engine::evaluate(&student.profile(), &record);
    serde_json::to_value(eval).map_err(HandlerErr::db_query)
}

fn screenings_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let cycle = resolve_cycle(conn, params)?;
    let student = get_student(conn, &student_id)?;
    let stored = load_record(conn, &student_id, &cycle)?;
    let exists = stored.is_some();
    let record = stored.unwrap_or_default();
    let eval = engine::evaluate(&student.profile(), &record);
    Ok(json!({
        "studentId": student_id,
        "cycle": cycle,
        "exists": exists,
        "record": record_json(&record),
        "evaluation": serde_json::to_value(eval).map_err(HandlerErr::db_query)?
    }))
}

fn screenings_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let cycle = resolve_cycle(conn, params)?;
    // Validates the student exists before creating a row for them.
    let _ = get_student(conn, &student_id)?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing patch object"));
    };

    let mut columns: Vec<&'static str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    for (key, raw) in patch {
        match key.as_str() {
            "wasAbsent" => {
                let Some(b) = raw.as_bool() else {
                    return Err(HandlerErr::bad_params("wasAbsent must be a boolean"));
                };
                columns.push("was_absent");
                values.push(Value::Integer(b as i64));
            }
            "initialDate" => {
                columns.push("initial_date");
                values.push(match raw.as_str() {
                    Some(s) => Value::Text(parse_iso_date(s)?.format("%Y-%m-%d").to_string()),
                    None if raw.is_null() => Value::Null,
                    None => {
                        return Err(HandlerErr::bad_params("initialDate must be string or null"))
                    }
                });
            }
            other => {
                let Some(col) = slot_column(other) else {
                    return Err(HandlerErr {
                        code: "bad_params",
                        message: format!("unknown screening field: {}", other),
                        details: Some(json!({ "field": other })),
                    });
                };
                columns.push(col);
                values.push(match raw.as_str() {
                    Some(s) => Value::Text(s.to_string()),
                    None if raw.is_null() => Value::Null,
                    None => {
                        return Err(HandlerErr::bad_params(format!(
                            "{} must be string or null",
                            other
                        )))
                    }
                });
            }
        }
    }

    if columns.is_empty() {
        return Err(HandlerErr::bad_params("patch must not be empty"));
    }

    ensure_record(conn, &student_id, &cycle)?;

    let set_clause = columns
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE screening_records SET {}, updated_at = ? WHERE student_id = ? AND cycle = ?",
        set_clause
    );
    values.push(Value::Text(now_stamp()));
    values.push(Value::Text(student_id.clone()));
    values.push(Value::Text(cycle.clone()));
    conn.execute(&sql, params_from_iter(values))
        .map_err(HandlerErr::db_update)?;

    Ok(json!({
        "studentId": student_id,
        "cycle": cycle,
        "evaluation": evaluation_json(conn, &student_id, &cycle)?
    }))
}

fn screenings_set_required(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let cycle = resolve_cycle(conn, params)?;
    let _ = get_student(conn, &student_id)?;
    let category = get_required_str(params, "category")?;
    let column = match category.trim().to_ascii_lowercase().as_str() {
        "vision" => "vision_required",
        "hearing" => "hearing_required",
        "acanthosis" => "acanthosis_required",
        "scoliosis" => "scoliosis_required",
        other => {
            return Err(HandlerErr {
                code: "bad_params",
                message: "category must be one of: vision, hearing, acanthosis, scoliosis"
                    .to_string(),
                details: Some(json!({ "category": other })),
            })
        }
    };

    // Tri-state: true/false forces the category on or off, null defers back
    // to the grade-table computation.
    let value = match params.get("required") {
        None => return Err(HandlerErr::bad_params("missing required (boolean or null)")),
        Some(v) if v.is_null() => Value::Null,
        Some(v) => match v.as_bool() {
            Some(b) => Value::Integer(b as i64),
            None => return Err(HandlerErr::bad_params("required must be boolean or null")),
        },
    };

    ensure_record(conn, &student_id, &cycle)?;
    let sql = format!(
        "UPDATE screening_records SET {} = ?, updated_at = ? WHERE student_id = ? AND cycle = ?",
        column
    );
    conn.execute(
        &sql,
        params_from_iter([
            value,
            Value::Text(now_stamp()),
            Value::Text(student_id.clone()),
            Value::Text(cycle.clone()),
        ]),
    )
    .map_err(HandlerErr::db_update)?;

    Ok(json!({
        "studentId": student_id,
        "cycle": cycle,
        "evaluation": evaluation_json(conn, &student_id, &cycle)?
    }))
}

fn screenings_set_status_override(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let cycle = resolve_cycle(conn, params)?;
    let _ = get_student(conn, &student_id)?;

    // The engine quietly ignores unknown override values on stored records;
    // new writes are rejected here so bad values never get stored at all.
    let value = match params.get("status") {
        None => return Err(HandlerErr::bad_params("missing status (string or null)")),
        Some(v) if v.is_null() => Value::Null,
        Some(v) => match v.as_str().and_then(ScreeningStatus::parse) {
            Some(status) => Value::Text(status.as_str().to_string()),
            None => {
                return Err(HandlerErr::bad_params(
                    "status must be one of: not_started, incomplete, completed, absent",
                ))
            }
        },
    };

    ensure_record(conn, &student_id, &cycle)?;
    conn.execute(
        "UPDATE screening_records SET status_override = ?, updated_at = ?
         WHERE student_id = ? AND cycle = ?",
        params_from_iter([
            value,
            Value::Text(now_stamp()),
            Value::Text(student_id.clone()),
            Value::Text(cycle.clone()),
        ]),
    )
    .map_err(HandlerErr::db_update)?;

    Ok(json!({
        "studentId": student_id,
        "cycle": cycle,
        "evaluation": evaluation_json(conn, &student_id, &cycle)?
    }))
}

fn screenings_evaluate(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let cycle = resolve_cycle(conn, params)?;
    Ok(json!({
        "studentId": student_id,
        "cycle": cycle,
        "evaluation": evaluation_json(conn, &student_id, &cycle)?
    }))
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
        "screenings.open" => Some(dispatch(state, req, screenings_open)),
        "screenings.update" => Some(dispatch(state, req, screenings_update)),
        "screenings.setRequired" => Some(dispatch(state, req, screenings_set_required)),
        "screenings.setStatusOverride" => {
            Some(dispatch(state, req, screenings_set_status_override))
        }
        "screenings.evaluate" => Some(dispatch(state, req, screenings_evaluate)),
        _ => None,
    }
}
