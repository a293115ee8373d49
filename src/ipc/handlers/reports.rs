use crate::engine;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_required_str, list_students, load_record_or_blank, resolve_cycle, school_exists,
    HandlerErr, StudentRow,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn roster(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<(String, String, Vec<StudentRow>), HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let cycle = resolve_cycle(conn, params)?;
    if !school_exists(conn, &school_id)? {
        return Err(HandlerErr::not_found("school not found"));
    }
    let students = list_students(conn, &school_id)?
        .into_iter()
        .filter(|s| s.active)
        .collect();
    Ok((school_id, cycle, students))
}

/// Flat rows for the external CSV/PDF renderer. Column values come straight
/// from one engine evaluation per student; the renderer adds no rules.
fn reports_export(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (school_id, cycle, students) = roster(conn, params)?;

    let mut rows: Vec<serde_json::Value> = Vec::new();
    for student in &students {
        let record = load_record_or_blank(conn, &student.id, &cycle)?;
        let eval = engine::evaluate(&student.profile(), &record);

        let acuity = |v: &Option<String>| v.as_deref().map(engine::format_acuity);
        let rescreens: serde_json::Value = eval
            .categories
            .iter()
            .map(|c| (c.category.as_str().to_string(), json!(c.rescreen_outcome)))
            .collect::<serde_json::Map<_, _>>()
            .into();

        rows.push(json!({
            "studentId": student.id,
            "displayName": student.display_name,
            "studentNo": student.student_no,
            "grade": student.grade,
            "status": eval.status.as_str(),
            "requiredCodes": eval.required.codes(),
            "testsNeeded": eval.tests_needed,
            "failed": eval.failed.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            "needsRescreen": eval.needs_rescreen,
            "hasFailedTest": eval.has_failed_test,
            "rescreens": rescreens,
            "visionRight": acuity(&record.vision_initial.right),
            "visionLeft": acuity(&record.vision_initial.left)
        }));
    }

    Ok(json!({ "schoolId": school_id, "cycle": cycle, "rows": rows }))
}

/// Sticker labels: only students who still owe a required test, with the
/// space-separated category codes printed on the label.
fn reports_labels(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (school_id, cycle, students) = roster(conn, params)?;

    let mut labels: Vec<serde_json::Value> = Vec::new();
    for student in &students {
        let record = load_record_or_blank(conn, &student.id, &cycle)?;
        let eval = engine::evaluate(&student.profile(), &record);
        if eval.tests_needed.is_empty() {
            continue;
        }
        labels.push(json!({
            "studentId": student.id,
            "displayName": student.display_name,
            "grade": student.grade,
            "testsNeeded": eval.tests_needed
        }));
    }

    Ok(json!({ "schoolId": school_id, "cycle": cycle, "labels": labels }))
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
        "reports.export" => Some(dispatch(state, req, reports_export)),
        "reports.labels" => Some(dispatch(state, req, reports_labels)),
        _ => None,
    }
}
