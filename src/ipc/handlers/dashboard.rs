use crate::engine::{self, Category, Grade, ScreeningStatus};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_required_str, list_students, load_record_or_blank, resolve_cycle, school_exists,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

#[derive(Default)]
struct StatusTally {
    total: i64,
    not_started: i64,
    incomplete: i64,
    completed: i64,
    absent: i64,
}

impl StatusTally {
    fn bump(&mut self, status: ScreeningStatus) {
        self.total += 1;
        match status {
            ScreeningStatus::NotStarted => self.not_started += 1,
            ScreeningStatus::Incomplete => self.incomplete += 1,
            ScreeningStatus::Completed => self.completed += 1,
            ScreeningStatus::Absent => self.absent += 1,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "total": self.total,
            "notStarted": self.not_started,
            "incomplete": self.incomplete,
            "completed": self.completed,
            "absent": self.absent
        })
    }
}

/// Aggregates one evaluation per active student; every counter on the
/// dashboard derives from the same engine pass the badge and exports use.
fn dashboard_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let cycle = resolve_cycle(conn, params)?;
    if !school_exists(conn, &school_id)? {
        return Err(HandlerErr::not_found("school not found"));
    }

    let mut overall = StatusTally::default();
    let mut by_grade: HashMap<String, StatusTally> = HashMap::new();
    let mut needs_rescreen = 0_i64;
    let mut has_failed = 0_i64;
    let mut failed_by_category: HashMap<Category, i64> = HashMap::new();
    let mut acuity_referrals = 0_i64;

    for student in list_students(conn, &school_id)? {
        if !student.active {
            continue;
        }
        let record = load_record_or_blank(conn, &student.id, &cycle)?;
        let eval = engine::evaluate(&student.profile(), &record);

        overall.bump(eval.status);
        by_grade
            .entry(student.grade.clone())
            .or_default()
            .bump(eval.status);

        if eval.needs_rescreen {
            needs_rescreen += 1;
        }
        if eval.has_failed_test {
            has_failed += 1;
        }
        for cat in &eval.failed {
            *failed_by_category.entry(*cat).or_insert(0) += 1;
        }

        let acuity_slots = [
            record.vision_initial.right.as_deref(),
            record.vision_initial.left.as_deref(),
            record.vision_rescreen.right.as_deref(),
            record.vision_rescreen.left.as_deref(),
        ];
        if acuity_slots
            .iter()
            .any(|v| v.map(engine::acuity_is_fail).unwrap_or(false))
        {
            acuity_referrals += 1;
        }
    }

    let mut grades_json: Vec<serde_json::Value> = Vec::new();
    for grade in Grade::ALL {
        if let Some(tally) = by_grade.get(grade.as_str()) {
            let mut entry = tally.to_json();
            entry["grade"] = json!(grade.as_str());
            grades_json.push(entry);
        }
    }

    let failed_json = json!({
        "vision": failed_by_category.get(&Category::Vision).copied().unwrap_or(0),
        "hearing": failed_by_category.get(&Category::Hearing).copied().unwrap_or(0),
        "acanthosis": failed_by_category.get(&Category::Acanthosis).copied().unwrap_or(0),
        "scoliosis": failed_by_category.get(&Category::Scoliosis).copied().unwrap_or(0)
    });

    Ok(json!({
        "schoolId": school_id,
        "cycle": cycle,
        "statusCounts": overall.to_json(),
        "byGrade": grades_json,
        "needsRescreen": needs_rescreen,
        "hasFailedTest": has_failed,
        "failedByCategory": failed_json,
        "acuityReferrals": acuity_referrals
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.summary" => {
            let Some(conn) = state.db.as_ref() else {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            };
            Some(match dashboard_summary(conn, &req.params) {
                Ok(result) => ok(&req.id, result),
                Err(e) => e.response(&req.id),
            })
        }
        _ => None,
    }
}
