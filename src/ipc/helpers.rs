use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::json;

use crate::db;
use crate::engine::{
    EnrollmentStatus, Gender, Grade, HearingSlots, ScreeningRecord, StudentProfile, VisionSlots,
};
use crate::ipc::error::err;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "not_found",
            message: message.into(),
            details: None,
        }
    }

    pub fn db_query(e: impl ToString) -> Self {
        HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }

    pub fn db_update(e: impl ToString) -> Self {
        HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: None,
        }
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Missing and null both read as None; any other non-string is an error.
pub fn get_opt_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| s.to_string())
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key))),
    }
}

pub fn parse_iso_date(raw: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("invalid date: {}", raw)))
}

/// Explicit cycle param, falling back to the workspace default cycle setting.
pub fn resolve_cycle(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<String, HandlerErr> {
    if let Some(cycle) = get_opt_str(params, "cycle")? {
        return Ok(cycle);
    }
    let default = db::settings_get_json(conn, "default_cycle")
        .map_err(HandlerErr::db_query)?
        .and_then(|v| v.as_str().map(|s| s.to_string()));
    default.ok_or_else(|| HandlerErr::bad_params("missing cycle and no default cycle is set"))
}

pub fn school_exists(conn: &Connection, school_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM schools WHERE id = ?", [school_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::db_query)
}

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub school_id: String,
    pub display_name: String,
    pub student_no: Option<String>,
    pub grade: String,
    pub enrollment_status: String,
    pub gender: String,
    pub birth_date: Option<String>,
    pub active: bool,
    pub sort_order: i64,
}

impl StudentRow {
    pub fn profile(&self) -> StudentProfile {
        StudentProfile {
            grade: Grade::parse(&self.grade),
            enrollment: EnrollmentStatus::parse(&self.enrollment_status),
            gender: Gender::parse(&self.gender),
            birth_date: self
                .birth_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
        }
    }
}

const STUDENT_COLS: &str = "id, school_id, last_name, first_name, student_no, grade, \
     enrollment_status, gender, birth_date, active, sort_order";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<StudentRow> {
    let last: String = r.get(2)?;
    let first: String = r.get(3)?;
    Ok(StudentRow {
        id: r.get(0)?,
        school_id: r.get(1)?,
        display_name: format!("{}, {}", last, first),
        student_no: r.get(4)?,
        grade: r.get(5)?,
        enrollment_status: r.get(6)?,
        gender: r.get(7)?,
        birth_date: r.get(8)?,
        active: r.get::<_, i64>(9)? != 0,
        sort_order: r.get(10)?,
    })
}

pub fn get_student(conn: &Connection, student_id: &str) -> Result<StudentRow, HandlerErr> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLS);
    conn.query_row(&sql, [student_id], student_from_row)
        .optional()
        .map_err(HandlerErr::db_query)?
        .ok_or_else(|| HandlerErr::not_found("student not found"))
}

pub fn list_students(conn: &Connection, school_id: &str) -> Result<Vec<StudentRow>, HandlerErr> {
    let sql = format!(
        "SELECT {} FROM students WHERE school_id = ? ORDER BY sort_order",
        STUDENT_COLS
    );
    let mut stmt = conn.prepare(&sql).map_err(HandlerErr::db_query)?;
    stmt.query_map([school_id], student_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)
}

pub fn student_json(s: &StudentRow) -> serde_json::Value {
    json!({
        "id": s.id,
        "schoolId": s.school_id,
        "displayName": s.display_name,
        "studentNo": s.student_no,
        "grade": s.grade,
        "enrollmentStatus": s.enrollment_status,
        "gender": s.gender,
        "birthDate": s.birth_date,
        "active": s.active,
        "sortOrder": s.sort_order
    })
}

const RECORD_COLS: &str = "was_absent, initial_date, \
     vision_initial_right, vision_initial_left, vision_initial_overall, vision_initial_screener, \
     vision_rescreen_right, vision_rescreen_left, vision_rescreen_overall, vision_rescreen_screener, \
     hearing_initial_right_1000, hearing_initial_right_2000, hearing_initial_right_4000, \
     hearing_initial_left_1000, hearing_initial_left_2000, hearing_initial_left_4000, \
     hearing_initial_overall, \
     hearing_rescreen_right_1000, hearing_rescreen_right_2000, hearing_rescreen_right_4000, \
     hearing_rescreen_left_1000, hearing_rescreen_left_2000, hearing_rescreen_left_4000, \
     hearing_rescreen_overall, \
     acanthosis_initial, acanthosis_rescreen, scoliosis_initial, scoliosis_rescreen, \
     vision_required, hearing_required, acanthosis_required, scoliosis_required, \
     status_override";

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<ScreeningRecord> {
    let opt_bool = |v: Option<i64>| v.map(|n| n != 0);
    Ok(ScreeningRecord {
        was_absent: r.get::<_, i64>(0)? != 0,
        initial_date: r
            .get::<_, Option<String>>(1)?
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
        vision_initial: VisionSlots {
            right: r.get(2)?,
            left: r.get(3)?,
            overall: r.get(4)?,
            screener: r.get(5)?,
        },
        vision_rescreen: VisionSlots {
            right: r.get(6)?,
            left: r.get(7)?,
            overall: r.get(8)?,
            screener: r.get(9)?,
        },
        hearing_initial: HearingSlots {
            right_1000: r.get(10)?,
            right_2000: r.get(11)?,
            right_4000: r.get(12)?,
            left_1000: r.get(13)?,
            left_2000: r.get(14)?,
            left_4000: r.get(15)?,
            overall: r.get(16)?,
        },
        hearing_rescreen: HearingSlots {
            right_1000: r.get(17)?,
            right_2000: r.get(18)?,
            right_4000: r.get(19)?,
            left_1000: r.get(20)?,
            left_2000: r.get(21)?,
            left_4000: r.get(22)?,
            overall: r.get(23)?,
        },
        acanthosis_initial: r.get(24)?,
        acanthosis_rescreen: r.get(25)?,
        scoliosis_initial: r.get(26)?,
        scoliosis_rescreen: r.get(27)?,
        vision_required: opt_bool(r.get(28)?),
        hearing_required: opt_bool(r.get(29)?),
        acanthosis_required: opt_bool(r.get(30)?),
        scoliosis_required: opt_bool(r.get(31)?),
        status_override: r.get(32)?,
    })
}

/// The record for (student, cycle), if one has been created yet.
pub fn load_record(
    conn: &Connection,
    student_id: &str,
    cycle: &str,
) -> Result<Option<ScreeningRecord>, HandlerErr> {
    let sql = format!(
        "SELECT {} FROM screening_records WHERE student_id = ? AND cycle = ?",
        RECORD_COLS
    );
    conn.query_row(&sql, (student_id, cycle), record_from_row)
        .optional()
        .map_err(HandlerErr::db_query)
}

/// Consistent snapshot for evaluation; a student with no row for the cycle
/// evaluates against a blank record (not started).
pub fn load_record_or_blank(
    conn: &Connection,
    student_id: &str,
    cycle: &str,
) -> Result<ScreeningRecord, HandlerErr> {
    Ok(load_record(conn, student_id, cycle)?.unwrap_or_default())
}

pub fn record_json(rec: &ScreeningRecord) -> serde_json::Value {
    json!({
        "wasAbsent": rec.was_absent,
        "initialDate": rec.initial_date.map(|d| d.format("%Y-%m-%d").to_string()),
        "visionInitialRight": rec.vision_initial.right,
        "visionInitialLeft": rec.vision_initial.left,
        "visionInitialOverall": rec.vision_initial.overall,
        "visionInitialScreener": rec.vision_initial.screener,
        "visionRescreenRight": rec.vision_rescreen.right,
        "visionRescreenLeft": rec.vision_rescreen.left,
        "visionRescreenOverall": rec.vision_rescreen.overall,
        "visionRescreenScreener": rec.vision_rescreen.screener,
        "hearingInitialRight1000": rec.hearing_initial.right_1000,
        "hearingInitialRight2000": rec.hearing_initial.right_2000,
        "hearingInitialRight4000": rec.hearing_initial.right_4000,
        "hearingInitialLeft1000": rec.hearing_initial.left_1000,
        "hearingInitialLeft2000": rec.hearing_initial.left_2000,
        "hearingInitialLeft4000": rec.hearing_initial.left_4000,
        "hearingInitialOverall": rec.hearing_initial.overall,
        "hearingRescreenRight1000": rec.hearing_rescreen.right_1000,
        "hearingRescreenRight2000": rec.hearing_rescreen.right_2000,
        "hearingRescreenRight4000": rec.hearing_rescreen.right_4000,
        "hearingRescreenLeft1000": rec.hearing_rescreen.left_1000,
        "hearingRescreenLeft2000": rec.hearing_rescreen.left_2000,
        "hearingRescreenLeft4000": rec.hearing_rescreen.left_4000,
        "hearingRescreenOverall": rec.hearing_rescreen.overall,
        "acanthosisInitial": rec.acanthosis_initial,
        "acanthosisRescreen": rec.acanthosis_rescreen,
        "scoliosisInitial": rec.scoliosis_initial,
        "scoliosisRescreen": rec.scoliosis_rescreen,
        "visionRequired": rec.vision_required,
        "hearingRequired": rec.hearing_required,
        "acanthosisRequired": rec.acanthosis_required,
        "scoliosisRequired": rec.scoliosis_required,
        "statusOverride": rec.status_override
    })
}
