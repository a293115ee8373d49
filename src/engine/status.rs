use serde::Serialize;

use super::completion::{category_complete, initial_started};
use super::record::{Category, ScreeningRecord, StudentProfile};
use super::requirements::{required_tests, RequiredTests};
use super::rescreen::{
    all_rescreens_passed, failed_categories, has_failed_test, initial_failed, needs_rescreen,
    rescreen_state, RescreenState,
};

/// The four terminal statuses. Exactly one applies per evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningStatus {
    NotStarted,
    Incomplete,
    Completed,
    Absent,
}

impl ScreeningStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScreeningStatus::NotStarted => "not_started",
            ScreeningStatus::Incomplete => "incomplete",
            ScreeningStatus::Completed => "completed",
            ScreeningStatus::Absent => "absent",
        }
    }

    pub fn parse(raw: &str) -> Option<ScreeningStatus> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "not_started" => Some(ScreeningStatus::NotStarted),
            "incomplete" => Some(ScreeningStatus::Incomplete),
            "completed" => Some(ScreeningStatus::Completed),
            "absent" => Some(ScreeningStatus::Absent),
            _ => None,
        }
    }
}

/// Flat first-match decision list; terminal on the first rule that applies.
pub fn resolve_status(profile: &StudentProfile, record: &ScreeningRecord) -> ScreeningStatus {
    // An administrator override short-circuits everything. Values outside the
    // enum are treated as unset.
    if let Some(forced) = record
        .status_override
        .as_deref()
        .and_then(ScreeningStatus::parse)
    {
        return forced;
    }

    if record.initial_date.is_none() {
        return ScreeningStatus::NotStarted;
    }

    if record.was_absent && !record.has_any_data() {
        return ScreeningStatus::Absent;
    }

    let required = required_tests(profile, record);
    for cat in Category::ALL {
        if required.get(cat) && !category_complete(record, cat) {
            return ScreeningStatus::Incomplete;
        }
    }

    // Initial entry is complete; a failed category with no rescreen on file
    // still holds the record open. A rescreen that was done but failed does
    // not: it only keeps the failure badge visible.
    for cat in Category::ALL {
        if rescreen_state(record, cat).pending() {
            return ScreeningStatus::Incomplete;
        }
    }

    ScreeningStatus::Completed
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEval {
    pub category: Category,
    pub required: bool,
    pub started: bool,
    pub complete: bool,
    pub initial_failed: bool,
    pub rescreen: RescreenState,
    pub rescreen_outcome: &'static str,
}

/// Everything downstream consumers read, produced by one pass over the record.
/// Dashboard counters, export rows, label strings, and status badges all draw
/// from this one struct rather than re-deriving rules.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub status: ScreeningStatus,
    pub required: RequiredTests,
    pub categories: Vec<CategoryEval>,
    pub failed: Vec<Category>,
    pub needs_rescreen: bool,
    pub has_failed_test: bool,
    pub all_rescreens_passed: bool,
    /// Label codes for required categories whose initial pass has not started.
    pub tests_needed: String,
}

pub fn evaluate(profile: &StudentProfile, record: &ScreeningRecord) -> Evaluation {
    let status = resolve_status(profile, record);
    let required = required_tests(profile, record);

    let categories: Vec<CategoryEval> = Category::ALL
        .iter()
        .map(|cat| {
            let st = rescreen_state(record, *cat);
            CategoryEval {
                category: *cat,
                required: required.get(*cat),
                started: initial_started(record, *cat),
                complete: category_complete(record, *cat),
                initial_failed: initial_failed(record, *cat),
                rescreen: st,
                rescreen_outcome: st.outcome().as_str(),
            }
        })
        .collect();

    let tests_needed = categories
        .iter()
        .filter(|c| c.required && !c.started)
        .map(|c| c.category.code())
        .collect::<Vec<_>>()
        .join(" ");

    Evaluation {
        status,
        required,
        failed: failed_categories(record),
        needs_rescreen: needs_rescreen(record),
        has_failed_test: has_failed_test(record),
        all_rescreens_passed: all_rescreens_passed(record),
        tests_needed,
        categories,
    }
}
