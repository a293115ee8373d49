use serde::Serialize;

use super::classify::{is_fail, is_pass};
use super::record::{is_blank, Category, ScreeningRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RescreenOutcome {
    NotNeeded,
    Pending,
    Passed,
    Failed,
}

impl RescreenOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RescreenOutcome::NotNeeded => "not_needed",
            RescreenOutcome::Pending => "pending",
            RescreenOutcome::Passed => "passed",
            RescreenOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescreenState {
    /// Initial pass failed, so a rescreen is mandated.
    pub needed: bool,
    /// Any rescreen slot holds a value.
    pub done: bool,
    /// Only meaningful when `done`.
    pub passed: bool,
}

impl RescreenState {
    pub fn pending(&self) -> bool {
        self.needed && !self.done
    }

    pub fn failed(&self) -> bool {
        self.needed && self.done && !self.passed
    }

    pub fn outcome(&self) -> RescreenOutcome {
        if !self.needed {
            RescreenOutcome::NotNeeded
        } else if !self.done {
            RescreenOutcome::Pending
        } else if self.passed {
            RescreenOutcome::Passed
        } else {
            RescreenOutcome::Failed
        }
    }
}

/// Did the initial pass fail: any result slot, or the overall override token,
/// classifies as Fail.
pub fn initial_failed(record: &ScreeningRecord, cat: Category) -> bool {
    record.initial_results(cat).iter().any(|v| is_fail(*v))
        || is_fail(record.initial_overall(cat))
}

pub fn rescreen_state(record: &ScreeningRecord, cat: Category) -> RescreenState {
    let needed = initial_failed(record, cat);
    let rescreen = record.rescreen_results(cat);
    let overall = record.rescreen_overall(cat);
    let done = rescreen.iter().any(|v| !is_blank(*v)) || !is_blank(overall);

    // Vision/hearing pass when nothing in the rescreen reads Fail; the
    // single-result categories demand an explicit Pass.
    let passed = done
        && match cat {
            Category::Vision | Category::Hearing => {
                !rescreen.iter().any(|v| is_fail(*v)) && !is_fail(overall)
            }
            Category::Acanthosis | Category::Scoliosis => {
                rescreen.iter().any(|v| is_pass(*v))
            }
        };

    RescreenState {
        needed,
        done,
        passed,
    }
}

/// Any category with a failed initial whose rescreen is missing or failed.
pub fn needs_rescreen(record: &ScreeningRecord) -> bool {
    Category::ALL.iter().any(|cat| {
        let st = rescreen_state(record, *cat);
        st.pending() || st.failed()
    })
}

/// Badge flag: any initial failure at all, regardless of rescreen outcome.
pub fn has_failed_test(record: &ScreeningRecord) -> bool {
    Category::ALL.iter().any(|cat| initial_failed(record, *cat))
}

pub fn failed_categories(record: &ScreeningRecord) -> Vec<Category> {
    Category::ALL
        .iter()
        .copied()
        .filter(|cat| initial_failed(record, *cat))
        .collect()
}

/// Every category that ever needed a rescreen now shows a passing one. Gates
/// swapping the FAILED badge for "Rescreened".
pub fn all_rescreens_passed(record: &ScreeningRecord) -> bool {
    Category::ALL.iter().all(|cat| {
        let st = rescreen_state(record, *cat);
        !st.needed || st.passed
    })
}
