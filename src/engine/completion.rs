use super::record::{is_blank, Category, ScreeningRecord};

/// Full data-entry completeness for one category: every result slot has a
/// non-blank value from either pass. Slots pair up initial-to-rescreen, so a
/// right eye read on rescreen satisfies a right eye missed on initial.
pub fn category_complete(record: &ScreeningRecord, cat: Category) -> bool {
    let initial = record.initial_results(cat);
    let rescreen = record.rescreen_results(cat);
    initial
        .iter()
        .zip(rescreen.iter())
        .all(|(i, r)| !is_blank(*i) || !is_blank(*r))
}

/// Started means any initial-pass value at all; rescreen entries do not count.
/// Drives the "remaining tests needed" label projection.
pub fn initial_started(record: &ScreeningRecord, cat: Category) -> bool {
    record.initial_results(cat).iter().any(|v| !is_blank(*v))
        || !is_blank(record.initial_overall(cat))
}
