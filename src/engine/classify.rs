use super::record::is_blank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Pass,
    Fail,
    Unknown,
}

/// Normalize a raw result token to pass/fail/unknown. Tokens outside the
/// recognized vocabulary stay Unknown: they count as "present" for completion
/// checks but never as a pass or a failure.
pub fn classify(token: &str) -> ResultClass {
    match token.trim().to_ascii_uppercase().as_str() {
        "P" | "PASS" => ResultClass::Pass,
        "F" | "FAIL" => ResultClass::Fail,
        _ => ResultClass::Unknown,
    }
}

pub fn is_fail(v: Option<&str>) -> bool {
    !is_blank(v) && classify(v.unwrap_or_default()) == ResultClass::Fail
}

pub fn is_pass(v: Option<&str>) -> bool {
    !is_blank(v) && classify(v.unwrap_or_default()) == ResultClass::Pass
}

/// Display form of a vision acuity token: a bare denominator becomes `20/NN`,
/// anything already formatted (or P/F, or unrecognized) passes through as-is.
pub fn format_acuity(raw: &str) -> String {
    let t = raw.trim();
    if t.chars().all(|c| c.is_ascii_digit()) && !t.is_empty() {
        return format!("20/{}", t);
    }
    t.to_string()
}

/// Denominator of a `20/NN` or bare-number acuity token.
pub fn acuity_denominator(raw: &str) -> Option<u32> {
    let t = raw.trim();
    let digits = t.strip_prefix("20/").unwrap_or(t);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Aggregate-report failure rule for acuity values: worse than 20/40 fails.
/// The primary pass/fail field is explicit and never derived from this.
pub fn acuity_is_fail(raw: &str) -> bool {
    acuity_denominator(raw).map(|n| n > 40).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_and_fail_tokens_normalize() {
        assert_eq!(classify("P"), ResultClass::Pass);
        assert_eq!(classify("pass"), ResultClass::Pass);
        assert_eq!(classify(" Pass "), ResultClass::Pass);
        assert_eq!(classify("F"), ResultClass::Fail);
        assert_eq!(classify("FAIL"), ResultClass::Fail);
        assert_eq!(classify("fail"), ResultClass::Fail);
    }

    #[test]
    fn unrecognized_tokens_are_unknown_not_fail() {
        assert_eq!(classify("20/60"), ResultClass::Unknown);
        assert_eq!(classify("refused"), ResultClass::Unknown);
        assert_eq!(classify(""), ResultClass::Unknown);
        assert!(!is_fail(Some("refused")));
        assert!(!is_pass(Some("refused")));
        assert!(!is_fail(Some("   ")));
        assert!(!is_fail(None));
    }

    #[test]
    fn bare_denominator_formats_as_snellen() {
        assert_eq!(format_acuity("40"), "20/40");
        assert_eq!(format_acuity(" 60 "), "20/60");
        assert_eq!(format_acuity("20/30"), "20/30");
        assert_eq!(format_acuity("P"), "P");
        assert_eq!(format_acuity("F"), "F");
    }

    #[test]
    fn acuity_fails_past_twenty_forty() {
        assert!(!acuity_is_fail("40"));
        assert!(!acuity_is_fail("20/40"));
        assert!(acuity_is_fail("50"));
        assert!(acuity_is_fail("20/60"));
        assert!(!acuity_is_fail("P"));
        assert!(!acuity_is_fail(""));
        assert_eq!(acuity_denominator("20/200"), Some(200));
        assert_eq!(acuity_denominator("F"), None);
    }
}
