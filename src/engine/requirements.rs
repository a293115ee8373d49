use serde::Serialize;

use super::record::{Category, EnrollmentStatus, Gender, Grade, ScreeningRecord, StudentProfile};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredTests {
    pub vision: bool,
    pub hearing: bool,
    pub acanthosis: bool,
    pub scoliosis: bool,
}

impl RequiredTests {
    pub fn get(&self, cat: Category) -> bool {
        match cat {
            Category::Vision => self.vision,
            Category::Hearing => self.hearing,
            Category::Acanthosis => self.acanthosis,
            Category::Scoliosis => self.scoliosis,
        }
    }

    fn set(&mut self, cat: Category, value: bool) {
        match cat {
            Category::Vision => self.vision = value,
            Category::Hearing => self.hearing = value,
            Category::Acanthosis => self.acanthosis = value,
            Category::Scoliosis => self.scoliosis = value,
        }
    }

    pub fn none(&self) -> bool {
        !(self.vision || self.hearing || self.acanthosis || self.scoliosis)
    }

    /// Space-separated label codes, e.g. "V H A S".
    pub fn codes(&self) -> String {
        Category::ALL
            .iter()
            .filter(|c| self.get(**c))
            .map(|c| c.code())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Pre-K(4) age cutoff: did the fourth birthday land on or before September 1
/// of the screening year. Compared on calendar month/day only, so the check is
/// year-free and needs no clock. A missing birth date fails safe to "required".
fn turned_four_by_september_first(profile: &StudentProfile) -> bool {
    use chrono::Datelike;
    let Some(dob) = profile.birth_date else {
        return true;
    };
    dob.month() <= 8 || (dob.month() == 9 && dob.day() == 1)
}

/// State-mandated tests for a profile, before per-record overrides.
pub fn mandated_tests(profile: &StudentProfile) -> RequiredTests {
    let mut req = RequiredTests::default();
    let Some(grade) = profile.grade else {
        // Unrecognized grades fall through every branch: nothing mandated.
        return req;
    };
    let is_new = profile.enrollment == EnrollmentStatus::New;

    match grade {
        Grade::PreK3 => {}
        Grade::PreK4 => {
            if turned_four_by_september_first(profile) {
                req.vision = true;
                req.hearing = true;
            }
        }
        Grade::Kindergarten => {
            req.vision = true;
            req.hearing = true;
        }
        Grade::First | Grade::Third => {
            req.vision = true;
            req.hearing = true;
            req.acanthosis = true;
        }
        Grade::Second | Grade::Fourth | Grade::Sixth => {
            if is_new {
                req.vision = true;
                req.hearing = true;
                req.acanthosis = true;
            }
        }
        Grade::Fifth | Grade::Seventh => {
            req.vision = true;
            req.hearing = true;
            req.acanthosis = true;
            req.scoliosis = profile.gender == Gender::Female;
        }
        Grade::Eighth => {
            if is_new {
                req.vision = true;
                req.hearing = true;
                req.acanthosis = true;
                req.scoliosis = profile.gender == Gender::Male;
            }
        }
        Grade::Ninth | Grade::Tenth | Grade::Eleventh | Grade::Twelfth => {
            if is_new {
                req.vision = true;
                req.hearing = true;
                req.acanthosis = true;
            }
        }
    }
    req
}

/// Mandated set with the record's tri-state overrides applied. A set override
/// replaces the computed value outright, it is not combined with it.
pub fn required_tests(profile: &StudentProfile, record: &ScreeningRecord) -> RequiredTests {
    let mut req = mandated_tests(profile);
    for cat in Category::ALL {
        if let Some(forced) = record.required_override(cat) {
            req.set(cat, forced);
        }
    }
    req
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn profile(grade: &str, enrollment: EnrollmentStatus, gender: Gender) -> StudentProfile {
        StudentProfile {
            grade: Grade::parse(grade),
            enrollment,
            gender,
            birth_date: NaiveDate::from_ymd_opt(2015, 3, 10),
        }
    }

    fn req(v: bool, h: bool, a: bool, s: bool) -> RequiredTests {
        RequiredTests {
            vision: v,
            hearing: h,
            acanthosis: a,
            scoliosis: s,
        }
    }

    #[test]
    fn grade_table_round_trip() {
        use EnrollmentStatus::{New, Returning};
        use Gender::{Female, Male};

        let cases = [
            ("Pre-K(3)", Returning, Male, req(false, false, false, false)),
            ("Kindergarten", Returning, Male, req(true, true, false, false)),
            ("Kindergarten", New, Female, req(true, true, false, false)),
            ("1st", Returning, Male, req(true, true, true, false)),
            ("3rd", Returning, Female, req(true, true, true, false)),
            ("2nd", Returning, Male, req(false, false, false, false)),
            ("2nd", New, Male, req(true, true, true, false)),
            ("4th", New, Female, req(true, true, true, false)),
            ("4th", Returning, Female, req(false, false, false, false)),
            ("6th", New, Male, req(true, true, true, false)),
            ("5th", Returning, Female, req(true, true, true, true)),
            ("5th", Returning, Male, req(true, true, true, false)),
            ("7th", New, Female, req(true, true, true, true)),
            ("7th", Returning, Male, req(true, true, true, false)),
            ("8th", New, Male, req(true, true, true, true)),
            ("8th", New, Female, req(true, true, true, false)),
            ("8th", Returning, Male, req(false, false, false, false)),
            ("9th", New, Female, req(true, true, true, false)),
            ("10th", Returning, Male, req(false, false, false, false)),
            ("11th", New, Male, req(true, true, true, false)),
            ("12th", Returning, Female, req(false, false, false, false)),
        ];

        for (grade, enrollment, gender, expected) in cases {
            let got = mandated_tests(&profile(grade, enrollment, gender));
            assert_eq!(got, expected, "grade {} {:?} {:?}", grade, enrollment, gender);
        }
    }

    #[test]
    fn unknown_grade_mandates_nothing() {
        let mut p = profile("1st", EnrollmentStatus::New, Gender::Male);
        p.grade = None;
        assert!(mandated_tests(&p).none());
    }

    #[test]
    fn pre_k4_cutoff_boundaries() {
        let mut p = profile("Pre-K(4)", EnrollmentStatus::Returning, Gender::Other);

        p.birth_date = NaiveDate::from_ymd_opt(2021, 9, 1);
        assert_eq!(
            mandated_tests(&p),
            req(true, true, false, false),
            "born September 1 makes the cutoff"
        );

        p.birth_date = NaiveDate::from_ymd_opt(2021, 9, 2);
        assert!(mandated_tests(&p).none(), "born September 2 misses it");

        p.birth_date = NaiveDate::from_ymd_opt(2021, 8, 31);
        assert_eq!(mandated_tests(&p), req(true, true, false, false));

        p.birth_date = NaiveDate::from_ymd_opt(2021, 12, 25);
        assert!(mandated_tests(&p).none());
    }

    #[test]
    fn pre_k4_missing_birth_date_fails_safe_to_required() {
        let mut p = profile("Pre-K(4)", EnrollmentStatus::Returning, Gender::Other);
        p.birth_date = None;
        assert_eq!(mandated_tests(&p), req(true, true, false, false));
    }

    #[test]
    fn overrides_replace_computed_values_entirely() {
        let p = profile("5th", EnrollmentStatus::Returning, Gender::Female);
        let mut rec = ScreeningRecord::default();
        rec.scoliosis_required = Some(false);
        rec.vision_required = Some(false);
        let got = required_tests(&p, &rec);
        assert_eq!(got, req(false, true, true, false));

        // Forcing a test on for a grade that never mandates it.
        let p3 = profile("Pre-K(3)", EnrollmentStatus::Returning, Gender::Male);
        let mut rec3 = ScreeningRecord::default();
        rec3.hearing_required = Some(true);
        assert_eq!(required_tests(&p3, &rec3), req(false, true, false, false));
    }

    #[test]
    fn codes_project_required_set() {
        assert_eq!(req(true, true, false, true).codes(), "V H S");
        assert_eq!(req(false, false, false, false).codes(), "");
        assert_eq!(req(true, true, true, true).codes(), "V H A S");
    }
}
