use chrono::NaiveDate;
use serde::Serialize;

/// The closed 15-value grade set used by the state screening mandate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    PreK3,
    PreK4,
    Kindergarten,
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Seventh,
    Eighth,
    Ninth,
    Tenth,
    Eleventh,
    Twelfth,
}

impl Grade {
    pub const ALL: [Grade; 15] = [
        Grade::PreK3,
        Grade::PreK4,
        Grade::Kindergarten,
        Grade::First,
        Grade::Second,
        Grade::Third,
        Grade::Fourth,
        Grade::Fifth,
        Grade::Sixth,
        Grade::Seventh,
        Grade::Eighth,
        Grade::Ninth,
        Grade::Tenth,
        Grade::Eleventh,
        Grade::Twelfth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::PreK3 => "Pre-K(3)",
            Grade::PreK4 => "Pre-K(4)",
            Grade::Kindergarten => "Kindergarten",
            Grade::First => "1st",
            Grade::Second => "2nd",
            Grade::Third => "3rd",
            Grade::Fourth => "4th",
            Grade::Fifth => "5th",
            Grade::Sixth => "6th",
            Grade::Seventh => "7th",
            Grade::Eighth => "8th",
            Grade::Ninth => "9th",
            Grade::Tenth => "10th",
            Grade::Eleventh => "11th",
            Grade::Twelfth => "12th",
        }
    }

    /// Case-insensitive parse against the closed set. Anything else is "no
    /// grade": the resolver mandates nothing for it.
    pub fn parse(raw: &str) -> Option<Grade> {
        let t = raw.trim();
        Grade::ALL
            .iter()
            .copied()
            .find(|g| g.as_str().eq_ignore_ascii_case(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentStatus {
    New,
    Returning,
}

impl EnrollmentStatus {
    pub fn parse(raw: &str) -> EnrollmentStatus {
        if raw.trim().eq_ignore_ascii_case("new") {
            EnrollmentStatus::New
        } else {
            EnrollmentStatus::Returning
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::New => "new",
            EnrollmentStatus::Returning => "returning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn parse(raw: &str) -> Gender {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Gender::Male,
            "female" | "f" => Gender::Female,
            _ => Gender::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

/// Immutable per-evaluation view of the student being screened.
#[derive(Debug, Clone)]
pub struct StudentProfile {
    pub grade: Option<Grade>,
    pub enrollment: EnrollmentStatus,
    pub gender: Gender,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Vision,
    Hearing,
    Acanthosis,
    Scoliosis,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Vision,
        Category::Hearing,
        Category::Acanthosis,
        Category::Scoliosis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Vision => "vision",
            Category::Hearing => "hearing",
            Category::Acanthosis => "acanthosis",
            Category::Scoliosis => "scoliosis",
        }
    }

    /// Single-letter code used on sticker labels ("V H A S").
    pub fn code(self) -> &'static str {
        match self {
            Category::Vision => "V",
            Category::Hearing => "H",
            Category::Acanthosis => "A",
            Category::Scoliosis => "S",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisionSlots {
    pub right: Option<String>,
    pub left: Option<String>,
    pub overall: Option<String>,
    pub screener: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HearingSlots {
    pub right_1000: Option<String>,
    pub right_2000: Option<String>,
    pub right_4000: Option<String>,
    pub left_1000: Option<String>,
    pub left_2000: Option<String>,
    pub left_4000: Option<String>,
    pub overall: Option<String>,
}

impl HearingSlots {
    /// Fixed ear-by-frequency order; completion pairs initial and rescreen
    /// slot-wise, so both passes must enumerate identically.
    pub fn frequencies(&self) -> [Option<&str>; 6] {
        [
            self.right_1000.as_deref(),
            self.right_2000.as_deref(),
            self.right_4000.as_deref(),
            self.left_1000.as_deref(),
            self.left_2000.as_deref(),
            self.left_4000.as_deref(),
        ]
    }
}

/// One student's screening cycle: an initial and a rescreen sub-record per
/// category, plus the record-level flags the status resolver consumes.
#[derive(Debug, Clone, Default)]
pub struct ScreeningRecord {
    pub was_absent: bool,
    pub initial_date: Option<NaiveDate>,
    pub vision_initial: VisionSlots,
    pub vision_rescreen: VisionSlots,
    pub hearing_initial: HearingSlots,
    pub hearing_rescreen: HearingSlots,
    pub acanthosis_initial: Option<String>,
    pub acanthosis_rescreen: Option<String>,
    pub scoliosis_initial: Option<String>,
    pub scoliosis_rescreen: Option<String>,
    /// Tri-state: None defers to the grade-table computation, Some replaces it.
    pub vision_required: Option<bool>,
    pub hearing_required: Option<bool>,
    pub acanthosis_required: Option<bool>,
    pub scoliosis_required: Option<bool>,
    /// Administrator override; values outside the four-state enum are ignored.
    pub status_override: Option<String>,
}

pub fn is_blank(v: Option<&str>) -> bool {
    v.map(|s| s.trim().is_empty()).unwrap_or(true)
}

impl ScreeningRecord {
    /// Result-bearing slots of the initial pass, in a fixed order that lines
    /// up with `rescreen_results`. Excludes the overall override token.
    pub fn initial_results(&self, cat: Category) -> Vec<Option<&str>> {
        match cat {
            Category::Vision => vec![
                self.vision_initial.right.as_deref(),
                self.vision_initial.left.as_deref(),
            ],
            Category::Hearing => self.hearing_initial.frequencies().to_vec(),
            Category::Acanthosis => vec![self.acanthosis_initial.as_deref()],
            Category::Scoliosis => vec![self.scoliosis_initial.as_deref()],
        }
    }

    pub fn rescreen_results(&self, cat: Category) -> Vec<Option<&str>> {
        match cat {
            Category::Vision => vec![
                self.vision_rescreen.right.as_deref(),
                self.vision_rescreen.left.as_deref(),
            ],
            Category::Hearing => self.hearing_rescreen.frequencies().to_vec(),
            Category::Acanthosis => vec![self.acanthosis_rescreen.as_deref()],
            Category::Scoliosis => vec![self.scoliosis_rescreen.as_deref()],
        }
    }

    pub fn initial_overall(&self, cat: Category) -> Option<&str> {
        match cat {
            Category::Vision => self.vision_initial.overall.as_deref(),
            Category::Hearing => self.hearing_initial.overall.as_deref(),
            _ => None,
        }
    }

    pub fn rescreen_overall(&self, cat: Category) -> Option<&str> {
        match cat {
            Category::Vision => self.vision_rescreen.overall.as_deref(),
            Category::Hearing => self.hearing_rescreen.overall.as_deref(),
            _ => None,
        }
    }

    pub fn required_override(&self, cat: Category) -> Option<bool> {
        match cat {
            Category::Vision => self.vision_required,
            Category::Hearing => self.hearing_required,
            Category::Acanthosis => self.acanthosis_required,
            Category::Scoliosis => self.scoliosis_required,
        }
    }

    /// True once any screening field of any category, either pass, holds a
    /// non-blank value. Gates the absence status: absence is only recognized
    /// on an otherwise untouched record.
    pub fn has_any_data(&self) -> bool {
        for cat in Category::ALL {
            if self.initial_results(cat).iter().any(|v| !is_blank(*v))
                || self.rescreen_results(cat).iter().any(|v| !is_blank(*v))
                || !is_blank(self.initial_overall(cat))
                || !is_blank(self.rescreen_overall(cat))
            {
                return true;
            }
        }
        !is_blank(self.vision_initial.screener.as_deref())
            || !is_blank(self.vision_rescreen.screener.as_deref())
    }
}
