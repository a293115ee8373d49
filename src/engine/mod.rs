mod classify;
mod completion;
mod record;
mod requirements;
mod rescreen;
mod status;

pub use classify::{acuity_is_fail, format_acuity};
pub use record::{
    Category, EnrollmentStatus, Gender, Grade, HearingSlots, ScreeningRecord, StudentProfile,
    VisionSlots,
};
pub use requirements::RequiredTests;
pub use rescreen::RescreenState;
pub use status::{evaluate, CategoryEval, Evaluation, ScreeningStatus};
