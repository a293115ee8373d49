pub mod backup_exchange;
pub mod core;
pub mod dashboard;
pub mod reports;
pub mod schools;
pub mod screenings;
pub mod students;
