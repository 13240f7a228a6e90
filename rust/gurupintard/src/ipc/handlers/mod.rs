pub mod analytics;
pub mod assessments;
pub mod attendance;
pub mod auth;
pub mod backup_exchange;
pub mod classes;
pub mod core;
pub mod exams;
pub mod forum;
pub mod journals;
pub mod questionnaires;
pub mod reports;
pub mod settings;
pub mod students;
