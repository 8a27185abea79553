pub mod assignments;
pub mod backup_exchange;
pub mod calc;
pub mod core;
pub mod courses;
pub mod faculty;
pub mod grades;
pub mod setup;
pub mod students;
