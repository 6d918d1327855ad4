pub mod core;
pub mod courses;
pub mod reports;
pub mod responses;
pub mod students;
