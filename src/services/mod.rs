pub mod student_service;
pub mod student_service_impl;
pub use student_service::{StudentError, StudentService};
pub use student_service_impl::SeaOrmStudentService;
