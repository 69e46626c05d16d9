pub mod dashboard;
pub mod student_registration;
pub mod sub_admin;
