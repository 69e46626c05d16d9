pub mod payment;
pub mod role;
pub mod student_registration;
pub mod sub_admin;
pub mod user;
