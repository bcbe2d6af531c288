pub mod patient;
pub mod views;

pub use patient::PatientService;
pub use views::*;
