pub mod agenda;
pub mod booking;
pub mod scheduling;

pub use agenda::agenda_for;
pub use booking::AppointmentService;
pub use scheduling::{SchedulingFlow, SchedulingStep};
