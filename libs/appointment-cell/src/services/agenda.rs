use chrono::NaiveDate;

use crate::models::Appointment;

/// The day's appointments by time. Equal times keep mirror order; entries
/// without a time come last.
pub fn agenda_for(appointments: &[Appointment], day: NaiveDate) -> Vec<&Appointment> {
    let mut agenda: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.date == Some(day))
        .collect();
    agenda.sort_by_key(|a| (a.time.is_none(), a.time));
    agenda
}
