//! Read-side projections over the mirrored patient list.

use chrono::NaiveDate;

use crate::models::{City, Consultation, Patient};

pub const MIN_SEARCH_CHARS: usize = 2;
pub const MAX_SEARCH_RESULTS: usize = 5;
const EMPTY_CELL: &str = "-";

// ==============================================================================
// PATIENT LIST
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CityFilter {
    #[default]
    Any,
    Only(City),
}

impl CityFilter {
    fn accepts(&self, city: Option<City>) -> bool {
        match self {
            CityFilter::Any => true,
            CityFilter::Only(wanted) => city == Some(*wanted),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientListFilter {
    pub search: String,
    pub city: CityFilter,
    pub include_archived: bool,
}

impl PatientListFilter {
    pub fn matches(&self, patient: &Patient) -> bool {
        matches_term(patient, &self.search.to_lowercase())
            && self.city.accepts(patient.city)
            && (self.include_archived || !patient.archived)
    }
}

fn matches_term(patient: &Patient, lowered_term: &str) -> bool {
    lowered_term.is_empty()
        || patient.name.to_lowercase().contains(lowered_term)
        || patient.national_id.to_lowercase().contains(lowered_term)
}

fn sort_by_name(patients: &mut [&Patient]) {
    patients.sort_by_cached_key(|p| p.name.to_lowercase());
}

/// Patients passing `filter`, alphabetical by name.
pub fn filter_patients<'a>(patients: &'a [Patient], filter: &PatientListFilter) -> Vec<&'a Patient> {
    let mut visible: Vec<&Patient> = patients.iter().filter(|p| filter.matches(p)).collect();
    sort_by_name(&mut visible);
    visible
}

/// Patients with a consultation dated `day`, alphabetical by name.
pub fn seen_on(patients: &[Patient], day: NaiveDate) -> Vec<&Patient> {
    let mut seen: Vec<&Patient> = patients.iter().filter(|p| p.was_seen_on(day)).collect();
    sort_by_name(&mut seen);
    seen
}

pub fn seen_count(patients: &[Patient], day: NaiveDate) -> usize {
    patients.iter().filter(|p| p.was_seen_on(day)).count()
}

// ==============================================================================
// QUICK SEARCH
// ==============================================================================

/// Active patients whose name or national ID contains `term`. Empty below
/// two characters, capped at five results in mirror order.
pub fn search_active_patients<'a>(patients: &'a [Patient], term: &str) -> Vec<&'a Patient> {
    if term.chars().count() < MIN_SEARCH_CHARS {
        return Vec::new();
    }
    let lowered = term.to_lowercase();
    patients
        .iter()
        .filter(|p| !p.archived && matches_term(p, &lowered))
        .take(MAX_SEARCH_RESULTS)
        .collect()
}

/// Whether to tell the user nothing matched.
pub fn show_no_match_hint(term: &str, result_count: usize) -> bool {
    term.chars().count() > MIN_SEARCH_CHARS && result_count == 0
}

// ==============================================================================
// PATIENT DETAIL
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DetailView {
    #[default]
    Details,
    EditPatient,
    NewConsultation,
    EditConsultation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Od,
    Oe,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Od, Eye::Oe];

    pub fn label(&self) -> &'static str {
        match self {
            Eye::Od => "OD",
            Eye::Oe => "OE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryColumn {
    Sphere,
    Cylinder,
    Axis,
    CorrectedAcuity,
    Pressure,
}

impl SummaryColumn {
    pub const ALL: [SummaryColumn; 5] = [
        SummaryColumn::Sphere,
        SummaryColumn::Cylinder,
        SummaryColumn::Axis,
        SummaryColumn::CorrectedAcuity,
        SummaryColumn::Pressure,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            SummaryColumn::Sphere => "Esf.",
            SummaryColumn::Cylinder => "Cil.",
            SummaryColumn::Axis => "Eixo",
            SummaryColumn::CorrectedAcuity => "AV C/C",
            SummaryColumn::Pressure => "PIO",
        }
    }
}

/// Refraction and acuity summary of the most recent consultation.
#[derive(Debug, Clone, Copy)]
pub struct ExamSummary<'a> {
    consultation: &'a Consultation,
}

impl<'a> ExamSummary<'a> {
    pub fn latest(patient: &'a Patient) -> Option<Self> {
        patient
            .latest_consultation()
            .map(|consultation| Self { consultation })
    }

    pub fn consultation(&self) -> &'a Consultation {
        self.consultation
    }

    pub fn cell(&self, eye: Eye, column: SummaryColumn) -> &'a str {
        let exam = &self.consultation.exam;
        let power = match eye {
            Eye::Od => &exam.refraction.od,
            Eye::Oe => &exam.refraction.oe,
        };
        let value = match (column, eye) {
            (SummaryColumn::Sphere, _) => &power.sph,
            (SummaryColumn::Cylinder, _) => &power.cyl,
            (SummaryColumn::Axis, _) => &power.axis,
            (SummaryColumn::CorrectedAcuity, Eye::Od) => &exam.av_cc.od,
            (SummaryColumn::CorrectedAcuity, Eye::Oe) => &exam.av_cc.oe,
            (SummaryColumn::Pressure, Eye::Od) => &exam.pio.od,
            (SummaryColumn::Pressure, Eye::Oe) => &exam.pio.oe,
        };
        display(value)
    }

    /// The near addition row, present only when the refraction has one.
    pub fn addition(&self) -> Option<&'a str> {
        let add = self.consultation.exam.refraction.add.trim();
        (!add.is_empty()).then_some(add)
    }

    /// Rows as rendered: eye label followed by one cell per column.
    pub fn rows(&self) -> Vec<(Eye, Vec<&'a str>)> {
        Eye::BOTH
            .into_iter()
            .map(|eye| {
                let cells = SummaryColumn::ALL
                    .iter()
                    .map(|column| self.cell(eye, *column))
                    .collect();
                (eye, cells)
            })
            .collect()
    }
}

fn display(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        EMPTY_CELL
    } else {
        value
    }
}
