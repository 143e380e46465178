//! Predicate filters shared by every listing.
//!
//! Criteria are ANDed together and always re-applied to the full base array.
//! A blank criterion is never stored, so it cannot constrain anything.

use std::fmt::Debug;

use crate::experience::ExperienceRange;
use crate::models::{AdmitRecord, CourseRecord};

/// A record whose columns can be addressed by a field enum.
pub trait Filterable {
    type Field: Copy + Eq + Debug;

    fn field(&self, field: Self::Field) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Criterion<F> {
    /// Case-insensitive substring search; any listed field may match.
    Text { fields: Vec<F>, query: String },
    /// Trimmed field value must equal `value` verbatim.
    Exact { field: F, value: String },
    Experience { field: F, range: ExperienceRange },
}

/// Identifies which input a criterion came from. Setting a criterion for an
/// occupied slot replaces the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot<F> {
    Search,
    Exact(F),
    Experience,
}

impl<F: Copy + Eq + Debug> Criterion<F> {
    pub fn text(fields: &[F], query: impl Into<String>) -> Self {
        Criterion::Text {
            fields: fields.to_vec(),
            query: query.into(),
        }
    }

    pub fn exact(field: F, value: impl Into<String>) -> Self {
        Criterion::Exact {
            field,
            value: value.into(),
        }
    }

    pub fn slot(&self) -> Slot<F> {
        match self {
            Criterion::Text { .. } => Slot::Search,
            Criterion::Exact { field, .. } => Slot::Exact(*field),
            Criterion::Experience { .. } => Slot::Experience,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Criterion::Text { fields, query } => fields.is_empty() || query.trim().is_empty(),
            Criterion::Exact { value, .. } => value.trim().is_empty(),
            Criterion::Experience { .. } => false,
        }
    }

    pub fn matches<T>(&self, record: &T) -> bool
    where
        T: Filterable<Field = F>,
    {
        match self {
            Criterion::Text { fields, query } => {
                let needle = query.trim().to_lowercase();
                fields.iter().any(|field| {
                    record
                        .field(*field)
                        .is_some_and(|value| value.to_lowercase().contains(&needle))
                })
            }
            Criterion::Exact { field, value } => record
                .field(*field)
                .is_some_and(|candidate| candidate.trim() == value.trim()),
            Criterion::Experience { field, range } => range.matches(record.field(*field)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSet<F> {
    criteria: Vec<Criterion<F>>,
}

impl<F> Default for FilterSet<F> {
    fn default() -> Self {
        Self {
            criteria: Vec::new(),
        }
    }
}

impl<F: Copy + Eq + Debug> FilterSet<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `criterion` in its slot. A blank criterion clears the slot.
    pub fn set(&mut self, criterion: Criterion<F>) {
        let slot = criterion.slot();
        self.clear(slot);
        if !criterion.is_blank() {
            self.criteria.push(criterion);
        }
    }

    pub fn clear(&mut self, slot: Slot<F>) {
        self.criteria.retain(|existing| existing.slot() != slot);
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn criteria(&self) -> &[Criterion<F>] {
        &self.criteria
    }

    pub fn matches<T>(&self, record: &T) -> bool
    where
        T: Filterable<Field = F>,
    {
        self.criteria.iter().all(|criterion| criterion.matches(record))
    }

    /// Returns the matching records in their original order.
    pub fn apply<'a, T>(&self, records: &'a [T]) -> Vec<&'a T>
    where
        T: Filterable<Field = F>,
    {
        records.iter().filter(|record| self.matches(*record)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitField {
    IntakeTerm,
    IntakeYear,
    University,
    Course,
    UgInstitute,
    UgMajor,
    WorkExperience,
}

/// Columns searched by the admit finder's free-text box.
pub const ADMIT_SEARCH_FIELDS: [AdmitField; 4] = [
    AdmitField::University,
    AdmitField::Course,
    AdmitField::UgInstitute,
    AdmitField::UgMajor,
];

impl Filterable for AdmitRecord {
    type Field = AdmitField;

    fn field(&self, field: AdmitField) -> Option<&str> {
        match field {
            AdmitField::IntakeTerm => self.intake_term.as_deref(),
            AdmitField::IntakeYear => self.intake_year.as_deref(),
            AdmitField::University => self.university.as_deref(),
            AdmitField::Course => self.course.as_deref(),
            AdmitField::UgInstitute => self.ug_institute.as_deref(),
            AdmitField::UgMajor => self.ug_major.as_deref(),
            AdmitField::WorkExperience => self.work_experience.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseField {
    University,
    Program,
    Concentration,
    Country,
    StudyLevel,
}

pub const COURSE_SEARCH_FIELDS: [CourseField; 3] = [
    CourseField::University,
    CourseField::Program,
    CourseField::Concentration,
];

impl Filterable for CourseRecord {
    type Field = CourseField;

    fn field(&self, field: CourseField) -> Option<&str> {
        match field {
            CourseField::University => self.university.as_deref(),
            CourseField::Program => self.program.as_deref(),
            CourseField::Concentration => self.concentration.as_deref(),
            CourseField::Country => self.country.as_deref(),
            CourseField::StudyLevel => self.study_level.as_deref(),
        }
    }
}
