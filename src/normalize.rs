//! Cleanup applied to rows straight after they are fetched.

use crate::models::{AdmitRecord, CourseRecord};

const PLACEHOLDERS: [&str; 5] = ["-", "null", "N/A", "n/a", "none"];

/// Trims a loosely typed text cell, mapping blanks and placeholders to `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn normalize_admit(record: AdmitRecord) -> AdmitRecord {
    AdmitRecord {
        id: record.id,
        intake_term: clean(record.intake_term),
        intake_year: clean(record.intake_year),
        university: clean(record.university),
        course: clean(record.course),
        ug_institute: clean(record.ug_institute),
        ug_major: clean(record.ug_major),
        gpa: clean(record.gpa),
        gre: clean(record.gre),
        english_score: clean(record.english_score),
        papers: clean(record.papers),
        // "NA" is meaningful to the experience filter, so only trim here.
        work_experience: record
            .work_experience
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
    }
}

/// Normalizes every row and drops those without a university and course.
pub fn normalize_admits(records: Vec<AdmitRecord>) -> Vec<AdmitRecord> {
    records
        .into_iter()
        .map(normalize_admit)
        .filter(|record| record.university.is_some() && record.course.is_some())
        .collect()
}

pub fn normalize_courses(records: Vec<CourseRecord>) -> Vec<CourseRecord> {
    records
        .into_iter()
        .map(|record| CourseRecord {
            id: record.id,
            university: clean(record.university),
            program: clean(record.program),
            concentration: clean(record.concentration),
            country: clean(record.country),
            study_level: clean(record.study_level),
            duration: clean(record.duration),
            intakes: clean(record.intakes),
            deadline: clean(record.deadline),
            tuition: clean(record.tuition),
            english_requirement: clean(record.english_requirement),
        })
        .filter(|record| record.program.is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admit(id: i64, university: Option<&str>, course: Option<&str>) -> AdmitRecord {
        AdmitRecord {
            id,
            intake_term: Some(" Fall ".to_string()),
            intake_year: Some("2025".to_string()),
            university: university.map(str::to_string),
            course: course.map(str::to_string),
            ug_institute: Some("-".to_string()),
            ug_major: None,
            gpa: Some("8.4".to_string()),
            gre: Some("null".to_string()),
            english_score: None,
            papers: None,
            work_experience: Some(" NA ".to_string()),
        }
    }

    #[test]
    fn placeholders_become_absent() {
        assert_eq!(clean(Some("  ".to_string())), None);
        assert_eq!(clean(Some("N/A".to_string())), None);
        assert_eq!(clean(Some(" MS CS ".to_string())), Some("MS CS".to_string()));
    }

    #[test]
    fn invalid_admits_are_dropped() {
        let records = vec![
            admit(1, Some("TU Munich"), Some("MS Informatics")),
            admit(2, Some("  "), Some("MS Data Science")),
            admit(3, Some("ETH Zurich"), None),
        ];

        let normalized = normalize_admits(records);
        assert_eq!(normalized.len(), 1);
        let kept = &normalized[0];
        assert_eq!(kept.id, 1);
        assert_eq!(kept.intake_term.as_deref(), Some("Fall"));
        assert_eq!(kept.ug_institute, None);
        assert_eq!(kept.gre, None);
        assert_eq!(kept.work_experience.as_deref(), Some("NA"));
    }
}
