use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FinderError;

/// A historical admission profile from `admit_finder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmitRecord {
    pub id: i64,
    pub intake_term: Option<String>,
    pub intake_year: Option<String>,
    pub university: Option<String>,
    pub course: Option<String>,
    pub ug_institute: Option<String>,
    pub ug_major: Option<String>,
    pub gpa: Option<String>,
    pub gre: Option<String>,
    pub english_score: Option<String>,
    pub papers: Option<String>,
    pub work_experience: Option<String>,
}

/// A study-program listing from `courses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: i64,
    pub university: Option<String>,
    pub program: Option<String>,
    pub concentration: Option<String>,
    pub country: Option<String>,
    pub study_level: Option<String>,
    pub duration: Option<String>,
    pub intakes: Option<String>,
    pub deadline: Option<String>,
    pub tuition: Option<String>,
    pub english_requirement: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRecord {
    pub id: i64,
    pub user_id: Uuid,
    pub university: Option<String>,
    pub program: Option<String>,
    /// Document category (`sop`, `lor`, `resume`, ...) to uploaded file URL.
    pub documents: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Lor,
    Sop,
    Resume,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [DocumentKind::Lor, DocumentKind::Sop, DocumentKind::Resume];

    /// Column prefix in `student_documents`.
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Lor => "lor",
            DocumentKind::Sop => "sop",
            DocumentKind::Resume => "resume",
        }
    }

    pub fn column(self, suffix: &str) -> String {
        format!("{}_{}", self.prefix(), suffix)
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Lor => "LOR",
            DocumentKind::Sop => "SOP",
            DocumentKind::Resume => "Resume",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for DocumentKind {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lor" => Ok(DocumentKind::Lor),
            "sop" => Ok(DocumentKind::Sop),
            "resume" | "cv" => Ok(DocumentKind::Resume),
            other => Err(FinderError::Validation(format!(
                "unknown document type '{other}' (expected lor, sop or resume)"
            ))),
        }
    }
}

/// One uploaded document plus the agency's review state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentEntry {
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
    pub feedback_at: Option<DateTime<Utc>>,
    pub feedback_by: Option<String>,
    pub verified: bool,
}

/// Per-student LOR/SOP/Resume bundle from `student_documents`.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentDocumentRecord {
    pub user_id: Uuid,
    pub lor: DocumentEntry,
    pub sop: DocumentEntry,
    pub resume: DocumentEntry,
}

impl StudentDocumentRecord {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            lor: DocumentEntry::default(),
            sop: DocumentEntry::default(),
            resume: DocumentEntry::default(),
        }
    }

    pub fn entry(&self, kind: DocumentKind) -> &DocumentEntry {
        match kind {
            DocumentKind::Lor => &self.lor,
            DocumentKind::Sop => &self.sop,
            DocumentKind::Resume => &self.resume,
        }
    }

    pub fn entry_mut(&mut self, kind: DocumentKind) -> &mut DocumentEntry {
        match kind {
            DocumentKind::Lor => &mut self.lor,
            DocumentKind::Sop => &mut self.sop,
            DocumentKind::Resume => &mut self.resume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_kind_parses_loosely() {
        assert_eq!("SOP".parse::<DocumentKind>().unwrap(), DocumentKind::Sop);
        assert_eq!(" lor ".parse::<DocumentKind>().unwrap(), DocumentKind::Lor);
        assert_eq!("cv".parse::<DocumentKind>().unwrap(), DocumentKind::Resume);
        assert!("transcript".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn columns_are_prefixed_by_kind() {
        assert_eq!(DocumentKind::Resume.column("verified"), "resume_verified");
    }
}
