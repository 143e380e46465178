use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{FinderError, FinderResult};
use crate::models::{
    AdmitRecord, ApplicationRecord, CourseRecord, DocumentEntry, DocumentKind, Profile,
    StudentDocumentRecord,
};
use crate::review::DocumentStore;

const ADMIT_COLUMNS: &str = "id, intake_term, intake_year, university, course, ug_institute, \
     ug_major, gpa, gre, english_score, papers, work_experience";
const COURSE_COLUMNS: &str = "id, university, program, concentration, country, study_level, \
     duration, intakes, deadline, tuition, english_requirement";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// An admit row as it appears in seed data and `import-admits` files.
#[derive(Debug, Deserialize)]
pub struct AdmitRow {
    pub source_key: Option<String>,
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

/// A course row as it appears in seed data and `import-courses` files.
#[derive(Debug, Deserialize)]
pub struct CourseRow {
    pub source_key: Option<String>,
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

/// Inserts an admit unless its source key is already present. Returns true
/// when a row was written.
async fn insert_admit(pool: &PgPool, row: &AdmitRow) -> anyhow::Result<bool> {
    let source_key = row
        .source_key
        .clone()
        .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

    let result = sqlx::query(
        r#"
        INSERT INTO admit_finder
        (source_key, intake_term, intake_year, university, course, ug_institute,
         ug_major, gpa, gre, english_score, papers, work_experience)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(source_key)
    .bind(&row.intake_term)
    .bind(&row.intake_year)
    .bind(&row.university)
    .bind(&row.course)
    .bind(&row.ug_institute)
    .bind(&row.ug_major)
    .bind(&row.gpa)
    .bind(&row.gre)
    .bind(&row.english_score)
    .bind(&row.papers)
    .bind(&row.work_experience)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn insert_course(pool: &PgPool, row: &CourseRow) -> anyhow::Result<bool> {
    let source_key = row
        .source_key
        .clone()
        .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

    let result = sqlx::query(
        r#"
        INSERT INTO courses
        (source_key, university, program, concentration, country, study_level,
         duration, intakes, deadline, tuition, english_requirement)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(source_key)
    .bind(&row.university)
    .bind(&row.program)
    .bind(&row.concentration)
    .bind(&row.country)
    .bind(&row.study_level)
    .bind(&row.duration)
    .bind(&row.intakes)
    .bind(&row.deadline)
    .bind(&row.tuition)
    .bind(&row.english_requirement)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

const SEED_ADMITS: &str = "\
source_key,intake_term,intake_year,university,course,ug_institute,ug_major,gpa,gre,english_score,papers,work_experience
seed-admit-001,Fall,2025,Northeastern University,MS Data Science,VIT Vellore,Computer Science,8.7,318,IELTS 7.5,1,24 months
seed-admit-002,Fall,2024,University of Southern California,MS Computer Science,SRM Chennai,Information Technology,8.1,321,TOEFL 104,0,NA
seed-admit-003,Spring,2025,Arizona State University,MS Industrial Engineering,PICT Pune,Mechanical,7.6,305,IELTS 7,0,6 mon
seed-admit-004,Fall,2023,TU Munich,MSc Informatics,IIT Bombay,Computer Science,9.1,-,IELTS 8,2,18
seed-admit-005,Fall,2025,University of Toronto,MEng Electrical,NIT Trichy,Electronics,8.9,327,IELTS 7.5,1,66 months
";

const SEED_COURSES: &str = "\
source_key,university,program,concentration,country,study_level,duration,intakes,deadline,tuition,english_requirement
seed-course-001,University of Edinburgh,MSc Artificial Intelligence,,United Kingdom,Masters,1 year,\"Fall, Spring\",15 January,\"GBP 39,500\",IELTS 6.5 / TOEFL 90
seed-course-002,TU Delft,MSc Computer Science,,Netherlands,Masters,2 years,\"Fall, Spring\",15 January,\"EUR 20,560\",IELTS 6.5 / TOEFL 90
seed-course-003,University of Melbourne,Master of Data Science,,Australia,Masters,2 years,\"Fall, Spring\",15 January,\"AUD 53,000\",IELTS 6.5 / TOEFL 90
seed-course-004,McGill University,BEng Software Engineering,,Canada,Bachelors,4 years,\"Fall, Spring\",15 January,\"CAD 48,000\",IELTS 6.5 / TOEFL 90
";

/// Reads every row of a CSV source, naming the first malformed line.
fn read_rows<T, R>(mut reader: csv::Reader<R>) -> anyhow::Result<Vec<T>>
where
    T: DeserializeOwned,
    R: io::Read,
{
    reader
        .deserialize::<T>()
        .enumerate()
        .map(|(line, result)| result.with_context(|| format!("malformed row {}", line + 1)))
        .collect()
}

fn open_csv(csv_path: &Path) -> anyhow::Result<csv::Reader<fs::File>> {
    csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let admits: Vec<AdmitRow> = read_rows(csv::Reader::from_reader(SEED_ADMITS.as_bytes()))?;
    for admit in &admits {
        insert_admit(pool, admit).await?;
    }

    let courses: Vec<CourseRow> = read_rows(csv::Reader::from_reader(SEED_COURSES.as_bytes()))?;
    for course in &courses {
        insert_course(pool, course).await?;
    }

    let student_id = Uuid::parse_str("6f1c2b9e-2f57-4b8e-9a55-0d3f1f6f2c11")?;
    sqlx::query(
        r#"
        INSERT INTO profiles (id, full_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET full_name = EXCLUDED.full_name, email = EXCLUDED.email
        "#,
    )
    .bind(student_id)
    .bind("Riya Sharma")
    .bind("riya.sharma@example.com")
    .execute(pool)
    .await?;

    let documents = serde_json::json!({
        "sop": "https://storage.eduabroad.example/applications/riya/sop.pdf",
        "lor": "https://storage.eduabroad.example/applications/riya/lor-1.pdf",
        "resume": "https://storage.eduabroad.example/applications/riya/resume.pdf",
    });
    sqlx::query(
        r#"
        INSERT INTO application_builder (user_id, university, program, documents)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, university, program) DO UPDATE SET documents = EXCLUDED.documents
        "#,
    )
    .bind(student_id)
    .bind("University of Edinburgh")
    .bind("MSc Artificial Intelligence")
    .bind(Json(documents))
    .execute(pool)
    .await?;

    let uploaded_at = Utc::now() - Duration::days(3);
    sqlx::query(
        r#"
        INSERT INTO student_documents
        (user_id, lor_file_name, lor_file_size, lor_uploaded_at,
         sop_file_name, sop_file_size, sop_uploaded_at,
         resume_file_name, resume_file_size, resume_uploaded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $4, $7, $8, $4)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind("lor-prof-iyer.pdf")
    .bind(182_044_i64)
    .bind(uploaded_at)
    .bind("sop-edinburgh-ai.pdf")
    .bind(96_311_i64)
    .bind("riya-sharma-resume.pdf")
    .bind(71_280_i64)
    .execute(pool)
    .await?;

    info!(admits = admits.len(), courses = courses.len(), "seed data written");
    Ok(())
}

pub async fn import_admits_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let rows: Vec<AdmitRow> = read_rows(open_csv(csv_path)?)?;
    let mut inserted = 0usize;
    for row in &rows {
        if insert_admit(pool, row).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

pub async fn import_courses_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let rows: Vec<CourseRow> = read_rows(open_csv(csv_path)?)?;
    let mut inserted = 0usize;
    for row in &rows {
        if insert_course(pool, row).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

fn admit_from_row(row: &PgRow) -> Result<AdmitRecord, sqlx::Error> {
    Ok(AdmitRecord {
        id: row.try_get("id")?,
        intake_term: row.try_get("intake_term")?,
        intake_year: row.try_get("intake_year")?,
        university: row.try_get("university")?,
        course: row.try_get("course")?,
        ug_institute: row.try_get("ug_institute")?,
        ug_major: row.try_get("ug_major")?,
        gpa: row.try_get("gpa")?,
        gre: row.try_get("gre")?,
        english_score: row.try_get("english_score")?,
        papers: row.try_get("papers")?,
        work_experience: row.try_get("work_experience")?,
    })
}

fn course_from_row(row: &PgRow) -> Result<CourseRecord, sqlx::Error> {
    Ok(CourseRecord {
        id: row.try_get("id")?,
        university: row.try_get("university")?,
        program: row.try_get("program")?,
        concentration: row.try_get("concentration")?,
        country: row.try_get("country")?,
        study_level: row.try_get("study_level")?,
        duration: row.try_get("duration")?,
        intakes: row.try_get("intakes")?,
        deadline: row.try_get("deadline")?,
        tuition: row.try_get("tuition")?,
        english_requirement: row.try_get("english_requirement")?,
    })
}

pub async fn fetch_admits(pool: &PgPool) -> FinderResult<Vec<AdmitRecord>> {
    let query = format!("SELECT {ADMIT_COLUMNS} FROM admit_finder ORDER BY id");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    let admits = rows.iter().map(admit_from_row).collect::<Result<Vec<_>, _>>()?;

    debug!(count = admits.len(), "fetched admits");
    Ok(admits)
}

pub async fn fetch_courses(pool: &PgPool) -> FinderResult<Vec<CourseRecord>> {
    let query = format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY id");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    let courses = rows.iter().map(course_from_row).collect::<Result<Vec<_>, _>>()?;

    debug!(count = courses.len(), "fetched courses");
    Ok(courses)
}

pub async fn fetch_admit(pool: &PgPool, id: i64) -> FinderResult<AdmitRecord> {
    let query = format!("SELECT {ADMIT_COLUMNS} FROM admit_finder WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| FinderError::NotFound(format!("admit {id}")))?;
    Ok(admit_from_row(&row)?)
}

pub async fn fetch_course(pool: &PgPool, id: i64) -> FinderResult<CourseRecord> {
    let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| FinderError::NotFound(format!("course {id}")))?;
    Ok(course_from_row(&row)?)
}

pub async fn fetch_profile(pool: &PgPool, user_id: Uuid) -> FinderResult<Profile> {
    let row = sqlx::query("SELECT id, full_name, email FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| FinderError::NotFound(format!("student {user_id}")))?;

    Ok(Profile {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
    })
}

pub async fn fetch_application(pool: &PgPool, id: i64) -> FinderResult<ApplicationRecord> {
    let row = sqlx::query(
        "SELECT id, user_id, university, program, documents FROM application_builder WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| FinderError::NotFound(format!("application {id}")))?;

    let Json(raw): Json<BTreeMap<String, serde_json::Value>> = row.try_get("documents")?;
    let documents = raw
        .into_iter()
        .filter_map(|(category, url)| url.as_str().map(|url| (category, url.to_string())))
        .collect();

    Ok(ApplicationRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        university: row.try_get("university")?,
        program: row.try_get("program")?,
        documents,
    })
}

fn documents_from_row(row: &PgRow) -> Result<StudentDocumentRecord, sqlx::Error> {
    let mut record = StudentDocumentRecord::empty(row.try_get("user_id")?);

    for kind in DocumentKind::ALL {
        *record.entry_mut(kind) = DocumentEntry {
            file_name: row.try_get(kind.column("file_name").as_str())?,
            file_size: row.try_get(kind.column("file_size").as_str())?,
            uploaded_at: row.try_get(kind.column("uploaded_at").as_str())?,
            feedback: row.try_get(kind.column("feedback").as_str())?,
            feedback_at: row.try_get(kind.column("feedback_at").as_str())?,
            feedback_by: row.try_get(kind.column("feedback_by").as_str())?,
            verified: row.try_get(kind.column("verified").as_str())?,
        };
    }

    Ok(record)
}

/// `student_documents` backed by Postgres. Every write returns the updated
/// row so callers never need a second read.
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn fetch(&self, user_id: Uuid) -> FinderResult<Option<StudentDocumentRecord>> {
        let row = sqlx::query("SELECT * FROM student_documents WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(documents_from_row)
            .transpose()
            .map_err(FinderError::from)
    }

    async fn set_feedback(
        &self,
        user_id: Uuid,
        kind: DocumentKind,
        feedback: Option<&str>,
        reviewer: Option<&str>,
    ) -> FinderResult<Option<StudentDocumentRecord>> {
        // Column names come from DocumentKind, never from user input.
        let query = format!(
            "UPDATE student_documents \
             SET {feedback} = $2, \
                 {feedback_at} = CASE WHEN $2::text IS NULL THEN NULL ELSE now() END, \
                 {feedback_by} = $3 \
             WHERE user_id = $1 \
             RETURNING *",
            feedback = kind.column("feedback"),
            feedback_at = kind.column("feedback_at"),
            feedback_by = kind.column("feedback_by"),
        );

        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(feedback)
            .bind(reviewer)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(documents_from_row)
            .transpose()
            .map_err(FinderError::from)
    }

    async fn set_verified(
        &self,
        user_id: Uuid,
        kind: DocumentKind,
        verified: bool,
    ) -> FinderResult<Option<StudentDocumentRecord>> {
        let query = format!(
            "UPDATE student_documents SET {} = $2 WHERE user_id = $1 RETURNING *",
            kind.column("verified"),
        );

        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(verified)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(documents_from_row)
            .transpose()
            .map_err(FinderError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_admits_parse_with_source_keys() {
        let rows: Vec<AdmitRow> =
            read_rows(csv::Reader::from_reader(SEED_ADMITS.as_bytes())).unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row.source_key.is_some()));
        assert_eq!(rows[2].work_experience.as_deref(), Some("6 mon"));
    }

    #[test]
    fn seed_courses_keep_quoted_commas_and_blank_cells() {
        let rows: Vec<CourseRow> =
            read_rows(csv::Reader::from_reader(SEED_COURSES.as_bytes())).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].tuition.as_deref(), Some("GBP 39,500"));
        assert_eq!(rows[0].intakes.as_deref(), Some("Fall, Spring"));
        assert_eq!(rows[0].concentration, None);
    }

    #[test]
    fn course_import_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.csv");
        fs::write(
            &path,
            "university,program,country\nETH Zurich,MSc Robotics,Switzerland\n",
        )
        .unwrap();

        let rows: Vec<CourseRow> = read_rows(open_csv(&path).unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_key, None);
        assert_eq!(rows[0].program.as_deref(), Some("MSc Robotics"));
        assert_eq!(rows[0].study_level, None);
    }

    #[test]
    fn malformed_rows_name_their_line() {
        let raw = "source_key,university\na,b,c\n";
        let err = read_rows::<CourseRow, _>(csv::Reader::from_reader(raw.as_bytes())).unwrap_err();
        assert!(format!("{err:#}").contains("malformed row 1"));
    }
}
