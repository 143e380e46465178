use std::collections::HashMap;
use std::fmt::Write;

use crate::filter::Filterable;
use crate::finder::Finder;
use crate::models::{
    AdmitRecord, ApplicationRecord, CourseRecord, DocumentKind, Profile, StudentDocumentRecord,
};
use crate::paginate::PageMarker;

const MISSING: &str = "—";

fn or_missing(value: Option<&str>) -> &str {
    value.unwrap_or(MISSING)
}

/// `‹ 1 … 4 [5] 6 … 10 ›`. Empty when there is nothing to page through.
pub fn render_navigation(markers: &[PageMarker], current: usize) -> String {
    if markers.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = markers
        .iter()
        .map(|marker| match marker {
            PageMarker::Page(page) if *page == current => format!("[{page}]"),
            PageMarker::Page(page) => page.to_string(),
            PageMarker::Ellipsis => "…".to_string(),
        })
        .collect();
    format!("‹ {} ›", parts.join(" "))
}

pub fn render_error_banner(message: &str) -> String {
    format!("error: {message}\n")
}

pub fn render_options(label: &str, options: &[String]) -> String {
    if options.is_empty() {
        return format!("{label}: (none)\n");
    }
    format!("{label}: {}\n", options.join(", "))
}

/// Renders the current page of a finder: a header, one card per record and
/// the page navigation.
pub fn render_page<T: Filterable>(
    title: &str,
    finder: &Finder<T>,
    card: impl Fn(&T, &mut String),
) -> String {
    let mut output = String::new();
    let total = finder.results().len();
    let pages = finder.page_count();

    let _ = writeln!(output, "# {title}");
    if total == 0 {
        let _ = writeln!(output, "No results match these filters.");
        return output;
    }

    let _ = writeln!(
        output,
        "{total} results (page {} of {pages})",
        finder.current_page()
    );
    for record in finder.page_items() {
        let _ = writeln!(output);
        card(record, &mut output);
    }

    let navigation = render_navigation(&finder.markers(), finder.current_page());
    if !navigation.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "{navigation}");
    }
    output
}

pub fn admit_card(saved: &[i64]) -> impl Fn(&AdmitRecord, &mut String) + '_ {
    move |admit: &AdmitRecord, output: &mut String| {
        let marker = if saved.contains(&admit.id) { "★" } else { " " };
        let _ = writeln!(
            output,
            "{marker} #{} {} — {}",
            admit.id,
            or_missing(admit.university.as_deref()),
            or_missing(admit.course.as_deref())
        );
        let _ = writeln!(
            output,
            "    Intake: {} {} | UG: {} ({})",
            or_missing(admit.intake_term.as_deref()),
            or_missing(admit.intake_year.as_deref()),
            or_missing(admit.ug_institute.as_deref()),
            or_missing(admit.ug_major.as_deref())
        );
        let _ = writeln!(
            output,
            "    GPA {} | GRE {} | English {} | Papers {} | Experience {}",
            or_missing(admit.gpa.as_deref()),
            or_missing(admit.gre.as_deref()),
            or_missing(admit.english_score.as_deref()),
            or_missing(admit.papers.as_deref()),
            or_missing(admit.work_experience.as_deref())
        );
    }
}

pub fn course_card(saved: &[i64]) -> impl Fn(&CourseRecord, &mut String) + '_ {
    move |course: &CourseRecord, output: &mut String| {
        let marker = if saved.contains(&course.id) { "★" } else { " " };
        let _ = writeln!(
            output,
            "{marker} #{} {} — {}",
            course.id,
            or_missing(course.program.as_deref()),
            or_missing(course.university.as_deref())
        );
        if let Some(concentration) = course.concentration.as_deref() {
            let _ = writeln!(output, "    Concentration: {concentration}");
        }
        let _ = writeln!(
            output,
            "    {} | {} | {} | Tuition {}",
            or_missing(course.country.as_deref()),
            or_missing(course.study_level.as_deref()),
            or_missing(course.duration.as_deref()),
            or_missing(course.tuition.as_deref())
        );
        let _ = writeln!(
            output,
            "    Intakes: {} | Deadline: {} | English: {}",
            or_missing(course.intakes.as_deref()),
            or_missing(course.deadline.as_deref()),
            or_missing(course.english_requirement.as_deref())
        );
    }
}

/// Most common universities among the filtered results.
pub fn top_universities<T: Filterable>(
    records: &[&T],
    field: T::Field,
    limit: usize,
) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        if let Some(name) = record.field(field) {
            *counts.entry(name).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

pub fn render_shortlist<T>(title: &str, records: &[T], card: impl Fn(&T, &mut String)) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# {title}");
    if records.is_empty() {
        let _ = writeln!(output, "Nothing saved yet.");
        return output;
    }
    for record in records {
        let _ = writeln!(output);
        card(record, &mut output);
    }
    output
}

pub fn render_documents(profile: &Profile, record: &StudentDocumentRecord) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "# Documents for {}",
        profile.full_name.as_deref().unwrap_or("unnamed student")
    );
    if let Some(email) = profile.email.as_deref() {
        let _ = writeln!(output, "{email}");
    }

    for kind in DocumentKind::ALL {
        let entry = record.entry(kind);
        let _ = writeln!(output);
        let status = if entry.verified { "verified" } else { "pending" };
        let _ = writeln!(output, "## {} ({status})", kind.label());

        match entry.file_name.as_deref() {
            Some(file_name) => {
                let size = entry
                    .file_size
                    .map(|bytes| format!("{:.1} KB", bytes as f64 / 1024.0))
                    .unwrap_or_else(|| MISSING.to_string());
                let uploaded = entry
                    .uploaded_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| MISSING.to_string());
                let _ = writeln!(output, "File: {file_name} ({size}), uploaded {uploaded}");
            }
            None => {
                let _ = writeln!(output, "Not uploaded.");
            }
        }

        match entry.feedback.as_deref() {
            Some(feedback) => {
                let by = or_missing(entry.feedback_by.as_deref());
                let at = entry
                    .feedback_at
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| MISSING.to_string());
                let _ = writeln!(output, "Feedback ({by}, {at}): {feedback}");
            }
            None => {
                let _ = writeln!(output, "No feedback yet.");
            }
        }
    }
    output
}

pub fn render_application(application: &ApplicationRecord) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "# Application #{}: {} at {}",
        application.id,
        or_missing(application.program.as_deref()),
        or_missing(application.university.as_deref())
    );
    let _ = writeln!(output, "Student: {}", application.user_id);

    if application.documents.is_empty() {
        let _ = writeln!(output, "No documents uploaded.");
        return output;
    }
    for (category, url) in &application.documents {
        let _ = writeln!(output, "- {category}: {url}");
    }
    output
}
