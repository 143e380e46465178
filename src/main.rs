use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use eduabroad_finder::config::Config;
use eduabroad_finder::db::{self, PgDocumentStore};
use eduabroad_finder::error::FinderError;
use eduabroad_finder::experience::ExperienceRange;
use eduabroad_finder::filter::{
    AdmitField, CourseField, Criterion, ADMIT_SEARCH_FIELDS, COURSE_SEARCH_FIELDS,
};
use eduabroad_finder::finder::Finder;
use eduabroad_finder::models::{AdmitRecord, CourseRecord, DocumentKind};
use eduabroad_finder::normalize::{normalize_admits, normalize_courses};
use eduabroad_finder::options::{distinct_options, distinct_years};
use eduabroad_finder::render;
use eduabroad_finder::review::ReviewSession;
use eduabroad_finder::shortlist::{Shortlistable, ShortlistStore, COLLEGES_KEY, COURSES_KEY};
use eduabroad_finder::storage::{AgencySession, FileStorage, Storage};

#[derive(Parser)]
#[command(name = "eduabroad")]
#[command(
    about = "Admit finder, course finder and document review for EduAbroad",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import admit profiles from a CSV file
    ImportAdmits {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import course listings from a CSV file
    ImportCourses {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Browse historical admits
    Admits(AdmitArgs),
    /// Browse course listings
    Courses(CourseArgs),
    /// Manage saved colleges and courses
    Shortlist {
        #[command(subcommand)]
        list: ShortlistKind,
    },
    /// Sign the agency reviewer in or out
    Agency {
        #[command(subcommand)]
        action: AgencyAction,
    },
    /// Show a student's document bundle
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },
    /// Save or delete feedback on a student document
    Feedback {
        #[command(subcommand)]
        action: FeedbackAction,
    },
    /// Toggle the verified flag on a student document
    Verify {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        doc: DocumentKind,
    },
    /// Show an application's uploaded documents
    Application {
        #[command(subcommand)]
        action: ApplicationAction,
    },
}

#[derive(Args)]
struct AdmitArgs {
    /// Matches university, course, undergraduate institute or major
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    intake: Option<String>,
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    university: Option<String>,
    #[arg(long)]
    course: Option<String>,
    /// Work experience in months: 0, MIN-MAX or N+
    #[arg(long)]
    experience: Option<ExperienceRange>,
    #[arg(long, default_value_t = 1)]
    page: usize,
    /// Print the available filter values instead of results
    #[arg(long)]
    options: bool,
}

#[derive(Args)]
struct CourseArgs {
    /// Matches university, program or concentration
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    level: Option<String>,
    #[arg(long)]
    university: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long)]
    options: bool,
}

#[derive(Subcommand)]
enum ShortlistKind {
    Colleges {
        #[command(subcommand)]
        action: ShortlistAction,
    },
    Courses {
        #[command(subcommand)]
        action: ShortlistAction,
    },
}

#[derive(Subcommand)]
enum ShortlistAction {
    /// Save the record if it is not saved, otherwise remove it
    Toggle {
        #[arg(long)]
        id: i64,
    },
    List,
}

#[derive(Subcommand)]
enum AgencyAction {
    Login {
        #[arg(long)]
        passcode: String,
    },
    Logout,
}

#[derive(Subcommand)]
enum DocumentsAction {
    Show {
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Subcommand)]
enum FeedbackAction {
    Save {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        doc: DocumentKind,
        #[arg(long)]
        text: String,
    },
    Delete {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        doc: DocumentKind,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ApplicationAction {
    Show {
        #[arg(long)]
        id: i64,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    eprint!("{prompt} [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Exit status for not-found and permission failures.
const EXIT_DEAD_END: u8 = 2;

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<FinderError>() {
        Some(finder) if finder.is_terminal() => EXIT_DEAD_END,
        _ => 1,
    }
}

/// Dead ends get the error banner and a pointer back to the listings; anything
/// else is reported as a plain error.
fn report_failure(err: &anyhow::Error) -> ExitCode {
    let status = exit_status(err);
    if status == EXIT_DEAD_END {
        eprintln!("{}", render::render_error_banner(&err.to_string()).trim_end());
        eprintln!("Run `eduabroad admits` or `eduabroad courses` to go back to the listings.");
    } else {
        eprintln!("Error: {err:#}");
    }
    ExitCode::from(status)
}

async fn load_admits(config: &Config) -> Vec<AdmitRecord> {
    let rows = match connect(config).await {
        Ok(pool) => db::fetch_admits(&pool).await.map_err(anyhow::Error::from),
        Err(err) => Err(err),
    };
    match rows {
        Ok(rows) => normalize_admits(rows),
        Err(err) => {
            warn!(error = %err, "failed to load admits");
            print!("{}", render::render_error_banner(&format!("{err:#}")));
            Vec::new()
        }
    }
}

async fn load_courses(config: &Config) -> Vec<CourseRecord> {
    let rows = match connect(config).await {
        Ok(pool) => db::fetch_courses(&pool).await.map_err(anyhow::Error::from),
        Err(err) => Err(err),
    };
    match rows {
        Ok(rows) => normalize_courses(rows),
        Err(err) => {
            warn!(error = %err, "failed to load courses");
            print!("{}", render::render_error_banner(&format!("{err:#}")));
            Vec::new()
        }
    }
}

fn or_blank(value: Option<String>) -> String {
    value.unwrap_or_default()
}

async fn browse_admits(config: &Config, storage: Arc<dyn Storage>, args: AdmitArgs) {
    let admits = load_admits(config).await;

    if args.options {
        let groups = [
            ("Intake", distinct_options(&admits, AdmitField::IntakeTerm)),
            ("Year", distinct_years(&admits, AdmitField::IntakeYear)),
            ("University", distinct_options(&admits, AdmitField::University)),
            ("Course", distinct_options(&admits, AdmitField::Course)),
        ];
        for (label, values) in groups {
            print!("{}", render::render_options(label, &values));
        }
        return;
    }

    let mut finder = Finder::new(admits, config.admit_page_size);
    finder.set_criterion(Criterion::text(&ADMIT_SEARCH_FIELDS, or_blank(args.search)));
    let selections = [
        (AdmitField::IntakeTerm, args.intake),
        (AdmitField::IntakeYear, args.year),
        (AdmitField::University, args.university),
        (AdmitField::Course, args.course),
    ];
    for (field, value) in selections {
        finder.set_criterion(Criterion::exact(field, or_blank(value)));
    }
    if let Some(range) = args.experience {
        finder.set_criterion(Criterion::Experience {
            field: AdmitField::WorkExperience,
            range,
        });
    }
    finder.go_to(args.page);

    let saved: ShortlistStore<AdmitRecord> = ShortlistStore::load(storage, COLLEGES_KEY);
    let card = render::admit_card(saved.ids());
    print!("{}", render::render_page("Admits", &finder, card));

    let results = finder.results();
    let top: Vec<String> = render::top_universities(&results, AdmitField::University, 3)
        .into_iter()
        .map(|(name, count)| format!("{name} ({count})"))
        .collect();
    if !top.is_empty() {
        println!();
        println!("Most admits: {}", top.join(", "));
    }
}

async fn browse_courses(config: &Config, storage: Arc<dyn Storage>, args: CourseArgs) {
    let courses = load_courses(config).await;

    if args.options {
        let groups = [
            ("Country", distinct_options(&courses, CourseField::Country)),
            ("Level", distinct_options(&courses, CourseField::StudyLevel)),
            ("University", distinct_options(&courses, CourseField::University)),
        ];
        for (label, values) in groups {
            print!("{}", render::render_options(label, &values));
        }
        return;
    }

    let mut finder = Finder::new(courses, config.course_page_size);
    finder.set_criterion(Criterion::text(&COURSE_SEARCH_FIELDS, or_blank(args.search)));
    let selections = [
        (CourseField::Country, args.country),
        (CourseField::StudyLevel, args.level),
        (CourseField::University, args.university),
    ];
    for (field, value) in selections {
        finder.set_criterion(Criterion::exact(field, or_blank(value)));
    }
    finder.go_to(args.page);

    let saved: ShortlistStore<CourseRecord> = ShortlistStore::load(storage, COURSES_KEY);
    let card = render::course_card(saved.ids());
    print!("{}", render::render_page("Courses", &finder, card));
}

async fn run_shortlist(
    config: &Config,
    storage: Arc<dyn Storage>,
    list: ShortlistKind,
) -> anyhow::Result<()> {
    match list {
        ShortlistKind::Colleges { action } => {
            let mut store: ShortlistStore<AdmitRecord> =
                ShortlistStore::load(storage, COLLEGES_KEY);
            match action {
                ShortlistAction::Toggle { id } => {
                    let pool = connect(config).await?;
                    let admit = db::fetch_admit(&pool, id).await?;
                    toggle_and_report(&mut store, &admit);
                }
                ShortlistAction::List => {
                    let card = render::admit_card(store.ids());
                    print!(
                        "{}",
                        render::render_shortlist("Saved colleges", store.records(), card)
                    );
                }
            }
        }
        ShortlistKind::Courses { action } => {
            let mut store: ShortlistStore<CourseRecord> =
                ShortlistStore::load(storage, COURSES_KEY);
            match action {
                ShortlistAction::Toggle { id } => {
                    let pool = connect(config).await?;
                    let course = db::fetch_course(&pool, id).await?;
                    toggle_and_report(&mut store, &course);
                }
                ShortlistAction::List => {
                    let card = render::course_card(store.ids());
                    print!(
                        "{}",
                        render::render_shortlist("Saved courses", store.records(), card)
                    );
                }
            }
        }
    }
    Ok(())
}

fn toggle_and_report<T: Shortlistable>(store: &mut ShortlistStore<T>, item: &T) {
    let mut changes = store.subscribe();
    store.toggle(item);
    while let Some(event) = changes.try_recv() {
        let verb = if event.saved { "Saved" } else { "Removed" };
        println!(
            "{verb} #{} ({} now holds {} items).",
            event.id,
            event.key,
            store.ids().len()
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(config.storage_dir.clone()));

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportAdmits { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_admits_csv(&pool, &csv).await?;
            println!("Inserted {inserted} admits from {}.", csv.display());
        }
        Commands::ImportCourses { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_courses_csv(&pool, &csv).await?;
            println!("Inserted {inserted} courses from {}.", csv.display());
        }
        Commands::Admits(args) => browse_admits(&config, storage, args).await,
        Commands::Courses(args) => browse_courses(&config, storage, args).await,
        Commands::Shortlist { list } => run_shortlist(&config, storage, list).await?,
        Commands::Agency { action } => {
            let session = AgencySession::new(storage.as_ref());
            match action {
                AgencyAction::Login { passcode } => {
                    session
                        .sign_in(&passcode, config.agency_passcode.as_deref())
                        ?;
                    println!("Signed in as {}.", config.reviewer_name);
                }
                AgencyAction::Logout => {
                    session.sign_out()?;
                    println!("Signed out.");
                }
            }
        }
        Commands::Documents {
            action: DocumentsAction::Show { user },
        } => {
            AgencySession::new(storage.as_ref()).require()?;
            let pool = connect(&config).await?;
            let profile = db::fetch_profile(&pool, user).await?;
            let store = PgDocumentStore::new(pool);
            let session = ReviewSession::open(&store, user, config.reviewer_name.clone())
                .await?;
            print!("{}", render::render_documents(&profile, session.record()));
        }
        Commands::Feedback { action } => {
            AgencySession::new(storage.as_ref()).require()?;
            let pool = connect(&config).await?;
            let store = PgDocumentStore::new(pool);

            match action {
                FeedbackAction::Save { user, doc, text } => {
                    let mut session =
                        ReviewSession::open(&store, user, config.reviewer_name.clone())
                            .await?;
                    session.save_feedback(doc, &text).await?;
                    println!("{} feedback saved.", doc.label());
                }
                FeedbackAction::Delete { user, doc, yes } => {
                    let mut session =
                        ReviewSession::open(&store, user, config.reviewer_name.clone())
                            .await?;
                    if !yes && !confirm(&format!("Delete {} feedback for {user}?", doc.label()))? {
                        println!("Nothing deleted.");
                        return Ok(());
                    }
                    session.delete_feedback(doc).await?;
                    println!("{} feedback deleted.", doc.label());
                }
            }
        }
        Commands::Verify { user, doc } => {
            AgencySession::new(storage.as_ref()).require()?;
            let pool = connect(&config).await?;
            let store = PgDocumentStore::new(pool);
            let mut session = ReviewSession::open(&store, user, config.reviewer_name.clone())
                .await?;
            let verified = session.toggle_verified(doc).await?;
            let state = if verified { "verified" } else { "unverified" };
            println!("{} marked {state}.", doc.label());
        }
        Commands::Application {
            action: ApplicationAction::Show { id },
        } => {
            AgencySession::new(storage.as_ref()).require()?;
            let pool = connect(&config).await?;
            let application = db::fetch_application(&pool, id).await?;
            print!("{}", render::render_application(&application));
        }
    }

    Ok(())
}
