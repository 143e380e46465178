//! Runtime configuration, read from the environment (and `.env` if present).

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use tracing::debug;

pub mod defaults {
    pub const MAX_CONNECTIONS: u32 = 5;
    pub const STORAGE_DIR: &str = ".eduabroad";
    pub const REVIEWER_NAME: &str = "EduAbroad Agency";
    pub const ADMIT_PAGE_SIZE: usize = 12;
    pub const COURSE_PAGE_SIZE: usize = 15;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub storage_dir: PathBuf,
    pub reviewer_name: String,
    pub agency_passcode: Option<String>,
    pub admit_page_size: usize,
    pub course_page_size: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let max_connections =
            parse_or(&present, "DATABASE_MAX_CONNECTIONS", defaults::MAX_CONNECTIONS)?;
        let admit_page_size = parse_or(&present, "ADMIT_PAGE_SIZE", defaults::ADMIT_PAGE_SIZE)?;
        let course_page_size =
            parse_or(&present, "COURSE_PAGE_SIZE", defaults::COURSE_PAGE_SIZE)?;

        Ok(Self {
            database_url: present("DATABASE_URL"),
            max_connections,
            storage_dir: present("EDUABROAD_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(defaults::STORAGE_DIR)),
            reviewer_name: present("EDUABROAD_REVIEWER_NAME")
                .unwrap_or_else(|| defaults::REVIEWER_NAME.to_string()),
            agency_passcode: present("EDUABROAD_AGENCY_PASSCODE"),
            admit_page_size: positive(admit_page_size, "ADMIT_PAGE_SIZE")?,
            course_page_size: positive(course_page_size, "COURSE_PAGE_SIZE")?,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to the EduAbroad Postgres instance")
    }
}

fn parse_or<T>(
    present: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match present(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("invalid {key} value '{raw}': {err}")),
        None => Ok(default),
    }
}

fn positive(value: usize, key: &str) -> anyhow::Result<usize> {
    if value == 0 {
        return Err(anyhow!("{key} must be greater than zero"));
    }
    Ok(value)
}
