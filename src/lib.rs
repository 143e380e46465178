//! Admit, course and document tooling for the EduAbroad study-abroad platform.
//!
//! Listings are loaded from the hosted Postgres tables, normalized, and then
//! filtered and paged entirely in memory. Saved items live in local JSON blobs.
//! Agency reviewers edit document feedback through [`review::ReviewSession`].

pub mod config;
pub mod db;
pub mod error;
pub mod experience;
pub mod filter;
pub mod finder;
pub mod models;
pub mod normalize;
pub mod options;
pub mod paginate;
pub mod render;
pub mod review;
pub mod shortlist;
pub mod storage;
