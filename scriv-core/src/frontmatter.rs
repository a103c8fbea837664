//! TOML front-matter decoding.
//!
//! A post opens with a block delimited by `+++` lines:
//!
//! ```text
//! +++
//! slug = "a_slug"
//! date = 2019-09-20
//! visibility = "published"
//! +++
//! # Title
//! ```

use crate::models::PostMeta;
use chrono::NaiveDate;
use scriv_types::Visibility;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Line delimiting the front-matter block.
pub const DELIMITER: &str = "+++";

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid date '{0}': expected a local date like 2019-09-20")]
    InvalidDate(String),
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    #[serde(default)]
    slug: Option<String>,

    #[serde(default)]
    date: Option<toml::value::Datetime>,

    #[serde(default)]
    path: Option<String>,

    #[serde(default)]
    visibility: Option<Visibility>,

    #[serde(default)]
    bib_paths: Vec<PathBuf>,
}

/// Decode the body of a front-matter block (without the `+++` lines).
pub fn decode_meta(source: &str) -> Result<PostMeta, FrontMatterError> {
    let raw: RawMeta = toml::from_str(source)?;

    let date = match raw.date {
        Some(dt) => {
            let date = dt
                .date
                .ok_or_else(|| FrontMatterError::InvalidDate(dt.to_string()))?;
            Some(
                NaiveDate::from_ymd_opt(date.year as i32, date.month as u32, date.day as u32)
                    .ok_or_else(|| FrontMatterError::InvalidDate(dt.to_string()))?,
            )
        }
        None => None,
    };

    let slug = raw.slug.unwrap_or_default().trim().to_string();
    let path = match raw.path {
        Some(p) if !p.trim().is_empty() => p.trim().to_string(),
        _ if !slug.is_empty() => format!("/{}", slug),
        _ => String::new(),
    };

    Ok(PostMeta {
        slug,
        date,
        path,
        title: String::new(),
        visibility: raw.visibility.unwrap_or_default(),
        bib_paths: raw.bib_paths,
    })
}

/// Whether `content` opens with a front-matter delimiter line, i.e. is a blog post.
pub fn has_front_matter(content: &str) -> bool {
    content
        .lines()
        .next()
        .map(|line| line.trim_end() == DELIMITER)
        .unwrap_or(false)
}
