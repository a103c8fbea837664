//! Content model structs for posts, assets and diagnostics.

use chrono::NaiveDate;
use scriv_types::Visibility;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Per-post metadata decoded from the TOML front-matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostMeta {
    /// URL slug; also the output directory name.
    pub slug: String,

    /// Publication date.
    pub date: Option<NaiveDate>,

    /// Absolute URL path of the post, usually `"/" + slug`.
    pub path: String,

    /// Display title, filled from the first heading after parsing.
    pub title: String,

    pub visibility: Visibility,

    /// Bibliography files, relative to the post's directory.
    pub bib_paths: Vec<PathBuf>,
}

impl PostMeta {
    pub fn is_published(&self) -> bool {
        self.visibility == Visibility::Published
    }
}

/// A file referenced by a document that must be copied next to the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Destination URL, absolute (`/slug/img.png`).
    pub url: String,

    /// Location of the source file on disk.
    pub source: PathBuf,

    /// Name of the step that produced the asset, for generated files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

impl DiagnosticSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Info => "info",
        }
    }
}

/// A problem recorded while compiling a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable machine-readable code, e.g. `citation.missing_key`.
    pub code: String,
    pub message: String,
    pub severity: DiagnosticSeverity,
    pub source_path: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity: DiagnosticSeverity::Error,
            source_path: None,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: {}",
            self.severity.as_str(),
            self.source_path.as_deref().unwrap_or("-"),
            self.code,
            self.message
        )
    }
}
