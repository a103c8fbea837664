//! Check posts and print their diagnostics.

use super::load_config;
use anyhow::{Context, Result};
use scriv_core::{Diagnostic, DiagnosticSeverity};
use scriv_render::{check_posts, CompileReport};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct CheckSummary<'a> {
    posts: usize,
    errors: usize,
    warnings: usize,
    infos: usize,
    diagnostics: &'a [Diagnostic],
}

impl<'a> CheckSummary<'a> {
    fn new(report: &'a CompileReport) -> Self {
        let count = |severity| {
            report
                .diagnostics
                .iter()
                .filter(|d| d.severity == severity)
                .count()
        };
        Self {
            posts: report.posts,
            errors: count(DiagnosticSeverity::Error),
            warnings: count(DiagnosticSeverity::Warning),
            infos: count(DiagnosticSeverity::Info),
            diagnostics: &report.diagnostics,
        }
    }
}

/// Run the compile pipeline without writing output and print diagnostics.
pub async fn check_site(config_path: &Path, json: bool) -> Result<CompileReport> {
    let config = load_config(config_path)?;
    let report = check_posts(&config).await.context("Failed to check posts")?;
    let summary = CheckSummary::new(&report);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Check complete: {} posts, {} errors, {} warnings, {} info",
            summary.posts, summary.errors, summary.warnings, summary.infos
        );
        for diag in summary.diagnostics {
            println!("- {}", diag);
        }
    }

    Ok(report)
}
