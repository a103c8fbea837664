//! Build command implementation.

use super::load_config;
use anyhow::{Context, Result};
use scriv_render::{compile_details, compile_index, CompileReport};
use std::path::Path;

/// Build the post pages and the index page.
pub async fn build_site(config_path: &Path) -> Result<CompileReport> {
    let config = load_config(config_path)?;
    tracing::info!("Building site: {}", config.site.title);

    let mut report = compile_details(&config)
        .await
        .context("Failed to build post pages")?;
    report.merge(
        compile_index(&config)
            .await
            .context("Failed to build index page")?,
    );

    summarize(&report);
    tracing::info!("✓ Output written to {:?}", config.output_dir());
    Ok(report)
}

/// Build the post pages only.
pub async fn build_details(config_path: &Path) -> Result<CompileReport> {
    let config = load_config(config_path)?;
    let report = compile_details(&config)
        .await
        .context("Failed to build post pages")?;
    summarize(&report);
    Ok(report)
}

/// Build the index page only.
pub async fn build_index(config_path: &Path) -> Result<CompileReport> {
    let config = load_config(config_path)?;
    let report = compile_index(&config)
        .await
        .context("Failed to build index page")?;
    summarize(&report);
    Ok(report)
}

fn summarize(report: &CompileReport) {
    if report.has_errors() {
        tracing::error!(
            "Built {} pages from {} posts with {} errors",
            report.pages.len(),
            report.posts,
            report.error_count()
        );
    } else {
        tracing::info!("✓ Built {} pages from {} posts", report.pages.len(), report.posts);
    }
}
