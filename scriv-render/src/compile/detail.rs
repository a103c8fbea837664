//! Detail compiler: one `index.html` per post plus its assets.

use super::{report_diagnostics, run_bounded, run_per_file, validate_slugs, CompileError, CompileReport, RenderedPost};
use crate::templates::{PostTemplate, SiteInfo};
use askama::Template;
use scriv_core::{discover_posts, Config, Diagnostic, Engine};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Render every post matched by the configured glob and write
/// `<output>/<slug>/index.html`, copying the assets each post references.
pub async fn compile_details(config: &Config) -> Result<CompileReport, CompileError> {
    let (posts, mut report) = render_all(config).await?;

    let site = SiteInfo::from(&config.site);
    let output = config.output_dir();
    let written = run_bounded(posts, config.concurrency(), move |post| write_post(&site, &output, post)).await?;
    for (page, diagnostics) in written {
        report.pages.push(page);
        report.diagnostics.extend(diagnostics);
    }

    report_diagnostics(&report.diagnostics);
    tracing::info!(pages = report.pages.len(), errors = report.error_count(), "detail pages written");
    Ok(report)
}

/// Parse, transform and render every post without writing anything.
pub async fn check_posts(config: &Config) -> Result<CompileReport, CompileError> {
    let (_, report) = render_all(config).await?;
    report_diagnostics(&report.diagnostics);
    Ok(report)
}

async fn render_all(config: &Config) -> Result<(Vec<RenderedPost>, CompileReport), CompileError> {
    let root = config.posts_dir();
    let paths = discover_posts(&root, config.glob.as_deref())?;
    tracing::info!(root = %root.display(), posts = paths.len(), "compiling posts");

    let engine = Arc::new(Engine::detail(config.render_options()));
    let rendered = run_per_file(paths, config.concurrency(), move |path| super::render_post(&engine, path)).await?;

    let mut report = CompileReport {
        posts: rendered.len(),
        ..CompileReport::default()
    };
    for post in &rendered {
        report.diagnostics.extend(post.diagnostics.iter().cloned());
    }
    let posts = validate_slugs(rendered, &mut report.diagnostics);
    Ok((posts, report))
}

fn write_post(site: &SiteInfo, output: &Path, post: RenderedPost) -> Result<(PathBuf, Vec<Diagnostic>), CompileError> {
    let dir = output.join(&post.meta.slug);
    fs::create_dir_all(&dir).map_err(CompileError::file(&dir))?;

    let page = PostTemplate::new(site.clone(), post.title().to_string(), post.html, &post.features).render()?;
    let target = dir.join("index.html");
    fs::write(&target, page).map_err(CompileError::file(&target))?;
    tracing::debug!(slug = %post.meta.slug, "wrote post");

    let mut diagnostics = Vec::new();
    for asset in &post.assets {
        let dest = output.join(asset.url.trim_start_matches('/'));
        if !asset.source.is_file() {
            diagnostics.push(
                Diagnostic::error(
                    "asset.missing",
                    format!("asset {} not found at {}", asset.url, asset.source.display()),
                )
                .with_path(post.source.to_string_lossy()),
            );
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(CompileError::file(parent))?;
        }
        fs::copy(&asset.source, &dest).map_err(CompileError::file(&asset.source))?;
        tracing::debug!(url = %asset.url, "copied asset");
    }

    Ok((target, diagnostics))
}
