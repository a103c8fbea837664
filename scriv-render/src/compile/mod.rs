//! The detail and index compilers.
//!
//! Both compilers render every post on its own blocking task. Tasks are
//! bounded by a semaphore sized from `Config::concurrency`, and the first
//! failing task aborts the rest of the group.

mod detail;
mod index;

pub use detail::{check_posts, compile_details};
pub use index::compile_index;

use scriv_core::{
    Asset, Diagnostic, DiagnosticSeverity, DiscoverError, Engine, ParseContext, PostMeta,
    RenderError,
};
use scriv_types::FeatureSet;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to discover posts: {0}")]
    Discover(#[from] DiscoverError),

    #[error("Failed to render {path}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("Failed to render page template: {0}")]
    Template(#[from] askama::Error),

    #[error("Compile task failed: {0}")]
    Join(#[from] JoinError),
}

impl CompileError {
    pub(crate) fn file(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| CompileError::File { path, source }
    }
}

/// Outcome of a compiler run.
#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    /// Files written under the output directory.
    pub pages: Vec<PathBuf>,
    /// Number of posts parsed and rendered.
    pub posts: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Fold `other` into this report. Diagnostics already present are skipped,
    /// so the same problem found by both compilers is reported once.
    pub fn merge(&mut self, other: CompileReport) {
        self.pages.extend(other.pages);
        self.posts = self.posts.max(other.posts);
        for diagnostic in other.diagnostics {
            if !self.diagnostics.contains(&diagnostic) {
                self.diagnostics.push(diagnostic);
            }
        }
    }
}

/// A post after parse, transform and render.
#[derive(Debug, Clone)]
pub struct RenderedPost {
    pub source: PathBuf,
    pub meta: PostMeta,
    pub html: String,
    pub features: FeatureSet,
    pub assets: Vec<Asset>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RenderedPost {
    /// Title for the page template, falling back to the slug.
    pub fn title(&self) -> &str {
        if self.meta.title.is_empty() {
            &self.meta.slug
        } else {
            &self.meta.title
        }
    }
}

/// Read and render one post.
pub fn render_post(engine: &Engine, path: &Path) -> Result<RenderedPost, CompileError> {
    let source = std::fs::read_to_string(path).map_err(CompileError::file(path))?;
    let mut ctx = ParseContext::for_file(path);
    let html = engine
        .convert(&source, &mut ctx)
        .map_err(|source| CompileError::Render {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(slug = %ctx.meta.slug, "rendered post");
    let assets = ctx.assets().to_vec();
    let diagnostics = ctx.take_errors();
    Ok(RenderedPost {
        source: path.to_path_buf(),
        meta: ctx.meta,
        html,
        features: ctx.features,
        assets,
        diagnostics,
    })
}

/// Keep posts that can be written: the slug must be non-empty and unique.
/// Posts are visited in path order so the later file of a duplicate pair is
/// the one rejected.
pub(crate) fn validate_slugs(posts: Vec<RenderedPost>, diagnostics: &mut Vec<Diagnostic>) -> Vec<RenderedPost> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut valid = Vec::with_capacity(posts.len());
    for post in posts {
        let path = post.source.to_string_lossy().to_string();
        if post.meta.slug.is_empty() {
            diagnostics.push(
                Diagnostic::error("meta.empty_slug", "front-matter slug must not be empty").with_path(path),
            );
            continue;
        }
        if !seen.insert(post.meta.slug.clone()) {
            diagnostics.push(
                Diagnostic::error(
                    "meta.duplicate_slug",
                    format!("slug '{}' is already used by another post", post.meta.slug),
                )
                .with_path(path),
            );
            continue;
        }
        valid.push(post);
    }
    valid
}

/// Emit one structured event per diagnostic.
pub fn report_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        let path = d.source_path.as_deref().unwrap_or("-");
        match d.severity {
            DiagnosticSeverity::Error => tracing::error!(
                severity = d.severity.as_str(),
                path,
                code = %d.code,
                message = %d.message,
                "diagnostic"
            ),
            DiagnosticSeverity::Warning => tracing::warn!(
                severity = d.severity.as_str(),
                path,
                code = %d.code,
                message = %d.message,
                "diagnostic"
            ),
            DiagnosticSeverity::Info => tracing::info!(
                severity = d.severity.as_str(),
                path,
                code = %d.code,
                message = %d.message,
                "diagnostic"
            ),
        }
    }
}

/// Run `job` on a blocking task for every item, at most `limit` at a time.
///
/// Results come back in input order. The first failure aborts the remaining
/// tasks and is returned; later failures are logged.
pub(crate) async fn run_bounded<T, R, F>(items: Vec<T>, limit: usize, job: F) -> Result<Vec<R>, CompileError>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Result<R, CompileError> + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let job = Arc::new(job);
    let mut set = JoinSet::new();
    let count = items.len();

    for (i, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let job = job.clone();
        set.spawn(bounded(semaphore, async move {
            let out = tokio::task::spawn_blocking(move || job(item)).await??;
            Ok::<_, CompileError>((i, out))
        }));
    }

    let mut results: Vec<Option<R>> = (0..count).map(|_| None).collect();
    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok((i, out))) => results[i] = Some(out),
            Ok(Err(err)) => fail(&mut set, &mut first_error, err),
            Err(err) if err.is_cancelled() => {}
            Err(err) => fail(&mut set, &mut first_error, err.into()),
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(results.into_iter().flatten().collect()),
    }
}

async fn bounded<O>(semaphore: Arc<Semaphore>, work: impl Future<Output = Result<O, CompileError>>) -> Result<O, CompileError> {
    // The semaphore is never closed, so acquiring only fails after a bug.
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| CompileError::Io(std::io::Error::other(e)))?;
    work.await
}

fn fail<O: 'static>(set: &mut JoinSet<O>, first: &mut Option<CompileError>, err: CompileError) {
    if first.is_none() {
        set.abort_all();
        *first = Some(err);
    } else {
        tracing::error!(error = %err, "compile task failed after cancellation");
    }
}

/// Run `job` for every path inside a `compile` span carrying the path.
pub(crate) async fn run_per_file<R, F>(paths: Vec<PathBuf>, limit: usize, job: F) -> Result<Vec<R>, CompileError>
where
    R: Send + 'static,
    F: Fn(&Path) -> Result<R, CompileError> + Send + Sync + 'static,
{
    run_bounded(paths, limit, move |path: PathBuf| {
        let span = tracing::info_span!("compile", path = %path.display());
        let _enter = span.enter();
        job(&path)
    })
    .instrument(tracing::debug_span!("compile_group"))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(path: &str, slug: &str) -> RenderedPost {
        RenderedPost {
            source: PathBuf::from(path),
            meta: PostMeta {
                slug: slug.into(),
                ..PostMeta::default()
            },
            html: String::new(),
            features: FeatureSet::new(),
            assets: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_validate_slugs() {
        let mut diagnostics = Vec::new();
        let kept = validate_slugs(
            vec![post("a.md", "x"), post("b.md", ""), post("c.md", "x"), post("d.md", "y")],
            &mut diagnostics,
        );
        let slugs: Vec<_> = kept.iter().map(|p| p.meta.slug.as_str()).collect();
        assert_eq!(slugs, vec!["x", "y"]);

        let found: Vec<_> = diagnostics
            .iter()
            .map(|d| (d.code.as_str(), d.source_path.as_deref().unwrap_or("")))
            .collect();
        assert_eq!(found, vec![("meta.empty_slug", "b.md"), ("meta.duplicate_slug", "c.md")]);
    }

    #[test]
    fn test_merge_dedupes_diagnostics() {
        let diag = Diagnostic::error("citation.missing_key", "x").with_path("a.md");
        let mut report = CompileReport {
            pages: vec![PathBuf::from("dist/a/index.html")],
            posts: 2,
            diagnostics: vec![diag.clone()],
        };
        report.merge(CompileReport {
            pages: vec![PathBuf::from("dist/index.html")],
            posts: 1,
            diagnostics: vec![diag, Diagnostic::warning("footnote.unreferenced", "y")],
        });
        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.posts, 2);
        assert_eq!(report.diagnostics.len(), 2);
        assert_eq!(report.error_count(), 1);
    }

    #[tokio::test]
    async fn test_run_bounded_keeps_input_order() {
        let out = run_bounded((0..20).collect(), 3, |i: u32| Ok(i * 2)).await.unwrap();
        assert_eq!(out, (0..20).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_run_bounded_returns_first_error() {
        let err = run_bounded((0..8).collect(), 2, |i: u32| {
            if i == 3 {
                Err(CompileError::File {
                    path: PathBuf::from("three.md"),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
                })
            } else {
                Ok(i)
            }
        })
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("three.md:"));
    }
}
