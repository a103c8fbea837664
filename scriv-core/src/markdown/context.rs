//! Per-document parse context.
//!
//! Created fresh for every document, threaded through the parser, every
//! transform and the renderer, then drained by the compiler.

use super::ast::NodeId;
use crate::bibliography::Bibliography;
use crate::models::{Asset, Diagnostic, PostMeta};
use scriv_types::{Feature, FeatureSet};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// The document title derived from the first heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub text: String,
    pub node: NodeId,
}

#[derive(Debug, Default)]
pub struct ParseContext {
    pub meta: PostMeta,
    pub file_path: PathBuf,
    pub title: Option<Title>,
    pub features: FeatureSet,
    pub heading_ids: HashSet<String>,
    /// `::: preview URL` blocks by URL.
    pub previews: HashMap<String, NodeId>,
    /// Entries of every file named in `meta.bib_paths`.
    pub bibliography: Bibliography,
    errors: Vec<Diagnostic>,
    assets: Vec<Asset>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for the markdown file at `path`.
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: path.into(),
            ..Self::default()
        }
    }

    /// Record a diagnostic, stamping it with this document's path.
    pub fn add_error(&mut self, diagnostic: Diagnostic) {
        let diagnostic = if diagnostic.source_path.is_none() && !self.file_path.as_os_str().is_empty() {
            diagnostic.with_path(self.file_path.to_string_lossy())
        } else {
            diagnostic
        };
        tracing::debug!(code = %diagnostic.code, "recorded diagnostic");
        self.errors.push(diagnostic);
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(Diagnostic::is_error)
    }

    pub fn take_errors(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.errors)
    }

    /// Record an asset. Later entries with an already-recorded URL are ignored,
    /// so first-occurrence order is preserved.
    pub fn add_asset(&mut self, asset: Asset) {
        if self.assets.iter().any(|a| a.url == asset.url) {
            return;
        }
        self.assets.push(asset);
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn add_feature(&mut self, feature: Feature) {
        self.features.insert(feature);
    }

    /// Directory containing the source file; relative links resolve against it.
    pub fn source_dir(&self) -> &Path {
        self.file_path.parent().unwrap_or_else(|| Path::new(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assets_keep_first_occurrence() {
        let mut ctx = ParseContext::new();
        for (url, src) in [("/a.png", "a1"), ("/b.png", "b"), ("/a.png", "a2")] {
            ctx.add_asset(Asset {
                url: url.into(),
                source: src.into(),
                generator: None,
            });
        }
        let urls: Vec<_> = ctx.assets().iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["/a.png", "/b.png"]);
        assert_eq!(ctx.assets()[0].source, PathBuf::from("a1"));
    }

    #[test]
    fn test_errors_are_stamped_with_path() {
        let mut ctx = ParseContext::for_file("posts/x.md");
        ctx.add_error(Diagnostic::error("x", "boom"));
        assert!(ctx.has_errors());
        assert_eq!(ctx.errors()[0].source_path.as_deref(), Some("posts/x.md"));
        assert_eq!(ctx.take_errors().len(), 1);
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_source_dir() {
        let ctx = ParseContext::for_file("posts/2019/x.md");
        assert_eq!(ctx.source_dir(), Path::new("posts/2019"));
        assert_eq!(ParseContext::new().source_dir(), Path::new(""));
    }
}
