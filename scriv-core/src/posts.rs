//! Post discovery.
//!
//! A file is a post when it has the `.md` extension and its first line is the
//! `+++` front-matter delimiter.

use crate::frontmatter::DELIMITER;
use globset::{Glob, GlobMatcher};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Invalid glob '{0}': {1}")]
    Glob(String, #[source] globset::Error),
}

/// Whether the file at `path` opens with a front-matter block.
pub fn opens_with_front_matter(path: &Path) -> io::Result<bool> {
    let mut first = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first)?;
    Ok(first.trim_end() == DELIMITER)
}

/// Every post below `root`, sorted by path. When `glob` is given only posts
/// whose path relative to `root` matches are returned.
pub fn discover_posts(root: &Path, glob: Option<&str>) -> Result<Vec<PathBuf>, DiscoverError> {
    let matcher: Option<GlobMatcher> = glob
        .map(|g| {
            Glob::new(g)
                .map(|g| g.compile_matcher())
                .map_err(|e| DiscoverError::Glob(g.to_string(), e))
        })
        .transpose()?;

    let mut posts = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| DiscoverError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension() != Some("md".as_ref()) {
            continue;
        }

        let rel = path.strip_prefix(root).unwrap_or(path);
        if let Some(matcher) = &matcher {
            if !matcher.is_match(rel) {
                tracing::debug!(path = %rel.display(), "skipping post outside glob");
                continue;
            }
        }

        match opens_with_front_matter(path) {
            Ok(true) => posts.push(path.to_path_buf()),
            Ok(false) => {
                tracing::debug!(path = %rel.display(), "skipping markdown file without front-matter");
            }
            Err(err) => {
                tracing::warn!(path = %rel.display(), error = %err, "could not read markdown file");
            }
        }
    }
    Ok(posts)
}
