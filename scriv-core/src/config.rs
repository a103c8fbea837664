//! Configuration parsing and management.

use crate::markdown::{HeadingAnchors, RenderOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Main configuration struct matching the scriv.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub site: SiteConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    /// Restricts the detail compiler to posts matching this glob, relative to the post root.
    #[serde(default)]
    pub glob: Option<String>,

    #[serde(default)]
    pub heading_anchors: bool,

    #[serde(default = "default_toc_depth")]
    pub toc_depth: u8,

    /// Concurrent compile tasks; defaults to the number of CPUs.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_toc_depth() -> u8 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub title: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_posts")]
    pub posts: PathBuf,

    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_posts() -> PathBuf {
    PathBuf::from("posts")
}

fn default_output() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            posts: default_posts(),
            output: default_output(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Parse and validate configuration from YAML text. Paths stay relative
    /// to the working directory.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for a site rooted at `dir`, with every default.
    pub fn for_directory(dir: impl Into<PathBuf>, title: &str) -> Self {
        let dir = dir.into();
        Self {
            site: SiteConfig {
                title: title.to_string(),
                author: String::new(),
                description: String::new(),
                url: String::new(),
            },
            paths: PathsConfig::default(),
            glob: None,
            heading_anchors: false,
            toc_depth: default_toc_depth(),
            max_concurrency: None,
            config_path: Some(dir.join("scriv.yml")),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=6).contains(&self.toc_depth) {
            return Err(ConfigError::InvalidValue {
                field: "toc_depth",
                reason: format!("{} is not a heading level (1-6)", self.toc_depth),
            });
        }
        if self.max_concurrency == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(glob) = &self.glob {
            globset::Glob::new(glob).map_err(|e| ConfigError::InvalidValue {
                field: "glob",
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Get the post root, resolved relative to config file
    pub fn posts_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.posts)
    }

    /// Get the output directory, resolved relative to config file
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.output)
    }

    /// Render options for both compilers.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            heading_anchors: if self.heading_anchors {
                HeadingAnchors::Shown
            } else {
                HeadingAnchors::Hidden
            },
            toc_depth: self.toc_depth,
        }
    }

    /// Number of files compiled at once.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(config_path) = &self.config_path {
            if let Some(parent) = config_path.parent() {
                parent.join(path)
            } else {
                path.to_path_buf()
            }
        } else {
            path.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
site:
  title: "Blog"
  author: "Someone"
  description: "Notes"
  url: "https://example.com"
paths:
  posts: "content"
  output: "public"
glob: "2024/**/*.md"
heading_anchors: true
toc_depth: 2
max_concurrency: 4
"#;

    #[test]
    fn test_default_values() {
        let config = Config::from_yaml("site:\n  title: Test\n").unwrap();

        assert_eq!(config.paths.posts, PathBuf::from("posts"));
        assert_eq!(config.paths.output, PathBuf::from("dist"));
        assert_eq!(config.glob, None);
        assert!(!config.heading_anchors);
        assert_eq!(config.toc_depth, 3);
        assert_eq!(config.render_options(), RenderOptions::default());
        assert!(config.concurrency() >= 1);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_yaml(FULL).unwrap();
        assert_eq!(config.site.author, "Someone");
        assert_eq!(config.glob.as_deref(), Some("2024/**/*.md"));
        assert_eq!(config.render_options().heading_anchors, HeadingAnchors::Shown);
        assert_eq!(config.render_options().toc_depth, 2);
        assert_eq!(config.concurrency(), 4);
    }

    #[test]
    fn test_paths_resolve_against_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", FULL).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        let dir = file.path().parent().unwrap();
        assert_eq!(config.posts_dir(), dir.join("content"));
        assert_eq!(config.output_dir(), dir.join("public"));
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_yaml("site: {title: x}\ntoc_depth: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "toc_depth", .. }));

        let err = Config::from_yaml("site: {title: x}\nmax_concurrency: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "max_concurrency", .. }));

        let err = Config::from_yaml("site: {title: x}\nglob: \"a/[\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "glob", .. }));

        assert!(matches!(
            Config::from_yaml("paths: {}\n").unwrap_err(),
            ConfigError::ParseError(_)
        ));
    }
}
