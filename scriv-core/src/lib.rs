//! # scriv-core
//!
//! Core library for the scriv blog generator.
//!
//! This crate provides the extensible markdown engine (AST, parsers,
//! transformers, renderer and the blog extensions), front-matter and
//! bibliography decoding, site configuration and post discovery.

pub mod bibliography;
pub mod config;
pub mod frontmatter;
pub mod markdown;
pub mod models;
pub mod posts;
pub mod slug;
pub mod testing;

pub use bibliography::{BibEntry, Bibliography, BibliographyStore};
pub use config::{Config, ConfigError};
pub use frontmatter::{decode_meta, FrontMatterError};
pub use markdown::context::ParseContext;
pub use markdown::render::RenderError;
pub use markdown::{Engine, EngineBuilder, Extension, HeadingAnchors, RenderOptions, Transformer};
pub use models::{Asset, Diagnostic, DiagnosticSeverity, PostMeta};
pub use posts::{discover_posts, DiscoverError};
pub use slug::slugify;
