//! Built-in extensions.
//!
//! Each submodule provides one [`Extension`](super::Extension) and the
//! parsers, transformers and renderers it registers.

pub mod article;
pub mod citation;
pub mod colon;
pub mod continue_reading;
pub mod figure;
pub mod footnote;
pub mod front_matter;
pub mod heading_id;
pub mod katex;
pub mod links;
pub mod small_caps;
pub mod toc;
pub mod typography;

pub use article::{Article, Title};
pub use citation::{ArticleAttacher, Citations, DocumentAttacher, ReferencesAttacher};
pub use colon::ColonBlocks;
pub use continue_reading::{ContinueReading, ContinueReadingNop};
pub use figure::Figures;
pub use footnote::Footnotes;
pub use front_matter::FrontMatter;
pub use heading_id::HeadingIds;
pub use katex::Katex;
pub use links::Links;
pub use small_caps::SmallCaps;
pub use toc::TableOfContents;
pub use typography::Typography;

/// Registration priorities. Lower runs earlier.
pub mod priority {
    pub const TOML_BLOCK: i32 = 0;
    pub const COLON_BLOCK: i32 = 10;
    pub const COLON_LINE: i32 = 12;
    pub const KATEX_BLOCK: i32 = 150;
    pub const CONTINUE_READING_MARKER: i32 = 800;

    pub const SMALL_CAPS: i32 = 100;
    pub const TYPOGRAPHY: i32 = 200;

    pub const TITLE_CLAIM: i32 = 590;
    pub const HEADING_ID: i32 = 600;
    pub const TITLE: i32 = 890;
    pub const ARTICLE: i32 = 900;
    pub const LINK_DECORATION: i32 = 900;
    pub const LINK_ASSET: i32 = 901;
    pub const CITATION: i32 = 950;
    pub const IMAGE: i32 = 999;
    pub const FIGURE: i32 = 999;
    pub const TOC: i32 = 1000;
    pub const CONTINUE_READING: i32 = 1001;
    pub const FOOTNOTE_ORDER: i32 = 1100;
    pub const KATEX_FEATURE: i32 = 1200;
}

/// Relative link destination with `./` prefixes removed, or `None` for
/// absolute URLs, absolute paths, fragments and paths escaping the directory.
pub(crate) fn relative_destination(dest: &str) -> Option<String> {
    let dest = dest.trim();
    if dest.is_empty() || dest.starts_with('/') || dest.starts_with('#') || dest.starts_with('?') {
        return None;
    }
    if url::Url::parse(dest).is_ok() {
        return None;
    }
    let path = dest.split(['?', '#']).next().unwrap_or(dest);
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// `base` joined with `rel`; just `rel` when `base` is empty.
pub(crate) fn join_url(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        rel.to_string()
    } else {
        format!("{}/{}", base, rel)
    }
}

/// Site-absolute form of `join_url(base, rel)`.
pub(crate) fn asset_url(base: &str, rel: &str) -> String {
    let joined = join_url(base, rel);
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{}", joined)
    }
}
