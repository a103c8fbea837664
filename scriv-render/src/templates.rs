//! Askama template definitions.

use askama::Template;
use scriv_core::config::SiteConfig;
use scriv_types::{Feature, FeatureSet};

/// Site-wide values shared by every page.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub title: String,
    pub author: String,
    pub description: String,
}

impl From<&SiteConfig> for SiteInfo {
    fn from(site: &SiteConfig) -> Self {
        Self {
            title: site.title.clone(),
            author: site.author.clone(),
            description: site.description.clone(),
        }
    }
}

/// One post on the index page.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub slug: String,
    /// The rendered (cut) post.
    pub html: String,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub site: SiteInfo,
    pub title: String,
    pub content: String,
    pub katex: bool,
    pub link_preview: bool,
}

impl PostTemplate {
    pub fn new(site: SiteInfo, title: String, content: String, features: &FeatureSet) -> Self {
        Self {
            site,
            title,
            content,
            katex: features.contains(Feature::Katex),
            link_preview: features.contains(Feature::LinkPreview),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub site: SiteInfo,
    pub entries: Vec<IndexEntry>,
    pub katex: bool,
    pub link_preview: bool,
}

impl IndexTemplate {
    pub fn new(site: SiteInfo, entries: Vec<IndexEntry>, features: &FeatureSet) -> Self {
        Self {
            site,
            entries,
            katex: features.contains(Feature::Katex),
            link_preview: features.contains(Feature::LinkPreview),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteInfo {
        SiteInfo {
            title: "Blog".into(),
            author: "A & B".into(),
            description: String::new(),
        }
    }

    #[test]
    fn test_post_page_embeds_content_unescaped() {
        let page = PostTemplate::new(
            site(),
            "Hello <World>".into(),
            "<article>\n<p>x</p>\n</article>\n".into(),
            &FeatureSet::new(),
        )
        .render()
        .unwrap();
        assert!(page.contains("<title>Hello &lt;World&gt; | Blog</title>"));
        assert!(page.contains("<article>\n<p>x</p>\n</article>"));
        assert!(page.contains(r#"<meta name="author" content="A &amp; B">"#));
        assert!(!page.contains("katex"));
        assert!(!page.contains("data-preview-html"));
    }

    #[test]
    fn test_features_toggle_scripts() {
        let features: FeatureSet = [Feature::Katex, Feature::LinkPreview].into_iter().collect();
        let page = PostTemplate::new(site(), "T".into(), String::new(), &features)
            .render()
            .unwrap();
        assert!(page.contains("katex.min.js"));
        assert!(page.contains("a[data-preview-html]"));
    }

    #[test]
    fn test_index_lists_entries_in_order() {
        let entries = vec![
            IndexEntry {
                slug: "b".into(),
                html: "<p>second</p>".into(),
            },
            IndexEntry {
                slug: "a".into(),
                html: "<p>first</p>".into(),
            },
        ];
        let page = IndexTemplate::new(site(), entries, &FeatureSet::new())
            .render()
            .unwrap();
        let second = page.find("<p>second</p>").unwrap();
        let first = page.find("<p>first</p>").unwrap();
        assert!(second < first);
        assert!(page.contains(r#"data-slug="b""#));
        assert!(page.contains("<title>Blog</title>"));
    }
}
