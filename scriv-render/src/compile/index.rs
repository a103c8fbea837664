//! Index compiler: every published post, cut at its continue-reading point,
//! newest first on `<output>/index.html`.

use super::{report_diagnostics, run_per_file, validate_slugs, CompileError, CompileReport, RenderedPost};
use crate::templates::{IndexEntry, IndexTemplate, SiteInfo};
use askama::Template;
use scriv_core::{discover_posts, Config, Engine};
use scriv_types::FeatureSet;
use std::cmp::Reverse;
use std::sync::Arc;

pub async fn compile_index(config: &Config) -> Result<CompileReport, CompileError> {
    let root = config.posts_dir();
    let paths = discover_posts(&root, None)?;
    tracing::info!(root = %root.display(), posts = paths.len(), "compiling index");

    let engine = Arc::new(Engine::index(config.render_options()));
    let rendered = run_per_file(paths, config.concurrency(), move |path| super::render_post(&engine, path)).await?;

    let mut report = CompileReport {
        posts: rendered.len(),
        ..CompileReport::default()
    };
    for post in &rendered {
        report.diagnostics.extend(post.diagnostics.iter().cloned());
    }
    let mut published: Vec<RenderedPost> = validate_slugs(rendered, &mut report.diagnostics)
        .into_iter()
        .filter(|post| post.meta.is_published())
        .collect();
    sort_newest_first(&mut published);

    let mut features = FeatureSet::new();
    for post in &published {
        features.union_with(&post.features);
    }
    let entries = published
        .into_iter()
        .map(|post| IndexEntry {
            slug: post.meta.slug,
            html: post.html,
        })
        .collect::<Vec<_>>();
    let count = entries.len();
    let page = IndexTemplate::new(SiteInfo::from(&config.site), entries, &features).render()?;

    let output = config.output_dir();
    tokio::fs::create_dir_all(&output)
        .await
        .map_err(CompileError::file(&output))?;
    let target = output.join("index.html");
    tokio::fs::write(&target, page)
        .await
        .map_err(CompileError::file(&target))?;
    report.pages.push(target);

    report_diagnostics(&report.diagnostics);
    tracing::info!(entries = count, "index page written");
    Ok(report)
}

/// Date descending; undated posts last; ties by slug.
fn sort_newest_first(posts: &mut [RenderedPost]) {
    posts.sort_by(|a, b| {
        Reverse(a.meta.date)
            .cmp(&Reverse(b.meta.date))
            .then_with(|| a.meta.slug.cmp(&b.meta.slug))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn post(dir: &Path, name: &str, front: &str, body: &str) {
        let path = dir.join("posts").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("+++\n{}\n+++\n{}", front, body)).unwrap();
    }

    #[tokio::test]
    async fn test_published_posts_newest_first() {
        let dir = TempDir::new().unwrap();
        post(
            dir.path(),
            "old.md",
            "slug = \"old\"\ndate = 2019-01-01\nvisibility = \"published\"",
            "# Old\n\nold one\n\nold two\n",
        );
        post(
            dir.path(),
            "new.md",
            "slug = \"new\"\ndate = 2021-06-01\nvisibility = \"published\"",
            "# New\n\nnew one\n\nCONTINUE_READING\n\nnew secret\n",
        );
        post(
            dir.path(),
            "same-day.md",
            "slug = \"aaa\"\ndate = 2021-06-01\nvisibility = \"published\"",
            "# Same\n\nsame $x$\n",
        );
        post(dir.path(), "draft.md", "slug = \"draft\"\ndate = 2022-01-01", "# Draft\n\nhidden\n");

        let report = compile_index(&Config::for_directory(dir.path(), "Blog")).await.unwrap();
        assert_eq!(report.posts, 4);
        assert_eq!(report.pages, vec![dir.path().join("dist/index.html")]);

        let page = fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
        let order: Vec<usize> = ["data-slug=\"aaa\"", "data-slug=\"new\"", "data-slug=\"old\""]
            .iter()
            .map(|needle| page.find(needle).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(!page.contains("hidden"));
        assert!(!page.contains("new secret"));
        assert!(!page.contains("old two"));
        assert!(page.contains(r#"<a class="continue-reading" href="/new">"#));
        assert!(page.contains("katex.min.js"));
    }

    #[test]
    fn test_undated_posts_sort_last() {
        let mk = |slug: &str, date: Option<&str>| RenderedPost {
            source: slug.into(),
            meta: scriv_core::PostMeta {
                slug: slug.into(),
                date: date.map(|d| d.parse().unwrap()),
                ..Default::default()
            },
            html: String::new(),
            features: FeatureSet::new(),
            assets: Vec::new(),
            diagnostics: Vec::new(),
        };
        let mut posts = vec![mk("b", None), mk("a", None), mk("c", Some("2020-01-01"))];
        sort_newest_first(&mut posts);
        let slugs: Vec<_> = posts.iter().map(|p| p.meta.slug.as_str()).collect();
        assert_eq!(slugs, vec!["c", "a", "b"]);
    }
}
