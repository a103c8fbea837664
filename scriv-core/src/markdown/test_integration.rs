//! Integration tests for the blog engine presets

use super::*;
use crate::testing::{assert_html_eq, element_names};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use tempfile::TempDir;

const BIB: &str = r#"@article{bib_foo,
  author = {Doe, Jane and Roe, Richard},
  title = {On Foo},
  journal = {Journal of Foo},
  volume = {12},
  year = {2019},
}

@book{bib_bar,
  author = {Smith, Alan},
  title = {Bar Book},
  year = {2001},
}
"#;

static CITE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"<cite>\[(\d+|\?)\]</cite>").unwrap());
static FOOTNOTE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:footnote-ref-[\w-]+"><a href="[^"]*">|<cite>)\[(\d+)\]"#).unwrap());

/// A post directory holding `refs.bib`, with a context for `post.md` inside it.
fn post_dir() -> (TempDir, ParseContext) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("refs.bib"), BIB).unwrap();
    let ctx = ParseContext::for_file(dir.path().join("post.md"));
    (dir, ctx)
}

fn detail(source: &str, ctx: &mut ParseContext) -> String {
    Engine::detail(RenderOptions::default())
        .convert(source, ctx)
        .unwrap()
}

fn labels(re: &Regex, html: &str) -> Vec<String> {
    re.captures_iter(html).map(|c| c[1].to_string()).collect()
}

#[test]
fn test_front_matter_and_title() {
    let source = "+++\nslug = \"a_slug\"\ndate = 2019-09-20\n+++\n# Hello\n";

    let mut ctx = ParseContext::new();
    let plain = Engine::builder()
        .extension(ext::FrontMatter)
        .extension(ext::Title)
        .build()
        .convert(source, &mut ctx)
        .unwrap();
    assert_eq!(plain, "<h1>Hello</h1>\n");
    assert_eq!(ctx.title.as_ref().map(|t| t.text.as_str()), Some("Hello"));

    let mut ctx = ParseContext::new();
    let html = detail(source, &mut ctx);
    assert_html_eq(
        &html,
        r#"<article><header><time datetime="2019-09-20">September 20, 2019</time><h1 class="title"><a href="/a_slug" title="Hello">Hello</a></h1></header></article>"#,
    );
    assert_eq!(ctx.meta.slug, "a_slug");
    assert!(ctx.errors().is_empty());
}

#[test]
fn test_citation_numbering() {
    let (_dir, mut ctx) = post_dir();
    let source = "+++\nslug = \"cites\"\nbib_paths = [\"refs.bib\"]\n+++\n# Cites\n\n\
                  alpha [@bib_foo] bravo [@bib_bar] charlie [@bib_foo]\n";
    let html = detail(source, &mut ctx);
    println!("{}", html);

    assert!(ctx.errors().is_empty(), "{:?}", ctx.errors());
    assert_eq!(labels(&CITE_LABEL, &html), vec!["1", "2", "1"]);

    let foo = html
        .find(r#"<span class="cite-number">[1]</span> J. Doe and R. Roe, "On Foo,""#)
        .expect("bib_foo reference");
    let bar = html
        .find(r#"<span class="cite-number">[2]</span> A. Smith, "Bar Book,", 2001."#)
        .expect("bib_bar reference");
    assert!(foo < bar);
    assert!(html.contains(r#"id="cite-bib_foo""#));
    assert!(html.contains(r##"<a href="#cite-bib_bar" data-link-type="citation"><cite>[2]</cite></a>"##));
    assert!(html.trim_end().ends_with("</div>\n</article>"));
}

#[test]
fn test_missing_bibliography_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ParseContext::for_file(dir.path().join("post.md"));
    let source = "+++\nslug = \"x\"\nbib_paths = [\"nope.bib\"]\n+++\n# X\n\n[@bib_foo]\n";
    let html = detail(source, &mut ctx);

    let codes: Vec<_> = ctx.errors().iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["bibliography.read_failed", "citation.missing_key"]);
    assert!(html.contains("<cite>[1]</cite>"));
}

#[test]
fn test_heading_id_collisions() {
    let mut ctx = ParseContext::new();
    let html = detail("# Post\n\n# h1 dupe\n\n# h1 dupe\n\n# h1 dupe\n", &mut ctx);
    assert!(html.contains(r#"<h1 id="h1-dupe">h1 dupe</h1>"#));
    assert!(html.contains(r#"<h1 id="h1-dupe-1">h1 dupe</h1>"#));
    assert!(html.contains(r#"<h1 id="h1-dupe-2">h1 dupe</h1>"#));
}

#[test]
fn test_title_heading_does_not_reserve_its_id() {
    let mut ctx = ParseContext::new();
    let html = detail("+++\nslug=\"s\"\ndate=2019-09-20\n+++\n# Hello\n\n## Hello\n", &mut ctx);
    assert!(html.contains(r#"<h2 id="Hello">Hello</h2>"#), "{}", html);
    assert!(!html.contains("Hello-1"));

    let mut ctx = ParseContext::new();
    let html = detail("# a\r\n\r\n## a", &mut ctx);
    assert!(html.contains(r#"<h2 id="a">a</h2>"#), "{}", html);
}

#[test]
fn test_figure_caption_and_asset() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ParseContext::for_file(dir.path().join("post.md"));
    let html = detail("![alt](./x.png \"t\")\n\nCAPTION: hi\n", &mut ctx);
    assert_html_eq(
        &html,
        r#"<figure><picture><img src="x.png" title="t" alt="alt" loading="lazy"></picture><figcaption>hi</figcaption></figure>"#,
    );
    assert_eq!(ctx.assets().len(), 1);
    assert_eq!(ctx.assets()[0].url, "/x.png");
    assert_eq!(ctx.assets()[0].source, dir.path().join("x.png"));
}

#[test]
fn test_index_cuts_at_marker() {
    let source = "+++\nslug = \"cut\"\n+++\n# T\n\none\n\nCONTINUE_READING\n\ntwo\n\nthree\n";

    let mut ctx = ParseContext::new();
    let index = Engine::index(RenderOptions::default()).convert(source, &mut ctx).unwrap();
    assert!(index.contains("<p>one</p>"));
    assert!(!index.contains("two"));
    assert!(index.ends_with("Continue reading</a>\n</article>\n"));
    assert!(index.contains(r#"<a class="continue-reading" href="/cut">"#));

    let mut ctx = ParseContext::new();
    let full = detail(source, &mut ctx);
    assert!(full.contains("<p>two</p>"));
    assert!(!full.contains("CONTINUE_READING"));
    assert!(!full.contains("continue-reading"));
}

#[test]
fn test_small_caps_boundaries() {
    let mut ctx = ParseContext::new();
    assert_eq!(
        detail("The (MOTD)\n", &mut ctx),
        "<p>The <span class=\"small-caps\">(MOTD)</span></p>\n"
    );
    assert_eq!(detail("FOO_BAR\n", &mut ctx), "<p>FOO_BAR</p>\n");
}

#[test]
fn test_footnotes_and_citations_share_numbers() {
    let (_dir, mut ctx) = post_dir();
    let source = "+++\nbib_paths = [\"refs.bib\"]\n+++\n# Notes\n\n\
                  a[^first] b [@bib_bar] c[^second] d [@bib_foo] e [@bib_bar]\n\n\
                  ::: footnote first\none\n:::\n\n::: footnote second\ntwo\n:::\n";
    let html = detail(source, &mut ctx);
    println!("{}", html);

    assert!(ctx.errors().is_empty(), "{:?}", ctx.errors());
    assert_eq!(labels(&FOOTNOTE_LABEL, &html), vec!["1", "2", "3", "4", "2"]);
    assert!(html.contains(r#"<aside class="footnote" id="footnote-second"><span class="footnote-number">3</span>"#));
}

#[test]
fn test_footnote_shaped_definition_is_not_a_link() {
    let mut ctx = ParseContext::new();
    let html = detail("[^1]\n\n[^1]: a\n", &mut ctx);
    assert!(!html.contains(r#"href="/a""#), "{}", html);
    assert!(html.contains(r##"<sup class="footnote-ref" id="footnote-ref-1"><a href="#footnote-1">[1]</a></sup>"##));
}

#[test]
fn test_malformed_citations_stay_text() {
    let mut ctx = ParseContext::new();
    let html = detail("[foo and [@] and [@ x]\n", &mut ctx);
    assert_eq!(html, "<p>[foo and [@] and [@ x]</p>\n");
    assert!(ctx.errors().is_empty());
}

#[test]
fn test_math_and_typography() {
    let mut ctx = ParseContext::new();
    let html = detail("Wait... $a--b$ and `c--d` -- done\n", &mut ctx);
    insta::assert_snapshot!(
        html,
        @r#"<p>Wait… <span class="math math-inline">a--b</span> and <code>c--d</code> – done</p>"#
    );
    assert!(ctx.features.contains(scriv_types::Feature::Katex));
}

#[test]
fn test_toc_in_article() {
    let mut ctx = ParseContext::new();
    let html = detail("# Post\n\n:toc:\n\n## Intro\n\n### Detail\n\n#### Deep\n", &mut ctx);
    assert!(html.contains(
        r##"<div class="toc"><ol><li><a href="#Intro">Intro</a><ol><li><a href="#Detail">Detail</a></li></ol></li></ol></div>"##
    ));
}

#[test]
fn test_conversion_is_deterministic() {
    let (_dir, mut first) = post_dir();
    let (_dir2, mut second) = post_dir();
    let source = "+++\nbib_paths = [\"refs.bib\"]\n+++\n# A\n\n## B\n\n## B\n\n[@bib_foo] and NASA...\n";
    let a = detail(source, &mut first);
    let b = detail(source, &mut second);
    assert_eq!(a, b);
}

#[test]
fn test_rendered_structure_round_trips() {
    let mut ctx = ParseContext::new();
    let source = "intro text\n\n## One\n\nfirst *para*\n\n## Two\n\n- item\n\nlast para\n";
    let html = detail(source, &mut ctx);
    let blocks: Vec<String> = element_names(&html)
        .into_iter()
        .filter(|tag| matches!(tag.as_str(), "h1" | "h2" | "p" | "ul" | "li"))
        .collect();
    // The first heading becomes the article title.
    assert_eq!(blocks, vec!["p", "h1", "p", "h2", "ul", "li", "p"]);
    assert!(html.contains("<p>first <em>para</em></p>"));
}
