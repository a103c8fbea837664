//! Unique `id` attributes for headings.

use super::priority;
use crate::markdown::ast::Ast;
use crate::markdown::context::ParseContext;
use crate::markdown::{EngineBuilder, Extension, Transformer};
use crate::models::Diagnostic;
use crate::slug::{disambiguate, slugify};

/// Used when a heading has no ASCII letters or digits at all.
const FALLBACK_ID: &str = "section";

pub struct HeadingIds;

impl Extension for HeadingIds {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder.transformer(priority::HEADING_ID, HeadingIdTransformer);
    }
}

struct HeadingIdTransformer;

impl Transformer for HeadingIdTransformer {
    fn name(&self) -> &'static str {
        "heading-id"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, ctx: &mut ParseContext) {
        let mut headings = Vec::new();
        ast.walk_headings(|id| headings.push(id));
        let title = ctx.title.as_ref().map(|title| title.node);

        for heading in headings {
            if Some(heading) == title {
                ast.attrs_mut(heading).remove("id");
                continue;
            }
            let explicit = ast
                .attrs(heading)
                .get_str("id")
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            let base = match explicit {
                Some(id) => id,
                None => {
                    let slug = slugify(&ast.text_content(heading));
                    if slug.is_empty() {
                        FALLBACK_ID.to_string()
                    } else {
                        slug
                    }
                }
            };

            match disambiguate(&base, |candidate| ctx.heading_ids.contains(candidate)) {
                Some(id) => {
                    ctx.heading_ids.insert(id.clone());
                    ast.attrs_mut(heading).set("id", id);
                }
                None => {
                    ast.attrs_mut(heading).remove("id");
                    ctx.add_error(Diagnostic::error(
                        "heading_id.exhausted",
                        format!("Too many headings share the id '{}'", base),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::Engine;

    fn convert(source: &str) -> (String, ParseContext) {
        let engine = Engine::builder().extension(HeadingIds).build();
        let mut ctx = ParseContext::new();
        let html = engine.convert(source, &mut ctx).unwrap();
        (html, ctx)
    }

    #[test]
    fn test_collisions_get_suffixes() {
        let (html, ctx) = convert("# h1 dupe\n\n# h1 dupe\n\n# h1 dupe\n");
        assert_eq!(
            html,
            "<h1 id=\"h1-dupe\">h1 dupe</h1>\n<h1 id=\"h1-dupe-1\">h1 dupe</h1>\n<h1 id=\"h1-dupe-2\">h1 dupe</h1>\n"
        );
        assert_eq!(ctx.heading_ids.len(), 3);
    }

    #[test]
    fn test_inline_markup_is_flattened() {
        let (html, _) = convert("## The *Rust* `Book`\n");
        assert_eq!(
            html,
            "<h2 id=\"The-Rust-Book\">The <em>Rust</em> <code>Book</code></h2>\n"
        );
    }

    #[test]
    fn test_explicit_id_is_registered() {
        let (html, _) = convert("# A {#intro}\n\n# Intro\n\n# B {#intro}\n");
        assert!(html.contains("<h1 id=\"intro\">A</h1>"));
        assert!(html.contains("<h1 id=\"Intro\">Intro</h1>"));
        assert!(html.contains("<h1 id=\"intro-1\">B</h1>"));
    }

    #[test]
    fn test_symbol_only_heading_gets_fallback() {
        let (html, _) = convert("# !!!\n");
        assert_eq!(html, "<h1 id=\"section\">!!!</h1>\n");
    }

    #[test]
    fn test_ten_collisions_fail_the_document() {
        let source = "# x\n\n".repeat(11);
        let (html, ctx) = convert(&source);
        assert!(html.contains("id=\"x-9\""));
        assert!(ctx.has_errors());
        assert_eq!(ctx.errors()[0].code, "heading_id.exhausted");
    }

    #[test]
    fn test_ids_are_unique_and_well_formed() {
        let (_, ctx) = convert("# A b\n\n## A-b\n\n### a b\n\n#### Ünïcödé\n\n# A b\n");
        for id in &ctx.heading_ids {
            assert!(!id.is_empty());
            assert!(id.len() <= 38);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
            assert!(!id.starts_with('-') && !id.ends_with('-'));
        }
        assert_eq!(ctx.heading_ids.len(), 5);
    }
}
