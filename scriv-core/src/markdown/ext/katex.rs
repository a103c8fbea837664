//! `$$` display-math blocks and the `katex` page feature.
//!
//! Math is not typeset here; it is emitted escaped inside `math` elements
//! and the page template pulls in KaTeX when the feature is set.

use super::priority;
use crate::markdown::ast::{Ast, NodeId, NodeKind};
use crate::markdown::block::{BlockLines, BlockParser, BlockState, Continuation, Line};
use crate::markdown::context::ParseContext;
use crate::markdown::{EngineBuilder, Extension, Transformer};
use crate::models::Diagnostic;
use scriv_types::Feature;

const DELIMITER: &str = "$$";

pub struct Katex;

impl Extension for Katex {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .block_parser(priority::KATEX_BLOCK, MathBlockParser)
            .transformer(priority::KATEX_FEATURE, KatexFeatureTransformer);
    }
}

struct MathBlockParser;

impl BlockParser for MathBlockParser {
    fn name(&self) -> &'static str {
        "katex-block"
    }

    fn trigger(&self) -> &'static [u8] {
        b"$"
    }

    fn open(&self, line: &Line<'_>, _ctx: &mut ParseContext) -> Option<(NodeKind, BlockState)> {
        let content = line.content();
        let rest = content.strip_prefix(DELIMITER)?;
        if let Some(inner) = rest.strip_suffix(DELIMITER) {
            // `$$ x $$` on one line.
            let tex = inner.trim().to_string();
            return Some((NodeKind::DisplayMath { tex }, BlockState::NoChildren));
        }
        Some((
            NodeKind::DisplayMath { tex: String::new() },
            BlockState::Continue,
        ))
    }

    fn continue_line(&self, line: &Line<'_>, _nesting: &mut usize) -> Continuation {
        if line.text.trim_end().ends_with(DELIMITER) {
            Continuation::Close
        } else {
            Continuation::Continue
        }
    }

    fn close(&self, ast: &mut Ast, node: NodeId, block: &BlockLines<'_, '_>, ctx: &mut ParseContext) {
        if !block.has_closer {
            ctx.add_error(Diagnostic::warning(
                "katex.unclosed",
                format!(
                    "Math block opened on line {} is never closed",
                    block.opener().number
                ),
            ));
        }
        if block.lines.len() < 2 {
            return;
        }
        let mut parts = Vec::new();
        let opener = block.opener().content().trim_start_matches(DELIMITER).trim();
        if !opener.is_empty() {
            parts.push(opener);
        }
        for line in block.body() {
            parts.push(line.text);
        }
        if block.has_closer {
            if let Some(last) = block.lines.last() {
                let closer = last.text.trim_end();
                let closer = closer.strip_suffix(DELIMITER).unwrap_or(closer).trim();
                if !closer.is_empty() {
                    parts.push(closer);
                }
            }
        }
        if let NodeKind::DisplayMath { tex } = ast.kind_mut(node) {
            *tex = parts.join("\n");
        }
    }

    fn can_interrupt_paragraph(&self) -> bool {
        true
    }
}

struct KatexFeatureTransformer;

impl Transformer for KatexFeatureTransformer {
    fn name(&self) -> &'static str {
        "katex-feature"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, ctx: &mut ParseContext) {
        let has_math = ast
            .find(ast.root(), |k| {
                matches!(k, NodeKind::InlineMath { .. } | NodeKind::DisplayMath { .. })
            })
            .is_some();
        if has_math {
            ctx.add_feature(Feature::Katex);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::Engine;

    fn engine() -> Engine {
        Engine::builder().extension(Katex).build()
    }

    #[test]
    fn test_multiline_block() {
        let mut ctx = ParseContext::new();
        let html = engine()
            .convert("text\n$$\na < b\n\\\\ c\n$$\nafter\n", &mut ctx)
            .unwrap();
        assert_eq!(
            html,
            "<p>text</p>\n<div class=\"math math-display\">a &lt; b\n\\\\ c</div>\n<p>after</p>\n"
        );
        assert!(ctx.features.contains(Feature::Katex));
    }

    #[test]
    fn test_single_line_block() {
        let mut ctx = ParseContext::new();
        let ast = engine().parse("$$ e = mc^2 $$\n", &mut ctx);
        assert_eq!(
            ast.kind(ast.first_child(ast.root()).unwrap()),
            &NodeKind::DisplayMath {
                tex: "e = mc^2".into()
            }
        );
    }

    #[test]
    fn test_unclosed_block_runs_to_end_and_warns() {
        let mut ctx = ParseContext::new();
        let html = engine().convert("para\n\n$$\nx\n", &mut ctx).unwrap();
        assert_eq!(html, "<p>para</p>\n<div class=\"math math-display\">x</div>\n");
        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.errors()[0].code, "katex.unclosed");
        assert!(ctx.errors()[0].message.contains("line 3"));
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_closed_blocks_do_not_warn() {
        let mut ctx = ParseContext::new();
        engine().convert("$$ a $$

$$
b
$$
", &mut ctx).unwrap();
        assert!(ctx.errors().is_empty());
    }

    #[test]
    fn test_inline_math_sets_feature() {
        let mut ctx = ParseContext::new();
        let html = engine().convert("Euler: $e^{i\\pi}$\n", &mut ctx).unwrap();
        assert_eq!(
            html,
            "<p>Euler: <span class=\"math math-inline\">e^{i\\pi}</span></p>\n"
        );
        assert!(ctx.features.contains(Feature::Katex));
    }

    #[test]
    fn test_no_math_no_feature() {
        let mut ctx = ParseContext::new();
        engine().convert("It costs $5.\n", &mut ctx).unwrap();
        assert!(ctx.features.is_empty());
    }

    #[test]
    fn test_dollars_inside_code_fence_are_code() {
        let mut ctx = ParseContext::new();
        let html = engine().convert("```\n$$\n```\n", &mut ctx).unwrap();
        assert_eq!(html, "<pre><code>$$\n</code></pre>\n");
        assert!(ctx.features.is_empty());
    }
}
