//! Typographic substitutions: `---` em dash, `--` en dash, `...` ellipsis.

use super::priority;
use crate::markdown::ast::{Literal, NodeKind};
use crate::markdown::inline::{InlineMatch, InlineParser};
use crate::markdown::{EngineBuilder, Extension};

/// Longest pattern first.
const SUBSTITUTIONS: &[(&str, &str)] = &[("---", "\u{2014}"), ("--", "\u{2013}"), ("...", "\u{2026}")];

pub struct Typography;

impl Extension for Typography {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder.inline_parser(priority::TYPOGRAPHY, TypographyParser);
    }
}

struct TypographyParser;

impl InlineParser for TypographyParser {
    fn name(&self) -> &'static str {
        "typography"
    }

    fn trigger(&self) -> &'static [u8] {
        b"-."
    }

    fn parse(&self, text: &str, pos: usize) -> Option<InlineMatch> {
        let rest = &text[pos..];
        let (pattern, replacement) = SUBSTITUTIONS.iter().find(|(p, _)| rest.starts_with(p))?;
        Some(InlineMatch {
            start: pos,
            end: pos + pattern.len(),
            kind: NodeKind::String(Literal {
                value: replacement.to_string(),
                ..Literal::default()
            }),
            text: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::context::ParseContext;
    use crate::markdown::Engine;

    fn convert(source: &str) -> String {
        let engine = Engine::builder().extension(Typography).build();
        engine.convert(source, &mut ParseContext::new()).unwrap()
    }

    #[test]
    fn test_substitutions() {
        assert_eq!(
            convert("a---b, 1--2, wait...\n"),
            "<p>a\u{2014}b, 1\u{2013}2, wait\u{2026}</p>\n"
        );
    }

    #[test]
    fn test_runs_are_greedy() {
        assert_eq!(convert("a----b .... c\n"), "<p>a\u{2014}-b \u{2026}. c</p>\n");
    }

    #[test]
    fn test_single_characters_and_code_are_kept() {
        assert_eq!(
            convert("x-y. `a--b...`\n"),
            "<p>x-y. <code>a--b...</code></p>\n"
        );
    }
}
