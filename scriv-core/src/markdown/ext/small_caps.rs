//! Small caps for acronyms: `The (MOTD) of NASA` renders both as small caps.

use super::priority;
use crate::markdown::ast::{Ast, Kind, NodeId, NodeKind, WalkStatus};
use crate::markdown::inline::{InlineMatch, InlineParser};
use crate::markdown::render::{HtmlWriter, RenderResult};
use crate::markdown::{EngineBuilder, Extension};

/// Shortest run of capitals that is set in small caps.
pub const MIN_RUN: usize = 3;

pub struct SmallCaps;

impl Extension for SmallCaps {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .inline_parser(priority::SMALL_CAPS, SmallCapsParser)
            .renderer(Kind::SmallCaps, render_small_caps);
    }
}

struct SmallCapsParser;

/// Characters after which a run may start.
fn is_boundary(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '(' | '[' | '{' | '"' | '\'' | '*' | '~' | '-' | '/' | '“' | '‘' | '—' | '–'
        )
}

fn starts_at_boundary(text: &str, pos: usize) -> bool {
    text[..pos].chars().next_back().map_or(true, is_boundary)
}

fn ends_at_boundary(text: &str, end: usize) -> bool {
    text[end..]
        .chars()
        .next()
        .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
}

/// Byte length of the run of ASCII capitals starting at `from`.
fn capitals(text: &str, from: usize) -> usize {
    text.as_bytes()[from..]
        .iter()
        .take_while(|b| b.is_ascii_uppercase())
        .count()
}

impl InlineParser for SmallCapsParser {
    fn name(&self) -> &'static str {
        "small-caps"
    }

    fn trigger(&self) -> &'static [u8] {
        b"(ABCDEFGHIJKLMNOPQRSTUVWXYZ"
    }

    fn parse(&self, text: &str, pos: usize) -> Option<InlineMatch> {
        if !starts_at_boundary(text, pos) {
            return None;
        }
        let parenthesized = text.as_bytes()[pos] == b'(';
        let run_start = if parenthesized { pos + 1 } else { pos };
        let run = capitals(text, run_start);
        if run < MIN_RUN {
            return None;
        }
        let mut end = run_start + run;
        if parenthesized {
            if text.as_bytes().get(end) != Some(&b')') {
                return None;
            }
            end += 1;
        }
        if !ends_at_boundary(text, end) {
            return None;
        }
        Some(InlineMatch {
            start: pos,
            end,
            kind: NodeKind::SmallCaps,
            text: Some(text[pos..end].to_string()),
        })
    }
}

fn render_small_caps(w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, entering: bool) -> RenderResult {
    w.write_str(if entering { "<span class=\"small-caps\">" } else { "</span>" })?;
    Ok(WalkStatus::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::context::ParseContext;
    use crate::markdown::Engine;

    fn convert(source: &str) -> String {
        let engine = Engine::builder().extension(SmallCaps).build();
        engine.convert(source, &mut ParseContext::new()).unwrap()
    }

    fn matched(text: &str, pos: usize) -> Option<(usize, usize)> {
        SmallCapsParser.parse(text, pos).map(|m| (m.start, m.end))
    }

    #[test]
    fn test_parenthesized_run() {
        assert_eq!(
            convert("The (MOTD)\n"),
            "<p>The <span class=\"small-caps\">(MOTD)</span></p>\n"
        );
    }

    #[test]
    fn test_underscore_disables_run() {
        assert_eq!(convert("FOO_BAR\n"), "<p>FOO_BAR</p>\n");
    }

    #[test]
    fn test_bare_runs() {
        assert_eq!(
            convert("NASA and the ESA's IBM-PC.\n"),
            "<p><span class=\"small-caps\">NASA</span> and the <span class=\"small-caps\">ESA</span>&#39;s \
             <span class=\"small-caps\">IBM</span>-PC.</p>\n"
        );
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(matched("ABC", 0), Some((0, 3)));
        assert_eq!(matched("AB", 0), None);
        assert_eq!(matched("xABC", 1), None);
        assert_eq!(matched("ABCd", 0), None);
        assert_eq!(matched("ABC1", 0), None);
        assert_eq!(matched("“ABC”", "“".len()), Some((3, 6)));
        assert_eq!(matched("(ABC", 0), None);
        assert_eq!(matched("(ABC)x", 0), None);
    }

    #[test]
    fn test_code_is_untouched() {
        assert_eq!(convert("`ABC`\n"), "<p><code>ABC</code></p>\n");
    }

    #[test]
    fn test_rendering_twice_is_stable() {
        let engine = Engine::builder().extension(SmallCaps).build();
        let mut ctx = ParseContext::new();
        let source = "The (MOTD) of NASA\n";
        let mut ast = engine.parse(source, &mut ctx);
        let before = ast.node_count();
        let root = ast.root();
        crate::markdown::inline::parse_inlines(&mut ast, root, engine.inline_parsers());
        assert_eq!(ast.node_count(), before);
    }
}
