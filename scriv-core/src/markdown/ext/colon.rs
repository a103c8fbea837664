//! Colon-fenced directives.
//!
//! ```text
//! ::: preview https://example.com
//! Body shown when hovering links to example.com.
//! :::
//!
//! :toc: 2
//! ```
//!
//! Blocks nest: an inner `::: name` line opens a block that consumes the
//! next bare `:::`. Only `preview` and `footnote` blocks are rendered;
//! every other directive renders as nothing.

use super::priority;
use crate::markdown::ast::{Ast, Kind, NodeId, NodeKind, WalkStatus};
use crate::markdown::block::{BlockLines, BlockParser, BlockState, Continuation, Line};
use crate::markdown::context::ParseContext;
use crate::markdown::render::{escape_html, HtmlWriter, RenderResult};
use crate::markdown::{EngineBuilder, Extension};
use crate::models::Diagnostic;
use once_cell::sync::Lazy;
use regex::Regex;
use scriv_types::Feature;

const FENCE: &str = ":::";

static COLON_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:([A-Za-z][A-Za-z0-9_-]*):(?:\s+(.*))?$").unwrap());

pub struct ColonBlocks;

impl Extension for ColonBlocks {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .block_parser(priority::COLON_BLOCK, ColonBlockParser)
            .block_parser(priority::COLON_LINE, ColonLineParser)
            .renderer(Kind::ColonBlock, render_colon_block)
            .renderer(Kind::ColonLine, render_colon_line);
    }
}

/// `(name, args)` of a `::: name args` opening line.
fn parse_opener(text: &str) -> Option<(String, String)> {
    let rest = text.trim().strip_prefix(FENCE)?;
    let rest = rest.trim_start_matches(':').trim();
    if rest.is_empty() {
        return None;
    }
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    Some((name.to_string(), args.to_string()))
}

fn is_closer(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.len() >= FENCE.len() && trimmed.bytes().all(|b| b == b':')
}

struct ColonBlockParser;

impl BlockParser for ColonBlockParser {
    fn name(&self) -> &'static str {
        "colon-block"
    }

    fn trigger(&self) -> &'static [u8] {
        b":"
    }

    fn open(&self, line: &Line<'_>, _ctx: &mut ParseContext) -> Option<(NodeKind, BlockState)> {
        let (name, args) = parse_opener(line.text)?;
        Some((NodeKind::ColonBlock { name, args }, BlockState::HasChildren))
    }

    fn continue_line(&self, line: &Line<'_>, nesting: &mut usize) -> Continuation {
        if is_closer(line.text) {
            if *nesting == 0 {
                return Continuation::Close;
            }
            *nesting -= 1;
        } else if parse_opener(line.text).is_some() {
            *nesting += 1;
        }
        Continuation::Continue
    }

    fn close(&self, _ast: &mut Ast, node: NodeId, block: &BlockLines<'_, '_>, ctx: &mut ParseContext) {
        if !block.has_closer {
            ctx.add_error(Diagnostic::warning(
                "colon_block.unclosed",
                format!(
                    "Colon block opened on line {} is never closed",
                    block.opener().number
                ),
            ));
        }
        if let Some((name, args)) = parse_opener(block.opener().text) {
            if name == "preview" && !args.is_empty() {
                ctx.previews.insert(args, node);
                ctx.add_feature(Feature::LinkPreview);
            }
        }
    }

    fn can_interrupt_paragraph(&self) -> bool {
        true
    }
}

struct ColonLineParser;

impl BlockParser for ColonLineParser {
    fn name(&self) -> &'static str {
        "colon-line"
    }

    fn trigger(&self) -> &'static [u8] {
        b":"
    }

    fn open(&self, line: &Line<'_>, _ctx: &mut ParseContext) -> Option<(NodeKind, BlockState)> {
        let caps = COLON_LINE.captures(line.text.trim())?;
        let name = caps.get(1)?.as_str().to_string();
        let args = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        Some((NodeKind::ColonLine { name, args }, BlockState::NoChildren))
    }

    fn can_interrupt_paragraph(&self) -> bool {
        true
    }
}

fn render_colon_block(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let NodeKind::ColonBlock { name, args } = ast.kind(id) else {
        return Ok(WalkStatus::Continue);
    };
    if name != "footnote" {
        // Preview bodies render inside the links that point at them.
        return Ok(WalkStatus::SkipChildren);
    }
    if entering {
        w.write_str(&format!(
            "<aside class=\"footnote\" id=\"footnote-{}\">",
            escape_html(args)
        ))?;
        if let Some(number) = ast.attrs(id).get("footnote-number") {
            w.write_str(&format!("<span class=\"footnote-number\">{}</span>", number))?;
        }
    } else {
        w.write_str("</aside>\n")?;
    }
    Ok(WalkStatus::Continue)
}

fn render_colon_line(_w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, _entering: bool) -> RenderResult {
    Ok(WalkStatus::SkipChildren)
}
