//! `CONTINUE_READING` cut points for the index page.
//!
//! The marker is parsed as its own paragraph so it can follow text without a
//! blank line. [`ContinueReading`] truncates the post there (or at its second
//! paragraph when there is no marker) and appends a link to the full post;
//! [`ContinueReadingNop`] only drops the marker for the detail page.

use super::priority;
use crate::markdown::ast::{Ast, Kind, NodeId, NodeKind, Text, WalkStatus};
use crate::markdown::block::{BlockLines, BlockParser, BlockState, Line};
use crate::markdown::context::ParseContext;
use crate::markdown::render::{HtmlWriter, RenderResult};
use crate::markdown::{EngineBuilder, Extension, Transformer};

pub const MARKER: &str = "CONTINUE_READING";

const BOOK_ICON: &str = concat!(
    r#"<svg class="continue-reading-icon" xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" "#,
    r#"width="1em" height="1em" fill="none" stroke="currentColor" stroke-width="2" aria-hidden="true">"#,
    r#"<path d="M2 4h7a3 3 0 0 1 3 3v13a2 2 0 0 0-2-2H2z"/>"#,
    r#"<path d="M22 4h-7a3 3 0 0 0-3 3v13a2 2 0 0 1 2-2h8z"/>"#,
    r#"</svg>"#
);

/// Cuts the document for the index view.
pub struct ContinueReading;

impl Extension for ContinueReading {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .block_parser(priority::CONTINUE_READING_MARKER, MarkerParser)
            .transformer(priority::CONTINUE_READING, CutTransformer)
            .renderer(Kind::ContinueReading, render_continue_reading);
    }
}

/// Removes the marker and keeps the whole document.
pub struct ContinueReadingNop;

impl Extension for ContinueReadingNop {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .block_parser(priority::CONTINUE_READING_MARKER, MarkerParser)
            .transformer(priority::CONTINUE_READING, NopTransformer);
    }
}

struct MarkerParser;

impl BlockParser for MarkerParser {
    fn name(&self) -> &'static str {
        "continue-reading"
    }

    fn trigger(&self) -> &'static [u8] {
        b"C"
    }

    fn open(&self, line: &Line<'_>, _ctx: &mut ParseContext) -> Option<(NodeKind, BlockState)> {
        (line.content().trim_end() == MARKER).then_some((NodeKind::Paragraph, BlockState::NoChildren))
    }

    fn close(&self, ast: &mut Ast, node: NodeId, block: &BlockLines<'_, '_>, _ctx: &mut ParseContext) {
        let text = ast.new_node(NodeKind::Text(Text::new(MARKER)));
        let start = block.opener().start + block.opener().indent();
        ast.node_mut(text).segment = Some(start..start + MARKER.len());
        ast.append_child(node, text);
    }

    fn can_interrupt_paragraph(&self) -> bool {
        true
    }
}

fn is_marker(ast: &Ast, id: NodeId) -> bool {
    if !matches!(ast.kind(id), NodeKind::Paragraph) {
        return false;
    }
    match ast.children(id) {
        [only] => matches!(ast.kind(*only), NodeKind::Text(t) if t.value.trim() == MARKER),
        _ => false,
    }
}

/// The first article, or the document itself.
fn container(ast: &Ast) -> NodeId {
    ast.find(ast.root(), |k| matches!(k, NodeKind::Article))
        .unwrap_or_else(|| ast.root())
}

fn cut_point(ast: &Ast, container: NodeId) -> Option<NodeId> {
    let children = ast.children(container);
    children
        .iter()
        .copied()
        .find(|c| is_marker(ast, *c))
        .or_else(|| {
            children
                .iter()
                .copied()
                .filter(|c| matches!(ast.kind(*c), NodeKind::Paragraph))
                .nth(1)
        })
}

struct CutTransformer;

impl Transformer for CutTransformer {
    fn name(&self) -> &'static str {
        "continue-reading"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, ctx: &mut ParseContext) {
        let container = container(ast);
        let Some(cut) = cut_point(ast, container) else {
            return;
        };
        let doomed: Vec<NodeId> = ast
            .children(container)
            .iter()
            .copied()
            .skip_while(|c| *c != cut)
            .collect();
        for node in doomed {
            ast.detach(node);
        }
        let link = ast.new_node(NodeKind::ContinueReading {
            target: format!("/{}", ctx.meta.slug),
        });
        ast.append_child(container, link);
    }
}

struct NopTransformer;

impl Transformer for NopTransformer {
    fn name(&self) -> &'static str {
        "continue-reading-nop"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, _ctx: &mut ParseContext) {
        let markers: Vec<NodeId> = ast
            .descendants(ast.root())
            .into_iter()
            .filter(|id| is_marker(ast, *id))
            .collect();
        for marker in markers {
            ast.detach(marker);
        }
    }
}

fn render_continue_reading(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if let (true, NodeKind::ContinueReading { target }) = (entering, ast.kind(id)) {
        w.write_str("<a class=\"continue-reading\"")?;
        w.write_attr("href", target)?;
        w.write_str(">")?;
        w.write_str(BOOK_ICON)?;
        w.write_str("Continue reading</a>\n")?;
    }
    Ok(WalkStatus::SkipChildren)
}
