//! `:toc:` tables of contents.

use super::priority;
use crate::markdown::ast::{Ast, Kind, NodeId, NodeKind, Toc, TocEntry, WalkStatus};
use crate::markdown::context::ParseContext;
use crate::markdown::render::{escape_html, HtmlWriter, RenderResult};
use crate::markdown::{EngineBuilder, Extension, Transformer};

pub const DEFAULT_DEPTH: u8 = 3;

/// Replaces each `:toc:` line with the list of headings down to a depth.
/// `:toc: 2` overrides the depth for one table.
pub struct TableOfContents {
    depth: u8,
}

impl TableOfContents {
    pub fn new(depth: u8) -> Self {
        Self { depth }
    }
}

impl Default for TableOfContents {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

impl Extension for TableOfContents {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .transformer(priority::TOC, TocTransformer { depth: self.depth })
            .renderer(Kind::Toc, render_toc);
    }
}

struct TocTransformer {
    depth: u8,
}

fn collect_entries(ast: &Ast, depth: u8) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    ast.walk_headings(|id| {
        let NodeKind::Heading { level } = ast.kind(id) else {
            return;
        };
        let Some(anchor) = ast.attrs(id).get_str("id") else {
            return;
        };
        if *level <= depth {
            entries.push(TocEntry {
                level: *level,
                id: anchor.to_string(),
                text: ast.text_content(id).trim().to_string(),
            });
        }
    });
    entries
}

impl Transformer for TocTransformer {
    fn name(&self) -> &'static str {
        "toc"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, _ctx: &mut ParseContext) {
        let markers: Vec<(NodeId, u8)> = ast
            .descendants(ast.root())
            .into_iter()
            .filter_map(|id| match ast.kind(id) {
                NodeKind::ColonLine { name, args } if name == "toc" => {
                    Some((id, args.trim().parse().unwrap_or(self.depth)))
                }
                _ => None,
            })
            .collect();

        for (marker, depth) in markers {
            let entries = collect_entries(ast, depth);
            let toc = ast.new_node(NodeKind::Toc(Toc { depth, entries }));
            ast.replace(marker, toc);
        }
    }
}

/// Nested `<ol>` markup for `entries`, relative to the shallowest level.
pub fn toc_list_html(entries: &[TocEntry]) -> String {
    let Some(base) = entries.iter().map(|e| e.level).min() else {
        return String::new();
    };
    let mut out = String::new();
    // One flag per open <ol>: whether its last <li> is still open.
    let mut open: Vec<bool> = Vec::new();

    for entry in entries {
        let level = usize::from(entry.level - base) + 1;
        while open.len() > level {
            if open.pop() == Some(true) {
                out.push_str("</li>");
            }
            out.push_str("</ol>");
        }
        if open.len() == level {
            if let Some(li) = open.last_mut() {
                if *li {
                    out.push_str("</li>");
                    *li = false;
                }
            }
        }
        while open.len() < level {
            if let Some(li) = open.last_mut() {
                if !*li {
                    out.push_str("<li>");
                    *li = true;
                }
            }
            out.push_str("<ol>");
            open.push(false);
        }
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            escape_html(&entry.id),
            escape_html(&entry.text)
        ));
        if let Some(li) = open.last_mut() {
            *li = true;
        }
    }
    while let Some(li) = open.pop() {
        if li {
            out.push_str("</li>");
        }
        out.push_str("</ol>");
    }
    out
}

fn render_toc(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if let (true, NodeKind::Toc(toc)) = (entering, ast.kind(id)) {
        w.write_str("<div class=\"toc\">")?;
        w.write_str(&toc_list_html(&toc.entries))?;
        w.write_str("</div>\n")?;
    }
    Ok(WalkStatus::SkipChildren)
}
