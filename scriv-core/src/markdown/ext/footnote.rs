//! Shared numbering for footnote references and citations.
//!
//! `[^id]` references and `[@key]` citations draw labels from one sequence,
//! assigned in document order. A repeated id or key reuses its first number.
//! Footnote bodies are `::: footnote id` colon blocks.

use super::priority;
use crate::markdown::ast::{Ast, Citation, FootnoteRef, Kind, NodeId, NodeKind, WalkStatus};
use crate::markdown::context::ParseContext;
use crate::markdown::render::{HtmlWriter, RenderResult};
use crate::markdown::{EngineBuilder, Extension, Transformer};
use crate::models::Diagnostic;
use std::collections::{HashMap, HashSet};

/// Name of the colon block holding a footnote body.
pub const FOOTNOTE_BLOCK: &str = "footnote";

/// Attribute carrying the assigned number on a footnote body.
pub const NUMBER_ATTR: &str = "footnote-number";

/// A node that takes a label from the shared footnote sequence.
pub trait OrderableFootnote {
    /// Nodes with equal keys share a number.
    fn footnote_key(&self) -> String;
    fn set_number(&mut self, number: usize);
}

impl OrderableFootnote for Citation {
    fn footnote_key(&self) -> String {
        format!("cite:{}", self.key)
    }

    fn set_number(&mut self, number: usize) {
        self.number = Some(number);
    }
}

impl OrderableFootnote for FootnoteRef {
    fn footnote_key(&self) -> String {
        format!("fn:{}", self.id)
    }

    fn set_number(&mut self, number: usize) {
        self.number = Some(number);
    }
}

pub struct Footnotes;

impl Extension for Footnotes {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .transformer(priority::FOOTNOTE_ORDER, FootnoteOrderTransformer)
            .renderer(Kind::FootnoteRef, render_footnote_ref);
    }
}

#[derive(Default)]
struct Numbering {
    numbers: HashMap<String, usize>,
}

impl Numbering {
    fn assign(&mut self, node: &mut dyn OrderableFootnote) {
        let next = self.numbers.len() + 1;
        let number = *self.numbers.entry(node.footnote_key()).or_insert(next);
        node.set_number(number);
    }

    fn get(&self, key: &str) -> Option<usize> {
        self.numbers.get(key).copied()
    }
}

/// Nodes in document order, without descending into the reference list.
fn orderable_nodes(ast: &Ast) -> Vec<NodeId> {
    let mut out = Vec::new();
    let _ = ast.walk::<(), _>(ast.root(), &mut |id, entering| {
        if !entering {
            return Ok(WalkStatus::Continue);
        }
        match ast.kind(id) {
            NodeKind::CitationReferences => return Ok(WalkStatus::SkipChildren),
            NodeKind::Citation(_) | NodeKind::FootnoteRef(_) => out.push(id),
            _ => {}
        }
        Ok(WalkStatus::Continue)
    });
    out
}

struct FootnoteOrderTransformer;

impl Transformer for FootnoteOrderTransformer {
    fn name(&self) -> &'static str {
        "footnote-order"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, ctx: &mut ParseContext) {
        let mut numbering = Numbering::default();
        let mut referenced = Vec::new();

        for id in orderable_nodes(ast) {
            match ast.kind_mut(id) {
                NodeKind::Citation(c) => numbering.assign(c),
                NodeKind::FootnoteRef(f) => {
                    numbering.assign(f);
                    if !referenced.contains(&f.id) {
                        referenced.push(f.id.clone());
                    }
                }
                _ => {}
            }
        }

        let mut bodies = HashSet::new();
        for id in ast.descendants(ast.root()) {
            match ast.kind_mut(id) {
                NodeKind::CitationRef(r) => {
                    r.citation.number = numbering.get(&r.citation.footnote_key());
                }
                NodeKind::ColonBlock { name, args } if name == FOOTNOTE_BLOCK => {
                    let body = args.trim().to_string();
                    match numbering.get(&format!("fn:{}", body)) {
                        Some(n) => ast.attrs_mut(id).set(NUMBER_ATTR, n as i64),
                        None => ctx.add_error(Diagnostic::warning(
                            "footnote.unreferenced",
                            format!("Footnote '{}' is never referenced", body),
                        )),
                    }
                    bodies.insert(body);
                }
                _ => {}
            }
        }

        for id in referenced.iter().filter(|id| !bodies.contains(*id)) {
            ctx.add_error(Diagnostic::warning(
                "footnote.missing_body",
                format!("Footnote '{}' is referenced but has no body", id),
            ));
        }
    }
}

fn render_footnote_ref(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if let (true, NodeKind::FootnoteRef(f)) = (entering, ast.kind(id)) {
        let label = f.number.map(|n| n.to_string()).unwrap_or_else(|| "?".into());
        w.write_str("<sup class=\"footnote-ref\"")?;
        w.write_attr("id", &format!("footnote-ref-{}", f.id))?;
        w.write_str("><a")?;
        w.write_attr("href", &format!("#footnote-{}", f.id))?;
        w.write_str(&format!(">[{}]</a></sup>", label))?;
    }
    Ok(WalkStatus::SkipChildren)
}
