//! Pandoc-style citations, footnote references and the IEEE reference list.
//!
//! `[@key]`, `[see @key, p. 3]` and the footnote-style `[^@key]` become
//! [`Citation`] nodes; `[^id]` becomes a [`FootnoteRef`]. Spans are found with
//! a small automaton over the inline children of each node, then the tree is
//! rewritten span by span from last to first so earlier positions stay valid.

use super::priority;
use crate::bibliography::{Author, BibEntry, BibliographyStore};
use crate::markdown::ast::{
    Ast, Citation, CitationRef, FootnoteRef, Kind, NodeId, NodeKind, WalkStatus,
};
use crate::markdown::context::ParseContext;
use crate::markdown::render::{escape_html, escape_url, HtmlWriter, RenderResult};
use crate::markdown::{EngineBuilder, Extension, Transformer};
use crate::models::Diagnostic;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Decides where the reference list goes.
pub trait ReferencesAttacher: Send + Sync {
    fn attach(&self, ast: &mut Ast, references: NodeId, ctx: &mut ParseContext);
}

/// Appends the reference list to the first article. Records an error when
/// the document has no article.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleAttacher;

impl ReferencesAttacher for ArticleAttacher {
    fn attach(&self, ast: &mut Ast, references: NodeId, ctx: &mut ParseContext) {
        match ast.find(ast.root(), |k| matches!(k, NodeKind::Article)) {
            Some(article) => ast.append_child(article, references),
            None => ctx.add_error(Diagnostic::error(
                "citation.no_article",
                "Document has citations but no article to hold the reference list",
            )),
        }
    }
}

/// Appends the reference list to the document root.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentAttacher;

impl ReferencesAttacher for DocumentAttacher {
    fn attach(&self, ast: &mut Ast, references: NodeId, _ctx: &mut ParseContext) {
        let root = ast.root();
        ast.append_child(root, references);
    }
}

pub struct Citations<A = ArticleAttacher> {
    attacher: A,
}

impl Default for Citations<ArticleAttacher> {
    fn default() -> Self {
        Self {
            attacher: ArticleAttacher,
        }
    }
}

impl<A> Citations<A> {
    pub fn with_attacher(attacher: A) -> Self {
        Self { attacher }
    }
}

impl<A: ReferencesAttacher + Clone + 'static> Extension for Citations<A> {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .transformer(
                priority::CITATION,
                CitationTransformer {
                    attacher: self.attacher.clone(),
                },
            )
            .renderer(Kind::Citation, render_citation)
            .renderer(Kind::CitationReferences, render_citation_references)
            .renderer(Kind::CitationRef, render_citation_ref);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pos {
    node: NodeId,
    offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SpanKind {
    Citation {
        key: String,
        footnote_style: bool,
        prefix: Option<String>,
        suffix: Option<String>,
    },
    Footnote {
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    open: Pos,
    close: Pos,
    /// Length of the opening marker: `[` or `[^`.
    marker_len: usize,
    kind: SpanKind,
}

#[derive(Debug, Clone)]
enum State {
    Search,
    Start {
        open: Pos,
        caret: bool,
        prefix: String,
    },
    ParseKey {
        open: Pos,
        caret: bool,
        prefix: String,
        key: String,
    },
    FoundKey {
        open: Pos,
        caret: bool,
        prefix: String,
        key: String,
        suffix: String,
    },
    FootnoteId {
        open: Pos,
        id: String,
    },
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_footnote_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn start(open: Pos) -> State {
    State::Start {
        open,
        caret: false,
        prefix: String::new(),
    }
}

/// Citation automaton over the inline children of one node.
struct SpanScanner {
    state: State,
    spans: Vec<Span>,
    truncated: Vec<String>,
}

impl SpanScanner {
    fn new() -> Self {
        Self {
            state: State::Search,
            spans: Vec::new(),
            truncated: Vec::new(),
        }
    }

    fn feed(&mut self, pos: Pos, c: char) {
        let state = std::mem::replace(&mut self.state, State::Search);
        self.state = match state {
            State::Search if c == '[' => start(pos),
            State::Search => State::Search,

            State::Start { open, caret, prefix } => match c {
                '[' => start(pos),
                ']' => State::Search,
                '^' if !caret && prefix.is_empty() => State::Start {
                    open,
                    caret: true,
                    prefix,
                },
                '@' if prefix.is_empty() || prefix.ends_with(char::is_whitespace) => State::ParseKey {
                    open,
                    caret,
                    prefix,
                    key: String::new(),
                },
                c if caret && prefix.is_empty() && is_footnote_id_char(c) => State::FootnoteId {
                    open,
                    id: c.to_string(),
                },
                _ if caret && prefix.is_empty() => State::Search,
                c => {
                    let mut prefix = prefix;
                    prefix.push(c);
                    State::Start { open, caret, prefix }
                }
            },

            State::ParseKey {
                open,
                caret,
                prefix,
                mut key,
            } => {
                if is_key_char(c) {
                    key.push(c);
                    State::ParseKey {
                        open,
                        caret,
                        prefix,
                        key,
                    }
                } else if key.is_empty() {
                    if c == '[' {
                        start(pos)
                    } else {
                        State::Search
                    }
                } else {
                    self.state = State::FoundKey {
                        open,
                        caret,
                        prefix,
                        key,
                        suffix: String::new(),
                    };
                    self.feed(pos, c);
                    return;
                }
            }

            State::FoundKey {
                open,
                caret,
                prefix,
                key,
                mut suffix,
            } => {
                if c == ']' {
                    self.spans.push(Span {
                        open,
                        close: pos,
                        marker_len: if caret { 2 } else { 1 },
                        kind: SpanKind::Citation {
                            key,
                            footnote_style: caret,
                            prefix: non_empty(&prefix),
                            suffix: non_empty(&suffix),
                        },
                    });
                    State::Search
                } else {
                    suffix.push(c);
                    State::FoundKey {
                        open,
                        caret,
                        prefix,
                        key,
                        suffix,
                    }
                }
            }

            State::FootnoteId { open, mut id } => match c {
                ']' => {
                    self.spans.push(Span {
                        open,
                        close: pos,
                        marker_len: 2,
                        kind: SpanKind::Footnote { id },
                    });
                    State::Search
                }
                '[' => start(pos),
                c if is_footnote_id_char(c) => {
                    id.push(c);
                    State::FootnoteId { open, id }
                }
                _ => State::Search,
            },
        };
    }

    /// A non-text sibling: keys end, prefixes and suffixes may contain markup.
    fn boundary(&mut self) {
        let state = std::mem::replace(&mut self.state, State::Search);
        self.state = match state {
            State::ParseKey {
                open,
                caret,
                prefix,
                key,
            } if !key.is_empty() => State::FoundKey {
                open,
                caret,
                prefix,
                key,
                suffix: String::new(),
            },
            State::ParseKey { .. } | State::FootnoteId { .. } => State::Search,
            other => other,
        };
    }

    fn finish(&mut self) {
        match std::mem::replace(&mut self.state, State::Search) {
            State::FoundKey { key, .. } => self.truncated.push(key),
            State::ParseKey { key, .. } if !key.is_empty() => self.truncated.push(key),
            _ => {}
        }
    }
}

/// Find all spans among the children of `parent`.
fn scan_children(ast: &Ast, parent: NodeId) -> (Vec<Span>, Vec<String>) {
    let mut scanner = SpanScanner::new();
    for &child in ast.children(parent) {
        match ast.kind(child) {
            NodeKind::Text(text) => {
                for (offset, c) in text.value.char_indices() {
                    scanner.feed(Pos { node: child, offset }, c);
                }
                if text.soft_break || text.hard_break {
                    let end = Pos {
                        node: child,
                        offset: text.value.len(),
                    };
                    scanner.feed(end, ' ');
                }
            }
            _ => scanner.boundary(),
        }
    }
    scanner.finish();
    (scanner.spans, scanner.truncated)
}

fn is_empty_text(ast: &Ast, id: NodeId) -> bool {
    matches!(ast.kind(id), NodeKind::Text(t) if t.value.is_empty() && !t.soft_break && !t.hard_break)
}

/// Replace the bracketed source of `span` with a single node.
fn apply_span(ast: &mut Ast, span: &Span) -> Option<NodeId> {
    let (a, b) = (span.open.node, span.close.node);

    let after = ast.split_text(b, span.close.offset + 1)?;
    let close = ast.split_text(b, span.close.offset)?;
    ast.detach(close);

    let open = ast.split_text(a, span.open.offset)?;
    let first = ast.split_text(open, span.marker_len)?;
    ast.detach(open);
    let last = if a == b { first } else { b };

    let parent = ast.parent(first)?;
    let siblings = ast.children(parent).to_vec();
    let from = siblings.iter().position(|c| *c == first)?;
    let to = siblings.iter().position(|c| *c == last)?;
    let inner = siblings[from..=to].to_vec();

    let node = match &span.kind {
        SpanKind::Citation {
            key,
            footnote_style,
            prefix,
            suffix,
        } => ast.new_node(NodeKind::Citation(Citation {
            key: key.clone(),
            prefix: prefix.clone(),
            suffix: suffix.clone(),
            footnote_style: *footnote_style,
            ..Citation::default()
        })),
        SpanKind::Footnote { id } => ast.new_node(NodeKind::FootnoteRef(FootnoteRef {
            id: id.clone(),
            number: None,
        })),
    };
    ast.insert_before(first, node);

    let keep_inner = matches!(span.kind, SpanKind::Citation { .. });
    for n in inner {
        if keep_inner && !is_empty_text(ast, n) {
            ast.append_child(node, n);
        } else {
            ast.detach(n);
        }
    }

    for leftover in [a, after] {
        if is_empty_text(ast, leftover) {
            ast.detach(leftover);
        }
    }
    Some(node)
}

struct CitationTransformer<A> {
    attacher: A,
}

impl<A: ReferencesAttacher> CitationTransformer<A> {
    fn load_bibliography(&self, ctx: &mut ParseContext) {
        if !ctx.bibliography.is_empty() || ctx.meta.bib_paths.is_empty() {
            return;
        }
        let dir = ctx.source_dir().to_path_buf();
        let paths: Vec<_> = ctx.meta.bib_paths.iter().map(|p| dir.join(p)).collect();
        let mut store = BibliographyStore::new();
        ctx.bibliography = store.collect(&paths);
        for diagnostic in store.take_diagnostics() {
            ctx.add_error(diagnostic);
        }
    }
}

impl<A: ReferencesAttacher> Transformer for CitationTransformer<A> {
    fn name(&self) -> &'static str {
        "citation"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, ctx: &mut ParseContext) {
        self.load_bibliography(ctx);

        let parents: Vec<NodeId> = ast
            .descendants(ast.root())
            .into_iter()
            .filter(|id| ast.children(*id).iter().any(|c| matches!(ast.kind(*c), NodeKind::Text(_))))
            .collect();

        for parent in parents {
            let (spans, truncated) = scan_children(ast, parent);
            for key in truncated {
                ctx.add_error(Diagnostic::error(
                    "citation.truncated",
                    format!("Citation of '{}' is missing its closing ']'", key),
                ));
            }
            for span in spans.iter().rev() {
                if apply_span(ast, span).is_none() {
                    debug!(?span, "could not rewrite citation span");
                }
            }
        }

        let citations: Vec<NodeId> = ast
            .descendants(ast.root())
            .into_iter()
            .filter(|id| matches!(ast.kind(*id), NodeKind::Citation(_)))
            .collect();
        if citations.is_empty() {
            return;
        }

        let mut missing = HashSet::new();
        let mut refs: Vec<CitationRef> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for (order, id) in citations.iter().enumerate() {
            let entry = match ast.kind(*id) {
                NodeKind::Citation(c) => ctx.bibliography.get(&c.key).cloned(),
                _ => continue,
            };
            let NodeKind::Citation(citation) = ast.kind_mut(*id) else {
                continue;
            };
            citation.order = order;
            citation.entry = entry;
            if citation.entry.is_none() && missing.insert(citation.key.clone()) {
                ctx.add_error(Diagnostic::error(
                    "citation.missing_key",
                    format!("Citation key '{}' is not in any bibliography", citation.key),
                ));
            }

            match by_key.get(&citation.key) {
                Some(&idx) => refs[idx].count += 1,
                None => {
                    by_key.insert(citation.key.clone(), refs.len());
                    refs.push(CitationRef {
                        citation: citation.clone(),
                        order: refs.len(),
                        count: 1,
                    });
                }
            }
            ast.attrs_mut(*id).set("data-link-type", "citation");
        }

        let list = ast.new_node(NodeKind::CitationReferences);
        for r in refs {
            let child = ast.new_node(NodeKind::CitationRef(r));
            ast.append_child(list, child);
        }
        self.attacher.attach(ast, list, ctx);
    }
}

fn number_label(number: Option<usize>) -> String {
    number.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string())
}

fn render_citation(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let NodeKind::Citation(citation) = ast.kind(id) else {
        return Ok(WalkStatus::Continue);
    };
    if !entering {
        return Ok(WalkStatus::SkipChildren);
    }
    if citation.footnote_style {
        w.write_str("<sup class=\"cite-footnote\">")?;
    }
    w.write_str("<a")?;
    w.write_attr("href", &format!("#cite-{}", escape_url(&citation.key)))?;
    w.write_attrs(ast.attrs(id), &[])?;
    w.write_str(&format!("><cite>[{}]</cite></a>", number_label(citation.number)))?;
    if citation.footnote_style {
        w.write_str("</sup>")?;
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_citation_references(w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, entering: bool) -> RenderResult {
    if entering {
        w.write_str("<div class=\"cite-references\">\n<h2>References</h2>\n")?;
    } else {
        w.write_str("</div>\n")?;
    }
    Ok(WalkStatus::Continue)
}

fn render_citation_ref(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let (true, NodeKind::CitationRef(r)) = (entering, ast.kind(id)) else {
        return Ok(WalkStatus::SkipChildren);
    };
    let citation = &r.citation;
    w.write_str("<div class=\"cite-reference\"")?;
    w.write_attr("id", &format!("cite-{}", citation.key))?;
    w.write_str(&format!(
        "><span class=\"cite-number\">[{}]</span> ",
        number_label(citation.number)
    ))?;
    match &citation.entry {
        Some(entry) => w.write_str(&format_ieee(entry))?,
        None => w.write_escaped(&citation.key)?,
    }
    w.write_str("</div>\n")?;
    Ok(WalkStatus::SkipChildren)
}

const ET_AL: &str = " <em>et al.</em>";

/// IEEE author list: up to six names, `A, B and C`; more collapse to the
/// first author and "et al.".
pub fn format_authors(authors: &[Author]) -> String {
    let names: Vec<String> = authors
        .iter()
        .map(|a| escape_html(&a.initials_and_family()))
        .collect();
    match authors {
        [] => String::new(),
        _ if authors.len() > 6 => format!("{}{}", names[0], ET_AL),
        [.., last] if last.is_others() => {
            let named = &names[..names.len() - 1];
            if named.is_empty() {
                ET_AL.trim_start().to_string()
            } else {
                format!("{}{}", named.join(", "), ET_AL)
            }
        }
        [_] => names[0].clone(),
        _ => format!(
            "{} and {}",
            names[..names.len() - 1].join(", "),
            names[names.len() - 1]
        ),
    }
}

/// One reference-list entry in IEEE style, as HTML.
pub fn format_ieee(entry: &BibEntry) -> String {
    let mut out = format_authors(&entry.authors);

    if let Some(title) = &entry.title {
        if !out.is_empty() {
            out.push_str(", ");
        }
        out.push_str(&format!("\"{},\"", escape_html(title)));
    }

    let mut tail = Vec::new();
    if let Some(volume) = &entry.volume {
        tail.push(format!("Vol. {}", escape_html(volume)));
    }
    if let Some(year) = entry.year {
        tail.push(year.to_string());
    }
    if let Some(doi) = &entry.doi {
        tail.push(format!(
            "doi: <a href=\"https://doi.org/{}\">{}</a>",
            escape_url(doi),
            escape_html(doi)
        ));
    }

    if let Some(journal) = &entry.journal {
        out.push_str(&format!(
            " in <em class=\"cite-journal\">{}</em>",
            escape_html(journal)
        ));
    }
    for part in tail {
        if !out.is_empty() {
            out.push_str(", ");
        }
        out.push_str(&part);
    }

    out.push('.');
    out
}
