//! Inline parsing over the text of block nodes.
//!
//! Runs after block parsing. Every `Text` node outside code, raw HTML and
//! math is scanned for trigger bytes; a matching parser replaces the matched
//! byte range with a new node.

use super::ast::{Ast, NodeId, NodeKind, Text};
use std::collections::HashMap;

/// Result of a successful inline parse, in byte offsets of the scanned text.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineMatch {
    pub start: usize,
    pub end: usize,
    pub kind: NodeKind,
    /// Text child to place under the new node, if any.
    pub text: Option<String>,
}

pub trait InlineParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn trigger(&self) -> &'static [u8];

    /// Try to match at byte `pos` of `text`, where `text[pos]` is a trigger byte.
    /// The match may not start before `pos`.
    fn parse(&self, text: &str, pos: usize) -> Option<InlineMatch>;
}

/// Inline parsers in priority order, indexed by trigger byte.
#[derive(Default)]
pub struct InlineParserTable {
    parsers: Vec<Box<dyn InlineParser>>,
    by_trigger: HashMap<u8, Vec<usize>>,
}

impl InlineParserTable {
    /// `parsers` must already be sorted by priority.
    pub fn new(parsers: Vec<Box<dyn InlineParser>>) -> Self {
        let mut by_trigger: HashMap<u8, Vec<usize>> = HashMap::new();
        for (idx, parser) in parsers.iter().enumerate() {
            for &b in parser.trigger() {
                by_trigger.entry(b).or_default().push(idx);
            }
        }
        Self { parsers, by_trigger }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    fn find(&self, text: &str, from: usize) -> Option<InlineMatch> {
        for (pos, b) in text.bytes().enumerate().skip(from) {
            let Some(candidates) = self.by_trigger.get(&b) else {
                continue;
            };
            for &idx in candidates {
                if let Some(m) = self.parsers[idx].parse(text, pos) {
                    if m.start >= pos && m.end > m.start && m.end <= text.len() {
                        return Some(m);
                    }
                }
            }
        }
        None
    }
}

/// Nodes whose text is never rewritten by inline parsers.
fn is_opaque(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::CodeSpan
            | NodeKind::CodeBlock
            | NodeKind::FencedCodeBlock { .. }
            | NodeKind::HtmlBlock { .. }
            | NodeKind::RawHtml { .. }
            | NodeKind::InlineMath { .. }
            | NodeKind::DisplayMath { .. }
            | NodeKind::FrontMatter
            | NodeKind::SmallCaps
            | NodeKind::AutoLink { .. }
    )
}

fn collect_text(ast: &Ast, id: NodeId, out: &mut Vec<NodeId>) {
    match ast.kind(id) {
        NodeKind::Text(_) => out.push(id),
        kind if is_opaque(kind) => {}
        _ => {
            for &child in ast.children(id) {
                collect_text(ast, child, out);
            }
        }
    }
}

/// Run `table` over every eligible text node below `root`.
pub fn parse_inlines(ast: &mut Ast, root: NodeId, table: &InlineParserTable) {
    if table.is_empty() {
        return;
    }
    let mut texts = Vec::new();
    collect_text(ast, root, &mut texts);
    for id in texts {
        parse_text_node(ast, id, table);
    }
}

fn parse_text_node(ast: &mut Ast, id: NodeId, table: &InlineParserTable) {
    let mut current = id;
    loop {
        let value = match ast.kind(current) {
            NodeKind::Text(t) => t.value.clone(),
            _ => return,
        };
        let Some(m) = table.find(&value, 0) else {
            return;
        };

        let middle = if m.start == 0 {
            current
        } else {
            match ast.split_text(current, m.start) {
                Some(right) => right,
                None => return,
            }
        };
        // Always split at the end so that line-break bits stay after the new node.
        let Some(rest) = ast.split_text(middle, m.end - m.start) else {
            return;
        };

        let segment = ast.node(middle).segment.clone();
        let node = ast.new_node(m.kind);
        ast.node_mut(node).segment = segment.clone();
        if let Some(text) = m.text {
            let child = ast.new_node(NodeKind::Text(Text::new(text)));
            ast.node_mut(child).segment = segment;
            ast.append_child(node, child);
        }
        ast.replace(middle, node);

        if let NodeKind::Text(t) = ast.kind(rest) {
            if t.value.is_empty() && !t.soft_break && !t.hard_break {
                ast.detach(rest);
                return;
            }
        }
        current = rest;
    }
}
