//! Block-level parsing.
//!
//! Source lines are scanned once. Lines claimed by a registered block parser
//! become custom nodes; every run of lines in between is handed to
//! pulldown-cmark and its offset-tagged events are folded into the arena.

use super::ast::{Alignment, Ast, AutoLinkKind, LinkData, Literal, NodeId, NodeKind, Text};
use super::context::ParseContext;
use pulldown_cmark::{BrokenLink, CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd};
use std::collections::HashMap;
use std::ops::Range;

/// One source line, without its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    pub text: &'a str,
    /// 1-based line number in the document.
    pub number: usize,
    /// Byte offset of the first byte of the line.
    pub start: usize,
    /// Byte offset just past the line terminator.
    pub next: usize,
}

impl<'a> Line<'a> {
    /// Leading indentation in columns, tabs counting as four.
    pub fn indent(&self) -> usize {
        let mut cols = 0;
        for b in self.text.bytes() {
            match b {
                b' ' => cols += 1,
                b'\t' => cols += 4 - cols % 4,
                _ => break,
            }
        }
        cols
    }

    pub fn content(&self) -> &'a str {
        self.text.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn first_byte(&self) -> Option<u8> {
        self.text.trim_start().bytes().next()
    }
}

/// Split `source` into lines, keeping absolute offsets.
pub fn split_lines(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (idx, raw) in source.split_inclusive('\n').enumerate() {
        let next = start + raw.len();
        let text = raw.strip_suffix('\n').unwrap_or(raw);
        let text = text.strip_suffix('\r').unwrap_or(text);
        lines.push(Line {
            text,
            number: idx + 1,
            start,
            next,
        });
        start = next;
    }
    lines
}

/// What an opened block expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// The opening line is the whole block.
    NoChildren,
    /// Following lines are parsed as child blocks until the block closes.
    HasChildren,
    /// Following lines belong to the block verbatim until it closes.
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    /// The line closes the block and belongs to it.
    Close,
    /// The block ended on the previous line; this line is parsed normally.
    CloseBefore,
}

/// All lines of a finished custom block.
#[derive(Debug, Clone, Copy)]
pub struct BlockLines<'s, 'a> {
    pub lines: &'s [Line<'a>],
    /// Whether the last line is the block's closing line.
    pub has_closer: bool,
}

impl<'s, 'a> BlockLines<'s, 'a> {
    pub fn opener(&self) -> &'s Line<'a> {
        &self.lines[0]
    }

    /// Lines between the opener and the closer.
    pub fn body(&self) -> &'s [Line<'a>] {
        let len = self.lines.len();
        let end = if self.has_closer && len > 1 { len - 1 } else { len };
        &self.lines[1.min(end)..end]
    }

    pub fn body_text(&self) -> String {
        self.body()
            .iter()
            .map(|l| l.text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn range(&self) -> Range<usize> {
        let start = self.lines.first().map(|l| l.start).unwrap_or(0);
        let end = self.lines.last().map(|l| l.next).unwrap_or(start);
        start..end
    }
}

/// A custom block syntax, dispatched on the first non-space byte of a line.
pub trait BlockParser: Send + Sync {
    fn name(&self) -> &'static str;

    /// First bytes that can open this block.
    fn trigger(&self) -> &'static [u8];

    fn open(&self, line: &Line<'_>, ctx: &mut ParseContext) -> Option<(NodeKind, BlockState)>;

    /// Decide whether `line` continues an open block. `nesting` is private to
    /// the open block and starts at zero.
    fn continue_line(&self, _line: &Line<'_>, _nesting: &mut usize) -> Continuation {
        Continuation::CloseBefore
    }

    /// Called once the block is complete and attached. Child blocks, if any,
    /// are already parsed.
    fn close(&self, _ast: &mut Ast, _node: NodeId, _block: &BlockLines<'_, '_>, _ctx: &mut ParseContext) {}

    fn can_interrupt_paragraph(&self) -> bool {
        false
    }

    fn can_accept_indented_line(&self) -> bool {
        false
    }
}

/// Block parsers in priority order, indexed by trigger byte.
#[derive(Default)]
pub struct BlockParserTable {
    parsers: Vec<Box<dyn BlockParser>>,
    by_trigger: HashMap<u8, Vec<usize>>,
}

impl BlockParserTable {
    /// `parsers` must already be sorted by priority.
    pub fn new(parsers: Vec<Box<dyn BlockParser>>) -> Self {
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

    fn candidates(&self, b: u8) -> impl Iterator<Item = &dyn BlockParser> {
        self.by_trigger
            .get(&b)
            .into_iter()
            .flatten()
            .map(|&idx| self.parsers[idx].as_ref())
    }
}

/// Link reference definitions of the whole document, keyed by normalized label.
pub type ReferenceMap = HashMap<String, LinkData>;

pub fn collect_reference_definitions(source: &str, options: Options) -> ReferenceMap {
    let parser = Parser::new_ext(source, options);
    parser
        .reference_definitions()
        .iter()
        .filter(|(label, _)| !is_footnote_label(label))
        .map(|(label, def)| {
            (
                normalize_label(label),
                LinkData {
                    destination: def.dest.to_string(),
                    title: def.title.as_ref().map(|t| t.to_string()).unwrap_or_default(),
                },
            )
        })
        .collect()
}

/// `[^id]` is a footnote reference, never a link label.
fn is_footnote_label(label: &str) -> bool {
    label.starts_with('^')
}

fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub(crate) struct BlockScanner<'e> {
    pub parsers: &'e BlockParserTable,
    pub options: Options,
    pub references: &'e ReferenceMap,
}

impl BlockScanner<'_> {
    /// Parse `lines` of `source` as the children of `parent`.
    pub fn parse(&self, ast: &mut Ast, parent: NodeId, source: &str, lines: &[Line<'_>], ctx: &mut ParseContext) {
        let mut run_start: Option<usize> = None;
        let mut fence: Option<Fence> = None;
        let mut in_paragraph = false;
        let mut i = 0;

        while i < lines.len() {
            let line = &lines[i];

            if let Some(open) = fence {
                if open.closed_by(line) {
                    fence = None;
                }
                run_start.get_or_insert(i);
                i += 1;
                continue;
            }
            if let Some(opened) = Fence::opened_by(line) {
                fence = Some(opened);
                run_start.get_or_insert(i);
                in_paragraph = false;
                i += 1;
                continue;
            }

            if let Some((parser, kind, state)) = self.try_open(line, in_paragraph, ctx) {
                if let Some(start) = run_start.take() {
                    self.fold_run(ast, parent, source, &lines[start..i]);
                }
                i = self.consume_block(ast, parent, source, lines, i, parser, kind, state, ctx);
                in_paragraph = false;
                continue;
            }

            run_start.get_or_insert(i);
            in_paragraph = !line.is_blank() && line.indent() < 4;
            i += 1;
        }

        if let Some(start) = run_start {
            self.fold_run(ast, parent, source, &lines[start..]);
        }
    }

    fn try_open<'p>(
        &'p self,
        line: &Line<'_>,
        in_paragraph: bool,
        ctx: &mut ParseContext,
    ) -> Option<(&'p dyn BlockParser, NodeKind, BlockState)> {
        let b = line.first_byte()?;
        for parser in self.parsers.candidates(b) {
            if line.indent() >= 4 && !parser.can_accept_indented_line() {
                continue;
            }
            if in_paragraph && !parser.can_interrupt_paragraph() {
                continue;
            }
            if let Some((kind, state)) = parser.open(line, ctx) {
                return Some((parser, kind, state));
            }
        }
        None
    }

    /// Attach the block opened at `lines[first]`; returns the index of the
    /// first line after it.
    #[allow(clippy::too_many_arguments)]
    fn consume_block(
        &self,
        ast: &mut Ast,
        parent: NodeId,
        source: &str,
        lines: &[Line<'_>],
        first: usize,
        parser: &dyn BlockParser,
        kind: NodeKind,
        state: BlockState,
        ctx: &mut ParseContext,
    ) -> usize {
        let mut end = first + 1;
        let mut has_closer = false;

        if state != BlockState::NoChildren {
            let mut nesting = 0;
            let mut fence: Option<Fence> = None;
            end = lines.len();
            for (j, line) in lines.iter().enumerate().skip(first + 1) {
                // Closers inside fenced code of a container body are content.
                if state == BlockState::HasChildren {
                    if let Some(open) = fence {
                        if open.closed_by(line) {
                            fence = None;
                        }
                        continue;
                    }
                    if let Some(opened) = Fence::opened_by(line) {
                        fence = Some(opened);
                        continue;
                    }
                }
                match parser.continue_line(line, &mut nesting) {
                    Continuation::Continue => {}
                    Continuation::Close => {
                        has_closer = true;
                        end = j + 1;
                        break;
                    }
                    Continuation::CloseBefore => {
                        end = j;
                        break;
                    }
                }
            }
        } else {
            has_closer = true;
        }

        let block = BlockLines {
            lines: &lines[first..end],
            has_closer,
        };
        let node = ast.new_node(kind);
        ast.node_mut(node).segment = Some(block.range());
        ast.append_child(parent, node);

        if state == BlockState::HasChildren {
            self.parse(ast, node, source, block.body(), ctx);
        }
        parser.close(ast, node, &block, ctx);
        end
    }

    fn fold_run(&self, ast: &mut Ast, parent: NodeId, source: &str, lines: &[Line<'_>]) {
        let (Some(first), Some(last)) = (lines.first(), lines.last()) else {
            return;
        };
        let base = first.start;
        let text = &source[base..last.next];
        fold_markdown(ast, parent, text, base, self.options, self.references);
    }
}

#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: u8,
    len: usize,
}

impl Fence {
    fn opened_by(line: &Line<'_>) -> Option<Fence> {
        if line.indent() >= 4 {
            return None;
        }
        let trimmed = line.text.trim_start();
        let marker = *trimmed.as_bytes().first()?;
        if marker != b'`' && marker != b'~' {
            return None;
        }
        let len = trimmed.bytes().take_while(|&b| b == marker).count();
        if len < 3 {
            return None;
        }
        if marker == b'`' && trimmed[len..].contains('`') {
            return None;
        }
        Some(Fence { marker, len })
    }

    fn closed_by(&self, line: &Line<'_>) -> bool {
        if line.indent() >= 4 {
            return false;
        }
        let trimmed = line.text.trim();
        let run = trimmed.bytes().take_while(|&b| b == self.marker).count();
        run >= self.len && run == trimmed.len()
    }
}

/// Parse `text` (located at `base` in the document) with pulldown-cmark and
/// append the resulting nodes to `parent`.
pub(crate) fn fold_markdown(
    ast: &mut Ast,
    parent: NodeId,
    text: &str,
    base: usize,
    options: Options,
    references: &ReferenceMap,
) {
    let callback = |link: BrokenLink<'_>| {
        references.get(&normalize_label(&link.reference)).map(|def| {
            (
                CowStr::from(def.destination.clone()),
                CowStr::from(def.title.clone()),
            )
        })
    };
    let parser = Parser::new_with_broken_link_callback(text, options, Some(callback));

    let mut folder = Folder {
        ast,
        stack: vec![parent],
        text,
        base,
        footnote_link: false,
    };
    for (event, range) in parser.into_offset_iter() {
        folder.push(event, range);
    }
}

struct Folder<'a> {
    ast: &'a mut Ast,
    stack: Vec<NodeId>,
    text: &'a str,
    base: usize,
    /// Inside a `[^id]` shortcut link that is being kept as text.
    footnote_link: bool,
}

impl Folder<'_> {
    fn top(&self) -> NodeId {
        self.stack[self.stack.len() - 1]
    }

    fn push(&mut self, event: Event<'_>, range: Range<usize>) {
        let segment = range.start + self.base..range.end + self.base;
        match event {
            Event::Start(Tag::Link {
                link_type: LinkType::Shortcut | LinkType::ShortcutUnknown,
                ref id,
                ..
            }) if is_footnote_label(id) => {
                self.footnote_link = true;
                self.text("[".into(), segment.start..segment.start + 1);
            }
            Event::End(TagEnd::Link) if self.footnote_link => {
                self.footnote_link = false;
                self.text("]".into(), segment.end - 1..segment.end);
            }
            Event::Start(tag) => {
                let id = self.open(tag, &range);
                self.ast.node_mut(id).segment = Some(segment);
                let top = self.top();
                self.ast.append_child(top, id);
                self.stack.push(id);
            }
            Event::End(end) => {
                if self.stack.len() > 1 {
                    if let Some(id) = self.stack.pop() {
                        self.finish(id, end);
                    }
                }
            }
            Event::Text(text) => self.text(text.into_string(), segment),
            Event::Code(code) => {
                let span = self.leaf(NodeKind::CodeSpan, segment);
                let inner = self.ast.new_node(NodeKind::String(Literal {
                    value: code.into_string(),
                    raw: false,
                    code: true,
                }));
                self.ast.append_child(span, inner);
            }
            Event::InlineMath(tex) => {
                self.leaf(
                    NodeKind::InlineMath {
                        tex: tex.into_string(),
                        display: false,
                    },
                    segment,
                );
            }
            Event::DisplayMath(tex) => {
                self.leaf(
                    NodeKind::InlineMath {
                        tex: tex.into_string(),
                        display: true,
                    },
                    segment,
                );
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                let kind = if matches!(self.ast.kind(self.top()), NodeKind::HtmlBlock { .. }) {
                    NodeKind::String(Literal {
                        value: html.into_string(),
                        raw: true,
                        code: false,
                    })
                } else {
                    NodeKind::RawHtml {
                        html: html.into_string(),
                    }
                };
                self.leaf(kind, segment);
            }
            Event::SoftBreak => self.line_break(false),
            Event::HardBreak => self.line_break(true),
            Event::Rule => {
                self.leaf(NodeKind::ThematicBreak, segment);
            }
            _ => {}
        }
    }

    fn leaf(&mut self, kind: NodeKind, segment: Range<usize>) -> NodeId {
        let id = self.ast.new_node(kind);
        self.ast.node_mut(id).segment = Some(segment);
        let top = self.top();
        self.ast.append_child(top, id);
        id
    }

    fn open(&mut self, tag: Tag<'_>, range: &Range<usize>) -> NodeId {
        let kind = match tag {
            Tag::Paragraph => NodeKind::Paragraph,
            Tag::Heading {
                level,
                id,
                classes,
                attrs,
            } => {
                let node = self.ast.new_node(NodeKind::Heading { level: level as u8 });
                let bag = self.ast.attrs_mut(node);
                if let Some(id) = id {
                    bag.set("id", id.into_string());
                }
                if !classes.is_empty() {
                    let joined = classes.iter().map(|c| c.as_ref()).collect::<Vec<_>>().join(" ");
                    bag.set("class", joined);
                }
                for (name, value) in attrs {
                    bag.set(&name, value.map(|v| v.into_string()).unwrap_or_default());
                }
                return node;
            }
            Tag::BlockQuote(_) => NodeKind::Blockquote,
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => NodeKind::FencedCodeBlock {
                info: info.into_string(),
            },
            Tag::CodeBlock(CodeBlockKind::Indented) => NodeKind::CodeBlock,
            Tag::HtmlBlock => NodeKind::HtmlBlock {
                block_type: html_block_type(&self.text[range.clone()]),
                closure_line: None,
            },
            Tag::List(start) => NodeKind::List {
                marker: self.list_marker(range.start, start.is_some()),
                tight: true,
                start,
            },
            Tag::Item => NodeKind::ListItem {
                offset: self.item_offset(range),
            },
            Tag::Table(alignments) => NodeKind::Table {
                alignments: alignments.into_iter().map(Alignment::from).collect(),
            },
            Tag::TableHead => NodeKind::TableHead,
            Tag::TableRow => NodeKind::TableRow,
            Tag::TableCell => self.table_cell(),
            Tag::Emphasis => NodeKind::Emphasis { level: 1 },
            Tag::Strong => NodeKind::Emphasis { level: 2 },
            Tag::Strikethrough => NodeKind::Strikethrough,
            Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            } => match link_type {
                LinkType::Autolink | LinkType::Email => {
                    let kind = if link_type == LinkType::Email {
                        AutoLinkKind::Email
                    } else {
                        AutoLinkKind::Url
                    };
                    let protocol = match kind {
                        AutoLinkKind::Email => "mailto".to_string(),
                        AutoLinkKind::Url => dest_url.split(':').next().unwrap_or_default().to_string(),
                    };
                    NodeKind::AutoLink { protocol, kind }
                }
                _ => NodeKind::Link(LinkData {
                    destination: dest_url.into_string(),
                    title: title.into_string(),
                }),
            },
            Tag::Image { dest_url, title, .. } => NodeKind::Image(LinkData {
                destination: dest_url.into_string(),
                title: title.into_string(),
            }),
            _ => NodeKind::CustomInline { tag: "span".into() },
        };
        self.ast.new_node(kind)
    }

    fn finish(&mut self, id: NodeId, end: TagEnd) {
        match end {
            TagEnd::List(_) => {
                let loose = self.ast.children(id).iter().any(|item| {
                    self.ast
                        .children(*item)
                        .iter()
                        .any(|c| matches!(self.ast.kind(*c), NodeKind::Paragraph))
                });
                if let NodeKind::List { tight, .. } = self.ast.kind_mut(id) {
                    *tight = !loose;
                }
            }
            TagEnd::HtmlBlock => {
                let segment = self.ast.node(id).segment.clone();
                if let (Some(seg), NodeKind::HtmlBlock { block_type, closure_line }) =
                    (segment, self.ast.kind_mut(id))
                {
                    if (1..=5).contains(block_type) {
                        let local = seg.start - self.base..seg.end - self.base;
                        let body = self.text[local].trim_end_matches(['\n', '\r']);
                        let last_start = body.rfind('\n').map(|i| i + 1).unwrap_or(0);
                        *closure_line = Some(seg.start + last_start..seg.start + body.len());
                    }
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, value: String, segment: Range<usize>) {
        let top = self.top();
        match self.ast.kind(top) {
            NodeKind::CodeBlock | NodeKind::FencedCodeBlock { .. } | NodeKind::HtmlBlock { .. } => {
                let raw = matches!(self.ast.kind(top), NodeKind::HtmlBlock { .. });
                self.leaf(
                    NodeKind::String(Literal {
                        value,
                        raw,
                        code: !raw,
                    }),
                    segment,
                );
                return;
            }
            _ => {}
        }

        if let Some(last) = self.ast.last_child(top) {
            let contiguous = self.ast.node(last).segment.as_ref().map(|s| s.end) == Some(segment.start);
            if let (true, NodeKind::Text(t)) = (contiguous, self.ast.kind_mut(last)) {
                if !t.soft_break && !t.hard_break {
                    t.value.push_str(&value);
                    let node = self.ast.node_mut(last);
                    if let Some(seg) = node.segment.as_mut() {
                        seg.end = segment.end;
                    }
                    return;
                }
            }
        }
        self.leaf(NodeKind::Text(Text::new(value)), segment);
    }

    fn line_break(&mut self, hard: bool) {
        let top = self.top();
        if let Some(last) = self.ast.last_child(top) {
            if let NodeKind::Text(t) = self.ast.kind_mut(last) {
                if !t.soft_break && !t.hard_break {
                    if hard {
                        t.hard_break = true;
                    } else {
                        t.soft_break = true;
                    }
                    return;
                }
            }
        }
        let id = self.ast.new_node(NodeKind::Text(Text {
            value: String::new(),
            soft_break: !hard,
            hard_break: hard,
        }));
        self.ast.append_child(top, id);
    }

    fn list_marker(&self, start: usize, ordered: bool) -> u8 {
        let rest = self.text[start..].trim_start();
        if ordered {
            rest.bytes()
                .find(|b| !b.is_ascii_digit())
                .unwrap_or(b'.')
        } else {
            rest.bytes().next().unwrap_or(b'-')
        }
    }

    fn item_offset(&self, range: &Range<usize>) -> usize {
        let item = &self.text[range.clone()];
        let lead = item.len() - item.trim_start_matches(' ').len();
        let rest = &item[lead..];
        let marker = match rest.bytes().next() {
            Some(b) if b.is_ascii_digit() => rest.bytes().take_while(u8::is_ascii_digit).count() + 1,
            Some(_) => 1,
            None => 0,
        };
        let spaces = rest
            .get(marker..)
            .map(|r| r.len() - r.trim_start_matches(' ').len())
            .unwrap_or(0);
        lead + marker + spaces
    }

    fn table_cell(&self) -> NodeKind {
        let row = self.top();
        let header = matches!(self.ast.kind(row), NodeKind::TableHead);
        let column = self.ast.children(row).len();
        let alignment = self
            .stack
            .iter()
            .rev()
            .find_map(|id| match self.ast.kind(*id) {
                NodeKind::Table { alignments } => alignments.get(column).copied(),
                _ => None,
            })
            .unwrap_or(Alignment::None);
        NodeKind::TableCell { alignment, header }
    }
}

impl From<pulldown_cmark::Alignment> for Alignment {
    fn from(value: pulldown_cmark::Alignment) -> Self {
        match value {
            pulldown_cmark::Alignment::None => Alignment::None,
            pulldown_cmark::Alignment::Left => Alignment::Left,
            pulldown_cmark::Alignment::Center => Alignment::Center,
            pulldown_cmark::Alignment::Right => Alignment::Right,
        }
    }
}

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "base", "basefont", "blockquote", "body", "caption", "center",
    "col", "colgroup", "dd", "details", "dialog", "dir", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5",
    "h6", "head", "header", "hr", "html", "iframe", "legend", "li", "link", "main", "menu",
    "menuitem", "nav", "noframes", "ol", "optgroup", "option", "p", "param", "search", "section",
    "summary", "table", "tbody", "td", "tfoot", "th", "thead", "title", "tr", "track", "ul",
];

/// CommonMark HTML block start condition (1-7) of the block's first line.
fn html_block_type(block: &str) -> u8 {
    let first = block.trim_start().lines().next().unwrap_or_default().to_ascii_lowercase();
    for tag in ["<script", "<pre", "<style", "<textarea"] {
        if let Some(rest) = first.strip_prefix(tag) {
            if rest.is_empty() || rest.starts_with([' ', '>', '\t']) {
                return 1;
            }
        }
    }
    if first.starts_with("<!--") {
        return 2;
    }
    if first.starts_with("<?") {
        return 3;
    }
    if first.starts_with("<![cdata[") {
        return 5;
    }
    if first.starts_with("<!") {
        return 4;
    }
    let name: String = first
        .trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if BLOCK_TAGS.contains(&name.as_str()) {
        6
    } else {
        7
    }
}
