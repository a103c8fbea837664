//! Arena-backed markdown syntax tree.
//!
//! Every node lives in a single `Ast` arena and is addressed by a `NodeId`.
//! A node owns its ordered children; detaching a node hands the whole subtree
//! back to the caller, who may reinsert it anywhere else in the same arena.

use crate::bibliography::BibEntry;
use chrono::NaiveDate;
use std::fmt;
use std::ops::Range;

/// Handle to a node inside an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Value stored in a node's attribute bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Bytes(Vec<u8>),
    Str(String),
    Int(i64),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

/// Insertion-ordered attribute bag. Setting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, AttrValue)>);

impl Attributes {
    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) {
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.0.push((name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            AttrValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        let idx = self.0.iter().position(|(n, _)| n == name)?;
        Some(self.0.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Whether the document root has no children.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Column alignment of a table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    None,
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoLinkKind {
    Url,
    Email,
}

/// Plain text taken from the source. `value` has entities already decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    pub value: String,
    pub soft_break: bool,
    pub hard_break: bool,
}

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

/// Literal text synthesized by a parser or transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Literal {
    pub value: String,
    /// Emit without escaping.
    pub raw: bool,
    /// Originates from code; inline parsers leave it alone.
    pub code: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkData {
    pub destination: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Figure {
    pub destination: String,
    pub title: String,
    pub alt: String,
}

/// An inline `[@key]` citation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Citation {
    pub key: String,
    /// Resolved bibliographic entry; `None` until the citation transform ran
    /// or when the key is missing from every bibliography.
    pub entry: Option<BibEntry>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// 0-based position among all citations of the document.
    pub order: usize,
    /// Shared footnote/citation label, assigned after all transforms.
    pub number: Option<usize>,
    /// Written as `[^@key]`.
    pub footnote_style: bool,
}

/// Entry of the reference list. Holds a snapshot of the first citation of its key.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationRef {
    pub citation: Citation,
    /// Display order in the reference list (0-based).
    pub order: usize,
    /// How many times the key is cited in the document.
    pub count: usize,
}

/// An inline `[^id]` footnote reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FootnoteRef {
    pub id: String,
    pub number: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toc {
    pub depth: u8,
    pub entries: Vec<TocEntry>,
}

/// Node payloads, both CommonMark-standard and custom.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Paragraph,
    Heading { level: u8 },
    List { marker: u8, tight: bool, start: Option<u64> },
    ListItem { offset: usize },
    Blockquote,
    FencedCodeBlock { info: String },
    CodeBlock,
    ThematicBreak,
    HtmlBlock { block_type: u8, closure_line: Option<Range<usize>> },
    Table { alignments: Vec<Alignment> },
    TableHead,
    TableRow,
    TableCell { alignment: Alignment, header: bool },
    FrontMatter,
    DisplayMath { tex: String },

    Text(Text),
    String(Literal),
    CodeSpan,
    Emphasis { level: u8 },
    Strikethrough,
    Link(LinkData),
    Image(LinkData),
    AutoLink { protocol: String, kind: AutoLinkKind },
    RawHtml { html: String },
    InlineMath { tex: String, display: bool },

    Article,
    Header,
    Time { date: Option<NaiveDate> },
    Figure(Figure),
    FigCaption,
    Citation(Citation),
    CitationRef(CitationRef),
    CitationReferences,
    FootnoteRef(FootnoteRef),
    ColonBlock { name: String, args: String },
    ColonLine { name: String, args: String },
    ContinueReading { target: String },
    SmallCaps,
    Toc(Toc),
    CustomInline { tag: String },
}

/// Payload-free discriminant of [`NodeKind`], used to index render tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Document,
    Paragraph,
    Heading,
    List,
    ListItem,
    Blockquote,
    FencedCodeBlock,
    CodeBlock,
    ThematicBreak,
    HtmlBlock,
    Table,
    TableHead,
    TableRow,
    TableCell,
    FrontMatter,
    DisplayMath,
    Text,
    String,
    CodeSpan,
    Emphasis,
    Strikethrough,
    Link,
    Image,
    AutoLink,
    RawHtml,
    InlineMath,
    Article,
    Header,
    Time,
    Figure,
    FigCaption,
    Citation,
    CitationRef,
    CitationReferences,
    FootnoteRef,
    ColonBlock,
    ColonLine,
    ContinueReading,
    SmallCaps,
    Toc,
    CustomInline,
}

impl NodeKind {
    pub fn kind(&self) -> Kind {
        match self {
            NodeKind::Document => Kind::Document,
            NodeKind::Paragraph => Kind::Paragraph,
            NodeKind::Heading { .. } => Kind::Heading,
            NodeKind::List { .. } => Kind::List,
            NodeKind::ListItem { .. } => Kind::ListItem,
            NodeKind::Blockquote => Kind::Blockquote,
            NodeKind::FencedCodeBlock { .. } => Kind::FencedCodeBlock,
            NodeKind::CodeBlock => Kind::CodeBlock,
            NodeKind::ThematicBreak => Kind::ThematicBreak,
            NodeKind::HtmlBlock { .. } => Kind::HtmlBlock,
            NodeKind::Table { .. } => Kind::Table,
            NodeKind::TableHead => Kind::TableHead,
            NodeKind::TableRow => Kind::TableRow,
            NodeKind::TableCell { .. } => Kind::TableCell,
            NodeKind::FrontMatter => Kind::FrontMatter,
            NodeKind::DisplayMath { .. } => Kind::DisplayMath,
            NodeKind::Text(_) => Kind::Text,
            NodeKind::String(_) => Kind::String,
            NodeKind::CodeSpan => Kind::CodeSpan,
            NodeKind::Emphasis { .. } => Kind::Emphasis,
            NodeKind::Strikethrough => Kind::Strikethrough,
            NodeKind::Link(_) => Kind::Link,
            NodeKind::Image(_) => Kind::Image,
            NodeKind::AutoLink { .. } => Kind::AutoLink,
            NodeKind::RawHtml { .. } => Kind::RawHtml,
            NodeKind::InlineMath { .. } => Kind::InlineMath,
            NodeKind::Article => Kind::Article,
            NodeKind::Header => Kind::Header,
            NodeKind::Time { .. } => Kind::Time,
            NodeKind::Figure(_) => Kind::Figure,
            NodeKind::FigCaption => Kind::FigCaption,
            NodeKind::Citation(_) => Kind::Citation,
            NodeKind::CitationRef(_) => Kind::CitationRef,
            NodeKind::CitationReferences => Kind::CitationReferences,
            NodeKind::FootnoteRef(_) => Kind::FootnoteRef,
            NodeKind::ColonBlock { .. } => Kind::ColonBlock,
            NodeKind::ColonLine { .. } => Kind::ColonLine,
            NodeKind::ContinueReading { .. } => Kind::ContinueReading,
            NodeKind::SmallCaps => Kind::SmallCaps,
            NodeKind::Toc(_) => Kind::Toc,
            NodeKind::CustomInline { .. } => Kind::CustomInline,
        }
    }
}

impl Kind {
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            Kind::Text
                | Kind::String
                | Kind::CodeSpan
                | Kind::Emphasis
                | Kind::Strikethrough
                | Kind::Link
                | Kind::Image
                | Kind::AutoLink
                | Kind::RawHtml
                | Kind::InlineMath
                | Kind::Citation
                | Kind::FootnoteRef
                | Kind::SmallCaps
                | Kind::CustomInline
                | Kind::Time
        )
    }
}

/// Result of a walk callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    Continue,
    /// Skip the children of the node just entered. The exit callback still runs.
    SkipChildren,
    Stop,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Source byte range `[start, stop)` this node covers, when known.
    pub segment: Option<Range<usize>>,
    pub attrs: Attributes,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    /// Create an arena holding an empty `Document` root.
    pub fn new() -> Self {
        let mut ast = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        ast.root = ast.new_node(NodeKind::Document);
        ast
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Allocate a detached node.
    pub fn new_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            segment: None,
            attrs: Attributes::default(),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn new_text(&mut self, value: impl Into<String>) -> NodeId {
        self.new_node(NodeKind::Text(Text::new(value)))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn attrs(&self, id: NodeId) -> &Attributes {
        &self.nodes[id.0].attrs
    }

    pub fn attrs_mut(&mut self, id: NodeId) -> &mut Attributes {
        &mut self.nodes[id.0].attrs
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    fn index_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let idx = self.children(parent).iter().position(|c| *c == id)?;
        Some((parent, idx))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, idx) = self.index_in_parent(id)?;
        self.children(parent).get(idx + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, idx) = self.index_in_parent(id)?;
        idx.checked_sub(1).map(|i| self.children(parent)[i])
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` at position `idx` of `parent`'s children.
    pub fn insert_child(&mut self, parent: NodeId, idx: usize, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        let idx = idx.min(children.len());
        children.insert(idx, child);
    }

    /// Insert `child` right before `reference`, which must be attached.
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) {
        self.detach(child);
        if let Some((parent, idx)) = self.index_in_parent(reference) {
            self.insert_child(parent, idx, child);
        }
    }

    /// Insert `child` right after `reference`, which must be attached.
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) {
        self.detach(child);
        if let Some((parent, idx)) = self.index_in_parent(reference) {
            self.insert_child(parent, idx + 1, child);
        }
    }

    /// Detach `id` from its parent. The subtree stays intact and can be reinserted.
    pub fn detach(&mut self, id: NodeId) -> NodeId {
        if let Some((parent, idx)) = self.index_in_parent(id) {
            self.nodes[parent.0].children.remove(idx);
        }
        self.nodes[id.0].parent = None;
        id
    }

    /// Replace `old` with `new` in `old`'s parent. Returns the detached `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> NodeId {
        self.detach(new);
        if let Some((parent, idx)) = self.index_in_parent(old) {
            self.nodes[parent.0].children[idx] = new;
            self.nodes[new.0].parent = Some(parent);
            self.nodes[old.0].parent = None;
        }
        old
    }

    /// Detach and return all children of `id`, in order.
    pub fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in &children {
            self.nodes[child.0].parent = None;
        }
        children
    }

    /// Copy `id` and its subtree. The copy is detached; attributes are copied by value.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let source = &self.nodes[id.0];
        let kind = source.kind.clone();
        let segment = source.segment.clone();
        let attrs = source.attrs.clone();
        let children = source.children.clone();

        let copy = self.new_node(kind);
        self.nodes[copy.0].segment = segment;
        self.nodes[copy.0].attrs = attrs;
        for child in children {
            let child_copy = self.deep_clone(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Pre/post-order walk. `f` gets `(node, entering)`.
    pub fn walk<E, F>(&self, id: NodeId, f: &mut F) -> Result<WalkStatus, E>
    where
        F: FnMut(NodeId, bool) -> Result<WalkStatus, E>,
    {
        let status = f(id, true)?;
        if status == WalkStatus::Stop {
            return Ok(WalkStatus::Stop);
        }
        if status != WalkStatus::SkipChildren {
            for &child in self.children(id) {
                if self.walk(child, f)? == WalkStatus::Stop {
                    return Ok(WalkStatus::Stop);
                }
            }
        }
        f(id, false)
    }

    /// All nodes of the subtree rooted at `id`, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// First node in pre-order below (and including) `id` that satisfies `pred`.
    pub fn find(&self, id: NodeId, pred: impl Fn(&NodeKind) -> bool) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|n| pred(self.kind(*n)))
    }

    /// Visit every heading in document order, without descending into inlines.
    pub fn walk_headings(&self, mut visit: impl FnMut(NodeId)) {
        let _ = self.walk::<(), _>(self.root, &mut |id, entering| {
            if !entering {
                return Ok(WalkStatus::Continue);
            }
            let kind = self.kind(id).kind();
            if kind == Kind::Heading {
                visit(id);
                return Ok(WalkStatus::SkipChildren);
            }
            if kind.is_inline() {
                return Ok(WalkStatus::SkipChildren);
            }
            Ok(WalkStatus::Continue)
        });
    }

    /// Concatenated text of the inline content below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            match self.kind(node) {
                NodeKind::Text(t) => {
                    out.push_str(&t.value);
                    if t.soft_break || t.hard_break {
                        out.push(' ');
                    }
                }
                NodeKind::String(lit) if !lit.raw => out.push_str(&lit.value),
                NodeKind::InlineMath { tex, .. } => out.push_str(tex),
                _ => {}
            }
        }
        out
    }

    /// Split a `Text` node at byte `at`. The right half becomes a new sibling
    /// placed after `id` and inherits the line-break bits. Returns the right half.
    pub fn split_text(&mut self, id: NodeId, at: usize) -> Option<NodeId> {
        let (right_value, soft, hard) = match &mut self.nodes[id.0].kind {
            NodeKind::Text(t) if at <= t.value.len() && t.value.is_char_boundary(at) => {
                let right = t.value.split_off(at);
                let flags = (t.soft_break, t.hard_break);
                t.soft_break = false;
                t.hard_break = false;
                (right, flags.0, flags.1)
            }
            _ => return None,
        };

        let segment = self.nodes[id.0].segment.clone();
        let right = self.new_node(NodeKind::Text(Text {
            value: right_value,
            soft_break: soft,
            hard_break: hard,
        }));

        // Only byte-exact segments can be split; entity-decoded text keeps no segment.
        if let Some(seg) = segment {
            let left_len = at;
            let right_len = self.text_len(right);
            if seg.len() == left_len + right_len {
                self.nodes[id.0].segment = Some(seg.start..seg.start + left_len);
                self.nodes[right.0].segment = Some(seg.start + left_len..seg.end);
            } else {
                self.nodes[id.0].segment = None;
            }
        }

        self.insert_after(id, right);
        Some(right)
    }

    fn text_len(&self, id: NodeId) -> usize {
        match self.kind(id) {
            NodeKind::Text(t) => t.value.len(),
            _ => 0,
        }
    }

    /// Number of nodes ever allocated, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document root has no children.
    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph_with(ast: &mut Ast, words: &[&str]) -> NodeId {
        let p = ast.new_node(NodeKind::Paragraph);
        for w in words {
            let t = ast.new_text(*w);
            ast.append_child(p, t);
        }
        let root = ast.root();
        ast.append_child(root, p);
        p
    }

    #[test]
    fn test_insert_and_remove_children() {
        let mut ast = Ast::new();
        let p = paragraph_with(&mut ast, &["a", "c"]);
        let a = ast.children(p)[0];
        let c = ast.children(p)[1];

        let b = ast.new_text("b");
        ast.insert_after(a, b);
        assert_eq!(ast.children(p), &[a, b, c]);

        let z = ast.new_text("z");
        ast.insert_before(a, z);
        assert_eq!(ast.children(p), &[z, a, b, c]);

        ast.detach(b);
        assert_eq!(ast.children(p), &[z, a, c]);
        assert_eq!(ast.parent(b), None);

        ast.append_child(p, b);
        assert_eq!(ast.children(p), &[z, a, c, b]);
        assert_eq!(ast.next_sibling(c), Some(b));
        assert_eq!(ast.prev_sibling(a), Some(z));
    }

    #[test]
    fn test_node_count_includes_detached_nodes() {
        let mut ast = Ast::new();
        assert!(ast.is_empty());
        assert_eq!(ast.node_count(), 1);

        let p = paragraph_with(&mut ast, &["a"]);
        assert!(!ast.is_empty());
        assert_eq!(ast.node_count(), 3);

        ast.detach(p);
        assert!(ast.is_empty());
        assert_eq!(ast.node_count(), 3);
    }

    #[test]
    fn test_insert_before_sibling_of_same_parent() {
        let mut ast = Ast::new();
        let p = paragraph_with(&mut ast, &["a", "b", "c"]);
        let (a, c) = (ast.children(p)[0], ast.children(p)[2]);

        ast.insert_before(a, c);
        let texts: Vec<_> = ast
            .children(p)
            .iter()
            .map(|id| ast.text_content(*id))
            .collect();
        assert_eq!(texts, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_replace_moves_node() {
        let mut ast = Ast::new();
        let p = paragraph_with(&mut ast, &["old"]);
        let old = ast.children(p)[0];
        let new = ast.new_text("new");

        let returned = ast.replace(old, new);
        assert_eq!(returned, old);
        assert_eq!(ast.children(p), &[new]);
        assert_eq!(ast.parent(old), None);
        assert_eq!(ast.parent(new), Some(p));
    }

    #[test]
    fn test_deep_clone_copies_subtree_and_attrs() {
        let mut ast = Ast::new();
        let p = paragraph_with(&mut ast, &["x", "y"]);
        ast.attrs_mut(p).set("class", "lead");

        let copy = ast.deep_clone(p);
        assert_ne!(copy, p);
        assert_eq!(ast.parent(copy), None);
        assert_eq!(ast.text_content(copy), "xy");
        assert_eq!(ast.attrs(copy).get_str("class"), Some("lead"));

        // Mutating the copy leaves the original untouched.
        ast.attrs_mut(copy).set("class", "other");
        let first = ast.children(copy)[0];
        if let NodeKind::Text(t) = ast.kind_mut(first) {
            t.value = "changed".into();
        }
        assert_eq!(ast.attrs(p).get_str("class"), Some("lead"));
        assert_eq!(ast.text_content(p), "xy");
    }

    #[test]
    fn test_walk_skip_children_still_exits() {
        let mut ast = Ast::new();
        paragraph_with(&mut ast, &["a"]);
        let mut events = Vec::new();
        ast.walk::<(), _>(ast.root(), &mut |id, entering| {
            events.push((ast.kind(id).kind(), entering));
            if ast.kind(id).kind() == Kind::Paragraph {
                Ok(WalkStatus::SkipChildren)
            } else {
                Ok(WalkStatus::Continue)
            }
        })
        .unwrap();

        assert_eq!(
            events,
            vec![
                (Kind::Document, true),
                (Kind::Paragraph, true),
                (Kind::Paragraph, false),
                (Kind::Document, false),
            ]
        );
    }

    #[test]
    fn test_walk_stop() {
        let mut ast = Ast::new();
        paragraph_with(&mut ast, &["a", "b"]);
        let mut seen = 0;
        let status = ast
            .walk::<(), _>(ast.root(), &mut |id, entering| {
                if entering && matches!(ast.kind(id), NodeKind::Text(_)) {
                    seen += 1;
                    return Ok(WalkStatus::Stop);
                }
                Ok(WalkStatus::Continue)
            })
            .unwrap();
        assert_eq!(status, WalkStatus::Stop);
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_split_text_keeps_segments() {
        let mut ast = Ast::new();
        let p = paragraph_with(&mut ast, &["hello world"]);
        let t = ast.children(p)[0];
        ast.node_mut(t).segment = Some(10..21);
        if let NodeKind::Text(text) = ast.kind_mut(t) {
            text.soft_break = true;
        }

        let right = ast.split_text(t, 5).unwrap();
        assert_eq!(ast.text_content(t), "hello");
        assert_eq!(ast.node(t).segment, Some(10..15));
        assert_eq!(ast.node(right).segment, Some(15..21));
        match ast.kind(right) {
            NodeKind::Text(text) => {
                assert_eq!(text.value, " world");
                assert!(text.soft_break);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_attributes_replace_in_place() {
        let mut attrs = Attributes::default();
        attrs.set("a", "1");
        attrs.set("b", 2i64);
        attrs.set("a", "3");
        let names: Vec<_> = attrs.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
        assert_eq!(names, vec!["a=3", "b=2"]);
        assert_eq!(attrs.remove("a"), Some(AttrValue::Str("3".into())));
        assert!(!attrs.contains("a"));
    }
}
