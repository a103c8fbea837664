//! HTML rendering.
//!
//! The renderer walks the tree and dispatches on the node kind to a render
//! function, called once on entering and once on exiting each node. The
//! defaults produce CommonMark HTML; extensions register functions for their
//! own kinds or override the defaults.

use super::ast::{Alignment, Ast, Attributes, AutoLinkKind, Kind, NodeId, NodeKind, WalkStatus};
use super::context::ParseContext;
use std::collections::HashMap;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to write HTML: {0}")]
    Io(#[from] io::Error),

    #[error("Rendered HTML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type RenderResult = Result<WalkStatus, RenderError>;

/// Render function for one node kind: `(writer, tree, node, entering)`.
pub type RenderFn = fn(&mut HtmlWriter<'_>, &Ast, NodeId, bool) -> RenderResult;

/// Whether headings carry a `¶` self-link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeadingAnchors {
    #[default]
    Hidden,
    Shown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub heading_anchors: HeadingAnchors,
    /// Deepest heading level listed by `:toc:`.
    pub toc_depth: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            heading_anchors: HeadingAnchors::Hidden,
            toc_depth: 3,
        }
    }
}

/// Output sink handed to render functions.
pub struct HtmlWriter<'a> {
    out: &'a mut dyn Write,
    pub ctx: &'a ParseContext,
    renderer: &'a Renderer,
}

impl HtmlWriter<'_> {
    pub fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.out.write_all(s.as_bytes())
    }

    pub fn write_escaped(&mut self, s: &str) -> io::Result<()> {
        self.write_str(&escape_html(s))
    }

    /// ` name="value"` with the value escaped.
    pub fn write_attr(&mut self, name: &str, value: &str) -> io::Result<()> {
        write!(self.out, " {}=\"{}\"", name, escape_html(value))
    }

    /// Every attribute of `attrs` except those named in `skip`.
    pub fn write_attrs(&mut self, attrs: &Attributes, skip: &[&str]) -> io::Result<()> {
        for (name, value) in attrs.iter() {
            if skip.contains(&name) {
                continue;
            }
            self.write_attr(name, &value.to_string())?;
        }
        Ok(())
    }

    pub fn options(&self) -> &RenderOptions {
        &self.renderer.options
    }

    /// Render the children of `id` into a fresh string with the active renderer.
    pub fn render_children(&self, ast: &Ast, id: NodeId) -> Result<String, RenderError> {
        let mut buf = Vec::new();
        for &child in ast.children(id) {
            self.renderer.render_node(ast, child, self.ctx, &mut buf)?;
        }
        Ok(String::from_utf8(buf)?)
    }
}

pub struct Renderer {
    table: HashMap<Kind, RenderFn>,
    options: RenderOptions,
}

impl Renderer {
    /// A renderer with the CommonMark defaults registered.
    pub fn new(options: RenderOptions) -> Self {
        let mut renderer = Self {
            table: HashMap::new(),
            options,
        };
        renderer.register_defaults();
        renderer
    }

    /// Register `f` for `kind`, replacing any previous function.
    pub fn register(&mut self, kind: Kind, f: RenderFn) {
        self.table.insert(kind, f);
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn render(&self, ast: &Ast, ctx: &ParseContext, out: &mut dyn Write) -> Result<(), RenderError> {
        self.render_node(ast, ast.root(), ctx, out)
    }

    pub fn render_node(
        &self,
        ast: &Ast,
        id: NodeId,
        ctx: &ParseContext,
        out: &mut dyn Write,
    ) -> Result<(), RenderError> {
        let mut writer = HtmlWriter {
            out,
            ctx,
            renderer: self,
        };
        ast.walk(id, &mut |node, entering| match self.table.get(&ast.kind(node).kind()) {
            Some(f) => f(&mut writer, ast, node, entering),
            None => Ok(WalkStatus::Continue),
        })?;
        Ok(())
    }

    pub fn render_to_string(&self, ast: &Ast, ctx: &ParseContext) -> Result<String, RenderError> {
        let mut buf = Vec::new();
        self.render(ast, ctx, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    fn register_defaults(&mut self) {
        self.register(Kind::Paragraph, render_paragraph);
        self.register(Kind::Heading, render_heading);
        self.register(Kind::List, render_list);
        self.register(Kind::ListItem, render_list_item);
        self.register(Kind::Blockquote, render_blockquote);
        self.register(Kind::FencedCodeBlock, render_code_block);
        self.register(Kind::CodeBlock, render_code_block);
        self.register(Kind::ThematicBreak, render_thematic_break);
        self.register(Kind::Table, render_table);
        self.register(Kind::TableHead, render_table_head);
        self.register(Kind::TableRow, render_table_row);
        self.register(Kind::TableCell, render_table_cell);
        self.register(Kind::FrontMatter, render_front_matter);
        self.register(Kind::DisplayMath, render_math);
        self.register(Kind::InlineMath, render_math);
        self.register(Kind::Text, render_text);
        self.register(Kind::String, render_string);
        self.register(Kind::CodeSpan, render_code_span);
        self.register(Kind::Emphasis, render_emphasis);
        self.register(Kind::Strikethrough, render_strikethrough);
        self.register(Kind::Link, render_link);
        self.register(Kind::Image, render_image);
        self.register(Kind::AutoLink, render_autolink);
        self.register(Kind::RawHtml, render_raw_html);
        self.register(Kind::CustomInline, render_custom_inline);
    }
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode a link destination. Existing escapes are kept.
pub fn escape_url(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        let safe = b.is_ascii_alphanumeric()
            || matches!(
                b,
                b'-' | b'_' | b'.' | b'~' | b'!' | b'*' | b'\'' | b'(' | b')' | b';' | b':' | b'@'
                    | b'&' | b'=' | b'+' | b'$' | b',' | b'/' | b'?' | b'#' | b'[' | b']' | b'%'
            );
        if safe {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn tag(w: &mut HtmlWriter<'_>, entering: bool, name: &str) -> RenderResult {
    if entering {
        w.write_str(&format!("<{}>", name))?;
    } else {
        w.write_str(&format!("</{}>", name))?;
    }
    Ok(WalkStatus::Continue)
}

fn render_paragraph(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let name = ast.attrs(id).get_str("custom-tag").unwrap_or("p");
    if entering {
        w.write_str(&format!("<{}>", name))?;
    } else {
        w.write_str(&format!("</{}>\n", name))?;
    }
    Ok(WalkStatus::Continue)
}

fn render_heading(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let NodeKind::Heading { level } = ast.kind(id) else {
        return Ok(WalkStatus::Continue);
    };
    let attrs = ast.attrs(id);
    let anchor = attrs.get_str("id").filter(|a| !a.is_empty());
    if entering {
        w.write_str(&format!("<h{}", level))?;
        if let Some(anchor) = anchor {
            w.write_attr("id", anchor)?;
        }
        w.write_attrs(attrs, &["id"])?;
        w.write_str(">")?;
    } else {
        if let (Some(anchor), HeadingAnchors::Shown) = (anchor, w.options().heading_anchors) {
            w.write_str(&format!(
                "<a class=\"heading-anchor\" href=\"#{}\">¶</a>",
                escape_html(anchor)
            ))?;
        }
        w.write_str(&format!("</h{}>\n", level))?;
    }
    Ok(WalkStatus::Continue)
}

fn render_list(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let NodeKind::List { start, .. } = ast.kind(id) else {
        return Ok(WalkStatus::Continue);
    };
    match (start, entering) {
        (Some(1), true) => w.write_str("<ol>\n")?,
        (Some(n), true) => w.write_str(&format!("<ol start=\"{}\">\n", n))?,
        (Some(_), false) => w.write_str("</ol>\n")?,
        (None, true) => w.write_str("<ul>\n")?,
        (None, false) => w.write_str("</ul>\n")?,
    }
    Ok(WalkStatus::Continue)
}

fn render_list_item(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if entering {
        w.write_str("<li>")?;
        let starts_with_block = ast
            .first_child(id)
            .map(|c| !ast.kind(c).kind().is_inline())
            .unwrap_or(false);
        if starts_with_block {
            w.write_str("\n")?;
        }
    } else {
        w.write_str("</li>\n")?;
    }
    Ok(WalkStatus::Continue)
}

fn render_blockquote(w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, entering: bool) -> RenderResult {
    w.write_str(if entering { "<blockquote>\n" } else { "</blockquote>\n" })?;
    Ok(WalkStatus::Continue)
}

fn render_code_block(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if !entering {
        return Ok(WalkStatus::Continue);
    }
    let lang = match ast.kind(id) {
        NodeKind::FencedCodeBlock { info } => info.split_whitespace().next(),
        _ => None,
    };
    match lang {
        Some(lang) => w.write_str(&format!(
            "<pre><code class=\"language-{}\">",
            escape_html(lang)
        ))?,
        None => w.write_str("<pre><code>")?,
    }
    for &child in ast.children(id) {
        if let NodeKind::String(lit) = ast.kind(child) {
            w.write_escaped(&lit.value)?;
        }
    }
    w.write_str("</code></pre>\n")?;
    Ok(WalkStatus::SkipChildren)
}

fn render_thematic_break(w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, entering: bool) -> RenderResult {
    if entering {
        w.write_str("<hr />\n")?;
    }
    Ok(WalkStatus::Continue)
}

fn render_table(w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, entering: bool) -> RenderResult {
    w.write_str(if entering { "<table>\n" } else { "</table>\n" })?;
    Ok(WalkStatus::Continue)
}

fn render_table_head(w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, entering: bool) -> RenderResult {
    w.write_str(if entering { "<thead>\n<tr>\n" } else { "</tr>\n</thead>\n" })?;
    Ok(WalkStatus::Continue)
}

fn render_table_row(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let is_row = |n: Option<NodeId>| n.map(|n| matches!(ast.kind(n), NodeKind::TableRow)).unwrap_or(false);
    if entering {
        if !is_row(ast.prev_sibling(id)) {
            w.write_str("<tbody>\n")?;
        }
        w.write_str("<tr>\n")?;
    } else {
        w.write_str("</tr>\n")?;
        if !is_row(ast.next_sibling(id)) {
            w.write_str("</tbody>\n")?;
        }
    }
    Ok(WalkStatus::Continue)
}

fn render_table_cell(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let NodeKind::TableCell { alignment, header } = ast.kind(id) else {
        return Ok(WalkStatus::Continue);
    };
    let name = if *header { "th" } else { "td" };
    if entering {
        w.write_str(&format!("<{}", name))?;
        let align = match alignment {
            Alignment::None => None,
            Alignment::Left => Some("left"),
            Alignment::Center => Some("center"),
            Alignment::Right => Some("right"),
        };
        if let Some(align) = align {
            w.write_attr("style", &format!("text-align: {}", align))?;
        }
        w.write_str(">")?;
    } else {
        w.write_str(&format!("</{}>\n", name))?;
    }
    Ok(WalkStatus::Continue)
}

fn render_front_matter(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if entering {
        w.write_str("<pre class=\"front-matter\"><code>")?;
        w.write_escaped(&ast.text_content(id))?;
        w.write_str("</code></pre>\n")?;
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_math(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if !entering {
        return Ok(WalkStatus::Continue);
    }
    match ast.kind(id) {
        NodeKind::DisplayMath { tex } => {
            w.write_str("<div class=\"math math-display\">")?;
            w.write_escaped(tex)?;
            w.write_str("</div>\n")?;
        }
        NodeKind::InlineMath { tex, display } => {
            let class = if *display { "math math-display" } else { "math math-inline" };
            w.write_str(&format!("<span class=\"{}\">", class))?;
            w.write_escaped(tex)?;
            w.write_str("</span>")?;
        }
        _ => {}
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_text(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if let (true, NodeKind::Text(t)) = (entering, ast.kind(id)) {
        w.write_escaped(&t.value)?;
        if t.hard_break {
            w.write_str("<br />\n")?;
        } else if t.soft_break {
            w.write_str("\n")?;
        }
    }
    Ok(WalkStatus::Continue)
}

fn render_string(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if let (true, NodeKind::String(lit)) = (entering, ast.kind(id)) {
        if lit.raw {
            w.write_str(&lit.value)?;
        } else {
            w.write_escaped(&lit.value)?;
        }
    }
    Ok(WalkStatus::Continue)
}

fn render_code_span(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if entering {
        w.write_str("<code>")?;
        w.write_escaped(&ast.text_content(id))?;
        w.write_str("</code>")?;
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_emphasis(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let name = match ast.kind(id) {
        NodeKind::Emphasis { level: 2 } => "strong",
        _ => "em",
    };
    tag(w, entering, name)
}

fn render_strikethrough(w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, entering: bool) -> RenderResult {
    tag(w, entering, "del")
}

fn render_link(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let NodeKind::Link(link) = ast.kind(id) else {
        return Ok(WalkStatus::Continue);
    };
    if !entering {
        w.write_str("</a>")?;
        return Ok(WalkStatus::Continue);
    }
    w.write_str("<a")?;
    w.write_attr("href", &escape_url(&link.destination))?;
    if !link.title.is_empty() {
        w.write_attr("title", &link.title)?;
    }
    w.write_attrs(ast.attrs(id), &[])?;
    if let Some(&preview) = w.ctx.previews.get(&link.destination) {
        let html = w.render_children(ast, preview)?;
        w.write_attr("data-preview-html", html.trim_end())?;
    }
    w.write_str(">")?;
    Ok(WalkStatus::Continue)
}

fn render_image(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let NodeKind::Image(image) = ast.kind(id) else {
        return Ok(WalkStatus::Continue);
    };
    if entering {
        w.write_str("<img")?;
        w.write_attr("src", &escape_url(&image.destination))?;
        w.write_attr("alt", &ast.text_content(id))?;
        if !image.title.is_empty() {
            w.write_attr("title", &image.title)?;
        }
        w.write_str(" />")?;
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_autolink(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let NodeKind::AutoLink { kind, .. } = ast.kind(id) else {
        return Ok(WalkStatus::Continue);
    };
    if entering {
        let text = ast.text_content(id);
        let href = match kind {
            AutoLinkKind::Email if !text.starts_with("mailto:") => format!("mailto:{}", text),
            _ => text,
        };
        w.write_str("<a")?;
        w.write_attr("href", &escape_url(&href))?;
        w.write_str(">")?;
    } else {
        w.write_str("</a>")?;
    }
    Ok(WalkStatus::Continue)
}

fn render_raw_html(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if let (true, NodeKind::RawHtml { html }) = (entering, ast.kind(id)) {
        w.write_str(html)?;
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_custom_inline(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    match ast.kind(id) {
        NodeKind::CustomInline { tag: name } => tag(w, entering, name),
        _ => Ok(WalkStatus::Continue),
    }
}
