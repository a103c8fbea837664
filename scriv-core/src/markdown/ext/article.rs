//! Document title and the `<article>` wrapper.
//!
//! The first heading names the post. [`Title`] records it; [`Article`]
//! replaces it with
//!
//! ```text
//! Article
//! ├── Header
//! │   ├── Time(meta.date)
//! │   └── Heading 1 .title
//! │       └── Link(meta.path) ── copy of the heading's inlines
//! └── everything that followed the heading
//! ```

use super::priority;
use crate::markdown::ast::{Ast, Kind, LinkData, NodeId, NodeKind, WalkStatus};
use crate::markdown::context::{ParseContext, Title as DocumentTitle};
use crate::markdown::render::{HtmlWriter, RenderResult};
use crate::markdown::{EngineBuilder, Extension, Transformer};

/// Records the first heading as the document title.
///
/// The heading is claimed before heading ids are assigned, so it never takes
/// an id away from a later heading with the same text.
pub struct Title;

impl Extension for Title {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .transformer(priority::TITLE_CLAIM, TitleClaimTransformer)
            .transformer(priority::TITLE, TitleTransformer);
    }
}

/// Wraps the document body in an article with a linked title header.
pub struct Article;

impl Extension for Article {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .transformer(priority::ARTICLE, ArticleTransformer)
            .renderer(Kind::Article, render_article)
            .renderer(Kind::Header, render_header)
            .renderer(Kind::Time, render_time);
    }
}

fn first_heading(ast: &Ast) -> Option<NodeId> {
    let mut first = None;
    ast.walk_headings(|id| {
        if first.is_none() {
            first = Some(id);
        }
    });
    first
}

/// Unicode superscript for the character after a `^`.
fn superscript(c: char) -> Option<char> {
    let sup = match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        'a' => 'ᵃ',
        'b' => 'ᵇ',
        'c' => 'ᶜ',
        'd' => 'ᵈ',
        'e' => 'ᵉ',
        'f' => 'ᶠ',
        'g' => 'ᵍ',
        'h' => 'ʰ',
        'i' => 'ⁱ',
        'j' => 'ʲ',
        'k' => 'ᵏ',
        'l' => 'ˡ',
        'm' => 'ᵐ',
        'n' => 'ⁿ',
        'o' => 'ᵒ',
        'p' => 'ᵖ',
        'r' => 'ʳ',
        's' => 'ˢ',
        't' => 'ᵗ',
        'u' => 'ᵘ',
        'v' => 'ᵛ',
        'w' => 'ʷ',
        'x' => 'ˣ',
        'y' => 'ʸ',
        'z' => 'ᶻ',
        _ => return None,
    };
    Some(sup)
}

/// Replace `^c` with the superscript of `c` where one exists.
/// Braced and multi-character exponents are left as written.
pub fn superscript_tex(tex: &str) -> String {
    let mut out = String::with_capacity(tex.len());
    let mut chars = tex.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '^' {
            if let Some(sup) = chars.peek().copied().and_then(superscript) {
                out.push(sup);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Plain-text title of a heading; inline math gets superscript exponents.
pub fn title_text(ast: &Ast, heading: NodeId) -> String {
    let mut out = String::new();
    for node in ast.descendants(heading) {
        match ast.kind(node) {
            NodeKind::Text(t) => {
                out.push_str(&t.value);
                if t.soft_break || t.hard_break {
                    out.push(' ');
                }
            }
            NodeKind::String(lit) if !lit.raw => out.push_str(&lit.value),
            NodeKind::InlineMath { tex, .. } => out.push_str(&superscript_tex(tex)),
            _ => {}
        }
    }
    out.trim().to_string()
}

struct TitleClaimTransformer;

impl Transformer for TitleClaimTransformer {
    fn name(&self) -> &'static str {
        "title-claim"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, ctx: &mut ParseContext) {
        ctx.title = first_heading(ast).map(|node| DocumentTitle {
            text: title_text(ast, node),
            node,
        });
    }
}

struct TitleTransformer;

impl Transformer for TitleTransformer {
    fn name(&self) -> &'static str {
        "title"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, ctx: &mut ParseContext) {
        if let Some(heading) = first_heading(ast) {
            let text = title_text(ast, heading);
            ctx.meta.title = text.clone();
            ctx.title = Some(DocumentTitle { text, node: heading });
        }
    }
}

struct ArticleTransformer;

impl Transformer for ArticleTransformer {
    fn name(&self) -> &'static str {
        "article"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, ctx: &mut ParseContext) {
        let title = match &ctx.title {
            Some(title) => title.clone(),
            None => match first_heading(ast) {
                Some(node) => DocumentTitle {
                    text: title_text(ast, node),
                    node,
                },
                None => return,
            },
        };
        let heading = title.node;
        let Some(parent) = ast.parent(heading) else {
            return;
        };

        let article = ast.new_node(NodeKind::Article);
        let header = ast.new_node(NodeKind::Header);
        let time = ast.new_node(NodeKind::Time { date: ctx.meta.date });
        let title_heading = ast.new_node(NodeKind::Heading { level: 1 });
        ast.attrs_mut(title_heading).set("class", "title");
        let link = ast.new_node(NodeKind::Link(LinkData {
            destination: ctx.meta.path.clone(),
            title: title.text.clone(),
        }));

        for child in ast.children(heading).to_vec() {
            let copy = ast.deep_clone(child);
            ast.append_child(link, copy);
        }
        ast.append_child(title_heading, link);
        ast.append_child(header, time);
        ast.append_child(header, title_heading);
        ast.append_child(article, header);

        let following: Vec<NodeId> = ast
            .children(parent)
            .iter()
            .skip_while(|c| **c != heading)
            .skip(1)
            .copied()
            .collect();
        for node in following {
            ast.append_child(article, node);
        }
        let segment = ast.node(heading).segment.clone();
        ast.replace(heading, article);
        ast.node_mut(article).segment = segment;
    }
}

fn render_article(w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, entering: bool) -> RenderResult {
    w.write_str(if entering { "<article>\n" } else { "</article>\n" })?;
    Ok(WalkStatus::Continue)
}

fn render_header(w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, entering: bool) -> RenderResult {
    w.write_str(if entering { "<header>\n" } else { "</header>\n" })?;
    Ok(WalkStatus::Continue)
}

fn render_time(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    if let (true, NodeKind::Time { date: Some(date) }) = (entering, ast.kind(id)) {
        w.write_str(&format!(
            "<time datetime=\"{}\">{}</time>\n",
            date.format("%Y-%m-%d"),
            date.format("%B %-d, %Y")
        ))?;
    }
    Ok(WalkStatus::SkipChildren)
}
