//! Image assets and `<figure>` promotion.

use super::{asset_url, join_url, priority, relative_destination};
use crate::markdown::ast::{Ast, Figure, Kind, NodeId, NodeKind, WalkStatus};
use crate::markdown::context::ParseContext;
use crate::markdown::render::{escape_url, HtmlWriter, RenderResult};
use crate::markdown::{EngineBuilder, Extension, Transformer};
use crate::models::Asset;

/// Prefix that turns the paragraph after a figure into its caption.
pub const CAPTION_MARKER: &str = "CAPTION:";

pub struct Figures;

impl Extension for Figures {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .transformer(priority::IMAGE, ImageTransformer)
            .transformer(priority::FIGURE, FigureTransformer)
            .renderer(Kind::Figure, render_figure)
            .renderer(Kind::FigCaption, render_figcaption);
    }
}

/// Records relative images as assets and rewrites their `src` below the post.
struct ImageTransformer;

impl Transformer for ImageTransformer {
    fn name(&self) -> &'static str {
        "image"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, ctx: &mut ParseContext) {
        for id in ast.descendants(ast.root()) {
            let NodeKind::Image(image) = ast.kind(id) else {
                continue;
            };
            let Some(rel) = relative_destination(&image.destination) else {
                continue;
            };
            ctx.add_asset(Asset {
                url: asset_url(&ctx.meta.path, &rel),
                source: ctx.source_dir().join(&rel),
                generator: None,
            });
            let src = join_url(&ctx.meta.path, &rel);
            if let NodeKind::Image(image) = ast.kind_mut(id) {
                image.destination = src;
            }
        }
    }
}

fn single_image(ast: &Ast, paragraph: NodeId) -> Option<NodeId> {
    match ast.children(paragraph) {
        [only] if matches!(ast.kind(*only), NodeKind::Image(_)) => Some(*only),
        _ => None,
    }
}

/// Strip the caption marker from the start of `paragraph`, if present.
/// The marker may have been split by inline parsers (`CAPTION` reads as an
/// acronym), so whole leading nodes are consumed until it is gone.
fn strip_caption_marker(ast: &mut Ast, paragraph: NodeId) -> bool {
    if !ast.text_content(paragraph).starts_with(CAPTION_MARKER) {
        return false;
    }
    let mut remaining = CAPTION_MARKER.len();
    while remaining > 0 {
        let Some(first) = ast.first_child(paragraph) else {
            break;
        };
        if let NodeKind::Text(text) = ast.kind_mut(first) {
            let cut = remaining.min(text.value.len());
            text.value.drain(..cut);
            remaining -= cut;
        } else {
            remaining = remaining.saturating_sub(ast.text_content(first).len());
            ast.detach(first);
            continue;
        }
        ast.node_mut(first).segment = None;
        if is_blank_text(ast, first) {
            ast.detach(first);
        }
    }
    if let Some(first) = ast.first_child(paragraph) {
        if let NodeKind::Text(text) = ast.kind_mut(first) {
            text.value = text.value.trim_start().to_string();
        }
        if is_blank_text(ast, first) {
            ast.detach(first);
        }
    }
    true
}

fn is_blank_text(ast: &Ast, id: NodeId) -> bool {
    matches!(ast.kind(id), NodeKind::Text(t) if t.value.is_empty() && !t.soft_break && !t.hard_break)
}

struct FigureTransformer;

impl Transformer for FigureTransformer {
    fn name(&self) -> &'static str {
        "figure"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, _ctx: &mut ParseContext) {
        let paragraphs: Vec<NodeId> = ast
            .descendants(ast.root())
            .into_iter()
            .filter(|id| matches!(ast.kind(*id), NodeKind::Paragraph))
            .collect();

        for paragraph in paragraphs {
            let Some(image) = single_image(ast, paragraph) else {
                continue;
            };
            let NodeKind::Image(link) = ast.kind(image) else {
                continue;
            };
            let figure = Figure {
                destination: link.destination.clone(),
                title: link.title.clone(),
                alt: ast.text_content(image),
            };
            let node = ast.new_node(NodeKind::Figure(figure));
            let segment = ast.node(paragraph).segment.clone();
            ast.replace(paragraph, node);
            ast.node_mut(node).segment = segment;

            let Some(next) = ast.next_sibling(node) else {
                continue;
            };
            if !matches!(ast.kind(next), NodeKind::Paragraph) || !strip_caption_marker(ast, next) {
                continue;
            }
            let caption = ast.new_node(NodeKind::FigCaption);
            for child in ast.take_children(next) {
                ast.append_child(caption, child);
            }
            ast.detach(next);
            ast.append_child(node, caption);
        }
    }
}

fn render_figure(w: &mut HtmlWriter<'_>, ast: &Ast, id: NodeId, entering: bool) -> RenderResult {
    let NodeKind::Figure(figure) = ast.kind(id) else {
        return Ok(WalkStatus::Continue);
    };
    if !entering {
        w.write_str("</figure>\n")?;
        return Ok(WalkStatus::Continue);
    }
    w.write_str("<figure")?;
    w.write_attrs(ast.attrs(id), &[])?;
    w.write_str("><picture><img")?;
    w.write_attr("src", &escape_url(&figure.destination))?;
    if !figure.title.is_empty() {
        w.write_attr("title", &figure.title)?;
    }
    w.write_attr("alt", &figure.alt)?;
    w.write_str(" loading=\"lazy\"></picture>")?;
    Ok(WalkStatus::Continue)
}

fn render_figcaption(w: &mut HtmlWriter<'_>, _ast: &Ast, _id: NodeId, entering: bool) -> RenderResult {
    w.write_str(if entering { "<figcaption>" } else { "</figcaption>" })?;
    Ok(WalkStatus::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::Engine;
    use std::path::PathBuf;

    fn convert(source: &str, ctx: &mut ParseContext) -> String {
        Engine::builder()
            .extension(Figures)
            .build()
            .convert(source, ctx)
            .unwrap()
    }

    #[test]
    fn test_caption_promotion() {
        let mut ctx = ParseContext::for_file("posts/hello/index.md");
        let html = convert("![alt](./x.png \"t\")\n\nCAPTION: hi *there*\n", &mut ctx);
        assert_eq!(
            html,
            "<figure><picture><img src=\"x.png\" title=\"t\" alt=\"alt\" loading=\"lazy\"></picture>\
             <figcaption>hi <em>there</em></figcaption></figure>\n"
        );
        assert_eq!(ctx.assets().len(), 1);
        assert_eq!(ctx.assets()[0].url, "/x.png");
        assert_eq!(ctx.assets()[0].source, PathBuf::from("posts/hello/x.png"));
    }

    #[test]
    fn test_src_is_rewritten_below_post_path() {
        let mut ctx = ParseContext::new();
        ctx.meta.path = "/a_slug".into();
        let html = convert("![a *b*](img/x.png)\n", &mut ctx);
        assert_eq!(
            html,
            "<figure><picture><img src=\"/a_slug/img/x.png\" alt=\"a b\" loading=\"lazy\"></picture></figure>\n"
        );
        assert_eq!(ctx.assets()[0].url, "/a_slug/img/x.png");
    }

    #[test]
    fn test_marker_split_by_small_caps() {
        let engine = Engine::builder()
            .extension(crate::markdown::ext::SmallCaps)
            .extension(Figures)
            .build();
        let mut ctx = ParseContext::new();
        let html = engine
            .convert("![a](/a.png)\n\nCAPTION: the NASA logo\n", &mut ctx)
            .unwrap();
        assert!(html.ends_with(
            "<figcaption>the <span class=\"small-caps\">NASA</span> logo</figcaption></figure>\n"
        ));
    }

    #[test]
    fn test_inline_images_stay_inline() {
        let mut ctx = ParseContext::new();
        let html = convert("see ![i](https://x.org/i.png) here\n\nCAPTION: not a caption\n", &mut ctx);
        assert_eq!(
            html,
            "<p>see <img src=\"https://x.org/i.png\" alt=\"i\" /> here</p>\n<p>CAPTION: not a caption</p>\n"
        );
        assert!(ctx.assets().is_empty());
    }

    #[test]
    fn test_figure_without_caption_keeps_following_paragraph() {
        let mut ctx = ParseContext::new();
        let ast = {
            let engine = Engine::builder().extension(Figures).build();
            let source = "![x](/abs.png)\n\nbody\n";
            let mut ast = engine.parse(source, &mut ctx);
            engine.transform(&mut ast, source, &mut ctx);
            ast
        };
        let kinds: Vec<_> = ast
            .children(ast.root())
            .iter()
            .map(|c| ast.kind(*c).kind())
            .collect();
        assert_eq!(kinds, vec![Kind::Figure, Kind::Paragraph]);
        let figure = ast.first_child(ast.root()).unwrap();
        assert!(ast.children(figure).is_empty());
    }
}
