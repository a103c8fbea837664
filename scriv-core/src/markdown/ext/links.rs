//! Link annotation and relative link assets.

use super::{asset_url, priority, relative_destination};
use crate::markdown::ast::{Ast, NodeKind};
use crate::markdown::context::ParseContext;
use crate::markdown::{EngineBuilder, Extension, Transformer};
use crate::models::Asset;
use url::Url;

pub struct Links;

impl Extension for Links {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder
            .transformer(priority::LINK_DECORATION, LinkDecorationTransformer)
            .transformer(priority::LINK_ASSET, LinkAssetTransformer);
    }
}

type Decoder = fn(&str) -> bool;

/// `data-link-type` values, first match wins.
const DECODERS: &[(&str, Decoder)] = &[("pdf", is_pdf), ("wikipedia", is_wikipedia)];

fn path_of(dest: &str) -> String {
    match Url::parse(dest) {
        Ok(url) => url.path().to_string(),
        Err(_) => dest.split(['?', '#']).next().unwrap_or(dest).to_string(),
    }
}

fn is_pdf(dest: &str) -> bool {
    path_of(dest).to_ascii_lowercase().ends_with(".pdf")
}

fn is_wikipedia(dest: &str) -> bool {
    Url::parse(dest)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.to_ascii_lowercase()))
        .map(|host| host == "wikipedia.org" || host.ends_with(".wikipedia.org"))
        .unwrap_or(false)
}

/// Link type for `dest`, if any decoder recognizes it.
pub fn link_type(dest: &str) -> Option<&'static str> {
    DECODERS
        .iter()
        .find(|(_, matches)| matches(dest))
        .map(|(name, _)| *name)
}

struct LinkDecorationTransformer;

impl Transformer for LinkDecorationTransformer {
    fn name(&self) -> &'static str {
        "link-decoration"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, _ctx: &mut ParseContext) {
        for id in ast.descendants(ast.root()) {
            let kind = match ast.kind(id) {
                NodeKind::Link(link) => link_type(&link.destination),
                NodeKind::Citation(_) => Some("citation"),
                _ => None,
            };
            if let Some(kind) = kind {
                ast.attrs_mut(id).set("data-link-type", kind);
            }
        }
    }
}

struct LinkAssetTransformer;

impl Transformer for LinkAssetTransformer {
    fn name(&self) -> &'static str {
        "link-asset"
    }

    fn transform(&self, ast: &mut Ast, _source: &str, ctx: &mut ParseContext) {
        for id in ast.descendants(ast.root()) {
            let NodeKind::Link(link) = ast.kind(id) else {
                continue;
            };
            let Some(rel) = relative_destination(&link.destination) else {
                continue;
            };
            let url = asset_url(&ctx.meta.path, &rel);
            ctx.add_asset(Asset {
                url: url.clone(),
                source: ctx.source_dir().join(&rel),
                generator: None,
            });
            if let NodeKind::Link(link) = ast.kind_mut(id) {
                link.destination = url;
            }
        }
    }
}
