//! `+++` TOML front-matter block.

use super::priority;
use crate::frontmatter::{decode_meta, DELIMITER};
use crate::markdown::ast::{Ast, Literal, NodeId, NodeKind};
use crate::markdown::block::{BlockLines, BlockParser, BlockState, Continuation, Line};
use crate::markdown::context::ParseContext;
use crate::markdown::{EngineBuilder, Extension};
use crate::models::Diagnostic;

/// Decodes the front-matter into [`ParseContext::meta`].
pub struct FrontMatter;

impl Extension for FrontMatter {
    fn extend(&self, builder: &mut EngineBuilder) {
        builder.block_parser(priority::TOML_BLOCK, TomlBlockParser);
    }
}

struct TomlBlockParser;

impl BlockParser for TomlBlockParser {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn trigger(&self) -> &'static [u8] {
        b"+"
    }

    fn open(&self, line: &Line<'_>, _ctx: &mut ParseContext) -> Option<(NodeKind, BlockState)> {
        if line.number == 1 && line.text.trim_end() == DELIMITER {
            Some((NodeKind::FrontMatter, BlockState::Continue))
        } else {
            None
        }
    }

    fn continue_line(&self, line: &Line<'_>, _nesting: &mut usize) -> Continuation {
        if line.text.trim_end() == DELIMITER {
            Continuation::Close
        } else {
            Continuation::Continue
        }
    }

    fn close(&self, ast: &mut Ast, node: NodeId, block: &BlockLines<'_, '_>, ctx: &mut ParseContext) {
        let body = block.body_text();

        if !block.has_closer {
            ctx.add_error(Diagnostic::error(
                "frontmatter.unclosed",
                "Front-matter block is missing its closing `+++` line",
            ));
            keep_block(ast, node, body);
            return;
        }

        match decode_meta(&body) {
            Ok(meta) => {
                ctx.meta = meta;
                ast.detach(node);
            }
            Err(err) => {
                ctx.add_error(Diagnostic::error("frontmatter.invalid", err.to_string()));
                keep_block(ast, node, body);
            }
        }
    }
}

fn keep_block(ast: &mut Ast, node: NodeId, body: String) {
    let text = ast.new_node(NodeKind::String(Literal {
        value: body,
        raw: false,
        code: true,
    }));
    ast.append_child(node, text);
}
