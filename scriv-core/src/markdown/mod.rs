//! Extensible markdown engine: parse, transform, render.
//!
//! An [`Engine`] is assembled from [`Extension`]s. Each extension registers
//! any mix of block parsers, inline parsers, AST transformers and node
//! renderers, every one with an integer priority (lower runs earlier). The
//! tables are sorted once when the engine is built; equal priorities keep
//! registration order.

pub mod ast;
pub mod block;
pub mod context;
pub mod ext;
pub mod inline;
pub mod render;

#[cfg(test)]
mod test_integration;

use ast::{Ast, Kind};
use block::{BlockParser, BlockParserTable, BlockScanner};
use context::ParseContext;
use inline::{InlineParser, InlineParserTable};
use pulldown_cmark::Options;
use render::{RenderError, RenderFn, Renderer};
use std::io::Write;
use tracing::debug;

pub use ast::{NodeId, NodeKind, WalkStatus};
pub use render::{HeadingAnchors, RenderOptions};

/// A pass rewriting the tree between parsing and rendering.
///
/// Transformers report problems by recording diagnostics on the context.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    fn transform(&self, ast: &mut Ast, source: &str, ctx: &mut ParseContext);
}

/// A bundle of parsers, transformers and renderers.
pub trait Extension {
    fn extend(&self, builder: &mut EngineBuilder);
}

pub struct EngineBuilder {
    options: Options,
    render_options: RenderOptions,
    block_parsers: Vec<(i32, Box<dyn BlockParser>)>,
    inline_parsers: Vec<(i32, Box<dyn InlineParser>)>,
    transformers: Vec<(i32, Box<dyn Transformer>)>,
    renderers: Vec<(Kind, RenderFn)>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options.insert(Options::ENABLE_MATH);

        Self {
            options,
            render_options: RenderOptions::default(),
            block_parsers: Vec::new(),
            inline_parsers: Vec::new(),
            transformers: Vec::new(),
            renderers: Vec::new(),
        }
    }

    pub fn render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn extension(mut self, extension: impl Extension) -> Self {
        extension.extend(&mut self);
        self
    }

    pub fn block_parser(&mut self, priority: i32, parser: impl BlockParser + 'static) -> &mut Self {
        self.block_parsers.push((priority, Box::new(parser)));
        self
    }

    pub fn inline_parser(&mut self, priority: i32, parser: impl InlineParser + 'static) -> &mut Self {
        self.inline_parsers.push((priority, Box::new(parser)));
        self
    }

    pub fn transformer(&mut self, priority: i32, transformer: impl Transformer + 'static) -> &mut Self {
        self.transformers.push((priority, Box::new(transformer)));
        self
    }

    /// Register a render function; later registrations for a kind win.
    pub fn renderer(&mut self, kind: Kind, f: RenderFn) -> &mut Self {
        self.renderers.push((kind, f));
        self
    }

    pub fn build(self) -> Engine {
        let mut block_parsers = self.block_parsers;
        let mut inline_parsers = self.inline_parsers;
        let mut transformers = self.transformers;
        // sort_by_key is stable, so ties keep registration order.
        block_parsers.sort_by_key(|(p, _)| *p);
        inline_parsers.sort_by_key(|(p, _)| *p);
        transformers.sort_by_key(|(p, _)| *p);

        let mut renderer = Renderer::new(self.render_options);
        for (kind, f) in self.renderers {
            renderer.register(kind, f);
        }

        Engine {
            options: self.options,
            block_parsers: BlockParserTable::new(block_parsers.into_iter().map(|(_, p)| p).collect()),
            inline_parsers: InlineParserTable::new(inline_parsers.into_iter().map(|(_, p)| p).collect()),
            transformers: transformers.into_iter().map(|(_, t)| t).collect(),
            renderer,
        }
    }
}

/// Markdown engine with a fixed set of extensions.
pub struct Engine {
    options: Options,
    block_parsers: BlockParserTable,
    inline_parsers: InlineParserTable,
    transformers: Vec<Box<dyn Transformer>>,
    renderer: Renderer,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Plain CommonMark plus tables, strikethrough, heading attributes and math.
    pub fn commonmark() -> Self {
        EngineBuilder::new().build()
    }

    /// Engine for full post pages. The `CONTINUE_READING` marker is dropped.
    pub fn detail(options: RenderOptions) -> Self {
        Self::blog(options)
            .extension(ext::ContinueReadingNop)
            .build()
    }

    /// Engine for index excerpts. Posts are cut at the marker or second paragraph.
    pub fn index(options: RenderOptions) -> Self {
        Self::blog(options)
            .extension(ext::ContinueReading)
            .build()
    }

    fn blog(options: RenderOptions) -> EngineBuilder {
        let toc_depth = options.toc_depth;
        EngineBuilder::new()
            .render_options(options)
            .extension(ext::FrontMatter)
            .extension(ext::ColonBlocks)
            .extension(ext::Katex)
            .extension(ext::HeadingIds)
            .extension(ext::Title)
            .extension(ext::Article)
            .extension(ext::Links)
            .extension(ext::Citations::default())
            .extension(ext::Figures)
            .extension(ext::TableOfContents::new(toc_depth))
            .extension(ext::SmallCaps)
            .extension(ext::Typography)
            .extension(ext::Footnotes)
    }

    /// Parse `source` into a tree: block structure first, then inline parsers.
    pub fn parse(&self, source: &str, ctx: &mut ParseContext) -> Ast {
        let mut ast = Ast::new();
        let root = ast.root();
        let references = block::collect_reference_definitions(source, self.options);
        let lines = block::split_lines(source);

        let scanner = BlockScanner {
            parsers: &self.block_parsers,
            options: self.options,
            references: &references,
        };
        scanner.parse(&mut ast, root, source, &lines, ctx);
        inline::parse_inlines(&mut ast, root, &self.inline_parsers);
        ast
    }

    /// Run every transformer in priority order.
    pub fn transform(&self, ast: &mut Ast, source: &str, ctx: &mut ParseContext) {
        for transformer in &self.transformers {
            debug!(transformer = transformer.name(), "running transform");
            transformer.transform(ast, source, ctx);
        }
    }

    pub fn render(&self, ast: &Ast, ctx: &ParseContext, out: &mut dyn Write) -> Result<(), RenderError> {
        self.renderer.render(ast, ctx, out)
    }

    pub fn render_to_string(&self, ast: &Ast, ctx: &ParseContext) -> Result<String, RenderError> {
        self.renderer.render_to_string(ast, ctx)
    }

    /// Parse, transform and render in one go.
    pub fn convert(&self, source: &str, ctx: &mut ParseContext) -> Result<String, RenderError> {
        let mut ast = self.parse(source, ctx);
        self.transform(&mut ast, source, ctx);
        self.render_to_string(&ast, ctx)
    }

    pub fn transformer_names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    pub fn block_parser_names(&self) -> Vec<&'static str> {
        self.block_parsers.names()
    }

    pub fn inline_parser_names(&self) -> Vec<&'static str> {
        self.inline_parsers.names()
    }

    pub fn render_options(&self) -> &RenderOptions {
        self.renderer.options()
    }

    pub(crate) fn inline_parsers(&self) -> &InlineParserTable {
        &self.inline_parsers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Transformer for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn transform(&self, _ast: &mut Ast, _source: &str, _ctx: &mut ParseContext) {}
    }

    #[test]
    fn test_transformers_sorted_stably() {
        let mut builder = Engine::builder();
        builder
            .transformer(900, Named("article"))
            .transformer(600, Named("heading-id"))
            .transformer(900, Named("link-decoration"))
            .transformer(1200, Named("katex"));
        let engine = builder.build();
        assert_eq!(
            engine.transformer_names(),
            vec!["heading-id", "article", "link-decoration", "katex"]
        );
    }

    #[test]
    fn test_detail_preset_order() {
        let engine = Engine::detail(RenderOptions::default());
        assert_eq!(
            engine.transformer_names(),
            vec![
                "heading-id",
                "title",
                "article",
                "link-decoration",
                "link-asset",
                "citation",
                "image",
                "figure",
                "toc",
                "continue-reading-nop",
                "footnote-order",
                "katex-feature",
            ]
        );
        assert_eq!(
            engine.block_parser_names(),
            vec!["toml", "colon-block", "colon-line", "katex-block", "continue-reading"]
        );
        assert_eq!(engine.inline_parser_names(), vec!["small-caps", "typography"]);
    }

    #[test]
    fn test_commonmark_convert() {
        let engine = Engine::commonmark();
        let mut ctx = ParseContext::new();
        let html = engine.convert("# Hi\n\n*a* **b** ~~c~~\n", &mut ctx).unwrap();
        assert_eq!(
            html,
            "<h1>Hi</h1>\n<p><em>a</em> <strong>b</strong> <del>c</del></p>\n"
        );
    }
}
