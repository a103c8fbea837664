//! # scriv-render
//!
//! Page templates and the two site compilers.
//!
//! [`compile_details`] writes one page per post under `<output>/<slug>/`;
//! [`compile_index`] writes the front page listing published posts.

pub mod compile;
pub mod templates;

pub use compile::{
    check_posts, compile_details, compile_index, render_post, report_diagnostics, CompileError,
    CompileReport, RenderedPost,
};
pub use templates::{IndexEntry, IndexTemplate, PostTemplate, SiteInfo};
