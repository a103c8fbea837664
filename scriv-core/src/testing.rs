//! HTML comparison helpers for tests.
//!
//! Rendered HTML is parsed with html5ever and written back out with
//! whitespace-only text dropped, whitespace runs collapsed (outside `<pre>`),
//! comments removed and attributes sorted. Two fragments that differ only in
//! formatting normalize to the same string.

use html5ever::serialize::{SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, serialize, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::io;

fn is_element(handle: &Handle, tag: &str) -> bool {
    matches!(&handle.data, NodeData::Element { name, .. } if &*name.local == tag)
}

fn find_body(handle: &Handle) -> Option<Handle> {
    if is_element(handle, "body") {
        return Some(handle.clone());
    }
    handle.children.borrow().iter().find_map(find_body)
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn normalize_node(handle: &Handle, preformatted: bool) {
    if let NodeData::Element { attrs, .. } = &handle.data {
        attrs.borrow_mut().sort_by(|a, b| {
            (&*a.name.ns, &*a.name.local, &*a.value).cmp(&(&*b.name.ns, &*b.name.local, &*b.value))
        });
    }

    handle.children.borrow_mut().retain(|child| match &child.data {
        NodeData::Text { contents } => preformatted || !contents.borrow().trim().is_empty(),
        NodeData::Comment { .. } => false,
        _ => true,
    });

    let preformatted = preformatted || is_element(handle, "pre");
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } if !preformatted => {
                let collapsed = collapse_whitespace(&contents.borrow());
                *contents.borrow_mut() = collapsed.into();
            }
            NodeData::Element { .. } => normalize_node(child, preformatted),
            _ => {}
        }
    }
}

/// Canonical serialization of an HTML fragment.
pub fn normalize_html(html: &str) -> io::Result<String> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
    let Some(body) = find_body(&dom.document) else {
        return Ok(String::new());
    };
    normalize_node(&body, false);

    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    let mut out = Vec::new();
    for child in body.children.borrow().iter() {
        let handle = SerializableHandle::from(child.clone());
        serialize(&mut out, &handle, opts.clone())?;
    }
    String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Tag names of all elements inside `<body>`, in document order.
pub fn element_names(html: &str) -> Vec<String> {
    fn collect(handle: &Handle, out: &mut Vec<String>) {
        for child in handle.children.borrow().iter() {
            if let NodeData::Element { name, .. } = &child.data {
                out.push(name.local.to_string());
            }
            collect(child, out);
        }
    }

    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
    let mut out = Vec::new();
    if let Some(body) = find_body(&dom.document) {
        collect(&body, &mut out);
    }
    out
}

/// Assert that two HTML fragments are equal after normalization.
#[track_caller]
pub fn assert_html_eq(actual: &str, expected: &str) {
    match (normalize_html(actual), normalize_html(expected)) {
        (Ok(a), Ok(e)) => assert_eq!(a, e, "\nactual HTML:\n{}\n", actual),
        (a, e) => panic!("could not normalize HTML: {:?} / {:?}", a.err(), e.err()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting_is_ignored() {
        assert_html_eq(
            "<p>a  <em>b</em></p>\n\n<div   id=\"x\" class=\"y\">\n<hr />\n</div>\n",
            "<p>a <em>b</em></p><div class=\"y\" id=\"x\"><hr></div>",
        );
    }

    #[test]
    fn test_pre_keeps_whitespace() {
        let html = normalize_html("<pre><code>a\n  b\n</code></pre>").unwrap();
        assert_eq!(html, "<pre><code>a\n  b\n</code></pre>");
    }

    #[test]
    fn test_comments_are_dropped() {
        assert_eq!(normalize_html("<p>x<!-- hi --></p>").unwrap(), "<p>x</p>");
    }

    #[test]
    fn test_element_names() {
        assert_eq!(
            element_names("<h1>a</h1><p>b <em>c</em></p>"),
            vec!["h1", "p", "em"]
        );
    }

    #[test]
    #[should_panic]
    fn test_different_text_fails() {
        assert_html_eq("<p>a</p>", "<p>b</p>");
    }
}
