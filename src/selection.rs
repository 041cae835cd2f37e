//! # Selection Module
//!
//! A DOM query/extract façade over the `scraper` crate, shaped for use
//! inside parse callbacks.
//!
//! ## Overview
//!
//! A `Selection` wraps a parsed HTML forest. Querying with a CSS selector
//! yields a new `Selection` whose roots are the matched elements;
//! iteration yields one singleton `Selection` per root, so callbacks can
//! walk match lists and keep drilling down. Extraction produces either
//! whitespace-normalised text (one string per root, descendant text in
//! document order) or attribute values (roots missing the attribute
//! contribute nothing).
//!
//! Each root is held as its serialized subtree and re-parsed on demand.
//! `scraper`'s element references borrow from their document, so holding
//! live references across an `await` in a callback is a non-starter; the
//! owned form keeps `Selection` freely `Send + Clone` at the cost of a
//! re-parse per query.

use scraper::{ElementRef, Html, Selector};
use tracing::trace;

use crate::error::ScrapexError;

/// A handle over a parsed HTML forest.
#[derive(Debug, Clone)]
pub struct Selection {
    roots: Vec<String>,
    document: bool,
}

impl Selection {
    /// Wraps a full HTML document as a single-root selection.
    pub fn parse(html: impl Into<String>) -> Self {
        Selection {
            roots: vec![html.into()],
            document: true,
        }
    }

    /// Filters the forest with a CSS selector, returning the matched
    /// elements as a new selection.
    pub fn select(&self, css: &str) -> Result<Selection, ScrapexError> {
        let selector =
            Selector::parse(css).map_err(|_| ScrapexError::InvalidSelector(css.to_string()))?;
        let mut matched = Vec::new();
        for tree in self.forest() {
            for element in tree.select(&selector) {
                matched.push(element.html());
            }
        }
        trace!(css, matches = matched.len(), "selection filtered");
        Ok(Selection {
            roots: matched,
            document: false,
        })
    }

    /// Extracts `"text"` or an attribute, mirroring the two arms of
    /// `extract_text` and `extract_attr`.
    pub fn extract(&self, attr: &str) -> Vec<String> {
        if attr == "text" {
            self.extract_text()
        } else {
            self.extract_attr(attr)
        }
    }

    /// Concatenates descendant text per root in document order, with all
    /// Unicode whitespace normalised: no leading or trailing whitespace,
    /// interior runs collapsed to a single space. One string per root.
    pub fn extract_text(&self) -> Vec<String> {
        self.forest()
            .iter()
            .map(|tree| {
                let raw: String = tree.root_element().text().collect();
                normalize_whitespace(&raw)
            })
            .collect()
    }

    /// Collects the value of `attr` from each root element; roots without
    /// the attribute contribute nothing.
    pub fn extract_attr(&self, attr: &str) -> Vec<String> {
        self.forest()
            .iter()
            .filter_map(|tree| {
                self.node_of(tree)
                    .and_then(|el| el.value().attr(attr))
                    .map(str::to_string)
            })
            .collect()
    }

    /// Yields one singleton selection per root.
    pub fn iter(&self) -> impl Iterator<Item = Selection> + '_ {
        self.roots.iter().map(|root| Selection {
            roots: vec![root.clone()],
            document: self.document,
        })
    }

    /// The number of roots in the forest.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether the forest is empty.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Membership test: does `css` match anywhere in this forest?
    pub fn matches(&self, css: &str) -> Result<bool, ScrapexError> {
        Ok(!self.select(css)?.is_empty())
    }

    fn forest(&self) -> Vec<Html> {
        self.roots
            .iter()
            .map(|root| {
                if self.document {
                    Html::parse_document(root)
                } else {
                    Html::parse_fragment(root)
                }
            })
            .collect()
    }

    // The element a root string denotes: the document root for whole
    // documents, the first element child of the fragment wrapper for
    // selected subtrees.
    fn node_of<'a>(&self, tree: &'a Html) -> Option<ElementRef<'a>> {
        if self.document {
            return Some(tree.root_element());
        }
        tree.root_element()
            .children()
            .find_map(ElementRef::wrap)
    }
}

fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
