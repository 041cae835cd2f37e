//! Sitemap documents: the declarative configuration of a WebScraper run.
//!
//! A sitemap is a JSON document with a `startUrl` (string or array) and a
//! flat list of typed selector rules. Rules reference their parents by id
//! (`parentSelectors` in the browser-extension format; the shorter
//! `parents` is accepted too), forming a DAG rooted at the pseudo-id
//! `_root`. The tree is read-only after load; validation happens once,
//! up front.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScrapexError;

/// The pseudo parent id of top-level rules.
pub const ROOT_ID: &str = "_root";

/// A declarative scraping configuration: start URL(s) plus a rule tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sitemap {
    /// Seed page(s) the crawl starts from.
    #[serde(rename = "startUrl")]
    pub start_url: StartUrl,
    /// The flat rule list; parent ids give it its tree shape.
    pub selectors: Vec<Rule>,
    /// Optional sitemap identifier carried by exported sitemaps.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// `startUrl` accepts a single URL or an array of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartUrl {
    One(String),
    Many(Vec<String>),
}

impl StartUrl {
    /// The start URLs in declaration order.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            StartUrl::One(url) => vec![url.clone()],
            StartUrl::Many(urls) => urls.clone(),
        }
    }
}

/// One extraction rule of a sitemap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// The record key this rule contributes.
    pub id: String,
    /// The rule's behaviour.
    #[serde(rename = "type")]
    pub kind: RuleKind,
    /// CSS selector applied to the current scope.
    pub selector: String,
    /// Take every match (`true`) or only the first (`false`).
    #[serde(default)]
    pub multiple: bool,
    /// Ids of the rules (or `_root`) this rule evaluates under.
    #[serde(rename = "parentSelectors", alias = "parents")]
    pub parents: Vec<String>,
    /// Attribute name for `SelectorElementAttribute`.
    #[serde(
        rename = "extractAttribute",
        alias = "extract_attribute",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extract_attribute: Option<String>,
    /// Optional capture pattern for `SelectorText` values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

/// The typed behaviours a rule can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleKind {
    /// Emit the node's normalised text.
    SelectorText,
    /// Emit the anchor text plus an `<id>-href` joined link; follow the
    /// link when child rules exist.
    SelectorLink,
    /// Contribute no value; recurse into the element's subtree.
    SelectorElement,
    /// Emit one attribute of the node.
    SelectorElementAttribute,
    /// Emit all matched values as a single list-valued record.
    SelectorGroup,
}

impl Sitemap {
    /// Parses and validates a sitemap from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, ScrapexError> {
        let sitemap: Sitemap =
            serde_json::from_str(json).map_err(|e| ScrapexError::InvalidSitemap(e.to_string()))?;
        sitemap.validate()?;
        Ok(sitemap)
    }

    /// Reads, parses, and validates a sitemap file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScrapexError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ScrapexError::InvalidSitemap(format!("reading sitemap: {}", e)))?;
        Sitemap::from_json(&json)
    }

    /// The rules evaluating under `parent`, in declaration order.
    pub fn children_of(&self, parent: &str) -> Vec<&Rule> {
        self.selectors
            .iter()
            .filter(|rule| rule.parents.iter().any(|p| p == parent))
            .collect()
    }

    /// Whether any rule names `id` as a parent.
    pub fn has_children(&self, id: &str) -> bool {
        self.selectors
            .iter()
            .any(|rule| rule.parents.iter().any(|p| p == id))
    }

    fn validate(&self) -> Result<(), ScrapexError> {
        if self.start_url.to_vec().is_empty() {
            return Err(ScrapexError::InvalidSitemap(
                "startUrl must name at least one URL".to_string(),
            ));
        }

        let ids: HashSet<&str> = self.selectors.iter().map(|rule| rule.id.as_str()).collect();
        for rule in &self.selectors {
            if rule.id.is_empty() {
                return Err(ScrapexError::InvalidSitemap(
                    "rule ids must not be empty".to_string(),
                ));
            }
            if rule.parents.is_empty() {
                return Err(ScrapexError::InvalidSitemap(format!(
                    "rule {:?} has no parent; use {:?} for top-level rules",
                    rule.id, ROOT_ID
                )));
            }
            for parent in &rule.parents {
                if parent != ROOT_ID && !ids.contains(parent.as_str()) {
                    return Err(ScrapexError::InvalidSitemap(format!(
                        "rule {:?} references unknown parent {:?}",
                        rule.id, parent
                    )));
                }
            }
            if rule.kind == RuleKind::SelectorElementAttribute
                && rule.extract_attribute.as_deref().unwrap_or("").is_empty()
            {
                return Err(ScrapexError::InvalidSitemap(format!(
                    "rule {:?} needs extractAttribute",
                    rule.id
                )));
            }
        }

        self.check_acyclic()
    }

    // The parent relation must be a DAG; a cycle would make the
    // interpreter recurse forever.
    fn check_acyclic(&self) -> Result<(), ScrapexError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            id: &str,
            children: &HashMap<&str, Vec<&str>>,
            marks: &mut HashMap<String, Mark>,
        ) -> Result<(), ScrapexError> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(ScrapexError::InvalidSitemap(format!(
                        "rule {:?} participates in a parent cycle",
                        id
                    )))
                }
                None => {}
            }
            marks.insert(id.to_string(), Mark::Visiting);
            for child in children.get(id).into_iter().flatten() {
                visit(child, children, marks)?;
            }
            marks.insert(id.to_string(), Mark::Done);
            Ok(())
        }

        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for rule in &self.selectors {
            for parent in &rule.parents {
                children
                    .entry(parent.as_str())
                    .or_default()
                    .push(rule.id.as_str());
            }
        }

        let mut marks = HashMap::new();
        for rule in &self.selectors {
            visit(rule.id.as_str(), &children, &mut marks)?;
        }
        Ok(())
    }
}
