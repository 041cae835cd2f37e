//! The sitemap interpreter: a spider that realises parent→child scraping
//! by recursive descent over the rule tree.
//!
//! ## Algorithm
//!
//! Parsing a page evaluates the rules under the current parent id (the
//! pseudo-id `_root` for a page's top level) in declaration order. Each
//! rule selects nodes in the current scope (all of them when `multiple`,
//! only the first otherwise) and contributes a list of partial rows.
//! Sibling rules are folded together with a row-expanding cross-product
//! in which an empty side acts as the identity, so a missing sub-selector
//! prunes only its own column rather than the whole row set.
//!
//! `SelectorLink` rules with children fetch the joined link target
//! through a nested request, awaited synchronously on the calling request
//! task, and cross the child rows into the link's own pair. This is the
//! piece that exercises the engine's nested-request support.
//!
//! One deliberate deviation from the upstream browser extension:
//! `SelectorGroup` emits the whole value list as a single record instead
//! of expanding to one row per value.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{trace, warn};
use url::Url;

use crate::error::ScrapexError;
use crate::request::RequestContext;
use crate::response::Response;
use crate::selection::Selection;
use crate::spider::{ParseValue, Spider};
use crate::webscraper::sitemap::{Rule, RuleKind, Sitemap, ROOT_ID};

/// One partial record: record keys contributed so far along a branch.
type Row = Map<String, Value>;

/// A spider interpreting a WebScraper sitemap.
pub struct WebScraperSpider {
    sitemap: Sitemap,
    // Compiled non-empty `regex` fields, keyed by rule id.
    regexes: HashMap<String, Regex>,
}

impl WebScraperSpider {
    /// Builds the interpreter, compiling every non-empty rule regex.
    pub fn new(sitemap: Sitemap) -> Result<Self, ScrapexError> {
        let mut regexes = HashMap::new();
        for rule in &sitemap.selectors {
            if let Some(pattern) = rule.regex.as_deref().filter(|p| !p.is_empty()) {
                let compiled = Regex::new(pattern).map_err(|e| {
                    ScrapexError::InvalidSitemap(format!(
                        "rule {:?} has an invalid regex: {}",
                        rule.id, e
                    ))
                })?;
                regexes.insert(rule.id.clone(), compiled);
            }
        }
        Ok(WebScraperSpider { sitemap, regexes })
    }

    /// The sitemap's start URLs, ready for `SpiderOptions::urls`.
    pub fn start_urls(&self) -> Vec<String> {
        self.sitemap.start_url.to_vec()
    }

    fn apply_regex(&self, rule_id: &str, text: String) -> String {
        let Some(regex) = self.regexes.get(rule_id) else {
            return text;
        };
        match regex.captures(&text) {
            Some(caps) => caps
                .get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            None => String::new(),
        }
    }
}

/// Pairwise left-join over sibling rule outputs: every left row merged
/// with every right row, with an empty side acting as the identity.
fn combine(left: Vec<Row>, right: Vec<Row>) -> Vec<Row> {
    if left.is_empty() {
        return right;
    }
    if right.is_empty() {
        return left;
    }
    let mut out = Vec::with_capacity(left.len() * right.len());
    for l in &left {
        for r in &right {
            let mut merged = l.clone();
            merged.extend(r.clone());
            out.push(merged);
        }
    }
    out
}

/// Evaluates the rules under `parent` against `scope`, returning the
/// cross-product of their rows. `response` supplies the base for link
/// joining at this level.
fn parse_branch(
    spider: Arc<WebScraperSpider>,
    response: Arc<Response>,
    scope: Selection,
    parent: String,
    ctx: RequestContext,
) -> BoxFuture<'static, Result<Vec<Row>, ScrapexError>> {
    Box::pin(async move {
        let rules: Vec<Rule> = spider
            .sitemap
            .children_of(&parent)
            .into_iter()
            .cloned()
            .collect();
        let mut level_rows: Vec<Row> = Vec::new();

        for rule in rules {
            let selected = scope.select(&rule.selector)?;
            trace!(rule = %rule.id, matches = selected.len(), "rule evaluated");
            let rule_rows = evaluate_rule(
                Arc::clone(&spider),
                Arc::clone(&response),
                &rule,
                selected,
                ctx.clone(),
            )
            .await?;
            level_rows = combine(level_rows, rule_rows);
        }

        Ok(level_rows)
    })
}

async fn evaluate_rule(
    spider: Arc<WebScraperSpider>,
    response: Arc<Response>,
    rule: &Rule,
    selected: Selection,
    ctx: RequestContext,
) -> Result<Vec<Row>, ScrapexError> {
    // Groups consume the whole selection as one value list.
    if rule.kind == RuleKind::SelectorGroup {
        let values: Vec<Value> = match rule.extract_attribute.as_deref() {
            Some(attr) => selected.extract_attr(attr),
            None => selected.extract_text(),
        }
        .into_iter()
        .map(Value::String)
        .collect();
        let mut row = Row::new();
        row.insert(rule.id.clone(), Value::Array(values));
        return Ok(vec![row]);
    }

    let mut nodes: Vec<Selection> = selected.iter().collect();
    if !rule.multiple {
        nodes.truncate(1);
    }

    let mut rows: Vec<Row> = Vec::new();
    for node in nodes {
        match rule.kind {
            RuleKind::SelectorText => {
                let text = node.extract_text().into_iter().next().unwrap_or_default();
                let mut row = Row::new();
                row.insert(rule.id.clone(), Value::String(spider.apply_regex(&rule.id, text)));
                rows.push(row);
            }
            RuleKind::SelectorElementAttribute => {
                let attr = rule.extract_attribute.as_deref().unwrap_or_default();
                if let Some(value) = node.extract_attr(attr).into_iter().next() {
                    let mut row = Row::new();
                    row.insert(rule.id.clone(), Value::String(value));
                    rows.push(row);
                }
            }
            RuleKind::SelectorElement => {
                let subtree_rows = parse_branch(
                    Arc::clone(&spider),
                    Arc::clone(&response),
                    node,
                    rule.id.clone(),
                    ctx.clone(),
                )
                .await?;
                rows.extend(subtree_rows);
            }
            RuleKind::SelectorLink => {
                let link_rows = evaluate_link(
                    Arc::clone(&spider),
                    Arc::clone(&response),
                    rule,
                    node,
                    ctx.clone(),
                )
                .await?;
                rows.extend(link_rows);
            }
            RuleKind::SelectorGroup => unreachable!("groups handled above"),
        }
    }
    Ok(rows)
}

/// A link rule's contribution for one anchor node: the `{id, text}` and
/// `{id-href, joined}` pair, crossed with the child rows fetched from the
/// link target when the rule has children.
async fn evaluate_link(
    spider: Arc<WebScraperSpider>,
    response: Arc<Response>,
    rule: &Rule,
    node: Selection,
    ctx: RequestContext,
) -> Result<Vec<Row>, ScrapexError> {
    let text = node.extract_text().into_iter().next().unwrap_or_default();
    let mut pair = Row::new();
    pair.insert(rule.id.clone(), Value::String(text));

    let Some(href) = node.extract_attr("href").into_iter().next() else {
        return Ok(vec![pair]);
    };
    let joined = response.url_join(&href);
    pair.insert(format!("{}-href", rule.id), Value::String(joined.clone()));

    if !spider.sitemap.has_children(&rule.id) {
        return Ok(vec![pair]);
    }

    let target = match Url::parse(&joined) {
        Ok(target) => target,
        Err(e) => {
            warn!(rule = %rule.id, url = %joined, error = %e, "unfollowable link target");
            return Ok(vec![pair]);
        }
    };

    let child_spider = Arc::clone(&spider);
    let rule_id = rule.id.clone();
    let handle = ctx.request(target, move |child_response, ctx| async move {
        let scope = Selection::parse(&child_response.body);
        let rows = parse_branch(
            child_spider,
            Arc::new(child_response),
            scope,
            rule_id,
            ctx,
        )
        .await?;
        Ok(ParseValue::Records(
            rows.into_iter().map(Value::Object).collect(),
        ))
    });

    let child_rows = match handle.await_result().await {
        Ok(ParseValue::Records(records)) => records
            .into_iter()
            .filter_map(|record| match record {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            warn!(rule = %rule.id, url = %joined, error = %e, "link target fetch failed, dropping its columns");
            Vec::new()
        }
    };

    Ok(combine(vec![pair], child_rows))
}

#[async_trait]
impl Spider for WebScraperSpider {
    async fn parse(
        self: Arc<Self>,
        response: Response,
        ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        let scope = Selection::parse(&response.body);
        let rows = parse_branch(
            Arc::clone(&self),
            Arc::new(response),
            scope,
            ROOT_ID.to_string(),
            ctx,
        )
        .await?;
        Ok(ParseValue::Records(
            rows.into_iter().map(Value::Object).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn combine_is_identity_on_empty_sides() {
        let rows = vec![row(&[("a", "1")]), row(&[("a", "2")])];
        assert_eq!(combine(rows.clone(), Vec::new()), rows);
        assert_eq!(combine(Vec::new(), rows.clone()), rows);
    }

    #[test]
    fn combine_crosses_every_pair() {
        let left = vec![row(&[("a", "1")]), row(&[("a", "2")])];
        let right = vec![row(&[("b", "x")])];
        let out = combine(left, right);
        assert_eq!(
            out,
            vec![row(&[("a", "1"), ("b", "x")]), row(&[("a", "2"), ("b", "x")])]
        );
    }

    #[test]
    fn combine_distributes_over_concatenation() {
        let l1 = vec![row(&[("a", "1")])];
        let l2 = vec![row(&[("a", "2")])];
        let r = vec![row(&[("b", "x")]), row(&[("b", "y")])];

        let mut concat_first = Vec::new();
        concat_first.extend(l1.clone());
        concat_first.extend(l2.clone());
        let combined = combine(concat_first, r.clone());

        let mut piecewise = combine(l1, r.clone());
        piecewise.extend(combine(l2, r));

        assert_eq!(combined, piecewise);
    }

    fn spider_with_regex(regex: Option<&str>) -> WebScraperSpider {
        let sitemap = Sitemap::from_json(&format!(
            r#"{{
                "startUrl": "http://localhost:9090/",
                "selectors": [
                    {{"id": "price", "type": "SelectorText", "selector": ".price",
                      "parents": ["_root"]{}}}
                ]
            }}"#,
            regex
                .map(|r| format!(", \"regex\": {}", json!(r)))
                .unwrap_or_default()
        ))
        .unwrap();
        WebScraperSpider::new(sitemap).unwrap()
    }

    #[test]
    fn regex_takes_the_first_captured_group() {
        let spider = spider_with_regex(Some(r"\$(\d+\.\d{2})"));
        assert_eq!(
            spider.apply_regex("price", "price: $19.99 only".to_string()),
            "19.99"
        );
    }

    #[test]
    fn regex_without_groups_takes_the_whole_match() {
        let spider = spider_with_regex(Some(r"\d+"));
        assert_eq!(spider.apply_regex("price", "abc 42 def".to_string()), "42");
    }

    #[test]
    fn regex_without_a_match_yields_empty() {
        let spider = spider_with_regex(Some(r"\d+"));
        assert_eq!(spider.apply_regex("price", "no digits".to_string()), "");
    }

    #[test]
    fn absent_regex_passes_text_through() {
        let spider = spider_with_regex(None);
        assert_eq!(
            spider.apply_regex("price", "kept as-is".to_string()),
            "kept as-is"
        );
    }

    #[test]
    fn invalid_regex_fails_construction() {
        let sitemap = Sitemap::from_json(
            r#"{
                "startUrl": "http://localhost:9090/",
                "selectors": [
                    {"id": "t", "type": "SelectorText", "selector": "h1",
                     "parents": ["_root"], "regex": "("}
                ]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            WebScraperSpider::new(sitemap),
            Err(ScrapexError::InvalidSitemap(_))
        ));
    }
}
