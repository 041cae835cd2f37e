//! # Spider Module
//!
//! Defines the core `Spider` trait: the pluggable parse strategy that the
//! engine drives through the crawl lifecycle.
//!
//! ## Overview
//!
//! A spider supplies four hooks, three of them defaulted:
//!
//! - `init` runs once at startup and can accept, delay, refuse, or ignore
//!   the start request.
//! - `start_requests` turns the seed list into request handles; the
//!   default maps `make_request_from_url` over the seeds.
//! - `make_request_from_url` issues one request whose callback is the
//!   spider's own `parse`.
//! - `parse` transforms a response into a `ParseValue`, and may spawn
//!   and synchronously await further requests through the context while
//!   doing so.
//!
//! Spiders take `self: Arc<Self>` so the same instance can be shared by
//! many concurrent request tasks. State that mutates across crawls
//! belongs in the spider behind interior mutability (atomics, `DashMap`),
//! never behind a lock held across an await.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scrapex::{async_trait, ParseValue, RequestContext, Response, ScrapexError, Spider};
//!
//! struct TitleSpider;
//!
//! #[async_trait]
//! impl Spider for TitleSpider {
//!     async fn parse(
//!         self: Arc<Self>,
//!         response: Response,
//!         _ctx: RequestContext,
//!     ) -> Result<ParseValue, ScrapexError> {
//!         let titles = scrapex::Selection::parse(&response.body)
//!             .select("title")?
//!             .extract_text();
//!         Ok(ParseValue::Records(titles.into_iter().map(Into::into).collect()))
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::ScrapexError;
use crate::request::{RequestContext, RequestHandle};
use crate::response::Response;

/// One scraped record. Records are string-keyed maps or arbitrary values;
/// the engine never inspects them beyond concatenation and encoding.
pub type Record = serde_json::Value;

/// What a parse callback hands back to its awaiting owner.
#[derive(Debug)]
pub enum ParseValue {
    /// The finished record list for this fetch.
    Records(Vec<Record>),
    /// Continue with a single follow-up request; its awaited value is the
    /// completion.
    Follow(RequestHandle),
    /// Continue with several follow-up requests, awaited in list order
    /// and concatenated.
    FollowMany(Vec<RequestHandle>),
    /// Ask the engine to terminate with a normal exit.
    Stop(String),
}

/// The spider's verdict on being started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Init {
    /// Start, with the first crawl scheduled immediately.
    Ready,
    /// Start, with the first crawl delayed.
    After(Duration),
    /// Do not start; the caller receives no engine.
    Ignore,
    /// Fail startup with a reason.
    Stop(String),
}

/// Defines the contract for a spider driven by the engine.
#[async_trait]
pub trait Spider: Send + Sync + 'static {
    /// Startup hook. The default accepts and schedules an immediate
    /// first crawl.
    async fn init(self: Arc<Self>) -> Init {
        Init::Ready
    }

    /// Produces the top-level requests for one crawl tick.
    ///
    /// The default maps `make_request_from_url` over the seeds in order.
    async fn start_requests(
        self: Arc<Self>,
        seeds: Vec<Url>,
        ctx: RequestContext,
    ) -> Vec<RequestHandle> {
        seeds
            .into_iter()
            .map(|url| Arc::clone(&self).make_request_from_url(url, ctx.clone()))
            .collect()
    }

    /// Issues one request for `url` whose callback is this spider's
    /// `parse`.
    fn make_request_from_url(self: Arc<Self>, url: Url, ctx: RequestContext) -> RequestHandle {
        ctx.request(url, move |response, ctx| async move {
            self.parse(response, ctx).await
        })
    }

    /// Transforms a response into records, follow-up requests, or a stop
    /// request. Runs on the request task, so it may spawn and await
    /// nested requests through `ctx` without blocking the engine.
    async fn parse(
        self: Arc<Self>,
        response: Response,
        ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError>;
}
