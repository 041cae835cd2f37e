//! # scrapex
//!
//! A generic web-scraping engine organised around a reusable spider
//! runtime.
//!
//! Supply seed URLs, a parse callback, and optional refresh settings; the
//! engine fetches each seed, invokes the callback to turn the response
//! into records, merges per-seed results into an ordered, keyed result
//! table with replace-on-refresh semantics, and serves blocking exports
//! that wait for pending work to settle. Parse callbacks may spawn and
//! synchronously await further requests from inside the handler, which is
//! how the bundled `WebScraperSpider` realises parent→child scraping from
//! declarative sitemap documents.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scrapex::{async_trait, EngineBuilder, ParseValue, RequestContext, Response,
//!               ScrapexError, Selection, Spider};
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
//!         let titles = Selection::parse(&response.body).select("title")?.extract_text();
//!         Ok(ParseValue::Records(titles.into_iter().map(Into::into).collect()))
//!     }
//! }
//!
//! async fn run() -> Result<(), ScrapexError> {
//!     let engine = EngineBuilder::new(TitleSpider)
//!         .url("http://localhost:9090/example.com.html")
//!         .start()
//!         .await?;
//!     let records = engine.export().await?;
//!     println!("{:?}", records);
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod options;
pub mod prelude;
pub mod request;
pub mod response;
pub mod selection;
pub mod spider;
pub mod stats;
pub mod webscraper;

pub use builder::EngineBuilder;
pub use engine::{Encoder, Engine, ExportFormat, Exported};
pub use error::ScrapexError;
pub use fetcher::{Fetcher, HttpFetcher};
pub use options::SpiderOptions;
pub use request::{RequestContext, RequestHandle, DEFAULT_AWAIT_TIMEOUT};
pub use response::Response;
pub use selection::Selection;
pub use spider::{Init, ParseValue, Record, Spider};
pub use stats::EngineStats;
pub use webscraper::{Sitemap, WebScraperSpider};

pub use async_trait::async_trait;
pub use tokio;
