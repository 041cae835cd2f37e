//! # WebScraper Module
//!
//! A declarative parse strategy: sitemap documents in the browser
//! extension's JSON shape, interpreted by a spider that drives the
//! engine's nested-request machinery to realise parent→child scraping.
//!
//! ## Key Components
//!
//! - **Sitemap**: the `{startUrl, selectors}` document and its validation
//! - **WebScraperSpider**: the interpreter; plug it into an
//!   `EngineBuilder` with the sitemap's start URLs as seeds

mod interpreter;
mod sitemap;

pub use interpreter::WebScraperSpider;
pub use sitemap::{Rule, RuleKind, Sitemap, StartUrl, ROOT_ID};
