//! # Builder Module
//!
//! Provides `EngineBuilder`, a fluent API for configuring and starting
//! engines.
//!
//! ## Overview
//!
//! The builder assembles the spider, its options, and an optional custom
//! fetcher, validates the configuration, and starts the runtime. It is
//! the recommended entry point; `Engine::start` remains available for
//! callers that already hold a `SpiderOptions`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use scrapex::EngineBuilder;
//!
//! let engine = EngineBuilder::new(MySpider)
//!     .url("http://localhost:9090/example.com.html")
//!     .interval(Duration::from_millis(500))
//!     .name("example")
//!     .start()
//!     .await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::ScrapexError;
use crate::fetcher::Fetcher;
use crate::options::SpiderOptions;
use crate::spider::Spider;

/// Fluent configuration for starting an `Engine`.
pub struct EngineBuilder<S: Spider> {
    spider: S,
    options: SpiderOptions,
    fetcher: Option<Arc<dyn Fetcher>>,
}

impl<S: Spider> EngineBuilder<S> {
    /// Creates a builder around a spider with default options.
    pub fn new(spider: S) -> Self {
        EngineBuilder {
            spider,
            options: SpiderOptions::default(),
            fetcher: None,
        }
    }

    /// Appends one seed URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.options.urls.push(url.into());
        self
    }

    /// Replaces the seed list.
    pub fn urls<I, T>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.options.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Registers the engine under `name` for later `Engine::lookup`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    /// Schedules a re-crawl `interval` after each crawl settles.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.options.interval = Some(interval);
        self
    }

    /// Bounds the spider's `init` hook.
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Replaces the whole option set.
    pub fn options(mut self, options: SpiderOptions) -> Self {
        self.options = options;
        self
    }

    /// Substitutes a custom fetch capability (the test suite's hook).
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Validates the configuration and starts the engine.
    pub async fn start(self) -> Result<Engine, ScrapexError> {
        self.options.validate()?;
        match self.fetcher {
            Some(fetcher) => Engine::start_with_fetcher(self.spider, self.options, fetcher).await,
            None => Engine::start(self.spider, self.options).await,
        }
    }
}
