//! # Options Module
//!
//! Configuration recognised by the engine at start time.
//!
//! The seed list is ordered and keyed by URL: supplying the same URL
//! twice yields one result slot (first position wins). `interval`
//! schedules a re-crawl that many milliseconds after the *last*
//! completion of the previous crawl; `None` means one-shot. `timeout`
//! bounds the spider's `init` hook.

use std::time::Duration;

use url::Url;

use crate::error::ScrapexError;

/// Default budget for the spider's `init` hook.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Engine start-time configuration.
#[derive(Debug, Clone)]
pub struct SpiderOptions {
    /// Optional registration name for later `Engine::lookup`.
    pub name: Option<String>,
    /// Ordered seed URLs; one result slot each.
    pub urls: Vec<String>,
    /// Re-crawl interval, armed after the previous crawl fully settles.
    pub interval: Option<Duration>,
    /// Budget for the spider's `init` hook.
    pub timeout: Duration,
}

impl Default for SpiderOptions {
    fn default() -> Self {
        SpiderOptions {
            name: None,
            urls: Vec::new(),
            interval: None,
            timeout: DEFAULT_INIT_TIMEOUT,
        }
    }
}

impl SpiderOptions {
    /// Parses the configured seed list into URLs, preserving order.
    pub(crate) fn seed_urls(&self) -> Result<Vec<Url>, ScrapexError> {
        self.urls
            .iter()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| ScrapexError::Configuration(format!("seed url {:?}: {}", raw, e)))
            })
            .collect()
    }

    /// Rejects configurations the engine cannot run.
    pub(crate) fn validate(&self) -> Result<(), ScrapexError> {
        if self.urls.is_empty() {
            return Err(ScrapexError::Configuration(
                "at least one seed url is required".to_string(),
            ));
        }
        if let Some(name) = &self.name {
            if name.is_empty() {
                return Err(ScrapexError::Configuration(
                    "registration name must not be empty".to_string(),
                ));
            }
        }
        self.seed_urls().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_seed_list_is_rejected() {
        let options = SpiderOptions::default();
        assert!(matches!(
            options.validate(),
            Err(ScrapexError::Configuration(_))
        ));
    }

    #[test]
    fn malformed_seed_is_rejected() {
        let options = SpiderOptions {
            urls: vec!["not a url".to_string()],
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn well_formed_options_pass() {
        let options = SpiderOptions {
            urls: vec!["http://localhost:9090/a".to_string()],
            interval: Some(Duration::from_millis(500)),
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }
}
