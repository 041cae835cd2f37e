//! # Error Module
//!
//! Defines `ScrapexError`, the closed error sum used across the crate.
//!
//! ## Overview
//!
//! Every fallible operation in the runtime returns `Result<_, ScrapexError>`.
//! The variants mirror the semantic error kinds of the crawl lifecycle:
//! fetch failures (`NotFound`, `Transport`), request-task failures
//! (`TaskCrash`, `AwaitTimeout`), startup refusals (`InitStop`,
//! `InitIgnore`, `InitTimeout`, `AlreadyRegistered`), and caller mistakes
//! (`UnsupportedFormat`, `InvalidSelector`, `InvalidSitemap`,
//! `Configuration`).
//!
//! The engine degrades most request-level errors to an empty result so a
//! crawl keeps making progress; only startup failures and explicit stop
//! requests surface to the owner.

use thiserror::Error;
use url::Url;

/// Errors produced by the spider runtime and its collaborators.
#[derive(Error, Debug)]
pub enum ScrapexError {
    /// The server answered 404 for the requested URL. The engine prunes
    /// the URL from the seed list and continues.
    #[error("resource not found: {0}")]
    NotFound(Url),

    /// Network, DNS, timeout, or unexpected-status failure. The engine
    /// stores an empty result and retries the seed on the next interval.
    #[error("transport error for {url}: {reason}")]
    Transport { url: Url, reason: String },

    /// The request task died before producing a result; the awaiting
    /// owner receives the task's exit reason.
    #[error("request task crashed: {0}")]
    TaskCrash(String),

    /// Awaiting a request exceeded the caller's budget. The task is
    /// aborted before this is returned.
    #[error("timed out awaiting request for {0}")]
    AwaitTimeout(Url),

    /// Export was asked for a format the engine does not encode.
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// The spider's `init` refused startup with a reason.
    #[error("spider refused to start: {0}")]
    InitStop(String),

    /// The spider's `init` asked not to be started at all.
    #[error("spider ignored the start request")]
    InitIgnore,

    /// The spider's `init` did not finish within the configured budget.
    #[error("spider init exceeded its timeout budget")]
    InitTimeout,

    /// Another engine already holds the requested registration name.
    #[error("an engine is already registered under the name {0:?}")]
    AlreadyRegistered(String),

    /// A CSS selector string failed to parse.
    #[error("invalid selector: {0:?}")]
    InvalidSelector(String),

    /// A sitemap document failed to deserialize or validate.
    #[error("invalid sitemap: {0}")]
    InvalidSitemap(String),

    /// The spider options are unusable (empty seeds, malformed URL, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The engine has terminated; the RPC cannot be served.
    #[error("engine is stopped")]
    Stopped,

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
