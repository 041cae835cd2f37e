//! A "prelude" for users of the `scrapex` crate.
//!
//! Re-exports the traits, structs, and macros needed to define and run a
//! spider, so they can be imported in one line.
//!
//! # Example
//!
//! ```
//! use scrapex::prelude::*;
//! ```

pub use crate::{
    // Core structs
    Engine,
    EngineBuilder,
    Response,
    Selection,
    SpiderOptions,
    // Core traits
    Fetcher,
    Spider,
    // Callback vocabulary
    Init,
    ParseValue,
    Record,
    RequestContext,
    RequestHandle,
    // Export surface
    ExportFormat,
    Exported,
    // Errors
    ScrapexError,
    // Essential re-exports for trait implementation
    async_trait,
};
