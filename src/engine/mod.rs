//! # Engine Module
//!
//! Implements the spider runtime that orchestrates the crawl lifecycle.
//!
//! ## Overview
//!
//! The engine owns the crawl state (options, the seed-keyed result
//! table, the pending request set, and the re-crawl timer) and drives
//! the lifecycle `Initialising → Idle → Crawling → Idle … → Stopped`.
//! It dispatches concurrent top-level requests, merges their completions
//! with replace-on-refresh semantics, services blocking exports, and
//! schedules periodic re-crawls.
//!
//! ## Key Components
//!
//! - **Engine**: the clonable public handle; every method is an RPC into
//!   the runtime loop
//! - **Runtime Loop**: a single task serializing all state transitions
//! - **DataTable**: ordered seed slots with explicit empty (`⊥`) markers
//! - **Export**: format selection and encoding of merged data
//! - **Registry**: optional process-wide name → handle lookup

mod core;
mod data_table;
mod export;
mod registry;

pub use self::core::Engine;
pub use self::export::{Encoder, ExportFormat, Exported};
