//! Offline-first mirror of a spreadsheet-managed church calendar, newsroom
//! and profile.
//!
//! Content is edited in a shared spreadsheet with three tabs. This crate
//! pulls each tab as CSV, parses it tolerantly, replaces a local SQLite cache
//! with the result and republishes the cache to any number of observers. When
//! the spreadsheet cannot be reached, the last cached copy is served along
//! with a notice.
//!
//! - [`sheet`] - export URLs, HTTP retrieval, CSV parsing, connection check
//! - [`storage`] - SQLite cache with live change streams
//! - [`settings`] - spreadsheet URL and preferred categories
//! - [`repository`] - refresh-with-fallback and published state per record kind
//! - [`query`] - search and filter views over published state
//! - [`app`] - wiring for front ends

pub mod app;
pub mod config;
pub mod model;
pub mod query;
pub mod repository;
pub mod settings;
pub mod sheet;
pub mod storage;
pub mod util;
