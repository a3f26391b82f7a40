//! News Headlines - a Google News headline collector
//!
//! This crate polls a headline RSS feed on a fixed delay, unpacks the article
//! list embedded in each entry's description, stores new articles keyed by URL,
//! and serves a filtered, paginated JSON API over what has been collected.

pub mod collector;
pub mod config;
pub mod db;
pub mod fetcher;
pub mod parser;
pub mod routes;
pub mod search;
