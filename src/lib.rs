//! lotenrich - item-detail enrichment for scraped auction lots.
//!
//! Scraped rows arrive from nightly bulk crawls with only listing-level
//! fields. This crate fills in the rest on demand: it crawls the source
//! site's detail page through a pool of cookie-bearing HTTP lanes,
//! downloads and transforms the photos, persists the result, and serves
//! the enriched record over HTTP without blocking callers on upstream
//! latency.

pub mod cli;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod images;
pub mod lanes;
pub mod models;
pub mod repository;
pub mod server;
pub mod services;
