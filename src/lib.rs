//! rentwatch - rental listing watcher.
//!
//! Scrapes a fixed set of listing-search URLs, detects ads that were not seen
//! on earlier runs, records them in an append-only CSV table and forwards
//! each new ad to a Telegram chat.

pub mod bot;
pub mod cli;
pub mod config;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod scrapers;
pub mod storage;
pub mod utils;
